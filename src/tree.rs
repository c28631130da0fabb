/* Generic sparse voxel octree with level of detail and ray casting.
Copyright (C) 2023  Alexander Pyattaev

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Contains the tree struct, which owns the root and all node clusters.

use crate::coords::*;
use crate::error::SvoError;
use crate::listener::{Listener, NoopListener};
use crate::node::{self, major_value, ClusterPool, Node, TreePos, Voxel};
use log::debug;

/// Sparse voxel octree holding a value of type `T` for every cell of the i32 grid.
///
/// Regions holding the same value are stored as one uniform node, so memory scales with
/// the amount of detail rather than the volume. Every node with children also carries the
/// majority value of its children, which makes coarse reads (level of detail) a plain lookup.
///
/// The tree starts as a single level-0 cell at the origin holding the empty value, and the root grows
/// whenever a write lands outside of it. Reads outside the root return the empty value.
///
/// Every change of a stored value is reported to the [`Listener`] `L`.
#[derive(Clone, Debug)]
pub struct SparseVoxelOctree<T: Voxel, L: Listener<T> = NoopListener> {
    /// Root node, the only node not stored in the pool
    pub(crate) root: Node<T>,
    /// Where the root is, and how large it is
    pub(crate) root_pos: OctVec,
    /// All clusters of 8 children
    pub(crate) clusters: ClusterPool<T>,
    /// Internal stack for writes, it will be as long as the depth of the tree.
    processing_queue: Vec<TreePos>,
    /// Value of everything never written
    empty: T,
    listener: L,
}

impl<T, L> SparseVoxelOctree<T, L>
where
    T: Voxel + Default,
    L: Listener<T>,
{
    /// creates a new, empty tree using `T::default()` as the empty value
    pub fn new(listener: L) -> Self {
        Self::with_empty(T::default(), listener)
    }
}

impl<T, L> SparseVoxelOctree<T, L>
where
    T: Voxel,
    L: Listener<T>,
{
    /// creates a new, empty tree with an explicit empty value
    pub fn with_empty(empty: T, listener: L) -> Self {
        Self::with_capacity(empty, listener, 1)
    }

    /// Creates a tree with preallocated memory for `clusters_capacity` clusters of 8 nodes.
    pub fn with_capacity(empty: T, listener: L, clusters_capacity: usize) -> Self {
        Self {
            root: Node::leaf(empty),
            root_pos: OctVec::root(),
            clusters: ClusterPool::with_capacity(clusters_capacity),
            processing_queue: Vec::with_capacity(4),
            empty,
            listener,
        }
    }

    /// Value returned for everything never written
    #[inline]
    pub fn empty_value(&self) -> T {
        self.empty
    }

    /// Position of the root cube, at the root level
    #[inline]
    pub fn root_position(&self) -> VoxelPos {
        self.root_pos.to_voxel()
    }

    #[inline]
    pub fn root_level(&self) -> u8 {
        self.root_pos.level
    }

    #[inline]
    pub fn listener(&self) -> &L {
        &self.listener
    }

    #[inline]
    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Number of clusters currently allocated from the pool
    #[inline]
    pub fn used_clusters(&self) -> usize {
        self.clusters.used_blocks()
    }

    /// Number of clusters the pool can hold without allocating
    #[inline]
    pub fn allocated_clusters(&self) -> usize {
        self.clusters.allocated_blocks()
    }

    /// Walks the tree and counts nodes with children. Matches [`Self::used_clusters`] unless something leaked.
    pub fn count_internal_clusters(&self) -> usize {
        let mut count = 0;
        self.traverse(|_, _, has_children| {
            count += has_children as usize;
            true
        });
        count
    }

    /// Writes `value` over the whole cube at `position` and `level`, replacing anything stored inside it.
    /// Returns whether the tree changed.
    ///
    /// Panics if the position can not be addressed at that level (see [`Self::try_set`]).
    pub fn set(&mut self, position: [i32; 3], level: u8, value: T) -> bool {
        match self.try_set(position, level, value) {
            Ok(changed) => changed,
            Err(e) => panic!("{e}"),
        }
    }

    /// Writes `value` over the whole cube at `position` and `level`, replacing anything stored inside it.
    /// Returns whether the tree changed, or why the address is invalid.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::set"))]
    pub fn try_set(&mut self, position: [i32; 3], level: u8, value: T) -> Result<bool, SvoError> {
        let target = OctVec::from_voxel(VoxelPos {
            pos: position,
            level,
        })?;
        if value == self.empty
            && !self.root_pos.contains_child_node(target)
            && !target.contains_child_node(self.root_pos)
        {
            // everything outside the root is already empty
            return Ok(false);
        }
        self.grow_to(target);
        let changed = node::set(
            &mut self.root,
            self.root_pos,
            &mut self.clusters,
            &mut self.processing_queue,
            target,
            value,
            &mut self.listener,
        );
        self.shrink_root();
        Ok(changed)
    }

    /// Reads the value of the cube at `position` and `level`.
    /// For cubes that contain detail this is the majority of what is inside.
    ///
    /// Panics on levels above [`MAX_LEVEL`]; positions outside the tree read as the empty value.
    pub fn get(&self, position: [i32; 3], level: u8) -> T {
        match self.locate(position, level) {
            Some((node, _)) => node.value,
            None => self.empty,
        }
    }

    /// Applies `predicate` to the values of all 8 children of the cube at `position` and `level`,
    /// returning whether it held for each of them along with the value of the cube itself.
    /// Uniform cubes (including those outside the tree) test their own value instead.
    pub fn is_each_child<F>(&self, position: [i32; 3], level: u8, predicate: F) -> (bool, T)
    where
        F: FnMut(T) -> bool,
    {
        self.check_children(position, level, predicate, true)
    }

    /// Like [`Self::is_each_child`], but returns whether `predicate` held for any child.
    pub fn is_any_child<F>(&self, position: [i32; 3], level: u8, predicate: F) -> (bool, T)
    where
        F: FnMut(T) -> bool,
    {
        self.check_children(position, level, predicate, false)
    }

    fn check_children<F>(&self, position: [i32; 3], level: u8, mut predicate: F, each: bool) -> (bool, T)
    where
        F: FnMut(T) -> bool,
    {
        let (node, _) = match self.locate(position, level) {
            Some(found) => found,
            None => return (predicate(self.empty), self.empty),
        };
        match node.children {
            // descent only stops early at childless nodes, so this is the requested cube
            Some(c) => {
                let mut values = self.clusters[c].iter().map(|n| n.value);
                let rv = if each {
                    values.all(&mut predicate)
                } else {
                    values.any(&mut predicate)
                };
                (rv, node.value)
            }
            None => (predicate(node.value), node.value),
        }
    }

    /// Finds the node holding the cube at `position`/`level`: either exactly that cube,
    /// or the uniform ancestor containing it. None if the cube is outside the tree.
    fn locate(&self, position: [i32; 3], level: u8) -> Option<(&Node<T>, OctVec)> {
        assert!(level <= MAX_LEVEL, "{}", SvoError::InvalidLevel { level });
        let target = OctVec::from_voxel(VoxelPos {
            pos: position,
            level,
        })
        .ok()?;
        if !self.root_pos.contains_child_node(target) {
            return None;
        }
        Some(self.follow_nodes_to_position(target))
    }

    /// Walks from the root towards target, stopping at the target level or the first childless node.
    fn follow_nodes_to_position(&self, target: OctVec) -> (&Node<T>, OctVec) {
        let mut node = &self.root;
        let mut pos = self.root_pos;
        while pos.level > target.level {
            let c = match node.children {
                Some(c) => c,
                None => break,
            };
            let idx = node::child_index(target, pos.level - 1);
            node = &self.clusters[c][idx];
            pos = pos.get_child(idx);
        }
        (node, pos)
    }

    /// Pre-order walk over the tree. The callback receives the position of every visited node,
    /// its value and whether it has children, and returns whether to descend into them.
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(VoxelPos, T, bool) -> bool,
    {
        node::traverse(&self.clusters, &self.root, self.root_pos, &mut callback);
    }

    /// Casts `ray` against all non-empty cubes, descending no deeper than `target_level`.
    ///
    /// Children are searched in the order the ray enters their bounding spheres and the first hit wins.
    /// This is fast but not exact: when the spheres of two siblings overlap along the ray,
    /// a slightly farther cube can be reported.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "svo::raycast"))]
    pub fn raycast(&self, ray: &Ray, target_level: u8) -> Option<HitResult<T>> {
        assert!(
            target_level <= MAX_LEVEL,
            "{}",
            SvoError::InvalidLevel {
                level: target_level
            }
        );
        if !ray.is_valid() {
            return None;
        }
        node::raycast(
            &self.clusters,
            &self.root,
            self.root_pos,
            ray,
            target_level,
            self.empty,
        )
    }

    /// Removes everything from the tree. Every non-empty cube is reported to the listener as becoming empty.
    pub fn clear(&mut self) {
        match self.root.children {
            Some(c) => node::remove_subtree(
                &mut self.clusters,
                c,
                self.root_pos,
                Some(&mut self.listener),
                self.empty,
            ),
            None => {
                if self.root.value != self.empty {
                    self.listener
                        .update(self.root_pos.to_voxel(), self.root.value, self.empty);
                }
            }
        }
        debug_assert_eq!(self.clusters.used_blocks(), 0);
        self.clusters.clear();
        self.root = Node::leaf(self.empty);
        self.root_pos = OctVec::root();
        self.processing_queue.clear();
        debug!("cleared tree");
    }

    /// Shrinks internal buffers to fit actual need.
    ///
    /// The next writes might take longer due to memory allocations.
    pub fn shrink_to_fit(&mut self) {
        self.clusters.shrink_to_fit();
        self.processing_queue.shrink_to_fit();
    }

    /// Grows the root until it contains target. The old root becomes one octant of the new one,
    /// the other 7 octants are empty.
    fn grow_to(&mut self, target: OctVec) {
        while !self.root_pos.contains_child_node(target) {
            debug_assert!(self.root_pos.level < MAX_LEVEL);
            let octant = self.root_pos.index_in_parent();
            // an empty uniform root stays empty at any size, no need to split it
            if self.root.children.is_some() || self.root.value != self.empty {
                let mut cluster = [Node::leaf(self.empty); 8];
                cluster[octant] = self.root;
                let value = major_value(&cluster);
                self.root = Node {
                    value,
                    children: Some(self.clusters.alloc(cluster)),
                };
            }
            let new_pos = self.root_pos.parent();
            debug!(
                "root grew from {:?} to {:?}",
                self.root_pos.to_voxel(),
                new_pos.to_voxel()
            );
            self.root_pos = new_pos;
        }
    }

    /// Drops root levels that only add empty space around a single non-empty octant.
    fn shrink_root(&mut self) {
        while let Some(c) = self.root.children {
            let mut keep = None;
            for (i, child) in self.clusters[c].iter().enumerate() {
                if child.children.is_none() && child.value == self.empty {
                    continue;
                }
                if keep.is_some() {
                    return;
                }
                keep = Some(i);
            }
            let Some(i) = keep else {
                unreachable!("a cluster of empty leaves would have collapsed");
            };
            let child = self.clusters.free(c)[i];
            let new_pos = self.root_pos.get_child(i);
            debug!(
                "root shrank from {:?} to {:?}",
                self.root_pos.to_voxel(),
                new_pos.to_voxel()
            );
            self.root = child;
            self.root_pos = new_pos;
        }
        if self.root.children.is_none()
            && self.root.value == self.empty
            && self.root_pos != OctVec::root()
        {
            debug!("tree is empty, root moved back to the origin");
            self.root_pos = OctVec::root();
        }
    }
}

impl<T, L> Default for SparseVoxelOctree<T, L>
where
    T: Voxel + Default,
    L: Listener<T> + Default,
{
    /// creates a new, empty tree
    fn default() -> Self {
        Self::new(L::default())
    }
}
