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

//! Tree nodes and the operations on clusters of 8 sibling nodes.
//!
//! A node does not know where it is, so everything here takes the position of the node
//! and the cluster pool as context.

use crate::coords::*;
use crate::listener::Listener;
use crate::pool::{BlockPool, BlockPtr};
use crate::sort::{sort_small, sort_small_by};
use arrayvec::ArrayVec;
use log::trace;
use std::fmt::Debug;

/// Requirements on values stored in the tree.
/// Ordering is needed to find the majority among children.
pub trait Voxel: Copy + Ord + Debug {}
impl<T: Copy + Ord + Debug> Voxel for T {}

/// Pointer to the 8 children of a node, None for uniform nodes.
pub type ClusterPtr = Option<BlockPtr>;

/// Tree node. Without children the node is a uniform cube of `value`,
/// with children `value` is the majority of the children values (level of detail).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node<T> {
    pub value: T,
    pub children: ClusterPtr,
}

/// All 8 children of a node, stored in one pool block.
pub type Cluster<T> = [Node<T>; 8];

/// Pool holding all clusters of a tree.
pub type ClusterPool<T> = BlockPool<Cluster<T>>;

impl<T: Voxel> Node<T> {
    #[inline]
    pub const fn leaf(value: T) -> Self {
        Self {
            value,
            children: None,
        }
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    /// True if childless, or if all 8 children are childless and share one value.
    #[inline]
    pub fn is_uniform(&self, clusters: &ClusterPool<T>) -> bool {
        match self.children {
            None => true,
            Some(c) => uniform_value(&clusters[c]).is_some(),
        }
    }
}

/// The shared value of a cluster whose children are all childless and equal.
#[inline]
pub fn uniform_value<T: Voxel>(cluster: &Cluster<T>) -> Option<T> {
    let first = cluster[0].value;
    cluster
        .iter()
        .all(|n| n.children.is_none() && n.value == first)
        .then_some(first)
}

/// Most frequent value among the children. Ties go to the smallest value.
pub fn major_value<T: Voxel>(cluster: &Cluster<T>) -> T {
    let mut values = cluster.map(|n| n.value);
    sort_small(&mut values);

    let mut best = values[0];
    let mut best_run = 1;
    let mut run = 1;
    for i in 1..values.len() {
        if values[i] == values[i - 1] {
            run += 1;
        } else {
            run = 1;
        }
        if run > best_run {
            best_run = run;
            best = values[i];
        }
    }
    best
}

/// Index of the child at `child_level` that contains `target`.
/// Picks bit `child_level` of the target's level-0 coordinate on each axis.
#[inline]
pub fn child_index(target: OctVec, child_level: u8) -> usize {
    debug_assert!(child_level >= target.level);
    let shift = child_level - target.level;
    target
        .pos
        .iter()
        .enumerate()
        .fold(0, |acc, (axis, p)| acc | ((((p >> shift) & 1) as usize) << axis))
}

/// Where a node lives: the root is held by the tree itself, everything else in a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeAddr {
    Root,
    Child(BlockPtr, usize),
}

/// utility struct for holding locations in the tree.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TreePos {
    pub addr: NodeAddr,
    pub pos: OctVec,
}

#[inline]
fn node_mut<'a, T>(
    root: &'a mut Node<T>,
    clusters: &'a mut ClusterPool<T>,
    addr: NodeAddr,
) -> &'a mut Node<T> {
    match addr {
        NodeAddr::Root => root,
        NodeAddr::Child(c, i) => &mut clusters[c][i],
    }
}

/// Writes `value` over the whole cube `target`, which must lie inside the root.
/// `path` is scratch space for the walk, it is left empty.
/// Returns whether the tree changed.
pub(crate) fn set<T, L>(
    root: &mut Node<T>,
    root_pos: OctVec,
    clusters: &mut ClusterPool<T>,
    path: &mut Vec<TreePos>,
    target: OctVec,
    value: T,
    listener: &mut L,
) -> bool
where
    T: Voxel,
    L: Listener<T>,
{
    debug_assert!(root_pos.contains_child_node(target));
    path.clear();

    // start at the root node
    let mut addr = TreePos {
        addr: NodeAddr::Root,
        pos: root_pos,
    };

    // walk down, splitting uniform nodes on the way
    while addr.pos.level > target.level {
        let node = *node_mut(root, clusters, addr.addr);
        let cluster = match node.children {
            Some(c) => c,
            None => {
                // the whole cube already holds the value, nothing to do.
                // Any node split below would hold its parent's value, so this can only happen before splitting.
                if node.value == value {
                    path.clear();
                    return false;
                }
                let c = clusters.alloc([Node::leaf(node.value); 8]);
                trace!("split {:?} holding {:?}", addr.pos.to_voxel(), node.value);
                node_mut(root, clusters, addr.addr).children = Some(c);
                c
            }
        };
        path.push(addr);
        let idx = child_index(target, addr.pos.level - 1);
        addr = TreePos {
            addr: NodeAddr::Child(cluster, idx),
            pos: addr.pos.get_child(idx),
        };
    }
    debug_assert_eq!(addr.pos, target);

    // replace whatever is at the target
    let node = *node_mut(root, clusters, addr.addr);
    match node.children {
        Some(c) => remove_subtree(clusters, c, target, Some(listener), value),
        None => {
            if node.value == value {
                path.clear();
                return false;
            }
            listener.update(target.to_voxel(), node.value, value);
        }
    }
    *node_mut(root, clusters, addr.addr) = Node::leaf(value);

    // walk back up, collapsing uniform clusters and refreshing the level of detail
    while let Some(parent) = path.pop() {
        let node = *node_mut(root, clusters, parent.addr);
        let c = match node.children {
            Some(c) => c,
            None => unreachable!("nodes on the write path always have children"),
        };
        if let Some(v) = uniform_value(&clusters[c]) {
            clusters.free(c);
            trace!("collapsed {:?} into {:?}", parent.pos.to_voxel(), v);
            *node_mut(root, clusters, parent.addr) = Node::leaf(v);
            continue;
        }
        let major = major_value(&clusters[c]);
        if major == node.value {
            // nothing changes further up
            break;
        }
        node_mut(root, clusters, parent.addr).value = major;
    }
    path.clear();
    true
}

/// Frees the cluster `ptr` (children of the node at `pos`) and everything below it.
///
/// With a listener, every uniform cube being cleared is reported as changing to `new_value`
/// (cubes already holding `new_value` are skipped). Without one nothing is reported,
/// which is what a collapse or a wholesale clear wants.
pub(crate) fn remove_subtree<T, L>(
    clusters: &mut ClusterPool<T>,
    ptr: BlockPtr,
    pos: OctVec,
    mut listener: Option<&mut L>,
    new_value: T,
) where
    T: Voxel,
    L: Listener<T>,
{
    let cluster = clusters.free(ptr);
    for (i, child) in cluster.iter().enumerate() {
        let child_pos = pos.get_child(i);
        match child.children {
            Some(c) => remove_subtree(clusters, c, child_pos, listener.as_deref_mut(), new_value),
            None => {
                if let Some(l) = listener.as_deref_mut() {
                    if child.value != new_value {
                        l.update(child_pos.to_voxel(), child.value, new_value);
                    }
                }
            }
        }
    }
}

/// Pre-order walk. The callback gets (position, value, has children) and returns whether to descend.
pub(crate) fn traverse<T, F>(clusters: &ClusterPool<T>, node: &Node<T>, pos: OctVec, callback: &mut F)
where
    T: Voxel,
    F: FnMut(VoxelPos, T, bool) -> bool,
{
    let descend = callback(pos.to_voxel(), node.value, node.children.is_some());
    if let (true, Some(c)) = (descend, node.children) {
        for (i, child) in clusters[c].iter().enumerate() {
            traverse(clusters, child, pos.get_child(i), callback);
        }
    }
}

/// sqrt(3), ratio of a cube's half diagonal to its half edge.
const SQRT_3: f32 = 1.732_050_8;

/// Finds the first non-empty cube along the ray, descending no deeper than `target_level`.
///
/// Children are visited in the order their bounding spheres are entered and the first hit is returned.
/// Neighbouring spheres overlap, so with several children hit at similar distances
/// this is not guaranteed to be the geometrically closest cube.
pub(crate) fn raycast<T: Voxel>(
    clusters: &ClusterPool<T>,
    node: &Node<T>,
    pos: OctVec,
    ray: &Ray,
    target_level: u8,
    empty: T,
) -> Option<HitResult<T>> {
    match node.children {
        Some(c) if pos.level > target_level => {
            if !ray.intersects_cube(pos.min_corner(), pos.float_size()) {
                return None;
            }
            let cluster = &clusters[c];
            let radius = pos.float_size() * 0.25 * SQRT_3;
            let mut candidates: ArrayVec<(f32, usize), 8> = ArrayVec::new();
            for (i, child) in cluster.iter().enumerate() {
                if child.children.is_none() && child.value == empty {
                    continue;
                }
                if let Some(t) = ray.sphere_entry(pos.get_child(i).center(), radius) {
                    candidates.push((t, i));
                }
            }
            sort_small_by(candidates.as_mut_slice(), |a, b| a.0 < b.0);
            candidates.iter().find_map(|&(_, i)| {
                raycast(clusters, &cluster[i], pos.get_child(i), ray, target_level, empty)
            })
        }
        _ => {
            if node.value == empty {
                return None;
            }
            let (distance, side) = ray.cube_entry(pos.min_corner(), pos.float_size())?;
            Some(HitResult {
                position: hit_cell(ray, distance, pos, target_level),
                value: node.value,
                side,
                distance,
            })
        }
    }
}

/// Cell at `level` inside `cube` where the ray enters it.
fn hit_cell(ray: &Ray, distance: f32, cube: OctVec, level: u8) -> VoxelPos {
    if cube.level <= level {
        return cube.to_voxel();
    }
    let entry = ray.at(distance);
    let min = cube.min_corner();
    let cell_size = (1u64 << level) as f32;
    let shift = cube.level - level;
    let last = (1u64 << shift) - 1;
    let mut pos = [0u64; 3];
    for axis in 0..3 {
        // float to int casts saturate, so entries slightly outside the cube land on its border cells
        let rel = (((entry[axis] - min[axis]) / cell_size).floor() as u64).min(last);
        pos[axis] = (cube.pos[axis] << shift) + rel;
    }
    OctVec { pos, level }.to_voxel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoopListener;

    fn cluster_of(values: [u8; 8]) -> Cluster<u8> {
        values.map(Node::leaf)
    }

    #[test]
    fn majority() {
        assert_eq!(major_value(&cluster_of([1, 2, 1, 2, 1, 2, 1, 1])), 1);
        assert_eq!(major_value(&cluster_of([3, 3, 3, 0, 0, 5, 5, 5])), 3);
        assert_eq!(major_value(&cluster_of([7, 0, 0, 7, 2, 7, 2, 7])), 7);
        // ties go to the first run in sorted order
        assert_eq!(major_value(&cluster_of([2, 2, 2, 2, 1, 1, 1, 1])), 1);
        assert_eq!(major_value(&cluster_of([0, 1, 2, 3, 4, 5, 6, 7])), 0);
    }

    #[test]
    fn uniformity() {
        let mut clusters: ClusterPool<u8> = BlockPool::new();
        assert_eq!(uniform_value(&cluster_of([4; 8])), Some(4));
        assert_eq!(uniform_value(&cluster_of([4, 4, 4, 4, 4, 4, 4, 3])), None);

        let mut with_grandchild = cluster_of([4; 8]);
        with_grandchild[2].children = Some(clusters.alloc(cluster_of([4; 8])));
        assert_eq!(uniform_value(&with_grandchild), None);

        let n = Node {
            value: 4,
            children: Some(clusters.alloc(cluster_of([4; 8]))),
        };
        assert!(n.is_uniform(&clusters));
        assert!(Node::leaf(1u8).is_uniform(&clusters));
    }

    #[test]
    fn child_indices() {
        // level-0 target (5, 2, 7) = (0b101, 0b010, 0b111) in biased coordinates
        let target = OctVec {
            pos: [0b101, 0b010, 0b111],
            level: 0,
        };
        assert_eq!(child_index(target, 0), 0b101);
        assert_eq!(child_index(target, 1), 0b110);
        assert_eq!(child_index(target, 2), 0b101);
        // the index picks the child that actually contains the target
        let parent = OctVec {
            pos: [0, 0, 0],
            level: 3,
        };
        let mut p = parent;
        while p.level > 0 {
            p = p.get_child(child_index(target, p.level - 1));
            assert!(p.contains_child_node(target));
        }
        assert_eq!(p, target);
    }

    #[test]
    fn set_splits_and_collapses() {
        let mut clusters: ClusterPool<u8> = BlockPool::new();
        let mut path = Vec::new();
        let mut root = Node::leaf(0u8);
        let root_pos = OctVec {
            pos: [0, 0, 0],
            level: 2,
        };
        let mut changes = 0;
        let mut listener = |_p: VoxelPos, _o: u8, _n: u8| changes += 1;

        let t = OctVec {
            pos: [1, 0, 0],
            level: 0,
        };
        assert!(set(&mut root, root_pos, &mut clusters, &mut path, t, 3, &mut listener));
        assert_eq!(clusters.used_blocks(), 2);
        assert_eq!(root.value, 0);

        // same write again is a no-op
        assert!(!set(&mut root, root_pos, &mut clusters, &mut path, t, 3, &mut listener));

        // fill the whole level 1 cube holding t, then everything
        for i in 0..8 {
            let t = root_pos.get_child(0).get_child(i);
            set(&mut root, root_pos, &mut clusters, &mut path, t, 3, &mut listener);
        }
        assert_eq!(clusters.used_blocks(), 1);
        for i in 1..8 {
            let t = root_pos.get_child(i);
            set(&mut root, root_pos, &mut clusters, &mut path, t, 3, &mut listener);
        }
        assert_eq!(clusters.used_blocks(), 0);
        assert_eq!(root, Node::leaf(3));
        assert!(path.is_empty());
        // one change per level 0 cell of the first cube, then one per sibling cube
        assert_eq!(changes, 8 + 7);
    }

    #[test]
    fn remove_subtree_reports_leaves() {
        let mut clusters: ClusterPool<u8> = BlockPool::new();
        let pos = OctVec {
            pos: [0, 0, 0],
            level: 2,
        };
        let inner = clusters.alloc(cluster_of([1, 0, 1, 0, 1, 0, 1, 1]));
        let mut top = cluster_of([0, 2, 2, 2, 2, 2, 2, 2]);
        top[0] = Node {
            value: 1,
            children: Some(inner),
        };
        let top = clusters.alloc(top);

        let mut seen = Vec::new();
        let mut listener = |p: VoxelPos, o: u8, n: u8| seen.push((p, o, n));
        remove_subtree(&mut clusters, top, pos, Some(&mut listener), 2);
        assert_eq!(clusters.used_blocks(), 0);
        // 8 level-0 cells below child 0, none of them was 2; the 7 other children already hold 2
        assert_eq!(seen.len(), 8);
        assert!(seen.iter().all(|(p, _, n)| p.level == 0 && *n == 2));

        let top = clusters.alloc(cluster_of([5; 8]));
        remove_subtree::<u8, NoopListener>(&mut clusters, top, pos, None, 0);
        assert_eq!(clusters.used_blocks(), 0);
    }

    #[test]
    fn traverse_can_prune() {
        let mut clusters: ClusterPool<u8> = BlockPool::new();
        let inner = clusters.alloc(cluster_of([1; 8]));
        let mut top = cluster_of([0; 8]);
        top[3].children = Some(inner);
        let root = Node {
            value: 0,
            children: Some(clusters.alloc(top)),
        };
        let pos = OctVec {
            pos: [0, 0, 0],
            level: 2,
        };

        let mut visited = 0;
        traverse(&clusters, &root, pos, &mut |_, _, _| {
            visited += 1;
            true
        });
        assert_eq!(visited, 1 + 8 + 8);

        let mut visited = 0;
        traverse(&clusters, &root, pos, &mut |p, _, _| {
            visited += 1;
            p.level == 2
        });
        assert_eq!(visited, 1 + 8);
    }
}
