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

//! Iterators over tree data
use crate::coords::*;
use crate::listener::Listener;
use crate::node::{ClusterPool, Node, Voxel};
use crate::tree::SparseVoxelOctree;

/// Iterator over all uniform cubes of the tree (nodes without children), in pre-order.
/// Yields the position of each cube at its own level and its value, empty cubes included.
pub struct LeafIter<'a, T: Voxel> {
    /// the reference to tree's clusters
    clusters: &'a ClusterPool<T>,
    /// internal stack for tree traverse
    to_visit: Vec<(&'a Node<T>, OctVec)>,
}

impl<'a, T: Voxel> LeafIter<'a, T> {
    pub(crate) fn new(clusters: &'a ClusterPool<T>, root: &'a Node<T>, root_pos: OctVec) -> Self {
        let mut to_visit = Vec::with_capacity(Self::stack_size(root_pos.level));
        to_visit.push((root, root_pos));
        Self { clusters, to_visit }
    }

    /// Returns the amount of heap allocation to run this iterator.
    /// Every level on the way down leaves at most 7 siblings waiting on the stack.
    #[inline]
    pub fn stack_size(root_level: u8) -> usize {
        root_level as usize * 7 + 1
    }
}

impl<'a, T: Voxel> Iterator for LeafIter<'a, T> {
    type Item = (VoxelPos, T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, pos) = self.to_visit.pop()?;
            let c = match node.children {
                Some(c) => c,
                None => return Some((pos.to_voxel(), node.value)),
            };
            // push in reverse so that child 0 comes out first
            for (i, child) in self.clusters[c].iter().enumerate().rev() {
                // make sure this push never allocates
                debug_assert_ne!(self.to_visit.capacity(), self.to_visit.len());
                self.to_visit.push((child, pos.get_child(i)));
            }
        }
    }
}

impl<T, L> SparseVoxelOctree<T, L>
where
    T: Voxel,
    L: Listener<T>,
{
    /// Iterate over all uniform cubes of the tree with their values.
    /// Together they tile the root cube exactly once.
    #[inline]
    pub fn iter_leaves(&self) -> LeafIter<'_, T> {
        LeafIter::new(&self.clusters, &self.root, self.root_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn leaves_tile_the_root() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut tree = SparseVoxelOctree::<u8>::default();
        for _ in 0..300 {
            let pos = [
                rng.random_range(-8..8),
                rng.random_range(-8..8),
                rng.random_range(0..8),
            ];
            tree.set(pos, 0, rng.random_range(0u8..3));
        }
        let root = tree.root_position();
        let root_volume = (root.size() as u128).pow(3);
        let mut volume = 0u128;
        for (pos, value) in tree.iter_leaves() {
            volume += (pos.size() as u128).pow(3);
            // every leaf reads back as its own value
            assert_eq!(tree.get(pos.pos, pos.level), value);
        }
        assert_eq!(volume, root_volume);
    }

    #[test]
    fn leaves_in_preorder() {
        let mut tree = SparseVoxelOctree::<u8>::default();
        tree.set([0, 0, 0], 0, 1);
        tree.set([1, 1, 1], 0, 2);
        let leaves: Vec<_> = tree.iter_leaves().collect();
        assert_eq!(leaves.len(), 8);
        assert_eq!(leaves[0], (VoxelPos::build(0, 0, 0, 0), 1));
        assert_eq!(leaves[7], (VoxelPos::build(1, 1, 1, 0), 2));
        assert!(leaves[1..7].iter().all(|(_, v)| *v == 0));

        let filled = tree.iter_leaves().filter(|(_, v)| *v != 0).count();
        assert_eq!(filled, 2);
    }

    #[test]
    fn single_leaf_trees() {
        let tree = SparseVoxelOctree::<u8>::default();
        let leaves: Vec<_> = tree.iter_leaves().collect();
        assert_eq!(leaves, vec![(VoxelPos::build(0, 0, 0, 0), 0)]);

        let mut tree = SparseVoxelOctree::<u8>::default();
        tree.set([0, 0, 0], MAX_LEVEL, 4);
        let leaves: Vec<_> = tree.iter_leaves().collect();
        assert_eq!(leaves, vec![(VoxelPos::new([0, 0, 0], MAX_LEVEL), 4)]);
    }

    #[test]
    fn stack_never_grows() {
        // deepest possible tree, one cell on each side of the origin
        let mut tree = SparseVoxelOctree::<u8>::default();
        tree.set([-1, -1, -1], 0, 1);
        tree.set([0, 0, 0], 0, 1);
        assert_eq!(tree.root_level(), MAX_LEVEL);
        // the root cluster, then a chain of 31 clusters on each side
        assert_eq!(tree.used_clusters(), 63);
        // debug builds assert on reallocation while iterating
        assert_eq!(tree.iter_leaves().count(), 1 + 7 * 63);
    }
}
