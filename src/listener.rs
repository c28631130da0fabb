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

//! Change notification hook of the tree.
use crate::coords::VoxelPos;

/// Receives every change of a stored value, e.g. to keep mass or center of mass up to date incrementally.
///
/// `update` is called once per uniform cube whose value changes, with the cube position
/// (at the cube's own level) and the values before and after.
/// Cubes that are only split or merged without changing their contents are not reported.
pub trait Listener<T> {
    fn update(&mut self, position: VoxelPos, old_value: T, new_value: T);
}

/// Listener for trees nobody needs to observe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoopListener;

impl<T> Listener<T> for NoopListener {
    #[inline]
    fn update(&mut self, _position: VoxelPos, _old_value: T, _new_value: T) {}
}

impl<T, F> Listener<T> for F
where
    F: FnMut(VoxelPos, T, T),
{
    #[inline]
    fn update(&mut self, position: VoxelPos, old_value: T, new_value: T) {
        self(position, old_value, new_value)
    }
}
