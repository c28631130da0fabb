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

//! Errors reported for malformed addresses into the tree.
use crate::coords::MAX_LEVEL;
use thiserror::Error;

/// Reasons a position/level pair can not address a cell of the octree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SvoError {
    /// Levels above [`MAX_LEVEL`] would describe cubes larger than the whole i32 space.
    #[error("level {level} exceeds the maximal octree level {}", MAX_LEVEL)]
    InvalidLevel { level: u8 },

    /// Coarse levels have fewer cells per axis, so not every i32 is a valid coordinate there.
    #[error("position {position:?} can not be addressed at level {level}")]
    PositionOutOfRange { position: [i32; 3], level: u8 },
}
