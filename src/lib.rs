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

#![doc = include_str!("../README.md")]
//!
//! # Structure
//! The tree owns its root node and a pool of clusters, each holding the 8 children of one node.
//! Nodes point at their children by a 32 bit handle into the pool, and nodes without children are uniform cubes.
//!
//! The root starts as a single cell at the origin. It grows when a write lands outside of it and
//! shrinks back when everything but one octant becomes empty, so trees stay shallow for local content.
//!
//! # Level of detail
//! Reading a cube that has detail inside returns the most frequent value among its 8 children, ties going to the smaller value.
//! This is applied recursively, so it is a majority of majorities rather than a count over all cells.
//!
//! # Ray casting
//! Rays descend into children in the order they enter the children's bounding spheres.
//! This is quick, but it is not exact: the first cube found is not always the closest one.

pub mod coords;
pub use crate::coords::*;

pub mod error;
pub use crate::error::*;

pub mod pool;

pub mod sort;

pub mod listener;
pub use crate::listener::*;

pub mod node;
pub use crate::node::Voxel;

pub mod tree;
pub use crate::tree::*;

pub mod iter;
pub use crate::iter::*;
