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

//! Contains coordinate structs: VoxelPos for the public API and OctVec for addressing inside the tree,
//! as well as the ray and face types used by ray casting.

use crate::error::SvoError;

/// Highest level a cell can have. The single cell at this level spans the entire i32 space on every axis.
pub const MAX_LEVEL: u8 = 32;

/// Offset-binary bias applied to every axis inside the tree, so negative and positive cells share one hierarchy.
const BIAS: i64 = 1 << 31;

/// Position of a cube in the voxel grid, paired with its level.
///
/// A cube at level `L` and position `p` covers level-0 cells `[p * 2^L, (p + 1) * 2^L)` on each axis,
/// i.e. coordinates use floor semantics and may be negative.
/// The one cube at [`MAX_LEVEL`] covers everything and is always reported at position `[0, 0, 0]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct VoxelPos {
    pub pos: [i32; 3],
    pub level: u8,
}

impl VoxelPos {
    /// Creates a new position.
    /// # Args
    /// * `pos` The position at the given level. Allowed range halves as the level increases by one.
    /// * `level` the level the position is at, 0 is the finest resolution.
    #[inline]
    pub fn new(pos: [i32; 3], level: u8) -> Self {
        debug_assert!(level <= MAX_LEVEL);
        Self { pos, level }
    }

    #[inline]
    pub fn build(x: i32, y: i32, z: i32, level: u8) -> Self {
        Self::new([x, y, z], level)
    }

    /// Creates a new position, checking that it addresses a real cube of the tree.
    pub fn try_new(pos: [i32; 3], level: u8) -> Result<Self, SvoError> {
        let rv = Self { pos, level };
        OctVec::from_voxel(rv)?;
        Ok(rv)
    }

    /// Edge length of the cube in level-0 cells.
    #[inline]
    pub fn size(self) -> u64 {
        1u64 << self.level
    }

    /// Lowest corner of the cube in level-0 cells.
    #[inline]
    pub fn min_corner(self) -> [i64; 3] {
        match OctVec::from_voxel(self) {
            Ok(v) => v.min_cell(),
            // not representable in the tree, extrapolate with floor semantics
            Err(_) => self.pos.map(|e| (e as i64) << self.level.min(MAX_LEVEL)),
        }
    }
}

/// Biased grid coordinate used inside the tree.
///
/// Each axis holds `floor(x / 2^level) + 2^(31 - level)` so that parents are found by plain shifts,
/// independent of the sign of the public coordinate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OctVec {
    pub pos: [u64; 3],
    pub level: u8,
}

impl OctVec {
    /// Level 0 cell at public origin, where an empty tree starts.
    #[inline]
    pub fn root() -> Self {
        Self {
            pos: [BIAS as u64; 3],
            level: 0,
        }
    }

    /// Converts a public position into tree coordinates, validating level and range.
    pub fn from_voxel(v: VoxelPos) -> Result<Self, SvoError> {
        if v.level > MAX_LEVEL {
            return Err(SvoError::InvalidLevel { level: v.level });
        }
        let out_of_range = SvoError::PositionOutOfRange {
            position: v.pos,
            level: v.level,
        };
        if v.level == MAX_LEVEL {
            return match v.pos {
                [0, 0, 0] => Ok(Self {
                    pos: [0; 3],
                    level: MAX_LEVEL,
                }),
                _ => Err(out_of_range),
            };
        }

        let offset = 1i64 << (31 - v.level);
        let limit = 1i64 << (32 - v.level);
        let mut pos = [0u64; 3];
        for (dst, &src) in pos.iter_mut().zip(v.pos.iter()) {
            let biased = src as i64 + offset;
            if biased < 0 || biased >= limit {
                return Err(out_of_range);
            }
            *dst = biased as u64;
        }
        Ok(Self {
            pos,
            level: v.level,
        })
    }

    /// Converts back into the public coordinate system.
    #[inline]
    pub fn to_voxel(self) -> VoxelPos {
        if self.level >= MAX_LEVEL {
            return VoxelPos {
                pos: [0; 3],
                level: MAX_LEVEL,
            };
        }
        let offset = 1i64 << (31 - self.level);
        VoxelPos {
            pos: self.pos.map(|e| (e as i64 - offset) as i32),
            level: self.level,
        }
    }

    /// gets one of the child node positions of this node, defined by its index.
    /// Bit 0 of the index selects the upper half along x, bit 1 along y, bit 2 along z.
    #[inline]
    pub fn get_child(self, index: usize) -> Self {
        debug_assert!(index < 8);
        debug_assert!(self.level > 0, "level 0 cells have no children");
        let mut pos = self.pos;
        for (axis, p) in pos.iter_mut().enumerate() {
            *p = (*p << 1) | ((index >> axis) & 1) as u64;
        }
        Self {
            pos,
            level: self.level - 1,
        }
    }

    /// The cube one level up that contains this one.
    #[inline]
    pub fn parent(self) -> Self {
        debug_assert!(self.level < MAX_LEVEL);
        Self {
            pos: self.pos.map(|e| e >> 1),
            level: self.level + 1,
        }
    }

    /// Index of this cube among the children of its parent.
    #[inline]
    pub fn index_in_parent(self) -> usize {
        self.pos
            .iter()
            .enumerate()
            .fold(0, |acc, (axis, p)| acc | (((p & 1) as usize) << axis))
    }

    /// Whether `child` is this cube or lies somewhere inside it.
    #[inline]
    pub fn contains_child_node(self, child: Self) -> bool {
        if child.level > self.level {
            return false;
        }
        // move the child up to this level and check if they're equal
        let level_difference = self.level - child.level;
        self.pos
            .iter()
            .zip(child.pos)
            .all(|(s, c)| *s == c >> level_difference)
    }

    /// Lowest corner in level-0 cells.
    #[inline]
    pub fn min_cell(self) -> [i64; 3] {
        self.pos.map(|e| ((e << self.level) as i64) - BIAS)
    }

    /// Lowest corner in world units.
    #[inline]
    pub fn min_corner(self) -> [f32; 3] {
        self.min_cell().map(|e| e as f32)
    }

    #[inline]
    pub fn center(self) -> [f32; 3] {
        let half = self.float_size() * 0.5;
        self.min_corner().map(|e| e + half)
    }

    /// Edge length in world units.
    #[inline]
    pub fn float_size(self) -> f32 {
        (1u64 << self.level) as f32
    }
}

/// Face of a cube, named by the axis and the direction its outward normal points to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    XNeg,
    XPos,
    YNeg,
    YPos,
    ZNeg,
    ZPos,
}

impl Side {
    #[inline]
    pub fn from_axis(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, false) => Side::XNeg,
            (0, true) => Side::XPos,
            (1, false) => Side::YNeg,
            (1, true) => Side::YPos,
            (2, false) => Side::ZNeg,
            (2, true) => Side::ZPos,
            _ => panic!("axis index {axis} is out of range"),
        }
    }

    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Side::XNeg | Side::XPos => 0,
            Side::YNeg | Side::YPos => 1,
            Side::ZNeg | Side::ZPos => 2,
        }
    }

    /// Outward facing unit normal of the face.
    #[inline]
    pub fn normal(self) -> [i32; 3] {
        let mut n = [0; 3];
        n[self.axis()] = match self {
            Side::XPos | Side::YPos | Side::ZPos => 1,
            _ => -1,
        };
        n
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::XNeg => Side::XPos,
            Side::XPos => Side::XNeg,
            Side::YNeg => Side::YPos,
            Side::YPos => Side::YNeg,
            Side::ZNeg => Side::ZPos,
            Side::ZPos => Side::ZNeg,
        }
    }
}

/// Half-line in world units (level-0 cell edge = 1.0). Direction does not need to be normalized,
/// all ray parameters are measured in multiples of it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: [f32; 3],
    pub direction: [f32; 3],
}

/// Below this a direction component is treated as parallel to the slab.
const PARALLEL_EPSILON: f32 = 1e-8;

impl Ray {
    #[inline]
    pub fn new(origin: [f32; 3], direction: [f32; 3]) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> [f32; 3] {
        [
            self.origin[0] + self.direction[0] * t,
            self.origin[1] + self.direction[1] * t,
            self.origin[2] + self.direction[2] * t,
        ]
    }

    /// A ray that can actually travel somewhere.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.origin.iter().chain(self.direction.iter()).all(|e| e.is_finite())
            && self.direction.iter().any(|e| e.abs() >= PARALLEL_EPSILON)
    }

    /// Slab test against the cube without tracking faces, used to reject whole subtrees.
    #[inline]
    pub fn intersects_cube(&self, min: [f32; 3], size: f32) -> bool {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let lo = min[axis];
            let hi = min[axis] + size;
            if self.direction[axis].abs() < PARALLEL_EPSILON {
                if self.origin[axis] < lo || self.origin[axis] > hi {
                    return false;
                }
                continue;
            }
            let inv_d = 1.0 / self.direction[axis];
            let t1 = (lo - self.origin[axis]) * inv_d;
            let t2 = (hi - self.origin[axis]) * inv_d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_min > t_max {
                return false;
            }
        }
        t_max >= 0.0
    }

    /// Exact slab test against the cube. Returns the entry parameter (clamped to 0 when the
    /// origin is inside) and the face the ray enters through.
    pub fn cube_entry(&self, min: [f32; 3], size: f32) -> Option<(f32, Side)> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        let mut side = None;
        for axis in 0..3 {
            let lo = min[axis];
            let hi = min[axis] + size;
            let d = self.direction[axis];
            if d.abs() < PARALLEL_EPSILON {
                if self.origin[axis] < lo || self.origin[axis] > hi {
                    return None;
                }
                continue;
            }
            let inv_d = 1.0 / d;
            let mut t1 = (lo - self.origin[axis]) * inv_d;
            let mut t2 = (hi - self.origin[axis]) * inv_d;
            // travelling towards +axis we come in through the face with the -axis normal
            let entered = Side::from_axis(axis, d < 0.0);
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            if t1 > t_min {
                t_min = t1;
                side = Some(entered);
            }
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
        if t_max < 0.0 {
            return None;
        }
        Some((t_min.max(0.0), side?))
    }

    /// Entry parameter into a sphere, clamped to 0 when the origin is inside.
    #[inline]
    pub fn sphere_entry(&self, center: [f32; 3], radius: f32) -> Option<f32> {
        let oc = [
            self.origin[0] - center[0],
            self.origin[1] - center[1],
            self.origin[2] - center[2],
        ];
        let a = dot(self.direction, self.direction);
        let b = dot(oc, self.direction);
        let c = dot(oc, oc) - radius * radius;
        let discriminant = b * b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sq = discriminant.sqrt();
        if (-b + sq) / a < 0.0 {
            // sphere is entirely behind the origin
            return None;
        }
        Some(((-b - sq) / a).max(0.0))
    }
}

#[inline]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Result of a successful ray cast.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HitResult<T> {
    /// Cell that was struck, at the level requested for the cast.
    pub position: VoxelPos,
    /// Value stored in the struck cube.
    pub value: T,
    /// Face of the struck cube the ray entered through.
    pub side: Side,
    /// Ray parameter of the entry point.
    pub distance: f32,
}
