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

//! Sorting networks for up to 8 elements, one per child of an octree node.
//!
//! Each network is a fixed list of compare-exchange steps with the minimal known
//! comparator count for its size, so there is no branching on the input length inside the loop.

/// Longest slice the networks can sort.
pub const MAX_SORT_LEN: usize = 8;

#[inline(always)]
fn compare_exchange<T, F>(v: &mut [T], a: usize, b: usize, less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    if less(&v[b], &v[a]) {
        v.swap(a, b);
    }
}

duplicate::duplicate! {
    [
        network       pairs;
        [network_2]   [[(0, 1)]];
        [network_3]   [[(1, 2), (0, 2), (0, 1)]];
        [network_4]   [[(0, 1), (2, 3), (0, 2), (1, 3), (1, 2)]];
        [network_5]   [[(0, 1), (3, 4), (2, 4), (2, 3), (0, 3), (0, 2), (1, 4), (1, 3), (1, 2)]];
        [network_6]   [[(1, 2), (0, 2), (0, 1), (4, 5), (3, 5), (3, 4), (0, 3), (1, 4), (2, 5), (2, 4), (1, 3), (2, 3)]];
        [network_7]   [[(1, 2), (0, 2), (0, 1), (3, 4), (5, 6), (3, 5), (4, 6), (4, 5), (0, 4), (0, 3), (1, 5), (2, 6), (2, 5), (1, 3), (2, 4), (2, 3)]];
        [network_8]   [[(0, 1), (2, 3), (4, 5), (6, 7), (0, 2), (1, 3), (4, 6), (5, 7), (1, 2), (5, 6), (0, 4), (3, 7), (1, 5), (2, 6), (1, 4), (3, 6), (2, 4), (3, 5), (3, 4)]];
    ]
    #[inline]
    fn network<T, F>(v: &mut [T], less: &mut F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        for &(a, b) in pairs.iter() {
            compare_exchange(v, a, b, less);
        }
    }
}

/// Sorts up to [`MAX_SORT_LEN`] elements in place with a sorting network,
/// using `less` as the strict "goes before" relation. Not stable.
///
/// Panics if the slice is longer than [`MAX_SORT_LEN`].
pub fn sort_small_by<T, F>(v: &mut [T], mut less: F)
where
    F: FnMut(&T, &T) -> bool,
{
    match v.len() {
        0 | 1 => {}
        2 => network_2(v, &mut less),
        3 => network_3(v, &mut less),
        4 => network_4(v, &mut less),
        5 => network_5(v, &mut less),
        6 => network_6(v, &mut less),
        7 => network_7(v, &mut less),
        8 => network_8(v, &mut less),
        n => panic!("sorting networks cover at most {MAX_SORT_LEN} elements, got {n}"),
    }
}

/// Sorts up to [`MAX_SORT_LEN`] elements in ascending order.
#[inline]
pub fn sort_small<T: Ord>(v: &mut [T]) {
    sort_small_by(v, |a, b| a < b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// By the 0-1 principle a network that sorts every binary input sorts everything.
    #[test]
    fn networks_sort_all_binary_inputs() {
        for n in 0..=MAX_SORT_LEN {
            for mask in 0u32..(1 << n) {
                let mut v: Vec<u8> = (0..n).map(|i| ((mask >> i) & 1) as u8).collect();
                sort_small(&mut v);
                assert!(
                    v.windows(2).all(|w| w[0] <= w[1]),
                    "network for {n} elements failed on {mask:b}"
                );
            }
        }
    }

    #[test]
    fn matches_std_sort() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let n = rng.random_range(0..=MAX_SORT_LEN);
            let mut v: Vec<u16> = (0..n).map(|_| rng.random_range(0..6)).collect();
            let mut expected = v.clone();
            expected.sort();
            sort_small(&mut v);
            assert_eq!(v, expected);
        }
    }

    #[test]
    fn sort_by_key_pairs() {
        let mut v = [(2.5f32, 0usize), (0.5, 1), (1.5, 2)];
        sort_small_by(&mut v, |a, b| a.0 < b.0);
        assert_eq!(v.map(|e| e.1), [1, 2, 0]);
    }

    #[test]
    #[should_panic(expected = "sorting networks cover at most 8 elements")]
    fn too_long_panics() {
        let mut v = [0u8; 9];
        sort_small(&mut v);
    }
}
