/* Generic sparse voxel octree with level of detail and ray casting.
 * Copyright (C) 2023  Alexander Pyattaev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use svotree::sort::*;

const N_ARRAYS: usize = 1000;

fn random_arrays(len: usize) -> Vec<[u16; MAX_SORT_LEN]> {
    let mut rng = SmallRng::seed_from_u64(42);
    (0..N_ARRAYS)
        .map(|_| {
            let mut a = [0u16; MAX_SORT_LEN];
            for e in a.iter_mut().take(len) {
                *e = rng.random_range(0..8);
            }
            a
        })
        .collect()
}

pub fn small_sorts(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorting network");
    for len in [3usize, 5, 8] {
        group.significance_level(0.1).sample_size(100);
        let arrays = random_arrays(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                for a in arrays.iter() {
                    let mut a = *a;
                    sort_small(&mut a[..len]);
                    black_box(a);
                }
            });
        });
    }
    group.finish();

    let mut group = c.benchmark_group("slice sort_unstable");
    for len in [3usize, 5, 8] {
        group.significance_level(0.1).sample_size(100);
        let arrays = random_arrays(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                for a in arrays.iter() {
                    let mut a = *a;
                    a[..len].sort_unstable();
                    black_box(a);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, small_sorts);
criterion_main!(benches);
