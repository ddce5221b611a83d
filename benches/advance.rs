//! Benchmarks for one `Show::advance` frame of the finale.
//!
//! Run:
//! - cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use show_wasm::Show;

const ENTITY_COUNTS: [usize; 2] = [1024, 4096];
const FRAME_DT: f32 = 1.0 / 60.0;

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    for count in ENTITY_COUNTS {
        for parallel in [false, true] {
            let mut show = Show::finale(count, 7).expect("finale loads");
            show.set_parallel(parallel);
            let end = show.show_end_time();
            let mut time = 0.0_f32;

            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, _| {
                b.iter(|| {
                    time = (time + FRAME_DT) % end;
                    show.advance(black_box(time));
                    black_box(show.output().positions[0]);
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_advance);
criterion_main!(benches);
