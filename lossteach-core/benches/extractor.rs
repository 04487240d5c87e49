use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lossteach_core::{AnalysisConfig, Deadline, ExtractOptions, FragmentExtractor, RawDetections};
use ndarray::{s, Array1, Array2, ArrayD, IxDyn};

fn detections(n: usize) -> RawDetections {
    let mut boxes = Array2::<f32>::zeros((n, 4));
    let mut masks = ArrayD::<f32>::zeros(IxDyn(&[n, 1, 512, 512]));
    for i in 0..n {
        let origin = (i * 37) % 448;
        let (x1, y1) = (origin as f32, origin as f32);
        boxes
            .row_mut(i)
            .assign(&Array1::from_vec(vec![x1, y1, x1 + 60.0, y1 + 40.0]));
        masks
            .slice_mut(s![i, 0, origin..origin + 40, origin..origin + 60])
            .fill(0.9);
    }
    RawDetections::new(boxes, Array1::from_elem(n, 0.9), masks)
}

fn benchmark_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let options = ExtractOptions {
        include_mask: true,
        include_metrics: true,
        ..ExtractOptions::default()
    };

    for &n in &[8usize, 32] {
        let raw = detections(n);
        for parallel in [false, true] {
            let extractor = FragmentExtractor::new(AnalysisConfig {
                parallel_instances: parallel,
                ..AnalysisConfig::default()
            });
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, n), &raw, |b, raw| {
                b.iter(|| {
                    let _ = extractor.analyze(black_box(raw), &options, &Deadline::unbounded());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_extract);
criterion_main!(benches);
