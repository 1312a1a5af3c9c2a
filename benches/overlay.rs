use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imagefilter::sdk::loopback::fill_test_pattern;
use imagefilter::{Crosshair, FrameMetadata};

fn crosshair_benchmark(c: &mut Criterion) {
    let crosshair = Crosshair::default();

    for (name, metadata) in [
        ("crosshair_720p", FrameMetadata::new(1280, 720, 0)),
        ("crosshair_1080p_padded", FrameMetadata::new(1920, 1080, 64)),
    ] {
        let mut frame = vec![0u8; metadata.frame_size()];
        fill_test_pattern(&mut frame, &metadata, 0);

        c.bench_function(name, |b| {
            b.iter(|| crosshair.draw(black_box(&mut frame), black_box(&metadata)))
        });
    }
}

criterion_group!(benches, crosshair_benchmark);
criterion_main!(benches);
