use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, RgbImage, RgbaImage};
use lazy_thumbnail::engine::{
    process, resolve_jpeg_shrink, resolve_shrink, FirPixelOps, Frame, Source, ThumbnailConfig,
    Thumbnailer,
};
use lazy_thumbnail::ops::{FitMode, RequestContext, ThumbnailQuery};
use std::hint::black_box;

fn create_jpeg(width: u32, height: u32) -> Vec<u8> {
    use mozjpeg::{ColorSpace, Compress};

    let rgb = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(85.0);

    let mut output = Vec::new();
    let mut writer = comp.start_compress(&mut output).unwrap();
    for row in rgb.as_raw().chunks(width as usize * 3) {
        writer.write_scanlines(row).unwrap();
    }
    writer.finish().unwrap();
    output
}

fn bench_planning(c: &mut Criterion) {
    let config = ThumbnailConfig::default();
    let query = ThumbnailQuery::new(400, 300).with_fit(FitMode::Crop);

    c.bench_function("resolve_shrink", |b| {
        b.iter(|| resolve_shrink(black_box(6000), black_box(4000), black_box(&query)))
    });
    c.bench_function("resolve_jpeg_shrink", |b| {
        b.iter(|| {
            resolve_jpeg_shrink(black_box(6000), black_box(4000), black_box(&query), &config)
        })
    });
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process");
    let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1024, 768, image::Rgba([40, 80, 120, 200])));

    for target in [128u32, 512] {
        group.bench_with_input(BenchmarkId::new("rgba_1024x768", target), &target, |b, &t| {
            b.iter(|| {
                let mut ctx = RequestContext::new(ThumbnailQuery::new(t, 0));
                process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, Frame::new(rgba.clone()))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_thumbnail(c: &mut Criterion) {
    let mut group = c.benchmark_group("thumbnail_jpeg_3000x2000");
    group.sample_size(20);
    let source = Source::from_bytes(create_jpeg(3000, 2000));
    let thumbnailer = Thumbnailer::default();

    for fast in [true, false] {
        let label = if fast { "fast" } else { "conservative" };
        group.bench_function(label, |b| {
            b.iter(|| {
                let query = ThumbnailQuery::new(200, 0).with_fast_shrink_on_load(fast);
                let mut ctx = RequestContext::new(query);
                thumbnailer.thumbnail(&mut ctx, black_box(&source)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_planning, bench_process, bench_thumbnail);
criterion_main!(benches);
