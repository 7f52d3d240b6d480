use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use heic_raster::image_pipeline::{
    EncodeOptions, ImageWriter, MetadataBundle, MetadataKind, OutputFormat, RawImageBuffer,
    StandardImageWriter,
};
use std::io::Cursor;

fn generate_rgb(width: u32, height: u32) -> RawImageBuffer {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
    }
    RawImageBuffer::new(width, height, 3, 8, data).expect("valid synthetic buffer")
}

fn benchmark_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_by_format");
    let writer = StandardImageWriter::new();
    let image = generate_rgb(500, 500);

    for format in writer.supported_formats() {
        let options = EncodeOptions::builder().format(format).build();
        group.bench_with_input(BenchmarkId::from_parameter(format), &image, |b, image| {
            b.iter(|| {
                let mut output = Cursor::new(Vec::new());
                let _ = writer.write_image(black_box(image), &mut output, &options);
            });
        });
    }

    group.finish();
}

fn benchmark_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("bmp_by_size");
    let writer = StandardImageWriter::new();
    let options = EncodeOptions::builder().format(OutputFormat::Bmp).build();

    for (width, height, label) in [(100, 100, "100x100"), (500, 500, "500x500"), (1000, 1000, "1000x1000")] {
        let image = generate_rgb(width, height);
        group.bench_with_input(BenchmarkId::from_parameter(label), &image, |b, image| {
            b.iter(|| {
                let mut output = Cursor::new(Vec::new());
                let _ = writer.write_image(black_box(image), &mut output, &options);
            });
        });
    }

    group.finish();
}

fn benchmark_compression_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression_levels");
    let writer = StandardImageWriter::new();
    let image = generate_rgb(500, 500);

    for format in [OutputFormat::Png, OutputFormat::Tiff] {
        if !writer.capabilities().is_supported(format) {
            continue;
        }
        for level in [0, 3, 6, 9] {
            let options = EncodeOptions::builder()
                .format(format)
                .compression_level(level)
                .build();
            group.bench_with_input(
                BenchmarkId::new(format.name(), level),
                &image,
                |b, image| {
                    b.iter(|| {
                        let mut output = Cursor::new(Vec::new());
                        let _ = writer.write_image(black_box(image), &mut output, &options);
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_metadata_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_overhead");
    let writer = StandardImageWriter::new();
    let image = generate_rgb(500, 500);
    let bundle = MetadataBundle::new()
        .with_block(MetadataKind::Exif, vec![0x2A; 16 * 1024])
        .with_block(MetadataKind::Xmp, vec![b' '; 8 * 1024]);

    for (label, metadata) in [("without_metadata", MetadataBundle::new()), ("with_metadata", bundle)] {
        let options = EncodeOptions::builder()
            .format(OutputFormat::Jpeg)
            .metadata(metadata)
            .build();
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut output = Cursor::new(Vec::new());
                let _ = writer.write_image(black_box(&image), &mut output, &options);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_formats,
    benchmark_sizes,
    benchmark_compression_levels,
    benchmark_metadata_overhead
);
criterion_main!(benches);
