//! Benchmarks for metadata rewrites.
//!
//! Measures how rewrite time scales with entry count and entry size, since
//! every rewrite copies the whole archive.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use serde_json::json;
use std::hint::black_box;
use std::path::PathBuf;
use tempfile::TempDir;
use zipper_core::ArchiveSession;
use zipper_core::MetadataTarget;
use zipper_core::MetadataUpdate;
use zipper_core::OpenMode;
use zipper_core::ZipperConfig;
use zipper_core::rewrite_metadata;

/// Creates an archive of `count` stored entries of `size` bytes each.
fn create_archive(temp: &TempDir, count: usize, size: usize) -> PathBuf {
    let path = temp.path().join(format!("bench_{count}_{size}.zip"));
    let config = ZipperConfig::default().with_compression_level(0);
    let content = vec![0xAB_u8; size];

    ArchiveSession::scoped(&path, OpenMode::Write, &config, |zip| {
        for i in 0..count {
            zip.add_bytes(&format!("file_{i:05}.bin"), &content, Some(&json!({"i": i})))?;
        }
        zip.set_archive_metadata(&json!({"bench": true}))
    })
    .unwrap();
    path
}

fn bench_rewrite_many_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite_many_entries");

    for count in [10, 100, 1000] {
        let temp = TempDir::new().unwrap();
        let path = create_archive(&temp, count, 1024);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &path, |b, path| {
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                rewrite_metadata(
                    black_box(path),
                    &MetadataTarget::Archive,
                    &MetadataUpdate::Set(json!({"bench": flip})),
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_rewrite_large_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite_large_entry");
    group.sample_size(20);

    for size_mb in [1, 10] {
        let temp = TempDir::new().unwrap();
        let path = create_archive(&temp, 1, size_mb * 1024 * 1024);
        group.throughput(Throughput::Bytes((size_mb * 1024 * 1024) as u64));

        group.bench_with_input(BenchmarkId::new("mb", size_mb), &path, |b, path| {
            b.iter(|| {
                rewrite_metadata(
                    black_box(path),
                    &MetadataTarget::entry("file_00000.bin"),
                    &MetadataUpdate::Clear,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rewrite_many_entries, bench_rewrite_large_entry);
criterion_main!(benches);
