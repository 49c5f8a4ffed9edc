use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use zoekt_merge::{
    merge, write_atomically, Document, IndexBuilder, MergeOptions, RepoMeta, ShardReader,
    WriteShard,
};

fn sample_shard(dir: &std::path::Path, name: &str, repo: &str) -> std::path::PathBuf {
    let meta = RepoMeta::new(repo);
    let mut ib = IndexBuilder::new(&meta).expect("builder");
    ib.set_repository(&meta).expect("repository");
    for i in 0..200 {
        let content = format!(
            "// file {i}\nfn handler_{i}(req: Request) -> Response {{\n    route(req, \"{repo}\")\n}}\n"
        );
        ib.add(Document::new(format!("src/h{i}.rs"), content))
            .expect("add");
    }
    write_atomically(dir, name, &ib, &MergeOptions::default())
        .expect("write")
        .path
}

fn merge_bench(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = [
        sample_shard(dir.path(), "a.zoekt", "a"),
        sample_shard(dir.path(), "b.zoekt", "b"),
        sample_shard(dir.path(), "c.zoekt", "c"),
    ];
    let shards: Vec<ShardReader> = paths
        .iter()
        .map(|p| ShardReader::open(p).expect("open"))
        .collect();

    c.bench_function("merge_three_shards", |b| {
        b.iter(|| merge(black_box(&shards)).expect("merge"))
    });

    let merged = merge(&shards).expect("merge");
    c.bench_function("serialize_merged_shard", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            merged.write_shard(&mut out).expect("serialize");
            black_box(out.len())
        })
    });
}

criterion_group!(benches, merge_bench);
criterion_main!(benches);
