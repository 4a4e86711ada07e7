use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use csvdata::query::{run_query, FilterSpec, LinkBase, Operator, RowQuery, SortOrder};
use csvdata::storage::{Row, Table};

const ROLES: [&str; 4] = ["admin", "viewer", "editor", "ops"];

fn gen_table(n: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let header: Vec<String> = ["id", "name", "role", "score", "joined"].iter().map(|s| s.to_string()).collect();
    let rows: Vec<Row> = (0..n)
        .map(|i| {
            let mut r = Row::new();
            r.insert("id".into(), format!("{:08x}", rng.gen::<u32>()));
            r.insert("name".into(), format!("agent-{}", i));
            r.insert("role".into(), ROLES[rng.gen_range(0..ROLES.len())].to_string());
            r.insert("score".into(), format!("{:.1}", rng.gen_range(0.0..100.0)));
            r.insert("joined".into(), format!("2024-{:02}-{:02}", rng.gen_range(1..13), rng.gen_range(1..29)));
            r
        })
        .collect();
    Table::new(header, rows)
}

fn bench_pipeline(c: &mut Criterion) {
    let ns = [10_000usize, 100_000usize];
    let base = LinkBase::new("/datasets/agents/rows", None);
    let mut group = c.benchmark_group("query_pipeline");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &ns {
        let table = gen_table(n, 0xC5D_A7A);
        group.throughput(Throughput::Elements(n as u64));

        let search = RowQuery { search: Some("agent-9".into()), ..RowQuery::default() };
        group.bench_with_input(BenchmarkId::new("search", n), &search, |b, q| {
            b.iter(|| criterion::black_box(run_query(table.clone(), q, &base)));
        });

        let contains = RowQuery { filter: Some(FilterSpec::new("role", Operator::Contains, "ad")), ..RowQuery::default() };
        group.bench_with_input(BenchmarkId::new("filter_contains", n), &contains, |b, q| {
            b.iter(|| criterion::black_box(run_query(table.clone(), q, &base)));
        });

        let numeric = RowQuery { filter: Some(FilterSpec::new("score", Operator::Gt, "50")), ..RowQuery::default() };
        group.bench_with_input(BenchmarkId::new("filter_gt", n), &numeric, |b, q| {
            b.iter(|| criterion::black_box(run_query(table.clone(), q, &base)));
        });

        let dated = RowQuery { filter: Some(FilterSpec::new("joined", Operator::DateAfter, "2024-06-01")), ..RowQuery::default() };
        group.bench_with_input(BenchmarkId::new("filter_date_after", n), &dated, |b, q| {
            b.iter(|| criterion::black_box(run_query(table.clone(), q, &base)));
        });

        let sorted = RowQuery { sort_by: Some("score".into()), sort_order: SortOrder::Desc, offset: n / 2, ..RowQuery::default() };
        group.bench_with_input(BenchmarkId::new("sort_desc_mid_page", n), &sorted, |b, q| {
            b.iter(|| criterion::black_box(run_query(table.clone(), q, &base)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
