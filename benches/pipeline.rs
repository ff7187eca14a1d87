use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mermaid_fallback::config::LayoutConfig;
use mermaid_fallback::engine::{EngineError, PrimaryEngine};
use mermaid_fallback::extract::extract_graph;
use mermaid_fallback::fallback::Orchestrator;
use mermaid_fallback::layout::compute_layout;
use mermaid_fallback::render::render_graph_svg;
use mermaid_fallback::repair::validate_and_sanitize;
use mermaid_fallback::theme::Theme;
use std::hint::black_box;

/// Flowchart with the kinds of damage model output usually has, repeated `blocks` times.
fn damaged_flowchart_source(blocks: usize) -> String {
    let mut out = String::new();
    for i in 0..blocks {
        out.push_str(&format!("N{i}a[**Step {i}**]N{i}b[Check 🎯] --> N{i}c[Done\n"));
        out.push_str(&format!("N{i}c -->|ok|N{i}d[Next]\n"));
        out.push_str(&format!("N{i}d --> N{i}e --> N{i}a\n"));
        out.push_str("-->\n");
    }
    out
}

struct Rejecting;

impl PrimaryEngine for Rejecting {
    async fn render(&self, _unique_id: &str, _diagram_text: &str) -> Result<String, EngineError> {
        Err(EngineError::Rejected("Parse error".to_string()))
    }
}

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair");
    for blocks in [1usize, 10, 100] {
        let input = damaged_flowchart_source(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &input, |b, data| {
            b.iter(|| {
                let sanitized = validate_and_sanitize(black_box(data));
                black_box(sanitized.repairs.len());
            });
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    for blocks in [1usize, 10, 100] {
        let input = damaged_flowchart_source(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &input, |b, data| {
            b.iter(|| {
                let graph = extract_graph(black_box(data));
                black_box(graph.node_count());
            });
        });
    }
    group.finish();
}

fn bench_generic_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("generic_view");
    let theme = Theme::modern();
    let config = LayoutConfig::default();
    for blocks in [1usize, 10, 100] {
        let graph = extract_graph(&damaged_flowchart_source(blocks));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &graph, |b, graph| {
            b.iter(|| {
                let positioned = compute_layout(black_box(graph.clone()), &config);
                black_box(render_graph_svg(&positioned, &theme, &config).len());
            });
        });
    }
    group.finish();
}

fn bench_fallback_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_chain");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    for blocks in [1usize, 10] {
        let input = damaged_flowchart_source(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &input, |b, data| {
            let orchestrator = Orchestrator::new(Rejecting);
            b.iter(|| {
                let rendered = runtime.block_on(orchestrator.render(black_box(data)));
                black_box(rendered.map(|r| r.kind()));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_repair,
    bench_extract,
    bench_generic_view,
    bench_fallback_chain
);
criterion_main!(benches);
