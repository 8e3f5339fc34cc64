use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashMap;
use workcell_core::models::{Location, TransferCapabilities, TransferTemplate};
use workcell_core::transfer::{plan_on_graph, TransferGraph, TransferPlannerConfig};

/// A deck of `rows` x `columns` slots; one gantry serves every slot in a row
/// and an arm links vertically adjacent slots.
fn deck(rows: usize, columns: usize) -> (Vec<Location>, TransferCapabilities) {
    let id = |row: usize, column: usize| format!("slot_{row}_{column}");
    let mut locations = Vec::new();
    let mut capabilities = TransferCapabilities::default();

    for row in 0..rows {
        for column in 0..columns {
            locations.push(
                Location::new(id(row, column), id(row, column))
                    .with_representation(format!("gantry_{row}"), serde_json::json!([row, column])),
            );
            if row + 1 < rows {
                capabilities = capabilities.with_pair_override(
                    id(row, column),
                    id(row + 1, column),
                    TransferTemplate::new("arm", "transfer", 2.0),
                );
            }
        }
        capabilities = capabilities.with_template(TransferTemplate::new(format!("gantry_{row}"), "move", 1.0));
    }
    (locations, capabilities)
}

fn benchmark_graph_build(c: &mut Criterion) {
    let (locations, capabilities) = deck(6, 8);
    c.bench_function("transfer_graph_build_48", |b| {
        b.iter(|| TransferGraph::build(black_box(&locations), black_box(&capabilities)))
    });
}

fn benchmark_plan(c: &mut Criterion) {
    let (locations, capabilities) = deck(6, 8);
    let graph = TransferGraph::build(&locations, &capabilities).expect("valid deck");
    let utilization: HashMap<usize, f64> = (0..graph.vertex_count()).map(|v| (v, (v % 5) as f64 / 5.0)).collect();
    let config = TransferPlannerConfig::default();

    c.bench_function("transfer_plan_corner_to_corner", |b| {
        b.iter(|| {
            plan_on_graph(
                black_box(&graph),
                "slot_0_0",
                "slot_5_7",
                black_box(&utilization),
                &config,
            )
        })
    });
}

criterion_group!(benches, benchmark_graph_build, benchmark_plan);
criterion_main!(benches);
