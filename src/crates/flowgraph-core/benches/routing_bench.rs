use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowgraph_core::{
    DynamicRouter, Expression, GraphBuilder, GraphExecutor, NodeOutput, Predicate,
    RouteCondition, RoutingStrategy,
};
use flowgraph_state::{InMemoryStateStore, StateModifier, WorkflowState};
use serde_json::{json, Map};
use std::sync::Arc;

fn sample_state() -> WorkflowState {
    WorkflowState::from_value(json!({
        "priority": "high",
        "score": 0.92,
        "items": [1, 2, 3, 4],
        "customer": {"tier": "gold"}
    }))
    .unwrap()
}

fn expression_benchmark(c: &mut Criterion) {
    let expr = Expression::parse(
        "state.priority == \"high\" and len(state.items) > 2 and state.customer.tier in [\"gold\", \"platinum\"]",
    )
    .unwrap();
    let state = sample_state();

    c.bench_function("expression evaluate", |b| {
        b.iter(|| expr.evaluate(black_box(&state)).unwrap());
    });

    c.bench_function("expression parse", |b| {
        b.iter(|| Expression::parse(black_box("state.score >= 0.8 or not state.customer.tier == \"basic\"")).unwrap());
    });
}

fn router_benchmark(c: &mut Criterion) {
    let mut router = DynamicRouter::new("bench", RoutingStrategy::Priority).with_default("fallback");
    for i in 0..16 {
        let predicate = Predicate::expression(&format!("len(state.items) > {}", i % 6)).unwrap();
        router.add_rule(
            RouteCondition::new(format!("rule-{}", i), predicate, format!("target-{}", i))
                .with_priority(i % 4),
        );
    }
    let state = sample_state();

    c.bench_function("priority route 16 rules", |b| {
        b.iter(|| router.route(black_box(&state)));
    });
}

fn step(state: WorkflowState) -> futures::future::Ready<NodeOutput> {
    let n = state.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
    let mut update = Map::new();
    update.insert("n".to_string(), json!(n + 1));
    futures::future::ready(Ok(update))
}

fn executor_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut builder = GraphBuilder::new();
    let names: Vec<String> = (0..10).map(|i| format!("n{}", i)).collect();
    for name in &names {
        builder.add_node(name.as_str(), step).unwrap();
    }
    for pair in names.windows(2) {
        builder.add_edge(pair[0].as_str(), pair[1].as_str()).unwrap();
    }
    builder.set_entry_point("n0").unwrap();
    let graph = Arc::new(builder.build().unwrap());

    c.bench_function("invoke 10-node chain", |b| {
        b.to_async(&runtime).iter(|| async {
            let modifier = StateModifier::new(Arc::new(InMemoryStateStore::new()));
            let executor = GraphExecutor::new(graph.clone(), modifier);
            executor
                .invoke("bench-thread", black_box(WorkflowState::new()))
                .await
                .unwrap();
        });
    });
}

criterion_group!(benches, expression_benchmark, router_benchmark, executor_benchmark);
criterion_main!(benches);
