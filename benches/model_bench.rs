use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use emodel::nodes::{BinaryOperation, BinaryOperationNode, ConstantNode, InputNode, MovingAverageNode, OutputNode};
use emodel::*;

// Latency of the graph operations a map build runs on every pass.

/// `input → (add constant)^depth → moving average → output`.
fn chain_model(depth: usize) -> (Model, NodeId, PortElements) {
    let mut model = Model::new();
    let input = model.add_node(InputNode::<f64>::new(8)).unwrap();
    let input_id = input.id();
    let mut current = PortElements::from(input.output());
    for i in 0..depth {
        let constant = model.add_node(ConstantNode::new(vec![i as f64; 8])).unwrap();
        let constant = PortElements::from(constant.output());
        let add = model
            .add_node(BinaryOperationNode::<f64>::new(current, constant, BinaryOperation::Add).unwrap())
            .unwrap();
        current = PortElements::from(add.output());
    }
    let average = model.add_node(MovingAverageNode::<f64>::new(current, 4).unwrap()).unwrap();
    let average = PortElements::from(average.output());
    let output = model.add_node(OutputNode::<f64>::new(average)).unwrap();
    let output = PortElements::from(output.output());
    (model, input_id, output)
}

fn bench_visit_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("model/visit_order");
    for depth in [16, 128, 1024] {
        let (model, _, _) = chain_model(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &model, |b, model| {
            b.iter(|| black_box(model.visit_order(&[]).unwrap()));
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("model/build");
    for depth in [512, 2048, 8192] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| black_box(chain_model(depth).0.size()));
        });
    }
    group.finish();
}

fn bench_copy_and_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("model/transform");
    for depth in [16, 128] {
        let (model, _, _) = chain_model(depth);
        group.bench_with_input(BenchmarkId::new("copy", depth), &model, |b, model| {
            b.iter(|| {
                let mut transformer = ModelTransformer::new(TransformContext::new());
                black_box(transformer.copy_model(model).unwrap())
            });
        });
        group.bench_with_input(BenchmarkId::new("refine", depth), &model, |b, model| {
            b.iter(|| {
                let mut transformer = ModelTransformer::new(TransformContext::new());
                black_box(transformer.refine_model(model, 10).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_map_compute(c: &mut Criterion) {
    let (model, input, output) = chain_model(64);
    let mut map = Map::new(&model, &[("x", input)], &[("y", output)]).unwrap();
    let samples = vec![1.0f64; 8];
    c.bench_function("map/compute", |b| {
        b.iter(|| {
            map.set_input_value("x", black_box(&samples)).unwrap();
            black_box(map.compute_output::<f64>("y").unwrap())
        });
    });

    c.bench_function("map/build_and_refine", |b| {
        b.iter_batched(
            || Map::new(&model, &[("x", input)], &[("y", output.clone())]).unwrap(),
            |mut map| {
                map.refine(&TransformContext::new()).unwrap();
                black_box(map.model().size())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_visit_order, bench_build, bench_copy_and_refine, bench_map_compute);
criterion_main!(benches);
