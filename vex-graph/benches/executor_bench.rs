//! End-to-end compress/decompress throughput through a small
//! delta-then-store graph, at a few input sizes.

use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use vex_core::stream::{StreamType, TypeMask, TypedStream};
use vex_graph::codecs::delta::Delta;
use vex_graph::codecs::store::Store;
use vex_graph::compressor::Compressor;
use vex_graph::graph::{GraphDescriptor, GraphId, GraphKind, Successor};
use vex_graph::node::{NodeDescriptor, NodeId, NodeKind};
use vex_graph::params::Parameters;
use vex_graph::registry::Registry;

const DELTA_NODE: NodeId = NodeId(1);
const STORE_NODE: NodeId = NodeId(2);
const STORE_GRAPH: GraphId = GraphId(1);
const DELTA_GRAPH: GraphId = GraphId(2);

fn build_compressor() -> Compressor {
    let mut registry = Registry::new();
    registry
        .register_node(NodeDescriptor::new(
            STORE_NODE,
            "store",
            1,
            TypeMask::all(),
            vec![],
            1,
            NodeKind::Leaf(Rc::new(Store)),
        ))
        .unwrap();
    registry
        .register_graph(GraphDescriptor::new(
            STORE_GRAPH,
            "store_graph",
            TypeMask::all(),
            GraphKind::Static(Successor {
                node: STORE_NODE,
                next: vec![],
            }),
        ))
        .unwrap();
    registry
        .register_node(NodeDescriptor::new(
            DELTA_NODE,
            "delta",
            1,
            TypeMask::NUMERIC,
            vec![StreamType::Numeric],
            1,
            NodeKind::Transform(Rc::new(Delta)),
        ))
        .unwrap();
    registry
        .register_graph(GraphDescriptor::new(
            DELTA_GRAPH,
            "delta_graph",
            TypeMask::NUMERIC,
            GraphKind::Static(Successor {
                node: DELTA_NODE,
                next: vec![STORE_GRAPH],
            }),
        ))
        .unwrap();

    let params = Parameters::new().with_format_version(1).unwrap();
    Compressor::new(registry, params)
}

fn numeric_stream(n: usize) -> TypedStream {
    let s = TypedStream::create(StreamType::Numeric, 4).unwrap();
    s.reserve(n).unwrap();
    for i in 0..n {
        s.write_bytes(&(i as u32).to_le_bytes()).unwrap();
    }
    s.commit(n).unwrap();
    s
}

fn bench_roundtrip(c: &mut Criterion) {
    let compressor = build_compressor();
    let mut group = c.benchmark_group("executor_roundtrip");
    for &n in &[64usize, 1024, 16384] {
        let stream = numeric_stream(n);
        group.throughput(Throughput::Bytes((n * 4) as u64));
        group.bench_with_input(BenchmarkId::new("compress", n), &stream, |b, stream| {
            b.iter(|| {
                let bytes = compressor.compress(DELTA_GRAPH, stream.clone()).unwrap();
                black_box(bytes);
            });
        });

        let bytes = compressor.compress(DELTA_GRAPH, stream.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("decompress", n), &bytes, |b, bytes| {
            b.iter(|| {
                let out = compressor.decompress(black_box(bytes)).unwrap();
                black_box(out);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
