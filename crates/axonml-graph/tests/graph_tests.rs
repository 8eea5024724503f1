//! Graph construction through the public API.

use axonml_graph::{
    Activation, BinaryOp, Conv2dParams, DataType, Graph, GraphError, OpKind, OpType, TensorAttr,
    TensorSpec,
};

#[test]
fn test_build_small_network() {
    let mut graph = Graph::new();
    let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 3, 8, 8]).as_input());
    let w = graph.create_tensor(TensorSpec::new(DataType::F32, &[4, 3, 1, 1]).as_constant());
    let c = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 4, 8, 8]));
    let r = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 4, 8, 8]));
    let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 4, 8, 8]).as_output());

    let conv = graph.create_operation(OpKind::Conv2d(Conv2dParams::default()));
    graph.bind_inputs(conv, &[x, w]).unwrap();
    graph.bind_output(conv, c).unwrap();
    let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
    graph.bind_input(relu, c).unwrap();
    graph.bind_output(relu, r).unwrap();
    let add = graph.create_operation(OpKind::Binary(BinaryOp::Add));
    graph.bind_inputs(add, &[c, r]).unwrap();
    graph.bind_output(add, y).unwrap();

    graph.validate().unwrap();
    assert_eq!(graph.inputs(), &[x]);
    assert_eq!(graph.outputs(), &[y]);
    assert_eq!(graph.constants(), vec![w]);
    assert_eq!(graph.consumers(c).unwrap(), &[relu, add]);
    assert_eq!(graph.producer(y).unwrap(), Some(add));
    assert_eq!(
        graph.op_types().unwrap(),
        vec![OpType::Conv2d, OpType::Activation, OpType::Binary]
    );
    assert_eq!(graph.count_ops(OpType::Activation), 1);
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.num_tensors(), 5);
}

#[test]
fn test_topological_order_ignores_creation_order() {
    let mut graph = Graph::new();
    let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_input());
    let a = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]));
    let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_output());

    // Consumer created before its producer.
    let second = graph.create_operation(OpKind::Activation(Activation::Tanh));
    graph.bind_input(second, a).unwrap();
    graph.bind_output(second, y).unwrap();
    let first = graph.create_operation(OpKind::Activation(Activation::Relu));
    graph.bind_input(first, x).unwrap();
    graph.bind_output(first, a).unwrap();

    assert_eq!(graph.topological_order().unwrap(), vec![first, second]);
}

#[test]
fn test_graph_input_cannot_be_produced() {
    let mut graph = Graph::new();
    let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_input());
    let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_output());
    let op = graph.create_operation(OpKind::Activation(Activation::Relu));
    graph.bind_input(op, y).unwrap();
    graph.bind_output(op, x).unwrap();

    assert!(matches!(graph.validate(), Err(GraphError::InvalidGraph(_))));
}

#[test]
fn test_register_output_keeps_order() {
    let mut graph = Graph::new();
    let a = graph.create_tensor(TensorSpec::new(DataType::F16, &[2]));
    let b = graph.create_tensor(TensorSpec::new(DataType::F16, &[2]));
    graph.register_output(b).unwrap();
    graph.register_output(a).unwrap();
    graph.register_output(b).unwrap();
    assert_eq!(graph.outputs(), &[b, a]);
    assert_eq!(graph.spec(a).unwrap().attr, TensorAttr::Output);
}

#[test]
fn test_register_input_promotes_transient() {
    let mut graph = Graph::new();
    let a = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]));
    let w = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_constant());
    graph.register_input(a).unwrap();
    graph.register_input(w).unwrap();
    graph.register_input(a).unwrap();
    assert_eq!(graph.inputs(), &[a, w]);
    assert_eq!(graph.spec(a).unwrap().attr, TensorAttr::Input);
    assert_eq!(graph.spec(w).unwrap().attr, TensorAttr::Constant);
    assert_eq!(graph.constants(), vec![w]);
}

#[test]
fn test_op_kind_serialization() {
    let kind = OpKind::Transpose {
        perm: vec![0, 2, 3, 1],
    };
    let json = serde_json::to_string(&kind).unwrap();
    let back: OpKind = serde_json::from_str(&json).unwrap();
    assert_eq!(back, kind);
    assert_eq!(back.op_type(), OpType::Transpose);
}
