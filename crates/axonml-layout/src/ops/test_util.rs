//! Single-operation graphs for handler tests.

use crate::config::LayoutInferConfig;
use crate::error::LayoutResult;
use crate::inference::{LayoutInferResult, LayoutInference};
use crate::permute::PermuteVector;
use axonml_graph::{DataType, Graph, OpKind, OpType, Operation, TensorId, TensorSpec};

pub(crate) fn nhwc() -> PermuteVector {
    PermuteVector::new(vec![0, 2, 3, 1]).unwrap()
}

enum Source {
    Input(Option<PermuteVector>),
    Constant,
}

/// Builds a graph holding one operation of `kind`, fed by graph inputs and
/// constants and producing graph outputs.
pub(crate) struct SingleOp {
    kind: OpKind,
    inputs: Vec<(Vec<usize>, Source)>,
    outputs: Vec<Vec<usize>>,
    config: LayoutInferConfig,
}

impl SingleOp {
    pub(crate) fn new(kind: OpKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            config: LayoutInferConfig::default(),
        }
    }

    /// Graph input with logical shape `shape`, stored as `pv` when given.
    pub(crate) fn input(mut self, shape: &[usize], pv: Option<PermuteVector>) -> Self {
        self.inputs.push((shape.to_vec(), Source::Input(pv)));
        self
    }

    pub(crate) fn constant(mut self, shape: &[usize]) -> Self {
        self.inputs.push((shape.to_vec(), Source::Constant));
        self
    }

    pub(crate) fn output(mut self, shape: &[usize]) -> Self {
        self.outputs.push(shape.to_vec());
        self
    }

    pub(crate) fn config(mut self, config: LayoutInferConfig) -> Self {
        self.config = config;
        self
    }

    fn build(self) -> (Graph, Vec<TensorId>, OpType, LayoutInferConfig) {
        let mut graph = Graph::new();
        let mut config = self.config;
        let mut inputs = Vec::new();
        for (shape, source) in self.inputs {
            let spec = TensorSpec::new(DataType::F32, &shape);
            let tensor = match source {
                Source::Input(pv) => {
                    let tensor = graph.create_tensor(spec.as_input());
                    if let Some(pv) = pv {
                        config = config.input_permute(tensor, pv);
                    }
                    tensor
                }
                Source::Constant => graph.create_tensor(spec.as_constant()),
            };
            inputs.push(tensor);
        }
        let outputs: Vec<TensorId> = self
            .outputs
            .iter()
            .map(|shape| graph.create_tensor(TensorSpec::new(DataType::F32, shape).as_output()))
            .collect();

        let op_type = self.kind.op_type();
        let op = graph.create_operation(self.kind);
        graph.bind_inputs(op, &inputs).unwrap();
        graph.bind_outputs(op, &outputs).unwrap();
        (graph, outputs, op_type, config)
    }

    pub(crate) fn try_run(self) -> LayoutResult<LayoutInferResult> {
        let (graph, _, _, config) = self.build();
        LayoutInference::with_config(config).run(&graph)
    }

    pub(crate) fn run(self) -> SingleOpResult {
        let (graph, source_outputs, kind, config) = self.build();
        let inner = LayoutInference::with_config(config).run(&graph).unwrap();
        SingleOpResult {
            inner,
            source_outputs,
            kind,
        }
    }
}

pub(crate) struct SingleOpResult {
    pub(crate) inner: LayoutInferResult,
    source_outputs: Vec<TensorId>,
    kind: OpType,
}

impl SingleOpResult {
    /// The rewritten operation, skipping transposes that publish outputs.
    pub(crate) fn emitted(&self) -> &Operation {
        self.inner
            .graph
            .operations()
            .iter()
            .filter(|op| !self.inner.restore_ops.contains(&op.id))
            .rfind(|op| op.op_type() == self.kind)
            .expect("operation was not emitted")
    }

    /// Number of inputs of the rewritten operation produced by a transpose.
    pub(crate) fn transposes_before(&self) -> usize {
        let graph = &self.inner.graph;
        self.emitted()
            .inputs()
            .iter()
            .filter_map(|&t| graph.producer(t).unwrap())
            .filter(|&p| graph.operation(p).unwrap().op_type() == OpType::Transpose)
            .count()
    }

    pub(crate) fn output_pv(&self) -> PermuteVector {
        self.output_pv_of(0)
    }

    pub(crate) fn output_pv_of(&self, index: usize) -> PermuteVector {
        self.inner
            .propagated_permute(self.source_outputs[index])
            .cloned()
            .unwrap()
    }
}
