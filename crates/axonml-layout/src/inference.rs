//! Layout Inference Driver
//!
//! Walks the source graph from its inputs and constants, dispatching each
//! operation to its handler as soon as every input has a permute vector, then
//! publishes the graph outputs in their declared layout.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::config::LayoutInferConfig;
use crate::context::{LayoutInferContext, LayoutInferStats};
use crate::error::{LayoutInferError, LayoutResult};
use crate::ops::OpLayoutInfer;
use crate::permute::PermuteVector;
use crate::registry::{self, HandlerRegistry};
use axonml_graph::{Graph, OpId, Operation, TensorAttr, TensorId};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Result
// =============================================================================

/// Outcome of a layout inference run.
#[derive(Debug)]
pub struct LayoutInferResult {
    /// The rewritten graph.
    pub graph: Graph,
    /// Source tensor to new-graph tensor. Graph outputs map to the tensor
    /// published in the new graph.
    pub tensor_map: FxHashMap<TensorId, TensorId>,
    /// Final permute vector of every source tensor. Identity for every graph
    /// output.
    pub permutes: FxHashMap<TensorId, PermuteVector>,
    /// Graph outputs that needed a trailing transpose, with the layout that
    /// had reached them.
    pub restored: Vec<(TensorId, PermuteVector)>,
    /// Transposes appended to publish graph outputs, in output order.
    pub restore_ops: Vec<OpId>,
    /// Run statistics.
    pub stats: LayoutInferStats,
}

impl LayoutInferResult {
    /// Returns the new-graph tensor for a source tensor.
    pub fn mapped_tensor(&self, tensor: TensorId) -> Option<TensorId> {
        self.tensor_map.get(&tensor).copied()
    }

    /// Returns the final permute vector of a source tensor.
    pub fn permute_vector(&self, tensor: TensorId) -> Option<&PermuteVector> {
        self.permutes.get(&tensor)
    }

    /// Returns the layout that propagated to a source tensor, before any
    /// output restoration.
    pub fn propagated_permute(&self, tensor: TensorId) -> Option<&PermuteVector> {
        self.restored
            .iter()
            .find(|(t, _)| *t == tensor)
            .map(|(_, pv)| pv)
            .or_else(|| self.permutes.get(&tensor))
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Layout inference pass.
#[derive(Debug, Clone, Default)]
pub struct LayoutInference {
    config: LayoutInferConfig,
    registry: Option<Arc<HandlerRegistry>>,
}

impl LayoutInference {
    /// Creates a pass with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pass with explicit options.
    pub fn with_config(config: LayoutInferConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    /// Builder: dispatch through `registry` instead of the shared one.
    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        if registry.is_empty() {
            warn!("handler registry is empty, every operator takes the default handler");
        }
        self.registry = Some(registry);
        self
    }

    /// Returns the options of this pass.
    pub fn config(&self) -> &LayoutInferConfig {
        &self.config
    }

    /// Returns the registry this pass dispatches through.
    pub fn registry(&self) -> &HandlerRegistry {
        match &self.registry {
            Some(registry) => registry,
            None => registry::global(),
        }
    }

    /// Rewrites `source` into an equivalent graph whose operators consume
    /// their preferred layouts.
    pub fn run(&self, source: &Graph) -> LayoutResult<LayoutInferResult> {
        source.validate()?;
        info!(
            ops = source.len(),
            tensors = source.num_tensors(),
            inputs = source.inputs().len(),
            outputs = source.outputs().len(),
            "starting layout inference"
        );

        if !self.config.allow_fallback {
            let registry = self.registry();
            if let Some(op) = source
                .operations()
                .iter()
                .find(|op| !registry.contains(op.op_type()))
            {
                return Err(LayoutInferError::UnsupportedOperatorKind {
                    op: op.id,
                    kind: op.op_type(),
                });
            }
        }

        let mut ctx = LayoutInferContext::with_config(source, self.config.clone());
        self.seed(&mut ctx)?;

        for op in source.operations() {
            if op.inputs().is_empty() {
                self.dispatch(op, &mut ctx)?;
            }
        }

        while let Some(tensor) = ctx.pop_pending() {
            for &consumer in source.consumers(tensor)? {
                let op = source.operation(consumer)?;
                if ctx.is_visited(consumer) || !ctx.is_ready(op) {
                    continue;
                }
                self.dispatch(op, &mut ctx)?;
            }
        }

        for op in source.operations() {
            if ctx.is_visited(op.id) {
                continue;
            }
            return Err(match op.inputs().iter().find(|&&t| !ctx.is_resolved(t)) {
                Some(&tensor) => LayoutInferError::UnresolvedTensor { tensor },
                None => LayoutInferError::conflict(op.id, "operation was never scheduled"),
            });
        }

        let mut restored = Vec::new();
        let mut restore_ops = Vec::new();
        for &output in source.outputs() {
            let pv = ctx.permute_vector(output)?;
            let body = ctx.mapped_tensor(output)?;
            let published = ctx.restore_output(output)?;
            if published != body {
                restore_ops.extend(ctx.graph().producer(published)?);
            }
            if !pv.is_aligned() {
                restored.push((output, pv));
            }
        }

        let (graph, tensor_map, permutes, stats) = ctx.into_parts();
        info!(
            ops = graph.len(),
            ops_visited = stats.ops_visited,
            transposes_inserted = stats.transposes_inserted,
            transposes_folded = stats.transposes_folded,
            output_transposes = stats.output_transposes,
            "layout inference finished"
        );
        Ok(LayoutInferResult {
            graph,
            tensor_map,
            permutes,
            restored,
            restore_ops,
            stats,
        })
    }

    /// Binds graph inputs and constants in the new graph and queues them.
    fn seed(&self, ctx: &mut LayoutInferContext<'_>) -> LayoutResult<()> {
        let source = ctx.source();

        for (tensor, _) in &self.config.input_permutes {
            if !source.inputs().contains(tensor) {
                warn!(tensor = %tensor, "ignoring input layout for a tensor that is not a graph input");
            }
        }

        for &input in source.inputs() {
            let spec = source.spec(input)?;
            let pv = match self.config.input_permute_of(input) {
                Some(pv) if pv.rank() != spec.rank() => {
                    return Err(LayoutInferError::DimensionMismatch {
                        expected: spec.rank(),
                        found: pv.rank(),
                    })
                }
                Some(pv) => pv.clone(),
                None => PermuteVector::identity(spec.rank()),
            };
            let dims = pv.map_axis_list(spec.shape.dims())?;
            let attr = match spec.attr {
                TensorAttr::Constant => TensorAttr::Constant,
                _ => TensorAttr::Input,
            };
            let mapped = ctx
                .graph_mut()
                .create_tensor(spec.clone().with_shape(dims).with_attr(attr));
            ctx.graph_mut().register_input(mapped)?;
            ctx.bind_tensor(input, mapped, pv)?;
            ctx.push_pending(input);
        }

        for constant in source.constants() {
            // Constants fed as graph inputs were seeded above.
            if ctx.is_resolved(constant) {
                continue;
            }
            let spec = source.spec(constant)?;
            let mapped = ctx.graph_mut().create_tensor(spec.clone());
            ctx.bind_tensor(constant, mapped, PermuteVector::identity(spec.rank()))?;
            ctx.push_pending(constant);
        }
        Ok(())
    }

    fn dispatch(&self, op: &Operation, ctx: &mut LayoutInferContext<'_>) -> LayoutResult<()> {
        let registry = self.registry();
        let handler: &dyn OpLayoutInfer = registry
            .get(op.op_type())
            .unwrap_or_else(|| registry.fallback());

        ctx.mark_visited(op.id);
        debug!(
            op = %op.id,
            kind = %op.op_type(),
            handler = handler.name(),
            pending = ctx.pending_len(),
            "dispatching"
        );

        let mut next_tensors = Vec::with_capacity(op.outputs().len());
        handler.on_inputs(op, ctx, &mut next_tensors)?;
        for tensor in next_tensors {
            ctx.push_pending(tensor);
        }
        Ok(())
    }
}

/// Runs layout inference with default options.
pub fn layout_inference(source: &Graph) -> LayoutResult<LayoutInferResult> {
    LayoutInference::new().run(source)
}

/// Runs layout inference with explicit options.
pub fn layout_inference_with(
    source: &Graph,
    config: &LayoutInferConfig,
) -> LayoutResult<LayoutInferResult> {
    LayoutInference::with_config(config.clone()).run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axonml_graph::{Activation, DataType, OpKind, OpType, TensorSpec};

    fn relu_chain(len: usize) -> (Graph, TensorId, TensorId) {
        let mut graph = Graph::new();
        let input = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 4, 4, 3]).as_input());
        let mut current = input;
        for i in 0..len {
            let spec = TensorSpec::new(DataType::F32, &[1, 4, 4, 3]);
            let spec = if i + 1 == len { spec.as_output() } else { spec };
            let next = graph.create_tensor(spec);
            let op = graph.create_operation(OpKind::Activation(Activation::Relu));
            graph.bind_input(op, current).unwrap();
            graph.bind_output(op, next).unwrap();
            current = next;
        }
        (graph, input, current)
    }

    #[test]
    fn test_aligned_chain_unchanged() {
        let (graph, _, output) = relu_chain(3);
        let result = layout_inference(&graph).unwrap();
        assert_eq!(result.graph.op_types().unwrap(), graph.op_types().unwrap());
        assert_eq!(result.stats.ops_visited, 3);
        assert_eq!(result.stats.ops_emitted, 3);
        assert!(result.restored.is_empty());
        assert_eq!(result.graph.outputs(), &[result.mapped_tensor(output).unwrap()]);
    }

    #[test]
    fn test_stored_input_layout_restored_once() {
        let (graph, input, output) = relu_chain(3);
        let nhwc = PermuteVector::new(vec![0, 2, 3, 1]).unwrap();
        let config = LayoutInferConfig::new().input_permute(input, nhwc.clone());
        let result = layout_inference_with(&graph, &config).unwrap();

        assert_eq!(result.graph.count_ops(OpType::Transpose), 1);
        assert_eq!(result.propagated_permute(output), Some(&nhwc));
        assert!(result.permute_vector(output).unwrap().is_aligned());
        let new_input = result.mapped_tensor(input).unwrap();
        assert_eq!(result.graph.spec(new_input).unwrap().shape.dims(), &[1, 3, 4, 4]);
    }

    #[test]
    fn test_input_layout_rank_checked() {
        let (graph, input, _) = relu_chain(1);
        let config =
            LayoutInferConfig::new().input_permute(input, PermuteVector::new(vec![1, 0]).unwrap());
        assert_eq!(
            layout_inference_with(&graph, &config).unwrap_err(),
            LayoutInferError::DimensionMismatch {
                expected: 4,
                found: 2
            }
        );
    }

    #[test]
    fn test_strict_rejects_unhandled_kind() {
        let mut graph = Graph::new();
        let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[2, 6]).as_input());
        let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[12]).as_output());
        let op = graph.create_operation(OpKind::Reshape { shape: vec![12] });
        graph.bind_input(op, x).unwrap();
        graph.bind_output(op, y).unwrap();

        let err = LayoutInference::with_config(LayoutInferConfig::strict())
            .run(&graph)
            .unwrap_err();
        assert_eq!(
            err,
            LayoutInferError::UnsupportedOperatorKind {
                op,
                kind: OpType::Reshape
            }
        );
        assert!(layout_inference(&graph).is_ok());
    }

    #[test]
    fn test_dangling_input_is_unresolved() {
        let mut graph = Graph::new();
        let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_input());
        let dangling = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]));
        let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[4]).as_output());
        let op = graph.create_operation(OpKind::Binary(axonml_graph::BinaryOp::Add));
        graph.bind_inputs(op, &[x, dangling]).unwrap();
        graph.bind_output(op, y).unwrap();

        assert_eq!(
            layout_inference(&graph).unwrap_err(),
            LayoutInferError::UnresolvedTensor { tensor: dangling }
        );
    }
}
