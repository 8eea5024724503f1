//! Graph Representation
//!
//! Arena-allocated tensors and operations addressed by stable ids. Graph
//! authors and graph passes use the same construction API: create a tensor,
//! create an operation, then bind tensors as its inputs and outputs.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{GraphError, GraphResult};
use crate::ops::{OpKind, OpType};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a tensor in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    /// Returns the raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Unique identifier for an operation in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId(pub(crate) usize);

impl OpId {
    /// Returns the raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

// =============================================================================
// Tensor Description
// =============================================================================

/// Data type for tensor elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit floating point.
    #[default]
    F32,
    /// 16-bit floating point.
    F16,
    /// 32-bit signed integer.
    I32,
    /// 16-bit signed integer.
    I16,
    /// 8-bit signed integer.
    I8,
    /// 8-bit unsigned integer.
    U8,
    /// Boolean.
    Bool,
}

impl DataType {
    /// Size in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::I16 => 2,
            Self::I8 | Self::U8 | Self::Bool => 1,
        }
    }
}

/// Shape of a tensor (dimensions in axis order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    /// Creates a new shape.
    pub fn new(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }

    /// Returns the dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Returns the total number of elements.
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

/// Role of a tensor in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TensorAttr {
    /// Intermediate value.
    #[default]
    Transient,
    /// Fed by the caller.
    Input,
    /// Read back by the caller.
    Output,
    /// Known before execution (weights, biases).
    Constant,
}

/// Element type, shape and role of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Element type.
    pub dtype: DataType,
    /// Dimensions.
    pub shape: Shape,
    /// Role in the graph.
    pub attr: TensorAttr,
}

impl TensorSpec {
    /// Creates a transient tensor spec.
    pub fn new(dtype: DataType, shape: &[usize]) -> Self {
        Self {
            dtype,
            shape: Shape::new(shape),
            attr: TensorAttr::Transient,
        }
    }

    /// Builder: mark as graph input.
    pub fn as_input(self) -> Self {
        self.with_attr(TensorAttr::Input)
    }

    /// Builder: mark as graph output.
    pub fn as_output(self) -> Self {
        self.with_attr(TensorAttr::Output)
    }

    /// Builder: mark as constant.
    pub fn as_constant(self) -> Self {
        self.with_attr(TensorAttr::Constant)
    }

    /// Builder: set the role.
    pub fn with_attr(mut self, attr: TensorAttr) -> Self {
        self.attr = attr;
        self
    }

    /// Builder: replace the dimensions.
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Shape(shape);
        self
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.ndim()
    }
}

// =============================================================================
// Graph Entities
// =============================================================================

/// A tensor node together with its producer and consumers.
#[derive(Debug, Clone)]
pub struct Tensor {
    /// Unique identifier.
    pub id: TensorId,
    /// Description.
    pub spec: TensorSpec,
    producer: Option<OpId>,
    consumers: Vec<OpId>,
}

impl Tensor {
    /// Returns the operation writing this tensor, if any.
    pub fn producer(&self) -> Option<OpId> {
        self.producer
    }

    /// Returns the operations reading this tensor, in binding order.
    pub fn consumers(&self) -> &[OpId] {
        &self.consumers
    }
}

/// An operation with its bound inputs and outputs.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Unique identifier.
    pub id: OpId,
    /// Operator kind and parameters.
    pub kind: OpKind,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
}

impl Operation {
    /// Returns the bound inputs in order.
    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    /// Returns the bound outputs in order.
    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    /// Returns the parameter-less kind tag.
    pub fn op_type(&self) -> OpType {
        self.kind.op_type()
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Computation graph of tensors and operations.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    tensors: Vec<Tensor>,
    operations: Vec<Operation>,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tensor. Input and output tensors are registered as graph
    /// inputs and outputs in creation order.
    pub fn create_tensor(&mut self, spec: TensorSpec) -> TensorId {
        let id = TensorId(self.tensors.len());
        match spec.attr {
            TensorAttr::Input => self.inputs.push(id),
            TensorAttr::Output => self.outputs.push(id),
            TensorAttr::Transient | TensorAttr::Constant => {}
        }
        self.tensors.push(Tensor {
            id,
            spec,
            producer: None,
            consumers: Vec::new(),
        });
        id
    }

    /// Adds an operation with no bound tensors.
    pub fn create_operation(&mut self, kind: OpKind) -> OpId {
        let id = OpId(self.operations.len());
        self.operations.push(Operation {
            id,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        id
    }

    /// Appends `tensor` to the inputs of `op`.
    pub fn bind_input(&mut self, op: OpId, tensor: TensorId) -> GraphResult<()> {
        self.check_tensor(tensor)?;
        self.operation_mut(op)?.inputs.push(tensor);
        let consumers = &mut self.tensors[tensor.0].consumers;
        if !consumers.contains(&op) {
            consumers.push(op);
        }
        Ok(())
    }

    /// Appends `tensor` to the outputs of `op`.
    pub fn bind_output(&mut self, op: OpId, tensor: TensorId) -> GraphResult<()> {
        self.check_tensor(tensor)?;
        self.check_operation(op)?;
        if let Some(producer) = self.tensors[tensor.0].producer {
            return Err(GraphError::MultipleProducers { tensor, producer });
        }
        self.tensors[tensor.0].producer = Some(op);
        self.operations[op.0].outputs.push(tensor);
        Ok(())
    }

    /// Binds every tensor in `tensors` as an input of `op`.
    pub fn bind_inputs(&mut self, op: OpId, tensors: &[TensorId]) -> GraphResult<()> {
        tensors.iter().try_for_each(|&t| self.bind_input(op, t))
    }

    /// Binds every tensor in `tensors` as an output of `op`.
    pub fn bind_outputs(&mut self, op: OpId, tensors: &[TensorId]) -> GraphResult<()> {
        tensors.iter().try_for_each(|&t| self.bind_output(op, t))
    }

    /// Registers an existing tensor as a graph input. Transient tensors are
    /// promoted to [`TensorAttr::Input`].
    pub fn register_input(&mut self, tensor: TensorId) -> GraphResult<()> {
        self.check_tensor(tensor)?;
        let spec = &mut self.tensors[tensor.0].spec;
        if spec.attr == TensorAttr::Transient {
            spec.attr = TensorAttr::Input;
        }
        if !self.inputs.contains(&tensor) {
            self.inputs.push(tensor);
        }
        Ok(())
    }

    /// Registers an existing tensor as a graph output. Transient tensors are
    /// promoted to [`TensorAttr::Output`].
    pub fn register_output(&mut self, tensor: TensorId) -> GraphResult<()> {
        self.check_tensor(tensor)?;
        let spec = &mut self.tensors[tensor.0].spec;
        if spec.attr == TensorAttr::Transient {
            spec.attr = TensorAttr::Output;
        }
        if !self.outputs.contains(&tensor) {
            self.outputs.push(tensor);
        }
        Ok(())
    }

    /// Returns the tensor for an id.
    pub fn tensor(&self, id: TensorId) -> GraphResult<&Tensor> {
        self.tensors.get(id.0).ok_or(GraphError::UnknownTensor(id))
    }

    /// Returns the operation for an id.
    pub fn operation(&self, id: OpId) -> GraphResult<&Operation> {
        self.operations
            .get(id.0)
            .ok_or(GraphError::UnknownOperation(id))
    }

    /// Returns the spec of a tensor.
    pub fn spec(&self, id: TensorId) -> GraphResult<&TensorSpec> {
        self.tensor(id).map(|t| &t.spec)
    }

    /// Returns the operation writing `tensor`.
    pub fn producer(&self, tensor: TensorId) -> GraphResult<Option<OpId>> {
        self.tensor(tensor).map(Tensor::producer)
    }

    /// Returns the operations reading `tensor`.
    pub fn consumers(&self, tensor: TensorId) -> GraphResult<&[OpId]> {
        self.tensor(tensor).map(Tensor::consumers)
    }

    /// Returns all tensors.
    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    /// Returns all operations in creation order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns graph inputs in registration order.
    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    /// Returns graph outputs in registration order.
    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    /// Returns constant tensors in creation order.
    pub fn constants(&self) -> Vec<TensorId> {
        self.tensors
            .iter()
            .filter(|t| t.spec.attr == TensorAttr::Constant)
            .map(|t| t.id)
            .collect()
    }

    /// Returns the number of tensors.
    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns whether the graph has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the kind tag of every operation in topological order.
    pub fn op_types(&self) -> GraphResult<Vec<OpType>> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|id| self.operations[id.0].op_type())
            .collect())
    }

    /// Counts operations of one kind.
    pub fn count_ops(&self, op_type: OpType) -> usize {
        self.operations
            .iter()
            .filter(|op| op.op_type() == op_type)
            .count()
    }

    /// Returns operations in input-to-output order (Kahn's algorithm, ties
    /// broken by creation order).
    pub fn topological_order(&self) -> GraphResult<Vec<OpId>> {
        let mut pending: Vec<usize> = self
            .operations
            .iter()
            .map(|op| {
                op.inputs
                    .iter()
                    .filter_map(|&t| self.tensors[t.0].producer)
                    .count()
            })
            .collect();

        let mut ready: VecDeque<OpId> = self
            .operations
            .iter()
            .filter(|op| pending[op.id.0] == 0)
            .map(|op| op.id)
            .collect();

        let mut order = Vec::with_capacity(self.operations.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &out in &self.operations[id.0].outputs {
                for &consumer in &self.tensors[out.0].consumers {
                    // One decrement per bound occurrence of `out`.
                    let uses = self.operations[consumer.0]
                        .inputs
                        .iter()
                        .filter(|&&t| t == out)
                        .count();
                    pending[consumer.0] -= uses;
                    if pending[consumer.0] == 0 {
                        ready.push_back(consumer);
                    }
                }
            }
        }

        if order.len() != self.operations.len() {
            let stuck = self
                .operations
                .iter()
                .find(|op| pending[op.id.0] > 0)
                .map_or(OpId(0), |op| op.id);
            return Err(GraphError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Validates the graph structure.
    pub fn validate(&self) -> GraphResult<()> {
        let mut seen: FxHashSet<TensorId> = FxHashSet::default();
        for op in &self.operations {
            if op.outputs.is_empty() {
                return Err(GraphError::InvalidGraph(format!(
                    "{} ({}) has no outputs",
                    op.id,
                    op.kind.name()
                )));
            }
            for &t in op.inputs.iter().chain(&op.outputs) {
                self.check_tensor(t)?;
            }
            for &t in &op.outputs {
                if !seen.insert(t) {
                    return Err(GraphError::MultipleProducers {
                        tensor: t,
                        producer: op.id,
                    });
                }
            }
        }

        for &t in &self.inputs {
            if self.tensors[t.0].producer.is_some() {
                return Err(GraphError::InvalidGraph(format!(
                    "graph input {t} is produced by an operation"
                )));
            }
        }

        self.topological_order().map(|_| ())
    }

    fn operation_mut(&mut self, id: OpId) -> GraphResult<&mut Operation> {
        self.operations
            .get_mut(id.0)
            .ok_or(GraphError::UnknownOperation(id))
    }

    fn check_tensor(&self, id: TensorId) -> GraphResult<()> {
        if id.0 < self.tensors.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownTensor(id))
        }
    }

    fn check_operation(&self, id: OpId) -> GraphResult<()> {
        if id.0 < self.operations.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownOperation(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Activation, BinaryOp};

    fn relu_graph() -> (Graph, TensorId, TensorId, OpId) {
        let mut graph = Graph::new();
        let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[2, 3]).as_input());
        let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[2, 3]).as_output());
        let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
        graph.bind_input(relu, x).unwrap();
        graph.bind_output(relu, y).unwrap();
        (graph, x, y, relu)
    }

    #[test]
    fn test_shape_numel() {
        let shape = Shape::new(&[2, 3, 4]);
        assert_eq!(shape.numel(), 24);
        assert_eq!(shape.ndim(), 3);
    }

    #[test]
    fn test_graph_creation() {
        let (graph, x, y, relu) = relu_graph();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.inputs(), &[x]);
        assert_eq!(graph.outputs(), &[y]);
        assert_eq!(graph.consumers(x).unwrap(), &[relu]);
        assert_eq!(graph.producer(y).unwrap(), Some(relu));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_second_producer_rejected() {
        let (mut graph, x, y, relu) = relu_graph();
        let neg = graph.create_operation(OpKind::Activation(Activation::Neg));
        graph.bind_input(neg, x).unwrap();
        let err = graph.bind_output(neg, y).unwrap_err();
        assert_eq!(
            err,
            GraphError::MultipleProducers {
                tensor: y,
                producer: relu
            }
        );
    }

    #[test]
    fn test_unknown_ids() {
        let (mut graph, x, _, _) = relu_graph();
        assert_eq!(
            graph.bind_input(OpId(7), x),
            Err(GraphError::UnknownOperation(OpId(7)))
        );
        assert!(graph.tensor(TensorId(42)).is_err());
    }

    #[test]
    fn test_topological_order_diamond() {
        let mut graph = Graph::new();
        let spec = TensorSpec::new(DataType::F32, &[4]);
        let x = graph.create_tensor(spec.clone().as_input());
        let a = graph.create_tensor(spec.clone());
        let b = graph.create_tensor(spec.clone());
        let y = graph.create_tensor(spec.as_output());

        // Created out of order on purpose.
        let add = graph.create_operation(OpKind::Binary(BinaryOp::Add));
        let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
        let neg = graph.create_operation(OpKind::Activation(Activation::Neg));
        graph.bind_inputs(add, &[a, b]).unwrap();
        graph.bind_output(add, y).unwrap();
        graph.bind_input(relu, x).unwrap();
        graph.bind_output(relu, a).unwrap();
        graph.bind_input(neg, x).unwrap();
        graph.bind_output(neg, b).unwrap();

        assert_eq!(graph.topological_order().unwrap(), vec![relu, neg, add]);
        assert_eq!(
            graph.op_types().unwrap(),
            vec![OpType::Activation, OpType::Activation, OpType::Binary]
        );
    }

    #[test]
    fn test_self_input_twice() {
        let mut graph = Graph::new();
        let spec = TensorSpec::new(DataType::F32, &[4]);
        let x = graph.create_tensor(spec.clone().as_input());
        let a = graph.create_tensor(spec.clone());
        let y = graph.create_tensor(spec.as_output());
        let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
        graph.bind_input(relu, x).unwrap();
        graph.bind_output(relu, a).unwrap();
        let mul = graph.create_operation(OpKind::Binary(BinaryOp::Mul));
        graph.bind_inputs(mul, &[a, a]).unwrap();
        graph.bind_output(mul, y).unwrap();

        assert_eq!(graph.consumers(a).unwrap(), &[mul]);
        assert_eq!(graph.topological_order().unwrap(), vec![relu, mul]);
    }

    #[test]
    fn test_register_output_promotes_transient() {
        let mut graph = Graph::new();
        let t = graph.create_tensor(TensorSpec::new(DataType::F32, &[1]));
        graph.register_output(t).unwrap();
        graph.register_output(t).unwrap();
        assert_eq!(graph.outputs(), &[t]);
        assert_eq!(graph.spec(t).unwrap().attr, TensorAttr::Output);
    }

    #[test]
    fn test_validate_rejects_operation_without_outputs() {
        let mut graph = Graph::new();
        let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[1]).as_input());
        let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
        graph.bind_input(relu, x).unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::InvalidGraph(_))
        ));
    }
}
