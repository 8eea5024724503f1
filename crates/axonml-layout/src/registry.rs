//! Handler Registry
//!
//! Process-wide table from operator kind to layout handler, built once on
//! first use and read-only afterwards.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::ops::{
    AxisLayoutInfer, BinaryLayoutInfer, ConcatLayoutInfer, Conv2dLayoutInfer,
    DefaultLayoutInfer, ElementwiseLayoutInfer, OpLayoutInfer, PadLayoutInfer,
    Pool2dLayoutInfer, ReduceLayoutInfer, SliceLayoutInfer, SplitLayoutInfer, TileLayoutInfer,
    TransposeLayoutInfer,
};
use axonml_graph::OpType;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

static REGISTRY: OnceLock<HandlerRegistry> = OnceLock::new();

/// Returns the shared registry.
pub fn global() -> &'static HandlerRegistry {
    REGISTRY.get_or_init(HandlerRegistry::with_builtin)
}

/// Operator kind to handler table.
#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: FxHashMap<OpType, Box<dyn OpLayoutInfer>>,
    fallback: DefaultLayoutInfer,
}

impl HandlerRegistry {
    /// Creates a registry with no handlers.
    pub fn empty() -> Self {
        Self {
            handlers: FxHashMap::default(),
            fallback: DefaultLayoutInfer,
        }
    }

    /// Creates a registry with every built-in handler.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();

        for op_type in [OpType::Activation, OpType::DataConvert] {
            registry.register(op_type, Box::new(ElementwiseLayoutInfer));
        }
        registry.register(OpType::Binary, Box::new(BinaryLayoutInfer));
        registry.register(OpType::Pad, Box::new(PadLayoutInfer));
        registry.register(OpType::Slice, Box::new(SliceLayoutInfer));
        registry.register(OpType::Tile, Box::new(TileLayoutInfer));
        registry.register(OpType::Concat, Box::new(ConcatLayoutInfer));
        registry.register(OpType::Split, Box::new(SplitLayoutInfer));
        for op_type in [OpType::Reduce, OpType::ArgReduce] {
            registry.register(op_type, Box::new(ReduceLayoutInfer));
        }
        for op_type in [
            OpType::Softmax,
            OpType::LogSoftmax,
            OpType::LayerNorm,
            OpType::ShuffleChannel,
            OpType::Reverse,
        ] {
            registry.register(op_type, Box::new(AxisLayoutInfer));
        }
        registry.register(OpType::Transpose, Box::new(TransposeLayoutInfer));
        registry.register(OpType::Conv2d, Box::new(Conv2dLayoutInfer));
        registry.register(OpType::Pool2d, Box::new(Pool2dLayoutInfer));

        registry
    }

    /// Registers a handler, replacing any previous one for `op_type`.
    pub fn register(&mut self, op_type: OpType, handler: Box<dyn OpLayoutInfer>) {
        self.handlers.insert(op_type, handler);
    }

    /// Returns the dedicated handler for `op_type`.
    pub fn get(&self, op_type: OpType) -> Option<&dyn OpLayoutInfer> {
        self.handlers.get(&op_type).map(|h| h.as_ref())
    }

    /// Returns the layout-opaque handler.
    pub fn fallback(&self) -> &dyn OpLayoutInfer {
        &self.fallback
    }

    /// Returns whether `op_type` has a dedicated handler.
    pub fn contains(&self, op_type: OpType) -> bool {
        self.handlers.contains_key(&op_type)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
