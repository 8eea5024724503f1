//! Layout Inference Configuration
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::permute::PermuteVector;
use axonml_graph::TensorId;
use serde::{Deserialize, Serialize};

/// Configuration for a layout inference run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutInferConfig {
    /// Absorb source-graph transposes into permute vectors instead of
    /// emitting them.
    pub fold_transposes: bool,
    /// Route operator kinds without a dedicated handler through the
    /// layout-opaque default handler. When disabled such operators fail
    /// with `UnsupportedOperatorKind`.
    pub allow_fallback: bool,
    /// Permute vectors of graph inputs whose buffers are already stored in a
    /// non-declared layout. Inputs not listed start aligned.
    pub input_permutes: Vec<(TensorId, PermuteVector)>,
}

impl Default for LayoutInferConfig {
    fn default() -> Self {
        Self {
            fold_transposes: true,
            allow_fallback: true,
            input_permutes: Vec::new(),
        }
    }
}

impl LayoutInferConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that rejects operators without a handler.
    pub fn strict() -> Self {
        Self {
            allow_fallback: false,
            ..Self::default()
        }
    }

    /// Builder: fold source transposes.
    pub fn fold_transposes(mut self, enabled: bool) -> Self {
        self.fold_transposes = enabled;
        self
    }

    /// Builder: allow the default handler.
    pub fn allow_fallback(mut self, enabled: bool) -> Self {
        self.allow_fallback = enabled;
        self
    }

    /// Builder: declare the stored layout of a graph input.
    pub fn input_permute(mut self, tensor: TensorId, pv: PermuteVector) -> Self {
        self.input_permutes.retain(|(t, _)| *t != tensor);
        self.input_permutes.push((tensor, pv));
        self
    }

    /// Returns the declared permute vector of a graph input.
    pub fn input_permute_of(&self, tensor: TensorId) -> Option<&PermuteVector> {
        self.input_permutes
            .iter()
            .find(|(t, _)| *t == tensor)
            .map(|(_, pv)| pv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LayoutInferConfig::new();
        assert!(config.fold_transposes);
        assert!(config.allow_fallback);
        assert!(config.input_permutes.is_empty());
        assert!(!LayoutInferConfig::strict().allow_fallback);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LayoutInferConfig =
            serde_json::from_str(r#"{ "fold_transposes": false }"#).unwrap();
        assert!(!config.fold_transposes);
        assert!(config.allow_fallback);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LayoutInferConfig::strict().fold_transposes(false);
        let json = serde_json::to_string(&config).unwrap();
        let back: LayoutInferConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
