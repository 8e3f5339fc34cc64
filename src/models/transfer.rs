//! # Transfer Capability Model
//!
//! Declarative description of how nodes can move resources between
//! locations. Base templates apply to every pair of locations their node
//! serves; overrides, keyed by location id or name, replace them for specific
//! sources, targets or (source, target) pairs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::system::{DEFAULT_SOURCE_ARGUMENT, DEFAULT_TARGET_ARGUMENT};

fn default_source_argument() -> String {
    DEFAULT_SOURCE_ARGUMENT.to_string()
}

fn default_target_argument() -> String {
    DEFAULT_TARGET_ARGUMENT.to_string()
}

fn default_cost_weight() -> f64 {
    1.0
}

/// How one node moves a resource from one location to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTemplate {
    pub node: String,
    pub action: String,
    #[serde(default = "default_source_argument")]
    pub source_argument: String,
    #[serde(default = "default_target_argument")]
    pub target_argument: String,
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
    /// Merged into every hop's arguments before the location arguments
    #[serde(default)]
    pub default_args: BTreeMap<String, Value>,
}

impl TransferTemplate {
    pub fn new(node: impl Into<String>, action: impl Into<String>, cost_weight: f64) -> Self {
        Self {
            node: node.into(),
            action: action.into(),
            source_argument: default_source_argument(),
            target_argument: default_target_argument(),
            cost_weight,
            default_args: BTreeMap::new(),
        }
    }

    pub fn with_arguments(
        mut self,
        source_argument: impl Into<String>,
        target_argument: impl Into<String>,
    ) -> Self {
        self.source_argument = source_argument.into();
        self.target_argument = target_argument.into();
        self
    }

    pub fn with_default_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_args.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferCapabilities {
    pub transfer_templates: Vec<TransferTemplate>,
    pub source_overrides: BTreeMap<String, Vec<TransferTemplate>>,
    pub target_overrides: BTreeMap<String, Vec<TransferTemplate>>,
    /// source -> target -> templates
    pub pair_overrides: BTreeMap<String, BTreeMap<String, Vec<TransferTemplate>>>,
}

impl TransferCapabilities {
    pub fn with_template(mut self, template: TransferTemplate) -> Self {
        self.transfer_templates.push(template);
        self
    }

    pub fn with_source_override(
        mut self,
        source: impl Into<String>,
        template: TransferTemplate,
    ) -> Self {
        self.source_overrides
            .entry(source.into())
            .or_default()
            .push(template);
        self
    }

    pub fn with_target_override(
        mut self,
        target: impl Into<String>,
        template: TransferTemplate,
    ) -> Self {
        self.target_overrides
            .entry(target.into())
            .or_default()
            .push(template);
        self
    }

    pub fn with_pair_override(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        template: TransferTemplate,
    ) -> Self {
        self.pair_overrides
            .entry(source.into())
            .or_default()
            .entry(target.into())
            .or_default()
            .push(template);
        self
    }
}

/// One outgoing edge of the materialized transfer graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    pub target: String,
    pub node: String,
    pub action: String,
    pub weight: f64,
}

/// Location id -> outgoing edges, for external inspection
pub type AdjacencyList = BTreeMap<String, Vec<AdjacencyEdge>>;
