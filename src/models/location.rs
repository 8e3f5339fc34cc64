use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A place in the workcell a resource can sit, as seen by the location service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
    pub location_name: String,
    /// Resource currently attached to (sitting at) this location
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Node name -> node-specific representation (e.g. robot teach point)
    #[serde(default)]
    pub representations: BTreeMap<String, Value>,
    #[serde(default = "default_allow_transfers")]
    pub allow_transfers: bool,
}

fn default_allow_transfers() -> bool {
    true
}

impl Location {
    pub fn new(location_id: impl Into<String>, location_name: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            location_name: location_name.into(),
            resource_id: None,
            representations: BTreeMap::new(),
            allow_transfers: true,
        }
    }

    pub fn with_representation(mut self, node: impl Into<String>, representation: Value) -> Self {
        self.representations.insert(node.into(), representation);
        self
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn without_transfers(mut self) -> Self {
        self.allow_transfers = false;
        self
    }

    /// True when `node` has a representation for this location
    pub fn served_by(&self, node: &str) -> bool {
        self.representations.contains_key(node)
    }

    /// Matches either the id or the human name
    pub fn is_named(&self, reference: &str) -> bool {
        self.location_id == reference || self.location_name == reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allow_transfers_defaults_on() {
        let location: Location = serde_json::from_value(json!({
            "location_id": "loc_1",
            "location_name": "deck"
        }))
        .unwrap();
        assert!(location.allow_transfers);
        assert!(!location.served_by("arm"));
        assert!(location.is_named("deck"));
    }
}
