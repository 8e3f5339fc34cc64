//! # Resource Snapshot Model
//!
//! Read-only view of an entity owned by the external resource service.
//! The engine never mutates these; it only reads them for condition
//! evaluation and capacity-aware routing, and asks the service for quantity
//! changes through the resource client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Asset,
    Consumable,
    Container,
    Stack,
    Queue,
    Pool,
    Collection,
    Row,
    Grid,
    VoxelGrid,
    Slot,
}

impl ResourceType {
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Asset | Self::Consumable)
    }
}

/// Address of a child inside a container resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildKey {
    /// Position in a stack, queue, row or slot
    Index(usize),
    /// Grid or voxel-grid cell
    Cell(Vec<usize>),
    /// Named member of a pool or collection
    Key(String),
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Key(key) => write!(f, "{key}"),
            Self::Cell(coords) => {
                let parts: Vec<String> = coords.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceChildren {
    Ordered(Vec<Resource>),
    Keyed(BTreeMap<String, Resource>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: String,
    pub resource_name: String,
    #[serde(default)]
    pub resource_class: Option<String>,
    pub base_type: ResourceType,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub children: Option<ResourceChildren>,
}

impl Resource {
    pub fn new(
        resource_id: impl Into<String>,
        resource_name: impl Into<String>,
        base_type: ResourceType,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_name: resource_name.into(),
            resource_class: None,
            base_type,
            quantity: None,
            capacity: None,
            attributes: Map::new(),
            children: None,
        }
    }

    pub fn with_class(mut self, resource_class: impl Into<String>) -> Self {
        self.resource_class = Some(resource_class.into());
        self
    }

    pub fn with_quantity(mut self, quantity: f64, capacity: Option<f64>) -> Self {
        self.quantity = Some(quantity);
        self.capacity = capacity;
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_children(mut self, children: ResourceChildren) -> Self {
        self.children = Some(children);
        self
    }

    pub fn is_container(&self) -> bool {
        self.base_type.is_container()
    }

    /// Look up a direct child. Ordered containers accept numeric keys written
    /// as strings; keyed containers accept indices and cells in their string form.
    pub fn child(&self, key: &ChildKey) -> Option<&Resource> {
        match (self.children.as_ref()?, key) {
            (ResourceChildren::Ordered(children), ChildKey::Index(index)) => children.get(*index),
            (ResourceChildren::Ordered(children), ChildKey::Key(key)) => {
                key.parse::<usize>().ok().and_then(|index| children.get(index))
            }
            (ResourceChildren::Ordered(_), ChildKey::Cell(_)) => None,
            (ResourceChildren::Keyed(children), key) => children.get(&key.to_string()),
        }
    }

    pub fn children(&self) -> Vec<&Resource> {
        match &self.children {
            Some(ResourceChildren::Ordered(children)) => children.iter().collect(),
            Some(ResourceChildren::Keyed(children)) => children.values().collect(),
            None => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        match &self.children {
            Some(ResourceChildren::Ordered(children)) => children.len(),
            Some(ResourceChildren::Keyed(children)) => children.len(),
            None => 0,
        }
    }

    /// Read a named field: built-ins first, then custom attributes
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "quantity" => self.quantity.map(Value::from),
            "capacity" => self.capacity.map(Value::from),
            "child_count" if self.is_container() => Some(Value::from(self.child_count())),
            "resource_id" => Some(Value::from(self.resource_id.clone())),
            "resource_name" => Some(Value::from(self.resource_name.clone())),
            "resource_class" => self.resource_class.clone().map(Value::from),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// Fill ratio in `[0, ..)`: quantity over capacity, or occupied children
    /// over capacity for containers. `None` when no capacity is known.
    pub fn utilization(&self) -> Option<f64> {
        let capacity = self.capacity.filter(|capacity| *capacity > 0.0)?;
        let used = match self.quantity {
            Some(quantity) => quantity,
            None if self.is_container() => self.child_count() as f64,
            None => return None,
        };
        Some((used / capacity).max(0.0))
    }

    /// Match by id and/or class; with neither given any resource matches
    pub fn matches(&self, resource_id: Option<&str>, resource_class: Option<&str>) -> bool {
        let id_ok = resource_id.map_or(true, |id| self.resource_id == id);
        let class_ok = resource_class.map_or(true, |class| {
            self.resource_class.as_deref() == Some(class)
        });
        id_ok && class_ok
    }
}
