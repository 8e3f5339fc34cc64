//! # Condition Model
//!
//! Preconditions gating step execution. Conditions are a closed set of
//! variants; the condition evaluator dispatches on the variant, never on
//! runtime type inspection.
//!
//! ```json
//! {"condition_type": "resource_field_check",
//!  "resource": {"id": "reservoir_1"},
//!  "field": "quantity", "operator": ">=", "value": 10}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::resource::ChildKey;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationRef {
    Id(String),
    Name(String),
}

impl fmt::Display for LocationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "location {id}"),
            Self::Name(name) => write!(f, "location '{name}'"),
        }
    }
}

/// How a condition names the resource whose field it reads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRef {
    Id(String),
    /// The resource attached to a location, or one of its children
    Location {
        location: LocationRef,
        #[serde(default)]
        key: Option<ChildKey>,
    },
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "resource {id}"),
            Self::Location {
                location,
                key: Some(key),
            } => write!(f, "resource at {location} [{key}]"),
            Self::Location { location, key: None } => write!(f, "resource at {location}"),
        }
    }
}

/// Presence test against a location's attached resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePresence {
    pub location: LocationRef,
    /// Restrict the check to one child slot of a container location
    #[serde(default)]
    pub key: Option<ChildKey>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub resource_class: Option<String>,
}

impl ResourcePresence {
    pub fn at(location: LocationRef) -> Self {
        Self {
            location,
            key: None,
            resource_id: None,
            resource_class: None,
        }
    }

    pub fn with_key(mut self, key: ChildKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_resource_class(mut self, resource_class: impl Into<String>) -> Self {
        self.resource_class = Some(resource_class.into());
        self
    }

    fn describe_match(&self) -> String {
        match (&self.resource_id, &self.resource_class) {
            (Some(id), _) => format!("resource {id}"),
            (None, Some(class)) => format!("a resource of class '{class}'"),
            (None, None) => "any resource".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">", alias = "greater_than")]
    GreaterThan,
    #[serde(rename = "<", alias = "less_than")]
    LessThan,
    #[serde(rename = "==", alias = "equal_to")]
    EqualTo,
    #[serde(rename = ">=", alias = "greater_than_or_equal")]
    GreaterThanOrEqual,
    #[serde(rename = "<=", alias = "less_than_or_equal")]
    LessThanOrEqual,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::EqualTo => "==",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
        }
    }

    /// Only `==` is defined for non-numeric operands
    pub fn is_ordering(&self) -> bool {
        !matches!(self, Self::EqualTo)
    }

    pub fn compare_numbers(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::LessThan => lhs < rhs,
            Self::EqualTo => lhs == rhs,
            Self::GreaterThanOrEqual => lhs >= rhs,
            Self::LessThanOrEqual => lhs <= rhs,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" | "greater_than" => Ok(Self::GreaterThan),
            "<" | "less_than" => Ok(Self::LessThan),
            "==" | "equal_to" => Ok(Self::EqualTo),
            ">=" | "greater_than_or_equal" => Ok(Self::GreaterThanOrEqual),
            "<=" | "less_than_or_equal" => Ok(Self::LessThanOrEqual),
            _ => Err(format!("Invalid comparison operator: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition_type", rename_all = "snake_case")]
pub enum Condition {
    ResourceInLocation(ResourcePresence),
    NoResourceInLocation(ResourcePresence),
    ResourceFieldCheck {
        resource: ResourceRef,
        field: String,
        operator: ComparisonOperator,
        value: Value,
    },
    ResourceChildFieldCheck {
        resource: ResourceRef,
        key: ChildKey,
        field: String,
        operator: ComparisonOperator,
        value: Value,
    },
}

impl Condition {
    pub fn field_check(
        resource_id: impl Into<String>,
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: Value,
    ) -> Self {
        Self::ResourceFieldCheck {
            resource: ResourceRef::Id(resource_id.into()),
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResourceInLocation(_) => "resource_in_location",
            Self::NoResourceInLocation(_) => "no_resource_in_location",
            Self::ResourceFieldCheck { .. } => "resource_field_check",
            Self::ResourceChildFieldCheck { .. } => "resource_child_field_check",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceInLocation(presence) => {
                write!(f, "{} present at {}", presence.describe_match(), presence.location)?;
                if let Some(key) = &presence.key {
                    write!(f, " [{key}]")?;
                }
                Ok(())
            }
            Self::NoResourceInLocation(presence) => {
                write!(f, "no {} at {}", presence.describe_match(), presence.location)?;
                if let Some(key) = &presence.key {
                    write!(f, " [{key}]")?;
                }
                Ok(())
            }
            Self::ResourceFieldCheck {
                resource,
                field,
                operator,
                value,
            } => write!(f, "{resource}.{field} {operator} {value}"),
            Self::ResourceChildFieldCheck {
                resource,
                key,
                field,
                operator,
                value,
            } => write!(f, "{resource}[{key}].{field} {operator} {value}"),
        }
    }
}
