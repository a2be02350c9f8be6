//! Data types and values that flow between ports

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type carried by a port: a stable identifier plus a display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDataType {
    pub id: String,
    pub name: String,
}

impl NodeDataType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Floating point number
    pub fn number() -> Self {
        Self::new("number", "Number")
    }

    /// Whole number
    pub fn integer() -> Self {
        Self::new("integer", "Integer")
    }

    pub fn boolean() -> Self {
        Self::new("boolean", "Boolean")
    }

    pub fn text() -> Self {
        Self::new("text", "Text")
    }

    /// 3D vector (x, y, z)
    pub fn vector3() -> Self {
        Self::new("vector3", "Vector3")
    }

    /// RGBA color value
    pub fn color() -> Self {
        Self::new("color", "Color")
    }

    /// Direct connection needs identical identifiers; display names are ignored
    pub fn can_connect_to(&self, other: &NodeDataType) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for NodeDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Values that flow between nodes
///
/// An absent value (`Option::None` at the call sites) means "no data", which
/// is what downstream nodes receive when a connection goes away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeData {
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Vector3([f32; 3]),
    Color([f32; 4]),
    /// Any other payload, tagged with its own type
    Custom {
        data_type: NodeDataType,
        value: serde_json::Value,
    },
}

impl NodeData {
    /// The semantic type of this value
    pub fn data_type(&self) -> NodeDataType {
        match self {
            NodeData::Number(_) => NodeDataType::number(),
            NodeData::Integer(_) => NodeDataType::integer(),
            NodeData::Boolean(_) => NodeDataType::boolean(),
            NodeData::Text(_) => NodeDataType::text(),
            NodeData::Vector3(_) => NodeDataType::vector3(),
            NodeData::Color(_) => NodeDataType::color(),
            NodeData::Custom { data_type, .. } => data_type.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            NodeData::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeData::Text(s) => Some(s),
            _ => None,
        }
    }
}
