//! Stock conversions between math value types

use crate::nodes::data::{NodeData, NodeDataType};
use crate::nodes::registry::DataModelRegistry;

/// Number to its shortest decimal text
pub fn number_to_text(data: NodeData) -> Option<NodeData> {
    data.as_number().map(|n| NodeData::Text(n.to_string()))
}

pub fn integer_to_number(data: NodeData) -> Option<NodeData> {
    match data {
        NodeData::Integer(i) => Some(NodeData::Number(i as f64)),
        _ => None,
    }
}

pub fn register_converters(registry: &mut DataModelRegistry) {
    registry.register_fn_converter(NodeDataType::number(), NodeDataType::text(), number_to_text);
    registry.register_fn_converter(NodeDataType::integer(), NodeDataType::number(), integer_to_number);
}
