//! Core computation logic for addition node

use crate::nodes::data::NodeData;

/// Sum of both operands, or nothing while either is missing or not numeric
pub fn process_add(a: Option<&NodeData>, b: Option<&NodeData>) -> Option<NodeData> {
    match (a, b) {
        (Some(NodeData::Integer(a)), Some(NodeData::Integer(b))) => Some(NodeData::Integer(a.wrapping_add(*b))),
        (Some(a), Some(b)) => {
            let a = extract_number(a)?;
            let b = extract_number(b)?;
            Some(NodeData::Number(a + b))
        }
        _ => None,
    }
}

/// Extract a number from any numeric-ish value
fn extract_number(data: &NodeData) -> Option<f64> {
    match data {
        NodeData::Number(n) => Some(*n),
        NodeData::Integer(i) => Some(*i as f64),
        NodeData::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
