//! Constant number source

use serde_json::{json, Value};

use crate::error::{GraphError, Result};
use crate::nodes::data::{NodeData, NodeDataType};
use crate::nodes::model::{ModelSignals, NodeDataModel};
use crate::nodes::port::{PortIndex, PortType};

/// Holds one number and offers it on its single output
#[derive(Debug, Default)]
pub struct NumberSourceModel {
    value: Option<f64>,
}

impl NumberSourceModel {
    pub const NAME: &'static str = "NumberSource";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: f64) -> Self {
        Self { value: Some(value) }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Stores a new value and announces it on output 0
    pub fn set_value(&mut self, value: f64, signals: &mut ModelSignals) {
        self.value = Some(value);
        signals.data_updated(0);
    }
}

impl NodeDataModel for NumberSourceModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> &str {
        "Number"
    }

    fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::Out => 1,
            _ => 0,
        }
    }

    fn data_type(&self, _port_type: PortType, _index: PortIndex) -> NodeDataType {
        NodeDataType::number()
    }

    fn set_in_data(&mut self, _data: Option<NodeData>, _port: PortIndex, _signals: &mut ModelSignals) {}

    fn out_data(&mut self, _port: PortIndex) -> Option<NodeData> {
        self.value.map(NodeData::Number)
    }

    fn save(&self) -> Value {
        match self.value {
            Some(value) => json!({ "name": Self::NAME, "number": value }),
            None => json!({ "name": Self::NAME }),
        }
    }

    fn restore(&mut self, state: &Value) -> Result<()> {
        match state.get("number") {
            None => Ok(()),
            Some(number) => {
                let value = number
                    .as_f64()
                    .ok_or_else(|| GraphError::InvalidRecord(format!("not a number: {number}")))?;
                self.value = Some(value);
                Ok(())
            }
        }
    }
}
