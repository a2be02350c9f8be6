//! Sink nodes that keep the last value they received

use crate::nodes::data::{NodeData, NodeDataType};
use crate::nodes::model::{ModelSignals, NodeDataModel, NodeValidationState};
use crate::nodes::port::{PortIndex, PortType};

/// Shows the incoming number
#[derive(Debug, Default)]
pub struct NumberDisplayModel {
    value: Option<f64>,
}

impl NumberDisplayModel {
    pub const NAME: &'static str = "NumberDisplay";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl NodeDataModel for NumberDisplayModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> &str {
        "Result"
    }

    fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::In => 1,
            _ => 0,
        }
    }

    fn data_type(&self, _port_type: PortType, _index: PortIndex) -> NodeDataType {
        NodeDataType::number()
    }

    fn port_required(&self, _index: PortIndex) -> bool {
        true
    }

    fn set_in_data(&mut self, data: Option<NodeData>, _port: PortIndex, _signals: &mut ModelSignals) {
        self.value = data.as_ref().and_then(NodeData::as_number);
    }

    fn out_data(&mut self, _port: PortIndex) -> Option<NodeData> {
        None
    }

    fn validation_state(&self) -> NodeValidationState {
        match self.value {
            Some(_) => NodeValidationState::Valid,
            None => NodeValidationState::Warning,
        }
    }

    fn validation_message(&self) -> String {
        match self.value {
            Some(_) => String::new(),
            None => "Missing input".to_string(),
        }
    }
}

/// Shows the incoming text
#[derive(Debug, Default)]
pub struct TextDisplayModel {
    text: Option<String>,
}

impl TextDisplayModel {
    pub const NAME: &'static str = "TextDisplay";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl NodeDataModel for TextDisplayModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn caption(&self) -> &str {
        "Text"
    }

    fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::In => 1,
            _ => 0,
        }
    }

    fn data_type(&self, _port_type: PortType, _index: PortIndex) -> NodeDataType {
        NodeDataType::text()
    }

    fn set_in_data(&mut self, data: Option<NodeData>, _port: PortIndex, _signals: &mut ModelSignals) {
        self.text = data.as_ref().and_then(NodeData::as_text).map(str::to_string);
    }

    fn out_data(&mut self, _port: PortIndex) -> Option<NodeData> {
        None
    }
}
