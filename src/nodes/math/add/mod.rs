//! Addition node implementation
//!
//! - mod.rs: the model (ports, state, signalling)
//! - functions.rs: core computation logic

mod functions;

pub use functions::*;

use log::trace;

use crate::nodes::data::{NodeData, NodeDataType};
use crate::nodes::model::{ModelSignal, ModelSignals, NodeDataModel, NodeValidationState};
use crate::nodes::port::{PortIndex, PortType};

/// Addition node that takes two numeric inputs and produces their sum
#[derive(Debug, Default)]
pub struct AdditionModel {
    operands: [Option<NodeData>; 2],
    result: Option<NodeData>,
    validation: Option<String>,
}

impl AdditionModel {
    pub const NAME: &'static str = "Addition";

    pub fn new() -> Self {
        Self::default()
    }

    fn compute(&mut self, signals: &mut ModelSignals) {
        signals.emit(ModelSignal::ComputingStarted);
        let previous = self.result.take();
        self.result = process_add(self.operands[0].as_ref(), self.operands[1].as_ref());
        self.validation = match self.result {
            Some(_) => None,
            None => Some("Missing or incorrect inputs".to_string()),
        };
        trace!("Addition: {:?}", self.result);

        if self.result.is_none() && previous.is_some() {
            signals.data_invalidated(0);
        }
        signals.data_updated(0);
        signals.emit(ModelSignal::ComputingFinished);
    }
}

impl NodeDataModel for AdditionModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn port_caption(&self, port_type: PortType, index: PortIndex) -> String {
        match (port_type, index) {
            (PortType::In, 0) => "A".to_string(),
            (PortType::In, 1) => "B".to_string(),
            (PortType::Out, 0) => "Result".to_string(),
            _ => String::new(),
        }
    }

    fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::In => 2,
            PortType::Out => 1,
            PortType::None => 0,
        }
    }

    fn data_type(&self, _port_type: PortType, _index: PortIndex) -> NodeDataType {
        NodeDataType::number()
    }

    fn port_required(&self, _index: PortIndex) -> bool {
        true
    }

    fn set_in_data(&mut self, data: Option<NodeData>, port: PortIndex, signals: &mut ModelSignals) {
        if let Some(slot) = self.operands.get_mut(port) {
            *slot = data;
            self.compute(signals);
        }
    }

    fn out_data(&mut self, _port: PortIndex) -> Option<NodeData> {
        self.result.clone()
    }

    fn validation_state(&self) -> NodeValidationState {
        match self.validation {
            Some(_) => NodeValidationState::Warning,
            None => NodeValidationState::Valid,
        }
    }

    fn validation_message(&self) -> String {
        self.validation.clone().unwrap_or_default()
    }
}
