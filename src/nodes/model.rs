//! The per-node-kind computation contract
//!
//! Concrete node kinds implement [`NodeDataModel`]; the graph engine only
//! ever talks to nodes through this trait. Models never call back into the
//! graph directly. Instead they record [`ModelSignal`]s on the
//! [`ModelSignals`] collector they are handed, and the scene dispatches them
//! once the model returns.

use serde_json::{json, Value};

use super::data::{NodeData, NodeDataType};
use super::port::{PortIndex, PortType};
use crate::error::Result;

/// How many downstream connections an output port accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeValidationState {
    Valid,
    Warning,
    Error,
}

/// Notifications a model raises towards its node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSignal {
    /// New data is available on this output port
    DataUpdated(PortIndex),
    /// Data on this output port is no longer valid
    DataInvalidated(PortIndex),
    /// The model changed its port counts
    PortsChanged,
    ComputingStarted,
    ComputingFinished,
}

/// Collector handed to a model while it runs
#[derive(Debug, Default)]
pub struct ModelSignals {
    signals: Vec<ModelSignal>,
}

impl ModelSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, signal: ModelSignal) {
        self.signals.push(signal);
    }

    pub fn data_updated(&mut self, port: PortIndex) {
        self.emit(ModelSignal::DataUpdated(port));
    }

    pub fn data_invalidated(&mut self, port: PortIndex) {
        self.emit(ModelSignal::DataInvalidated(port));
    }

    pub fn ports_changed(&mut self) {
        self.emit(ModelSignal::PortsChanged);
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSignal> {
        self.signals.iter()
    }
}

impl IntoIterator for ModelSignals {
    type Item = ModelSignal;
    type IntoIter = std::vec::IntoIter<ModelSignal>;

    fn into_iter(self) -> Self::IntoIter {
        self.signals.into_iter()
    }
}

/// Port declarations and computation for one node kind
pub trait NodeDataModel {
    /// Unique model name, used to recreate the model on restore
    fn name(&self) -> &str;

    /// Caption shown by the host
    fn caption(&self) -> &str {
        self.name()
    }

    /// Label for an individual port
    fn port_caption(&self, _port_type: PortType, _index: PortIndex) -> String {
        String::new()
    }

    fn n_ports(&self, port_type: PortType) -> usize;

    fn data_type(&self, port_type: PortType, index: PortIndex) -> NodeDataType;

    fn port_out_connection_policy(&self, _index: PortIndex) -> ConnectionPolicy {
        ConnectionPolicy::Many
    }

    /// Whether this input must be connected for processing to occur
    fn port_required(&self, _index: PortIndex) -> bool {
        false
    }

    /// Triggers the algorithm
    fn set_in_data(&mut self, data: Option<NodeData>, port: PortIndex, signals: &mut ModelSignals);

    fn out_data(&mut self, port: PortIndex) -> Option<NodeData>;

    fn validation_state(&self) -> NodeValidationState {
        NodeValidationState::Valid
    }

    fn validation_message(&self) -> String {
        String::new()
    }

    fn input_connection_created(&mut self, _index: PortIndex) {}

    fn input_connection_deleted(&mut self, _index: PortIndex) {}

    fn output_connection_created(&mut self, _index: PortIndex) {}

    fn output_connection_deleted(&mut self, _index: PortIndex) {}

    /// Model-specific state; must contain at least the model name
    fn save(&self) -> Value {
        json!({ "name": self.name() })
    }

    fn restore(&mut self, _state: &Value) -> Result<()> {
        Ok(())
    }
}
