//! Small models and converters shared by the unit tests

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::converter::{ConversionHandle, RegisteredConverter, TypeConverter, TypeConverterId};
use super::data::{NodeData, NodeDataType};
use super::model::{ConnectionPolicy, ModelSignals, NodeDataModel};
use super::port::{PortIndex, PortType};
use crate::error::Result;

pub type Journal = Rc<RefCell<Vec<String>>>;
pub type Received = Rc<RefCell<Vec<(Option<NodeData>, PortIndex)>>>;

fn port_type_of(id: &str) -> NodeDataType {
    NodeDataType::new(id, id)
}

/// Records every input it receives and forwards it to output 0
pub struct RecordingModel {
    in_type: String,
    out_type: String,
    n_in: usize,
    n_out: usize,
    required: Vec<PortIndex>,
    received: Received,
    journal: Option<Journal>,
    hooks: Rc<RefCell<Vec<String>>>,
    last: Option<NodeData>,
}

impl RecordingModel {
    pub fn new(type_id: &str, n_in: usize, n_out: usize) -> Self {
        Self {
            in_type: type_id.to_string(),
            out_type: type_id.to_string(),
            n_in,
            n_out,
            required: Vec::new(),
            received: Rc::new(RefCell::new(Vec::new())),
            journal: None,
            hooks: Rc::new(RefCell::new(Vec::new())),
            last: None,
        }
    }

    pub fn with_required(mut self, ports: &[PortIndex]) -> Self {
        self.required = ports.to_vec();
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn received(&self) -> Received {
        self.received.clone()
    }

    pub fn hooks(&self) -> Rc<RefCell<Vec<String>>> {
        self.hooks.clone()
    }
}

impl NodeDataModel for RecordingModel {
    fn name(&self) -> &str {
        "Recording"
    }

    fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::In => self.n_in,
            PortType::Out => self.n_out,
            PortType::None => 0,
        }
    }

    fn data_type(&self, port_type: PortType, _index: PortIndex) -> NodeDataType {
        match port_type {
            PortType::Out => port_type_of(&self.out_type),
            _ => port_type_of(&self.in_type),
        }
    }

    fn port_required(&self, index: PortIndex) -> bool {
        self.required.contains(&index)
    }

    fn set_in_data(&mut self, data: Option<NodeData>, port: PortIndex, signals: &mut ModelSignals) {
        if let Some(journal) = &self.journal {
            journal.borrow_mut().push(format!("set_in_data #{port}: {data:?}"));
        }
        self.received.borrow_mut().push((data.clone(), port));
        self.last = data;
        if self.n_out > 0 {
            signals.data_updated(0);
        }
    }

    fn out_data(&mut self, _port: PortIndex) -> Option<NodeData> {
        self.last.clone()
    }

    fn input_connection_created(&mut self, index: PortIndex) {
        self.hooks.borrow_mut().push(format!("input_created #{index}"));
    }

    fn input_connection_deleted(&mut self, index: PortIndex) {
        self.hooks.borrow_mut().push(format!("input_deleted #{index}"));
    }

    fn output_connection_created(&mut self, index: PortIndex) {
        self.hooks.borrow_mut().push(format!("output_created #{index}"));
    }

    fn output_connection_deleted(&mut self, index: PortIndex) {
        self.hooks.borrow_mut().push(format!("output_deleted #{index}"));
    }

    /// `{"inputs": n}` changes the input count; the caller raises `PortsChanged`
    fn restore(&mut self, state: &Value) -> Result<()> {
        if let Some(n_in) = state.get("inputs").and_then(Value::as_u64) {
            self.n_in = n_in as usize;
        }
        Ok(())
    }
}

/// One output holding a settable value
pub struct SourceModel {
    type_id: String,
    value: Rc<RefCell<Option<NodeData>>>,
    policy: ConnectionPolicy,
}

impl SourceModel {
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            value: Rc::new(RefCell::new(None)),
            policy: ConnectionPolicy::Many,
        }
    }

    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_value(self, value: NodeData) -> Self {
        *self.value.borrow_mut() = Some(value);
        self
    }

    /// Shared handle for changing the value after the model is boxed
    pub fn value_handle(&self) -> Rc<RefCell<Option<NodeData>>> {
        self.value.clone()
    }
}

impl NodeDataModel for SourceModel {
    fn name(&self) -> &str {
        "Source"
    }

    fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::Out => 1,
            _ => 0,
        }
    }

    fn data_type(&self, _port_type: PortType, _index: PortIndex) -> NodeDataType {
        port_type_of(&self.type_id)
    }

    fn port_out_connection_policy(&self, _index: PortIndex) -> ConnectionPolicy {
        self.policy
    }

    fn set_in_data(&mut self, _data: Option<NodeData>, _port: PortIndex, _signals: &mut ModelSignals) {}

    fn out_data(&mut self, _port: PortIndex) -> Option<NodeData> {
        self.value.borrow().clone()
    }

    fn save(&self) -> Value {
        match self.value.borrow().as_ref() {
            Some(NodeData::Number(n)) => json!({ "name": self.name(), "value": n }),
            _ => json!({ "name": self.name() }),
        }
    }

    fn restore(&mut self, state: &Value) -> Result<()> {
        if let Some(value) = state.get("value") {
            let data = match value.as_f64() {
                Some(n) => NodeData::Number(n),
                None => serde_json::from_value(value.clone())?,
            };
            *self.value.borrow_mut() = Some(data);
        }
        Ok(())
    }
}

#[derive(Default)]
struct DeferredState {
    pending: VecDeque<(NodeData, ConversionHandle)>,
    cancels: Cell<usize>,
}

/// Converter that holds every request until the test finishes it by hand.
/// Clones share their pending list.
#[derive(Clone, Default)]
pub struct DeferredConverter {
    state: Rc<RefCell<DeferredState>>,
}

impl DeferredConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self, from: NodeDataType, to: NodeDataType) -> RegisteredConverter {
        RegisteredConverter::new(TypeConverterId::new(from, to), Box::new(self.clone()))
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn cancel_count(&self) -> usize {
        self.state.borrow().cancels.get()
    }

    /// Finishes the oldest pending request; false if none or discarded
    pub fn finish_next(&self, data: Option<NodeData>) -> bool {
        let next = self.state.borrow_mut().pending.pop_front();
        match next {
            Some((_, handle)) => handle.finish(data),
            None => false,
        }
    }

    /// Input of the oldest pending request
    pub fn peek_input(&self) -> Option<NodeData> {
        self.state.borrow().pending.front().map(|(data, _)| data.clone())
    }
}

impl TypeConverter for DeferredConverter {
    fn apply(&mut self, data: NodeData, completion: ConversionHandle) {
        self.state.borrow_mut().pending.push_back((data, completion));
    }

    fn create_new(&self) -> Box<dyn TypeConverter> {
        Box::new(self.clone())
    }

    fn cancel(&mut self) {
        let state = self.state.borrow();
        state.cancels.set(state.cancels.get() + 1);
    }
}
