//! Node types and core node functionality

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::connection::ConnectionId;
use super::data::{NodeData, NodeDataType};
use super::model::{ConnectionPolicy, ModelSignals, NodeDataModel};
use super::port::{PortIndex, PortType};
use super::registry::DataModelRegistry;
use crate::error::{GraphError, Result};

/// Unique identifier for a node, stable across save and restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Nodes by identifier, as owned by the scene
pub type NodeMap = HashMap<NodeId, Node>;

/// Live connections registered on each port of a node
#[derive(Debug, Clone, Default)]
pub struct NodeState {
    in_connections: Vec<Vec<ConnectionId>>,
    out_connections: Vec<Vec<ConnectionId>>,
}

impl NodeState {
    /// Empty registry sized for the model's ports
    pub fn new(model: &dyn NodeDataModel) -> Self {
        Self {
            in_connections: vec![Vec::new(); model.n_ports(PortType::In)],
            out_connections: vec![Vec::new(); model.n_ports(PortType::Out)],
        }
    }

    fn entries(&self, port_type: PortType) -> &[Vec<ConnectionId>] {
        match port_type {
            PortType::In => &self.in_connections,
            PortType::Out => &self.out_connections,
            PortType::None => &[],
        }
    }

    fn entries_mut(&mut self, port_type: PortType) -> Option<&mut Vec<Vec<ConnectionId>>> {
        match port_type {
            PortType::In => Some(&mut self.in_connections),
            PortType::Out => Some(&mut self.out_connections),
            PortType::None => None,
        }
    }

    /// Connections attached at a port; empty for unknown ports
    pub fn connections(&self, port_type: PortType, index: PortIndex) -> &[ConnectionId] {
        self.entries(port_type)
            .get(index)
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_port_empty(&self, port_type: PortType, index: PortIndex) -> bool {
        self.connections(port_type, index).is_empty()
    }

    /// Inputs hold a single connection; outputs follow their policy
    pub fn can_accept(&self, port_type: PortType, index: PortIndex, policy: ConnectionPolicy) -> bool {
        if self.is_port_empty(port_type, index) {
            return true;
        }
        port_type == PortType::Out && policy == ConnectionPolicy::Many
    }

    /// Registers a connection. Rejects without mutating if the port is full.
    pub fn set_connection(
        &mut self,
        port_type: PortType,
        index: PortIndex,
        connection: ConnectionId,
        policy: ConnectionPolicy,
    ) -> bool {
        if !self.can_accept(port_type, index, policy) {
            return false;
        }
        let Some(bucket) = self.entries_mut(port_type).and_then(|e| e.get_mut(index)) else {
            debug_assert!(false, "port {port_type:?} #{index} does not exist");
            return false;
        };
        if !bucket.contains(&connection) {
            bucket.push(connection);
        }
        true
    }

    pub fn erase_connection(&mut self, port_type: PortType, index: PortIndex, connection: ConnectionId) -> bool {
        let Some(bucket) = self.entries_mut(port_type).and_then(|e| e.get_mut(index)) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|id| *id != connection);
        bucket.len() != before
    }

    /// Every connection touching this node, each listed once
    pub fn all_connections(&self) -> Vec<ConnectionId> {
        let mut all = Vec::new();
        for id in self.in_connections.iter().chain(&self.out_connections).flatten() {
            if !all.contains(id) {
                all.push(*id);
            }
        }
        all
    }

    pub fn connection_count(&self) -> usize {
        self.in_connections.iter().chain(&self.out_connections).map(Vec::len).sum()
    }

    /// Resizes to new port counts, returning connections on ports that vanished
    pub fn resize(&mut self, n_in: usize, n_out: usize) -> Vec<ConnectionId> {
        let mut dropped = Vec::new();
        for (entries, count) in [(&mut self.in_connections, n_in), (&mut self.out_connections, n_out)] {
            if entries.len() > count {
                dropped.extend(entries.drain(count..).flatten());
            } else {
                entries.resize_with(count, Vec::new);
            }
        }
        dropped
    }
}

/// Current output value of a port plus every connection it should reach
#[derive(Debug, Clone)]
pub struct OutputFanout {
    pub data: Option<NodeData>,
    pub connections: Vec<ConnectionId>,
}

/// Saved form of a node: identifier plus the model's own state.
/// Unknown keys (e.g. host geometry) are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub model: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeRecord {
    /// Model name stored in the record
    pub fn model_name(&self) -> Result<&str> {
        self.model
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::InvalidRecord(format!("node {} has no model name", self.id)))
    }
}

/// A graph node: owns one model for its whole lifetime
pub struct Node {
    id: NodeId,
    model: Box<dyn NodeDataModel>,
    state: NodeState,
    extra: Map<String, Value>,
}

impl Node {
    /// Creates a node with a fresh identifier
    pub fn new(model: Box<dyn NodeDataModel>) -> Self {
        Self::with_id(NodeId::new(), model)
    }

    pub fn with_id(id: NodeId, model: Box<dyn NodeDataModel>) -> Self {
        let state = NodeState::new(model.as_ref());
        Self {
            id,
            model,
            state,
            extra: Map::new(),
        }
    }

    /// Recreates a node from its record, building the model by name
    pub fn from_record(record: &NodeRecord, registry: &DataModelRegistry) -> Result<Self> {
        let name = record.model_name()?;
        let model = registry
            .create(name)
            .ok_or_else(|| GraphError::UnknownModel(name.to_string()))?;
        let mut node = Node::with_id(record.id, model);
        node.restore(record)?;
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn model(&self) -> &dyn NodeDataModel {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn NodeDataModel {
        self.model.as_mut()
    }

    pub fn node_state(&self) -> &NodeState {
        &self.state
    }

    pub fn n_ports(&self, port_type: PortType) -> usize {
        match port_type {
            PortType::None => 0,
            _ => self.model.n_ports(port_type),
        }
    }

    /// Fails with `PortOutOfRange` unless the port exists
    pub fn check_port(&self, port_type: PortType, index: PortIndex) -> Result<()> {
        let count = self.n_ports(port_type);
        if port_type == PortType::None || index >= count {
            return Err(GraphError::PortOutOfRange {
                node: self.id,
                port_type,
                index,
                count,
            });
        }
        Ok(())
    }

    /// Declared type of a port, if the port exists
    pub fn port_data_type(&self, port_type: PortType, index: PortIndex) -> Option<NodeDataType> {
        self.check_port(port_type, index)
            .ok()
            .map(|_| self.model.data_type(port_type, index))
    }

    fn policy(&self, port_type: PortType, index: PortIndex) -> ConnectionPolicy {
        match port_type {
            PortType::Out => self.model.port_out_connection_policy(index),
            _ => ConnectionPolicy::One,
        }
    }

    pub fn can_attach(&self, port_type: PortType, index: PortIndex) -> bool {
        self.check_port(port_type, index).is_ok()
            && self.state.can_accept(port_type, index, self.policy(port_type, index))
    }

    /// Records a connection on a port, enforcing the port's connection policy
    pub fn attach_connection(&mut self, port_type: PortType, index: PortIndex, connection: ConnectionId) -> Result<()> {
        self.check_port(port_type, index)?;
        let policy = self.policy(port_type, index);
        if !self.state.set_connection(port_type, index, connection, policy) {
            debug!("Node {} rejected {} on {:?} #{}", self.id, connection, port_type, index);
            return Err(GraphError::PortOccupied {
                node: self.id,
                port_type,
                index,
            });
        }
        Ok(())
    }

    pub fn erase_connection(&mut self, port_type: PortType, index: PortIndex, connection: ConnectionId) -> bool {
        self.state.erase_connection(port_type, index, connection)
    }

    /// Pushes incoming data into the model
    pub fn propagate_data(&mut self, data: Option<NodeData>, in_port: PortIndex) -> ModelSignals {
        trace!("Node {} receives {:?} on input #{}", self.id, data, in_port);
        let mut signals = ModelSignals::new();
        self.model.set_in_data(data, in_port, &mut signals);
        signals
    }

    /// Fetches the model's output and the connections it must reach
    pub fn on_data_updated(&mut self, out_port: PortIndex) -> OutputFanout {
        OutputFanout {
            data: self.model.out_data(out_port),
            connections: self.state.connections(PortType::Out, out_port).to_vec(),
        }
    }

    /// Lets the host touch the model and collect whatever it signals
    pub fn update_model<F>(&mut self, update: F) -> ModelSignals
    where
        F: FnOnce(&mut dyn NodeDataModel, &mut ModelSignals),
    {
        let mut signals = ModelSignals::new();
        update(self.model.as_mut(), &mut signals);
        signals
    }

    /// Re-reads port counts from the model; returns connections left on removed ports
    pub fn sync_ports(&mut self) -> Vec<ConnectionId> {
        let n_in = self.model.n_ports(PortType::In);
        let n_out = self.model.n_ports(PortType::Out);
        self.state.resize(n_in, n_out)
    }

    /// Required inputs that currently have no connection
    pub fn missing_required_inputs(&self) -> Vec<PortIndex> {
        (0..self.n_ports(PortType::In))
            .filter(|&i| self.model.port_required(i) && self.state.is_port_empty(PortType::In, i))
            .collect()
    }

    pub fn save(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            model: self.model.save(),
            extra: self.extra.clone(),
        }
    }

    /// Restores model state; the identifier is fixed at construction
    pub fn restore(&mut self, record: &NodeRecord) -> Result<()> {
        self.model.restore(&record.model)?;
        self.extra = record.extra.clone();
        let dropped = self.sync_ports();
        debug_assert!(dropped.is_empty(), "restore on a connected node");
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("model", &self.model.name())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_models::{RecordingModel, SourceModel};

    #[test]
    fn test_node_state_sized_from_model() {
        let node = Node::new(Box::new(RecordingModel::new("number", 2, 1)));
        assert_eq!(node.n_ports(PortType::In), 2);
        assert_eq!(node.n_ports(PortType::Out), 1);
        assert!(node.node_state().is_port_empty(PortType::In, 1));
        assert!(node.check_port(PortType::In, 2).is_err());
        assert!(node.check_port(PortType::None, 0).is_err());
    }

    #[test]
    fn test_input_port_holds_one_connection() {
        let mut node = Node::new(Box::new(RecordingModel::new("number", 1, 0)));
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        node.attach_connection(PortType::In, 0, first).unwrap();
        let err = node.attach_connection(PortType::In, 0, second).unwrap_err();
        assert!(matches!(err, GraphError::PortOccupied { .. }));
        assert_eq!(node.node_state().connections(PortType::In, 0), &[first]);
    }

    #[test]
    fn test_one_policy_output_rejects_second_connection() {
        let mut node = Node::new(Box::new(SourceModel::new("number").with_policy(ConnectionPolicy::One)));
        let first = ConnectionId::new();

        node.attach_connection(PortType::Out, 0, first).unwrap();
        assert!(!node.can_attach(PortType::Out, 0));
        assert!(node.attach_connection(PortType::Out, 0, ConnectionId::new()).is_err());
        assert_eq!(node.node_state().connections(PortType::Out, 0), &[first]);
    }

    #[test]
    fn test_many_policy_output_fans_out() {
        let mut node = Node::new(Box::new(SourceModel::new("number").with_value(NodeData::Number(3.0))));
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        node.attach_connection(PortType::Out, 0, a).unwrap();
        node.attach_connection(PortType::Out, 0, b).unwrap();

        let fanout = node.on_data_updated(0);
        assert_eq!(fanout.data, Some(NodeData::Number(3.0)));
        assert_eq!(fanout.connections, vec![a, b]);

        assert!(node.erase_connection(PortType::Out, 0, a));
        assert!(!node.erase_connection(PortType::Out, 0, a));
        assert_eq!(node.node_state().connection_count(), 1);
    }

    #[test]
    fn test_missing_required_inputs() {
        let mut node = Node::new(Box::new(RecordingModel::new("number", 2, 0).with_required(&[1])));
        assert_eq!(node.missing_required_inputs(), vec![1]);

        node.attach_connection(PortType::In, 1, ConnectionId::new()).unwrap();
        assert!(node.missing_required_inputs().is_empty());
    }

    #[test]
    fn test_resize_drops_connections_on_removed_ports() {
        let mut state = NodeState::default();
        state.resize(2, 1);
        let kept = ConnectionId::new();
        let lost = ConnectionId::new();
        state.set_connection(PortType::In, 0, kept, ConnectionPolicy::One);
        state.set_connection(PortType::In, 1, lost, ConnectionPolicy::One);

        assert_eq!(state.resize(1, 1), vec![lost]);
        assert_eq!(state.all_connections(), vec![kept]);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut registry = DataModelRegistry::new();
        registry.register_model("Source", || Box::new(SourceModel::new("number")));

        let mut node = Node::new(Box::new(SourceModel::new("number")));
        node.model_mut()
            .restore(&serde_json::json!({ "name": "Source", "value": 42.0 }))
            .unwrap();
        let mut record = node.save();
        record.extra.insert("position".into(), serde_json::json!([10.0, 20.0]));

        let json = serde_json::to_string(&record).unwrap();
        let parsed: NodeRecord = serde_json::from_str(&json).unwrap();
        let mut restored = Node::from_record(&parsed, &registry).unwrap();

        assert_eq!(restored.id(), node.id());
        assert_eq!(restored.on_data_updated(0).data, Some(NodeData::Number(42.0)));
        assert_eq!(restored.save().extra.get("position"), Some(&serde_json::json!([10.0, 20.0])));
    }

    #[test]
    fn test_unknown_model_fails_restore() {
        let registry = DataModelRegistry::new();
        let record = NodeRecord {
            id: NodeId::new(),
            model: serde_json::json!({ "name": "Missing" }),
            extra: Map::new(),
        };
        assert!(matches!(
            Node::from_record(&record, &registry),
            Err(GraphError::UnknownModel(name)) if name == "Missing"
        ));
    }
}
