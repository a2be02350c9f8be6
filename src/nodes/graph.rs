//! Node graph: owns every node and connection by identifier
//!
//! The graph is the only authority over which nodes and connections exist.
//! All structural edits and all synchronous propagation happen inside the
//! call that triggers them. Deferred conversions are the one exception: they
//! are delivered when [`NodeGraph::process_conversions`] runs.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

use super::connection::{Connection, ConnectionId, ConnectionRecord, Delivery, InboundData, PortEnd};
use super::converter::{ConversionQueue, RegisteredConverter, TypeConverterId};
use super::data::{NodeData, NodeDataType};
use super::events::{EventEmitter, GraphEvent, SubscriptionId};
use super::model::{ModelSignal, ModelSignals, NodeDataModel};
use super::node::{Node, NodeId, NodeMap, NodeRecord};
use super::port::{PortAddress, PortIndex, PortType};
use super::registry::DataModelRegistry;
use crate::config::SceneConfig;
use crate::error::{GraphError, Result};

/// Saved form of a whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
}

pub struct NodeGraph {
    nodes: NodeMap,
    connections: HashMap<ConnectionId, Connection>,
    registry: Rc<DataModelRegistry>,
    config: SceneConfig,
    events: EventEmitter,
    conversions: ConversionQueue,
}

impl NodeGraph {
    /// Creates a new empty node graph
    pub fn new(registry: Rc<DataModelRegistry>, config: SceneConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            connections: HashMap::new(),
            registry,
            config,
            events: EventEmitter::new(),
            conversions: ConversionQueue::new(),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn registry(&self) -> &Rc<DataModelRegistry> {
        &self.registry
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GraphEvent) + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn node_ref(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Adds a node to the graph and returns its ID
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::InvalidRecord(format!("node {id} already exists")));
        }
        debug!("Adding node {} ({})", id, node.model().name());
        self.nodes.insert(id, node);
        self.events.emit(GraphEvent::NodeCreated(id));
        Ok(id)
    }

    pub fn create_node(&mut self, model: Box<dyn NodeDataModel>) -> NodeId {
        let node = Node::new(model);
        let id = node.id();
        debug!("Adding node {} ({})", id, node.model().name());
        self.nodes.insert(id, node);
        self.events.emit(GraphEvent::NodeCreated(id));
        id
    }

    /// Creates a node from a model registered under `name`
    pub fn create_node_by_name(&mut self, name: &str) -> Result<NodeId> {
        let model = self
            .registry
            .create(name)
            .ok_or_else(|| GraphError::UnknownModel(name.to_string()))?;
        Ok(self.create_node(model))
    }

    /// Recreates a saved node under its saved identifier
    pub fn restore_node(&mut self, record: &NodeRecord) -> Result<NodeId> {
        let node = Node::from_record(record, &self.registry)?;
        self.add_node(node)
    }

    /// Removes a node and all its connections
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let doomed = self.node_ref(id)?.node_state().all_connections();

        // Deleting one connection can cascade into deleting others
        for connection in doomed {
            if self.connections.contains_key(&connection) {
                self.delete_connection(connection)?;
            }
        }

        self.nodes.remove(&id);
        debug!("Removed node {}", id);
        self.events.emit(GraphEvent::NodeDeleted(id));
        Ok(())
    }

    /// Starts a connection from one port; the other end stays required
    pub fn create_connection(&mut self, port_type: PortType, node: NodeId, index: PortIndex) -> Result<ConnectionId> {
        if port_type == PortType::None {
            return Err(GraphError::WrongPortSide {
                required: PortType::Out,
                given: port_type,
            });
        }
        let connection = Connection::new_anchored(port_type, node, index);
        let id = connection.id();
        self.node_mut(node)?.attach_connection(port_type, index, id)?;
        self.connections.insert(id, connection);

        debug!("Started connection {} from {:?} #{} on {}", id, port_type, index, node);
        self.events.emit(GraphEvent::ConnectionUpdated(id));
        Ok(id)
    }

    /// Supplies the missing end of a started connection, then pushes the
    /// out-port's current value through it
    pub fn complete_connection(&mut self, id: ConnectionId, node: NodeId, index: PortIndex) -> Result<()> {
        let connection = self.connections.get(&id).ok_or(GraphError::ConnectionNotFound(id))?;
        if connection.complete() {
            return Err(GraphError::ConnectionAlreadyComplete(id));
        }
        let required = connection.required_port();
        let anchor = connection
            .end(required.opposite())
            .ok_or(GraphError::ConnectionNotFound(id))?;
        let supplied = PortEnd::new(node, index);
        let (in_end, out_end) = match required {
            PortType::In => (supplied, anchor),
            PortType::Out => (anchor, supplied),
            PortType::None => return Err(GraphError::ConnectionAlreadyComplete(id)),
        };

        let registry = Rc::clone(&self.registry);
        let converter = self.check_connectable(&registry, in_end, out_end, None)?;
        self.node_mut(node)?.attach_connection(required, index, id)?;

        let Some(connection) = self.connections.get_mut(&id) else {
            return Err(GraphError::ConnectionNotFound(id));
        };
        connection.set_type_converter(converter);
        connection.set_node_to_port(node, required, index, &mut self.events);

        self.finish_creation(id, in_end, out_end);
        Ok(())
    }

    /// Connects an output port to an input port in one step
    pub fn connect(
        &mut self,
        out_node: NodeId,
        out_index: PortIndex,
        in_node: NodeId,
        in_index: PortIndex,
    ) -> Result<ConnectionId> {
        self.insert_complete(
            PortEnd::new(in_node, in_index),
            PortEnd::new(out_node, out_index),
            None,
            None,
        )
    }

    /// Recreates a saved connection under its saved identifier
    pub fn restore_connection(&mut self, record: &ConnectionRecord) -> Result<ConnectionId> {
        let (in_end, out_end) = record.ends().ok_or(GraphError::IncompleteRecord(record.id))?;
        self.insert_complete(in_end, out_end, Some(record.id), record.converter.as_ref())
    }

    fn insert_complete(
        &mut self,
        in_end: PortEnd,
        out_end: PortEnd,
        id: Option<ConnectionId>,
        converter_hint: Option<&TypeConverterId>,
    ) -> Result<ConnectionId> {
        if let Some(id) = id.filter(|id| self.connections.contains_key(id)) {
            return Err(GraphError::InvalidRecord(format!("connection {id} already exists")));
        }
        let registry = Rc::clone(&self.registry);
        let converter = self.check_connectable(&registry, in_end, out_end, converter_hint)?;

        // Both ports must accept before either registers
        for (end, port_type) in [(in_end, PortType::In), (out_end, PortType::Out)] {
            if !self.node_ref(end.node)?.can_attach(port_type, end.index) {
                return Err(GraphError::PortOccupied {
                    node: end.node,
                    port_type,
                    index: end.index,
                });
            }
        }

        let connection = Connection::new_complete(in_end, out_end, converter, id);
        let id = connection.id();
        for (end, port_type) in [(in_end, PortType::In), (out_end, PortType::Out)] {
            self.node_mut(end.node)?.attach_connection(port_type, end.index, id)?;
        }
        self.connections.insert(id, connection);

        self.finish_creation(id, in_end, out_end);
        Ok(id)
    }

    /// Validates endpoints and types; returns the converter to bind, if any
    fn check_connectable<'r>(
        &self,
        registry: &'r DataModelRegistry,
        in_end: PortEnd,
        out_end: PortEnd,
        converter_hint: Option<&TypeConverterId>,
    ) -> Result<Option<&'r RegisteredConverter>> {
        if in_end.node == out_end.node && !self.config.allow_self_connections {
            return Err(GraphError::SelfConnection(in_end.node));
        }
        let out_node = self.node_ref(out_end.node)?;
        let in_node = self.node_ref(in_end.node)?;
        out_node.check_port(PortType::Out, out_end.index)?;
        in_node.check_port(PortType::In, in_end.index)?;

        let from = out_node.model().data_type(PortType::Out, out_end.index);
        let to = in_node.model().data_type(PortType::In, in_end.index);

        if let Some(pair) = converter_hint {
            if !pair_matches_ports(pair, &from, &to) {
                return Err(GraphError::InvalidRecord(format!(
                    "converter {pair} does not fit ports {} -> {}",
                    from.id, to.id
                )));
            }
        }
        if from.can_connect_to(&to) {
            return Ok(None);
        }
        self.resolve_converter(registry, from, to).map(Some)
    }

    /// Registered converter for differing port types, if conversion is allowed
    fn resolve_converter<'r>(
        &self,
        registry: &'r DataModelRegistry,
        from: NodeDataType,
        to: NodeDataType,
    ) -> Result<&'r RegisteredConverter> {
        if !self.config.allow_type_conversion {
            return Err(GraphError::IncompatibleTypes { from, to });
        }
        match registry.get_type_converter(&from, &to) {
            Some(converter) => Ok(converter),
            None => Err(GraphError::IncompatibleTypes { from, to }),
        }
    }

    fn finish_creation(&mut self, id: ConnectionId, in_end: PortEnd, out_end: PortEnd) {
        info!(
            "Connected {} #{} -> {} #{} ({})",
            out_end.node, out_end.index, in_end.node, in_end.index, id
        );
        self.events.emit(GraphEvent::ConnectionCreated(id));

        if let Some(node) = self.nodes.get_mut(&in_end.node) {
            node.model_mut().input_connection_created(in_end.index);
        }
        if let Some(node) = self.nodes.get_mut(&out_end.node) {
            node.model_mut().output_connection_created(out_end.index);
        }

        let Some(node) = self.nodes.get_mut(&out_end.node) else {
            return;
        };
        let data = node.model_mut().out_data(out_end.index);
        self.route(id, data, 0);
    }

    /// Deletes a connection. A complete one reports `ConnectionMadeIncomplete`,
    /// then its in-node receives empty data, then both ends detach.
    pub fn delete_connection(&mut self, id: ConnectionId) -> Result<()> {
        let mut connection = self
            .connections
            .remove(&id)
            .ok_or(GraphError::ConnectionNotFound(id))?;
        let was_complete = connection.complete();
        let in_end = connection.end(PortType::In);
        let out_end = connection.end(PortType::Out);

        connection.cancel_conversion();
        connection.remove_from_nodes(&mut self.nodes);

        if out_end.is_some() {
            connection.clear_node(PortType::Out, &mut self.events);
        }
        if let Delivery::Direct(inbound) = connection.propagate_empty_data(&self.conversions) {
            self.deliver(inbound, 0);
        }
        if in_end.is_some() {
            connection.clear_node(PortType::In, &mut self.events);
        }

        if was_complete {
            if let Some(end) = in_end {
                if let Some(node) = self.nodes.get_mut(&end.node) {
                    node.model_mut().input_connection_deleted(end.index);
                }
            }
            if let Some(end) = out_end {
                if let Some(node) = self.nodes.get_mut(&end.node) {
                    node.model_mut().output_connection_deleted(end.index);
                }
            }
        }

        debug!("Deleted connection {}", id);
        self.events.emit(GraphEvent::ConnectionDeleted(id));
        Ok(())
    }

    /// Rebinds a connection's converter, or clears it. The pair must be
    /// exactly the connection's (out type, in type), and `None` is only
    /// accepted when those types are equal.
    pub fn set_connection_converter(&mut self, id: ConnectionId, pair: Option<&TypeConverterId>) -> Result<()> {
        let connection = self.connections.get(&id).ok_or(GraphError::ConnectionNotFound(id))?;
        let (Some(from), Some(to)) = (
            connection.port_data_type(PortType::Out, &self.nodes),
            connection.port_data_type(PortType::In, &self.nodes),
        ) else {
            return Err(GraphError::InvalidRecord(format!("connection {id} is not complete")));
        };

        let registry = Rc::clone(&self.registry);
        let converter = match pair {
            Some(pair) if !pair_matches_ports(pair, &from, &to) => {
                return Err(GraphError::IncompatibleTypes {
                    from: pair.from.clone(),
                    to: pair.to.clone(),
                });
            }
            Some(_) => Some(self.resolve_converter(&registry, from, to)?),
            None if from.can_connect_to(&to) => None,
            None => return Err(GraphError::IncompatibleTypes { from, to }),
        };

        let connection = self
            .connections
            .get_mut(&id)
            .ok_or(GraphError::ConnectionNotFound(id))?;
        connection.set_type_converter(converter);
        Ok(())
    }

    /// Pushes a value into one input port of a node
    pub fn propagate_data(&mut self, node: NodeId, in_port: PortIndex, data: Option<NodeData>) -> Result<()> {
        self.node_ref(node)?.check_port(PortType::In, in_port)?;
        self.deliver(
            InboundData {
                node,
                port: in_port,
                data,
            },
            0,
        );
        Ok(())
    }

    /// Pulls the current value of an output port and pushes it into every
    /// connection registered there
    pub fn on_data_updated(&mut self, node: NodeId, out_port: PortIndex) -> Result<()> {
        self.node_ref(node)?.check_port(PortType::Out, out_port)?;
        self.fan_out(node, out_port, 0);
        Ok(())
    }

    /// Runs `update` against a node's model, then acts on what it signalled
    pub fn update_model<F>(&mut self, node: NodeId, update: F) -> Result<()>
    where
        F: FnOnce(&mut dyn NodeDataModel, &mut ModelSignals),
    {
        let signals = self.node_mut(node)?.update_model(update);
        self.dispatch_signals(node, signals, 0);
        Ok(())
    }

    /// Delivers every finished conversion; returns how many reached a node
    pub fn process_conversions(&mut self) -> usize {
        self.drain_conversions(0)
    }

    fn deliver(&mut self, inbound: InboundData, depth: usize) {
        let Some(node) = self.nodes.get_mut(&inbound.node) else {
            debug!("Dropping data for missing node {}", inbound.node);
            return;
        };
        if node.check_port(PortType::In, inbound.port).is_err() {
            warn!("Dropping data for missing input #{} on {}", inbound.port, inbound.node);
            return;
        }
        let signals = node.propagate_data(inbound.data, inbound.port);
        self.dispatch_signals(inbound.node, signals, depth);
    }

    fn dispatch_signals(&mut self, node: NodeId, signals: ModelSignals, depth: usize) {
        for signal in signals {
            match signal {
                ModelSignal::DataUpdated(port) => {
                    self.events.emit(GraphEvent::DataUpdated { node, port });
                    self.fan_out(node, port, depth + 1);
                }
                ModelSignal::DataInvalidated(port) => {
                    self.events.emit(GraphEvent::DataInvalidated { node, port });
                }
                ModelSignal::PortsChanged => {
                    self.sync_node_ports(node);
                    self.events.emit(GraphEvent::PortsChanged(node));
                }
                ModelSignal::ComputingStarted => self.events.emit(GraphEvent::ComputingStarted(node)),
                ModelSignal::ComputingFinished => self.events.emit(GraphEvent::ComputingFinished(node)),
            }
        }
    }

    fn fan_out(&mut self, node: NodeId, out_port: PortIndex, depth: usize) {
        if depth > self.config.max_propagation_depth {
            warn!(
                "Propagation from {} #{} cut off at depth {} (cycle?)",
                node, out_port, depth
            );
            return;
        }
        let Some(source) = self.nodes.get_mut(&node) else {
            return;
        };
        if source.check_port(PortType::Out, out_port).is_err() {
            return;
        }
        let fanout = source.on_data_updated(out_port);
        for connection in fanout.connections {
            self.route(connection, fanout.data.clone(), depth);
        }
    }

    fn route(&mut self, id: ConnectionId, data: Option<NodeData>, depth: usize) {
        let Some(connection) = self.connections.get_mut(&id) else {
            debug!("Dropping data for missing connection {}", id);
            return;
        };
        match connection.set_in_data(data, &self.conversions) {
            Delivery::Direct(inbound) => self.deliver(inbound, depth),
            Delivery::Deferred => {
                self.drain_conversions(depth);
            }
            Delivery::Dropped => trace!("Connection {} has no in-node", id),
        }
    }

    fn drain_conversions(&mut self, depth: usize) -> usize {
        let mut delivered = 0;
        while let Some(result) = self.conversions.try_next() {
            let Some(connection) = self.connections.get(&result.connection) else {
                debug!("Dropping conversion for deleted connection {}", result.connection);
                continue;
            };
            if result.is_cancelled() || !connection.accepts_result(result.generation) {
                debug!("Dropping stale conversion on {}", result.connection);
                continue;
            }
            if let Some(inbound) = connection.propagate_data(result.data) {
                self.deliver(inbound, depth);
                delivered += 1;
            }
        }
        delivered
    }

    fn sync_node_ports(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        for connection in node.sync_ports() {
            debug!("Port of {} vanished, deleting {}", id, connection);
            if let Err(e) = self.delete_connection(connection) {
                debug!("{}", e);
            }
        }
    }

    /// Required input ports that have no connection
    pub fn unsatisfied_inputs(&self) -> Vec<PortAddress> {
        let mut missing: Vec<PortAddress> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.missing_required_inputs()
                    .into_iter()
                    .map(move |index| PortAddress::input(node.id(), index))
            })
            .collect();
        missing.sort_by_key(|address| (address.node_id, address.index));
        missing
    }

    /// Snapshot of every node and every complete connection
    pub fn save(&self) -> GraphRecord {
        let mut nodes: Vec<NodeRecord> = self.nodes.values().map(Node::save).collect();
        nodes.sort_by_key(|record| record.id);
        let mut connections: Vec<ConnectionRecord> = self
            .connections
            .values()
            .filter(|c| c.complete())
            .map(Connection::save)
            .collect();
        connections.sort_by_key(|record| record.id);
        GraphRecord { nodes, connections }
    }

    /// Replaces the current contents with a snapshot. A snapshot that fails
    /// to restore leaves the graph untouched.
    pub fn load(&mut self, record: &GraphRecord) -> Result<()> {
        let mut scratch = NodeGraph::new(Rc::clone(&self.registry), self.config.clone());
        scratch.restore_all(record)?;
        scratch.clear();

        self.clear();
        self.restore_all(record)?;
        info!(
            "Loaded {} nodes and {} connections",
            self.nodes.len(),
            self.connections.len()
        );
        Ok(())
    }

    fn restore_all(&mut self, record: &GraphRecord) -> Result<()> {
        for node in &record.nodes {
            self.restore_node(node)?;
        }
        for connection in &record.connections {
            self.restore_connection(connection)?;
        }
        Ok(())
    }

    pub fn save_to_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.save())?)
    }

    pub fn load_from_str(&mut self, json: &str) -> Result<()> {
        let record: GraphRecord = serde_json::from_str(json)?;
        self.load(&record)
    }

    /// Deletes every connection, then every node
    pub fn clear(&mut self) {
        let connections: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in connections {
            if let Err(e) = self.delete_connection(id) {
                debug!("{}", e);
            }
        }
        let nodes: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in nodes {
            if let Err(e) = self.remove_node(id) {
                debug!("{}", e);
            }
        }
    }
}

/// Converters bind only between differing types, and only for that exact pair
fn pair_matches_ports(pair: &TypeConverterId, from: &NodeDataType, to: &NodeDataType) -> bool {
    pair.from.id == from.id && pair.to.id == to.id && from.id != to.id
}

impl std::fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGraph")
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .field("config", &self.config)
            .finish()
    }
}
