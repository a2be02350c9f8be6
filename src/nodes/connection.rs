//! Connections between an output port and an input port
//!
//! A connection refers to its nodes by [`NodeId`] only; it never owns or
//! keeps a node alive. Every lookup through a [`NodeMap`] tolerates the node
//! being gone. Data does not flow through the connection directly: routing
//! calls return a [`Delivery`] describing where the value must go, and the
//! scene that owns the nodes performs the push.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::connection_state::ConnectionState;
use super::converter::{BoundConverter, ConversionQueue, RegisteredConverter, TypeConverterId};
use super::data::{NodeData, NodeDataType};
use super::events::{EventEmitter, GraphEvent};
use super::node::{NodeId, NodeMap};
use super::port::{PortIndex, PortType};

/// Unique identifier for a connection, stable across save and restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One attached end: a node handle and a port index on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortEnd {
    pub node: NodeId,
    pub index: PortIndex,
}

impl PortEnd {
    pub fn new(node: NodeId, index: PortIndex) -> Self {
        Self { node, index }
    }
}

/// A value bound for a specific input port
#[derive(Debug, Clone, PartialEq)]
pub struct InboundData {
    pub node: NodeId,
    pub port: PortIndex,
    pub data: Option<NodeData>,
}

/// Outcome of pushing a value into a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Push this straight into the in-node
    Direct(InboundData),
    /// Handed to the converter; the result arrives through the conversion queue
    Deferred,
    /// No in-node attached
    Dropped,
}

/// Serialized connection:
/// `{id, in_id, in_index, out_id, out_index, converter?: {in, out}}`.
/// Incomplete connections carry only their id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_index: Option<PortIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_index: Option<PortIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converter: Option<TypeConverterId>,
}

impl ConnectionRecord {
    /// Both ends, if the record describes a complete connection
    pub fn ends(&self) -> Option<(PortEnd, PortEnd)> {
        match (self.in_id, self.in_index, self.out_id, self.out_index) {
            (Some(in_id), Some(in_index), Some(out_id), Some(out_index)) => {
                Some((PortEnd::new(in_id, in_index), PortEnd::new(out_id, out_index)))
            }
            _ => None,
        }
    }
}

pub struct Connection {
    id: ConnectionId,
    in_end: Option<PortEnd>,
    out_end: Option<PortEnd>,
    state: ConnectionState,
    converter: Option<BoundConverter>,
}

impl Connection {
    /// New connection attached to one port; the opposite end is required
    pub fn new_anchored(port_type: PortType, node: NodeId, index: PortIndex) -> Self {
        debug_assert!(port_type != PortType::None, "anchored connection needs a side");
        let mut connection = Self::empty(ConnectionId::new());
        *connection.end_mut(port_type) = Some(PortEnd::new(node, index));
        connection.state.set_required_port(port_type.opposite());
        connection
    }

    /// New connection between two ports, optionally reusing a saved id.
    /// A given converter is cloned, never shared.
    pub fn new_complete(
        in_end: PortEnd,
        out_end: PortEnd,
        converter: Option<&RegisteredConverter>,
        id: Option<ConnectionId>,
    ) -> Self {
        let mut connection = Self::empty(id.unwrap_or_default());
        connection.in_end = Some(in_end);
        connection.out_end = Some(out_end);
        connection.set_type_converter(converter);
        connection
    }

    fn empty(id: ConnectionId) -> Self {
        Self {
            id,
            in_end: None,
            out_end: None,
            state: ConnectionState::new(),
            converter: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn complete(&self) -> bool {
        self.in_end.is_some() && self.out_end.is_some()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    /// The side still missing, or `PortType::None`
    pub fn required_port(&self) -> PortType {
        self.state.required_port()
    }

    pub fn end(&self, port_type: PortType) -> Option<PortEnd> {
        match port_type {
            PortType::In => self.in_end,
            PortType::Out => self.out_end,
            PortType::None => None,
        }
    }

    fn end_mut(&mut self, port_type: PortType) -> &mut Option<PortEnd> {
        match port_type {
            PortType::In => &mut self.in_end,
            PortType::Out => &mut self.out_end,
            PortType::None => unreachable!("connections have no None end"),
        }
    }

    pub fn node(&self, port_type: PortType) -> Option<NodeId> {
        self.end(port_type).map(|end| end.node)
    }

    pub fn port_index(&self, port_type: PortType) -> Option<PortIndex> {
        self.end(port_type).map(|end| end.index)
    }

    /// Whether either end sits on the given node
    pub fn touches(&self, node: NodeId) -> bool {
        self.node(PortType::In) == Some(node) || self.node(PortType::Out) == Some(node)
    }

    /// Attaches an end. Fires `ConnectionUpdated` every time and
    /// `ConnectionCompleted` only on the incomplete-to-complete transition.
    /// Registering with the node is the caller's job.
    pub fn set_node_to_port(
        &mut self,
        node: NodeId,
        port_type: PortType,
        index: PortIndex,
        events: &mut EventEmitter,
    ) {
        let was_incomplete = !self.complete();
        *self.end_mut(port_type) = Some(PortEnd::new(node, index));
        if self.complete() {
            self.state.set_no_required_port();
        }

        events.emit(GraphEvent::ConnectionUpdated(self.id));
        if was_incomplete && self.complete() {
            debug!("Connection {} completed", self.id);
            events.emit(GraphEvent::ConnectionCompleted(self.id));
        }
    }

    /// Detaches an end, announcing the loss of completeness first
    pub fn clear_node(&mut self, port_type: PortType, events: &mut EventEmitter) {
        if self.complete() {
            events.emit(GraphEvent::ConnectionMadeIncomplete(self.id));
        }
        *self.end_mut(port_type) = None;
    }

    /// Declared type of the port on `port_type`'s end, falling back to
    /// whichever end is attached (In first) while the connection is incomplete
    pub fn data_type(&self, port_type: PortType, nodes: &NodeMap) -> Option<NodeDataType> {
        if self.complete() {
            return self.port_data_type(port_type, nodes);
        }
        [PortType::In, PortType::Out]
            .into_iter()
            .find(|side| self.end(*side).is_some())
            .and_then(|side| self.port_data_type(side, nodes))
    }

    /// Declared type of the port on exactly this end, without fallback
    pub fn port_data_type(&self, port_type: PortType, nodes: &NodeMap) -> Option<NodeDataType> {
        let end = self.end(port_type)?;
        nodes.get(&end.node)?.port_data_type(port_type, end.index)
    }

    /// Type pair of the bound converter
    pub fn type_converter(&self) -> Option<&TypeConverterId> {
        self.converter.as_ref().map(|bound| bound.id())
    }

    /// Binds a private clone of `converter`, or clears the binding with `None`.
    /// Any conversion still running on the previous converter is cancelled.
    pub fn set_type_converter(&mut self, converter: Option<&RegisteredConverter>) {
        self.cancel_conversion();
        self.converter = converter.map(BoundConverter::new);
    }

    /// Requests cancellation of in-flight conversions
    pub fn cancel_conversion(&mut self) {
        if let Some(bound) = self.converter.as_mut() {
            trace!("Cancelling conversion on {}", self.id);
            bound.cancel();
        }
    }

    /// Whether a finished conversion still belongs to the current converter
    pub fn accepts_result(&self, generation: u64) -> bool {
        self.converter
            .as_ref()
            .is_some_and(|bound| bound.generation() == generation)
    }

    /// Routes a value towards the in-node, through the converter if one is bound.
    /// Absent data skips conversion.
    pub fn set_in_data(&mut self, data: Option<NodeData>, queue: &ConversionQueue) -> Delivery {
        if self.in_end.is_none() {
            return Delivery::Dropped;
        }
        if let (Some(bound), Some(value)) = (self.converter.as_mut(), data.as_ref()) {
            trace!("Converting {:?} on {} ({})", value, self.id, bound.id());
            bound.apply(value.clone(), self.id, queue);
            return Delivery::Deferred;
        }
        self.propagate_data(data)
            .map(Delivery::Direct)
            .unwrap_or(Delivery::Dropped)
    }

    /// Final hop: the value goes to the in-node as is
    pub fn propagate_data(&self, data: Option<NodeData>) -> Option<InboundData> {
        self.in_end.map(|end| InboundData {
            node: end.node,
            port: end.index,
            data,
        })
    }

    pub fn propagate_empty_data(&mut self, queue: &ConversionQueue) -> Delivery {
        self.set_in_data(None, queue)
    }

    pub fn save(&self) -> ConnectionRecord {
        let mut record = ConnectionRecord {
            id: self.id,
            in_id: None,
            in_index: None,
            out_id: None,
            out_index: None,
            converter: None,
        };
        if let (Some(in_end), Some(out_end)) = (self.in_end, self.out_end) {
            record.in_id = Some(in_end.node);
            record.in_index = Some(in_end.index);
            record.out_id = Some(out_end.node);
            record.out_index = Some(out_end.index);
            record.converter = self.type_converter().cloned();
        }
        record
    }

    /// Erases this connection from both attached nodes' registries
    pub fn remove_from_nodes(&self, nodes: &mut NodeMap) {
        for port_type in [PortType::In, PortType::Out] {
            let Some(end) = self.end(port_type) else {
                continue;
            };
            match nodes.get_mut(&end.node) {
                Some(node) => {
                    node.erase_connection(port_type, end.index, self.id);
                }
                None => debug!("Connection {} refers to missing node {}", self.id, end.node),
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("in", &self.in_end)
            .field("out", &self.out_end)
            .field("required", &self.state.required_port())
            .field("converter", &self.type_converter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::converter::{FnConverter, TypeConverterId};
    use crate::nodes::node::Node;
    use crate::nodes::test_models::{DeferredConverter, RecordingModel, SourceModel};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(emitter: &mut EventEmitter) -> Rc<RefCell<Vec<GraphEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        emitter.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    fn number_to_text() -> RegisteredConverter {
        RegisteredConverter::new(
            TypeConverterId::new(NodeDataType::number(), NodeDataType::text()),
            Box::new(FnConverter::new(|data: NodeData| {
                data.as_number().map(|n| NodeData::Text(format!("{n}")))
            })),
        )
    }

    #[test]
    fn test_anchored_connection_requires_opposite_end() {
        let node = NodeId::new();
        let connection = Connection::new_anchored(PortType::Out, node, 0);

        assert!(!connection.complete());
        assert_eq!(connection.required_port(), PortType::In);
        assert_eq!(connection.node(PortType::Out), Some(node));
        assert_eq!(connection.port_index(PortType::In), None);
    }

    #[test]
    fn test_completion_fires_once() {
        let mut events = EventEmitter::new();
        let seen = recorder(&mut events);
        let (a, b) = (NodeId::new(), NodeId::new());
        let mut connection = Connection::new_anchored(PortType::Out, a, 0);

        connection.set_node_to_port(b, PortType::In, 0, &mut events);
        assert!(connection.complete());
        assert_eq!(connection.required_port(), PortType::None);

        connection.set_node_to_port(b, PortType::In, 0, &mut events);
        let id = connection.id();
        assert_eq!(
            seen.borrow().as_slice(),
            &[
                GraphEvent::ConnectionUpdated(id),
                GraphEvent::ConnectionCompleted(id),
                GraphEvent::ConnectionUpdated(id),
            ]
        );
    }

    #[test]
    fn test_clear_node_reports_incomplete_once() {
        let mut events = EventEmitter::new();
        let seen = recorder(&mut events);
        let mut connection = Connection::new_complete(
            PortEnd::new(NodeId::new(), 0),
            PortEnd::new(NodeId::new(), 0),
            None,
            None,
        );

        connection.clear_node(PortType::Out, &mut events);
        connection.clear_node(PortType::In, &mut events);

        assert!(!connection.complete());
        assert_eq!(
            seen.borrow().as_slice(),
            &[GraphEvent::ConnectionMadeIncomplete(connection.id())]
        );
    }

    #[test]
    fn test_set_in_data_without_converter_is_direct() {
        let queue = ConversionQueue::new();
        let target = NodeId::new();
        let mut connection = Connection::new_complete(
            PortEnd::new(target, 1),
            PortEnd::new(NodeId::new(), 0),
            None,
            None,
        );

        let delivery = connection.set_in_data(Some(NodeData::Number(42.0)), &queue);
        assert_eq!(
            delivery,
            Delivery::Direct(InboundData {
                node: target,
                port: 1,
                data: Some(NodeData::Number(42.0)),
            })
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_set_in_data_without_in_end_is_dropped() {
        let queue = ConversionQueue::new();
        let mut connection = Connection::new_anchored(PortType::Out, NodeId::new(), 0);
        assert_eq!(connection.set_in_data(Some(NodeData::Boolean(true)), &queue), Delivery::Dropped);
        assert_eq!(connection.propagate_data(None), None);
    }

    #[test]
    fn test_converter_defers_and_tags_generation() {
        let queue = ConversionQueue::new();
        let converter = number_to_text();
        let mut connection = Connection::new_complete(
            PortEnd::new(NodeId::new(), 0),
            PortEnd::new(NodeId::new(), 0),
            Some(&converter),
            None,
        );

        let delivery = connection.set_in_data(Some(NodeData::Number(2.0)), &queue);
        assert_eq!(delivery, Delivery::Deferred);

        let result = queue.try_next().unwrap();
        assert!(connection.accepts_result(result.generation));
        assert_eq!(result.data, Some(NodeData::Text("2".to_string())));

        connection.set_type_converter(Some(&converter));
        assert!(!connection.accepts_result(result.generation));
        assert!(result.is_cancelled());
    }

    #[test]
    fn test_empty_data_skips_converter() {
        let queue = ConversionQueue::new();
        let target = NodeId::new();
        let mut connection = Connection::new_complete(
            PortEnd::new(target, 0),
            PortEnd::new(NodeId::new(), 0),
            Some(&number_to_text()),
            None,
        );

        assert!(matches!(
            connection.propagate_empty_data(&queue),
            Delivery::Direct(InboundData { node, data: None, .. }) if node == target
        ));
    }

    #[test]
    fn test_replacing_converter_cancels_previous() {
        let queue = ConversionQueue::new();
        let deferred = DeferredConverter::new();
        let registered = deferred.registered(NodeDataType::number(), NodeDataType::text());
        let mut connection = Connection::new_complete(
            PortEnd::new(NodeId::new(), 0),
            PortEnd::new(NodeId::new(), 0),
            Some(&registered),
            None,
        );

        connection.set_in_data(Some(NodeData::Number(1.0)), &queue);
        assert_eq!(deferred.pending_count(), 1);

        connection.set_type_converter(None);
        assert_eq!(deferred.cancel_count(), 1);
        assert_eq!(connection.type_converter(), None);
        assert!(!deferred.finish_next(Some(NodeData::Text("late".into()))));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_data_type_falls_back_while_incomplete() {
        let mut nodes = NodeMap::new();
        let source = Node::new(Box::new(SourceModel::new("x")));
        let sink = Node::new(Box::new(RecordingModel::new("y", 1, 0)));
        let (source_id, sink_id) = (source.id(), sink.id());
        nodes.insert(source_id, source);
        nodes.insert(sink_id, sink);

        let mut events = EventEmitter::new();
        let mut connection = Connection::new_anchored(PortType::Out, source_id, 0);
        assert_eq!(connection.data_type(PortType::In, &nodes).unwrap().id, "x");
        assert_eq!(connection.port_data_type(PortType::In, &nodes), None);

        connection.set_node_to_port(sink_id, PortType::In, 0, &mut events);
        assert_eq!(connection.data_type(PortType::In, &nodes).unwrap().id, "y");
        assert_eq!(connection.data_type(PortType::Out, &nodes).unwrap().id, "x");

        nodes.remove(&sink_id);
        assert_eq!(connection.data_type(PortType::In, &nodes), None);
    }

    #[test]
    fn test_save_shapes() {
        let anchored = Connection::new_anchored(PortType::In, NodeId::new(), 0);
        let json = serde_json::to_value(anchored.save()).unwrap();
        assert_eq!(json, serde_json::json!({ "id": anchored.id().to_string() }));

        let (a, b) = (NodeId::new(), NodeId::new());
        let converted = Connection::new_complete(PortEnd::new(b, 1), PortEnd::new(a, 0), Some(&number_to_text()), None);
        let json = serde_json::to_value(converted.save()).unwrap();
        assert_eq!(json["in_id"], serde_json::json!(b.to_string()));
        assert_eq!(json["in_index"], serde_json::json!(1));
        assert_eq!(json["out_index"], serde_json::json!(0));
        assert_eq!(json["converter"]["in"]["id"], serde_json::json!("number"));
        assert_eq!(json["converter"]["out"]["name"], serde_json::json!("Text"));

        let record: ConnectionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.ends(), Some((PortEnd::new(b, 1), PortEnd::new(a, 0))));
    }

    #[test]
    fn test_remove_from_nodes_erases_both_ends() {
        let mut nodes = NodeMap::new();
        let mut source = Node::new(Box::new(SourceModel::new("number")));
        let mut sink = Node::new(Box::new(RecordingModel::new("number", 1, 0)));
        let connection = Connection::new_complete(PortEnd::new(sink.id(), 0), PortEnd::new(source.id(), 0), None, None);
        source.attach_connection(PortType::Out, 0, connection.id()).unwrap();
        sink.attach_connection(PortType::In, 0, connection.id()).unwrap();
        let (source_id, sink_id) = (source.id(), sink.id());
        nodes.insert(source_id, source);
        nodes.insert(sink_id, sink);

        connection.remove_from_nodes(&mut nodes);

        assert_eq!(nodes[&source_id].node_state().connection_count(), 0);
        assert_eq!(nodes[&sink_id].node_state().connection_count(), 0);
    }
}
