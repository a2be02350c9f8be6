use thiserror::Error;

use crate::nodes::{ConnectionId, NodeDataType, NodeId, PortIndex, PortType};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),
    #[error("Port {port_type:?} #{index} out of range for node {node} ({count} ports)")]
    PortOutOfRange {
        node: NodeId,
        port_type: PortType,
        index: PortIndex,
        count: usize,
    },
    #[error("Port {port_type:?} #{index} on node {node} does not accept another connection")]
    PortOccupied {
        node: NodeId,
        port_type: PortType,
        index: PortIndex,
    },
    #[error("No converter from {from} to {to}")]
    IncompatibleTypes { from: NodeDataType, to: NodeDataType },
    #[error("Connection {0} is already complete")]
    ConnectionAlreadyComplete(ConnectionId),
    #[error("Connection requires a {required:?} port, got {given:?}")]
    WrongPortSide { required: PortType, given: PortType },
    #[error("Cannot connect node {0} to itself")]
    SelfConnection(NodeId),
    #[error("Unknown node model: {0}")]
    UnknownModel(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Connection record {0} has no endpoints")]
    IncompleteRecord(ConnectionId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid identifier: {0}")]
    Uuid(#[from] uuid::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
