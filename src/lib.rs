//! Nodeflow core library
//!
//! A data-flow node graph engine: nodes with typed ports, connections that
//! carry values from output ports to input ports (converting between types
//! when needed), and a graph that owns both and drives propagation.

pub mod config;
pub mod error;
pub mod nodes;

// Re-export commonly used types
pub use config::SceneConfig;
pub use error::{GraphError, Result};
pub use nodes::{
    Connection, ConnectionId, DataModelRegistry, GraphEvent, Node, NodeData, NodeDataModel, NodeDataType,
    NodeGraph, NodeId, PortIndex, PortType,
};
