//! Node system - Core data structures and generic node implementations

// Core node system modules
pub mod connection;
pub mod connection_state;
pub mod converter;
pub mod data;
pub mod events;
pub mod graph;
pub mod model;
pub mod node;
pub mod port;
pub mod registry;

// Generic node implementations
pub mod math;

#[cfg(test)]
pub(crate) mod test_models;

// Re-export core types
pub use connection::{Connection, ConnectionId, ConnectionRecord, Delivery, InboundData, PortEnd};
pub use connection_state::ConnectionState;
pub use converter::{
    CancelToken, ConversionHandle, ConversionQueue, ConversionResult, FnConverter, RegisteredConverter,
    TypeConverter, TypeConverterId,
};
pub use data::{NodeData, NodeDataType};
pub use events::{EventEmitter, GraphEvent, SubscriptionId};
pub use graph::{GraphRecord, NodeGraph};
pub use model::{ConnectionPolicy, ModelSignal, ModelSignals, NodeDataModel, NodeValidationState};
pub use node::{Node, NodeId, NodeMap, NodeRecord, NodeState, OutputFanout};
pub use port::{opposite_port, PortAddress, PortIndex, PortType};
pub use registry::DataModelRegistry;
