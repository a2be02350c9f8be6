//! Port types and addressing for node connections

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Index of a port slot within one side of a node
pub type PortIndex = usize;

/// Side of a node a port lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    In,
    Out,
    None,
}

impl PortType {
    /// Returns the other side; `None` stays `None`
    pub fn opposite(self) -> PortType {
        match self {
            PortType::In => PortType::Out,
            PortType::Out => PortType::In,
            PortType::None => PortType::None,
        }
    }

    /// Checks if this is the input side
    pub fn is_input(self) -> bool {
        matches!(self, PortType::In)
    }

    /// Checks if this is the output side
    pub fn is_output(self) -> bool {
        matches!(self, PortType::Out)
    }
}

/// Free-function form of [`PortType::opposite`]
pub fn opposite_port(port_type: PortType) -> PortType {
    port_type.opposite()
}

/// Identifies one port on one node: a (node, side, index) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortAddress {
    pub node_id: NodeId,
    pub port_type: PortType,
    pub index: PortIndex,
}

impl PortAddress {
    /// Creates a new port address
    pub fn new(node_id: NodeId, port_type: PortType, index: PortIndex) -> Self {
        Self {
            node_id,
            port_type,
            index,
        }
    }

    /// Address of an input port
    pub fn input(node_id: NodeId, index: PortIndex) -> Self {
        Self::new(node_id, PortType::In, index)
    }

    /// Address of an output port
    pub fn output(node_id: NodeId, index: PortIndex) -> Self {
        Self::new(node_id, PortType::Out, index)
    }
}
