//! Tracks which end of a connection is still missing while it is being created

use super::port::PortType;

/// `RequiresPort(side)` is encoded as `required_port == side`,
/// `NoRequiredPort` as `PortType::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    required_port: PortType,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            required_port: PortType::None,
        }
    }

    /// Remembers the end being dragged
    pub fn set_required_port(&mut self, end: PortType) {
        self.required_port = end;
    }

    pub fn set_no_required_port(&mut self) {
        self.required_port = PortType::None;
    }

    pub fn required_port(&self) -> PortType {
        self.required_port
    }

    pub fn requires_port(&self) -> bool {
        self.required_port != PortType::None
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_port_transitions() {
        let mut state = ConnectionState::new();
        assert!(!state.requires_port());

        state.set_required_port(PortType::In);
        assert!(state.requires_port());
        assert_eq!(state.required_port(), PortType::In);

        state.set_no_required_port();
        assert_eq!(state.required_port(), PortType::None);
    }
}
