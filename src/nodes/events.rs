//! Observable notifications for hosts (graphics, undo history, inspectors)

use log::trace;

use super::connection::ConnectionId;
use super::node::NodeId;
use super::port::PortIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// An end of the connection was (re)attached
    ConnectionUpdated(ConnectionId),
    /// The connection went from one attached end to both
    ConnectionCompleted(ConnectionId),
    /// The connection lost an end while complete
    ConnectionMadeIncomplete(ConnectionId),
    /// A complete connection was added to the scene
    ConnectionCreated(ConnectionId),
    ConnectionDeleted(ConnectionId),
    NodeCreated(NodeId),
    NodeDeleted(NodeId),
    DataUpdated { node: NodeId, port: PortIndex },
    DataInvalidated { node: NodeId, port: PortIndex },
    PortsChanged(NodeId),
    ComputingStarted(NodeId),
    ComputingFinished(NodeId),
}

/// Handle returned by [`EventEmitter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GraphEvent)>;

/// Subscriber list owned by one scene; listeners run synchronously, in
/// subscription order, at the moment the event happens.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GraphEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: GraphEvent) {
        trace!("{:?}", event);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let mut emitter = EventEmitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let first = emitter.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let counter = Rc::new(RefCell::new(0));
        let count = counter.clone();
        emitter.subscribe(move |_| *count.borrow_mut() += 1);

        let node = NodeId::new();
        emitter.emit(GraphEvent::NodeCreated(node));
        assert_eq!(seen.borrow().as_slice(), &[GraphEvent::NodeCreated(node)]);

        assert!(emitter.unsubscribe(first));
        assert!(!emitter.unsubscribe(first));
        emitter.emit(GraphEvent::NodeDeleted(node));

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(*counter.borrow(), 2);
        assert_eq!(emitter.listener_count(), 1);
    }
}
