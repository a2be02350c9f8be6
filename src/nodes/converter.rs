//! Type conversion between ports of differing data types
//!
//! A converter is bound to one ordered (source type, destination type) pair.
//! Every connection gets its own converter instance via
//! [`TypeConverter::create_new`], so in-flight work and cancellation never leak
//! between connections. Results travel back through a [`ConversionHandle`],
//! which may be finished inside [`TypeConverter::apply`] or at any later point,
//! from any thread. The scene drains finished results from a
//! [`ConversionQueue`] and pushes them into the destination node.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::connection::ConnectionId;
use super::data::{NodeData, NodeDataType};

/// Ordered (data-type-in, data-type-out) pair a converter handles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeConverterId {
    #[serde(rename = "in")]
    pub from: NodeDataType,
    #[serde(rename = "out")]
    pub to: NodeDataType,
}

impl TypeConverterId {
    pub fn new(from: NodeDataType, to: NodeDataType) -> Self {
        Self { from, to }
    }

    /// Lookup key: converters match on exact identifiers
    pub fn key(&self) -> (String, String) {
        (self.from.id.clone(), self.to.id.clone())
    }
}

impl fmt::Display for TypeConverterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from.id, self.to.id)
    }
}

/// A stateful, possibly deferred conversion unit
pub trait TypeConverter {
    /// Starts converting `data`. The result must be reported through
    /// `completion`; dropping the handle unfinished leaves downstream data stale.
    fn apply(&mut self, data: NodeData, completion: ConversionHandle);

    /// A fresh, independent instance of the same conversion logic
    fn create_new(&self) -> Box<dyn TypeConverter>;

    /// Best-effort request to abandon in-flight work
    fn cancel(&mut self) {}
}

/// Synchronous converter built from a plain function
#[derive(Clone)]
pub struct FnConverter<F>
where
    F: Fn(NodeData) -> Option<NodeData> + Clone + 'static,
{
    convert: F,
}

impl<F> FnConverter<F>
where
    F: Fn(NodeData) -> Option<NodeData> + Clone + 'static,
{
    pub fn new(convert: F) -> Self {
        Self { convert }
    }
}

impl<F> TypeConverter for FnConverter<F>
where
    F: Fn(NodeData) -> Option<NodeData> + Clone + 'static,
{
    fn apply(&mut self, data: NodeData, completion: ConversionHandle) {
        completion.finish((self.convert)(data));
    }

    fn create_new(&self) -> Box<dyn TypeConverter> {
        Box::new(self.clone())
    }
}

/// Shared cancellation flag between a connection and its in-flight conversions
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A finished conversion waiting to be delivered
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub connection: ConnectionId,
    pub generation: u64,
    pub data: Option<NodeData>,
    cancel: CancelToken,
}

impl ConversionResult {
    /// True once the converter that produced this result was cancelled,
    /// even if that happened after the result was queued
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Completion handle for one in-flight conversion
#[derive(Debug)]
pub struct ConversionHandle {
    connection: ConnectionId,
    generation: u64,
    cancel: CancelToken,
    sender: Sender<ConversionResult>,
}

impl ConversionHandle {
    /// Reports the converted value. Returns false if the conversion was
    /// cancelled or the scene is gone; the value is discarded in that case.
    pub fn finish(self, data: Option<NodeData>) -> bool {
        if self.cancel.is_cancelled() {
            trace!("Discarding result of cancelled conversion on {}", self.connection);
            return false;
        }
        self.sender
            .send(ConversionResult {
                connection: self.connection,
                generation: self.generation,
                data,
                cancel: self.cancel,
            })
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }
}

/// Channel carrying finished conversions back to the scene
pub struct ConversionQueue {
    sender: Sender<ConversionResult>,
    receiver: Receiver<ConversionResult>,
}

impl ConversionQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub(crate) fn handle(
        &self,
        connection: ConnectionId,
        generation: u64,
        cancel: CancelToken,
    ) -> ConversionHandle {
        ConversionHandle {
            connection,
            generation,
            cancel,
            sender: self.sender.clone(),
        }
    }

    /// Next finished conversion, if any, without blocking
    pub fn try_next(&self) -> Option<ConversionResult> {
        self.receiver.try_recv().ok()
    }

    /// Number of finished conversions not yet delivered
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for ConversionQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A converter prototype stored in the model registry
pub struct RegisteredConverter {
    id: TypeConverterId,
    prototype: Box<dyn TypeConverter>,
}

impl RegisteredConverter {
    pub fn new(id: TypeConverterId, prototype: Box<dyn TypeConverter>) -> Self {
        Self { id, prototype }
    }

    pub fn id(&self) -> &TypeConverterId {
        &self.id
    }

    pub fn create_new(&self) -> Box<dyn TypeConverter> {
        self.prototype.create_new()
    }
}

impl fmt::Debug for RegisteredConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredConverter").field("id", &self.id).finish()
    }
}

/// Generations are unique for the life of the process, so a result can never
/// match a converter bound after the one that produced it
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A private converter instance owned by one connection
pub(crate) struct BoundConverter {
    id: TypeConverterId,
    converter: Box<dyn TypeConverter>,
    generation: u64,
    cancel: CancelToken,
}

impl BoundConverter {
    pub(crate) fn new(registered: &RegisteredConverter) -> Self {
        Self {
            id: registered.id().clone(),
            converter: registered.create_new(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            cancel: CancelToken::new(),
        }
    }

    pub(crate) fn id(&self) -> &TypeConverterId {
        &self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn apply(&mut self, data: NodeData, connection: ConnectionId, queue: &ConversionQueue) {
        let handle = queue.handle(connection, self.generation, self.cancel.clone());
        self.converter.apply(data, handle);
    }

    pub(crate) fn cancel(&mut self) {
        self.cancel.cancel();
        self.converter.cancel();
    }
}
