//! Recording object registry
//!
//! Stands in for the wire runtime: resources are bookkept in a map, events and
//! errors are appended to logs the tests inspect.

use std::collections::HashMap;

use nestway::protocol::{ClientId, Event, Global, Interface, ObjectId};
use nestway::registry::ObjectRegistry;
use nestway::{ProtocolError, ResourceError};
use smithay::utils::Serial;

/// An event queued for a client
#[derive(Debug, Clone, PartialEq)]
pub struct SentEvent {
    pub target: ObjectId,
    pub event: Event,
}

/// A protocol error posted to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedError {
    pub object: ObjectId,
    pub error: ProtocolError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveResource {
    pub interface: Interface,
    pub version: u32,
}

#[derive(Debug, Default)]
pub struct RecordingRegistry {
    events: Vec<SentEvent>,
    errors: Vec<PostedError>,
    no_memory: Vec<ClientId>,
    globals: Vec<(Global, u32)>,
    live: HashMap<ObjectId, LiveResource>,
    destroyed: Vec<ObjectId>,
    serial: u32,
    fail_creations: usize,
    flushes: usize,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` resource creations fail
    pub fn fail_next_creations(&mut self, count: usize) {
        self.fail_creations = count;
    }

    pub fn events(&self) -> &[SentEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<SentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events sent to one object, in order
    pub fn events_for(&self, target: ObjectId) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.target == target)
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn errors(&self) -> &[PostedError] {
        &self.errors
    }

    pub fn no_memory(&self) -> &[ClientId] {
        &self.no_memory
    }

    pub fn globals(&self) -> &[(Global, u32)] {
        &self.globals
    }

    pub fn is_live(&self, object: ObjectId) -> bool {
        self.live.contains_key(&object)
    }

    pub fn resource(&self, object: ObjectId) -> Option<LiveResource> {
        self.live.get(&object).copied()
    }

    /// Resources destroyed from the server side, in order
    pub fn destroyed(&self) -> &[ObjectId] {
        &self.destroyed
    }

    /// Last serial handed out
    pub fn last_serial(&self) -> Serial {
        Serial::from(self.serial)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Forget a client's resources, as the runtime does on disconnect
    pub fn drop_client(&mut self, client: ClientId) {
        self.live.retain(|id, _| id.client != client);
    }
}

impl ObjectRegistry for RecordingRegistry {
    fn create_resource(
        &mut self,
        client: ClientId,
        interface: Interface,
        version: u32,
        id: u32,
    ) -> Result<ObjectId, ResourceError> {
        if self.fail_creations > 0 {
            self.fail_creations -= 1;
            return Err(ResourceError::NoMemory { client, interface });
        }
        let object = ObjectId::new(client, id);
        self.live.insert(object, LiveResource { interface, version });
        Ok(object)
    }

    fn destroy_resource(&mut self, object: ObjectId) {
        self.live.remove(&object);
        self.destroyed.push(object);
    }

    fn send_event(&mut self, target: ObjectId, event: Event) {
        tracing::trace!(%target, ?event, "event");
        self.events.push(SentEvent { target, event });
    }

    fn next_serial(&mut self) -> Serial {
        self.serial = self.serial.wrapping_add(1);
        Serial::from(self.serial)
    }

    fn post_error(&mut self, object: ObjectId, error: &ProtocolError) {
        self.errors.push(PostedError {
            object,
            error: error.clone(),
        });
    }

    fn post_no_memory(&mut self, client: ClientId) {
        self.no_memory.push(client);
    }

    fn create_global(&mut self, global: Global, version: u32) {
        self.globals.push((global, version));
    }

    fn flush_clients(&mut self) {
        self.flushes += 1;
    }
}
