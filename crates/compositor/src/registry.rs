//! Contract with the Wayland server runtime
//!
//! The core never touches sockets or object tables directly. It asks an
//! [`ObjectRegistry`] to create and destroy resources, send events, post
//! errors and hand out serials, and keeps only [`ObjectId`] handles that it
//! re-resolves through lookups.

use std::collections::HashMap;

use smithay::utils::Serial;

use crate::error::{ProtocolError, ResourceError};
use crate::protocol::{ClientId, Event, Global, Interface, ObjectId};

/// Client/resource/global primitives provided by the runtime
pub trait ObjectRegistry {
    /// Create a resource owned by `client` for the id it allocated
    fn create_resource(
        &mut self,
        client: ClientId,
        interface: Interface,
        version: u32,
        id: u32,
    ) -> Result<ObjectId, ResourceError>;

    /// Destroy a resource from the server side
    ///
    /// The runtime must not call back into the core for resources destroyed
    /// this way.
    fn destroy_resource(&mut self, object: ObjectId);

    /// Queue an event for `target`
    fn send_event(&mut self, target: ObjectId, event: Event);

    /// Next display serial, monotonically increasing
    fn next_serial(&mut self) -> Serial;

    /// Post a fatal protocol error on `object`
    fn post_error(&mut self, object: ObjectId, error: &ProtocolError);

    /// Post `wl_display.no_memory` to `client`
    fn post_no_memory(&mut self, client: ClientId);

    /// Advertise a global
    fn create_global(&mut self, global: Global, version: u32);

    /// Write queued events to every client socket
    fn flush_clients(&mut self);
}

/// A resource bound by a client, with the version it negotiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundResource {
    pub id: ObjectId,
    pub version: u32,
}

/// Resources of one interface, grouped by client
#[derive(Debug, Default)]
pub struct ResourceList {
    by_client: HashMap<ClientId, Vec<BoundResource>>,
}

impl ResourceList {
    pub fn insert(&mut self, resource: BoundResource) {
        self.by_client.entry(resource.id.client).or_default().push(resource);
    }

    /// Returns whether the resource was present
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let Some(list) = self.by_client.get_mut(&id.client) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_client.remove(&id.client);
        }
        removed
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<BoundResource> {
        self.by_client.get(&id.client)?.iter().find(|r| r.id == id).copied()
    }

    /// Every resource `client` bound, in bind order
    pub fn for_client(&self, client: ClientId) -> &[BoundResource] {
        self.by_client.get(&client).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of every resource `client` bound, detached from the list borrow
    pub fn ids_for_client(&self, client: ClientId) -> Vec<ObjectId> {
        self.for_client(client).iter().map(|r| r.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundResource> + '_ {
        self.by_client.values().flatten()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.iter().map(|r| r.id).collect()
    }

    /// Drop everything `client` bound
    pub fn remove_client(&mut self, client: ClientId) -> Vec<BoundResource> {
        self.by_client.remove(&client).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_client.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(client: u32, id: u32) -> BoundResource {
        BoundResource {
            id: ObjectId::new(ClientId(client), id),
            version: 1,
        }
    }

    #[test]
    fn resources_are_grouped_by_client() {
        let mut list = ResourceList::default();
        list.insert(bound(1, 10));
        list.insert(bound(2, 10));
        list.insert(bound(1, 11));

        assert_eq!(list.len(), 3);
        assert_eq!(list.for_client(ClientId(1)).len(), 2);
        assert_eq!(list.ids_for_client(ClientId(2)), vec![ObjectId::new(ClientId(2), 10)]);
        assert!(list.for_client(ClientId(3)).is_empty());
    }

    #[test]
    fn remove_drops_empty_client_entries() {
        let mut list = ResourceList::default();
        list.insert(bound(1, 10));

        assert!(list.remove(ObjectId::new(ClientId(1), 10)));
        assert!(!list.remove(ObjectId::new(ClientId(1), 10)));
        assert!(list.is_empty());
    }

    #[test]
    fn remove_client_returns_its_resources() {
        let mut list = ResourceList::default();
        list.insert(bound(1, 10));
        list.insert(bound(1, 12));
        list.insert(bound(2, 3));

        let removed = list.remove_client(ClientId(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(list.len(), 1);
        assert!(list.contains(ObjectId::new(ClientId(2), 3)));
    }
}
