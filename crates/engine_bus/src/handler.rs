//! RAII handler bindings.
//!
//! A binding ties a handler object (an `Arc` of the bus interface) to
//! its connection: dropping the binding disconnects. Three flavours
//! cover the address-cardinality cases:
//!
//! - [`BusHandler`] — single-address buses, binds the anonymous slot;
//! - [`IdBusHandler`] — binds to exactly one id at a time;
//! - [`MultiBusHandler`] — binds to any subset of ids simultaneously.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use crate::bus::{ConnectionId, EventBus};
use crate::policy::BusId;

/// Binding for a single-address bus.
pub struct BusHandler<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    bus: EventBus<I, ()>,
    interface: Arc<I>,
    connection: Option<ConnectionId>,
}

impl<I> BusHandler<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    /// Create an unconnected binding for `interface` on `bus`.
    #[must_use]
    pub fn new(bus: EventBus<I, ()>, interface: Arc<I>) -> Self {
        Self {
            bus,
            interface,
            connection: None,
        }
    }

    /// Attach to the anonymous address. A no-op when already connected.
    pub fn connect(&mut self) -> bool {
        if self.connection.is_some() {
            return true;
        }
        match self.bus.connect(self.interface.clone(), ()) {
            Ok(connection) => {
                self.connection = Some(connection);
                true
            }
            Err(_) => false,
        }
    }

    /// Detach. Returns `false` when not connected.
    pub fn disconnect(&mut self) -> bool {
        match self.connection.take() {
            Some(connection) => self.bus.disconnect(connection),
            None => false,
        }
    }

    /// Returns `true` while attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The handler object this binding manages.
    #[must_use]
    pub fn interface(&self) -> &Arc<I> {
        &self.interface
    }
}

impl<I> Drop for BusHandler<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Binding for a multi-address bus that attaches to one id at a time.
///
/// Reassignment requires an explicit disconnect: connecting to a
/// different id while connected is rejected and logged.
pub struct IdBusHandler<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    bus: EventBus<I, Id>,
    interface: Arc<I>,
    connection: Option<(Id, ConnectionId)>,
}

impl<I, Id> IdBusHandler<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    /// Create an unconnected binding for `interface` on `bus`.
    #[must_use]
    pub fn new(bus: EventBus<I, Id>, interface: Arc<I>) -> Self {
        Self {
            bus,
            interface,
            connection: None,
        }
    }

    /// Attach to address `id`.
    ///
    /// A no-op returning `true` when already connected to `id`;
    /// rejected (logged, `false`) when connected to a different id.
    pub fn connect(&mut self, id: Id) -> bool {
        if let Some((bound, _)) = &self.connection {
            if *bound == id {
                return true;
            }
            error!(
                bus = self.bus.name(),
                bound = ?bound,
                requested = ?id,
                "handler already connected to a different address, disconnect first"
            );
            return false;
        }
        match self.bus.connect(self.interface.clone(), id.clone()) {
            Ok(connection) => {
                self.connection = Some((id, connection));
                true
            }
            Err(_) => false,
        }
    }

    /// Detach from the current address. Returns `false` when not
    /// connected.
    pub fn disconnect(&mut self) -> bool {
        match self.connection.take() {
            Some((_, connection)) => self.bus.disconnect(connection),
            None => false,
        }
    }

    /// Detach, requiring the binding to be attached to `id`.
    pub fn disconnect_from(&mut self, id: &Id) -> bool {
        match &self.connection {
            Some((bound, _)) if bound == id => self.disconnect(),
            _ => {
                error!(bus = self.bus.name(), id = ?id, "handler is not connected to this address");
                false
            }
        }
    }

    /// Returns `true` while attached to any address.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns `true` while attached to `id`.
    #[must_use]
    pub fn is_connected_to(&self, id: &Id) -> bool {
        matches!(&self.connection, Some((bound, _)) if bound == id)
    }

    /// The currently bound address, if any.
    #[must_use]
    pub fn connected_id(&self) -> Option<&Id> {
        self.connection.as_ref().map(|(id, _)| id)
    }

    /// The handler object this binding manages.
    #[must_use]
    pub fn interface(&self) -> &Arc<I> {
        &self.interface
    }
}

impl<I, Id> Drop for IdBusHandler<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Binding for a multi-address bus that attaches to any subset of ids.
pub struct MultiBusHandler<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    bus: EventBus<I, Id>,
    interface: Arc<I>,
    connections: HashMap<Id, ConnectionId>,
}

impl<I, Id> MultiBusHandler<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    /// Create an unconnected binding for `interface` on `bus`.
    #[must_use]
    pub fn new(bus: EventBus<I, Id>, interface: Arc<I>) -> Self {
        Self {
            bus,
            interface,
            connections: HashMap::new(),
        }
    }

    /// Attach to address `id`. A no-op when already attached there.
    pub fn connect(&mut self, id: Id) -> bool {
        if self.connections.contains_key(&id) {
            return true;
        }
        match self.bus.connect(self.interface.clone(), id.clone()) {
            Ok(connection) => {
                self.connections.insert(id, connection);
                true
            }
            Err(_) => false,
        }
    }

    /// Detach from address `id`. Returns `false` when not attached
    /// there.
    pub fn disconnect_from(&mut self, id: &Id) -> bool {
        match self.connections.remove(id) {
            Some(connection) => self.bus.disconnect(connection),
            None => false,
        }
    }

    /// Detach from every address.
    pub fn disconnect(&mut self) {
        for (_, connection) in self.connections.drain() {
            self.bus.disconnect(connection);
        }
    }

    /// Returns `true` while attached to at least one address.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Returns `true` while attached to `id`.
    #[must_use]
    pub fn is_connected_to(&self, id: &Id) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of addresses this binding is attached to.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The handler object this binding manages.
    #[must_use]
    pub fn interface(&self) -> &Arc<I> {
        &self.interface
    }
}

impl<I, Id> Drop for MultiBusHandler<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::policy::BusOptions;

    trait PingEvents: Send + Sync {
        fn on_ping(&self);
    }

    #[derive(Default)]
    struct Ping(AtomicU32);

    impl PingEvents for Ping {
        fn on_ping(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl Ping {
        fn count(&self) -> u32 {
            self.0.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn test_bus_handler_connect_roundtrip() {
        let bus: EventBus<dyn PingEvents> = EventBus::new(BusOptions::new("ping"));
        let ping = Arc::new(Ping::default());
        let mut handler = BusHandler::new(bus.clone(), ping.clone());

        assert!(!handler.is_connected());
        assert!(handler.connect());
        assert!(handler.is_connected());
        bus.broadcast(|h| h.on_ping());
        assert_eq!(ping.count(), 1);

        assert!(handler.disconnect());
        assert!(!handler.is_connected());
        assert!(!bus.has_handlers());
    }

    #[test]
    fn test_bus_handler_drop_disconnects() {
        let bus: EventBus<dyn PingEvents> = EventBus::new(BusOptions::new("ping"));
        {
            let mut handler = BusHandler::new(bus.clone(), Arc::new(Ping::default()));
            handler.connect();
            assert!(bus.has_handlers());
        }
        assert!(!bus.has_handlers());
    }

    #[test]
    fn test_id_handler_rejects_second_id() {
        let bus: EventBus<dyn PingEvents, u32> = EventBus::new(BusOptions::new("ping").by_id());
        let mut handler = IdBusHandler::new(bus.clone(), Arc::new(Ping::default()));

        assert!(handler.connect(1));
        assert!(handler.connect(1), "same id is a no-op");
        assert!(!handler.connect(2), "different id requires disconnect first");
        assert_eq!(handler.connected_id(), Some(&1));

        assert!(handler.disconnect());
        assert!(handler.connect(2));
        assert!(handler.is_connected_to(&2));
    }

    #[test]
    fn test_id_handler_disconnect_from_wrong_id() {
        let bus: EventBus<dyn PingEvents, u32> = EventBus::new(BusOptions::new("ping").by_id());
        let mut handler = IdBusHandler::new(bus.clone(), Arc::new(Ping::default()));
        handler.connect(1);
        assert!(!handler.disconnect_from(&2));
        assert!(handler.is_connected());
        assert!(handler.disconnect_from(&1));
        assert!(!handler.is_connected());
    }

    #[test]
    fn test_multi_handler_subset_of_ids() {
        let bus: EventBus<dyn PingEvents, u32> = EventBus::new(BusOptions::new("ping").by_id());
        let ping = Arc::new(Ping::default());
        let mut handler = MultiBusHandler::new(bus.clone(), ping.clone());

        assert!(handler.connect(1));
        assert!(handler.connect(2));
        assert!(handler.connect(2), "duplicate id is a no-op");
        assert_eq!(handler.connection_count(), 2);

        bus.event(&1, |h| h.on_ping());
        bus.event(&2, |h| h.on_ping());
        bus.event(&3, |h| h.on_ping());
        assert_eq!(ping.count(), 2);

        assert!(handler.disconnect_from(&1));
        bus.event(&1, |h| h.on_ping());
        assert_eq!(ping.count(), 2);

        handler.disconnect();
        assert!(!handler.is_connected());
        assert!(!bus.has_handlers());
    }

    #[test]
    fn test_multi_handler_drop_disconnects_all() {
        let bus: EventBus<dyn PingEvents, u32> = EventBus::new(BusOptions::new("ping").by_id());
        {
            let mut handler = MultiBusHandler::new(bus.clone(), Arc::new(Ping::default()));
            handler.connect(1);
            handler.connect(2);
            assert_eq!(bus.handler_count(), 2);
        }
        assert_eq!(bus.handler_count(), 0);
    }
}
