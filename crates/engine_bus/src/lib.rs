//! # engine_bus
//!
//! A many-to-many publish/subscribe dispatcher. A bus is parameterised
//! over an **interface** (the trait object handlers implement) and an
//! **address id** type, with a policy bundle fixed at construction:
//!
//! - address cardinality — one anonymous address, an unordered id map,
//!   or an ordered id map;
//! - handler cardinality — at most one handler per address, an
//!   insertion-ordered list, or a comparator-ordered list;
//! - optional queueing of deferred calls;
//! - optional lockless-dispatch contract checking.
//!
//! Dispatch is safe against mid-dispatch mutation: handlers may
//! connect, disconnect, or dispatch again (on any thread) from inside a
//! handler call. A handler disconnected while a dispatch is in flight
//! is not invoked for that dispatch; no handler is visited twice.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use engine_bus::{BusOptions, EventBus, IdBusHandler};
//!
//! trait DamageEvents: Send + Sync {
//!     fn on_damage(&self, amount: u32);
//! }
//!
//! #[derive(Default)]
//! struct Tracker(AtomicU32);
//! impl DamageEvents for Tracker {
//!     fn on_damage(&self, amount: u32) {
//!         self.0.fetch_add(amount, Ordering::Relaxed);
//!     }
//! }
//!
//! let bus: EventBus<dyn DamageEvents, u32> =
//!     EventBus::new(BusOptions::new("damage").by_id());
//! let tracker = Arc::new(Tracker::default());
//!
//! let mut handler = IdBusHandler::new(bus.clone(), tracker.clone());
//! handler.connect(7);
//!
//! bus.event(&7, |h| h.on_damage(3));
//! assert_eq!(tracker.0.load(Ordering::Relaxed), 3);
//! ```

pub mod bus;
pub mod handler;
pub mod policy;

pub use bus::{ConnectionId, EventBus};
pub use handler::{BusHandler, IdBusHandler, MultiBusHandler};
pub use policy::{AddressPolicy, BusError, BusId, BusOptions, HandlerPolicy};
