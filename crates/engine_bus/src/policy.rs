//! Bus policies and construction options.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use thiserror::Error;

/// Requirements on a bus address id.
///
/// `Ord` is required so ordered-address buses can keep a sorted map;
/// unordered buses simply never call it.
pub trait BusId: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static {}

impl<T> BusId for T where T: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static {}

/// How many addresses a bus has and how they are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Exactly one anonymous address; the id type is `()`.
    Single,
    /// One address per id, visited in insertion order on broadcast.
    ById,
    /// One address per id, visited in `Ord` order on broadcast.
    ByIdAndOrdered,
}

/// How many handlers an address holds and how they are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPolicy {
    /// At most one handler per address.
    Single,
    /// Any number of handlers, visited in insertion order.
    Multiple,
    /// Any number of handlers, visited in comparator order.
    MultipleAndOrdered,
}

/// Comparator for ordered handler lists.
pub type HandlerOrderFn<I> = Arc<dyn Fn(&I, &I) -> Ordering + Send + Sync>;

/// Errors surfaced by connect/disconnect contract violations.
///
/// Dispatch itself never fails; dispatching to an address with no
/// handlers is a no-op.
#[derive(Debug, Error)]
pub enum BusError {
    /// A single-handler address already has a handler.
    #[error("bus '{bus}': address already has a handler")]
    HandlerOccupied {
        /// Bus name, for diagnostics.
        bus: &'static str,
    },
    /// The same handler instance is already connected to this address.
    #[error("bus '{bus}': handler already connected to this address")]
    AlreadyConnected {
        /// Bus name, for diagnostics.
        bus: &'static str,
    },
    /// Connect/disconnect while a dispatch is in flight on a bus that
    /// declared lockless dispatch.
    #[error("bus '{bus}': mutation during lockless dispatch")]
    MutationDuringDispatch {
        /// Bus name, for diagnostics.
        bus: &'static str,
    },
}

/// Construction-time configuration for an [`EventBus`](crate::EventBus).
///
/// Defaults match the common case: a single anonymous address,
/// insertion-ordered multiple handlers, no queue.
pub struct BusOptions<I: ?Sized> {
    pub(crate) name: &'static str,
    pub(crate) address_policy: AddressPolicy,
    pub(crate) handler_policy: HandlerPolicy,
    pub(crate) handler_order: Option<HandlerOrderFn<I>>,
    pub(crate) queueing: bool,
    pub(crate) queueing_active_by_default: bool,
    pub(crate) lockless_dispatch: bool,
}

impl<I: ?Sized> BusOptions<I> {
    /// Start from the default policy bundle. `name` appears in logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            address_policy: AddressPolicy::Single,
            handler_policy: HandlerPolicy::Multiple,
            handler_order: None,
            queueing: false,
            queueing_active_by_default: true,
            lockless_dispatch: false,
        }
    }

    /// Use one address per id, visited in insertion order on broadcast.
    #[must_use]
    pub fn by_id(mut self) -> Self {
        self.address_policy = AddressPolicy::ById;
        self
    }

    /// Use one address per id, visited in `Ord` order on broadcast.
    #[must_use]
    pub fn by_id_ordered(mut self) -> Self {
        self.address_policy = AddressPolicy::ByIdAndOrdered;
        self
    }

    /// Allow at most one handler per address.
    #[must_use]
    pub fn single_handler(mut self) -> Self {
        self.handler_policy = HandlerPolicy::Single;
        self
    }

    /// Order handlers on each address by the given comparator.
    ///
    /// Handlers comparing equal keep their insertion order.
    #[must_use]
    pub fn handlers_ordered_by(
        mut self,
        order: impl Fn(&I, &I) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.handler_policy = HandlerPolicy::MultipleAndOrdered;
        self.handler_order = Some(Arc::new(order));
        self
    }

    /// Enable the deferred-call queue.
    #[must_use]
    pub fn with_event_queue(mut self) -> Self {
        self.queueing = true;
        self
    }

    /// Start with queueing enabled but inactive (calls are refused until
    /// [`set_queueing_active`](crate::EventBus::set_queueing_active)).
    #[must_use]
    pub fn queueing_inactive(mut self) -> Self {
        self.queueing_active_by_default = false;
        self
    }

    /// Declare that no connect/disconnect happens while dispatching.
    ///
    /// The bus stays internally synchronised either way; this only arms
    /// the contract check that logs mutations made mid-dispatch.
    #[must_use]
    pub fn lockless_dispatch(mut self) -> Self {
        self.lockless_dispatch = true;
        self
    }
}
