//! Bus context, address storage, and dispatch.
//!
//! An [`EventBus`] is a cheap handle (`Arc`) over a shared context that
//! owns the address table, the deferred-call queue, and the per-thread
//! dispatch callstacks. Cloning the bus clones the handle; all clones
//! see the same handlers.
//!
//! Dispatch takes a snapshot of the target address under a short lock,
//! pins the address so it cannot be dropped mid-iteration, and then
//! invokes each handler that is still connected at the moment of its
//! call. The address table lock is never held across a handler call, so
//! handlers are free to connect, disconnect, queue, or dispatch again.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering as AtomicOrdering};
use std::thread::{self, ThreadId};

use tracing::{error, warn};

use crate::policy::{AddressPolicy, BusError, BusId, BusOptions, HandlerOrderFn, HandlerPolicy};

/// Identifies one live handler connection on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// One connected handler on an address.
struct HandlerEntry<I: ?Sized> {
    connection: ConnectionId,
    interface: Arc<I>,
}

impl<I: ?Sized> Clone for HandlerEntry<I> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection,
            interface: self.interface.clone(),
        }
    }
}

/// Per-address handler list plus a pin count that keeps the address
/// alive while a dispatch is iterating it.
struct Holder<I: ?Sized> {
    entries: Vec<HandlerEntry<I>>,
    pins: u32,
}

impl<I: ?Sized> Holder<I> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            pins: 0,
        }
    }
}

/// Address table. The unordered variant tracks insertion order so
/// broadcasts visit addresses deterministically.
enum AddressMap<Id, H> {
    Unordered { map: HashMap<Id, H>, order: Vec<Id> },
    Ordered(BTreeMap<Id, H>),
}

impl<Id: BusId, H> AddressMap<Id, H> {
    fn for_policy(policy: AddressPolicy) -> Self {
        match policy {
            AddressPolicy::Single | AddressPolicy::ById => Self::Unordered {
                map: HashMap::new(),
                order: Vec::new(),
            },
            AddressPolicy::ByIdAndOrdered => Self::Ordered(BTreeMap::new()),
        }
    }

    fn get_mut(&mut self, id: &Id) -> Option<&mut H> {
        match self {
            Self::Unordered { map, .. } => map.get_mut(id),
            Self::Ordered(map) => map.get_mut(id),
        }
    }

    fn get_or_insert(&mut self, id: &Id, default: impl FnOnce() -> H) -> &mut H {
        match self {
            Self::Unordered { map, order } => {
                if !map.contains_key(id) {
                    order.push(id.clone());
                    map.insert(id.clone(), default());
                }
                map.get_mut(id).expect("address inserted above")
            }
            Self::Ordered(map) => map.entry(id.clone()).or_insert_with(default),
        }
    }

    fn remove(&mut self, id: &Id) {
        match self {
            Self::Unordered { map, order } => {
                map.remove(id);
                order.retain(|known| known != id);
            }
            Self::Ordered(map) => {
                map.remove(id);
            }
        }
    }

    /// Address ids in visit order: insertion order for unordered maps,
    /// `Ord` order for ordered maps.
    fn ids_in_order(&self) -> Vec<Id> {
        match self {
            Self::Unordered { order, .. } => order.clone(),
            Self::Ordered(map) => map.keys().cloned().collect(),
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = &H> + '_> {
        match self {
            Self::Unordered { map, .. } => Box::new(map.values()),
            Self::Ordered(map) => Box::new(map.values()),
        }
    }
}

struct BusState<I: ?Sized, Id> {
    addresses: AddressMap<Id, Holder<I>>,
    /// Live connections and the address each is attached to.
    connections: HashMap<ConnectionId, Id>,
}

/// A deferred call captured by `queue_event` / `queue_broadcast`.
enum QueuedCall<I: ?Sized, Id> {
    Broadcast(Box<dyn Fn(&I) + Send + Sync>),
    Event(Id, Box<dyn Fn(&I) + Send + Sync>),
}

struct BusContext<I: ?Sized, Id> {
    name: &'static str,
    handler_policy: HandlerPolicy,
    handler_order: Option<HandlerOrderFn<I>>,
    queueing: bool,
    lockless_dispatch: bool,
    state: Mutex<BusState<I, Id>>,
    /// Per-thread stack of in-flight dispatch ids on this bus.
    callstacks: Mutex<HashMap<ThreadId, Vec<Id>>>,
    /// Number of dispatches in flight across all threads.
    dispatches: AtomicU32,
    queue: Mutex<VecDeque<QueuedCall<I, Id>>>,
    queue_active: AtomicBool,
    next_connection: AtomicU64,
}

/// A publish/subscribe dispatcher over interface `I` addressed by `Id`.
///
/// See the [crate docs](crate) for the policy bundle and an example.
/// Single-address buses use `Id = ()` (the default).
pub struct EventBus<I: ?Sized, Id: BusId = ()> {
    ctx: Arc<BusContext<I, Id>>,
}

impl<I: ?Sized, Id: BusId> Clone for EventBus<I, Id> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<I, Id> EventBus<I, Id>
where
    I: ?Sized + Send + Sync + 'static,
    Id: BusId,
{
    /// Create a bus from its policy bundle.
    #[must_use]
    pub fn new(options: BusOptions<I>) -> Self {
        debug_assert!(
            options.handler_policy != HandlerPolicy::MultipleAndOrdered
                || options.handler_order.is_some(),
            "ordered handler policy requires a comparator"
        );
        debug_assert!(
            options.address_policy != AddressPolicy::Single
                || std::any::TypeId::of::<Id>() == std::any::TypeId::of::<()>(),
            "single-address buses use `()` as their id type"
        );
        Self {
            ctx: Arc::new(BusContext {
                name: options.name,
                handler_policy: options.handler_policy,
                handler_order: options.handler_order,
                queueing: options.queueing,
                lockless_dispatch: options.lockless_dispatch,
                state: Mutex::new(BusState {
                    addresses: AddressMap::for_policy(options.address_policy),
                    connections: HashMap::new(),
                }),
                callstacks: Mutex::new(HashMap::new()),
                dispatches: AtomicU32::new(0),
                queue: Mutex::new(VecDeque::new()),
                queue_active: AtomicBool::new(options.queueing_active_by_default),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// The bus name given at construction (used in logs).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.ctx.name
    }

    /// Returns `true` if both handles share one bus context.
    #[must_use]
    pub fn same_bus(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ctx, &other.ctx)
    }

    // -- Connection management --

    /// Attach `handler` to address `id`.
    ///
    /// Fails when a single-handler address is occupied or when the same
    /// handler instance is already attached to this address. Prefer the
    /// RAII bindings in [`crate::handler`] over calling this directly.
    pub fn connect(&self, handler: Arc<I>, id: Id) -> Result<ConnectionId, BusError> {
        if self.ctx.lockless_dispatch && self.is_in_dispatch() {
            error!(bus = self.ctx.name, "connect during lockless dispatch");
            return Err(BusError::MutationDuringDispatch { bus: self.ctx.name });
        }

        let mut state = self.ctx.state.lock().expect("bus state poisoned");
        let state = &mut *state;
        let policy = self.ctx.handler_policy;
        let order = self.ctx.handler_order.clone();

        if let Some(holder) = state.addresses.get_mut(&id) {
            if policy == HandlerPolicy::Single && !holder.entries.is_empty() {
                error!(bus = self.ctx.name, id = ?id, "single-handler address already occupied");
                return Err(BusError::HandlerOccupied { bus: self.ctx.name });
            }
            if holder
                .entries
                .iter()
                .any(|entry| Arc::ptr_eq(&entry.interface, &handler))
            {
                error!(bus = self.ctx.name, id = ?id, "handler already connected to this address");
                return Err(BusError::AlreadyConnected { bus: self.ctx.name });
            }
        }
        let holder = state.addresses.get_or_insert(&id, Holder::new);

        let connection = ConnectionId(
            self.ctx
                .next_connection
                .fetch_add(1, AtomicOrdering::Relaxed),
        );
        let entry = HandlerEntry {
            connection,
            interface: handler,
        };
        match (policy, order) {
            (HandlerPolicy::MultipleAndOrdered, Some(order)) => {
                // Stable insert: after all entries that do not compare
                // greater, so equal-order handlers keep insertion order.
                let position = holder
                    .entries
                    .iter()
                    .position(|existing| {
                        order(&entry.interface, &existing.interface) == std::cmp::Ordering::Less
                    })
                    .unwrap_or(holder.entries.len());
                holder.entries.insert(position, entry);
            }
            _ => holder.entries.push(entry),
        }
        state.connections.insert(connection, id);
        Ok(connection)
    }

    /// Detach a previously connected handler.
    ///
    /// Returns `false` (and logs) if the connection is not live.
    pub fn disconnect(&self, connection: ConnectionId) -> bool {
        if self.ctx.lockless_dispatch && self.is_in_dispatch() {
            error!(bus = self.ctx.name, "disconnect during lockless dispatch");
        }

        let mut state = self.ctx.state.lock().expect("bus state poisoned");
        let Some(id) = state.connections.remove(&connection) else {
            warn!(bus = self.ctx.name, "disconnect of a connection that is not live");
            return false;
        };
        let mut drop_address = false;
        if let Some(holder) = state.addresses.get_mut(&id) {
            holder.entries.retain(|entry| entry.connection != connection);
            drop_address = holder.entries.is_empty() && holder.pins == 0;
        }
        if drop_address {
            state.addresses.remove(&id);
        }
        true
    }

    // -- Dispatch --

    /// Deliver `f` to every handler on address `id`.
    ///
    /// A no-op when the address has no handlers.
    pub fn event(&self, id: &Id, mut f: impl FnMut(&I)) {
        let Some(entries) = self.pin_and_snapshot(id) else {
            return;
        };
        self.push_frame(id.clone());
        for entry in &entries {
            if self.is_live(entry.connection) {
                f(&entry.interface);
            }
        }
        self.pop_frame();
        self.unpin(id);
    }

    /// Deliver `f` to every handler on `id`, collecting the results in
    /// visit order.
    pub fn event_result<R>(&self, id: &Id, mut f: impl FnMut(&I) -> R) -> Vec<R> {
        let mut results = Vec::new();
        self.event(id, |handler| results.push(f(handler)));
        results
    }

    /// Deliver `f` to every handler on `id`, folding the results
    /// through `reduce` starting from `init`.
    pub fn event_reduce<R>(
        &self,
        id: &Id,
        init: R,
        mut f: impl FnMut(&I) -> R,
        mut reduce: impl FnMut(R, R) -> R,
    ) -> R {
        let mut accumulator = Some(init);
        self.event(id, |handler| {
            let value = f(handler);
            accumulator = Some(reduce(accumulator.take().expect("accumulator present"), value));
        });
        accumulator.expect("accumulator present")
    }

    /// Deliver `f` to every handler on every address.
    ///
    /// Addresses are visited in container order; handlers within an
    /// address follow the handler policy's order.
    pub fn broadcast(&self, mut f: impl FnMut(&I)) {
        let ids = {
            let state = self.ctx.state.lock().expect("bus state poisoned");
            state.addresses.ids_in_order()
        };
        for id in ids {
            self.event(&id, &mut f);
        }
    }

    /// Broadcast `f`, collecting the results in visit order.
    pub fn broadcast_result<R>(&self, mut f: impl FnMut(&I) -> R) -> Vec<R> {
        let mut results = Vec::new();
        self.broadcast(|handler| results.push(f(handler)));
        results
    }

    /// Broadcast `f`, folding the results through `reduce`.
    pub fn broadcast_reduce<R>(
        &self,
        init: R,
        mut f: impl FnMut(&I) -> R,
        mut reduce: impl FnMut(R, R) -> R,
    ) -> R {
        let mut accumulator = Some(init);
        self.broadcast(|handler| {
            let value = f(handler);
            accumulator = Some(reduce(accumulator.take().expect("accumulator present"), value));
        });
        accumulator.expect("accumulator present")
    }

    // -- Enumeration --

    /// Visit every handler on every address until `visitor` returns
    /// `false`.
    pub fn enumerate_handlers(&self, mut visitor: impl FnMut(&I) -> bool) {
        let ids = {
            let state = self.ctx.state.lock().expect("bus state poisoned");
            state.addresses.ids_in_order()
        };
        let mut keep_going = true;
        for id in ids {
            if !keep_going {
                break;
            }
            self.enumerate_handlers_at(&id, |handler| {
                keep_going = visitor(handler);
                keep_going
            });
        }
    }

    /// Visit every handler on address `id` until `visitor` returns
    /// `false`.
    pub fn enumerate_handlers_at(&self, id: &Id, mut visitor: impl FnMut(&I) -> bool) {
        let Some(entries) = self.pin_and_snapshot(id) else {
            return;
        };
        for entry in &entries {
            if self.is_live(entry.connection) && !visitor(&entry.interface) {
                break;
            }
        }
        self.unpin(id);
    }

    /// Returns `true` if any address has at least one handler.
    #[must_use]
    pub fn has_handlers(&self) -> bool {
        let state = self.ctx.state.lock().expect("bus state poisoned");
        state.addresses.values().any(|holder| !holder.entries.is_empty())
    }

    /// Returns `true` if address `id` has at least one handler.
    #[must_use]
    pub fn has_handlers_at(&self, id: &Id) -> bool {
        let mut state = self.ctx.state.lock().expect("bus state poisoned");
        state
            .addresses
            .get_mut(id)
            .is_some_and(|holder| !holder.entries.is_empty())
    }

    /// Total number of handlers across all addresses.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        let state = self.ctx.state.lock().expect("bus state poisoned");
        state.addresses.values().map(|holder| holder.entries.len()).sum()
    }

    // -- Queued events --

    /// Queue `f` for delivery to address `id` during a later
    /// [`execute_queued`](Self::execute_queued).
    ///
    /// Logs and drops the call when the bus has no queue or queueing is
    /// inactive.
    pub fn queue_event(&self, id: Id, f: impl Fn(&I) + Send + Sync + 'static) {
        self.push_queued(QueuedCall::Event(id, Box::new(f)));
    }

    /// Queue `f` for broadcast during a later
    /// [`execute_queued`](Self::execute_queued).
    pub fn queue_broadcast(&self, f: impl Fn(&I) + Send + Sync + 'static) {
        self.push_queued(QueuedCall::Broadcast(Box::new(f)));
    }

    fn push_queued(&self, call: QueuedCall<I, Id>) {
        if !self.ctx.queueing {
            error!(bus = self.ctx.name, "queueing a call on a bus built without a queue");
            return;
        }
        if !self.ctx.queue_active.load(AtomicOrdering::Relaxed) {
            warn!(bus = self.ctx.name, "queueing is inactive, dropping queued call");
            return;
        }
        self.ctx
            .queue
            .lock()
            .expect("bus queue poisoned")
            .push_back(call);
    }

    /// Execute all queued calls in enqueue order.
    ///
    /// The queue is swapped out atomically first, so calls queued by
    /// the executing handlers run on the next `execute_queued`.
    pub fn execute_queued(&self) {
        if !self.ctx.queueing {
            return;
        }
        if !self.ctx.queue_active.load(AtomicOrdering::Relaxed) {
            warn!(bus = self.ctx.name, "executing queued calls while queueing is inactive");
        }
        let drained: VecDeque<QueuedCall<I, Id>> = {
            let mut queue = self.ctx.queue.lock().expect("bus queue poisoned");
            std::mem::take(&mut *queue)
        };
        for call in drained {
            match call {
                QueuedCall::Broadcast(f) => self.broadcast(|handler| f(handler)),
                QueuedCall::Event(id, f) => self.event(&id, |handler| f(handler)),
            }
        }
    }

    /// Drop every queued call without executing it.
    pub fn clear_queued(&self) {
        self.ctx.queue.lock().expect("bus queue poisoned").clear();
    }

    /// Toggle queue activity. Deactivating clears the queue.
    pub fn set_queueing_active(&self, active: bool) {
        self.ctx.queue_active.store(active, AtomicOrdering::Relaxed);
        if !active {
            self.clear_queued();
        }
    }

    /// Returns `true` if queued calls are currently accepted.
    #[must_use]
    pub fn is_queueing_active(&self) -> bool {
        self.ctx.queueing && self.ctx.queue_active.load(AtomicOrdering::Relaxed)
    }

    /// Number of calls currently queued.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.ctx.queue.lock().expect("bus queue poisoned").len()
    }

    // -- Dispatch introspection --

    /// Returns `true` while any thread is dispatching on this bus.
    #[must_use]
    pub fn is_in_dispatch(&self) -> bool {
        self.ctx.dispatches.load(AtomicOrdering::Relaxed) > 0
    }

    /// Returns `true` while the calling thread is dispatching on this
    /// bus.
    #[must_use]
    pub fn is_in_dispatch_this_thread(&self) -> bool {
        let callstacks = self.ctx.callstacks.lock().expect("bus callstacks poisoned");
        callstacks
            .get(&thread::current().id())
            .is_some_and(|frames| !frames.is_empty())
    }

    /// The address currently being dispatched on the calling thread.
    #[must_use]
    pub fn current_bus_id(&self) -> Option<Id> {
        let callstacks = self.ctx.callstacks.lock().expect("bus callstacks poisoned");
        callstacks
            .get(&thread::current().id())
            .and_then(|frames| frames.last().cloned())
    }

    /// Returns `true` if the calling thread has nested dispatches on
    /// address `id` (the id appears more than once in the callstack).
    #[must_use]
    pub fn has_reentrant_use_this_thread(&self, id: &Id) -> bool {
        let callstacks = self.ctx.callstacks.lock().expect("bus callstacks poisoned");
        callstacks
            .get(&thread::current().id())
            .is_some_and(|frames| frames.iter().filter(|frame| *frame == id).count() >= 2)
    }

    // -- Internals --

    /// Pin the address and snapshot its handler list, or `None` when
    /// the address has no handlers.
    fn pin_and_snapshot(&self, id: &Id) -> Option<Vec<HandlerEntry<I>>> {
        let mut state = self.ctx.state.lock().expect("bus state poisoned");
        let holder = state.addresses.get_mut(id)?;
        if holder.entries.is_empty() {
            return None;
        }
        holder.pins += 1;
        Some(holder.entries.clone())
    }

    /// Release a pin taken by [`pin_and_snapshot`](Self::pin_and_snapshot);
    /// drops the address if it emptied while pinned.
    fn unpin(&self, id: &Id) {
        let mut state = self.ctx.state.lock().expect("bus state poisoned");
        let mut drop_address = false;
        if let Some(holder) = state.addresses.get_mut(id) {
            holder.pins = holder.pins.saturating_sub(1);
            drop_address = holder.pins == 0 && holder.entries.is_empty();
        }
        if drop_address {
            state.addresses.remove(id);
        }
    }

    fn is_live(&self, connection: ConnectionId) -> bool {
        let state = self.ctx.state.lock().expect("bus state poisoned");
        state.connections.contains_key(&connection)
    }

    fn push_frame(&self, id: Id) {
        let mut callstacks = self.ctx.callstacks.lock().expect("bus callstacks poisoned");
        callstacks.entry(thread::current().id()).or_default().push(id);
        self.ctx.dispatches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn pop_frame(&self) {
        let mut callstacks = self.ctx.callstacks.lock().expect("bus callstacks poisoned");
        let thread_id = thread::current().id();
        if let Some(frames) = callstacks.get_mut(&thread_id) {
            frames.pop();
            if frames.is_empty() {
                callstacks.remove(&thread_id);
            }
        }
        self.ctx.dispatches.fetch_sub(1, AtomicOrdering::Relaxed);
    }
}
