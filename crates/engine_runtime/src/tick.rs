//! The per-frame tick bus.

use engine_bus::{BusOptions, EventBus};
use engine_world::WorldContext;

/// Well-known tick handler positions.
///
/// Handlers are visited in ascending order; subsystems pick a slot (or
/// an offset from one) instead of referencing each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum TickOrder {
    /// First position in the tick order.
    First = 0,
    /// Components that need to run early.
    Placement = 50,
    /// Input capture and routing.
    Input = 75,
    /// Game-logic components.
    Game = 80,
    /// Animation components.
    Animation = 100,
    /// The physics system itself.
    PhysicsSystem = 200,
    /// Components that depend on fresh physics state.
    Physics = 201,
    /// Attachment components.
    Attachment = 500,
    /// Render-data preparation.
    PreRender = 750,
    /// Default position for handlers that do not care.
    Default = 1000,
    /// UI components.
    Ui = 2000,
    /// Last position in the tick order.
    Last = 100_000,
}

impl TickOrder {
    /// The numeric order key.
    #[must_use]
    pub const fn order(self) -> u32 {
        self as u32
    }

    /// An order key offset from this slot.
    #[must_use]
    pub const fn offset(self, by: u32) -> u32 {
        self as u32 + by
    }
}

/// The per-frame interface.
pub trait TickEvents: Send + Sync {
    /// Called once per frame with the elapsed time in seconds.
    fn on_tick(&self, world: &mut WorldContext, dt: f32);

    /// The handler's position in the tick order.
    fn tick_order(&self) -> u32 {
        TickOrder::Default.order()
    }
}

/// The single ordered tick bus.
pub type TickBus = EventBus<dyn TickEvents>;

/// Build the tick bus: one anonymous address, handlers sorted by
/// [`TickEvents::tick_order`].
#[must_use]
pub fn tick_bus() -> TickBus {
    EventBus::new(
        BusOptions::<dyn TickEvents>::new("tick").handlers_ordered_by(|a, b| {
            a.tick_order().cmp(&b.tick_order())
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use engine_bus::BusHandler;

    use super::*;

    struct Recorder {
        order: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl TickEvents for Recorder {
        fn on_tick(&self, _world: &mut WorldContext, _dt: f32) {
            self.log.lock().unwrap().push(self.order);
        }

        fn tick_order(&self) -> u32 {
            self.order
        }
    }

    #[test]
    fn test_handlers_run_in_tick_order() {
        let bus = tick_bus();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = WorldContext::new();

        // Connect out of order; dispatch must follow the order keys.
        let mut handlers = Vec::new();
        for order in [TickOrder::Ui, TickOrder::First, TickOrder::PhysicsSystem] {
            let mut handler = BusHandler::new(
                bus.clone(),
                Arc::new(Recorder {
                    order: order.order(),
                    log: log.clone(),
                }) as Arc<dyn TickEvents>,
            );
            handler.connect();
            handlers.push(handler);
        }

        bus.broadcast(|h| h.on_tick(&mut world, 0.016));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                TickOrder::First.order(),
                TickOrder::PhysicsSystem.order(),
                TickOrder::Ui.order()
            ]
        );
    }

    #[test]
    fn test_equal_orders_keep_insertion_order() {
        struct Tagged {
            tag: u32,
            log: Arc<Mutex<Vec<u32>>>,
        }
        impl TickEvents for Tagged {
            fn on_tick(&self, _world: &mut WorldContext, _dt: f32) {
                self.log.lock().unwrap().push(self.tag);
            }
        }

        let bus = tick_bus();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut world = WorldContext::new();

        let mut handlers = Vec::new();
        for tag in [1u32, 2, 3] {
            let mut handler = BusHandler::new(
                bus.clone(),
                Arc::new(Tagged {
                    tag,
                    log: log.clone(),
                }) as Arc<dyn TickEvents>,
            );
            handler.connect();
            handlers.push(handler);
        }

        bus.broadcast(|h| h.on_tick(&mut world, 0.016));
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_offset_orders() {
        assert_eq!(TickOrder::PhysicsSystem.offset(1), TickOrder::Physics.order());
        assert!(TickOrder::First.order() < TickOrder::Last.order());
    }
}
