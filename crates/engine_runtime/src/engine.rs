//! The engine runtime struct and main loop.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use tracing::{info, warn};

use engine_bus::{BusHandler, IdBusHandler};
use engine_core::{ServiceHandle, ServiceRegistry, TypeId32};
use engine_reflect::{TypeRegistry, register_builtin_types};
use engine_scene::{Scene, SceneManager};
use engine_world::{ComponentEvents, WorldContext};

use crate::reaper::EntityReaper;
use crate::tick::{TickBus, TickEvents, tick_bus};

/// Initialise a `tracing` subscriber from `RUST_LOG`, falling back to
/// `info`. Intended for binaries embedding the engine; libraries and
/// tests leave the subscriber to the host.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The explicit runtime: world, buses, registries, and core systems.
///
/// All process-wide state lives here instead of in true statics, so
/// construction order is explicit and tests can run engines side by
/// side.
pub struct Engine {
    world: WorldContext,
    tick_bus: TickBus,
    services: Arc<ServiceRegistry>,
    type_registry: TypeRegistry,
    scene: Arc<SceneManager>,
    scene_events: Option<IdBusHandler<dyn ComponentEvents, TypeId32>>,
    scene_service: Option<ServiceHandle<dyn Scene>>,
    reaper: Option<BusHandler<dyn TickEvents>>,
    last_tick: Instant,
    frame_count: u32,
    fps_window: f32,
    fps: u32,
    paused: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with empty world and registries. Call
    /// [`setup`](Self::setup) before running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            world: WorldContext::new(),
            tick_bus: tick_bus(),
            services: Arc::new(ServiceRegistry::new()),
            type_registry: TypeRegistry::new(),
            scene: SceneManager::new(),
            scene_events: None,
            scene_service: None,
            reaper: None,
            last_tick: Instant::now(),
            frame_count: 0,
            fps_window: 0.0,
            fps: 0,
            paused: false,
        }
    }

    /// Bring the runtime up: reflection, scene, and the reaper.
    ///
    /// # Errors
    ///
    /// Fails when the `Scene` service slot is already occupied.
    pub fn setup(&mut self) -> Result<()> {
        register_builtin_types(&mut self.type_registry);
        self.type_registry.register_all();

        self.scene_events = Some(self.scene.install(&mut self.world));
        let scene_service =
            ServiceHandle::bind(self.services.clone(), self.scene.clone() as Arc<dyn Scene>)
                .context("scene service slot already occupied")?;
        self.scene_service = Some(scene_service);

        let mut reaper = BusHandler::new(self.tick_bus.clone(), Arc::new(EntityReaper) as Arc<dyn TickEvents>);
        reaper.connect();
        self.reaper = Some(reaper);

        info!("engine runtime ready");
        Ok(())
    }

    /// Tear the runtime down in reverse order of [`setup`](Self::setup).
    pub fn shutdown(&mut self) {
        self.reaper = None;
        self.scene_service = None;
        self.scene_events = None;
        self.scene.shutdown();
        self.world.clear();
        info!("engine runtime shut down");
    }

    /// Stop broadcasting ticks; the loop keeps running.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume broadcasting ticks.
    pub fn resume(&mut self) {
        self.paused = false;
        // Do not bill the pause gap to the first resumed frame.
        self.last_tick = Instant::now();
    }

    /// Run the main loop until `should_quit` returns `true`.
    pub fn run(&mut self, mut should_quit: impl FnMut() -> bool) {
        info!("engine loop started");
        self.last_tick = Instant::now();
        while !should_quit() {
            self.tick_once();
        }
        info!("engine loop finished");
    }

    /// Advance one frame: compute `dt` from the monotonic clock and
    /// broadcast the tick in handler order.
    pub fn tick_once(&mut self) {
        let dt = self.compute_dt();
        self.update_fps(dt);
        if self.paused {
            return;
        }
        let bus = self.tick_bus.clone();
        let world = &mut self.world;
        bus.broadcast(|handler| handler.on_tick(world, dt));
    }

    fn compute_dt(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        dt
    }

    fn update_fps(&mut self, dt: f32) {
        self.frame_count += 1;
        self.fps_window += dt;
        if self.fps_window >= 1.0 {
            self.fps = self.frame_count;
            self.frame_count = 0;
            self.fps_window -= 1.0;
            if self.fps < 30 {
                warn!(fps = self.fps, "frame rate below budget");
            }
        }
    }

    /// Frames per second over the last completed one-second window.
    #[must_use]
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &WorldContext {
        &self.world
    }

    /// Mutable access to the world.
    pub fn world_mut(&mut self) -> &mut WorldContext {
        &mut self.world
    }

    /// The tick bus, for systems that want to connect.
    #[must_use]
    pub fn tick_bus(&self) -> &TickBus {
        &self.tick_bus
    }

    /// The service registry.
    #[must_use]
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// The type registry.
    #[must_use]
    pub fn type_registry(&self) -> &TypeRegistry {
        &self.type_registry
    }

    /// Mutable access to the type registry, for queueing registrars
    /// before [`setup`](Self::setup).
    pub fn type_registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.type_registry
    }

    /// The scene manager.
    #[must_use]
    pub fn scene(&self) -> &Arc<SceneManager> {
        &self.scene
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use engine_world::{DeadTag, Entity};

    use super::*;

    fn ready_engine() -> Engine {
        let mut engine = Engine::new();
        engine.setup().unwrap();
        engine
    }

    #[test]
    fn test_setup_registers_builtin_reflection() {
        let engine = ready_engine();
        assert!(engine.type_registry().context().resolve_name("Name").is_some());
        assert!(engine.type_registry().context().resolve_name("Vector3").is_some());
    }

    #[test]
    fn test_scene_resolvable_as_service() {
        let mut engine = ready_engine();
        let scene = engine.services().get::<dyn Scene>().expect("scene bound");

        let parent = engine.world_mut().create_entity();
        let child = engine.world_mut().create_entity();
        scene.set_parent(engine.world_mut(), child, parent, Entity::NULL);

        assert_eq!(scene.children(parent), vec![child]);
        assert!(scene.contains(child));
    }

    #[test]
    fn test_engines_have_independent_service_registries() {
        let first = ready_engine();
        let second = ready_engine();
        assert!(first.services().get::<dyn Scene>().is_some());
        assert!(second.services().get::<dyn Scene>().is_some());
    }

    #[test]
    fn test_tick_reaches_handlers_with_world() {
        struct Spawner {
            ticks: AtomicU32,
        }
        impl TickEvents for Spawner {
            fn on_tick(&self, world: &mut WorldContext, _dt: f32) {
                world.create_entity();
                self.ticks.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut engine = ready_engine();
        let spawner = Arc::new(Spawner {
            ticks: AtomicU32::new(0),
        });
        let mut handler = BusHandler::new(
            engine.tick_bus().clone(),
            spawner.clone() as Arc<dyn TickEvents>,
        );
        handler.connect();

        engine.tick_once();
        engine.tick_once();
        assert_eq!(spawner.ticks.load(Ordering::Relaxed), 2);
        assert_eq!(engine.world().entity_count(), 2);
    }

    #[test]
    fn test_reaper_collects_dead_entities_each_frame() {
        let mut engine = ready_engine();
        let doomed = engine.world_mut().create_entity();
        let survivor = engine.world_mut().create_entity();
        engine.world_mut().add(doomed, DeadTag).unwrap();

        engine.tick_once();

        assert!(!engine.world().valid(doomed));
        assert!(engine.world().valid(survivor));
    }

    #[test]
    fn test_pause_skips_tick_broadcast() {
        let mut engine = ready_engine();
        let doomed = engine.world_mut().create_entity();
        engine.world_mut().add(doomed, DeadTag).unwrap();

        engine.pause();
        engine.tick_once();
        assert!(engine.world().valid(doomed), "paused engine must not tick");

        engine.resume();
        engine.tick_once();
        assert!(!engine.world().valid(doomed));
    }

    #[test]
    fn test_run_stops_on_quit() {
        let mut engine = ready_engine();
        let mut frames = 0;
        engine.run(|| {
            frames += 1;
            frames > 3
        });
        assert_eq!(frames, 4);
    }

    #[test]
    fn test_shutdown_clears_world_and_scene() {
        let mut engine = ready_engine();
        let entity = engine.world_mut().create_entity();
        let scene = engine.services().get::<dyn Scene>().unwrap();
        scene.add_entity(engine.world_mut(), entity);
        assert_eq!(scene.entity_count(), 1);

        engine.shutdown();
        assert_eq!(engine.world().entity_count(), 0);
        assert!(engine.services().get::<dyn Scene>().is_none());
        assert_eq!(engine.scene().entity_count(), 0);
    }
}
