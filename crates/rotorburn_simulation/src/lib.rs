//! ROTORBURN Simulation Core
//!
//! Authoritative combat-симуляция мультиплеерного вертолётного шутера
//! на Bevy 0.16 ECS: оружие, снаряды, урон, репликация. Рендеринг,
//! транспорт и physics полёта живут снаружи — здесь только правила боя.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod combat;
pub mod components;
pub mod logger;
pub mod net;
pub mod world;

// Re-export базовых типов для удобства
pub use combat::{
    CombatPlugin, CombatSet, DamageApplied, DamageEventPayload, DamageTypeId, DamageTypeRegistry,
    FireShot, GameMode, LastTakeHit, PresentationEvent, Projectile, ProjectileBuilder,
    ProjectileConfig, ProjectileImpact, SelfDestruct, TakeHitRecord, VehicleKilled, Weapon,
    WeaponConfig, WeaponState,
};
pub use components::*;
pub use net::commands::{CommandOrigin, CommandOutbox, WeaponCommand, WeaponCommandEvent};
pub use net::role::{HostContext, LocallyControlled, NetMode, NetRole, TornOff};
pub use world::trace::{CollisionHull, Surface, TraceWorld};

use logger::init_logger;

/// Симуляционные часы: единственный источник времени для combat систем.
/// Тикает первым в FixedUpdate — тесты степают schedule напрямую, без
/// зависимости от wall clock.
#[derive(Resource, Debug, Clone, Copy)]
pub struct SimClock {
    pub tick: u64,
    /// Длительность тика (секунды)
    pub dt: f32,
    /// Накопленное sim-время (секунды)
    pub elapsed: f64,
}

impl SimClock {
    pub fn new(hz: f64) -> Self {
        Self {
            tick: 0,
            dt: (1.0 / hz) as f32,
            elapsed: 0.0,
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(60.0)
    }
}

/// Продвигает часы на один тик
pub fn advance_sim_clock(mut clock: ResMut<SimClock>) {
    clock.tick += 1;
    clock.elapsed += clock.dt as f64;
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng(pub ChaCha8Rng);

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

/// Главный plugin симуляции
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep 60Hz для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .init_resource::<SimClock>()
            .init_resource::<TraceWorld>()
            .insert_resource(DeterministicRng::new(42))
            .insert_resource(HostContext::default())
            .add_systems(
                FixedUpdate,
                (advance_sim_clock, world::sync_vehicle_hulls)
                    .chain()
                    .before(CombatSet),
            )
            .add_plugins(CombatPlugin);
    }
}

/// Создаёт minimal Bevy App для headless симуляции.
/// net_mode определяет, рождается ли на этом хосте урон.
pub fn create_headless_app(seed: u64, net_mode: NetMode) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .add_plugins(SimulationPlugin)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(HostContext { net_mode });
    app
}

/// Прогоняет n фиксированных тиков, минуя wall-clock аккумулятор
pub fn step_simulation(app: &mut App, ticks: u32) {
    for _ in 0..ticks {
        app.world_mut().run_schedule(FixedUpdate);
    }
}

/// Snapshot компонентов мира для сравнения детерминизма
pub fn world_snapshot<T: Component + std::fmt::Debug>(world: &mut World) -> Vec<u8> {
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортировка по Entity ID для стабильного порядка
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
