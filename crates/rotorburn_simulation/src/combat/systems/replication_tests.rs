//! Тесты репликации: publish диффы на authority, OnRep replay на observer

use bevy::prelude::*;

use crate::combat::projectile::{ProjectileBuilder, ProjectileConfig};
use crate::combat::systems::replication::{
    HitSync, HitUpdate, ProjectileUpdate, ReplicationFeed, WeaponUpdate,
};
use crate::combat::take_hit::{DamageEventPayload, LastTakeHit, TakeHitRecord};
use crate::combat::weapon::{Weapon, WeaponConfig, WeaponNetSnapshot, WeaponState};
use crate::components::{
    CurrentWeapon, DefaultWeaponLoadout, Health, Vehicle, VehicleVelocity, Viewpoint,
};
use crate::net::commands::{CommandOrigin, WeaponCommand, WeaponCommandEvent};
use crate::net::role::{LocallyControlled, NetMode, NetRole};
use crate::net::sync::ReplicationNonce;
use crate::world::trace::{CollisionHull, Surface};
use crate::{create_headless_app, step_simulation, DamageTypeId, PresentationEvent, Projectile};

fn spawn_server_shooter(app: &mut App) -> Entity {
    app.world_mut()
        .spawn((
            Vehicle {
                team: 0,
                player_name: "host".into(),
            },
            Health::new(100.0),
            Transform::default(),
            CurrentWeapon::default(),
            VehicleVelocity::default(),
            Viewpoint {
                position: Vec3::ZERO,
                direction: Vec3::NEG_Z,
                first_person: true,
            },
            DefaultWeaponLoadout(WeaponConfig::default()),
            LastTakeHit::default(),
            HitSync::default(),
            CollisionHull::default(),
            NetRole::Authority,
            LocallyControlled,
        ))
        .id()
}

/// Replica машины и оружия в observer мире
fn spawn_client_replica(app: &mut App, locally_controlled: bool) -> (Entity, Entity) {
    let vehicle = app
        .world_mut()
        .spawn((
            Vehicle {
                team: 0,
                player_name: "replica".into(),
            },
            Health::new(100.0),
            Transform::default(),
            CurrentWeapon::default(),
            LastTakeHit::default(),
            CollisionHull::default(),
            NetRole::SimulatedProxy,
        ))
        .id();
    if locally_controlled {
        app.world_mut().entity_mut(vehicle).insert(LocallyControlled);
    }

    let mut weapon = Weapon::new(WeaponConfig::default());
    weapon.on_equip(vehicle, true, true);
    let weapon_entity = app.world_mut().spawn(weapon).id();
    app.world_mut().get_mut::<CurrentWeapon>(vehicle).unwrap().0 = Some(weapon_entity);
    (vehicle, weapon_entity)
}

fn drain_presentation(app: &mut App) -> Vec<PresentationEvent> {
    app.world_mut()
        .resource_mut::<Events<PresentationEvent>>()
        .drain()
        .collect()
}

#[test]
fn test_publish_weapon_state_diffs_once() {
    let mut app = create_headless_app(1, NetMode::ListenServer);
    let shooter = spawn_server_shooter(&mut app);
    step_simulation(&mut app, 1);

    let weapon = app
        .world()
        .get::<CurrentWeapon>(shooter)
        .and_then(|c| c.0)
        .unwrap();

    // Initial replication: снапшот уходит сразу
    let feed = app.world_mut().resource_mut::<ReplicationFeed>().take();
    assert_eq!(feed.weapons.len(), 1);

    // Без изменений — тишина
    step_simulation(&mut app, 3);
    let feed = app.world_mut().resource_mut::<ReplicationFeed>().take();
    assert!(feed.weapons.is_empty());

    // Выстрел меняет ammo и burst — дифф уходит
    app.world_mut().send_event(WeaponCommandEvent {
        weapon,
        command: WeaponCommand::StartFire,
        origin: CommandOrigin::Local,
    });
    step_simulation(&mut app, 1);
    let feed = app.world_mut().resource_mut::<ReplicationFeed>().take();
    assert_eq!(feed.weapons.len(), 1);
    assert_eq!(feed.weapons[0].snapshot.burst_counter, 1);
    assert_eq!(feed.weapons[0].snapshot.current_ammo_in_clip, 19);
}

#[test]
fn test_projectile_feed_stays_bounded_without_transport() {
    let mut app = create_headless_app(3, NetMode::ListenServer);
    let shooter = spawn_server_shooter(&mut app);
    step_simulation(&mut app, 1);

    let weapon = app
        .world()
        .get::<CurrentWeapon>(shooter)
        .and_then(|c| c.0)
        .unwrap();
    app.world_mut().send_event(WeaponCommandEvent {
        weapon,
        command: WeaponCommand::StartFire,
        origin: CommandOrigin::Local,
    });
    // Транспорт молчит: фид никто не забирает 2 секунды непрерывного огня
    step_simulation(&mut app, 120);

    // Latest-wins: на каждый снаряд в очереди не больше одного диффа,
    // сколько бы тиков он ни летел
    let live = app
        .world_mut()
        .query::<&Projectile>()
        .iter(app.world())
        .count();
    let feed = app.world().resource::<ReplicationFeed>();
    assert_eq!(feed.projectiles.len(), live);
    assert!(live <= 25, "при 0.1s каденсе за 2s уходит ~20 снарядов");
}

#[test]
fn test_observer_replays_burst_without_seeing_ammo() {
    let mut app = create_headless_app(2, NetMode::Client);
    let (_, weapon_entity) = spawn_client_replica(&mut app, false);

    app.world_mut()
        .resource_mut::<ReplicationFeed>()
        .weapons
        .push(WeaponUpdate {
            weapon: weapon_entity,
            snapshot: WeaponNetSnapshot {
                current_ammo: 42,
                current_ammo_in_clip: 7,
                burst_counter: 3,
                pending_reload: false,
            },
        });
    step_simulation(&mut app, 1);

    let weapon = app.world().get::<Weapon>(weapon_entity).unwrap();
    // Cosmetic burst применился
    assert_eq!(weapon.burst_counter, 3);
    // Точные ammo третьим лицам не видны — локальные значения нетронуты
    assert_eq!(weapon.get_current_ammo(), 100);
    assert_eq!(weapon.get_current_ammo_in_clip(), 20);

    let events = drain_presentation(&mut app);
    assert!(events
        .iter()
        .any(|e| matches!(e, PresentationEvent::MuzzleFlash { .. })));
}

#[test]
fn test_owner_reconciliation_overwrites_predicted_ammo() {
    let mut app = create_headless_app(2, NetMode::Client);
    let (_, weapon_entity) = spawn_client_replica(&mut app, true);

    // Prediction ушёл вперёд: клиент считает 19, authority говорит 15
    app.world_mut()
        .get_mut::<Weapon>(weapon_entity)
        .unwrap()
        .current_ammo_in_clip = 19;

    app.world_mut()
        .resource_mut::<ReplicationFeed>()
        .weapons
        .push(WeaponUpdate {
            weapon: weapon_entity,
            snapshot: WeaponNetSnapshot {
                current_ammo: 95,
                current_ammo_in_clip: 15,
                burst_counter: 5,
                pending_reload: false,
            },
        });
    step_simulation(&mut app, 1);

    let weapon = app.world().get::<Weapon>(weapon_entity).unwrap();
    assert_eq!(weapon.get_current_ammo_in_clip(), 15);
    assert_eq!(weapon.get_current_ammo(), 95);
    // Burst skip-owner: владелец свой огонь уже показал
    assert_eq!(weapon.burst_counter, 0);

    let events = drain_presentation(&mut app);
    assert!(!events
        .iter()
        .any(|e| matches!(e, PresentationEvent::MuzzleFlash { .. })));
}

#[test]
fn test_replicated_reload_flag_drives_cosmetic_reload() {
    let mut app = create_headless_app(2, NetMode::Client);
    let (_, weapon_entity) = spawn_client_replica(&mut app, false);

    app.world_mut()
        .resource_mut::<ReplicationFeed>()
        .weapons
        .push(WeaponUpdate {
            weapon: weapon_entity,
            snapshot: WeaponNetSnapshot {
                current_ammo: 80,
                current_ammo_in_clip: 0,
                burst_counter: 0,
                pending_reload: true,
            },
        });
    step_simulation(&mut app, 1);

    // from_replication: guards не перепроверяются
    let weapon = app.world().get::<Weapon>(weapon_entity).unwrap();
    assert_eq!(weapon.state(), WeaponState::Reloading);

    let events = drain_presentation(&mut app);
    assert!(events
        .iter()
        .any(|e| matches!(e, PresentationEvent::ReloadStarted { .. })));
}

#[test]
fn test_hit_update_replays_once_and_respects_nonce() {
    let mut app = create_headless_app(2, NetMode::Client);
    let (vehicle, _) = spawn_client_replica(&mut app, false);

    let mut record = TakeHitRecord {
        damage: 30.0,
        damage_type: DamageTypeId::Rocket,
        payload: DamageEventPayload::Point {
            hit_point: Vec3::new(0.0, 0.0, -47.0),
            hit_normal: Vec3::Z,
            surface: Surface::Fuselage,
            shot_direction: Vec3::NEG_Z,
        },
        instigator: None,
        causer: None,
        killed: false,
        nonce: ReplicationNonce(1),
    };

    let push = |app: &mut App, record: TakeHitRecord| {
        app.world_mut().resource_mut::<ReplicationFeed>().hits.push(HitUpdate {
            vehicle,
            record,
            health: 70.0,
        });
    };

    push(&mut app, record.clone());
    step_simulation(&mut app, 1);

    assert_eq!(app.world().get::<Health>(vehicle).unwrap().current, 70.0);
    let events = drain_presentation(&mut app);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, PresentationEvent::Impact { .. }))
            .count(),
        1
    );

    // Дубликат (тот же nonce) — игнорируется
    push(&mut app, record.clone());
    step_simulation(&mut app, 1);
    let events = drain_presentation(&mut app);
    assert!(events.is_empty());

    // Value-identical повтор с новым nonce — проигрывается снова
    record.nonce.bump();
    push(&mut app, record);
    step_simulation(&mut app, 1);
    let events = drain_presentation(&mut app);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, PresentationEvent::Impact { .. }))
            .count(),
        1
    );
}

#[test]
fn test_killing_hit_update_latches_replica_death() {
    let mut app = create_headless_app(2, NetMode::Client);
    let (vehicle, _) = spawn_client_replica(&mut app, false);

    app.world_mut().resource_mut::<ReplicationFeed>().hits.push(HitUpdate {
        vehicle,
        record: TakeHitRecord {
            damage: 120.0,
            damage_type: DamageTypeId::Rocket,
            payload: DamageEventPayload::Generic,
            instigator: None,
            causer: None,
            killed: true,
            nonce: ReplicationNonce(1),
        },
        health: -20.0,
    });
    step_simulation(&mut app, 1);

    let health = app.world().get::<Health>(vehicle).unwrap();
    assert!(health.is_dying);

    let events = drain_presentation(&mut app);
    assert!(events
        .iter()
        .any(|e| matches!(e, PresentationEvent::Death { .. })));
}

#[test]
fn test_exploded_fallback_trace_recovers_surface() {
    let mut app = create_headless_app(2, NetMode::Client);

    // Hull цели прямо по траектории реплицированного снаряда
    // (identity rotation: нос по -Z, от снаряда — попадание в хвост)
    app.world_mut().spawn((
        Transform::from_translation(Vec3::new(0.0, 0.0, -50.0)),
        CollisionHull::default(),
        Health::new(100.0),
    ));

    let projectile = {
        let world = app.world_mut();
        let mut queue = bevy::ecs::world::CommandQueue::default();
        let mut commands = Commands::new(&mut queue, world);
        let entity = ProjectileBuilder::new(
            ProjectileConfig::default(),
            Vec3::new(0.0, 0.0, -40.0),
            Vec3::NEG_Z,
        )
        .finish(&mut commands);
        queue.apply(world);
        entity
    };

    app.world_mut()
        .resource_mut::<ReplicationFeed>()
        .projectiles
        .push(ProjectileUpdate {
            projectile,
            position: Vec3::new(0.0, 0.0, -46.5),
            velocity: Vec3::NEG_Z * 800.0,
            exploded: true,
            explosion_point: Some(Vec3::new(0.0, 0.0, -47.0)),
            explosion_normal: Vec3::Z,
        });

    step_simulation(&mut app, 1);

    let replica = app.world().get::<Projectile>(projectile).unwrap();
    assert!(replica.has_exploded());

    let events = drain_presentation(&mut app);
    let impact = events.iter().find_map(|e| match e {
        PresentationEvent::Impact { point, surface, .. } => Some((*point, *surface)),
        _ => None,
    });
    let (point, surface) = impact.expect("fallback трасса должна дать impact FX");
    // Короткая трасса вдоль траектории нашла hull: точка на сфере, зона хвоста
    // (нос цели смотрит от снаряда)
    assert!((point.z - -47.0).abs() < 0.1);
    assert_eq!(surface, Surface::Tail);
}

#[test]
fn test_exploded_failsafe_uses_replicated_point() {
    let mut app = create_headless_app(2, NetMode::Client);

    let projectile = {
        let world = app.world_mut();
        let mut queue = bevy::ecs::world::CommandQueue::default();
        let mut commands = Commands::new(&mut queue, world);
        let entity = ProjectileBuilder::new(
            ProjectileConfig::default(),
            Vec3::new(0.0, 0.0, -40.0),
            Vec3::NEG_Z,
        )
        .finish(&mut commands);
        queue.apply(world);
        entity
    };

    // Геометрии нет вообще — трасса промахнётся
    app.world_mut()
        .resource_mut::<ReplicationFeed>()
        .projectiles
        .push(ProjectileUpdate {
            projectile,
            position: Vec3::new(0.0, 0.0, -46.5),
            velocity: Vec3::NEG_Z * 800.0,
            exploded: true,
            explosion_point: Some(Vec3::new(0.0, 0.0, -47.0)),
            explosion_normal: Vec3::Z,
        });
    step_simulation(&mut app, 1);

    let replica = app.world().get::<Projectile>(projectile).unwrap();
    assert!(replica.has_exploded());
    assert_eq!(replica.explosion_point, Some(Vec3::new(0.0, 0.0, -47.0)));
}
