//! Headless прогон combat-симуляции ROTORBURN
//!
//! Два вертолёта, дуэль на authority хосте — smoke-прогон без рендера

use bevy::prelude::*;
use rotorburn_simulation::{
    create_headless_app, step_simulation, CollisionHull, CommandOrigin, CurrentWeapon,
    DefaultWeaponLoadout, GameMode, Health, LastTakeHit, LocallyControlled, NetMode, NetRole, Vehicle,
    VehicleVelocity, Viewpoint, WeaponCommand, WeaponCommandEvent, WeaponConfig,
};
use rotorburn_simulation::combat::systems::replication::HitSync;

fn spawn_duelist(app: &mut App, position: Vec3, facing: Vec3, team: i32, name: &str) -> Entity {
    app.world_mut()
        .spawn((
            Vehicle {
                team,
                player_name: name.into(),
            },
            Health::new(100.0),
            Transform::from_translation(position).looking_at(facing, Vec3::Y),
            CurrentWeapon::default(),
            VehicleVelocity::default(),
            Viewpoint {
                position,
                direction: (facing - position).normalize_or_zero(),
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

fn main() {
    let seed = 42;
    println!("Starting ROTORBURN headless duel (seed: {})", seed);

    let mut app = create_headless_app(seed, NetMode::ListenServer);
    app.insert_resource(GameMode::team_deathmatch());

    let red = spawn_duelist(&mut app, Vec3::ZERO, Vec3::new(0.0, 0.0, -60.0), 0, "red");
    let blue = spawn_duelist(&mut app, Vec3::new(0.0, 0.0, -60.0), Vec3::ZERO, 1, "blue");
    step_simulation(&mut app, 1);

    let red_weapon = app
        .world()
        .get::<CurrentWeapon>(red)
        .and_then(|c| c.0)
        .expect("red weapon");
    app.world_mut().send_event(WeaponCommandEvent {
        weapon: red_weapon,
        command: WeaponCommand::StartFire,
        origin: CommandOrigin::Local,
    });

    for tick in 0..600 {
        step_simulation(&mut app, 1);

        if tick % 100 == 0 {
            let hp = app
                .world()
                .get::<Health>(blue)
                .map(|h| h.current)
                .unwrap_or(0.0);
            println!("Tick {}: blue HP = {:.1}", tick, hp);
        }

        if app.world().get::<Health>(blue).map(|h| h.is_dying) == Some(true) {
            println!("Blue down on tick {}", tick);
            break;
        }
    }

    let mode = app.world().resource::<GameMode>();
    println!(
        "Final score: red kills = {:?}, team 0 = {:?}",
        mode.scores.player_kills.get(&red),
        mode.scores.team_score.get(&0)
    );
    println!("Simulation complete!");
}
