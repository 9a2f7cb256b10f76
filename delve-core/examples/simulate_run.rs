//! Play one run with a simple autopilot and print every resolution as JSON.
//!
//! Configuration comes from the environment (or a `.env` file):
//! `DELVE_CLASS`, `DELVE_SEED`, `DELVE_NAME`, and `RUST_LOG` for tracing.
//!
//! Run with: `cargo run -p delve-core --example simulate_run`

use delve_core::dungeon::WALKABLE;
use delve_core::pathfinding::bfs_path_by;
use delve_core::{ActionError, Location, Phase, Resolution, Session, SessionConfig};

const MAX_STEPS: usize = 500;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = SessionConfig::from_env()?;
    let mut session = Session::new(config);
    let player = session.player();
    println!(
        "=== {} the {} (HP {}, AC {}) ===",
        player.name,
        player.class.name(),
        player.hit_points.maximum,
        player.armor_class()
    );

    for step in 0..MAX_STEPS {
        if session.is_game_over() {
            break;
        }
        let result = match (session.location(), session.phase()) {
            (_, Phase::Encountered) => session.start_combat(),
            (_, Phase::PlayerTurn) => fight(&mut session),
            (Location::Town, Phase::Exploring) => session.travel(),
            (Location::Road, Phase::Exploring) => session.enter_dungeon(),
            (Location::Dungeon, Phase::Exploring) => descend(&mut session),
            _ => break,
        };

        match result {
            Ok(resolution) => {
                for line in &resolution.log {
                    println!("[{step:>3}] {line}");
                }
                println!("{}", resolution.to_json()?);
            }
            Err(err) => {
                tracing::warn!(%err, "autopilot action rejected");
                if session.phase() == Phase::PlayerTurn {
                    session.end_player_turn()?;
                } else if session.location() == Location::Dungeon {
                    session.leave_dungeon()?;
                }
            }
        }
    }

    let player = session.player();
    println!("\n=== Run summary ===");
    println!("Phase: {}", session.phase());
    println!("Level {} with {} XP", player.level, player.experience);
    println!("HP {}/{}", player.hit_points.current, player.hit_points.maximum);
    println!("Kills: {}", player.kills);
    println!("Deepest floor: {}", session.world().deepest_floor);
    println!("Events recorded: {}", session.history().len());
    Ok(())
}

/// Attack whatever is adjacent, otherwise close the distance, otherwise wait.
fn fight(session: &mut Session) -> Result<Resolution, ActionError> {
    let origin = session.player().position;
    let nearest = session.combat().and_then(|combat| {
        combat
            .combatants
            .iter()
            .filter_map(|id| session.monsters().get(id.0))
            .filter(|m| m.is_hostile())
            .min_by_key(|m| (origin.distance(m.position), m.id.0))
            .map(|m| (m.id, m.position))
    });
    let Some((target, goal)) = nearest else {
        return session.end_player_turn();
    };

    let distance = origin.distance(goal);
    if session.player().actions_remaining == 0 {
        return session.end_player_turn();
    }
    if distance <= 1 {
        return session.use_ability(0, Some(target));
    }
    let closer = session
        .reachable_cells()
        .into_iter()
        .filter(|cell| cell.distance(goal) < distance)
        .min_by_key(|cell| (cell.distance(goal), *cell));
    match closer {
        Some(cell) => session.move_player(cell),
        None => session.end_player_turn(),
    }
}

/// Walk toward the stairs as far as this turn's movement allows.
fn descend(session: &mut Session) -> Result<Resolution, ActionError> {
    let Some(floor) = session.floor() else {
        return session.leave_dungeon();
    };
    let Some(stairs) = floor.dungeon.stairs else {
        return session.leave_dungeon();
    };
    let dungeon = &floor.dungeon;
    let path = bfs_path_by(dungeon, session.player().position, stairs, |pos| {
        WALKABLE.contains(&dungeon.tile(pos)) && !floor.is_occupied(pos)
    });
    let budget = session.player().movement_budget() as usize;
    match path.get(path.len().min(budget).saturating_sub(1)).copied() {
        Some(step) => session.move_player(step),
        None => session.leave_dungeon(),
    }
}
