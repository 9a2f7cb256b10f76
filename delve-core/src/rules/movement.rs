//! Player movement, tile interactions and encounter detection.

use super::{
    damage_player, player_save, require_phase, ActionError, CombatState, Event, Phase, Resolution, RulesEngine,
    AGGRO_RANGE, ENCOUNTER_RADIUS, SIGHT_RADIUS,
};
use crate::character::CharacterClass;
use crate::dice::DiceSource;
use crate::dungeon::Tile;
use crate::items::{roll_chest_loot, Loot};
use crate::monster::{MonsterId, SpecialAbility, MIMIC_TRIGGER_RANGE};
use crate::pathfinding::bfs_path_by;
use crate::world::{GameWorld, Pos};
use tracing::{debug, info};

/// DEX save DC for traps.
pub const TRAP_DC: i32 = 12;

impl RulesEngine {
    pub(super) fn resolve_move(
        &self,
        world: &mut GameWorld,
        dice: &mut dyn DiceSource,
        to: Pos,
    ) -> Result<Resolution, ActionError> {
        let fighting = match world.phase {
            Phase::Exploring => false,
            Phase::PlayerTurn => true,
            phase => return Err(ActionError::WrongPhase { action: "move", phase }),
        };
        let path = plan_path(world, to, fighting)?;

        let mut resolution = Resolution::new();
        for step in path {
            let from = world.player.position;
            world.player.position = step;
            if fighting {
                world.player.movement_remaining -= 1;
            }
            resolution.push(Event::PlayerMoved { from, to: step });

            let Some(floor) = world.floor.as_mut() else {
                break;
            };
            floor.dungeon.reveal_around(step, SIGHT_RADIUS);
            let tile = floor.dungeon.tile(step);
            let number = floor.number;

            match tile {
                Tile::Trap => {
                    trigger_trap(world, dice, step, &mut resolution);
                    if world.is_game_over() {
                        return Ok(resolution);
                    }
                    update_awareness(world, &mut resolution);
                    break;
                }
                Tile::Chest => open_chest(world, dice, step, &mut resolution),
                Tile::StairsDown if step == to && !world.in_combat() => {
                    resolution.narrate(format!("You descend the stairs from floor {number}."));
                    resolution.absorb(self.enter_floor(world, dice, number + 1));
                    return Ok(resolution);
                }
                _ => {}
            }

            update_awareness(world, &mut resolution);
            if world.phase == Phase::Encountered {
                break;
            }
        }

        if world.phase == Phase::Exploring {
            world.player.movement_remaining = world.player.movement_budget();
        }
        Ok(resolution)
    }

    pub(super) fn resolve_start_combat(&self, world: &mut GameWorld) -> Result<Resolution, ActionError> {
        require_phase(world, Phase::Encountered, "start combat")?;
        let combat = world
            .combat
            .as_mut()
            .ok_or(ActionError::WrongPhase {
                action: "start combat",
                phase: world.phase,
            })?;
        combat.round = 1;
        world.phase = Phase::PlayerTurn;

        info!(combatants = combat.combatants.len(), ambush = combat.ambush, "combat started");
        let mut resolution = Resolution::new().with_event(Event::TurnStarted {
            round: 1,
            movement: world.player.movement_remaining,
            stunned: false,
        });
        resolution.narrate("Roll for initiative! You act first.");
        Ok(resolution)
    }
}

/// Validate a destination and return the path to it.
fn plan_path(world: &GameWorld, to: Pos, fighting: bool) -> Result<Vec<Pos>, ActionError> {
    let floor = world
        .floor
        .as_ref()
        .ok_or_else(|| ActionError::InvalidMovement("there is no map here".to_string()))?;
    let dungeon = &floor.dungeon;
    let from = world.player.position;

    if to == from {
        return Err(ActionError::InvalidMovement("you are already there".to_string()));
    }
    if !dungeon.in_bounds(to) {
        return Err(ActionError::InvalidMovement(format!("{to} is off the map")));
    }
    if !dungeon.is_walkable(to) {
        return Err(ActionError::InvalidMovement(format!("{to} is a wall")));
    }
    if floor.is_occupied(to) {
        return Err(ActionError::InvalidMovement(format!("{to} is occupied")));
    }

    let path = bfs_path_by(dungeon, from, to, |pos| dungeon.is_walkable(pos) && !floor.is_occupied(pos));
    if path.is_empty() {
        return Err(ActionError::InvalidMovement(format!("no path to {to}")));
    }
    let budget = if fighting {
        world.player.movement_remaining
    } else {
        world.player.movement_budget()
    };
    if path.len() as u32 > budget {
        return Err(ActionError::InvalidMovement(format!(
            "{to} is {} steps away and you have {budget} movement",
            path.len()
        )));
    }
    Ok(path)
}

fn trigger_trap(world: &mut GameWorld, dice: &mut dyn DiceSource, position: Pos, resolution: &mut Resolution) {
    let mut damage = dice.roll_dice(2, 6).total;
    if world.player.class == CharacterClass::Rogue {
        damage /= 2;
    }
    let saved = player_save(world, dice, TRAP_DC, resolution);
    if saved {
        damage /= 2;
    }
    if let Some(floor) = world.floor.as_mut() {
        floor.dungeon.set_tile(position, Tile::Floor);
    }

    debug!(%position, damage, saved, "trap triggered");
    resolution.push(Event::TrapTriggered {
        position,
        damage,
        saved,
    });
    resolution.narrate(format!("A trap springs! You take {damage} damage."));
    damage_player(world, damage, resolution);
}

fn open_chest(world: &mut GameWorld, dice: &mut dyn DiceSource, position: Pos, resolution: &mut Resolution) {
    let loot = roll_chest_loot(dice);
    if let Some(floor) = world.floor.as_mut() {
        floor.dungeon.set_tile(position, Tile::Floor);
    }
    resolution.push(Event::ChestOpened { position, loot });

    let inventory = &mut world.player.inventory;
    match loot {
        Loot::Item(item) => {
            inventory.add(item, 1);
            resolution.push(Event::ItemGained { item });
            resolution.narrate("The chest holds a healing potion.");
        }
        Loot::Gold(amount) => {
            inventory.gold += amount;
            resolution.push(Event::GoldChanged {
                amount: amount as i32,
                total: inventory.gold,
            });
            resolution.narrate(format!("The chest holds {amount} gold."));
        }
    }
}

/// Reveal nearby mimics, start an encounter when something hostile is in
/// sight, or pull newcomers into the fight already running.
pub(super) fn update_awareness(world: &mut GameWorld, resolution: &mut Resolution) {
    let origin = world.player.position;
    let Some(floor) = world.floor.as_mut() else {
        return;
    };

    let mut revealed = Vec::new();
    for monster in floor.monsters.iter_mut() {
        if monster.is_alive() && !monster.revealed && monster.position.distance(origin) <= MIMIC_TRIGGER_RANGE {
            monster.revealed = true;
            revealed.push(monster.id);
            resolution.push(Event::MonsterRevealed { id: monster.id });
            resolution.narrate(format!("The {} was a mimic all along!", monster.name()));
        }
    }

    match world.phase {
        Phase::Exploring => {
            let spotted = !revealed.is_empty()
                || floor
                    .living()
                    .any(|m| m.is_hostile() && m.position.distance(origin) <= AGGRO_RANGE);
            if !spotted {
                return;
            }
            let combatants: Vec<MonsterId> = floor
                .living()
                .filter(|m| m.position.distance(origin) <= ENCOUNTER_RADIUS)
                .filter(|m| m.revealed || matches!(m.special, SpecialAbility::Surprise))
                .map(|m| m.id)
                .collect();
            let ambush = !revealed.is_empty();

            info!(count = combatants.len(), ambush, "encounter started");
            resolution.push(Event::EncounterStarted {
                combatants: combatants.clone(),
                ambush,
            });
            resolution.narrate(format!("{} enemies spotted!", combatants.len()));
            world.combat = Some(CombatState::new(combatants, ambush));
            world.phase = Phase::Encountered;
        }
        Phase::Encountered | Phase::PlayerTurn | Phase::EnemyTurn => {
            let Some(combat) = world.combat.as_mut() else {
                return;
            };
            for monster in floor.living() {
                let close = monster.is_hostile() && monster.position.distance(origin) <= AGGRO_RANGE;
                if close && !combat.includes(monster.id) {
                    combat.combatants.push(monster.id);
                    resolution.push(Event::MonsterJoined { id: monster.id });
                    resolution.narrate(format!("A {} joins the fight.", monster.name()));
                }
            }
        }
        Phase::Resolved(_) => {}
    }
}
