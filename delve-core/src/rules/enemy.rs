//! The enemy turn: effect ticks, the summoned ally, and every combatant's
//! action, resolved synchronously into one [`Resolution`].

use super::attack::{finalize_damage, roll_attack, roll_hit_damage, save_damage};
use super::movement::update_awareness;
use super::{
    check_victory, damage_monster, damage_player, hp_text, player_save, require_phase, ActionError, Actor, Event,
    Phase, Resolution, RulesEngine,
};
use crate::conditions::{ActiveEffect, EffectKind};
use crate::dice::{DiceExpression, DiceSource};
use crate::monster::{
    Monster, MonsterId, SpecialAbility, BREATH_COOLDOWN, BREATH_RANGE, MIMIC_TRIGGER_RANGE, REGENERATION,
};
use crate::pathfinding::greedy_step;
use crate::world::GameWorld;
use tracing::debug;

/// DEX save DC against the ogre's ground slam.
pub const GROUND_SLAM_DC: i32 = 13;
/// DEX save DC against dragon breath.
pub const BREATH_DC: i32 = 14;

const GROUND_SLAM_DAMAGE: DiceExpression = DiceExpression::new(2, 8, 0);
const BREATH_DAMAGE: DiceExpression = DiceExpression::new(4, 6, 0);

impl RulesEngine {
    pub(super) fn resolve_end_turn(
        &self,
        world: &mut GameWorld,
        dice: &mut dyn DiceSource,
    ) -> Result<Resolution, ActionError> {
        require_phase(world, Phase::PlayerTurn, "end the turn")?;
        world.phase = Phase::EnemyTurn;
        let mut resolution = Resolution::new();

        tick_player(world, dice, &mut resolution);
        if world.is_game_over() {
            return Ok(resolution);
        }

        ally_turn(world, dice, &mut resolution);
        if check_victory(world, &mut resolution) {
            return Ok(resolution);
        }

        let order = world
            .combat
            .as_ref()
            .map(|c| c.combatants.clone())
            .unwrap_or_default();
        for id in order {
            monster_turn(world, dice, id, &mut resolution);
            if world.is_game_over() {
                return Ok(resolution);
            }
        }
        if check_victory(world, &mut resolution) {
            return Ok(resolution);
        }

        update_awareness(world, &mut resolution);
        begin_player_turn(world, &mut resolution);
        Ok(resolution)
    }
}

fn begin_player_turn(world: &mut GameWorld, resolution: &mut Resolution) {
    let stunned = world.player.begin_turn();
    if let Some(floor) = world.floor.as_mut() {
        for monster in &mut floor.monsters {
            monster.has_acted = false;
        }
    }
    let round = match world.combat.as_mut() {
        Some(combat) => {
            combat.round += 1;
            combat.round
        }
        None => 0,
    };
    world.phase = Phase::PlayerTurn;

    resolution.push(Event::TurnStarted {
        round,
        movement: world.player.movement_remaining,
        stunned,
    });
    if stunned {
        resolution.narrate("You are stunned and lose your turn.");
    }
    debug!(round, hp = world.player.hit_points.current, "player turn");
}

fn tick_player(world: &mut GameWorld, dice: &mut dyn DiceSource, resolution: &mut Resolution) {
    let report = world.player.effects.tick(dice);
    if report.poison_damage > 0 {
        resolution.narrate(format!("Poison burns you for {} damage.", report.poison_damage));
        if damage_player(world, report.poison_damage, resolution) {
            return;
        }
    }
    for kind in report.expired {
        resolution.push(Event::EffectExpired {
            target: Actor::Player,
            kind,
        });
    }
}

/// The summoned ally strikes the nearest enemy within its range of the
/// player, then its duration runs down.
fn ally_turn(world: &mut GameWorld, dice: &mut dyn DiceSource, resolution: &mut Resolution) {
    let Some(ally) = world.combat.as_ref().and_then(|c| c.ally.clone()) else {
        return;
    };
    let origin = world.player.position;
    let target = match (world.floor.as_ref(), world.combat.as_ref()) {
        (Some(floor), Some(combat)) => combat
            .combatants
            .iter()
            .filter_map(|id| floor.monster(*id))
            .filter(|m| m.is_hostile() && origin.distance(m.position) <= ally.range)
            .min_by_key(|m| (origin.distance(m.position), m.id.0))
            .map(|m| (m.id, m.armor_class(), m.effects.magnitude(EffectKind::Shielded), m.name())),
        _ => None,
    };

    if let Some((id, armor_class, reduction, name)) = target {
        let roll = roll_attack(dice, ally.attack_bonus, armor_class);
        resolution.push(roll.event(Actor::Ally, Actor::Monster(id)));
        if roll.hit {
            let amount = finalize_damage(roll_hit_damage(dice, &ally.damage, 0, roll.critical), reduction);
            resolution.narrate(format!("Your {} hits the {name} for {amount}.", ally.name));
            damage_monster(world, dice, id, amount, resolution);
        } else {
            resolution.narrate(format!("Your {} misses the {name}.", ally.name));
        }
    }

    let Some(combat) = world.combat.as_mut() else {
        return;
    };
    let expired = match combat.ally.as_mut() {
        Some(ally) => {
            ally.turns_remaining = ally.turns_remaining.saturating_sub(1);
            ally.turns_remaining == 0
        }
        None => false,
    };
    if expired {
        if let Some(ally) = combat.ally.take() {
            resolution.narrate(format!("Your {} fades away.", ally.name));
            resolution.push(Event::AllyDismissed { name: ally.name });
        }
    }
}

fn monster_mut(world: &mut GameWorld, id: MonsterId) -> Option<&mut Monster> {
    world.floor.as_mut().and_then(|f| f.monster_mut(id))
}

fn monster_turn(world: &mut GameWorld, dice: &mut dyn DiceSource, id: MonsterId, resolution: &mut Resolution) {
    let Some(monster) = monster_mut(world, id) else {
        return;
    };
    if !monster.is_alive() {
        return;
    }

    // Read before the tick so the last turn of an effect still counts.
    let stunned = monster.effects.has(EffectKind::Stunned);
    let slowed = monster.effects.has(EffectKind::Slowed);
    let report = monster.effects.tick(dice);
    let name = monster.name();
    for kind in report.expired {
        resolution.push(Event::EffectExpired {
            target: Actor::Monster(id),
            kind,
        });
    }
    if report.poison_damage > 0 {
        resolution.narrate(format!("Poison eats at the {name}."));
        if damage_monster(world, dice, id, report.poison_damage, resolution) {
            return;
        }
    }
    if stunned {
        resolution.narrate(format!("The {name} is stunned."));
        return;
    }

    let target = world.player.position;
    let Some(monster) = monster_mut(world, id) else {
        return;
    };
    let distance = monster.position.distance(target);

    if !monster.revealed {
        if distance > MIMIC_TRIGGER_RANGE {
            return;
        }
        monster.revealed = true;
        resolution.push(Event::MonsterRevealed { id });
        resolution.narrate(format!("The {name} lunges out of hiding!"));
    }
    monster.has_acted = true;

    // Species behaviour that happens before (or instead of) the attack.
    match monster.special {
        SpecialAbility::Regenerate => {
            let healed = monster.hit_points.heal(REGENERATION);
            if healed > 0 {
                resolution.push(Event::Healed {
                    target: Actor::Monster(id),
                    amount: healed,
                    hp_after: monster.hit_points.current,
                });
                resolution.narrate(format!("The {name} regenerates ({}).", hp_text(&monster.hit_points)));
            }
        }
        SpecialAbility::Shield { .. } => {
            let raised = dice.chance(1, 2);
            monster.special = SpecialAbility::Shield { raised };
        }
        SpecialAbility::BreathWeapon { charged: true, .. } if distance <= BREATH_RANGE => {
            monster.special = SpecialAbility::BreathWeapon {
                charged: false,
                cooldown: BREATH_COOLDOWN,
            };
            resolution.narrate(format!("The {name} breathes fire!"));
            area_blast(world, dice, BREATH_DAMAGE, BREATH_DC, resolution);
            return;
        }
        SpecialAbility::BreathWeapon {
            charged: false,
            cooldown,
        } => {
            monster.special = if cooldown > 0 {
                SpecialAbility::BreathWeapon {
                    charged: false,
                    cooldown: cooldown - 1,
                }
            } else {
                SpecialAbility::BreathWeapon {
                    charged: dice.roll_d(6) >= 5,
                    cooldown: 0,
                }
            };
        }
        SpecialAbility::GroundSlam { used: false } if distance <= 1 => {
            monster.special = SpecialAbility::GroundSlam { used: true };
            let origin = monster.position;
            resolution.narrate(format!("The {name} slams the ground!"));
            ground_slam(world, dice, origin, resolution);
            return;
        }
        _ => {}
    }

    let reach = monster.reach();
    if distance <= reach {
        monster_attack(world, dice, id, resolution);
        return;
    }
    if slowed {
        return;
    }

    let from = monster.position;
    let step = world
        .floor
        .as_ref()
        .and_then(|floor| greedy_step(&floor.dungeon, from, target, |pos| floor.is_occupied(pos)));
    let Some(step) = step else {
        return;
    };
    if let Some(monster) = monster_mut(world, id) {
        monster.position = step;
    }
    resolution.push(Event::MonsterMoved { id, from, to: step });
    if step.distance(target) <= reach {
        monster_attack(world, dice, id, resolution);
    }
}

fn monster_attack(world: &mut GameWorld, dice: &mut dyn DiceSource, id: MonsterId, resolution: &mut Resolution) {
    let Some(monster) = world.floor.as_ref().and_then(|f| f.monster(id)) else {
        return;
    };
    let template = monster.template();
    let (name, special, bonus) = (monster.name(), monster.special, monster.damage_bonus());
    let player_ac = world.player.armor_class();

    let roll = roll_attack(dice, template.attack_bonus, player_ac);
    resolution.push(roll.event(Actor::Monster(id), Actor::Player));
    if !roll.hit {
        resolution.narrate(format!("The {name} misses you."));
        return;
    }

    let raw = roll_hit_damage(dice, &template.damage, bonus, roll.critical);
    let amount = finalize_damage(raw, world.player.effects.magnitude(EffectKind::Shielded));
    resolution.narrate(format!("The {name} hits you for {amount} damage."));
    if damage_player(world, amount, resolution) {
        return;
    }

    match special {
        SpecialAbility::WebPoison if dice.chance(1, 3) => {
            let poison = ActiveEffect::new(EffectKind::Poisoned, 3).with_magnitude(4);
            world.player.effects.apply(poison);
            resolution.push(Event::EffectApplied {
                target: Actor::Player,
                kind: EffectKind::Poisoned,
                turns: poison.remaining_turns,
            });
            resolution.narrate("Venom seeps into the wound.");
        }
        SpecialAbility::LifeDrain => {
            if let Some(monster) = monster_mut(world, id) {
                let healed = monster.hit_points.heal(amount / 2);
                if healed > 0 {
                    resolution.push(Event::Healed {
                        target: Actor::Monster(id),
                        amount: healed,
                        hp_after: monster.hit_points.current,
                    });
                }
            }
        }
        _ => {}
    }
}

/// Damage the player with a DEX save for half.
fn area_blast(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    damage: DiceExpression,
    dc: i32,
    resolution: &mut Resolution,
) -> bool {
    let rolled = damage.roll(dice).total;
    let saved = player_save(world, dice, dc, resolution);
    damage_player(world, save_damage(rolled, saved, true), resolution);
    saved
}

fn ground_slam(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    origin: crate::world::Pos,
    resolution: &mut Resolution,
) {
    let saved = area_blast(world, dice, GROUND_SLAM_DAMAGE, GROUND_SLAM_DC, resolution);
    if world.is_game_over() {
        return;
    }
    if !saved {
        let stun = ActiveEffect::new(EffectKind::Stunned, 1);
        world.player.effects.apply(stun);
        resolution.push(Event::EffectApplied {
            target: Actor::Player,
            kind: EffectKind::Stunned,
            turns: stun.remaining_turns,
        });
    }

    let from = world.player.position;
    let to = from.offset((from.x - origin.x).signum(), (from.y - origin.y).signum());
    let free = world
        .floor
        .as_ref()
        .is_some_and(|f| f.dungeon.is_walkable(to) && !f.is_occupied(to));
    if free {
        world.player.position = to;
        resolution.push(Event::PlayerPushed { from, to });
        resolution.narrate("The shockwave throws you back.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterClass;
    use crate::monster::MonsterKind;
    use crate::rules::{CombatOutcome, Intent};
    use crate::testing::{ScriptedDice, TestHarness};
    use crate::world::Pos;

    fn end_turn(h: &mut TestHarness, dice: &mut ScriptedDice) -> Result<Resolution, ActionError> {
        h.resolve(dice, Intent::EndTurn)
    }

    #[test]
    fn test_goblin_hits_fighter() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(4, 3));
        h.start_fight();
        assert_eq!(h.player().armor_class(), 17);
        // 15 + 4 = 19 vs AC 17; 1d6 = 3, +2.
        let mut dice = ScriptedDice::new([15, 3]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert!(res.events.contains(&Event::AttackHit {
            attacker: Actor::Monster(goblin),
            target: Actor::Player,
            natural: 15,
            total: 19,
            target_ac: 17,
            critical: false,
        }));
        assert_eq!(res.damage_to(Actor::Player), 5);
        assert_eq!(h.player().hit_points.current, 9);
        assert_eq!(h.world.phase, Phase::PlayerTurn);
    }

    #[test]
    fn test_natural_one_misses() {
        let mut h = TestHarness::new(CharacterClass::Wizard);
        h.spawn(MonsterKind::Troll, Pos::new(4, 3));
        h.start_fight();
        h.monster_mut(MonsterId(0)).hit_points.current = 84;
        let mut dice = ScriptedDice::new([1]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.damage_to(Actor::Player), 0);
    }

    #[test]
    fn test_defeat_is_final() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        h.spawn(MonsterKind::Goblin, Pos::new(4, 3));
        h.start_fight();
        h.world.player.hit_points.current = 5;
        // 1d6 = 5, +2 = 7.
        let mut dice = ScriptedDice::new([15, 5]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.damage_to(Actor::Player), 7);
        assert!(res.events.contains(&Event::PlayerDied));
        assert_eq!(res.outcome(), Some(CombatOutcome::Defeat));
        assert_eq!(h.world.phase, Phase::Resolved(CombatOutcome::Defeat));

        assert_eq!(end_turn(&mut h, &mut dice), Err(ActionError::GameOver));
        assert_eq!(h.ability(&mut dice, 0, None), Err(ActionError::GameOver));
    }

    #[test]
    fn test_monster_closes_distance_then_attacks() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(5, 3));
        h.start_fight();
        let mut dice = ScriptedDice::new([2]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(h.monster(goblin).position, Pos::new(4, 3));
        assert!(res.events.contains(&Event::MonsterMoved {
            id: goblin,
            from: Pos::new(5, 3),
            to: Pos::new(4, 3),
        }));
        assert!(matches!(res.events[1], Event::AttackMissed { .. }));
    }

    #[test]
    fn test_ranged_monster_attacks_from_afar() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let kobold = h.spawn(MonsterKind::Kobold, Pos::new(7, 3));
        h.start_fight();
        let mut dice = ScriptedDice::new([2]);
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(h.monster(kobold).position, Pos::new(7, 3));
        assert_eq!(dice.consumed(), 1);
    }

    #[test]
    fn test_turn_boundary_resets() {
        let mut h = TestHarness::new(CharacterClass::Rogue);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(4, 3));
        h.start_fight();
        h.world.player.movement_remaining = 0;
        h.world.player.actions_remaining = 0;
        let mut dice = ScriptedDice::new([2]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert!(!h.monster(goblin).has_acted);
        assert_eq!(h.player().movement_remaining, 6);
        assert_eq!(h.player().actions_remaining, 1);
        assert_eq!(h.world.combat.as_ref().unwrap().round, 2);
        assert_eq!(
            res.events.last(),
            Some(&Event::TurnStarted {
                round: 2,
                movement: 6,
                stunned: false
            })
        );
    }

    #[test]
    fn test_poison_tick_kills_and_credits() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let rat = h.spawn(MonsterKind::GiantRat, Pos::new(4, 3));
        h.start_fight();
        h.monster_mut(rat).hit_points.current = 2;
        h.monster_mut(rat)
            .effects
            .apply(ActiveEffect::new(EffectKind::Poisoned, 3).with_magnitude(4));
        let mut dice = ScriptedDice::new([3]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.killed(), vec![rat]);
        assert_eq!(res.outcome(), Some(CombatOutcome::Victory));
        assert_eq!(h.player().kills, 1);
        assert_eq!(h.world.phase, Phase::Exploring);
    }

    #[test]
    fn test_stunned_monster_skips_once() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(4, 3));
        h.start_fight();
        h.monster_mut(goblin).effects.apply(ActiveEffect::new(EffectKind::Stunned, 1));
        let mut dice = ScriptedDice::new([20, 6]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(dice.consumed(), 0);
        assert!(res.events.contains(&Event::EffectExpired {
            target: Actor::Monster(goblin),
            kind: EffectKind::Stunned,
        }));

        let res = end_turn(&mut h, &mut dice).unwrap();
        assert!(res.damage_to(Actor::Player) > 0);
    }

    #[test]
    fn test_troll_regenerates() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let troll = h.spawn(MonsterKind::Troll, Pos::new(4, 3));
        h.start_fight();
        h.monster_mut(troll).hit_points.current = 50;
        let mut dice = ScriptedDice::new([1]);
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(h.monster(troll).hit_points.current, 55);
    }

    #[test]
    fn test_dragon_breath_then_cooldown() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let dragon = h.spawn(MonsterKind::YoungDragon, Pos::new(6, 3));
        h.start_fight();
        h.world.player.hit_points = crate::character::HitPoints::new(100);
        // 4d6 = 12, save d20 = 20 -> half.
        let mut dice = ScriptedDice::new([3, 3, 3, 3, 20]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.damage_to(Actor::Player), 6);
        assert_eq!(
            h.monster(dragon).special,
            SpecialAbility::BreathWeapon {
                charged: false,
                cooldown: BREATH_COOLDOWN
            }
        );

        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(
            h.monster(dragon).special,
            SpecialAbility::BreathWeapon {
                charged: false,
                cooldown: 1
            }
        );
    }

    #[test]
    fn test_ogre_slam_stuns_and_pushes() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let ogre = h.spawn(MonsterKind::Ogre, Pos::new(4, 3));
        h.start_fight();
        h.world.player.hit_points = crate::character::HitPoints::new(100);
        // 2d8 = 10, save d20 = 2 fails.
        let mut dice = ScriptedDice::new([5, 5, 2]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.damage_to(Actor::Player), 10);
        assert_eq!(h.player().position, Pos::new(2, 3));
        assert_eq!(h.monster(ogre).special, SpecialAbility::GroundSlam { used: true });
        assert!(res.events.contains(&Event::TurnStarted {
            round: 2,
            movement: 0,
            stunned: true
        }));
        assert_eq!(h.ability(&mut dice, 0, None), Err(ActionError::NoActionRemaining));
    }

    #[test]
    fn test_ally_attacks_then_fades() {
        let mut h = TestHarness::new(CharacterClass::Warlock);
        let troll = h.spawn(MonsterKind::Troll, Pos::new(6, 3));
        h.start_fight();
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        h.ability(&mut dice, 3, None).unwrap();

        for round in 0..3 {
            // Imp: d20 = 19 hits, 1d4 = 2 (+2). Troll misses on a 1.
            let mut dice = ScriptedDice::new([19, 2, 1]);
            let res = end_turn(&mut h, &mut dice).unwrap();
            assert_eq!(res.damage_to(Actor::Monster(troll)), 4);
            if round == 2 {
                assert!(res.events.contains(&Event::AllyDismissed { name: "Imp".to_string() }));
            }
        }
        assert!(h.world.combat.as_ref().unwrap().ally.is_none());
    }

    #[test]
    fn test_wraith_drains_half_the_damage() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let wraith = h.spawn(MonsterKind::Wraith, Pos::new(4, 3));
        h.start_fight();
        h.monster_mut(wraith).hit_points.current = 30;
        // 15 + 6 hits AC 17; 2d8 = 8, +3 = 11.
        let mut dice = ScriptedDice::new([15, 4, 4]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.damage_to(Actor::Player), 11);
        assert_eq!(h.player().hit_points.current, 3);
        assert_eq!(h.monster(wraith).hit_points.current, 35);
        assert!(res.events.contains(&Event::Healed {
            target: Actor::Monster(wraith),
            amount: 5,
            hp_after: 35,
        }));
    }

    #[test]
    fn test_spider_bite_can_poison() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        h.spawn(MonsterKind::GiantSpider, Pos::new(4, 3));
        h.start_fight();
        // 15 + 5 hits; 1d8 = 2, +3 = 5; 1 on the d3 poisons.
        let mut dice = ScriptedDice::new([15, 2, 1]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(res.damage_to(Actor::Player), 5);
        assert!(res.events.contains(&Event::EffectApplied {
            target: Actor::Player,
            kind: EffectKind::Poisoned,
            turns: 3,
        }));
        assert_eq!(h.player().effects.magnitude(EffectKind::Poisoned), 4);
    }

    #[test]
    fn test_spider_bite_without_venom() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        h.spawn(MonsterKind::GiantSpider, Pos::new(4, 3));
        h.start_fight();
        let mut dice = ScriptedDice::new([15, 2, 3]);
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(dice.consumed(), 3);
        assert!(!h.player().effects.has(EffectKind::Poisoned));
    }

    #[test]
    fn test_hobgoblin_rerolls_shield_each_turn() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let hob = h.spawn(MonsterKind::Hobgoblin, Pos::new(4, 3));
        h.start_fight();
        assert_eq!(h.monster(hob).armor_class(), 16);

        // d2 = 1 raises the shield, then a natural 1 misses.
        let mut dice = ScriptedDice::new([1, 1]);
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(h.monster(hob).special, SpecialAbility::Shield { raised: true });
        assert_eq!(h.monster(hob).armor_class(), 18);

        let mut dice = ScriptedDice::new([2, 1]);
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(h.monster(hob).special, SpecialAbility::Shield { raised: false });
        assert_eq!(h.monster(hob).armor_class(), 16);
    }

    #[test]
    fn test_disguised_mimic_waits_out_of_range() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let mimic = h.spawn(MonsterKind::Mimic, Pos::new(8, 8));
        h.spawn(MonsterKind::Troll, Pos::new(12, 12));
        h.start_fight();

        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(dice.consumed(), 0);
        assert_eq!(h.monster(mimic).position, Pos::new(8, 8));
        assert!(!h.monster(mimic).revealed);
        assert!(!res.events.contains(&Event::MonsterRevealed { id: mimic }));
        assert_eq!(res.damage_to(Actor::Player), 0);

        // Next to the player it drops the disguise and attacks.
        h.monster_mut(mimic).position = Pos::new(4, 3);
        let mut dice = ScriptedDice::new([1]);
        let res = end_turn(&mut h, &mut dice).unwrap();
        assert!(res.events.contains(&Event::MonsterRevealed { id: mimic }));
        assert!(h.monster(mimic).revealed);
        assert!(res.events.iter().any(|e| matches!(
            e,
            Event::AttackMissed {
                attacker: Actor::Monster(id),
                ..
            } if *id == mimic
        )));
    }

    #[test]
    fn test_ray_of_frost_holds_monster_for_two_turns() {
        let mut h = TestHarness::new(CharacterClass::Wizard);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(6, 3));
        h.start_fight();

        // 19 + 5 hits AC 15; 1d8 = 1.
        let mut dice = ScriptedDice::new([19, 1]);
        h.ability(&mut dice, 3, Some(goblin)).unwrap();
        assert_eq!(
            h.monster(goblin).effects.get(EffectKind::Slowed).map(|e| e.remaining_turns),
            Some(2)
        );

        for _ in 0..2 {
            let mut dice = ScriptedDice::new(Vec::<u32>::new());
            let res = end_turn(&mut h, &mut dice).unwrap();
            assert_eq!(h.monster(goblin).position, Pos::new(6, 3));
            assert!(!res.events.iter().any(|e| matches!(e, Event::MonsterMoved { .. })));
        }
        assert!(!h.monster(goblin).effects.has(EffectKind::Slowed));

        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        end_turn(&mut h, &mut dice).unwrap();
        assert_eq!(h.monster(goblin).position, Pos::new(5, 3));
    }
}
