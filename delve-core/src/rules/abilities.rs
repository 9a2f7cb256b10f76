//! Player actions during combat: class abilities and consumables.

use super::attack::{finalize_damage, roll_attack, roll_hit_damage, save_damage};
use super::{
    check_victory, damage_monster, heal_player, monster_save, require_phase, ActionError, Actor, Ally, Event, Phase,
    Resolution, Resource, RulesEngine,
};
use crate::character::{CharacterClass, PlayerCharacter};
use crate::class_data::{AbilityCost, AbilityDescriptor, AbilityEffect};
use crate::conditions::{ActiveEffect, EffectKind};
use crate::dice::{DiceExpression, DiceSource};
use crate::items::{consumable, ConsumableEffect, ItemKind};
use crate::monster::MonsterId;
use crate::world::GameWorld;
use tracing::debug;

impl RulesEngine {
    pub(super) fn resolve_ability(
        &self,
        world: &mut GameWorld,
        dice: &mut dyn DiceSource,
        slot: usize,
        requested: Option<MonsterId>,
    ) -> Result<Resolution, ActionError> {
        require_phase(world, Phase::PlayerTurn, "use an ability")?;
        let table = world.player.class.ability_table();
        let ability = *table.get(slot).ok_or(ActionError::UnknownAbility(slot))?;

        if ability.uses_action && world.player.actions_remaining == 0 {
            return Err(ActionError::NoActionRemaining);
        }
        check_cost(&world.player, slot, &ability)?;
        let target = if ability.range.needs_target() {
            Some(select_target(world, requested, ability.range.reach())?)
        } else {
            None
        };
        match ability.effect {
            AbilityEffect::Hex if world.player.hex_active => {
                return Err(ActionError::AlreadyActive("Hex".to_string()));
            }
            AbilityEffect::Summon(template) if world.combat.as_ref().is_some_and(|c| c.ally.is_some()) => {
                return Err(ActionError::AlreadyActive(template.name.to_string()));
            }
            _ => {}
        }

        // Validation done; from here on the world changes.
        let mut resolution = Resolution::new().with_event(Event::AbilityUsed {
            slot,
            name: ability.name.to_string(),
        });
        pay_cost(&mut world.player, slot, &ability, &mut resolution);
        if ability.uses_action {
            world.player.actions_remaining -= 1;
        }
        debug!(ability = ability.name, ?target, "ability used");

        match (ability.effect, target) {
            (AbilityEffect::WeaponAttack { damage, on_hit }, Some(target)) => {
                weapon_attack(world, dice, target, damage, on_hit, &mut resolution);
            }
            (
                AbilityEffect::SpellAttack {
                    damage,
                    add_modifier,
                    on_hit,
                },
                Some(target),
            ) => {
                spell_attack(world, dice, target, damage, add_modifier, on_hit, &mut resolution);
            }
            (AbilityEffect::AutoHit { damage }, Some(target)) => {
                let raw = damage.roll(dice).total;
                resolution.narrate(format!("{} strikes unerringly.", ability.name));
                land_hit(world, dice, target, raw, None, &mut resolution);
            }
            (
                AbilityEffect::Save {
                    damage,
                    radius,
                    half_on_save,
                },
                Some(target),
            ) => {
                area_save(world, dice, target, damage, radius, half_on_save, &mut resolution);
            }
            (
                AbilityEffect::Heal {
                    dice: expression,
                    add_level,
                    add_modifier,
                },
                _,
            ) => {
                let player = &world.player;
                let mut amount = expression.roll(dice).total;
                if add_level {
                    amount += player.level as i32;
                }
                if add_modifier {
                    amount += player.modifier(player.data().casting_stat);
                }
                let healed = heal_player(world, amount.max(1), &mut resolution);
                resolution.narrate(format!("{} restores {healed} HP.", ability.name));
            }
            (AbilityEffect::SelfBuff(effect), _) => {
                world.player.effects.apply(effect);
                resolution.push(Event::EffectApplied {
                    target: Actor::Player,
                    kind: effect.kind,
                    turns: effect.remaining_turns,
                });
                resolution.narrate(format!("You are {} for {} turns.", effect.kind.name(), effect.remaining_turns));
            }
            (AbilityEffect::ExtraAction, _) => {
                world.player.actions_remaining += 1;
                resolution.narrate("You push yourself for one more action.");
            }
            (AbilityEffect::ExtraMovement(tiles), _) => {
                world.player.movement_remaining += tiles;
                resolution.narrate(format!("You gain {tiles} tiles of movement."));
            }
            (AbilityEffect::Hex, _) => {
                world.player.hex_active = true;
                resolution.narrate("A hex settles over your foes for the rest of the floor.");
            }
            (AbilityEffect::Summon(template), _) => {
                if let Some(combat) = world.combat.as_mut() {
                    combat.ally = Some(Ally::from(template));
                }
                resolution.push(Event::AllySummoned {
                    name: template.name.to_string(),
                    turns: template.turns,
                });
                resolution.narrate(format!("An {} appears at your side.", template.name));
            }
            // Targeted effects always have a target by now.
            (_, None) => {}
        }

        check_victory(world, &mut resolution);
        Ok(resolution)
    }

    pub(super) fn resolve_use_item(
        &self,
        world: &mut GameWorld,
        dice: &mut dyn DiceSource,
        item: ItemKind,
    ) -> Result<Resolution, ActionError> {
        let in_combat = match world.phase {
            Phase::Exploring => false,
            Phase::PlayerTurn => true,
            phase => {
                return Err(ActionError::WrongPhase {
                    action: "use an item",
                    phase,
                })
            }
        };
        if in_combat && world.player.actions_remaining == 0 {
            return Err(ActionError::NoActionRemaining);
        }
        let entry = consumable(item).ok_or_else(|| ActionError::InsufficientResource(format!("{item:?}")))?;
        if world.player.inventory.count(item) == 0 {
            return Err(ActionError::InsufficientResource(entry.name.clone()));
        }
        if entry.effect == ConsumableEffect::CurePoison && !world.player.effects.has(EffectKind::Poisoned) {
            return Err(ActionError::InvalidTarget("you are not poisoned".to_string()));
        }

        world.player.inventory.take(item);
        if in_combat {
            world.player.actions_remaining -= 1;
        }
        let mut resolution = Resolution::new().with_event(Event::ItemUsed { item });
        match entry.effect {
            ConsumableEffect::Heal(expression) => {
                let healed = heal_player(world, expression.roll(dice).total.max(1), &mut resolution);
                resolution.narrate(format!("You drink the {} and recover {healed} HP.", entry.name));
            }
            ConsumableEffect::CurePoison => {
                world.player.effects.remove(EffectKind::Poisoned);
                resolution.push(Event::EffectExpired {
                    target: Actor::Player,
                    kind: EffectKind::Poisoned,
                });
                resolution.narrate("The antidote burns the poison out of your veins.");
            }
        }
        Ok(resolution)
    }
}

// ============================================================================
// Validation
// ============================================================================

fn check_cost(player: &PlayerCharacter, slot: usize, ability: &AbilityDescriptor) -> Result<(), ActionError> {
    let affordable = match ability.cost {
        AbilityCost::Free => true,
        AbilityCost::PerFloor(_) => player.uses_remaining[slot] > 0,
        AbilityCost::Mana(cost) => player.mana.current >= cost,
        AbilityCost::PactPoints(cost) => player.pact_points.current >= cost,
    };
    if affordable {
        return Ok(());
    }
    let what = match ability.cost {
        AbilityCost::Mana(_) => "mana".to_string(),
        AbilityCost::PactPoints(_) => "pact points".to_string(),
        _ => format!("uses of {}", ability.name),
    };
    Err(ActionError::InsufficientResource(what))
}

fn pay_cost(player: &mut PlayerCharacter, slot: usize, ability: &AbilityDescriptor, resolution: &mut Resolution) {
    let (resource, amount, remaining) = match ability.cost {
        AbilityCost::Free => return,
        AbilityCost::PerFloor(_) => {
            player.uses_remaining[slot] -= 1;
            (Resource::Uses(slot), 1, player.uses_remaining[slot] as u32)
        }
        AbilityCost::Mana(cost) => {
            player.mana.spend(cost);
            (Resource::Mana, cost, player.mana.current)
        }
        AbilityCost::PactPoints(cost) => {
            player.pact_points.spend(cost);
            (Resource::PactPoints, cost, player.pact_points.current)
        }
    };
    resolution.push(Event::ResourceSpent {
        resource,
        amount,
        remaining,
    });
}

/// Resolve the target of a targeted ability: the requested monster if it is
/// a hostile combatant within reach, otherwise the nearest one.
fn select_target(world: &GameWorld, requested: Option<MonsterId>, reach: i32) -> Result<MonsterId, ActionError> {
    let (Some(floor), Some(combat)) = (world.floor.as_ref(), world.combat.as_ref()) else {
        return Err(ActionError::InvalidTarget("there is nothing to fight".to_string()));
    };
    let origin = world.player.position;

    let candidate = match requested {
        Some(id) => floor
            .monster(id)
            .filter(|m| m.is_hostile() && combat.includes(id))
            .ok_or_else(|| ActionError::InvalidTarget(format!("{id} is not an enemy in this fight")))?,
        None => combat
            .combatants
            .iter()
            .filter_map(|id| floor.monster(*id))
            .filter(|m| m.is_hostile())
            .min_by_key(|m| (origin.distance(m.position), m.id.0))
            .ok_or_else(|| ActionError::InvalidTarget("no enemies remain".to_string()))?,
    };

    let distance = origin.distance(candidate.position);
    if distance > reach {
        return Err(ActionError::OutOfRange { distance, reach });
    }
    Ok(candidate.id)
}

// ============================================================================
// Effects
// ============================================================================

fn weapon_attack(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    target: MonsterId,
    damage: Option<DiceExpression>,
    on_hit: Option<ActiveEffect>,
    resolution: &mut Resolution,
) {
    let player = &world.player;
    let data = player.data();
    let expression = damage.unwrap_or(data.weapon_damage);
    let flat = player.modifier(data.attack_stat) + player.effects.magnitude(EffectKind::Blessed);
    let bonus = player.attack_bonus();
    let sneaky = player.class == CharacterClass::Rogue;

    let Some(monster) = world.floor.as_ref().and_then(|f| f.monster(target)) else {
        return;
    };
    let (name, unaware) = (monster.name(), !monster.has_acted);
    let roll = roll_attack(dice, bonus, monster.armor_class());
    resolution.push(roll.event(Actor::Player, Actor::Monster(target)));
    if !roll.hit {
        resolution.narrate(format!("You swing at the {name} and miss."));
        return;
    }

    let mut raw = roll_hit_damage(dice, &expression, flat, roll.critical);
    if roll.critical {
        resolution.narrate("Critical hit!");
    }
    if sneaky && unaware {
        raw += dice.roll_dice(2, 6).total;
        if let Some(monster) = world.floor.as_mut().and_then(|f| f.monster_mut(target)) {
            monster.has_acted = true;
        }
        resolution.narrate(format!("You catch the {name} off guard."));
    }
    land_hit(world, dice, target, raw, on_hit, resolution);
}

fn spell_attack(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    target: MonsterId,
    damage: DiceExpression,
    add_modifier: bool,
    on_hit: Option<ActiveEffect>,
    resolution: &mut Resolution,
) {
    let player = &world.player;
    let mut flat = player.effects.magnitude(EffectKind::Blessed);
    if add_modifier {
        flat += player.modifier(player.data().casting_stat);
    }
    let bonus = player.spell_attack_bonus();

    let Some(monster) = world.floor.as_ref().and_then(|f| f.monster(target)) else {
        return;
    };
    let name = monster.name();
    let roll = roll_attack(dice, bonus, monster.armor_class());
    resolution.push(roll.event(Actor::Player, Actor::Monster(target)));
    if !roll.hit {
        resolution.narrate(format!("Your spell flies wide of the {name}."));
        return;
    }
    let raw = roll_hit_damage(dice, &damage, flat, roll.critical);
    land_hit(world, dice, target, raw, on_hit, resolution);
}

/// Apply a landed hit: hex, shield reduction, the damage itself and any
/// rider effect on a survivor.
fn land_hit(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    target: MonsterId,
    mut raw: i32,
    on_hit: Option<ActiveEffect>,
    resolution: &mut Resolution,
) {
    if world.player.hex_active {
        raw += dice.roll_d(6) as i32;
    }
    let Some(monster) = world.floor.as_ref().and_then(|f| f.monster(target)) else {
        return;
    };
    let name = monster.name();
    let amount = finalize_damage(raw, monster.effects.magnitude(EffectKind::Shielded));
    resolution.narrate(format!("You hit the {name} for {amount} damage."));
    if damage_monster(world, dice, target, amount, resolution) {
        return;
    }
    if let Some(effect) = on_hit {
        if let Some(monster) = world.floor.as_mut().and_then(|f| f.monster_mut(target)) {
            monster.effects.apply(effect);
            resolution.push(Event::EffectApplied {
                target: Actor::Monster(target),
                kind: effect.kind,
                turns: effect.remaining_turns,
            });
            resolution.narrate(format!("The {name} is {}.", effect.kind.name()));
        }
    }
}

/// Roll damage once and let every hostile combatant within `radius` of the
/// target save against it.
fn area_save(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    target: MonsterId,
    damage: DiceExpression,
    radius: i32,
    half_on_save: bool,
    resolution: &mut Resolution,
) {
    let dc = world.player.spell_save_dc();
    let (Some(floor), Some(combat)) = (world.floor.as_ref(), world.combat.as_ref()) else {
        return;
    };
    let Some(center) = floor.monster(target).map(|m| m.position) else {
        return;
    };
    let victims: Vec<MonsterId> = combat
        .combatants
        .iter()
        .filter_map(|id| floor.monster(*id))
        .filter(|m| m.is_hostile() && m.position.distance(center) <= radius)
        .map(|m| m.id)
        .collect();

    let rolled = damage.roll(dice).total;
    for id in victims {
        let saved = monster_save(dice, id, dc, resolution);
        let amount = save_damage(rolled, saved, half_on_save);
        if amount > 0 {
            damage_monster(world, dice, id, amount, resolution);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monster::MonsterKind;
    use crate::rules::{CombatOutcome, Intent};
    use crate::testing::{ScriptedDice, TestHarness};
    use crate::world::Pos;

    #[test]
    fn test_fighter_hits_goblin() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(4, 3));
        h.start_fight();
        // d20 = 15 (+5 vs AC 15), 1d8 = 1 (+3 STR)
        let mut dice = ScriptedDice::new([15, 1]);
        let res = h.ability(&mut dice, 0, Some(goblin)).unwrap();
        assert_eq!(res.damage_to(Actor::Monster(goblin)), 4);
        assert_eq!(h.monster(goblin).hit_points.current, 3);
        assert_eq!(h.player().actions_remaining, 0);
    }

    #[test]
    fn test_second_action_needs_action_surge() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(4, 3));
        h.start_fight();
        let mut dice = ScriptedDice::new([2, 2]);
        h.ability(&mut dice, 0, Some(goblin)).unwrap();
        assert_eq!(h.ability(&mut dice, 0, Some(goblin)), Err(ActionError::NoActionRemaining));

        let res = h.ability(&mut dice, 2, None).unwrap();
        assert!(res.events.contains(&Event::ResourceSpent {
            resource: Resource::Uses(2),
            amount: 1,
            remaining: 0,
        }));
        assert_eq!(h.player().actions_remaining, 1);
        assert!(h.ability(&mut dice, 0, Some(goblin)).is_ok());
    }

    #[test]
    fn test_out_of_range_changes_nothing() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(6, 3));
        h.start_fight();
        let before = h.world.clone();
        let mut dice = ScriptedDice::new([20]);
        assert_eq!(
            h.ability(&mut dice, 3, Some(goblin)),
            Err(ActionError::OutOfRange { distance: 3, reach: 1 })
        );
        assert_eq!(h.world, before);
        assert_eq!(dice.consumed(), 0);
    }

    #[test]
    fn test_unknown_slot_and_wrong_phase() {
        let mut h = TestHarness::new(CharacterClass::Wizard);
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        assert!(matches!(
            h.ability(&mut dice, 0, None),
            Err(ActionError::WrongPhase { .. })
        ));
        h.spawn(MonsterKind::GiantRat, Pos::new(5, 3));
        h.start_fight();
        assert_eq!(h.ability(&mut dice, 4, None), Err(ActionError::UnknownAbility(4)));
    }

    #[test]
    fn test_rogue_sneak_attack_once() {
        let mut h = TestHarness::new(CharacterClass::Rogue);
        let orc = h.spawn(MonsterKind::Orc, Pos::new(4, 3));
        h.start_fight();
        h.world.player.actions_remaining = 2;
        // Hit 18, 1d6 = 2, sneak 2d6 = 3 + 3.
        let mut dice = ScriptedDice::new([18, 2, 3, 3]);
        let first = h.ability(&mut dice, 0, Some(orc)).unwrap();
        let dex = h.player().modifier(crate::character::Ability::Dexterity);
        assert_eq!(first.damage_to(Actor::Monster(orc)), 2 + dex + 6);
        assert!(h.monster(orc).has_acted);

        let mut dice = ScriptedDice::new([18, 2, 6, 6]);
        let second = h.ability(&mut dice, 0, Some(orc)).unwrap();
        assert_eq!(second.damage_to(Actor::Monster(orc)), 2 + dex);
    }

    #[test]
    fn test_poisoned_blade_applies_on_survivor() {
        let mut h = TestHarness::new(CharacterClass::Rogue);
        let orc = h.spawn(MonsterKind::Orc, Pos::new(4, 3));
        h.start_fight();
        h.monster_mut(orc).has_acted = true;
        let mut dice = ScriptedDice::new([18, 1]);
        h.ability(&mut dice, 2, Some(orc)).unwrap();
        assert!(h.monster(orc).effects.has(EffectKind::Poisoned));
        assert_eq!(h.player().uses_remaining[2], 1);
    }

    #[test]
    fn test_magic_missile_spends_mana_and_kills() {
        let mut h = TestHarness::new(CharacterClass::Wizard);
        let rat = h.spawn(MonsterKind::GiantRat, Pos::new(8, 3));
        h.start_fight();
        let mana = h.player().mana.current;
        let mut dice = ScriptedDice::new([4, 4, 4]);
        let res = h.ability(&mut dice, 1, None).unwrap();
        assert_eq!(h.player().mana.current, mana - 2);
        assert_eq!(res.killed(), vec![rat]);
        assert_eq!(res.outcome(), Some(CombatOutcome::Victory));
        assert_eq!(h.world.phase, Phase::Exploring);
        assert_eq!(h.player().experience, 25);
    }

    #[test]
    fn test_insufficient_mana_rejected() {
        let mut h = TestHarness::new(CharacterClass::Wizard);
        h.spawn(MonsterKind::GiantRat, Pos::new(5, 3));
        h.start_fight();
        h.world.player.mana.current = 4;
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        assert_eq!(
            h.ability(&mut dice, 2, None),
            Err(ActionError::InsufficientResource("mana".to_string()))
        );
        assert_eq!(h.player().mana.current, 4);
    }

    #[test]
    fn test_fireball_hits_cluster_with_one_damage_roll() {
        let mut h = TestHarness::new(CharacterClass::Wizard);
        let a = h.spawn(MonsterKind::Orc, Pos::new(8, 3));
        let b = h.spawn(MonsterKind::Orc, Pos::new(9, 4));
        let far = h.spawn(MonsterKind::Orc, Pos::new(8, 8));
        h.start_fight();
        // 8d6 all 1s = 8; first orc fails (d20 = 2), second saves (d20 = 19).
        let mut dice = ScriptedDice::new([1, 1, 1, 1, 1, 1, 1, 1, 2, 19]);
        let res = h.ability(&mut dice, 2, Some(a)).unwrap();
        assert_eq!(res.damage_to(Actor::Monster(a)), 8);
        assert_eq!(res.damage_to(Actor::Monster(b)), 4);
        assert_eq!(res.damage_to(Actor::Monster(far)), 0);
    }

    #[test]
    fn test_hex_once_per_floor() {
        let mut h = TestHarness::new(CharacterClass::Warlock);
        h.spawn(MonsterKind::Troll, Pos::new(6, 3));
        h.start_fight();
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        h.ability(&mut dice, 2, None).unwrap();
        assert!(h.player().hex_active);
        h.world.player.actions_remaining = 1;
        assert_eq!(
            h.ability(&mut dice, 2, None),
            Err(ActionError::AlreadyActive("Hex".to_string()))
        );
    }

    #[test]
    fn test_summon_rejects_second_ally() {
        let mut h = TestHarness::new(CharacterClass::Warlock);
        h.spawn(MonsterKind::Troll, Pos::new(6, 3));
        h.start_fight();
        h.world.player.pact_points.current = 4;
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        let res = h.ability(&mut dice, 3, None).unwrap();
        assert!(matches!(res.events[2], Event::AllySummoned { turns: 3, .. }));
        h.world.player.actions_remaining = 1;
        assert!(matches!(h.ability(&mut dice, 3, None), Err(ActionError::AlreadyActive(_))));
        assert_eq!(h.player().pact_points.current, 2);
    }

    #[test]
    fn test_bless_adds_to_attack() {
        let mut h = TestHarness::new(CharacterClass::Cleric);
        h.spawn(MonsterKind::Troll, Pos::new(4, 3));
        h.start_fight();
        let before = h.player().attack_bonus();
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        h.ability(&mut dice, 3, None).unwrap();
        assert_eq!(h.player().attack_bonus(), before + 2);
    }

    #[test]
    fn test_potion_heals_and_antidote_needs_poison() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        h.world.player.hit_points.current = 2;
        let mut dice = ScriptedDice::new([4, 4]);
        let res = h.resolve(&mut dice, Intent::UseItem { item: ItemKind::HealingPotion }).unwrap();
        assert_eq!(h.player().hit_points.current, 12);
        assert_eq!(res.events[0], Event::ItemUsed { item: ItemKind::HealingPotion });
        assert_eq!(
            h.resolve(&mut dice, Intent::UseItem { item: ItemKind::HealingPotion }),
            Err(ActionError::InsufficientResource("Potion of Healing".to_string()))
        );

        h.world.player.inventory.add(ItemKind::Antidote, 1);
        assert!(matches!(
            h.resolve(&mut dice, Intent::UseItem { item: ItemKind::Antidote }),
            Err(ActionError::InvalidTarget(_))
        ));
        h.world.player.effects.apply(ActiveEffect::new(EffectKind::Poisoned, 3).with_magnitude(4));
        h.resolve(&mut dice, Intent::UseItem { item: ItemKind::Antidote }).unwrap();
        assert!(!h.player().effects.has(EffectKind::Poisoned));
    }
}
