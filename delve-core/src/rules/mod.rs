//! Rules engine for dungeon exploration and tactical combat.
//!
//! Intents describe what the player wants to do. The engine validates an
//! intent against the world first and only then mutates it, returning a
//! [`Resolution`]: the ordered events and narration the presentation layer
//! renders. A rejected intent returns an [`ActionError`] and leaves the world
//! untouched.

mod abilities;
mod attack;
mod enemy;
mod movement;

pub use attack::{attack_hits, finalize_damage, roll_attack, roll_hit_damage, save_damage, AttackRoll};

use crate::character::HitPoints;
use crate::class_data::AllyTemplate;
use crate::conditions::EffectKind;
use crate::dice::{DiceExpression, DiceSource};
use crate::dungeon::{generate, GeneratorConfig};
use crate::items::{ItemKind, Loot};
use crate::monster::{MonsterId, MonsterKind};
use crate::progression::{award_experience, QuestId};
use crate::world::{Floor, GameWorld, Location, Pos};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// A hostile monster this close to the player starts an encounter.
pub const AGGRO_RANGE: i32 = 5;
/// Hostile monsters this close when an encounter starts join it.
pub const ENCOUNTER_RADIUS: i32 = 8;
/// Cells around the player marked explored after each step.
pub const SIGHT_RADIUS: i32 = 5;

// ============================================================================
// Combat State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatOutcome {
    Victory,
    Defeat,
}

/// Where the run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Exploring,
    /// Monsters spotted; waiting for combat to start.
    Encountered,
    PlayerTurn,
    /// Transient: only observable while the enemy turn is being resolved.
    EnemyTurn,
    /// `Resolved(Victory)` is transient as well; `Resolved(Defeat)` is final.
    Resolved(CombatOutcome),
}

impl Phase {
    pub fn is_defeat(&self) -> bool {
        matches!(self, Phase::Resolved(CombatOutcome::Defeat))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Exploring => write!(f, "exploring"),
            Phase::Encountered => write!(f, "facing an encounter"),
            Phase::PlayerTurn => write!(f, "on your turn"),
            Phase::EnemyTurn => write!(f, "on the enemy turn"),
            Phase::Resolved(CombatOutcome::Victory) => write!(f, "victorious"),
            Phase::Resolved(CombatOutcome::Defeat) => write!(f, "defeated"),
        }
    }
}

/// A summoned creature fighting for the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ally {
    pub name: String,
    pub attack_bonus: i32,
    pub damage: DiceExpression,
    /// Reach measured from the player, whom the ally stays beside.
    pub range: i32,
    pub turns_remaining: u32,
}

impl From<AllyTemplate> for Ally {
    fn from(template: AllyTemplate) -> Self {
        Self {
            name: template.name.to_string(),
            attack_bonus: template.attack_bonus,
            damage: template.damage,
            range: template.range,
            turns_remaining: template.turns,
        }
    }
}

/// Bookkeeping for the encounter in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    pub round: u32,
    /// Monsters taking part, in the order they act.
    pub combatants: Vec<MonsterId>,
    pub ally: Option<Ally>,
    /// Started by a revealed mimic or a roadside ambush.
    pub ambush: bool,
}

impl CombatState {
    pub fn new(combatants: Vec<MonsterId>, ambush: bool) -> Self {
        Self {
            round: 0,
            combatants,
            ally: None,
            ambush,
        }
    }

    pub fn includes(&self, id: MonsterId) -> bool {
        self.combatants.contains(&id)
    }
}

// ============================================================================
// Intents, Events and Resolutions
// ============================================================================

/// Something the player asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Move { to: Pos },
    StartCombat,
    /// Use the ability in `slot`; without a target the nearest enemy in
    /// range is chosen.
    UseAbility { slot: usize, target: Option<MonsterId> },
    EndTurn,
    UseItem { item: ItemKind },
}

/// Who did or suffered something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Player,
    Monster(MonsterId),
    Ally,
}

/// Spendable resources reported in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Mana,
    PactPoints,
    /// Per-floor uses of the ability in this slot.
    Uses(usize),
}

/// A concrete thing that happened while resolving an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    PlayerMoved { from: Pos, to: Pos },
    FloorEntered { floor: u32 },
    TrapTriggered { position: Pos, damage: i32, saved: bool },
    ChestOpened { position: Pos, loot: Loot },
    MonsterRevealed { id: MonsterId },
    EncounterStarted { combatants: Vec<MonsterId>, ambush: bool },
    MonsterJoined { id: MonsterId },
    TurnStarted { round: u32, movement: u32, stunned: bool },
    AbilityUsed { slot: usize, name: String },
    ResourceSpent { resource: Resource, amount: u32, remaining: u32 },
    ResourceRestored { resource: Resource, amount: u32, remaining: u32 },
    AttackHit { attacker: Actor, target: Actor, natural: u32, total: i32, target_ac: i32, critical: bool },
    AttackMissed { attacker: Actor, target: Actor, natural: u32, total: i32, target_ac: i32 },
    SavingThrow { actor: Actor, total: i32, dc: i32, success: bool },
    Damaged { target: Actor, amount: i32, hp_after: i32 },
    Healed { target: Actor, amount: i32, hp_after: i32 },
    EffectApplied { target: Actor, kind: EffectKind, turns: u32 },
    EffectExpired { target: Actor, kind: EffectKind },
    MonsterMoved { id: MonsterId, from: Pos, to: Pos },
    PlayerPushed { from: Pos, to: Pos },
    MonsterKilled { id: MonsterId, kind: MonsterKind, xp: u32 },
    ExperienceGained { amount: u32, total: u32 },
    LevelUp { level: u32, hp_gain: i32, max_hp: i32 },
    AllySummoned { name: String, turns: u32 },
    AllyDismissed { name: String },
    ItemUsed { item: ItemKind },
    ItemGained { item: ItemKind },
    GoldChanged { amount: i32, total: u32 },
    QuestAccepted { id: QuestId },
    QuestProgressed { id: QuestId, progress: u32, target: u32 },
    QuestCompleted { id: QuestId },
    QuestTurnedIn { id: QuestId },
    CombatResolved { outcome: CombatOutcome },
    PlayerDied,
}

/// The outcome of resolving an intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub events: Vec<Event>,
    /// Human-readable narration, one line per notable step.
    pub log: Vec<String>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = Event>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn narrate(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Append another resolution's events and narration.
    pub fn absorb(&mut self, other: Resolution) {
        self.events.extend(other.events);
        self.log.extend(other.log);
    }

    /// Total damage dealt to `target` across all events.
    pub fn damage_to(&self, target: Actor) -> i32 {
        self.events
            .iter()
            .map(|e| match e {
                Event::Damaged { target: t, amount, .. } if *t == target => *amount,
                _ => 0,
            })
            .sum()
    }

    pub fn killed(&self) -> Vec<MonsterId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::MonsterKilled { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self) -> Option<CombatOutcome> {
        self.events.iter().find_map(|e| match e {
            Event::CombatResolved { outcome } => Some(*outcome),
            _ => None,
        })
    }

    /// Serialize for presenters running outside this process.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Why an intent was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("No valid target: {0}")]
    InvalidTarget(String),

    #[error("Target is {distance} tiles away but the reach is {reach}")]
    OutOfRange { distance: i32, reach: i32 },

    #[error("Not enough {0}")]
    InsufficientResource(String),

    #[error("No action remaining this turn")]
    NoActionRemaining,

    #[error("Cannot move there: {0}")]
    InvalidMovement(String),

    #[error("Cannot {action} while {phase}")]
    WrongPhase { action: &'static str, phase: Phase },

    #[error("Cannot {0} here")]
    WrongLocation(&'static str),

    #[error("No ability in slot {0}")]
    UnknownAbility(usize),

    #[error("Unknown quest {0}")]
    UnknownQuest(QuestId),

    #[error("Quest {0} is not ready to turn in")]
    QuestNotReady(QuestId),

    #[error("{0} is already active")]
    AlreadyActive(String),

    #[error("The adventure is over")]
    GameOver,
}

// ============================================================================
// Rules Engine
// ============================================================================

/// Resolves intents against a [`GameWorld`].
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    generator: GeneratorConfig,
}

impl RulesEngine {
    pub fn new(generator: GeneratorConfig) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &GeneratorConfig {
        &self.generator
    }

    /// Resolve an intent and apply it to the world.
    pub fn resolve(
        &self,
        world: &mut GameWorld,
        dice: &mut dyn DiceSource,
        intent: Intent,
    ) -> Result<Resolution, ActionError> {
        if world.is_game_over() {
            return Err(ActionError::GameOver);
        }
        match intent {
            Intent::Move { to } => self.resolve_move(world, dice, to),
            Intent::StartCombat => self.resolve_start_combat(world),
            Intent::UseAbility { slot, target } => self.resolve_ability(world, dice, slot, target),
            Intent::EndTurn => self.resolve_end_turn(world, dice),
            Intent::UseItem { item } => self.resolve_use_item(world, dice, item),
        }
    }

    /// Generate floor `number`, move the player onto it and check whether
    /// anything is already in sight.
    pub fn enter_floor(&self, world: &mut GameWorld, dice: &mut dyn DiceSource, number: u32) -> Resolution {
        let dungeon = generate(&self.generator, number, dice);
        let spawn = dungeon.spawn;
        let mut floor = Floor::new(number, dungeon);
        floor.dungeon.reveal_around(spawn, SIGHT_RADIUS);

        world.floor = Some(floor);
        world.location = Location::Dungeon;
        world.phase = Phase::Exploring;
        world.combat = None;
        world.deepest_floor = world.deepest_floor.max(number);
        world.player.enter_floor(spawn);

        info!(floor = number, "entered floor");
        let mut resolution = Resolution::new().with_event(Event::FloorEntered { floor: number });
        resolution.narrate(format!("You arrive on floor {number} of the dungeon."));
        resolution.extend(world.quests.record_floor(number));
        movement::update_awareness(world, &mut resolution);
        resolution
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn require_phase(world: &GameWorld, expected: Phase, action: &'static str) -> Result<(), ActionError> {
    if world.phase != expected {
        return Err(ActionError::WrongPhase {
            action,
            phase: world.phase,
        });
    }
    Ok(())
}

/// Deal damage to a monster; a kill is credited immediately. Returns whether
/// the monster died.
fn damage_monster(
    world: &mut GameWorld,
    dice: &mut dyn DiceSource,
    id: MonsterId,
    amount: i32,
    resolution: &mut Resolution,
) -> bool {
    let Some(monster) = world.floor.as_mut().and_then(|f| f.monster_mut(id)) else {
        return false;
    };
    if !monster.is_alive() || amount <= 0 {
        return false;
    }
    let hp_after = monster.hit_points.take_damage(amount);
    let (kind, name) = (monster.kind, monster.name());
    resolution.push(Event::Damaged {
        target: Actor::Monster(id),
        amount,
        hp_after,
    });
    if hp_after > 0 {
        return false;
    }

    let xp = kind.template().xp;
    resolution.push(Event::MonsterKilled { id, kind, xp });
    resolution.narrate(format!("The {name} dies. (+{xp} XP)"));
    credit_kill(world, dice, kind, resolution);
    true
}

fn credit_kill(world: &mut GameWorld, dice: &mut dyn DiceSource, kind: MonsterKind, resolution: &mut Resolution) {
    let player = &mut world.player;
    player.kills += 1;

    let events = award_experience(player, kind.template().xp, dice);
    for event in &events {
        if let Event::LevelUp { level, .. } = event {
            resolution.narrate(format!("You reach level {level}!"));
        }
    }
    resolution.extend(events);

    if player.pact_points.maximum > 0 {
        let restored = player.pact_points.restore(1);
        if restored > 0 {
            resolution.push(Event::ResourceRestored {
                resource: Resource::PactPoints,
                amount: restored,
                remaining: player.pact_points.current,
            });
        }
    }

    resolution.extend(world.quests.record_kill(kind));
}

/// Deal damage to the player. Death ends the run. Returns whether the player
/// died.
fn damage_player(world: &mut GameWorld, amount: i32, resolution: &mut Resolution) -> bool {
    if amount <= 0 || !world.player.is_alive() {
        return false;
    }
    let hp_after = world.player.hit_points.take_damage(amount);
    resolution.push(Event::Damaged {
        target: Actor::Player,
        amount,
        hp_after,
    });
    if hp_after > 0 {
        return false;
    }

    let was_fighting = world.in_combat();
    world.phase = Phase::Resolved(CombatOutcome::Defeat);
    world.combat = None;
    resolution.push(Event::PlayerDied);
    if was_fighting {
        resolution.push(Event::CombatResolved {
            outcome: CombatOutcome::Defeat,
        });
    }
    resolution.narrate(format!("{} has fallen.", world.player.name));
    info!(level = world.player.level, floor = world.deepest_floor, "player died");
    true
}

fn heal_player(world: &mut GameWorld, amount: i32, resolution: &mut Resolution) -> i32 {
    let healed = world.player.hit_points.heal(amount);
    resolution.push(Event::Healed {
        target: Actor::Player,
        amount: healed,
        hp_after: world.player.hit_points.current,
    });
    healed
}

/// End the encounter in victory if no revealed combatant is left standing.
fn check_victory(world: &mut GameWorld, resolution: &mut Resolution) -> bool {
    let Some(combat) = world.combat.as_ref() else {
        return false;
    };
    if !world.in_combat() || !world.player.is_alive() {
        return false;
    }
    let floor = match world.floor.as_ref() {
        Some(floor) => floor,
        None => return false,
    };
    let enemies_left = combat
        .combatants
        .iter()
        .filter_map(|id| floor.monster(*id))
        .any(|m| m.is_hostile());
    if enemies_left {
        return false;
    }

    finish_victory(world, resolution);
    true
}

fn finish_victory(world: &mut GameWorld, resolution: &mut Resolution) {
    world.phase = Phase::Resolved(CombatOutcome::Victory);
    resolution.push(Event::CombatResolved {
        outcome: CombatOutcome::Victory,
    });
    resolution.narrate("The last enemy falls. Victory!");

    if let Some(ally) = world.combat.take().and_then(|c| c.ally) {
        resolution.push(Event::AllyDismissed { name: ally.name });
    }
    if let Some(floor) = world.floor.as_mut() {
        for monster in &mut floor.monsters {
            monster.has_acted = false;
        }
    }

    let player = &mut world.player;
    for kind in player.effects.end_combat() {
        resolution.push(Event::EffectExpired {
            target: Actor::Player,
            kind,
        });
    }
    player.movement_remaining = player.movement_budget();
    player.actions_remaining = 1;

    if world.location == Location::Road {
        // The ambush arena is discarded and the journey resumes.
        world.floor = None;
    }
    world.phase = Phase::Exploring;
    info!(location = ?world.location, "combat won");
}

/// Monster save: d20 + flat bonus against the player's DC.
fn monster_save(dice: &mut dyn DiceSource, id: MonsterId, dc: i32, resolution: &mut Resolution) -> bool {
    let total = dice.roll_d(20) as i32 + crate::monster::MONSTER_SAVE_BONUS;
    let success = total >= dc;
    resolution.push(Event::SavingThrow {
        actor: Actor::Monster(id),
        total,
        dc,
        success,
    });
    success
}

/// Player DEX save against a fixed DC.
fn player_save(world: &GameWorld, dice: &mut dyn DiceSource, dc: i32, resolution: &mut Resolution) -> bool {
    let total = dice.roll_d(20) as i32 + world.player.modifier(crate::character::Ability::Dexterity);
    let success = total >= dc;
    resolution.push(Event::SavingThrow {
        actor: Actor::Player,
        total,
        dc,
        success,
    });
    success
}

/// HP snapshot helper for narration.
fn hp_text(hp: &HitPoints) -> String {
    format!("{}/{}", hp.current.max(0), hp.maximum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_builders() {
        let mut res = Resolution::new().with_event(Event::PlayerDied).with_events([Event::FloorEntered { floor: 2 }]);
        res.narrate("line");
        let mut other = Resolution::new();
        other.push(Event::MonsterKilled {
            id: MonsterId(3),
            kind: MonsterKind::Goblin,
            xp: 50,
        });
        res.absorb(other);
        assert_eq!(res.events.len(), 3);
        assert_eq!(res.killed(), vec![MonsterId(3)]);
        assert_eq!(res.log, vec!["line".to_string()]);
    }

    #[test]
    fn test_resolution_json() {
        let res = Resolution::new().with_event(Event::CombatResolved {
            outcome: CombatOutcome::Victory,
        });
        let json = res.to_json().unwrap();
        assert!(json.contains("CombatResolved"));
        assert!(json.contains("Victory"));
    }

    #[test]
    fn test_error_messages() {
        let err = ActionError::WrongPhase {
            action: "end the turn",
            phase: Phase::Exploring,
        };
        assert_eq!(err.to_string(), "Cannot end the turn while exploring");
        assert_eq!(
            ActionError::OutOfRange { distance: 7, reach: 6 }.to_string(),
            "Target is 7 tiles away but the reach is 6"
        );
    }
}
