//! Experience, level-ups and quests.

use crate::character::{PlayerCharacter, MAX_ABILITY_SCORE, MAX_LEVEL};
use crate::dice::DiceSource;
use crate::monster::MonsterKind;
use crate::rules::{ActionError, Event};
use serde::{Deserialize, Serialize};
use tracing::info;

/// XP needed to leave level `n` is `XP_THRESHOLDS[n - 1]`.
pub const XP_THRESHOLDS: [u32; 6] = [100, 300, 600, 1000, 1500, 2100];

/// XP required to reach the next level, or `None` at the cap.
pub fn xp_for_next_level(level: u32) -> Option<u32> {
    if level >= MAX_LEVEL {
        return None;
    }
    XP_THRESHOLDS.get(level.saturating_sub(1) as usize).copied()
}

/// Result of gaining a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub level: u32,
    pub hp_gain: i32,
    pub max_hp: i32,
}

/// Add XP and gain at most one level if the next threshold is reached.
pub fn award_experience<D: DiceSource + ?Sized>(
    player: &mut PlayerCharacter,
    amount: u32,
    dice: &mut D,
) -> Vec<Event> {
    player.experience += amount;
    let mut events = vec![Event::ExperienceGained {
        amount,
        total: player.experience,
    }];

    if let Some(threshold) = xp_for_next_level(player.level) {
        if player.experience >= threshold {
            let gained = level_up(player, dice);
            events.push(Event::LevelUp {
                level: gained.level,
                hp_gain: gained.hp_gain,
                max_hp: gained.max_hp,
            });
        }
    }
    events
}

/// Raise the character one level: roll HP (at least 1), heal fully, bump the
/// primary stat and refresh every per-floor resource.
pub fn level_up<D: DiceSource + ?Sized>(player: &mut PlayerCharacter, dice: &mut D) -> LevelUp {
    let data = player.data();
    let con = player.modifier(crate::character::Ability::Constitution);
    let hp_gain = (dice.roll_d(data.hit_die) as i32 + con).max(1);

    player.level += 1;
    player.hit_points.maximum += hp_gain;
    player.hit_points.current = player.hit_points.maximum;

    let primary = data.stat_priority[0];
    let raised = (player.ability_scores.get(primary) + 1).min(MAX_ABILITY_SCORE);
    player.ability_scores.set(primary, raised);

    player.refresh_resources();

    info!(level = player.level, hp_gain, "level up");
    LevelUp {
        level: player.level,
        hp_gain,
        max_hp: player.hit_points.maximum,
    }
}

// ============================================================================
// Quests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestId(pub u32);

impl std::fmt::Display for QuestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a quest asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestKind {
    /// Kill `target` monsters, of one species or of any.
    Slay { species: Option<MonsterKind> },
    /// Reach dungeon floor `target`.
    ReachFloor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub title: String,
    pub kind: QuestKind,
    pub target: u32,
    pub progress: u32,
    pub reward_xp: u32,
    pub reward_gold: u32,
    pub completed: bool,
    pub turned_in: bool,
}

impl Quest {
    fn new(id: u32, title: &str, kind: QuestKind, target: u32, reward_xp: u32, reward_gold: u32) -> Self {
        Self {
            id: QuestId(id),
            title: title.to_string(),
            kind,
            target,
            progress: 0,
            reward_xp,
            reward_gold,
            completed: false,
            turned_in: false,
        }
    }

    fn advance_to(&mut self, progress: u32) -> Vec<Event> {
        if self.completed || progress <= self.progress {
            return Vec::new();
        }
        self.progress = progress.min(self.target);
        let mut events = vec![Event::QuestProgressed {
            id: self.id,
            progress: self.progress,
            target: self.target,
        }];
        if self.progress >= self.target {
            self.completed = true;
            events.push(Event::QuestCompleted { id: self.id });
        }
        events
    }
}

lazy_static::lazy_static! {
    /// Quests offered on the town board.
    pub static ref QUEST_BOARD: Vec<Quest> = vec![
        Quest::new(1, "Rat Catcher", QuestKind::Slay { species: Some(MonsterKind::GiantRat) }, 3, 75, 20),
        Quest::new(2, "Goblin Trouble", QuestKind::Slay { species: Some(MonsterKind::Goblin) }, 4, 120, 40),
        Quest::new(3, "Into the Depths", QuestKind::ReachFloor, 3, 200, 50),
        Quest::new(4, "Bone Collector", QuestKind::Slay { species: Some(MonsterKind::Skeleton) }, 3, 180, 60),
        Quest::new(5, "Monster Hunter", QuestKind::Slay { species: None }, 15, 300, 100),
        Quest::new(6, "Dragon's Lair", QuestKind::ReachFloor, 8, 600, 250),
    ];
}

/// The quests the player has accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestLog {
    quests: Vec<Quest>,
}

impl QuestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    pub fn get(&self, id: QuestId) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == id)
    }

    /// Take a quest from the board. `deepest_floor` credits floors already
    /// reached.
    pub fn accept(&mut self, id: QuestId, deepest_floor: u32) -> Result<Vec<Event>, ActionError> {
        if self.get(id).is_some() {
            return Err(ActionError::AlreadyActive(format!("quest {id}")));
        }
        let quest = QUEST_BOARD
            .iter()
            .find(|q| q.id == id)
            .cloned()
            .ok_or(ActionError::UnknownQuest(id))?;
        self.quests.push(quest);

        let mut events = vec![Event::QuestAccepted { id }];
        if let Some(quest) = self.quests.last_mut() {
            if quest.kind == QuestKind::ReachFloor {
                events.extend(quest.advance_to(deepest_floor));
            }
        }
        Ok(events)
    }

    pub fn record_kill(&mut self, kind: MonsterKind) -> Vec<Event> {
        let mut events = Vec::new();
        for quest in &mut self.quests {
            if let QuestKind::Slay { species } = quest.kind {
                if species.map_or(true, |s| s == kind) {
                    let next = quest.progress + 1;
                    events.extend(quest.advance_to(next));
                }
            }
        }
        events
    }

    pub fn record_floor(&mut self, floor: u32) -> Vec<Event> {
        let mut events = Vec::new();
        for quest in &mut self.quests {
            if quest.kind == QuestKind::ReachFloor {
                events.extend(quest.advance_to(floor));
            }
        }
        events
    }

    /// Mark a completed quest as turned in and return its rewards.
    pub fn turn_in(&mut self, id: QuestId) -> Result<(u32, u32), ActionError> {
        let quest = self
            .quests
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(ActionError::UnknownQuest(id))?;
        if !quest.completed || quest.turned_in {
            return Err(ActionError::QuestNotReady(id));
        }
        quest.turned_in = true;
        Ok((quest.reward_xp, quest.reward_gold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Ability, AbilityScores, CharacterClass};
    use crate::testing::ScriptedDice;

    fn fighter() -> PlayerCharacter {
        let scores = AbilityScores::assign(CharacterClass::Fighter, &[16, 14, 12, 10, 10, 8]);
        PlayerCharacter::new("Brakka", CharacterClass::Fighter, scores)
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(xp_for_next_level(1), Some(100));
        assert_eq!(xp_for_next_level(6), Some(2100));
        assert_eq!(xp_for_next_level(7), None);
    }

    #[test]
    fn test_level_up_at_threshold() {
        let mut pc = fighter();
        pc.hit_points.current = 3;
        let mut dice = ScriptedDice::new([5]);
        let events = award_experience(&mut pc, 100, &mut dice);

        assert_eq!(pc.level, 2);
        assert_eq!(pc.hit_points.maximum, 14 + 7);
        assert_eq!(pc.hit_points.current, pc.hit_points.maximum);
        assert_eq!(pc.ability_scores.get(Ability::Strength), 17);
        assert!(matches!(events[1], Event::LevelUp { level: 2, hp_gain: 7, .. }));
    }

    #[test]
    fn test_only_one_level_per_award() {
        let mut pc = fighter();
        let mut dice = ScriptedDice::new([1, 1]);
        award_experience(&mut pc, 700, &mut dice);
        assert_eq!(pc.level, 2);
        award_experience(&mut pc, 0, &mut dice);
        assert_eq!(pc.level, 3);
    }

    #[test]
    fn test_no_level_below_threshold() {
        let mut pc = fighter();
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        let events = award_experience(&mut pc, 99, &mut dice);
        assert_eq!(pc.level, 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_hp_gain_is_at_least_one() {
        let scores = AbilityScores::assign(CharacterClass::Wizard, &[16, 3, 12, 10, 10, 8]);
        let mut wizard = PlayerCharacter::new("Ilsa", CharacterClass::Wizard, scores);
        let before = wizard.hit_points.maximum;
        let mut dice = ScriptedDice::new([1]);
        let gained = level_up(&mut wizard, &mut dice);
        assert_eq!(gained.hp_gain, 1);
        assert_eq!(wizard.hit_points.maximum, before + 1);
    }

    #[test]
    fn test_primary_stat_capped() {
        let scores = AbilityScores::assign(CharacterClass::Fighter, &[20, 14, 12, 10, 10, 8]);
        let mut pc = PlayerCharacter::new("Max", CharacterClass::Fighter, scores);
        let mut dice = ScriptedDice::new([4]);
        level_up(&mut pc, &mut dice);
        assert_eq!(pc.ability_scores.strength, 20);
    }

    #[test]
    fn test_level_up_restores_uses() {
        let mut pc = fighter();
        pc.uses_remaining = [0, 0, 0, 0];
        let mut dice = ScriptedDice::new([3]);
        level_up(&mut pc, &mut dice);
        assert_eq!(pc.uses_remaining, [0, 1, 1, 2]);
    }

    #[test]
    fn test_slay_quest_progress_and_turn_in() {
        let mut log = QuestLog::new();
        log.accept(QuestId(1), 0).unwrap();
        assert!(log.record_kill(MonsterKind::Goblin).is_empty());
        log.record_kill(MonsterKind::GiantRat);
        log.record_kill(MonsterKind::GiantRat);
        assert_eq!(log.turn_in(QuestId(1)), Err(ActionError::QuestNotReady(QuestId(1))));

        let events = log.record_kill(MonsterKind::GiantRat);
        assert!(events.contains(&Event::QuestCompleted { id: QuestId(1) }));
        assert_eq!(log.turn_in(QuestId(1)), Ok((75, 20)));
        assert_eq!(log.turn_in(QuestId(1)), Err(ActionError::QuestNotReady(QuestId(1))));
    }

    #[test]
    fn test_reach_floor_credits_past_depth() {
        let mut log = QuestLog::new();
        let events = log.accept(QuestId(3), 3).unwrap();
        assert!(events.contains(&Event::QuestCompleted { id: QuestId(3) }));
    }

    #[test]
    fn test_accept_errors() {
        let mut log = QuestLog::new();
        assert_eq!(log.accept(QuestId(99), 0), Err(ActionError::UnknownQuest(QuestId(99))));
        log.accept(QuestId(2), 0).unwrap();
        assert!(matches!(log.accept(QuestId(2), 0), Err(ActionError::AlreadyActive(_))));
        assert_eq!(log.quests().len(), 1);
    }
}
