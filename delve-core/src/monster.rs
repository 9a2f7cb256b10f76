//! Monster species, their stat blocks and live monster instances.

use crate::character::HitPoints;
use crate::conditions::{ActiveEffects, EffectKind, SHIELDED_AC_BONUS};
use crate::dice::DiceExpression;
use crate::world::Pos;
use serde::{Deserialize, Serialize};

/// Flat bonus monsters add to saving throws.
pub const MONSTER_SAVE_BONUS: i32 = 1;
/// Extra damage an orc deals while below half HP.
pub const RAGE_BONUS: i32 = 3;
/// AC bonus while a hobgoblin has its shield raised.
pub const SHIELD_BONUS: i32 = 2;
/// HP a troll regains at the start of its turn.
pub const REGENERATION: i32 = 5;
/// A mimic reveals itself when the player comes this close.
pub const MIMIC_TRIGGER_RANGE: i32 = 1;
/// A dragon breathes when the player is within this many tiles.
pub const BREATH_RANGE: i32 = 3;
/// Enemy turns before a spent breath weapon may try to recharge.
pub const BREATH_COOLDOWN: u32 = 2;

/// Index of a monster in the floor's monster arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonsterId(pub usize);

impl std::fmt::Display for MonsterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monster species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonsterKind {
    GiantRat,
    Kobold,
    Goblin,
    Skeleton,
    GiantSpider,
    Orc,
    Hobgoblin,
    Mimic,
    Ogre,
    Wraith,
    Troll,
    YoungDragon,
}

/// Species-specific behaviour, with whatever state it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialAbility {
    None,
    /// Bonus damage while below half HP.
    Rage,
    /// Hits may poison.
    WebPoison,
    /// AC bonus re-rolled every enemy turn.
    Shield { raised: bool },
    /// Heals at the start of every turn.
    Regenerate,
    /// Disguised until the player comes close.
    Surprise,
    /// Heals for half the damage it deals.
    LifeDrain,
    /// One-time area slam that can stun and push the player.
    GroundSlam { used: bool },
    /// Cone of fire; must recharge after use.
    BreathWeapon { charged: bool, cooldown: u32 },
}

/// Immutable stat block shared by every monster of a species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonsterTemplate {
    pub name: &'static str,
    pub armor_class: i32,
    pub max_hp: i32,
    pub attack_bonus: i32,
    pub damage: DiceExpression,
    pub xp: u32,
    /// Attack range in tiles for ranged species.
    pub range: Option<i32>,
    pub challenge: &'static str,
    pub min_floor: u32,
    pub special: SpecialAbility,
}

impl MonsterKind {
    pub fn all() -> [MonsterKind; 12] {
        use MonsterKind::*;
        [
            GiantRat,
            Kobold,
            Goblin,
            Skeleton,
            GiantSpider,
            Orc,
            Hobgoblin,
            Mimic,
            Ogre,
            Wraith,
            Troll,
            YoungDragon,
        ]
    }

    /// Species that may appear on `floor`.
    pub fn unlocked_at(floor: u32) -> Vec<MonsterKind> {
        Self::all()
            .into_iter()
            .filter(|kind| kind.template().min_floor <= floor)
            .collect()
    }

    pub fn name(&self) -> &'static str {
        self.template().name
    }

    pub fn template(&self) -> MonsterTemplate {
        let t = |name, armor_class, max_hp, attack_bonus, damage, xp, challenge, min_floor| MonsterTemplate {
            name,
            armor_class,
            max_hp,
            attack_bonus,
            damage,
            xp,
            range: None,
            challenge,
            min_floor,
            special: SpecialAbility::None,
        };
        let d = DiceExpression::new;
        match self {
            MonsterKind::GiantRat => t("Giant Rat", 12, 7, 4, d(1, 4, 2), 25, "1/8", 1),
            MonsterKind::Kobold => MonsterTemplate {
                range: Some(4),
                ..t("Kobold", 12, 5, 4, d(1, 4, 2), 25, "1/8", 1)
            },
            MonsterKind::Goblin => t("Goblin", 15, 7, 4, d(1, 6, 2), 50, "1/4", 1),
            MonsterKind::Skeleton => MonsterTemplate {
                range: Some(5),
                ..t("Skeleton", 13, 13, 4, d(1, 6, 2), 100, "1/4", 2)
            },
            MonsterKind::GiantSpider => MonsterTemplate {
                special: SpecialAbility::WebPoison,
                ..t("Giant Spider", 14, 26, 5, d(1, 8, 3), 200, "1", 2)
            },
            MonsterKind::Orc => MonsterTemplate {
                special: SpecialAbility::Rage,
                ..t("Orc", 13, 15, 5, d(1, 12, 3), 150, "1/2", 3)
            },
            MonsterKind::Hobgoblin => MonsterTemplate {
                special: SpecialAbility::Shield { raised: false },
                ..t("Hobgoblin", 16, 11, 3, d(1, 8, 1), 100, "1/2", 3)
            },
            MonsterKind::Mimic => MonsterTemplate {
                special: SpecialAbility::Surprise,
                ..t("Mimic", 12, 58, 5, d(1, 8, 3), 450, "2", 4)
            },
            MonsterKind::Ogre => MonsterTemplate {
                special: SpecialAbility::GroundSlam { used: false },
                ..t("Ogre", 11, 59, 6, d(2, 8, 4), 450, "2", 5)
            },
            MonsterKind::Wraith => MonsterTemplate {
                special: SpecialAbility::LifeDrain,
                ..t("Wraith", 13, 67, 6, d(2, 8, 3), 700, "5", 6)
            },
            MonsterKind::Troll => MonsterTemplate {
                special: SpecialAbility::Regenerate,
                ..t("Troll", 15, 84, 7, d(2, 6, 4), 800, "5", 7)
            },
            MonsterKind::YoungDragon => MonsterTemplate {
                special: SpecialAbility::BreathWeapon {
                    charged: true,
                    cooldown: 0,
                },
                ..t("Young Dragon", 18, 75, 7, d(1, 10, 4), 500, "10", 8)
            },
        }
    }
}

/// A live monster on the current floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: MonsterId,
    pub kind: MonsterKind,
    pub hit_points: HitPoints,
    pub position: Pos,
    /// Set once the monster acts in a round; enables sneak attacks while clear.
    pub has_acted: bool,
    /// False while a mimic is still disguised.
    pub revealed: bool,
    pub effects: ActiveEffects,
    pub special: SpecialAbility,
}

impl Monster {
    pub fn new(id: MonsterId, kind: MonsterKind, position: Pos) -> Self {
        let template = kind.template();
        Self {
            id,
            kind,
            hit_points: HitPoints::new(template.max_hp),
            position,
            has_acted: false,
            revealed: !matches!(template.special, SpecialAbility::Surprise),
            effects: ActiveEffects::new(),
            special: template.special,
        }
    }

    pub fn template(&self) -> MonsterTemplate {
        self.kind.template()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_alive(&self) -> bool {
        !self.hit_points.is_dead()
    }

    /// Alive and not disguised.
    pub fn is_hostile(&self) -> bool {
        self.is_alive() && self.revealed
    }

    pub fn armor_class(&self) -> i32 {
        let mut ac = self.template().armor_class;
        if let SpecialAbility::Shield { raised: true } = self.special {
            ac += SHIELD_BONUS;
        }
        if self.effects.has(EffectKind::Shielded) {
            ac += SHIELDED_AC_BONUS;
        }
        ac
    }

    /// Tiles within which the monster can attack.
    pub fn reach(&self) -> i32 {
        self.template().range.unwrap_or(1)
    }

    /// Flat damage bonus from the species special.
    pub fn damage_bonus(&self) -> i32 {
        match self.special {
            SpecialAbility::Rage if self.hit_points.below_half() => RAGE_BONUS,
            _ => 0,
        }
    }
}
