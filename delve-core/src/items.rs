//! Consumables, chest loot and the player's inventory.

use crate::dice::{DiceExpression, DiceSource};
use serde::{Deserialize, Serialize};

/// Gold charged for a night at the inn.
pub const INN_PRICE: u32 = 10;

/// Consumable item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    HealingPotion,
    Antidote,
}

/// What a consumable does when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumableEffect {
    Heal(DiceExpression),
    CurePoison,
}

/// A consumable from the standard catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableItem {
    pub kind: ItemKind,
    pub name: String,
    pub price: u32,
    pub effect: ConsumableEffect,
}

impl ConsumableItem {
    fn new(kind: ItemKind, name: &str, price: u32, effect: ConsumableEffect) -> Self {
        Self {
            kind,
            name: name.to_string(),
            price,
            effect,
        }
    }
}

lazy_static::lazy_static! {
    /// Every consumable the shop sells.
    pub static ref CONSUMABLES: Vec<ConsumableItem> = vec![
        ConsumableItem::new(
            ItemKind::HealingPotion,
            "Potion of Healing",
            25,
            ConsumableEffect::Heal(DiceExpression::new(2, 4, 2)),
        ),
        ConsumableItem::new(ItemKind::Antidote, "Antidote", 15, ConsumableEffect::CurePoison),
    ];
}

/// Look up a consumable by kind.
pub fn consumable(kind: ItemKind) -> Option<&'static ConsumableItem> {
    CONSUMABLES.iter().find(|item| item.kind == kind)
}

/// Contents of an opened chest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loot {
    Item(ItemKind),
    Gold(u32),
}

/// Half the chests hold a potion, the rest hold 2d6 x 5 gold.
pub fn roll_chest_loot<D: DiceSource + ?Sized>(dice: &mut D) -> Loot {
    if dice.chance(1, 2) {
        Loot::Item(ItemKind::HealingPotion)
    } else {
        Loot::Gold(dice.roll_dice(2, 6).total as u32 * 5)
    }
}

/// Items and gold carried by the player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub potions: u32,
    pub antidotes: u32,
    pub gold: u32,
}

impl Inventory {
    /// One potion, nothing else.
    pub fn starting() -> Self {
        Self {
            potions: 1,
            ..Self::default()
        }
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        match kind {
            ItemKind::HealingPotion => self.potions,
            ItemKind::Antidote => self.antidotes,
        }
    }

    pub fn add(&mut self, kind: ItemKind, amount: u32) {
        match kind {
            ItemKind::HealingPotion => self.potions += amount,
            ItemKind::Antidote => self.antidotes += amount,
        }
    }

    /// Remove one item. Returns false if none are carried.
    pub fn take(&mut self, kind: ItemKind) -> bool {
        let slot = match kind {
            ItemKind::HealingPotion => &mut self.potions,
            ItemKind::Antidote => &mut self.antidotes,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Spend gold if the purse holds enough.
    pub fn spend_gold(&mut self, amount: u32) -> bool {
        if self.gold < amount {
            return false;
        }
        self.gold -= amount;
        true
    }
}
