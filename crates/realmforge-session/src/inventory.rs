//! A character's pockets and gold.

use std::collections::HashMap;

use realmforge_protocol::PocketType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::InventoryError;

/// Largest amount a single stack may hold.
pub const MAX_STACK: i16 = 999;

/// Slots per pocket.
pub const POCKET_SIZE: i16 = 48;

/// Largest amount of gold a character may carry.
pub const MAX_GOLD: i64 = 1_000_000_000;

/// One stack of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInstance {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub vnum: i16,
    pub amount: i16,
    pub pocket: PocketType,
    #[serde(default)]
    pub slot: i16,
}

impl ItemInstance {
    pub fn new(vnum: i16, amount: i16, pocket: PocketType) -> Self {
        Self {
            id: Uuid::new_v4(),
            vnum,
            amount,
            pocket,
            slot: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    items: HashMap<(PocketType, i16), ItemInstance>,
    gold: i64,
}

impl Inventory {
    /// Rebuilds an inventory from stored stacks. Stacks in a slot that is
    /// already taken or out of range are moved to a free slot; if none is
    /// left they are dropped with a warning.
    pub fn from_items(items: impl IntoIterator<Item = ItemInstance>, gold: i64) -> Self {
        let mut inventory = Self {
            items: HashMap::new(),
            gold: gold.clamp(0, MAX_GOLD),
        };
        for item in items {
            let key = (item.pocket, item.slot);
            if (0..POCKET_SIZE).contains(&item.slot) && !inventory.items.contains_key(&key) {
                inventory.items.insert(key, item);
            } else if let Err(e) = inventory.add(item) {
                tracing::warn!(error = %e, "stored item does not fit, dropping it");
            }
        }
        inventory
    }

    pub fn get(&self, pocket: PocketType, slot: i16) -> Option<&ItemInstance> {
        self.items.get(&(pocket, slot))
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> {
        self.items.values()
    }

    /// The stacks of one pocket ordered by slot.
    pub fn pocket(&self, pocket: PocketType) -> Vec<&ItemInstance> {
        let mut items: Vec<_> = self.items.values().filter(|i| i.pocket == pocket).collect();
        items.sort_by_key(|i| i.slot);
        items
    }

    /// Takes `amount` off the stack in `(pocket, slot)` as a new stack with
    /// its own id. The source stack is removed once it reaches zero.
    pub fn split(
        &mut self,
        pocket: PocketType,
        slot: i16,
        amount: i16,
    ) -> Result<ItemInstance, InventoryError> {
        let key = (pocket, slot);
        let source = self.items.get_mut(&key).ok_or(InventoryError::EmptySlot)?;
        if amount <= 0 || amount > source.amount {
            return Err(InventoryError::InvalidAmount);
        }
        source.amount -= amount;
        let taken = ItemInstance {
            id: Uuid::new_v4(),
            amount,
            ..source.clone()
        };
        if source.amount == 0 {
            self.items.remove(&key);
        }
        Ok(taken)
    }

    /// Stores a stack: onto an existing stack of the same item when the sum
    /// fits, otherwise into the first free slot of its pocket.
    ///
    /// Returns the slot the amount ended up in.
    pub fn add(&mut self, mut item: ItemInstance) -> Result<i16, InventoryError> {
        if item.amount <= 0 || item.amount > MAX_STACK {
            return Err(InventoryError::InvalidAmount);
        }
        if let Some(stack) = self.items.values_mut().find(|s| {
            s.pocket == item.pocket && s.vnum == item.vnum && s.amount + item.amount <= MAX_STACK
        }) {
            stack.amount += item.amount;
            return Ok(stack.slot);
        }
        let slot = self.free_slot(item.pocket).ok_or(InventoryError::Full)?;
        item.slot = slot;
        self.items.insert((item.pocket, slot), item);
        Ok(slot)
    }

    /// Whether every stack in `items` would fit.
    pub fn can_add_all<'a>(&self, items: impl IntoIterator<Item = &'a ItemInstance>) -> bool {
        let mut scratch = self.clone();
        items.into_iter().all(|item| scratch.add(item.clone()).is_ok())
    }

    fn free_slot(&self, pocket: PocketType) -> Option<i16> {
        (0..POCKET_SIZE).find(|slot| !self.items.contains_key(&(pocket, *slot)))
    }

    pub fn gold(&self) -> i64 {
        self.gold
    }

    /// Adds gold up to [`MAX_GOLD`]. Returns the new balance.
    pub fn add_gold(&mut self, amount: i64) -> i64 {
        self.gold = self.gold.saturating_add(amount.max(0)).min(MAX_GOLD);
        self.gold
    }

    pub fn remove_gold(&mut self, amount: i64) -> Result<i64, InventoryError> {
        if amount < 0 {
            return Err(InventoryError::InvalidAmount);
        }
        if amount > self.gold {
            return Err(InventoryError::InsufficientGold);
        }
        self.gold -= amount;
        Ok(self.gold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_with(amount: i16) -> Inventory {
        let mut item = ItemInstance::new(1012, amount, PocketType::Main);
        item.slot = 3;
        Inventory::from_items([item], 500)
    }

    #[test]
    fn test_split_boundaries() {
        let mut inv = inventory_with(10);
        assert_eq!(
            inv.split(PocketType::Main, 3, 0),
            Err(InventoryError::InvalidAmount)
        );
        assert_eq!(
            inv.split(PocketType::Main, 3, 11),
            Err(InventoryError::InvalidAmount)
        );
        assert_eq!(
            inv.split(PocketType::Main, 4, 1),
            Err(InventoryError::EmptySlot)
        );

        let source_id = inv.get(PocketType::Main, 3).unwrap().id;
        let taken = inv.split(PocketType::Main, 3, 4).unwrap();
        assert_eq!(taken.amount, 4);
        assert_eq!(taken.vnum, 1012);
        assert_ne!(taken.id, source_id);
        assert_eq!(inv.get(PocketType::Main, 3).unwrap().amount, 6);

        inv.split(PocketType::Main, 3, 6).unwrap();
        assert!(inv.get(PocketType::Main, 3).is_none());
    }

    #[test]
    fn test_add_stacks_then_uses_free_slot() {
        let mut inv = inventory_with(990);
        assert_eq!(inv.add(ItemInstance::new(1012, 9, PocketType::Main)), Ok(3));
        assert_eq!(inv.get(PocketType::Main, 3).unwrap().amount, 999);

        // The stack is full now: a new one goes to slot 0.
        assert_eq!(inv.add(ItemInstance::new(1012, 1, PocketType::Main)), Ok(0));
        assert_eq!(inv.pocket(PocketType::Main).len(), 2);
    }

    #[test]
    fn test_add_full_pocket() {
        let mut inv = Inventory::default();
        for vnum in 0..POCKET_SIZE {
            inv.add(ItemInstance::new(vnum, 1, PocketType::Etc)).unwrap();
        }
        let extra = ItemInstance::new(999, 1, PocketType::Etc);
        assert!(!inv.can_add_all([&extra]));
        assert_eq!(inv.add(extra), Err(InventoryError::Full));
        // Other pockets are unaffected.
        assert!(inv.add(ItemInstance::new(999, 1, PocketType::Main)).is_ok());
    }

    #[test]
    fn test_gold_bounds() {
        let mut inv = inventory_with(1);
        assert_eq!(inv.remove_gold(501), Err(InventoryError::InsufficientGold));
        assert_eq!(inv.remove_gold(200), Ok(300));
        assert_eq!(inv.add_gold(MAX_GOLD), MAX_GOLD);
    }

    #[test]
    fn test_from_items_relocates_conflicting_slots() {
        let mut a = ItemInstance::new(1, 1, PocketType::Main);
        let mut b = ItemInstance::new(2, 1, PocketType::Main);
        a.slot = 5;
        b.slot = 5;
        let inv = Inventory::from_items([a, b], 0);
        assert_eq!(inv.get(PocketType::Main, 5).unwrap().vnum, 1);
        assert_eq!(inv.get(PocketType::Main, 0).unwrap().vnum, 2);
    }
}
