//! The in-game character and its interaction-mode guard.
//!
//! A [`Character`] is shared by its session, the [`Broadcaster`](crate::Broadcaster)
//! and the handlers. Identity never changes after load; everything mutable
//! sits behind its own short-lived `parking_lot` lock.
//!
//! # Interaction modes
//!
//! A character is in at most one of {exchange, shop}. [`Interaction`] keeps
//! both flags private and only flips them through
//! [`enter_exchange`](Interaction::enter_exchange) and
//! [`open_shop`](Interaction::open_shop), which refuse while the other mode
//! is active.
//!
//! Exchange transitions touch two characters. [`lock_pair`] takes both
//! interaction locks in ascending visual id order, so a transition reads
//! and writes both sides under one ownership and two concurrent
//! transitions on the same pair cannot deadlock.

use std::collections::HashMap;
use std::fmt;

use parking_lot::{Mutex, MutexGuard, RwLock};
use realmforge_protocol::{AccountId, PocketType, RelationType, VisualId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CharacterRecord, CharacterRelation, InteractionConflict, Inventory};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Id of one live map instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapInstanceId(pub Uuid);

impl MapInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MapInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MapInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

/// Where a character stands. `instance` is `None` until the character has
/// entered the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub map_id: i16,
    pub instance: Option<MapInstanceId>,
    pub x: i16,
    pub y: i16,
    pub direction: u8,
}

impl Position {
    /// Chebyshev distance in cells, saturating at `i16::MAX`.
    pub fn distance_to(&self, x: i16, y: i16) -> i16 {
        let dx = (i32::from(self.x) - i32::from(x)).abs();
        let dy = (i32::from(self.y) - i32::from(y)).abs();
        i16::try_from(dx.max(dy)).unwrap_or(i16::MAX)
    }
}

// ---------------------------------------------------------------------------
// Exchange state
// ---------------------------------------------------------------------------

/// One offered stack, resolved against the offering inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeItem {
    pub pocket: PocketType,
    pub slot: i16,
    pub vnum: i16,
    pub amount: i16,
}

/// The offer side of a paired exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeData {
    pub target: Option<VisualId>,
    /// `-1` until an offer is listed.
    pub gold: i64,
    pub bank_gold: i64,
    pub items: Vec<ExchangeItem>,
    pub confirmed: bool,
}

impl ExchangeData {
    /// Gold value of an exchange nobody has offered anything in yet.
    pub const UNSET_GOLD: i64 = -1;

    fn paired_with(target: VisualId) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn is_listed(&self) -> bool {
        self.gold != Self::UNSET_GOLD
    }

    /// Gold that actually moves: the unset sentinel counts as zero.
    pub fn offered_gold(&self) -> i64 {
        self.gold.max(0)
    }
}

impl Default for ExchangeData {
    fn default() -> Self {
        Self {
            target: None,
            gold: Self::UNSET_GOLD,
            bank_gold: Self::UNSET_GOLD,
            items: Vec::new(),
            confirmed: false,
        }
    }
}

/// Outstanding proposals plus the current pairing.
#[derive(Debug, Default)]
pub struct ExchangeInfo {
    pub data: ExchangeData,
    requests: HashMap<Uuid, VisualId>,
}

impl ExchangeInfo {
    /// Records a proposal to `target`. A repeated proposal to the same
    /// target keeps its correlation id.
    pub fn propose(&mut self, target: VisualId) -> Uuid {
        if let Some(correlation) = self.correlation_to(target) {
            return correlation;
        }
        let correlation = Uuid::new_v4();
        self.requests.insert(correlation, target);
        correlation
    }

    fn correlation_to(&self, target: VisualId) -> Option<Uuid> {
        self.requests
            .iter()
            .find_map(|(id, t)| (*t == target).then_some(*id))
    }

    pub fn has_proposal_to(&self, target: VisualId) -> bool {
        self.requests.values().any(|t| *t == target)
    }

    /// Consumes the proposals to `target`, returning one correlation id if
    /// there was any.
    pub fn take_proposal_to(&mut self, target: VisualId) -> Option<Uuid> {
        let correlation = self.correlation_to(target)?;
        self.requests.retain(|_, t| *t != target);
        Some(correlation)
    }

    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    pub fn clear_proposals(&mut self) {
        self.requests.clear();
    }
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Interaction {
    in_exchange: bool,
    in_shop: bool,
    /// The character refuses group and exchange requests.
    pub group_request_blocked: bool,
    pub exchange: ExchangeInfo,
}

impl Interaction {
    pub fn in_exchange(&self) -> bool {
        self.in_exchange
    }

    pub fn in_shop(&self) -> bool {
        self.in_shop
    }

    pub fn is_busy(&self) -> bool {
        self.in_exchange || self.in_shop
    }

    /// The current exchange partner.
    pub fn exchange_partner(&self) -> Option<VisualId> {
        self.in_exchange.then_some(self.exchange.data.target).flatten()
    }

    /// Pairs this side with `partner` and starts a fresh offer. Proposals
    /// still open on this side are dropped.
    pub fn enter_exchange(&mut self, partner: VisualId) -> Result<(), InteractionConflict> {
        self.check_idle()?;
        self.in_exchange = true;
        self.exchange.data = ExchangeData::paired_with(partner);
        self.exchange.clear_proposals();
        Ok(())
    }

    /// Ends the exchange and clears the offer. Returns the partner it was
    /// paired with.
    pub fn reset_exchange(&mut self) -> Option<VisualId> {
        let partner = self.exchange_partner();
        self.in_exchange = false;
        self.exchange.data = ExchangeData::default();
        partner
    }

    pub fn open_shop(&mut self) -> Result<(), InteractionConflict> {
        self.check_idle()?;
        self.in_shop = true;
        Ok(())
    }

    /// Returns whether a shop was open.
    pub fn close_shop(&mut self) -> bool {
        std::mem::take(&mut self.in_shop)
    }

    fn check_idle(&self) -> Result<(), InteractionConflict> {
        if self.in_exchange {
            Err(InteractionConflict::InExchange)
        } else if self.in_shop {
            Err(InteractionConflict::InShop)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

pub struct Character {
    pub visual_id: VisualId,
    pub account_id: AccountId,
    pub name: String,
    pub class: u8,
    pub level: u8,
    position: RwLock<Position>,
    interaction: Mutex<Interaction>,
    relations: RwLock<Vec<CharacterRelation>>,
    inventory: Mutex<Inventory>,
}

impl Character {
    pub fn from_record(record: CharacterRecord) -> Self {
        Self {
            visual_id: record.id,
            account_id: record.account_id,
            name: record.name,
            class: record.class,
            level: record.level,
            position: RwLock::new(Position {
                map_id: record.map_id,
                instance: None,
                x: record.x,
                y: record.y,
                direction: 2,
            }),
            interaction: Mutex::new(Interaction::default()),
            relations: RwLock::new(record.relations),
            inventory: Mutex::new(Inventory::from_items(record.items, record.gold)),
        }
    }

    /// Snapshot for the persistence collaborator.
    pub fn to_record(&self) -> CharacterRecord {
        let position = self.position();
        let inventory = self.inventory.lock();
        CharacterRecord {
            id: self.visual_id,
            account_id: self.account_id,
            name: self.name.clone(),
            class: self.class,
            level: self.level,
            map_id: position.map_id,
            x: position.x,
            y: position.y,
            gold: inventory.gold(),
            items: inventory.items().cloned().collect(),
            relations: self.relations.read().clone(),
        }
    }

    // -- Position ----------------------------------------------------------

    pub fn position(&self) -> Position {
        *self.position.read()
    }

    pub fn move_to(&self, x: i16, y: i16) {
        let mut position = self.position.write();
        position.x = x;
        position.y = y;
    }

    /// Places the character in a map instance.
    pub fn enter_map(&self, map_id: i16, instance: MapInstanceId, x: i16, y: i16) {
        let mut position = self.position.write();
        position.map_id = map_id;
        position.instance = Some(instance);
        position.x = x;
        position.y = y;
    }

    /// Takes the character out of its instance, keeping its coordinates.
    pub fn leave_map(&self) -> Option<MapInstanceId> {
        self.position.write().instance.take()
    }

    // -- Locked state ------------------------------------------------------

    pub fn interaction(&self) -> MutexGuard<'_, Interaction> {
        self.interaction.lock()
    }

    pub fn inventory(&self) -> MutexGuard<'_, Inventory> {
        self.inventory.lock()
    }

    // -- Relations ---------------------------------------------------------

    pub fn relations(&self) -> Vec<CharacterRelation> {
        self.relations.read().clone()
    }

    pub fn relations_of(&self, relation_type: RelationType) -> Vec<CharacterRelation> {
        self.relations
            .read()
            .iter()
            .filter(|r| r.relation_type == relation_type)
            .cloned()
            .collect()
    }

    pub fn relation_to(
        &self,
        related: VisualId,
        relation_type: RelationType,
    ) -> Option<CharacterRelation> {
        self.relations
            .read()
            .iter()
            .find(|r| r.related == related && r.relation_type == relation_type)
            .cloned()
    }

    /// Whether `other` is on this character's blacklist.
    pub fn is_blocking(&self, other: VisualId) -> bool {
        self.relation_to(other, RelationType::Blocked).is_some()
    }

    /// Adds a relation unless one of the same type to the same character
    /// exists. Returns whether it was added.
    pub fn add_relation(&self, relation: CharacterRelation) -> bool {
        let mut relations = self.relations.write();
        if relations
            .iter()
            .any(|r| r.related == relation.related && r.relation_type == relation.relation_type)
        {
            return false;
        }
        relations.push(relation);
        true
    }

    pub fn remove_relation(
        &self,
        related: VisualId,
        relation_type: RelationType,
    ) -> Option<CharacterRelation> {
        let mut relations = self.relations.write();
        let index = relations
            .iter()
            .position(|r| r.related == related && r.relation_type == relation_type)?;
        Some(relations.remove(index))
    }
}

impl fmt::Debug for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Character")
            .field("visual_id", &self.visual_id)
            .field("name", &self.name)
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

/// Locks the interaction state of two different characters in a fixed
/// order. Returns the guards in argument order, or `None` if both are the
/// same character.
pub fn lock_pair<'a>(
    a: &'a Character,
    b: &'a Character,
) -> Option<(MutexGuard<'a, Interaction>, MutexGuard<'a, Interaction>)> {
    match a.visual_id.cmp(&b.visual_id) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Less => {
            let first = a.interaction.lock();
            let second = b.interaction.lock();
            Some((first, second))
        }
        std::cmp::Ordering::Greater => {
            let first = b.interaction.lock();
            let second = a.interaction.lock();
            Some((second, first))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(id: i64) -> Character {
        Character::from_record(CharacterRecord::new(VisualId(id), AccountId(1), "hero"))
    }

    #[test]
    fn test_enter_exchange_refused_in_shop() {
        let mut interaction = Interaction::default();
        interaction.open_shop().unwrap();
        assert_eq!(
            interaction.enter_exchange(VisualId(2)),
            Err(InteractionConflict::InShop)
        );
        assert!(!interaction.in_exchange());
    }

    #[test]
    fn test_open_shop_refused_in_exchange() {
        let mut interaction = Interaction::default();
        interaction.enter_exchange(VisualId(2)).unwrap();
        assert_eq!(interaction.open_shop(), Err(InteractionConflict::InExchange));
        assert_eq!(
            interaction.enter_exchange(VisualId(3)),
            Err(InteractionConflict::InExchange)
        );
        assert_eq!(interaction.exchange_partner(), Some(VisualId(2)));
    }

    #[test]
    fn test_reset_exchange_restores_sentinel() {
        let mut interaction = Interaction::default();
        interaction.enter_exchange(VisualId(2)).unwrap();
        interaction.exchange.data.gold = 100;
        interaction.exchange.data.confirmed = true;

        assert_eq!(interaction.reset_exchange(), Some(VisualId(2)));
        assert!(!interaction.in_exchange());
        assert_eq!(interaction.exchange.data, ExchangeData::default());
        assert_eq!(interaction.exchange.data.gold, ExchangeData::UNSET_GOLD);
    }

    #[test]
    fn test_proposals_are_keyed_by_correlation() {
        let mut info = ExchangeInfo::default();
        let first = info.propose(VisualId(2));
        let second = info.propose(VisualId(3));
        assert_ne!(first, second);
        assert!(info.has_proposal_to(VisualId(2)));

        assert_eq!(info.take_proposal_to(VisualId(2)), Some(first));
        assert_eq!(info.take_proposal_to(VisualId(2)), None);
        assert_eq!(info.pending(), 1);
    }

    #[test]
    fn test_propose_repeated_keeps_one_correlation() {
        let mut info = ExchangeInfo::default();
        let first = info.propose(VisualId(2));
        for _ in 0..100 {
            assert_eq!(info.propose(VisualId(2)), first);
        }
        assert_eq!(info.pending(), 1);
    }

    #[test]
    fn test_enter_exchange_drops_open_proposals() {
        let mut interaction = Interaction::default();
        interaction.exchange.propose(VisualId(2));
        interaction.exchange.propose(VisualId(4));

        interaction.enter_exchange(VisualId(3)).unwrap();
        assert_eq!(interaction.exchange.pending(), 0);
        assert!(!interaction.exchange.has_proposal_to(VisualId(2)));
    }

    #[test]
    fn test_distance_to_far_apart_saturates() {
        let position = Position {
            map_id: 1,
            instance: None,
            x: i16::MIN,
            y: 0,
            direction: 2,
        };
        assert_eq!(position.distance_to(i16::MAX, 0), i16::MAX);
        assert_eq!(position.distance_to(i16::MIN + 3, -2), 3);
    }

    #[test]
    fn test_lock_pair_order_independent() {
        let a = character(5);
        let b = character(3);
        {
            let (mut ga, gb) = lock_pair(&a, &b).unwrap();
            ga.group_request_blocked = true;
            assert!(!gb.group_request_blocked);
        }
        assert!(a.interaction().group_request_blocked);
        assert!(lock_pair(&a, &a).is_none());
    }

    #[test]
    fn test_relations_unique_per_type() {
        let c = character(1);
        assert!(c.add_relation(CharacterRelation::new(
            VisualId(2),
            "bob",
            RelationType::Blocked
        )));
        assert!(!c.add_relation(CharacterRelation::new(
            VisualId(2),
            "bob",
            RelationType::Blocked
        )));
        assert!(c.add_relation(CharacterRelation::new(
            VisualId(2),
            "bob",
            RelationType::Friend
        )));
        assert!(c.is_blocking(VisualId(2)));

        c.remove_relation(VisualId(2), RelationType::Blocked).unwrap();
        assert!(!c.is_blocking(VisualId(2)));
        assert_eq!(c.relations_of(RelationType::Friend).len(), 1);
    }

    #[test]
    fn test_record_round_trip_keeps_state() {
        let mut record = CharacterRecord::new(VisualId(7), AccountId(1), "hero");
        record.gold = 250;
        record.x = 12;
        let c = Character::from_record(record.clone());
        c.move_to(13, 4);
        let saved = c.to_record();
        assert_eq!(saved.gold, 250);
        assert_eq!((saved.x, saved.y), (13, 4));
        assert_eq!(saved.name, record.name);
    }
}
