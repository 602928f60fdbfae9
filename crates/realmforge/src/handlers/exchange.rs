//! Player-to-player trading.
//!
//! ```text
//!            req_exc 1            req_exc 2              exc_list (both)
//!   Idle ───────────────→ Proposed ─────────→ Paired ─────────────────→ Listed
//!     ↑                      │ req_exc 5         │ req_exc 4              │ req_exc 3 (both)
//!     │                      ↓                   ↓                        ↓
//!     └──────────────── (proposal kept)      Cancelled               Settled / Failed
//! ```
//!
//! Every step that reads or changes both sides locks the two characters'
//! interaction state with [`lock_pair`], so two traders can never end up
//! paired with different partners. Settlement runs on copies of both
//! inventories and only replaces the real ones when every debit and credit
//! succeeded.

use std::sync::Arc;

use realmforge_protocol::client::{ExchangeOfferPacket, RequestExchangePacket};
use realmforge_protocol::server::{
    DlgPacket, ExchangeClosePacket, ExchangeListItem, ExchangeListPacket, GoldPacket, ModalPacket,
    SayPacket,
};
use realmforge_protocol::{
    ExchangeResultType, PocketType, RequestExchangeType, SayColorType, VisualId, VisualType,
};
use realmforge_session::{
    Character, ExchangeData, ExchangeItem, Inventory, InventoryError, ItemInstance, MAX_GOLD,
    Session, lock_pair,
};

use super::ivn;
use crate::GameContext;
use crate::language::LanguageKey;

fn close_packet(close_type: ExchangeResultType) -> ExchangeClosePacket {
    ExchangeClosePacket { close_type }
}

/// `req_exc <type> [visual_id]`
pub(super) fn request(ctx: &GameContext, session: &Arc<Session>, packet: RequestExchangePacket) {
    let Some(character) = session.character() else {
        return;
    };
    match (packet.request_type, packet.visual_id) {
        (RequestExchangeType::Requested, Some(target)) => propose(ctx, session, character, target),
        (RequestExchangeType::List, Some(requester)) => accept(ctx, session, character, requester),
        (RequestExchangeType::Declined, Some(requester)) => {
            decline(ctx, session, character, requester)
        }
        (RequestExchangeType::Confirmed, _) => confirm(ctx, session, character),
        (RequestExchangeType::Cancelled, _) => {
            if !cancel(ctx, session, character) {
                tracing::debug!(visual_id = %character.visual_id, "cancel without an exchange");
            }
        }
        (request_type, None) => {
            tracing::debug!(visual_id = %character.visual_id, ?request_type, "exchange request without a target");
        }
    }
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

fn propose(ctx: &GameContext, session: &Session, character: &Character, target_id: VisualId) {
    if target_id == character.visual_id {
        tracing::debug!(visual_id = %character.visual_id, "exchange with self ignored");
        return;
    }
    let Some(target_session) = ctx.session_of(target_id) else {
        tracing::debug!(visual_id = %character.visual_id, %target_id, "exchange target is not online");
        return;
    };
    let Some(target) = target_session.character() else {
        return;
    };

    let outcome = {
        let Some((mut mine, theirs)) = lock_pair(character, target) else {
            return;
        };
        if mine.in_shop() || theirs.in_shop() {
            Err(LanguageKey::ShopOpen)
        } else if mine.is_busy() {
            Err(LanguageKey::Busy)
        } else if theirs.is_busy() {
            Err(LanguageKey::TargetBusy)
        } else if theirs.group_request_blocked {
            Err(LanguageKey::ExchangeRequestBlocked)
        } else if character.is_blocking(target_id) {
            Err(LanguageKey::TargetBlocked)
        } else if target.is_blocking(character.visual_id) {
            Err(LanguageKey::BlockedByTarget)
        } else {
            Ok(mine.exchange.propose(target_id))
        }
    };

    let name = target.name.as_str();
    match outcome {
        Ok(correlation) => {
            session.send(&ModalPacket {
                modal_type: 0,
                message: ctx.text(session, LanguageKey::ExchangeRequested, &[name]),
            });
            target_session.send(&DlgPacket {
                yes: RequestExchangePacket {
                    request_type: RequestExchangeType::List,
                    visual_id: Some(character.visual_id),
                },
                no: RequestExchangePacket {
                    request_type: RequestExchangeType::Declined,
                    visual_id: Some(character.visual_id),
                },
                question: ctx.text(
                    &target_session,
                    LanguageKey::IncomingExchange,
                    &[character.name.as_str()],
                ),
            });
            tracing::debug!(%correlation, from = %character.visual_id, to = %target_id, "exchange proposed");
        }
        Err(LanguageKey::ExchangeRequestBlocked) => session.send(&SayPacket {
            visual_type: VisualType::Player,
            visual_id: character.visual_id,
            color: SayColorType::Purple,
            message: ctx.text(session, LanguageKey::ExchangeRequestBlocked, &[name]),
        }),
        Err(key @ (LanguageKey::TargetBlocked | LanguageKey::BlockedByTarget)) => {
            ctx.inform(session, key, &[name])
        }
        Err(key) => ctx.notify(session, key, &[name]),
    }
}

/// The target answered the dialog with "yes": both sides become paired.
fn accept(ctx: &GameContext, session: &Session, character: &Character, requester_id: VisualId) {
    let Some(requester_session) = ctx.session_of(requester_id) else {
        tracing::debug!(visual_id = %character.visual_id, %requester_id, "exchange requester is gone");
        return;
    };
    let Some(requester) = requester_session.character() else {
        return;
    };

    let outcome = {
        let Some((mut mine, mut theirs)) = lock_pair(character, requester) else {
            return;
        };
        match theirs.exchange.take_proposal_to(character.visual_id) {
            None => Err(None),
            Some(correlation) => {
                if mine.enter_exchange(requester_id).is_err() {
                    Err(Some(LanguageKey::Busy))
                } else if theirs.enter_exchange(character.visual_id).is_err() {
                    mine.reset_exchange();
                    Err(Some(LanguageKey::TargetBusy))
                } else {
                    Ok(correlation)
                }
            }
        }
    };

    match outcome {
        Ok(correlation) => {
            for (to, partner) in [
                (session, requester_id),
                (requester_session.as_ref(), character.visual_id),
            ] {
                to.send(&ExchangeListPacket {
                    unknown: 1,
                    visual_id: partner,
                    gold: ExchangeData::UNSET_GOLD,
                    items: Vec::new(),
                });
            }
            tracing::info!(%correlation, a = %requester_id, b = %character.visual_id, "exchange opened");
        }
        Err(Some(key)) => ctx.notify(session, key, &[requester.name.as_str()]),
        Err(None) => {
            tracing::debug!(visual_id = %character.visual_id, %requester_id, "accept without a pending proposal");
        }
    }
}

/// The target answered "no". The proposal stays until it is accepted or
/// the requester pairs with someone else.
fn decline(ctx: &GameContext, session: &Session, character: &Character, requester_id: VisualId) {
    let requester_session = ctx.session_of(requester_id);
    let requester = requester_session.as_ref().and_then(|s| s.character().cloned());
    let requester_name = requester
        .as_ref()
        .map_or_else(|| requester_id.to_string(), |c| c.name.clone());

    say(ctx, session, character, LanguageKey::ExchangeDeclined, &requester_name);
    if let (Some(requester_session), Some(requester)) = (requester_session, requester) {
        say(
            ctx,
            &requester_session,
            &requester,
            LanguageKey::ExchangeDeclined,
            &character.name,
        );
    }
}

fn say(ctx: &GameContext, session: &Session, speaker: &Character, key: LanguageKey, arg: &str) {
    session.send(&SayPacket {
        visual_type: VisualType::Player,
        visual_id: speaker.visual_id,
        color: SayColorType::Yellow,
        message: ctx.text(session, key, &[arg]),
    });
}

// ---------------------------------------------------------------------------
// Offer and settlement
// ---------------------------------------------------------------------------

/// `exc_list <gold> <bank_gold> [pocket slot amount]...`
pub(super) fn offer(ctx: &GameContext, session: &Arc<Session>, packet: ExchangeOfferPacket) {
    let Some(character) = session.character() else {
        return;
    };
    let Some(partner_id) = character.interaction().exchange_partner() else {
        tracing::debug!(visual_id = %character.visual_id, "offer without an exchange");
        return;
    };
    let items = match validate_offer(&character.inventory(), &packet) {
        Ok(items) => items,
        Err(e) => {
            tracing::debug!(visual_id = %character.visual_id, error = %e, "invalid exchange offer");
            ctx.notify(session, LanguageKey::ExchangeInvalidOffer, &[]);
            return;
        }
    };
    let Some(partner_session) = ctx.session_of(partner_id) else {
        pairing_lost(session, character, partner_id);
        return;
    };
    let Some(partner) = partner_session.character() else {
        pairing_lost(session, character, partner_id);
        return;
    };

    {
        let Some((mut mine, mut theirs)) = lock_pair(character, partner) else {
            return;
        };
        if mine.exchange_partner() != Some(partner_id)
            || theirs.exchange_partner() != Some(character.visual_id)
        {
            tracing::debug!(visual_id = %character.visual_id, %partner_id, "exchange changed before the offer");
            return;
        }
        mine.exchange.data.gold = packet.gold;
        mine.exchange.data.bank_gold = packet.bank_gold;
        mine.exchange.data.items = items.clone();
        // A changed offer has to be confirmed again by both.
        mine.exchange.data.confirmed = false;
        theirs.exchange.data.confirmed = false;
    }

    partner_session.send(&ExchangeListPacket {
        unknown: 1,
        visual_id: character.visual_id,
        gold: packet.gold,
        items: items
            .iter()
            .map(|item| ExchangeListItem {
                slot: item.slot,
                pocket: item.pocket,
                vnum: item.vnum,
                amount: item.amount,
            })
            .collect(),
    });
}

/// Checks an offer against what the character owns. Repeated slots count
/// cumulatively.
fn validate_offer(
    inventory: &Inventory,
    packet: &ExchangeOfferPacket,
) -> Result<Vec<ExchangeItem>, InventoryError> {
    if packet.bank_gold != 0 {
        return Err(InventoryError::InvalidAmount);
    }
    if packet.gold < 0 {
        return Err(InventoryError::InvalidAmount);
    }
    if packet.gold > inventory.gold() {
        return Err(InventoryError::InsufficientGold);
    }
    let mut scratch = inventory.clone();
    let mut items = Vec::with_capacity(packet.items.len());
    for offered in &packet.items {
        let vnum = scratch
            .get(offered.pocket, offered.slot)
            .ok_or(InventoryError::EmptySlot)?
            .vnum;
        scratch.split(offered.pocket, offered.slot, offered.amount)?;
        items.push(ExchangeItem {
            pocket: offered.pocket,
            slot: offered.slot,
            vnum,
            amount: offered.amount,
        });
    }
    Ok(items)
}

fn confirm(ctx: &GameContext, session: &Session, character: &Character) {
    let Some(partner_id) = character.interaction().exchange_partner() else {
        tracing::debug!(visual_id = %character.visual_id, "confirm without an exchange");
        return;
    };
    let Some(partner_session) = ctx.session_of(partner_id) else {
        pairing_lost(session, character, partner_id);
        return;
    };
    let Some(partner) = partner_session.character() else {
        pairing_lost(session, character, partner_id);
        return;
    };

    let settled = {
        let Some((mut mine, mut theirs)) = lock_pair(character, partner) else {
            return;
        };
        if mine.exchange_partner() != Some(partner_id)
            || theirs.exchange_partner() != Some(character.visual_id)
        {
            tracing::debug!(visual_id = %character.visual_id, %partner_id, "exchange changed before confirmation");
            return;
        }
        mine.exchange.data.confirmed = true;
        if theirs.exchange.data.confirmed {
            let result = settle_pair(character, partner, &mine.exchange.data, &theirs.exchange.data);
            mine.reset_exchange();
            theirs.reset_exchange();
            Some(result)
        } else {
            None
        }
    };

    match settled {
        None => {
            tracing::debug!(visual_id = %character.visual_id, %partner_id, "waiting for the partner to confirm");
        }
        Some(Ok(())) => {
            for (to, trader) in [(session, character), (partner_session.as_ref(), partner.as_ref())] {
                to.send(&close_packet(ExchangeResultType::Completed));
                refresh_inventory(to, trader);
            }
            tracing::info!(a = %character.visual_id, b = %partner_id, "exchange completed");
        }
        Some(Err(e)) => {
            for to in [session, partner_session.as_ref()] {
                to.send(&close_packet(ExchangeResultType::Cancelled));
                ctx.notify(to, LanguageKey::ExchangeFailed, &[]);
            }
            tracing::warn!(a = %character.visual_id, b = %partner_id, error = %e, "exchange settlement failed");
        }
    }
}

/// The partner went away without its logout reaching us.
fn pairing_lost(session: &Session, character: &Character, partner_id: VisualId) {
    tracing::error!(visual_id = %character.visual_id, %partner_id, "exchange partner is gone, dropping the pairing");
    character.interaction().reset_exchange();
    session.send(&close_packet(ExchangeResultType::Cancelled));
}

fn refresh_inventory(session: &Session, character: &Character) {
    let inventory = character.inventory();
    for pocket in [PocketType::Equipment, PocketType::Main, PocketType::Etc] {
        session.send(&ivn(&inventory, pocket));
    }
    session.send(&GoldPacket {
        gold: inventory.gold(),
    });
}

/// Locks both inventories in id order and settles the two offers.
fn settle_pair(
    a: &Character,
    b: &Character,
    a_offer: &ExchangeData,
    b_offer: &ExchangeData,
) -> Result<(), InventoryError> {
    let (mut inventory_a, mut inventory_b) = if a.visual_id < b.visual_id {
        let first = a.inventory();
        let second = b.inventory();
        (first, second)
    } else {
        let first = b.inventory();
        let second = a.inventory();
        (second, first)
    };
    settle(&mut inventory_a, &mut inventory_b, a_offer, b_offer)
}

/// Moves both offers at once. Either every item and coin changes owner or
/// nothing changes.
pub(crate) fn settle(
    inventory_a: &mut Inventory,
    inventory_b: &mut Inventory,
    a_offer: &ExchangeData,
    b_offer: &ExchangeData,
) -> Result<(), InventoryError> {
    let mut next_a = inventory_a.clone();
    let mut next_b = inventory_b.clone();
    let from_a = debit(&mut next_a, a_offer)?;
    let from_b = debit(&mut next_b, b_offer)?;
    credit(&mut next_a, from_b, b_offer.offered_gold())?;
    credit(&mut next_b, from_a, a_offer.offered_gold())?;
    *inventory_a = next_a;
    *inventory_b = next_b;
    Ok(())
}

fn debit(inventory: &mut Inventory, offer: &ExchangeData) -> Result<Vec<ItemInstance>, InventoryError> {
    if offer.bank_gold > 0 {
        return Err(InventoryError::InvalidAmount);
    }
    let mut taken = Vec::with_capacity(offer.items.len());
    for item in &offer.items {
        match inventory.get(item.pocket, item.slot) {
            Some(stack) if stack.vnum == item.vnum => {}
            _ => return Err(InventoryError::EmptySlot),
        }
        taken.push(inventory.split(item.pocket, item.slot, item.amount)?);
    }
    inventory.remove_gold(offer.offered_gold())?;
    Ok(taken)
}

fn credit(inventory: &mut Inventory, items: Vec<ItemInstance>, gold: i64) -> Result<(), InventoryError> {
    for item in items {
        inventory.add(item)?;
    }
    if inventory.gold().saturating_add(gold) > MAX_GOLD {
        return Err(InventoryError::InvalidAmount);
    }
    inventory.add_gold(gold);
    Ok(())
}

/// Ends the character's exchange on both sides and tells both clients.
///
/// Returns whether there was an exchange to end. The partner side is only
/// reset while it is still paired with this character.
pub fn cancel(ctx: &GameContext, session: &Session, character: &Character) -> bool {
    let Some(partner_id) = character.interaction().exchange_partner() else {
        return false;
    };
    let partner_session = ctx.session_of(partner_id);
    match partner_session.as_ref().and_then(|s| s.character()) {
        Some(partner) => {
            if let Some((mut mine, mut theirs)) = lock_pair(character, partner) {
                mine.reset_exchange();
                if theirs.exchange_partner() == Some(character.visual_id) {
                    theirs.reset_exchange();
                }
            }
        }
        None => {
            character.interaction().reset_exchange();
        }
    }

    session.send(&close_packet(ExchangeResultType::Cancelled));
    if let Some(partner_session) = &partner_session {
        partner_session.send(&close_packet(ExchangeResultType::Cancelled));
    }
    tracing::info!(visual_id = %character.visual_id, %partner_id, "exchange cancelled");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmforge_protocol::client::ExchangeOfferItem;

    fn inventory(items: &[(i16, i16)], gold: i64) -> Inventory {
        Inventory::from_items(
            items
                .iter()
                .map(|(vnum, amount)| ItemInstance::new(*vnum, *amount, PocketType::Main)),
            gold,
        )
    }

    fn offer_of(gold: i64, items: &[(i16, i16, i16)]) -> ExchangeData {
        ExchangeData {
            target: Some(VisualId(1)),
            gold,
            bank_gold: 0,
            items: items
                .iter()
                .map(|(slot, vnum, amount)| ExchangeItem {
                    pocket: PocketType::Main,
                    slot: *slot,
                    vnum: *vnum,
                    amount: *amount,
                })
                .collect(),
            confirmed: true,
        }
    }

    fn count(inventory: &Inventory, vnum: i16) -> i16 {
        inventory
            .items()
            .filter(|i| i.vnum == vnum)
            .map(|i| i.amount)
            .sum()
    }

    // -- settle --------------------------------------------------------------

    #[test]
    fn test_settle_swaps_items_and_gold() {
        let mut a = inventory(&[(1012, 10)], 500);
        let mut b = inventory(&[(2001, 1)], 0);

        settle(&mut a, &mut b, &offer_of(200, &[(0, 1012, 4)]), &offer_of(-1, &[(0, 2001, 1)])).unwrap();

        assert_eq!(count(&a, 1012), 6);
        assert_eq!(count(&a, 2001), 1);
        assert_eq!(a.gold(), 300);
        assert_eq!(count(&b, 1012), 4);
        assert_eq!(count(&b, 2001), 0);
        assert_eq!(b.gold(), 200);
    }

    #[test]
    fn test_settle_is_all_or_nothing() {
        let mut a = inventory(&[(1012, 10)], 100);
        let mut b = inventory(&[], 0);
        let before_a = a.clone();

        // Second item no longer exists on A's side.
        let result = settle(
            &mut a,
            &mut b,
            &offer_of(50, &[(0, 1012, 2), (1, 1013, 1)]),
            &offer_of(-1, &[]),
        );

        assert_eq!(result, Err(InventoryError::EmptySlot));
        assert_eq!(count(&a, 1012), count(&before_a, 1012));
        assert_eq!(a.gold(), 100);
        assert_eq!(b.items().count(), 0);
        assert_eq!(b.gold(), 0);
    }

    #[test]
    fn test_settle_rejects_gold_over_cap() {
        let mut a = inventory(&[], 10);
        let mut b = inventory(&[], MAX_GOLD);

        let result = settle(&mut a, &mut b, &offer_of(10, &[]), &offer_of(-1, &[]));

        assert_eq!(result, Err(InventoryError::InvalidAmount));
        assert_eq!(a.gold(), 10);
        assert_eq!(b.gold(), MAX_GOLD);
    }

    #[test]
    fn test_settle_rejects_changed_vnum() {
        let mut a = inventory(&[(1012, 10)], 0);
        let mut b = inventory(&[], 0);

        let result = settle(&mut a, &mut b, &offer_of(0, &[(0, 9999, 1)]), &offer_of(-1, &[]));

        assert_eq!(result, Err(InventoryError::EmptySlot));
    }

    // -- validate_offer ------------------------------------------------------

    fn offer_packet(gold: i64, bank_gold: i64, items: &[(i16, i16)]) -> ExchangeOfferPacket {
        ExchangeOfferPacket {
            gold,
            bank_gold,
            items: items
                .iter()
                .map(|(slot, amount)| ExchangeOfferItem {
                    pocket: PocketType::Main,
                    slot: *slot,
                    amount: *amount,
                })
                .collect(),
        }
    }

    #[test]
    fn test_validate_offer_resolves_vnums() {
        let inv = inventory(&[(1012, 10)], 50);
        let items = validate_offer(&inv, &offer_packet(50, 0, &[(0, 3)])).unwrap();
        assert_eq!(
            items,
            vec![ExchangeItem { pocket: PocketType::Main, slot: 0, vnum: 1012, amount: 3 }]
        );
    }

    #[test]
    fn test_validate_offer_counts_repeated_slots() {
        let inv = inventory(&[(1012, 10)], 0);
        assert_eq!(
            validate_offer(&inv, &offer_packet(0, 0, &[(0, 6), (0, 6)])),
            Err(InventoryError::InvalidAmount)
        );
    }

    #[test]
    fn test_validate_offer_rejects_missing_gold_and_bank() {
        let inv = inventory(&[], 10);
        assert_eq!(
            validate_offer(&inv, &offer_packet(11, 0, &[])),
            Err(InventoryError::InsufficientGold)
        );
        assert_eq!(
            validate_offer(&inv, &offer_packet(0, 5, &[])),
            Err(InventoryError::InvalidAmount)
        );
        assert_eq!(
            validate_offer(&inv, &offer_packet(0, 0, &[(7, 1)])),
            Err(InventoryError::EmptySlot)
        );
    }
}
