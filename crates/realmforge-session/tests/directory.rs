//! Integration tests for the online directory and the interaction guard.

use std::sync::Arc;

use realmforge_protocol::server::InfoPacket;
use realmforge_protocol::{AccountId, VisualId};
use realmforge_session::{
    Account, BroadcastGroup, Broadcaster, Character, CharacterRecord, RegionType, Session,
    SessionId, lock_pair,
};
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

fn in_game(id: i64, name: &str) -> (Arc<Session>, UnboundedReceiver<String>) {
    let (session, rx) = Session::new(SessionId::next());
    session
        .attach_account(Account {
            id: AccountId(id),
            name: format!("acc{id}"),
            region: RegionType::En,
        })
        .unwrap();
    let record = CharacterRecord::new(VisualId(id), AccountId(id), name);
    session
        .attach_character(Arc::new(Character::from_record(record)))
        .unwrap();
    (Arc::new(session), rx)
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

fn info(message: &str) -> InfoPacket {
    InfoPacket {
        message: message.into(),
    }
}

// =========================================================================
// Lookup
// =========================================================================

#[test]
fn test_find_one_by_predicate() {
    let broadcaster = Broadcaster::new();
    let (alice, _a) = in_game(1, "alice");
    let (bob, _b) = in_game(2, "bob");
    broadcaster.register(Arc::clone(&alice));
    broadcaster.register(Arc::clone(&bob));

    let found = broadcaster.find_one(|c| c.name == "bob").unwrap();
    assert_eq!(found.id(), bob.id());
    assert!(broadcaster.find_one(|c| c.name == "carol").is_none());
    assert_eq!(
        broadcaster.find_character(VisualId(1)).unwrap().id(),
        alice.id()
    );
}

#[test]
fn test_find_all_skips_sessions_without_character() {
    let broadcaster = Broadcaster::new();
    let (alice, _a) = in_game(1, "alice");
    let (lobby, _rx) = Session::new(SessionId::next());
    broadcaster.register(alice);
    broadcaster.register(Arc::new(lobby));

    assert_eq!(broadcaster.len(), 2);
    assert_eq!(broadcaster.find_all(|_| true).len(), 1);
}

#[test]
fn test_unregister_is_idempotent() {
    let broadcaster = Broadcaster::new();
    let (alice, _a) = in_game(1, "alice");
    let id = alice.id();
    broadcaster.register(alice);

    assert!(broadcaster.unregister(id).is_some());
    assert!(broadcaster.unregister(id).is_none());
    assert!(broadcaster.is_empty());
}

// =========================================================================
// Fan-out
// =========================================================================

#[test]
fn test_broadcast_reaches_group_except_sender() {
    let broadcaster = Broadcaster::new();
    let group = BroadcastGroup::new();
    let (alice, mut a_rx) = in_game(1, "alice");
    let (bob, mut b_rx) = in_game(2, "bob");
    let (carol, mut c_rx) = in_game(3, "carol");
    for s in [&alice, &bob, &carol] {
        broadcaster.register(Arc::clone(s));
    }
    group.join(alice.id());
    group.join(bob.id());

    broadcaster.broadcast(&group, &info("hello"), Some(alice.id()));

    assert!(drain(&mut a_rx).is_empty());
    assert_eq!(drain(&mut b_rx), vec!["info hello"]);
    assert!(drain(&mut c_rx).is_empty(), "carol is not in the group");
}

#[test]
fn test_broadcast_skips_unregistered_members() {
    let broadcaster = Broadcaster::new();
    let group = BroadcastGroup::new();
    let (alice, mut a_rx) = in_game(1, "alice");
    group.join(alice.id());
    group.join(SessionId::new(u64::MAX));
    broadcaster.register(Arc::clone(&alice));

    broadcaster.broadcast(&group, &info("hi"), None);
    assert_eq!(drain(&mut a_rx), vec!["info hi"]);
}

#[test]
fn test_broadcast_all() {
    let broadcaster = Broadcaster::new();
    let (alice, mut a_rx) = in_game(1, "alice");
    let (bob, mut b_rx) = in_game(2, "bob");
    broadcaster.register(alice);
    broadcaster.register(bob);

    broadcaster.broadcast_all(&info("restart"));
    assert_eq!(drain(&mut a_rx), vec!["info restart"]);
    assert_eq!(drain(&mut b_rx), vec!["info restart"]);
}

#[test]
fn test_group_membership() {
    let group = BroadcastGroup::new();
    let id = SessionId::next();
    assert!(group.join(id));
    assert!(!group.join(id));
    assert!(group.contains(id));
    assert!(group.leave(id));
    assert!(!group.leave(id));
    assert!(group.is_empty());
}

// =========================================================================
// Interaction guard
// =========================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Exchange,
    ResetExchange,
    OpenShop,
    CloseShop,
}

const OPS: [Op; 4] = [Op::Exchange, Op::ResetExchange, Op::OpenShop, Op::CloseShop];

#[test]
fn test_exchange_and_shop_never_both_active() {
    // Every sequence of five operations.
    for mut code in 0..OPS.len().pow(5) {
        let character =
            Character::from_record(CharacterRecord::new(VisualId(1), AccountId(1), "hero"));
        let mut applied = Vec::new();
        for _ in 0..5 {
            let op = OPS[code % OPS.len()];
            code /= OPS.len();
            applied.push(op);

            let mut interaction = character.interaction();
            match op {
                Op::Exchange => {
                    let _ = interaction.enter_exchange(VisualId(2));
                }
                Op::ResetExchange => {
                    interaction.reset_exchange();
                }
                Op::OpenShop => {
                    let _ = interaction.open_shop();
                }
                Op::CloseShop => {
                    interaction.close_shop();
                }
            }
            assert!(
                !(interaction.in_exchange() && interaction.in_shop()),
                "both modes active after {applied:?}"
            );
        }
    }
}

#[test]
fn test_lock_pair_from_many_threads() {
    let a = Arc::new(Character::from_record(CharacterRecord::new(
        VisualId(1),
        AccountId(1),
        "a",
    )));
    let b = Arc::new(Character::from_record(CharacterRecord::new(
        VisualId(2),
        AccountId(2),
        "b",
    )));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let (a, b) = (Arc::clone(&a), Arc::clone(&b));
            std::thread::spawn(move || {
                for _ in 0..500 {
                    // Alternate argument order to provoke lock-order inversions.
                    let (x, y) = if i % 2 == 0 { (&a, &b) } else { (&b, &a) };
                    let (mut gx, mut gy) = lock_pair(x, y).unwrap();
                    if gx.enter_exchange(y.visual_id).is_ok() {
                        gy.enter_exchange(x.visual_id).unwrap();
                    }
                    assert_eq!(gx.in_exchange(), gy.in_exchange());
                    gx.reset_exchange();
                    gy.reset_exchange();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(!a.interaction().in_exchange());
    assert!(!b.interaction().in_exchange());
}
