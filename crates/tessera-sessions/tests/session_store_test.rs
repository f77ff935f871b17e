//! Integration tests for the in-memory session store.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Barrier};
use std::thread;
use tessera_core::{RealmId, SessionId, UserId};
use tessera_sessions::{
    ClientInitialAccessEntity, DecrementOutcome, InMemorySessionStore, NewUserSession,
    UserSessionStore,
};

fn realm() -> RealmId {
    RealmId::new("test")
}

fn brokered(session: usize, user: usize) -> NewUserSession {
    NewUserSession::new(realm(), UserId::new(format!("u{user}")), format!("user{user}"))
        .brokered(format!("bs-{session}"), format!("bu-{user}"))
}

#[test]
fn test_login_failure_scenario() {
    let store = InMemorySessionStore::new();
    let realm = realm();

    store.create_login_failure(&realm, "alice");
    store.record_login_failure(&realm, "alice", 100, Some("10.0.0.1"));
    let failure = store
        .record_login_failure(&realm, "alice", 110, Some("10.0.0.2"))
        .unwrap();
    assert_eq!(failure.num_failures, 2);
    assert_eq!(failure.last_failure, 110);
    assert_eq!(failure.last_ip_failure.as_deref(), Some("10.0.0.2"));

    assert!(store.remove_login_failure(&realm, "alice"));
    assert!(store.get_login_failure(&realm, "alice").is_none());
    assert!(store.record_login_failure(&realm, "alice", 120, None).is_none());
    assert!(!store.remove_login_failure(&realm, "alice"));
}

#[test]
fn test_login_failures_are_keyed_by_realm_and_username() {
    let store = InMemorySessionStore::new();
    store.create_login_failure(&realm(), "alice");
    store.create_login_failure(&RealmId::new("other"), "alice");
    store.record_login_failure(&realm(), "alice", 1, None);

    assert_eq!(
        store
            .get_login_failure(&RealmId::new("other"), "alice")
            .unwrap()
            .num_failures,
        0
    );
    assert_eq!(store.remove_all_login_failures(&realm()), 1);
    assert!(store.get_login_failure(&RealmId::new("other"), "alice").is_some());
}

#[test]
fn test_concurrent_decrements_never_go_negative() {
    const THREADS: usize = 8;
    const USES: u32 = 20;
    let store = Arc::new(InMemorySessionStore::new());
    let token = store.create_or_update_client_initial_access(ClientInitialAccessEntity::new(
        realm(),
        0,
        USES,
        0,
    ));
    let barrier = Barrier::new(THREADS);

    let outcomes: Vec<DecrementOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    (0..5)
                        .map(|_| store.decrease_remaining_count(&realm(), &token.id))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread panicked"))
            .collect()
    });

    let granted: BTreeSet<u32> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            DecrementOutcome::Decremented { remaining } => Some(*remaining),
            _ => None,
        })
        .collect();
    let exhausted = outcomes
        .iter()
        .filter(|outcome| **outcome == DecrementOutcome::Exhausted)
        .count();

    assert_eq!(granted.len(), USES as usize);
    assert_eq!(granted, (0..USES).collect::<BTreeSet<_>>());
    assert_eq!(exhausted, THREADS * 5 - USES as usize);
    assert_eq!(
        store
            .get_client_initial_access(&realm(), &token.id)
            .unwrap()
            .remaining_count,
        0
    );
}

#[test]
fn test_concurrent_create_and_remove_keep_indices_consistent() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;
    let store = Arc::new(InMemorySessionStore::new());
    let barrier = Barrier::new(THREADS);

    let kept: Vec<(usize, usize, SessionId)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let store = &store;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let mut kept = Vec::new();
                    for i in 0..PER_THREAD {
                        let n = worker * PER_THREAD + i;
                        let user = n % 5;
                        let session = store.create_user_session(brokered(n, user));
                        if i % 2 == 0 {
                            assert!(store.remove_user_session(&realm(), &session.id));
                        } else {
                            kept.push((n, user, session.id));
                        }
                    }
                    kept
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread panicked"))
            .collect()
    });

    assert_eq!(store.online_session_count(), kept.len());
    for (n, _, id) in &kept {
        let found = store
            .get_user_session_by_broker_session_id(&realm(), &format!("bs-{n}"))
            .unwrap();
        assert_eq!(found.id, *id);
    }
    for user in 0..5 {
        let expected: BTreeSet<&SessionId> = kept
            .iter()
            .filter(|(_, u, _)| *u == user)
            .map(|(_, _, id)| id)
            .collect();
        let indexed = store.get_user_sessions_by_broker_user_id(&realm(), &format!("bu-{user}"));
        let indexed: BTreeSet<&SessionId> = indexed.iter().map(|session| &session.id).collect();
        assert_eq!(indexed, expected);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create { broker_user: usize },
    Remove(usize),
    RemoveUser(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..4).prop_map(|broker_user| Op::Create { broker_user }),
        2 => (0usize..32).prop_map(Op::Remove),
        1 => (0usize..4).prop_map(Op::RemoveUser),
    ]
}

proptest! {
    /// Every live session is discoverable through both broker indices and no
    /// removed session is.
    #[test]
    fn prop_broker_indices_match_primary_map(ops in prop::collection::vec(op(), 1..80)) {
        let store = InMemorySessionStore::new();
        let mut live: HashMap<SessionId, (usize, usize)> = HashMap::new();
        let mut removed: Vec<(usize, SessionId)> = Vec::new();
        let mut created: Vec<(usize, SessionId)> = Vec::new();

        for op in ops {
            match op {
                Op::Create { broker_user } => {
                    let n = created.len();
                    let session = store.create_user_session(brokered(n, broker_user));
                    created.push((n, session.id.clone()));
                    live.insert(session.id, (n, broker_user));
                }
                Op::Remove(index) => {
                    if let Some((n, id)) = created.get(index).cloned() {
                        let was_live = live.remove(&id).is_some();
                        prop_assert_eq!(store.remove_user_session(&realm(), &id), was_live);
                        removed.push((n, id));
                    }
                }
                Op::RemoveUser(user) => {
                    let user_id = UserId::new(format!("u{user}"));
                    let doomed: Vec<SessionId> = live
                        .iter()
                        .filter(|(_, (_, u))| *u == user)
                        .map(|(id, _)| id.clone())
                        .collect();
                    prop_assert_eq!(store.remove_user_sessions(&realm(), &user_id), doomed.len());
                    for id in doomed {
                        let (n, _) = live.remove(&id).unwrap();
                        removed.push((n, id));
                    }
                }
            }

            for (id, (n, user)) in &live {
                let by_session = store
                    .get_user_session_by_broker_session_id(&realm(), &format!("bs-{n}"));
                prop_assert_eq!(by_session.map(|session| session.id), Some(id.clone()));
                let by_user = store.get_user_sessions_by_broker_user_id(&realm(), &format!("bu-{user}"));
                prop_assert!(by_user.iter().any(|session| session.id == *id));
            }
            for (n, id) in &removed {
                let broker_session = format!("bs-{}", n);
                let gone = store.get_user_session_by_broker_session_id(&realm(), &broker_session);
                prop_assert!(gone.is_none());
                prop_assert!(store.get_user_session(&realm(), id).is_none());
            }
            for user in 0..4 {
                let indexed = store.get_user_sessions_by_broker_user_id(&realm(), &format!("bu-{user}"));
                prop_assert!(indexed.iter().all(|session| live.contains_key(&session.id)));
            }
        }
    }
}
