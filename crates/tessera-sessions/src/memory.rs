//! Single-node session store backed by in-process maps.

use crate::entities::{
    ClientInitialAccessEntity, ClientSessionEntity, LoginFailureEntity, LoginFailureKey,
    NewUserSession, SessionState, UserSessionEntity,
};
use crate::store::{DecrementOutcome, ExpiredSessions, Paging, UserSessionStore};
use crate::table::SessionTable;
use dashmap::DashMap;
use parking_lot::RwLock;
use shaku::Component;
use std::collections::BTreeMap;
use tessera_core::{current_time, ClientId, RealmId, SessionId, SessionLimits, UserId};
use tracing::{debug, info};

/// Grace period added to idle timeouts by the expiration sweep, so a session
/// refreshed just before a sweep is not dropped by clock skew between nodes.
pub const IDLE_TIMEOUT_WINDOW_SECONDS: i64 = 180;

/// In-memory [`UserSessionStore`].
///
/// Online and offline sessions each live in one [`SessionTable`] behind a
/// single lock, so a session and its broker index entries are never
/// observed out of step. Login failures and initial-access tokens are
/// independent per key and live in sharded maps.
#[derive(Default, Component)]
#[shaku(interface = UserSessionStore)]
pub struct InMemorySessionStore {
    #[shaku(default)]
    online: RwLock<SessionTable>,
    #[shaku(default)]
    offline: RwLock<SessionTable>,
    #[shaku(default)]
    login_failures: DashMap<LoginFailureKey, LoginFailureEntity>,
    #[shaku(default)]
    initial_access: DashMap<String, ClientInitialAccessEntity>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of online user sessions across all realms.
    #[must_use]
    pub fn online_session_count(&self) -> usize {
        self.online.read().len()
    }

    /// Number of offline user sessions across all realms.
    #[must_use]
    pub fn offline_session_count(&self) -> usize {
        self.offline.read().len()
    }

    fn table(&self, offline: bool) -> &RwLock<SessionTable> {
        if offline {
            &self.offline
        } else {
            &self.online
        }
    }

    fn by_client(
        &self,
        offline: bool,
        realm_id: &RealmId,
        client_id: &ClientId,
        paging: Paging,
    ) -> Vec<UserSessionEntity> {
        let table = self.table(offline).read();
        let mut sessions: Vec<UserSessionEntity> = table
            .in_realm(realm_id)
            .filter(|session| session.has_client(client_id))
            .cloned()
            .collect();
        drop(table);

        sessions.sort_by(|a, b| {
            a.last_session_refresh
                .cmp(&b.last_session_refresh)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
            .into_iter()
            .skip(paging.first)
            .take(paging.max.unwrap_or(usize::MAX))
            .collect()
    }

    fn count_by_client(&self, offline: bool, realm_id: &RealmId, client_id: &ClientId) -> u64 {
        self.table(offline)
            .read()
            .in_realm(realm_id)
            .filter(|session| session.has_client(client_id))
            .count() as u64
    }

    fn by_user(&self, offline: bool, realm_id: &RealmId, user_id: &UserId) -> Vec<UserSessionEntity> {
        self.table(offline)
            .read()
            .in_realm(realm_id)
            .filter(|session| session.user_id == *user_id)
            .cloned()
            .collect()
    }
}

impl UserSessionStore for InMemorySessionStore {
    fn create_user_session(&self, request: NewUserSession) -> UserSessionEntity {
        let mut table = self.online.write();
        loop {
            let session = UserSessionEntity::new(SessionId::generate(), request.clone(), current_time());
            if table.insert(session.clone()) {
                debug!(session_id = %session.id, realm_id = %session.realm_id, user_id = %session.user_id, "User session created");
                return session;
            }
        }
    }

    fn create_user_session_with_id(
        &self,
        id: SessionId,
        request: NewUserSession,
    ) -> Option<UserSessionEntity> {
        let session = UserSessionEntity::new(id, request, current_time());
        if !self.online.write().insert(session.clone()) {
            debug!(session_id = %session.id, "User session id already taken");
            return None;
        }
        debug!(session_id = %session.id, realm_id = %session.realm_id, user_id = %session.user_id, "User session created");
        Some(session)
    }

    fn get_user_session(&self, realm_id: &RealmId, id: &SessionId) -> Option<UserSessionEntity> {
        self.online.read().get(realm_id, id).cloned()
    }

    fn get_user_sessions(&self, realm_id: &RealmId, user_id: &UserId) -> Vec<UserSessionEntity> {
        self.by_user(false, realm_id, user_id)
    }

    fn get_user_sessions_by_client(
        &self,
        realm_id: &RealmId,
        client_id: &ClientId,
        paging: Paging,
    ) -> Vec<UserSessionEntity> {
        self.by_client(false, realm_id, client_id, paging)
    }

    fn get_user_session_by_broker_session_id(
        &self,
        realm_id: &RealmId,
        broker_session_id: &str,
    ) -> Option<UserSessionEntity> {
        self.online
            .read()
            .by_broker_session(realm_id, broker_session_id)
            .max_by(|a, b| a.started.cmp(&b.started).then_with(|| a.id.cmp(&b.id)))
            .cloned()
    }

    fn get_user_sessions_by_broker_user_id(
        &self,
        realm_id: &RealmId,
        broker_user_id: &str,
    ) -> Vec<UserSessionEntity> {
        self.online
            .read()
            .by_broker_user(realm_id, broker_user_id)
            .cloned()
            .collect()
    }

    fn active_user_sessions(&self, realm_id: &RealmId, client_id: &ClientId) -> u64 {
        self.count_by_client(false, realm_id, client_id)
    }

    fn active_client_session_stats(
        &self,
        realm_id: &RealmId,
        offline: bool,
    ) -> BTreeMap<ClientId, u64> {
        let mut stats = BTreeMap::new();
        for session in self.table(offline).read().in_realm(realm_id) {
            for client_id in session.client_sessions.keys() {
                *stats.entry(client_id.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    fn activate_user_session(&self, realm_id: &RealmId, id: &SessionId) -> bool {
        self.online
            .write()
            .update(realm_id, id, |session| {
                if session.state == SessionState::Created {
                    session.state = SessionState::Active;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false)
    }

    fn refresh_user_session(&self, realm_id: &RealmId, id: &SessionId, now: i64) -> bool {
        self.online
            .write()
            .update(realm_id, id, |session| {
                session.last_session_refresh = session.last_session_refresh.max(now);
            })
            .is_some()
    }

    fn set_user_session_note(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
        name: &str,
        value: &str,
    ) -> bool {
        self.online
            .write()
            .update(realm_id, id, |session| {
                session.notes.insert(name.to_string(), value.to_string());
            })
            .is_some()
    }

    fn remove_user_session(&self, realm_id: &RealmId, id: &SessionId) -> bool {
        let removed = self.online.write().remove(realm_id, id);
        match removed {
            Some(session) => {
                debug!(session_id = %id, client_sessions = session.client_sessions.len(), "User session removed");
                true
            }
            None => false,
        }
    }

    fn remove_user_sessions(&self, realm_id: &RealmId, user_id: &UserId) -> usize {
        let (removed, _) = self
            .online
            .write()
            .remove_where(|session| session.realm_id == *realm_id && session.user_id == *user_id);
        debug!(realm_id = %realm_id, user_id = %user_id, removed, "User sessions removed");
        removed
    }

    fn remove_realm_sessions(&self, realm_id: &RealmId) -> usize {
        let (removed, _) = self
            .online
            .write()
            .remove_where(|session| session.realm_id == *realm_id);
        debug!(realm_id = %realm_id, removed, "Realm sessions removed");
        removed
    }

    fn create_client_session(
        &self,
        realm_id: &RealmId,
        client_id: &ClientId,
        user_session_id: &SessionId,
    ) -> Option<ClientSessionEntity> {
        let client_session = ClientSessionEntity::new(
            SessionId::generate(),
            realm_id.clone(),
            client_id.clone(),
            user_session_id.clone(),
            current_time(),
        );
        self.online.write().attach(client_session)
    }

    fn get_client_session(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
    ) -> Option<ClientSessionEntity> {
        self.online.read().client_session(realm_id, id).cloned()
    }

    fn touch_client_session(&self, realm_id: &RealmId, id: &SessionId, now: i64) -> bool {
        self.online
            .write()
            .update_client_session(realm_id, id, |client_session| {
                client_session.timestamp = client_session.timestamp.max(now);
            })
    }

    fn set_client_session_note(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
        name: &str,
        value: &str,
    ) -> bool {
        self.online
            .write()
            .update_client_session(realm_id, id, |client_session| {
                client_session
                    .notes
                    .insert(name.to_string(), value.to_string());
            })
    }

    fn remove_client_session(&self, realm_id: &RealmId, id: &SessionId) -> bool {
        self.online.write().remove_client_session(realm_id, id)
    }

    fn create_offline_user_session(
        &self,
        session: &UserSessionEntity,
    ) -> Option<UserSessionEntity> {
        let now = current_time();
        let offline = UserSessionEntity {
            started: now,
            last_session_refresh: now,
            client_sessions: BTreeMap::new(),
            ..session.clone()
        };

        let mut table = self.offline.write();
        table.remove(&offline.realm_id, &offline.id);
        if !table.insert(offline.clone()) {
            debug!(session_id = %offline.id, "Offline session id held by another realm");
            return None;
        }
        debug!(session_id = %offline.id, realm_id = %offline.realm_id, "Offline user session created");
        Some(offline)
    }

    fn get_offline_user_session(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
    ) -> Option<UserSessionEntity> {
        self.offline.read().get(realm_id, id).cloned()
    }

    fn get_offline_user_sessions(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
    ) -> Vec<UserSessionEntity> {
        self.by_user(true, realm_id, user_id)
    }

    fn get_offline_user_sessions_by_client(
        &self,
        realm_id: &RealmId,
        client_id: &ClientId,
        paging: Paging,
    ) -> Vec<UserSessionEntity> {
        self.by_client(true, realm_id, client_id, paging)
    }

    fn offline_sessions_count(&self, realm_id: &RealmId, client_id: &ClientId) -> u64 {
        self.count_by_client(true, realm_id, client_id)
    }

    fn create_offline_client_session(
        &self,
        client_session: &ClientSessionEntity,
        offline_user_session_id: &SessionId,
    ) -> Option<ClientSessionEntity> {
        let offline = ClientSessionEntity {
            id: SessionId::generate(),
            user_session_id: offline_user_session_id.clone(),
            timestamp: current_time(),
            ..client_session.clone()
        };
        self.offline.write().attach(offline)
    }

    fn get_offline_client_session(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
    ) -> Option<ClientSessionEntity> {
        self.offline.read().client_session(realm_id, id).cloned()
    }

    fn remove_offline_user_session(&self, realm_id: &RealmId, id: &SessionId) -> bool {
        let removed = self.offline.write().remove(realm_id, id).is_some();
        if removed {
            debug!(session_id = %id, "Offline user session removed");
        }
        removed
    }

    fn create_login_failure(&self, realm_id: &RealmId, username: &str) -> LoginFailureEntity {
        let key = LoginFailureKey::new(realm_id.clone(), username);
        self.login_failures
            .entry(key.clone())
            .or_insert_with(|| LoginFailureEntity::new(key))
            .clone()
    }

    fn get_login_failure(&self, realm_id: &RealmId, username: &str) -> Option<LoginFailureEntity> {
        self.login_failures
            .get(&LoginFailureKey::new(realm_id.clone(), username))
            .map(|entry| entry.value().clone())
    }

    fn record_login_failure(
        &self,
        realm_id: &RealmId,
        username: &str,
        now: i64,
        ip_address: Option<&str>,
    ) -> Option<LoginFailureEntity> {
        let mut entry = self
            .login_failures
            .get_mut(&LoginFailureKey::new(realm_id.clone(), username))?;
        entry.increment_failures(now, ip_address);
        debug!(realm_id = %realm_id, username, failures = entry.num_failures, "Login failure recorded");
        Some(entry.clone())
    }

    fn set_failed_login_not_before(
        &self,
        realm_id: &RealmId,
        username: &str,
        not_before: i64,
    ) -> bool {
        let Some(mut entry) = self
            .login_failures
            .get_mut(&LoginFailureKey::new(realm_id.clone(), username))
        else {
            return false;
        };
        entry.failed_login_not_before = not_before;
        true
    }

    fn clear_login_failure(&self, realm_id: &RealmId, username: &str) -> bool {
        let Some(mut entry) = self
            .login_failures
            .get_mut(&LoginFailureKey::new(realm_id.clone(), username))
        else {
            return false;
        };
        entry.clear_failures();
        true
    }

    fn remove_login_failure(&self, realm_id: &RealmId, username: &str) -> bool {
        self.login_failures
            .remove(&LoginFailureKey::new(realm_id.clone(), username))
            .is_some()
    }

    fn remove_all_login_failures(&self, realm_id: &RealmId) -> usize {
        let before = self.login_failures.len();
        self.login_failures
            .retain(|key, _| key.realm_id != *realm_id);
        let removed = before.saturating_sub(self.login_failures.len());
        debug!(realm_id = %realm_id, removed, "Login failures removed");
        removed
    }

    fn create_or_update_client_initial_access(
        &self,
        entity: ClientInitialAccessEntity,
    ) -> ClientInitialAccessEntity {
        self.initial_access.insert(entity.id.clone(), entity.clone());
        entity
    }

    fn get_client_initial_access(
        &self,
        realm_id: &RealmId,
        id: &str,
    ) -> Option<ClientInitialAccessEntity> {
        self.initial_access
            .get(id)
            .filter(|entry| entry.realm_id == *realm_id)
            .map(|entry| entry.value().clone())
    }

    fn list_client_initial_access(&self, realm_id: &RealmId) -> Vec<ClientInitialAccessEntity> {
        let mut tokens: Vec<ClientInitialAccessEntity> = self
            .initial_access
            .iter()
            .filter(|entry| entry.realm_id == *realm_id)
            .map(|entry| entry.value().clone())
            .collect();
        tokens.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        tokens
    }

    fn decrease_remaining_count(&self, realm_id: &RealmId, id: &str) -> DecrementOutcome {
        let Some(mut entry) = self
            .initial_access
            .get_mut(id)
            .filter(|entry| entry.realm_id == *realm_id)
        else {
            return DecrementOutcome::NotFound;
        };
        if entry.is_exhausted() {
            return DecrementOutcome::Exhausted;
        }
        entry.remaining_count -= 1;
        DecrementOutcome::Decremented {
            remaining: entry.remaining_count,
        }
    }

    fn remove_client_initial_access(&self, realm_id: &RealmId, id: &str) -> bool {
        self.initial_access
            .remove_if(id, |_, entry| entry.realm_id == *realm_id)
            .is_some()
    }

    fn on_realm_removed(&self, realm_id: &RealmId) {
        let (online, _) = self
            .online
            .write()
            .remove_where(|session| session.realm_id == *realm_id);
        let (offline, _) = self
            .offline
            .write()
            .remove_where(|session| session.realm_id == *realm_id);
        let login_failures = self.remove_all_login_failures(realm_id);
        self.initial_access
            .retain(|_, entry| entry.realm_id != *realm_id);
        info!(realm_id = %realm_id, online, offline, login_failures, "Realm sessions dropped");
    }

    fn on_client_removed(&self, realm_id: &RealmId, client_id: &ClientId) {
        let belongs = |client_session: &ClientSessionEntity| {
            client_session.realm_id == *realm_id && client_session.client_id == *client_id
        };
        let online = self.online.write().remove_client_sessions_where(belongs);
        let offline = self.offline.write().remove_client_sessions_where(belongs);
        debug!(realm_id = %realm_id, client_id = %client_id, online, offline, "Client sessions dropped");
    }

    fn on_user_removed(&self, realm_id: &RealmId, user_id: &UserId, username: &str) {
        let belongs =
            |session: &UserSessionEntity| session.realm_id == *realm_id && session.user_id == *user_id;
        let (online, _) = self.online.write().remove_where(belongs);
        let (offline, _) = self.offline.write().remove_where(belongs);
        self.remove_login_failure(realm_id, username);
        debug!(realm_id = %realm_id, user_id = %user_id, online, offline, "User sessions dropped");
    }

    fn remove_expired(
        &self,
        realm_id: &RealmId,
        limits: &SessionLimits,
        now: i64,
    ) -> ExpiredSessions {
        let expired = now - limits.sso_session_max_lifespan;
        let expired_refresh = now - limits.sso_session_idle_timeout - IDLE_TIMEOUT_WINDOW_SECONDS;
        let expired_offline =
            now - limits.offline_session_idle_timeout - IDLE_TIMEOUT_WINDOW_SECONDS;
        let mut report = ExpiredSessions::default();

        {
            let mut online = self.online.write();
            let (sessions, client_sessions) = online.remove_where(|session| {
                session.realm_id == *realm_id
                    && (session.started < expired || session.last_session_refresh < expired_refresh)
            });
            report.user_sessions = sessions;
            report.client_sessions = client_sessions
                + online.remove_client_sessions_where(|client_session| {
                    client_session.realm_id == *realm_id && client_session.timestamp < expired
                });
        }

        {
            let mut offline = self.offline.write();
            let (sessions, client_sessions) = offline.remove_where(|session| {
                session.realm_id == *realm_id && session.last_session_refresh < expired_offline
            });
            report.offline_user_sessions = sessions;
            report.offline_client_sessions = client_sessions
                + offline.remove_client_sessions_where(|client_session| {
                    client_session.realm_id == *realm_id
                        && client_session.timestamp < expired_offline
                });
        }

        let before = self.initial_access.len();
        self.initial_access.retain(|_, entry| {
            entry.realm_id != *realm_id || entry.is_valid(now)
        });
        report.initial_access = before.saturating_sub(self.initial_access.len());

        debug!(
            realm_id = %realm_id,
            user_sessions = report.user_sessions,
            client_sessions = report.client_sessions,
            offline_user_sessions = report.offline_user_sessions,
            offline_client_sessions = report.offline_client_sessions,
            initial_access = report.initial_access,
            "Removed expired sessions"
        );
        report
    }

    fn close(&self) {
        self.online.write().clear();
        self.login_failures.clear();
        info!("In-memory session store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> RealmId {
        RealmId::new("r1")
    }

    fn request(user: &str) -> NewUserSession {
        NewUserSession::new(realm(), UserId::new(user), user)
    }

    #[test]
    fn test_session_lifecycle() {
        let store = InMemorySessionStore::new();
        let session = store.create_user_session(request("alice"));
        assert_eq!(session.state, SessionState::Created);

        assert!(store.activate_user_session(&realm(), &session.id));
        assert!(!store.activate_user_session(&realm(), &session.id));
        let active = store.get_user_session(&realm(), &session.id).unwrap();
        assert_eq!(active.state, SessionState::Active);

        assert!(store.remove_user_session(&realm(), &session.id));
        assert!(store.get_user_session(&realm(), &session.id).is_none());
        assert!(!store.remove_user_session(&realm(), &session.id));
        assert!(!store.refresh_user_session(&realm(), &session.id, 1));
        assert!(!store.set_user_session_note(&realm(), &session.id, "k", "v"));
    }

    #[test]
    fn test_session_is_invisible_from_other_realm() {
        let store = InMemorySessionStore::new();
        let session = store.create_user_session(request("alice"));

        assert!(store.get_user_session(&RealmId::new("r2"), &session.id).is_none());
        assert!(!store.remove_user_session(&RealmId::new("r2"), &session.id));
        assert_eq!(store.online_session_count(), 1);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let store = InMemorySessionStore::new();
        let id = SessionId::new("fixed");
        assert!(store.create_user_session_with_id(id.clone(), request("alice")).is_some());
        assert!(store.create_user_session_with_id(id, request("bob")).is_none());
    }

    #[test]
    fn test_broker_lookups() {
        let store = InMemorySessionStore::new();
        let first = store.create_user_session(request("alice").brokered("bs-1", "idp-alice"));
        let second = store.create_user_session(request("alice").brokered("bs-2", "idp-alice"));

        let found = store
            .get_user_session_by_broker_session_id(&realm(), "bs-2")
            .unwrap();
        assert_eq!(found.id, second.id);
        assert_eq!(
            store
                .get_user_sessions_by_broker_user_id(&realm(), "idp-alice")
                .len(),
            2
        );

        store.remove_user_session(&realm(), &first.id);
        assert!(store
            .get_user_session_by_broker_session_id(&realm(), "bs-1")
            .is_none());
        assert_eq!(
            store
                .get_user_sessions_by_broker_user_id(&realm(), "idp-alice")
                .len(),
            1
        );
        store.online.read().check_consistency().unwrap();
    }

    #[test]
    fn test_client_session_queries() {
        let store = InMemorySessionStore::new();
        let app = ClientId::new("app");
        let a = store.create_user_session(request("alice"));
        let b = store.create_user_session(request("bob"));
        store.create_client_session(&realm(), &app, &a.id).unwrap();
        store.create_client_session(&realm(), &app, &b.id).unwrap();
        store
            .create_client_session(&realm(), &ClientId::new("admin"), &b.id)
            .unwrap();
        store.refresh_user_session(&realm(), &a.id, a.last_session_refresh + 100);

        let sessions = store.get_user_sessions_by_client(&realm(), &app, Paging::ALL);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].id, a.id);
        assert_eq!(
            store.get_user_sessions_by_client(&realm(), &app, Paging::new(1, 5)).len(),
            1
        );
        assert_eq!(store.active_user_sessions(&realm(), &app), 2);

        let stats = store.active_client_session_stats(&realm(), false);
        assert_eq!(stats.get(&app), Some(&2));
        assert_eq!(stats.get(&ClientId::new("admin")), Some(&1));
    }

    #[test]
    fn test_client_session_needs_live_user_session() {
        let store = InMemorySessionStore::new();
        let session = store.create_user_session(request("alice"));
        store.remove_user_session(&realm(), &session.id);

        assert!(store
            .create_client_session(&realm(), &ClientId::new("app"), &session.id)
            .is_none());
    }

    #[test]
    fn test_removing_user_session_removes_client_sessions() {
        let store = InMemorySessionStore::new();
        let session = store.create_user_session(request("alice"));
        let client_session = store
            .create_client_session(&realm(), &ClientId::new("app"), &session.id)
            .unwrap();
        assert!(store.set_client_session_note(&realm(), &client_session.id, "scope", "openid"));

        store.remove_user_session(&realm(), &session.id);
        assert!(store.get_client_session(&realm(), &client_session.id).is_none());
        assert!(!store.touch_client_session(&realm(), &client_session.id, 1));
    }

    #[test]
    fn test_offline_session_survives_online_removal() {
        let store = InMemorySessionStore::new();
        let app = ClientId::new("app");
        let online = store.create_user_session(request("alice"));
        let client_session = store.create_client_session(&realm(), &app, &online.id).unwrap();

        let offline = store.create_offline_user_session(&online).unwrap();
        let offline_client = store
            .create_offline_client_session(&client_session, &offline.id)
            .unwrap();
        store.remove_user_session(&realm(), &online.id);

        let kept = store.get_offline_user_session(&realm(), &online.id).unwrap();
        assert!(kept.has_client(&app));
        assert_eq!(
            store
                .get_offline_client_session(&realm(), &offline_client.id)
                .unwrap()
                .user_session_id,
            online.id
        );
        assert_eq!(store.offline_sessions_count(&realm(), &app), 1);
        assert_eq!(
            store
                .get_offline_user_sessions(&realm(), &UserId::new("alice"))
                .len(),
            1
        );
        assert_eq!(
            store
                .get_offline_user_sessions_by_client(&realm(), &app, Paging::ALL)
                .len(),
            1
        );

        assert!(store.remove_offline_user_session(&realm(), &online.id));
        assert!(store
            .get_offline_client_session(&realm(), &offline_client.id)
            .is_none());
    }

    #[test]
    fn test_offline_copy_refuses_id_held_by_other_realm() {
        let store = InMemorySessionStore::new();
        let online = store.create_user_session(request("alice"));
        assert!(store.create_offline_user_session(&online).is_some());
        // Recreating in the same realm replaces the previous copy.
        assert!(store.create_offline_user_session(&online).is_some());

        let elsewhere = UserSessionEntity {
            realm_id: RealmId::new("r2"),
            ..online.clone()
        };
        assert!(store.create_offline_user_session(&elsewhere).is_none());
        assert!(store
            .get_offline_user_session(&RealmId::new("r2"), &online.id)
            .is_none());
        assert!(store.get_offline_user_session(&realm(), &online.id).is_some());
        assert_eq!(store.offline_session_count(), 1);
    }

    #[test]
    fn test_close_keeps_offline_sessions() {
        let store = InMemorySessionStore::new();
        let online = store.create_user_session(request("alice"));
        store.create_offline_user_session(&online);
        store.create_login_failure(&realm(), "alice");

        store.close();
        assert_eq!(store.online_session_count(), 0);
        assert_eq!(store.offline_session_count(), 1);
        assert!(store.get_login_failure(&realm(), "alice").is_none());
    }

    #[test]
    fn test_remove_expired() {
        let store = InMemorySessionStore::new();
        let limits = SessionLimits::default();
        let stale = store.create_user_session(request("alice"));
        let fresh = store.create_user_session(request("bob"));
        store
            .create_client_session(&realm(), &ClientId::new("app"), &stale.id)
            .unwrap();
        store.create_offline_user_session(&stale);

        let later = stale.started + limits.sso_session_idle_timeout + IDLE_TIMEOUT_WINDOW_SECONDS + 1;
        store.refresh_user_session(&realm(), &fresh.id, later);

        let report = store.remove_expired(&realm(), &limits, later);
        assert_eq!(report.user_sessions, 1);
        assert_eq!(report.client_sessions, 1);
        assert_eq!(report.offline_user_sessions, 0);
        assert!(store.get_user_session(&realm(), &stale.id).is_none());
        assert!(store.get_user_session(&realm(), &fresh.id).is_some());
        assert!(store.get_offline_user_session(&realm(), &stale.id).is_some());
    }

    #[test]
    fn test_remove_expired_sweeps_exhausted_and_expired_tokens() {
        let store = InMemorySessionStore::new();
        let exhausted = store.create_or_update_client_initial_access(
            ClientInitialAccessEntity::new(realm(), 0, 1, 100),
        );
        let expired = store.create_or_update_client_initial_access(
            ClientInitialAccessEntity::new(realm(), 10, 5, 100),
        );
        let valid = store.create_or_update_client_initial_access(
            ClientInitialAccessEntity::new(realm(), 0, 5, 100),
        );
        store.decrease_remaining_count(&realm(), &exhausted.id);

        let report = store.remove_expired(&realm(), &SessionLimits::default(), 200);
        assert_eq!(report.initial_access, 2);
        assert!(store.get_client_initial_access(&realm(), &expired.id).is_none());
        assert!(store.get_client_initial_access(&realm(), &valid.id).is_some());
    }

    #[test]
    fn test_decrease_remaining_count_stops_at_zero() {
        let store = InMemorySessionStore::new();
        let token = store.create_or_update_client_initial_access(
            ClientInitialAccessEntity::new(realm(), 0, 2, 100),
        );

        assert_eq!(
            store.decrease_remaining_count(&realm(), &token.id),
            DecrementOutcome::Decremented { remaining: 1 }
        );
        assert_eq!(
            store.decrease_remaining_count(&realm(), &token.id),
            DecrementOutcome::Decremented { remaining: 0 }
        );
        assert_eq!(
            store.decrease_remaining_count(&realm(), &token.id),
            DecrementOutcome::Exhausted
        );
        assert_eq!(
            store.decrease_remaining_count(&RealmId::new("r2"), &token.id),
            DecrementOutcome::NotFound
        );

        let kept = store.get_client_initial_access(&realm(), &token.id).unwrap();
        assert_eq!(kept.remaining_count, 0);
        assert!(!kept.is_valid(100));
    }

    #[test]
    fn test_on_client_removed_detaches_client_sessions() {
        let store = InMemorySessionStore::new();
        let app = ClientId::new("app");
        let session = store.create_user_session(request("alice"));
        store.create_client_session(&realm(), &app, &session.id).unwrap();
        let offline = store.create_offline_user_session(&session).unwrap();
        let client_session = store
            .create_client_session(&realm(), &ClientId::new("admin"), &session.id)
            .unwrap();
        store
            .create_offline_client_session(&client_session, &offline.id)
            .unwrap();

        store.on_client_removed(&realm(), &ClientId::new("admin"));

        let kept = store.get_user_session(&realm(), &session.id).unwrap();
        assert!(kept.has_client(&app));
        assert!(!kept.has_client(&ClientId::new("admin")));
        assert_eq!(store.offline_sessions_count(&realm(), &ClientId::new("admin")), 0);
        store.online.read().check_consistency().unwrap();
        store.offline.read().check_consistency().unwrap();
    }

    #[test]
    fn test_on_realm_removed_drops_everything_in_realm() {
        let store = InMemorySessionStore::new();
        let session = store.create_user_session(request("alice"));
        store.create_offline_user_session(&session);
        store.create_login_failure(&realm(), "alice");
        store.create_or_update_client_initial_access(ClientInitialAccessEntity::new(
            realm(),
            0,
            1,
            0,
        ));
        let other = store.create_user_session(NewUserSession::new(
            RealmId::new("r2"),
            UserId::new("bob"),
            "bob",
        ));

        store.on_realm_removed(&realm());

        assert_eq!(store.online_session_count(), 1);
        assert_eq!(store.offline_session_count(), 0);
        assert!(store.get_login_failure(&realm(), "alice").is_none());
        assert!(store.list_client_initial_access(&realm()).is_empty());
        assert!(store.get_user_session(&RealmId::new("r2"), &other.id).is_some());
    }

    #[test]
    fn test_on_user_removed() {
        let store = InMemorySessionStore::new();
        let session = store.create_user_session(request("alice"));
        store.create_user_session(request("bob"));
        store.create_offline_user_session(&session);
        store.create_login_failure(&realm(), "alice");

        store.on_user_removed(&realm(), &UserId::new("alice"), "alice");

        assert!(store.get_user_sessions(&realm(), &UserId::new("alice")).is_empty());
        assert_eq!(store.get_user_sessions(&realm(), &UserId::new("bob")).len(), 1);
        assert_eq!(store.offline_session_count(), 0);
        assert!(store.get_login_failure(&realm(), "alice").is_none());
    }
}
