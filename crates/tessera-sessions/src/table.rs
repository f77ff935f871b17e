//! One session map with its client sessions and broker indices.
//!
//! All mutation goes through [`SessionTable`] methods so that a session,
//! its client sessions, and its index entries change together. Callers hold
//! the table under a single lock.

use crate::entities::{ClientSessionEntity, SessionState, UserSessionEntity};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use tessera_core::{RealmId, SessionId};

type BrokerKey = (RealmId, String);
type BrokerIndex = HashMap<BrokerKey, BTreeSet<SessionId>>;

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, UserSessionEntity>,
    client_sessions: HashMap<SessionId, ClientSessionEntity>,
    by_broker_session: BrokerIndex,
    by_broker_user: BrokerIndex,
}

fn link(index: &mut BrokerIndex, realm_id: &RealmId, broker_id: Option<&String>, id: &SessionId) {
    if let Some(broker_id) = broker_id {
        index
            .entry((realm_id.clone(), broker_id.clone()))
            .or_default()
            .insert(id.clone());
    }
}

fn unlink(
    index: &mut BrokerIndex,
    realm_id: &RealmId,
    broker_id: Option<&String>,
    id: &SessionId,
) {
    let Some(broker_id) = broker_id else {
        return;
    };
    if let Entry::Occupied(mut entry) = index.entry((realm_id.clone(), broker_id.clone())) {
        entry.get_mut().remove(id);
        if entry.get().is_empty() {
            entry.remove();
        }
    }
}

impl SessionTable {
    /// Inserts a session and indexes it. False if the id is taken.
    pub fn insert(&mut self, session: UserSessionEntity) -> bool {
        let Entry::Vacant(slot) = self.sessions.entry(session.id.clone()) else {
            return false;
        };
        link(
            &mut self.by_broker_session,
            &session.realm_id,
            session.broker_session_id.as_ref(),
            &session.id,
        );
        link(
            &mut self.by_broker_user,
            &session.realm_id,
            session.broker_user_id.as_ref(),
            &session.id,
        );
        slot.insert(session);
        true
    }

    pub fn get(&self, realm_id: &RealmId, id: &SessionId) -> Option<&UserSessionEntity> {
        self.sessions
            .get(id)
            .filter(|session| session.realm_id == *realm_id)
    }

    /// Mutable access for fields that are not indexed.
    pub fn update<R>(
        &mut self,
        realm_id: &RealmId,
        id: &SessionId,
        change: impl FnOnce(&mut UserSessionEntity) -> R,
    ) -> Option<R> {
        self.sessions
            .get_mut(id)
            .filter(|session| session.realm_id == *realm_id)
            .map(change)
    }

    pub fn in_realm<'a>(
        &'a self,
        realm_id: &'a RealmId,
    ) -> impl Iterator<Item = &'a UserSessionEntity> + 'a {
        self.sessions
            .values()
            .filter(move |session| session.realm_id == *realm_id)
    }

    pub fn by_broker_session<'a>(
        &'a self,
        realm_id: &RealmId,
        broker_session_id: &str,
    ) -> impl Iterator<Item = &'a UserSessionEntity> + 'a {
        self.indexed(&self.by_broker_session, realm_id, broker_session_id)
    }

    pub fn by_broker_user<'a>(
        &'a self,
        realm_id: &RealmId,
        broker_user_id: &str,
    ) -> impl Iterator<Item = &'a UserSessionEntity> + 'a {
        self.indexed(&self.by_broker_user, realm_id, broker_user_id)
    }

    fn indexed<'a>(
        &'a self,
        index: &'a BrokerIndex,
        realm_id: &RealmId,
        broker_id: &str,
    ) -> impl Iterator<Item = &'a UserSessionEntity> + 'a {
        index
            .get(&(realm_id.clone(), broker_id.to_string()))
            .into_iter()
            .flatten()
            .filter_map(move |id| self.sessions.get(id))
    }

    /// Removes a session with its client sessions and index entries. The
    /// returned entity is marked `Removed`.
    pub fn remove(&mut self, realm_id: &RealmId, id: &SessionId) -> Option<UserSessionEntity> {
        self.get(realm_id, id)?;
        let mut session = self.sessions.remove(id)?;
        unlink(
            &mut self.by_broker_session,
            &session.realm_id,
            session.broker_session_id.as_ref(),
            id,
        );
        unlink(
            &mut self.by_broker_user,
            &session.realm_id,
            session.broker_user_id.as_ref(),
            id,
        );
        for client_session_id in session.client_sessions.values() {
            self.client_sessions.remove(client_session_id);
        }
        session.state = SessionState::Removed;
        Some(session)
    }

    /// Removes every session matching `predicate`. Returns the number of
    /// user sessions and client sessions removed.
    pub fn remove_where(
        &mut self,
        predicate: impl Fn(&UserSessionEntity) -> bool,
    ) -> (usize, usize) {
        let doomed: Vec<(RealmId, SessionId)> = self
            .sessions
            .values()
            .filter(|session| predicate(session))
            .map(|session| (session.realm_id.clone(), session.id.clone()))
            .collect();

        let mut client_sessions = 0;
        for (realm_id, id) in &doomed {
            if let Some(session) = self.remove(realm_id, id) {
                client_sessions += session.client_sessions.len();
            }
        }
        (doomed.len(), client_sessions)
    }

    /// Attaches a client session to its user session, replacing the previous
    /// client session of the same client. `None` if the user session is gone.
    pub fn attach(&mut self, client_session: ClientSessionEntity) -> Option<ClientSessionEntity> {
        let session = self
            .sessions
            .get_mut(&client_session.user_session_id)
            .filter(|session| session.realm_id == client_session.realm_id)?;
        let replaced = session
            .client_sessions
            .insert(client_session.client_id.clone(), client_session.id.clone());
        if let Some(replaced) = replaced {
            self.client_sessions.remove(&replaced);
        }
        self.client_sessions
            .insert(client_session.id.clone(), client_session.clone());
        Some(client_session)
    }

    pub fn client_session(&self, realm_id: &RealmId, id: &SessionId) -> Option<&ClientSessionEntity> {
        self.client_sessions
            .get(id)
            .filter(|client_session| client_session.realm_id == *realm_id)
    }

    pub fn update_client_session(
        &mut self,
        realm_id: &RealmId,
        id: &SessionId,
        change: impl FnOnce(&mut ClientSessionEntity),
    ) -> bool {
        self.client_sessions
            .get_mut(id)
            .filter(|client_session| client_session.realm_id == *realm_id)
            .map(change)
            .is_some()
    }

    /// Removes a client session and detaches it from its user session.
    pub fn remove_client_session(&mut self, realm_id: &RealmId, id: &SessionId) -> bool {
        if self.client_session(realm_id, id).is_none() {
            return false;
        }
        let Some(client_session) = self.client_sessions.remove(id) else {
            return false;
        };
        if let Some(session) = self.sessions.get_mut(&client_session.user_session_id) {
            if session.client_sessions.get(&client_session.client_id) == Some(id) {
                session.client_sessions.remove(&client_session.client_id);
            }
        }
        true
    }

    pub fn remove_client_sessions_where(
        &mut self,
        predicate: impl Fn(&ClientSessionEntity) -> bool,
    ) -> usize {
        let doomed: Vec<(RealmId, SessionId)> = self
            .client_sessions
            .values()
            .filter(|client_session| predicate(client_session))
            .map(|client_session| (client_session.realm_id.clone(), client_session.id.clone()))
            .collect();
        doomed
            .iter()
            .filter(|(realm_id, id)| self.remove_client_session(realm_id, id))
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
        self.client_sessions.clear();
        self.by_broker_session.clear();
        self.by_broker_user.clear();
    }

    /// Verifies that sessions, client sessions, and both indices agree.
    #[cfg(test)]
    pub fn check_consistency(&self) -> Result<(), String> {
        let check_index = |index: &BrokerIndex,
                           broker_id: fn(&UserSessionEntity) -> Option<&String>|
         -> Result<(), String> {
            for ((realm_id, key), ids) in index {
                if ids.is_empty() {
                    return Err(format!("empty index entry {key}"));
                }
                for id in ids {
                    let session = self
                        .sessions
                        .get(id)
                        .ok_or_else(|| format!("index {key} points at missing session {id}"))?;
                    if session.realm_id != *realm_id || broker_id(session) != Some(key) {
                        return Err(format!("index {key} points at unrelated session {id}"));
                    }
                }
            }
            for session in self.sessions.values() {
                if let Some(key) = broker_id(session) {
                    let indexed = index
                        .get(&(session.realm_id.clone(), key.clone()))
                        .is_some_and(|ids| ids.contains(&session.id));
                    if !indexed {
                        return Err(format!("session {} missing from index {key}", session.id));
                    }
                }
            }
            Ok(())
        };
        check_index(&self.by_broker_session, |s| s.broker_session_id.as_ref())?;
        check_index(&self.by_broker_user, |s| s.broker_user_id.as_ref())?;

        for client_session in self.client_sessions.values() {
            let attached = self
                .sessions
                .get(&client_session.user_session_id)
                .and_then(|session| session.client_sessions.get(&client_session.client_id));
            if attached != Some(&client_session.id) {
                return Err(format!("client session {} is detached", client_session.id));
            }
        }
        for session in self.sessions.values() {
            for id in session.client_sessions.values() {
                if !self.client_sessions.contains_key(id) {
                    return Err(format!("session {} references missing client session {id}", session.id));
                }
            }
        }
        Ok(())
    }
}
