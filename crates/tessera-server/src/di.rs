//! Dependency injection module using Shaku.

use shaku::{module, HasComponent};
use std::sync::Arc;
use tessera_sessions::{InMemorySessionStore, UserSessionStore};

// Single-node session module. Clustered session stores are provided by the
// cache container, so this module only carries the in-memory store.
module! {
    pub SessionModule {
        components = [
            InMemorySessionStore,
        ],
        providers = [],
    }
}

/// Builds the session module with default component parameters.
#[must_use]
pub fn build_session_module() -> Arc<SessionModule> {
    Arc::new(SessionModule::builder().build())
}

/// Resolves the session store from the module.
#[must_use]
pub fn session_store(module: &SessionModule) -> Arc<dyn UserSessionStore> {
    module.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{RealmId, UserId};
    use tessera_sessions::NewUserSession;

    #[test]
    fn test_store_is_a_module_singleton() {
        let module = build_session_module();
        let first = session_store(&module);
        let second = session_store(&module);

        let session = first.create_user_session(NewUserSession::new(
            RealmId::new("master"),
            UserId::new("u1"),
            "admin",
        ));
        assert!(second
            .get_user_session(&RealmId::new("master"), &session.id)
            .is_some());
    }

    #[test]
    fn test_separate_modules_do_not_share_sessions() {
        let a = session_store(&build_session_module());
        let b = session_store(&build_session_module());

        let session = a.create_user_session(NewUserSession::new(
            RealmId::new("master"),
            UserId::new("u1"),
            "admin",
        ));
        assert!(b
            .get_user_session(&RealmId::new("master"), &session.id)
            .is_none());
    }
}
