//! Username registry for connected peers

use std::collections::HashMap;

use uuid::Uuid;

/// Relay-assigned connection handle
pub type ConnId = Uuid;

/// Registration errors, reported back to the offending client only
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Player name must not be empty, please choose a name")]
    EmptyName,

    #[error("Player name \"{0}\" is already in use, please choose another")]
    DuplicateName(String),
}

/// Case-insensitive unique names among currently registered connections
#[derive(Debug, Default)]
pub struct SessionRegistry {
    names: HashMap<ConnId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for `conn`. Returns the trimmed name on success.
    /// A connection registering again replaces its previous name.
    pub fn register(&mut self, conn: ConnId, name: &str) -> Result<String, RegistrationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }

        let normalized = name.to_lowercase();
        let taken = self
            .names
            .iter()
            .any(|(other, existing)| *other != conn && existing.to_lowercase() == normalized);
        if taken {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }

        self.names.insert(conn, name.to_string());
        Ok(name.to_string())
    }

    /// Idempotent; returns the released name if there was one
    pub fn unregister(&mut self, conn: ConnId) -> Option<String> {
        self.names.remove(&conn)
    }

    /// Forget every name. Returns how many were released.
    pub fn reset(&mut self) -> usize {
        let count = self.names.len();
        self.names.clear();
        count
    }

    pub fn name_of(&self, conn: ConnId) -> Option<&str> {
        self.names.get(&conn).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn duplicate_names_are_case_and_space_insensitive() {
        let mut registry = SessionRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(assert_ok!(registry.register(a, "Alice")), "Alice");
        let err = assert_err!(registry.register(b, "alice "));
        assert_eq!(err, RegistrationError::DuplicateName("alice".to_string()));

        registry.unregister(a);
        assert_ok!(registry.register(b, "alice"));
        assert_eq!(registry.name_of(b), Some("alice"));
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut registry = SessionRegistry::new();
        assert_eq!(
            registry.register(Uuid::new_v4(), "   "),
            Err(RegistrationError::EmptyName)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn same_connection_may_rename_itself() {
        let mut registry = SessionRegistry::new();
        let a = Uuid::new_v4();
        assert_ok!(registry.register(a, "Alice"));
        assert_ok!(registry.register(a, "ALICE"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.name_of(a), Some("ALICE"));
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let a = Uuid::new_v4();
        assert_ok!(registry.register(a, "Alice"));
        assert_eq!(registry.unregister(a), Some("Alice".to_string()));
        assert_eq!(registry.unregister(a), None);
    }

    #[test]
    fn reset_frees_every_name() {
        let mut registry = SessionRegistry::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_ok!(registry.register(a, "Alice"));
        assert_ok!(registry.register(b, "Bob"));

        assert_eq!(registry.reset(), 2);
        assert_ok!(registry.register(c, "alice"));
        assert_ok!(registry.register(a, "bob"));
    }
}
