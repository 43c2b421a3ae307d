//! Ordered credential set with best-effort display names.

use std::collections::HashMap;

use crate::credential::Credential;

/// Credentials in insertion order. Uniqueness is exact string equality.
#[derive(Debug, Default)]
pub(crate) struct CredentialRegistry {
    order: Vec<Credential>,
    names: HashMap<Credential, String>,
}

impl CredentialRegistry {
    /// Returns `false` if the credential was already present.
    pub(crate) fn insert(&mut self, credential: Credential) -> bool {
        if self.contains(credential.expose()) {
            return false;
        }
        self.order.push(credential);
        true
    }

    pub(crate) fn remove(&mut self, raw: &str) -> Option<Credential> {
        let index = self.order.iter().position(|c| c.expose() == raw)?;
        let credential = self.order.remove(index);
        self.names.remove(raw);
        Some(credential)
    }

    pub(crate) fn contains(&self, raw: &str) -> bool {
        self.order.iter().any(|c| c.expose() == raw)
    }

    pub(crate) fn snapshot(&self) -> Vec<Credential> {
        self.order.clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Record a resolved name. Ignored if the credential was removed meanwhile.
    pub(crate) fn set_name(&mut self, credential: &Credential, name: String) -> bool {
        if !self.contains(credential.expose()) {
            return false;
        }
        self.names.insert(credential.clone(), name);
        true
    }

    pub(crate) fn display_name(&self, credential: &Credential) -> String {
        self.names
            .get(credential)
            .cloned()
            .unwrap_or_else(|| credential.fallback_name())
    }
}
