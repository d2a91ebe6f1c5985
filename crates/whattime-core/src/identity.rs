use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The identity invoking an operation, as vouched for by whatever sits in
/// front of the service.
///
/// `identities` always contains `effective_identity`; linked identities (other
/// accounts, group principals) extend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub effective_identity: String,
    pub identities: BTreeSet<String>,
}

impl Caller {
    pub fn new(effective_identity: impl Into<String>) -> Self {
        let effective_identity = effective_identity.into();
        let identities = BTreeSet::from([effective_identity.clone()]);
        Self {
            effective_identity,
            identities,
        }
    }

    /// Add linked identities. Blank entries are ignored.
    pub fn with_linked<I, S>(mut self, linked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in linked {
            let id = id.into();
            let id = id.trim();
            if !id.is_empty() {
                self.identities.insert(id.to_string());
            }
        }
        self
    }

    /// True when any of the caller's identities appears in `allowed`.
    pub fn is_member_of(&self, allowed: &BTreeSet<String>) -> bool {
        !self.identities.is_disjoint(allowed)
    }
}
