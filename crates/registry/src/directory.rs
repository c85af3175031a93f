//! Participant directory: identifier to display-name mapping.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use tabx_core::{DomainError, DomainResult, Participant};

/// One registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub participant: Participant,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
}

/// Lookup surface used to join display names onto ledger output.
pub trait ParticipantDirectory: Send + Sync {
    /// Register a participant under a display name. Both the identifier and
    /// the name must be unused.
    fn register(&self, participant: Participant, display_name: &str) -> DomainResult<Registration>;

    /// Display name for an identifier.
    fn display_name(&self, participant: &Participant) -> DomainResult<String>;

    /// Reverse lookup: the participant registered under `name`.
    fn resolve(&self, name: &str) -> DomainResult<Participant>;

    /// All registrations, ordered by identifier.
    fn list(&self) -> DomainResult<Vec<Registration>>;
}

/// In-process directory. Intended for tests/dev.
#[derive(Default)]
pub struct InMemoryDirectory {
    by_participant: RwLock<HashMap<Participant, Registration>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParticipantDirectory for InMemoryDirectory {
    fn register(&self, participant: Participant, display_name: &str) -> DomainResult<Registration> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::validation("display name must not be empty"));
        }

        let mut directory = self
            .by_participant
            .write()
            .map_err(|_| DomainError::conflict("directory lock poisoned"))?;
        if directory.contains_key(&participant) {
            return Err(DomainError::conflict(format!(
                "participant already registered: {participant}"
            )));
        }
        if directory.values().any(|r| r.display_name == display_name) {
            return Err(DomainError::conflict(format!(
                "display name already taken: {display_name}"
            )));
        }

        let registration = Registration {
            participant: participant.clone(),
            display_name: display_name.to_owned(),
            registered_at: Utc::now(),
        };
        directory.insert(participant.clone(), registration.clone());
        info!(participant = %participant, display_name, "participant registered");
        Ok(registration)
    }

    fn display_name(&self, participant: &Participant) -> DomainResult<String> {
        self.by_participant
            .read()
            .map_err(|_| DomainError::conflict("directory lock poisoned"))?
            .get(participant)
            .map(|r| r.display_name.clone())
            .ok_or_else(DomainError::not_found)
    }

    fn resolve(&self, name: &str) -> DomainResult<Participant> {
        self.by_participant
            .read()
            .map_err(|_| DomainError::conflict("directory lock poisoned"))?
            .values()
            .find(|r| r.display_name == name)
            .map(|r| r.participant.clone())
            .ok_or_else(DomainError::not_found)
    }

    fn list(&self) -> DomainResult<Vec<Registration>> {
        let directory = self
            .by_participant
            .read()
            .map_err(|_| DomainError::conflict("directory lock poisoned"))?;
        let mut registrations: Vec<_> = directory.values().cloned().collect();
        registrations.sort_by(|a, b| a.participant.cmp(&b.participant));
        Ok(registrations)
    }
}
