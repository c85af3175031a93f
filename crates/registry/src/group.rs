//! Group rosters: who shares a tab.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use tabx_core::{DomainError, DomainResult, GroupId, Participant};

/// A named circle of participants that share expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    id: GroupId,
    name: String,
    owner: Participant,
    /// Insertion-ordered, duplicate-free. The owner is always a member.
    members: Vec<Participant>,
    created_at: DateTime<Utc>,
}

impl Group {
    fn new(id: GroupId, name: String, owner: Participant, created_at: DateTime<Utc>) -> Self {
        let members = vec![owner.clone()];
        Self {
            id,
            name,
            owner,
            members,
            created_at,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Participant {
        &self.owner
    }

    pub fn members(&self) -> &[Participant] {
        &self.members
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_member(&self, participant: &Participant) -> bool {
        self.members.contains(participant)
    }

    /// Add a member; adding an existing member is a no-op.
    fn add_member(&mut self, participant: Participant) -> bool {
        if self.is_member(&participant) {
            return false;
        }
        self.members.push(participant);
        true
    }
}

/// Membership surface consulted before anything is recorded against a group.
pub trait GroupRoster: Send + Sync {
    fn create(&self, name: &str, owner: Participant) -> DomainResult<Group>;

    /// Idempotent. Returns the group after the (possible) addition.
    fn add_member(&self, group_id: GroupId, participant: Participant) -> DomainResult<Group>;

    fn get(&self, group_id: GroupId) -> DomainResult<Group>;

    /// All groups, ordered by id.
    fn list(&self) -> DomainResult<Vec<Group>>;
}

/// In-process roster with sequential group ids. Intended for tests/dev.
#[derive(Default)]
pub struct InMemoryRoster {
    groups: RwLock<HashMap<GroupId, Group>>,
    next_id: AtomicU64,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupRoster for InMemoryRoster {
    fn create(&self, name: &str, owner: Participant) -> DomainResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("group name must not be empty"));
        }

        let id = GroupId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let group = Group::new(id, name.to_owned(), owner, Utc::now());
        self.groups
            .write()
            .map_err(|_| DomainError::conflict("roster lock poisoned"))?
            .insert(id, group.clone());
        info!(group_id = %id, name, owner = %group.owner(), "group created");
        Ok(group)
    }

    fn add_member(&self, group_id: GroupId, participant: Participant) -> DomainResult<Group> {
        let mut groups = self
            .groups
            .write()
            .map_err(|_| DomainError::conflict("roster lock poisoned"))?;
        let group = groups.get_mut(&group_id).ok_or_else(DomainError::not_found)?;
        if group.add_member(participant.clone()) {
            info!(group_id = %group_id, member = %participant, "member added");
        }
        Ok(group.clone())
    }

    fn get(&self, group_id: GroupId) -> DomainResult<Group> {
        self.groups
            .read()
            .map_err(|_| DomainError::conflict("roster lock poisoned"))?
            .get(&group_id)
            .cloned()
            .ok_or_else(DomainError::not_found)
    }

    fn list(&self) -> DomainResult<Vec<Group>> {
        let groups = self
            .groups
            .read()
            .map_err(|_| DomainError::conflict("roster lock poisoned"))?;
        let mut all: Vec<_> = groups.values().cloned().collect();
        all.sort_by_key(|g| g.id());
        Ok(all)
    }
}
