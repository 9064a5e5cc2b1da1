//! # Person Directory
//!
//! Boundary to the external people lookup. The core only needs to turn a
//! `PersonId` into a display name and role; where that data comes from is
//! the caller's concern.

use crate::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    pub name: String,
    pub role: String,
}

impl PersonRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: PersonId::new(id),
            name: name.into(),
            role: role.into(),
        }
    }
}

/// Lookup of people by id.
///
/// Implementations must not fail: an unknown id is `None`.
pub trait PersonDirectory: Send + Sync {
    /// Resolve a person, or `None` if the id is unknown.
    fn resolve_person(&self, id: &PersonId) -> Option<PersonRecord>;
}

/// Directory backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    people: BTreeMap<PersonId, PersonRecord>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory from records. Later duplicates win.
    #[must_use]
    pub fn with_people(people: impl IntoIterator<Item = PersonRecord>) -> Self {
        let mut directory = Self::new();
        for person in people {
            directory.insert(person);
        }
        directory
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, person: PersonRecord) {
        self.people.insert(person.id.clone(), person);
    }

    /// Number of known people.
    #[must_use]
    pub fn len(&self) -> usize {
        self.people.len()
    }

    /// Check if the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Iterate records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &PersonRecord> {
        self.people.values()
    }
}

impl PersonDirectory for InMemoryDirectory {
    fn resolve_person(&self, id: &PersonId) -> Option<PersonRecord> {
        self.people.get(id).cloned()
    }
}
