//! Character persistence.
//!
//! The server never owns storage. It loads a [`CharacterRecord`] when a
//! character is selected, saves it on logout and deletes single relations
//! of characters that are not online. Every call may fail; callers log the
//! failure and carry on.

use dashmap::DashMap;
use realmforge_protocol::VisualId;
use realmforge_session::CharacterRecord;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("character {0} not found")]
    NotFound(VisualId),

    #[error("relation {0} not found")]
    RelationNotFound(Uuid),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Loads and saves characters.
///
/// Calls are synchronous and expected to fail fast.
pub trait CharacterStore: Send + Sync + 'static {
    fn load(&self, id: VisualId) -> Result<CharacterRecord, PersistenceError>;

    fn save(&self, record: &CharacterRecord) -> Result<(), PersistenceError>;

    /// Deletes one relation, whichever character holds it.
    fn delete_relation(&self, relation_id: Uuid) -> Result<(), PersistenceError>;
}

/// A store that keeps records in memory. Used by the demo server and tests.
#[derive(Debug, Default)]
pub struct InMemoryCharacterStore {
    records: DashMap<VisualId, CharacterRecord>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CharacterRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: CharacterRecord) -> Option<CharacterRecord> {
        self.records.insert(record.id, record)
    }

    pub fn get(&self, id: VisualId) -> Option<CharacterRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CharacterStore for InMemoryCharacterStore {
    fn load(&self, id: VisualId) -> Result<CharacterRecord, PersistenceError> {
        self.get(id).ok_or(PersistenceError::NotFound(id))
    }

    fn save(&self, record: &CharacterRecord) -> Result<(), PersistenceError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn delete_relation(&self, relation_id: Uuid) -> Result<(), PersistenceError> {
        for mut entry in self.records.iter_mut() {
            let relations = &mut entry.value_mut().relations;
            let before = relations.len();
            relations.retain(|r| r.id != relation_id);
            if relations.len() != before {
                return Ok(());
            }
        }
        Err(PersistenceError::RelationNotFound(relation_id))
    }
}
