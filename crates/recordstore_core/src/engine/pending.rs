//! Pending change set held by a scope.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::record::RecordId;
use crate::model::value::FieldMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RecordKey {
    pub entity: String,
    pub id: RecordId,
}

impl RecordKey {
    pub fn new(entity: &str, id: RecordId) -> Self {
        Self {
            entity: entity.to_string(),
            id,
        }
    }
}

/// Writes and deletions not yet saved.
///
/// A key is never both written and deleted.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingChanges {
    writes: BTreeMap<RecordKey, FieldMap>,
    deletes: BTreeSet<RecordKey>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    pub fn write(&mut self, key: RecordKey, fields: FieldMap) {
        self.deletes.remove(&key);
        self.writes.insert(key, fields);
    }

    pub fn delete(&mut self, key: RecordKey) {
        self.writes.remove(&key);
        self.deletes.insert(key);
    }

    /// Moves every change of `child` into `self`; `child` wins on conflicts.
    pub fn absorb(&mut self, child: PendingChanges) {
        for key in child.deletes {
            self.delete(key);
        }
        for (key, fields) in child.writes {
            self.write(key, fields);
        }
    }

    pub fn writes(&self) -> impl Iterator<Item = (&RecordKey, &FieldMap)> {
        self.writes.iter()
    }

    pub fn deletes(&self) -> impl Iterator<Item = &RecordKey> {
        self.deletes.iter()
    }

    /// Applies the changes for `entity` onto a materialized row set.
    pub fn overlay(&self, entity: &str, rows: &mut BTreeMap<RecordId, FieldMap>) {
        for key in self.deletes.iter().filter(|key| key.entity == entity) {
            rows.remove(&key.id);
        }
        for (key, fields) in self.writes.iter().filter(|(key, _)| key.entity == entity) {
            rows.insert(key.id, fields.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PendingChanges, RecordKey};
    use crate::model::record::RecordId;
    use crate::model::value::{FieldMap, Value};
    use std::collections::BTreeMap;

    fn fields(title: &str) -> FieldMap {
        FieldMap::from([("title".to_string(), Value::from(title))])
    }

    #[test]
    fn delete_cancels_pending_write() {
        let id = RecordId::new();
        let mut changes = PendingChanges::default();
        changes.write(RecordKey::new("Task", id), fields("a"));
        changes.delete(RecordKey::new("Task", id));

        assert_eq!(changes.writes().count(), 0);
        assert_eq!(changes.deletes().count(), 1);
        assert!(!changes.is_empty());
    }

    #[test]
    fn absorb_lets_child_win_and_overlay_applies_entity_only() {
        let kept = RecordId::new();
        let removed = RecordId::new();
        let other_entity = RecordId::new();

        let mut parent = PendingChanges::default();
        parent.write(RecordKey::new("Task", kept), fields("old"));
        parent.write(RecordKey::new("Task", removed), fields("gone"));

        let mut child = PendingChanges::default();
        child.write(RecordKey::new("Task", kept), fields("new"));
        child.delete(RecordKey::new("Task", removed));
        child.write(RecordKey::new("Tag", other_entity), fields("tag"));
        parent.absorb(child);

        let mut rows = BTreeMap::new();
        rows.insert(removed, fields("persisted"));
        parent.overlay("Task", &mut rows);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows.get(&kept), Some(&fields("new")));
    }
}
