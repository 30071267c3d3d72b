//! Capacity-bounded label repository.

use std::collections::HashMap;

use crate::core::errors::{StoreError, StoreResult};
use crate::model::label::Label;

const PREDEFINED: [(&str, &str); 5] = [
    ("0", "New customer"),
    ("1", "New order"),
    ("2", "Pending payment"),
    ("3", "Paid"),
    ("4", "Order completed"),
];

/// The built-in labels every account has.
#[must_use]
pub fn predefined_labels() -> Vec<Label> {
    PREDEFINED
        .iter()
        .zip(0_i32..)
        .map(|((id, name), color)| Label {
            id: (*id).to_string(),
            name: (*name).to_string(),
            color,
            predefined_id: Some((*id).to_string()),
            deleted: false,
        })
        .collect()
}

/// What a label edit did to the repository.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LabelEditOutcome {
    /// Label inserted or replaced.
    Upserted,
    /// Label removed.
    Deleted,
    /// Edit had no effect.
    Ignored,
}

/// Labels keyed by id; predefined entries are always present.
#[derive(Clone, Debug)]
pub struct LabelRepository {
    labels: HashMap<String, Label>,
    capacity: usize,
}

impl LabelRepository {
    /// Repository seeded with the predefined labels.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let labels = predefined_labels()
            .into_iter()
            .map(|label| (label.id.clone(), label))
            .collect();
        Self { labels, capacity }
    }

    /// Cap on live user labels.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live user-defined labels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.labels.values().filter(|l| !l.is_predefined()).count()
    }

    /// Look up a label.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Label> {
        self.labels.get(id)
    }

    /// All labels, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.labels.values().cloned().collect();
        labels.sort_by(|a, b| a.id.cmp(&b.id));
        labels
    }

    fn is_predefined_id(&self, id: &str) -> bool {
        self.labels.get(id).is_some_and(Label::is_predefined)
    }

    /// Insert or replace a label.
    ///
    /// Edits to known ids and to predefined labels always succeed; a new
    /// user label is refused once the cap is reached.
    ///
    /// # Errors
    /// Returns `LabelCapacityExceeded` when the cap would be exceeded.
    pub fn upsert_by_id(&mut self, mut label: Label) -> StoreResult<()> {
        if self.is_predefined_id(&label.id) && label.predefined_id.is_none() {
            label.predefined_id = Some(label.id.clone());
        }

        let is_new_user_label = !label.is_predefined() && !self.labels.contains_key(&label.id);
        if is_new_user_label && self.count() >= self.capacity {
            return Err(StoreError::LabelCapacityExceeded {
                limit: self.capacity,
            });
        }

        self.labels.insert(label.id.clone(), label);
        Ok(())
    }

    /// Remove a user label; predefined labels stay.
    ///
    /// Returns `true` if a label was removed.
    pub fn delete_by_id(&mut self, id: &str) -> bool {
        if self.is_predefined_id(id) {
            return false;
        }
        self.labels.remove(id).is_some()
    }

    /// Apply a label edit event.
    ///
    /// # Errors
    /// Returns `LabelCapacityExceeded` when the edit would add a label past the cap.
    pub fn apply_edit(&mut self, label: Label) -> StoreResult<LabelEditOutcome> {
        if label.deleted {
            return Ok(if self.delete_by_id(&label.id) {
                LabelEditOutcome::Deleted
            } else {
                LabelEditOutcome::Ignored
            });
        }
        self.upsert_by_id(label)?;
        Ok(LabelEditOutcome::Upserted)
    }
}
