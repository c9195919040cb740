use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::{Category, EntryId, MaintenanceEvent};

/// Insertion-ordered log of recorded oil changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaintenanceLedger {
    events: Vec<MaintenanceEvent>,
}

impl MaintenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<MaintenanceEvent>) -> Self {
        Self { events }
    }

    #[tracing::instrument(skip(self, event), fields(id = %event.id, category = %event.category))]
    pub fn append(&mut self, event: MaintenanceEvent) -> Result<(), ValidationError> {
        if self.find(&event.id).is_some() {
            return Err(ValidationError::DuplicateId(event.id.to_string()));
        }
        self.events.push(event);
        Ok(())
    }

    /// Removing an id that is not present is a no-op.
    #[tracing::instrument(skip(self, id), fields(id = %id))]
    pub fn remove(&mut self, id: &EntryId) -> Option<MaintenanceEvent> {
        let idx = self.events.iter().position(|e| &e.id == id)?;
        Some(self.events.remove(idx))
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Event of `category` with the greatest `performed_on`. Ties resolve to
    /// whichever was recorded last.
    pub fn latest(&self, category: Category) -> Option<&MaintenanceEvent> {
        self.events
            .iter()
            .filter(|e| e.category == category)
            .max_by_key(|e| e.performed_on)
    }

    pub fn find(&self, id: &EntryId) -> Option<&MaintenanceEvent> {
        self.events.iter().find(|e| &e.id == id)
    }

    /// Looks an entry up by a unique prefix of its id. An exact match wins
    /// over prefix matches.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Option<&MaintenanceEvent>, ValidationError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(None);
        }
        if let Some(exact) = self.events.iter().find(|e| e.id.as_str() == prefix) {
            return Ok(Some(exact));
        }

        let mut matches = self.events.iter().filter(|e| e.id.as_str().starts_with(prefix));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(ValidationError::AmbiguousId(prefix.to_string()));
        }
        Ok(first)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaintenanceEvent> {
        self.events.iter()
    }

    /// Most recent oil change first; entries sharing a date keep
    /// reverse-insertion order.
    pub fn newest_first(&self) -> Vec<&MaintenanceEvent> {
        let mut rows: Vec<&MaintenanceEvent> = self.events.iter().rev().collect();
        rows.sort_by(|a, b| b.performed_on.cmp(&a.performed_on));
        rows
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[MaintenanceEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(id: &str, category: Category, date: NaiveDate) -> MaintenanceEvent {
        MaintenanceEvent {
            id: EntryId::from(id),
            category,
            performed_on: date,
            note: String::new(),
        }
    }

    #[test]
    fn latest_picks_max_date_per_category() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(event("a", Category::Engine, ymd(2024, 3, 1)))
            .expect("append");
        ledger
            .append(event("b", Category::Engine, ymd(2024, 1, 1)))
            .expect("append");
        ledger
            .append(event("c", Category::Differential, ymd(2024, 2, 1)))
            .expect("append");

        let engine = ledger.latest(Category::Engine).expect("engine entry");
        assert_eq!(engine.performed_on, ymd(2024, 3, 1));
        let diff = ledger.latest(Category::Differential).expect("diff entry");
        assert_eq!(diff.id, EntryId::from("c"));
    }

    #[test]
    fn duplicate_id_is_rejected_without_mutation() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(event("a", Category::Engine, ymd(2024, 3, 1)))
            .expect("append");
        let err = ledger
            .append(event("a", Category::Differential, ymd(2024, 4, 1)))
            .expect_err("duplicate");
        assert_eq!(err, ValidationError::DuplicateId("a".into()));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.latest(Category::Differential).is_none());
    }

    #[test]
    fn remove_missing_id_is_noop() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(event("a", Category::Engine, ymd(2024, 3, 1)))
            .expect("append");
        let before = ledger.clone();
        assert!(ledger.remove(&EntryId::from("zzz")).is_none());
        assert_eq!(ledger, before);
    }

    #[test]
    fn clear_forgets_every_category() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(event("a", Category::Engine, ymd(2024, 3, 1)))
            .expect("append");
        ledger
            .append(event("b", Category::Differential, ymd(2024, 3, 2)))
            .expect("append");
        ledger.clear();
        for category in Category::ALL {
            assert!(ledger.latest(category).is_none());
        }
    }

    #[test]
    fn prefix_lookup_detects_ambiguity() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(event("abc123", Category::Engine, ymd(2024, 3, 1)))
            .expect("append");
        ledger
            .append(event("abd456", Category::Engine, ymd(2024, 3, 2)))
            .expect("append");

        assert_eq!(
            ledger.resolve_prefix("abc").expect("unique").map(|e| e.id.as_str()),
            Some("abc123")
        );
        assert_eq!(
            ledger.resolve_prefix("ab"),
            Err(ValidationError::AmbiguousId("ab".into()))
        );
        assert_eq!(ledger.resolve_prefix("x"), Ok(None));
    }

    #[test]
    fn newest_first_orders_by_date_then_recency() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(event("old", Category::Engine, ymd(2024, 1, 1)))
            .expect("append");
        ledger
            .append(event("same-1", Category::Engine, ymd(2024, 2, 1)))
            .expect("append");
        ledger
            .append(event("same-2", Category::Differential, ymd(2024, 2, 1)))
            .expect("append");

        let ids: Vec<&str> = ledger.newest_first().into_iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["same-2", "same-1", "old"]);
    }
}
