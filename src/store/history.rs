use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OverrideMap, PositionOverride};
use crate::ir::PersonId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
}

/// Append-only audit record of one change to the shared override map.
///
/// For `deleted` entries `x`/`y` hold the last saved position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionHistoryEntry {
    pub id: u64,
    pub person_id: PersonId,
    pub x: f32,
    pub y: f32,
    pub action: HistoryAction,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Filter for history listings. Results are always most recent first.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub person: Option<PersonId>,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn for_person(person: PersonId) -> Self {
        Self {
            person: Some(person),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies the filter to a log kept in append order.
    pub fn select(&self, log: &[PositionHistoryEntry]) -> Vec<PositionHistoryEntry> {
        let matching = log
            .iter()
            .rev()
            .filter(|entry| self.person.as_ref().is_none_or(|p| &entry.person_id == p))
            .cloned();
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

/// One pending change between two copies of the override map.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionChange {
    pub person_id: PersonId,
    pub position: PositionOverride,
    pub action: HistoryAction,
}

/// Compares the previous shared copy against the incoming one. Keys are
/// visited in id order, so changes come out deterministically.
pub fn diff_overrides(previous: &OverrideMap, next: &OverrideMap) -> Vec<PositionChange> {
    let mut changes = Vec::new();
    for (id, position) in next {
        let action = match previous.get(id) {
            None => HistoryAction::Created,
            Some(old) if old != position => HistoryAction::Updated,
            Some(_) => continue,
        };
        changes.push(PositionChange {
            person_id: id.clone(),
            position: *position,
            action,
        });
    }
    for (id, position) in previous {
        if !next.contains_key(id) {
            changes.push(PositionChange {
                person_id: id.clone(),
                position: *position,
                action: HistoryAction::Deleted,
            });
        }
    }
    changes
}

/// Rebuilds the map a log describes by replaying its entries in order.
pub fn replay(log: &[PositionHistoryEntry]) -> OverrideMap {
    let mut positions = OverrideMap::new();
    for entry in log {
        match entry.action {
            HistoryAction::Created | HistoryAction::Updated => {
                positions.insert(entry.person_id.clone(), PositionOverride::new(entry.x, entry.y));
            }
            HistoryAction::Deleted => {
                positions.remove(&entry.person_id);
            }
        }
    }
    positions
}

/// Turns changes into log entries, continuing the id sequence after `last_id`.
pub(super) fn record_changes(
    changes: Vec<PositionChange>,
    last_id: u64,
    updated_by: &str,
    updated_at: DateTime<Utc>,
) -> Vec<PositionHistoryEntry> {
    changes
        .into_iter()
        .zip(last_id + 1..)
        .map(|(change, id)| PositionHistoryEntry {
            id,
            person_id: change.person_id,
            x: change.position.x,
            y: change.position.y,
            action: change.action,
            updated_at,
            updated_by: updated_by.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> PersonId {
        PersonId::new(value).unwrap()
    }

    fn map(entries: &[(&str, f32, f32)]) -> OverrideMap {
        entries
            .iter()
            .map(|(k, x, y)| (id(k), PositionOverride::new(*x, *y)))
            .collect()
    }

    #[test]
    fn diff_reports_created_updated_and_deleted() {
        let before = map(&[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)]);
        let after = map(&[("a", 1.0, 1.0), ("b", 5.0, 2.0), ("d", 4.0, 4.0)]);
        let changes = diff_overrides(&before, &after);
        let summary: Vec<(&str, HistoryAction)> = changes
            .iter()
            .map(|c| (c.person_id.as_str(), c.action))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("b", HistoryAction::Updated),
                ("d", HistoryAction::Created),
                ("c", HistoryAction::Deleted),
            ]
        );
        assert_eq!(changes[2].position, PositionOverride::new(3.0, 3.0));
    }

    #[test]
    fn unchanged_map_has_no_diff() {
        let copy = map(&[("a", 1.0, 1.0)]);
        assert!(diff_overrides(&copy, &copy.clone()).is_empty());
    }

    #[test]
    fn entries_serialize_in_camel_case() {
        let entries = record_changes(
            diff_overrides(&OverrideMap::new(), &map(&[("7", 10.0, 20.0)])),
            41,
            "alice",
            DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["personId"], "7");
        assert_eq!(json["action"], "created");
        assert_eq!(json["updatedBy"], "alice");
        assert_eq!(json["updatedAt"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn query_filters_newest_first() {
        let now = Utc::now();
        let log = record_changes(
            diff_overrides(&OverrideMap::new(), &map(&[("a", 0.0, 0.0), ("b", 0.0, 0.0), ("c", 0.0, 0.0)])),
            0,
            "bob",
            now,
        );
        let ids: Vec<u64> = HistoryQuery::default().with_limit(2).select(&log).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2]);
        let only_a = HistoryQuery::for_person(id("a")).select(&log);
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].person_id, id("a"));
    }

    #[test]
    fn replay_follows_the_log() {
        let first = record_changes(
            diff_overrides(&OverrideMap::new(), &map(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)])),
            0,
            "root",
            Utc::now(),
        );
        let second = record_changes(
            diff_overrides(&map(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]), &map(&[("b", 7.0, 2.0)])),
            2,
            "root",
            Utc::now(),
        );
        let log: Vec<PositionHistoryEntry> = first.into_iter().chain(second).collect();
        assert_eq!(replay(&log), map(&[("b", 7.0, 2.0)]));
        assert!(replay(&[]).is_empty());
    }
}
