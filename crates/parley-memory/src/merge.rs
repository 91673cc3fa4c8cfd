//! Memory merge engine.
//!
//! Decides how a suggested value combines with what is already stored for a
//! memory field. Pure functions; callers read and write through the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parley_core::model::{MemoryField, MergePolicy};

/// Field-id fragments that mark a field as a growing list of facts.
const ACCUMULATE_HINTS: &[&str] = &[
    "preferences",
    "likes",
    "dislikes",
    "interests",
    "hobbies",
    "topics",
    "favorites",
    "notes",
];

/// Policy inferred from the field id alone.
pub fn heuristic_policy(field_id: &str) -> MergePolicy {
    let id = field_id.to_ascii_lowercase();
    if ACCUMULATE_HINTS.iter().any(|hint| id.contains(hint))
        || id.chars().any(|c| c.is_ascii_digit())
    {
        MergePolicy::Accumulate
    } else {
        MergePolicy::Replace
    }
}

/// Declared policy wins; undeclared fields fall back to the heuristic.
pub fn resolve_policy(field_id: &str, declared: Option<MergePolicy>) -> MergePolicy {
    declared.unwrap_or_else(|| heuristic_policy(field_id))
}

/// Merge one suggested value. `None` means nothing to write.
pub fn merge_field(
    existing: Option<&MemoryField>,
    suggested: &str,
    policy: MergePolicy,
    now: DateTime<Utc>,
) -> Option<MemoryField> {
    let Some(existing) = existing else {
        return Some(MemoryField {
            value: suggested.to_string(),
            updated_at: now,
            previous_value: None,
        });
    };

    if existing.value == suggested {
        return None;
    }

    match policy {
        MergePolicy::Accumulate => {
            if existing
                .value
                .to_lowercase()
                .contains(&suggested.to_lowercase())
            {
                return None;
            }
            Some(MemoryField {
                value: format!("{}. {}", existing.value, suggested),
                updated_at: now,
                previous_value: Some(existing.value.clone()),
            })
        }
        MergePolicy::Replace => Some(MemoryField {
            value: suggested.to_string(),
            updated_at: now,
            previous_value: Some(existing.value.clone()),
        }),
    }
}

/// Merge a batch of suggestions against the stored map. Returns only the
/// fields that changed. Blank suggestions are ignored.
pub fn merge_suggestions<F>(
    existing: &BTreeMap<String, MemoryField>,
    suggested: &BTreeMap<String, String>,
    declared_policy: F,
    now: DateTime<Utc>,
) -> BTreeMap<String, MemoryField>
where
    F: Fn(&str) -> Option<MergePolicy>,
{
    let mut applied = BTreeMap::new();
    for (field_id, value) in suggested {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let policy = resolve_policy(field_id, declared_policy(field_id));
        if let Some(field) = merge_field(existing.get(field_id), value, policy, now) {
            applied.insert(field_id.clone(), field);
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    fn stored(value: &str) -> MemoryField {
        MemoryField {
            value: value.to_string(),
            updated_at: at(1),
            previous_value: None,
        }
    }

    #[test]
    fn test_heuristic_policy() {
        assert_eq!(heuristic_policy("food_preferences"), MergePolicy::Accumulate);
        assert_eq!(heuristic_policy("Hobbies"), MergePolicy::Accumulate);
        assert_eq!(heuristic_policy("preferences_1"), MergePolicy::Accumulate);
        assert_eq!(heuristic_policy("address2"), MergePolicy::Accumulate);
        assert_eq!(heuristic_policy("role"), MergePolicy::Replace);
        assert_eq!(heuristic_policy("email"), MergePolicy::Replace);
    }

    #[test]
    fn test_declared_policy_overrides_heuristic() {
        assert_eq!(
            resolve_policy("notes", Some(MergePolicy::Replace)),
            MergePolicy::Replace
        );
        assert_eq!(
            resolve_policy("role", Some(MergePolicy::Accumulate)),
            MergePolicy::Accumulate
        );
        assert_eq!(resolve_policy("notes", None), MergePolicy::Accumulate);
    }

    #[test]
    fn test_identical_value_is_noop() {
        let existing = stored("pizza");
        assert!(merge_field(Some(&existing), "pizza", MergePolicy::Replace, at(2)).is_none());
        assert!(merge_field(Some(&existing), "pizza", MergePolicy::Accumulate, at(2)).is_none());
    }

    #[test]
    fn test_accumulate_appends() {
        let existing = stored("Likes pizza");
        let merged =
            merge_field(Some(&existing), "enjoys pasta", MergePolicy::Accumulate, at(2)).unwrap();
        assert_eq!(merged.value, "Likes pizza. enjoys pasta");
        assert_eq!(merged.previous_value.as_deref(), Some("Likes pizza"));
        assert_eq!(merged.updated_at, at(2));
    }

    #[test]
    fn test_accumulate_skips_contained_value() {
        let existing = stored("Likes Pizza. enjoys pasta");
        assert!(merge_field(Some(&existing), "likes pizza", MergePolicy::Accumulate, at(2)).is_none());
    }

    #[test]
    fn test_replace_keeps_previous() {
        let existing = stored("Engineer");
        let merged = merge_field(Some(&existing), "Manager", MergePolicy::Replace, at(2)).unwrap();
        assert_eq!(merged.value, "Manager");
        assert_eq!(merged.previous_value.as_deref(), Some("Engineer"));
    }

    #[test]
    fn test_missing_value_is_created() {
        let created = merge_field(None, "Ana", MergePolicy::Replace, at(2)).unwrap();
        assert_eq!(created.value, "Ana");
        assert!(created.previous_value.is_none());
    }

    #[test]
    fn test_merge_suggestions_returns_only_changes() {
        let mut existing = BTreeMap::new();
        existing.insert("favorite_food".to_string(), stored("pizza"));
        existing.insert("preferences_1".to_string(), stored("Likes pizza"));
        existing.insert("role".to_string(), stored("Engineer"));

        let mut suggested = BTreeMap::new();
        suggested.insert("favorite_food".to_string(), "pizza".to_string());
        suggested.insert("preferences_1".to_string(), "enjoys pasta".to_string());
        suggested.insert("role".to_string(), "Manager".to_string());
        suggested.insert("city".to_string(), "  ".to_string());
        suggested.insert("name".to_string(), "Ana".to_string());

        let applied = merge_suggestions(&existing, &suggested, |_| None, at(3));
        assert_eq!(applied.len(), 3);
        assert!(!applied.contains_key("favorite_food"));
        assert!(!applied.contains_key("city"));
        assert_eq!(applied["preferences_1"].value, "Likes pizza. enjoys pasta");
        assert_eq!(applied["role"].value, "Manager");
        assert_eq!(applied["role"].previous_value.as_deref(), Some("Engineer"));
        assert_eq!(applied["name"].value, "Ana");
    }

    #[test]
    fn test_merge_suggestions_uses_declared_policy() {
        let mut existing = BTreeMap::new();
        existing.insert("role".to_string(), stored("Engineer"));
        let mut suggested = BTreeMap::new();
        suggested.insert("role".to_string(), "Manager".to_string());

        let applied = merge_suggestions(
            &existing,
            &suggested,
            |id| (id == "role").then_some(MergePolicy::Accumulate),
            at(3),
        );
        assert_eq!(applied["role"].value, "Engineer. Manager");
    }
}
