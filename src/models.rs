use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metric::parse_metric_value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub group: String,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
    pub total_experience: f64,
}

/// Requested edits to a member's identity; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub group: Option<String>,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
    pub clear_role: bool,
    pub clear_avatar: bool,
}

impl MemberUpdate {
    pub fn is_empty(&self) -> bool {
        *self == MemberUpdate::default()
    }

    pub fn apply(&self, member: &Member) -> Member {
        let pick = |value: &Option<String>, clear: bool, current: &Option<String>| {
            if clear {
                None
            } else {
                value.clone().or_else(|| current.clone())
            }
        };

        Member {
            name: self.name.clone().unwrap_or_else(|| member.name.clone()),
            group: self.group.clone().unwrap_or_else(|| member.group.clone()),
            role: pick(&self.role, self.clear_role, &member.role),
            avatar_url: pick(&self.avatar_url, self.clear_avatar, &member.avatar_url),
            ..member.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub member_id: Uuid,
    pub period: String,
    pub metric_key: String,
    pub value: Option<String>,
}

/// One member's sparse metric values for a single period, kept in insertion
/// order so that tie-breaks over a member's own metrics are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSnapshot {
    entries: Vec<(String, Option<String>)>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a raw value. Re-inserting an existing key replaces its value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn numeric(&self, key: &str) -> Option<f64> {
        self.raw(key).and_then(parse_metric_value)
    }

    pub fn numeric_values(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().filter_map(|(key, value)| {
            value
                .as_deref()
                .and_then(parse_metric_value)
                .map(|number| (key.as_str(), number))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetricSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = MetricSnapshot::new();
        for (key, value) in iter {
            snapshot.insert(key, Some(value.into()));
        }
        snapshot
    }
}

/// A member together with its metric snapshot for the period under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSnapshot {
    pub member: Member,
    pub metrics: MetricSnapshot,
}

impl MemberSnapshot {
    /// Builds the snapshot from every record belonging to this member and period,
    /// ignoring the rest.
    pub fn for_period(member: Member, records: &[MetricRecord], period: &str) -> Self {
        let mut metrics = MetricSnapshot::new();
        for record in records
            .iter()
            .filter(|record| record.member_id == member.id && record.period == period)
        {
            metrics.insert(record.metric_key.clone(), record.value.clone());
        }
        Self { member, metrics }
    }

    pub fn name(&self) -> &str {
        &self.member.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub top_performer: String,
    pub bottom_performer: String,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub total_members: usize,
    pub metrics: BTreeMap<String, MetricStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMember {
    pub id: Uuid,
    pub name: String,
    pub group: String,
    pub score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperienceLevel {
    pub level: u32,
    pub progress: f64,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedPeriod {
    pub id: i64,
    pub group: String,
    pub period: String,
    pub archived_at: DateTime<Utc>,
    pub archived_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub id: i64,
    pub pod_name: String,
    pub snapshot_date: DateTime<Utc>,
    pub label: Option<String>,
    pub json_data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> Member {
        Member {
            id: Uuid::new_v4(),
            name: name.to_string(),
            group: "Computers".to_string(),
            role: None,
            avatar_url: None,
            total_experience: 0.0,
        }
    }

    #[test]
    fn member_update_overlays_only_given_fields() {
        let mut current = member("Avery");
        current.role = Some("Apple Pro".to_string());
        current.avatar_url = Some("images/avatars/avery.png".to_string());
        current.total_experience = 320.0;

        let update = MemberUpdate {
            name: Some("Avery Lee".to_string()),
            group: Some("Appliances".to_string()),
            clear_avatar: true,
            ..MemberUpdate::default()
        };
        let updated = update.apply(&current);

        assert_eq!(updated.id, current.id);
        assert_eq!(updated.name, "Avery Lee");
        assert_eq!(updated.group, "Appliances");
        assert_eq!(updated.role.as_deref(), Some("Apple Pro"));
        assert_eq!(updated.avatar_url, None);
        assert_eq!(updated.total_experience, 320.0);
        assert!(!update.is_empty());
        assert!(MemberUpdate::default().is_empty());
    }

    #[test]
    fn snapshot_keeps_insertion_order_and_replaces_in_place() {
        let mut snapshot = MetricSnapshot::new();
        snapshot.insert("Revenue", Some("$100".to_string()));
        snapshot.insert("GSP", Some("40%".to_string()));
        snapshot.insert("Revenue", Some("$250".to_string()));

        let keys: Vec<&str> = snapshot.keys().collect();
        assert_eq!(keys, vec!["Revenue", "GSP"]);
        assert_eq!(snapshot.numeric("Revenue"), Some(250.0));
    }

    #[test]
    fn numeric_values_skip_text_and_missing_values() {
        let mut snapshot: MetricSnapshot =
            [("Revenue", "$1,000"), ("MVP", "Drew")].into_iter().collect();
        snapshot.insert("Basket", None);

        let values: Vec<(&str, f64)> = snapshot.numeric_values().collect();
        assert_eq!(values, vec![("Revenue", 1000.0)]);
        assert_eq!(snapshot.raw("MVP"), Some("Drew"));
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn for_period_filters_by_member_and_period() {
        let avery = member("Avery");
        let records = vec![
            MetricRecord {
                member_id: avery.id,
                period: "EOM-Dec 2025".to_string(),
                metric_key: "Revenue".to_string(),
                value: Some("$500".to_string()),
            },
            MetricRecord {
                member_id: avery.id,
                period: "Mid-Jan 2026".to_string(),
                metric_key: "Revenue".to_string(),
                value: Some("$900".to_string()),
            },
            MetricRecord {
                member_id: Uuid::new_v4(),
                period: "EOM-Dec 2025".to_string(),
                metric_key: "Revenue".to_string(),
                value: Some("$700".to_string()),
            },
        ];

        let snapshot = MemberSnapshot::for_period(avery, &records, "EOM-Dec 2025");
        assert_eq!(snapshot.metrics.len(), 1);
        assert_eq!(snapshot.metrics.numeric("Revenue"), Some(500.0));
    }
}
