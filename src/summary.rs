use std::collections::BTreeMap;

use crate::models::{GroupSummary, MemberSnapshot, MetricStats};

/// Members whose group label matches, in input order. `None` keeps everyone.
pub fn members_in_group<'a>(
    members: &'a [MemberSnapshot],
    group: Option<&str>,
) -> Vec<&'a MemberSnapshot> {
    members
        .iter()
        .filter(|snapshot| group.map_or(true, |label| snapshot.member.group == label))
        .collect()
}

impl GroupSummary {
    /// Per-metric average, max and min over every numeric value in the group.
    ///
    /// Text metrics never appear in the result. Top and bottom performers are
    /// the first members, in input order, that reach the max or min.
    pub fn calculate(members: &[&MemberSnapshot]) -> GroupSummary {
        let mut summary = GroupSummary {
            total_members: members.len(),
            metrics: BTreeMap::new(),
        };

        let mut keys: Vec<&str> = Vec::new();
        for snapshot in members {
            for key in snapshot.metrics.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        for key in keys {
            let values: Vec<(&str, f64)> = members
                .iter()
                .filter_map(|snapshot| {
                    snapshot
                        .metrics
                        .numeric(key)
                        .map(|value| (snapshot.name(), value))
                })
                .collect();

            if values.is_empty() {
                continue;
            }

            let total: f64 = values.iter().map(|(_, value)| value).sum();
            let max = values
                .iter()
                .map(|(_, value)| *value)
                .fold(f64::NEG_INFINITY, f64::max);
            let min = values
                .iter()
                .map(|(_, value)| *value)
                .fold(f64::INFINITY, f64::min);

            let top_performer = values
                .iter()
                .find(|(_, value)| *value >= max)
                .map(|(name, _)| name.to_string())
                .unwrap_or_default();
            let bottom_performer = values
                .iter()
                .find(|(_, value)| *value <= min)
                .map(|(name, _)| name.to_string())
                .unwrap_or_default();

            summary.metrics.insert(
                key.to_string(),
                MetricStats {
                    average: total / values.len() as f64,
                    max,
                    min,
                    top_performer,
                    bottom_performer,
                    sample_count: values.len(),
                },
            );
        }

        summary
    }

    pub fn averages(&self) -> BTreeMap<String, f64> {
        self.metrics
            .iter()
            .map(|(key, stats)| (key.clone(), stats.average))
            .collect()
    }
}

pub fn group_best(group: &[&MemberSnapshot], key: &str) -> Option<f64> {
    group
        .iter()
        .filter_map(|snapshot| snapshot.metrics.numeric(key))
        .reduce(f64::max)
}

pub fn group_worst(group: &[&MemberSnapshot], key: &str) -> Option<f64> {
    group
        .iter()
        .filter_map(|snapshot| snapshot.metrics.numeric(key))
        .reduce(f64::min)
}

pub fn is_best_in_metric(member: &MemberSnapshot, group: &[&MemberSnapshot], key: &str) -> bool {
    match (member.metrics.numeric(key), group_best(group, key)) {
        (Some(value), Some(best)) => value >= best,
        _ => false,
    }
}

pub fn is_worst_in_metric(member: &MemberSnapshot, group: &[&MemberSnapshot], key: &str) -> bool {
    match (member.metrics.numeric(key), group_worst(group, key)) {
        (Some(value), Some(worst)) => value <= worst,
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Member, MetricSnapshot};
    use uuid::Uuid;

    pub(crate) fn snapshot(name: &str, group: &str, metrics: &[(&str, &str)]) -> MemberSnapshot {
        MemberSnapshot {
            member: Member {
                id: Uuid::new_v4(),
                name: name.to_string(),
                group: group.to_string(),
                role: None,
                avatar_url: None,
                total_experience: 0.0,
            },
            metrics: metrics.iter().copied().collect::<MetricSnapshot>(),
        }
    }

    #[test]
    fn summarizes_average_max_and_min() {
        let members = vec![
            snapshot("Avery", "Computers", &[("Revenue", "$100")]),
            snapshot("Jules", "Computers", &[("Revenue", "$200")]),
            snapshot("Kiara", "Computers", &[("Revenue", "$300")]),
        ];
        let group = members_in_group(&members, None);
        let summary = GroupSummary::calculate(&group);

        let revenue = &summary.metrics["Revenue"];
        assert!((revenue.average - 200.0).abs() < 0.001);
        assert_eq!(revenue.max, 300.0);
        assert_eq!(revenue.min, 100.0);
        assert_eq!(revenue.top_performer, "Kiara");
        assert_eq!(revenue.bottom_performer, "Avery");
        assert_eq!(summary.total_members, 3);
    }

    #[test]
    fn empty_group_yields_empty_summary() {
        let summary = GroupSummary::calculate(&[]);
        assert!(summary.metrics.is_empty());
        assert_eq!(summary.total_members, 0);
    }

    #[test]
    fn text_metrics_are_excluded() {
        let members = vec![
            snapshot("Avery", "Computers", &[("MVP", "Jules"), ("GSP", "40%")]),
            snapshot("Jules", "Computers", &[("MVP", "Avery")]),
        ];
        let group = members_in_group(&members, None);
        let summary = GroupSummary::calculate(&group);
        assert!(!summary.metrics.contains_key("MVP"));
        assert_eq!(summary.metrics["GSP"].sample_count, 1);
    }

    #[test]
    fn ties_go_to_first_member_in_input_order() {
        let members = vec![
            snapshot("Avery", "Computers", &[("Basket", "2.0")]),
            snapshot("Jules", "Computers", &[("Basket", "3.0")]),
            snapshot("Kiara", "Computers", &[("Basket", "3.0")]),
            snapshot("Drew", "Computers", &[("Basket", "2.0")]),
        ];
        let group = members_in_group(&members, None);
        let summary = GroupSummary::calculate(&group);
        assert_eq!(summary.metrics["Basket"].top_performer, "Jules");
        assert_eq!(summary.metrics["Basket"].bottom_performer, "Avery");
    }

    #[test]
    fn members_lacking_a_metric_never_become_performers() {
        let members = vec![
            snapshot("Avery", "Computers", &[]),
            snapshot("Jules", "Computers", &[("Revenue", "$50")]),
        ];
        let group = members_in_group(&members, None);
        let summary = GroupSummary::calculate(&group);
        assert_eq!(summary.metrics["Revenue"].bottom_performer, "Jules");
    }

    #[test]
    fn group_scope_filters_members() {
        let members = vec![
            snapshot("Avery", "Computers", &[("Revenue", "$100")]),
            snapshot("Jules", "Appliances", &[("Revenue", "$900")]),
        ];
        let group = members_in_group(&members, Some("Computers"));
        let summary = GroupSummary::calculate(&group);
        assert_eq!(summary.metrics["Revenue"].max, 100.0);
        assert_eq!(summary.total_members, 1);
    }

    #[test]
    fn best_and_worst_predicates() {
        let members = vec![
            snapshot("Avery", "Computers", &[("Picks", "10")]),
            snapshot("Jules", "Computers", &[("Picks", "20")]),
            snapshot("Kiara", "Computers", &[("Picks", "30")]),
            snapshot("Drew", "Computers", &[("GSP", "50%")]),
        ];
        let group = members_in_group(&members, None);

        assert!(is_best_in_metric(&members[2], &group, "Picks"));
        assert!(is_worst_in_metric(&members[0], &group, "Picks"));
        assert!(!is_best_in_metric(&members[1], &group, "Picks"));
        assert!(!is_worst_in_metric(&members[1], &group, "Picks"));
        assert!(!is_best_in_metric(&members[3], &group, "Picks"));
        assert!(!is_worst_in_metric(&members[3], &group, "Picks"));
        assert!(!is_best_in_metric(&members[0], &[], "Picks"));
        assert!(!is_best_in_metric(&members[0], &group, "Revenue"));
    }

    #[test]
    fn calculation_is_repeatable() {
        let members = vec![
            snapshot("Avery", "Computers", &[("Revenue", "$100"), ("GSP", "12%")]),
            snapshot("Jules", "Computers", &[("Revenue", "$300")]),
        ];
        let group = members_in_group(&members, None);
        assert_eq!(GroupSummary::calculate(&group), GroupSummary::calculate(&group));
    }
}
