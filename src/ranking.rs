use std::collections::BTreeMap;

use serde::Serialize;

use crate::metric::MetricCatalog;
use crate::models::{MemberSnapshot, MetricSnapshot, RankedMember};
use crate::summary::is_best_in_metric;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelativeScore {
    pub metric_key: String,
    pub value: f64,
    pub relative_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChampionTitle {
    pub metric_key: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankBasis {
    Experience,
    Metric(String),
}

/// Member value as a percentage of the group average, per numeric metric.
///
/// A zero or missing average falls back to the raw value.
pub fn relative_scores(
    metrics: &MetricSnapshot,
    averages: &BTreeMap<String, f64>,
) -> Vec<RelativeScore> {
    metrics
        .numeric_values()
        .map(|(key, value)| {
            let relative_score = match averages.get(key) {
                Some(average) if *average != 0.0 => value / average * 100.0,
                _ => value,
            };
            RelativeScore {
                metric_key: key.to_string(),
                value,
                relative_score,
            }
        })
        .collect()
}

/// The metric where the member stands furthest above the group average.
pub fn strongest_relative_metric(
    metrics: &MetricSnapshot,
    averages: &BTreeMap<String, f64>,
) -> Option<RelativeScore> {
    if averages.is_empty() {
        return None;
    }

    relative_scores(metrics, averages)
        .into_iter()
        .fold(None, |best: Option<RelativeScore>, candidate| match best {
            Some(current) if current.relative_score >= candidate.relative_score => Some(current),
            _ => Some(candidate),
        })
}

/// Resolves the member's display title from the titled metrics they lead.
///
/// Among the titled metrics where the member matches the group best, the one
/// with the highest raw value wins; equal values keep the member's own metric
/// order. Without any such metric the catalog fallback title is used.
pub fn champion_title(
    member: &MemberSnapshot,
    group: &[&MemberSnapshot],
    catalog: &MetricCatalog,
) -> ChampionTitle {
    let mut chosen: Option<(&str, f64)> = None;

    for (key, value) in member.metrics.numeric_values() {
        if !catalog.is_titled(key) || !is_best_in_metric(member, group, key) {
            continue;
        }
        if chosen.map_or(true, |(_, current)| value > current) {
            chosen = Some((key, value));
        }
    }

    match chosen.and_then(|(key, _)| catalog.title(key).map(|title| (key, title))) {
        Some((key, title)) => ChampionTitle {
            metric_key: Some(key.to_string()),
            title: title.to_string(),
        },
        None => ChampionTitle {
            metric_key: None,
            title: catalog.fallback_title.clone(),
        },
    }
}

/// Orders members by descending score and assigns ranks 1..n.
///
/// The sort is stable so tied members keep their input order. When ranking by
/// a metric, members without a numeric value for it are left out.
pub fn rank_members(members: &[&MemberSnapshot], basis: &RankBasis) -> Vec<RankedMember> {
    let mut scored: Vec<(&MemberSnapshot, f64)> = members
        .iter()
        .filter_map(|snapshot| {
            let score = match basis {
                RankBasis::Experience => Some(snapshot.member.total_experience),
                RankBasis::Metric(key) => snapshot.metrics.numeric(key),
            };
            score.map(|score| (*snapshot, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (snapshot, score))| RankedMember {
            id: snapshot.member.id,
            name: snapshot.member.name.clone(),
            group: snapshot.member.group.clone(),
            score,
            rank: index + 1,
        })
        .collect()
}
