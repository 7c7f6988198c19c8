use std::fmt::Write;

use serde::Serialize;

use crate::metric::MetricCatalog;
use crate::models::{ExperienceLevel, GroupSummary, MemberSnapshot, RankedMember};
use crate::ranking::{self, ChampionTitle, RankBasis, RelativeScore};
use crate::summary::{is_best_in_metric, is_worst_in_metric};

/// Everything the scoreboard shows on one member's card.
#[derive(Debug, Clone, Serialize)]
pub struct MemberCard {
    pub name: String,
    pub role: Option<String>,
    pub title: ChampionTitle,
    pub strongest: Option<RelativeScore>,
    pub level: ExperienceLevel,
    pub best_in: Vec<String>,
    pub worst_in: Vec<String>,
}

pub fn member_card(
    member: &MemberSnapshot,
    group: &[&MemberSnapshot],
    summary: &GroupSummary,
    catalog: &MetricCatalog,
) -> MemberCard {
    let keys: Vec<&str> = member.metrics.numeric_values().map(|(key, _)| key).collect();

    MemberCard {
        name: member.member.name.clone(),
        role: member.member.role.clone(),
        title: ranking::champion_title(member, group, catalog),
        strongest: ranking::strongest_relative_metric(&member.metrics, &summary.averages()),
        level: ExperienceLevel::from_total(member.member.total_experience),
        best_in: keys
            .iter()
            .filter(|key| is_best_in_metric(member, group, key))
            .map(|key| key.to_string())
            .collect(),
        worst_in: keys
            .iter()
            .filter(|key| is_worst_in_metric(member, group, key))
            .map(|key| key.to_string())
            .collect(),
    }
}

/// Serialized into pod snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct GroupBoard {
    pub group: String,
    pub period: String,
    pub summary: GroupSummary,
    pub leaderboard: Vec<RankedMember>,
    pub cards: Vec<MemberCard>,
}

pub fn build_board(
    group: &str,
    period: &str,
    members: &[&MemberSnapshot],
    catalog: &MetricCatalog,
) -> GroupBoard {
    let summary = GroupSummary::calculate(members);
    let leaderboard = ranking::rank_members(members, &RankBasis::Experience);
    let cards = members
        .iter()
        .map(|member| member_card(member, members, &summary, catalog))
        .collect();

    GroupBoard {
        group: group.to_string(),
        period: period.to_string(),
        summary,
        leaderboard,
        cards,
    }
}

pub fn format_card(card: &MemberCard, catalog: &MetricCatalog) -> String {
    let strongest = card
        .strongest
        .as_ref()
        .map(|score| {
            format!(
                "{} ({:.0}% of team average)",
                catalog.display_name(&score.metric_key),
                score.relative_score
            )
        })
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "{} [{}] level {} ({:.0}% to next), strongest: {}",
        card.name, card.title.title, card.level.level, card.level.progress_percent, strongest
    )
}

pub fn build_report(board: &GroupBoard, catalog: &MetricCatalog) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Team Scoreboard Report");
    let _ = writeln!(
        output,
        "Generated for {} (period {}, {} members)",
        board.group, board.period, board.summary.total_members
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Metrics");

    if board.summary.metrics.is_empty() {
        let _ = writeln!(output, "No numeric metrics recorded for this period.");
    } else {
        let _ = writeln!(output, "| Metric | Average | Best | Lowest |");
        let _ = writeln!(output, "|---|---|---|---|");
        for (key, stats) in board.summary.metrics.iter() {
            let _ = writeln!(
                output,
                "| {} | {:.2} | {:.2} ({}) | {:.2} ({}) |",
                catalog.display_name(key),
                stats.average,
                stats.max,
                stats.top_performer,
                stats.min,
                stats.bottom_performer
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Experience Leaderboard");

    if board.leaderboard.is_empty() {
        let _ = writeln!(output, "No members in this group.");
    } else {
        for entry in board.leaderboard.iter() {
            let level = ExperienceLevel::from_total(entry.score);
            let _ = writeln!(
                output,
                "{}. {} ({:.1} xp, level {})",
                entry.rank, entry.name, entry.score, level.level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Member Cards");

    if board.cards.is_empty() {
        let _ = writeln!(output, "No members in this group.");
    } else {
        for card in board.cards.iter() {
            let _ = writeln!(output, "- {}", format_card(card, catalog));
        }
    }

    output
}
