use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod config;
mod db;
mod level;
mod metric;
mod models;
mod period;
mod ranking;
mod report;
mod summary;

use crate::models::{ExperienceLevel, GroupSummary, MemberUpdate, MetricSnapshot};
use crate::ranking::RankBasis;

#[derive(Parser)]
#[command(name = "team-scoreboard")]
#[command(about = "Team performance scoreboard with rankings and champion titles", long_about = None)]
struct Cli {
    /// JSON metric catalog overriding SCOREBOARD_CATALOG
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo team members and metrics
    Seed {
        #[arg(long)]
        admin_key: String,
    },
    /// Delete all members, records, archives and snapshots
    Clear {
        #[arg(long)]
        admin_key: String,
    },
    /// Import metric records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List or edit team members
    Members {
        #[command(subcommand)]
        command: MemberCommands,
    },
    /// List stored metric records
    Records {
        #[arg(long)]
        member: Option<Uuid>,
        #[arg(long)]
        period: Option<String>,
    },
    /// List stored reporting periods, latest first
    Periods {
        #[arg(long)]
        group: Option<String>,
    },
    /// Replace a member's metric values for a period
    Record {
        #[arg(long)]
        member: Uuid,
        #[arg(long)]
        period: String,
        /// KEY=VALUE, repeatable; an empty VALUE stores no value
        #[arg(long = "metric", required = true)]
        metrics: Vec<String>,
    },
    /// Show per-metric team statistics
    Summary {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        period: Option<String>,
    },
    /// Rank members by experience or by one metric
    Leaderboard {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        metric: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show a member's title, strongest metric and level
    Card {
        #[arg(long)]
        member: Uuid,
        #[arg(long)]
        period: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        group: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long, default_value = "scoreboard.md")]
        out: PathBuf,
    },
    /// Mark a group's period as archived
    Archive {
        #[arg(long)]
        group: String,
        #[arg(long)]
        period: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// List archived periods
    Archives {
        #[arg(long)]
        group: Option<String>,
    },
    /// Save and inspect pod snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
}

#[derive(Subcommand)]
enum MemberCommands {
    List {
        #[arg(long)]
        group: Option<String>,
    },
    /// Change a member's name, group, role or avatar
    Update {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long, conflicts_with = "clear_role")]
        role: Option<String>,
        #[arg(long, conflicts_with = "clear_avatar")]
        avatar_url: Option<String>,
        #[arg(long)]
        clear_role: bool,
        #[arg(long)]
        clear_avatar: bool,
    },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// Store the current board of a group
    Save {
        #[arg(long)]
        group: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },
    List {
        #[arg(long)]
        group: Option<String>,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
    Delete {
        #[arg(long)]
        id: i64,
    },
}

fn parse_metric_assignments(assignments: &[String]) -> anyhow::Result<MetricSnapshot> {
    let mut snapshot = MetricSnapshot::new();
    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got {assignment:?}"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("metric key missing in {assignment:?}");
        }
        let value = value.trim();
        snapshot.insert(key, (!value.is_empty()).then(|| value.to_string()));
    }
    Ok(snapshot)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::Settings::from_env()?;
    let catalog = settings.catalog(cli.catalog.as_deref())?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { admin_key } => {
            config::check_admin_key(settings.admin_key.as_deref(), &admin_key)?;
            let seeded = db::seed(&pool).await?;
            println!("Seeded {seeded} team members.");
        }
        Commands::Clear { admin_key } => {
            config::check_admin_key(settings.admin_key.as_deref(), &admin_key)?;
            db::clear(&pool).await?;
            println!("Scoreboard cleared.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} metric records from {}.", csv.display());
        }
        Commands::Members {
            command: MemberCommands::List { group },
        } => {
            let members = db::fetch_members(&pool, group.as_deref()).await?;
            if members.is_empty() {
                println!("No team members found.");
                return Ok(());
            }
            for member in members.iter() {
                let level = ExperienceLevel::from_total(member.total_experience);
                println!(
                    "- {} {} ({}, {}) level {} with {:.1} xp",
                    member.id,
                    member.name,
                    member.group,
                    member.role.as_deref().unwrap_or("no role"),
                    level.level,
                    member.total_experience
                );
            }
        }
        Commands::Members {
            command:
                MemberCommands::Update {
                    id,
                    name,
                    group,
                    role,
                    avatar_url,
                    clear_role,
                    clear_avatar,
                },
        } => {
            let update = MemberUpdate {
                name,
                group,
                role,
                avatar_url,
                clear_role,
                clear_avatar,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update; pass --name, --group, --role or --avatar-url");
            }
            let current = db::fetch_member(&pool, id)
                .await?
                .with_context(|| format!("member {id} not found"))?;
            let updated = update.apply(&current);
            if !db::update_member(
                &pool,
                id,
                &updated.name,
                &updated.group,
                updated.role.as_deref(),
                updated.avatar_url.as_deref(),
            )
            .await?
            {
                anyhow::bail!("member {id} not found");
            }
            println!("Updated {} ({}).", updated.name, updated.group);
        }
        Commands::Records { member, period } => {
            let records = db::fetch_metric_records(&pool, member, period.as_deref()).await?;
            if records.is_empty() {
                println!("No metric records found.");
                return Ok(());
            }
            for record in records.iter() {
                println!(
                    "- {} {} {} = {}",
                    record.member_id,
                    record.period,
                    record.metric_key,
                    record.value.as_deref().unwrap_or("(none)")
                );
            }
        }
        Commands::Periods { group } => {
            let mut periods = db::fetch_periods(&pool, group.as_deref()).await?;
            periods.sort_by(|a, b| period::compare_periods(b, a));
            if periods.is_empty() {
                println!("No periods recorded.");
            }
            for label in periods.iter() {
                println!("- {label}");
            }
        }
        Commands::Record {
            member,
            period,
            metrics,
        } => {
            let snapshot = parse_metric_assignments(&metrics)?;
            let gained = db::save_metric_records(&pool, member, &period, &snapshot).await?;
            println!(
                "Saved {} metrics for {period} (+{gained:.1} xp).",
                snapshot.len()
            );
        }
        Commands::Summary { group, period } => {
            let (period, members) =
                db::load_group(&pool, group.as_deref(), period.as_deref()).await?;
            let scoped = summary::members_in_group(&members, group.as_deref());
            let summary = GroupSummary::calculate(&scoped);

            println!(
                "{} for {period} ({} members):",
                group.as_deref().unwrap_or("All groups"),
                summary.total_members
            );
            if summary.metrics.is_empty() {
                println!("No numeric metrics recorded.");
            }
            for (key, stats) in summary.metrics.iter() {
                println!(
                    "- {}: avg {:.2}, max {:.2} ({}), min {:.2} ({})",
                    catalog.display_name(key),
                    stats.average,
                    stats.max,
                    stats.top_performer,
                    stats.min,
                    stats.bottom_performer
                );
            }
        }
        Commands::Leaderboard {
            group,
            period,
            metric,
            limit,
        } => {
            let (period, members) =
                db::load_group(&pool, group.as_deref(), period.as_deref()).await?;
            let scoped = summary::members_in_group(&members, group.as_deref());
            let basis = match metric {
                Some(key) => RankBasis::Metric(key),
                None => RankBasis::Experience,
            };
            let ranked = ranking::rank_members(&scoped, &basis);

            if ranked.is_empty() {
                println!("No ranked members for {period}.");
                return Ok(());
            }
            let label = match &basis {
                RankBasis::Experience => "experience".to_string(),
                RankBasis::Metric(key) => catalog.display_name(key).to_string(),
            };
            println!("Top members by {label} ({period}):");
            for entry in ranked.iter().take(limit) {
                println!(
                    "{}. {} ({}) {:.2}",
                    entry.rank, entry.name, entry.group, entry.score
                );
            }
        }
        Commands::Card { member, period } => {
            let found = db::fetch_member(&pool, member)
                .await?
                .with_context(|| format!("member {member} not found"))?;
            let group = found.group.clone();
            let (period, members) =
                db::load_group(&pool, Some(group.as_str()), period.as_deref()).await?;
            let scoped = summary::members_in_group(&members, Some(group.as_str()));
            let target = scoped
                .iter()
                .find(|snapshot| snapshot.member.id == member)
                .copied()
                .with_context(|| format!("member {member} missing from group {group}"))?;
            if target.metrics.is_empty() {
                println!("No metrics recorded for {} in {period}.", target.name());
            }

            let summary = GroupSummary::calculate(&scoped);
            let card = report::member_card(target, &scoped, &summary, &catalog);
            println!("{} ({period})", report::format_card(&card, &catalog));
            if !card.best_in.is_empty() {
                println!("  best in: {}", card.best_in.join(", "));
            }
            if !card.worst_in.is_empty() {
                println!("  lowest in: {}", card.worst_in.join(", "));
            }
        }
        Commands::Report { group, period, out } => {
            let (period, members) =
                db::load_group(&pool, Some(group.as_str()), period.as_deref()).await?;
            let scoped = summary::members_in_group(&members, Some(group.as_str()));
            let board = report::build_board(&group, &period, &scoped, &catalog);
            let report = report::build_report(&board, &catalog);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Archive { group, period, by } => {
            if db::archive_period(&pool, &group, &period, by.as_deref()).await? {
                tracing::info!(%group, %period, "archived period");
                println!("Archived {period} for {group}.");
            } else {
                println!("{period} for {group} was already archived.");
            }
        }
        Commands::Archives { group } => {
            let archives = db::fetch_archives(&pool, group.as_deref()).await?;
            if archives.is_empty() {
                println!("No archived periods.");
            }
            for archive in archives.iter() {
                println!(
                    "- {} {} archived {}{}",
                    archive.group,
                    archive.period,
                    archive.archived_at.format("%Y-%m-%d %H:%M"),
                    archive
                        .archived_by
                        .as_deref()
                        .map(|by| format!(" by {by}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Snapshot { command } => match command {
            SnapshotCommands::Save {
                group,
                period,
                label,
            } => {
                let (period, members) =
                    db::load_group(&pool, Some(group.as_str()), period.as_deref()).await?;
                let scoped = summary::members_in_group(&members, Some(group.as_str()));
                let board = report::build_board(&group, &period, &scoped, &catalog);
                let json = serde_json::to_string(&board)?;
                let saved = db::insert_snapshot(&pool, &group, label.as_deref(), &json).await?;
                println!("Saved snapshot {} for {group} ({period}).", saved.id);
            }
            SnapshotCommands::List { group } => {
                let snapshots = db::fetch_snapshots(&pool, group.as_deref()).await?;
                if snapshots.is_empty() {
                    println!("No snapshots saved.");
                }
                for snapshot in snapshots.iter() {
                    println!(
                        "- #{} {} {} {}",
                        snapshot.id,
                        snapshot.pod_name,
                        snapshot.snapshot_date.format("%Y-%m-%d %H:%M"),
                        snapshot.label.as_deref().unwrap_or("")
                    );
                }
            }
            SnapshotCommands::Show { id } => {
                let snapshot = db::fetch_snapshot(&pool, id)
                    .await?
                    .with_context(|| format!("snapshot {id} not found"))?;
                let value: serde_json::Value = serde_json::from_str(&snapshot.json_data)
                    .with_context(|| format!("snapshot {id} holds invalid JSON"))?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            SnapshotCommands::Delete { id } => {
                if db::delete_snapshot(&pool, id).await? {
                    println!("Deleted snapshot {id}.");
                } else {
                    anyhow::bail!("snapshot {id} not found");
                }
            }
        },
    }

    Ok(())
}
