use std::path::Path;

use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::level::{experience_from_metrics, experience_gain};
use crate::models::{
    ArchivedPeriod, Member, MemberSnapshot, MetricRecord, MetricSnapshot, PodSnapshot,
};
use crate::period::latest_period;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SEED_PERIOD: &str = "EOM-Dec 2025";
const SEED_GROUP: &str = "Computers";

type SeedMember = (&'static str, &'static str, &'static str, [(&'static str, &'static str); 8]);

fn seed_members() -> Vec<SeedMember> {
    vec![
        (
            "Drew",
            "Intel Sales Lead",
            "images/avatars/drew1.png",
            [
                ("M365Attach", "85.3%"),
                ("GSP", "45.2%"),
                ("Revenue", "$125,340"),
                ("ASP", "$892"),
                ("Basket", "2.4"),
                ("PMAttach", "62.1%"),
                ("5Star", "94.5%"),
                ("Picks", "156"),
            ],
        ),
        (
            "Jon",
            "Apple Pro",
            "images/avatars/jon1.png",
            [
                ("M365Attach", "78.5%"),
                ("GSP", "52.1%"),
                ("Revenue", "$98,750"),
                ("ASP", "$1,245"),
                ("Basket", "1.9"),
                ("PMAttach", "55.8%"),
                ("5Star", "91.2%"),
                ("Picks", "134"),
            ],
        ),
        (
            "Gustavo",
            "Gaming Champion",
            "images/avatars/gustavo1.png",
            [
                ("M365Attach", "72.1%"),
                ("GSP", "48.9%"),
                ("Revenue", "$87,420"),
                ("ASP", "$756"),
                ("Basket", "2.1"),
                ("PMAttach", "48.3%"),
                ("5Star", "88.9%"),
                ("Picks", "142"),
            ],
        ),
        (
            "Vinny",
            "Solutions Expert",
            "images/avatars/vinny1.png",
            [
                ("M365Attach", "91.2%"),
                ("GSP", "38.5%"),
                ("Revenue", "$145,890"),
                ("ASP", "$1,120"),
                ("Basket", "2.8"),
                ("PMAttach", "71.4%"),
                ("5Star", "96.8%"),
                ("Picks", "167"),
            ],
        ),
        (
            "Ishack",
            "Build Master",
            "images/avatars/ishack1.png",
            [
                ("M365Attach", "82.7%"),
                ("GSP", "55.3%"),
                ("Revenue", "$112,560"),
                ("ASP", "$945"),
                ("Basket", "2.2"),
                ("PMAttach", "58.9%"),
                ("5Star", "92.3%"),
                ("Picks", "148"),
            ],
        ),
        (
            "Matthew",
            "Premium Consultant",
            "images/avatars/matthew1.png",
            [
                ("M365Attach", "88.4%"),
                ("GSP", "61.2%"),
                ("Revenue", "$134,670"),
                ("ASP", "$1,089"),
                ("Basket", "2.6"),
                ("PMAttach", "67.8%"),
                ("5Star", "95.1%"),
                ("Picks", "159"),
            ],
        ),
    ]
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let mut seeded = 0usize;

    for (name, role, avatar, metrics) in seed_members() {
        let snapshot: MetricSnapshot = metrics.into_iter().collect();

        let mut tx = pool.begin().await?;
        let member_id = upsert_member(&mut tx, name, SEED_GROUP, Some(role), Some(avatar)).await?;
        write_period_records(&mut tx, member_id, SEED_PERIOD, &snapshot, false).await?;
        tx.commit().await?;

        seeded += 1;
    }

    tracing::info!(members = seeded, period = SEED_PERIOD, "seeded scoreboard");
    Ok(seeded)
}

/// Removes every member (cascading to their metric records), archive and snapshot.
pub async fn clear(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM scoreboard.pod_snapshots")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM scoreboard.archived_periods")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM scoreboard.members")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    tracing::warn!("scoreboard data cleared");
    Ok(())
}

async fn upsert_member(
    conn: &mut PgConnection,
    name: &str,
    group: &str,
    role: Option<&str>,
    avatar_url: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO scoreboard.members (id, name, department, role, avatar_url)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (name, department) DO UPDATE
        SET role = COALESCE(EXCLUDED.role, scoreboard.members.role),
            avatar_url = COALESCE(EXCLUDED.avatar_url, scoreboard.members.avatar_url)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(group)
    .bind(role)
    .bind(avatar_url)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    Ok(id)
}

/// Writes one member's records for a period and accrues the experience gained
/// above the period's previous award.
///
/// With `replace` the stored snapshot becomes exactly `snapshot`; otherwise the
/// incoming values are merged over what is already stored.
async fn write_period_records(
    conn: &mut PgConnection,
    member_id: Uuid,
    period: &str,
    snapshot: &MetricSnapshot,
    replace: bool,
) -> anyhow::Result<f64> {
    let previous_records = sqlx::query(
        r#"
        SELECT member_id, period, metric_key, value
        FROM scoreboard.metric_records
        WHERE member_id = $1 AND period = $2
        ORDER BY metric_key
        "#,
    )
    .bind(member_id)
    .bind(period)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(metric_record_from_row)
    .collect::<Vec<_>>();

    let mut previous = MetricSnapshot::new();
    for record in previous_records {
        previous.insert(record.metric_key, record.value);
    }

    let next = if replace {
        snapshot.clone()
    } else {
        let mut merged = previous.clone();
        for (key, value) in snapshot.entries() {
            merged.insert(key, value.map(str::to_string));
        }
        merged
    };

    sqlx::query("DELETE FROM scoreboard.metric_records WHERE member_id = $1 AND period = $2")
        .bind(member_id)
        .bind(period)
        .execute(&mut *conn)
        .await?;

    for (key, value) in next.entries() {
        sqlx::query(
            r#"
            INSERT INTO scoreboard.metric_records (member_id, period, metric_key, value)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(member_id)
        .bind(period)
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;
    }

    let awarded: f64 = sqlx::query(
        "SELECT awarded FROM scoreboard.period_experience WHERE member_id = $1 AND period = $2",
    )
    .bind(member_id)
    .bind(period)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| row.get("awarded"))
    .unwrap_or(0.0);

    let gained = experience_gain(awarded, &next);
    if gained > 0.0 {
        sqlx::query(
            r#"
            INSERT INTO scoreboard.period_experience (member_id, period, awarded)
            VALUES ($1, $2, $3)
            ON CONFLICT (member_id, period) DO UPDATE
            SET awarded = EXCLUDED.awarded
            "#,
        )
        .bind(member_id)
        .bind(period)
        .bind(awarded + gained)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE scoreboard.members SET total_experience = total_experience + $2 WHERE id = $1",
        )
        .bind(member_id)
        .bind(gained)
        .execute(&mut *conn)
        .await?;
    }

    tracing::debug!(
        %member_id,
        period,
        metrics = next.len(),
        xp = experience_from_metrics(&next),
        awarded,
        gained,
        "wrote period records"
    );
    Ok(gained)
}

/// Replaces every record of a member for one period. Returns the experience gained.
pub async fn save_metric_records(
    pool: &PgPool,
    member_id: Uuid,
    period: &str,
    snapshot: &MetricSnapshot,
) -> anyhow::Result<f64> {
    let mut tx = pool.begin().await?;
    let exists = sqlx::query("SELECT 1 FROM scoreboard.members WHERE id = $1")
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !exists {
        anyhow::bail!("member {member_id} not found");
    }

    let gained = write_period_records(&mut tx, member_id, period, snapshot, true).await?;
    tx.commit().await?;

    tracing::info!(%member_id, period, gained, "saved metric records");
    Ok(gained)
}

#[derive(Debug, serde::Deserialize)]
pub struct ImportRow {
    pub name: String,
    pub department: String,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
    pub period: String,
    pub metric_key: String,
    pub value: Option<String>,
}

pub fn read_import_rows<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<ImportRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", index + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Imports metric records from CSV, merging them over any stored values.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_import_rows(file)?;

    let mut batches: Vec<(Uuid, String, MetricSnapshot)> = Vec::new();
    let mut tx = pool.begin().await?;

    for row in &rows {
        let member_id = upsert_member(
            &mut tx,
            &row.name,
            &row.department,
            row.role.as_deref(),
            row.avatar_url.as_deref(),
        )
        .await?;

        let value = row.value.clone().filter(|value| !value.trim().is_empty());
        match batches
            .iter_mut()
            .find(|(id, period, _)| *id == member_id && *period == row.period)
        {
            Some((_, _, snapshot)) => snapshot.insert(row.metric_key.clone(), value),
            None => {
                let mut snapshot = MetricSnapshot::new();
                snapshot.insert(row.metric_key.clone(), value);
                batches.push((member_id, row.period.clone(), snapshot));
            }
        }
    }

    for (member_id, period, snapshot) in &batches {
        write_period_records(&mut tx, *member_id, period, snapshot, false).await?;
    }
    tx.commit().await?;

    tracing::info!(records = rows.len(), batches = batches.len(), "imported metric records");
    Ok(rows.len())
}

fn member_from_row(row: &PgRow) -> Member {
    Member {
        id: row.get("id"),
        name: row.get("name"),
        group: row.get("department"),
        role: row.get("role"),
        avatar_url: row.get("avatar_url"),
        total_experience: row.get("total_experience"),
    }
}

fn metric_record_from_row(row: &PgRow) -> MetricRecord {
    MetricRecord {
        member_id: row.get("member_id"),
        period: row.get("period"),
        metric_key: row.get("metric_key"),
        value: row.get("value"),
    }
}

pub async fn fetch_members(pool: &PgPool, group: Option<&str>) -> anyhow::Result<Vec<Member>> {
    let mut query = String::from(
        "SELECT id, name, department, role, avatar_url, total_experience \
         FROM scoreboard.members",
    );
    if group.is_some() {
        query.push_str(" WHERE department = $1");
    }
    query.push_str(" ORDER BY created_at, name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = group {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.iter().map(member_from_row).collect())
}

pub async fn fetch_member(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Member>> {
    let row = sqlx::query(
        "SELECT id, name, department, role, avatar_url, total_experience \
         FROM scoreboard.members WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(member_from_row))
}

/// Overwrites a member's identity fields. Returns `false` when no member has `id`.
pub async fn update_member(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    group: &str,
    role: Option<&str>,
    avatar_url: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE scoreboard.members
        SET name = $2, department = $3, role = $4, avatar_url = $5
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(group)
    .bind(role)
    .bind(avatar_url)
    .execute(pool)
    .await
    .with_context(|| format!("failed to update member {id} (is {name} already in {group}?)"))?;

    if result.rows_affected() > 0 {
        tracing::info!(%id, name, group, "updated member");
    }
    Ok(result.rows_affected() > 0)
}

fn metric_records_query(by_member: bool, by_period: bool) -> String {
    let mut query = String::from(
        "SELECT member_id, period, metric_key, value FROM scoreboard.metric_records WHERE TRUE",
    );
    let mut position = 0;
    if by_member {
        position += 1;
        query.push_str(&format!(" AND member_id = ${position}"));
    }
    if by_period {
        position += 1;
        query.push_str(&format!(" AND period = ${position}"));
    }
    query.push_str(" ORDER BY member_id, period, metric_key");
    query
}

pub async fn fetch_metric_records(
    pool: &PgPool,
    member_id: Option<Uuid>,
    period: Option<&str>,
) -> anyhow::Result<Vec<MetricRecord>> {
    let query = metric_records_query(member_id.is_some(), period.is_some());

    let mut rows = sqlx::query(&query);
    if let Some(value) = member_id {
        rows = rows.bind(value);
    }
    if let Some(value) = period {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.iter().map(metric_record_from_row).collect())
}

pub async fn fetch_periods(pool: &PgPool, group: Option<&str>) -> anyhow::Result<Vec<String>> {
    let mut query = String::from(
        "SELECT DISTINCT r.period FROM scoreboard.metric_records r \
         JOIN scoreboard.members m ON m.id = r.member_id",
    );
    if group.is_some() {
        query.push_str(" WHERE m.department = $1");
    }
    query.push_str(" ORDER BY r.period");

    let mut rows = sqlx::query(&query);
    if let Some(value) = group {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.iter().map(|row| row.get("period")).collect())
}

/// Loads the group's members with their snapshots for `period`, or for the
/// latest stored period when none is given.
pub async fn load_group(
    pool: &PgPool,
    group: Option<&str>,
    period: Option<&str>,
) -> anyhow::Result<(String, Vec<MemberSnapshot>)> {
    let period = match period {
        Some(value) => value.to_string(),
        None => {
            let periods = fetch_periods(pool, group).await?;
            latest_period(periods.iter().map(String::as_str))
                .map(str::to_string)
                .context("no metric records stored yet; pass --period explicitly")?
        }
    };

    let members = fetch_members(pool, group).await?;
    let records = fetch_metric_records(pool, None, Some(period.as_str())).await?;
    let snapshots = members
        .into_iter()
        .map(|member| MemberSnapshot::for_period(member, &records, &period))
        .collect();

    Ok((period, snapshots))
}

pub async fn archive_period(
    pool: &PgPool,
    group: &str,
    period: &str,
    archived_by: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO scoreboard.archived_periods (department, period, archived_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (department, period) DO NOTHING
        "#,
    )
    .bind(group)
    .bind(period)
    .bind(archived_by)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_archives(
    pool: &PgPool,
    group: Option<&str>,
) -> anyhow::Result<Vec<ArchivedPeriod>> {
    let mut query = String::from(
        "SELECT id, department, period, archived_at, archived_by FROM scoreboard.archived_periods",
    );
    if group.is_some() {
        query.push_str(" WHERE department = $1");
    }
    query.push_str(" ORDER BY archived_at DESC");

    let mut rows = sqlx::query(&query);
    if let Some(value) = group {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records
        .iter()
        .map(|row| ArchivedPeriod {
            id: row.get("id"),
            group: row.get("department"),
            period: row.get("period"),
            archived_at: row.get("archived_at"),
            archived_by: row.get("archived_by"),
        })
        .collect())
}

fn snapshot_from_row(row: &PgRow) -> PodSnapshot {
    PodSnapshot {
        id: row.get("id"),
        pod_name: row.get("pod_name"),
        snapshot_date: row.get("snapshot_date"),
        label: row.get("label"),
        json_data: row.get("json_data"),
    }
}

pub async fn insert_snapshot(
    pool: &PgPool,
    pod_name: &str,
    label: Option<&str>,
    json_data: &str,
) -> anyhow::Result<PodSnapshot> {
    let row = sqlx::query(
        r#"
        INSERT INTO scoreboard.pod_snapshots (pod_name, label, json_data)
        VALUES ($1, $2, $3)
        RETURNING id, pod_name, snapshot_date, label, json_data
        "#,
    )
    .bind(pod_name)
    .bind(label)
    .bind(json_data)
    .fetch_one(pool)
    .await?;

    Ok(snapshot_from_row(&row))
}

pub async fn fetch_snapshots(
    pool: &PgPool,
    pod_name: Option<&str>,
) -> anyhow::Result<Vec<PodSnapshot>> {
    let mut query = String::from(
        "SELECT id, pod_name, snapshot_date, label, json_data FROM scoreboard.pod_snapshots",
    );
    if pod_name.is_some() {
        query.push_str(" WHERE pod_name = $1");
    }
    query.push_str(" ORDER BY snapshot_date DESC");

    let mut rows = sqlx::query(&query);
    if let Some(value) = pod_name {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    Ok(records.iter().map(snapshot_from_row).collect())
}

pub async fn fetch_snapshot(pool: &PgPool, id: i64) -> anyhow::Result<Option<PodSnapshot>> {
    let row = sqlx::query(
        "SELECT id, pod_name, snapshot_date, label, json_data \
         FROM scoreboard.pod_snapshots WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(snapshot_from_row))
}

pub async fn delete_snapshot(pool: &PgPool, id: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM scoreboard.pod_snapshots WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_import_rows_with_optional_columns() {
        let data = "name,department,role,avatar_url,period,metric_key,value\n\
                    Drew,Computers,Intel Sales Lead,,EOM-Dec 2025,Revenue,\"$125,340\"\n\
                    Jon,Computers,,,EOM-Dec 2025,MVP,\n";
        let rows = read_import_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value.as_deref(), Some("$125,340"));
        assert_eq!(rows[0].role.as_deref(), Some("Intel Sales Lead"));
        assert_eq!(rows[0].avatar_url, None);
        assert_eq!(rows[1].value, None);
    }

    #[test]
    fn rejects_rows_missing_required_columns() {
        let data = "name,department\nDrew,Computers\n";
        assert!(read_import_rows(data.as_bytes()).is_err());
    }

    #[test]
    fn metric_record_filters_number_their_placeholders() {
        let both = metric_records_query(true, true);
        assert!(both.contains("member_id = $1"));
        assert!(both.contains("period = $2"));

        let period_only = metric_records_query(false, true);
        assert!(period_only.contains("period = $1"));
        assert!(!period_only.contains("member_id ="));

        let member_only = metric_records_query(true, false);
        assert!(member_only.contains("member_id = $1"));
        assert!(!member_only.contains("period ="));
    }

    #[test]
    fn seed_members_share_metric_keys() {
        let members = seed_members();
        assert!(!members.is_empty());
        let keys: Vec<&str> = members[0].3.iter().map(|(key, _)| *key).collect();
        for (_, _, _, metrics) in &members {
            let other: Vec<&str> = metrics.iter().map(|(key, _)| *key).collect();
            assert_eq!(keys, other);
        }
    }
}
