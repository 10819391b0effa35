use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::AttendanceRecord;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    source_key: Option<String>,
    session_date: String,
    time_label: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    class_type: String,
    #[serde(default)]
    instructors: String,
    #[serde(default)]
    student_name: String,
    #[serde(default)]
    coordinator_name: Option<String>,
}

impl CsvRow {
    /// Splits off the upstream key, if any; the record id falls back to the line number.
    fn into_keyed_record(self, line: usize) -> (Option<String>, AttendanceRecord) {
        let source_key = self.source_key.filter(|key| !key.trim().is_empty());
        let record = AttendanceRecord {
            record_id: source_key.clone().unwrap_or_else(|| format!("csv-{line}")),
            session_date: self.session_date,
            time_label: self.time_label,
            location: self.location,
            class_type: self.class_type,
            instructors: self.instructors,
            student_name: self.student_name,
            coordinator_name: self.coordinator_name.filter(|name| !name.trim().is_empty()),
        };
        (source_key, record)
    }
}

fn read_csv_rows(csv_path: &Path) -> Result<Vec<(Option<String>, AttendanceRecord)>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        rows.push(result?.into_keyed_record(line + 1));
    }

    info!(path = %csv_path.display(), rows = rows.len(), "loaded attendance csv");
    Ok(rows)
}

/// Reads attendance rows from a CSV export with a header line.
pub fn load_csv(csv_path: &Path) -> Result<Vec<AttendanceRecord>> {
    Ok(read_csv_rows(csv_path)?
        .into_iter()
        .map(|(_, record)| record)
        .collect())
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let classes = [
        ("04/03/2026", "06:00", "Arena Norte", "Geral", "Carlos Silva", "Marta", &["Avery", "Bia", "Caio", "Duda"][..]),
        ("04/03/2026", "07h", "Arena Norte", "VIP", "Peu", "Marta", &["Enzo"][..]),
        ("04/03/2026", "18:00", "Arena Sul", "Geral", "Ana Santos e Pedro Lima", "Rafa", &["Fabi", "Gabi", "Hugo", "Iara", "Juca", "Kai", "Lia"][..]),
        ("05/03/2026", "06h", "Arena Norte", "Geral", "Carlos Silva", "Marta", &["Avery", "Bia"][..]),
        ("05/03/2026", "19:00", "Arena Sul", "Geral", "Maria Costa", "Rafa", &["Fabi", "Gabi", "Hugo", "Mel", "Nina", "Otto"][..]),
        ("05/03/2026", "20h", "Arena Sul", "Aulão", "Maria Costa, Ana Santos", "Rafa", &["Pia", "Quim", "Rui"][..]),
        ("06/03/2026", "07:00", "Arena Norte", "VIP", "Peu Beck", "Marta", &["Enzo", "Sara"][..]),
        ("06/03/2026", "14h", "Arena Norte", "Geral", "Pedro Lima", "Marta", &["Tito", "Ugo"][..]),
        ("06/03/2026", "18:00", "Arena Sul", "Geral", "Ana Santos e Pedro Lima", "Rafa", &["Fabi", "Gabi", "Iara", "Lia", "Vivi"][..]),
    ];

    let mut inserted = 0usize;
    let mut sequence = 0usize;

    for (session_date, time_label, location, class_type, instructors, coordinator, students) in classes {
        for student in students {
            sequence += 1;
            let result = sqlx::query(
                r#"
                INSERT INTO arena_insights.attendance
                (id, source_key, session_date, time_label, location, class_type,
                 instructors, student_name, coordinator_name)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(format!("seed-{sequence:03}"))
            .bind(session_date)
            .bind(time_label)
            .bind(location)
            .bind(class_type)
            .bind(instructors)
            .bind(*student)
            .bind(coordinator)
            .execute(pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
    }

    info!(inserted, "seeded attendance");
    Ok(inserted)
}

/// Bulk read of every attendance row; filtering happens in memory.
pub async fn fetch_attendance(pool: &PgPool) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(
        "SELECT id, session_date, time_label, location, class_type, \
         instructors, student_name, coordinator_name \
         FROM arena_insights.attendance \
         ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch attendance rows")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        records.push(AttendanceRecord {
            record_id: id.to_string(),
            session_date: row.get("session_date"),
            time_label: row.get("time_label"),
            location: row.get("location"),
            class_type: row.get("class_type"),
            instructors: row.get("instructors"),
            student_name: row.get("student_name"),
            coordinator_name: row.get("coordinator_name"),
        });
    }

    info!(rows = records.len(), "fetched attendance from postgres");
    Ok(records)
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let rows = read_csv_rows(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (source_key, record) in rows {
        let source_key = source_key.unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO arena_insights.attendance
            (id, source_key, session_date, time_label, location, class_type,
             instructors, student_name, coordinator_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(&record.session_date)
        .bind(&record.time_label)
        .bind(&record.location)
        .bind(&record.class_type)
        .bind(&record.instructors)
        .bind(&record.student_name)
        .bind(&record.coordinator_name)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "imported attendance csv");
    Ok(inserted)
}
