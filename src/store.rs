use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use serde::Serialize;

use crate::event::{Numeric, RawPitch};

const PITCH_COLUMNS: [&str; 22] = [
    "game_pk",
    "at_bat_number",
    "pitch_number",
    "inning",
    "inning_topbot",
    "balls",
    "strikes",
    "outs_when_up",
    "on_1b",
    "on_2b",
    "on_3b",
    "bat_score",
    "fld_score",
    "description",
    "fielder_2",
    "stand",
    "p_throws",
    "plate_x",
    "plate_z",
    "sz_top",
    "sz_bot",
    "delta_run_exp",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub run_id: i64,
    pub source: String,
    pub rows_seen: usize,
    pub rows_upserted: usize,
    pub rows_skipped: usize,
}

pub fn default_db_path() -> PathBuf {
    match std::env::var("STATCAST_DB") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => PathBuf::from("data").join("statcast.sqlite"),
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

// Unparsed numeric cells are kept as TEXT so a reload reports the same reason.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS pitches (
            game_pk INTEGER NOT NULL,
            at_bat_number INTEGER NOT NULL,
            pitch_number INTEGER NOT NULL,
            inning ANY NULL,
            inning_topbot TEXT NULL,
            balls ANY NULL,
            strikes ANY NULL,
            outs_when_up ANY NULL,
            on_1b ANY NULL,
            on_2b ANY NULL,
            on_3b ANY NULL,
            bat_score ANY NULL,
            fld_score ANY NULL,
            description TEXT NULL,
            fielder_2 ANY NULL,
            stand TEXT NULL,
            p_throws TEXT NULL,
            plate_x ANY NULL,
            plate_z ANY NULL,
            sz_top ANY NULL,
            sz_bot ANY NULL,
            delta_run_exp ANY NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (game_pk, at_bat_number, pitch_number)
        );
        CREATE INDEX IF NOT EXISTS idx_pitches_catcher ON pitches(fielder_2);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            rows_seen INTEGER NOT NULL,
            rows_upserted INTEGER NOT NULL,
            rows_skipped INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn ingest(conn: &mut Connection, source: &str, rows: &[RawPitch]) -> Result<IngestSummary> {
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, rows_seen, rows_upserted, rows_skipped)
         VALUES (?1, NULL, ?2, ?3, 0, 0)",
        params![started_at, source, rows.len() as i64],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut rows_upserted = 0usize;
    let mut rows_skipped = 0usize;
    let tx = conn.transaction().context("begin ingest transaction")?;
    for row in rows {
        if pitch_key(row).is_none() {
            rows_skipped += 1;
            continue;
        }
        upsert_pitch(&tx, row)?;
        rows_upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;

    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, rows_upserted = ?2, rows_skipped = ?3
         WHERE run_id = ?4",
        params![
            Utc::now().to_rfc3339(),
            rows_upserted as i64,
            rows_skipped as i64,
            run_id
        ],
    )
    .context("update ingest run")?;

    if rows_skipped > 0 {
        log::warn!("ingest {source}: {rows_skipped} rows lack a game/at-bat/pitch key");
    }
    Ok(IngestSummary {
        run_id,
        source: source.to_string(),
        rows_seen: rows.len(),
        rows_upserted,
        rows_skipped,
    })
}

pub fn load_pitches(conn: &Connection) -> Result<Vec<RawPitch>> {
    query_pitches(conn, None)
}

pub fn load_game(conn: &Connection, game_pk: u64) -> Result<Vec<RawPitch>> {
    query_pitches(conn, Some(game_pk))
}

pub fn count_pitches(conn: &Connection) -> Result<usize> {
    let n = conn
        .query_row("SELECT COUNT(*) FROM pitches", [], |row| row.get::<_, i64>(0))
        .context("count pitches")?;
    Ok(n.max(0) as usize)
}

fn pitch_key(row: &RawPitch) -> Option<(i64, i64, i64)> {
    Some((
        row.game_pk.integer().ok()?,
        row.at_bat_number.integer().ok()?,
        row.pitch_number.integer().ok()?,
    ))
}

fn query_pitches(conn: &Connection, game_pk: Option<u64>) -> Result<Vec<RawPitch>> {
    let sql = format!(
        "SELECT {} FROM pitches WHERE (?1 IS NULL OR game_pk = ?1) ORDER BY game_pk, at_bat_number, pitch_number",
        PITCH_COLUMNS.join(", ")
    );
    let mut stmt = conn.prepare(&sql).context("prepare load pitches query")?;
    let rows = stmt
        .query_map(params![game_pk.map(|g| g as i64)], |row| {
            let num = |idx: usize| row.get::<_, Value>(idx).map(numeric_from_sql);
            let text = |idx: usize| row.get::<_, Option<String>>(idx);
            Ok(RawPitch {
                game_pk: num(0)?,
                at_bat_number: num(1)?,
                pitch_number: num(2)?,
                inning: num(3)?,
                inning_topbot: text(4)?,
                balls: num(5)?,
                strikes: num(6)?,
                outs_when_up: num(7)?,
                on_1b: num(8)?,
                on_2b: num(9)?,
                on_3b: num(10)?,
                bat_score: num(11)?,
                fld_score: num(12)?,
                description: text(13)?,
                fielder_2: num(14)?,
                stand: text(15)?,
                p_throws: text(16)?,
                plate_x: num(17)?,
                plate_z: num(18)?,
                sz_top: num(19)?,
                sz_bot: num(20)?,
                delta_run_exp: num(21)?,
            })
        })
        .context("query load pitches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode pitch row")?);
    }
    Ok(out)
}

fn upsert_pitch(tx: &rusqlite::Transaction<'_>, p: &RawPitch) -> Result<()> {
    let placeholders: Vec<String> = (1..=PITCH_COLUMNS.len() + 1)
        .map(|i| format!("?{i}"))
        .collect();
    let updates: Vec<String> = PITCH_COLUMNS[3..]
        .iter()
        .chain(std::iter::once(&"updated_at"))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    let sql = format!(
        "INSERT INTO pitches ({}, updated_at) VALUES ({})
         ON CONFLICT(game_pk, at_bat_number, pitch_number) DO UPDATE SET {}",
        PITCH_COLUMNS.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    );

    let text = |s: &Option<String>| match s {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    };
    let values = vec![
        numeric_sql(p.game_pk),
        numeric_sql(p.at_bat_number),
        numeric_sql(p.pitch_number),
        numeric_sql(p.inning),
        text(&p.inning_topbot),
        numeric_sql(p.balls),
        numeric_sql(p.strikes),
        numeric_sql(p.outs_when_up),
        numeric_sql(p.on_1b),
        numeric_sql(p.on_2b),
        numeric_sql(p.on_3b),
        numeric_sql(p.bat_score),
        numeric_sql(p.fld_score),
        text(&p.description),
        numeric_sql(p.fielder_2),
        text(&p.stand),
        text(&p.p_throws),
        numeric_sql(p.plate_x),
        numeric_sql(p.plate_z),
        numeric_sql(p.sz_top),
        numeric_sql(p.sz_bot),
        numeric_sql(p.delta_run_exp),
        Value::Text(Utc::now().to_rfc3339()),
    ];
    if values.len() != placeholders.len() {
        return Err(anyhow!("pitch upsert binds {} values", values.len()));
    }
    tx.prepare_cached(&sql)
        .context("prepare upsert pitch")?
        .execute(params_from_iter(values))
        .context("upsert pitch")?;
    Ok(())
}

fn numeric_sql(n: Numeric) -> Value {
    match n {
        Numeric::Value(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Value::Integer(v as i64),
        Numeric::Value(v) => Value::Real(v),
        Numeric::Missing => Value::Null,
        Numeric::Invalid => Value::Text("invalid".to_string()),
    }
}

fn numeric_from_sql(v: Value) -> Numeric {
    match v {
        Value::Null => Numeric::Missing,
        Value::Integer(i) => Numeric::Value(i as f64),
        Value::Real(r) => Numeric::from_f64(Some(r)),
        Value::Text(s) => Numeric::parse(&s),
        Value::Blob(_) => Numeric::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(game: f64, ab: f64, pitch: f64) -> RawPitch {
        RawPitch {
            game_pk: Numeric::Value(game),
            at_bat_number: Numeric::Value(ab),
            pitch_number: Numeric::Value(pitch),
            inning: Numeric::Value(1.0),
            inning_topbot: Some("Top".to_string()),
            balls: Numeric::Value(0.0),
            strikes: Numeric::Value(0.0),
            outs_when_up: Numeric::Invalid,
            plate_x: Numeric::Value(-0.25),
            description: Some("ball".to_string()),
            ..RawPitch::default()
        }
    }

    #[test]
    fn ingest_then_load_preserves_cells() {
        let mut conn = open_in_memory().unwrap();
        let rows = vec![raw(1.0, 1.0, 2.0), raw(1.0, 1.0, 1.0), raw(2.0, 1.0, 1.0)];
        let summary = ingest(&mut conn, "unit", &rows).unwrap();
        assert_eq!(summary.rows_upserted, 3);
        assert_eq!(count_pitches(&conn).unwrap(), 3);

        let loaded = load_game(&conn, 1).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].pitch_number, Numeric::Value(1.0));
        assert_eq!(loaded[0].plate_x, Numeric::Value(-0.25));
        assert_eq!(loaded[0].outs_when_up, Numeric::Invalid);
        assert_eq!(loaded[0].on_1b, Numeric::Missing);
        assert_eq!(loaded[0].inning_topbot.as_deref(), Some("Top"));
    }

    #[test]
    fn reingest_upserts_and_skips_keyless_rows() {
        let mut conn = open_in_memory().unwrap();
        ingest(&mut conn, "first", &[raw(1.0, 1.0, 1.0)]).unwrap();
        let mut changed = raw(1.0, 1.0, 1.0);
        changed.description = Some("called_strike".to_string());
        let mut keyless = raw(1.0, 2.0, 1.0);
        keyless.pitch_number = Numeric::Missing;
        let summary = ingest(&mut conn, "second", &[changed, keyless]).unwrap();
        assert_eq!(summary.rows_skipped, 1);
        let all = load_pitches(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description.as_deref(), Some("called_strike"));

        let runs: i64 = conn
            .query_row("SELECT COUNT(*) FROM ingest_runs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(runs, 2);
    }
}
