use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use statcast_value::{cli, source, store};

fn main() -> Result<()> {
    cli::init();
    let args = cli::args();

    let inputs: Vec<PathBuf> = cli::positional(&args, &["--db", "--events"])
        .into_iter()
        .map(PathBuf::from)
        .chain(cli::path_arg(&args, "--events"))
        .collect();
    if inputs.is_empty() {
        return Err(anyhow!("pass one or more event files (.csv or .parquet)"));
    }

    let db_path = cli::path_arg(&args, "--db").unwrap_or_else(store::default_db_path);
    let mut conn = store::open_db(&db_path)?;

    println!("Event ingest");
    println!("DB: {}", db_path.display());
    let mut upserted = 0usize;
    for path in &inputs {
        let rows = source::read_events(path)?;
        let label = path.display().to_string();
        let summary = store::ingest(&mut conn, &label, &rows)
            .with_context(|| format!("ingest {label}"))?;
        println!(
            "{}: rows {} upserted={} skipped={} (run {})",
            label, summary.rows_seen, summary.rows_upserted, summary.rows_skipped, summary.run_id
        );
        upserted += summary.rows_upserted;
    }
    println!("Pitches upserted: {upserted}");
    println!("Pitches stored: {}", store::count_pitches(&conn)?);
    Ok(())
}
