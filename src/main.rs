use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use statcast_value::cli;
use statcast_value::config::EngineConfig;
use statcast_value::event::RawPitch;
use statcast_value::export::{self, ExpectancyArtifact, LeaderboardArtifact};
use statcast_value::leaderboard::MetricTable;
use statcast_value::oracle::{LogisticOracle, ProbabilityOracle};
use statcast_value::pipeline::{self, RunSummary};
use statcast_value::roster::Roster;
use statcast_value::synthetic::{self, SyntheticConfig};
use statcast_value::{source, store};

fn main() -> Result<()> {
    cli::init();
    let args = cli::args();

    let config_path = cli::path_arg(&args, "--config");
    let cfg = EngineConfig::load(config_path.as_deref())?;
    let out_dir = cli::path_arg(&args, "--out-dir").unwrap_or_else(|| PathBuf::from("out"));
    let demo = cli::has_flag(&args, "--demo");

    // Oracle and roster load before any aggregation so a broken artifact aborts early.
    let model: Option<LogisticOracle> = match cli::path_arg(&args, "--model") {
        Some(path) => Some(LogisticOracle::load(&path)?),
        None => None,
    };
    let roster = match cli::path_arg(&args, "--roster") {
        Some(path) => Some(Roster::load_csv(&path)?),
        None => None,
    };

    let raw = load_raw(&args, demo)?;
    if raw.is_empty() {
        return Err(anyhow!("no pitches to process"));
    }

    let oracle: Option<&dyn ProbabilityOracle> = match (&model, demo) {
        (Some(m), _) => Some(m),
        (None, true) => Some(&synthetic::zone_oracle),
        (None, false) => None,
    };

    let summary = match oracle {
        Some(oracle) => {
            let out = pipeline::run_all(&raw, oracle, roster.as_ref(), &cfg)?;
            export::write_json(
                &out_dir.join("run_expectancy.json"),
                &ExpectancyArtifact::new(&out.matrix, &out.summary.normalize),
            )?;
            export::write_json(
                &out_dir.join("leaderboard.json"),
                &LeaderboardArtifact::new(
                    &out.leaderboard.leaderboard,
                    out.leaderboard.run_values,
                    cfg.volume_threshold(),
                    cfg.edge_midpoint,
                ),
            )?;
            if !cli::has_flag(&args, "--no-xlsx") {
                export::write_workbook(
                    &out_dir.join("statcast_value.xlsx"),
                    &out.matrix,
                    Some(&out.leaderboard.leaderboard),
                )?;
            }
            print_leaderboard(&out.leaderboard.leaderboard.rows, 10);
            for table in out.leaderboard.leaderboard.tables() {
                print_metric_table(table, 5);
            }
            out.summary
        }
        None => {
            log::warn!("no --model given; building run expectancy only");
            let (matrix, summary) = pipeline::run_matrix_only(&raw, &cfg)?;
            export::write_json(
                &out_dir.join("run_expectancy.json"),
                &ExpectancyArtifact::new(&matrix, &summary.normalize),
            )?;
            if !cli::has_flag(&args, "--no-xlsx") {
                export::write_workbook(&out_dir.join("statcast_value.xlsx"), &matrix, None)?;
            }
            summary
        }
    };

    export::write_json(&out_dir.join("summary.json"), &summary)?;
    print_summary(&summary, &out_dir);
    Ok(())
}

fn load_raw(args: &[String], demo: bool) -> Result<Vec<RawPitch>> {
    if demo {
        let synth = SyntheticConfig {
            games: cli::parse_arg(args, "--games").unwrap_or(162),
            seed: cli::parse_arg(args, "--seed").unwrap_or(7),
            ..SyntheticConfig::default()
        };
        log::info!("generating {} synthetic games (seed {})", synth.games, synth.seed);
        return Ok(synthetic::generate(&synth));
    }
    if let Some(path) = cli::path_arg(args, "--events") {
        return source::read_events(&path);
    }
    if let Some(path) = cli::path_arg(args, "--db") {
        return load_from_db(&path);
    }
    Err(anyhow!(
        "pass --events <file.csv|file.parquet>, --db <sqlite> or --demo"
    ))
}

fn load_from_db(path: &Path) -> Result<Vec<RawPitch>> {
    let conn = store::open_db(path)?;
    store::load_pitches(&conn).with_context(|| format!("load pitches from {}", path.display()))
}

fn print_leaderboard(rows: &[statcast_value::leaderboard::LeaderboardRow], limit: usize) {
    println!(
        "{:<4} {:<24} {:>7} {:>9} {:>9} {:>9}",
        "#", "catcher", "calls", "total", "centered", "runs"
    );
    for (idx, row) in rows.iter().take(limit).enumerate() {
        let name = row
            .name
            .clone()
            .unwrap_or_else(|| row.actor.to_string());
        println!(
            "{:<4} {:<24} {:>7} {:>9} {:>9} {:>9}",
            idx + 1,
            name,
            opt(row.events.map(|n| n as f64), 0),
            opt(row.total, 2),
            opt(row.centered_mean, 4),
            opt(row.run_value, 2),
        );
    }
}

fn print_metric_table(table: &MetricTable, limit: usize) {
    println!("Top {} by {} ({:?})", limit, table.metric.label(), table.order);
    for (idx, row) in table.rows.iter().take(limit).enumerate() {
        println!(
            "  {:<3} {:<10} {:>6} {:>10.4}",
            idx + 1,
            row.actor,
            row.events,
            row.value
        );
    }
}

fn opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_else(|| "-".to_string())
}

fn print_summary(summary: &RunSummary, out_dir: &Path) {
    let n = &summary.normalize;
    println!("Run complete");
    println!("Output: {}", out_dir.display());
    println!(
        "Pitches: {} accepted / {} read ({} dropped, {} clamped)",
        n.accepted, n.input, n.dropped, n.clamped_balls
    );
    println!("Episodes: {}  States: {}", n.episodes, summary.states);
    if let Some(a) = &summary.attribution {
        println!(
            "Attributed: {} of {} (unresolved actor {}, missing features {})",
            a.attributed, a.considered, a.unresolved_actor, a.missing_features
        );
    }
    if let Some(q) = &summary.qualify {
        println!(
            "Qualified: {} pitches, {} of {} actors at >= {} calls",
            q.qualified, q.actors_qualified, q.actors_seen, q.volume_threshold
        );
    }
}
