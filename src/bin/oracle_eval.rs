use anyhow::{Result, anyhow};

use statcast_value::config::EngineConfig;
use statcast_value::normalize::normalize;
use statcast_value::oracle::{LogisticOracle, evaluate_oracle};
use statcast_value::{cli, export, source, store};

fn main() -> Result<()> {
    cli::init();
    let args = cli::args();

    let model_path =
        cli::path_arg(&args, "--model").ok_or_else(|| anyhow!("--model <artifact.json> is required"))?;
    let oracle = LogisticOracle::load(&model_path)?;
    let cfg = EngineConfig::load(cli::path_arg(&args, "--config").as_deref())?;

    let raw = if let Some(path) = cli::path_arg(&args, "--events") {
        source::read_events(&path)?
    } else if let Some(path) = cli::path_arg(&args, "--db") {
        store::load_pitches(&store::open_db(&path)?)?
    } else {
        return Err(anyhow!("pass --events <file> or --db <sqlite>"));
    };

    let log = cfg.with_pool(|| normalize(&raw, &cfg));
    let metrics = evaluate_oracle(&oracle, log.pitches())
        .ok_or_else(|| anyhow!("no called pitches with complete features to evaluate"))?;

    println!("Oracle evaluation");
    println!("Model: {}", model_path.display());
    println!("Samples: {}", metrics.samples);
    println!("Accuracy: {:.4}", metrics.accuracy);
    println!("Log loss: {:.4}", metrics.log_loss);
    println!("Brier: {:.4}", metrics.brier);

    if let Some(out) = cli::path_arg(&args, "--out") {
        export::write_json(&out, &metrics)?;
        println!("Wrote {}", out.display());
    }
    Ok(())
}
