use serde::Serialize;

use crate::attribution::{AttributionReport, RunValues, attribute};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::{Pitch, RawPitch};
use crate::expectancy::{ExpectancyMatrix, build_matrix};
use crate::leaderboard::{Leaderboard, build_leaderboard};
use crate::normalize::{NormalizeReport, NormalizedLog, normalize};
use crate::oracle::ProbabilityOracle;
use crate::qualify::{QualifyReport, qualify, volume_counts};
use crate::roster::Roster;

#[derive(Debug, Clone)]
pub struct LeaderboardRun {
    pub leaderboard: Leaderboard,
    pub run_values: RunValues,
    pub attribution: AttributionReport,
    pub qualify: QualifyReport,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub matrix: ExpectancyMatrix,
    pub leaderboard: LeaderboardRun,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub normalize: NormalizeReport,
    pub states: usize,
    pub attribution: Option<AttributionReport>,
    pub qualify: Option<QualifyReport>,
    pub actors: usize,
}

pub fn run_expectancy(log: &NormalizedLog, cfg: &EngineConfig) -> ExpectancyMatrix {
    cfg.with_pool(|| build_matrix(&log.episodes))
}

pub fn run_leaderboard(
    log: &NormalizedLog,
    oracle: &dyn ProbabilityOracle,
    roster: Option<&Roster>,
    cfg: &EngineConfig,
) -> LeaderboardRun {
    cfg.with_pool(|| {
        let pitches: Vec<&Pitch> = log.pitches().collect();
        let run_values = RunValues::from_pitches(pitches.iter().copied());
        log::info!(
            "run value per call: positive {:?}, negative {:?}",
            run_values.positive,
            run_values.negative
        );
        let volume = volume_counts(&pitches, roster);
        let (attributed, attribution) = attribute(&pitches, oracle, &run_values, roster);
        let (qualified, qualify_report) = qualify(&attributed, &volume, cfg);
        let leaderboard = build_leaderboard(&qualified, roster, &cfg.leaderboard);
        LeaderboardRun {
            leaderboard,
            run_values,
            attribution,
            qualify: qualify_report,
        }
    })
}

/// Validates configuration first; an invalid config aborts before any pass runs.
pub fn run_all(
    raw: &[RawPitch],
    oracle: &dyn ProbabilityOracle,
    roster: Option<&Roster>,
    cfg: &EngineConfig,
) -> Result<PipelineOutput, EngineError> {
    cfg.validate()?;
    let log = cfg.with_pool(|| normalize(raw, cfg));
    let matrix = run_expectancy(&log, cfg);
    let board = run_leaderboard(&log, oracle, roster, cfg);
    let summary = RunSummary {
        normalize: log.report.clone(),
        states: matrix.len(),
        attribution: Some(board.attribution.clone()),
        qualify: Some(board.qualify.clone()),
        actors: board.leaderboard.rows.len(),
    };
    Ok(PipelineOutput {
        matrix,
        leaderboard: board,
        summary,
    })
}

pub fn run_matrix_only(
    raw: &[RawPitch],
    cfg: &EngineConfig,
) -> Result<(ExpectancyMatrix, RunSummary), EngineError> {
    cfg.validate()?;
    let log = cfg.with_pool(|| normalize(raw, cfg));
    let matrix = run_expectancy(&log, cfg);
    let summary = RunSummary {
        normalize: log.report.clone(),
        states: matrix.len(),
        ..Default::default()
    };
    Ok((matrix, summary))
}
