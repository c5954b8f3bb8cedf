use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::attribution::{AttributedPitch, resolve_actor};
use crate::config::EngineConfig;
use crate::event::{OutcomeClass, Pitch};
use crate::roster::Roster;

/// Called pitches per actor, counted before the edge filter.
pub fn volume_counts(pitches: &[&Pitch], roster: Option<&Roster>) -> HashMap<u32, u64> {
    pitches
        .par_iter()
        .filter(|p| p.outcome.is_eligible())
        .filter_map(|p| resolve_actor(p, roster).ok())
        .fold(HashMap::new, |mut acc: HashMap<u32, u64>, actor| {
            *acc.entry(actor).or_insert(0) += 1;
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (actor, n) in b {
                *a.entry(actor).or_insert(0) += n;
            }
            a
        })
}

pub fn passes_edge(outcome: OutcomeClass, probability: f64, midpoint: f64) -> bool {
    match outcome {
        OutcomeClass::Positive => probability < midpoint,
        OutcomeClass::Negative => probability > midpoint,
        OutcomeClass::Other => false,
    }
}

pub fn passes_volume(actor: u32, volume: &HashMap<u32, u64>, threshold: u64) -> bool {
    volume.get(&actor).copied().unwrap_or(0) >= threshold
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualifyReport {
    pub volume_threshold: u64,
    pub actors_seen: usize,
    pub actors_qualified: usize,
    pub failed_volume: usize,
    pub failed_edge: usize,
    pub qualified: usize,
}

pub fn qualify<'a>(
    attributed: &'a [AttributedPitch],
    volume: &HashMap<u32, u64>,
    cfg: &EngineConfig,
) -> (Vec<&'a AttributedPitch>, QualifyReport) {
    let threshold = cfg.volume_threshold();
    let mut report = QualifyReport {
        volume_threshold: threshold,
        actors_seen: volume.len(),
        actors_qualified: volume.values().filter(|n| **n >= threshold).count(),
        ..Default::default()
    };

    let mut out = Vec::new();
    for row in attributed.iter().filter(|r| r.outcome.is_eligible()) {
        let volume_ok = passes_volume(row.actor, volume, threshold);
        let edge_ok = passes_edge(row.outcome, row.probability, cfg.edge_midpoint);
        if !volume_ok {
            report.failed_volume += 1;
        }
        if !edge_ok {
            report.failed_edge += 1;
        }
        if volume_ok && edge_ok {
            out.push(row);
        }
    }
    report.qualified = out.len();
    log::info!(
        "qualified {} pitches from {} of {} actors (threshold {threshold}, midpoint {})",
        report.qualified,
        report.actors_qualified,
        report.actors_seen,
        cfg.edge_midpoint
    );
    (out, report)
}
