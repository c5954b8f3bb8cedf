use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::event::{EpisodeId, OutcomeClass, Pitch};
use crate::oracle::{ProbabilityOracle, probability};
use crate::roster::Roster;
use crate::stats::mean;

pub fn value_delta(outcome: OutcomeClass, probability: f64) -> f64 {
    match outcome {
        OutcomeClass::Positive => 1.0 - probability,
        OutcomeClass::Negative => -probability,
        OutcomeClass::Other => 0.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunValues {
    pub positive: Option<f64>,
    pub negative: Option<f64>,
}

impl RunValues {
    pub fn from_pitches<'a, I>(pitches: I) -> Self
    where
        I: IntoIterator<Item = &'a Pitch>,
    {
        let mut pos = Vec::new();
        let mut neg = Vec::new();
        for pitch in pitches {
            let Some(v) = pitch.run_value else {
                continue;
            };
            match pitch.outcome {
                OutcomeClass::Positive => pos.push(v),
                OutcomeClass::Negative => neg.push(v),
                OutcomeClass::Other => {}
            }
        }
        Self {
            positive: mean(&pos),
            negative: mean(&neg),
        }
    }

    pub fn for_outcome(&self, outcome: OutcomeClass) -> Option<f64> {
        match outcome {
            OutcomeClass::Positive => self.positive,
            OutcomeClass::Negative => self.negative,
            OutcomeClass::Other => None,
        }
    }

    /// `|delta|` scaled by the class constant; additive across pitches.
    pub fn runs(&self, outcome: OutcomeClass, delta: f64) -> Option<f64> {
        self.for_outcome(outcome).map(|v| delta.abs() * v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedPitch {
    pub actor: u32,
    pub episode: EpisodeId,
    pub at_bat_number: u32,
    pub pitch_number: u32,
    pub outcome: OutcomeClass,
    pub probability: f64,
    pub delta: f64,
    pub runs: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributionReport {
    pub considered: usize,
    pub attributed: usize,
    pub unresolved_actor: usize,
    pub missing_features: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    UnresolvedActor,
    MissingFeatures,
}

pub fn resolve_actor(pitch: &Pitch, roster: Option<&Roster>) -> Result<u32, EngineError> {
    match (pitch.actor, roster) {
        (Some(id), Some(roster)) if roster.contains(id) => Ok(id),
        (Some(id), None) => Ok(id),
        (actor, _) => Err(EngineError::UnresolvedActor { actor }),
    }
}

pub fn attribute_pitch(
    pitch: &Pitch,
    oracle: &dyn ProbabilityOracle,
    run_values: &RunValues,
    roster: Option<&Roster>,
) -> Result<AttributedPitch, Skip> {
    let actor = resolve_actor(pitch, roster).map_err(|_| Skip::UnresolvedActor)?;
    let features = pitch.features.ok_or(Skip::MissingFeatures)?;
    let p = probability(oracle, &features.to_vector());
    let delta = value_delta(pitch.outcome, p);
    Ok(AttributedPitch {
        actor,
        episode: pitch.episode,
        at_bat_number: pitch.at_bat_number,
        pitch_number: pitch.pitch_number,
        outcome: pitch.outcome,
        probability: p,
        delta,
        runs: run_values.runs(pitch.outcome, delta),
    })
}

/// Only called pitches are considered. Output order follows input order.
pub fn attribute(
    pitches: &[&Pitch],
    oracle: &dyn ProbabilityOracle,
    run_values: &RunValues,
    roster: Option<&Roster>,
) -> (Vec<AttributedPitch>, AttributionReport) {
    let results: Vec<Result<AttributedPitch, Skip>> = pitches
        .par_iter()
        .filter(|p| p.outcome.is_eligible())
        .map(|p| attribute_pitch(p, oracle, run_values, roster))
        .collect();

    let mut report = AttributionReport {
        considered: results.len(),
        ..Default::default()
    };
    let mut out = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(row) => out.push(row),
            Err(Skip::UnresolvedActor) => report.unresolved_actor += 1,
            Err(Skip::MissingFeatures) => report.missing_features += 1,
        }
    }
    report.attributed = out.len();

    if report.unresolved_actor > 0 {
        log::warn!(
            "{} pitches have no resolvable actor and are left out of attribution",
            report.unresolved_actor
        );
    }
    if report.missing_features > 0 {
        log::warn!(
            "{} pitches lack a complete feature vector and were not scored",
            report.missing_features
        );
    }
    (out, report)
}
