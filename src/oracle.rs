use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::event::{OutcomeClass, PITCH_FEATURE_NAMES, Pitch};

/// Probability of the positive call for a `PitchFeatures::to_vector` input.
pub trait ProbabilityOracle: Sync {
    fn predict(&self, features: &[f64; 8]) -> f64;
}

impl<F> ProbabilityOracle for F
where
    F: Fn(&[f64; 8]) -> f64 + Sync,
{
    fn predict(&self, features: &[f64; 8]) -> f64 {
        self(features)
    }
}

/// Oracle output forced into [0, 1]; NaN is treated as maximally uncertain.
pub fn probability(oracle: &dyn ProbabilityOracle, features: &[f64; 8]) -> f64 {
    let p = oracle.predict(features);
    if p.is_nan() { 0.5 } else { p.clamp(0.0, 1.0) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticOracleArtifact {
    pub version: u32,
    #[serde(default)]
    pub generated_at: String,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub val_log_loss: Option<f64>,
    #[serde(default)]
    pub val_accuracy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct LogisticOracle {
    means: [f64; 8],
    stds: [f64; 8],
    coeffs: [f64; 8],
    intercept: f64,
}

impl LogisticOracle {
    pub fn from_artifact(artifact: &LogisticOracleArtifact) -> Result<Self, EngineError> {
        check_feature_contract(&artifact.feature_names)?;
        let coeffs = fixed(&artifact.coeffs, "coeffs", None)?;
        let means = fixed(&artifact.feature_means, "feature_means", Some(0.0))?;
        let stds = fixed(&artifact.feature_stds, "feature_stds", Some(1.0))?;
        if !artifact.intercept.is_finite() {
            return Err(EngineError::FeatureContract(
                "intercept is not finite".to_string(),
            ));
        }
        Ok(Self {
            means,
            stds,
            coeffs,
            intercept: artifact.intercept,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read oracle artifact {}", path.display()))?;
        let artifact = serde_json::from_str::<LogisticOracleArtifact>(&raw)
            .with_context(|| format!("parse oracle artifact {}", path.display()))?;
        let oracle = Self::from_artifact(&artifact)?;
        log::info!(
            "loaded oracle v{} from {} (val log loss {:?})",
            artifact.version,
            path.display(),
            artifact.val_log_loss
        );
        Ok(oracle)
    }
}

impl ProbabilityOracle for LogisticOracle {
    fn predict(&self, features: &[f64; 8]) -> f64 {
        let mut z = self.intercept;
        for idx in 0..features.len() {
            let sigma = self.stds[idx].max(1e-6);
            z += self.coeffs[idx] * (features[idx] - self.means[idx]) / sigma;
        }
        1.0 / (1.0 + (-z).exp())
    }
}

/// Names must match the pitch feature vector exactly and in order.
pub fn check_feature_contract(names: &[String]) -> Result<(), EngineError> {
    for (idx, expected) in PITCH_FEATURE_NAMES.iter().enumerate() {
        match names.get(idx) {
            Some(name) if name == expected => {}
            Some(name) => {
                return Err(EngineError::FeatureContract(format!(
                    "feature #{idx} is {name:?}, expected {expected:?}"
                )));
            }
            None => {
                return Err(EngineError::FeatureContract(format!(
                    "missing required feature {expected:?}"
                )));
            }
        }
    }
    if names.len() > PITCH_FEATURE_NAMES.len() {
        return Err(EngineError::FeatureContract(format!(
            "unexpected extra features {:?}",
            &names[PITCH_FEATURE_NAMES.len()..]
        )));
    }
    Ok(())
}

fn fixed(values: &[f64], what: &str, fill: Option<f64>) -> Result<[f64; 8], EngineError> {
    if values.is_empty()
        && let Some(fill) = fill
    {
        return Ok([fill; 8]);
    }
    let arr: [f64; 8] = values.try_into().map_err(|_| {
        EngineError::FeatureContract(format!("{what} has {} entries, expected 8", values.len()))
    })?;
    if arr.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::FeatureContract(format!(
            "{what} contains non-finite values"
        )));
    }
    Ok(arr)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OracleMetrics {
    pub samples: usize,
    pub accuracy: f64,
    pub log_loss: f64,
    pub brier: f64,
}

pub fn evaluate_oracle<'a, I>(oracle: &dyn ProbabilityOracle, pitches: I) -> Option<OracleMetrics>
where
    I: IntoIterator<Item = &'a Pitch>,
{
    let mut samples = 0usize;
    let mut correct = 0usize;
    let mut log_loss_sum = 0.0_f64;
    let mut brier_sum = 0.0_f64;

    for pitch in pitches {
        let y = match pitch.outcome {
            OutcomeClass::Positive => 1.0,
            OutcomeClass::Negative => 0.0,
            OutcomeClass::Other => continue,
        };
        let Some(features) = pitch.features else {
            continue;
        };
        let p = probability(oracle, &features.to_vector());
        samples += 1;
        if (p > 0.5) == (y == 1.0) {
            correct += 1;
        }
        let p_actual = if y == 1.0 { p } else { 1.0 - p }.clamp(1e-12, 1.0);
        log_loss_sum += -p_actual.ln();
        brier_sum += (p - y).powi(2);
    }

    if samples == 0 {
        return None;
    }
    let n = samples as f64;
    Some(OracleMetrics {
        samples,
        accuracy: correct as f64 / n,
        log_loss: log_loss_sum / n,
        brier: brier_sum / n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> LogisticOracleArtifact {
        LogisticOracleArtifact {
            version: 1,
            generated_at: "x".to_string(),
            feature_names: PITCH_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            feature_means: Vec::new(),
            feature_stds: Vec::new(),
            coeffs: vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            intercept: 0.0,
            val_log_loss: None,
            val_accuracy: None,
        }
    }

    #[test]
    fn zero_model_is_a_coin_flip() {
        let oracle = LogisticOracle::from_artifact(&artifact()).unwrap();
        let p = oracle.predict(&[1.0, 1.0, 0.0, 0.0, 0.2, 2.5, 3.4, 1.6]);
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn plate_distance_drives_probability() {
        let mut a = artifact();
        a.coeffs[4] = -3.0;
        a.intercept = 1.0;
        let oracle = LogisticOracle::from_artifact(&a).unwrap();
        let middle = oracle.predict(&[1.0, 1.0, 0.0, 0.0, 0.0, 2.5, 3.4, 1.6]);
        let away = oracle.predict(&[1.0, 1.0, 0.0, 0.0, 1.5, 2.5, 3.4, 1.6]);
        assert!(middle > away);
    }

    #[test]
    fn missing_feature_is_fatal() {
        let mut a = artifact();
        a.feature_names.retain(|n| n != "sz_bot");
        let err = LogisticOracle::from_artifact(&a).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("sz_bot"));

        let mut swapped = artifact();
        swapped.feature_names.swap(4, 5);
        assert!(LogisticOracle::from_artifact(&swapped).is_err());
    }

    #[test]
    fn coefficient_count_must_match() {
        let mut a = artifact();
        a.coeffs.pop();
        assert!(matches!(
            LogisticOracle::from_artifact(&a),
            Err(EngineError::FeatureContract(_))
        ));
    }

    #[test]
    fn closures_are_oracles_and_output_is_clamped() {
        let wild = |_: &[f64; 8]| 1.7;
        assert_eq!(probability(&wild, &[0.0; 8]), 1.0);
        let nan = |_: &[f64; 8]| f64::NAN;
        assert_eq!(probability(&nan, &[0.0; 8]), 0.5);
    }
}
