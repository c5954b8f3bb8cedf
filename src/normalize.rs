use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{EngineError, MalformedReason, RecordField};
use crate::event::{
    Episode, EpisodeId, Half, Handedness, Numeric, OutcomeClass, Pitch, PitchFeatures, RawPitch,
};
use crate::state_key::{RunnerState, clamp_balls};

const MAX_OUTS: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub input: usize,
    pub accepted: usize,
    pub dropped: usize,
    pub dropped_by_field: BTreeMap<String, usize>,
    pub clamped_balls: usize,
    pub episodes: usize,
}

#[derive(Debug, Clone)]
pub struct NormalizedLog {
    pub episodes: Vec<Episode>,
    pub report: NormalizeReport,
}

impl NormalizedLog {
    pub fn pitches(&self) -> impl Iterator<Item = &Pitch> + '_ {
        self.episodes.iter().flat_map(|e| e.pitches().iter())
    }

    pub fn pitch_count(&self) -> usize {
        self.episodes.iter().map(Episode::len).sum()
    }
}

/// Rows sharing an ordering key keep their input order.
pub fn normalize(raw: &[RawPitch], cfg: &EngineConfig) -> NormalizedLog {
    let validated: Vec<Result<(Pitch, bool), EngineError>> = raw
        .par_iter()
        .enumerate()
        .map(|(index, row)| validate_record(index, row, cfg))
        .collect();

    let mut report = NormalizeReport {
        input: raw.len(),
        ..Default::default()
    };
    let mut pitches = Vec::with_capacity(validated.len());
    for result in validated {
        match result {
            Ok((pitch, clamped)) => {
                if clamped {
                    report.clamped_balls += 1;
                }
                pitches.push(pitch);
            }
            Err(EngineError::MalformedRecord {
                index,
                field,
                reason,
            }) => {
                log::debug!("dropping record #{index}: {field} is {reason}");
                report.dropped += 1;
                *report
                    .dropped_by_field
                    .entry(field.column().to_string())
                    .or_insert(0) += 1;
            }
            Err(other) => {
                log::debug!("dropping record: {other}");
                report.dropped += 1;
            }
        }
    }

    // Stable, so duplicate ordinals stay in input order.
    pitches.par_sort_by_key(|p| (p.episode, p.at_bat_number, p.pitch_number));
    report.accepted = pitches.len();

    let episodes = group_episodes(pitches);
    report.episodes = episodes.len();

    if report.dropped > 0 {
        log::warn!(
            "dropped {} of {} records as malformed: {:?}",
            report.dropped,
            report.input,
            report.dropped_by_field
        );
    }
    log::info!(
        "normalized {} pitches into {} episodes ({} counts clamped)",
        report.accepted,
        report.episodes,
        report.clamped_balls
    );

    NormalizedLog { episodes, report }
}

fn group_episodes(pitches: Vec<Pitch>) -> Vec<Episode> {
    let mut episodes = Vec::new();
    let mut current: Vec<Pitch> = Vec::new();
    let mut current_id: Option<EpisodeId> = None;

    for pitch in pitches {
        if current_id != Some(pitch.episode) {
            if let Some(id) = current_id
                && let Some(episode) = Episode::new(id, std::mem::take(&mut current))
            {
                episodes.push(episode);
            }
            current_id = Some(pitch.episode);
        }
        current.push(pitch);
    }
    if let Some(id) = current_id
        && let Some(episode) = Episode::new(id, current)
    {
        episodes.push(episode);
    }
    episodes
}

pub fn validate_record(
    index: usize,
    raw: &RawPitch,
    cfg: &EngineConfig,
) -> Result<(Pitch, bool), EngineError> {
    let malformed = |field: RecordField, reason: MalformedReason| EngineError::MalformedRecord {
        index,
        field,
        reason,
    };
    let int_in = |field: RecordField,
                  value: Numeric,
                  lo: i64,
                  hi: i64|
     -> Result<i64, EngineError> {
        let v = value.integer().map_err(|reason| malformed(field, reason))?;
        if v < lo || v > hi {
            return Err(malformed(field, MalformedReason::OutOfRange));
        }
        Ok(v)
    };

    let game_pk = int_in(RecordField::GamePk, raw.game_pk, 0, i64::MAX)? as u64;
    let inning = int_in(RecordField::Inning, raw.inning, 1, i64::from(u16::MAX))? as u16;
    let half = match raw.inning_topbot.as_deref() {
        None => return Err(malformed(RecordField::InningTopBot, MalformedReason::Missing)),
        Some(s) if s.trim().is_empty() => {
            return Err(malformed(RecordField::InningTopBot, MalformedReason::Missing));
        }
        Some(s) => Half::parse(s)
            .ok_or_else(|| malformed(RecordField::InningTopBot, MalformedReason::Unrecognized))?,
    };
    let at_bat_number =
        int_in(RecordField::AtBatNumber, raw.at_bat_number, 0, i64::from(u32::MAX))? as u32;
    let pitch_number =
        int_in(RecordField::PitchNumber, raw.pitch_number, 0, i64::from(u32::MAX))? as u32;

    let recorded_balls = int_in(RecordField::Balls, raw.balls, 0, i64::from(u8::MAX))? as u8;
    let strikes = int_in(RecordField::Strikes, raw.strikes, 0, i64::from(u8::MAX))? as u8;
    let outs = int_in(RecordField::OutsWhenUp, raw.outs_when_up, 0, MAX_OUTS)? as u8;
    let balls = clamp_balls(recorded_balls, cfg.max_balls);

    let runners = RunnerState::new(
        occupied(raw.on_1b).map_err(|r| malformed(RecordField::OnFirst, r))?,
        occupied(raw.on_2b).map_err(|r| malformed(RecordField::OnSecond, r))?,
        occupied(raw.on_3b).map_err(|r| malformed(RecordField::OnThird, r))?,
    );

    let bat_score = int_in(RecordField::BatScore, raw.bat_score, 0, i64::from(i32::MAX / 2))?;
    let fld_score = int_in(RecordField::FldScore, raw.fld_score, 0, i64::from(i32::MAX / 2))?;

    let outcome = OutcomeClass::from_label(
        raw.description.as_deref(),
        cfg.positive_label.trim(),
        cfg.negative_label.trim(),
    );

    let pitch = Pitch {
        episode: EpisodeId {
            game_pk,
            inning,
            half,
        },
        at_bat_number,
        pitch_number,
        balls,
        strikes,
        outs,
        runners,
        total_runs: (bat_score + fld_score) as i32,
        outcome,
        actor: actor_id(raw.fielder_2),
        features: features(raw, balls, strikes),
        run_value: raw.delta_run_exp.value(),
    };
    Ok((pitch, balls != recorded_balls))
}

/// Runner columns hold the runner's id, or nothing when the base is empty.
fn occupied(value: Numeric) -> Result<bool, MalformedReason> {
    match value {
        Numeric::Missing => Ok(false),
        Numeric::Value(v) => Ok(v != 0.0),
        Numeric::Invalid => Err(MalformedReason::NonNumeric),
    }
}

fn actor_id(value: Numeric) -> Option<u32> {
    let v = value.integer().ok()?;
    u32::try_from(v).ok().filter(|id| *id != 0)
}

fn features(raw: &RawPitch, balls: u8, strikes: u8) -> Option<PitchFeatures> {
    Some(PitchFeatures {
        stand: Handedness::parse(raw.stand.as_deref()?)?,
        p_throws: Handedness::parse(raw.p_throws.as_deref()?)?,
        balls,
        strikes,
        plate_x: raw.plate_x.value()?,
        plate_z: raw.plate_z.value()?,
        sz_top: raw.sz_top.value()?,
        sz_bot: raw.sz_bot.value()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(game: f64, inning: f64, half: &str, ab: f64, pn: f64) -> RawPitch {
        RawPitch {
            game_pk: Numeric::Value(game),
            inning: Numeric::Value(inning),
            inning_topbot: Some(half.to_string()),
            at_bat_number: Numeric::Value(ab),
            pitch_number: Numeric::Value(pn),
            balls: Numeric::Value(0.0),
            strikes: Numeric::Value(0.0),
            outs_when_up: Numeric::Value(0.0),
            bat_score: Numeric::Value(0.0),
            fld_score: Numeric::Value(0.0),
            description: Some("ball".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn orders_out_of_order_input_into_episodes() {
        let raw = vec![
            row(1.0, 1.0, "Bot", 8.0, 1.0),
            row(1.0, 1.0, "Top", 2.0, 1.0),
            row(1.0, 1.0, "Top", 1.0, 2.0),
            row(1.0, 1.0, "Top", 1.0, 1.0),
            row(1.0, 2.0, "Top", 12.0, 1.0),
        ];
        let log = normalize(&raw, &EngineConfig::default());
        assert_eq!(log.report.episodes, 3);
        let first = &log.episodes[0];
        assert_eq!(first.id().half, Half::Top);
        let ordinals: Vec<(u32, u32)> = first.pitches().iter().map(Pitch::ordinal).collect();
        assert_eq!(ordinals, vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(log.episodes[1].id().half, Half::Bottom);
        assert_eq!(log.episodes[2].id().inning, 2);
    }

    #[test]
    fn ties_keep_input_order() {
        let mut a = row(5.0, 1.0, "Top", 1.0, 1.0);
        a.description = Some("first".to_string());
        let mut b = row(5.0, 1.0, "Top", 1.0, 1.0);
        b.description = Some("ball".to_string());
        let cfg = EngineConfig {
            positive_label: "first".to_string(),
            ..EngineConfig::default()
        };
        let log = normalize(&[a, b], &cfg);
        let outcomes: Vec<OutcomeClass> = log.pitches().map(|p| p.outcome).collect();
        assert_eq!(outcomes, vec![OutcomeClass::Positive, OutcomeClass::Negative]);
    }

    #[test]
    fn malformed_rows_are_dropped_and_counted() {
        let mut missing = row(1.0, 1.0, "Top", 1.0, 1.0);
        missing.at_bat_number = Numeric::Missing;
        let mut bad = row(1.0, 1.0, "Top", 1.0, 2.0);
        bad.balls = Numeric::Invalid;
        let mut half = row(1.0, 1.0, "Middle", 1.0, 3.0);
        half.inning_topbot = Some("Middle".to_string());
        let good = row(1.0, 1.0, "Top", 1.0, 4.0);

        let log = normalize(&[missing, bad, half, good], &EngineConfig::default());
        assert_eq!(log.report.input, 4);
        assert_eq!(log.report.accepted, 1);
        assert_eq!(log.report.dropped, 3);
        assert_eq!(log.report.dropped_by_field.get("at_bat_number"), Some(&1));
        assert_eq!(log.report.dropped_by_field.get("balls"), Some(&1));
        assert_eq!(log.report.dropped_by_field.get("inning_topbot"), Some(&1));
    }

    #[test]
    fn four_ball_counts_are_clamped_before_encoding() {
        let mut r = row(1.0, 1.0, "Top", 1.0, 1.0);
        r.balls = Numeric::Value(4.0);
        r.strikes = Numeric::Value(2.0);
        let (pitch, clamped) = validate_record(0, &r, &EngineConfig::default()).unwrap();
        assert!(clamped);
        assert_eq!(pitch.balls, 3);

        let mut again = r.clone();
        again.balls = Numeric::Value(f64::from(pitch.balls));
        let (pitch2, clamped2) = validate_record(0, &again, &EngineConfig::default()).unwrap();
        assert!(!clamped2);
        assert_eq!(pitch2, pitch);
    }

    #[test]
    fn runner_ids_become_occupancy() {
        let mut r = row(1.0, 1.0, "Top", 1.0, 1.0);
        r.on_3b = Numeric::Value(668939.0);
        let (pitch, _) = validate_record(0, &r, &EngineConfig::default()).unwrap();
        assert_eq!(pitch.runners, RunnerState::new(false, false, true));

        r.on_1b = Numeric::Invalid;
        let err = validate_record(3, &r, &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            EngineError::MalformedRecord {
                index: 3,
                field: RecordField::OnFirst,
                reason: MalformedReason::NonNumeric,
            }
        );
    }

    #[test]
    fn features_need_every_column() {
        let mut r = row(1.0, 1.0, "Top", 1.0, 1.0);
        r.stand = Some("R".to_string());
        r.p_throws = Some("L".to_string());
        r.plate_x = Numeric::Value(0.1);
        r.plate_z = Numeric::Value(2.4);
        r.sz_top = Numeric::Value(3.4);
        let (pitch, _) = validate_record(0, &r, &EngineConfig::default()).unwrap();
        assert!(pitch.features.is_none());

        r.sz_bot = Numeric::Value(1.6);
        let (pitch, _) = validate_record(0, &r, &EngineConfig::default()).unwrap();
        let v = pitch.features.unwrap().to_vector();
        assert_eq!(v, [1.0, 0.0, 0.0, 0.0, 0.1, 2.4, 3.4, 1.6]);
    }
}
