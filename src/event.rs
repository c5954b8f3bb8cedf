use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::MalformedReason;
use crate::state_key::RunnerState;

/// Oracle input order. Changing it invalidates every serialized oracle artifact.
pub const PITCH_FEATURE_NAMES: [&str; 8] = [
    "stand", "p_throws", "balls", "strikes", "plate_x", "plate_z", "sz_top", "sz_bot",
];

/// A numeric cell as it arrives from a source: absent, parsed, or unparseable text.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Numeric {
    #[default]
    Missing,
    Value(f64),
    Invalid,
}

impl Numeric {
    pub fn from_f64(v: Option<f64>) -> Self {
        match v {
            Some(v) if v.is_finite() => Numeric::Value(v),
            Some(_) => Numeric::Invalid,
            None => Numeric::Missing,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
            return Numeric::Missing;
        }
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Numeric::Value(v),
            _ => Numeric::Invalid,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Numeric::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn integer(self) -> Result<i64, MalformedReason> {
        match self {
            Numeric::Missing => Err(MalformedReason::Missing),
            Numeric::Invalid => Err(MalformedReason::NonNumeric),
            Numeric::Value(v) if v.fract() != 0.0 => Err(MalformedReason::NonNumeric),
            Numeric::Value(v) => Ok(v as i64),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Numeric::Value(v) => serializer.serialize_some(v),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumericVisitor)
    }
}

struct NumericVisitor;

impl<'de> Visitor<'de> for NumericVisitor {
    type Value = Numeric;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, a numeric string or nothing")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Numeric, E> {
        Ok(Numeric::Value(v as f64))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Numeric, E> {
        Ok(Numeric::Value(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Numeric, E> {
        Ok(Numeric::from_f64(Some(v)))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Numeric, E> {
        Ok(Numeric::Invalid)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Numeric, E> {
        Ok(Numeric::parse(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Numeric, E> {
        Ok(Numeric::Missing)
    }

    fn visit_none<E: de::Error>(self) -> Result<Numeric, E> {
        Ok(Numeric::Missing)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Numeric, D::Error> {
        deserializer.deserialize_any(NumericVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPitch {
    pub game_pk: Numeric,
    pub inning: Numeric,
    pub inning_topbot: Option<String>,
    pub at_bat_number: Numeric,
    pub pitch_number: Numeric,
    pub balls: Numeric,
    pub strikes: Numeric,
    pub outs_when_up: Numeric,
    pub on_1b: Numeric,
    pub on_2b: Numeric,
    pub on_3b: Numeric,
    pub bat_score: Numeric,
    pub fld_score: Numeric,
    pub description: Option<String>,
    pub fielder_2: Numeric,
    pub stand: Option<String>,
    pub p_throws: Option<String>,
    pub plate_x: Numeric,
    pub plate_z: Numeric,
    pub sz_top: Numeric,
    pub sz_bot: Numeric,
    pub delta_run_exp: Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Half {
    Top,
    Bottom,
}

impl Half {
    pub fn parse(raw: &str) -> Option<Half> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" | "t" => Some(Half::Top),
            "bot" | "bottom" | "b" => Some(Half::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeId {
    pub game_pk: u64,
    pub inning: u16,
    pub half: Half,
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let half = match self.half {
            Half::Top => "Top",
            Half::Bottom => "Bot",
        };
        write!(f, "{}_{}_{}", self.game_pk, self.inning, half)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeClass {
    Positive,
    Negative,
    Other,
}

impl OutcomeClass {
    pub fn from_label(label: Option<&str>, positive: &str, negative: &str) -> OutcomeClass {
        match label.map(str::trim) {
            Some(l) if l == positive => OutcomeClass::Positive,
            Some(l) if l == negative => OutcomeClass::Negative,
            _ => OutcomeClass::Other,
        }
    }

    pub fn is_eligible(self) -> bool {
        !matches!(self, OutcomeClass::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn parse(raw: &str) -> Option<Handedness> {
        match raw.trim() {
            "L" | "l" => Some(Handedness::Left),
            "R" | "r" => Some(Handedness::Right),
            _ => None,
        }
    }

    fn as_feature(self) -> f64 {
        match self {
            Handedness::Left => 0.0,
            Handedness::Right => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchFeatures {
    pub stand: Handedness,
    pub p_throws: Handedness,
    pub balls: u8,
    pub strikes: u8,
    pub plate_x: f64,
    pub plate_z: f64,
    pub sz_top: f64,
    pub sz_bot: f64,
}

impl PitchFeatures {
    pub fn to_vector(&self) -> [f64; 8] {
        [
            self.stand.as_feature(),
            self.p_throws.as_feature(),
            f64::from(self.balls),
            f64::from(self.strikes),
            self.plate_x,
            self.plate_z,
            self.sz_top,
            self.sz_bot,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    pub episode: EpisodeId,
    pub at_bat_number: u32,
    pub pitch_number: u32,
    pub balls: u8,
    pub strikes: u8,
    pub outs: u8,
    pub runners: RunnerState,
    /// Combined runs of both clubs when the pitch was thrown.
    pub total_runs: i32,
    pub outcome: OutcomeClass,
    pub actor: Option<u32>,
    pub features: Option<PitchFeatures>,
    pub run_value: Option<f64>,
}

impl Pitch {
    pub fn ordinal(&self) -> (u32, u32) {
        (self.at_bat_number, self.pitch_number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    id: EpisodeId,
    pitches: Vec<Pitch>,
    terminal_runs: i32,
}

impl Episode {
    /// `pitches` must already be in ordinal order. Returns `None` when empty.
    pub fn new(id: EpisodeId, pitches: Vec<Pitch>) -> Option<Episode> {
        let terminal_runs = pitches.iter().map(|p| p.total_runs).max()?;
        Some(Episode {
            id,
            pitches,
            terminal_runs,
        })
    }

    pub fn id(&self) -> EpisodeId {
        self.id
    }

    pub fn pitches(&self) -> &[Pitch] {
        &self.pitches
    }

    pub fn terminal_runs(&self) -> i32 {
        self.terminal_runs
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn value_to_go(&self, pitch: &Pitch) -> i32 {
        self.terminal_runs - pitch.total_runs
    }

    pub fn with_value_to_go(&self) -> impl Iterator<Item = (&Pitch, i32)> + '_ {
        self.pitches.iter().map(|p| (p, self.value_to_go(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_parse_variants() {
        assert_eq!(Numeric::parse(""), Numeric::Missing);
        assert_eq!(Numeric::parse("NaN"), Numeric::Missing);
        assert_eq!(Numeric::parse(" 3 "), Numeric::Value(3.0));
        assert_eq!(Numeric::parse("668939.0"), Numeric::Value(668939.0));
        assert_eq!(Numeric::parse("three"), Numeric::Invalid);
        assert_eq!(Numeric::Value(2.5).integer(), Err(MalformedReason::NonNumeric));
        assert_eq!(Numeric::Value(2.0).integer(), Ok(2));
    }

    #[test]
    fn numeric_from_json() {
        #[derive(Deserialize)]
        struct Row {
            a: Numeric,
            b: Numeric,
            c: Numeric,
            #[serde(default)]
            d: Numeric,
        }
        let row: Row = serde_json::from_str(r#"{"a":4,"b":"x","c":null}"#).unwrap();
        assert_eq!(row.a, Numeric::Value(4.0));
        assert_eq!(row.b, Numeric::Invalid);
        assert_eq!(row.c, Numeric::Missing);
        assert_eq!(row.d, Numeric::Missing);
    }

    #[test]
    fn outcome_resolution_is_exact() {
        let p = OutcomeClass::from_label(Some("called_strike"), "called_strike", "ball");
        let n = OutcomeClass::from_label(Some("ball"), "called_strike", "ball");
        let o = OutcomeClass::from_label(Some("swinging_strike"), "called_strike", "ball");
        let none = OutcomeClass::from_label(None, "called_strike", "ball");
        assert_eq!(p, OutcomeClass::Positive);
        assert_eq!(n, OutcomeClass::Negative);
        assert_eq!(o, OutcomeClass::Other);
        assert_eq!(none, OutcomeClass::Other);
        assert!(!o.is_eligible());
    }

    #[test]
    fn episode_order_top_before_bottom() {
        let top = EpisodeId {
            game_pk: 1,
            inning: 3,
            half: Half::Top,
        };
        let bot = EpisodeId {
            half: Half::Bottom,
            ..top
        };
        assert!(top < bot);
        assert_eq!(bot.to_string(), "1_3_Bot");
        assert_eq!(Half::parse("Bot"), Some(Half::Bottom));
    }
}
