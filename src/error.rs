use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordField {
    GamePk,
    Inning,
    InningTopBot,
    AtBatNumber,
    PitchNumber,
    Balls,
    Strikes,
    OutsWhenUp,
    OnFirst,
    OnSecond,
    OnThird,
    BatScore,
    FldScore,
}

impl RecordField {
    pub fn column(self) -> &'static str {
        match self {
            RecordField::GamePk => "game_pk",
            RecordField::Inning => "inning",
            RecordField::InningTopBot => "inning_topbot",
            RecordField::AtBatNumber => "at_bat_number",
            RecordField::PitchNumber => "pitch_number",
            RecordField::Balls => "balls",
            RecordField::Strikes => "strikes",
            RecordField::OutsWhenUp => "outs_when_up",
            RecordField::OnFirst => "on_1b",
            RecordField::OnSecond => "on_2b",
            RecordField::OnThird => "on_3b",
            RecordField::BatScore => "bat_score",
            RecordField::FldScore => "fld_score",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    Missing,
    NonNumeric,
    OutOfRange,
    Unrecognized,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::Missing => f.write_str("missing"),
            MalformedReason::NonNumeric => f.write_str("non-numeric"),
            MalformedReason::OutOfRange => f.write_str("out of range"),
            MalformedReason::Unrecognized => f.write_str("unrecognized"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Per-record; the record is dropped and counted, the run continues.
    #[error("malformed record #{index}: {field} is {reason}")]
    MalformedRecord {
        index: usize,
        field: RecordField,
        reason: MalformedReason,
    },

    /// Per-record; the pitch stays in the expectancy pass but is not attributed.
    #[error("unresolved actor {actor:?}")]
    UnresolvedActor { actor: Option<u32> },

    #[error("oracle feature contract violated: {0}")]
    FeatureContract(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Fatal errors abort the run before any aggregation begins.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::FeatureContract(_) | EngineError::InvalidConfig(_)
        )
    }
}
