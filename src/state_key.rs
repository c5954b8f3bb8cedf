use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Pitch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountState {
    pub balls: u8,
    pub strikes: u8,
}

impl fmt::Display for CountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.balls, self.strikes)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunnerState {
    pub first: bool,
    pub second: bool,
    pub third: bool,
}

impl RunnerState {
    pub const EMPTY: RunnerState = RunnerState {
        first: false,
        second: false,
        third: false,
    };

    pub fn new(first: bool, second: bool, third: bool) -> Self {
        Self {
            first,
            second,
            third,
        }
    }

    /// Third-second-first bit pattern, matching the printed `"101"` form.
    pub fn bits(self) -> u8 {
        (u8::from(self.third) << 2) | (u8::from(self.second) << 1) | u8::from(self.first)
    }

    pub fn occupied(self) -> u8 {
        u8::from(self.first) + u8::from(self.second) + u8::from(self.third)
    }
}

impl Ord for RunnerState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits().cmp(&other.bits())
    }
}

impl PartialOrd for RunnerState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            u8::from(self.third),
            u8::from(self.second),
            u8::from(self.first)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub count: CountState,
    pub outs: u8,
    pub runners: RunnerState,
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.count, self.outs, self.runners)
    }
}

pub fn encode(pitch: &Pitch) -> StateKey {
    StateKey {
        count: CountState {
            balls: pitch.balls,
            strikes: pitch.strikes,
        },
        outs: pitch.outs,
        runners: pitch.runners,
    }
}

/// Statcast occasionally records the walk pitch at four balls; fold it back to the ceiling.
pub fn clamp_balls(balls: u8, max_balls: u8) -> u8 {
    balls.min(max_balls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EpisodeId, Half, OutcomeClass};

    fn pitch(balls: u8, strikes: u8, outs: u8, runners: RunnerState, game_pk: u64) -> Pitch {
        Pitch {
            episode: EpisodeId {
                game_pk,
                inning: 1,
                half: Half::Top,
            },
            at_bat_number: 1,
            pitch_number: 1,
            balls,
            strikes,
            outs,
            runners,
            total_runs: 0,
            outcome: OutcomeClass::Other,
            actor: Some(game_pk as u32),
            features: None,
            run_value: None,
        }
    }

    #[test]
    fn positional_runner_identity() {
        let third_only = encode(&pitch(1, 1, 0, RunnerState::new(false, false, true), 1));
        let first_only = encode(&pitch(1, 1, 0, RunnerState::new(true, false, false), 1));
        assert_ne!(third_only, first_only);
        assert_eq!(third_only.runners.to_string(), "100");
        assert_eq!(first_only.runners.to_string(), "001");
        assert_eq!(third_only.runners.occupied(), first_only.runners.occupied());
    }

    #[test]
    fn identical_situations_share_a_key_across_games() {
        let runners = RunnerState::new(true, false, true);
        let a = encode(&pitch(3, 2, 1, runners, 10));
        let b = encode(&pitch(3, 2, 1, runners, 99));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "3-2_1_101");
    }

    #[test]
    fn clamping_is_idempotent() {
        for balls in 0..=6u8 {
            let once = clamp_balls(balls, 3);
            assert!(once <= 3);
            assert_eq!(clamp_balls(once, 3), once);
        }
        assert_eq!(clamp_balls(4, 3), 3);
        assert_eq!(clamp_balls(2, 3), 2);
    }

    #[test]
    fn runner_order_follows_bit_pattern() {
        let mut states = vec![
            RunnerState::new(false, false, true),
            RunnerState::EMPTY,
            RunnerState::new(true, true, false),
        ];
        states.sort();
        let printed: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        assert_eq!(printed, vec!["000", "011", "100"]);
    }
}
