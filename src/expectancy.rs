use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::Episode;
use crate::state_key::{CountState, RunnerState, StateKey, encode};
use crate::stats::{mean_i32, median_sorted_i32};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectancyCell {
    pub samples: usize,
    pub mean: f64,
    pub median: f64,
}

impl ExpectancyCell {
    /// `None` when no pitch landed in the state; empty cells are never zero-filled.
    pub fn from_values(values: &mut [i32]) -> Option<ExpectancyCell> {
        values.sort_unstable();
        Some(ExpectancyCell {
            samples: values.len(),
            mean: mean_i32(values)?,
            median: median_sorted_i32(values)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectancyRow {
    pub state: String,
    pub runner_state: String,
    pub outs: u8,
    pub count_state: String,
    pub samples: usize,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyFilter {
    pub runners: Option<RunnerState>,
    pub outs: Option<u8>,
    pub count: Option<CountState>,
}

impl KeyFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn outs(mut self, outs: u8) -> Self {
        self.outs = Some(outs);
        self
    }

    pub fn runners(mut self, runners: RunnerState) -> Self {
        self.runners = Some(runners);
        self
    }

    pub fn count(mut self, count: CountState) -> Self {
        self.count = Some(count);
        self
    }
}

type RunnerMap = BTreeMap<RunnerState, BTreeMap<CountState, ExpectancyCell>>;

/// Nested outs → runners → count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectancyMatrix {
    by_outs: BTreeMap<u8, RunnerMap>,
    pitches: usize,
}

impl ExpectancyMatrix {
    pub fn from_values(values: HashMap<StateKey, Vec<i32>>) -> Self {
        let mut by_outs: BTreeMap<u8, RunnerMap> = BTreeMap::new();
        let mut pitches = 0usize;
        for (key, mut vals) in values {
            let Some(cell) = ExpectancyCell::from_values(&mut vals) else {
                continue;
            };
            pitches += cell.samples;
            by_outs
                .entry(key.outs)
                .or_default()
                .entry(key.runners)
                .or_default()
                .insert(key.count, cell);
        }
        Self { by_outs, pitches }
    }

    pub fn get(&self, key: &StateKey) -> Option<&ExpectancyCell> {
        self.by_outs
            .get(&key.outs)?
            .get(&key.runners)?
            .get(&key.count)
    }

    pub fn for_outs(&self, outs: u8) -> Option<&RunnerMap> {
        self.by_outs.get(&outs)
    }

    pub fn query(&self, filter: KeyFilter) -> Vec<(StateKey, &ExpectancyCell)> {
        let mut out = Vec::new();
        for (outs, runner_map) in &self.by_outs {
            if filter.outs.is_some_and(|o| o != *outs) {
                continue;
            }
            for (runners, count_map) in runner_map {
                if filter.runners.is_some_and(|r| r != *runners) {
                    continue;
                }
                let mut push = |count: &CountState, cell| {
                    out.push((
                        StateKey {
                            count: *count,
                            outs: *outs,
                            runners: *runners,
                        },
                        cell,
                    ));
                };
                match filter.count {
                    Some(count) => {
                        if let Some(cell) = count_map.get(&count) {
                            push(&count, cell);
                        }
                    }
                    None => {
                        for (count, cell) in count_map {
                            push(count, cell);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn cells(&self) -> Vec<(StateKey, &ExpectancyCell)> {
        self.query(KeyFilter::any())
    }

    pub fn len(&self) -> usize {
        self.by_outs
            .values()
            .flat_map(|m| m.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_outs.is_empty()
    }

    pub fn pitches(&self) -> usize {
        self.pitches
    }

    pub fn outs_values(&self) -> Vec<u8> {
        self.by_outs.keys().copied().collect()
    }

    pub fn max_mean(&self) -> Option<f64> {
        self.cells()
            .into_iter()
            .map(|(_, c)| c.mean)
            .max_by(f64::total_cmp)
    }

    pub fn rows(&self) -> Vec<ExpectancyRow> {
        self.cells()
            .into_iter()
            .map(|(key, cell)| ExpectancyRow {
                state: key.to_string(),
                runner_state: key.runners.to_string(),
                outs: key.outs,
                count_state: key.count.to_string(),
                samples: cell.samples,
                mean: cell.mean,
                median: cell.median,
            })
            .collect()
    }

    pub fn pivot(&self) -> PivotTable {
        let mut runners: BTreeSet<RunnerState> = BTreeSet::new();
        let mut columns: BTreeSet<(u8, CountState)> = BTreeSet::new();
        for (key, _) in self.cells() {
            runners.insert(key.runners);
            columns.insert((key.outs, key.count));
        }
        let rows: Vec<RunnerState> = runners.into_iter().collect();
        let columns: Vec<(u8, CountState)> = columns.into_iter().collect();
        let values = rows
            .iter()
            .map(|runners| {
                columns
                    .iter()
                    .map(|(outs, count)| {
                        self.get(&StateKey {
                            count: *count,
                            outs: *outs,
                            runners: *runners,
                        })
                        .map(|c| c.mean)
                    })
                    .collect()
            })
            .collect();
        PivotTable {
            rows,
            columns,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub rows: Vec<RunnerState>,
    pub columns: Vec<(u8, CountState)>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn build_matrix(episodes: &[Episode]) -> ExpectancyMatrix {
    let values = episodes
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<StateKey, Vec<i32>>, episode| {
            for (pitch, to_go) in episode.with_value_to_go() {
                acc.entry(encode(pitch)).or_default().push(to_go);
            }
            acc
        })
        .reduce(HashMap::new, merge_values);
    let matrix = ExpectancyMatrix::from_values(values);
    log::info!(
        "expectancy matrix: {} states from {} pitches in {} episodes",
        matrix.len(),
        matrix.pitches(),
        episodes.len()
    );
    matrix
}

fn merge_values(
    mut a: HashMap<StateKey, Vec<i32>>,
    b: HashMap<StateKey, Vec<i32>>,
) -> HashMap<StateKey, Vec<i32>> {
    for (key, vals) in b {
        a.entry(key).or_default().extend(vals);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EpisodeId, Half, OutcomeClass, Pitch};

    fn pitch(ab: u32, balls: u8, strikes: u8, outs: u8, runs: i32) -> Pitch {
        Pitch {
            episode: EpisodeId {
                game_pk: 1,
                inning: 1,
                half: Half::Top,
            },
            at_bat_number: ab,
            pitch_number: 1,
            balls,
            strikes,
            outs,
            runners: RunnerState::EMPTY,
            total_runs: runs,
            outcome: OutcomeClass::Other,
            actor: None,
            features: None,
            run_value: None,
        }
    }

    fn episode(game_pk: u64, pitches: Vec<Pitch>) -> Episode {
        let id = EpisodeId {
            game_pk,
            inning: 1,
            half: Half::Top,
        };
        let pitches = pitches
            .into_iter()
            .map(|mut p| {
                p.episode = id;
                p
            })
            .collect();
        Episode::new(id, pitches).unwrap()
    }

    #[test]
    fn value_to_go_backfills_terminal_runs() {
        let ep = episode(
            1,
            vec![pitch(1, 0, 0, 0, 0), pitch(2, 0, 0, 0, 0), pitch(3, 0, 0, 1, 2)],
        );
        let to_go: Vec<i32> = ep.with_value_to_go().map(|(_, v)| v).collect();
        assert_eq!(ep.terminal_runs(), 2);
        assert_eq!(to_go, vec![2, 2, 0]);
    }

    #[test]
    fn cells_hold_mean_and_median() {
        let episodes = vec![
            episode(1, vec![pitch(1, 0, 0, 0, 0), pitch(2, 1, 0, 1, 1)]),
            episode(2, vec![pitch(1, 0, 0, 0, 3), pitch(2, 1, 0, 1, 3)]),
            episode(3, vec![pitch(1, 0, 0, 0, 0), pitch(2, 1, 0, 1, 0)]),
        ];
        let m = build_matrix(&episodes);
        let key = StateKey {
            count: CountState {
                balls: 0,
                strikes: 0,
            },
            outs: 0,
            runners: RunnerState::EMPTY,
        };
        let cell = m.get(&key).unwrap();
        assert_eq!(cell.samples, 3);
        assert!((cell.mean - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(cell.median, 0.0);
        assert_eq!(m.pitches(), 6);
    }

    #[test]
    fn empty_states_are_absent() {
        let m = build_matrix(&[episode(1, vec![pitch(1, 0, 0, 0, 0)])]);
        assert_eq!(m.len(), 1);
        let missing = StateKey {
            count: CountState {
                balls: 3,
                strikes: 2,
            },
            outs: 2,
            runners: RunnerState::new(true, true, true),
        };
        assert!(m.get(&missing).is_none());
        assert!(m.for_outs(2).is_none());
    }

    #[test]
    fn partial_key_queries() {
        let episodes = vec![episode(
            1,
            vec![
                pitch(1, 0, 0, 0, 0),
                pitch(2, 1, 0, 0, 0),
                pitch(3, 1, 0, 1, 0),
                pitch(4, 2, 2, 2, 1),
            ],
        )];
        let m = build_matrix(&episodes);
        assert_eq!(m.query(KeyFilter::any().outs(0)).len(), 2);
        let one_zero = CountState {
            balls: 1,
            strikes: 0,
        };
        assert_eq!(m.query(KeyFilter::any().count(one_zero)).len(), 2);
        assert_eq!(
            m.query(KeyFilter::any().outs(1).count(one_zero).runners(RunnerState::EMPTY))
                .len(),
            1
        );
        assert_eq!(m.outs_values(), vec![0, 1, 2]);
    }

    #[test]
    fn pivot_leaves_holes_as_none() {
        let episodes = vec![episode(1, vec![pitch(1, 0, 0, 0, 0), pitch(2, 1, 0, 1, 0)])];
        let pivot = build_matrix(&episodes).pivot();
        assert_eq!(pivot.rows, vec![RunnerState::EMPTY]);
        assert_eq!(pivot.columns.len(), 2);
        assert!(pivot.values[0].iter().all(Option::is_some));
    }
}
