use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::attribution::AttributedPitch;
use crate::roster::Roster;
use crate::stats::{mean, ordered_sum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardColumn {
    Events,
    #[default]
    TotalValue,
    MeanValue,
    CenteredMean,
    RunValue,
}

impl LeaderboardColumn {
    pub fn label(self) -> &'static str {
        match self {
            LeaderboardColumn::Events => "events",
            LeaderboardColumn::TotalValue => "total_value",
            LeaderboardColumn::MeanValue => "mean_value",
            LeaderboardColumn::CenteredMean => "centered_mean",
            LeaderboardColumn::RunValue => "run_value",
        }
    }
}

/// Sort declarations. Run value defaults to ascending: realized run value is
/// batting-side signed, so the most negative total is the most valuable actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardSort {
    pub total: SortOrder,
    pub centered_mean: SortOrder,
    pub run_value: SortOrder,
    pub primary: LeaderboardColumn,
    pub primary_order: SortOrder,
}

impl Default for LeaderboardSort {
    fn default() -> Self {
        Self {
            total: SortOrder::Desc,
            centered_mean: SortOrder::Desc,
            run_value: SortOrder::Asc,
            primary: LeaderboardColumn::TotalValue,
            primary_order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorAggregate {
    pub actor: u32,
    pub events: usize,
    pub total: f64,
    pub mean: f64,
    pub centered_mean: f64,
    pub run_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRow {
    pub actor: u32,
    pub events: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTable {
    pub metric: LeaderboardColumn,
    pub order: SortOrder,
    pub rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn new(metric: LeaderboardColumn, order: SortOrder, mut rows: Vec<MetricRow>) -> Self {
        rows.sort_by(|a, b| {
            order
                .apply(a.value.total_cmp(&b.value))
                .then(a.actor.cmp(&b.actor))
        });
        Self {
            metric,
            order,
            rows,
        }
    }

    pub fn get(&self, actor: u32) -> Option<&MetricRow> {
        self.rows.iter().find(|r| r.actor == actor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub actor: u32,
    pub name: Option<String>,
    pub events: Option<usize>,
    pub total: Option<f64>,
    pub mean: Option<f64>,
    pub centered_mean: Option<f64>,
    pub run_value: Option<f64>,
}

impl LeaderboardRow {
    fn empty(actor: u32) -> Self {
        Self {
            actor,
            name: None,
            events: None,
            total: None,
            mean: None,
            centered_mean: None,
            run_value: None,
        }
    }

    pub fn column(&self, column: LeaderboardColumn) -> Option<f64> {
        match column {
            LeaderboardColumn::Events => self.events.map(|n| n as f64),
            LeaderboardColumn::TotalValue => self.total,
            LeaderboardColumn::MeanValue => self.mean,
            LeaderboardColumn::CenteredMean => self.centered_mean,
            LeaderboardColumn::RunValue => self.run_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub global_mean: Option<f64>,
    pub total: MetricTable,
    pub centered_mean: MetricTable,
    pub run_value: MetricTable,
    pub rows: Vec<LeaderboardRow>,
}

impl Leaderboard {
    pub fn tables(&self) -> [&MetricTable; 3] {
        [&self.total, &self.centered_mean, &self.run_value]
    }
}

#[derive(Default)]
struct ActorValues {
    deltas: Vec<f64>,
    runs: Vec<f64>,
}

fn group_by_actor(qualified: &[&AttributedPitch]) -> HashMap<u32, ActorValues> {
    qualified
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<u32, ActorValues>, row| {
            let slot = acc.entry(row.actor).or_default();
            slot.deltas.push(row.delta);
            if let Some(runs) = row.runs {
                slot.runs.push(runs);
            }
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (actor, vals) in b {
                let slot = a.entry(actor).or_default();
                slot.deltas.extend(vals.deltas);
                slot.runs.extend(vals.runs);
            }
            a
        })
}

pub fn aggregate(qualified: &[&AttributedPitch]) -> (Vec<ActorAggregate>, Option<f64>) {
    let all: Vec<f64> = qualified.iter().map(|r| r.delta).collect();
    let global_mean = mean(&all);
    let mut out: Vec<ActorAggregate> = group_by_actor(qualified)
        .into_iter()
        .filter_map(|(actor, vals)| {
            let actor_mean = mean(&vals.deltas)?;
            Some(ActorAggregate {
                actor,
                events: vals.deltas.len(),
                total: ordered_sum(&vals.deltas),
                mean: actor_mean,
                centered_mean: actor_mean - global_mean.unwrap_or(0.0),
                run_value: (!vals.runs.is_empty()).then(|| ordered_sum(&vals.runs)),
            })
        })
        .collect();
    out.sort_by_key(|a| a.actor);
    (out, global_mean)
}

/// Outer join by actor; absent columns stay `None`.
pub fn merge(
    total: &MetricTable,
    centered_mean: &MetricTable,
    run_value: &MetricTable,
    roster: Option<&Roster>,
) -> BTreeMap<u32, LeaderboardRow> {
    let mut rows: BTreeMap<u32, LeaderboardRow> = BTreeMap::new();
    for r in &total.rows {
        let row = rows
            .entry(r.actor)
            .or_insert_with(|| LeaderboardRow::empty(r.actor));
        row.events = Some(r.events);
        row.total = Some(r.value);
        row.mean = (r.events > 0).then(|| r.value / r.events as f64);
    }
    for r in &centered_mean.rows {
        let row = rows
            .entry(r.actor)
            .or_insert_with(|| LeaderboardRow::empty(r.actor));
        row.events = row.events.or(Some(r.events));
        row.centered_mean = Some(r.value);
    }
    for r in &run_value.rows {
        let row = rows
            .entry(r.actor)
            .or_insert_with(|| LeaderboardRow::empty(r.actor));
        row.events = row.events.or(Some(r.events));
        row.run_value = Some(r.value);
    }
    if let Some(roster) = roster {
        for row in rows.values_mut() {
            row.name = roster.name(row.actor).map(str::to_string);
        }
    }
    rows
}

/// Orders rows by `column`; `None` always sorts last, ties break on actor id.
pub fn sort_rows(rows: &mut [LeaderboardRow], column: LeaderboardColumn, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord = match (a.column(column), b.column(column)) {
            (Some(x), Some(y)) => order.apply(x.total_cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        ord.then(a.actor.cmp(&b.actor))
    });
}

pub fn build_leaderboard(
    qualified: &[&AttributedPitch],
    roster: Option<&Roster>,
    sort: &LeaderboardSort,
) -> Leaderboard {
    let (aggregates, global_mean) = aggregate(qualified);

    let total = MetricTable::new(
        LeaderboardColumn::TotalValue,
        sort.total,
        aggregates
            .iter()
            .map(|a| MetricRow {
                actor: a.actor,
                events: a.events,
                value: a.total,
            })
            .collect(),
    );
    let centered_mean = MetricTable::new(
        LeaderboardColumn::CenteredMean,
        sort.centered_mean,
        aggregates
            .iter()
            .map(|a| MetricRow {
                actor: a.actor,
                events: a.events,
                value: a.centered_mean,
            })
            .collect(),
    );
    let run_value = MetricTable::new(
        LeaderboardColumn::RunValue,
        sort.run_value,
        aggregates
            .iter()
            .filter_map(|a| {
                a.run_value.map(|value| MetricRow {
                    actor: a.actor,
                    events: a.events,
                    value,
                })
            })
            .collect(),
    );

    let mut rows: Vec<LeaderboardRow> = merge(&total, &centered_mean, &run_value, roster)
        .into_values()
        .collect();
    sort_rows(&mut rows, sort.primary, sort.primary_order);
    log::info!(
        "leaderboard: {} actors, sorted by {} {:?}",
        rows.len(),
        sort.primary.label(),
        sort.primary_order
    );

    Leaderboard {
        global_mean,
        total,
        centered_mean,
        run_value,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EpisodeId, Half, OutcomeClass};

    fn row(actor: u32, delta: f64, runs: Option<f64>) -> AttributedPitch {
        AttributedPitch {
            actor,
            episode: EpisodeId {
                game_pk: 1,
                inning: 1,
                half: Half::Top,
            },
            at_bat_number: 1,
            pitch_number: 1,
            outcome: if delta >= 0.0 {
                OutcomeClass::Positive
            } else {
                OutcomeClass::Negative
            },
            probability: 0.5,
            delta,
            runs,
        }
    }

    #[test]
    fn aggregates_sum_mean_and_center() {
        let rows = vec![
            row(1, 0.6, Some(-0.03)),
            row(1, 0.4, Some(-0.02)),
            row(2, -0.7, Some(0.035)),
        ];
        let refs: Vec<&AttributedPitch> = rows.iter().collect();
        let (aggs, global) = aggregate(&refs);
        let global = global.unwrap();
        assert!((global - 0.1).abs() < 1e-12);
        assert_eq!(aggs[0].actor, 1);
        assert_eq!(aggs[0].events, 2);
        assert!((aggs[0].total - 1.0).abs() < 1e-12);
        assert!((aggs[0].centered_mean - 0.4).abs() < 1e-12);
        assert!((aggs[1].centered_mean + 0.8).abs() < 1e-12);
    }

    #[test]
    fn merge_is_a_true_outer_join() {
        let total = MetricTable::new(
            LeaderboardColumn::TotalValue,
            SortOrder::Desc,
            vec![MetricRow {
                actor: 1,
                events: 3,
                value: 1.5,
            }],
        );
        let centered = MetricTable::new(LeaderboardColumn::CenteredMean, SortOrder::Desc, vec![]);
        let run_value = MetricTable::new(
            LeaderboardColumn::RunValue,
            SortOrder::Asc,
            vec![MetricRow {
                actor: 2,
                events: 4,
                value: -0.2,
            }],
        );
        let merged = merge(&total, &centered, &run_value, None);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&1].total, Some(1.5));
        assert_eq!(merged[&1].run_value, None);
        assert_eq!(merged[&1].centered_mean, None);
        assert_eq!(merged[&2].total, None);
        assert_eq!(merged[&2].run_value, Some(-0.2));
    }

    #[test]
    fn missing_run_value_sorts_last() {
        let rows = vec![
            row(1, 0.6, None),
            row(2, 0.2, Some(-0.01)),
            row(3, 0.4, Some(-0.05)),
        ];
        let refs: Vec<&AttributedPitch> = rows.iter().collect();
        let sort = LeaderboardSort {
            primary: LeaderboardColumn::RunValue,
            primary_order: SortOrder::Asc,
            ..LeaderboardSort::default()
        };
        let board = build_leaderboard(&refs, None, &sort);
        let order: Vec<u32> = board.rows.iter().map(|r| r.actor).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(board.run_value.rows.len(), 2);
        assert_eq!(board.rows[2].total, Some(0.6));
    }

    #[test]
    fn default_sort_is_total_descending_with_names() {
        let rows = vec![row(7, 0.1, None), row(8, 0.9, None)];
        let refs: Vec<&AttributedPitch> = rows.iter().collect();
        let roster = Roster::from_pairs([(8u32, "Catcher Eight")]);
        let board = build_leaderboard(&refs, Some(&roster), &LeaderboardSort::default());
        assert_eq!(board.rows[0].actor, 8);
        assert_eq!(board.rows[0].name.as_deref(), Some("Catcher Eight"));
        assert_eq!(board.rows[1].name, None);
        assert_eq!(board.total.rows[0].actor, 8);
    }
}
