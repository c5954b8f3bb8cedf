use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::attribution::RunValues;
use crate::expectancy::{ExpectancyMatrix, ExpectancyRow};
use crate::leaderboard::{Leaderboard, LeaderboardColumn, LeaderboardRow, MetricTable};
use crate::normalize::NormalizeReport;

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ExpectancyArtifact {
    pub version: u32,
    pub generated_at: String,
    pub pitches: usize,
    pub normalize: NormalizeReport,
    pub cells: Vec<ExpectancyRow>,
}

impl ExpectancyArtifact {
    pub fn new(matrix: &ExpectancyMatrix, normalize: &NormalizeReport) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            pitches: matrix.pitches(),
            normalize: normalize.clone(),
            cells: matrix.rows(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardArtifact {
    pub version: u32,
    pub generated_at: String,
    pub volume_threshold: u64,
    pub edge_midpoint: f64,
    pub run_values: RunValues,
    pub global_mean: Option<f64>,
    pub tables: Vec<MetricTable>,
    pub rows: Vec<LeaderboardRow>,
}

impl LeaderboardArtifact {
    pub fn new(
        board: &Leaderboard,
        run_values: RunValues,
        volume_threshold: u64,
        edge_midpoint: f64,
    ) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            volume_threshold,
            edge_midpoint,
            run_values,
            global_mean: board.global_mean,
            tables: board.tables().into_iter().cloned().collect(),
            rows: board.rows.clone(),
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let raw = serde_json::to_string_pretty(value).context("serialize artifact")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Number(v as f64)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub matrix_rows: usize,
    pub pivot_rows: usize,
    pub leaderboard_rows: usize,
    pub metric_sheets: usize,
}

pub fn write_workbook(
    path: &Path,
    matrix: &ExpectancyMatrix,
    leaderboard: Option<&Leaderboard>,
) -> Result<ExportReport> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let matrix_rows = matrix_sheet_rows(matrix);
    let pivot_rows = pivot_sheet_rows(matrix);
    let board_rows = leaderboard.map(leaderboard_sheet_rows);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("RunExpectancy")?;
        write_rows(sheet, &matrix_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Pivot")?;
        write_rows(sheet, &pivot_rows)?;
    }
    if let Some(rows) = &board_rows {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Leaderboard")?;
        write_rows(sheet, rows)?;
    }
    let mut metric_sheets = 0;
    if let Some(board) = leaderboard {
        for table in board.tables() {
            let sheet = workbook.add_worksheet();
            sheet.set_name(metric_sheet_name(table))?;
            write_rows(sheet, &metric_sheet_rows(table))?;
            metric_sheets += 1;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        matrix_rows: matrix_rows.len().saturating_sub(1),
        pivot_rows: pivot_rows.len().saturating_sub(1),
        leaderboard_rows: board_rows.map_or(0, |r| r.len().saturating_sub(1)),
        metric_sheets,
    })
}

fn matrix_sheet_rows(matrix: &ExpectancyMatrix) -> Vec<Vec<Cell>> {
    let mut rows: Vec<Vec<Cell>> = vec![
        ["state", "runner_state", "outs", "count", "samples", "mean", "median"]
            .into_iter()
            .map(Cell::from)
            .collect(),
    ];
    for r in matrix.rows() {
        rows.push(vec![
            r.state.into(),
            r.runner_state.into(),
            Cell::Number(f64::from(r.outs)),
            r.count_state.into(),
            r.samples.into(),
            r.mean.into(),
            r.median.into(),
        ]);
    }
    rows
}

fn pivot_sheet_rows(matrix: &ExpectancyMatrix) -> Vec<Vec<Cell>> {
    let pivot = matrix.pivot();
    let mut header = vec![Cell::from("runner_state")];
    header.extend(
        pivot
            .columns
            .iter()
            .map(|(outs, count)| Cell::Text(format!("{outs}_{count}"))),
    );
    let mut rows = vec![header];
    for (runners, values) in pivot.rows.iter().zip(&pivot.values) {
        let mut row = vec![Cell::Text(runners.to_string())];
        row.extend(values.iter().map(|v| Cell::from(*v)));
        rows.push(row);
    }
    rows
}

fn leaderboard_sheet_rows(board: &Leaderboard) -> Vec<Vec<Cell>> {
    let mut rows: Vec<Vec<Cell>> = vec![
        [
            "actor",
            "name",
            "events",
            "total_value",
            "mean_value",
            "centered_mean",
            "run_value",
        ]
        .into_iter()
        .map(Cell::from)
        .collect(),
    ];
    for r in &board.rows {
        rows.push(vec![
            Cell::Number(f64::from(r.actor)),
            r.name.clone().into(),
            r.events.into(),
            r.total.into(),
            r.mean.into(),
            r.centered_mean.into(),
            r.run_value.into(),
        ]);
    }
    rows
}

fn metric_sheet_name(table: &MetricTable) -> &'static str {
    match table.metric {
        LeaderboardColumn::TotalValue => "TotalValue",
        LeaderboardColumn::CenteredMean => "CenteredMean",
        LeaderboardColumn::RunValue => "RunValue",
        LeaderboardColumn::MeanValue => "MeanValue",
        LeaderboardColumn::Events => "Events",
    }
}

fn metric_sheet_rows(table: &MetricTable) -> Vec<Vec<Cell>> {
    let mut rows: Vec<Vec<Cell>> = vec![
        ["rank", "actor", "events", table.metric.label()]
            .into_iter()
            .map(Cell::from)
            .collect(),
    ];
    for (idx, r) in table.rows.iter().enumerate() {
        rows.push(vec![
            Cell::from(idx + 1),
            Cell::Number(f64::from(r.actor)),
            r.events.into(),
            r.value.into(),
        ]);
    }
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            match value {
                Cell::Text(s) => worksheet.write_string(r, c, s).map(|_| ()),
                Cell::Number(n) => worksheet.write_number(r, c, *n).map(|_| ()),
                Cell::Empty => Ok(()),
            }
            .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
