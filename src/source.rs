use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

use crate::event::{Numeric, RawPitch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "parquet" | "pq" => Ok(SourceFormat::Parquet),
            _ => Err(anyhow!(
                "unsupported event file {} (expected .csv or .parquet)",
                path.display()
            )),
        }
    }
}

pub fn read_events(path: &Path) -> Result<Vec<RawPitch>> {
    let rows = match SourceFormat::from_path(path)? {
        SourceFormat::Csv => read_csv(path)?,
        SourceFormat::Parquet => read_parquet(path)?,
    };
    log::info!("read {} raw pitches from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn read_csv(path: &Path) -> Result<Vec<RawPitch>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_csv_from(file).with_context(|| format!("decode {}", path.display()))
}

/// Header-keyed; unknown columns are ignored and absent ones stay `Missing`.
pub fn read_csv_from<R: Read>(reader: R) -> Result<Vec<RawPitch>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<RawPitch>().enumerate() {
        let row = row.with_context(|| format!("csv row {}", idx + 1))?;
        out.push(row);
    }
    Ok(out)
}

pub fn read_parquet(path: &Path) -> Result<Vec<RawPitch>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader events")?;
    let iter = reader.get_row_iter(None).context("iterate event rows")?;

    let mut out = Vec::new();
    let mut unreadable = 0usize;
    for row in iter {
        let Ok(row) = row else {
            unreadable += 1;
            continue;
        };
        let mut raw = RawPitch::default();
        for (name, field) in row.get_column_iter() {
            set_column(&mut raw, name, field);
        }
        out.push(raw);
    }
    if unreadable > 0 {
        log::warn!("{}: skipped {unreadable} unreadable rows", path.display());
    }
    Ok(out)
}

fn field_numeric(field: &Field) -> Numeric {
    match field {
        Field::Null => Numeric::Missing,
        Field::Byte(v) => Numeric::Value(f64::from(*v)),
        Field::Short(v) => Numeric::Value(f64::from(*v)),
        Field::Int(v) => Numeric::Value(f64::from(*v)),
        Field::Long(v) => Numeric::Value(*v as f64),
        Field::UByte(v) => Numeric::Value(f64::from(*v)),
        Field::UShort(v) => Numeric::Value(f64::from(*v)),
        Field::UInt(v) => Numeric::Value(f64::from(*v)),
        Field::ULong(v) => Numeric::Value(*v as f64),
        Field::Float(v) => Numeric::from_f64(Some(f64::from(*v))),
        Field::Double(v) => Numeric::from_f64(Some(*v)),
        Field::Str(s) => Numeric::parse(s),
        _ => Numeric::Invalid,
    }
}

fn field_string(field: &Field) -> Option<String> {
    match field {
        Field::Null => None,
        Field::Str(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn set_column(raw: &mut RawPitch, name: &str, field: &Field) {
    match name {
        "game_pk" => raw.game_pk = field_numeric(field),
        "inning" => raw.inning = field_numeric(field),
        "inning_topbot" => raw.inning_topbot = field_string(field),
        "at_bat_number" => raw.at_bat_number = field_numeric(field),
        "pitch_number" => raw.pitch_number = field_numeric(field),
        "balls" => raw.balls = field_numeric(field),
        "strikes" => raw.strikes = field_numeric(field),
        "outs_when_up" => raw.outs_when_up = field_numeric(field),
        "on_1b" => raw.on_1b = field_numeric(field),
        "on_2b" => raw.on_2b = field_numeric(field),
        "on_3b" => raw.on_3b = field_numeric(field),
        "bat_score" => raw.bat_score = field_numeric(field),
        "fld_score" => raw.fld_score = field_numeric(field),
        "description" => raw.description = field_string(field),
        "fielder_2" => raw.fielder_2 = field_numeric(field),
        "stand" => raw.stand = field_string(field),
        "p_throws" => raw.p_throws = field_string(field),
        "plate_x" => raw.plate_x = field_numeric(field),
        "plate_z" => raw.plate_z = field_numeric(field),
        "sz_top" => raw.sz_top = field_numeric(field),
        "sz_bot" => raw.sz_bot = field_numeric(field),
        "delta_run_exp" => raw.delta_run_exp = field_numeric(field),
        _ => {}
    }
}
