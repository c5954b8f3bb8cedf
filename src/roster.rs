use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default)]
pub struct Roster {
    names: HashMap<u32, String>,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    mlb_id: Option<u32>,
    mlb_name: Option<String>,
}

impl Roster {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(id, n)| (id, n.into())).collect(),
        }
    }

    /// Reads an `mlb_id,mlb_name` CSV; rows without both columns are skipped.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open roster {}", path.display()))?;
        let mut names = HashMap::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<RosterRow>() {
            let row = row.with_context(|| format!("decode roster row in {}", path.display()))?;
            match (row.mlb_id, row.mlb_name) {
                (Some(id), Some(name)) if !name.trim().is_empty() => {
                    names.insert(id, name.trim().to_string());
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            log::warn!("roster {}: skipped {skipped} incomplete rows", path.display());
        }
        Ok(Self { names })
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.names.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
