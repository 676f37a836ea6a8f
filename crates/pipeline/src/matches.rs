//! Season catalogues: `{data_dir}/ipl_{year}.json`, each a JSON array of
//! match objects numbered from 1 in file order.

use std::path::{Path, PathBuf};

use crickcast_core::error::CoreError;
use crickcast_core::naming::{validate_year, UNKNOWN_TEAM};
use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;

const CATALOG_PREFIX: &str = "ipl_";
const CATALOG_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchSummary {
    pub number: u32,
    pub label: String,
    pub teams: Vec<String>,
}

/// One match picked out of a catalogue.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub year: String,
    pub number: u32,
    pub teams: Vec<String>,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct MatchCatalog {
    data_dir: PathBuf,
}

impl MatchCatalog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Years with a catalogue file, newest first.
    pub async fn years(&self) -> Result<Vec<String>, PipelineError> {
        let mut years = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(years),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(year) = name
                .to_str()
                .and_then(|n| n.strip_prefix(CATALOG_PREFIX))
                .and_then(|n| n.strip_suffix(CATALOG_SUFFIX))
            else {
                continue;
            };
            if validate_year(year).is_ok() {
                years.push(year.to_string());
            }
        }
        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }

    pub async fn load(&self, year: &str) -> Result<Vec<Value>, PipelineError> {
        validate_year(year)?;
        let path = self
            .data_dir
            .join(format!("{CATALOG_PREFIX}{year}{CATALOG_SUFFIX}"));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::NotFound {
                    entity: "Season",
                    id: year.to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&raw)?;
        match value {
            Value::Array(matches) => Ok(matches),
            _ => Err(CoreError::Validation(format!("{} is not a JSON array", path.display())).into()),
        }
    }

    pub async fn list(&self, year: &str) -> Result<Vec<MatchSummary>, PipelineError> {
        let matches = self.load(year).await?;
        Ok(matches
            .iter()
            .zip(1u32..)
            .map(|(m, number)| {
                let teams = teams_of(m);
                let team_info = if teams.is_empty() {
                    "Unknown teams".to_string()
                } else {
                    teams.join(" vs ")
                };
                MatchSummary {
                    number,
                    label: format!("Match {number}: {team_info}"),
                    teams,
                }
            })
            .collect())
    }

    /// Fetch match `number` (1-based). Out-of-range numbers are a
    /// validation error.
    pub async fn get(&self, year: &str, number: u32) -> Result<MatchRecord, PipelineError> {
        let matches = self.load(year).await?;
        let data = number
            .checked_sub(1)
            .and_then(|idx| matches.into_iter().nth(idx as usize))
            .ok_or_else(|| CoreError::Validation("Invalid match number".into()))?;
        let mut teams = teams_of(&data);
        if teams.is_empty() {
            teams = vec![UNKNOWN_TEAM.to_string(), UNKNOWN_TEAM.to_string()];
        }
        Ok(MatchRecord {
            year: year.to_string(),
            number,
            teams,
            data,
        })
    }
}

fn teams_of(m: &Value) -> Vec<String> {
    m.get("teams")
        .and_then(Value::as_array)
        .map(|teams| {
            teams
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
