use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::play_store::{self, AVERAGE};

pub const ARTIFACT_VERSION: u32 = 1;
pub const DEFAULT_MIN_PLAYS: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PassersArtifact {
    version: u32,
    generated_at: String,
    #[serde(default)]
    source: Option<String>,
    seasons: BTreeMap<i32, Vec<String>>,
}

/// Quarterbacks offered per season. Every season lists [`AVERAGE`] first.
/// Loaded once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassersByYear {
    seasons: BTreeMap<i32, Vec<String>>,
}

impl PassersByYear {
    pub fn from_seasons(seasons: BTreeMap<i32, Vec<String>>) -> Self {
        let seasons = seasons
            .into_iter()
            .map(|(year, names)| (year, with_average_first(names)))
            .collect();
        Self { seasons }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read passers lookup {}", path.display()))?;
        let artifact = serde_json::from_str::<PassersArtifact>(&raw)
            .with_context(|| format!("parse passers lookup {}", path.display()))?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(anyhow!(
                "passers lookup version {} does not match expected {}",
                artifact.version,
                ARTIFACT_VERSION
            ));
        }
        Ok(Self::from_seasons(artifact.seasons))
    }

    pub fn save(&self, path: &Path, source: Option<&str>) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let artifact = PassersArtifact {
            version: ARTIFACT_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            source: source.map(str::to_string),
            seasons: self.seasons.clone(),
        };
        let json = serde_json::to_string_pretty(&artifact).context("serialize passers lookup")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).context("write passers lookup")?;
        fs::rename(&tmp, path).context("swap passers lookup")?;
        Ok(())
    }

    pub fn seasons(&self) -> impl Iterator<Item = i32> + '_ {
        self.seasons.keys().copied()
    }

    pub fn passers(&self, season: i32) -> &[String] {
        self.seasons.get(&season).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `{"2021": ["Average", ...]}` for the page's selection widgets.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.seasons).context("serialize passers lookup json")
    }
}

/// One entry per stored season: passers with at least `min_plays` plays.
pub fn build_from_db(conn: &Connection, min_plays: u32) -> Result<PassersByYear> {
    let mut seasons = BTreeMap::new();
    for season in play_store::seasons(conn)? {
        let names = play_store::passers_in_season(conn, season, min_plays)?;
        log::info!("season {season}: {} passers", names.len());
        seasons.insert(season, names);
    }
    Ok(PassersByYear::from_seasons(seasons))
}

fn with_average_first(names: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(names.len() + 1);
    out.push(AVERAGE.to_string());
    out.extend(names.into_iter().filter(|n| n != AVERAGE));
    out
}
