use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::play_store::fetch_plays;
use crate::scoring::{QuarterbackProfile, score_profile};

/// One (quarterback, season) pick from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub qb: String,
    pub year: i32,
}

impl Selection {
    pub fn new(qb: impl Into<String>, year: i32) -> Self {
        Self {
            qb: qb.into(),
            year,
        }
    }

    pub fn label(&self) -> String {
        selection_label(&self.qb, self.year)
    }
}

/// `'YY Name`, with the year taken modulo 100 (2100 renders as `'00`).
pub fn selection_label(qb: &str, year: i32) -> String {
    format!("'{:02} {}", year.rem_euclid(100), qb)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledProfile {
    pub label: String,
    pub profile: QuarterbackProfile,
}

/// Labeled profiles in selection order. Colliding labels are kept as separate entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comparison {
    pub entries: Vec<LabeledProfile>,
}

impl Comparison {
    pub fn first_label(&self) -> Option<&str> {
        self.entries.first().map(|e| e.label.as_str())
    }

    pub fn second_label(&self) -> Option<&str> {
        self.entries.get(1).map(|e| e.label.as_str())
    }
}

pub fn profile_for(conn: &Connection, selection: &Selection) -> Result<LabeledProfile> {
    let label = selection.label();
    let plays = fetch_plays(conn, &selection.qb, selection.year)
        .with_context(|| format!("load plays for {label}"))?;
    let profile = score_profile(&plays).with_context(|| format!("no plays for {label}"))?;
    Ok(LabeledProfile { label, profile })
}

/// Scores `a` then `b` against the same connection.
pub fn compare(conn: &Connection, a: &Selection, b: &Selection) -> Result<Comparison> {
    let first = profile_for(conn, a)?;
    let second = profile_for(conn, b)?;
    Ok(Comparison {
        entries: vec![first, second],
    })
}
