// src/data.rs - Session log of admitted gestures, with CSV export
use anyhow::Result;
use chrono::{DateTime, Local};
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::dispatch::{Command, Outcome};
use crate::tracking::{FingerVector, GestureSymbol};

#[derive(Debug, Clone)]
pub struct GestureEntry {
    pub time: DateTime<Local>,
    pub session_secs: f64,
    pub symbol: GestureSymbol,
    pub fingers: Option<FingerVector>,
    pub command: Command,
    pub result: String,
    pub frame: usize,
}

#[derive(Debug, Serialize)]
struct GestureRecord {
    timestamp: String,
    session_secs: f64,
    gesture: GestureSymbol,
    fingers: String,
    command: String,
    result: String,
    frame: usize,
}

pub struct GestureLog {
    output_dir: PathBuf,
    session_name: String,
    entries: Vec<GestureEntry>,
}

impl GestureLog {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            entries: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        session_secs: f64,
        symbol: GestureSymbol,
        fingers: Option<FingerVector>,
        command: Command,
        outcome: &Outcome,
        frame: usize,
    ) {
        self.entries.push(GestureEntry {
            time: Local::now(),
            session_secs,
            symbol,
            fingers,
            command,
            result: outcome.message().unwrap_or_else(|| "ok".to_string()),
            frame,
        });
    }

    pub fn entries(&self) -> &[GestureEntry] {
        &self.entries
    }

    /// Newest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &GestureEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.output_dir
            .join(&self.session_name)
            .join("gestures.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for entry in &self.entries {
            writer.serialize(GestureRecord {
                timestamp: entry.time.to_rfc3339(),
                session_secs: entry.session_secs,
                gesture: entry.symbol,
                fingers: entry.fingers.map(|f| f.to_string()).unwrap_or_default(),
                command: entry.command.to_string(),
                result: entry.result.clone(),
                frame: entry.frame,
            })?;
        }

        writer.flush()?;
        Ok(csv_path)
    }
}
