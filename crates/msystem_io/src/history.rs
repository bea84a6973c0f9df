//! Run log sink.
//!
//! A log directory holds three append-only files:
//! - `notifications.jsonl`: one [`LogRecord::Notification`] per step
//! - `snapshots.jsonl`: one [`LogRecord::Snapshot`] per step
//! - `summary.log`: one delimited line per trial and per batch
//!
//! Every sink sits behind its own mutex so parallel batch trials can share
//! one logger.

use crate::error::Result;
use msystem_core::{BatchSummary, Notification, SimError, StepSnapshot, TileStats};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub const NOTIFICATIONS_FILE: &str = "notifications.jsonl";
pub const SNAPSHOTS_FILE: &str = "snapshots.jsonl";
pub const SUMMARY_FILE: &str = "summary.log";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event")]
pub enum LogRecord {
    Notification {
        run_id: Uuid,
        trial: usize,
        timestamp: String,
        step: u64,
        message: String,
    },
    Snapshot {
        run_id: Uuid,
        trial: usize,
        timestamp: String,
        snapshot: StepSnapshot,
    },
}

type Sink = Mutex<Option<BufWriter<File>>>;

fn open_append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn write_line(sink: &Sink, line: &str) -> Result<()> {
    let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(file) = guard.as_mut() {
        writeln!(file, "{}", line)?;
        file.flush()?;
    }
    Ok(())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub struct RunLogger {
    dir: PathBuf,
    run_id: Uuid,
    fingerprint: String,
    notifications: Sink,
    snapshots: Sink,
    summary: Sink,
}

impl RunLogger {
    /// Opens (or creates) the log directory `dir`.
    ///
    /// `fingerprint` tags every summary line with the configuration it came from.
    pub fn new_at<P: AsRef<Path>>(dir: P, fingerprint: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            notifications: Mutex::new(Some(open_append(&dir.join(NOTIFICATIONS_FILE))?)),
            snapshots: Mutex::new(Some(open_append(&dir.join(SNAPSHOTS_FILE))?)),
            summary: Mutex::new(Some(open_append(&dir.join(SUMMARY_FILE))?)),
            dir,
            run_id: Uuid::new_v4(),
            fingerprint: fingerprint.to_string(),
        })
    }

    /// A logger that discards everything.
    #[must_use]
    pub fn new_dummy() -> Self {
        Self {
            dir: PathBuf::new(),
            run_id: Uuid::new_v4(),
            fingerprint: String::new(),
            notifications: Mutex::new(None),
            snapshots: Mutex::new(None),
            summary: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_notification(&self, trial: usize, notification: &Notification) -> Result<()> {
        let record = LogRecord::Notification {
            run_id: self.run_id,
            trial,
            timestamp: now(),
            step: notification.step,
            message: notification.message.clone(),
        };
        write_line(&self.notifications, &serde_json::to_string(&record)?)
    }

    pub fn log_snapshot(&self, trial: usize, snapshot: &StepSnapshot) -> Result<()> {
        let record = LogRecord::Snapshot {
            run_id: self.run_id,
            trial,
            timestamp: now(),
            snapshot: snapshot.clone(),
        };
        write_line(&self.snapshots, &serde_json::to_string(&record)?)
    }

    fn summary_line(&self, body: &str) -> String {
        format!("{};{};{};{}", now(), self.run_id, self.fingerprint, body)
    }

    pub fn log_trial(&self, trial: usize, seed: u64, stats: &TileStats) -> Result<()> {
        let line = self.summary_line(&format!("trial={trial};seed={seed};{stats}"));
        write_line(&self.summary, &line)
    }

    pub fn log_trial_failure(&self, trial: usize, seed: u64, error: &SimError) -> Result<()> {
        let line = self.summary_line(&format!("trial={trial};seed={seed};failed={error}"));
        write_line(&self.summary, &line)
    }

    pub fn log_batch(&self, summary: &BatchSummary) -> Result<()> {
        let line = self.summary_line(&format!("batch;{summary}"));
        write_line(&self.summary, &line)
    }

    /// Every notification record in the log directory, oldest first.
    pub fn read_notifications(&self) -> Result<Vec<LogRecord>> {
        let file = match File::open(self.dir.join(NOTIFICATIONS_FILE)) {
            Ok(f) => f,
            Err(_) => return Ok(vec![]),
        };
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for l in reader.lines().map_while(std::result::Result::ok) {
            if let Ok(record) = serde_json::from_str::<LogRecord>(&l) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn read_summary_lines(&self) -> Result<Vec<String>> {
        let file = match File::open(self.dir.join(SUMMARY_FILE)) {
            Ok(f) => f,
            Err(_) => return Ok(vec![]),
        };
        Ok(BufReader::new(file)
            .lines()
            .map_while(std::result::Result::ok)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn stats() -> TileStats {
        TileStats {
            tiles: 2,
            components: 1,
            histogram: BTreeMap::from([(30, 1)]),
            full_cell_score: 30,
        }
    }

    #[test]
    fn test_notifications_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = RunLogger::new_at(dir.path(), "abcd").unwrap();
        logger
            .log_notification(
                0,
                &Notification {
                    step: 1,
                    message: "1 firing(s) [grow x1]".into(),
                },
            )
            .unwrap();

        let records = logger.read_notifications().unwrap();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0],
            LogRecord::Notification { step: 1, trial: 0, .. }
        ));
    }

    #[test]
    fn test_summary_lines_carry_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let logger = RunLogger::new_at(dir.path(), "abcd").unwrap();
        logger.log_trial(3, 45, &stats()).unwrap();
        logger
            .log_batch(&BatchSummary::from_trials(&[Ok(stats())]))
            .unwrap();

        let lines = logger.read_summary_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(";abcd;trial=3;seed=45;tiles=2"));
        assert!(lines[1].contains("batch;trials=1;valid=1"));
    }

    #[test]
    fn test_parallel_writers_keep_lines_whole() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(RunLogger::new_at(dir.path(), "f").unwrap());
        let handles: Vec<_> = (0..4)
            .map(|trial| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        logger.log_trial(trial, trial as u64, &stats()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let lines = logger.read_summary_lines().unwrap();
        assert_eq!(lines.len(), 100);
        assert!(lines.iter().all(|l| l.ends_with("histogram=30:1")));
    }

    #[test]
    fn test_dummy_logger_discards() {
        let logger = RunLogger::new_dummy();
        logger.log_trial(0, 0, &stats()).unwrap();
        assert!(logger.read_summary_lines().unwrap().is_empty());
    }
}
