//! JSON-lines store.
//!
//! One JSON object per line, appended and flushed on every write, so a crash
//! loses at most the line being written. Malformed lines are skipped on read.
//! Resuming reads the learning file backwards from the end, so its cost does
//! not grow with the length of the history.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use trading_core::error::StoreError;
use trading_core::traits::LearningStore;
use trading_core::types::{EngineEvent, LearningState};

const LEARNING_FILE: &str = "learning_state.jsonl";
const EVENTS_FILE: &str = "events.jsonl";
const TAIL_CHUNK: u64 = 8 * 1024;

/// Append-only JSON-lines store rooted at a directory.
#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (and create if needed) a store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn learning_path(&self) -> PathBuf {
        self.dir.join(LEARNING_FILE)
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    /// All learning state snapshots, oldest first.
    pub fn learning_history(&self) -> Result<Vec<LearningState>, StoreError> {
        read_lines(&self.learning_path())
    }

    /// All events, oldest first.
    pub fn read_events(&self) -> Result<Vec<EngineEvent>, StoreError> {
        read_lines(&self.events_path())
    }

    fn append<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}

impl LearningStore for JsonlStore {
    fn latest_learning_state(&self) -> Result<Option<LearningState>, StoreError> {
        read_last_line(&self.learning_path())
    }

    fn log_learning_state(&self, state: &LearningState) -> Result<(), StoreError> {
        self.append(&self.learning_path(), state)
    }

    fn append_event(&self, event: &EngineEvent) -> Result<(), StoreError> {
        self.append(&self.events_path(), event)
    }
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping malformed line"
            ),
        }
    }
    Ok(records)
}

/// Last well-formed record of a JSON-lines file, read in chunks from the end.
fn read_last_line<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut pos = file.metadata()?.len();
    let mut tail: Vec<u8> = Vec::new();
    loop {
        while let Some(newline) = tail.iter().rposition(|b| *b == b'\n') {
            let line = tail.split_off(newline + 1);
            tail.truncate(newline);
            if let Some(record) = parse_line(path, &line) {
                return Ok(Some(record));
            }
        }
        if pos == 0 {
            return Ok(parse_line(path, &tail));
        }

        let len = pos.min(TAIL_CHUNK);
        pos -= len;
        let mut chunk = vec![0u8; len as usize];
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
    }
}

fn parse_line<T: DeserializeOwned>(path: &Path, line: &[u8]) -> Option<T> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice(line) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping malformed trailing line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;
    use trading_core::types::{EventKind, TunedParams};

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn state(weight: f64, note: &str) -> LearningState {
        LearningState {
            timestamp: ts(1_700_000_000_000),
            weights: [("rsi".to_string(), weight)].into_iter().collect(),
            params: TunedParams::new(),
            note: note.to_string(),
            update_count: 3,
        }
    }

    #[test]
    fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path().join("nested")).unwrap();
        assert!(store.latest_learning_state().unwrap().is_none());
        assert!(store.read_events().unwrap().is_empty());
    }

    #[test]
    fn test_latest_learning_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store.log_learning_state(&state(1.0, "")).unwrap();
        store
            .log_learning_state(&state(1.7, &LearningState::tuned_week_note("2024-W05")))
            .unwrap();

        let reopened = JsonlStore::open(dir.path()).unwrap();
        let latest = reopened.latest_learning_state().unwrap().unwrap();
        assert_eq!(latest, state(1.7, "tuned_week=2024-W05"));
        assert_eq!(latest.tuned_week(), Some("2024-W05"));
        assert_eq!(reopened.learning_history().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store.log_learning_state(&state(2.0, "")).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(store.learning_path())
                .unwrap();
            writeln!(file, "{{not json").unwrap();
        }
        let latest = store.latest_learning_state().unwrap().unwrap();
        assert_eq!(latest.weights["rsi"], 2.0);
    }

    #[test]
    fn test_events_append_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        for i in 0..3 {
            let event = EngineEvent::new(
                ts(i * 1000),
                i as u64,
                EventKind::Snapshot {
                    cash: Default::default(),
                    equity: Default::default(),
                    positions: BTreeMap::new(),
                },
            );
            store.append_event(&event).unwrap();
        }
        let events = store.read_events().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].iteration, 2);
        assert_eq!(events[0].kind.name(), "snapshot");
    }

    #[test]
    fn test_latest_reads_past_chunk_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        let mut wide = state(0.5, "");
        wide.weights = (0..600).map(|i| (format!("strategy_{i:04}"), i as f64)).collect();
        for count in 0..50 {
            wide.update_count = count;
            store.log_learning_state(&wide).unwrap();
        }
        let line_len = serde_json::to_string(&wide).unwrap().len() as u64;
        assert!(line_len > TAIL_CHUNK);

        let latest = store.latest_learning_state().unwrap().unwrap();
        assert_eq!(latest.update_count, 49);
        assert_eq!(latest.weights.len(), 600);
        assert_eq!(latest.weights["strategy_0599"], 599.0);
    }

    #[test]
    fn test_torn_final_write_falls_back_to_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store.log_learning_state(&state(1.0, "")).unwrap();
        store.log_learning_state(&state(1.5, "")).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(store.learning_path())
                .unwrap();
            write!(file, "{{\"timestamp\":\"2024-").unwrap();
        }

        let latest = store.latest_learning_state().unwrap().unwrap();
        assert_eq!(latest.weights["rsi"], 1.5);
    }

    #[test]
    fn test_single_line_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        let json = serde_json::to_string(&state(3.0, "")).unwrap();
        fs::write(store.learning_path(), json).unwrap();

        let latest = store.latest_learning_state().unwrap().unwrap();
        assert_eq!(latest.weights["rsi"], 3.0);
    }
}
