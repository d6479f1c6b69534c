use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::FatalError;

use super::types::WorldEvent;

/// Append-only record of every applied (and rejected) world event, kept
/// both in memory (for fast range/entity queries) and mirrored to disk as
/// newline-delimited JSON.
///
/// No fsync policy is imposed: `append` writes and flushes the buffered
/// writer but does not call `sync_all`. This is a deliberate choice, not
/// an oversight — a crash between flush and the OS committing the page
/// cache can lose the last few lines.
pub struct EventLog {
    events: Vec<WorldEvent>,
    file: Option<File>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// In-memory only, used by tests and by the replay path.
    pub fn in_memory() -> Self {
        Self {
            events: Vec::new(),
            file: None,
            path: None,
        }
    }

    /// Opens (creating if necessary) an append-only log file at `path`,
    /// replaying any existing lines into memory. Malformed lines are
    /// skipped with a warning rather than aborting startup.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut events = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WorldEvent>(&line) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        log::warn!(
                            "skipping malformed event-log line {} in {:?}: {}",
                            line_no + 1,
                            path,
                            err
                        );
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            events,
            file: Some(file),
            path: Some(path),
        })
    }

    /// Appends one event to the in-memory log and, if backed by a file,
    /// writes+flushes one JSON line (pipeline step 7: "append applied and
    /// rejected events to the log the same tick they are applied").
    pub fn append(&mut self, event: WorldEvent) -> Result<(), FatalError> {
        if let Some(file) = self.file.as_mut() {
            let line = serde_json::to_string(&event)
                .expect("WorldEvent serialization is infallible for well-formed variants");
            writeln!(file, "{}", line).map_err(FatalError::EventLogWrite)?;
            file.flush().map_err(FatalError::EventLogWrite)?;
        }
        self.events.push(event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Events with `from_tick <= tick_id <= to_tick`, in log order.
    pub fn events_in_range(&self, from_tick: u64, to_tick: u64) -> Vec<&WorldEvent> {
        self.events
            .iter()
            .filter(|e| e.tick_id >= from_tick && e.tick_id <= to_tick)
            .collect()
    }

    /// The most recent `count` events, oldest-first.
    pub fn recent(&self, count: usize) -> Vec<&WorldEvent> {
        let start = self.events.len().saturating_sub(count);
        self.events[start..].iter().collect()
    }

    /// Every event naming `entity_id` as either the primary or target
    /// entity, in log order.
    pub fn by_entity(&self, entity_id: u32) -> Vec<&WorldEvent> {
        self.events
            .iter()
            .filter(|e| e.entity_id == entity_id || e.target_entity_id == Some(entity_id))
            .collect()
    }

    /// All applied events at or before `target_tick`, for snapshot replay.
    /// The snapshot store resolves the nearest snapshot with
    /// `tick <= target_tick` and hands this list to the simulator to
    /// reapply; failing to find one is the snapshot store's responsibility,
    /// not the log's.
    pub fn replay_to_tick(&self, target_tick: u64) -> Vec<&WorldEvent> {
        self.events
            .iter()
            .filter(|e| e.applied && e.tick_id <= target_tick)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::EventKind;

    fn sample_event(event_id: u64, tick_id: u64, entity_id: u32) -> WorldEvent {
        WorldEvent {
            event_id,
            tick_id,
            kind: EventKind::EntityRemoved,
            entity_id,
            target_entity_id: None,
            source_player_id: 0,
            submitted_at: 0,
            processed_at: Some(0),
            applied: true,
            rejection_reason: None,
        }
    }

    #[test]
    fn events_in_range_is_inclusive() {
        let mut log = EventLog::in_memory();
        log.append(sample_event(1, 1, 1)).unwrap();
        log.append(sample_event(2, 5, 1)).unwrap();
        log.append(sample_event(3, 9, 1)).unwrap();
        let found = log.events_in_range(1, 5);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn by_entity_matches_primary_and_target() {
        let mut log = EventLog::in_memory();
        let mut e = sample_event(1, 1, 1);
        e.target_entity_id = Some(2);
        log.append(e).unwrap();
        assert_eq!(log.by_entity(2).len(), 1);
    }

    #[test]
    fn replay_to_tick_excludes_rejected_and_future_events() {
        let mut log = EventLog::in_memory();
        log.append(sample_event(1, 1, 1)).unwrap();
        let mut rejected = sample_event(2, 2, 1);
        rejected.applied = false;
        log.append(rejected).unwrap();
        log.append(sample_event(3, 10, 1)).unwrap();
        let replayed = log.replay_to_tick(5);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].event_id, 1);
    }

    #[test]
    fn persists_and_reopens_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let mut log = EventLog::open(&path).unwrap();
            log.append(sample_event(1, 1, 1)).unwrap();
            log.append(sample_event(2, 2, 1)).unwrap();
        }
        let reopened = EventLog::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn skips_malformed_lines_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let mut log = EventLog::open(&path).unwrap();
            log.append(sample_event(1, 1, 1)).unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "not valid json").unwrap();
        }
        let reopened = EventLog::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
    }
}
