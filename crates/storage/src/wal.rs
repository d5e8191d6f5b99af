// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of [`Event`]s.
//!
//! One JSON object per line: `{"seq": N, "event": {...}}`. The file is
//! exclusively locked for the lifetime of the process so two motherships
//! cannot share a state directory.

use borg_core::Event;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// Errors from WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAL is locked by another process")]
    Locked,
}

/// One durable entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only event log with a replay cursor.
pub struct Wal {
    writer: BufWriter<File>,
    reader: BufReader<File>,
    write_seq: u64,
    processed_seq: u64,
}

impl Wal {
    /// Open (or create) the WAL, positioning the replay cursor just past
    /// `processed_seq` — typically the sequence of the recovered snapshot.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).read(true).open(path)?;
        file.try_lock_exclusive().map_err(|_| WalError::Locked)?;

        // Scan once to find the last sequence number. A torn tail from a
        // crash is truncated away so later appends start on a clean line.
        let mut write_seq = 0;
        let mut good_end: u64 = 0;
        let mut torn = false;
        {
            let mut scan = BufReader::new(file.try_clone()?);
            scan.seek(SeekFrom::Start(0))?;
            let mut line = String::new();
            loop {
                line.clear();
                let n = scan.read_line(&mut line)?;
                if n == 0 {
                    break;
                }
                if line.trim().is_empty() {
                    good_end += n as u64;
                    continue;
                }
                match serde_json::from_str::<WalEntry>(&line) {
                    Ok(entry) => {
                        write_seq = entry.seq;
                        good_end += n as u64;
                    }
                    Err(e) => {
                        tracing::warn!(%e, "wal: truncating torn tail entry");
                        torn = true;
                        break;
                    }
                }
            }
        }
        if torn {
            file.set_len(good_end)?;
        }

        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        Ok(Self {
            writer: BufWriter::new(file),
            reader,
            write_seq,
            processed_seq,
        })
    }

    /// Append an event, returning its sequence number.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let entry = WalEntry { seq, event: event.clone() };
        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.write_seq = seq;
        Ok(seq)
    }

    /// Flush buffered entries to disk.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Next entry after the processed cursor, or `None` at the tail.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        self.writer.flush()?;
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }
            let entry: WalEntry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(%e, "wal: stopping replay at torn entry");
                    return Ok(None);
                }
            };
            if entry.seq <= self.processed_seq {
                continue;
            }
            return Ok(Some(entry));
        }
    }

    /// Mark an entry as applied to materialized state.
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
