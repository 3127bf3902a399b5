//! Follows log files as they grow and pushes complete lines to a channel.
//!
//! A run log is followed from its first byte until the run's persisted
//! status leaves `running`. The process log is followed from its current
//! end for as long as the receiver is alive.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::db::{run_repo, Database};
use crate::worker::RunError;

const CHANNEL_CAPACITY: usize = 256;

/// Items pushed by a tailer, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// One line without its trailing newline.
    Line(String),
    /// The run log never appeared within the creation wait.
    NotCreated,
    /// The run finished and every line has been delivered.
    End,
}

/// Polling intervals for the tailers.
#[derive(Debug, Clone, Copy)]
pub struct TailOptions {
    /// How many times to look for a run log before giving up.
    pub creation_attempts: u32,
    pub creation_interval: Duration,
    /// Sleep between reads once a run log has hit end-of-file.
    pub run_poll_interval: Duration,
    /// Sleep between reads of the process log.
    pub process_poll_interval: Duration,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            creation_attempts: 10,
            creation_interval: Duration::from_millis(200),
            run_poll_interval: Duration::from_millis(500),
            process_poll_interval: Duration::from_millis(200),
        }
    }
}

/// Starts following the log of run `run_id`. Must be called from within a
/// tokio runtime.
pub fn tail_run_log(
    db: &Database,
    run_id: i64,
    options: TailOptions,
) -> Result<mpsc::Receiver<TailEvent>, RunError> {
    let run = run_repo::find_by_id(db, run_id)?.ok_or(RunError::RunNotFound(run_id))?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(follow_run_log(
        db.clone(),
        run_id,
        PathBuf::from(run.log_file),
        options,
        tx,
    ));
    Ok(rx)
}

/// Starts following the process-wide log from its current end. The task
/// stops when the receiver is dropped.
pub fn tail_process_log(path: &Path, options: TailOptions) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(follow_process_log(path.to_path_buf(), options, tx));
    rx
}

async fn follow_run_log(
    db: Database,
    run_id: i64,
    path: PathBuf,
    options: TailOptions,
    tx: mpsc::Sender<TailEvent>,
) {
    let Some(file) = wait_for_file(&path, &options).await else {
        debug!(run_id, path = %path.display(), "Run log was not created in time");
        let _ = tx.send(TailEvent::NotCreated).await;
        let _ = tx.send(TailEvent::End).await;
        return;
    };

    let mut reader = LineReader::new(file);
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                if tx.send(TailEvent::Line(line)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                if run_finished(&db, run_id) {
                    // Anything written between the last read and completion.
                    loop {
                        match reader.next_line().await {
                            Ok(Some(line)) => {
                                if tx.send(TailEvent::Line(line)).await.is_err() {
                                    return;
                                }
                            }
                            _ => break,
                        }
                    }
                    if let Some(rest) = reader.take_partial() {
                        let _ = tx.send(TailEvent::Line(rest)).await;
                    }
                    let _ = tx.send(TailEvent::End).await;
                    return;
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(options.run_poll_interval).await;
            }
            Err(e) => {
                warn!(run_id, error = %e, "Failed to read run log");
                let _ = tx.send(TailEvent::End).await;
                return;
            }
        }
    }
}

async fn follow_process_log(path: PathBuf, options: TailOptions, tx: mpsc::Sender<String>) {
    let mut file = loop {
        match File::open(&path).await {
            Ok(file) => break file,
            Err(_) => {
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(options.process_poll_interval).await;
            }
        }
    };

    let mut position = match file.seek(SeekFrom::End(0)).await {
        Ok(position) => position,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to seek process log");
            return;
        }
    };

    let mut reader = LineReader::new(file);
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                position += reader.last_len();
                if tx.send(line).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                if tx.is_closed() {
                    return;
                }
                // A shorter file means it was truncated or replaced; start over.
                if let Ok(metadata) = tokio::fs::metadata(&path).await {
                    if metadata.len() < position {
                        match File::open(&path).await {
                            Ok(file) => {
                                reader = LineReader::new(file);
                                position = 0;
                            }
                            Err(e) => debug!(error = %e, "Failed to reopen process log"),
                        }
                    }
                }
                tokio::time::sleep(options.process_poll_interval).await;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read process log");
                return;
            }
        }
    }
}

async fn wait_for_file(path: &Path, options: &TailOptions) -> Option<File> {
    for attempt in 0..options.creation_attempts.max(1) {
        if let Ok(file) = File::open(path).await {
            return Some(file);
        }
        if attempt + 1 < options.creation_attempts {
            tokio::time::sleep(options.creation_interval).await;
        }
    }
    None
}

fn run_finished(db: &Database, run_id: i64) -> bool {
    match run_repo::status_of(db, run_id) {
        Ok(Some(status)) => status.is_terminal(),
        Ok(None) => true,
        Err(e) => {
            warn!(run_id, error = %e, "Failed to read run status");
            true
        }
    }
}

/// Buffered reader that only yields newline-terminated lines and holds a
/// trailing partial line until the rest of it arrives.
struct LineReader {
    reader: BufReader<File>,
    partial: Vec<u8>,
    last_len: u64,
}

impl LineReader {
    fn new(file: File) -> Self {
        Self {
            reader: BufReader::new(file),
            partial: Vec::new(),
            last_len: 0,
        }
    }

    /// Bytes on disk taken by the line last returned, terminator included.
    fn last_len(&self) -> u64 {
        self.last_len
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.partial).await?;
        if read == 0 || self.partial.last() != Some(&b'\n') {
            return Ok(None);
        }
        let bytes = std::mem::take(&mut self.partial);
        self.last_len = bytes.len() as u64;
        Ok(Some(decode_line(&bytes)))
    }

    fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            let bytes = std::mem::take(&mut self.partial);
            Some(decode_line(&bytes))
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_end_matches(&['\n', '\r'][..]).to_string()
}
