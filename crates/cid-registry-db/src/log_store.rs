//! Append-only log implementation of RecordRepository
//!
//! Records are persisted as JSON lines, one `(handle, cid, registered_at)`
//! entry per line, in handle order. Opening a log replays it to rebuild the
//! ledger; the next handle is the number of replayed entries.
//!
//! Commits run on a spawned task that owns the writer lock, so a caller that
//! abandons a registration mid-flight cannot leave a half-applied commit:
//! either the entry is written and the handle consumed, or the log is rolled
//! back to its last committed length and the handle stays available. If the
//! rollback itself fails the repository refuses further appends until it is
//! reopened, since the file no longer ends at a committed entry.

use async_trait::async_trait;
use cid_registry_core::{Cid, Handle, RegistrationRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{next_handle, verify_sequence, ListQuery, RecordRepository};

/// File-backed, append-only registration ledger
pub struct LogRecordRepository {
    path: PathBuf,
    state: Arc<RwLock<LogState>>,
    sync_on_commit: bool,
    #[cfg(test)]
    fail_commits: std::sync::atomic::AtomicBool,
    #[cfg(test)]
    fail_rollbacks: std::sync::atomic::AtomicBool,
}

struct LogState {
    file: File,
    committed_len: u64,
    records: Vec<RegistrationRecord>,
    /// Set when the file could not be truncated back to `committed_len`
    poisoned: bool,
}

/// Failures forced by tests
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    write: bool,
    rollback: bool,
}

impl LogState {
    async fn write_entry(&mut self, line: &[u8], sync: bool, faults: Faults) -> DbResult<()> {
        if faults.write {
            // Leave a torn entry behind, as a full disk would
            self.file.write_all(&line[..line.len() / 2]).await?;
            self.file.flush().await?;
            return Err(DbError::Io("simulated write failure".to_string()));
        }

        self.file.write_all(line).await?;
        self.file.flush().await?;
        if sync {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self, faults: Faults) -> DbResult<()> {
        if faults.rollback {
            return Err(DbError::Io("simulated truncate failure".to_string()));
        }
        self.file.set_len(self.committed_len).await?;
        Ok(())
    }
}

impl LogRecordRepository {
    /// Open (or create) a log and replay its contents
    ///
    /// A trailing entry without a terminating newline is the remains of an
    /// interrupted write; it is discarded and the file truncated. Any other
    /// malformed entry, or handles that are not exactly `0..n`, fail with
    /// `DbError::InvalidData`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let (records, valid_len) = replay(&contents)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        if valid_len < contents.len() as u64 {
            warn!(
                "Discarding {} bytes of incomplete trailing entry",
                contents.len() as u64 - valid_len
            );
            file.set_len(valid_len).await?;
        }

        info!("Replayed {} records from log", records.len());

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(LogState {
                file,
                committed_len: valid_len,
                records,
                poisoned: false,
            })),
            sync_on_commit: true,
            #[cfg(test)]
            fail_commits: std::sync::atomic::AtomicBool::new(false),
            #[cfg(test)]
            fail_rollbacks: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Whether every commit is followed by an fsync (default: true)
    pub fn sync_on_commit(mut self, enabled: bool) -> Self {
        self.sync_on_commit = enabled;
        self
    }

    /// Path of the backing log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn faults(&self) -> Faults {
        use std::sync::atomic::Ordering;
        Faults {
            write: self.fail_commits.load(Ordering::SeqCst),
            rollback: self.fail_rollbacks.load(Ordering::SeqCst),
        }
    }

    #[cfg(not(test))]
    fn faults(&self) -> Faults {
        Faults::default()
    }
}

/// Parse log contents into records, returning the byte length of the valid prefix
fn replay(contents: &[u8]) -> DbResult<(Vec<RegistrationRecord>, u64)> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < contents.len() {
        let Some(newline) = contents[offset..].iter().position(|b| *b == b'\n') else {
            // Torn trailing write; stop at the last complete entry
            break;
        };

        line_no += 1;
        let line = &contents[offset..offset + newline];
        offset += newline + 1;

        if line.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }

        let record: RegistrationRecord = serde_json::from_slice(line).map_err(|e| {
            DbError::InvalidData(format!("Malformed log entry on line {}: {}", line_no, e))
        })?;
        records.push(record);
    }

    verify_sequence(&records)?;

    // `offset` always sits just past the last complete entry
    Ok((records, offset as u64))
}

#[async_trait]
impl RecordRepository for LogRecordRepository {
    #[instrument(skip(self), fields(cid = %cid))]
    async fn append(&self, cid: Cid) -> DbResult<RegistrationRecord> {
        let mut state = self.state.clone().write_owned().await;
        let sync = self.sync_on_commit;
        let faults = self.faults();

        let commit = tokio::spawn(async move {
            if state.poisoned {
                return Err(DbError::Io(
                    "log has an unrecoverable partial entry; reopen to recover".to_string(),
                ));
            }

            let handle = next_handle(&state.records)?;
            let record = RegistrationRecord::new(handle, cid);

            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');

            if let Err(e) = state.write_entry(&line, sync, faults).await {
                if let Err(rollback_err) = state.rollback(faults).await {
                    error!(
                        committed_len = state.committed_len,
                        "Failed to roll back log, refusing further appends: {}", rollback_err
                    );
                    state.poisoned = true;
                }
                return Err(e);
            }

            state.committed_len += line.len() as u64;
            state.records.push(record.clone());
            Ok(record)
        });

        let record = commit
            .await
            .map_err(|e| DbError::Internal(format!("Commit task failed: {}", e)))??;

        debug!(handle = %record.handle, "Record appended to log");
        Ok(record)
    }

    async fn find_by_handle(&self, handle: Handle) -> DbResult<Option<RegistrationRecord>> {
        let state = self.state.read().await;
        Ok(usize::try_from(handle.value())
            .ok()
            .and_then(|idx| state.records.get(idx))
            .cloned())
    }

    async fn count(&self) -> DbResult<u64> {
        Ok(self.state.read().await.records.len() as u64)
    }

    async fn list(&self, query: &ListQuery) -> DbResult<Vec<RegistrationRecord>> {
        let state = self.state.read().await;
        let start = usize::try_from(query.start()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);

        Ok(state.records.iter().skip(start).take(limit).cloned().collect())
    }

    async fn health_check(&self) -> DbResult<()> {
        if self.state.read().await.poisoned {
            return Err(DbError::Io(
                "log has an unrecoverable partial entry".to_string(),
            ));
        }

        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| DbError::Io(format!("Log file unavailable: {}", e)))
    }

    fn backend_name(&self) -> &'static str {
        "log"
    }
}
