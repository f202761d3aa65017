//! Debounced snapshot persistence.
//!
//! [`PersistenceSink`] owns both logs (raw tail entries and normalized
//! records) inside a background tokio task. Producers push changes over an
//! unbounded channel and never wait on disk. Every change (re)arms a single
//! deadline; when it expires without further changes the task rewrites both
//! files in full. A burst of events therefore costs one write.
//!
//! # Properties
//!
//! - **Single-slot timer:** a new change replaces the pending flush rather
//!   than queueing another one. Each write is a full snapshot, so only the
//!   latest matters.
//! - **Clear is immediate:** `clear()` writes empty arrays right away so a
//!   reader never sees the previous epoch after a reset.
//! - **Atomic files:** snapshots go to a sibling `.tmp` file that is renamed
//!   over the target; readers always see a complete JSON array.
//! - **Failures do not stop capture:** a failed write is logged and counted,
//!   and the next change schedules a fresh attempt.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use netwatch_types::{CaptureConfig, NetwatchError, NetworkRecord, RawEntry, DEFAULT_FLUSH_DELAY};

/// Where and how often the sink writes.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub raw_log_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Quiet period after the last change before a snapshot is written.
    pub flush_delay: Duration,
}

impl SinkConfig {
    pub fn new(raw_log_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            raw_log_path: raw_log_path.into(),
            metadata_path: metadata_path.into(),
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

impl From<&CaptureConfig> for SinkConfig {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            raw_log_path: config.raw_log_path.clone(),
            metadata_path: config.metadata_path.clone(),
            flush_delay: config.flush_delay,
        }
    }
}

/// Write counters reported when the sink shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Successful snapshot writes, including clears.
    pub writes: u64,
    pub failures: u64,
    /// Normalized records held at shutdown.
    pub records: usize,
}

type Reply = oneshot::Sender<Result<(), NetwatchError>>;

/// Commands processed by the background writer task, in order.
#[derive(Debug)]
enum SinkCommand {
    AppendRaw(RawEntry),
    AnnotateRaw {
        request_id: String,
        status: u16,
        mime_type: Option<String>,
    },
    PushRecord(NetworkRecord),
    Touch,
    Clear(Option<Reply>),
    Flush(Reply),
    Shutdown(oneshot::Sender<SinkStats>),
}

/// Handle to the background snapshot writer.
pub struct PersistenceSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
    handle: JoinHandle<()>,
}

impl PersistenceSink {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(config: SinkConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        info!(
            raw_log = %config.raw_log_path.display(),
            metadata = %config.metadata_path.display(),
            flush_delay_ms = config.flush_delay.as_millis() as u64,
            "snapshot sink started"
        );
        let handle = tokio::spawn(writer_task(config, rx));
        Self { tx, handle }
    }

    /// Append a raw tail entry and schedule a flush.
    pub fn append_raw(&self, entry: RawEntry) {
        self.send(SinkCommand::AppendRaw(entry));
    }

    /// Attach response status to the newest raw entry for `request_id`.
    pub fn annotate_raw(&self, request_id: &str, status: u16, mime_type: Option<String>) {
        self.send(SinkCommand::AnnotateRaw {
            request_id: request_id.to_string(),
            status,
            mime_type,
        });
    }

    /// Append a finalized record and schedule a flush.
    pub fn push_record(&self, record: NetworkRecord) {
        self.send(SinkCommand::PushRecord(record));
    }

    /// Schedule a flush without changing the logs.
    pub fn record_changed(&self) {
        self.send(SinkCommand::Touch);
    }

    /// Empty both logs and write the empty snapshots without delay.
    ///
    /// Ordered after every change sent before it. Does not wait for the write.
    pub fn clear_now(&self) {
        self.send(SinkCommand::Clear(None));
    }

    /// Empty both logs, write the empty snapshots, and wait for the result.
    pub async fn clear(&self) -> Result<(), NetwatchError> {
        let (reply, rx) = oneshot::channel();
        self.request(SinkCommand::Clear(Some(reply)), rx).await
    }

    /// Write the current snapshot immediately and report the outcome.
    pub async fn flush(&self) -> Result<(), NetwatchError> {
        let (reply, rx) = oneshot::channel();
        self.request(SinkCommand::Flush(reply), rx).await
    }

    /// Write any unflushed state and stop the task.
    pub async fn shutdown(self) -> Result<SinkStats, NetwatchError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Shutdown(reply))
            .map_err(|_| closed_error())?;
        let stats = rx.await.map_err(|_| closed_error())?;
        self.handle.await.map_err(|e| {
            NetwatchError::PersistenceError(format!("snapshot writer task panicked: {e}"))
        })?;
        Ok(stats)
    }

    fn send(&self, cmd: SinkCommand) {
        if self.tx.send(cmd).is_err() {
            error!("snapshot writer has stopped; change not persisted");
        }
    }

    async fn request(
        &self,
        cmd: SinkCommand,
        rx: oneshot::Receiver<Result<(), NetwatchError>>,
    ) -> Result<(), NetwatchError> {
        self.tx.send(cmd).map_err(|_| closed_error())?;
        rx.await.map_err(|_| closed_error())?
    }
}

fn closed_error() -> NetwatchError {
    NetwatchError::PersistenceError("snapshot writer has stopped".to_string())
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

/// Both logs plus write bookkeeping, owned by the writer task.
struct Snapshot {
    config: SinkConfig,
    raw: Vec<RawEntry>,
    records: Vec<NetworkRecord>,
    stats: SinkStats,
}

impl Snapshot {
    /// Write both logs. Each file is attempted on every call so a broken raw
    /// log path never holds back the record log; the first error is returned.
    fn write(&mut self) -> Result<(), NetwatchError> {
        let raw = write_json_atomic(&self.config.raw_log_path, &self.raw);
        let records = write_json_atomic(&self.config.metadata_path, &self.records);

        let mut first_err = None;
        for (log, result) in [("raw", raw), ("metadata", records)] {
            if let Err(e) = result {
                self.stats.failures += 1;
                error!(log, error = %e, "snapshot write failed, capture continues");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            None => {
                self.stats.writes += 1;
                debug!(raw = self.raw.len(), records = self.records.len(), "snapshot written");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

async fn writer_task(config: SinkConfig, mut rx: mpsc::UnboundedReceiver<SinkCommand>) {
    let delay = config.flush_delay;
    let mut snap = Snapshot {
        config,
        raw: Vec::new(),
        records: Vec::new(),
        stats: SinkStats::default(),
    };
    let mut deadline: Option<Instant> = None;

    loop {
        let armed = deadline;
        let due = async move {
            match armed {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            maybe_cmd = rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    // Every handle dropped without shutdown.
                    if deadline.is_some() {
                        let _ = snap.write();
                    }
                    return;
                };
                match cmd {
                    SinkCommand::AppendRaw(entry) => {
                        snap.raw.push(entry);
                        deadline = Some(Instant::now() + delay);
                    }
                    SinkCommand::AnnotateRaw { request_id, status, mime_type } => {
                        if let Some(entry) = snap.raw.iter_mut().rev().find(|e| e.request_id == request_id) {
                            entry.status = Some(status);
                            entry.mime_type = mime_type;
                        }
                        deadline = Some(Instant::now() + delay);
                    }
                    SinkCommand::PushRecord(record) => {
                        snap.records.push(record);
                        deadline = Some(Instant::now() + delay);
                    }
                    SinkCommand::Touch => {
                        deadline = Some(Instant::now() + delay);
                    }
                    SinkCommand::Clear(reply) => {
                        snap.raw.clear();
                        snap.records.clear();
                        deadline = None;
                        let result = snap.write();
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    SinkCommand::Flush(reply) => {
                        deadline = None;
                        let _ = reply.send(snap.write());
                    }
                    SinkCommand::Shutdown(reply) => {
                        if deadline.take().is_some() {
                            let _ = snap.write();
                        }
                        snap.stats.records = snap.records.len();
                        info!(
                            writes = snap.stats.writes,
                            failures = snap.stats.failures,
                            records = snap.stats.records,
                            "snapshot sink stopped"
                        );
                        let _ = reply.send(snap.stats);
                        return;
                    }
                }
            }
            _ = due => {
                deadline = None;
                let _ = snap.write();
            }
        }
    }
}

/// Serialize `value` as pretty JSON into `path` via a temp file and rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), NetwatchError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
        NetwatchError::PersistenceError(format!("failed to serialize snapshot: {e}"))
    })?;
    let tmp = tmp_path(path);
    let failed = |e: std::io::Error| {
        NetwatchError::PersistenceError(format!("failed to write {}: {e}", path.display()))
    };
    fs::write(&tmp, &bytes).map_err(failed)?;
    if let Err(e) = fs::rename(&tmp, path) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            debug!(path = %tmp.display(), error = %cleanup, "could not remove temp snapshot");
        }
        return Err(failed(e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir, delay: Duration) -> SinkConfig {
        SinkConfig {
            raw_log_path: dir.path().join("raw.json"),
            metadata_path: dir.path().join("meta.json"),
            flush_delay: delay,
        }
    }

    fn raw(id: &str) -> RawEntry {
        RawEntry {
            time: 1,
            request_id: id.to_string(),
            method: "GET".into(),
            url: format!("https://x/{id}"),
            resource_type: Some("Script".into()),
            relative_start: 0.0,
            status: None,
            mime_type: None,
        }
    }

    fn record(url: &str) -> NetworkRecord {
        NetworkRecord {
            url: url.to_string(),
            method: "GET".into(),
            resource_type: Some("Script".into()),
            status: Some(200),
            time: 10.0,
            transfer_size: 10,
            content_size: 10,
            mime_type: None,
            http_version: Some("h2".into()),
            timings: None,
            headers: Default::default(),
            cached: false,
            relative_start: Some(0.0),
            relative_end: Some(10.0),
            initiator: None,
            error: None,
            timestamp: 0,
        }
    }

    fn read_records(path: &Path) -> Vec<NetworkRecord> {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    fn read_raw(path: &Path) -> Vec<RawEntry> {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn clear_writes_empty_arrays_immediately() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_secs(60));
        let sink = PersistenceSink::spawn(cfg.clone());
        sink.clear().await.unwrap();
        assert_eq!(fs::read_to_string(&cfg.raw_log_path).unwrap(), "[]");
        assert_eq!(fs::read_to_string(&cfg.metadata_path).unwrap(), "[]");
        sink.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn burst_of_changes_coalesces_into_one_write() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_secs(60));
        let sink = PersistenceSink::spawn(cfg.clone());
        for i in 0..50 {
            sink.append_raw(raw(&i.to_string()));
            sink.push_record(record(&format!("https://x/{i}")));
        }
        // Long delay: nothing reaches disk until shutdown flushes.
        assert!(!cfg.metadata_path.exists());
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.records, 50);
        assert_eq!(read_records(&cfg.metadata_path).len(), 50);
        assert_eq!(read_raw(&cfg.raw_log_path).len(), 50);
    }

    #[tokio::test]
    async fn debounced_flush_fires_after_quiet_period() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_millis(10));
        let sink = PersistenceSink::spawn(cfg.clone());
        sink.push_record(record("https://x/a"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(read_records(&cfg.metadata_path).len(), 1);
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn annotate_updates_latest_raw_entry() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_secs(60));
        let sink = PersistenceSink::spawn(cfg.clone());
        sink.append_raw(raw("1"));
        sink.append_raw(raw("2"));
        sink.annotate_raw("1", 404, Some("text/html".into()));
        sink.annotate_raw("missing", 200, None);
        sink.flush().await.unwrap();
        let entries = read_raw(&cfg.raw_log_path);
        assert_eq!(entries[0].status, Some(404));
        assert_eq!(entries[0].mime_type.as_deref(), Some("text/html"));
        assert_eq!(entries[1].status, None);
        sink.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn clear_discards_unflushed_changes() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_secs(60));
        let sink = PersistenceSink::spawn(cfg.clone());
        sink.push_record(record("https://x/old"));
        sink.clear_now();
        sink.push_record(record("https://x/new"));
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.writes, 2);
        let records = read_records(&cfg.metadata_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://x/new");
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_not_fatal() {
        let dir = TempDir::new().unwrap();
        let cfg = SinkConfig {
            raw_log_path: dir.path().join("raw.json"),
            metadata_path: dir.path().join("missing-dir").join("meta.json"),
            flush_delay: Duration::from_secs(60),
        };
        let sink = PersistenceSink::spawn(cfg);
        sink.push_record(record("https://x/a"));
        let err = sink.flush().await.unwrap_err();
        assert!(matches!(err, NetwatchError::PersistenceError(_)));

        // The task keeps running and accepts further work.
        sink.push_record(record("https://x/b"));
        assert!(sink.flush().await.is_err());
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.records, 2);
    }

    #[tokio::test]
    async fn broken_raw_log_does_not_block_record_log() {
        let dir = TempDir::new().unwrap();
        let cfg = SinkConfig {
            raw_log_path: dir.path().join("missing-dir").join("raw.json"),
            metadata_path: dir.path().join("meta.json"),
            flush_delay: Duration::from_secs(60),
        };
        fs::write(&cfg.metadata_path, r#"[{"url":"https://stale/","method":"GET"}]"#).unwrap();
        let sink = PersistenceSink::spawn(cfg.clone());

        assert!(sink.clear().await.is_err());
        assert!(read_records(&cfg.metadata_path).is_empty());

        sink.append_raw(raw("1"));
        sink.push_record(record("https://x/a"));
        assert!(sink.flush().await.is_err());
        let records = read_records(&cfg.metadata_path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://x/a");

        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.writes, 0);
    }

    #[tokio::test]
    async fn repeated_record_changed_coalesces() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_secs(60));
        let sink = PersistenceSink::spawn(cfg.clone());
        for _ in 0..20 {
            sink.record_changed();
        }
        sink.push_record(record("https://x/a"));
        sink.record_changed();
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(read_records(&cfg.metadata_path).len(), 1);
    }

    #[tokio::test]
    async fn record_changed_rearms_the_deadline() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_millis(400));
        let sink = PersistenceSink::spawn(cfg.clone());

        sink.record_changed();
        tokio::time::sleep(Duration::from_millis(200)).await;
        sink.record_changed();
        // Past the first deadline, short of the re-armed one.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!cfg.metadata_path.exists());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(read_records(&cfg.metadata_path).is_empty());
        assert!(read_raw(&cfg.raw_log_path).is_empty());

        // A later change after the quiet period writes again.
        sink.record_changed();
        tokio::time::sleep(Duration::from_millis(700)).await;
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats.writes, 2);
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let target = dir.path().join("meta.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let err = write_json_atomic(&target, &Vec::<NetworkRecord>::new()).unwrap_err();
        assert!(matches!(err, NetwatchError::PersistenceError(_)));
        assert!(!tmp_path(&target).exists());
    }

    #[tokio::test]
    async fn shutdown_without_changes_does_not_write() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Duration::from_millis(5));
        let sink = PersistenceSink::spawn(cfg.clone());
        let stats = sink.shutdown().await.unwrap();
        assert_eq!(stats, SinkStats::default());
        assert!(!cfg.metadata_path.exists());
    }

    #[test]
    fn tmp_path_is_sibling() {
        let p = tmp_path(Path::new("/tmp/network-metadata.json"));
        assert_eq!(p, PathBuf::from("/tmp/network-metadata.json.tmp"));
    }
}
