use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::{csv, UsageRecord, UsageStore, UsageSummary, USAGE_LOG_HEADER};

const QUEUE_CAPACITY: usize = 1024;

enum WriterCommand {
    Append(UsageRecord),
    Flush(oneshot::Sender<()>),
}

/// Append-only CSV log of served exchanges.
///
/// Rows are written by a single background task so concurrent requests never
/// interleave partial lines.
pub struct CsvUsageLog {
    path: PathBuf,
    tx: mpsc::Sender<WriterCommand>,
}

impl CsvUsageLog {
    /// Opens the log, writing the header if the file does not exist yet.
    ///
    /// A file left ending mid-row (e.g. after a crash) gets a newline so the
    /// next row starts on its own line.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        info!("Initializing usage log at {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open usage log {}", path.display()))?;

        let len = file.metadata().await?.len();
        if len == 0 {
            file.write_all(USAGE_LOG_HEADER.as_bytes()).await?;
            file.flush().await?;
        } else {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                warn!("Usage log {} ends mid-row, starting a new line", path.display());
                file.write_all(b"\n").await?;
                file.flush().await?;
            }
        }
        let good_len = file.metadata().await?.len();

        let writer = LogWriter {
            file,
            path: path.clone(),
            good_len,
            torn: false,
        };
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(writer.run(rx));

        Ok(Self { path, tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct LogWriter {
    file: fs::File,
    path: PathBuf,
    // length of the file up to the last complete row
    good_len: u64,
    // set when a failed row could not be rolled back
    torn: bool,
}

impl LogWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<WriterCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriterCommand::Append(record) => self.append(&record.to_csv_row()).await,
                WriterCommand::Flush(done) => {
                    if let Err(e) = self.file.flush().await {
                        error!("Failed to flush usage log {}: {}", self.path.display(), e);
                    }
                    let _ = done.send(());
                }
            }
        }
        info!("Usage log writer stopped");
    }

    async fn append(&mut self, row: &str) {
        let mut bytes = Vec::with_capacity(row.len() + 1);
        if self.torn {
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(row.as_bytes());

        match self.write(&bytes).await {
            Ok(()) => {
                self.good_len += bytes.len() as u64;
                self.torn = false;
            }
            Err(e) => {
                error!("Failed to write usage log {}: {}", self.path.display(), e);
                self.roll_back().await;
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await
    }

    // Drops whatever part of the failed row reached the file.
    async fn roll_back(&mut self) {
        match self.file.set_len(self.good_len).await {
            Ok(()) => self.torn = false,
            Err(e) => {
                error!("Failed to truncate usage log {}: {}", self.path.display(), e);
                self.torn = true;
            }
        }
    }
}

#[async_trait]
impl UsageStore for CsvUsageLog {
    fn append(&self, record: UsageRecord) {
        if let Err(e) = self.tx.try_send(WriterCommand::Append(record)) {
            warn!("Dropping usage log record: {}", e);
        }
    }

    async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterCommand::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    async fn summarize(&self) -> Result<UsageSummary> {
        summarize_file(&self.path).await
    }
}

/// Counts rows per tier. A missing file counts as an empty log; malformed
/// rows are skipped with a warning.
pub async fn summarize_file(path: &Path) -> Result<UsageSummary> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UsageSummary::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read usage log {}", path.display()))
        }
    };

    let raw = String::from_utf8_lossy(&raw);

    let (rows, errors) = csv::parse_lossy(&raw);
    for e in &errors {
        warn!("Skipping malformed usage log row in {}: {}", path.display(), e);
    }

    let mut summary = UsageSummary::default();
    let header = USAGE_LOG_HEADER.split(',').next().unwrap_or_default();
    for row in rows.iter().filter(|row| row.first().map(String::as_str) != Some(header)) {
        let tier = row.get(2).cloned().unwrap_or_default();
        *summary.counts_by_tier.entry(tier).or_insert(0) += 1;
        summary.total_requests += 1;
    }
    Ok(summary)
}
