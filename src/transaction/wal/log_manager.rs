use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, PageId, TransactionId};
use crate::transaction::wal::TransactionLog;
use crate::transaction::wal::log_record::{
    DataOperationContent, LogRecord, LogRecordContent, LogRecordType,
};

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Log record serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Corrupted log file: {0}")]
    Corrupted(String),
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogError>;

/// Configuration for the log manager
#[derive(Debug, Clone)]
pub struct LogManagerConfig {
    /// Directory holding the log file
    pub log_dir: PathBuf,

    /// Name of the log file inside `log_dir`
    pub log_file_name: String,

    /// Whether `force` fsyncs the file after flushing the write buffer
    pub force_sync: bool,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file_name: "pagestore.wal".to_string(),
            force_sync: true,
        }
    }
}

struct LogWriter {
    file: BufWriter<File>,
    next_lsn: Lsn,
    last_lsn: HashMap<TransactionId, Lsn>,
}

/// Append-only write-ahead log.
///
/// Every record is stored as a little-endian `u32` length followed by the `bincode`
/// encoding of a [`LogRecord`].
pub struct LogManager {
    config: LogManagerConfig,
    path: PathBuf,
    writer: Mutex<LogWriter>,
}

impl LogManager {
    /// Open the log described by `config`, creating the directory and file if needed
    pub fn new(config: LogManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.log_dir)?;
        let path = config.log_dir.join(&config.log_file_name);

        // Continue numbering after whatever an earlier run left behind
        let existing = Self::read_file(&path)?;
        let next_lsn = existing.last().map_or(1, |record| record.lsn + 1);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        debug!("Opened log {} at LSN {}", path.display(), next_lsn);
        Ok(Self {
            config,
            path,
            writer: Mutex::new(LogWriter {
                file: BufWriter::new(file),
                next_lsn,
                last_lsn: HashMap::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// LSN the next appended record will receive
    pub fn current_lsn(&self) -> Lsn {
        self.writer.lock().next_lsn
    }

    /// Append a record to the log buffer. It becomes durable on the next `force`.
    pub fn append_log_record(
        &self,
        txn_id: TransactionId,
        record_type: LogRecordType,
        content: LogRecordContent,
    ) -> Result<Lsn> {
        let mut writer = self.writer.lock();
        let lsn = writer.next_lsn;
        let prev_lsn = writer.last_lsn.get(&txn_id).copied().unwrap_or(0);

        let record = LogRecord::new(lsn, txn_id, prev_lsn, record_type, content);
        let bytes = record.serialize()?;
        writer.file.write_all(&(bytes.len() as u32).to_le_bytes())?;
        writer.file.write_all(&bytes)?;

        writer.next_lsn += 1;
        match record_type {
            LogRecordType::Commit | LogRecordType::Abort => {
                writer.last_lsn.remove(&txn_id);
            }
            _ => {
                writer.last_lsn.insert(txn_id, lsn);
            }
        }
        Ok(lsn)
    }

    /// Flush buffered records and, if configured, sync them to disk
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.flush()?;
        if self.config.force_sync {
            writer.file.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Every durable record in LSN order
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        self.flush()?;
        Self::read_file(&self.path)
    }

    /// Decode every record in a log file without opening it for writing
    pub fn read_file(path: &Path) -> Result<Vec<LogRecord>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut body = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut body) {
                let last = records.last().map_or(0, |r: &LogRecord| r.lsn);
                return Err(LogError::Corrupted(format!(
                    "truncated record after LSN {}: {}",
                    last, e
                )));
            }
            records.push(LogRecord::deserialize(&body)?);
        }
        Ok(records)
    }
}

impl TransactionLog for LogManager {
    fn log_begin(&self, tid: TransactionId) -> Result<Lsn> {
        self.append_log_record(tid, LogRecordType::Begin, LogRecord::transaction_content())
    }

    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before_image: &[u8],
        after_image: &[u8],
    ) -> Result<Lsn> {
        self.append_log_record(
            tid,
            LogRecordType::Update,
            LogRecordContent::Data(DataOperationContent {
                page_id,
                before_image: before_image.to_vec(),
                after_image: after_image.to_vec(),
            }),
        )
    }

    fn log_commit(&self, tid: TransactionId) -> Result<Lsn> {
        self.append_log_record(tid, LogRecordType::Commit, LogRecord::transaction_content())
    }

    fn log_abort(&self, tid: TransactionId) -> Result<Lsn> {
        self.append_log_record(tid, LogRecordType::Abort, LogRecord::transaction_content())
    }

    fn force(&self) -> Result<()> {
        self.flush()
    }
}
