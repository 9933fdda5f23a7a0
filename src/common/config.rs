use std::path::PathBuf;

use crate::common::types::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES};
use crate::transaction::wal::LogManagerConfig;

/// Configuration for a storage engine instance
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Size of every page in every table file, in bytes
    pub page_size: usize,

    /// Maximum number of pages resident in the buffer pool
    pub buffer_pool_pages: usize,

    /// Directory holding one `<table>.tbl` file per table
    pub data_dir: PathBuf,

    /// Write-ahead log configuration
    pub log: LogManagerConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_POOL_PAGES,
            data_dir: PathBuf::from("data"),
            log: LogManagerConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Config rooted in one directory: tables in `<root>/data`, log in `<root>/logs`
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            log: LogManagerConfig {
                log_dir: root.join("logs"),
                ..LogManagerConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn with_force_sync(mut self, force_sync: bool) -> Self {
        self.log.force_sync = force_sync;
        self
    }
}
