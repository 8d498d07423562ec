//! Storage configuration.
//!
//! Every option is a command line flag that can also be set from the environment, so the same
//! struct configures the binary and programs embedding the crate.
use crate::errors::Error;
use crate::storage::{CachingStorage, FileStorage, MemoryStorage, PageStorage, DEFAULT_PAGE_SIZE};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default number of pages kept by the page cache.
pub const DEFAULT_CACHE_PAGES: usize = 64;

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Page size in bytes used for new trees.
    #[arg(long, env = "PAGETREE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Number of pages kept in the LRU cache, 0 disables caching.
    #[arg(long, env = "PAGETREE_CACHE_PAGES", default_value_t = DEFAULT_CACHE_PAGES)]
    pub cache_pages: usize,

    /// Tree file. Without it the tree lives in memory and is lost on exit.
    #[arg(long, env = "PAGETREE_PATH")]
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_pages: DEFAULT_CACHE_PAGES,
            path: None,
        }
    }
}

impl StorageConfig {
    /// Builds the configured storage stack.
    ///
    /// An existing file is opened with the page size recorded in its header; a missing one is
    /// created with `page_size`. A non-zero `cache_pages` wraps the result in a page cache.
    pub fn open(&self) -> Result<Box<dyn PageStorage>, Error> {
        let storage: Box<dyn PageStorage> = match &self.path {
            None => {
                info!(page_size = self.page_size, "Using in-memory storage");
                Box::new(MemoryStorage::new(self.page_size))
            }
            Some(path) if path.exists() => {
                let file = FileStorage::open(path)?;
                if file.page_size() != self.page_size {
                    warn!(
                        path = %path.display(),
                        requested = self.page_size,
                        found = file.page_size(),
                        "Page size differs from the file header, using the file's"
                    );
                }
                Box::new(file)
            }
            Some(path) => Box::new(FileStorage::create(path, self.page_size)?),
        };

        if self.cache_pages == 0 {
            return Ok(storage);
        }
        Ok(Box::new(CachingStorage::new(storage, self.cache_pages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        storage: StorageConfig,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from(["pagetree", "--page-size", "512", "--cache-pages", "0"]);
        assert_eq!(cli.storage.page_size, 512);
        assert_eq!(cli.storage.cache_pages, 0);
        assert_eq!(cli.storage.path, None);
    }

    #[test]
    fn test_memory_storage_by_default() -> Result<(), Error> {
        let mut storage = StorageConfig::default().open()?;
        assert_eq!(storage.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(storage.create_page()?, 0);
        Ok(())
    }

    #[test]
    fn test_file_is_created_then_reopened() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let config = StorageConfig {
            page_size: 128,
            cache_pages: 4,
            path: Some(dir.path().join("tree.db")),
        };

        let mut storage = config.open()?;
        let id = storage.create_page()?;
        storage.write_page(id, &[7u8; 128])?;
        drop(storage);

        // The file header wins over the requested page size.
        let reopen = StorageConfig {
            page_size: 4096,
            ..config
        };
        let mut storage = reopen.open()?;
        assert_eq!(storage.page_size(), 128);
        assert_eq!(storage.page_count(), 1);
        let mut buf = [0u8; 128];
        storage.read_page(id, &mut buf)?;
        assert_eq!(buf, [7u8; 128]);
        Ok(())
    }
}
