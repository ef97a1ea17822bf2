//! Watch-list of tracked instruments and the store that owns it.
//!
//! A `WatchList` is an ordered set of unique instrument ids. The relay never mutates it;
//! it asks its `WatchListStore` for a fresh copy once per fetch cycle, so edits to the
//! backing store are picked up on the next cycle.
//!
//! `FileWatchList` is the store shipped with the workspace. It reads a plain text file
//! where ids are separated by commas, spaces or new lines and `#` starts a comment.
//! The store has an explicit lifecycle: `open` fails when the file is unreachable, and
//! after `close` every `list` call is refused.
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::error::CoinError;
use crate::result::Result;

/// Ordered set of unique instrument ids.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    ids: Vec<String>,
    index: HashSet<String>,
}

impl WatchList {
    /// Build a watch-list, trimming ids, skipping blanks and keeping first occurrences.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = WatchList::default();
        for id in ids {
            list.insert(id.as_ref());
        }
        list
    }

    fn insert(&mut self, id: &str) {
        let id = id.trim();
        if id.is_empty() || self.index.contains(id) {
            return;
        }
        self.index.insert(id.to_string());
        self.ids.push(id.to_string());
    }

    /// Ids in watch-list order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Number of tracked ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids joined with commas, as the provider expects them.
    pub fn joined(&self) -> String {
        self.ids.join(",")
    }
}

impl PartialEq for WatchList {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for WatchList {}

/// Trait providing watch-list parsing from text.
pub trait WatchListParser {
    /// Parses ids from a buffered reader.
    ///
    /// Ids may be separated by commas, whitespace or new lines; everything after `#`
    /// on a line is ignored.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<WatchList>;
}

impl WatchListParser for WatchList {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut list = WatchList::default();

        for line_result in reader.lines() {
            let line = line_result.map_err(CoinError::Io)?;
            let content = match line.split_once('#') {
                Some((before, _)) => before,
                None => line.as_str(),
            };
            for id in content.split(|c: char| c == ',' || c.is_whitespace()) {
                list.insert(id);
            }
        }
        Ok(list)
    }
}

/// Source of the watch-list, read once per fetch cycle.
pub trait WatchListStore: Send + Sync {
    /// Current watch-list.
    fn list(&self) -> Result<WatchList>;

    /// Release the store connection. Later `list` calls fail with `StoreClosed`.
    fn close(&self) -> Result<()>;
}

/// File-backed watch-list store.
#[derive(Debug)]
pub struct FileWatchList {
    path: PathBuf,
    closed: AtomicBool,
}

impl FileWatchList {
    /// Open the store, failing when the file cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        File::open(&path).map_err(|e| {
            CoinError::StoreUnavailable(format!("{}: {}", path.display(), e))
        })?;
        info!("Watch-list store opened: {}", path.display());
        Ok(Self {
            path,
            closed: AtomicBool::new(false),
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatchListStore for FileWatchList {
    fn list(&self) -> Result<WatchList> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoinError::StoreClosed);
        }
        let file = File::open(&self.path).map_err(|e| {
            CoinError::StoreUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let list = WatchList::parse_from_reader(BufReader::new(file))?;
        debug!("Loaded {} watched ids from {}", list.len(), self.path.display());
        Ok(list)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Watch-list store closed: {}", self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parses_mixed_separators_and_comments() {
        let text = "bitcoin, ethereum\n# stablecoins below\ntether  usd-coin # pegged\n\nbitcoin\n";
        let list = WatchList::parse_from_reader(Cursor::new(text)).unwrap();
        assert_eq!(list.ids(), ["bitcoin", "ethereum", "tether", "usd-coin"]);
        assert!(list.contains("tether"));
        assert!(!list.contains("pegged"));
        assert_eq!(list.joined(), "bitcoin,ethereum,tether,usd-coin");
    }

    #[test]
    fn from_ids_keeps_first_occurrence() {
        let list = WatchList::from_ids(["b", " a ", "b", ""]);
        assert_eq!(list.ids(), ["b", "a"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn store_rereads_file_each_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bitcoin").unwrap();
        let store = FileWatchList::open(file.path()).unwrap();
        assert_eq!(store.list().unwrap().ids(), ["bitcoin"]);

        writeln!(file, "solana").unwrap();
        assert_eq!(store.list().unwrap().ids(), ["bitcoin", "solana"]);
    }

    #[test]
    fn closed_store_refuses_reads() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = FileWatchList::open(file.path()).unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(store.list(), Err(CoinError::StoreClosed)));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileWatchList::open(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, CoinError::StoreUnavailable(_)));
    }
}
