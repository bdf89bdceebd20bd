//! Persisted skip list and per-operator history of resolved senders

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, UnsubError};
use crate::exclusions::{SenderExclusions, SkipSet};

/// Resolved senders per operator identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryMap {
    operators: BTreeMap<String, Vec<String>>,
}

/// Outcome of recording a resolved sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdate {
    Added,
    AlreadyPresent,
}

impl HistoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses resolved by `operator`, in insertion order
    pub fn resolved_by(&self, operator: &str) -> &[String] {
        self.operators
            .get(operator)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn resolved_set(&self, operator: &str) -> HashSet<String> {
        self.resolved_by(operator).iter().cloned().collect()
    }

    pub fn contains(&self, operator: &str, address: &str) -> bool {
        self.resolved_by(operator).iter().any(|a| a == address)
    }

    /// Insert if absent; insertion order is kept
    pub fn insert(&mut self, operator: &str, address: &str) -> HistoryUpdate {
        let list = self.operators.entry(operator.to_string()).or_default();
        if list.iter().any(|a| a == address) {
            return HistoryUpdate::AlreadyPresent;
        }
        list.push(address.to_string());
        HistoryUpdate::Added
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    /// Load the history file
    ///
    /// A missing file is an empty history. A file that cannot be read as a
    /// history document is also treated as empty, with a warning.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No history file at {:?}, starting empty", path);
            return Self::new();
        }

        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Could not read history file {:?}: {}. Using empty history", path, e);
                return Self::new();
            }
        };

        match serde_json::from_str::<Self>(&json) {
            Ok(history) => {
                tracing::debug!(
                    "Loaded history for {} operator(s) from {:?}",
                    history.operator_count(),
                    path
                );
                history
            }
            Err(e) => {
                tracing::warn!("History file {:?} is corrupt ({}). Using empty history", path, e);
                Self::new()
            }
        }
    }

    /// Write the whole history back
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!("Saved history to {:?}", path);
        Ok(())
    }
}

/// Cross-run store of skipped and resolved senders
pub trait PersistentState: Send + Sync {
    fn load_skip_set(&self) -> Result<SkipSet>;

    fn append_skip(&self, address: &str) -> Result<()>;

    /// Never fails on a corrupt store; it reads as empty instead
    fn load_history(&self) -> Result<HistoryMap>;

    fn add_history(&self, operator: &str, address: &str) -> Result<HistoryUpdate>;

    /// Exclusions for one operator, read once at session start
    fn exclusions_for(&self, operator: &str) -> Result<SenderExclusions> {
        let skipped = self.load_skip_set()?;
        let resolved = self.load_history()?.resolved_set(operator);
        Ok(SenderExclusions::new(skipped, resolved))
    }
}

/// File-backed state: a plain skip list and a JSON history document
#[derive(Debug, Clone)]
pub struct FileState {
    skip_path: PathBuf,
    history_path: PathBuf,
}

impl FileState {
    pub fn new(skip_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            skip_path: skip_path.into(),
            history_path: history_path.into(),
        }
    }

    pub fn skip_path(&self) -> &Path {
        &self.skip_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

impl PersistentState for FileState {
    fn load_skip_set(&self) -> Result<SkipSet> {
        SkipSet::load(&self.skip_path)
    }

    fn append_skip(&self, address: &str) -> Result<()> {
        SkipSet::append(&self.skip_path, address)?;
        tracing::info!("Added {} to skip list {:?}", address, self.skip_path);
        Ok(())
    }

    fn load_history(&self) -> Result<HistoryMap> {
        Ok(HistoryMap::load(&self.history_path))
    }

    fn add_history(&self, operator: &str, address: &str) -> Result<HistoryUpdate> {
        let mut history = HistoryMap::load(&self.history_path);
        let update = history.insert(operator, address);
        if update == HistoryUpdate::Added {
            history.save(&self.history_path)?;
            tracing::info!("Recorded {} as resolved for {}", address, operator);
        }
        Ok(update)
    }
}

/// In-process state, nothing touches disk
#[derive(Debug, Default)]
pub struct MemoryState {
    skipped: Mutex<Vec<String>>,
    history: Mutex<HistoryMap>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skipped<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = Self::new();
        if let Ok(mut skipped) = state.skipped.lock() {
            skipped.extend(addresses.into_iter().map(Into::into));
        }
        state
    }

    fn poisoned(what: &str) -> UnsubError {
        UnsubError::StateError(format!("{} lock poisoned", what))
    }
}

impl PersistentState for MemoryState {
    fn load_skip_set(&self) -> Result<SkipSet> {
        let skipped = self.skipped.lock().map_err(|_| Self::poisoned("skip list"))?;
        let mut set = SkipSet::new();
        for address in skipped.iter() {
            set.insert(address.clone());
        }
        Ok(set)
    }

    fn append_skip(&self, address: &str) -> Result<()> {
        self.skipped
            .lock()
            .map_err(|_| Self::poisoned("skip list"))?
            .push(address.to_string());
        Ok(())
    }

    fn load_history(&self) -> Result<HistoryMap> {
        Ok(self
            .history
            .lock()
            .map_err(|_| Self::poisoned("history"))?
            .clone())
    }

    fn add_history(&self, operator: &str, address: &str) -> Result<HistoryUpdate> {
        Ok(self
            .history
            .lock()
            .map_err(|_| Self::poisoned("history"))?
            .insert(operator, address))
    }
}
