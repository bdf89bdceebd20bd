//! Sender exclusions
//!
//! The skip list permanently removes a sender from every future run,
//! whoever the operator is. It is a plain text file with one address per
//! line and is only ever appended to.

use crate::error::Result;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Addresses on the permanent skip list
#[derive(Debug, Default, Clone)]
pub struct SkipSet {
    /// Set of addresses for fast lookup
    addresses: HashSet<String>,
    /// Lines in file order, duplicates included
    entries: Vec<String>,
}

impl SkipSet {
    /// Create a new empty skip set
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the skip list; a missing file is an empty list
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> Self {
        let mut set = Self::new();
        for line in content.lines() {
            let address = line.trim();
            if !address.is_empty() {
                set.insert(address.to_string());
            }
        }
        set
    }

    /// Append one address line to the file
    ///
    /// Duplicate lines are not filtered out; they are harmless on reload.
    pub fn append(path: &Path, address: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", address)?;
        Ok(())
    }

    /// Add an address in memory
    pub fn insert(&mut self, address: String) {
        self.addresses.insert(address.clone());
        self.entries.push(address);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Number of distinct addresses
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Lines as read, duplicates included
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Why a sender is kept out of the results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    Skipped,
    Resolved,
}

/// Senders excluded for one operator's session
#[derive(Debug, Default, Clone)]
pub struct SenderExclusions {
    skipped: SkipSet,
    resolved: HashSet<String>,
}

impl SenderExclusions {
    pub fn new(skipped: SkipSet, resolved: HashSet<String>) -> Self {
        Self { skipped, resolved }
    }

    /// Skip list wins over history when both match
    pub fn reason(&self, address: &str) -> Option<ExclusionReason> {
        if self.skipped.contains(address) {
            Some(ExclusionReason::Skipped)
        } else if self.resolved.contains(address) {
            Some(ExclusionReason::Resolved)
        } else {
            None
        }
    }

    pub fn is_excluded(&self, address: &str) -> bool {
        self.reason(address).is_some()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}
