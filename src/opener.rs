//! Launching links in the operator's browser

use crate::error::{Result, UnsubError};
use std::fmt::Display;

/// Opens a URL somewhere the operator can act on it
pub trait LinkOpener: Send + Sync {
    /// Fire and forget; only a failure to launch is reported
    fn open(&self, url: &str) -> Result<()>;
}

/// Uses the platform's default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        tracing::debug!("Opening {}", url);
        ::opener::open_browser(url).map_err(|e| open_failed(url, e))
    }
}

fn open_failed(url: &str, cause: impl Display) -> UnsubError {
    UnsubError::OpenError {
        url: url.to_string(),
        message: cause.to_string(),
    }
}
