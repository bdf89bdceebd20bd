use anyhow::Result;
use clap::Parser;
use inbox_unsubscribe::cli::{self, Cli};
use inbox_unsubscribe::error::UnsubError;
use indicatif::MultiProgress;
use std::io::{IsTerminal, Write};
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                // MultiProgress drops printed lines when stderr is not a tty
                if std::io::stderr().is_terminal() {
                    let _ = self.multi.println(msg);
                } else {
                    eprintln!("{}", msg);
                }
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inbox_unsubscribe=debug,warn"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inbox_unsubscribe=info,warn"))
    };

    // Logs print above the fetch progress bar
    let multi_progress = Arc::new(MultiProgress::new());
    let make_writer = MultiProgressMakeWriter {
        multi: Arc::clone(&multi_progress),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("Starting unsubscribe session for {}", cli.email);

    let summary = cli::run_session(&cli, (*multi_progress).clone()).await?;

    println!();
    println!("Session finished: {}", summary);
    Ok(())
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(err) = error.downcast_ref::<UnsubError>() {
        if err.is_fatal() {
            eprintln!("\nNothing was fetched and no state was changed.");
        }
        match err {
            UnsubError::UnsupportedDomain(_) => {
                eprintln!("\nHint: Add the domain's IMAP host under [mailbox.servers]");
                eprintln!("      in your configuration file.");
            }
            UnsubError::AuthError(_) => {
                eprintln!("\nHint: Check the address and password.");
                eprintln!("      Many providers require an app password for IMAP access.");
            }
            UnsubError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
            }
            UnsubError::Timeout { .. } => {
                eprintln!("\nHint: Raise mailbox.timeout_secs for slow connections.");
            }
            _ => {}
        }
    }
}
