//! Command-line interface

use clap::Parser;
use crossterm::style::Stylize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

use crate::client::{ImapTransport, MailboxTransport};
use crate::config::Config;
use crate::display::{Presenter, TerminalPresenter};
use crate::error::Result;
use crate::interactive::{InquirePrompt, ReviewSession, SessionSummary};
use crate::links::RegexLinkExtractor;
use crate::opener::SystemOpener;
use crate::report::Reporter;
use crate::scanner::BatchFetcher;
use crate::state::{FileState, PersistentState};

#[derive(Parser, Debug)]
#[command(name = "unsubscribe")]
#[command(version)]
#[command(about = "Find newsletter unsubscribe links in your inbox and act on them", long_about = None)]
pub struct Cli {
    /// Mailbox address used to log in (also keys the resolved history)
    pub email: String,

    /// Password or app password for the mailbox
    pub password: String,

    /// Number of unique messages to collect
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Path to configuration file
    #[arg(short, long, default_value = "unsubscribe.toml")]
    pub config: PathBuf,

    /// Path to the permanent skip list
    #[arg(long, default_value = ".unsubscribe/skip_list.txt")]
    pub skip_file: PathBuf,

    /// Path to the resolved-sender history
    #[arg(long, default_value = ".unsubscribe/history.json")]
    pub history_file: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
    fetch_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
            fetch_bar: Mutex::new(None),
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        println!("  ✓ {}", msg);
    }

    fn with_fetch_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.fetch_bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    /// Print above an active bar, or straight to stdout when none is shown
    fn print(&self, line: String) {
        let bar_active = self
            .fetch_bar
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        if bar_active {
            let _ = self.multi.println(line);
        } else {
            println!("{}", line);
        }
    }
}

impl Reporter for ProgressReporter {
    fn notice(&self, message: &str) {
        self.print(message.green().to_string());
    }

    fn warning(&self, message: &str) {
        self.print(message.red().to_string());
    }

    fn fetch_started(&self, pool_size: usize, target: usize) {
        let bar = self.add_progress_bar(
            target as u64,
            &format!("Scanning {} messages...", pool_size),
        );
        if let Ok(mut guard) = self.fetch_bar.lock() {
            *guard = Some(bar);
        }
    }

    fn batch_started(&self, batch_size: usize) {
        self.with_fetch_bar(|bar| bar.set_message(format!("Fetching batch of {}...", batch_size)));
    }

    fn message_processed(&self, accepted_so_far: usize) {
        self.with_fetch_bar(|bar| bar.set_position(accepted_so_far as u64));
    }

    fn fetch_finished(&self, accepted: usize) {
        let bar = self.fetch_bar.lock().ok().and_then(|mut guard| guard.take());
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        println!("  ✓ Collected {} unique messages", accepted);
    }
}

/// Connect, collect candidates, then hand over to the operator
///
/// Configuration problems and an unsupported mailbox domain are reported
/// before any connection is attempted.
pub async fn run_session(cli: &Cli, multi: MultiProgress) -> Result<SessionSummary> {
    let reporter = ProgressReporter::new(multi);

    // Step 1: Resolve configuration and server
    let config = Config::load(&cli.config).await?;
    let settings = config.server_for(&cli.email)?;

    // Step 2: Load exclusions for this operator
    let state = FileState::new(&cli.skip_file, &cli.history_file);
    let exclusions = state.exclusions_for(&cli.email)?;
    info!(
        "Excluding {} skipped and {} resolved senders",
        exclusions.skipped_count(),
        exclusions.resolved_count()
    );

    // Step 3: Connect
    let spinner = reporter.add_spinner(&format!("Connecting to {}...", settings.host));
    let mut transport = match ImapTransport::connect(&settings, &cli.email, &cli.password).await {
        Ok(transport) => {
            reporter.finish_spinner(&spinner, "Login successful!");
            transport
        }
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    // Step 4: Collect candidates, then log out whatever the outcome
    let extractor = RegexLinkExtractor::new();
    let fetched = BatchFetcher::new(&mut transport, &extractor, &exclusions, &reporter)
        .with_criteria(config.mailbox.search.clone())
        .collect(cli.count as usize)
        .await;

    if let Err(e) = transport.logout().await {
        warn!("Logout from {} failed: {}", transport.host(), e);
    }
    let messages = fetched?;

    if messages.is_empty() {
        reporter.notice("No emails found with unsubscribe links.");
        return Ok(SessionSummary::default());
    }

    // Step 5: Review
    let presenter = TerminalPresenter::new(config.session.dump_tail_chars);
    presenter.show_table(&messages);

    let opener = SystemOpener;
    let mut session = ReviewSession::new(
        &messages,
        &cli.email,
        &state,
        &opener,
        &presenter,
        &reporter,
    );
    session.run(&mut InquirePrompt)
}
