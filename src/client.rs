//! Mailbox transport: the trait the fetcher drives and its IMAP implementation

use async_trait::async_trait;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ServerSettings;
use crate::error::{Result, UnsubError};

type ImapSession = imap::Session<native_tls::TlsStream<TcpStream>>;

/// Operations the fetcher needs from a mailbox
#[async_trait]
pub trait MailboxTransport: Send {
    /// Identifiers matching `criteria`, oldest message first
    async fn search(&mut self, criteria: &str) -> Result<Vec<String>>;

    /// Raw RFC 822 bytes of one message
    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>>;

    async fn logout(&mut self) -> Result<()>;
}

/// IMAP over TLS
///
/// The `imap` client is blocking, so every call runs on the blocking pool
/// and is bounded by the configured deadline. The socket carries the same
/// deadline as read/write timeouts so an abandoned call does not hang the
/// worker thread forever either.
///
/// A call that misses its deadline leaves the stream mid-response, so the
/// session is abandoned and every later call fails with `NetworkError`.
pub struct ImapTransport {
    session: Arc<Mutex<ImapSession>>,
    abandoned: AtomicBool,
    timeout: Duration,
    host: String,
}

impl ImapTransport {
    /// Connect, authenticate and select the configured folder
    pub async fn connect(settings: &ServerSettings, identity: &str, credential: &str) -> Result<Self> {
        info!("Connecting to {}:{}...", settings.host, settings.port);

        let timeout = settings.timeout;
        let open_settings = settings.clone();
        let identity = identity.to_string();
        let credential = credential.to_string();
        let task = tokio::task::spawn_blocking(move || {
            open_session(&open_settings, &identity, &credential)
        });

        let session = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(UnsubError::Unknown(format!("IMAP connect task failed: {}", e))),
            Err(_) => {
                return Err(UnsubError::Timeout {
                    operation: format!("connect to {}", settings.host),
                    secs: timeout.as_secs(),
                })
            }
        };

        info!("Login successful, selected {}", settings.folder);
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            abandoned: AtomicBool::new(false),
            timeout,
            host: settings.host.clone(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run one blocking session call under the deadline
    async fn call<T, F>(&self, operation: String, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapSession) -> Result<T> + Send + 'static,
    {
        run_with_deadline(&self.session, &self.abandoned, self.timeout, operation, f).await
    }
}

#[async_trait]
impl MailboxTransport for ImapTransport {
    async fn search(&mut self, criteria: &str) -> Result<Vec<String>> {
        let query = criteria.to_string();
        let mut ids = self
            .call(format!("search {}", criteria), move |session| {
                Ok(session.search(&query)?.into_iter().collect::<Vec<u32>>())
            })
            .await?;

        // Sequence numbers grow with arrival order
        ids.sort_unstable();
        debug!("Search '{}' matched {} messages", criteria, ids.len());
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>> {
        let sequence: u32 = id.parse().map_err(|_| UnsubError::FetchError {
            id: id.to_string(),
            message: "not a message sequence number".to_string(),
        })?;
        let id = id.to_string();

        self.call(format!("fetch {}", id), move |session| {
            let fetches = session
                .fetch(sequence.to_string(), "RFC822")
                .map_err(|e| UnsubError::FetchError {
                    id: id.clone(),
                    message: e.to_string(),
                })?;
            body_for(sequence, fetches.iter().map(|fetch| (fetch.message, fetch.body())))
                .map(|body| body.to_vec())
                .ok_or_else(|| UnsubError::FetchError {
                    id: id.clone(),
                    message: "server returned no body for this message".to_string(),
                })
        })
        .await
    }

    async fn logout(&mut self) -> Result<()> {
        self.call("logout".to_string(), |session| Ok(session.logout()?))
            .await
    }
}

/// Run `f` against the shared session on the blocking pool, bounded by `timeout`
///
/// Missing the deadline marks the session abandoned. The blocking task keeps
/// the lock until the socket timeout releases it.
async fn run_with_deadline<S, T, F>(
    session: &Arc<Mutex<S>>,
    abandoned: &AtomicBool,
    timeout: Duration,
    operation: String,
    f: F,
) -> Result<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> Result<T> + Send + 'static,
{
    if abandoned.load(Ordering::SeqCst) {
        return Err(UnsubError::NetworkError(format!(
            "cannot {}: IMAP session abandoned after a timeout",
            operation
        )));
    }

    let session = Arc::clone(session);
    let task = tokio::task::spawn_blocking(move || {
        let mut guard = session
            .lock()
            .map_err(|_| UnsubError::NetworkError("IMAP session is unusable".to_string()))?;
        f(&mut guard)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(UnsubError::Unknown(format!("{} task failed: {}", operation, e))),
        Err(_) => {
            warn!("{} missed its deadline, abandoning the IMAP session", operation);
            abandoned.store(true, Ordering::SeqCst);
            Err(UnsubError::Timeout {
                operation,
                secs: timeout.as_secs(),
            })
        }
    }
}

/// Body of the response for `sequence`; responses for other messages are ignored
fn body_for<'a>(
    sequence: u32,
    responses: impl IntoIterator<Item = (u32, Option<&'a [u8]>)>,
) -> Option<&'a [u8]> {
    responses
        .into_iter()
        .filter(|(message, _)| *message == sequence)
        .find_map(|(_, body)| body)
}

fn open_session(settings: &ServerSettings, identity: &str, credential: &str) -> Result<ImapSession> {
    let tcp = TcpStream::connect((settings.host.as_str(), settings.port)).map_err(|e| {
        UnsubError::NetworkError(format!(
            "failed to connect to {}:{}: {}",
            settings.host, settings.port, e
        ))
    })?;
    tcp.set_read_timeout(Some(settings.timeout))?;
    tcp.set_write_timeout(Some(settings.timeout))?;

    let connector = native_tls::TlsConnector::builder()
        .build()
        .map_err(|e| UnsubError::NetworkError(format!("failed to build TLS connector: {}", e)))?;
    let tls = connector
        .connect(&settings.host, tcp)
        .map_err(|e| UnsubError::NetworkError(format!("TLS handshake with {} failed: {}", settings.host, e)))?;

    let mut client = imap::Client::new(tls);
    client.read_greeting()?;

    let mut session = client
        .login(identity, credential)
        .map_err(|(e, _client)| UnsubError::AuthError(e.to_string()))?;

    session.select(&settings.folder)?;
    Ok(session)
}
