//! Mail retrieval: fetches the newest messages of the inbox over IMAP.

use std::cmp::Reverse;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use imap::{ClientBuilder, ConnectionMode};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mailpeek_content::extract_body;
use mailpeek_core::{INBOX, Message, TIMESTAMP_FORMAT, UNKNOWN_TIMESTAMP};

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub skip_tls_verify: bool,
}

impl ImapConfig {
    /// Rejects empty credentials before any connection is attempted.
    pub fn validate(&self) -> Result<(), FetchError> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.port == 0 {
            missing.push("port");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FetchError::Precondition(format!(
                "missing imap {}",
                missing.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid fetch request: {0}")]
    Precondition(String),
    #[error("failed to connect: {0}")]
    Connection(String),
    #[error("login failed: {0}")]
    Auth(String),
    #[error("mailbox error: {0}")]
    Protocol(String),
    #[error("fetch failed after {received} messages: {reason}")]
    PartialFetch { received: usize, reason: String },
}

/// Contiguous range of sequence numbers, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqWindow {
    pub first: u32,
    pub last: u32,
}

impl SeqWindow {
    /// The newest `min(total, limit)` messages, or `None` for an empty mailbox.
    pub fn for_total(total: u32, limit: u32) -> Option<Self> {
        if total == 0 || limit == 0 {
            return None;
        }
        let first = if total > limit { total - limit + 1 } else { 1 };
        Some(Self { first, last: total })
    }

    pub fn count(&self) -> usize {
        (self.last - self.first + 1) as usize
    }

    pub fn sequence_set(&self) -> String {
        format!("{}:{}", self.first, self.last)
    }
}

/// Envelope fields and full body of one message as the server returned them.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub seq: u32,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl RawMessage {
    pub fn into_message(self) -> Message {
        let body = self.body.as_deref().map(extract_body).unwrap_or_default();
        Message {
            from: self.from.unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            timestamp: format_timestamp(self.date.as_deref()),
            body,
        }
    }
}

/// Opens an authenticated session.
pub trait MailboxConnector: Send + 'static {
    type Session: MailboxSession;

    fn connect(&self) -> Result<Self::Session, FetchError>;
}

pub trait MailboxSession {
    /// Opens the inbox and returns its message count.
    fn select_inbox(&mut self) -> Result<u32, FetchError>;

    /// Fetches envelope and body for every message in `window`, handing each
    /// to `sink` as it is decoded.
    fn fetch_window(
        &mut self,
        window: SeqWindow,
        sink: &mut dyn FnMut(RawMessage) -> Result<(), FetchError>,
    ) -> Result<(), FetchError>;

    fn logout(&mut self) -> Result<(), FetchError>;
}

/// Logs the session out when dropped.
struct SessionGuard<S: MailboxSession> {
    session: S,
}

impl<S: MailboxSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: MailboxSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: MailboxSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        match self.session.logout() {
            Ok(()) => debug!("imap logout"),
            Err(err) => warn!(error = %err, "imap logout failed"),
        }
    }
}

/// Fetches the newest `limit` inbox messages, newest first.
///
/// The session runs on a blocking worker that streams messages through a
/// queue sized to `limit`. Draining the queue and the worker's own result are
/// joined into one outcome: a worker failure discards everything drained.
pub async fn fetch_latest<C: MailboxConnector>(
    connector: C,
    limit: u32,
) -> Result<Vec<Message>, FetchError> {
    if limit == 0 {
        return Err(FetchError::Precondition(
            "fetch limit must be positive".to_string(),
        ));
    }
    let (tx, rx) = mpsc::channel::<RawMessage>(limit as usize);
    let worker = tokio::task::spawn_blocking(move || run_fetch(&connector, limit, tx));
    let (mut drained, joined) = tokio::join!(drain(rx), worker);

    let completion = joined
        .map_err(|err| FetchError::Protocol(format!("fetch worker stopped: {err}")))?;
    if let Err(err) = completion {
        warn!(error = %err, received = drained.len(), "imap fetch failed");
        if drained.is_empty() {
            return Err(err);
        }
        return Err(FetchError::PartialFetch {
            received: drained.len(),
            reason: err.to_string(),
        });
    }

    drained.sort_by_key(|(seq, _)| Reverse(*seq));
    info!(count = drained.len(), "imap fetch complete");
    Ok(drained.into_iter().map(|(_, message)| message).collect())
}

async fn drain(mut rx: mpsc::Receiver<RawMessage>) -> Vec<(u32, Message)> {
    let mut out = Vec::new();
    while let Some(raw) = rx.recv().await {
        let seq = raw.seq;
        out.push((seq, raw.into_message()));
    }
    out
}

fn run_fetch<C: MailboxConnector>(
    connector: &C,
    limit: u32,
    tx: mpsc::Sender<RawMessage>,
) -> Result<(), FetchError> {
    let mut session = SessionGuard {
        session: connector.connect()?,
    };
    let total = session.select_inbox()?;
    debug!(mailbox = INBOX, total, "imap select");
    let Some(window) = SeqWindow::for_total(total, limit) else {
        info!(mailbox = INBOX, "mailbox empty");
        return Ok(());
    };
    debug!(
        first = window.first,
        last = window.last,
        count = window.count(),
        "imap fetch window"
    );
    session.fetch_window(window, &mut |raw: RawMessage| {
        tx.blocking_send(raw)
            .map_err(|_| FetchError::Protocol("result queue closed".to_string()))
    })
}

/// IMAP over TLS.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: ImapConfig,
}

impl ImapConnector {
    pub fn new(config: ImapConfig) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl MailboxConnector for ImapConnector {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession, FetchError> {
        let cfg = &self.config;
        debug!(host = %cfg.host, port = cfg.port, "imap connect");
        let client = ClientBuilder::new(cfg.host.as_str(), cfg.port)
            .tls_kind(imap::TlsKind::Native)
            .mode(ConnectionMode::Tls)
            .danger_skip_tls_verify(cfg.skip_tls_verify)
            .connect()
            .map_err(|err| FetchError::Connection(err.to_string()))?;
        let session = client
            .login(&cfg.username, &cfg.password)
            .map_err(|(err, _)| FetchError::Auth(err.to_string()))?;
        debug!("imap login ok");
        Ok(ImapSession { session })
    }
}

pub struct ImapSession {
    session: imap::Session<imap::Connection>,
}

impl MailboxSession for ImapSession {
    fn select_inbox(&mut self) -> Result<u32, FetchError> {
        let mailbox = self
            .session
            .select(INBOX)
            .map_err(|err| FetchError::Protocol(format!("select {INBOX}: {err}")))?;
        Ok(mailbox.exists)
    }

    fn fetch_window(
        &mut self,
        window: SeqWindow,
        sink: &mut dyn FnMut(RawMessage) -> Result<(), FetchError>,
    ) -> Result<(), FetchError> {
        let fetches = self
            .session
            .fetch(window.sequence_set(), "(ENVELOPE BODY.PEEK[])")
            .map_err(|err| FetchError::Protocol(format!("fetch: {err}")))?;
        for fetch in fetches.iter() {
            let mut raw = RawMessage {
                seq: fetch.message,
                body: fetch.body().map(|b| b.to_vec()),
                ..RawMessage::default()
            };
            if let Some(envelope) = fetch.envelope() {
                raw.from = envelope
                    .from
                    .as_ref()
                    .and_then(|addrs| addrs.first())
                    .map(address_string);
                raw.subject = envelope.subject.as_deref().map(decode_header_value);
                raw.date = envelope
                    .date
                    .as_deref()
                    .map(|d| String::from_utf8_lossy(d).into_owned());
            }
            sink(raw)?;
        }
        Ok(())
    }

    fn logout(&mut self) -> Result<(), FetchError> {
        self.session
            .logout()
            .map_err(|err| FetchError::Protocol(format!("logout: {err}")))
    }
}

fn address_string(addr: &imap_proto::types::Address) -> String {
    let mailbox = addr
        .mailbox
        .as_deref()
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    match addr.host.as_deref().map(String::from_utf8_lossy) {
        Some(host) if !mailbox.is_empty() => format!("{mailbox}@{host}"),
        _ => mailbox.into_owned(),
    }
}

/// Decodes RFC 2047 encoded words in an envelope field.
fn decode_header_value(raw: &[u8]) -> String {
    let line = [b"Subject: ".as_slice(), raw].concat();
    match mailparse::parse_header(&line) {
        Ok((header, _)) => header.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Canonical `YYYY-MM-DD HH:MM:SS` in UTC, whichever parser accepts the date.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return UNKNOWN_TIMESTAMP.to_string();
    };
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string();
    }
    mailparse::dateparse(raw)
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string())
}
