//! Connection to a submission server.
//!
//! A [`Connection`] stores the endpoint and opens a fresh session for every
//! submission:
//!
//! ```text
//! Idle ──→ Connecting ──→ Submitting ──┬──→ Completed
//!              │               │       │
//!              └───────────────┴───────┴──→ Failed
//! ```
//!
//! The state of the most recent submission is available from
//! [`Connection::state`] and can be observed with [`Connection::watch_state`].

pub mod config;
mod outcome;
pub mod session;
pub mod stream;

use std::fmt;
use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

pub use config::{Config, ConfigBuilder, Credentials, Security};
pub use outcome::{Delivery, Rejection, SubmitResult, SubmitStatus};
pub use session::{Connected, Ready, ServerInfo, Session};
pub use stream::{MailStream, connect};

use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Transaction, plan};

/// Submission state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    /// No submission has started.
    #[default]
    Idle,
    /// Opening the session (connect, greeting, EHLO, TLS, AUTH).
    Connecting,
    /// Sending transactions and waiting for acknowledgments.
    Submitting,
    /// The last submission was accepted for at least one recipient.
    Completed,
    /// The last submission failed or was cancelled.
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Submitting => "submitting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// Client for one submission endpoint.
///
/// Cloning is cheap; clones share the state and submit one at a time.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: Config,
    state: watch::Sender<State>,
    session_lock: Mutex<()>,
}

impl Connection {
    /// Creates a plaintext connection to `host:port`. No I/O happens until a
    /// message is submitted.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_config(Config::new(host, port))
    }

    /// Creates a connection from a full configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let (state, _) = watch::channel(State::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                state,
                session_lock: Mutex::new(()),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> State {
        *self.inner.state.borrow()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<State> {
        self.inner.state.subscribe()
    }

    /// Submits `message` and waits for the server's acknowledgment.
    ///
    /// The message is rendered before the first await, so later changes to it
    /// do not affect this submission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a message without recipients or
    /// content, [`Error::ServerRejected`] if no recipient was accepted, and
    /// transport errors as they occur. A transport error after some
    /// recipients were already queued is wrapped in [`Error::Interrupted`].
    pub async fn send(&self, message: &Message) -> Result<SubmitResult> {
        let transactions = plan(message)?;
        self.inner.run(transactions).await
    }

    /// Submits `message`, blocking the calling thread until it resolves.
    ///
    /// Must not be called from within an async runtime; use [`send`] or
    /// [`submit_async`] there.
    ///
    /// [`send`]: Self::send
    /// [`submit_async`]: Self::submit_async
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send). Also returns [`Error::InvalidArgument`]
    /// when called from within an async runtime.
    pub fn submit(&self, message: &Message) -> Result<SubmitResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::invalid(
                "blocking submit called from within an async runtime",
            ));
        }

        let transactions = plan(message)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.inner.run(transactions))
    }

    /// Starts submitting `message` in the background.
    ///
    /// The returned [`Submission`] resolves like [`send`](Self::send) and can
    /// be cancelled. Dropping it does not cancel the submission. Outside of a
    /// tokio runtime it resolves to [`Error::InvalidArgument`].
    pub fn submit_async(&self, message: &Message) -> Submission {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Submission::failed(Error::invalid(
                "submit_async called outside of a tokio runtime",
            ));
        };

        let transactions = plan(message);
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move { inner.run(transactions?).await });
        Submission {
            task: Task::Spawned(handle),
        }
    }
}

impl Inner {
    async fn run(&self, transactions: Vec<Transaction>) -> Result<SubmitResult> {
        let _session = self.session_lock.lock().await;

        let guard = StateGuard::new(&self.state);
        let result = self.exchange(&guard, &transactions).await;
        guard.settle(&result);
        result
    }

    async fn exchange(
        &self,
        guard: &StateGuard<'_>,
        transactions: &[Transaction],
    ) -> Result<SubmitResult> {
        let config = &self.config;

        guard.set(State::Connecting);
        let stream = connect(config).await?;
        let session = Session::from_stream(stream, config.io_timeout).await?;
        let mut session = session.ehlo(&config.client_hostname).await?;

        if config.security == Security::StartTls {
            session = session
                .starttls(&config.host, config.connect_timeout)
                .await?
                .ehlo(&config.client_hostname)
                .await?;
        }
        if let Some(credentials) = &config.credentials {
            session.auth_plain(credentials).await?;
        }

        guard.set(State::Submitting);
        let mut result = SubmitResult::default();
        for transaction in transactions {
            match session.transact(transaction).await {
                Ok(outcome) => result.extend(outcome),
                Err(e) if result.accepted().is_empty() => return Err(e),
                Err(e) => {
                    return Err(Error::Interrupted {
                        delivered: Box::new(result),
                        source: Box::new(e),
                    });
                }
            }
        }

        if let Err(e) = session.quit().await {
            tracing::debug!(error = %e, "QUIT failed");
        }

        result.finish()
    }
}

/// Marks the submission failed if it is dropped before settling.
struct StateGuard<'a> {
    state: &'a watch::Sender<State>,
    settled: bool,
}

impl<'a> StateGuard<'a> {
    const fn new(state: &'a watch::Sender<State>) -> Self {
        Self {
            state,
            settled: false,
        }
    }

    fn set(&self, next: State) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "connection state changed");
    }

    fn settle(mut self, result: &Result<SubmitResult>) {
        self.settled = true;
        match result {
            Ok(outcome) => {
                tracing::info!(
                    queue_id = outcome.queue_id(),
                    accepted = outcome.accepted().len(),
                    rejected = outcome.rejected().len(),
                    "submission completed"
                );
                self.set(State::Completed);
            }
            Err(e) => {
                tracing::debug!(error = %e, "submission failed");
                self.set(State::Failed);
            }
        }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.set(State::Failed);
        }
    }
}

/// A submission running in the background.
///
/// Resolves to the submission's result, or to [`Error::Cancelled`] after
/// [`cancel`](Self::cancel).
#[derive(Debug)]
#[must_use = "a submission does nothing useful unless awaited"]
pub struct Submission {
    task: Task,
}

#[derive(Debug)]
enum Task {
    Spawned(JoinHandle<Result<SubmitResult>>),
    Failed(future::Ready<Result<SubmitResult>>),
}

impl Submission {
    fn failed(error: Error) -> Self {
        Self {
            task: Task::Failed(future::ready(Err(error))),
        }
    }

    /// Aborts the submission.
    ///
    /// Bytes already flushed may have been accepted by the server; the
    /// outcome of a cancelled submission is unknown.
    pub fn cancel(&self) {
        if let Task::Spawned(handle) = &self.task {
            handle.abort();
        }
    }

    /// Returns true once the submission has resolved.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.task {
            Task::Spawned(handle) => handle.is_finished(),
            Task::Failed(_) => true,
        }
    }
}

impl Future for Submission {
    type Output = Result<SubmitResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let handle = match &mut self.task {
            Task::Spawned(handle) => handle,
            Task::Failed(outcome) => return Pin::new(outcome).poll(cx),
        };
        match ready!(Pin::new(handle).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(e) if e.is_cancelled() => Poll::Ready(Err(Error::Cancelled)),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}
