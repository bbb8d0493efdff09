use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_core::future::BoxFuture;
use hashbrown::HashSet;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::options::ConnectOptions;
use crate::protocol::statement::StmtClose;
use crate::protocol::text::{Ping, Quit};
use crate::query::substitute_params;
use crate::result::{MySqlResultSet, RowFormat, RowStream};
use crate::statement::MySqlStatement;
use crate::transaction::Transaction;
use crate::value::Value;

mod auth;
mod establish;
pub(crate) mod executor;
mod stream;

pub(crate) use stream::MySqlStream;

/// The lifecycle of a connection, driven from the handshake through
/// command/response cycles to the terminal `Closed`.
///
/// Command packets may only be sent while `Established`; issuing one
/// moves the connection to `WaitingCommandResponse` until the final
/// response packet has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Fresh,
    WaitInitialHandshake,
    HandshakeResponseSent,
    Established,
    WaitingCommandResponse,
    QuitSent,
    Closed,
}

/// The portion of an in-flight response that has not been consumed
/// yet, left behind by a dropped row stream or a queued rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    // a whole response, starting at its first packet
    Result,

    // the row packets (and trailing EOF) of a result set
    Rows,
}

/// Close-state shared between the session handle and the core so
/// that `is_open` and `closed()` work without taking the operation
/// lock.
pub(crate) struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();

            if self.is_closed() {
                return;
            }

            notified.await;
        }
    }
}

/// Everything a command needs, guarded by the operation lock.
pub(crate) struct ConnectionCore {
    pub(crate) stream: MySqlStream,
    pub(crate) state: ConnectionState,

    // ids of live prepared statements, closed best-effort on
    // connection close
    pub(crate) statements: HashSet<u32>,

    // unconsumed response portions, drained before the next command
    pub(crate) pending: VecDeque<Pending>,

    pub(crate) close_signal: Arc<CloseSignal>,
}

impl ConnectionCore {
    pub(crate) fn new(stream: MySqlStream, close_signal: Arc<CloseSignal>) -> Self {
        Self {
            stream,
            state: ConnectionState::Fresh,
            statements: HashSet::new(),
            pending: VecDeque::new(),
            close_signal,
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        if self.state != ConnectionState::Closed {
            tracing::debug!("connection closed");
        }

        self.state = ConnectionState::Closed;
        self.close_signal.set_closed();
    }

    /// Drain any leftover response, then claim the connection for a
    /// new command.
    pub(crate) async fn ready_for_command(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Closed | ConnectionState::QuitSent => {
                return Err(Error::ClosedConnection);
            }
            _ => {}
        }

        self.wait_until_ready().await?;

        if self.state != ConnectionState::Established {
            return Err(Error::UnexpectedState(format!(
                "cannot issue a command in the {:?} state",
                self.state
            )));
        }

        self.state = ConnectionState::WaitingCommandResponse;

        Ok(())
    }

    /// Settle the connection state after a command: back to
    /// `Established`, or `Closed` when the error was fatal to the
    /// protocol stream.
    pub(crate) fn finish_command<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.state = ConnectionState::Established;
                Ok(value)
            }

            Err(e) => {
                if e.is_fatal() {
                    self.mark_closed();
                } else {
                    self.state = ConnectionState::Established;
                }

                Err(e)
            }
        }
    }

    /// Gracefully shut the connection down: drain, close prepared
    /// statements, send `COM_QUIT`, and flush the socket.
    pub(crate) async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }

        let result: Result<()> = async {
            self.wait_until_ready().await?;

            // the operation lock is already held for the whole
            // teardown, so the statement sweep shares it
            for statement_id in self.statements.drain() {
                self.stream.sequence_id = 0;
                self.stream.write_packet(StmtClose { statement_id })?;
            }

            self.stream.sequence_id = 0;
            self.stream.write_packet(Quit)?;
            self.stream.flush().await?;
            self.state = ConnectionState::QuitSent;

            self.stream.shutdown().await?;

            Ok(())
        }
        .await;

        self.mark_closed();

        result
    }
}

/// A single session with a MySQL server.
///
/// The handle is cheap to clone and safe to share across tasks; a
/// capacity-one operation lock serializes commands so that at most
/// one is in flight per connection at any moment.
#[derive(Clone)]
pub struct MySqlConnection {
    pub(crate) inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionInner {
    pub(crate) core: Arc<Mutex<ConnectionCore>>,
    pub(crate) in_transaction: AtomicBool,
    pub(crate) close_signal: Arc<CloseSignal>,
    pub(crate) options: ConnectOptions,
}

impl Debug for MySqlConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("open", &self.is_open())
            .finish()
    }
}

impl MySqlConnection {
    pub(crate) async fn lock_core(&self) -> OwnedMutexGuard<ConnectionCore> {
        Arc::clone(&self.inner.core).lock_owned().await
    }

    /// `true` until the connection has been closed, by request or by
    /// a fatal error.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.close_signal.is_closed()
    }

    /// `true` while a transaction is active on this connection.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction.load(Ordering::Acquire)
    }

    /// Resolves once the connection has closed.
    pub async fn closed(&self) {
        self.inner.close_signal.wait().await;
    }

    /// Runs `callback` when the connection closes, or immediately if
    /// it already has.
    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        let signal = Arc::clone(&self.inner.close_signal);

        tokio::spawn(async move {
            signal.wait().await;
            callback();
        });
    }

    /// Checks the connection by sending `COM_PING`.
    pub async fn ping(&self) -> Result<()> {
        let mut core = self.lock_core().await;

        core.ready_for_command().await?;

        let result = async {
            core.stream.send_packet(Ping).await?;
            core.stream.recv_ok().await?;

            Ok(())
        }
        .await;

        core.finish_command(result)
    }

    /// Executes a query and buffers every row of every result set.
    pub async fn execute(&self, query: &str) -> Result<MySqlResultSet> {
        self.execute_with(query, &[]).await
    }

    /// Executes a query after substituting `:name` parameters.
    pub async fn execute_with(
        &self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<MySqlResultSet> {
        let sql = prepare_sql(query, params)?;

        let mut core = self.lock_core().await;

        core.ready_for_command().await?;

        let result = async {
            core.stream.send_packet(crate::protocol::text::ComQuery(&sql)).await?;
            core.read_result_sets(RowFormat::Text).await
        }
        .await;

        core.finish_command(result).map_err(|e| e.with_query(&sql))
    }

    /// Executes a query, streaming rows one at a time.
    ///
    /// The operation lock is held until the stream is exhausted or
    /// dropped; a dropped stream leaves its tail to be drained before
    /// the next command.
    pub async fn fetch(&self, query: &str) -> Result<RowStream> {
        self.fetch_with(query, &[]).await
    }

    /// Streaming variant of [`execute_with`][Self::execute_with].
    pub async fn fetch_with(&self, query: &str, params: &[(&str, Value)]) -> Result<RowStream> {
        let sql = prepare_sql(query, params)?;

        let mut core = self.lock_core().await;

        core.ready_for_command().await?;

        let started = async {
            core.stream.send_packet(crate::protocol::text::ComQuery(&sql)).await?;
            core.begin_result_set().await
        }
        .await;

        match started {
            Ok(begin) => Ok(RowStream::new(core, RowFormat::Text, begin, sql)),
            Err(e) => core.finish_command(Err(e)).map_err(|e| e.with_query(&sql)),
        }
    }

    /// Prepares a statement for repeated execution over the binary
    /// protocol.
    pub async fn prepare(&self, query: &str) -> Result<MySqlStatement> {
        if query.is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }

        let mut core = self.lock_core().await;

        core.ready_for_command().await?;

        let result = core.prepare_statement(query).await;
        let prepared = core.finish_command(result).map_err(|e| e.with_query(query))?;

        Ok(MySqlStatement::new(self.clone(), prepared))
    }

    /// Changes the default schema of the session.
    pub async fn use_database(&self, database: &str) -> Result<()> {
        if database.is_empty() {
            return Err(Error::InvalidArgument("database must not be empty".into()));
        }

        let mut core = self.lock_core().await;

        core.ready_for_command().await?;

        let result = async {
            core.stream
                .send_packet(crate::protocol::text::InitDb(database))
                .await?;
            core.stream.recv_ok().await?;

            Ok(())
        }
        .await;

        core.finish_command(result)
    }

    /// Begins a transaction, holding the operation lock until the
    /// returned [`Transaction`] commits, rolls back, or is dropped.
    pub async fn begin(&self) -> Result<Transaction> {
        Transaction::begin(self).await
    }

    /// Runs `body` inside a transaction: `START TRANSACTION` before,
    /// `COMMIT` on success, `ROLLBACK` on error (preserving the
    /// original error if the rollback itself fails).
    pub async fn transactional<T, F>(&self, body: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let mut tx = self.begin().await?;

        match body(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }

            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(
                        error = %rollback_error,
                        "rollback after transaction failure also failed"
                    );
                }

                Err(e)
            }
        }
    }

    /// Gracefully closes the connection with `COM_QUIT`. Idempotent;
    /// a second call returns immediately.
    pub async fn close(&self) -> Result<()> {
        let mut core = self.lock_core().await;
        core.close().await
    }
}

fn prepare_sql(query: &str, params: &[(&str, Value)]) -> Result<String> {
    if query.is_empty() {
        return Err(Error::InvalidArgument("query must not be empty".into()));
    }

    substitute_params(query, params)
}
