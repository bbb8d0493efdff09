use std::sync::atomic::Ordering;

use tokio::sync::OwnedMutexGuard;

use crate::connection::{ConnectionCore, MySqlConnection, Pending};
use crate::error::{Error, Result};
use crate::protocol::text::ComQuery;
use crate::query::substitute_params;
use crate::result::{MySqlResultSet, RowFormat};
use crate::value::Value;

/// An open transaction.
///
/// The transaction owns the connection's operation lock for its
/// whole lifetime: statements issued through it run without
/// re-acquiring, while every other user of the connection blocks
/// until it ends.
///
/// A transaction dropped without an explicit [`commit`][Self::commit]
/// queues a `ROLLBACK` that is flushed before the connection's next
/// command.
pub struct Transaction {
    core: Option<OwnedMutexGuard<ConnectionCore>>,
    connection: MySqlConnection,
    open: bool,
}

impl Transaction {
    pub(crate) async fn begin(connection: &MySqlConnection) -> Result<Self> {
        if connection
            .inner
            .in_transaction
            .swap(true, Ordering::AcqRel)
        {
            return Err(Error::UnexpectedState(
                "a transaction is already active on this connection".into(),
            ));
        }

        let begun: Result<OwnedMutexGuard<ConnectionCore>> = async {
            let mut core = connection.lock_core().await;

            core.ready_for_command().await?;

            let result = async {
                core.stream.send_packet(ComQuery("START TRANSACTION")).await?;
                core.stream.recv_ok().await?;

                Ok(())
            }
            .await;

            core.finish_command(result)?;

            Ok(core)
        }
        .await;

        match begun {
            Ok(core) => Ok(Self {
                core: Some(core),
                connection: connection.clone(),
                open: true,
            }),

            Err(e) => {
                connection
                    .inner
                    .in_transaction
                    .store(false, Ordering::Release);

                Err(e)
            }
        }
    }

    /// Executes a query inside the transaction, buffering the
    /// result.
    pub async fn execute(&mut self, query: &str) -> Result<MySqlResultSet> {
        self.execute_with(query, &[]).await
    }

    /// Executes a query with `:name` parameters inside the
    /// transaction.
    pub async fn execute_with(
        &mut self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<MySqlResultSet> {
        if query.is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }

        let sql = substitute_params(query, params)?;
        let core = self.core_mut()?;

        core.ready_for_command().await?;

        let result = async {
            core.stream.send_packet(ComQuery(&sql)).await?;
            core.read_result_sets(RowFormat::Text).await
        }
        .await;

        core.finish_command(result).map_err(|e| e.with_query(&sql))
    }

    /// Commits the transaction and releases the connection.
    pub async fn commit(mut self) -> Result<()> {
        self.end("COMMIT").await
    }

    /// Rolls the transaction back and releases the connection.
    pub async fn rollback(mut self) -> Result<()> {
        self.end("ROLLBACK").await
    }

    async fn end(&mut self, sql: &'static str) -> Result<()> {
        let core = self.core_mut()?;

        core.ready_for_command().await?;

        let result = async {
            core.stream.send_packet(ComQuery(sql)).await?;
            core.stream.recv_ok().await?;

            Ok(())
        }
        .await;

        let result = core.finish_command(result);

        // the transaction is over either way; a failed COMMIT does
        // not leave a transaction to resume
        self.open = false;
        self.release();

        result
    }

    fn core_mut(&mut self) -> Result<&mut OwnedMutexGuard<ConnectionCore>> {
        if !self.open {
            return Err(Error::UnexpectedState(
                "the transaction has already ended".into(),
            ));
        }

        Ok(self.core.as_mut().expect("open transaction holds the lock"))
    }

    fn release(&mut self) {
        self.core = None;

        self.connection
            .inner
            .in_transaction
            .store(false, Ordering::Release);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Some(mut core) = self.core.take() {
            if self.open {
                tracing::warn!("transaction dropped without commit; queueing rollback");

                // stage the rollback now; it is flushed and its OK
                // consumed before the next command on this connection
                core.stream.sequence_id = 0;

                if core.stream.write_packet(ComQuery("ROLLBACK")).is_ok() {
                    core.pending.push_back(Pending::Result);
                }
            }
        }

        self.connection
            .inner
            .in_transaction
            .store(false, Ordering::Release);
    }
}
