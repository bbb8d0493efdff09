use crate::connection::executor::PreparedStatement;
use crate::connection::{ConnectionState, MySqlConnection};
use crate::error::{Error, Result};
use crate::protocol::statement::StmtClose;
use crate::result::{MySqlResultSet, RowFormat, RowStream};
use crate::value::Value;

/// A statement prepared on a specific connection with
/// `COM_STMT_PREPARE`.
///
/// Results come back over the binary protocol; parameters are
/// positional and travel as text (`VAR_STRING`).
#[derive(Debug)]
pub struct MySqlStatement {
    connection: MySqlConnection,
    meta: PreparedStatement,
}

impl MySqlStatement {
    pub(crate) fn new(connection: MySqlConnection, meta: PreparedStatement) -> Self {
        Self { connection, meta }
    }

    /// Number of `?` placeholders in the prepared query.
    #[must_use]
    pub fn num_params(&self) -> usize {
        usize::from(self.meta.num_params)
    }

    /// Number of result columns the statement produces.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        usize::from(self.meta.num_columns)
    }

    /// Warnings raised while preparing.
    #[must_use]
    pub fn warnings(&self) -> u16 {
        self.meta.warnings
    }

    /// Executes the statement, buffering every row.
    ///
    /// `params` must match the statement's parameter count exactly.
    pub async fn execute(&self, params: &[Value]) -> Result<MySqlResultSet> {
        self.check_params(params)?;

        let mut core = self.connection.lock_core().await;

        core.ready_for_command().await?;

        let result = core
            .execute_statement(self.meta.statement_id, params)
            .await;

        core.finish_command(result)
    }

    /// Executes the statement, streaming rows one at a time. The
    /// connection's operation lock is held until the stream ends.
    pub async fn fetch(&self, params: &[Value]) -> Result<RowStream> {
        self.check_params(params)?;

        let mut core = self.connection.lock_core().await;

        core.ready_for_command().await?;

        let started = async {
            core.stream
                .send_packet(crate::protocol::statement::StmtExecute {
                    statement_id: self.meta.statement_id,
                    params,
                })
                .await?;

            core.begin_result_set().await
        }
        .await;

        match started {
            Ok(start) => Ok(RowStream::new(
                core,
                RowFormat::Binary,
                start,
                format!("<statement {}>", self.meta.statement_id),
            )),
            Err(e) => core.finish_command(Err(e)),
        }
    }

    /// Releases the statement on the server with `COM_STMT_CLOSE`.
    ///
    /// The server sends no reply. Executing the statement afterwards
    /// raises a server error.
    pub async fn deallocate(&self) -> Result<()> {
        let mut core = self.connection.lock_core().await;

        if core.state == ConnectionState::Closed {
            // the server-side statement died with the connection
            return Ok(());
        }

        core.wait_until_ready().await?;

        core.stream.sequence_id = 0;
        core.stream.write_packet(StmtClose {
            statement_id: self.meta.statement_id,
        })?;
        core.stream.flush().await?;

        core.statements.remove(&self.meta.statement_id);

        Ok(())
    }

    fn check_params(&self, params: &[Value]) -> Result<()> {
        if params.len() != self.num_params() {
            return Err(Error::InvalidArgument(format!(
                "statement takes {} parameters but {} were bound",
                self.num_params(),
                params.len()
            )));
        }

        Ok(())
    }
}
