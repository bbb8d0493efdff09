use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::OwnedMutexGuard;

use crate::column::MySqlColumn;
use crate::connection::{ConnectionCore, ConnectionState, Pending};
use crate::error::{Error, Result};
use crate::protocol::Status;
use crate::row::MySqlRow;

/// How row packets of the active result set are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowFormat {
    /// `COM_QUERY` responses: length-encoded strings.
    Text,

    /// `COM_STMT_EXECUTE` responses: type-specific encodings.
    Binary,
}

/// What `begin_result_set` found at the head of a response.
pub(crate) enum ResultSetStart {
    Rows {
        columns: Arc<Vec<MySqlColumn>>,
        names: Arc<HashMap<String, usize>>,
    },

    /// Only row-less result sets; the response is fully consumed.
    Finished,
}

/// A fully buffered result set.
///
/// Multi-statement queries produce a chain of result sets linked
/// through [`next`][Self::next].
#[derive(Debug)]
pub struct MySqlResultSet {
    pub(crate) columns: Arc<Vec<MySqlColumn>>,
    pub(crate) column_names: Arc<HashMap<String, usize>>,
    pub(crate) rows: Vec<MySqlRow>,
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
    pub(crate) warnings: u16,
    pub(crate) next: Option<Box<MySqlResultSet>>,
}

impl MySqlResultSet {
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Rows affected by a DML statement; zero for a `SELECT`.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// The `AUTO_INCREMENT` id assigned by an `INSERT`, when any.
    #[must_use]
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    #[must_use]
    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    #[must_use]
    pub fn columns(&self) -> &[MySqlColumn] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[MySqlRow] {
        &self.rows
    }

    /// The next result set of a multi-statement query.
    #[must_use]
    pub fn next(&self) -> Option<&MySqlResultSet> {
        self.next.as_deref()
    }
}

impl<'a> IntoIterator for &'a MySqlResultSet {
    type Item = &'a MySqlRow;
    type IntoIter = std::slice::Iter<'a, MySqlRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A single-pass, row-at-a-time view of a query response.
///
/// The stream holds the connection's operation lock until it is
/// exhausted or dropped, so the consumer's pace is the only
/// back-pressure the connection needs. Row counts are unknowable
/// here by construction; buffer with
/// [`execute`][crate::MySqlConnection::execute] when totals matter.
pub struct RowStream {
    guard: Option<OwnedMutexGuard<ConnectionCore>>,
    format: RowFormat,
    columns: Arc<Vec<MySqlColumn>>,
    names: Arc<HashMap<String, usize>>,
    query: String,
    finished: bool,
}

impl RowStream {
    pub(crate) fn new(
        mut guard: OwnedMutexGuard<ConnectionCore>,
        format: RowFormat,
        start: ResultSetStart,
        query: String,
    ) -> Self {
        match start {
            ResultSetStart::Rows { columns, names } => Self {
                guard: Some(guard),
                format,
                columns,
                names,
                query,
                finished: false,
            },

            ResultSetStart::Finished => {
                guard.state = ConnectionState::Established;

                Self {
                    guard: None,
                    format,
                    columns: Arc::new(Vec::new()),
                    names: Arc::new(HashMap::new()),
                    query,
                    finished: true,
                }
            }
        }
    }

    /// Columns of the result set currently being streamed. Updated
    /// in place when a multi-statement query moves to its next
    /// result set.
    #[must_use]
    pub fn columns(&self) -> &[MySqlColumn] {
        &self.columns
    }

    /// The next row, or `None` once every result set is exhausted.
    pub async fn next(&mut self) -> Result<Option<MySqlRow>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let core = self.guard.as_mut().expect("unfinished stream holds the lock");

            let packet = match core.stream.recv_packet().await {
                Ok(packet) => packet,
                Err(e) => return Err(self.fail(e)),
            };

            if !packet.is_eof() {
                let row = crate::connection::executor::decode_row(
                    packet,
                    self.format,
                    &self.columns,
                    &self.names,
                );

                return match row {
                    Ok(row) => Ok(Some(row)),
                    Err(e) => Err(self.fail(e)),
                };
            }

            let eof = match packet.eof(core.stream.capabilities) {
                Ok(eof) => eof,
                Err(e) => return Err(self.fail(e)),
            };

            if !eof.status.contains(Status::MORE_RESULTS_EXISTS) {
                self.finish();
                return Ok(None);
            }

            // move to the next result set of a multi-statement query
            match self.advance_result_set().await {
                Ok(true) => continue,
                Ok(false) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Read the header of the next result set. Returns `false` when
    /// the response ended on a row-less result set.
    async fn advance_result_set(&mut self) -> Result<bool> {
        let core = self.guard.as_mut().expect("unfinished stream holds the lock");

        let start = match core.begin_result_set().await {
            Ok(start) => start,
            Err(e) => return Err(self.fail(e)),
        };

        match start {
            ResultSetStart::Rows { columns, names } => {
                self.columns = columns;
                self.names = names;

                Ok(true)
            }

            ResultSetStart::Finished => {
                self.finish();
                Ok(false)
            }
        }
    }

    fn finish(&mut self) {
        if let Some(mut core) = self.guard.take() {
            core.state = ConnectionState::Established;
        }

        self.finished = true;
    }

    fn fail(&mut self, e: Error) -> Error {
        if let Some(mut core) = self.guard.take() {
            if e.is_fatal() {
                core.mark_closed();
            } else {
                // a server error closed this response; the
                // connection itself is still usable
                core.state = ConnectionState::Established;
            }
        }

        self.finished = true;

        e.with_query(&self.query)
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        // leave the unread tail for the next command to drain
        if let Some(core) = self.guard.as_mut() {
            if !self.finished {
                core.pending.push_back(Pending::Rows);
            }
        }
    }
}
