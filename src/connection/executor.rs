use std::sync::Arc;

use bytes::Bytes;
use hashbrown::HashMap;

use crate::column::MySqlColumn;
use crate::connection::{ConnectionCore, ConnectionState, Pending};
use crate::error::{Error, Result};
use crate::io::BufExt;
use crate::protocol::column::ColumnDefinition;
use crate::protocol::statement::{BinaryRow, StmtExecute, StmtPrepare, StmtPrepareOk};
use crate::protocol::text::TextRow;
use crate::protocol::{Packet, Status};
use crate::result::{MySqlResultSet, ResultSetStart, RowFormat};
use crate::row::MySqlRow;
use crate::value::Value;

/// The sizes and ids announced by a successful `COM_STMT_PREPARE`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PreparedStatement {
    pub(crate) statement_id: u32,
    pub(crate) num_params: u16,
    pub(crate) num_columns: u16,
    pub(crate) warnings: u16,
}

impl ConnectionCore {
    /// Flush staged writes and consume whatever is left of an
    /// unfinished response, so the stream sits at a command boundary.
    pub(crate) async fn wait_until_ready(&mut self) -> Result<()> {
        if let Err(e) = self.stream.flush().await {
            self.mark_closed();
            return Err(e);
        }

        while let Some(&pending) = self.pending.front() {
            match self.drain_step(pending).await {
                Ok(()) => {}

                // an ERR packet terminates the response it belongs
                // to; the command that provoked it is long gone
                Err(Error::Server(server)) => {
                    tracing::warn!(
                        code = server.code(),
                        message = server.message(),
                        "discarding server error while draining"
                    );

                    self.pending.pop_front();
                }

                Err(e) => {
                    self.mark_closed();
                    return Err(e);
                }
            }
        }

        if self.state == ConnectionState::WaitingCommandResponse {
            self.state = ConnectionState::Established;
        }

        Ok(())
    }

    async fn drain_step(&mut self, pending: Pending) -> Result<()> {
        match pending {
            Pending::Result => {
                let packet = self.stream.recv_packet().await?;

                if packet.is_ok() {
                    let ok = packet.ok(self.stream.capabilities)?;

                    if !ok.status.contains(Status::MORE_RESULTS_EXISTS) {
                        self.pending.pop_front();
                    }
                } else {
                    // column count, definitions, and the EOF that
                    // closes them; rows follow
                    let mut bytes = packet.into_bytes();
                    let count = bytes.get_uint_lenenc()?;

                    for _ in 0..count {
                        let _ = self.stream.recv_packet().await?;
                    }

                    self.stream.recv_eof().await?;

                    *self.pending.front_mut().expect("pending is non-empty") = Pending::Rows;
                }
            }

            Pending::Rows => {
                let packet = self.stream.recv_packet().await?;

                if packet.is_eof() {
                    let eof = packet.eof(self.stream.capabilities)?;

                    if eof.status.contains(Status::MORE_RESULTS_EXISTS) {
                        *self.pending.front_mut().expect("pending is non-empty") =
                            Pending::Result;
                    } else {
                        self.pending.pop_front();
                    }
                }
            }
        }

        Ok(())
    }

    /// Consume the column-definition block that opens a result set:
    /// the column count is in `first`, then one packet per column,
    /// then an EOF.
    pub(crate) async fn read_columns(
        &mut self,
        first: Packet<Bytes>,
    ) -> Result<(Arc<Vec<MySqlColumn>>, Arc<HashMap<String, usize>>)> {
        let mut bytes = first.into_bytes();
        let count = usize::try_from(bytes.get_uint_lenenc()?)
            .map_err(|_| Error::UnexpectedPayload("column count overflows usize".into()))?;

        let mut columns = Vec::with_capacity(count);

        for ordinal in 0..count {
            let def: ColumnDefinition = self.stream.recv_packet().await?.decode_with(())?;
            columns.push(MySqlColumn::from_def(ordinal, &def));
        }

        self.stream.recv_eof().await?;

        // first occurrence wins for duplicate names
        let mut names = HashMap::with_capacity(count);
        for column in &columns {
            names
                .entry(column.name.to_lowercase())
                .or_insert(column.ordinal);
        }

        Ok((Arc::new(columns), Arc::new(names)))
    }

    /// Read the full response of `COM_QUERY` or `COM_STMT_EXECUTE`
    /// into a linked chain of buffered result sets.
    pub(crate) async fn read_result_sets(&mut self, format: RowFormat) -> Result<MySqlResultSet> {
        let mut sets = Vec::with_capacity(1);

        loop {
            let packet = self.stream.recv_packet().await?;

            let more = if packet.is_ok() {
                // a result set without rows: DML, DDL, SET
                let ok = packet.ok(self.stream.capabilities)?;

                sets.push(MySqlResultSet {
                    columns: Arc::new(Vec::new()),
                    column_names: Arc::new(HashMap::new()),
                    rows: Vec::new(),
                    affected_rows: ok.affected_rows,
                    last_insert_id: ok.last_insert_id,
                    warnings: ok.warnings,
                    next: None,
                });

                ok.status.contains(Status::MORE_RESULTS_EXISTS)
            } else if packet.first() == Some(&0xfb) {
                return Err(Error::Unsupported(
                    "LOAD DATA LOCAL INFILE is not supported".into(),
                ));
            } else {
                let (columns, names) = self.read_columns(packet).await?;

                let mut rows = Vec::new();

                loop {
                    let packet = self.stream.recv_packet().await?;

                    if packet.is_eof() {
                        let eof = packet.eof(self.stream.capabilities)?;

                        sets.push(MySqlResultSet {
                            columns,
                            column_names: names,
                            rows,
                            affected_rows: 0,
                            last_insert_id: 0,
                            warnings: eof.warnings,
                            next: None,
                        });

                        break eof.status.contains(Status::MORE_RESULTS_EXISTS);
                    }

                    rows.push(decode_row(packet, format, &columns, &names)?);
                }
            };

            if !more {
                break;
            }
        }

        // stitch the chain back to front
        let mut iter = sets.into_iter().rev();
        let mut head = iter.next().expect("at least one result set");

        for mut set in iter {
            set.next = Some(Box::new(head));
            head = set;
        }

        Ok(head)
    }

    /// Read a response up to the first row, for streaming. Row-less
    /// result sets are consumed along the way.
    pub(crate) async fn begin_result_set(&mut self) -> Result<ResultSetStart> {
        loop {
            let packet = self.stream.recv_packet().await?;

            if packet.is_ok() {
                let ok = packet.ok(self.stream.capabilities)?;

                if ok.status.contains(Status::MORE_RESULTS_EXISTS) {
                    continue;
                }

                return Ok(ResultSetStart::Finished);
            }

            if packet.first() == Some(&0xfb) {
                return Err(Error::Unsupported(
                    "LOAD DATA LOCAL INFILE is not supported".into(),
                ));
            }

            let (columns, names) = self.read_columns(packet).await?;

            return Ok(ResultSetStart::Rows { columns, names });
        }
    }

    pub(crate) async fn prepare_statement(&mut self, query: &str) -> Result<PreparedStatement> {
        self.stream.send_packet(StmtPrepare(query)).await?;

        let ok: StmtPrepareOk = self
            .stream
            .recv_packet()
            .await?
            .decode_with(self.stream.capabilities)?;

        // parameter definitions, then column definitions, each block
        // closed by its own EOF when non-empty
        if ok.params > 0 {
            for _ in 0..ok.params {
                let _ = self.stream.recv_packet().await?;
            }

            self.stream.recv_eof().await?;
        }

        if ok.columns > 0 {
            for _ in 0..ok.columns {
                let _ = self.stream.recv_packet().await?;
            }

            self.stream.recv_eof().await?;
        }

        self.statements.insert(ok.statement_id);

        tracing::debug!(
            statement_id = ok.statement_id,
            params = ok.params,
            columns = ok.columns,
            "prepared statement"
        );

        Ok(PreparedStatement {
            statement_id: ok.statement_id,
            num_params: ok.params,
            num_columns: ok.columns,
            warnings: ok.warnings,
        })
    }

    pub(crate) async fn execute_statement(
        &mut self,
        statement_id: u32,
        params: &[Value],
    ) -> Result<MySqlResultSet> {
        self.stream
            .send_packet(StmtExecute {
                statement_id,
                params,
            })
            .await?;

        self.read_result_sets(RowFormat::Binary).await
    }
}

pub(crate) fn decode_row(
    packet: Packet<Bytes>,
    format: RowFormat,
    columns: &Arc<Vec<MySqlColumn>>,
    names: &Arc<HashMap<String, usize>>,
) -> Result<MySqlRow> {
    let values = match format {
        RowFormat::Text => {
            packet
                .decode_with::<TextRow, _>(columns.len())?
                .0
        }
        RowFormat::Binary => {
            packet
                .decode_with::<BinaryRow, _>(&columns[..])?
                .0
        }
    };

    Ok(MySqlRow {
        columns: Arc::clone(columns),
        column_names: Arc::clone(names),
        values,
    })
}
