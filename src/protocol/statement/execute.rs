use crate::column::ColumnType;
use crate::error::Error;
use crate::io::{BufMutExt, ProtocolEncode};
use crate::protocol::Capabilities;
use crate::value::Value;

// https://dev.mysql.com/doc/internals/en/com-stmt-execute.html
// https://mariadb.com/kb/en/com_stmt_execute/

const NO_CURSOR: u8 = 0;

/// Asks the server to execute a prepared statement.
///
/// Every non-NULL parameter is declared as `VAR_STRING` and sent as
/// the length-encoded UTF-8 text of its value; the server coerces
/// from text on its side.
#[derive(Debug)]
pub(crate) struct StmtExecute<'a> {
    pub(crate) statement_id: u32,
    pub(crate) params: &'a [Value],
}

impl ProtocolEncode<Capabilities> for StmtExecute<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<(), Error> {
        buf.push(0x17); // COM_STMT_EXECUTE
        buf.extend_from_slice(&self.statement_id.to_le_bytes());
        buf.push(NO_CURSOR);

        // number of times to execute the statement; can only be 1
        buf.extend_from_slice(&1_u32.to_le_bytes());

        if self.params.is_empty() {
            return Ok(());
        }

        // NULL bitmap: one bit per parameter
        let mut bitmap = vec![0_u8; (self.params.len() + 7) / 8];

        for (i, param) in self.params.iter().enumerate() {
            if param.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }

        buf.extend_from_slice(&bitmap);

        // new-params-bound flag
        buf.push(1);

        // declared type of each parameter: type byte then a flag byte
        // (0x80 there would mean unsigned)
        for param in self.params {
            let ty = if param.is_null() {
                ColumnType::Null
            } else {
                ColumnType::VarString
            };

            buf.push(ty as u8);
            buf.push(0);
        }

        for param in self.params {
            if let Some(text) = param.as_param_bytes() {
                buf.put_bytes_lenenc(&text);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::StmtExecute;
    use crate::io::ProtocolEncode;
    use crate::protocol::Capabilities;
    use crate::value::Value;

    #[test]
    fn encode_without_params() {
        let mut buf = Vec::new();

        StmtExecute {
            statement_id: 7,
            params: &[],
        }
        .encode_with(&mut buf, Capabilities::BASE)
        .unwrap();

        assert_eq!(&buf[..], b"\x17\x07\x00\x00\x00\x00\x01\x00\x00\x00");
    }

    #[test]
    fn encode_with_null_and_text_params() {
        let mut buf = Vec::new();

        StmtExecute {
            statement_id: 1,
            params: &[Value::Null, Value::Int(42)],
        }
        .encode_with(&mut buf, Capabilities::BASE)
        .unwrap();

        assert_eq!(
            &buf[..],
            &[
                0x17, // COM_STMT_EXECUTE
                1, 0, 0, 0, // statement id
                0, // no cursor
                1, 0, 0, 0, // iterations
                0b0000_0001, // NULL bitmap: first parameter is NULL
                1, // new params bound
                0x06, 0, // param 1: NULL
                0xfd, 0, // param 2: VAR_STRING
                2, b'4', b'2', // "42"
            ][..]
        );
    }
}
