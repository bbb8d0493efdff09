use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::{BufExt, ProtocolDecode};

/// One row of a text-protocol result set: per column, either the
/// `0xfb` NULL marker or a length-encoded string.
///
/// <https://dev.mysql.com/doc/internals/en/com-query-response.html#packet-ProtocolText::ResultsetRow>
#[derive(Debug)]
pub(crate) struct TextRow(pub(crate) Vec<Option<Bytes>>);

impl ProtocolDecode<usize> for TextRow {
    fn decode_with(mut buf: Bytes, column_count: usize) -> Result<Self, Error> {
        let mut values = Vec::with_capacity(column_count);

        for _ in 0..column_count {
            if buf.first() == Some(&0xfb) {
                buf.advance(1);
                values.push(None);
            } else {
                values.push(Some(buf.get_bytes_lenenc()?));
            }
        }

        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use super::TextRow;
    use crate::io::ProtocolDecode;

    #[test]
    fn decode_row_with_null() {
        // "1", NULL, "abc"
        const DATA: &[u8] = b"\x011\xfb\x03abc";

        let row = TextRow::decode_with(DATA.into(), 3).unwrap();

        assert_eq!(row.0.len(), 3);
        assert_eq!(row.0[0].as_deref(), Some(&b"1"[..]));
        assert_eq!(row.0[1], None);
        assert_eq!(row.0[2].as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn decode_short_row_fails() {
        const DATA: &[u8] = b"\x011";

        assert!(TextRow::decode_with(DATA.into(), 2).is_err());
    }
}
