use bytes::{Buf, Bytes};

use crate::column::MySqlColumn;
use crate::error::{err_packet, err_payload, Error};
use crate::io::ProtocolDecode;
use crate::value::decode_binary_value;

/// One row of a binary-protocol result set.
///
/// A `0x00` header, a NULL bitmap with a 2-bit offset, then each
/// non-NULL value in its type-specific encoding. Values are decoded
/// into the same canonical text carried by text-protocol rows.
///
/// <https://dev.mysql.com/doc/internals/en/binary-protocol-resultset-row.html>
#[derive(Debug)]
pub(crate) struct BinaryRow(pub(crate) Vec<Option<Bytes>>);

impl ProtocolDecode<&[MySqlColumn]> for BinaryRow {
    fn decode_with(mut buf: Bytes, columns: &[MySqlColumn]) -> Result<Self, Error> {
        let header = buf.get_u8();
        if header != 0 {
            return Err(err_packet!(
                "expected 0x00 (binary row) but found 0x{header:02x}"
            ));
        }

        // NULL bitmap: byte<(column_count + 9) / 8>, columns start at
        // bit offset 2
        let bitmap_len = (columns.len() + 9) / 8;

        if buf.len() < bitmap_len {
            return Err(err_payload!(
                "binary row is shorter than its NULL bitmap ({} < {bitmap_len})",
                buf.len()
            ));
        }

        let bitmap = buf.split_to(bitmap_len);

        let mut values = Vec::with_capacity(columns.len());

        for (i, column) in columns.iter().enumerate() {
            let bit = i + 2;

            if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
                values.push(None);
            } else {
                values.push(Some(decode_binary_value(
                    &mut buf,
                    column.ty,
                    column.is_unsigned(),
                )?));
            }
        }

        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use super::BinaryRow;
    use crate::column::{ColumnFlags, ColumnType, MySqlColumn};
    use crate::io::ProtocolDecode;

    fn column(ordinal: usize, ty: ColumnType, flags: ColumnFlags) -> MySqlColumn {
        MySqlColumn {
            ordinal,
            name: format!("c{ordinal}"),
            ty,
            flags,
            charset: 63,
            max_size: 11,
            decimals: 0,
        }
    }

    #[test]
    fn decode_mixed_row() {
        let columns = [
            column(0, ColumnType::LongLong, ColumnFlags::empty()),
            column(1, ColumnType::VarString, ColumnFlags::empty()),
            column(2, ColumnType::Long, ColumnFlags::empty()),
        ];

        // second column (bit 3 of the bitmap byte) is NULL
        const DATA: &[u8] = b"\x00\x08\x2a\x00\x00\x00\x00\x00\x00\x00\x07\x00\x00\x00";

        let row = BinaryRow::decode_with(DATA.into(), &columns[..]).unwrap();

        assert_eq!(row.0[0].as_deref(), Some(&b"42"[..]));
        assert_eq!(row.0[1], None);
        assert_eq!(row.0[2].as_deref(), Some(&b"7"[..]));
    }

    #[test]
    fn decode_rejects_wrong_header() {
        let columns = [column(0, ColumnType::Long, ColumnFlags::empty())];

        const DATA: &[u8] = b"\x01\x00\x00\x00\x00\x00";

        assert!(BinaryRow::decode_with(DATA.into(), &columns[..]).is_err());
    }
}
