use bytes::{Buf, Bytes};

use crate::error::{err_packet, err_payload, Error};
use crate::io::ProtocolDecode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/com-stmt-prepare-response.html#packet-COM_STMT_PREPARE_OK

#[derive(Debug)]
pub(crate) struct StmtPrepareOk {
    pub(crate) statement_id: u32,
    pub(crate) columns: u16,
    pub(crate) params: u16,
    pub(crate) warnings: u16,
}

impl ProtocolDecode<Capabilities> for StmtPrepareOk {
    fn decode_with(mut buf: Bytes, _: Capabilities) -> Result<Self, Error> {
        const SIZE: usize = 12;

        if buf.len() < SIZE {
            return Err(err_payload!(
                "COM_STMT_PREPARE_OK expected {SIZE} bytes but got {}",
                buf.len()
            ));
        }

        let status = buf.get_u8();
        if status != 0x00 {
            return Err(err_packet!(
                "expected 0x00 (COM_STMT_PREPARE_OK) but found 0x{status:02x}"
            ));
        }

        let statement_id = buf.get_u32_le();
        let columns = buf.get_u16_le();
        let params = buf.get_u16_le();

        buf.advance(1); // reserved: string<1>

        let warnings = buf.get_u16_le();

        Ok(Self {
            statement_id,
            columns,
            params,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StmtPrepareOk;
    use crate::io::ProtocolDecode;
    use crate::protocol::Capabilities;

    #[test]
    fn decode_prepare_ok() {
        const DATA: &[u8] = b"\x00\x01\x00\x00\x00\x01\x00\x02\x00\x00\x00\x00";

        let ok = StmtPrepareOk::decode_with(DATA.into(), Capabilities::BASE).unwrap();

        assert_eq!(ok.statement_id, 1);
        assert_eq!(ok.columns, 1);
        assert_eq!(ok.params, 2);
        assert_eq!(ok.warnings, 0);
    }

    #[test]
    fn decode_prepare_ok_short() {
        const DATA: &[u8] = b"\x00\x01\x00";

        assert!(StmtPrepareOk::decode_with(DATA.into(), Capabilities::BASE).is_err());
    }
}
