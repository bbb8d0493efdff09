use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::{Capabilities, Status};

// https://dev.mysql.com/doc/internals/en/packet-OK_Packet.html
// https://mariadb.com/kb/en/ok_packet/

/// Sent by the server to signal successful completion of a command.
#[derive(Debug)]
pub(crate) struct OkPacket {
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
    pub(crate) status: Status,
    pub(crate) warnings: u16,
}

impl ProtocolDecode<Capabilities> for OkPacket {
    fn decode_with(mut buf: Bytes, capabilities: Capabilities) -> Result<Self, Error> {
        let tag = buf.get_u8();
        debug_assert!(tag == 0x00 || tag == 0xfe);

        let affected_rows = buf.get_uint_lenenc()?;
        let last_insert_id = buf.get_uint_lenenc()?;

        let status = if capabilities.contains(Capabilities::PROTOCOL_41) {
            Status::from_bits_truncate(buf.get_u16_le())
        } else {
            Status::empty()
        };

        let warnings = if capabilities.contains(Capabilities::PROTOCOL_41) {
            buf.get_u16_le()
        } else {
            0
        };

        // the rest of the payload is human-readable status information

        Ok(Self {
            affected_rows,
            last_insert_id,
            status,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, OkPacket, ProtocolDecode, Status};

    #[test]
    fn decode_empty_ok_packet() {
        const DATA: &[u8] = b"\x00\x00\x00\x02@\x00\x00";

        let ok = OkPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(ok.affected_rows, 0);
        assert_eq!(ok.last_insert_id, 0);
        assert_eq!(ok.warnings, 0);
        assert_eq!(ok.status, Status::AUTOCOMMIT | Status::SESSION_STATE_CHANGED);
    }

    #[test]
    fn decode_ok_packet_with_insert_id() {
        // 3 affected rows, last insert id 7
        const DATA: &[u8] = b"\x00\x03\x07\x02\x00\x01\x00";

        let ok = OkPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(ok.affected_rows, 3);
        assert_eq!(ok.last_insert_id, 7);
        assert_eq!(ok.warnings, 1);
        assert_eq!(ok.status, Status::AUTOCOMMIT);
    }
}
