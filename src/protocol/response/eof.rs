use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::ProtocolDecode;
use crate::protocol::{Capabilities, Status};

// https://dev.mysql.com/doc/internals/en/packet-EOF_Packet.html

/// Marks the end of a column-definition block or a row block.
///
/// Only ever 5 bytes long under protocol 4.1; anything with a `0xfe`
/// lead and 9 or more bytes of payload is something else.
#[derive(Debug)]
pub(crate) struct EofPacket {
    pub(crate) warnings: u16,
    pub(crate) status: Status,
}

impl ProtocolDecode<Capabilities> for EofPacket {
    fn decode_with(mut buf: Bytes, capabilities: Capabilities) -> Result<Self, Error> {
        let tag = buf.get_u8();
        debug_assert_eq!(tag, 0xfe);

        let (warnings, status) = if capabilities.contains(Capabilities::PROTOCOL_41) {
            (
                buf.get_u16_le(),
                Status::from_bits_truncate(buf.get_u16_le()),
            )
        } else {
            (0, Status::empty())
        };

        Ok(Self { warnings, status })
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, EofPacket, ProtocolDecode, Status};

    #[test]
    fn decode_eof_packet() {
        const DATA: &[u8] = b"\xfe\x00\x00\x02\x00";

        let eof = EofPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(eof.warnings, 0);
        assert_eq!(eof.status, Status::AUTOCOMMIT);
    }

    #[test]
    fn decode_eof_packet_more_results() {
        const DATA: &[u8] = b"\xfe\x00\x00\x0a\x00";

        let eof = EofPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert!(eof.status.contains(Status::MORE_RESULTS_EXISTS));
    }
}
