use std::ops::Deref;

use bytes::Bytes;

use crate::error::{err_packet, Error};
use crate::io::{ProtocolDecode, ProtocolEncode};
use crate::protocol::response::{EofPacket, ErrPacket, OkPacket};
use crate::protocol::Capabilities;

/// The value advertised as `max_packet_size` during the handshake.
pub(crate) const MAX_ADVERTISED_PACKET_SIZE: u32 = 50 * 1024 * 1024;

/// The largest payload a single frame can carry. Larger payloads
/// require continuation frames, which this client never emits.
pub(crate) const MAX_FRAME_SIZE: usize = 0xFF_FF_FF;

/// A single MySQL packet: a 3-byte little-endian payload length, a
/// sequence id, and the payload itself.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_basic_packets.html>
/// <https://mariadb.com/kb/en/library/0-packet/#standard-packet>
#[derive(Debug)]
pub(crate) struct Packet<T>(pub(crate) T);

impl<T> Packet<T>
where
    T: ProtocolEncode<Capabilities>,
{
    /// Frame the payload into `buf`, stamping the next sequence id.
    pub(crate) fn encode(
        &self,
        buf: &mut Vec<u8>,
        capabilities: Capabilities,
        sequence_id: &mut u8,
    ) -> Result<(), Error> {
        // reserve room for the header; the length is only known after
        // the payload has been encoded
        let header_offset = buf.len();
        buf.extend_from_slice(&[0_u8; 4]);

        self.0.encode_with(buf, capabilities)?;

        let len = buf.len() - header_offset - 4;

        if len > MAX_FRAME_SIZE {
            buf.truncate(header_offset);

            return Err(Error::InvalidArgument(format!(
                "outbound packet of {len} bytes exceeds the maximum frame size"
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let header = &mut buf[header_offset..header_offset + 4];
        header.copy_from_slice(&(len as u32).to_le_bytes());
        header[3] = *sequence_id;

        *sequence_id = sequence_id.wrapping_add(1);

        Ok(())
    }
}

impl Packet<Bytes> {
    /// `true` for an OK packet: leading `0x00` with at least 7 bytes
    /// of payload. A shorter `0x00` payload is a row.
    pub(crate) fn is_ok(&self) -> bool {
        !self.0.is_empty() && self.0[0] == 0x00 && self.0.len() >= 7
    }

    /// `true` for an EOF packet: leading `0xfe` with fewer than
    /// 9 bytes of payload. A longer `0xfe` payload is a row or an
    /// auth-switch request.
    pub(crate) fn is_eof(&self) -> bool {
        !self.0.is_empty() && self.0[0] == 0xfe && self.0.len() < 9
    }

    pub(crate) fn is_err(&self) -> bool {
        !self.0.is_empty() && self.0[0] == 0xff
    }

    pub(crate) fn decode_with<T, Cx>(self, context: Cx) -> Result<T, Error>
    where
        T: ProtocolDecode<Cx>,
    {
        T::decode_with(self.0, context)
    }

    pub(crate) fn ok(self, capabilities: Capabilities) -> Result<OkPacket, Error> {
        if !self.is_ok() {
            return Err(err_packet!(
                "expected OK but found 0x{:02x} with {} bytes",
                self.0.first().copied().unwrap_or_default(),
                self.0.len()
            ));
        }

        self.decode_with(capabilities)
    }

    pub(crate) fn eof(self, capabilities: Capabilities) -> Result<EofPacket, Error> {
        if !self.is_eof() {
            return Err(err_packet!(
                "expected EOF but found 0x{:02x} with {} bytes",
                self.0.first().copied().unwrap_or_default(),
                self.0.len()
            ));
        }

        self.decode_with(capabilities)
    }

    pub(crate) fn err(self, capabilities: Capabilities) -> Result<ErrPacket, Error> {
        self.decode_with(capabilities)
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Packet<Bytes> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::io::ProtocolEncode;
    use crate::protocol::{Capabilities, Packet};

    struct Raw(&'static [u8]);

    impl ProtocolEncode<Capabilities> for Raw {
        fn encode_with(
            &self,
            buf: &mut Vec<u8>,
            _: Capabilities,
        ) -> Result<(), crate::error::Error> {
            buf.extend_from_slice(self.0);
            Ok(())
        }
    }

    #[test]
    fn encode_writes_header_and_sequence_id() {
        let mut buf = Vec::new();
        let mut sequence_id = 2;

        Packet(Raw(b"\x03SELECT 1"))
            .encode(&mut buf, Capabilities::BASE, &mut sequence_id)
            .unwrap();

        assert_eq!(&buf[..4], b"\x09\x00\x00\x02");
        assert_eq!(&buf[4..], b"\x03SELECT 1");
        assert_eq!(sequence_id, 3);
    }

    #[test]
    fn kind_detection() {
        let ok = Packet(bytes::Bytes::from_static(b"\x00\x00\x00\x02\x00\x00\x00"));
        assert!(ok.is_ok() && !ok.is_eof() && !ok.is_err());

        let eof = Packet(bytes::Bytes::from_static(b"\xfe\x00\x00\x02\x00"));
        assert!(eof.is_eof() && !eof.is_ok());

        let err = Packet(bytes::Bytes::from_static(b"\xff\x48\x04"));
        assert!(err.is_err());

        // a 0xfe lead with 9 or more bytes is not an EOF
        let row = Packet(bytes::Bytes::from_static(b"\xfe123456789"));
        assert!(!row.is_eof());
    }
}
