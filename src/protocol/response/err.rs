use bytes::{Buf, Bytes};

use crate::error::{Error, ServerError};
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/packet-ERR_Packet.html
// https://mariadb.com/kb/en/err_packet/

#[derive(Debug)]
pub(crate) struct ErrPacket {
    pub(crate) error_code: u16,
    pub(crate) sql_state: Option<String>,
    pub(crate) error_message: String,
}

impl ProtocolDecode<Capabilities> for ErrPacket {
    fn decode_with(mut buf: Bytes, capabilities: Capabilities) -> Result<Self, Error> {
        let tag = buf.get_u8();
        debug_assert_eq!(tag, 0xff);

        let error_code = buf.get_u16_le();

        // a '#' marker introduces the 5-byte SQL STATE; it is absent
        // in errors raised before the handshake completes
        let sql_state = if capabilities.contains(Capabilities::PROTOCOL_41)
            && buf.first() == Some(&b'#')
        {
            buf.advance(1);

            let state = buf.get_bytes(5)?;
            Some(String::from_utf8_lossy(&state).into_owned())
        } else {
            None
        };

        let error_message = buf.get_str_eof()?;

        Ok(Self {
            error_code,
            sql_state,
            error_message,
        })
    }
}

impl ErrPacket {
    pub(crate) fn into_server_error(self) -> ServerError {
        ServerError {
            code: self.error_code,
            sql_state: self.sql_state,
            message: self.error_message,
            query: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, ErrPacket, ProtocolDecode};

    #[test]
    fn decode_err_connect_auth() {
        const DATA: &[u8] = b"\xff\xe3\x04Client does not support authentication protocol requested by server; consider upgrading MySQL client";

        let err = ErrPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(err.sql_state, None);
        assert_eq!(err.error_code, 1251);
        assert_eq!(&err.error_message, "Client does not support authentication protocol requested by server; consider upgrading MySQL client");
    }

    #[test]
    fn decode_err_out_of_order() {
        const DATA: &[u8] = b"\xff\x84\x04Got packets out of order";

        let err = ErrPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(err.sql_state, None);
        assert_eq!(err.error_code, 1156);
        assert_eq!(&err.error_message, "Got packets out of order");
    }

    #[test]
    fn decode_err_unknown_database() {
        const DATA: &[u8] = b"\xff\x19\x04#42000Unknown database \'unknown\'";

        let err = ErrPacket::decode_with(DATA.into(), Capabilities::PROTOCOL_41).unwrap();

        assert_eq!(err.sql_state.as_deref(), Some("42000"));
        assert_eq!(err.error_code, 1049);
        assert_eq!(&err.error_message, "Unknown database \'unknown\'");
    }
}
