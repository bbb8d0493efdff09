use bytes::{Buf, Bytes};

use crate::error::{err_payload, Error};
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::auth_plugin::AuthPlugin;
use crate::protocol::{Capabilities, Status};

// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::Handshake
// https://mariadb.com/kb/en/connection/#initial-handshake-packet

/// The first packet of a connection, sent by the server.
#[derive(Debug)]
pub(crate) struct Handshake {
    pub(crate) protocol_version: u8,
    pub(crate) server_version: String,
    pub(crate) connection_id: u32,
    pub(crate) capabilities: Capabilities,
    pub(crate) charset: u8,
    #[allow(unused)]
    pub(crate) status: Status,

    /// The 20-byte challenge for the default auth plugin, assembled
    /// from both scramble parts.
    pub(crate) auth_plugin_data: Vec<u8>,
    pub(crate) auth_plugin: Option<AuthPlugin>,
}

impl ProtocolDecode for Handshake {
    fn decode_with(mut buf: Bytes, _: ()) -> Result<Self, Error> {
        let protocol_version = buf.get_u8();

        if protocol_version != 10 {
            return Err(Error::Unsupported(format!(
                "handshake protocol version {protocol_version}; only version 10 is implemented"
            )));
        }

        let server_version = buf.get_str_nul()?;
        let connection_id = buf.get_u32_le();

        // scramble, 1st part: string<8>
        let scramble_1 = buf.get_bytes(8)?;

        // filler: string<1>
        buf.advance(1);

        // capabilities, low 2 bytes: int<2>
        let capabilities_lo = buf.get_u16_le();

        let charset = buf.get_u8();
        let status = Status::from_bits_truncate(buf.get_u16_le());

        // capabilities, high 2 bytes: int<2>
        let capabilities_hi = buf.get_u16_le();

        let capabilities = Capabilities::from_bits_truncate(
            u32::from(capabilities_lo) | (u32::from(capabilities_hi) << 16),
        );

        let auth_plugin_data_len = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            buf.get_u8()
        } else {
            buf.advance(1);
            0
        };

        // reserved: string<10>
        buf.advance(10);

        let mut auth_plugin_data = scramble_1.to_vec();

        if capabilities.contains(Capabilities::SECURE_CONNECTION) {
            // scramble, 2nd part: max(13, auth_plugin_data_len - 8) bytes,
            // of which only the first 12 belong to the challenge
            let len = (i16::from(auth_plugin_data_len) - 8).max(13) as usize;
            let scramble_2 = buf.get_bytes(len)?;

            auth_plugin_data.extend_from_slice(&scramble_2[..12]);
        }

        let auth_plugin = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            // a handful of server builds omit the NUL terminator on
            // the final field
            let name = if memchr::memchr(0, &buf).is_some() {
                buf.get_str_nul()?
            } else {
                buf.get_str_eof()?
            };

            Some(name.parse()?)
        } else {
            None
        };

        if capabilities.contains(Capabilities::SECURE_CONNECTION) && auth_plugin_data.len() != 20 {
            return Err(err_payload!(
                "expected a 20-byte auth challenge but assembled {} bytes",
                auth_plugin_data.len()
            ));
        }

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            capabilities,
            charset,
            status,
            auth_plugin_data,
            auth_plugin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthPlugin, Capabilities, Handshake};
    use crate::io::ProtocolDecode;

    #[test]
    fn decode_handshake_mysql_8() {
        #[rustfmt::skip]
        const DATA: &[u8] = &[
            // protocol version
            10,
            // server version
            b'8', b'.', b'0', b'.', b'3', b'6', 0,
            // connection id
            13, 0, 0, 0,
            // scramble, 1st part
            b'?', b'~', b'~', b'|', b'v', b'Z', b'A', b'u',
            // filler
            0,
            // capabilities, low
            0xfe, 0xf7,
            // charset
            8,
            // status
            2, 0,
            // capabilities, high
            0xff, 0xc1,
            // auth plugin data length
            21,
            // reserved
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            // scramble, 2nd part
            b'J', b'Q', b'8', b'c', b'i', b'h', b'P', b'4', b'Q', b'}', b'D', b'x', 0,
            // auth plugin name
            b'c', b'a', b'c', b'h', b'i', b'n', b'g', b'_', b's', b'h', b'a', b'2',
            b'_', b'p', b'a', b's', b's', b'w', b'o', b'r', b'd', 0,
        ];

        let handshake = Handshake::decode_with(DATA.into(), ()).unwrap();

        assert_eq!(handshake.protocol_version, 10);
        assert_eq!(handshake.server_version, "8.0.36");
        assert_eq!(handshake.connection_id, 13);
        assert_eq!(handshake.charset, 8);
        assert_eq!(handshake.auth_plugin, Some(AuthPlugin::CachingSha2Password));
        assert_eq!(handshake.auth_plugin_data, b"?~~|vZAuJQ8cihP4Q}Dx");
        assert!(handshake.capabilities.contains(Capabilities::PROTOCOL_41));
        assert!(handshake.capabilities.contains(Capabilities::SSL));
        assert!(handshake.capabilities.contains(Capabilities::PLUGIN_AUTH));
    }

    #[test]
    fn decode_handshake_rejects_old_protocol() {
        const DATA: &[u8] = &[9, b'4', b'.', b'0', 0];

        assert!(Handshake::decode_with(DATA.into(), ()).is_err());
    }
}
