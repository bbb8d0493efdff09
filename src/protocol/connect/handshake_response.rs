use crate::error::Error;
use crate::io::{BufMutExt, ProtocolEncode};
use crate::protocol::auth_plugin::AuthPlugin;
use crate::protocol::connect::SslRequest;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeResponse
// https://mariadb.com/kb/en/connection/#client-handshake-response

#[derive(Debug)]
pub(crate) struct HandshakeResponse<'a> {
    /// Max size of a command packet the client intends to send.
    pub(crate) max_packet_size: u32,

    /// Connection charset (the low byte of a collation id).
    pub(crate) charset: u8,

    /// Name of the account to authenticate as.
    pub(crate) username: &'a str,

    /// Database to select on connect, under `CONNECT_WITH_DB`.
    pub(crate) database: Option<&'a str>,

    /// The plugin the auth response was computed for.
    pub(crate) auth_plugin: AuthPlugin,

    /// Opaque challenge response.
    pub(crate) auth_response: &'a [u8],
}

impl ProtocolEncode<Capabilities> for HandshakeResponse<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, context: Capabilities) -> Result<(), Error> {
        // the first 32 bytes are identical to the SSL request
        SslRequest {
            max_packet_size: self.max_packet_size,
            charset: self.charset,
        }
        .encode_with(buf, context)?;

        buf.put_str_nul(self.username);

        if context.contains(Capabilities::PLUGIN_AUTH_LENENC_DATA) {
            buf.put_bytes_lenenc(self.auth_response);
        } else {
            let len = u8::try_from(self.auth_response.len()).map_err(|_| {
                Error::InvalidArgument(format!(
                    "auth response of {} bytes is too long",
                    self.auth_response.len()
                ))
            })?;

            buf.push(len);
            buf.extend_from_slice(self.auth_response);
        }

        if context.contains(Capabilities::CONNECT_WITH_DB) {
            buf.put_str_nul(self.database.unwrap_or_default());
        }

        if context.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin.name());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthPlugin, HandshakeResponse};
    use crate::io::ProtocolEncode;
    use crate::protocol::Capabilities;

    #[test]
    fn encode_with_database() {
        let mut buf = Vec::new();

        HandshakeResponse {
            max_packet_size: 1024,
            charset: 33,
            username: "root",
            database: Some("library"),
            auth_plugin: AuthPlugin::MySqlNativePassword,
            auth_response: &[0xaa; 20],
        }
        .encode_with(
            &mut buf,
            Capabilities::BASE | Capabilities::CONNECT_WITH_DB,
        )
        .unwrap();

        // fixed header
        assert_eq!(buf.len(), 32 + 5 + 21 + 8 + 22);

        // username directly after the 32-byte prefix
        assert_eq!(&buf[32..37], b"root\x00");

        // length-encoded auth response
        assert_eq!(buf[37], 20);
        assert_eq!(&buf[38..58], &[0xaa; 20]);

        // database and plugin name
        assert_eq!(&buf[58..66], b"library\x00");
        assert_eq!(&buf[66..], b"mysql_native_password\x00");
    }
}
