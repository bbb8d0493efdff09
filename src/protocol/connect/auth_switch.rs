use bytes::{Buf, Bytes};

use crate::error::{err_packet, err_payload, Error};
use crate::io::{BufExt, ProtocolDecode};
use crate::protocol::auth_plugin::AuthPlugin;

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_auth_switch_request.html

/// A mid-auth request to redo authentication under a different plugin
/// with a fresh challenge.
///
/// Distinguished from an EOF packet by its payload length: 9 bytes or
/// more behind the `0xfe` lead.
#[derive(Debug)]
pub(crate) struct AuthSwitchRequest {
    pub(crate) plugin: AuthPlugin,
    pub(crate) data: Bytes,
}

impl ProtocolDecode for AuthSwitchRequest {
    fn decode_with(mut buf: Bytes, _: ()) -> Result<Self, Error> {
        let header = buf.get_u8();
        if header != 0xfe {
            return Err(err_packet!(
                "expected 0xfe (AUTH_SWITCH) but found 0x{header:02x}"
            ));
        }

        let plugin = buf.get_str_nul()?.parse()?;

        // the challenge is NUL-terminated on the wire
        let mut data = buf;
        if data.last() == Some(&0) {
            data.truncate(data.len() - 1);
        }

        if data.len() != 20 {
            return Err(err_payload!(
                "expected a 20-byte challenge in AUTH_SWITCH but found {} bytes",
                data.len()
            ));
        }

        Ok(Self { plugin, data })
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthPlugin, AuthSwitchRequest};
    use crate::io::ProtocolDecode;

    #[test]
    fn decode_auth_switch() {
        const DATA: &[u8] = b"\xfemysql_native_password\x00abcdefghijabcdefghij\x00";

        let req = AuthSwitchRequest::decode_with(DATA.into(), ()).unwrap();

        assert_eq!(req.plugin, AuthPlugin::MySqlNativePassword);
        assert_eq!(&req.data[..], b"abcdefghijabcdefghij");
    }

    #[test]
    fn decode_auth_switch_unknown_plugin() {
        const DATA: &[u8] = b"\xfesha256_password\x00abcdefghijabcdefghij\x00";

        assert!(AuthSwitchRequest::decode_with(DATA.into(), ()).is_err());
    }
}
