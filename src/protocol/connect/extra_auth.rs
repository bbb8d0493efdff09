use bytes::{Buf, Bytes};

use crate::error::{err_packet, Error};
use crate::io::ProtocolDecode;

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_packets_protocol_auth_more_data.html

/// Additional mid-auth data from the server, used by
/// `caching_sha2_password` to signal cache hit versus full auth.
#[derive(Debug)]
pub(crate) struct ExtraAuthData {
    pub(crate) data: Bytes,
}

impl ProtocolDecode for ExtraAuthData {
    fn decode_with(mut buf: Bytes, _: ()) -> Result<Self, Error> {
        let header = buf.get_u8();
        if header != 0x01 {
            return Err(err_packet!(
                "expected 0x01 (AUTH_MORE_DATA) but found 0x{header:02x}"
            ));
        }

        Ok(Self { data: buf })
    }
}
