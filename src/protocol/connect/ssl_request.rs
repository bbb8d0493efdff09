use crate::error::Error;
use crate::io::ProtocolEncode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::SSLRequest

/// The first half of a handshake response, sent on its own to ask the
/// server to switch the transport to TLS before credentials flow.
#[derive(Debug)]
pub(crate) struct SslRequest {
    pub(crate) max_packet_size: u32,
    pub(crate) charset: u8,
}

impl ProtocolEncode<Capabilities> for SslRequest {
    fn encode_with(&self, buf: &mut Vec<u8>, context: Capabilities) -> Result<(), Error> {
        buf.extend_from_slice(&context.bits().to_le_bytes());
        buf.extend_from_slice(&self.max_packet_size.to_le_bytes());
        buf.push(self.charset);

        // reserved: string<23>
        buf.extend_from_slice(&[0_u8; 23]);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SslRequest;
    use crate::io::ProtocolEncode;
    use crate::protocol::Capabilities;

    #[test]
    fn encode_is_32_bytes() {
        let mut buf = Vec::new();

        SslRequest {
            max_packet_size: 50 * 1024 * 1024,
            charset: 33,
        }
        .encode_with(&mut buf, Capabilities::BASE | Capabilities::SSL)
        .unwrap();

        assert_eq!(buf.len(), 32);
        assert_eq!(
            &buf[..4],
            (Capabilities::BASE | Capabilities::SSL).bits().to_le_bytes()
        );
        assert_eq!(buf[8], 33);
        assert!(buf[9..].iter().all(|&b| b == 0));
    }
}
