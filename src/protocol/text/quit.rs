use crate::error::Error;
use crate::io::ProtocolEncode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/com-quit.html

/// Tells the server that the client wants to close the connection.
/// The server either replies with OK or simply closes the socket.
#[derive(Debug)]
pub(crate) struct Quit;

impl ProtocolEncode<Capabilities> for Quit {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<(), Error> {
        buf.push(0x01); // COM_QUIT
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Quit;
    use crate::io::ProtocolEncode;
    use crate::protocol::Capabilities;

    #[test]
    fn encode() {
        let mut buf = Vec::new();
        Quit.encode_with(&mut buf, Capabilities::BASE).unwrap();

        assert_eq!(&buf, &[0x01]);
    }
}
