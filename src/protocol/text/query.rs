use crate::error::Error;
use crate::io::ProtocolEncode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/com-query.html

/// Asks the server to execute a query immediately, with results
/// returned over the text protocol.
#[derive(Debug)]
pub(crate) struct ComQuery<'a>(pub(crate) &'a str);

impl ProtocolEncode<Capabilities> for ComQuery<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<(), Error> {
        buf.push(0x03); // COM_QUERY
        buf.extend_from_slice(self.0.as_bytes());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ComQuery;
    use crate::io::ProtocolEncode;
    use crate::protocol::Capabilities;

    #[test]
    fn encode() {
        let mut buf = Vec::new();
        ComQuery("SELECT 1").encode_with(&mut buf, Capabilities::BASE).unwrap();

        assert_eq!(&buf[..], b"\x03SELECT 1");
    }
}
