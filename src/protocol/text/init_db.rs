use crate::error::Error;
use crate::io::ProtocolEncode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/com-init-db.html

/// Changes the default schema of the connection.
#[derive(Debug)]
pub(crate) struct InitDb<'a>(pub(crate) &'a str);

impl ProtocolEncode<Capabilities> for InitDb<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<(), Error> {
        buf.push(0x02); // COM_INIT_DB
        buf.extend_from_slice(self.0.as_bytes());

        Ok(())
    }
}
