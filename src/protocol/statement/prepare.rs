use crate::error::Error;
use crate::io::ProtocolEncode;
use crate::protocol::Capabilities;

// https://dev.mysql.com/doc/internals/en/com-stmt-prepare.html#packet-COM_STMT_PREPARE

#[derive(Debug)]
pub(crate) struct StmtPrepare<'a>(pub(crate) &'a str);

impl ProtocolEncode<Capabilities> for StmtPrepare<'_> {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Capabilities) -> Result<(), Error> {
        buf.push(0x16); // COM_STMT_PREPARE
        buf.extend_from_slice(self.0.as_bytes());

        Ok(())
    }
}
