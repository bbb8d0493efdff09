use bytes::Bytes;

use crate::error::Error;

mod buf;
mod buf_mut;

pub(crate) use buf::BufExt;
pub(crate) use buf_mut::BufMutExt;

/// A protocol type that can be encoded into an outbound packet
/// payload, given some context (usually the active capabilities).
pub(crate) trait ProtocolEncode<Cx = ()> {
    fn encode_with(&self, buf: &mut Vec<u8>, context: Cx) -> Result<(), Error>;
}

/// A protocol type that can be decoded from an inbound packet
/// payload, given some context.
pub(crate) trait ProtocolDecode<Cx = ()>: Sized {
    fn decode_with(buf: Bytes, context: Cx) -> Result<Self, Error>;
}

// raw bytes pass through unframed; used for auth continuations whose
// payload is just the scramble or password
impl<Cx> ProtocolEncode<Cx> for &[u8] {
    fn encode_with(&self, buf: &mut Vec<u8>, _: Cx) -> Result<(), Error> {
        buf.extend_from_slice(self);
        Ok(())
    }
}
