use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{err_packet, Error};
use crate::io::ProtocolEncode;
use crate::net::{MaybeTlsStream, Socket};
use crate::protocol::response::{EofPacket, OkPacket};
use crate::protocol::{Capabilities, Packet, MAX_FRAME_SIZE};

/// Incomplete inbound bytes may accumulate up to this much before the
/// connection is declared broken.
const MAX_BUFFERED_INBOUND: usize = 16 * 1024 * 1024;

/// The framed packet transport under a connection.
///
/// Writes are staged in a buffer and sent on `flush`; reads
/// accumulate raw bytes and peel off whole frames. The sequence id
/// is stamped on writes and tracked from reads so that multi-packet
/// exchanges continue the numbering the server expects.
pub(crate) struct MySqlStream {
    stream: MaybeTlsStream,

    pub(crate) capabilities: Capabilities,
    pub(crate) sequence_id: u8,

    rbuf: BytesMut,
    wbuf: Vec<u8>,
}

impl MySqlStream {
    pub(crate) fn new(socket: Socket, capabilities: Capabilities) -> Self {
        Self {
            stream: MaybeTlsStream::new(socket),
            capabilities,
            sequence_id: 0,
            rbuf: BytesMut::with_capacity(8 * 1024),
            wbuf: Vec::with_capacity(1024),
        }
    }

    /// Stage one packet in the write buffer, continuing the current
    /// sequence numbering.
    pub(crate) fn write_packet<T>(&mut self, payload: T) -> Result<(), Error>
    where
        T: ProtocolEncode<Capabilities>,
    {
        Packet(payload).encode(&mut self.wbuf, self.capabilities, &mut self.sequence_id)
    }

    /// Send one packet as the start of a new command: the sequence id
    /// restarts at zero and the write buffer is flushed.
    pub(crate) async fn send_packet<T>(&mut self, payload: T) -> Result<(), Error>
    where
        T: ProtocolEncode<Capabilities>,
    {
        self.sequence_id = 0;
        self.write_packet(payload)?;
        self.flush().await
    }

    pub(crate) async fn flush(&mut self) -> Result<(), Error> {
        if !self.wbuf.is_empty() {
            tracing::trace!(bytes = self.wbuf.len(), "write");

            self.stream.write_all(&self.wbuf).await?;
            self.wbuf.clear();
            self.stream.flush().await?;
        }

        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Bytes, Error> {
        loop {
            if let Some((sequence_id, payload)) = split_frame(&mut self.rbuf) {
                self.sequence_id = sequence_id.wrapping_add(1);
                return Ok(payload);
            }

            if self.rbuf.len() > MAX_BUFFERED_INBOUND {
                return Err(err_packet!(
                    "incomplete packet exceeds the {} MiB inbound buffer limit",
                    MAX_BUFFERED_INBOUND / (1024 * 1024)
                ));
            }

            let n = self.stream.read_buf(&mut self.rbuf).await?;

            if n == 0 {
                // server went away mid-frame
                return Err(Error::BrokenConnection(None));
            }
        }
    }

    /// Receive the next packet, joining continuation frames and
    /// surfacing ERR packets as [`Error::Server`].
    pub(crate) async fn recv_packet(&mut self) -> Result<Packet<Bytes>, Error> {
        let mut payload = self.recv_frame().await?;

        // a frame of exactly the maximum size announces continuation
        // frames until one arrives short
        if payload.len() == MAX_FRAME_SIZE {
            let mut joined = BytesMut::from(&payload[..]);

            loop {
                let part = self.recv_frame().await?;
                let last = part.len() < MAX_FRAME_SIZE;

                joined.extend_from_slice(&part);

                if last {
                    break;
                }
            }

            payload = joined.freeze();
        }

        if payload.is_empty() {
            return Err(err_packet!("server sent an empty packet"));
        }

        tracing::trace!(first_byte = payload[0], bytes = payload.len(), "read");

        let packet = Packet(payload);

        if packet.is_err() {
            let err = packet.err(self.capabilities)?;
            return Err(err.into_server_error().into());
        }

        Ok(packet)
    }

    pub(crate) async fn recv_ok(&mut self) -> Result<OkPacket, Error> {
        let packet = self.recv_packet().await?;
        packet.ok(self.capabilities)
    }

    pub(crate) async fn recv_eof(&mut self) -> Result<EofPacket, Error> {
        let packet = self.recv_packet().await?;
        packet.eof(self.capabilities)
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Swap the transport to TLS. The reader must be idle and its
    /// buffer empty: leftover plaintext would otherwise be carried
    /// into the encrypted session.
    pub(crate) async fn upgrade_tls(&mut self, host: &str) -> Result<(), Error> {
        if !self.rbuf.is_empty() {
            return Err(err_packet!(
                "{} unread plaintext bytes buffered before TLS upgrade",
                self.rbuf.len()
            ));
        }

        self.stream.upgrade(host).await
    }

    /// Flush pending writes and close the transport.
    pub(crate) async fn shutdown(&mut self) -> Result<(), Error> {
        self.flush().await?;
        self.stream.shutdown().await?;

        Ok(())
    }
}

/// Peel one complete frame off the front of the accumulator,
/// returning its sequence id and payload.
fn split_frame(buf: &mut BytesMut) -> Option<(u8, Bytes)> {
    if buf.len() < 4 {
        return None;
    }

    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], 0]) as usize;

    if buf.len() < 4 + len {
        return None;
    }

    let mut header = buf.split_to(4);
    header.advance(3);
    let sequence_id = header.get_u8();

    let payload = buf.split_to(len).freeze();

    Some((sequence_id, payload))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::split_frame;

    #[test]
    fn incomplete_header_yields_nothing() {
        let mut buf = BytesMut::from(&b"\x05\x00"[..]);

        assert!(split_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn incomplete_payload_yields_nothing() {
        let mut buf = BytesMut::from(&b"\x05\x00\x00\x00\x01\x02"[..]);

        assert!(split_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn whole_frame_is_split_off() {
        let mut buf = BytesMut::from(&b"\x03\x00\x00\x07abcrest"[..]);

        let (sequence_id, payload) = split_frame(&mut buf).unwrap();

        assert_eq!(sequence_id, 7);
        assert_eq!(&payload[..], b"abc");
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn back_to_back_frames() {
        let mut buf = BytesMut::from(&b"\x01\x00\x00\x00a\x01\x00\x00\x01b"[..]);

        let (s1, p1) = split_frame(&mut buf).unwrap();
        let (s2, p2) = split_frame(&mut buf).unwrap();

        assert_eq!((s1, &p1[..]), (0, &b"a"[..]));
        assert_eq!((s2, &p2[..]), (1, &b"b"[..]));
        assert!(buf.is_empty());
        assert!(split_frame(&mut buf).is_none());
    }

    #[test]
    fn zero_length_frame() {
        let mut buf = BytesMut::from(&b"\x00\x00\x00\x02"[..]);

        let (sequence_id, payload) = split_frame(&mut buf).unwrap();

        assert_eq!(sequence_id, 2);
        assert!(payload.is_empty());
    }
}
