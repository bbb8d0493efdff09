use bytes::{Buf, Bytes};

use crate::error::{err_payload, Error};

/// Read primitives for MySQL packet payloads.
///
/// Every method checks the remaining length before touching the
/// buffer; a short payload surfaces as an error, never a panic.
pub(crate) trait BufExt {
    /// Read a length-encoded integer.
    ///
    /// `0xfb` and `0xff` are not valid leads here: `0xfb` marks SQL
    /// NULL in result rows and `0xff` marks an ERR packet. Callers
    /// that expect either must peek before calling.
    ///
    /// <https://dev.mysql.com/doc/internals/en/integer.html#packet-Protocol::LengthEncodedInteger>
    fn get_uint_lenenc(&mut self) -> Result<u64, Error>;

    /// Read a length-encoded byte sequence.
    fn get_bytes_lenenc(&mut self) -> Result<Bytes, Error>;

    /// Read a length-encoded UTF-8 string.
    fn get_str_lenenc(&mut self) -> Result<String, Error>;

    /// Read a UTF-8 string terminated by the first NUL byte. The
    /// terminator is consumed but not returned.
    fn get_str_nul(&mut self) -> Result<String, Error>;

    /// Read a UTF-8 string occupying the rest of the payload.
    fn get_str_eof(&mut self) -> Result<String, Error>;

    /// Read exactly `n` bytes.
    fn get_bytes(&mut self, n: usize) -> Result<Bytes, Error>;
}

impl BufExt for Bytes {
    fn get_uint_lenenc(&mut self) -> Result<u64, Error> {
        if self.is_empty() {
            return Err(err_payload!("unexpected end of payload reading int<lenenc>"));
        }

        match self.get_u8() {
            0xfb => Err(err_payload!("0xfb (NULL) is not valid in int<lenenc>")),
            0xff => Err(err_payload!("0xff (ERR) is not valid in int<lenenc>")),

            0xfc => {
                check_len(self, 2, "int<lenenc>")?;
                Ok(u64::from(self.get_u16_le()))
            }

            0xfd => {
                check_len(self, 3, "int<lenenc>")?;
                Ok(self.get_uint_le(3))
            }

            0xfe => {
                check_len(self, 8, "int<lenenc>")?;
                Ok(self.get_u64_le())
            }

            v => Ok(u64::from(v)),
        }
    }

    fn get_bytes_lenenc(&mut self) -> Result<Bytes, Error> {
        let size = self.get_uint_lenenc()?;
        let size = usize::try_from(size)
            .map_err(|_| err_payload!("string<lenenc> length overflows usize: {size}"))?;

        self.get_bytes(size)
    }

    fn get_str_lenenc(&mut self) -> Result<String, Error> {
        into_str(self.get_bytes_lenenc()?)
    }

    fn get_str_nul(&mut self) -> Result<String, Error> {
        let nul = memchr::memchr(0, self)
            .ok_or_else(|| err_payload!("string<NUL> is missing its terminator"))?;

        let s = into_str(self.split_to(nul))?;
        self.advance(1);

        Ok(s)
    }

    fn get_str_eof(&mut self) -> Result<String, Error> {
        into_str(self.split_to(self.len()))
    }

    fn get_bytes(&mut self, n: usize) -> Result<Bytes, Error> {
        check_len(self, n, "string<fix>")?;
        Ok(self.split_to(n))
    }
}

fn check_len(buf: &Bytes, needed: usize, what: &str) -> Result<(), Error> {
    if buf.len() < needed {
        return Err(err_payload!(
            "{what} needs {needed} bytes but only {} remain",
            buf.len()
        ));
    }

    Ok(())
}

fn into_str(bytes: Bytes) -> Result<String, Error> {
    String::from_utf8(bytes.into()).map_err(|e| err_payload!("string is not UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::BufExt;

    #[test]
    fn get_uint_lenenc_one_byte() {
        let mut buf = Bytes::from_static(b"\xfa");
        assert_eq!(buf.get_uint_lenenc().unwrap(), 0xfa);
        assert!(buf.is_empty());
    }

    #[test]
    fn get_uint_lenenc_two_bytes() {
        let mut buf = Bytes::from_static(b"\xfc\xfb\x00");
        assert_eq!(buf.get_uint_lenenc().unwrap(), 0xfb);
    }

    #[test]
    fn get_uint_lenenc_three_bytes() {
        let mut buf = Bytes::from_static(b"\xfd\xff\xff\xff");
        assert_eq!(buf.get_uint_lenenc().unwrap(), 0xff_ff_ff);
    }

    #[test]
    fn get_uint_lenenc_eight_bytes() {
        let mut buf = Bytes::from_static(b"\xfe\xff\xff\xff\xff\xff\xff\xff\xff");
        assert_eq!(buf.get_uint_lenenc().unwrap(), u64::MAX);
    }

    #[test]
    fn get_uint_lenenc_rejects_null_marker() {
        let mut buf = Bytes::from_static(b"\xfb");
        assert!(buf.get_uint_lenenc().is_err());
    }

    #[test]
    fn get_uint_lenenc_rejects_err_marker() {
        let mut buf = Bytes::from_static(b"\xff");
        assert!(buf.get_uint_lenenc().is_err());
    }

    #[test]
    fn get_uint_lenenc_short_payload() {
        let mut buf = Bytes::from_static(b"\xfc\x01");
        assert!(buf.get_uint_lenenc().is_err());
    }

    #[test]
    fn get_str_nul_stops_at_terminator() {
        let mut buf = Bytes::from_static(b"5.7.41\x00rest");
        assert_eq!(buf.get_str_nul().unwrap(), "5.7.41");
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn get_str_nul_requires_terminator() {
        let mut buf = Bytes::from_static(b"no terminator");
        assert!(buf.get_str_nul().is_err());
    }

    #[test]
    fn get_str_lenenc() {
        let mut buf = Bytes::from_static(b"\x0drandom_string more");
        assert_eq!(buf.get_str_lenenc().unwrap(), "random_string");
        assert_eq!(&buf[..], b" more");
    }

    #[test]
    fn get_str_eof_drains() {
        let mut buf = Bytes::from_static(b"everything left");
        assert_eq!(buf.get_str_eof().unwrap(), "everything left");
        assert!(buf.is_empty());
    }
}
