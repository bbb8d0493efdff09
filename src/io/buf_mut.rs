/// Write primitives for MySQL packet payloads.
pub(crate) trait BufMutExt {
    /// Write a length-encoded integer.
    ///
    /// <https://dev.mysql.com/doc/internals/en/integer.html>
    /// <https://mariadb.com/kb/en/library/protocol-data-types/#length-encoded-integers>
    fn put_uint_lenenc(&mut self, value: u64);

    /// Write a length-encoded byte sequence.
    fn put_bytes_lenenc(&mut self, value: &[u8]);

    /// Write a length-encoded UTF-8 string.
    fn put_str_lenenc(&mut self, value: &str);

    /// Write a UTF-8 string followed by a NUL terminator.
    fn put_str_nul(&mut self, value: &str);
}

impl BufMutExt for Vec<u8> {
    fn put_uint_lenenc(&mut self, value: u64) {
        if value < 251 {
            // < 251 is stored as a plain 1-byte integer

            #[allow(clippy::cast_possible_truncation)]
            self.push(value as u8);
        } else if value < 0x1_00_00 {
            // < (2 ** 16) is stored as 0xfc + 2-byte integer
            self.reserve(3);
            self.push(0xfc);

            #[allow(clippy::cast_possible_truncation)]
            self.extend_from_slice(&(value as u16).to_le_bytes());
        } else if value < 0x1_00_00_00 {
            // < (2 ** 24) is stored as 0xfd + 3-byte integer
            self.reserve(4);
            self.push(0xfd);

            #[allow(clippy::cast_possible_truncation)]
            self.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
        } else {
            // anything else is stored as 0xfe + 8-byte integer
            self.reserve(9);
            self.push(0xfe);
            self.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn put_bytes_lenenc(&mut self, value: &[u8]) {
        self.put_uint_lenenc(value.len() as u64);
        self.extend_from_slice(value);
    }

    #[inline]
    fn put_str_lenenc(&mut self, value: &str) {
        self.put_bytes_lenenc(value.as_bytes());
    }

    fn put_str_nul(&mut self, value: &str) {
        self.reserve(value.len() + 1);
        self.extend_from_slice(value.as_bytes());
        self.push(0);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::super::buf::BufExt;
    use super::BufMutExt;

    #[test]
    fn put_uint_lenenc_u8() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(0xfa);

        assert_eq!(&buf[..], b"\xFA");
    }

    #[test]
    fn put_uint_lenenc_u16() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(u64::from(u16::MAX));

        assert_eq!(&buf[..], b"\xFC\xFF\xFF");
    }

    #[test]
    fn put_uint_lenenc_u24() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(0xff_ff_ff);

        assert_eq!(&buf[..], b"\xFD\xFF\xFF\xFF");
    }

    #[test]
    fn put_uint_lenenc_u64() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(u64::MAX);

        assert_eq!(&buf[..], b"\xFE\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF");
    }

    // 0xfb through 0xff can never appear as a 1-byte value
    #[test]
    fn put_uint_lenenc_reserved_leads() {
        for value in 0xfb_u64..=0xff {
            let mut buf = Vec::new();
            buf.put_uint_lenenc(value);

            assert_eq!(buf[0], 0xfc);
            assert_eq!(buf.len(), 3);
        }
    }

    #[test]
    fn put_str_lenenc() {
        let mut buf = Vec::new();
        buf.put_str_lenenc("random_string");

        assert_eq!(&buf[..], b"\x0Drandom_string");
    }

    #[test]
    fn put_str_nul() {
        let mut buf = Vec::new();
        buf.put_str_nul("root");

        assert_eq!(&buf[..], b"root\x00");
    }

    // encode then decode is the identity across the width boundaries
    #[test]
    fn uint_lenenc_round_trip() {
        for value in [
            0,
            1,
            250,
            251,
            0xffff,
            0x1_00_00,
            0xff_ff_ff,
            0x1_00_00_00,
            u64::from(u32::MAX),
            u64::MAX,
        ] {
            let mut buf = Vec::new();
            buf.put_uint_lenenc(value);

            let mut bytes = Bytes::from(buf);
            assert_eq!(bytes.get_uint_lenenc().unwrap(), value);
            assert!(bytes.is_empty());
        }
    }
}
