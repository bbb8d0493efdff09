use bytes::{Buf, Bytes};

use crate::error::{err_payload, Error};
use crate::io::{BufExt, ProtocolDecode};

// https://dev.mysql.com/doc/internals/en/com-query-response.html#column-type
// https://mariadb.com/kb/en/result-set-packets/#field-types

/// The type byte carried by every column definition and by every
/// binary-protocol parameter declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0a,
    Time = 0x0b,
    Datetime = 0x0c,
    Year = 0x0d,
    NewDate = 0x0e,
    Varchar = 0x0f,
    Bit = 0x10,
    Timestamp2 = 0x11,
    Datetime2 = 0x12,
    Time2 = 0x13,
    Json = 0xf5,
    NewDecimal = 0xf6,
    Enum = 0xf7,
    Set = 0xf8,
    TinyBlob = 0xf9,
    MediumBlob = 0xfa,
    LongBlob = 0xfb,
    Blob = 0xfc,
    VarString = 0xfd,
    String = 0xfe,
    Geometry = 0xff,
}

impl ColumnType {
    pub(crate) fn from_id(id: u8) -> Result<Self, Error> {
        Ok(match id {
            0x00 => ColumnType::Decimal,
            0x01 => ColumnType::Tiny,
            0x02 => ColumnType::Short,
            0x03 => ColumnType::Long,
            0x04 => ColumnType::Float,
            0x05 => ColumnType::Double,
            0x06 => ColumnType::Null,
            0x07 => ColumnType::Timestamp,
            0x08 => ColumnType::LongLong,
            0x09 => ColumnType::Int24,
            0x0a => ColumnType::Date,
            0x0b => ColumnType::Time,
            0x0c => ColumnType::Datetime,
            0x0d => ColumnType::Year,
            0x0e => ColumnType::NewDate,
            0x0f => ColumnType::Varchar,
            0x10 => ColumnType::Bit,
            0x11 => ColumnType::Timestamp2,
            0x12 => ColumnType::Datetime2,
            0x13 => ColumnType::Time2,
            0xf5 => ColumnType::Json,
            0xf6 => ColumnType::NewDecimal,
            0xf7 => ColumnType::Enum,
            0xf8 => ColumnType::Set,
            0xf9 => ColumnType::TinyBlob,
            0xfa => ColumnType::MediumBlob,
            0xfb => ColumnType::LongBlob,
            0xfc => ColumnType::Blob,
            0xfd => ColumnType::VarString,
            0xfe => ColumnType::String,
            0xff => ColumnType::Geometry,

            id => {
                return Err(err_payload!("unknown column type 0x{id:02x}"));
            }
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Tiny => "TINYINT",
            ColumnType::Short => "SMALLINT",
            ColumnType::Long => "INT",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Null => "NULL",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::LongLong => "BIGINT",
            ColumnType::Int24 => "MEDIUMINT",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Datetime => "DATETIME",
            ColumnType::Year => "YEAR",
            ColumnType::NewDate => "DATE",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Bit => "BIT",
            ColumnType::Timestamp2 => "TIMESTAMP",
            ColumnType::Datetime2 => "DATETIME",
            ColumnType::Time2 => "TIME",
            ColumnType::Json => "JSON",
            ColumnType::NewDecimal => "DECIMAL",
            ColumnType::Enum => "ENUM",
            ColumnType::Set => "SET",
            ColumnType::TinyBlob => "TINYBLOB",
            ColumnType::MediumBlob => "MEDIUMBLOB",
            ColumnType::LongBlob => "LONGBLOB",
            ColumnType::Blob => "BLOB",
            ColumnType::VarString => "VARCHAR",
            ColumnType::String => "CHAR",
            ColumnType::Geometry => "GEOMETRY",
        }
    }

    /// `true` for the integer family, signed or unsigned.
    pub(crate) fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::Tiny
                | ColumnType::Short
                | ColumnType::Long
                | ColumnType::Int24
                | ColumnType::LongLong
                | ColumnType::Year
        )
    }

    /// `true` for the date and time family.
    pub(crate) fn is_temporal(self) -> bool {
        matches!(
            self,
            ColumnType::Date
                | ColumnType::NewDate
                | ColumnType::Datetime
                | ColumnType::Datetime2
                | ColumnType::Timestamp
                | ColumnType::Timestamp2
                | ColumnType::Time
                | ColumnType::Time2
        )
    }
}

// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/group__group__cs__column__definition__flags.html
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u16 {
        // the column cannot be NULL
        const NOT_NULL = 0x0001;

        // the column is part of a primary key
        const PRIMARY_KEY = 0x0002;

        // the column is part of a unique key
        const UNIQUE_KEY = 0x0004;

        // the column is part of a non-unique key
        const MULTIPLE_KEY = 0x0008;

        const BLOB = 0x0010;
        const UNSIGNED = 0x0020;
        const ZEROFILL = 0x0040;

        // the column has a binary collation
        const BINARY = 0x0080;

        const ENUM = 0x0100;
        const AUTO_INCREMENT = 0x0200;
        const TIMESTAMP = 0x0400;
        const SET = 0x0800;
        const NO_DEFAULT_VALUE = 0x1000;
        const ON_UPDATE_NOW = 0x2000;
        const NUM = 0x8000;
    }
}

/// Describes one column of a result set.
///
/// <https://mariadb.com/kb/en/result-set-packets/#column-definition-packet>
/// <https://dev.mysql.com/doc/internals/en/com-query-response.html#packet-Protocol::ColumnDefinition>
#[derive(Debug, Clone)]
#[allow(dead_code)] // fields mirror the wire layout
pub(crate) struct ColumnDefinition {
    pub(crate) schema: String,
    pub(crate) table_alias: String,
    pub(crate) table: String,
    pub(crate) alias: String,
    pub(crate) name: String,
    pub(crate) charset: u16,
    pub(crate) max_size: u32,
    pub(crate) ty: ColumnType,
    pub(crate) flags: ColumnFlags,
    pub(crate) decimals: u8,
}

impl ProtocolDecode for ColumnDefinition {
    fn decode_with(mut buf: Bytes, _: ()) -> Result<Self, Error> {
        let catalog = buf.get_str_lenenc()?;

        // the protocol promises this is always "def"
        debug_assert_eq!(catalog, "def");

        let schema = buf.get_str_lenenc()?;
        let table_alias = buf.get_str_lenenc()?;
        let table = buf.get_str_lenenc()?;
        let alias = buf.get_str_lenenc()?;
        let name = buf.get_str_lenenc()?;

        let fixed_len_fields_len = buf.get_uint_lenenc()?;

        // the protocol promises this is always 0x0c
        debug_assert_eq!(fixed_len_fields_len, 0x0c);

        let charset = buf.get_u16_le();
        let max_size = buf.get_u32_le();
        let ty = ColumnType::from_id(buf.get_u8())?;
        let flags = ColumnFlags::from_bits_truncate(buf.get_u16_le());
        let decimals = buf.get_u8();

        Ok(Self {
            schema,
            table_alias,
            table,
            alias,
            name,
            charset,
            max_size,
            ty,
            flags,
            decimals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDefinition, ColumnFlags, ColumnType};
    use crate::io::ProtocolDecode;

    #[test]
    fn column_type_round_trips_through_id() {
        for id in [0x01_u8, 0x08, 0x0c, 0xf6, 0xfd, 0xff] {
            let ty = ColumnType::from_id(id).unwrap();
            assert_eq!(ty as u8, id);
        }
    }

    #[test]
    fn column_type_rejects_unknown_id() {
        assert!(ColumnType::from_id(0x42).is_err());
    }

    #[test]
    fn decode_column_definition() {
        // SELECT 1 AS test
        const DATA: &[u8] =
            b"\x03def\x00\x00\x00\x04test\x00\x0c\x3f\x00\x01\x00\x00\x00\x08\x81\x00\x00\x00\x00";

        let def = ColumnDefinition::decode_with(DATA.into(), ()).unwrap();

        assert_eq!(def.alias, "test");
        assert_eq!(def.name, "");
        assert_eq!(def.charset, 63);
        assert_eq!(def.ty, ColumnType::LongLong);
        assert!(def.flags.contains(ColumnFlags::NOT_NULL));
        assert_eq!(def.max_size, 1);
    }
}
