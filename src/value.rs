use bytes::{Buf, Bytes};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::column::{ColumnType, MySqlColumn};
use crate::error::{err_payload, Error};
use crate::io::BufExt;

/// A value bound to a query parameter.
///
/// Parameters travel as text: substituted into the query string for
/// [`execute`][crate::MySqlConnection::execute_with], or marshalled
/// as `VAR_STRING` cells for a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Appends this value to a query string as a SQL literal.
    ///
    /// Strings are single-quoted with `\` doubled and `'` doubled;
    /// NULL, numbers, and booleans are written bare.
    pub(crate) fn write_literal(&self, sql: &mut String) {
        match self {
            Value::Null => sql.push_str("NULL"),
            Value::Bool(true) => sql.push_str("TRUE"),
            Value::Bool(false) => sql.push_str("FALSE"),
            Value::Int(v) => sql.push_str(&v.to_string()),
            Value::UInt(v) => sql.push_str(&v.to_string()),
            Value::Double(v) => sql.push_str(&v.to_string()),
            Value::Text(v) => write_quoted(sql, v),
            Value::Bytes(v) => write_quoted(sql, &String::from_utf8_lossy(v)),
            Value::DateTime(v) => {
                write_quoted(sql, &v.format("%Y-%m-%d %H:%M:%S%.6f").to_string());
            }
        }
    }

    /// The UTF-8 text form sent for a `VAR_STRING` statement
    /// parameter, or `None` for NULL.
    pub(crate) fn as_param_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Null => None,
            Value::Bool(v) => Some(if *v { b"1".to_vec() } else { b"0".to_vec() }),
            Value::Int(v) => Some(v.to_string().into_bytes()),
            Value::UInt(v) => Some(v.to_string().into_bytes()),
            Value::Double(v) => Some(v.to_string().into_bytes()),
            Value::Text(v) => Some(v.clone().into_bytes()),
            Value::Bytes(v) => Some(v.clone()),
            Value::DateTime(v) => {
                Some(v.format("%Y-%m-%d %H:%M:%S%.6f").to_string().into_bytes())
            }
        }
    }

    pub(crate) fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn write_quoted(sql: &mut String, value: &str) {
    sql.push('\'');

    for c in value.chars() {
        match c {
            '\\' => sql.push_str("\\\\"),
            '\'' => sql.push_str("''"),
            c => sql.push(c),
        }
    }

    sql.push('\'');
}

/// Conversion of a Rust value into its SQL text form.
///
/// Implemented for NULL (`()` and `Option`), numbers, booleans,
/// strings, byte blobs, and chrono date-times.
pub trait ToSqlText {
    fn to_value(&self) -> Value;
}

impl ToSqlText for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToSqlText for () {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl<T: ToSqlText> ToSqlText for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl ToSqlText for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! impl_to_sql_text_int {
    ($($ty:ty),*) => {
        $(impl ToSqlText for $ty {
            fn to_value(&self) -> Value {
                Value::Int(i64::from(*self))
            }
        })*
    };
}

impl_to_sql_text_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlText for u64 {
    fn to_value(&self) -> Value {
        Value::UInt(*self)
    }
}

impl ToSqlText for f32 {
    fn to_value(&self) -> Value {
        Value::Double(f64::from(*self))
    }
}

impl ToSqlText for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl ToSqlText for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_owned())
    }
}

impl ToSqlText for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToSqlText for &[u8] {
    fn to_value(&self) -> Value {
        Value::Bytes((*self).to_vec())
    }
}

impl ToSqlText for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl ToSqlText for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

macro_rules! impl_from_to_sql_text {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                value.to_value()
            }
        })*
    };
}

impl_from_to_sql_text!(
    (),
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    &str,
    String,
    &[u8],
    Vec<u8>,
    NaiveDateTime
);

impl<T: ToSqlText> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.to_value()
    }
}

/// Decode one non-NULL binary-protocol cell into its canonical text,
/// advancing `buf` past it.
///
/// Numeric and temporal types are rendered to decimal or
/// `YYYY-MM-DD HH:MM:SS.ffffff` text; everything else is carried
/// through as its length-encoded bytes.
pub(crate) fn decode_binary_value(
    buf: &mut Bytes,
    ty: ColumnType,
    unsigned: bool,
) -> Result<Bytes, Error> {
    Ok(match ty {
        ColumnType::Tiny => {
            let v = buf.get_bytes(1)?[0];
            if unsigned {
                text(v)
            } else {
                text(v as i8)
            }
        }

        ColumnType::Short | ColumnType::Year => {
            let mut raw = buf.get_bytes(2)?;
            let v = raw.get_u16_le();
            if unsigned || ty == ColumnType::Year {
                text(v)
            } else {
                text(v as i16)
            }
        }

        ColumnType::Long | ColumnType::Int24 => {
            let mut raw = buf.get_bytes(4)?;
            let v = raw.get_u32_le();
            if unsigned {
                text(v)
            } else {
                text(v as i32)
            }
        }

        ColumnType::LongLong => {
            let mut raw = buf.get_bytes(8)?;
            let v = raw.get_u64_le();
            if unsigned {
                text(v)
            } else {
                text(v as i64)
            }
        }

        ColumnType::Float => {
            let mut raw = buf.get_bytes(4)?;
            text(raw.get_f32_le())
        }

        ColumnType::Double => {
            let mut raw = buf.get_bytes(8)?;
            text(raw.get_f64_le())
        }

        ColumnType::Date
        | ColumnType::NewDate
        | ColumnType::Datetime
        | ColumnType::Datetime2
        | ColumnType::Timestamp
        | ColumnType::Timestamp2 => decode_binary_datetime(buf)?,

        ColumnType::Time | ColumnType::Time2 => decode_binary_time(buf)?,

        ColumnType::Null => {
            return Err(err_payload!("NULL-typed column carried a value"));
        }

        // DECIMAL, BIT, JSON, ENUM, SET, the BLOB family, VARCHAR,
        // VAR_STRING, STRING, GEOMETRY: length-encoded, as-is
        _ => buf.get_bytes_lenenc()?,
    })
}

fn text(value: impl ToString) -> Bytes {
    Bytes::from(value.to_string())
}

// length byte 0, 4, 7, or 11 with year, month, day, hour, minute,
// second, and microsecond fields present per that length
fn decode_binary_datetime(buf: &mut Bytes) -> Result<Bytes, Error> {
    let len = buf.get_bytes(1)?[0];

    if !matches!(len, 0 | 4 | 7 | 11) {
        return Err(err_payload!("invalid date-time length {len}"));
    }

    let mut raw = buf.get_bytes(usize::from(len))?;

    let (year, month, day) = if len >= 4 {
        (raw.get_u16_le(), raw.get_u8(), raw.get_u8())
    } else {
        (0, 0, 0)
    };

    let (hour, minute, second) = if len >= 7 {
        (raw.get_u8(), raw.get_u8(), raw.get_u8())
    } else {
        (0, 0, 0)
    };

    let micros = if len >= 11 { raw.get_u32_le() } else { 0 };

    Ok(Bytes::from(format!(
        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
    )))
}

// length byte 0, 8, or 12; days are folded into the hour field
fn decode_binary_time(buf: &mut Bytes) -> Result<Bytes, Error> {
    let len = buf.get_bytes(1)?[0];

    if !matches!(len, 0 | 8 | 12) {
        return Err(err_payload!("invalid time length {len}"));
    }

    let mut raw = buf.get_bytes(usize::from(len))?;

    let (negative, days, hour, minute, second) = if len >= 8 {
        (
            raw.get_u8() != 0,
            raw.get_u32_le(),
            raw.get_u8(),
            raw.get_u8(),
            raw.get_u8(),
        )
    } else {
        (false, 0, 0, 0, 0)
    };

    let micros = if len >= 12 { raw.get_u32_le() } else { 0 };

    let hours = days * 24 + u32::from(hour);
    let sign = if negative { "-" } else { "" };

    Ok(Bytes::from(format!(
        "{sign}{hours:02}:{minute:02}:{second:02}.{micros:06}"
    )))
}

/// Strict conversion from a column's canonical text into a Rust
/// scalar. A mismatch between the requested type and the column type
/// is an error, never a coercion.
pub trait FromSqlText: Sized {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error>;
}

fn non_null<'v>(column: &MySqlColumn, value: Option<&'v [u8]>) -> Result<&'v [u8], Error> {
    value.ok_or_else(|| {
        Error::InvalidArgument(format!(
            "column '{}' is NULL; use Option<T> to decode nullable columns",
            column.name
        ))
    })
}

fn as_str<'v>(column: &MySqlColumn, value: &'v [u8]) -> Result<&'v str, Error> {
    std::str::from_utf8(value).map_err(|_| {
        Error::InvalidArgument(format!("column '{}' holds non-UTF-8 bytes", column.name))
    })
}

fn mismatch(column: &MySqlColumn, requested: &str) -> Error {
    Error::InvalidArgument(format!(
        "cannot decode {} column '{}' as {requested}",
        column.ty.name(),
        column.name,
    ))
}

impl<T: FromSqlText> FromSqlText for Option<T> {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        value
            .map(|v| T::from_sql_text(column, Some(v)))
            .transpose()
    }
}

impl FromSqlText for String {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        Ok(as_str(column, non_null(column, value)?)?.to_owned())
    }
}

impl FromSqlText for Vec<u8> {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        Ok(non_null(column, value)?.to_vec())
    }
}

impl FromSqlText for bool {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        if !column.is_boolean() {
            return Err(mismatch(column, "bool"));
        }

        let text = as_str(column, non_null(column, value)?)?;

        text.parse::<i8>()
            .map(|v| v != 0)
            .map_err(|_| mismatch(column, "bool"))
    }
}

impl FromSqlText for i64 {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        if !column.ty.is_integer() {
            return Err(mismatch(column, "i64"));
        }

        let text = as_str(column, non_null(column, value)?)?;
        text.parse().map_err(|_| mismatch(column, "i64"))
    }
}

impl FromSqlText for u64 {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        if !column.ty.is_integer() {
            return Err(mismatch(column, "u64"));
        }

        let text = as_str(column, non_null(column, value)?)?;
        text.parse().map_err(|_| mismatch(column, "u64"))
    }
}

impl FromSqlText for f64 {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        if !(column.ty.is_integer()
            || matches!(column.ty, ColumnType::Float | ColumnType::Double))
        {
            return Err(mismatch(column, "f64"));
        }

        let text = as_str(column, non_null(column, value)?)?;
        text.parse().map_err(|_| mismatch(column, "f64"))
    }
}

impl FromSqlText for NaiveDateTime {
    fn from_sql_text(column: &MySqlColumn, value: Option<&[u8]>) -> Result<Self, Error> {
        if !column.ty.is_temporal() {
            return Err(mismatch(column, "NaiveDateTime"));
        }

        let text = as_str(column, non_null(column, value)?)?;

        // DATETIME and TIMESTAMP carry both halves; DATE stands alone
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|_| mismatch(column, "NaiveDateTime"))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::{decode_binary_value, Value};
    use crate::column::ColumnType;

    fn decode(data: &'static [u8], ty: ColumnType, unsigned: bool) -> String {
        let mut buf = Bytes::from_static(data);
        let value = decode_binary_value(&mut buf, ty, unsigned).unwrap();
        assert!(buf.is_empty(), "decoder left {} bytes", buf.len());

        String::from_utf8(value.to_vec()).unwrap()
    }

    #[test]
    fn decode_integers() {
        assert_eq!(decode(b"\x9c", ColumnType::Tiny, false), "-100");
        assert_eq!(decode(b"\x9c", ColumnType::Tiny, true), "156");
        assert_eq!(decode(b"\x30\xf8", ColumnType::Short, false), "-2000");
        assert_eq!(decode(b"\x40\xe2\x01\x00", ColumnType::Long, false), "123456");
        assert_eq!(
            decode(b"\xff\xff\xff\xff\xff\xff\xff\xff", ColumnType::LongLong, false),
            "-1"
        );
        assert_eq!(
            decode(b"\xff\xff\xff\xff\xff\xff\xff\xff", ColumnType::LongLong, true),
            "18446744073709551615"
        );
    }

    #[test]
    fn decode_floats() {
        assert_eq!(decode(b"\x00\x00\x20\x41", ColumnType::Float, false), "10");
        assert_eq!(
            decode(b"\x00\x00\x00\x00\x00\x00\xf0\xbf", ColumnType::Double, false),
            "-1"
        );
    }

    #[test]
    fn decode_datetime_lengths() {
        assert_eq!(
            decode(b"\x00", ColumnType::Datetime, false),
            "0000-00-00 00:00:00.000000"
        );
        assert_eq!(
            decode(b"\x04\xe8\x07\x01\x02", ColumnType::Date, false),
            "2024-01-02 00:00:00.000000"
        );
        assert_eq!(
            decode(b"\x07\xe8\x07\x01\x02\x0a\x14\x1e", ColumnType::Datetime, false),
            "2024-01-02 10:20:30.000000"
        );
        assert_eq!(
            decode(
                b"\x0b\xe8\x07\x01\x02\x0a\x14\x1e\x40\xe2\x01\x00",
                ColumnType::Timestamp,
                false
            ),
            "2024-01-02 10:20:30.123456"
        );
    }

    #[test]
    fn decode_time_folds_days_into_hours() {
        // 2 days, 01:02:03, negative
        assert_eq!(
            decode(b"\x08\x01\x02\x00\x00\x00\x01\x02\x03", ColumnType::Time, false),
            "-49:02:03.000000"
        );
        assert_eq!(decode(b"\x00", ColumnType::Time, false), "00:00:00.000000");
    }

    #[test]
    fn decode_string_is_length_encoded() {
        assert_eq!(decode(b"\x05hello", ColumnType::VarString, false), "hello");
    }

    #[test]
    fn literal_formatting() {
        let mut sql = String::new();
        Value::Null.write_literal(&mut sql);
        sql.push(',');
        Value::Bool(true).write_literal(&mut sql);
        sql.push(',');
        Value::Int(-5).write_literal(&mut sql);
        sql.push(',');
        Value::Text("it's a \\ test".into()).write_literal(&mut sql);

        assert_eq!(sql, r"NULL,TRUE,-5,'it''s a \\ test'");
    }

    #[test]
    fn param_bytes() {
        assert_eq!(Value::Null.as_param_bytes(), None);
        assert_eq!(Value::Bool(true).as_param_bytes(), Some(b"1".to_vec()));
        assert_eq!(Value::Int(42).as_param_bytes(), Some(b"42".to_vec()));
        assert_eq!(
            Value::Text("plain".into()).as_param_bytes(),
            Some(b"plain".to_vec())
        );
    }
}
