use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::column::MySqlColumn;
use crate::error::{Error, Result};
use crate::value::FromSqlText;

/// One row of a result set.
///
/// Values are stored in their canonical text form regardless of the
/// wire protocol that carried them; binary-protocol cells are
/// rendered to the same text a `COM_QUERY` would have produced.
#[derive(Debug, Clone)]
pub struct MySqlRow {
    pub(crate) columns: Arc<Vec<MySqlColumn>>,
    pub(crate) column_names: Arc<hashbrown::HashMap<String, usize>>,
    pub(crate) values: Vec<Option<Bytes>>,
}

impl MySqlRow {
    /// Number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn columns(&self) -> &[MySqlColumn] {
        &self.columns
    }

    /// The value at `index` as text, or `None` for SQL NULL.
    pub fn col_at(&self, index: usize) -> Result<Option<&str>> {
        let value = self.raw_at(index)?;

        value
            .map(|bytes| {
                std::str::from_utf8(bytes).map_err(|_| {
                    Error::InvalidArgument(format!(
                        "column {index} holds non-UTF-8 bytes; use bytes_at"
                    ))
                })
            })
            .transpose()
    }

    /// The value at `index` as raw bytes. The binary-safe accessor
    /// for `BLOB` columns whose content is not UTF-8.
    pub fn bytes_at(&self, index: usize) -> Result<Option<&[u8]>> {
        self.raw_at(index)
    }

    /// The value of the named column, matched case-insensitively.
    pub fn col_by_name(&self, name: &str) -> Result<Option<&str>> {
        self.col_at(self.ordinal_of(name)?)
    }

    /// The whole row as a `name -> text` map. Non-UTF-8 values are
    /// replaced lossily; reach for [`bytes_at`][Self::bytes_at] when
    /// that matters.
    #[must_use]
    pub fn assoc(&self) -> HashMap<String, Option<String>> {
        self.columns
            .iter()
            .map(|column| {
                let value = self.values[column.ordinal]
                    .as_ref()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

                (column.name.clone(), value)
            })
            .collect()
    }

    /// Decode the value at `index` into a Rust scalar, strictly
    /// typed by the column's wire type.
    pub fn get<T: FromSqlText>(&self, index: usize) -> Result<T> {
        let column = self.column_at(index)?;

        T::from_sql_text(column, self.values[index].as_deref())
    }

    /// Typed access by column name, matched case-insensitively.
    pub fn get_by_name<T: FromSqlText>(&self, name: &str) -> Result<T> {
        self.get(self.ordinal_of(name)?)
    }

    fn raw_at(&self, index: usize) -> Result<Option<&[u8]>> {
        self.column_at(index)?;

        Ok(self.values[index].as_deref())
    }

    fn column_at(&self, index: usize) -> Result<&MySqlColumn> {
        self.columns.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "column index {index} out of bounds ({} columns)",
                self.columns.len()
            ))
        })
    }

    fn ordinal_of(&self, name: &str) -> Result<usize> {
        self.column_names
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("no column named '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::MySqlRow;
    use crate::column::{ColumnFlags, ColumnType, MySqlColumn};

    fn row() -> MySqlRow {
        let columns = vec![
            MySqlColumn {
                ordinal: 0,
                name: "id".into(),
                ty: ColumnType::LongLong,
                flags: ColumnFlags::NOT_NULL,
                charset: 63,
                max_size: 20,
                decimals: 0,
            },
            MySqlColumn {
                ordinal: 1,
                name: "Title".into(),
                ty: ColumnType::VarString,
                flags: ColumnFlags::empty(),
                charset: 45,
                max_size: 255,
                decimals: 0,
            },
        ];

        let mut names = hashbrown::HashMap::new();
        for c in &columns {
            names.insert(c.name.to_lowercase(), c.ordinal);
        }

        MySqlRow {
            columns: Arc::new(columns),
            column_names: Arc::new(names),
            values: vec![Some(Bytes::from_static(b"42")), None],
        }
    }

    #[test]
    fn access_by_index_and_name() {
        let row = row();

        assert_eq!(row.col_at(0).unwrap(), Some("42"));
        assert_eq!(row.col_at(1).unwrap(), None);
        assert_eq!(row.col_by_name("ID").unwrap(), Some("42"));
        assert_eq!(row.col_by_name("title").unwrap(), None);
        assert!(row.col_at(2).is_err());
        assert!(row.col_by_name("missing").is_err());
    }

    #[test]
    fn typed_access_is_strict() {
        let row = row();

        assert_eq!(row.get::<i64>(0).unwrap(), 42);
        assert_eq!(row.get_by_name::<u64>("id").unwrap(), 42);
        assert_eq!(row.get::<Option<String>>(1).unwrap(), None);

        // an integer column does not decode as a datetime, and a
        // NULL does not decode as a bare scalar
        assert!(row.get::<chrono::NaiveDateTime>(0).is_err());
        assert!(row.get::<String>(1).is_err());
    }

    #[test]
    fn assoc_maps_names_to_text() {
        let map = row().assoc();

        assert_eq!(map["id"].as_deref(), Some("42"));
        assert_eq!(map["Title"], None);
    }
}
