pub use crate::protocol::column::{ColumnFlags, ColumnType};
use crate::protocol::column::ColumnDefinition;

/// Metadata for one column of a result set.
#[derive(Debug, Clone)]
pub struct MySqlColumn {
    pub(crate) ordinal: usize,
    pub(crate) name: String,
    pub(crate) ty: ColumnType,
    pub(crate) flags: ColumnFlags,
    pub(crate) charset: u16,
    pub(crate) max_size: u32,
    pub(crate) decimals: u8,
}

impl MySqlColumn {
    pub(crate) fn from_def(ordinal: usize, def: &ColumnDefinition) -> Self {
        Self {
            ordinal,
            name: def.alias.clone(),
            ty: def.ty,
            flags: def.flags,
            charset: def.charset,
            max_size: def.max_size,
            decimals: def.decimals,
        }
    }

    /// The zero-based position of this column in the row.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The column name, as aliased by the query.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire type of the column.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.ty
    }

    /// The column definition flags.
    #[must_use]
    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    /// The collation id of the column, `63` for binary data.
    #[must_use]
    pub fn charset(&self) -> u16 {
        self.charset
    }

    /// Digits after the decimal point for numeric columns.
    #[must_use]
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED)
    }

    /// `true` when this column is `TINYINT(1)`, which MySQL uses for
    /// `BOOLEAN`.
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        self.ty == ColumnType::Tiny && self.max_size == 1
    }
}
