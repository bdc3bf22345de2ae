use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::error::{StoreError, StoreResult};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 32-bit integer (lifetimes, enum codes).
    Integer,
    /// 64-bit integer (surrogate and foreign keys).
    BigInt,
    Boolean,
    /// Text, bounded by `max_length` when set.
    Text,
    /// Timestamp with time zone.
    Timestamp,
}

/// Column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    /// Maximum length in characters. Only meaningful for text.
    pub max_length: Option<usize>,
    pub nullable: bool,
}

impl ColumnDef {
    /// Non-null text column with a length limit.
    #[must_use]
    pub const fn text(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            column_type: ColumnType::Text,
            max_length: Some(max_length),
            nullable: false,
        }
    }

    /// Non-null text column without a length limit.
    #[must_use]
    pub const fn unbounded_text(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Text,
            max_length: None,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Integer,
            max_length: None,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn big_int(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::BigInt,
            max_length: None,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Boolean,
            max_length: None,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            column_type: ColumnType::Timestamp,
            max_length: None,
            nullable: false,
        }
    }

    /// Marks the column nullable.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

// =============================================================================
// Values
// =============================================================================

/// Single stored value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
    Timestamp(OffsetDateTime),
}

impl ColumnValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the value can be stored in a column of `column_type`.
    /// `Null` fits every type; nullability is checked separately.
    #[must_use]
    pub fn fits(&self, column_type: ColumnType) -> bool {
        match (self, column_type) {
            (Self::Null, _) => true,
            (Self::Int(v), ColumnType::Integer) => i32::try_from(*v).is_ok(),
            (Self::Int(_), ColumnType::BigInt)
            | (Self::Bool(_), ColumnType::Boolean)
            | (Self::Text(_), ColumnType::Text)
            | (Self::Timestamp(_), ColumnType::Timestamp) => true,
            _ => false,
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<OffsetDateTime> for ColumnValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Rows
// =============================================================================

/// Column values of one entity, excluding its generated key and foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row(BTreeMap<&'static str, ColumnValue>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, builder style.
    #[must_use]
    pub fn with(mut self, column: &'static str, value: impl Into<ColumnValue>) -> Self {
        self.0.insert(column, value.into());
        self
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<ColumnValue>) {
        self.0.insert(column, value.into());
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.0.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ColumnValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Columns whose value differs from `previous`, with their new values.
    #[must_use]
    pub fn changed_from(&self, previous: &Row) -> Row {
        Row(self
            .0
            .iter()
            .filter(|(column, value)| previous.0.get(*column) != Some(*value))
            .map(|(column, value)| (*column, value.clone()))
            .collect())
    }

    /// Keeps only the listed columns.
    #[must_use]
    pub fn project(&self, columns: &[&'static str]) -> Row {
        Row(columns
            .iter()
            .filter_map(|c| self.0.get(c).map(|v| (*c, v.clone())))
            .collect())
    }

    /// Overwrites the columns present in `changes`.
    pub fn apply(&mut self, changes: &Row) {
        for (column, value) in &changes.0 {
            self.0.insert(*column, value.clone());
        }
    }

    // -------------------------------------------------------------------------
    // Typed getters
    // -------------------------------------------------------------------------

    fn required(&self, column: &str) -> StoreResult<&ColumnValue> {
        self.0
            .get(column)
            .ok_or_else(|| StoreError::database(format!("column '{column}' missing from row")))
    }

    fn mismatch(column: &str, expected: &str, found: &ColumnValue) -> StoreError {
        StoreError::database(format!(
            "column '{column}': expected {expected}, found {}",
            found.type_label()
        ))
    }

    /// # Errors
    /// Fails if the column is missing, null or not text.
    pub fn text(&self, column: &str) -> StoreResult<String> {
        match self.required(column)? {
            ColumnValue::Text(v) => Ok(v.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    /// # Errors
    /// Fails if the column is present with a non-text value.
    pub fn opt_text(&self, column: &str) -> StoreResult<Option<String>> {
        match self.0.get(column) {
            None | Some(ColumnValue::Null) => Ok(None),
            Some(ColumnValue::Text(v)) => Ok(Some(v.clone())),
            Some(other) => Err(Self::mismatch(column, "text", other)),
        }
    }

    /// # Errors
    /// Fails if the column is missing, null or not a boolean.
    pub fn boolean(&self, column: &str) -> StoreResult<bool> {
        match self.required(column)? {
            ColumnValue::Bool(v) => Ok(*v),
            other => Err(Self::mismatch(column, "boolean", other)),
        }
    }

    /// # Errors
    /// Fails if the column is missing, null or outside the `i32` range.
    pub fn int(&self, column: &str) -> StoreResult<i32> {
        match self.required(column)? {
            ColumnValue::Int(v) => i32::try_from(*v)
                .map_err(|_| StoreError::database(format!("column '{column}': {v} out of range"))),
            other => Err(Self::mismatch(column, "integer", other)),
        }
    }

    /// # Errors
    /// Fails if the column holds a non-integer or out-of-range value.
    pub fn opt_int(&self, column: &str) -> StoreResult<Option<i32>> {
        match self.0.get(column) {
            None | Some(ColumnValue::Null) => Ok(None),
            Some(_) => self.int(column).map(Some),
        }
    }

    /// # Errors
    /// Fails if the column is missing, null or not an integer.
    pub fn big_int(&self, column: &str) -> StoreResult<i64> {
        match self.required(column)? {
            ColumnValue::Int(v) => Ok(*v),
            other => Err(Self::mismatch(column, "integer", other)),
        }
    }

    /// # Errors
    /// Fails if the column is missing, null or not a timestamp.
    pub fn timestamp(&self, column: &str) -> StoreResult<OffsetDateTime> {
        match self.required(column)? {
            ColumnValue::Timestamp(v) => Ok(*v),
            other => Err(Self::mismatch(column, "timestamp", other)),
        }
    }

    /// # Errors
    /// Fails if the column holds a non-timestamp value.
    pub fn opt_timestamp(&self, column: &str) -> StoreResult<Option<OffsetDateTime>> {
        match self.0.get(column) {
            None | Some(ColumnValue::Null) => Ok(None),
            Some(ColumnValue::Timestamp(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::mismatch(column, "timestamp", other)),
        }
    }
}

impl FromIterator<(&'static str, ColumnValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (&'static str, ColumnValue)>>(iter: I) -> Self {
        Row(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_conversion() {
        assert_eq!(ColumnValue::from(None::<String>), ColumnValue::Null);
        assert_eq!(
            ColumnValue::from(Some("x")),
            ColumnValue::Text("x".to_string())
        );
        assert_eq!(ColumnValue::from(Some(5_i32)), ColumnValue::Int(5));
    }

    #[test]
    fn test_fits() {
        assert!(ColumnValue::Int(5).fits(ColumnType::Integer));
        assert!(!ColumnValue::Int(i64::MAX).fits(ColumnType::Integer));
        assert!(ColumnValue::Int(i64::MAX).fits(ColumnType::BigInt));
        assert!(ColumnValue::Null.fits(ColumnType::Timestamp));
        assert!(!ColumnValue::Bool(true).fits(ColumnType::Text));
    }

    #[test]
    fn test_changed_from() {
        let before = Row::new().with("A", "x").with("B", 1_i32).with("C", true);
        let after = Row::new().with("A", "x").with("B", 2_i32).with("C", true);

        let changed = after.changed_from(&before);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed.get("B"), Some(&ColumnValue::Int(2)));
        assert!(before.changed_from(&before).is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let row = Row::new()
            .with("Name", "web")
            .with("Count", 3_i32)
            .with("Flag", false)
            .with("Missing", None::<String>);

        assert_eq!(row.text("Name").unwrap(), "web");
        assert_eq!(row.int("Count").unwrap(), 3);
        assert!(!row.boolean("Flag").unwrap());
        assert_eq!(row.opt_text("Missing").unwrap(), None);
        assert_eq!(row.opt_text("Absent").unwrap(), None);
        assert!(row.text("Count").is_err());
        assert!(row.text("Absent").is_err());
    }

    #[test]
    fn test_apply_and_project() {
        let mut row = Row::new().with("A", "x").with("B", "y");
        row.apply(&Row::new().with("B", "z"));
        assert_eq!(row.text("B").unwrap(), "z");
        assert_eq!(row.project(&["A"]), Row::new().with("A", "x"));
    }
}
