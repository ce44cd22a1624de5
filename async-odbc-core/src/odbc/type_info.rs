//! Column type information.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Category of a column or value as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Unknown,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Varchar,
    Binary,
    Date,
    Time,
    Timestamp,
    Other,
}

impl DataType {
    /// Map a declared SQL type name (`VARCHAR(10)`, `BIGINT`, ...) to a category.
    ///
    /// Names nothing else matches fall back to SQLite's affinity rules.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        let base = upper
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "" => DataType::Unknown,
            "BIT" | "BOOL" | "BOOLEAN" => DataType::Bit,
            "TINYINT" => DataType::TinyInt,
            "SMALLINT" | "INT2" => DataType::SmallInt,
            "INT" | "INTEGER" | "MEDIUMINT" | "INT4" => DataType::Integer,
            "BIGINT" | "INT8" => DataType::BigInt,
            "REAL" | "FLOAT4" => DataType::Real,
            "DOUBLE" | "FLOAT" | "FLOAT8" => DataType::Double,
            "DATE" => DataType::Date,
            "TIME" => DataType::Time,
            "DATETIME" | "TIMESTAMP" | "DATETIME2" => DataType::Timestamp,
            "BLOB" | "BINARY" | "VARBINARY" | "BYTEA" => DataType::Binary,
            _ if upper.contains("INT") => DataType::BigInt,
            _ if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") => {
                DataType::Varchar
            }
            _ if upper.contains("BLOB") => DataType::Binary,
            _ if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") => {
                DataType::Double
            }
            _ => DataType::Other,
        }
    }

    /// Check if this is a character/string type
    pub fn accepts_character_data(self) -> bool {
        matches!(self, DataType::Varchar)
    }

    /// Check if this is a binary type
    pub fn accepts_binary_data(self) -> bool {
        matches!(self, DataType::Binary)
    }

    /// Check if this is a numeric type
    pub fn accepts_numeric_data(self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::Integer
                | DataType::BigInt
                | DataType::Real
                | DataType::Double
        )
    }

    /// Check if this is a date/time type
    pub fn accepts_datetime_data(self) -> bool {
        matches!(self, DataType::Date | DataType::Time | DataType::Timestamp)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Unknown => "UNKNOWN",
            DataType::Bit => "BIT",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Real => "REAL",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Binary => "BINARY",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Other => "OTHER",
        }
    }
}

/// Type information for a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeInfo {
    pub(crate) data_type: DataType,
    pub(crate) declared: Option<String>,
}

impl TypeInfo {
    pub const fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            declared: None,
        }
    }

    /// Type information for a column with a declared SQL type.
    pub fn declared(declared: impl Into<String>) -> Self {
        let declared = declared.into();
        Self {
            data_type: DataType::from_declared(&declared),
            declared: Some(declared),
        }
    }

    pub const fn unknown() -> Self {
        Self::new(DataType::Unknown)
    }

    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The type name as declared in the schema, if the driver reported one.
    pub fn declared_name(&self) -> Option<&str> {
        self.declared.as_deref()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data_type, DataType::Unknown)
    }

    pub fn name(&self) -> &str {
        self.declared
            .as_deref()
            .unwrap_or_else(|| self.data_type.name())
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.pad(self.name())
    }
}
