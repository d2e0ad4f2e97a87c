use std::fmt;

/// Declared SQL type of a bound parameter.
///
/// The integer codes match the JDBC `java.sql.Types` constants so that type
/// tags coming from configuration files or other tooling can be reused as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Null,
    Other,
    Blob,
    Clob,
    Boolean,
    NChar,
    NVarChar,
    LongNVarChar,
    NClob,
    TimeWithTimezone,
    TimestampWithTimezone,
}

impl SqlType {
    const ALL: [SqlType; 30] = [
        SqlType::Bit,
        SqlType::TinyInt,
        SqlType::SmallInt,
        SqlType::Integer,
        SqlType::BigInt,
        SqlType::Float,
        SqlType::Real,
        SqlType::Double,
        SqlType::Numeric,
        SqlType::Decimal,
        SqlType::Char,
        SqlType::VarChar,
        SqlType::LongVarChar,
        SqlType::Date,
        SqlType::Time,
        SqlType::Timestamp,
        SqlType::Binary,
        SqlType::VarBinary,
        SqlType::LongVarBinary,
        SqlType::Null,
        SqlType::Other,
        SqlType::Blob,
        SqlType::Clob,
        SqlType::Boolean,
        SqlType::NChar,
        SqlType::NVarChar,
        SqlType::LongNVarChar,
        SqlType::NClob,
        SqlType::TimeWithTimezone,
        SqlType::TimestampWithTimezone,
    ];

    /// Every known type tag.
    pub fn all() -> &'static [SqlType] {
        &Self::ALL
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::Bit => -7,
            Self::TinyInt => -6,
            Self::SmallInt => 5,
            Self::Integer => 4,
            Self::BigInt => -5,
            Self::Float => 6,
            Self::Real => 7,
            Self::Double => 8,
            Self::Numeric => 2,
            Self::Decimal => 3,
            Self::Char => 1,
            Self::VarChar => 12,
            Self::LongVarChar => -1,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::Binary => -2,
            Self::VarBinary => -3,
            Self::LongVarBinary => -4,
            Self::Null => 0,
            Self::Other => 1111,
            Self::Blob => 2004,
            Self::Clob => 2005,
            Self::Boolean => 16,
            Self::NChar => -15,
            Self::NVarChar => -9,
            Self::LongNVarChar => -16,
            Self::NClob => 2011,
            Self::TimeWithTimezone => 2013,
            Self::TimestampWithTimezone => 2014,
        }
    }

    pub fn from_code(code: i32) -> Option<SqlType> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Types bound as national (NCHAR-family) strings.
    pub const fn is_national(self) -> bool {
        matches!(
            self,
            Self::NChar | Self::NVarChar | Self::LongNVarChar | Self::NClob
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bit => "BIT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Numeric => "NUMERIC",
            Self::Decimal => "DECIMAL",
            Self::Char => "CHAR",
            Self::VarChar => "VARCHAR",
            Self::LongVarChar => "LONGVARCHAR",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Binary => "BINARY",
            Self::VarBinary => "VARBINARY",
            Self::LongVarBinary => "LONGVARBINARY",
            Self::Null => "NULL",
            Self::Other => "OTHER",
            Self::Blob => "BLOB",
            Self::Clob => "CLOB",
            Self::Boolean => "BOOLEAN",
            Self::NChar => "NCHAR",
            Self::NVarChar => "NVARCHAR",
            Self::LongNVarChar => "LONGNVARCHAR",
            Self::NClob => "NCLOB",
            Self::TimeWithTimezone => "TIME WITH TIME ZONE",
            Self::TimestampWithTimezone => "TIMESTAMP WITH TIME ZONE",
        };
        f.write_str(name)
    }
}
