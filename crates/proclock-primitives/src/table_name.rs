//! Table name (`namespace:qualifier`)

use crate::{DEFAULT_NAMESPACE, SYSTEM_NAMESPACE};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Table name parsing error
#[derive(Debug, Error)]
pub enum TableNameError {
    /// Namespace part is empty
    #[error("empty namespace in table name {0:?}")]
    EmptyNamespace(String),
    /// Qualifier part is empty
    #[error("empty qualifier in table name {0:?}")]
    EmptyQualifier(String),
    /// Illegal character
    #[error("illegal character {ch:?} in {name:?}")]
    IllegalCharacter {
        /// Offending name part
        name: String,
        /// First illegal character
        ch: char,
    },
}

/// Fully qualified table name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    namespace: String,
    qualifier: String,
}

impl TableName {
    /// Qualifier of the system table that stores namespace descriptors
    pub const NAMESPACE_QUALIFIER: &'static str = "namespace";

    /// Create a table name from namespace and qualifier
    pub fn new(namespace: &str, qualifier: &str) -> Result<Self, TableNameError> {
        let full = format!("{}:{}", namespace, qualifier);
        if namespace.is_empty() {
            return Err(TableNameError::EmptyNamespace(full));
        }
        if qualifier.is_empty() {
            return Err(TableNameError::EmptyQualifier(full));
        }
        check_legal(namespace)?;
        check_legal(qualifier)?;
        Ok(Self {
            namespace: namespace.to_string(),
            qualifier: qualifier.to_string(),
        })
    }

    /// Parse `namespace:qualifier`, or a bare qualifier in the default namespace
    pub fn parse(s: &str) -> Result<Self, TableNameError> {
        match s.split_once(':') {
            Some((namespace, qualifier)) => Self::new(namespace, qualifier),
            None => Self::new(DEFAULT_NAMESPACE, s),
        }
    }

    /// The `hbase:namespace` system table
    pub fn namespace_table() -> Self {
        Self {
            namespace: SYSTEM_NAMESPACE.to_string(),
            qualifier: Self::NAMESPACE_QUALIFIER.to_string(),
        }
    }

    /// Namespace part
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Qualifier part
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Whether the table lives in the system namespace
    pub fn is_system_table(&self) -> bool {
        self.namespace == SYSTEM_NAMESPACE
    }
}

fn check_legal(part: &str) -> Result<(), TableNameError> {
    match part
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        Some(ch) => Err(TableNameError::IllegalCharacter {
            name: part.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.qualifier)
    }
}

impl FromStr for TableName {
    type Err = TableNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for TableName {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for TableName {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            TableName::parse(&s).map_err(de::Error::custom)
        }
    }
}
