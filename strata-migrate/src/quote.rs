//! Identifier and literal quoting.
//!
//! Every schema object name that ends up in a generated statement goes
//! through this module.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Maximum identifier length in bytes (PostgreSQL `NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// The name of a schema object (table, column, constraint, index).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Create an identifier. Validation happens at registration time.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw, unquoted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that this name can be embedded safely in a statement.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.0.is_empty() {
            return Err(MigrationError::invalid_identifier(
                self.0.as_str(),
                "identifier is empty",
            ));
        }
        if self.0.len() > MAX_IDENTIFIER_LEN {
            return Err(MigrationError::invalid_identifier(
                self.0.as_str(),
                "identifier exceeds 63 bytes",
            ));
        }
        if self.0.contains('\0') {
            return Err(MigrationError::invalid_identifier(
                self.0.as_str(),
                "identifier contains a NUL byte",
            ));
        }
        Ok(())
    }

    /// Derive a constraint name the way PostgreSQL names implicit
    /// constraints, e.g. `accounts` + `pkey` → `accounts_pkey`.
    ///
    /// The table part is truncated so the result fits in
    /// [`MAX_IDENTIFIER_LEN`], matching what the server stores.
    pub fn derived(&self, suffix: &str) -> Identifier {
        let budget = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len() + 1);
        let mut end = self.0.len().min(budget);
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        Identifier(format!("{}_{}", &self.0[..end], suffix))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quote a string literal for PostgreSQL, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("userapi_accounts"), "\"userapi_accounts\"");
        assert_eq!(quote_identifier("user"), "\"user\"");
        assert_eq!(quote_identifier("has\"quote"), "\"has\"\"quote\"");
        assert_eq!(
            quote_identifier("x\"; DROP TABLE t; --"),
            "\"x\"\"; DROP TABLE t; --\""
        );
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal(""), "''");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_validate() {
        assert!(Identifier::new("account_data").validate().is_ok());
        assert!(Identifier::new("").validate().is_err());
        assert!(Identifier::new("a\0b").validate().is_err());
        assert!(Identifier::new("x".repeat(64)).validate().is_err());
        assert!(Identifier::new("x".repeat(63)).validate().is_ok());
    }

    #[test]
    fn test_derived_name() {
        assert_eq!(
            Identifier::new("account_accounts").derived("pkey").as_str(),
            "account_accounts_pkey"
        );

        let long = Identifier::new("t".repeat(70));
        let derived = long.derived("pkey");
        assert_eq!(derived.as_str().len(), MAX_IDENTIFIER_LEN);
        assert!(derived.as_str().ends_with("_pkey"));
    }

    #[test]
    fn test_derived_name_respects_char_boundaries() {
        let name = Identifier::new("é".repeat(40));
        let derived = name.derived("pkey");
        assert!(derived.as_str().len() <= MAX_IDENTIFIER_LEN);
        assert!(derived.validate().is_ok());
    }
}
