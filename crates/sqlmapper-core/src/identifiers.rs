//! SQL identifier quoting and validation.
//!
//! Table and column names reach SQL text in two ways: from entity metadata
//! (checked once at registration) and from string-keyed wrappers (checked
//! every time a statement is rendered). Both go through
//! [`is_valid_identifier`] before being quoted.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, QueryErrorKind, Result};

/// Plain or schema-qualified identifier: `users`, `main.users`, `_tmp1`.
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$";

fn identifier_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| match Regex::new(IDENTIFIER_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern = IDENTIFIER_PATTERN, error = %e, "Invalid identifier pattern");
                None
            }
        })
        .as_ref()
}

/// Check whether `name` is a safe, unquoted-style SQL identifier.
///
/// ```
/// use sqlmapper_core::is_valid_identifier;
///
/// assert!(is_valid_identifier("user_name"));
/// assert!(is_valid_identifier("main.users"));
/// assert!(!is_valid_identifier("name; DROP TABLE users"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(name))
}

/// Reject a column name supplied at runtime.
///
/// Used by statement rendering for string-keyed wrappers; the error carries
/// the offending name so callers can see which condition was malformed.
pub fn check_column(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::query(
            QueryErrorKind::Syntax,
            None,
            format!("invalid column name '{name}'"),
        ))
    }
}

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
/// A qualified name (`schema.table`) is quoted part by part.
///
/// ```
/// use sqlmapper_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("main.users"), "\"main\".\"users\"");
/// ```
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a SQL identifier using MySQL backtick quoting.
pub fn quote_ident_mysql(name: &str) -> String {
    name.split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["users", "user_name", "_tmp", "t1", "main.users"] {
            assert!(is_valid_identifier(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in [
            "",
            "1abc",
            "user name",
            "a;b",
            "users\"; DROP TABLE secrets; --",
            "a.b.c",
            "name)",
            "age >",
        ] {
            assert!(!is_valid_identifier(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_check_column_reports_name() {
        assert!(check_column("age").is_ok());
        let err = check_column("age or 1=1").unwrap_err();
        assert!(err.to_string().contains("age or 1=1"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
        assert_eq!(quote_ident("main.users"), "\"main\".\"users\"");
    }

    #[test]
    fn test_quote_ident_mysql() {
        assert_eq!(quote_ident_mysql("users"), "`users`");
        assert_eq!(quote_ident_mysql("user`name"), "`user``name`");
    }
}
