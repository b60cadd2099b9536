//! SQLite driver for sqlmapper.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Provides a blocking [`SqliteConnection`] implementing the `Connection`
//! trait from sqlmapper-core, and a [`SqliteSessionProvider`] that opens one
//! connection per façade session.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlmapper_sqlite::{SqliteConfig, SqliteSessionProvider};
//!
//! let provider = SqliteSessionProvider::new()
//!     .data_source("default", SqliteConfig::shared_memory("app"))?;
//! provider.execute_script("default", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! ```
//!
//! # Type Mapping
//!
//! | `Value` | SQLite storage |
//! |-----------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Json` | TEXT |
//! | `Null` | NULL |

pub mod connection;
pub mod ffi;
pub mod session;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use session::{SqliteSession, SqliteSessionProvider};

/// The linked SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_version() {
        let version = sqlite_version();
        assert!(
            version.starts_with('3'),
            "Expected SQLite 3.x, got {}",
            version
        );
    }
}
