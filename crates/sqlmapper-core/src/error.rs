//! Error types for SQLMapper operations.

use std::fmt;

/// The primary error type for all SQLMapper operations.
#[derive(Debug)]
pub enum Error {
    /// The entity type has no registered table mapping
    Metadata(MetadataError),
    /// The mapper identifier does not resolve to a usable mapper
    MapperBind(MapperBindError),
    /// Caller input violated an operation's contract
    Precondition(PreconditionError),
    /// Connection-related errors (open, close, lost)
    Connection(ConnectionError),
    /// Query execution errors
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Configuration errors
    Config(ConfigError),
    /// Custom error with message
    Custom(String),
}

/// Raised when an entity type was never registered with the metadata registry.
#[derive(Debug, Clone)]
pub struct MetadataError {
    /// Rust type name of the entity
    pub entity: &'static str,
}

/// Raised when a mapper cannot be bound for an entity.
#[derive(Debug, Clone)]
pub struct MapperBindError {
    /// Rust type name of the entity
    pub entity: &'static str,
    /// Mapper identifier taken from the table metadata
    pub mapper_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PreconditionError {
    pub kind: PreconditionKind,
    /// Façade operation that rejected the input
    pub operation: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionKind {
    /// A collection argument was empty
    EmptyCollection,
    /// The entity's primary key is unset where one is required
    MissingPrimaryKey,
    /// Batch size of zero
    InvalidBatchSize,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open a session or connection
    Connect,
    /// Failed to close a session
    Close,
    /// No data source registered under the requested key
    UnknownDataSource,
    /// Connection lost during operation
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL or an invalid identifier
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// More rows than the operation allows
    TooManyRows,
    /// Database is busy or locked
    Busy,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Build a metadata-not-found error for `entity`.
    pub fn metadata_not_found(entity: &'static str) -> Self {
        Error::Metadata(MetadataError { entity })
    }

    /// Build a mapper bind error.
    pub fn mapper_bind(
        entity: &'static str,
        mapper_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::MapperBind(MapperBindError {
            entity,
            mapper_id: mapper_id.into(),
            message: message.into(),
        })
    }

    /// Build a precondition error.
    pub fn precondition(
        kind: PreconditionKind,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Error::Precondition(PreconditionError {
            kind,
            operation,
            message: message.into(),
        })
    }

    /// Build a query error without a source.
    pub fn query(kind: QueryErrorKind, sql: Option<&str>, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql: sql.map(str::to_string),
            message: message.into(),
            source: None,
        })
    }

    /// Build a configuration error without a source.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Is this a missing table mapping?
    pub fn is_metadata_not_found(&self) -> bool {
        matches!(self, Error::Metadata(_))
    }

    /// Is this a mapper binding failure?
    pub fn is_mapper_bind(&self) -> bool {
        matches!(self, Error::MapperBind(_))
    }

    /// The precondition kind, if this is a caller-input violation.
    pub fn precondition_kind(&self) -> Option<PreconditionKind> {
        match self {
            Error::Precondition(p) => Some(p.kind),
            _ => None,
        }
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Metadata(e) => write!(f, "Metadata error: {}", e),
            Error::MapperBind(e) => write!(f, "Mapper bind error: {}", e),
            Error::Precondition(e) => write!(f, "Precondition failed: {}", e),
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "can not find table metadata for entity \"{}\"", self.entity)
    }
}

impl fmt::Display for MapperBindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mapper '{}' for entity \"{}\": {}",
            self.mapper_id, self.entity, self.message
        )
    }
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PreconditionKind::EmptyCollection => "empty collection",
            PreconditionKind::MissingPrimaryKey => "missing primary key",
            PreconditionKind::InvalidBatchSize => "invalid batch size",
        };
        write!(f, "{} in {}: {}", kind, self.operation, self.message)
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(ConfigError {
            message: format!("invalid configuration document: {err}"),
            source: Some(Box::new(err)),
        })
    }
}

/// Result type alias for SQLMapper operations.
pub type Result<T> = std::result::Result<T, Error>;
