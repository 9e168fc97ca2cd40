//! Error types for SQLORM operations.
//!
//! Every fallible operation in the workspace returns [`Result`]. The variants
//! follow the lifecycle of a statement: configuration and connection errors
//! surface when a datasource is built, [`SqlError`] while a statement is
//! composed, [`ValidationError`] and [`ConversionError`] when a mapped
//! attribute is assigned, and [`QueryError`] once the backend has seen the SQL.

use std::fmt;

use thiserror::Error;

/// The primary error type for all SQLORM operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure (connect, lost connection, closed handle)
    #[error(transparent)]
    Connection(ConnectionError),

    /// Failure reported by the backend while executing a statement
    #[error(transparent)]
    Query(QueryError),

    /// Malformed statement composition, raised before any backend call
    #[error(transparent)]
    Sql(SqlError),

    /// A validator rejected an attribute value
    #[error(transparent)]
    Validation(ValidationError),

    /// A value could not be converted to an attribute's native type
    #[error(transparent)]
    Conversion(ConversionError),

    /// Connection string could not be parsed
    #[error("Illegal connection string: {0}")]
    IllegalConnectionString(String),

    /// Connection string names an adapter that does not exist
    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),

    /// `pool=` was given for an adapter without pooling support
    #[error("No pool module for this adapter: {0}")]
    NoPoolForAdapter(String),

    /// Attribute lookup on a mapped class failed
    #[error("{class} has no attribute or column named {attribute}")]
    NoSuchAttribute { class: String, attribute: String },

    /// A key-dependent operation was attempted on a class without a primary key
    #[error("{0} has no primary key")]
    NoPrimaryKey(String),

    /// At least one key column of an object is unset
    #[error("Key ( {key} ) of {class} is not set")]
    KeyNotSet { class: String, key: String },

    /// A primary key value tuple has the wrong number of elements
    #[error("The primary key for {class} must have {expected} elements.")]
    IllegalPrimaryKey { class: String, expected: usize },

    /// A foreign key does not line up with the key it references
    #[error("Illegal foreign key: {0}")]
    IllegalForeignKey(String),

    /// Read access to an attribute that was never assigned or retrieved
    #[error("Attribute '{attribute}' of '{class}' [ {key} ] has not yet been set")]
    AttributeNotSet {
        class: String,
        attribute: String,
        key: String,
    },

    /// Assignment to an attribute whose value belongs to the backend
    #[error("{class}.{attribute}: {message}")]
    ImmutableAttribute {
        class: String,
        attribute: String,
        message: String,
    },

    /// Insert of an object that is already stored
    #[error("This {0} object has already been inserted")]
    ObjectAlreadyInserted(String),

    /// Operation requires a stored object
    #[error("This {0} object must be inserted before this operation")]
    ObjectMustBeInserted(String),

    /// The post-insert select did not find the new row
    #[error("The {0} object was not inserted (post-insert select returned no row)")]
    ObjectWasNotInserted(String),

    /// Insert of an object with no set attributes
    #[error("Please set at least one of the attributes of this {0}")]
    DbObjContainsNoData(String),

    /// No strategy can identify the row just inserted
    #[error("Cannot determine the primary key of the {0} row just inserted")]
    PrimaryKeyNotKnown(String),

    /// Invalid class or datatype definition
    #[error("Definition error: {0}")]
    Definition(String),

    /// Unknown or untranscodable backend text encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The datasource has been closed
    #[error("Datasource is closed")]
    DatasourceClosed,

    /// Pool exhaustion or misuse
    #[error("Pool error: {0}")]
    Pool(String),

    /// JSON (de)serialization of a structured attribute failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Connection errors
// ============================================================================

/// Classification of connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Establishing the connection failed
    Connect,
    /// An established connection stopped responding
    Lost,
    /// The handle was closed by the client
    Closed,
}

/// A connection-level failure reported by a driver.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ConnectionErrorKind::Connect => "Connection failed",
            ConnectionErrorKind::Lost => "Connection lost",
            ConnectionErrorKind::Closed => "Connection closed",
        };
        write!(f, "{what}: {}", self.message)
    }
}

impl std::error::Error for ConnectionError {}

// ============================================================================
// Query errors
// ============================================================================

/// Classification of backend statement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Raw programming error as reported by a driver (syntax, constraint, ...)
    Programming,
    /// Unique constraint violation
    DuplicateKey,
    /// Any other programming error after translation by the datasource
    Backend,
}

/// A statement failure reported by the backend.
#[derive(Debug, Clone)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
}

impl QueryError {
    /// Attach the statement text that triggered this error.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QueryErrorKind::DuplicateKey => write!(f, "Duplicate key: {}", self.message)?,
            QueryErrorKind::Programming | QueryErrorKind::Backend => {
                write!(f, "Backend error: {}", self.message)?;
            }
        }
        if let Some(sql) = &self.sql {
            write!(f, " (SQL: {sql})")?;
        }
        Ok(())
    }
}

impl std::error::Error for QueryError {}

// ============================================================================
// Statement composition errors
// ============================================================================

/// Classification of statement composition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    /// Invalid clause argument such as an unknown ORDER BY direction
    Syntax,
    /// AND/OR over an empty operand list
    EmptyOperands,
    /// INSERT without rows or with a row of the wrong width
    ValueCount,
    /// Raw SQL text containing non-ASCII characters
    NonAscii,
    /// A literal cannot represent the given value
    InvalidLiteral,
}

/// A statement composition failure.
#[derive(Debug, Clone)]
pub struct SqlError {
    pub kind: SqlErrorKind,
    pub message: String,
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SQL error: {}", self.message)
    }
}

impl std::error::Error for SqlError {}

// ============================================================================
// Attribute errors
// ============================================================================

/// Which validator rejected a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    NotNull,
    NotEmpty,
    Length,
    Range,
    Pattern,
    Enum,
}

/// A validator rejected the value assigned to `class.attribute`.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub class: String,
    pub attribute: String,
    pub value: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A value of the wrong type was assigned to `class.attribute`.
#[derive(Debug, Clone)]
pub struct ConversionError {
    pub class: String,
    pub attribute: String,
    pub message: String,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.class, self.attribute, self.message)
    }
}

impl std::error::Error for ConversionError {}

// ============================================================================
// Constructors and predicates
// ============================================================================

impl Error {
    /// Create a statement composition error.
    pub fn sql(kind: SqlErrorKind, message: impl Into<String>) -> Self {
        Error::Sql(SqlError {
            kind,
            message: message.into(),
        })
    }

    /// Create a connection error.
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError {
            kind,
            message: message.into(),
        })
    }

    /// Create a raw programming error, as a driver reports it.
    pub fn programming(message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind: QueryErrorKind::Programming,
            sql: None,
            message: message.into(),
        })
    }

    /// Create a conversion error for `class.attribute`.
    pub fn conversion(
        class: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Conversion(ConversionError {
            class: class.into(),
            attribute: attribute.into(),
            message: message.into(),
        })
    }

    /// Create a definition error.
    pub fn definition(message: impl Into<String>) -> Self {
        Error::Definition(message.into())
    }

    /// True for failures that should count towards the reconnect threshold.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// True for backend programming errors, translated or not.
    pub fn is_programming(&self) -> bool {
        matches!(self, Error::Query(_))
    }

    /// True for a translated unique constraint violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            Error::Query(QueryError {
                kind: QueryErrorKind::DuplicateKey,
                ..
            })
        )
    }

    /// The SQL text attached to a query error, if any.
    pub fn sql_text(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for SQLORM operations.
pub type Result<T> = std::result::Result<T, Error>;
