use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Mapping
    MissingIdentity,
    InvalidIdentity,
    NullUniqueIndex,
    DuplicateUniqueValue,
    UniqueMultipleValues,
    // Parsing
    Parse,
    UnsupportedExpression,
    // Compilation
    SchemaMismatch,
    // Storage
    Storage,
    Serialization,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn missing_identity(structure: &str) -> Self {
        Error::new(
            ErrorKind::MissingIdentity,
            format!("Structure '{}' has no assigned identity", structure),
        )
    }

    pub fn null_unique(structure: &str, path: &str) -> Self {
        Error::new(
            ErrorKind::NullUniqueIndex,
            format!("Unique member '{}' of '{}' yielded no value", path, structure),
        )
    }

    pub fn unsupported(expression: impl fmt::Display, reason: &str) -> Self {
        Error::new(
            ErrorKind::UnsupportedExpression,
            format!("{}: '{}'", reason, expression),
        )
    }

    pub fn schema_mismatch(structure: &str, path: &str) -> Self {
        Error::new(
            ErrorKind::SchemaMismatch,
            format!("Member '{}' is not indexed by structure '{}'", path, structure),
        )
    }

    pub fn storage(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Storage, context.into())
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Serialization,
            context: err.to_string(),
        }
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        let context = match err {
            nom::Err::Incomplete(_) => "Unexpected end of expression".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("Unexpected input at '{}'", e.input)
            }
        };
        Error {
            kind: ErrorKind::Parse,
            context,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
