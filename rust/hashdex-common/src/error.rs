use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_format(name: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: name.into(),
                message: Default::default(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    /// No codec could be resolved or derived for the named type.
    pub fn unsupported_type(type_name: impl Into<String>) -> Error {
        Error(
            ErrorKind::UnsupportedType {
                type_name: type_name.into(),
            }
            .into(),
        )
    }

    /// The index cannot serve the query shape; the planner should pick another strategy.
    pub fn unsupported_query(query: impl Into<String>) -> Error {
        Error(
            ErrorKind::UnsupportedQuery {
                query: query.into(),
            }
            .into(),
        )
    }

    pub fn missing_content(map: impl Into<String>, digest: &[u8]) -> Error {
        Error(
            ErrorKind::MissingContent {
                map: map.into(),
                digest: to_hex(digest),
            }
            .into(),
        )
    }

    pub fn codec<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Codec {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` when this error tells the planner to fall back to another index.
    pub fn is_unsupported_query(&self) -> bool {
        matches!(self.kind(), ErrorKind::UnsupportedQuery { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("no codec available for type '{type_name}'")]
    UnsupportedType { type_name: String },

    #[error("unsupported query: {query}")]
    UnsupportedQuery { query: String },

    #[error("content map '{map}' has no entry for digest {digest}")]
    MissingContent { map: String, digest: String },

    #[error("codec error: {context}")]
    Codec {
        context: String,
        source: StdErrorBoxed,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

/// Lowercase hex rendering of a digest, used in error messages and logs.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_query_kind() {
        let err = Error::unsupported_query("LessThan(age, 5)");
        assert!(err.is_unsupported_query());
        assert_eq!(err.to_string(), "unsupported query: LessThan(age, 5)");
        assert!(!Error::invalid_operation("x").is_unsupported_query());
    }

    #[test]
    fn test_missing_content_renders_hex() {
        let err = Error::missing_content("index_objhash_name", &[0x0a, 0xff, 0x00]);
        match err.into_kind() {
            ErrorKind::MissingContent { map, digest } => {
                assert_eq!(map, "index_objhash_name");
                assert_eq!(digest, "0aff00");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
