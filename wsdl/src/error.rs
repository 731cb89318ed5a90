use std::fmt;

use thiserror::Error;
use url::Url;

use crate::types::NamespacedName;

/// Where a declaration or reference lives: the document it came from and the
/// byte offset of its start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub document: Url,
    pub offset: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (byte {})", self.document, self.offset)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to convert provided path")]
    PathConversionError(Option<std::io::Error>),

    #[error("Unable to build HTTP client")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Unsupported URL scheme {0}")]
    UnsupportedScheme(String),

    #[error("Unable to fetch {location}: {reason}")]
    UnreachableResource { location: Url, reason: String },

    #[error("{key} is declared twice, at {first} and at {second}")]
    DuplicateTypeDeclaration {
        key: NamespacedName,
        first: Location,
        second: Location,
    },

    #[error("Malformed document {document} at byte {offset}: {message}")]
    MalformedDocument {
        document: Url,
        offset: usize,
        message: String,
    },
}

impl Error {
    pub(crate) fn unreachable(location: &Url, reason: impl fmt::Display) -> Self {
        Self::UnreachableResource {
            location: location.clone(),
            reason: reason.to_string(),
        }
    }
}
