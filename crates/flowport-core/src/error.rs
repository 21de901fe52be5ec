//! Error types for flowport-core

use thiserror::Error;

/// Result type alias for flowport-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in flowport-core
///
/// Everything except [`Error::Io`] and the configuration variants is a parse
/// error: the workflow document could not be turned into a [`crate::Workflow`].
#[derive(Error, Debug)]
pub enum Error {
    /// The document is not well-formed markup
    #[error("malformed workflow document: {message}")]
    Xml {
        /// Description from the XML reader
        message: String,
    },

    /// A mandatory structural element is missing
    #[error("workflow document is missing required element <{element}>")]
    MissingElement {
        /// Element name
        element: String,
    },

    /// A mandatory attribute is missing
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Element carrying the attribute
        element: String,
        /// Attribute name
        attribute: String,
    },

    /// A tool id is not a non-negative integer
    #[error("invalid tool id '{value}'")]
    InvalidToolId {
        /// Raw attribute value
        value: String,
    },

    /// Two tools share the same id
    #[error("duplicate tool id {id}")]
    DuplicateToolId {
        /// The repeated id
        id: u32,
    },

    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the workflow document itself is unusable
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Xml { .. }
                | Self::MissingElement { .. }
                | Self::MissingAttribute { .. }
                | Self::InvalidToolId { .. }
                | Self::DuplicateToolId { .. }
        )
    }

    pub(crate) fn xml(message: impl ToString) -> Self {
        Self::Xml {
            message: message.to_string(),
        }
    }
}
