//! Error types for the XML crate.

use thiserror::Error;

/// Result type for XML operations.
pub type XmlResult<T> = Result<T, XmlError>;

/// Errors that can occur while parsing a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The input contained no markup at all.
    #[error("document is empty")]
    EmptyDocument,

    /// Input ended in the middle of a construct.
    #[error("unexpected end of input while reading {expected}")]
    UnexpectedEof {
        /// What the parser was reading.
        expected: &'static str,
    },

    /// Generic syntax error.
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset into the input.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// A closing tag does not match the open element.
    #[error("mismatched closing tag at byte {position}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        /// Name of the element that is open.
        expected: String,
        /// Name found in the closing tag.
        found: String,
        /// Byte offset of the closing tag.
        position: usize,
    },

    /// An entity reference that is neither predefined nor numeric.
    #[error("unknown entity &{entity}; at byte {position}")]
    UnknownEntity {
        /// Entity name without `&` and `;`.
        entity: String,
        /// Byte offset of the reference.
        position: usize,
    },

    /// The same attribute appears twice on one element.
    #[error("duplicate attribute {name} on element {element}")]
    DuplicateAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        name: String,
    },

    /// Nesting exceeded the parser limit.
    #[error("document nesting exceeds {limit} levels")]
    TooDeep {
        /// Maximum supported depth.
        limit: usize,
    },
}

impl XmlError {
    /// Creates a syntax error.
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}
