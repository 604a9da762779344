//! # Sylva XML
//!
//! Document parsing and writing for Sylva.
//!
//! This crate is the document layer of the store:
//! - [`parse`] turns a serialized payload into an [`XmlDocument`] tree that
//!   the engine shreds into nodes
//! - [`XmlWriter`] streams well-formed, escaped XML and is what the engine's
//!   serializer writes through
//!
//! ## Usage
//!
//! ```
//! use sylva_xml::parse;
//!
//! let doc = parse("<a><b/></a>").unwrap();
//! assert_eq!(doc.root().name, "a");
//! assert_eq!(doc.to_xml_string(), "<a><b/></a>");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod parser;
mod writer;

pub use document::{Attribute, XmlDocument, XmlElement, XmlNode};
pub use error::{XmlError, XmlResult};
pub use parser::{parse, Parser, MAX_DEPTH};
pub use writer::{escape_attribute, escape_text, XmlWriter};
