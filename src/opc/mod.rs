//! Open Packaging Conventions layer: the package store, relationship
//! tables and the content-type registry.
//!
//! This layer knows nothing about placeholders; it loads a container's
//! parts into an addressable in-memory map, tracks which parts were touched
//! and serializes the result back to container bytes.

pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod rel;

pub use content_types::{ContentTypes, SLIDE_CONTENT_TYPE};
pub use error::{OpcError, Result};
pub use package::Package;
pub use packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
pub use rel::{IMAGE_RELTYPE, Relationship, Relationships};
