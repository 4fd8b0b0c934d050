/// Error types for OPC package operations.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("part not found: {0}")]
    PartNotFound(String),

    #[error("content type not found for partname: {0}")]
    ContentTypeNotFound(String),

    #[error("invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("relationship id conflict: {0}")]
    RelationshipConflict(String),

    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for OpcError {
    fn from(err: quick_xml::Error) -> Self {
        OpcError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::Xml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
