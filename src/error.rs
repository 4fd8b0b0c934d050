/// Error types for the rendering engine.
use crate::opc::OpcError;
use thiserror::Error;

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that abort a rendering job.
///
/// Per-occurrence problems (unmapped tokens, ambiguous classifications,
/// undecodable image assets) never surface here; they are recorded in the
/// [`RenderManifest`](crate::template::RenderManifest) and the job renders
/// best-effort.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The template container could not be decoded, or a required registry
    /// part is missing. Raised before any mutation.
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    /// A relationship id collision. Allocation is monotonic, so this is a
    /// defect in the engine, not bad input.
    #[error("relationship id conflict: {0}")]
    RelationshipConflict(String),

    /// The mutated package could not be serialized. Also a defect, not bad
    /// input.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Image asset bytes did not decode as a recognized image encoding.
    /// Fatal only to the single occurrence; the renderer catches this and
    /// falls back to removing the host shape.
    #[error("image decode failed: {0}")]
    ImageDecode(String),
}

impl From<OpcError> for RenderError {
    fn from(err: OpcError) -> Self {
        match err {
            OpcError::RelationshipConflict(id) => RenderError::RelationshipConflict(id),
            other => RenderError::MalformedPackage(other.to_string()),
        }
    }
}
