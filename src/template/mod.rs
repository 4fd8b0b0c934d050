//! The template rendering engine.
//!
//! A rendering job walks the template's slide parts, finds `{{TOKEN}}`
//! placeholders (however the authoring tool fragmented them across styled
//! runs), resolves each against the caller's substitution plan and splices
//! the decided edits back into the markup. Text lands in the style of the
//! token's first fragment; images become new media parts wired in through
//! relationships and the content-type registry.

mod image;
mod render;
mod resolve;
mod scan;
mod text;

pub mod plan;
pub mod token;

pub use plan::{
    ImageAsset, PlanError, SubstitutionPlan, SubstitutionValue, TokenKey, UnresolvedPolicy,
};
pub use render::{RenderOptions, RenderedDeck, TemplateSnapshot, render};
pub use resolve::{ManifestEntry, Outcome, RenderManifest};
pub use scan::RunSpan;
pub use token::{Classification, ClassifiedToken, TokenKind, classify};
