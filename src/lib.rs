//! Slidefill - a PowerPoint template rendering engine
//!
//! Slidefill takes a `.pptx` template whose slides carry `{{TOKEN}}`
//! placeholders and renders it against a substitution plan, producing the
//! output package bytes plus a manifest describing what happened to every
//! placeholder occurrence.
//!
//! - **Fragment-proof scanning**: tokens are found on each paragraph's
//!   concatenated run text, so authoring-tool run splits never hide one
//! - **Style preservation**: replacement text adopts the style of the
//!   token's first fragment; untouched markup round-trips byte for byte
//! - **Image embedding**: `{{CATEGORY_IMAGE_n}}` tokens become embedded
//!   media parts, wired through relationships and the content-type registry
//! - **Best-effort rendering**: unmapped and ambiguous tokens never abort
//!   a job; they are reported in the manifest
//!
//! # Example
//!
//! ```no_run
//! use slidefill::{
//!     ImageAsset, RenderOptions, SubstitutionPlan, TemplateSnapshot, TokenKey,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = TemplateSnapshot::new(std::fs::read("deck.pptx")?)?;
//!
//! let mut plan = SubstitutionPlan::new();
//! plan.text(TokenKey::plain("TITLE"), "Lyon")?;
//! plan.text(TokenKey::desc("NATURAL_SITE", 1), "Parc de la Tête d'Or")?;
//! plan.image(
//!     TokenKey::image("NATURAL_SITE", 1),
//!     ImageAsset::new(std::fs::read("parc.png")?, "image/png"),
//! )?;
//!
//! let deck = template.render(&plan, &RenderOptions::default())?;
//! std::fs::write("out.pptx", &deck.bytes)?;
//! for entry in deck.manifest.entries() {
//!     println!("{} {:?}", entry.token, entry.outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod opc;
pub mod template;

mod xml;

pub use error::{RenderError, Result};
pub use template::{
    Classification, ClassifiedToken, ImageAsset, ManifestEntry, Outcome, PlanError,
    RenderManifest, RenderOptions, RenderedDeck, SubstitutionPlan, SubstitutionValue,
    TemplateSnapshot, TokenKey, TokenKind, UnresolvedPolicy, classify, render,
};
