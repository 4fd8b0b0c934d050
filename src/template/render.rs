//! The rendering orchestrator.
//!
//! One rendering job takes a template snapshot and a substitution plan and
//! produces output container bytes plus a manifest. Slides are scanned in
//! parallel (scanning is pure); edits are then applied slide by slide so
//! relationship-id and media-part allocation stay strictly ordered.

use crate::error::{RenderError, Result};
use crate::opc::{PackURI, Package, SLIDE_CONTENT_TYPE};
use crate::template::image;
use crate::template::plan::{SubstitutionPlan, UnresolvedPolicy};
use crate::template::resolve::{
    Decision, ManifestEntry, Outcome, RenderManifest, Resolution, resolve,
};
use crate::template::scan::{Occurrence, SlideDoc};
use crate::template::text::{self, SpanEdit, Splice};
use bytes::Bytes;
use rayon::prelude::*;
use std::collections::HashMap;

/// A validated template, loadable any number of times.
///
/// Validation happens once at construction; rendering jobs then share the
/// snapshot and never mutate it.
#[derive(Debug, Clone)]
pub struct TemplateSnapshot {
    data: Bytes,
}

impl TemplateSnapshot {
    /// Take a snapshot of template container bytes.
    ///
    /// Fails when the bytes are not a loadable package, so a bad template
    /// is caught before the first job rather than inside one.
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        Package::open(&data)?;
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Render this template with a plan. See [`render`].
    pub fn render(&self, plan: &SubstitutionPlan, options: &RenderOptions) -> Result<RenderedDeck> {
        render(self, plan, options)
    }
}

/// Knobs for one rendering job.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// What to do with classified tokens that have no plan entry.
    pub unresolved: UnresolvedPolicy,
}

/// The product of one rendering job.
#[derive(Debug)]
pub struct RenderedDeck {
    /// Output container bytes.
    pub bytes: Vec<u8>,

    /// One entry per placeholder occurrence, in document order.
    pub manifest: RenderManifest,
}

/// Render a template against a substitution plan.
///
/// Every slide part is scanned for placeholder occurrences; each occurrence
/// is resolved against the plan and the decided edits are spliced into the
/// slide markup. Parts without edits round-trip untouched. Per-occurrence
/// problems are recorded in the manifest; only package-level failures abort
/// the job.
pub fn render(
    template: &TemplateSnapshot,
    plan: &SubstitutionPlan,
    options: &RenderOptions,
) -> Result<RenderedDeck> {
    let mut pkg = Package::open(template.as_bytes())?;

    let mut slides = pkg.parts_with_content_type(SLIDE_CONTENT_TYPE);
    slides.sort_by_key(|partname| (partname.idx().unwrap_or(u32::MAX), partname.to_string()));

    let scanned = slides
        .par_iter()
        .map(|partname| -> Result<(Vec<u8>, SlideDoc, Vec<Occurrence>)> {
            let xml = pkg
                .part(partname)
                .ok_or_else(|| RenderError::MalformedPackage(format!("missing part {partname}")))?
                .to_vec();
            let doc = SlideDoc::parse(&xml)?;
            let occurrences = doc.find_placeholders();
            Ok((xml, doc, occurrences))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut manifest = RenderManifest::default();
    for (partname, (xml, doc, occurrences)) in slides.iter().zip(scanned) {
        apply_slide(
            &mut pkg,
            &mut manifest,
            partname,
            &xml,
            &doc,
            &occurrences,
            plan,
            options,
        )?;
    }

    let bytes = pkg.serialize()?;
    Ok(RenderedDeck { bytes, manifest })
}

#[allow(clippy::too_many_arguments)]
fn apply_slide(
    pkg: &mut Package,
    manifest: &mut RenderManifest,
    partname: &PackURI,
    xml: &[u8],
    doc: &SlideDoc,
    occurrences: &[Occurrence],
    plan: &SubstitutionPlan,
    options: &RenderOptions,
) -> Result<()> {
    let resolutions: Vec<Resolution> = occurrences
        .iter()
        .map(|occ| resolve(&occ.raw, occ.shape.is_some(), plan, options.unresolved))
        .collect();

    // First shape-level decision wins a shape; everything else in that
    // subtree vanishes with it.
    let mut claimed: HashMap<usize, usize> = HashMap::new();
    for (i, (occ, res)) in occurrences.iter().zip(&resolutions).enumerate() {
        if let Some(shape) = occ.shape
            && matches!(res.decision, Decision::EmbedImage(_) | Decision::RemoveShape)
        {
            claimed.entry(shape).or_insert(i);
        }
    }

    let mut text_edits: Vec<SpanEdit> = Vec::new();
    let mut shape_splices: Vec<Splice> = Vec::new();
    let mut next_shape_id = doc.max_shape_id + 1;

    for (i, (occ, res)) in occurrences.iter().zip(&resolutions).enumerate() {
        let key = res.key.as_ref().map(|k| k.to_string());

        if let Some(shape) = occ.shape
            && let Some(&claimant) = claimed.get(&shape)
            && claimant != i
        {
            manifest.push(ManifestEntry {
                part: partname.to_string(),
                token: occ.raw.clone(),
                key,
                outcome: Outcome::ShapeRemoved,
                detail: Some("host shape was replaced".to_string()),
            });
            continue;
        }

        let (outcome, detail) = match &res.decision {
            Decision::Leave => (res.outcome, None),
            Decision::ReplaceText(replacement) => {
                text_edits.push(SpanEdit {
                    paragraph: occ.paragraph,
                    span: occ.span.clone(),
                    replacement: replacement.clone(),
                });
                (res.outcome, None)
            }
            Decision::EmbedImage(asset) => match occ.shape {
                None => (
                    Outcome::LeftLiteral,
                    Some("image token has no host shape".to_string()),
                ),
                Some(shape) => match image::embed(pkg, partname, asset) {
                    Ok(embedded) => {
                        let name = key.clone().unwrap_or_else(|| "Picture".to_string());
                        shape_splices.push(image::picture_splice(
                            &doc.shapes[shape],
                            &embedded,
                            next_shape_id,
                            &name,
                        ));
                        next_shape_id += 1;
                        (Outcome::Substituted, None)
                    }
                    Err(RenderError::ImageDecode(message)) => {
                        shape_splices.push(image::remove_shape_splice(&doc.shapes[shape]));
                        (Outcome::ImageDecodeFailed, Some(message))
                    }
                    Err(other) => return Err(other),
                },
            },
            Decision::RemoveShape => match occ.shape {
                Some(shape) => {
                    shape_splices.push(image::remove_shape_splice(&doc.shapes[shape]));
                    (Outcome::ShapeRemoved, None)
                }
                None => (
                    Outcome::LeftLiteral,
                    Some("image token has no host shape".to_string()),
                ),
            },
        };

        manifest.push(ManifestEntry {
            part: partname.to_string(),
            token: occ.raw.clone(),
            key,
            outcome,
            detail,
        });
    }

    if !text_edits.is_empty() || !shape_splices.is_empty() {
        let mut splices = text::run_splices(xml, doc, &text_edits);
        splices.extend(shape_splices);
        let mutated = text::apply_splices(xml, splices)?;
        pkg.set_part(partname.clone(), mutated);
    }
    Ok(())
}
