//! Substitution resolution and the rendering manifest.
//!
//! For each placeholder occurrence the resolver turns (classification,
//! plan lookup, unresolved policy) into a single decision about what the
//! markup edit should be. Resolution is pure; applying decisions and the
//! outcomes of fallible ones (image embedding) belong to the orchestrator.
//!
//! Every occurrence, resolved or not, lands in the manifest, so a caller
//! can audit exactly what happened to each token without diffing packages.

use crate::template::plan::{
    ImageAsset, SubstitutionPlan, SubstitutionValue, TokenKey, UnresolvedPolicy,
};
use crate::template::token::{Classification, TokenKind, classify};
use serde::Serialize;

/// What the markup edit for one occurrence should be.
#[derive(Debug)]
pub(crate) enum Decision {
    /// Replace the token's characters with text (possibly empty).
    ReplaceText(String),
    /// Embed the asset and swap the host shape's imagery.
    EmbedImage(ImageAsset),
    /// Delete the host shape's subtree.
    RemoveShape,
    /// Leave the occurrence untouched.
    Leave,
}

/// One resolved occurrence: the edit to make and the outcome to report.
///
/// For `EmbedImage` the outcome is provisional; embedding can still fail at
/// decode time and the orchestrator downgrades it.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub decision: Decision,
    pub outcome: Outcome,
    pub key: Option<TokenKey>,
}

/// Resolve one raw occurrence against the plan.
///
/// `has_shape` says whether the occurrence sits inside a `p:sp`/`p:pic`
/// subtree; an unresolved IMAGE token removes its host shape, but with no
/// host there is nothing to remove and the literal stays.
pub(crate) fn resolve(
    raw: &str,
    has_shape: bool,
    plan: &SubstitutionPlan,
    policy: UnresolvedPolicy,
) -> Resolution {
    let token = match classify(raw) {
        Classification::Token(token) => token,
        Classification::Ambiguous => {
            return Resolution {
                decision: Decision::Leave,
                outcome: Outcome::Ambiguous,
                key: None,
            };
        }
    };

    let key = TokenKey::from(&token);
    match plan.get(&key) {
        Some(SubstitutionValue::Text(text)) => Resolution {
            decision: Decision::ReplaceText(text.clone()),
            outcome: Outcome::Substituted,
            key: Some(key),
        },
        Some(SubstitutionValue::Image(asset)) => Resolution {
            decision: Decision::EmbedImage(asset.clone()),
            outcome: Outcome::Substituted,
            key: Some(key),
        },
        None if token.kind == TokenKind::Image && has_shape => Resolution {
            decision: Decision::RemoveShape,
            outcome: Outcome::ShapeRemoved,
            key: Some(key),
        },
        None => match policy {
            UnresolvedPolicy::LeaveLiteral => Resolution {
                decision: Decision::Leave,
                outcome: Outcome::LeftLiteral,
                key: Some(key),
            },
            UnresolvedPolicy::Blank => Resolution {
                decision: Decision::ReplaceText(String::new()),
                outcome: Outcome::Blanked,
                key: Some(key),
            },
        },
    }
}

/// What finally happened to one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The token was replaced with its planned text or image.
    Substituted,
    /// No plan entry; the literal `{{...}}` text stays.
    LeftLiteral,
    /// No plan entry; the token was replaced with an empty string.
    Blanked,
    /// The token has an underscore but neither marker; untouched.
    Ambiguous,
    /// Unresolved IMAGE token; the host shape was deleted.
    ShapeRemoved,
    /// The supplied image bytes would not decode; the host shape was
    /// deleted instead.
    ImageDecodeFailed,
}

/// One manifest line: which token, where, and what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    /// Partname of the slide the occurrence was found in.
    pub part: String,

    /// Raw token text including delimiters.
    pub token: String,

    /// Canonical token identity, absent for ambiguous tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub outcome: Outcome,

    /// Extra diagnostics, e.g. the decode error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The rendering job's diagnostic record, one entry per occurrence in
/// document order.
#[derive(Debug, Default, Serialize)]
pub struct RenderManifest {
    entries: Vec<ManifestEntry>,
}

impl RenderManifest {
    pub(crate) fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Occurrences that did not receive their planned value.
    pub fn unresolved_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome != Outcome::Substituted)
            .count()
    }

    /// Whether every occurrence was substituted.
    pub fn is_clean(&self) -> bool {
        self.unresolved_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::plan::ImageAsset;

    fn plan() -> SubstitutionPlan {
        let mut plan = SubstitutionPlan::new();
        plan.text(TokenKey::plain("TITLE"), "Lyon").unwrap();
        plan.text(TokenKey::desc("NATURAL_SITE", 1), "Parc de la Tête d'Or")
            .unwrap();
        plan.image(
            TokenKey::image("NATURAL_SITE", 1),
            ImageAsset::new(vec![1, 2, 3], "image/png"),
        )
        .unwrap();
        plan
    }

    #[test]
    fn planned_text_resolves_to_replacement() {
        let r = resolve("{{TITLE}}", true, &plan(), UnresolvedPolicy::LeaveLiteral);
        assert!(matches!(r.decision, Decision::ReplaceText(ref t) if t == "Lyon"));
        assert_eq!(r.outcome, Outcome::Substituted);
        assert_eq!(r.key.unwrap().to_string(), "TITLE");
    }

    #[test]
    fn planned_image_resolves_to_embed() {
        let r = resolve(
            "{{NATURAL_SITE_IMAGE_1}}",
            true,
            &plan(),
            UnresolvedPolicy::LeaveLiteral,
        );
        assert!(matches!(r.decision, Decision::EmbedImage(_)));
        assert_eq!(r.outcome, Outcome::Substituted);
    }

    #[test]
    fn unplanned_image_token_removes_its_shape() {
        let r = resolve(
            "{{CITY_IMAGE_2}}",
            true,
            &plan(),
            UnresolvedPolicy::LeaveLiteral,
        );
        assert!(matches!(r.decision, Decision::RemoveShape));
        assert_eq!(r.outcome, Outcome::ShapeRemoved);
    }

    #[test]
    fn unplanned_image_token_without_host_stays_literal() {
        let r = resolve(
            "{{CITY_IMAGE_2}}",
            false,
            &plan(),
            UnresolvedPolicy::LeaveLiteral,
        );
        assert!(matches!(r.decision, Decision::Leave));
        assert_eq!(r.outcome, Outcome::LeftLiteral);
    }

    #[test]
    fn unresolved_policy_selects_between_literal_and_blank() {
        let r = resolve("{{MISSING}}", true, &plan(), UnresolvedPolicy::LeaveLiteral);
        assert!(matches!(r.decision, Decision::Leave));
        assert_eq!(r.outcome, Outcome::LeftLiteral);

        let r = resolve("{{MISSING}}", true, &plan(), UnresolvedPolicy::Blank);
        assert!(matches!(r.decision, Decision::ReplaceText(ref t) if t.is_empty()));
        assert_eq!(r.outcome, Outcome::Blanked);
    }

    #[test]
    fn ambiguous_tokens_are_reported_not_edited() {
        let r = resolve("{{SOME_TEXT_1}}", true, &plan(), UnresolvedPolicy::Blank);
        assert!(matches!(r.decision, Decision::Leave));
        assert_eq!(r.outcome, Outcome::Ambiguous);
        assert!(r.key.is_none());
    }

    #[test]
    fn manifest_counts_unresolved_occurrences() {
        let mut manifest = RenderManifest::default();
        manifest.push(ManifestEntry {
            part: "/ppt/slides/slide1.xml".to_string(),
            token: "{{TITLE}}".to_string(),
            key: Some("TITLE".to_string()),
            outcome: Outcome::Substituted,
            detail: None,
        });
        manifest.push(ManifestEntry {
            part: "/ppt/slides/slide1.xml".to_string(),
            token: "{{MISSING}}".to_string(),
            key: Some("MISSING".to_string()),
            outcome: Outcome::LeftLiteral,
            detail: None,
        });

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.unresolved_count(), 1);
        assert!(!manifest.is_clean());
    }
}
