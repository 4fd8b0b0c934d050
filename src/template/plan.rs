//! The substitution plan: the caller-supplied mapping from token identity
//! to replacement value.
//!
//! The plan is a closed, validated schema. Values are inserted through
//! typed methods that reject mismatched kinds up front, so the resolver
//! never has to second-guess what it finds: an IMAGE key always holds an
//! image asset, a DESC or PLAIN key always holds text.

use crate::template::token::{ClassifiedToken, TokenKind};
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;

/// Identity of a token for plan lookup: (category, kind, index-or-absent).
///
/// Every occurrence with the same identity anywhere in the template resolves
/// to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub kind: TokenKind,
    pub category: String,
    pub index: Option<u32>,
}

impl TokenKey {
    /// Key for a plain `{{NAME}}` token.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Plain,
            category: name.into(),
            index: None,
        }
    }

    /// Key for a `{{CATEGORY_IMAGE_n}}` token.
    pub fn image(category: impl Into<String>, index: u32) -> Self {
        Self {
            kind: TokenKind::Image,
            category: category.into(),
            index: Some(index),
        }
    }

    /// Key for a `{{CATEGORY_DESC_n}}` token.
    pub fn desc(category: impl Into<String>, index: u32) -> Self {
        Self {
            kind: TokenKind::Desc,
            category: category.into(),
            index: Some(index),
        }
    }
}

impl From<&ClassifiedToken> for TokenKey {
    fn from(token: &ClassifiedToken) -> Self {
        Self {
            kind: token.kind,
            category: token.category.clone(),
            index: token.index,
        }
    }
}

impl std::fmt::Display for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.index) {
            (TokenKind::Plain, _) => write!(f, "{}", self.category),
            (TokenKind::Image, Some(i)) => write!(f, "{}_IMAGE_{i}", self.category),
            (TokenKind::Image, None) => write!(f, "{}_IMAGE", self.category),
            (TokenKind::Desc, Some(i)) => write!(f, "{}_DESC_{i}", self.category),
            (TokenKind::Desc, None) => write!(f, "{}_DESC", self.category),
        }
    }
}

/// An image asset supplied for an IMAGE token.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    /// Encoded image bytes.
    pub data: Bytes,

    /// Declared MIME type, e.g. `image/png`. The decoded format is
    /// authoritative; this is a fallback for formats without a canonical
    /// MIME mapping.
    pub content_type: String,

    /// Declared intrinsic pixel size. Advisory; the decoded size wins.
    pub px_size: Option<(u32, u32)>,
}

impl ImageAsset {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            px_size: None,
        }
    }

    pub fn with_px_size(mut self, width: u32, height: u32) -> Self {
        self.px_size = Some((width, height));
        self
    }
}

/// A replacement value for one token identity.
#[derive(Debug, Clone)]
pub enum SubstitutionValue {
    Text(String),
    Image(ImageAsset),
}

/// How to treat classified tokens with no plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Leave the literal `{{...}}` text in place.
    #[default]
    LeaveLiteral,
    /// Replace the token with an empty string.
    Blank,
}

/// Plan validation diagnostics.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    #[error("token {key}: {expected} value required, {got} supplied")]
    KindMismatch {
        key: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("token {0}: category must not be empty")]
    EmptyCategory(String),

    #[error("token {0}: image asset has no bytes")]
    EmptyImage(String),

    #[error("token {0}: image asset has no declared content type")]
    EmptyContentType(String),
}

/// The validated mapping from token identity to substitution value.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionPlan {
    entries: HashMap<TokenKey, SubstitutionValue>,
}

impl SubstitutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a PLAIN or DESC token to replacement text.
    pub fn text(
        &mut self,
        key: TokenKey,
        text: impl Into<String>,
    ) -> Result<&mut Self, PlanError> {
        if key.kind == TokenKind::Image {
            return Err(PlanError::KindMismatch {
                key: key.to_string(),
                expected: "image",
                got: "text",
            });
        }
        self.validate_category(&key)?;
        self.entries.insert(key, SubstitutionValue::Text(text.into()));
        Ok(self)
    }

    /// Map an IMAGE token to an image asset.
    pub fn image(&mut self, key: TokenKey, asset: ImageAsset) -> Result<&mut Self, PlanError> {
        if key.kind != TokenKind::Image {
            return Err(PlanError::KindMismatch {
                key: key.to_string(),
                expected: "text",
                got: "image",
            });
        }
        self.validate_category(&key)?;
        if asset.data.is_empty() {
            return Err(PlanError::EmptyImage(key.to_string()));
        }
        if asset.content_type.is_empty() {
            return Err(PlanError::EmptyContentType(key.to_string()));
        }
        self.entries.insert(key, SubstitutionValue::Image(asset));
        Ok(self)
    }

    /// Look up the value for a token identity.
    pub fn get(&self, key: &TokenKey) -> Option<&SubstitutionValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate_category(&self, key: &TokenKey) -> Result<(), PlanError> {
        if key.category.is_empty() {
            return Err(PlanError::EmptyCategory(key.to_string()));
        }
        Ok(())
    }
}
