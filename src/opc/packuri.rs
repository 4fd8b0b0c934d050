//! The `PackURI` value type: a part name within an OPC package.
//!
//! Pack URIs always begin with a forward slash and use forward slashes as
//! separators, per the Open Packaging Conventions. The package itself is
//! addressed by the pseudo-partname `/`.

/// Partname of the package pseudo-part.
pub const PACKAGE_URI: &str = "/";

/// Partname of the content-type registry part.
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// A part name within an OPC package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

impl PackURI {
    /// Create a new PackURI. The URI must begin with a forward slash.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self, String> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(format!("PackURI must begin with slash, got '{uri}'"));
        }
        Ok(PackURI { uri })
    }

    /// Create a PackURI from a ZIP member name (no leading slash).
    pub fn from_membername(name: &str) -> Self {
        PackURI {
            uri: format!("/{name}"),
        }
    }

    /// Resolve a relative reference (e.g. `../media/image1.png`) against a
    /// base URI (e.g. `/ppt/slides`) into an absolute PackURI.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self, String> {
        if relative_ref.starts_with('/') {
            return Self::new(relative_ref);
        }
        let mut segments: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        for seg in relative_ref.split('/') {
            match seg {
                "" | "." => {},
                ".." => {
                    segments.pop();
                },
                other => segments.push(other),
            }
        }
        Self::new(format!("/{}", segments.join("/")))
    }

    /// The full URI string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The directory portion, e.g. `/ppt/slides` for `/ppt/slides/slide1.xml`.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// The filename portion, e.g. `slide1.xml`. Empty for the package URI.
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// The extension without the leading period, e.g. `xml`.
    pub fn ext(&self) -> &str {
        match self.filename().rfind('.') {
            Some(pos) => &self.filename()[pos + 1..],
            None => "",
        }
    }

    /// The numeric suffix of the filename stem, e.g. `21` for `slide21.xml`.
    pub fn idx(&self) -> Option<u32> {
        let stem = match self.filename().rfind('.') {
            Some(pos) => &self.filename()[..pos],
            None => self.filename(),
        };
        let start = stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if start == 0 || start == stem.len() {
            return None;
        }
        stem[start..].parse().ok()
    }

    /// The ZIP member name: the URI with the leading slash stripped.
    pub fn membername(&self) -> &str {
        if self.uri == PACKAGE_URI {
            ""
        } else {
            &self.uri[1..]
        }
    }

    /// The partname of this part's relationships part.
    ///
    /// `/ppt/slides/slide1.xml` maps to `/ppt/slides/_rels/slide1.xml.rels`,
    /// and the package URI maps to `/_rels/.rels`.
    pub fn rels_uri(&self) -> PackURI {
        let base = self.base_uri();
        let filename = self.filename();
        let uri = if base == "/" {
            format!("/_rels/{filename}.rels")
        } else {
            format!("{base}/_rels/{filename}.rels")
        };
        PackURI { uri }
    }

    /// The source partname a relationships part describes, if this is one.
    ///
    /// Inverse of [`rels_uri`](Self::rels_uri): `/ppt/_rels/presentation.xml.rels`
    /// maps back to `/ppt/presentation.xml`, and `/_rels/.rels` to `/`.
    pub fn rels_source(&self) -> Option<PackURI> {
        let filename = self.filename().strip_suffix(".rels")?;
        let base = self.base_uri();
        let dir = base.strip_suffix("/_rels").unwrap_or("");
        if base != "/_rels" && dir.is_empty() {
            return None;
        }
        if filename.is_empty() {
            return Some(PackURI {
                uri: PACKAGE_URI.to_string(),
            });
        }
        Some(PackURI {
            uri: format!("{dir}/{filename}"),
        })
    }
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}
