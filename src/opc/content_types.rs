//! The package content-type registry (`[Content_Types].xml`).
//!
//! Maps part names to media types via Default (by extension) and Override
//! (by partname) entries. Rendering only ever adds Default entries, when a
//! media part of a previously unseen type is embedded.

use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use crate::xml::escape_xml;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Content type of PresentationML slide parts.
pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// Parsed content-type registry.
#[derive(Debug)]
pub struct ContentTypes {
    /// Default content types by lowercase extension
    defaults: HashMap<String, String>,

    /// Override content types by partname
    overrides: HashMap<String, String>,

    dirty: bool,
}

impl ContentTypes {
    /// Parse the registry from `[Content_Types].xml`.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut defaults = HashMap::new();
        let mut overrides = HashMap::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Default" => {
                            let mut extension = None;
                            let mut content_type = None;
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        extension = Some(attr.unescape_value()?.to_string());
                                    },
                                    b"ContentType" => {
                                        content_type = Some(attr.unescape_value()?.to_string());
                                    },
                                    _ => {},
                                }
                            }
                            if let (Some(ext), Some(ct)) = (extension, content_type) {
                                defaults.insert(ext.to_lowercase(), ct);
                            }
                        },
                        b"Override" => {
                            let mut partname = None;
                            let mut content_type = None;
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        partname = Some(attr.unescape_value()?.to_string());
                                    },
                                    b"ContentType" => {
                                        content_type = Some(attr.unescape_value()?.to_string());
                                    },
                                    _ => {},
                                }
                            }
                            if let (Some(pn), Some(ct)) = (partname, content_type) {
                                overrides.insert(pn, ct);
                            }
                        },
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::Xml(format!("content types parse error: {e}"))),
                _ => {},
            }
            buf.clear();
        }

        Ok(Self {
            defaults,
            overrides,
            dirty: false,
        })
    }

    /// Get the content type for a partname: Override first, then the
    /// extension Default.
    pub fn get(&self, partname: &PackURI) -> Result<&str> {
        if let Some(ct) = self.overrides.get(partname.as_str()) {
            return Ok(ct);
        }
        if let Some(ct) = self.defaults.get(&partname.ext().to_lowercase()) {
            return Ok(ct);
        }
        Err(OpcError::ContentTypeNotFound(partname.to_string()))
    }

    /// Whether any entry declares the given media type.
    pub fn declares(&self, content_type: &str) -> bool {
        self.defaults.values().any(|ct| ct == content_type)
            || self.overrides.values().any(|ct| ct == content_type)
    }

    /// Ensure a Default entry maps `ext` to `content_type`.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        let ext = ext.to_lowercase();
        if self.defaults.get(&ext).map(String::as_str) != Some(content_type) {
            self.defaults.insert(ext, content_type.to_string());
            self.dirty = true;
        }
    }

    /// Whether the registry has diverged from its loaded serialization.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Serialize the registry. Entries are sorted for stable output.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );

        let mut exts: Vec<_> = self.defaults.keys().collect();
        exts.sort();
        for ext in exts {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(&self.defaults[ext])
            ));
        }

        let mut partnames: Vec<_> = self.overrides.keys().collect();
        partnames.sort();
        for partname in partnames {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname),
                escape_xml(&self.overrides[partname])
            ));
        }

        xml.push_str("</Types>");
        xml
    }
}
