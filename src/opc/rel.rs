//! Relationship table for OPC package parts.
//!
//! Each part that references other parts (or external resources) owns a
//! `.rels` table of `{id, type, target, mode}` entries. The engine only ever
//! performs point lookups and fresh-id allocation on these tables, so they
//! are modeled as flat collections, not a graph to traverse.

use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use crate::xml::escape_xml;
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;

/// Relationship type URI for embedded images.
pub const IMAGE_RELTYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Target mode attribute value for external relationships.
const EXTERNAL_MODE: &str = "External";

/// A single relationship from a source part to a target.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID, e.g. "rId3"
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference: a relative part reference, or an external URL
    target_ref: String,

    /// Whether the target is external to the package
    is_external: bool,
}

impl Relationship {
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Resolve the absolute target partname for an internal relationship.
    pub fn target_partname(&self, base_uri: &str) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(format!(
                "{} is external, no target partname",
                self.r_id
            )));
        }
        PackURI::from_rel_ref(base_uri, &self.target_ref).map_err(OpcError::InvalidPackUri)
    }
}

/// The relationship table owned by one source part (or the package).
///
/// Ids are allocated from a high-water counter seeded at load time. An id is
/// never handed out twice, even after the relationship that carried it is
/// removed; reuse within a rendering job would let a stale shape reference
/// silently resolve to the wrong media part.
#[derive(Debug, Default)]
pub struct Relationships {
    rels: SmallVec<[Relationship; 8]>,

    /// Next numeric id to mint. Monotonic, never decremented.
    next_id: u32,

    /// Set when the table no longer matches the serialized form it was
    /// loaded from.
    dirty: bool,
}

impl Relationships {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            rels: SmallVec::new(),
            next_id: 1,
            dirty: false,
        }
    }

    /// Parse a `.rels` part.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut table = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target_ref = None;
                    let mut is_external = false;

                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Id" => r_id = Some(attr.unescape_value()?.to_string()),
                            b"Type" => reltype = Some(attr.unescape_value()?.to_string()),
                            b"Target" => target_ref = Some(attr.unescape_value()?.to_string()),
                            b"TargetMode" => {
                                is_external = attr.unescape_value()?.as_ref() == EXTERNAL_MODE;
                            },
                            _ => {},
                        }
                    }

                    if let (Some(r_id), Some(reltype), Some(target_ref)) =
                        (r_id, reltype, target_ref)
                    {
                        // A doubled id here is a malformed template, not an
                        // allocation defect.
                        if table.get(&r_id).is_some() {
                            return Err(OpcError::Xml(format!(
                                "duplicate relationship id {r_id}"
                            )));
                        }
                        table.insert(Relationship {
                            r_id,
                            reltype,
                            target_ref,
                            is_external,
                        })?;
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::Xml(format!("rels parse error: {e}"))),
                _ => {},
            }
            buf.clear();
        }

        table.dirty = false;
        Ok(table)
    }

    /// Look up a relationship by id.
    #[inline]
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    /// Add an internal relationship with a freshly minted id.
    ///
    /// Returns the new id.
    pub fn add(&mut self, reltype: &str, target_ref: &str) -> Result<String> {
        let r_id = self.next_r_id();
        self.insert(Relationship {
            r_id: r_id.clone(),
            reltype: reltype.to_string(),
            target_ref: target_ref.to_string(),
            is_external: false,
        })?;
        Ok(r_id)
    }

    /// Remove a relationship by id. The id is retired, not recycled.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|rel| rel.r_id == r_id)?;
        self.dirty = true;
        Some(self.rels.remove(pos))
    }

    /// Number of relationships in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Whether the table has diverged from its loaded serialization.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    fn insert(&mut self, rel: Relationship) -> Result<()> {
        if self.get(&rel.r_id).is_some() {
            return Err(OpcError::RelationshipConflict(rel.r_id));
        }
        if let Some(n) = parse_r_id(&rel.r_id) {
            self.next_id = self.next_id.max(n + 1);
        }
        self.rels.push(rel);
        self.dirty = true;
        Ok(())
    }

    fn next_r_id(&mut self) -> String {
        let id = format!("rId{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Serialize the table as a `.rels` part.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 128);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for rel in &self.rels {
            let target_mode = if rel.is_external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(&rel.r_id),
                escape_xml(&rel.reltype),
                escape_xml(&rel.target_ref),
                target_mode
            ));
        }

        xml.push_str("</Relationships>");
        xml
    }
}

fn parse_r_id(r_id: &str) -> Option<u32> {
    r_id.strip_prefix("rId")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS_XML: &[u8] = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://example.com/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
  <Relationship Id="rId4" Type="http://example.com/image" Target="../media/image1.png"/>
  <Relationship Id="rId2" Type="http://example.com/hyperlink" Target="https://example.com/" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn parses_rels_part() {
        let rels = Relationships::from_xml(RELS_XML).unwrap();
        assert_eq!(rels.len(), 3);
        assert!(!rels.is_dirty());

        let image = rels.get("rId4").unwrap();
        assert_eq!(image.target_ref(), "../media/image1.png");
        assert!(!image.is_external());
        assert!(rels.get("rId2").unwrap().is_external());
    }

    #[test]
    fn allocation_is_monotonic() {
        let mut rels = Relationships::from_xml(RELS_XML).unwrap();

        // Seeded past the highest loaded id, not into the rId3 gap.
        let id = rels.add(IMAGE_RELTYPE, "../media/image2.png").unwrap();
        assert_eq!(id, "rId5");

        // Removal retires the id instead of recycling it.
        rels.remove("rId5").unwrap();
        let id = rels.add(IMAGE_RELTYPE, "../media/image3.png").unwrap();
        assert_eq!(id, "rId6");
        assert!(rels.is_dirty());
    }

    #[test]
    fn duplicate_id_in_rels_part_is_bad_input() {
        let doubled = br#"<Relationships>
            <Relationship Id="rId1" Type="t" Target="a.xml"/>
            <Relationship Id="rId1" Type="t" Target="b.xml"/>
        </Relationships>"#;
        let err = Relationships::from_xml(doubled).unwrap_err();
        assert!(matches!(err, OpcError::Xml(_)));
        // Surfaces to callers as a malformed template, not an engine defect.
        assert!(matches!(
            crate::error::RenderError::from(err),
            crate::error::RenderError::MalformedPackage(_)
        ));
    }

    #[test]
    fn allocation_collision_is_a_conflict() {
        let mut rels = Relationships::new();
        rels.add("t", "a.xml").unwrap();
        let doubled = Relationship {
            r_id: "rId1".to_string(),
            reltype: "t".to_string(),
            target_ref: "b.xml".to_string(),
            is_external: false,
        };
        assert!(matches!(
            rels.insert(doubled),
            Err(OpcError::RelationshipConflict(_))
        ));
    }

    #[test]
    fn target_partname_resolution() {
        let rels = Relationships::from_xml(RELS_XML).unwrap();
        let partname = rels
            .get("rId4")
            .unwrap()
            .target_partname("/ppt/slides")
            .unwrap();
        assert_eq!(partname.as_str(), "/ppt/media/image1.png");
        assert!(rels.get("rId2").unwrap().target_partname("/ppt/slides").is_err());
    }

    #[test]
    fn serializes_in_table_order() {
        let mut rels = Relationships::new();
        rels.add("http://example.com/image", "../media/image1.png").unwrap();
        rels.add("http://example.com/image", "../media/image2.png").unwrap();

        let xml = rels.to_xml();
        let first = xml.find("rId1").unwrap();
        let second = xml.find("rId2").unwrap();
        assert!(first < second);
        assert!(xml.contains(r#"Target="../media/image1.png""#));
    }
}
