//! The in-memory package store.
//!
//! A `Package` is an addressable, mutable map of a container's parts, loaded
//! once per rendering job from template bytes and serialized once at the end.
//! Every part that is not explicitly mutated round-trips byte-for-byte;
//! relationship tables and the content-type registry are re-generated only
//! when they were actually touched.

use crate::opc::content_types::ContentTypes;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use crate::opc::rel::Relationships;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

struct Part {
    blob: Vec<u8>,
    touched: bool,
}

/// An OPC package held fully in memory.
///
/// Owned by exactly one rendering job; never shared or reused across jobs.
pub struct Package {
    /// Container entry order, with newly added parts appended.
    order: Vec<PackURI>,

    parts: HashMap<PackURI, Part>,

    /// Relationship tables keyed by their source partname; the package
    /// table is keyed by `/`.
    rels: HashMap<PackURI, Relationships>,

    content_types: ContentTypes,
}

impl Package {
    /// Load a package from container bytes.
    ///
    /// Fails when the archive cannot be decoded or the content-type
    /// registry part is missing.
    pub fn open(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let mut order = Vec::with_capacity(archive.len());
        let mut parts: HashMap<PackURI, Part> = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let partname = PackURI::from_membername(file.name());
            let mut blob = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut blob)?;
            if parts
                .insert(
                    partname.clone(),
                    Part {
                        blob,
                        touched: false,
                    },
                )
                .is_none()
            {
                order.push(partname);
            }
        }

        let content_types_uri = PackURI::new(CONTENT_TYPES_URI).map_err(OpcError::InvalidPackUri)?;
        let content_types = match parts.get(&content_types_uri) {
            Some(part) => ContentTypes::from_xml(&part.blob)?,
            None => return Err(OpcError::PartNotFound(CONTENT_TYPES_URI.to_string())),
        };

        let mut rels = HashMap::new();
        for partname in &order {
            if let Some(source) = partname.rels_source() {
                let table = Relationships::from_xml(&parts[partname].blob)?;
                rels.insert(source, table);
            }
        }

        Ok(Self {
            order,
            parts,
            rels,
            content_types,
        })
    }

    /// Get a part's bytes.
    pub fn part(&self, partname: &PackURI) -> Option<&[u8]> {
        self.parts.get(partname).map(|part| part.blob.as_slice())
    }

    /// Replace or add a part. New parts are appended after the original
    /// entry order.
    pub fn set_part(&mut self, partname: PackURI, blob: Vec<u8>) {
        if self
            .parts
            .insert(partname.clone(), Part { blob, touched: true })
            .is_none()
        {
            self.order.push(partname);
        }
    }

    /// Whether the package contains a part.
    pub fn contains_part(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname)
    }

    /// Part names in container entry order.
    pub fn part_names(&self) -> impl Iterator<Item = &PackURI> {
        self.order.iter()
    }

    /// The relationship table owned by `source`, if it has one.
    pub fn rels(&self, source: &PackURI) -> Option<&Relationships> {
        self.rels.get(source)
    }

    /// The relationship table owned by `source`, created empty on demand.
    pub fn rels_mut(&mut self, source: &PackURI) -> &mut Relationships {
        self.rels.entry(source.clone()).or_default()
    }

    /// The content-type registry.
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    /// Parts whose registered content type equals `content_type`, in entry
    /// order.
    pub fn parts_with_content_type(&self, content_type: &str) -> Vec<PackURI> {
        self.order
            .iter()
            .filter(|partname| {
                self.content_types
                    .get(partname)
                    .map(|ct| ct == content_type)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Next free media partname `/ppt/media/image{n}.{ext}`.
    ///
    /// Numbering continues past the highest existing media image index so a
    /// new part can never shadow a template part.
    pub fn next_media_partname(&self, ext: &str) -> Result<PackURI> {
        let next = self
            .order
            .iter()
            .filter(|p| p.base_uri() == "/ppt/media")
            .filter_map(|p| p.idx())
            .max()
            .unwrap_or(0)
            + 1;
        PackURI::new(format!("/ppt/media/image{next}.{ext}")).map_err(OpcError::InvalidPackUri)
    }

    /// Serialize the package back to container bytes.
    ///
    /// Untouched parts are copied verbatim; dirty relationship tables and a
    /// dirty content-type registry are re-generated in place of their
    /// original entries. Relationship tables for sources that had no `.rels`
    /// part are appended.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        for partname in &self.order {
            let regenerated = self.regenerated_blob(partname);
            let blob = match &regenerated {
                Some(xml) => xml.as_bytes(),
                None => &self.parts[partname].blob,
            };
            writer.start_file(partname.membername(), options)?;
            writer.write_all(blob)?;
        }

        // Tables minted for sources that had no .rels part in the template.
        let mut appended: Vec<(&PackURI, &Relationships)> = self
            .rels
            .iter()
            .filter(|(source, table)| {
                table.is_dirty() && !self.parts.contains_key(&source.rels_uri())
            })
            .collect();
        appended.sort_by(|a, b| a.0.cmp(b.0));
        for (source, table) in appended {
            writer.start_file(source.rels_uri().membername(), options)?;
            writer.write_all(table.to_xml().as_bytes())?;
        }

        Ok(writer.finish()?.into_inner())
    }

    fn regenerated_blob(&self, partname: &PackURI) -> Option<String> {
        if partname.as_str() == CONTENT_TYPES_URI && self.content_types.is_dirty() {
            return Some(self.content_types.to_xml());
        }
        let source = partname.rels_source()?;
        let table = self.rels.get(&source)?;
        table.is_dirty().then(|| table.to_xml())
    }
}
