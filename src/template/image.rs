//! Image embedding.
//!
//! An image asset becomes three coordinated package edits: a new media part
//! under `/ppt/media`, a content-type registration for the media extension,
//! and an image relationship from the host slide. The slide markup then
//! either gains a generated `p:pic` subtree (replacing the text shape that
//! carried the token) or has its existing picture's `a:blip` re-pointed.

use crate::error::{RenderError, Result};
use crate::opc::{IMAGE_RELTYPE, PackURI, Package};
use crate::template::plan::ImageAsset;
use crate::template::scan::{Shape, ShapeKind};
use crate::template::text::Splice;
use crate::xml::escape_xml;
use image::ImageFormat;
use std::io::Cursor;

/// EMU per CSS pixel at 96 dpi.
const EMU_PER_PIXEL: i64 = 9525;

/// Decoded facts about an asset, read from the actual bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedImage {
    pub ext: &'static str,
    pub content_type: &'static str,
    pub px: (u32, u32),
}

/// A media part wired into the package, ready to be referenced from markup.
#[derive(Debug)]
pub(crate) struct EmbeddedImage {
    pub r_id: String,
    pub partname: PackURI,
    pub px: (u32, u32),
}

/// Sniff the asset's real format and pixel size from its bytes.
///
/// The decoded format is authoritative over the declared MIME type; a
/// mislabeled asset still lands under the right extension. Undecodable
/// bytes are an `ImageDecode` error, which rendering reports per occurrence
/// instead of failing the job.
pub(crate) fn decode(asset: &ImageAsset) -> Result<DecodedImage> {
    let format = image::guess_format(&asset.data)
        .map_err(|e| RenderError::ImageDecode(format!("unrecognized image data: {e}")))?;
    let (ext, content_type) = format_info(format).ok_or_else(|| {
        RenderError::ImageDecode(format!("unsupported image format {format:?}"))
    })?;
    let px = image::ImageReader::with_format(Cursor::new(asset.data.as_ref()), format)
        .into_dimensions()
        .map_err(|e| RenderError::ImageDecode(format!("image header: {e}")))?;
    Ok(DecodedImage {
        ext,
        content_type,
        px,
    })
}

fn format_info(format: ImageFormat) -> Option<(&'static str, &'static str)> {
    match format {
        ImageFormat::Png => Some(("png", "image/png")),
        ImageFormat::Jpeg => Some(("jpeg", "image/jpeg")),
        ImageFormat::Gif => Some(("gif", "image/gif")),
        ImageFormat::Bmp => Some(("bmp", "image/bmp")),
        ImageFormat::Tiff => Some(("tiff", "image/tiff")),
        ImageFormat::WebP => Some(("webp", "image/webp")),
        _ => None,
    }
}

/// Store the asset as a media part, register its content type, and relate
/// it from the slide. Returns the minted relationship id and partname.
pub(crate) fn embed(pkg: &mut Package, slide: &PackURI, asset: &ImageAsset) -> Result<EmbeddedImage> {
    let decoded = decode(asset)?;

    let partname = pkg.next_media_partname(decoded.ext)?;
    pkg.set_part(partname.clone(), asset.data.to_vec());
    pkg.content_types_mut()
        .ensure_default(decoded.ext, decoded.content_type);

    let target_ref = relative_ref(&slide.base_uri(), &partname);
    let r_id = pkg.rels_mut(slide).add(IMAGE_RELTYPE, &target_ref)?;

    Ok(EmbeddedImage {
        r_id,
        partname,
        px: decoded.px,
    })
}

/// Splice that swaps the host shape's markup for the embedded image.
///
/// A text shape host is replaced wholesale by a generated `p:pic` at the
/// host's position; an existing picture host keeps its subtree and only has
/// its `a:blip` re-pointed at the new relationship.
pub(crate) fn picture_splice(
    shape: &Shape,
    embedded: &EmbeddedImage,
    shape_id: u32,
    name: &str,
) -> Splice {
    if shape.kind == ShapeKind::Pic
        && let Some((start, end)) = shape.blip
    {
        Splice {
            range: start..end,
            bytes: format!(r#"<a:blip r:embed="{}"/>"#, embedded.r_id).into_bytes(),
        }
    } else {
        let (x, y) = shape.offset.unwrap_or((0, 0));
        let (cx, cy) = shape
            .extent
            .filter(|&(cx, cy)| cx > 0 && cy > 0)
            .unwrap_or_else(|| {
                (
                    embedded.px.0 as i64 * EMU_PER_PIXEL,
                    embedded.px.1 as i64 * EMU_PER_PIXEL,
                )
            });
        Splice {
            range: shape.start..shape.end,
            bytes: build_picture_xml(shape_id, name, &embedded.r_id, (x, y), (cx, cy))
                .into_bytes(),
        }
    }
}

/// Splice that deletes the host shape's subtree.
pub(crate) fn remove_shape_splice(shape: &Shape) -> Splice {
    Splice {
        range: shape.start..shape.end,
        bytes: Vec::new(),
    }
}

fn build_picture_xml(
    shape_id: u32,
    name: &str,
    r_id: &str,
    (x, y): (i64, i64),
    (cx, cy): (i64, i64),
) -> String {
    let mut xml = String::with_capacity(512);
    xml.push_str("<p:pic><p:nvPicPr>");
    xml.push_str(&format!(
        r#"<p:cNvPr id="{shape_id}" name="{}"/>"#,
        escape_xml(name)
    ));
    xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr>"#);
    xml.push_str("<p:nvPr/></p:nvPicPr>");
    xml.push_str(&format!(
        r#"<p:blipFill><a:blip r:embed="{r_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#
    ));
    xml.push_str("<p:spPr><a:xfrm>");
    xml.push_str(&format!(r#"<a:off x="{x}" y="{y}"/>"#));
    xml.push_str(&format!(r#"<a:ext cx="{cx}" cy="{cy}"/>"#));
    xml.push_str(r#"</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#);
    xml
}

/// Relative reference from a part's base URI to a target partname.
fn relative_ref(base_uri: &str, target: &PackURI) -> String {
    let base: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
    let dest: Vec<&str> = target.as_str().split('/').filter(|s| !s.is_empty()).collect();
    let common = base.iter().zip(&dest).take_while(|(a, b)| a == b).count();

    let mut segments: Vec<&str> = Vec::with_capacity(base.len() - common + dest.len() - common);
    for _ in common..base.len() {
        segments.push("..");
    }
    segments.extend(&dest[common..]);
    segments.join("/")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::opc::PackURI;
    use crate::template::plan::ImageAsset;

    // 1x1 RGBA PNG.
    pub(crate) const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9c, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn decode_reads_format_and_size_from_bytes() {
        // Declared MIME lies; the sniffed format wins.
        let asset = ImageAsset::new(TINY_PNG.to_vec(), "image/jpeg");
        let decoded = decode(&asset).unwrap();
        assert_eq!(decoded.ext, "png");
        assert_eq!(decoded.content_type, "image/png");
        assert_eq!(decoded.px, (1, 1));
    }

    #[test]
    fn undecodable_bytes_are_an_image_decode_error() {
        let asset = ImageAsset::new(b"definitely not an image".to_vec(), "image/png");
        assert!(matches!(
            decode(&asset),
            Err(RenderError::ImageDecode(_))
        ));
    }

    #[test]
    fn relative_refs_walk_up_to_the_common_ancestor() {
        let media = PackURI::new("/ppt/media/image3.png").unwrap();
        assert_eq!(relative_ref("/ppt/slides", &media), "../media/image3.png");
        assert_eq!(relative_ref("/ppt", &media), "media/image3.png");
        assert_eq!(relative_ref("/", &media), "ppt/media/image3.png");
    }

    #[test]
    fn generated_picture_uses_template_geometry() {
        let shape = Shape {
            kind: ShapeKind::Sp,
            start: 10,
            end: 90,
            offset: Some((914400, 457200)),
            extent: Some((1828800, 914400)),
            blip: None,
        };
        let embedded = EmbeddedImage {
            r_id: "rId7".to_string(),
            partname: PackURI::new("/ppt/media/image1.png").unwrap(),
            px: (640, 480),
        };

        let splice = picture_splice(&shape, &embedded, 12, "CITY_IMAGE_1");
        assert_eq!(splice.range, 10..90);
        let xml = String::from_utf8(splice.bytes).unwrap();
        assert!(xml.starts_with("<p:pic>"));
        assert!(xml.contains(r#"<p:cNvPr id="12" name="CITY_IMAGE_1"/>"#));
        assert!(xml.contains(r#"<a:blip r:embed="rId7"/>"#));
        assert!(xml.contains(r#"<a:off x="914400" y="457200"/>"#));
        assert!(xml.contains(r#"<a:ext cx="1828800" cy="914400"/>"#));
    }

    #[test]
    fn missing_extent_falls_back_to_intrinsic_pixels() {
        let shape = Shape {
            kind: ShapeKind::Sp,
            start: 0,
            end: 1,
            offset: None,
            extent: Some((0, 0)),
            blip: None,
        };
        let embedded = EmbeddedImage {
            r_id: "rId2".to_string(),
            partname: PackURI::new("/ppt/media/image1.png").unwrap(),
            px: (200, 100),
        };

        let xml = String::from_utf8(picture_splice(&shape, &embedded, 2, "x").bytes).unwrap();
        assert!(xml.contains(r#"<a:off x="0" y="0"/>"#));
        assert!(xml.contains(&format!(
            r#"<a:ext cx="{}" cy="{}"/>"#,
            200 * EMU_PER_PIXEL,
            100 * EMU_PER_PIXEL
        )));
    }

    #[test]
    fn picture_host_only_swaps_the_blip() {
        let shape = Shape {
            kind: ShapeKind::Pic,
            start: 0,
            end: 200,
            offset: Some((1, 2)),
            extent: Some((3, 4)),
            blip: Some((40, 64)),
        };
        let embedded = EmbeddedImage {
            r_id: "rId9".to_string(),
            partname: PackURI::new("/ppt/media/image2.jpeg").unwrap(),
            px: (10, 10),
        };

        let splice = picture_splice(&shape, &embedded, 99, "ignored");
        assert_eq!(splice.range, 40..64);
        assert_eq!(splice.bytes, br#"<a:blip r:embed="rId9"/>"#);
    }

    #[test]
    fn embed_wires_part_rel_and_content_type() {
        let mut pkg = Package::open(&crate::opc::package::tests::minimal_pptx()).unwrap();
        let slide = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        let asset = ImageAsset::new(TINY_PNG.to_vec(), "image/png");

        let embedded = embed(&mut pkg, &slide, &asset).unwrap();
        assert_eq!(embedded.partname.as_str(), "/ppt/media/image1.png");
        assert_eq!(embedded.px, (1, 1));
        assert_eq!(pkg.part(&embedded.partname).unwrap(), TINY_PNG);
        assert!(pkg.content_types().declares("image/png"));
        assert_eq!(
            pkg.rels(&slide).unwrap().get(&embedded.r_id).unwrap().target_ref(),
            "../media/image1.png"
        );
    }
}
