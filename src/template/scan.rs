//! Placeholder scanning over slide markup.
//!
//! A slide part is parsed once into a lightweight model: paragraphs of
//! styled runs with their byte spans in the source XML, plus the shapes
//! that host them. Placeholder tokens are then located on the paragraph's
//! concatenated run text, so a token is found no matter how many run
//! boundaries the authoring tool split it across, including delimiters
//! that themselves straddle two runs.

use crate::opc::error::{OpcError, Result};
use crate::xml::resolve_entity;
use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::Event;

/// One styled text run (`a:r`) inside a paragraph.
#[derive(Debug)]
pub(crate) struct Run {
    /// Byte span of the whole run element in the part XML.
    pub start: usize,
    pub end: usize,

    /// Byte span of the run's `a:rPr` style element, copied verbatim when
    /// the run is rewritten.
    pub rpr: Option<(usize, usize)>,

    /// Unescaped text content of the run.
    pub text: String,
}

/// One paragraph (`a:p`) and the shape hosting it.
#[derive(Debug)]
pub(crate) struct Paragraph {
    pub runs: Vec<Run>,
    pub shape: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShapeKind {
    /// A `p:sp` text shape.
    Sp,
    /// A `p:pic` picture shape.
    Pic,
}

/// A shape subtree (`p:sp` or `p:pic`) in the slide's shape tree.
#[derive(Debug)]
pub(crate) struct Shape {
    pub kind: ShapeKind,
    pub start: usize,
    pub end: usize,

    /// `a:off` position from the shape's transform, in EMU.
    pub offset: Option<(i64, i64)>,

    /// `a:ext` extent from the shape's transform, in EMU.
    pub extent: Option<(i64, i64)>,

    /// Byte span of the `a:blip` element for picture shapes.
    pub blip: Option<(usize, usize)>,
}

/// Character span of one token over a paragraph's runs.
///
/// Offsets are byte positions within the named run's unescaped text; the
/// end offset is exclusive. Concatenating the spanned characters yields the
/// raw token exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpan {
    pub start_run: usize,
    pub start_off: usize,
    pub end_run: usize,
    pub end_off: usize,
}

/// One placeholder occurrence found in a part, in document order.
#[derive(Debug)]
pub(crate) struct Occurrence {
    /// The raw token text including delimiters, e.g. `{{TITLE}}`.
    pub raw: String,
    pub paragraph: usize,
    pub span: RunSpan,
    pub shape: Option<usize>,
}

/// Parsed model of one slide part.
#[derive(Debug, Default)]
pub(crate) struct SlideDoc {
    pub paragraphs: Vec<Paragraph>,
    pub shapes: Vec<Shape>,

    /// Highest `cNvPr` id seen, so generated shapes get fresh ids.
    pub max_shape_id: u32,
}

impl SlideDoc {
    /// Parse a slide part's XML.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut doc = SlideDoc::default();
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();

        let mut shape_stack: Vec<usize> = Vec::new();
        let mut in_xfrm = false;
        let mut in_text = false;
        let mut para: Option<Paragraph> = None;
        let mut run: Option<Run> = None;
        let mut rpr_start = 0usize;
        let mut blip_start = 0usize;

        let mut pos = 0usize;
        loop {
            let event = reader.read_event_into(&mut buf);
            let evt_start = pos;
            let evt_end = reader.buffer_position() as usize;
            pos = evt_end;

            match event {
                Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                    b"sp" => shape_stack.push(doc.push_shape(ShapeKind::Sp, evt_start)),
                    b"pic" => shape_stack.push(doc.push_shape(ShapeKind::Pic, evt_start)),
                    b"xfrm" if !shape_stack.is_empty() => in_xfrm = true,
                    b"p" => {
                        para = Some(Paragraph {
                            runs: Vec::new(),
                            shape: shape_stack.last().copied(),
                        });
                    },
                    b"r" if para.is_some() => {
                        run = Some(Run {
                            start: evt_start,
                            end: evt_start,
                            rpr: None,
                            text: String::new(),
                        });
                    },
                    b"rPr" if run.is_some() => rpr_start = evt_start,
                    b"t" if run.is_some() => in_text = true,
                    b"cNvPr" => doc.note_shape_id(e.attributes()),
                    b"blip" => blip_start = evt_start,
                    _ => {},
                },
                Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                    b"rPr" if run.is_some() => {
                        if let Some(run) = run.as_mut() {
                            run.rpr = Some((evt_start, evt_end));
                        }
                    },
                    b"off" if in_xfrm => {
                        if let Some(&idx) = shape_stack.last() {
                            let xy = read_pair(e.attributes(), b"x", b"y");
                            let shape = &mut doc.shapes[idx];
                            if shape.offset.is_none() {
                                shape.offset = xy;
                            }
                        }
                    },
                    b"ext" if in_xfrm => {
                        if let Some(&idx) = shape_stack.last() {
                            let cxcy = read_pair(e.attributes(), b"cx", b"cy");
                            let shape = &mut doc.shapes[idx];
                            if shape.extent.is_none() {
                                shape.extent = cxcy;
                            }
                        }
                    },
                    b"cNvPr" => doc.note_shape_id(e.attributes()),
                    b"blip" => doc.note_blip(&shape_stack, evt_start, evt_end),
                    _ => {},
                },
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"sp" | b"pic" => {
                        if let Some(idx) = shape_stack.pop() {
                            doc.shapes[idx].end = evt_end;
                        }
                    },
                    b"xfrm" => in_xfrm = false,
                    b"p" => {
                        if let Some(para) = para.take() {
                            doc.paragraphs.push(para);
                        }
                    },
                    b"r" => {
                        if let Some(mut finished) = run.take() {
                            finished.end = evt_end;
                            if let Some(para) = para.as_mut() {
                                para.runs.push(finished);
                            }
                        }
                    },
                    b"rPr" => {
                        if let Some(run) = run.as_mut() {
                            run.rpr = Some((rpr_start, evt_end));
                        }
                    },
                    b"t" => in_text = false,
                    b"blip" => doc.note_blip(&shape_stack, blip_start, evt_end),
                    _ => {},
                },
                Ok(Event::Text(ref e)) if in_text => {
                    if let Some(run) = run.as_mut() {
                        let raw = std::str::from_utf8(e.as_ref())
                            .map_err(|e| OpcError::Xml(e.to_string()))?;
                        run.text.push_str(raw);
                    }
                },
                Ok(Event::GeneralRef(ref e)) if in_text => {
                    if let Some(run) = run.as_mut() {
                        let entity = std::str::from_utf8(e.as_ref())
                            .map_err(|e| OpcError::Xml(e.to_string()))?;
                        match resolve_entity(entity) {
                            Some(resolved) => run.text.push_str(&resolved),
                            // Unknown entity: keep the reference verbatim so
                            // an untouched run round-trips.
                            None => {
                                run.text.push('&');
                                run.text.push_str(entity);
                                run.text.push(';');
                            },
                        }
                    }
                },
                Ok(Event::CData(ref e)) if in_text => {
                    if let Some(run) = run.as_mut() {
                        let raw = std::str::from_utf8(e.as_ref())
                            .map_err(|e| OpcError::Xml(e.to_string()))?;
                        run.text.push_str(raw);
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::Xml(format!("slide parse error: {e}"))),
                _ => {},
            }
            buf.clear();
        }

        Ok(doc)
    }

    /// Locate `{{...}}` tokens over each paragraph's concatenated run text,
    /// in document order, and map them back to minimal run spans.
    pub fn find_placeholders(&self) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();
        for (pi, para) in self.paragraphs.iter().enumerate() {
            let mut concat = String::new();
            let mut run_starts = Vec::with_capacity(para.runs.len());
            for run in &para.runs {
                run_starts.push(concat.len());
                concat.push_str(&run.text);
            }

            for (tok_start, tok_end) in find_tokens(concat.as_bytes()) {
                occurrences.push(Occurrence {
                    raw: concat[tok_start..tok_end].to_string(),
                    paragraph: pi,
                    span: span_for(&run_starts, tok_start, tok_end),
                    shape: para.shape,
                });
            }
        }
        occurrences
    }

    fn push_shape(&mut self, kind: ShapeKind, start: usize) -> usize {
        self.shapes.push(Shape {
            kind,
            start,
            end: start,
            offset: None,
            extent: None,
            blip: None,
        });
        self.shapes.len() - 1
    }

    fn note_shape_id(&mut self, attrs: quick_xml::events::attributes::Attributes<'_>) {
        for attr in attrs.flatten() {
            if attr.key.as_ref() == b"id"
                && let Ok(id) = std::str::from_utf8(&attr.value)
                && let Ok(id) = id.parse::<u32>()
            {
                self.max_shape_id = self.max_shape_id.max(id);
            }
        }
    }

    fn note_blip(&mut self, shape_stack: &[usize], start: usize, end: usize) {
        if let Some(&idx) = shape_stack.last() {
            let shape = &mut self.shapes[idx];
            if shape.kind == ShapeKind::Pic && shape.blip.is_none() {
                shape.blip = Some((start, end));
            }
        }
    }
}

/// Token delimiter search: non-greedy, innermost `{{` wins, an unterminated
/// `{{` is not an occurrence.
fn find_tokens(haystack: &[u8]) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while let Some(found) = memmem::find(&haystack[pos..], b"{{") {
        let open = pos + found;
        let Some(close) = memmem::find(&haystack[open + 2..], b"}}") else {
            break;
        };
        let close = open + 2 + close;
        // A second "{{" before the close means the outer one never
        // terminates; the inner token wins.
        let start = memmem::rfind(&haystack[open + 2..close], b"{{")
            .map(|inner| open + 2 + inner)
            .unwrap_or(open);
        tokens.push((start, close + 2));
        pos = close + 2;
    }
    tokens
}

/// Read a pair of named numeric attributes, e.g. `x`/`y` on `a:off` or
/// `cx`/`cy` on `a:ext`. Both must be present and parse as `i64`.
fn read_pair(
    attrs: quick_xml::events::attributes::Attributes<'_>,
    first: &[u8],
    second: &[u8],
) -> Option<(i64, i64)> {
    let mut a = None;
    let mut b = None;
    for attr in attrs.flatten() {
        let key = attr.key.as_ref();
        if key != first && key != second {
            continue;
        }
        let Ok(text) = std::str::from_utf8(&attr.value) else {
            continue;
        };
        let Ok(value) = text.parse::<i64>() else {
            continue;
        };
        if key == first {
            a = Some(value);
        } else {
            b = Some(value);
        }
    }
    Some((a?, b?))
}

/// Minimal run span covering the byte range `[tok_start, tok_end)` of the
/// concatenated paragraph text.
fn span_for(run_starts: &[usize], tok_start: usize, tok_end: usize) -> RunSpan {
    let run_at = |pos: usize| run_starts.partition_point(|&s| s <= pos) - 1;
    let start_run = run_at(tok_start);
    let end_run = run_at(tok_end - 1);
    RunSpan {
        start_run,
        start_off: tok_start - run_starts[start_run],
        end_run,
        end_off: tok_end - run_starts[end_run],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree>{body}</p:spTree></p:cSld></p:sld>"#
        )
    }

    #[test]
    fn whole_token_in_one_run() {
        let xml = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:rPr lang="en-US" b="1"/><a:t>Welcome to {{TITLE}}!</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let occs = doc.find_placeholders();

        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].raw, "{{TITLE}}");
        assert_eq!(
            occs[0].span,
            RunSpan {
                start_run: 0,
                start_off: 11,
                end_run: 0,
                end_off: 20,
            }
        );
        let run = &doc.paragraphs[0].runs[0];
        assert_eq!(run.text, "Welcome to {{TITLE}}!");
        let rpr = run.rpr.unwrap();
        assert_eq!(&xml.as_bytes()[rpr.0..rpr.1], br#"<a:rPr lang="en-US" b="1"/>"#);
    }

    #[test]
    fn token_fragmented_across_three_runs() {
        let xml = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:rPr b="1"/><a:t>{{TRANSIT_</a:t></a:r><a:r><a:rPr i="1"/><a:t>HUB_IMA</a:t></a:r><a:r><a:t>GE_1}}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let occs = doc.find_placeholders();

        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].raw, "{{TRANSIT_HUB_IMAGE_1}}");
        assert_eq!(
            occs[0].span,
            RunSpan {
                start_run: 0,
                start_off: 0,
                end_run: 2,
                end_off: 6,
            }
        );
    }

    #[test]
    fn delimiters_split_across_runs() {
        let xml = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>{</a:t></a:r><a:r><a:t>{CITY}</a:t></a:r><a:r><a:t>}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let occs = doc.find_placeholders();
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].raw, "{{CITY}}");
        assert_eq!(occs[0].span.start_run, 0);
        assert_eq!(occs[0].span.end_run, 2);
    }

    #[test]
    fn unterminated_open_is_not_an_occurrence() {
        let xml = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>{{DANGLING and {{REAL}}</a:t></a:r></a:p><a:p><a:r><a:t>{{NEVER CLOSED</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let occs = doc.find_placeholders();
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].raw, "{{REAL}}");
    }

    #[test]
    fn occurrences_come_in_document_order() {
        let xml = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>{{A}} then {{B}}</a:t></a:r></a:p><a:p><a:r><a:t>{{C}}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let raws: Vec<_> = doc.find_placeholders().into_iter().map(|o| o.raw).collect();
        assert_eq!(raws, ["{{A}}", "{{B}}", "{{C}}"]);
    }

    #[test]
    fn entities_in_run_text_are_unescaped() {
        let xml = slide(
            r#"<p:sp><p:txBody><a:p><a:r><a:t>Fish &amp; chips {{TITLE}}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.paragraphs[0].runs[0].text, "Fish & chips {{TITLE}}");
        assert_eq!(doc.find_placeholders()[0].span.start_off, 13);
    }

    #[test]
    fn shape_geometry_and_host_tracking() {
        let xml = slide(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="7" name="Placeholder 7"/></p:nvSpPr><p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="300" cy="400"/></a:xfrm></p:spPr><p:txBody><a:p><a:r><a:t>{{NATURAL_SITE_IMAGE_1}}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();

        assert_eq!(doc.shapes.len(), 1);
        assert_eq!(doc.max_shape_id, 7);
        let shape = &doc.shapes[0];
        assert_eq!(shape.kind, ShapeKind::Sp);
        assert_eq!(shape.offset, Some((100, 200)));
        assert_eq!(shape.extent, Some((300, 400)));
        assert_eq!(&xml.as_bytes()[shape.start..shape.start + 5], b"<p:sp");
        assert!(xml.as_bytes()[..shape.end].ends_with(b"</p:sp>"));

        let occ = &doc.find_placeholders()[0];
        assert_eq!(occ.shape, Some(0));
    }

    #[test]
    fn incomplete_transform_attributes_leave_geometry_unset() {
        let xml = slide(
            r#"<p:sp><p:spPr><a:xfrm><a:off x="100"/><a:ext cx="bad" cy="400"/></a:xfrm></p:spPr><p:txBody><a:p><a:r><a:t>text</a:t></a:r></a:p></p:txBody></p:sp>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let shape = &doc.shapes[0];
        assert_eq!(shape.offset, None);
        assert_eq!(shape.extent, None);
    }

    #[test]
    fn picture_shape_records_blip_span() {
        let xml = slide(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture 4" descr="{{CITY_IMAGE_1}}"/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="100" cy="100"/></a:xfrm></p:spPr></p:pic>"#,
        );
        let doc = SlideDoc::parse(xml.as_bytes()).unwrap();
        let shape = &doc.shapes[0];
        assert_eq!(shape.kind, ShapeKind::Pic);
        let blip = shape.blip.unwrap();
        assert_eq!(
            &xml.as_bytes()[blip.0..blip.1],
            br#"<a:blip r:embed="rId2"/>"#
        );
    }

    #[test]
    fn find_tokens_innermost_open_wins() {
        let tokens = find_tokens(b"x{{A{{B}}y");
        assert_eq!(tokens, vec![(4, 9)]);
    }
}
