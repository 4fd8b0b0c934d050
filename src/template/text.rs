//! Text substitution over run spans.
//!
//! Each decided occurrence becomes a span edit: the token's characters are
//! replaced by the resolved text. Characters before the token stay in the
//! span's first run (followed by the replacement, so the replacement
//! carries that run's style); characters after the token stay in the last
//! run; runs left empty are removed from the paragraph. Runs outside the
//! span keep their original bytes untouched, as does everything else in
//! the part.

use crate::error::{RenderError, Result};
use crate::template::scan::{RunSpan, SlideDoc};
use crate::xml::escape_xml;
use std::collections::BTreeMap;
use std::ops::Range;

/// One decided text replacement over a paragraph's runs.
#[derive(Debug)]
pub(crate) struct SpanEdit {
    pub paragraph: usize,
    pub span: RunSpan,
    pub replacement: String,
}

/// A byte splice into a part's XML.
#[derive(Debug)]
pub(crate) struct Splice {
    pub range: Range<usize>,
    pub bytes: Vec<u8>,
}

/// Turn span edits into byte splices over the part XML.
///
/// Span offsets refer to the original run texts, so edits within one
/// paragraph are applied back to front; earlier offsets stay valid because
/// spans never overlap.
pub(crate) fn run_splices(xml: &[u8], doc: &SlideDoc, edits: &[SpanEdit]) -> Vec<Splice> {
    let mut by_paragraph: BTreeMap<usize, Vec<&SpanEdit>> = BTreeMap::new();
    for edit in edits {
        by_paragraph.entry(edit.paragraph).or_default().push(edit);
    }

    let mut splices = Vec::new();
    for (&pi, para_edits) in &by_paragraph {
        let para = &doc.paragraphs[pi];
        let mut new_texts: Vec<Option<String>> = vec![None; para.runs.len()];
        let text_of = |new_texts: &[Option<String>], i: usize| -> String {
            new_texts[i]
                .clone()
                .unwrap_or_else(|| para.runs[i].text.clone())
        };

        for edit in para_edits.iter().rev() {
            let span = &edit.span;
            if span.start_run == span.end_run {
                let cur = text_of(&new_texts, span.start_run);
                new_texts[span.start_run] = Some(format!(
                    "{}{}{}",
                    &cur[..span.start_off],
                    edit.replacement,
                    &cur[span.end_off..]
                ));
            } else {
                let first = text_of(&new_texts, span.start_run);
                new_texts[span.start_run] =
                    Some(format!("{}{}", &first[..span.start_off], edit.replacement));
                for i in span.start_run + 1..span.end_run {
                    new_texts[i] = Some(String::new());
                }
                let last = text_of(&new_texts, span.end_run);
                new_texts[span.end_run] = Some(last[span.end_off..].to_string());
            }
        }

        for (i, new_text) in new_texts.into_iter().enumerate() {
            let Some(new_text) = new_text else { continue };
            let run = &para.runs[i];
            if new_text == run.text {
                continue;
            }
            let bytes = if new_text.is_empty() {
                // Drop the run entirely rather than leave a dangling rPr.
                Vec::new()
            } else {
                rebuild_run(xml, run.rpr, &new_text)
            };
            splices.push(Splice {
                range: run.start..run.end,
                bytes,
            });
        }
    }
    splices
}

fn rebuild_run(xml: &[u8], rpr: Option<(usize, usize)>, text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 64);
    out.extend_from_slice(b"<a:r>");
    if let Some((start, end)) = rpr {
        out.extend_from_slice(&xml[start..end]);
    }
    out.extend_from_slice(b"<a:t>");
    out.extend_from_slice(escape_xml(text).as_bytes());
    out.extend_from_slice(b"</a:t></a:r>");
    out
}

/// Apply a set of non-overlapping splices to the part XML.
///
/// Overlap means two mutations claimed the same bytes; that is a defect in
/// edit planning, not bad input.
pub(crate) fn apply_splices(xml: &[u8], mut splices: Vec<Splice>) -> Result<Vec<u8>> {
    splices.sort_by_key(|s| s.range.start);

    let mut out = Vec::with_capacity(xml.len());
    let mut pos = 0;
    for splice in &splices {
        if splice.range.start < pos || splice.range.end > xml.len() {
            return Err(RenderError::Serialization(format!(
                "overlapping edits at byte {}",
                splice.range.start
            )));
        }
        out.extend_from_slice(&xml[pos..splice.range.start]);
        out.extend_from_slice(&splice.bytes);
        pos = splice.range.end;
    }
    out.extend_from_slice(&xml[pos..]);
    Ok(out)
}
