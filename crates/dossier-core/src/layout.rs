//! Offset-to-geometry index over the text fragments of a single rendered page.
//!
//! Fragments are joined with exactly one space between neighbours to form the
//! page's *flat text*. Every character offset handed out by an extraction
//! backend is an index into that string, counted in `char`s. The index maps
//! such an offset back to the fragment(s) it came from and derives a bounding
//! box from their transforms.
//!
//! Multi-line matches get a single-line box: the width spans from the start
//! fragment to the end fragment, the height is taken from the start fragment
//! only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PDF affine transform `[a b c d tx ty]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform {
    /// A pure translation.
    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx,
            ty,
        }
    }

    pub fn from_array(m: [f64; 6]) -> Self {
        Self {
            a: m[0],
            b: m[1],
            c: m[2],
            d: m[3],
            tx: m[4],
            ty: m[5],
        }
    }

    fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.tx, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// One positioned run of text as produced by the page source.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// `None` when the page source could not supply a transform.
    pub transform: Option<Transform>,
    pub width: f64,
    pub height: f64,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, transform: Transform, width: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            transform: Some(transform),
            width,
            height,
        }
    }

    /// Whether the fragment carries usable geometry.
    ///
    /// Malformed fragments still take part in separator accounting but
    /// contribute no text to the flat string.
    pub fn is_well_formed(&self) -> bool {
        match self.transform {
            Some(t) => {
                t.is_finite()
                    && self.width.is_finite()
                    && self.height.is_finite()
                    && self.width >= 0.0
                    && self.height > 0.0
            }
            None => false,
        }
    }
}

/// Bounding box in the page's render coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Why an offset could not be turned into geometry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The offset falls into separator space or past the end of the text.
    #[error("offset {char_start} is not inside any text fragment")]
    Unresolvable { char_start: usize },
    /// The end fragment sits left of the start fragment, which would produce
    /// a negative width.
    #[error("match at offset {char_start} ends before it starts on the page")]
    NonMonotonic { char_start: usize },
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    len: usize,
}

impl Span {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Offset table and flat text for one (document, page) render.
///
/// Rebuilt on every render of the page; geometry depends on the render scale.
#[derive(Debug, Clone)]
pub struct TextLayoutIndex {
    fragments: Vec<TextFragment>,
    spans: Vec<Span>,
    flat_text: String,
    char_len: usize,
    scale: f64,
    skipped: usize,
}

impl TextLayoutIndex {
    /// Build an index at render scale 1.0.
    pub fn build(fragments: Vec<TextFragment>) -> Self {
        Self::build_scaled(fragments, 1.0)
    }

    /// Build an index whose resolved geometry is multiplied by `scale`.
    /// A non-positive or non-finite scale is treated as 1.0.
    pub fn build_scaled(fragments: Vec<TextFragment>, scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };

        let mut spans = Vec::with_capacity(fragments.len());
        let mut flat_text = String::new();
        let mut offset = 0usize;
        let mut skipped = 0usize;

        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                flat_text.push(' ');
                offset += 1;
            }
            let len = if fragment.is_well_formed() {
                flat_text.push_str(&fragment.text);
                fragment.text.chars().count()
            } else {
                tracing::debug!(index = i, text = %fragment.text, "skipping malformed text fragment");
                skipped += 1;
                0
            };
            spans.push(Span { start: offset, len });
            offset += len;
        }

        Self {
            fragments,
            spans,
            flat_text,
            char_len: offset,
            scale,
            skipped,
        }
    }

    /// The canonical page text every extraction backend must run against.
    pub fn flat_text(&self) -> &str {
        &self.flat_text
    }

    /// Length of the flat text in `char`s.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn fragments(&self) -> &[TextFragment] {
        &self.fragments
    }

    /// Start offset of each fragment in the flat text.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.spans.iter().map(|s| s.start)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of malformed fragments that contributed an empty span.
    pub fn skipped_fragments(&self) -> usize {
        self.skipped
    }

    /// Resolve a match to geometry, or `None` when it cannot be placed.
    pub fn resolve(&self, char_start: usize, char_length: usize) -> Option<Geometry> {
        self.locate(char_start, char_length).ok()
    }

    /// Resolve a match to geometry, reporting why placement failed.
    pub fn locate(&self, char_start: usize, char_length: usize) -> Result<Geometry, ResolveError> {
        let start_idx = self
            .fragment_at(char_start)
            .ok_or(ResolveError::Unresolvable { char_start })?;
        let match_end = char_start.saturating_add(char_length.max(1));

        // First non-empty fragment from the start onward that reaches the end
        // of the match. Falls back to the start fragment when the match runs
        // past the last fragment.
        let end_idx = self.spans[start_idx..]
            .iter()
            .position(|s| s.len > 0 && s.end() >= match_end)
            .map(|p| p + start_idx)
            .unwrap_or(start_idx);

        let start = &self.fragments[start_idx];
        let Some(st) = start.transform else {
            return Err(ResolveError::Unresolvable { char_start });
        };

        let width = if end_idx == start_idx {
            start.width
        } else {
            let end = &self.fragments[end_idx];
            let Some(et) = end.transform else {
                return Err(ResolveError::Unresolvable { char_start });
            };
            et.tx + end.width - st.tx
        };

        if width < 0.0 {
            tracing::debug!(char_start, char_length, width, "rejecting non-monotonic match");
            return Err(ResolveError::NonMonotonic { char_start });
        }

        Ok(Geometry {
            left: st.tx * self.scale,
            top: (st.ty - start.height) * self.scale,
            width: width * self.scale,
            height: start.height * self.scale,
        })
    }

    /// Index of the fragment whose span contains `char_start`.
    fn fragment_at(&self, char_start: usize) -> Option<usize> {
        let after = self.spans.partition_point(|s| s.start <= char_start);
        let idx = after.checked_sub(1)?;
        let span = self.spans[idx];
        (char_start < span.end()).then_some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, tx: f64, ty: f64, width: f64) -> TextFragment {
        TextFragment::new(text, Transform::translate(tx, ty), width, 10.0)
    }

    fn sentence_page() -> TextLayoutIndex {
        TextLayoutIndex::build(vec![
            frag("Alice", 10.0, 100.0, 30.0),
            frag("went", 45.0, 100.0, 25.0),
            frag("to", 75.0, 100.0, 10.0),
            frag("Paris.", 90.0, 100.0, 35.0),
        ])
    }

    #[test]
    fn flat_text_joins_with_single_spaces() {
        let index = sentence_page();
        assert_eq!(index.flat_text(), "Alice went to Paris.");
        assert_eq!(index.char_len(), 20);
    }

    #[test]
    fn offsets_point_at_fragment_starts() {
        let index = sentence_page();
        let flat: Vec<char> = index.flat_text().chars().collect();
        for (offset, fragment) in index.offsets().zip(index.fragments()) {
            let n = fragment.text.chars().count();
            let slice: String = flat[offset..offset + n].iter().collect();
            assert_eq!(slice, fragment.text);
        }
        assert_eq!(index.offsets().collect::<Vec<_>>(), vec![0, 6, 11, 14]);
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let index = TextLayoutIndex::build(vec![
            frag("Zürich", 0.0, 50.0, 40.0),
            frag("Café", 50.0, 50.0, 30.0),
        ]);
        assert_eq!(index.offsets().collect::<Vec<_>>(), vec![0, 7]);
        assert_eq!(index.char_len(), 11);
        let geometry = index.resolve(7, 4).unwrap();
        assert_eq!(geometry.left, 50.0);
    }

    #[test]
    fn resolves_to_the_containing_fragment() {
        let index = sentence_page();
        let geometry = index.resolve(14, 5).unwrap();
        assert_eq!(geometry.left, 90.0);
        assert_eq!(geometry.top, 90.0);
        assert_eq!(geometry.width, 35.0);
        assert_eq!(geometry.height, 10.0);
    }

    #[test]
    fn width_spans_start_to_end_fragment() {
        let index = sentence_page();
        // "went to"
        let geometry = index.resolve(6, 7).unwrap();
        assert_eq!(geometry.left, 45.0);
        assert_eq!(geometry.width, 75.0 + 10.0 - 45.0);
    }

    #[test]
    fn separator_offset_is_unresolvable() {
        let index = sentence_page();
        assert_eq!(index.resolve(5, 1), None);
        assert_eq!(
            index.locate(5, 1),
            Err(ResolveError::Unresolvable { char_start: 5 })
        );
    }

    #[test]
    fn offset_past_end_is_unresolvable() {
        let index = sentence_page();
        assert_eq!(index.resolve(20, 1), None);
        assert_eq!(index.resolve(500, 3), None);
    }

    #[test]
    fn match_running_past_text_uses_start_width() {
        let index = sentence_page();
        let geometry = index.resolve(14, 40).unwrap();
        assert_eq!(geometry.width, 35.0);
    }

    #[test]
    fn every_in_fragment_offset_resolves_with_positive_height() {
        let index = sentence_page();
        for (offset, fragment) in index.offsets().zip(index.fragments()) {
            for c in offset..offset + fragment.text.chars().count() {
                let g = index.resolve(c, 1).unwrap();
                assert!(g.width >= 0.0);
                assert!(g.height > 0.0);
            }
        }
    }

    #[test]
    fn malformed_fragment_keeps_separator_accounting() {
        let mut broken = frag("lost", 0.0, 0.0, 10.0);
        broken.transform = None;
        let index = TextLayoutIndex::build(vec![
            frag("one", 0.0, 20.0, 20.0),
            broken,
            frag("two", 40.0, 20.0, 20.0),
        ]);
        assert_eq!(index.flat_text(), "one  two");
        assert_eq!(index.offsets().collect::<Vec<_>>(), vec![0, 4, 5]);
        assert_eq!(index.skipped_fragments(), 1);
        assert_eq!(index.resolve(4, 1), None);
        assert_eq!(index.resolve(5, 3).unwrap().left, 40.0);
    }

    #[test]
    fn non_finite_transform_is_malformed() {
        let fragment = TextFragment::new("x", Transform::translate(f64::NAN, 0.0), 1.0, 1.0);
        assert!(!fragment.is_well_formed());
        let flat = TextFragment::new("x", Transform::translate(0.0, 0.0), 1.0, 0.0);
        assert!(!flat.is_well_formed());
    }

    #[test]
    fn end_fragment_left_of_start_is_rejected() {
        // Second line wraps back to the left margin.
        let index = TextLayoutIndex::build(vec![
            frag("New", 300.0, 100.0, 30.0),
            frag("York", 10.0, 115.0, 30.0),
        ]);
        assert_eq!(
            index.locate(0, 8),
            Err(ResolveError::NonMonotonic { char_start: 0 })
        );
    }

    #[test]
    fn geometry_follows_render_scale() {
        let fragments = vec![frag("Paris", 10.0, 100.0, 30.0)];
        let index = TextLayoutIndex::build_scaled(fragments, 2.0);
        let g = index.resolve(0, 5).unwrap();
        assert_eq!(g.left, 20.0);
        assert_eq!(g.top, 180.0);
        assert_eq!(g.width, 60.0);
        assert_eq!(g.height, 20.0);
    }

    #[test]
    fn empty_page_resolves_nothing() {
        let index = TextLayoutIndex::build(vec![]);
        assert_eq!(index.flat_text(), "");
        assert_eq!(index.resolve(0, 1), None);
    }
}
