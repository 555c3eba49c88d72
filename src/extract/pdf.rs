//! PDF content-stream walker built on `lopdf`.
//!
//! Only the text state needed to place fragments is tracked:
//!
//! | Operator | Action |
//! |----------|--------|
//! | `BT`     | Reset text and line matrices |
//! | `q` `Q`  | Push / pop the graphics matrix |
//! | `cm`     | Concatenate onto the graphics matrix |
//! | `Tf`     | Font size |
//! | `Tm`     | Set text matrix |
//! | `Td` `TD` `T*` `TL` | Line positioning and leading |
//! | `Tc` `Tw` `Tz` `Ts` | Spacing, scaling, rise |
//! | `Tj` `TJ` `'` `"`   | Show text |
//!
//! Strings are decoded through the encoding of the font selected by `Tf`
//! (simple encodings and `ToUnicode` maps, as resolved by `lopdf`). Strings in
//! fonts lopdf cannot map fall back to a UTF-16BE byte-order mark, then to
//! WinAnsi. Glyph widths are not read from font programs; the horizontal
//! advance after a show is estimated from the character count.

use super::{Fragment, FragmentSource, PageFragments};
use crate::cancellation::CancellationToken;
use crate::error::DocumentParseError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Encoding, Object, ObjectId, dictionary};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;
/// TJ adjustments at or below this (thousandths of text space) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;
const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

type Matrix = [f32; 6];

/// Stand-in font used when a string's own font has no usable encoding.
static FALLBACK_FONT: Lazy<Dictionary> = Lazy::new(|| {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "Encoding" => "WinAnsiEncoding",
    }
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfFragmentSource;

impl PdfFragmentSource {
    pub fn new() -> Self {
        Self
    }
}

impl FragmentSource for PdfFragmentSource {
    fn extract(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<PageFragments>, DocumentParseError> {
        cancel.check_cancelled("open")?;
        let doc = Document::load_mem(bytes)
            .map_err(|err| DocumentParseError::Corrupt(format!("unreadable PDF: {err}")))?;

        let pages = doc.get_pages();
        info!(pages = pages.len(), "Opened PDF");

        let mut out = Vec::with_capacity(pages.len());
        for (page_number, page_id) in pages {
            cancel.check_cancelled("page")?;
            let raw = doc.get_page_content(page_id).map_err(|err| {
                DocumentParseError::Corrupt(format!("page {page_number} content: {err}"))
            })?;
            let content = Content::decode(&raw).map_err(|err| {
                DocumentParseError::Corrupt(format!("page {page_number} operators: {err}"))
            })?;

            let fonts = FontDecoder::for_page(&doc, page_id);
            let fragments = walk_operations(&content.operations, &fonts);
            debug!(
                page = page_number,
                operations = content.operations.len(),
                fragments = fragments.len(),
                "Extracted page fragments"
            );
            out.push(PageFragments::new(page_number as usize, fragments));
        }

        Ok(out)
    }
}

#[derive(Debug)]
struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horiz_scale: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    /// Current text origin mapped through the graphics matrix.
    fn position(&self) -> (f32, f32) {
        let tx = self.text_matrix[4] + self.rise * self.text_matrix[2];
        let ty = self.text_matrix[5] + self.rise * self.text_matrix[3];
        let m = &self.ctm;
        (m[0] * tx + m[2] * ty + m[4], m[1] * tx + m[3] * ty + m[5])
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        let m = &self.line_matrix;
        let e = m[0] * tx + m[2] * ty + m[4];
        let f = m[1] * tx + m[3] * ty + m[5];
        self.line_matrix[4] = e;
        self.line_matrix[5] = f;
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    fn advance_after_show(&mut self, text: &str) {
        let mut dx = 0.0;
        for ch in text.chars() {
            dx += self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale + self.char_spacing;
            if ch == ' ' {
                dx += self.word_spacing;
            }
        }
        self.advance_x(dx);
    }
}

fn multiply(lhs: &Matrix, rhs: &Matrix) -> Matrix {
    [
        lhs[0] * rhs[0] + lhs[1] * rhs[2],
        lhs[0] * rhs[1] + lhs[1] * rhs[3],
        lhs[2] * rhs[0] + lhs[3] * rhs[2],
        lhs[2] * rhs[1] + lhs[3] * rhs[3],
        lhs[4] * rhs[0] + lhs[5] * rhs[2] + rhs[4],
        lhs[4] * rhs[1] + lhs[5] * rhs[3] + rhs[5],
    ]
}

fn number(obj: &Object) -> Option<f32> {
    obj.as_float().ok()
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(m)
}

fn pair_operands(operands: &[Object]) -> Option<(f32, f32)> {
    match operands {
        [a, b, ..] => Some((number(a)?, number(b)?)),
        _ => None,
    }
}

/// String decoding for one page: the encodings of the page's fonts, keyed by
/// resource name.
struct FontDecoder<'a> {
    fonts: BTreeMap<Vec<u8>, Encoding<'a>>,
    fallback: Option<Encoding<'static>>,
}

impl<'a> FontDecoder<'a> {
    fn for_page(doc: &'a Document, page_id: ObjectId) -> Self {
        let mut fonts = BTreeMap::new();
        match doc.get_page_fonts(page_id) {
            Ok(page_fonts) => {
                for (name, font) in page_fonts {
                    match font.get_font_encoding(doc) {
                        Ok(encoding) => {
                            fonts.insert(name, encoding);
                        }
                        Err(err) => debug!(
                            font = %String::from_utf8_lossy(&name),
                            "No usable font encoding: {err}"
                        ),
                    }
                }
            }
            Err(err) => warn!(?page_id, "Could not read page fonts: {err}"),
        }
        Self {
            fonts,
            fallback: fallback_encoding(),
        }
    }

    /// No font resources at all; everything goes through the fallbacks.
    fn plain() -> Self {
        Self {
            fonts: BTreeMap::new(),
            fallback: fallback_encoding(),
        }
    }

    /// Decode a shown string. Ligatures are expanded by NFKC and control
    /// characters (NULs from unmapped two-byte codes included) are dropped.
    fn decode(&self, font: Option<&[u8]>, bytes: &[u8]) -> String {
        let from_font = font
            .and_then(|name| self.fonts.get(name))
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok());
        let raw = match from_font {
            Some(text) => text,
            None => self.decode_without_font(bytes),
        };
        raw.nfkc()
            .filter_map(|ch| match ch {
                '\t' | '\n' | '\r' => Some(' '),
                ch if ch.is_control() => None,
                ch => Some(ch),
            })
            .collect()
    }

    fn decode_without_font(&self, bytes: &[u8]) -> String {
        if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            return String::from_utf16_lossy(&units);
        }
        self.fallback
            .as_ref()
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| bytes.iter().map(|&b| char::from(b)).collect())
    }

    fn string_operand(&self, font: Option<&[u8]>, obj: &Object) -> Option<String> {
        match obj {
            Object::String(bytes, _) => Some(self.decode(font, bytes)),
            _ => None,
        }
    }
}

fn fallback_encoding() -> Option<Encoding<'static>> {
    // The WinAnsi branch never consults the document.
    let scratch = Document::new();
    FALLBACK_FONT.get_font_encoding(&scratch).ok()
}

fn emit((x, y): (f32, f32), text: String, out: &mut Vec<Fragment>) {
    if text.is_empty() {
        return;
    }
    if !x.is_finite() || !y.is_finite() {
        warn!(%text, "Skipping fragment with non-finite position");
        return;
    }
    out.push(Fragment { text, x, y });
}

fn show_string(
    obj: &Object,
    fonts: &FontDecoder<'_>,
    state: &mut TextState,
    out: &mut Vec<Fragment>,
) {
    if let Some(text) = fonts.string_operand(state.font.as_deref(), obj) {
        let origin = state.position();
        state.advance_after_show(&text);
        emit(origin, text, out);
    }
}

/// One fragment per TJ array, placed where the first string starts.
fn show_array(
    items: &[Object],
    fonts: &FontDecoder<'_>,
    state: &mut TextState,
    out: &mut Vec<Fragment>,
) {
    let mut buf = String::new();
    let mut origin: Option<(f32, f32)> = None;

    for item in items {
        if let Some(text) = fonts.string_operand(state.font.as_deref(), item) {
            if origin.is_none() {
                origin = Some(state.position());
            }
            state.advance_after_show(&text);
            buf.push_str(&text);
        } else if let Some(adjust) = number(item) {
            if adjust <= TJ_SPACE_THRESHOLD && !buf.is_empty() && !buf.ends_with(' ') {
                buf.push(' ');
            }
            state.advance_x(-adjust / 1000.0 * state.font_size * state.horiz_scale);
        }
    }

    if let Some(origin) = origin {
        emit(origin, buf, out);
    }
}

fn walk_operations(operations: &[Operation], fonts: &FontDecoder<'_>) -> Vec<Fragment> {
    let mut state = TextState::default();
    let mut out = Vec::new();

    for op in operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.ctm_stack.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(|obj| obj.as_name().ok()) {
                    state.font = Some(name.to_vec());
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let Some((tx, ty)) = pair_operands(operands) {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = pair_operands(operands) {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.next_line(),
            "TL" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = operands.first().and_then(number) {
                    state.rise = v;
                }
            }
            "Tj" => {
                if let Some(obj) = operands.first() {
                    show_string(obj, fonts, &mut state, &mut out);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    show_array(items, fonts, &mut state, &mut out);
                }
            }
            "'" => {
                state.next_line();
                if let Some(obj) = operands.first() {
                    show_string(obj, fonts, &mut state, &mut out);
                }
            }
            "\"" => {
                if let [aw, ac, text, ..] = operands {
                    if let Some(v) = number(aw) {
                        state.word_spacing = v;
                    }
                    if let Some(v) = number(ac) {
                        state.char_spacing = v;
                    }
                    state.next_line();
                    show_string(text, fonts, &mut state, &mut out);
                }
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let win_ansi = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let mac_roman = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => "MacRomanEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => win_ansi, "F2" => mac_roman },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("pdf saves");
        bytes
    }

    fn text_line(x: i64, y: i64, text: &str) -> Vec<Operation> {
        raw_line("F1", x, y, text.as_bytes())
    }

    fn raw_line(font: &str, x: i64, y: i64, bytes: &[u8]) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(bytes.to_vec())]),
            Operation::new("ET", vec![]),
        ]
    }

    fn extract_texts(pages: Vec<Vec<Operation>>) -> Vec<String> {
        let bytes = build_pdf(pages);
        PdfFragmentSource::new()
            .extract(&bytes, &CancellationToken::new())
            .expect("pdf extracts")
            .into_iter()
            .flat_map(|page| page.fragments)
            .map(|fragment| fragment.text)
            .collect()
    }

    #[test]
    fn extracts_positioned_fragments_per_page() {
        let first = [text_line(72, 700, "Hello"), text_line(72, 680, "world")].concat();
        let second = text_line(72, 700, "Again");
        let bytes = build_pdf(vec![first, second]);

        let pages = PdfFragmentSource::new()
            .extract(&bytes, &CancellationToken::new())
            .expect("pdf extracts");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        let texts: Vec<&str> = pages[0].fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "world"]);
        assert!((pages[0].fragments[0].y - 700.0).abs() < 0.01);
        assert!((pages[0].fragments[1].y - 680.0).abs() < 0.01);
        assert_eq!(pages[1].fragments[0].text, "Again");
    }

    #[test]
    fn graphics_matrix_moves_text() {
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 20.into()],
            ),
        ];
        ops.extend(text_line(5, 100, "shifted"));
        ops.push(Operation::new("Q", vec![]));
        ops.extend(text_line(5, 100, "plain"));

        let fragments = walk_operations(&ops, &FontDecoder::plain());
        assert_eq!(fragments.len(), 2);
        assert!((fragments[0].x - 15.0).abs() < 0.01);
        assert!((fragments[0].y - 120.0).abs() < 0.01);
        assert!((fragments[1].x - 5.0).abs() < 0.01);
        assert!((fragments[1].y - 100.0).abs() < 0.01);
    }

    #[test]
    fn tj_array_inserts_space_for_wide_gaps() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Ke"),
                    (-40).into(),
                    Object::string_literal("rned"),
                    (-300).into(),
                    Object::string_literal("text"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];

        let fragments = walk_operations(&ops, &FontDecoder::plain());
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "Kerned text");
    }

    #[test]
    fn decodes_utf16_and_expands_ligatures() {
        let fonts = FontDecoder::plain();
        assert_eq!(fonts.decode(None, &[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(fonts.decode(None, &[0xFE, 0xFF, 0xFB, 0x01]), "fi");
    }

    #[test]
    fn unmapped_bytes_fall_back_to_win_ansi_without_controls() {
        let fonts = FontDecoder::plain();
        assert_eq!(fonts.decode(None, b"don\x92t"), "don\u{2019}t");
        assert_eq!(fonts.decode(None, &[0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(
            fonts.decode(Some(b"F9".as_slice()), &[0xFE, 0xFF, 0x00, b't', 0x00, 0x09, 0x00, b'x']),
            "t x"
        );
    }

    #[test]
    fn win_ansi_font_decodes_curly_quotes() {
        let texts = extract_texts(vec![raw_line("F1", 72, 700, b"don\x92t \x93quote\x94")]);
        assert_eq!(texts, vec!["don\u{2019}t \u{201C}quote\u{201D}"]);
    }

    #[test]
    fn font_selected_by_tf_drives_decoding() {
        let page = [
            raw_line("F2", 72, 700, b"caf\x8E"),
            raw_line("F1", 72, 680, b"caf\xE9"),
        ]
        .concat();
        assert_eq!(extract_texts(vec![page]), vec!["caf\u{E9}", "caf\u{E9}"]);
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        let err = PdfFragmentSource::new()
            .extract(b"definitely not a pdf", &CancellationToken::new())
            .expect_err("garbage must fail");
        assert!(matches!(err, DocumentParseError::Corrupt(_)));
    }

    #[test]
    fn cancelled_token_aborts_extraction() {
        let bytes = build_pdf(vec![text_line(72, 700, "Hello")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = PdfFragmentSource::new()
            .extract(&bytes, &cancel)
            .expect_err("cancelled load must fail");
        assert!(matches!(err, DocumentParseError::Cancelled { .. }));
    }
}
