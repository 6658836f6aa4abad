//! Page font resources: text decoding and glyph advance widths
//!
//! Span bounding boxes need real advance widths so that the table filter can
//! measure overlap. Simple fonts carry `/Widths`, composite fonts carry `/W`
//! in their descendant; anything else falls back to half an em per glyph.

use crate::tounicode::ToUnicodeCMap;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap};

/// Glyph width (in 1/1000 em) used when a font carries no metrics
const FALLBACK_GLYPH_WIDTH: f32 = 500.0;

/// Resolve an indirect reference, leaving direct objects untouched
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Numeric value of an integer or real object
pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// A font resource with everything needed to turn string operands into text
#[derive(Debug)]
pub struct FontInfo<'a> {
    dict: &'a Dictionary,
    /// PostScript name from /BaseFont (subset prefix stripped)
    pub base_font: String,
    /// Type0 fonts use 2-byte codes
    pub composite: bool,
    cmap: Option<ToUnicodeCMap>,
    first_char: i64,
    widths: Vec<f32>,
    cid_widths: HashMap<u16, f32>,
    default_width: f32,
}

impl<'a> FontInfo<'a> {
    pub fn load(doc: &'a Document, dict: &'a Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)).to_string())
            .unwrap_or_default();

        let composite = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Type0");

        let mut info = FontInfo {
            dict,
            base_font,
            composite,
            cmap: ToUnicodeCMap::from_font(doc, dict),
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: FALLBACK_GLYPH_WIDTH,
        };

        if composite {
            info.load_cid_widths(doc);
        } else {
            info.load_simple_widths(doc);
        }

        info
    }

    fn load_simple_widths(&mut self, doc: &Document) {
        self.first_char = self
            .dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        if let Ok(widths) = self.dict.get(b"Widths") {
            if let Ok(array) = resolve(doc, widths).as_array() {
                self.widths = array
                    .iter()
                    .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0))
                    .collect();
            }
        }

        let missing = self
            .dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|d| resolve(doc, d).as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(get_number);
        if let Some(missing) = missing.filter(|w| *w > 0.0) {
            self.default_width = missing;
        }
    }

    fn load_cid_widths(&mut self, doc: &Document) {
        let descendant = self
            .dict
            .get(b"DescendantFonts")
            .ok()
            .and_then(|d| resolve(doc, d).as_array().ok())
            .and_then(|a| a.first())
            .and_then(|d| resolve(doc, d).as_dict().ok());

        let Some(descendant) = descendant else {
            return;
        };

        self.default_width = descendant
            .get(b"DW")
            .ok()
            .and_then(get_number)
            .unwrap_or(1000.0);

        let Some(w) = descendant
            .get(b"W")
            .ok()
            .and_then(|w| resolve(doc, w).as_array().ok())
        else {
            return;
        };

        // Entries are either `c [w1 w2 ...]` or `c_first c_last w`
        let mut i = 0;
        while i < w.len() {
            let Some(first) = get_number(resolve(doc, &w[i])) else {
                break;
            };
            match w.get(i + 1).map(|o| resolve(doc, o)) {
                Some(Object::Array(ws)) => {
                    for (offset, width) in ws.iter().enumerate() {
                        if let Some(width) = get_number(resolve(doc, width)) {
                            self.cid_widths.insert(first as u16 + offset as u16, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(width)) = (
                        get_number(last),
                        w.get(i + 2).and_then(|o| get_number(resolve(doc, o))),
                    ) else {
                        break;
                    };
                    for cid in first as u32..=last as u32 {
                        self.cid_widths.insert(cid as u16, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    /// Character codes in a string operand
    pub fn codes(&self, bytes: &[u8]) -> Vec<u16> {
        if self.composite {
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect()
        } else {
            bytes.iter().map(|&b| b as u16).collect()
        }
    }

    /// Advance width of one code, in 1/1000 em
    pub fn glyph_width(&self, code: u16) -> f32 {
        if self.composite {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        let idx = code as i64 - self.first_char;
        if idx >= 0 {
            if let Some(&w) = self.widths.get(idx as usize) {
                if w > 0.0 {
                    return w;
                }
            }
        }
        self.default_width
    }

    /// Decode a string operand to Unicode
    pub fn decode(&self, doc: &Document, bytes: &[u8]) -> String {
        if self.composite {
            return match &self.cmap {
                Some(cmap) => cmap.decode_cids(bytes),
                // Identity-H without a CMap
                None => self
                    .codes(bytes)
                    .into_iter()
                    .filter_map(|c| char::from_u32(c as u32))
                    .collect(),
            };
        }

        if let Some(text) = self.cmap.as_ref().and_then(|c| c.decode_bytes(bytes)) {
            return text;
        }

        if let Ok(encoding) = self.dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }

        decode_fallback(bytes)
    }
}

/// UTF-16BE when a BOM is present, Latin-1 otherwise
pub(crate) fn decode_fallback(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// `ABCDEF+Helvetica-Bold` -> `Helvetica-Bold`
fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((prefix, rest))
            if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            rest
        }
        _ => name,
    }
}

/// All fonts of one page, keyed by resource name (`F1`, `TT2`, ...)
#[derive(Debug, Default)]
pub struct PageFonts<'a> {
    fonts: BTreeMap<Vec<u8>, FontInfo<'a>>,
}

impl<'a> PageFonts<'a> {
    pub fn load(doc: &'a Document, page_id: ObjectId) -> Self {
        let fonts = doc
            .get_page_fonts(page_id)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, dict)| (name, FontInfo::load(doc, dict)))
            .collect();
        PageFonts { fonts }
    }

    pub fn get(&self, resource_name: &str) -> Option<&FontInfo<'a>> {
        self.fonts.get(resource_name.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("ABCDEF+Helvetica-Bold"), "Helvetica-Bold");
        assert_eq!(strip_subset_prefix("Helvetica"), "Helvetica");
        assert_eq!(strip_subset_prefix("abc+Foo"), "abc+Foo");
    }

    #[test]
    fn test_decode_fallback() {
        assert_eq!(decode_fallback(b"Caf\xe9"), "Café");
        assert_eq!(decode_fallback(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]), "AB");
    }

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "QWERTY+Arial",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 700.into()],
        };
        let font = FontInfo::load(&doc, &dict);
        assert_eq!(font.base_font, "Arial");
        assert!(!font.composite);
        assert_eq!(font.glyph_width(65), 600.0);
        assert_eq!(font.glyph_width(66), 700.0);
        assert_eq!(font.glyph_width(67), FALLBACK_GLYPH_WIDTH);
        assert_eq!(font.codes(b"AB"), vec![65, 66]);
    }

    #[test]
    fn test_composite_font_codes() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "NotoSans",
        };
        let font = FontInfo::load(&doc, &dict);
        assert!(font.composite);
        assert_eq!(font.codes(&[0x00, 0x41, 0x00, 0x42]), vec![0x41, 0x42]);
        assert_eq!(font.decode(&doc, &[0x00, 0x41]), "A");
    }
}
