//! ToUnicode CMap parsing for PDF text extraction
//!
//! Composite (Type0) fonts encode text as 2-byte CIDs. The font's ToUnicode
//! CMap maps those codes back to Unicode, which is what headings are matched on.

use flate2::read::ZlibDecoder;
use lopdf::{Document, Object, Stream};
use std::collections::HashMap;
use std::io::Read;

/// A parsed ToUnicode CMap mapping codes to Unicode strings
#[derive(Debug, Default, Clone)]
pub struct ToUnicodeCMap {
    /// Direct character mappings (code -> Unicode string)
    pub char_map: HashMap<u16, String>,
    /// Range mappings (start_code, end_code, base_unicode)
    pub ranges: Vec<(u16, u16, u32)>,
}

impl ToUnicodeCMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ToUnicode CMap from its decompressed content
    pub fn parse(content: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(content);
        let mut cmap = ToUnicodeCMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            cmap.parse_bfchar_section(section);
        }
        for section in sections(&text, "beginbfrange", "endbfrange") {
            cmap.parse_bfrange_section(section);
        }

        if cmap.char_map.is_empty() && cmap.ranges.is_empty() {
            None
        } else {
            Some(cmap)
        }
    }

    /// Load the CMap referenced by a font dictionary's /ToUnicode entry
    pub fn from_font(doc: &Document, font: &lopdf::Dictionary) -> Option<Self> {
        let stream = match font.get(b"ToUnicode").ok()? {
            Object::Reference(id) => doc.get_object(*id).ok()?.as_stream().ok()?,
            Object::Stream(stream) => stream,
            _ => return None,
        };
        Self::parse(&stream_bytes(stream))
    }

    /// `<src> <dst>` pairs
    fn parse_bfchar_section(&mut self, section: &str) {
        let tokens = tokenize(section);
        for pair in tokens.chunks(2) {
            if let [Token::Hex(src), Token::Hex(dst)] = pair {
                if let (Some(src), Some(dst)) = (parse_hex_u16(src), hex_to_unicode_string(dst)) {
                    self.char_map.insert(src, dst);
                }
            }
        }
    }

    /// `<start> <end> <base>` or `<start> <end> [<dst> ...]` triplets
    fn parse_bfrange_section(&mut self, section: &str) {
        let tokens = tokenize(section);
        let mut i = 0;
        while i + 2 < tokens.len() {
            let (start, end) = match (&tokens[i], &tokens[i + 1]) {
                (Token::Hex(s), Token::Hex(e)) => (parse_hex_u16(s), parse_hex_u16(e)),
                _ => {
                    i += 1;
                    continue;
                }
            };
            match (&tokens[i + 2], start, end) {
                (Token::Hex(base), Some(start), Some(end)) => {
                    if let Some(base) = parse_hex_u32(base) {
                        self.ranges.push((start, end, base));
                    }
                }
                (Token::Array(dsts), Some(start), Some(end)) => {
                    for (offset, dst) in dsts.iter().enumerate() {
                        let code = start as u32 + offset as u32;
                        if code > end as u32 {
                            break;
                        }
                        if let Some(s) = hex_to_unicode_string(dst) {
                            self.char_map.insert(code as u16, s);
                        }
                    }
                }
                _ => {}
            }
            i += 3;
        }
    }

    /// Look up a code and return the Unicode string
    pub fn lookup(&self, code: u16) -> Option<String> {
        if let Some(s) = self.char_map.get(&code) {
            return Some(s.clone());
        }

        for &(start, end, base) in &self.ranges {
            if code >= start && code <= end {
                let unicode = base + (code - start) as u32;
                if let Some(c) = char::from_u32(unicode) {
                    return Some(c.to_string());
                }
            }
        }

        None
    }

    /// Decode a byte slice of 2-byte big-endian codes to a Unicode string
    pub fn decode_cids(&self, bytes: &[u8]) -> String {
        let mut result = String::new();

        for chunk in bytes.chunks_exact(2) {
            let cid = u16::from_be_bytes([chunk[0], chunk[1]]);
            if let Some(s) = self.lookup(cid) {
                result.push_str(&s);
            } else if let Some(c) = char::from_u32(cid as u32) {
                // Identity fallback
                result.push(c);
            }
        }

        result
    }

    /// Decode single-byte codes through the map, used for simple fonts that carry a CMap
    pub fn decode_bytes(&self, bytes: &[u8]) -> Option<String> {
        let mut result = String::new();
        for &b in bytes {
            result.push_str(&self.lookup(b as u16)?);
        }
        Some(result)
    }
}

/// Decompressed stream content. lopdf handles the declared filters; when that
/// fails (mislabelled or truncated streams) a raw zlib inflate is attempted.
pub(crate) fn stream_bytes(stream: &Stream) -> Vec<u8> {
    if let Ok(data) = stream.decompressed_content() {
        return data;
    }
    let mut decoder = ZlibDecoder::new(stream.content.as_slice());
    let mut inflated = Vec::new();
    match decoder.read_to_end(&mut inflated) {
        Ok(_) => inflated,
        Err(_) if !inflated.is_empty() => inflated,
        Err(_) => stream.content.clone(),
    }
}

/// Body text of every `begin ... end` section
fn sections<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = text[pos..].find(begin) {
        let body_start = pos + start + begin.len();
        match text[body_start..].find(end) {
            Some(len) => {
                out.push(&text[body_start..body_start + len]);
                pos = body_start + len + end.len();
            }
            None => break,
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(String),
    Array(Vec<String>),
}

/// Split a CMap section into `<hex>` and `[<hex> ...]` tokens
fn tokenize(section: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = section.chars().peekable();
    let mut array: Option<Vec<String>> = None;

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let mut hex = String::new();
                for h in chars.by_ref() {
                    if h == '>' {
                        break;
                    }
                    if !h.is_whitespace() {
                        hex.push(h);
                    }
                }
                match array.as_mut() {
                    Some(items) => items.push(hex),
                    None => tokens.push(Token::Hex(hex)),
                }
            }
            '[' => array = Some(Vec::new()),
            ']' => {
                if let Some(items) = array.take() {
                    tokens.push(Token::Array(items));
                }
            }
            _ => {}
        }
    }

    tokens
}

fn parse_hex_u16(hex: &str) -> Option<u16> {
    u16::from_str_radix(hex.trim(), 16).ok()
}

fn parse_hex_u32(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex.trim(), 16).ok()
}

/// Convert a UTF-16BE hex string to a Unicode string (surrogate pairs included)
fn hex_to_unicode_string(hex: &str) -> Option<String> {
    let hex = hex.trim();
    if !hex.is_ascii() {
        return None;
    }
    let units: Vec<u16> = (0..hex.len() / 4)
        .filter_map(|i| u16::from_str_radix(&hex[i * 4..i * 4 + 4], 16).ok())
        .collect();

    let result: String = char::decode_utf16(units)
        .filter_map(Result::ok)
        .collect();

    if result.is_empty() {
        // 1-byte destinations
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string())
    } else {
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bfchar() {
        let cmap_content = r#"
/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000><FFFF>
endcodespacerange
3 beginbfchar
<0003> <0020>
<0024> <0041>
<0025> <0042>
endbfchar
endcmap
"#;
        let cmap = ToUnicodeCMap::parse(cmap_content.as_bytes()).unwrap();

        assert_eq!(cmap.lookup(0x0003), Some(" ".to_string()));
        assert_eq!(cmap.lookup(0x0024), Some("A".to_string()));
        assert_eq!(cmap.lookup(0x0025), Some("B".to_string()));
    }

    #[test]
    fn test_parse_bfrange_base_and_array() {
        let cmap_content = r#"
2 beginbfrange
<0010> <0012> <0061>
<0020> <0021> [<0058> <0059>]
endbfrange
"#;
        let cmap = ToUnicodeCMap::parse(cmap_content.as_bytes()).unwrap();
        assert_eq!(cmap.lookup(0x0011), Some("b".to_string()));
        assert_eq!(cmap.lookup(0x0012), Some("c".to_string()));
        assert_eq!(cmap.lookup(0x0021), Some("Y".to_string()));
        assert_eq!(cmap.lookup(0x0013), None);
    }

    #[test]
    fn test_decode_cids() {
        let cmap_content = r#"
3 beginbfchar
<0003> <0020>
<0024> <0041>
<0025> <0042>
endbfchar
"#;
        let cmap = ToUnicodeCMap::parse(cmap_content.as_bytes()).unwrap();

        // "AB " in CID encoding
        let cids = [0x00, 0x24, 0x00, 0x25, 0x00, 0x03];
        assert_eq!(cmap.decode_cids(&cids), "AB ");
    }

    #[test]
    fn test_ligature_destination() {
        let cmap = ToUnicodeCMap::parse(b"1 beginbfchar <0041> <00660069> endbfchar").unwrap();
        assert_eq!(cmap.lookup(0x41), Some("fi".to_string()));
        assert_eq!(cmap.decode_bytes(&[0x41]), Some("fi".to_string()));
        assert_eq!(cmap.decode_bytes(&[0x42]), None);
    }

    #[test]
    fn test_empty_cmap_is_none() {
        assert!(ToUnicodeCMap::parse(b"begincmap endcmap").is_none());
    }
}
