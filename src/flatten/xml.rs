//! Flat XML record extraction
//!
//! A consultation file is a single root element whose direct children are the
//! record's fields:
//!
//! ```xml
//! <Case>
//!   <Hospital>General Hospital</Hospital>
//!   <Department>Cardiology</Department>
//!   <ACR>1,2,3</ACR>
//! </Case>
//! ```
//!
//! Each child's local tag name becomes a field name and its trimmed text the value.
//! Anything nested below a child is ignored.
//!
//! Files are decoded from the encoding given by a byte order mark or by the XML
//! declaration, defaulting to UTF-8.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::table::RawRecord;

/// Parse one XML document into a flat record
pub fn parse_record(xml_content: &str) -> Result<RawRecord> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut record = RawRecord::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut field: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                match depth {
                    1 => {
                        if seen_root {
                            bail!("multiple root elements");
                        }
                        seen_root = true;
                    }
                    2 => {
                        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                        field = Some((name, String::new()));
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => match depth {
                0 => {
                    if seen_root {
                        bail!("multiple root elements");
                    }
                    seen_root = true;
                }
                1 => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    record.insert(name, None);
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if depth == 2 {
                    if let Some((_, text)) = field.as_mut() {
                        let unescaped = e
                            .unescape()
                            .with_context(|| format!("invalid text at position {}", reader.buffer_position()))?;
                        text.push_str(&unescaped);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if depth == 2 {
                    if let Some((_, text)) = field.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some((name, text)) = field.take() {
                        record.insert(name, Some(text));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "XML parsing error at position {}: {}",
                    reader.error_position(),
                    e
                ))
                .context("XML record extraction failed");
            }
            _ => {}
        }
    }

    if !seen_root {
        bail!("document has no root element");
    }
    if depth != 0 {
        bail!("unexpected end of document inside an open element");
    }

    Ok(record)
}

/// Read and parse one XML file
pub fn parse_record_file(path: &Path) -> Result<RawRecord> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let content =
        decode_document(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    parse_record(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Decode raw document bytes to text
///
/// A byte order mark wins over the declaration. Malformed input for the chosen
/// encoding is an error rather than replacement characters.
pub fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (declared_encoding(bytes)?.unwrap_or(UTF_8), bytes),
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| anyhow!("malformed {} content", encoding.name()))
}

/// Encoding label of the `<?xml ... encoding="..."?>` declaration, if any
fn declared_encoding(bytes: &[u8]) -> Result<Option<&'static Encoding>> {
    if !bytes.starts_with(b"<?xml") {
        return Ok(None);
    }
    let Some(end) = bytes.windows(2).position(|w| w == b"?>") else {
        bail!("unterminated XML declaration");
    };
    let declaration = String::from_utf8_lossy(&bytes[..end]);
    let Some(rest) = declaration.split_once("encoding").map(|(_, rest)| rest) else {
        return Ok(None);
    };
    let label = rest
        .trim_start()
        .strip_prefix('=')
        .map(str::trim_start)
        .and_then(|v| {
            let quote = v.chars().next().filter(|c| *c == '"' || *c == '\'')?;
            v[1..].split(quote).next()
        })
        .ok_or_else(|| anyhow!("malformed encoding declaration"))?;

    Encoding::for_label(label.as_bytes())
        .map(Some)
        .ok_or_else(|| anyhow!("unsupported encoding '{label}'"))
}
