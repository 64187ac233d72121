//! Response normalization — envelope types and the structured-decode chain.
//!
//! Every successful request is interpreted by an ordered chain of decoders:
//! JSON first, then XML converted to the same mapping shape, then raw text.
//! The chain short-circuits on the first decoder that yields a usable value,
//! and a non-empty payload always produces a body. Decoder failures below
//! the first are silent to the caller; they emit `debug!` trace events only.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Decoded payload of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseBody {
    /// Structured value decoded from JSON or converted from XML.
    Structured(Value),
    /// Raw text, kept verbatim when no structured decode succeeded.
    Raw(String),
}

impl Default for ResponseBody {
    /// An empty structured mapping — the "no data yet" container.
    fn default() -> Self {
        Self::Structured(Value::Object(Map::new()))
    }
}

impl ResponseBody {
    /// The structured value, if this body is structured.
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// The raw text, if no structured decode succeeded.
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Structured(_) => None,
            Self::Raw(text) => Some(text),
        }
    }

    /// `true` when the body carries no data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(Value::Null) => true,
            Self::Structured(Value::Object(map)) => map.is_empty(),
            Self::Structured(Value::Array(items)) => items.is_empty(),
            Self::Structured(_) => false,
            Self::Raw(text) => text.is_empty(),
        }
    }
}

/// Ordered header multimap.
///
/// Names keep their first-appearance order; repeated names accumulate
/// values under the first occurrence. Lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, Vec<String>)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group raw name/value pairs into the multimap, preserving order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.append(name, value);
        }
        headers
    }

    /// Add a value under `name`, merging with an existing entry of the
    /// same name (case-insensitive).
    pub fn append(&mut self, name: String, value: String) {
        if let Some((_, values)) = self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            values.push(value);
        } else {
            self.0.push((name, vec![value]));
        }
    }

    /// All values stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate names and their values in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

/// Canonical result of one request: body + status + headers.
///
/// Immutable once constructed; serializable so envelopes can be stored by
/// cache backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub body: ResponseBody,
    pub status_code: u16,
    pub headers: Headers,
}

// ── Decode chain ─────────────────────────────────────────────────────────────

/// Interpret a response payload: prefer structured data, never lose the
/// payload.
pub(crate) fn interpret_body(text: &str) -> ResponseBody {
    if let Some(value) = decode_json(text) {
        return ResponseBody::Structured(value);
    }
    if let Some(value) = decode_xml(text) {
        return ResponseBody::Structured(value);
    }
    if text.is_empty() {
        // Nothing was lost — there was nothing to keep.
        return ResponseBody::default();
    }
    ResponseBody::Raw(text.to_string())
}

/// JSON decoder. Succeeds only for a usable (non-empty) value.
fn decode_json(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    usable(value)
}

/// XML fallback decoder. Parse failures are swallowed here — a failed
/// fallback leaves the chain to the raw-text step.
fn decode_xml(text: &str) -> Option<Value> {
    match xml_to_value(text) {
        Ok(value) => {
            usable(value).filter(|value| !matches!(value, Value::String(s) if s.trim().is_empty()))
        }
        Err(e) => {
            debug!("XML fallback decode failed: {}", e);
            None
        }
    }
}

/// `null`, `{}`, and `[]` decode successfully but carry no usable
/// structure; they fall through to the next decoder.
fn usable(value: Value) -> Option<Value> {
    match &value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        _ => Some(value),
    }
}

// ── XML → mapping conversion ─────────────────────────────────────────────────

/// Convert an XML document into the same mapping shape JSON decoding
/// produces. The root element's name is dropped; its content becomes the
/// value. Child elements become fields, repeated siblings become arrays,
/// text-only elements become strings, and attributes are grouped under
/// `"@attributes"`. Mixed text next to child elements lands in `"#text"`.
fn xml_to_value(text: &str) -> Result<Value, String> {
    let mut reader = Reader::from_reader(text.as_bytes());
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let attrs = attributes_to_map(&e)?;
                return read_element(&mut reader, attrs);
            }
            Event::Empty(e) => {
                let attrs = attributes_to_map(&e)?;
                return Ok(empty_element(attrs));
            }
            Event::Eof => return Err("no root element".to_string()),
            _ => {}
        }
        buf.clear();
    }
}

/// Read one element's content up to its closing tag.
fn read_element(reader: &mut Reader<&[u8]>, attrs: Map<String, Value>) -> Result<Value, String> {
    let mut fields = Map::new();
    if !attrs.is_empty() {
        fields.insert("@attributes".to_string(), Value::Object(attrs));
    }
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let child_attrs = attributes_to_map(&e)?;
                let child = read_element(reader, child_attrs)?;
                insert_child(&mut fields, name, child);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let child_attrs = attributes_to_map(&e)?;
                insert_child(&mut fields, name, empty_element(child_attrs));
            }
            Event::Text(e) => {
                text.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(_) => break,
            Event::Eof => return Err("unexpected end of document".to_string()),
            _ => {}
        }
        buf.clear();
    }

    if fields.is_empty() {
        return Ok(Value::String(text));
    }
    if !text.trim().is_empty() {
        fields.insert("#text".to_string(), Value::String(text.trim().to_string()));
    }
    Ok(Value::Object(fields))
}

/// Value for a self-closing element.
fn empty_element(attrs: Map<String, Value>) -> Value {
    if attrs.is_empty() {
        Value::String(String::new())
    } else {
        let mut fields = Map::new();
        fields.insert("@attributes".to_string(), Value::Object(attrs));
        Value::Object(fields)
    }
}

/// Collect an element's attributes into a string map.
fn attributes_to_map(start: &BytesStart<'_>) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        map.insert(name, Value::String(value));
    }
    Ok(map)
}

/// Insert a child value, turning repeated sibling names into an array.
fn insert_child(fields: &mut Map<String, Value>, name: String, child: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(child),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, child]);
        }
        None => {
            fields.insert(name, child);
        }
    }
}
