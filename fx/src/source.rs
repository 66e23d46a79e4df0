//! Push-based XML event sources.
//!
//! An [`EventSource`] walks a document once and reports what it sees to an
//! [`EventSink`]: one call per started element, followed by exactly one
//! terminal call (`document_ended` or `parse_failed`).

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::SourceError;
use crate::session::EventSink;

/// An element-start event: tag name plus its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartElement {
    /// Qualified element name as written in the document.
    pub name: String,
    /// Attribute values keyed by qualified attribute name.
    pub attributes: HashMap<String, String>,
}

impl StartElement {
    /// Create an element with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A producer of parse events that can be driven exactly once.
///
/// `start` may deliver events synchronously before returning or hand the
/// sink to other threads; the session accepts either.
pub trait EventSource: Send + 'static {
    /// Drive the source, reporting every event to `sink`.
    fn start(self: Box<Self>, sink: EventSink);
}

/// Event source over an in-memory XML document.
#[derive(Debug, Clone)]
pub struct XmlEventSource {
    bytes: Vec<u8>,
}

impl XmlEventSource {
    /// Create a source over the given document bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    fn run(&self, sink: &EventSink) -> Result<(), SourceError> {
        let mut reader = Reader::from_reader(self.bytes.as_slice());
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| SourceError::new(e.to_string(), position))?;
            let outside_root = depth == 0;

            match event {
                Event::Start(start) | Event::Empty(start) if outside_root && saw_root => {
                    return Err(SourceError::new(
                        format!(
                            "extra content after the root element: <{}>",
                            String::from_utf8_lossy(start.name().as_ref())
                        ),
                        position,
                    ));
                }
                Event::Start(start) => {
                    depth += 1;
                    saw_root = true;
                    sink.element_started(start_element(&start, position)?);
                }
                Event::Empty(start) => {
                    saw_root = true;
                    sink.element_started(start_element(&start, position)?);
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| SourceError::new(e.to_string(), position))?;
                    if outside_root && !text.trim().is_empty() {
                        let place = if saw_root { "after" } else { "before" };
                        return Err(SourceError::new(
                            format!("text {place} the root element"),
                            position,
                        ));
                    }
                }
                Event::CData(_) if outside_root => {
                    return Err(SourceError::new("CDATA outside the root element", position));
                }
                Event::Eof => {
                    let position = reader.buffer_position() as u64;
                    if !saw_root {
                        return Err(SourceError::new("document has no root element", position));
                    }
                    if depth > 0 {
                        return Err(SourceError::new(
                            format!("document ended with {depth} unclosed element(s)"),
                            position,
                        ));
                    }
                    return Ok(());
                }
                _ => {}
            }

            if sink.is_resolved() {
                debug!(position, "Session already resolved, stopping tokenizer");
                return Ok(());
            }
            buf.clear();
        }
    }
}

impl EventSource for XmlEventSource {
    fn start(self: Box<Self>, sink: EventSink) {
        match self.run(&sink) {
            Ok(()) => sink.document_ended(),
            Err(e) => sink.parse_failed(e),
        }
    }
}

fn start_element(start: &BytesStart<'_>, position: u64) -> Result<StartElement, SourceError> {
    let mut element = StartElement::new(String::from_utf8_lossy(start.name().as_ref()));

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| SourceError::new(e.to_string(), position))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| SourceError::new(e.to_string(), position))?;
        element.attributes.insert(key, value.into_owned());
    }

    Ok(element)
}
