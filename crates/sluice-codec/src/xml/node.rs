//! Minimal element tree on top of the quick-xml streaming reader and writer
//!
//! The reader never resolves entities beyond the predefined ones and refuses
//! any document carrying a `<!DOCTYPE>`, so untrusted streams cannot pull in
//! external entities.

use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use sluice_core::{DecodeError, EncodeError};

/// Deepest element nesting accepted from a stream
pub const MAX_NESTING: usize = 256;

/// One parsed element
#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub text: String,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let name = String::from_utf8(start.name().as_ref().to_vec())?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| DecodeError::xml(e.to_string()))?;
            let key = String::from_utf8(attr.key.as_ref().to_vec())?;
            let value = attr
                .unescape_value()
                .map_err(|e| DecodeError::xml(e.to_string()))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attr_string(&self, name: &str) -> Option<String> {
        self.attr(name).map(str::to_string)
    }

    pub fn attr_parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, DecodeError> {
        self.attr(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    DecodeError::xml(format!("invalid value {:?} for {}@{}", raw, self.name, name))
                })
            })
            .transpose()
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of a child element, `None` when the child is missing
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|child| child.text.clone())
    }

    pub fn expect_name(&self, name: &str) -> Result<(), DecodeError> {
        if self.name == name {
            Ok(())
        } else {
            Err(DecodeError::xml(format!(
                "expected <{}> but found <{}>",
                name, self.name
            )))
        }
    }
}

/// Parse a single-rooted document into an element tree
pub(crate) fn parse_document(bytes: &[u8]) -> Result<Node, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| DecodeError::xml(e.to_string()))?;

        match event {
            Event::DocType(_) => {
                return Err(DecodeError::xml("DOCTYPE declarations are not allowed"));
            }
            Event::Start(start) => {
                if root.is_some() {
                    return Err(DecodeError::xml("multiple root elements"));
                }
                if stack.len() >= MAX_NESTING {
                    return Err(DecodeError::xml("element nesting too deep"));
                }
                stack.push(Node::from_start(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(DecodeError::xml("multiple root elements"));
                }
                let node = Node::from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| DecodeError::xml("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(content) => {
                let content = content
                    .unescape()
                    .map_err(|e| DecodeError::xml(e.to_string()))?;
                match stack.last_mut() {
                    Some(node) => node.text.push_str(&content),
                    None if content.trim().is_empty() => {}
                    None => return Err(DecodeError::xml("text outside of root element")),
                }
            }
            Event::CData(content) => {
                let content = String::from_utf8(content.into_inner().into_owned())?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&content);
                }
            }
            Event::Eof => break,
            // Declarations, comments and processing instructions carry nothing.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::xml("truncated document"));
    }
    root.ok_or_else(|| DecodeError::xml("empty document"))
}

/// Thin wrapper mapping quick-xml writer errors to [`EncodeError`]
pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), EncodeError> {
        self.inner
            .write_event(event)
            .map_err(|e| EncodeError::serialization(e.to_string()))
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<(), EncodeError> {
        self.emit(Event::Start(element(name, attributes)))
    }

    pub fn end(&mut self, name: &str) -> Result<(), EncodeError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<(), EncodeError> {
        self.emit(Event::Empty(element(name, attributes)))
    }

    /// `<name attrs>text</name>`, keeping empty text as an explicit element
    pub fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, String)],
        text: &str,
    ) -> Result<(), EncodeError> {
        self.start(name, attributes)?;
        if !text.is_empty() {
            self.emit(Event::Text(BytesText::new(text)))?;
        }
        self.end(name)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

fn element<'a>(name: &'a str, attributes: &[(&str, String)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        start.push_attribute((*key, value.as_str()));
    }
    start
}

/// Collect the attributes that are present
pub(crate) fn attrs<const N: usize>(pairs: [(&'static str, Option<String>); N]) -> Vec<(&'static str, String)> {
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
}
