//
// syntax/xml.rs
//
// Owned markup tree for metadata and annotation documents
//

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::TextRange;
use crate::error::AnalysisError;

/// An element of a markup document. Attribute names are local names;
/// namespace prefixes are dropped, the element's namespace URI is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<XmlElement>,
    /// Concatenated, trimmed character data directly inside the element.
    pub text: Option<String>,
    pub range: TextRange,
}

/// Element under construction while its end tag is pending
struct OpenElement {
    element: XmlElement,
    text: String,
}

fn malformed(message: impl ToString) -> AnalysisError {
    AnalysisError::MalformedXml {
        message: message.to_string(),
    }
}

/// Parse markup text into an owned element tree rooted at the document element.
pub fn parse_xml(text: &str) -> Result<XmlElement, AnalysisError> {
    let mut reader = NsReader::from_str(text);
    reader.config_mut().check_end_names = true;

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let (resolved, event) = reader.read_resolved_event().map_err(malformed)?;
        let namespace = namespace_uri(&resolved)?;
        let end = reader.buffer_position() as usize;
        match event {
            Event::Start(tag) => {
                let element = open_element(namespace, &tag, start)?;
                stack.push(OpenElement {
                    element,
                    text: String::new(),
                });
            }
            Event::Empty(tag) => {
                let mut element = open_element(namespace, &tag, start)?;
                element.range = TextRange::new(start, end);
                close_into(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let Some(open) = stack.pop() else {
                    return Err(malformed(format!("unexpected end tag at {}", start)));
                };
                let mut element = open.element;
                let trimmed = open.text.trim();
                element.text = (!trimmed.is_empty()).then(|| trimmed.to_string());
                element.range = TextRange::new(element.range.start, end);
                close_into(&mut stack, &mut root, element);
            }
            Event::Text(content) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&content.unescape().map_err(malformed)?);
                }
            }
            Event::CData(content) => {
                if let Some(open) = stack.last_mut() {
                    let raw = content.into_inner();
                    open.text.push_str(std::str::from_utf8(&raw).map_err(malformed)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.element.name)));
    }
    root.ok_or_else(|| malformed("document has no root element"))
}

fn namespace_uri(resolved: &ResolveResult<'_>) -> Result<Option<String>, AnalysisError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(std::str::from_utf8(ns.as_ref()).map_err(malformed)?.to_string())),
        _ => Ok(None),
    }
}

fn open_element(
    namespace: Option<String>,
    tag: &BytesStart<'_>,
    start: usize,
) -> Result<XmlElement, AnalysisError> {
    let mut attributes = IndexMap::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(malformed)?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let name = std::str::from_utf8(attr.key.local_name().as_ref())
            .map_err(malformed)?
            .to_string();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        attributes.insert(name, value);
    }

    Ok(XmlElement {
        name: std::str::from_utf8(tag.local_name().as_ref())
            .map_err(malformed)?
            .to_string(),
        namespace,
        attributes,
        children: Vec::new(),
        text: None,
        range: TextRange::new(start, start),
    })
}

/// Attach a finished element to its parent, or make it the root.
fn close_into(stack: &mut [OpenElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.element.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Pre-order list of this element and all descendants.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(element.children.iter().rev());
        }
        out
    }
}
