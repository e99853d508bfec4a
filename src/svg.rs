//! Structural SVG document model.
//!
//! Sticker composition is written once against the [`SvgWriter`] trait. [`StringWriter`] streams
//! XML text directly, [`TreeWriter`] builds an [`Element`] tree that callers can inspect or
//! modify before serializing. Both serialize through the same escaping and number formatting, so
//! the two outputs are byte-identical.

use std::fmt::Write as _;

use roxmltree::{Document, Node as XmlNode, ParsingOptions};

use crate::config::{SVG_NAMESPACE, SVG_XLINK_NAMESPACE};
use crate::error::{Error, Result};

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Attribute list passed to a writer.
pub type Attrs<'a> = [(&'a str, String)];

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data.
    Text(String),
}

/// An SVG element with ordered attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Replaces an existing attribute in place or appends a new one.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut found = Vec::new();
        for child in self.elements() {
            found.push(child);
            found.extend(child.descendants());
        }
        found
    }

    /// First descendant with the given element name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().into_iter().find(|element| element.name == name)
    }

    /// First descendant whose `id` attribute matches.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.descendants()
            .into_iter()
            .find(|element| element.attr("id") == Some(id))
    }

    /// Concatenated text of this element and its descendants.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                Node::Text(value) => text.push_str(value),
                Node::Element(element) => text.push_str(&element.text_content()),
            }
        }
        text
    }

    /// Replays this element into a writer.
    pub fn write_to<W: SvgWriter + ?Sized>(&self, writer: &mut W) {
        let attrs: Vec<(&str, String)> = self
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();
        writer.start(&self.name, &attrs);
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_to(writer),
                Node::Text(text) => writer.text(text),
            }
        }
        writer.end();
    }

    /// Serializes without an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut writer = StringWriter::new();
        self.write_to(&mut writer);
        writer.finish()
    }

    /// Parses an XML fragment with a single root element.
    ///
    /// Names in the SVG namespace lose their prefix; `xlink:` and `xml:` names keep theirs.
    /// Elements and attributes from any other namespace (editor metadata such as `inkscape:` or
    /// `sodipodi:`) are dropped, as are comments and processing instructions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSvg`] when the text is not well-formed XML.
    pub fn parse(text: &str) -> Result<Element> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(text, options)
            .map_err(|err| Error::InvalidSvg(err.to_string()))?;
        let root = document.root_element();

        let tag = root.tag_name();
        let name = qualified(tag.namespace(), tag.name()).unwrap_or_else(|| tag.name().to_string());
        let mut element = convert(root, name);
        for namespace in root.namespaces() {
            let key = match (namespace.name(), namespace.uri()) {
                (None, _) => "xmlns",
                (Some(_), SVG_XLINK_NAMESPACE) => "xmlns:xlink",
                _ => continue,
            };
            if element.attr(key).is_none() {
                element.attributes.insert(0, (key.to_string(), namespace.uri().to_string()));
            }
        }
        Ok(element)
    }
}

/// Serialized name for a parsed name, or `None` when its namespace is not kept.
fn qualified(namespace: Option<&str>, local: &str) -> Option<String> {
    match namespace {
        None | Some(SVG_NAMESPACE) => Some(local.to_string()),
        Some(SVG_XLINK_NAMESPACE) => Some(format!("xlink:{local}")),
        Some(XML_NAMESPACE) => Some(format!("xml:{local}")),
        Some(_) => None,
    }
}

fn convert(node: XmlNode<'_, '_>, name: String) -> Element {
    let mut element = Element::new(name);
    for attribute in node.attributes() {
        if let Some(name) = qualified(attribute.namespace(), attribute.name()) {
            element.attributes.push((name, attribute.value().to_string()));
        }
    }
    for child in node.children() {
        if child.is_element() {
            let tag = child.tag_name();
            if let Some(name) = qualified(tag.namespace(), tag.name()) {
                element.children.push(Node::Element(convert(child, name)));
            }
        } else if let Some(text) = child.text().filter(|_| child.is_text()) {
            element.children.push(Node::Text(text.to_string()));
        }
    }
    element
}

/// Sink for a streamed SVG document.
///
/// Calls must nest: every [`start`](SvgWriter::start) is matched by an [`end`](SvgWriter::end).
pub trait SvgWriter {
    fn start(&mut self, name: &str, attrs: &Attrs<'_>);
    /// Character data, unescaped.
    fn text(&mut self, text: &str);
    fn end(&mut self);

    /// An element with no children.
    fn empty(&mut self, name: &str, attrs: &Attrs<'_>) {
        self.start(name, attrs);
        self.end();
    }

    /// An element containing only text.
    fn text_element(&mut self, name: &str, attrs: &Attrs<'_>, text: &str) {
        self.start(name, attrs);
        self.text(text);
        self.end();
    }
}

/// Streams compact XML text.
#[derive(Debug, Default)]
pub struct StringWriter {
    out: String,
    open: Vec<String>,
    // Start tag written but not yet closed with `>`
    pending: bool,
}

impl StringWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn close_pending(&mut self) {
        if self.pending {
            self.out.push('>');
            self.pending = false;
        }
    }

    /// Returns the text written so far, closing any elements left open.
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.end();
        }
        self.out
    }
}

impl SvgWriter for StringWriter {
    fn start(&mut self, name: &str, attrs: &Attrs<'_>) {
        self.close_pending();
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            let _ = write!(self.out, " {}=\"{}\"", key, escape_xml(value));
        }
        self.open.push(name.to_string());
        self.pending = true;
    }

    fn text(&mut self, text: &str) {
        self.close_pending();
        self.out.push_str(&escape_xml(text));
    }

    fn end(&mut self) {
        let Some(name) = self.open.pop() else {
            return;
        };
        if self.pending {
            self.out.push_str("/>");
            self.pending = false;
        } else {
            let _ = write!(self.out, "</{name}>");
        }
    }
}

/// Builds an [`Element`] tree.
#[derive(Debug, Default)]
pub struct TreeWriter {
    stack: Vec<Element>,
    root: Option<Element>,
}

impl TreeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed root element, closing any elements left open.
    pub fn finish(mut self) -> Option<Element> {
        while !self.stack.is_empty() {
            self.end();
        }
        self.root
    }
}

impl SvgWriter for TreeWriter {
    fn start(&mut self, name: &str, attrs: &Attrs<'_>) {
        let mut element = Element::new(name);
        element.attributes = attrs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        self.stack.push(element);
    }

    fn text(&mut self, text: &str) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(Node::Text(text.to_string()));
        }
    }

    fn end(&mut self) {
        let Some(element) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => self.root = Some(element),
        }
    }
}

/// A complete SVG document.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    pub root: Element,
}

impl SvgDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parses a document whose root must be `<svg>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSvg`] for malformed XML or any other root element.
    pub fn parse(text: &str) -> Result<Self> {
        let root = Element::parse(text)?;
        if root.name != "svg" {
            return Err(Error::InvalidSvg(format!(
                "expected <svg> root element, found <{}>",
                root.name
            )));
        }
        Ok(Self { root })
    }

    /// Serializes with an XML declaration, adding the SVG and xlink namespace declarations if
    /// the root lacks them.
    pub fn to_xml_string(&self) -> String {
        let mut root = self.root.clone();
        if root.attr("xmlns:xlink").is_none() {
            root.attributes
                .insert(0, ("xmlns:xlink".to_string(), SVG_XLINK_NAMESPACE.to_string()));
        }
        if root.attr("xmlns").is_none() {
            root.attributes
                .insert(0, ("xmlns".to_string(), SVG_NAMESPACE.to_string()));
        }
        format!("{XML_DECLARATION}{}", root.to_xml())
    }
}

/// Escapes the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Formats a coordinate with at most two decimals and no trailing zeros.
pub fn fmt_num(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample<W: SvgWriter>(writer: &mut W) {
        writer.start("svg", &[("width", "10".to_string())]);
        writer.empty("rect", &[("x", fmt_num(1.5)), ("fill", "#fff".to_string())]);
        writer.text_element("text", &[("y", fmt_num(4.0))], "A & <B>");
        writer.start("g", &[]);
        writer.end();
        writer.end();
    }

    #[test]
    fn test_writers_serialize_identically() {
        let mut string_writer = StringWriter::new();
        sample(&mut string_writer);
        let mut tree_writer = TreeWriter::new();
        sample(&mut tree_writer);

        let text = string_writer.finish();
        let tree = tree_writer.finish().unwrap();
        assert_eq!(tree.to_xml(), text);
        assert_eq!(
            text,
            r##"<svg width="10"><rect x="1.5" fill="#fff"/><text y="4">A &amp; &lt;B&gt;</text><g/></svg>"##
        );
    }

    #[test]
    fn test_tree_writer_builds_structure() {
        let mut writer = TreeWriter::new();
        sample(&mut writer);
        let root = writer.finish().unwrap();
        assert_eq!(root.elements().count(), 3);
        assert_eq!(root.find("text").unwrap().text_content(), "A & <B>");
        assert_eq!(root.find("rect").unwrap().attr("x"), Some("1.5"));
    }

    #[test]
    fn test_finish_closes_open_elements() {
        let mut writer = StringWriter::new();
        writer.start("svg", &[]);
        writer.start("g", &[]);
        writer.text("x");
        assert_eq!(writer.finish(), "<svg><g>x</g></svg>");
    }

    #[test]
    fn test_parse_keeps_namespaces_and_prefixes() {
        let root = Element::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 2 2"><!-- c --><image xlink:href="a.svg"/></svg>"#,
        )
        .unwrap();
        assert_eq!(root.name, "svg");
        assert_eq!(root.attr("xmlns"), Some(SVG_NAMESPACE));
        assert_eq!(root.attr("xmlns:xlink"), Some(SVG_XLINK_NAMESPACE));
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.find("image").unwrap().attr("xlink:href"), Some("a.svg"));
    }

    #[test]
    fn test_parse_drops_editor_namespaces() {
        let root = Element::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd" version="1.1" inkscape:version="1.3"><sodipodi:namedview id="view"/><path d="M0 0h1" inkscape:label="mark"/></svg>"#,
        )
        .unwrap();
        assert_eq!(root.attr("version"), Some("1.1"));
        assert_eq!(root.attributes.iter().filter(|(name, _)| name == "version").count(), 1);
        assert!(root.attr("xmlns:inkscape").is_none());
        assert!(root.find_by_id("view").is_none());
        let path = root.find("path").unwrap();
        assert_eq!(path.attributes, vec![("d".to_string(), "M0 0h1".to_string())]);
        assert!(roxmltree::Document::parse(&root.to_xml()).is_ok());
    }

    #[test]
    fn test_parse_accepts_doctype() {
        let text = "<?xml version=\"1.0\"?>\n<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n<svg xmlns=\"http://www.w3.org/2000/svg\"/>";
        assert!(SvgDocument::parse(text).is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage_and_wrong_root() {
        assert!(matches!(Element::parse("<svg"), Err(Error::InvalidSvg(_))));
        assert!(matches!(SvgDocument::parse("<html/>"), Err(Error::InvalidSvg(_))));
    }

    #[test]
    fn test_document_adds_missing_namespaces() {
        let document = SvgDocument::new(Element::new("svg").with_attr("width", "1"));
        let xml = document.to_xml_string();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="1"/>"#));
    }

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut element = Element::new("svg").with_attr("width", "1").with_attr("height", "1");
        element.set_attr("width", "2");
        assert_eq!(element.attributes[0], ("width".to_string(), "2".to_string()));
        assert_eq!(element.remove_attr("height").as_deref(), Some("1"));
        assert_eq!(element.attr("height"), None);
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(211.0), "211");
        assert_eq!(fmt_num(7.5), "7.5");
        assert_eq!(fmt_num(1.0 / 3.0), "0.33");
        assert_eq!(fmt_num(-0.001), "0");
        assert_eq!(fmt_num(0.0), "0");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
