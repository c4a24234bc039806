//! Minimal XML DOM built on quick-xml, used by the KML reader

use crate::error::ParseError;
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A parsed XML element
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    /// Qualified tag name as written, e.g. `gx:Track`
    pub name: String,
    /// Attribute names to unescaped values, in document order
    pub attributes: IndexMap<String, String>,
    /// Concatenated text and CDATA content
    pub text_content: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Tag name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    /// Direct children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    /// Trimmed text of the first direct child with the given local name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text_content.trim())
    }

    /// Collects every descendant (not including self) with the given local name, in document order
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.local_name() == name {
                out.push(child);
            }
            child.descendants_named(name, out);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

/// Parses an XML document from text and returns the root element
///
/// Elements are built on an explicit stack, so nesting depth is bounded by
/// memory rather than the call stack.
///
/// # Errors
/// * [`ParseError::Xml`] on malformed markup, mismatched tags, premature end of input
///   or a document without a root element
pub fn parse_xml_str(text: &str) -> Result<XmlNode, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut open: Vec<XmlNode> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(tag) => open.push(XmlNode::from_tag(&tag)?),
            Event::Empty(tag) => {
                if let Some(root) = close(&mut open, XmlNode::from_tag(&tag)?) {
                    return Ok(root);
                }
            }
            Event::End(tag) => {
                let closing = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let node = match open.pop() {
                    Some(node) if node.name == closing => node,
                    Some(node) => {
                        return Err(ParseError::Xml(format!(
                            "<{}> closed by </{}>",
                            node.name, closing
                        )))
                    }
                    None => return Err(ParseError::Xml(format!("stray </{}>", closing))),
                };
                if let Some(root) = close(&mut open, node) {
                    return Ok(root);
                }
            }
            Event::Text(text) => {
                if let Some(node) = open.last_mut() {
                    node.push_text(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(node) = open.last_mut() {
                    node.push_text(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => {
                return Err(ParseError::Xml(match open.last() {
                    Some(node) => format!("input ends inside <{}>", node.name),
                    None => "document has no root element".to_string(),
                }));
            }
            _ => {}
        }
    }
}

/// Attaches a finished element to its parent, or hands it back as the root
fn close(open: &mut [XmlNode], node: XmlNode) -> Option<XmlNode> {
    match open.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            None
        }
        None => Some(node),
    }
}

impl XmlNode {
    fn from_tag(tag: &BytesStart<'_>) -> Result<Self, ParseError> {
        Ok(XmlNode {
            name: String::from_utf8_lossy(tag.name().as_ref()).into_owned(),
            attributes: collect_attributes(tag)?,
            ..XmlNode::default()
        })
    }

    fn push_text(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.text_content.push_str(text);
        }
    }
}

fn collect_attributes(start: &BytesStart<'_>) -> Result<IndexMap<String, String>, ParseError> {
    let mut map = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tree() {
        let root = parse_xml_str(
            r#"<?xml version="1.0"?>
            <kml xmlns="http://www.opengis.net/kml/2.2">
              <Document>
                <name>Fish &amp; Chips</name>
                <gx:Track id="t1"/>
              </Document>
            </kml>"#,
        )
        .unwrap();

        assert_eq!(root.name, "kml");
        assert_eq!(root.attribute("xmlns"), Some("http://www.opengis.net/kml/2.2"));
        let doc = root.child("Document").unwrap();
        assert_eq!(doc.child_text("name"), Some("Fish & Chips"));
        let track = doc.child("Track").unwrap();
        assert_eq!(track.name, "gx:Track");
        assert_eq!(track.attribute("id"), Some("t1"));
    }

    #[test]
    fn test_cdata_content() {
        let root = parse_xml_str("<a><b><![CDATA[<p>hi</p>]]></b></a>").unwrap();
        assert_eq!(root.child_text("b"), Some("<p>hi</p>"));
    }

    #[test]
    fn test_descendants_in_document_order() {
        let root = parse_xml_str("<r><p n='1'><p n='2'/></p><q><p n='3'/></q></r>").unwrap();
        let mut found = Vec::new();
        root.descendants_named("p", &mut found);
        let ids: Vec<&str> = found.iter().filter_map(|n| n.attribute("n")).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(parse_xml_str("<a><b></a>"), Err(ParseError::Xml(_))));
        assert!(matches!(parse_xml_str("<a>"), Err(ParseError::Xml(_))));
        assert!(matches!(parse_xml_str(""), Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 2_000;
        let text = format!("{}<leaf/>{}", "<n>".repeat(depth), "</n>".repeat(depth));
        let root = parse_xml_str(&text).unwrap();

        let mut levels = 1;
        let mut node = &root;
        while let Some(child) = node.child("n") {
            node = child;
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert!(node.child("leaf").is_some());
    }

    #[test]
    fn test_mixed_text_and_children() {
        let root = parse_xml_str("<a>one<b/>two</a>").unwrap();
        assert_eq!(root.text_content, "onetwo");
        assert_eq!(root.children.len(), 1);
    }
}
