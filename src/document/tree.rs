use std::io::Write;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ReconcileError, Result};

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// A parsed XML document.
///
/// Keeps element order, attribute order (qualified names as written, so
/// `xsi:type` and `xsi:nil` survive untouched) and namespace declarations.
/// Whitespace-only text is dropped and regenerated as two-space indentation
/// on write, which is how Nebulous formats its own saves.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: Element,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse a document from a string. `origin` names the source in errors.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    return Err(ReconcileError::malformed(
                        origin,
                        format!("{} (byte {})", err, reader.buffer_position()),
                    ))
                }
            };

            match event {
                Event::Start(start) => stack.push(Element::from_start(&start, origin)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start, origin)?;
                    attach(&mut stack, &mut root, element, origin)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ReconcileError::malformed(origin, "unbalanced end tag"))?;
                    attach(&mut stack, &mut root, element, origin)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| ReconcileError::malformed(origin, e))?;
                    if value.trim().is_empty() {
                        continue;
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(value.into_owned())),
                        None => {
                            return Err(ReconcileError::malformed(
                                origin,
                                "text outside of the root element",
                            ))
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let value = String::from_utf8_lossy(&data).into_owned();
                        parent.children.push(Node::CData(value));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let value = String::from_utf8_lossy(&comment).into_owned();
                        parent.children.push(Node::Comment(value));
                    }
                }
                Event::Eof => break,
                // Declaration, processing instructions and doctype are regenerated on write.
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ReconcileError::malformed(
                origin,
                format!("unclosed element <{}>", open.name),
            ));
        }

        root.map(Self::new)
            .ok_or_else(|| ReconcileError::malformed(origin, "document has no root element"))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Prefix bound to the XML Schema instance namespace on the root, `xsi` if undeclared.
    pub fn xsi_prefix(&self) -> &str {
        self.root
            .attributes
            .iter()
            .find(|(key, value)| key.starts_with("xmlns:") && value == XSI_NAMESPACE)
            .map(|(key, _)| &key["xmlns:".len()..])
            .unwrap_or("xsi")
    }

    /// Make sure the root declares the `xsi` and `xsd` namespaces the game client expects.
    pub fn ensure_schema_namespaces(&mut self) {
        let declared = |doc: &Self, uri: &str| {
            doc.root
                .attributes
                .iter()
                .any(|(key, value)| key.starts_with("xmlns:") && value == uri)
        };
        if !declared(&*self, XSD_NAMESPACE) {
            self.root.attributes.insert(0, ("xmlns:xsd".to_string(), XSD_NAMESPACE.to_string()));
        }
        if !declared(&*self, XSI_NAMESPACE) {
            let at = usize::from(!self.root.attributes.is_empty());
            self.root
                .attributes
                .insert(at, ("xmlns:xsi".to_string(), XSI_NAMESPACE.to_string()));
        }
    }

    /// Serialize with an `<?xml version="1.0"?>` declaration and two-space indentation.
    pub fn to_xml_string(&self, origin: &str) -> Result<String> {
        let serialize_err = |reason: String| ReconcileError::Serialize {
            origin: origin.to_string(),
            reason,
        };

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
            .map_err(|e| serialize_err(e.to_string()))?;
        write_element(&mut writer, &self.root).map_err(serialize_err)?;

        let mut out = String::from_utf8(writer.into_inner())
            .map_err(|e| serialize_err(e.to_string()))?;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    origin: &str,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ReconcileError::malformed(origin, "multiple root elements")),
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> std::result::Result<(), String> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| e.to_string());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| e.to_string())?;
    for child in &element.children {
        match child {
            Node::Element(inner) => write_element(writer, inner)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| e.to_string())?,
            Node::CData(data) => writer
                .write_event(Event::CData(BytesCData::new(data.as_str())))
                .map_err(|e| e.to_string())?,
            Node::Comment(comment) => writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(|e| e.to_string())?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| e.to_string())
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn from_start(start: &BytesStart<'_>, origin: &str) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| ReconcileError::malformed(origin, e))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ReconcileError::malformed(origin, e))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| ReconcileError::malformed(origin, e))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| ReconcileError::malformed(origin, e))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Attributes ---

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True if the element carries an `xsi:nil="true"` marker under any prefix.
    pub fn is_nil(&self) -> bool {
        self.attributes
            .iter()
            .any(|(k, v)| k.ends_with(":nil") && v == "true")
    }

    // --- Children ---

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Element children in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |el| el.name == name)
    }

    /// First element named `name` anywhere below this one, depth-first in
    /// document order (ElementTree's `find(".//name")`).
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn descendant_mut(&mut self, name: &str) -> Option<&mut Element> {
        for child in self.elements_mut() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant_mut(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every element named `name` below this one, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.name == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }

    /// Follow a `/`-separated path of child names, like ElementTree's `find("A/B")`.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .try_fold(self, |current, step| current.child(step))
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut current = self;
        for step in path.split('/') {
            current = current.child_mut(step)?;
        }
        Some(current)
    }

    /// All elements reached by a `/`-separated path; the last step may match many.
    pub fn find_all<'a>(&'a self, path: &'a str) -> Vec<&'a Element> {
        let (parent_path, leaf) = match path.rsplit_once('/') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, path),
        };
        let parent = match parent_path {
            Some(p) => self.find(p),
            None => Some(self),
        };
        parent
            .map(|p| p.children_named(leaf).collect())
            .unwrap_or_default()
    }

    /// Remove element children for which `predicate` returns true. Returns how many were removed.
    pub fn remove_elements_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let before = self.children.len();
        self.children.retain(|node| match node {
            Node::Element(el) => !predicate(el),
            _ => true,
        });
        before - self.children.len()
    }

    // --- Text ---

    /// Trimmed text content of this element (text and CDATA nodes joined), `None` if empty.
    pub fn text(&self) -> Option<String> {
        let mut joined = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => joined.push_str(t),
                _ => {}
            }
        }
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)?.text()
    }

    /// Replace the text content. Drops any nil marker, since the element now has a value.
    pub fn set_text(&mut self, value: impl Into<String>) {
        self.children
            .retain(|node| !matches!(node, Node::Text(_) | Node::CData(_)));
        self.children.insert(0, Node::Text(value.into()));
        self.attributes
            .retain(|(k, v)| !(k.ends_with(":nil") && v == "true"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<Fleet xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Name>Picket &amp; Screen</Name>
  <Ships>
    <Ship>
      <SaveID xsi:nil="true" />
      <Name>Ardent</Name>
      <ComponentData xsi:type="BulkMagazineData">
        <Load />
      </ComponentData>
    </Ship>
  </Ships>
</Fleet>
"#;

    #[test]
    fn test_parse_reads_text_and_attributes() {
        let doc = XmlDocument::parse(SAMPLE, "sample").unwrap();
        let root = doc.root();
        assert_eq!(root.name(), "Fleet");
        assert_eq!(root.child_text("Name").as_deref(), Some("Picket & Screen"));

        let ship = root.find("Ships/Ship").unwrap();
        assert!(ship.child("SaveID").unwrap().is_nil());
        assert_eq!(
            ship.child("ComponentData").unwrap().attr("xsi:type"),
            Some("BulkMagazineData")
        );
        assert_eq!(doc.xsi_prefix(), "xsi");
    }

    #[test]
    fn test_serialize_preserves_nil_and_namespaces() {
        let doc = XmlDocument::parse(SAMPLE, "sample").unwrap();
        let out = doc.to_xml_string("sample").unwrap();

        assert!(out.starts_with("<?xml version=\"1.0\"?>"));
        assert!(out.contains("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""));
        assert!(out.contains("xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\""));
        assert!(out.contains("xsi:nil=\"true\""));
        assert!(out.contains("<Name>Picket &amp; Screen</Name>"));

        let reparsed = XmlDocument::parse(&out, "reparsed").unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_set_text_clears_nil_marker() {
        let mut doc = XmlDocument::parse(SAMPLE, "sample").unwrap();
        let save_id = doc.root_mut().find_mut("Ships/Ship/SaveID").unwrap();
        save_id.set_text("7");
        assert!(!save_id.is_nil());
        assert_eq!(save_id.text().as_deref(), Some("7"));
    }

    #[test]
    fn test_ensure_schema_namespaces_restores_missing_declarations() {
        let mut doc = XmlDocument::parse("<Fleet><Name>A</Name></Fleet>", "bare").unwrap();
        doc.ensure_schema_namespaces();
        assert_eq!(doc.root().attr("xmlns:xsd"), Some(XSD_NAMESPACE));
        assert_eq!(doc.root().attr("xmlns:xsi"), Some(XSI_NAMESPACE));

        // Idempotent
        doc.ensure_schema_namespaces();
        assert_eq!(doc.root().attributes.len(), 2);
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        let err = XmlDocument::parse("<Fleet><Name>A</Fleet>", "broken").unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedDocument { .. }));

        let err = XmlDocument::parse("", "empty").unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedDocument { .. }));
    }

    #[test]
    fn test_descendant_search_in_document_order() {
        let text = "<Ship><A><Parts><P>1</P></Parts></A><Parts><P>2</P><P>3</P></Parts></Ship>";
        let mut doc = XmlDocument::parse(text, "nested").unwrap();

        let first = doc.root().descendant("Parts").unwrap();
        assert_eq!(first.child_text("P").as_deref(), Some("1"));

        let values: Vec<_> = doc
            .root()
            .descendants_named("P")
            .into_iter()
            .filter_map(|p| p.text())
            .collect();
        assert_eq!(values, vec!["1", "2", "3"]);

        doc.root_mut().descendant_mut("P").unwrap().set_text("9");
        assert_eq!(doc.root().find("A/Parts/P").and_then(|p| p.text()).as_deref(), Some("9"));
        assert!(doc.root().descendant("Missing").is_none());
    }

    #[test]
    fn test_remove_elements_where() {
        let mut doc = XmlDocument::parse(SAMPLE, "sample").unwrap();
        let ships = doc.root_mut().child_mut("Ships").unwrap();
        let removed = ships.remove_elements_where(|s| s.child_text("Name").as_deref() == Some("Ardent"));
        assert_eq!(removed, 1);
        assert_eq!(ships.elements().count(), 0);
    }
}
