//! In-memory model of a versions file.
//!
//! A [`Document`] is an ordered tree of [`Node`]s addressed by typed [`Key`]s
//! (`core.daily.hash`, `dependencies.addons.addon(1).id`). Loading
//! canonicalizes the tree (comments, processing instructions and
//! whitespace-only text are dropped, text is trimmed) so that saving an
//! unmodified document is byte-stable across any number of load/save cycles.
//!
//! Values are never split on delimiters: `a, b` stays one value.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// Name of the root element written on save.
pub const ROOT_ELEMENT: &str = "ZAP";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#;
const INDENT: &str = "    ";

/// One step of a [`Key`]: an element name, optionally selecting the n-th
/// sibling with that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    name: String,
    index: Option<usize>,
}

impl Segment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    fn selects(&self, position: usize) -> bool {
        self.index.is_none_or(|wanted| wanted == position)
    }
}

/// Path to one or more nodes of a tree, relative to the node it is applied to.
///
/// Without an index a segment matches every same-named sibling; reads take
/// the first match and writes create the node when none exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Key {
    segments: Vec<Segment>,
}

impl Key {
    /// The empty key, addressing the node it is applied to.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self::root().child(name)
    }

    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment {
            name: name.into(),
            index: None,
        });
        self
    }

    pub fn indexed(mut self, name: impl Into<String>, index: usize) -> Self {
        self.segments.push(Segment {
            name: name.into(),
            index: Some(index),
        });
        self
    }

    pub fn join(&self, other: &Key) -> Key {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Key { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parse the dotted form, e.g. `dependencies.addons.addon(0).id`.
    pub fn parse(key: &str) -> Result<Key> {
        let invalid = || Error::Validation(format!("invalid key: '{key}'"));

        if key.is_empty() {
            return Ok(Key::root());
        }

        let mut parsed = Key::root();
        for part in key.split('.') {
            let (name, index) = match part.split_once('(') {
                Some((name, rest)) => {
                    let index = rest
                        .strip_suffix(')')
                        .and_then(|i| i.parse::<usize>().ok())
                        .ok_or_else(invalid)?;
                    (name, Some(index))
                }
                None => (part, None),
            };
            if name.is_empty() || name.contains(')') {
                return Err(invalid());
            }
            parsed.segments.push(Segment {
                name: name.to_string(),
                index,
            });
        }
        Ok(parsed)
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Key::parse(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            if let Some(index) = segment.index {
                write!(f, "({index})")?;
            }
        }
        Ok(())
    }
}

/// An element of the tree. Children are owned by their parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    value: Option<String>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.value = Some(value.into());
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn into_children(self) -> Vec<Node> {
        self.children
    }

    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    fn collect_matching<'a>(&'a self, segment: &Segment, out: &mut Vec<&'a Node>) {
        let mut position = 0;
        for child in &self.children {
            if child.name != segment.name {
                continue;
            }
            if segment.selects(position) {
                out.push(child);
            }
            position += 1;
        }
    }

    /// All nodes matched by `key`, in document order.
    pub fn find_all(&self, key: &Key) -> Vec<&Node> {
        let mut current = vec![self];
        for segment in key.segments() {
            let mut next = Vec::new();
            for node in current {
                node.collect_matching(segment, &mut next);
            }
            current = next;
        }
        current
    }

    /// The first node matched by `key`.
    pub fn find(&self, key: &Key) -> Option<&Node> {
        self.find_all(key).into_iter().next()
    }

    pub fn get_string(&self, key: &Key) -> Option<&str> {
        self.find(key).and_then(Node::value)
    }

    pub fn get_string_or<'a>(&'a self, key: &Key, default: &'a str) -> &'a str {
        self.get_string(key).unwrap_or(default)
    }

    /// Values of every node matched by `key`, e.g. all repeated `addon`
    /// elements.
    pub fn get_string_array(&self, key: &Key) -> Vec<&str> {
        self.find_all(key)
            .into_iter()
            .filter_map(Node::value)
            .collect()
    }

    /// Subtree at `key`, usable for reading or copying its children.
    pub fn configuration_at(&self, key: &Key) -> Option<&Node> {
        self.find(key)
    }

    pub fn configurations_at(&self, key: &Key) -> Vec<&Node> {
        self.find_all(key)
    }

    /// Set the value of the node at `key`, creating missing nodes.
    pub fn set_property(&mut self, key: &Key, value: impl Into<String>) {
        self.node_or_insert(key.segments()).set_value(value);
    }

    /// Append a new node with `value` at `key`, even if one already exists.
    pub fn add_property(&mut self, key: &Key, value: impl Into<String>) {
        match key.segments().split_last() {
            Some((last, parents)) => self
                .node_or_insert(parents)
                .children
                .push(Node::with_value(last.name.clone(), value)),
            None => self.set_value(value),
        }
    }

    /// Remove every node matched by `key`. Absent keys are a no-op.
    pub fn clear_tree(&mut self, key: &Key) {
        self.clear_path(key.segments());
    }

    /// Append `nodes` as children of the node at `key`, creating it if needed.
    pub fn add_nodes(&mut self, key: &Key, nodes: impl IntoIterator<Item = Node>) {
        self.node_or_insert(key.segments()).children.extend(nodes);
    }

    fn clear_path(&mut self, segments: &[Segment]) {
        match segments {
            [] => {
                self.children.clear();
                self.value = None;
            }
            [last] => {
                let mut position = 0;
                self.children.retain(|child| {
                    if child.name != last.name {
                        return true;
                    }
                    let current = position;
                    position += 1;
                    !last.selects(current)
                });
            }
            [first, rest @ ..] => {
                let mut position = 0;
                for child in self.children.iter_mut() {
                    if child.name != first.name {
                        continue;
                    }
                    let current = position;
                    position += 1;
                    if first.selects(current) {
                        child.clear_path(rest);
                    }
                }
            }
        }
    }

    fn node_or_insert(&mut self, segments: &[Segment]) -> &mut Node {
        let mut node = self;
        for segment in segments {
            node = node.child_or_insert(segment);
        }
        node
    }

    fn child_or_insert(&mut self, segment: &Segment) -> &mut Node {
        let existing = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.name == segment.name)
            .map(|(i, _)| i)
            .nth(segment.index.unwrap_or(0));

        match existing {
            Some(i) => &mut self.children[i],
            None => {
                self.children.push(Node::new(segment.name.clone()));
                let last = self.children.len() - 1;
                &mut self.children[last]
            }
        }
    }

    fn write_xml(&self, out: &mut String, depth: usize) {
        push_indent(out, depth);
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        let value = self.value.as_deref().filter(|v| !v.is_empty());
        if self.children.is_empty() {
            match value {
                Some(value) => {
                    out.push('>');
                    out.push_str(&partial_escape(value));
                    push_end_tag(out, &self.name);
                }
                None => out.push_str("/>\n"),
            }
            return;
        }

        out.push_str(">\n");
        if let Some(value) = value {
            push_indent(out, depth + 1);
            out.push_str(&partial_escape(value));
            out.push('\n');
        }
        for child in &self.children {
            child.write_xml(out, depth + 1);
        }
        push_indent(out, depth);
        push_end_tag(out, &self.name);
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn push_end_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

/// Parse XML text into a tree, returning its root element.
pub(crate) fn parse_tree(xml: &str, what: &str) -> Result<Node> {
    let parse_error = |message: String| Error::Parse {
        what: what.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml.strip_prefix('\u{feff}').unwrap_or(xml));
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_error(format!("{e} (at byte {})", reader.buffer_position())))?;

        match event {
            Event::Start(start) => stack.push(node_from_start(&start).map_err(parse_error)?),
            Event::Empty(start) => {
                let node = node_from_start(&start).map_err(parse_error)?;
                attach(&mut stack, &mut root, node).map_err(parse_error)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| parse_error("unexpected end tag".to_string()))?;
                attach(&mut stack, &mut root, node).map_err(parse_error)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| parse_error(e.to_string()))?;
                append_text(&mut stack, &text).map_err(parse_error)?;
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data).map_err(|e| parse_error(e.to_string()))?;
                append_text(&mut stack, text).map_err(parse_error)?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions and doctype.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(parse_error("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| parse_error("no root element".to_string()))
}

fn node_from_start(start: &BytesStart<'_>) -> std::result::Result<Node, String> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();

    let mut node = Node::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        node.attributes.push((key, value.into_owned()));
    }
    Ok(node)
}

fn attach(
    stack: &mut [Node],
    root: &mut Option<Node>,
    node: Node,
) -> std::result::Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(format!("multiple root elements, found <{}>", node.name));
    }
    *root = Some(node);
    Ok(())
}

fn append_text(stack: &mut [Node], text: &str) -> std::result::Result<(), String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let node = stack
        .last_mut()
        .ok_or_else(|| format!("text outside the root element: {text}"))?;
    match node.value.as_mut() {
        Some(value) => value.push_str(text),
        None => node.value = Some(text.to_string()),
    }
    Ok(())
}

/// A versions file: the tree under the fixed root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Node,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            root: Node::new(ROOT_ELEMENT),
        }
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(xml: &str) -> Result<Self> {
        Self::parse_named(xml, "document")
    }

    fn parse_named(xml: &str, what: &str) -> Result<Self> {
        let mut root = parse_tree(xml, what)?;
        root.name = ROOT_ELEMENT.to_string();
        Ok(Self { root })
    }

    pub fn load(mut reader: impl Read) -> Result<Self> {
        let mut xml = String::new();
        reader
            .read_to_string(&mut xml)
            .map_err(|e| Error::Parse {
                what: "document".to_string(),
                message: e.to_string(),
            })?;
        Self::parse(&xml)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse_named(&xml, &path.display().to_string())
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn get_string(&self, key: &Key) -> Option<&str> {
        self.root.get_string(key)
    }

    pub fn get_string_or<'a>(&'a self, key: &Key, default: &'a str) -> &'a str {
        self.root.get_string_or(key, default)
    }

    pub fn get_string_array(&self, key: &Key) -> Vec<&str> {
        self.root.get_string_array(key)
    }

    pub fn configuration_at(&self, key: &Key) -> Option<&Node> {
        self.root.configuration_at(key)
    }

    pub fn configurations_at(&self, key: &Key) -> Vec<&Node> {
        self.root.configurations_at(key)
    }

    pub fn set_property(&mut self, key: &Key, value: impl Into<String>) {
        self.root.set_property(key, value);
    }

    pub fn add_property(&mut self, key: &Key, value: impl Into<String>) {
        self.root.add_property(key, value);
    }

    pub fn clear_tree(&mut self, key: &Key) {
        self.root.clear_tree(key);
    }

    pub fn add_nodes(&mut self, key: &Key, nodes: impl IntoIterator<Item = Node>) {
        self.root.add_nodes(key, nodes);
    }

    /// Serialize with the XML declaration, 4-space indentation and a
    /// trailing newline.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        self.root.write_xml(&mut out, 0);
        out
    }

    /// Save to `path`, replacing it only once the whole document is written.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("xml.tmp");
        fs::write(&tmp_path, self.to_xml_string()).map_err(|e| Error::io(&tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
        Ok(())
    }
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Document::parse(s)
    }
}
