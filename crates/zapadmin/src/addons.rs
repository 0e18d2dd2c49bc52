//! Add-on entries of a versions file and how a new release is merged in.
//!
//! Every add-on has one `addon` list element carrying its id and one
//! `addon_<id>` subtree with its metadata. A merge rebuilds all of them from
//! scratch in ascending id order, which keeps the list sorted and free of
//! duplicates no matter how the file looked before.

use std::collections::BTreeMap;

use crate::document::{Document, Key, Node};
use crate::keys;

/// An add-on id with its metadata subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOnEntry {
    id: String,
    data: Node,
}

impl AddOnEntry {
    pub fn new(id: impl Into<String>, data: Node) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Read the entry of `id` from a document, if it has a subtree.
    pub fn from_document(document: &Document, id: &str) -> Option<Self> {
        document
            .configuration_at(&keys::add_on_key(id))
            .map(|data| Self::new(id, data.clone()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Node {
        &self.data
    }

    pub fn into_data(self) -> Node {
        self.data
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get_string(&Key::new("name"))
    }

    pub fn version(&self) -> Option<&str> {
        self.data.get_string(&Key::new("version"))
    }
}

/// Ids listed by the `addon` elements, in document order.
pub fn add_on_ids(document: &Document) -> Vec<String> {
    document
        .get_string_array(&keys::add_on_list())
        .into_iter()
        .map(String::from)
        .collect()
}

/// Merge `entry` into the document, replacing any entry with the same id.
///
/// Ids listed without a subtree are dropped; when an id is listed more than
/// once the first subtree wins.
pub fn merge(document: &mut Document, entry: AddOnEntry) {
    let list = keys::add_on_list();
    let mut entries: BTreeMap<String, AddOnEntry> = BTreeMap::new();

    for id in add_on_ids(document) {
        if id == entry.id {
            continue;
        }
        let key = keys::add_on_key(&id);
        if let Some(existing) = AddOnEntry::from_document(document, &id) {
            entries.entry(id).or_insert(existing);
        }
        document.clear_tree(&key);
    }

    document.clear_tree(&list);
    document.clear_tree(&keys::add_on_key(&entry.id));

    entries.insert(entry.id.clone(), entry);

    for (id, entry) in entries {
        document.add_property(&list, id.as_str());
        document.add_nodes(&keys::add_on_key(&id), entry.into_data().into_children());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, version: &str) -> AddOnEntry {
        let mut data = Node::new(format!("addon_{id}"));
        data.set_property(&Key::new("name"), format!("Add-on {id}"));
        data.set_property(&Key::new("version"), version);
        AddOnEntry::new(id, data)
    }

    #[test]
    fn merge_into_empty_document_sorts_ids() {
        let mut doc = Document::new();
        for id in ["zzz", "aaa", "mmm"] {
            merge(&mut doc, entry(id, "1"));
        }

        assert_eq!(add_on_ids(&doc), vec!["aaa", "mmm", "zzz"]);
        assert_eq!(
            doc.get_string(&Key::parse("addon_mmm.version").expect("key")),
            Some("1")
        );
    }

    #[test]
    fn merge_replaces_existing_entry() {
        let mut doc = Document::new();
        merge(&mut doc, entry("ascanrules", "60"));
        merge(&mut doc, entry("pscanrules", "55"));
        merge(&mut doc, entry("ascanrules", "61"));

        assert_eq!(add_on_ids(&doc), vec!["ascanrules", "pscanrules"]);
        assert_eq!(
            doc.get_string(&Key::parse("addon_ascanrules.version").expect("key")),
            Some("61")
        );
        assert_eq!(doc.configurations_at(&keys::add_on_key("ascanrules")).len(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut doc = Document::parse(
            "<ZAP><core><version>2.14.0</version></core>\
             <addon>b</addon><addon_b><version>2</version></addon_b>\
             <addon>a</addon><addon_a><version>1</version></addon_a></ZAP>",
        )
        .expect("parse");

        merge(&mut doc, entry("c", "1"));
        let once = doc.to_xml_string();
        merge(&mut doc, entry("c", "1"));
        assert_eq!(doc.to_xml_string(), once);
    }

    #[test]
    fn merge_keeps_other_content_and_interleaves_entries() {
        let mut doc = Document::parse(
            "<ZAP><core><version>2.14.0</version></core>\
             <addon>b</addon><addon_b><version>2</version></addon_b></ZAP>",
        )
        .expect("parse");

        merge(&mut doc, entry("a", "1"));

        let names: Vec<&str> = doc.root().children().iter().map(Node::name).collect();
        assert_eq!(names, vec!["core", "addon", "addon_a", "addon", "addon_b"]);
        assert_eq!(doc.get_string(&keys::core_version()), Some("2.14.0"));
    }

    #[test]
    fn merge_drops_listed_ids_without_subtree_and_duplicates() {
        let mut doc = Document::parse(
            "<ZAP><addon>ghost</addon>\
             <addon>b</addon><addon_b><version>2</version></addon_b>\
             <addon>b</addon></ZAP>",
        )
        .expect("parse");

        merge(&mut doc, entry("a", "1"));
        assert_eq!(add_on_ids(&doc), vec!["a", "b"]);
    }

    #[test]
    fn entry_accessors() {
        let e = entry("x", "3");
        assert_eq!(e.id(), "x");
        assert_eq!(e.name(), Some("Add-on x"));
        assert_eq!(e.version(), Some("3"));
    }
}
