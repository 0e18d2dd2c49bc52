//! Property-based tests for versions file invariants.
//!
//! These tests verify properties that should hold for all inputs:
//! - Merging the same add-on twice changes nothing
//! - Saving a loaded document is stable
//! - The add-on list stays sorted and free of duplicates

#[cfg(test)]
mod tests {
    use crate::addons::{self, AddOnEntry};
    use crate::document::{Document, Key, Node};
    use crate::keys;
    use proptest::prelude::*;

    fn id_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,11}"
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        "[ -~]{1,30}".prop_map(|s| s.trim().to_string())
            .prop_filter("non-empty after trim", |s| !s.is_empty())
    }

    fn entry_strategy() -> impl Strategy<Value = AddOnEntry> {
        (id_strategy(), 1u32..200, text_strategy()).prop_map(|(id, version, name)| {
            let mut data = Node::new(keys::add_on_key(&id).to_string());
            data.set_property(&Key::new("name"), name);
            data.set_property(&Key::new("version"), version.to_string());
            AddOnEntry::new(id, data)
        })
    }

    fn document_strategy() -> impl Strategy<Value = Document> {
        (
            proptest::option::of(text_strategy()),
            prop::collection::vec(entry_strategy(), 0..6),
        )
            .prop_map(|(version, entries)| {
                let mut document = Document::new();
                if let Some(version) = version {
                    document.set_property(&keys::core_version(), version);
                }
                // Listed in arbitrary order, as hand-edited files may be.
                for entry in entries {
                    document.add_property(&keys::add_on_list(), entry.id());
                    let id = entry.id().to_string();
                    document.add_nodes(&keys::add_on_key(&id), entry.into_data().into_children());
                }
                document
            })
    }

    proptest! {
        /// Property: merge(merge(D, E), E) == merge(D, E)
        #[test]
        fn merge_is_idempotent(document in document_strategy(), entry in entry_strategy()) {
            let mut once = document;
            addons::merge(&mut once, entry.clone());
            let mut twice = once.clone();
            addons::merge(&mut twice, entry);

            prop_assert_eq!(twice.to_xml_string(), once.to_xml_string());
        }

        /// Property: save(load(save(load(D)))) == save(load(D))
        #[test]
        fn save_load_is_stable(document in document_strategy()) {
            let saved = document.to_xml_string();
            let reloaded = Document::parse(&saved).unwrap();
            let saved_again = reloaded.to_xml_string();

            prop_assert_eq!(&saved_again, &saved);
            prop_assert_eq!(Document::parse(&saved_again).unwrap().to_xml_string(), saved);
        }

        /// Property: after any sequence of merges the id list is strictly ascending
        #[test]
        fn merged_ids_are_sorted_and_unique(
            document in document_strategy(),
            entries in prop::collection::vec(entry_strategy(), 1..8),
        ) {
            let mut document = document;
            for entry in entries {
                addons::merge(&mut document, entry);
            }

            let ids = addons::add_on_ids(&document);
            prop_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", ids);
        }

        /// Property: the merged entry is always present with its version
        #[test]
        fn merged_entry_is_present(document in document_strategy(), entry in entry_strategy()) {
            let mut document = document;
            let id = entry.id().to_string();
            let version = entry.version().map(String::from);
            addons::merge(&mut document, entry);

            prop_assert!(addons::add_on_ids(&document).contains(&id));
            prop_assert_eq!(
                document.get_string(&keys::add_on_key(&id).child("version")).map(String::from),
                version
            );
        }
    }
}
