//! Lazy wrapper views over documents and arrays.
//!
//! A view is a non-owning handle: a shared backing document or array plus a path of
//! keys and indexes leading to the wrapped node. Reads translate into
//! [`reader`](crate::reader) calls against the backing storage and writes into
//! [`Converter`] calls. Nested documents and arrays are wrapped on access by extending
//! the path; nothing is copied and nothing is cached.
//!
//! Edits made through a view that remove or replace a nested container, or shift array
//! elements, invalidate the nested views taken before them at that position. Such views
//! fail with [`ConversionError::StaleView`] instead of resolving to whatever now sits at
//! their path. Edits made directly on the shared storage are not tracked.
//!
//! Views are single-threaded (`Rc<RefCell<_>>`). Callers sharing one must serialize access.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docshape_core::{convert::Converter, host::HostValue, view::DocumentView};
//!
//! let view = DocumentView::new(doc! { "address": { "city": "Oslo" } });
//! let Some(HostValue::Document(address)) = view.get("address") else { unreachable!() };
//!
//! address.set("city", &HostValue::from("Bergen"), &Converter::new())?;
//! assert_eq!(view.to_document()?, doc! { "address": { "city": "Bergen" } });
//! ```

use std::{cell::RefCell, fmt, mem, rc::Rc};

use bson::{Bson, Document};

use crate::{
    convert::Converter,
    error::{ConversionError, ConversionResult},
    host::HostValue,
    reader,
};

/// A document shared between its owner and any number of wrapper views.
pub type SharedDocument = Rc<RefCell<Document>>;

/// An array shared between its owner and any number of wrapper views.
pub type SharedArray = Rc<RefCell<Vec<Bson>>>;

/// Wraps a document value for the host: documents and arrays become lazy views over
/// fresh backing storage, everything else is read as a scalar.
pub fn wrap(value: Bson) -> HostValue {
    match value {
        Bson::Document(document) => HostValue::Document(DocumentView::new(document)),
        Bson::Array(items) => HostValue::Array(ArrayView::new(items)),
        other => reader::from_bson(&other),
    }
}

#[derive(Clone, Debug)]
enum Root {
    Document(SharedDocument),
    Array(SharedArray),
}

/// Storage shared by a root view and every view nested under it.
#[derive(Clone, Debug)]
struct Backing {
    root: Root,
    edits: Rc<RefCell<Vec<Edit>>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, ".{key}"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A structural edit recorded against a view lineage.
#[derive(Clone, Debug)]
enum Edit {
    /// The container at this path was replaced or removed.
    Replaced(Vec<Segment>),
    /// The array element at this path was removed, moving every later element.
    Shifted(Vec<Segment>),
}

impl Edit {
    fn invalidates(&self, path: &[Segment]) -> bool {
        match self {
            Edit::Replaced(edited) => path.starts_with(edited),
            Edit::Shifted(edited) => {
                let Some((Segment::Index(removed), parent)) = edited.split_last() else {
                    return false;
                };
                path.starts_with(parent)
                    && matches!(path.get(parent.len()), Some(Segment::Index(index)) if index >= removed)
            }
        }
    }
}

fn is_container(value: &Bson) -> bool {
    matches!(value, Bson::Document(_) | Bson::Array(_))
}

fn child_path(path: &[Segment], segment: Segment) -> Vec<Segment> {
    let mut child = path.to_vec();
    child.push(segment);
    child
}

enum Node<'a> {
    Document(&'a Document),
    Array(&'a Vec<Bson>),
}

enum NodeMut<'a> {
    Document(&'a mut Document),
    Array(&'a mut Vec<Bson>),
}

fn resolve<'a>(root: Node<'a>, path: &[Segment]) -> Option<Node<'a>> {
    path.iter().try_fold(root, |node, segment| {
        let child = match (node, segment) {
            (Node::Document(document), Segment::Key(key)) => document.get(key)?,
            (Node::Array(items), Segment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
        match child {
            Bson::Document(document) => Some(Node::Document(document)),
            Bson::Array(items) => Some(Node::Array(items)),
            _ => None,
        }
    })
}

fn resolve_mut<'a>(root: NodeMut<'a>, path: &[Segment]) -> Option<NodeMut<'a>> {
    path.iter().try_fold(root, |node, segment| {
        let child = match (node, segment) {
            (NodeMut::Document(document), Segment::Key(key)) => document.get_mut(key)?,
            (NodeMut::Array(items), Segment::Index(index)) => items.get_mut(*index)?,
            _ => return None,
        };
        match child {
            Bson::Document(document) => Some(NodeMut::Document(document)),
            Bson::Array(items) => Some(NodeMut::Array(items)),
            _ => None,
        }
    })
}

impl Backing {
    fn new(root: Root) -> Self {
        Backing {
            root,
            edits: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Number of edits recorded so far; a view taken now only sees later edits.
    fn epoch(&self) -> usize {
        self.edits.borrow().len()
    }

    fn record(&self, edit: Edit) {
        self.edits.borrow_mut().push(edit);
    }

    fn is_stale(&self, path: &[Segment], epoch: usize) -> bool {
        self.edits
            .borrow()
            .iter()
            .skip(epoch)
            .any(|edit| edit.invalidates(path))
    }

    fn read<R>(&self, path: &[Segment], epoch: usize, f: impl FnOnce(Node<'_>) -> R) -> Option<R> {
        if self.is_stale(path, epoch) {
            return None;
        }
        match &self.root {
            Root::Document(document) => {
                let guard = document.borrow();
                resolve(Node::Document(&guard), path).map(f)
            }
            Root::Array(items) => {
                let guard = items.borrow();
                resolve(Node::Array(&guard), path).map(f)
            }
        }
    }

    fn write<R>(&self, path: &[Segment], epoch: usize, f: impl FnOnce(NodeMut<'_>) -> R) -> Option<R> {
        if self.is_stale(path, epoch) {
            return None;
        }
        match &self.root {
            Root::Document(document) => {
                let mut guard = document.borrow_mut();
                resolve_mut(NodeMut::Document(&mut guard), path).map(f)
            }
            Root::Array(items) => {
                let mut guard = items.borrow_mut();
                resolve_mut(NodeMut::Array(&mut guard), path).map(f)
            }
        }
    }
}

fn describe(path: &[Segment]) -> String {
    if path.is_empty() {
        return "$".to_string();
    }
    path.iter().fold("$".to_string(), |acc, segment| format!("{acc}{segment}"))
}

/// Wraps a child value reached through `path`: containers become nested views.
fn wrap_child(backing: &Backing, path: &[Segment], segment: Segment, value: &Bson) -> HostValue {
    match value {
        Bson::Document(_) => HostValue::Document(DocumentView {
            backing: backing.clone(),
            path: child_path(path, segment),
            epoch: backing.epoch(),
        }),
        Bson::Array(_) => HostValue::Array(ArrayView {
            backing: backing.clone(),
            path: child_path(path, segment),
            epoch: backing.epoch(),
        }),
        other => reader::from_bson(other),
    }
}

/// A lazy, mutation-transparent host view over a document.
#[derive(Clone, Debug)]
pub struct DocumentView {
    backing: Backing,
    path: Vec<Segment>,
    epoch: usize,
}

impl DocumentView {
    /// Wraps a new document, taking it as the view's backing storage.
    pub fn new(document: Document) -> Self {
        DocumentView::from_shared(Rc::new(RefCell::new(document)))
    }

    /// Wraps an existing shared document without copying it.
    pub fn from_shared(document: SharedDocument) -> Self {
        DocumentView {
            backing: Backing::new(Root::Document(document)),
            path: Vec::new(),
            epoch: 0,
        }
    }

    /// Returns the backing document when this view wraps it directly (not a nested node).
    pub fn shared(&self) -> Option<SharedDocument> {
        match (&self.backing.root, self.path.is_empty()) {
            (Root::Document(document), true) => Some(Rc::clone(document)),
            _ => None,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> ConversionResult<R> {
        self.backing
            .read(&self.path, self.epoch, |node| match node {
                Node::Document(document) => Some(f(document)),
                Node::Array(_) => None,
            })
            .flatten()
            .ok_or_else(|| ConversionError::StaleView(describe(&self.path)))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> ConversionResult<R> {
        self.backing
            .write(&self.path, self.epoch, |node| match node {
                NodeMut::Document(document) => Some(f(document)),
                NodeMut::Array(_) => None,
            })
            .flatten()
            .ok_or_else(|| ConversionError::StaleView(describe(&self.path)))
    }

    pub fn len(&self) -> ConversionResult<usize> {
        self.read(Document::len)
    }

    pub fn is_empty(&self) -> ConversionResult<bool> {
        self.read(Document::is_empty)
    }

    pub fn keys(&self) -> ConversionResult<Vec<String>> {
        self.read(|document| document.keys().cloned().collect())
    }

    pub fn contains_key(&self, key: &str) -> ConversionResult<bool> {
        self.read(|document| document.contains_key(key))
    }

    /// Reads a field. Documents and arrays come back as nested views into the same storage.
    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.read(|document| {
            document.get(key).map(|value| {
                wrap_child(&self.backing, &self.path, Segment::Key(key.to_string()), value)
            })
        })
        .ok()
        .flatten()
    }

    /// Converts `value` and stores it under `key`, replacing any existing value in place.
    pub fn set(&self, key: &str, value: &HostValue, converter: &Converter<'_>) -> ConversionResult<()> {
        let value = converter.to_bson(value)?;
        let previous = self.write(|document| document.insert(key, value))?;
        self.replaced(key, previous.as_ref());
        Ok(())
    }

    /// Removes a field, returning its value read as a detached host value.
    pub fn remove(&self, key: &str) -> ConversionResult<Option<HostValue>> {
        let removed = self.write(|document| document.remove(key))?;
        self.replaced(key, removed.as_ref());
        Ok(removed.map(wrap))
    }

    fn replaced(&self, key: &str, previous: Option<&Bson>) {
        if previous.is_some_and(is_container) {
            self.backing.record(Edit::Replaced(child_path(
                &self.path,
                Segment::Key(key.to_string()),
            )));
        }
    }

    /// Lists all fields in document order, wrapping nested containers lazily.
    pub fn entries(&self) -> ConversionResult<Vec<(String, HostValue)>> {
        self.read(|document| {
            document
                .iter()
                .map(|(key, value)| {
                    (
                        key.clone(),
                        wrap_child(&self.backing, &self.path, Segment::Key(key.clone()), value),
                    )
                })
                .collect()
        })
    }

    /// Copies the wrapped document out of the backing storage.
    pub fn to_document(&self) -> ConversionResult<Document> {
        self.read(Document::clone)
    }
}

/// A lazy, mutation-transparent host view over an array.
#[derive(Clone, Debug)]
pub struct ArrayView {
    backing: Backing,
    path: Vec<Segment>,
    epoch: usize,
}

impl ArrayView {
    /// Wraps a new array, taking it as the view's backing storage.
    pub fn new(items: Vec<Bson>) -> Self {
        ArrayView::from_shared(Rc::new(RefCell::new(items)))
    }

    /// Wraps an existing shared array without copying it.
    pub fn from_shared(items: SharedArray) -> Self {
        ArrayView {
            backing: Backing::new(Root::Array(items)),
            path: Vec::new(),
            epoch: 0,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Vec<Bson>) -> R) -> ConversionResult<R> {
        self.backing
            .read(&self.path, self.epoch, |node| match node {
                Node::Array(items) => Some(f(items)),
                Node::Document(_) => None,
            })
            .flatten()
            .ok_or_else(|| ConversionError::StaleView(describe(&self.path)))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Vec<Bson>) -> R) -> ConversionResult<R> {
        self.backing
            .write(&self.path, self.epoch, |node| match node {
                NodeMut::Array(items) => Some(f(items)),
                NodeMut::Document(_) => None,
            })
            .flatten()
            .ok_or_else(|| ConversionError::StaleView(describe(&self.path)))
    }

    pub fn len(&self) -> ConversionResult<usize> {
        self.read(Vec::len)
    }

    pub fn is_empty(&self) -> ConversionResult<bool> {
        self.read(Vec::is_empty)
    }

    /// Reads an element. Documents and arrays come back as nested views into the same storage.
    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.read(|items| {
            items
                .get(index)
                .map(|value| wrap_child(&self.backing, &self.path, Segment::Index(index), value))
        })
        .ok()
        .flatten()
    }

    /// Converts `value` and stores it at `index`. Out-of-range indexes are a stale access.
    pub fn set(&self, index: usize, value: &HostValue, converter: &Converter<'_>) -> ConversionResult<()> {
        let value = converter.to_bson(value)?;
        let path = &self.path;
        let previous = self.write(|items| match items.get_mut(index) {
            Some(slot) => Ok(mem::replace(slot, value)),
            None => Err(ConversionError::StaleView(format!(
                "{}[{index}]",
                describe(path)
            ))),
        })??;

        if is_container(&previous) {
            self.backing
                .record(Edit::Replaced(child_path(&self.path, Segment::Index(index))));
        }
        Ok(())
    }

    /// Converts `value` and appends it.
    pub fn push(&self, value: &HostValue, converter: &Converter<'_>) -> ConversionResult<()> {
        let value = converter.to_bson(value)?;
        self.write(|items| items.push(value))
    }

    /// Removes an element, returning it read as a detached host value.
    pub fn remove(&self, index: usize) -> ConversionResult<Option<HostValue>> {
        let removed = self.write(|items| (index < items.len()).then(|| items.remove(index)))?;
        if removed.is_some() {
            self.backing
                .record(Edit::Shifted(child_path(&self.path, Segment::Index(index))));
        }
        Ok(removed.map(wrap))
    }

    /// Lists all elements in order, wrapping nested containers lazily.
    pub fn values(&self) -> ConversionResult<Vec<HostValue>> {
        self.read(|items| {
            items
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    wrap_child(&self.backing, &self.path, Segment::Index(index), value)
                })
                .collect()
        })
    }

    /// Copies the wrapped array out of the backing storage.
    pub fn to_vec(&self) -> ConversionResult<Vec<Bson>> {
        self.read(Vec::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_nested_view_writes_through() {
        let view = DocumentView::new(doc! { "address": { "city": "Oslo" } });
        let Some(HostValue::Document(address)) = view.get("address") else {
            panic!("expected a nested document view");
        };

        address
            .set("city", &HostValue::from("Bergen"), &Converter::new())
            .unwrap();

        assert_eq!(
            view.to_document().unwrap(),
            doc! { "address": { "city": "Bergen" } }
        );
    }

    #[test]
    fn test_removed_sibling_invalidates_later_views() {
        let view = ArrayView::new(vec![
            Bson::Document(doc! { "a": 1 }),
            Bson::Document(doc! { "a": 2 }),
            Bson::Document(doc! { "a": 3 }),
        ]);
        let Some(HostValue::Document(first)) = view.get(0) else {
            panic!("expected a nested document view");
        };
        let Some(HostValue::Document(second)) = view.get(1) else {
            panic!("expected a nested document view");
        };

        view.remove(0).unwrap();

        let result = second.set("a", &HostValue::from(99), &Converter::new());
        assert!(matches!(result, Err(ConversionError::StaleView(path)) if path == "$[1]"));
        assert!(first.get("a").is_none());
        assert_eq!(
            view.to_vec().unwrap(),
            vec![Bson::Document(doc! { "a": 2 }), Bson::Document(doc! { "a": 3 })]
        );

        let Some(HostValue::Document(fresh)) = view.get(0) else {
            panic!("expected a nested document view");
        };
        fresh.set("a", &HostValue::from(20), &Converter::new()).unwrap();
        assert_eq!(view.to_vec().unwrap()[0], Bson::Document(doc! { "a": 20 }));
    }

    #[test]
    fn test_earlier_siblings_survive_removal() {
        let view = ArrayView::new(vec![Bson::Array(vec![Bson::Int32(1)]), Bson::Int32(2)]);
        let Some(HostValue::Array(head)) = view.get(0) else {
            panic!("expected a nested array view");
        };

        view.remove(1).unwrap();
        head.push(&HostValue::from(5), &Converter::new()).unwrap();

        assert_eq!(
            view.to_vec().unwrap(),
            vec![Bson::Array(vec![Bson::Int32(1), Bson::Int32(5)])]
        );
    }

    #[test]
    fn test_replaced_key_invalidates_nested_views() {
        let view = DocumentView::new(doc! { "inner": { "x": 1 }, "other": { "y": 1 } });
        let Some(HostValue::Document(inner)) = view.get("inner") else {
            panic!("expected a nested document view");
        };
        let Some(HostValue::Document(other)) = view.get("other") else {
            panic!("expected a nested document view");
        };

        view.set("inner", &HostValue::Bson(Bson::Document(doc! { "x": 2 })), &Converter::new())
            .unwrap();

        assert!(matches!(inner.len(), Err(ConversionError::StaleView(_))));
        assert_eq!(other.len().unwrap(), 1);
        assert!(matches!(view.get("inner"), Some(HostValue::Document(_))));
    }

    #[test]
    fn test_view_shares_backing_storage() {
        let shared = Rc::new(RefCell::new(doc! { "a": 1 }));
        let view = DocumentView::from_shared(Rc::clone(&shared));

        view.set("b", &HostValue::from(2), &Converter::new()).unwrap();

        assert_eq!(*shared.borrow(), doc! { "a": 1, "b": 2 });
        assert!(Rc::ptr_eq(&view.shared().unwrap(), &shared));
    }

    #[test]
    fn test_nested_view_has_no_shared_root() {
        let view = DocumentView::new(doc! { "inner": {} });
        let Some(HostValue::Document(inner)) = view.get("inner") else {
            panic!("expected a nested document view");
        };
        assert!(inner.shared().is_none());
    }

    #[test]
    fn test_stale_view_after_replacement() {
        let view = DocumentView::new(doc! { "inner": { "x": 1 } });
        let Some(HostValue::Document(inner)) = view.get("inner") else {
            panic!("expected a nested document view");
        };

        view.set("inner", &HostValue::from(5), &Converter::new()).unwrap();

        assert!(matches!(inner.len(), Err(ConversionError::StaleView(path)) if path == "$.inner"));
        assert!(inner.get("x").is_none());
    }

    #[test]
    fn test_scalar_reads_are_unwrapped() {
        let view = DocumentView::new(doc! { "n": 5_i64, "s": "x", "none": null });
        assert!(matches!(view.get("n"), Some(HostValue::Int64(5))));
        assert!(matches!(view.get("s"), Some(HostValue::String(s)) if s == "x"));
        assert!(matches!(view.get("none"), Some(HostValue::Null)));
        assert!(view.get("missing").is_none());
    }

    #[test]
    fn test_array_view_operations() {
        let view = ArrayView::new(vec![Bson::Int32(1), Bson::Document(doc! { "k": "v" })]);
        let converter = Converter::new();

        view.push(&HostValue::from("tail"), &converter).unwrap();
        view.set(0, &HostValue::from(10), &converter).unwrap();
        assert_eq!(view.len().unwrap(), 3);

        let Some(HostValue::Document(nested)) = view.get(1) else {
            panic!("expected a nested document view");
        };
        nested.set("k", &HostValue::from("w"), &converter).unwrap();

        assert_eq!(
            view.to_vec().unwrap(),
            vec![
                Bson::Int32(10),
                Bson::Document(doc! { "k": "w" }),
                Bson::String("tail".to_string()),
            ]
        );

        assert!(matches!(view.remove(0), Ok(Some(HostValue::Int32(10)))));
        assert!(matches!(view.remove(9), Ok(None)));
        assert!(view.set(9, &HostValue::Null, &converter).is_err());
    }

    #[test]
    fn test_entries_in_document_order() {
        let view = DocumentView::new(doc! { "b": 1, "a": [1, 2] });
        let entries = view.entries().unwrap();

        assert_eq!(entries[0].0, "b");
        assert_eq!(entries[1].0, "a");
        assert!(matches!(&entries[1].1, HostValue::Array(items) if items.len().unwrap() == 2));
    }

    #[test]
    fn test_wrap_scalars_and_containers() {
        assert!(matches!(wrap(Bson::Int32(3)), HostValue::Int32(3)));
        assert!(matches!(wrap(Bson::Document(doc! {})), HostValue::Document(_)));
        assert!(matches!(wrap(Bson::Array(vec![])), HostValue::Array(_)));
    }
}
