//! Field selectors for partial and renamed documents.

use std::{fmt, rc::Rc};

use bson::Document;

use crate::{
    host::{HostMap, HostValue, PropertyBag},
    reader,
};

/// Read-only access to the source a document is being built from.
#[derive(Clone, Copy, Debug)]
pub enum SourceRef<'a> {
    Map(&'a HostMap),
    Object(&'a PropertyBag),
    Document(&'a Document),
}

impl SourceRef<'_> {
    /// Returns whether the source has a key or property called `name`.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            SourceRef::Map(map) => map.contains_key(name),
            SourceRef::Object(bag) => bag.contains(name),
            SourceRef::Document(document) => document.contains_key(name),
        }
    }

    /// Reads `name` from the source. A property that fails to read yields `Null`.
    pub fn get(&self, name: &str) -> Option<HostValue> {
        match self {
            SourceRef::Map(map) => map.get(name).cloned(),
            SourceRef::Object(bag) => bag.get(name).map(|read| read.unwrap_or_default()),
            SourceRef::Document(document) => document.get(name).map(reader::from_bson),
        }
    }
}

/// Computes a field value from the whole source.
pub type Accessor = Rc<dyn Fn(SourceRef<'_>) -> Result<HostValue, String>>;

/// Maps one document field to either a source property or a computed accessor.
#[derive(Clone)]
pub enum Selector {
    /// Copies `property` from the source into `field`, only if the source has it.
    Property { field: String, property: String },
    /// Always stores the accessor's result under `field`.
    Computed { field: String, accessor: Accessor },
}

impl Selector {
    /// Selects a property under its own name.
    pub fn property(name: impl Into<String>) -> Self {
        let name = name.into();
        Selector::Property {
            field: name.clone(),
            property: name,
        }
    }

    /// Selects `property` and stores it under `field`.
    pub fn renamed(field: impl Into<String>, property: impl Into<String>) -> Self {
        Selector::Property {
            field: field.into(),
            property: property.into(),
        }
    }

    /// Stores the result of `accessor` under `field`.
    pub fn computed(
        field: impl Into<String>,
        accessor: impl Fn(SourceRef<'_>) -> Result<HostValue, String> + 'static,
    ) -> Self {
        Selector::Computed {
            field: field.into(),
            accessor: Rc::new(accessor),
        }
    }

    /// The document field this selector writes.
    pub fn field(&self) -> &str {
        match self {
            Selector::Property { field, .. } | Selector::Computed { field, .. } => field,
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Property { field, property } => f
                .debug_struct("Property")
                .field("field", field)
                .field("property", property)
                .finish(),
            Selector::Computed { field, .. } => f
                .debug_struct("Computed")
                .field("field", field)
                .finish_non_exhaustive(),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::property(name)
    }
}
