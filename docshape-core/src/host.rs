//! The loosely typed host object model.
//!
//! Host values are what callers hand to the engine: native scalars, generic mappings and
//! sequences, dynamic property bags whose properties may fail to read, wrapper views over
//! documents, recognised specification objects and arbitrary opaque objects.
//!
//! # Example
//!
//! ```ignore
//! use docshape_core::host::{HostMap, HostValue, PropertyBag};
//!
//! let map = HostMap::new()
//!     .with("name", "Alice")
//!     .with("tags", vec![HostValue::from("a"), HostValue::from("b")]);
//!
//! let bag = PropertyBag::new()
//!     .with("name", "Bob")
//!     .with_getter("age", || Err("not loaded".to_string()));
//! ```

use std::{any::Any, fmt, rc::Rc};

use bson::{Binary, Bson, oid::ObjectId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    projection::Projection,
    query::Expr,
    update::Update,
    view::{ArrayView, DocumentView},
};

/// An arbitrary host object the engine has no structural knowledge of.
///
/// The converter first asks the object to coerce itself into a document value. Objects
/// that can describe themselves as a set of named properties may also return a
/// [`PropertyBag`], which lets them be built into documents.
pub trait HostObject: fmt::Debug {
    /// Runtime type name used for diagnostics and type handler lookup.
    fn type_name(&self) -> &str;

    /// Attempts a direct scalar coercion into a document value.
    fn coerce(&self) -> Result<Bson, String>;

    /// Returns the object's properties, if it can be enumerated as a property bag.
    fn properties(&self) -> Option<PropertyBag> {
        None
    }

    /// Returns a reference to the object as a generic `Any` type.
    fn as_any(&self) -> &dyn Any;
}

/// Lazily evaluated property accessor. Reading may fail without affecting other properties.
pub type Getter = Rc<dyn Fn() -> Result<HostValue, String>>;

/// The value slot of a [`Property`].
#[derive(Clone)]
pub enum PropertyValue {
    /// A stored value.
    Note(HostValue),
    /// A computed value, evaluated on every read.
    Getter(Getter),
}

/// One named property of a [`PropertyBag`].
#[derive(Clone)]
pub struct Property {
    name: String,
    value: PropertyValue,
}

impl Property {
    /// Creates a property holding a stored value.
    pub fn note(name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        Property {
            name: name.into(),
            value: PropertyValue::Note(value.into()),
        }
    }

    /// Creates a property whose value is computed by `getter` on every read.
    pub fn getter(
        name: impl Into<String>,
        getter: impl Fn() -> Result<HostValue, String> + 'static,
    ) -> Self {
        Property {
            name: name.into(),
            value: PropertyValue::Getter(Rc::new(getter)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the property value. Only getters can fail.
    pub fn read(&self) -> Result<HostValue, String> {
        match &self.value {
            PropertyValue::Note(value) => Ok(value.clone()),
            PropertyValue::Getter(getter) => getter(),
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Property");
        debug.field("name", &self.name);
        match &self.value {
            PropertyValue::Note(value) => debug.field("value", value),
            PropertyValue::Getter(_) => debug.field("value", &"<getter>"),
        };
        debug.finish()
    }
}

/// A dynamic property bag: an ordered set of independently readable named properties.
#[derive(Clone, Debug, Default)]
pub struct PropertyBag {
    type_name: Option<String>,
    properties: Vec<Property>,
}

impl PropertyBag {
    /// Creates an empty, untyped property bag.
    pub fn new() -> Self {
        PropertyBag::default()
    }

    /// Creates an empty property bag reporting `type_name` in diagnostics.
    pub fn typed(type_name: impl Into<String>) -> Self {
        PropertyBag {
            type_name: Some(type_name.into()),
            properties: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or("Object")
    }

    /// Adds or replaces a stored property, returning the bag.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.push(Property::note(name, value));
        self
    }

    /// Adds or replaces a computed property, returning the bag.
    pub fn with_getter(
        mut self,
        name: impl Into<String>,
        getter: impl Fn() -> Result<HostValue, String> + 'static,
    ) -> Self {
        self.push(Property::getter(name, getter));
        self
    }

    /// Adds or replaces a stored property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<HostValue>) {
        self.push(Property::note(name, value));
    }

    /// Adds a property, replacing one with the same name in place.
    pub fn push(&mut self, property: Property) {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    /// Reads a property by name. `None` if the bag has no such property.
    pub fn get(&self, name: &str) -> Option<Result<HostValue, String>> {
        self.property(name).map(Property::read)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Iterates properties in their natural order without evaluating them.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// A generic key/value mapping. Keys are host values; only string keys can become
/// document field names.
#[derive(Clone, Debug, Default)]
pub struct HostMap {
    entries: Vec<(HostValue, HostValue)>,
}

impl HostMap {
    pub fn new() -> Self {
        HostMap::default()
    }

    /// Inserts an entry, returning the map.
    pub fn with(mut self, key: impl Into<HostValue>, value: impl Into<HostValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts an entry. A string key replaces the value of an equal string key in place
    /// and returns the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<HostValue>,
        value: impl Into<HostValue>,
    ) -> Option<HostValue> {
        let key = key.into();
        let value = value.into();

        if let HostValue::String(name) = &key {
            if let Some((_, existing)) = self
                .entries
                .iter_mut()
                .find(|(k, _)| matches!(k, HostValue::String(s) if s == name))
            {
                return Some(std::mem::replace(existing, value));
            }
        }

        self.entries.push((key, value));
        None
    }

    /// Looks up the value under a string key.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, HostValue::String(s) if s == key))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HostValue, &HostValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for HostMap
where
    K: Into<HostValue>,
    V: Into<HostValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HostMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// A loosely typed host value.
///
/// The variant order of this enum has no meaning; the converter evaluates shapes in its
/// own fixed priority order.
#[derive(Clone, Debug, Default)]
pub enum HostValue {
    #[default]
    Null,
    /// An already converted document value, passed through unchanged.
    Bson(Bson),
    String(String),
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    DateTime(DateTime<Utc>),
    /// Binary payload with its subtype tag.
    Binary(Binary),
    Uuid(Uuid),
    ObjectId(ObjectId),
    /// A dictionary-shaped value.
    Map(HostMap),
    /// A sequence-shaped value.
    Seq(Vec<HostValue>),
    /// A dynamic property bag.
    Object(PropertyBag),
    /// A wrapper view over a document.
    Document(DocumentView),
    /// A wrapper view over an array.
    Array(ArrayView),
    /// A recognised query specification.
    Query(Expr),
    /// A recognised update specification.
    Update(Update),
    /// A recognised field projection.
    Projection(Projection),
    /// Any other host object.
    Opaque(Rc<dyn HostObject>),
}

impl HostValue {
    /// Returns the runtime type name of this value, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            HostValue::Null => "Null".to_string(),
            HostValue::Bson(bson) => format!("Bson{:?}", bson.element_type()),
            HostValue::String(_) => "String".to_string(),
            HostValue::Boolean(_) => "Boolean".to_string(),
            HostValue::Int32(_) => "Int32".to_string(),
            HostValue::Int64(_) => "Int64".to_string(),
            HostValue::Double(_) => "Double".to_string(),
            HostValue::DateTime(_) => "DateTime".to_string(),
            HostValue::Binary(_) => "Binary".to_string(),
            HostValue::Uuid(_) => "Uuid".to_string(),
            HostValue::ObjectId(_) => "ObjectId".to_string(),
            HostValue::Map(_) => "Map".to_string(),
            HostValue::Seq(_) => "Seq".to_string(),
            HostValue::Object(bag) => bag.type_name().to_string(),
            HostValue::Document(_) => "DocumentView".to_string(),
            HostValue::Array(_) => "ArrayView".to_string(),
            HostValue::Query(_) => "Query".to_string(),
            HostValue::Update(_) => "Update".to_string(),
            HostValue::Projection(_) => "Projection".to_string(),
            HostValue::Opaque(object) => object.type_name().to_string(),
        }
    }

    /// Host truthiness: null, `false`, zero, the empty string and empty sequences are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Null => false,
            HostValue::Boolean(value) => *value,
            HostValue::Int32(value) => *value != 0,
            HostValue::Int64(value) => *value != 0,
            HostValue::Double(value) => *value != 0.0 && !value.is_nan(),
            HostValue::String(value) => !value.is_empty(),
            HostValue::Seq(items) => !items.is_empty(),
            HostValue::Bson(bson) => match bson {
                Bson::Null | Bson::Undefined => false,
                Bson::Boolean(value) => *value,
                Bson::Int32(value) => *value != 0,
                Bson::Int64(value) => *value != 0,
                Bson::Double(value) => *value != 0.0 && !value.is_nan(),
                Bson::String(value) => !value.is_empty(),
                _ => true,
            },
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null | HostValue::Bson(Bson::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(value) => Some(value),
            HostValue::Bson(Bson::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Builds a host value from JSON: objects become mappings, arrays sequences and
    /// integers `Int32` when they fit, otherwise `Int64`. Object keys keep their source
    /// order.
    pub fn from_json(value: serde_json::Value) -> HostValue {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(value) => HostValue::Boolean(value),
            serde_json::Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    i32::try_from(value)
                        .map(HostValue::Int32)
                        .unwrap_or(HostValue::Int64(value))
                } else {
                    number.as_f64().map_or(HostValue::Null, HostValue::Double)
                }
            }
            serde_json::Value::String(value) => HostValue::String(value),
            serde_json::Value::Array(items) => {
                HostValue::Seq(items.into_iter().map(HostValue::from_json).collect())
            }
            serde_json::Value::Object(object) => HostValue::Map(
                object
                    .into_iter()
                    .map(|(k, v)| (HostValue::String(k), HostValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Null
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int32(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int64(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Double(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<DateTime<Utc>> for HostValue {
    fn from(value: DateTime<Utc>) -> Self {
        HostValue::DateTime(value)
    }
}

impl From<Uuid> for HostValue {
    fn from(value: Uuid) -> Self {
        HostValue::Uuid(value)
    }
}

impl From<ObjectId> for HostValue {
    fn from(value: ObjectId) -> Self {
        HostValue::ObjectId(value)
    }
}

impl From<Binary> for HostValue {
    fn from(value: Binary) -> Self {
        HostValue::Binary(value)
    }
}

impl From<Bson> for HostValue {
    fn from(value: Bson) -> Self {
        HostValue::Bson(value)
    }
}

impl From<HostMap> for HostValue {
    fn from(value: HostMap) -> Self {
        HostValue::Map(value)
    }
}

impl From<PropertyBag> for HostValue {
    fn from(value: PropertyBag) -> Self {
        HostValue::Object(value)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(value: Vec<HostValue>) -> Self {
        HostValue::Seq(value)
    }
}

impl From<DocumentView> for HostValue {
    fn from(value: DocumentView) -> Self {
        HostValue::Document(value)
    }
}

impl From<ArrayView> for HostValue {
    fn from(value: ArrayView) -> Self {
        HostValue::Array(value)
    }
}

impl From<Expr> for HostValue {
    fn from(value: Expr) -> Self {
        HostValue::Query(value)
    }
}

impl From<Update> for HostValue {
    fn from(value: Update) -> Self {
        HostValue::Update(value)
    }
}

impl From<Projection> for HostValue {
    fn from(value: Projection) -> Self {
        HostValue::Projection(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}
