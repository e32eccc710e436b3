//! Typed values through serde.
//!
//! Strongly typed Rust values enter and leave the host model through bson's serde
//! bridge, so a `#[derive(Serialize, Deserialize)]` struct can be used wherever a host
//! value is expected.
//!
//! # Example
//!
//! ```ignore
//! use docshape_core::document::TypedDocument;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! let host = User { name: "Alice".into(), age: 30 }.to_host()?;
//! let user = User::from_host(&host)?;
//! ```

use bson::{
    Bson, Document,
    de::{deserialize_from_bson, deserialize_from_document},
    ser::{serialize_to_bson, serialize_to_document},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{convert::Converter, error::ConversionResult, host::HostValue, reader};

impl HostValue {
    /// Builds a host value from any serializable value. Structs and maps become property
    /// bags.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> ConversionResult<HostValue> {
        Ok(reader::from_bson(&serialize_to_bson(value)?))
    }
}

impl<'f> Converter<'f> {
    /// Converts a host value and deserializes the result into `T`.
    pub fn to_typed<T: DeserializeOwned>(&self, value: &HostValue) -> ConversionResult<T> {
        Ok(deserialize_from_bson(self.to_bson(value)?)?)
    }

    /// Serializes `value` and exposes it as configured by the output kind.
    pub fn from_typed<T: Serialize + ?Sized>(&self, value: &T) -> ConversionResult<HostValue> {
        Ok(self.to_host(serialize_to_bson(value)?))
    }
}

/// Conversions between typed values and the host and document models.
///
/// This trait is automatically implemented for every serde round-trippable type.
pub trait TypedDocument: Sized {
    /// Converts this value to a host value.
    fn to_host(&self) -> ConversionResult<HostValue>;

    /// Reads a value back from a host value.
    fn from_host(value: &HostValue) -> ConversionResult<Self>;

    /// Serializes this value as a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not serialize to a document.
    fn to_document(&self) -> ConversionResult<Document>;

    /// Deserializes a value from a document.
    fn from_document(document: Document) -> ConversionResult<Self>;
}

impl<T: Serialize + DeserializeOwned> TypedDocument for T {
    fn to_host(&self) -> ConversionResult<HostValue> {
        HostValue::from_serialize(self)
    }

    fn from_host(value: &HostValue) -> ConversionResult<Self> {
        Converter::new().to_typed(value)
    }

    fn to_document(&self) -> ConversionResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> ConversionResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

/// Reads a typed value from a stored document value.
pub fn from_stored<T: DeserializeOwned>(value: Bson) -> ConversionResult<T> {
    Ok(deserialize_from_bson(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::OutputKind, error::ConversionError, host::PropertyBag};
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: i32,
        tags: Vec<String>,
    }

    fn alice() -> User {
        User {
            name: "Alice".to_string(),
            age: 30,
            tags: vec!["admin".to_string()],
        }
    }

    #[test]
    fn test_struct_becomes_property_bag() {
        let HostValue::Object(bag) = alice().to_host().unwrap() else {
            panic!("expected a property bag");
        };

        let names = bag.properties().map(|p| p.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["name", "age", "tags"]);
        assert!(matches!(bag.get("age"), Some(Ok(HostValue::Int32(30)))));
    }

    #[test]
    fn test_host_to_typed() {
        let bag = PropertyBag::new()
            .with("name", "Bob")
            .with("age", 41)
            .with("tags", vec![HostValue::from("a")]);

        let user = User::from_host(&bag.into()).unwrap();
        assert_eq!(user.name, "Bob");
        assert_eq!(user.tags, vec!["a".to_string()]);
    }

    #[test]
    fn test_document_round_trip() {
        let document = alice().to_document().unwrap();
        assert_eq!(document, doc! { "name": "Alice", "age": 30, "tags": ["admin"] });
        assert_eq!(User::from_document(document).unwrap(), alice());
    }

    #[test]
    fn test_from_typed_follows_output_kind() {
        let view = Converter::new().from_typed(&alice()).unwrap();
        assert!(matches!(view, HostValue::Document(_)));

        let object = Converter::new()
            .with_output(OutputKind::Object)
            .from_typed(&alice())
            .unwrap();
        assert!(matches!(object, HostValue::Object(_)));
    }

    #[test]
    fn test_shape_mismatch_is_a_serialization_error() {
        let result = User::from_host(&HostValue::from(5));
        assert!(matches!(result, Err(ConversionError::Serialization(_))));
    }
}
