//! Document values back into host values.
//!
//! This is the materialising direction: documents become fresh [`PropertyBag`]s and
//! arrays become host sequences. For lazy views over the same data see
//! [`view::wrap`](crate::view::wrap).

use bson::{Binary, Bson, Document, spec::BinarySubtype};
use uuid::Uuid;

use crate::host::{HostValue, Property, PropertyBag};

/// Reads a document value as a host value.
///
/// Binary values with a UUID subtype decode to [`HostValue::Uuid`]; other binary values
/// keep their subtype. Tags the host model has no native form for (timestamps,
/// decimals, regular expressions, code, min/max keys, ...) come back as
/// [`HostValue::Bson`] unchanged.
pub fn from_bson(value: &Bson) -> HostValue {
    match value {
        Bson::Array(items) => HostValue::Seq(items.iter().map(from_bson).collect()),
        Bson::Document(document) => HostValue::Object(to_property_bag(document)),
        Bson::Boolean(value) => HostValue::Boolean(*value),
        Bson::Int32(value) => HostValue::Int32(*value),
        Bson::Int64(value) => HostValue::Int64(*value),
        Bson::Double(value) => HostValue::Double(*value),
        Bson::String(value) => HostValue::String(value.clone()),
        Bson::ObjectId(value) => HostValue::ObjectId(*value),
        Bson::DateTime(value) => HostValue::DateTime(value.to_chrono()),
        Bson::Null => HostValue::Null,
        Bson::Binary(binary) => read_binary(binary),
        other => HostValue::Bson(other.clone()),
    }
}

/// Reads a document as a fresh property bag, one note property per field in document order.
pub fn to_property_bag(document: &Document) -> PropertyBag {
    let mut bag = PropertyBag::new();
    for (key, value) in document {
        bag.push(Property::note(key.clone(), from_bson(value)));
    }
    bag
}

fn read_binary(binary: &Binary) -> HostValue {
    match binary.subtype {
        BinarySubtype::Uuid | BinarySubtype::UuidOld => <[u8; 16]>::try_from(binary.bytes.as_slice())
            .map(|bytes| HostValue::Uuid(Uuid::from_bytes(bytes)))
            .unwrap_or_else(|_| HostValue::Binary(binary.clone())),
        _ => HostValue::Binary(binary.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Timestamp, doc, oid::ObjectId};

    #[test]
    fn test_scalars_are_unwrapped() {
        assert!(matches!(from_bson(&Bson::Boolean(true)), HostValue::Boolean(true)));
        assert!(matches!(from_bson(&Bson::Int32(7)), HostValue::Int32(7)));
        assert!(matches!(from_bson(&Bson::Int64(7)), HostValue::Int64(7)));
        assert!(matches!(from_bson(&Bson::Double(1.5)), HostValue::Double(v) if v == 1.5));
        assert!(matches!(from_bson(&Bson::Null), HostValue::Null));

        let id = ObjectId::new();
        assert!(matches!(from_bson(&Bson::ObjectId(id)), HostValue::ObjectId(v) if v == id));
    }

    #[test]
    fn test_datetime_is_utc() {
        let stamp = bson::DateTime::from_millis(1_600_000_000_123);
        let HostValue::DateTime(value) = from_bson(&Bson::DateTime(stamp)) else {
            panic!("expected a timestamp");
        };
        assert_eq!(value.timestamp_millis(), 1_600_000_000_123);
    }

    #[test]
    fn test_uuid_binary_decodes() {
        let uuid = Uuid::new_v4();
        let binary = Binary {
            subtype: BinarySubtype::Uuid,
            bytes: uuid.as_bytes().to_vec(),
        };
        assert!(matches!(from_bson(&Bson::Binary(binary)), HostValue::Uuid(v) if v == uuid));
    }

    #[test]
    fn test_generic_binary_keeps_subtype() {
        let binary = Binary {
            subtype: BinarySubtype::UserDefined(0x80),
            bytes: vec![1, 2, 3],
        };
        let HostValue::Binary(read) = from_bson(&Bson::Binary(binary.clone())) else {
            panic!("expected binary");
        };
        assert_eq!(read, binary);
    }

    #[test]
    fn test_malformed_uuid_binary_stays_binary() {
        let binary = Binary {
            subtype: BinarySubtype::Uuid,
            bytes: vec![1, 2, 3],
        };
        assert!(matches!(from_bson(&Bson::Binary(binary)), HostValue::Binary(_)));
    }

    #[test]
    fn test_unmodelled_tags_are_opaque() {
        let timestamp = Bson::Timestamp(Timestamp { time: 1, increment: 2 });
        assert!(matches!(from_bson(&timestamp), HostValue::Bson(v) if v == timestamp));
        assert!(matches!(from_bson(&Bson::MaxKey), HostValue::Bson(Bson::MaxKey)));
    }

    #[test]
    fn test_document_becomes_property_bag() {
        let HostValue::Object(bag) = from_bson(&Bson::Document(doc! { "z": 1, "a": [1, "x"] })) else {
            panic!("expected a property bag");
        };

        let names = bag.properties().map(Property::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["z", "a"]);
        assert!(matches!(bag.get("a"), Some(Ok(HostValue::Seq(items))) if items.len() == 2));
    }
}
