use std::{cell::RefCell, rc::Rc};

use bson::{Bson, doc, oid::ObjectId};
use chrono::{TimeZone, Utc};
use docshape_core::{
    convert::Converter,
    depth::DEFAULT_MAX_DEPTH,
    error::ConversionError,
    host::{HostMap, HostValue, PropertyBag},
    query::Filter,
    reader,
    sort::Sort,
    update::Update,
    view::DocumentView,
};
use uuid::Uuid;

fn sample() -> HostValue {
    HostMap::new()
        .with("_id", ObjectId::new())
        .with("name", "Alice")
        .with("active", true)
        .with("age", 30)
        .with("visits", 5_000_000_000_i64)
        .with("score", 0.75)
        .with("joined", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        .with("key", Uuid::new_v4())
        .with("nothing", HostValue::Null)
        .with(
            "address",
            PropertyBag::new().with("city", "Oslo").with("zip", "0150"),
        )
        .with(
            "tags",
            vec![HostValue::from("a"), HostValue::from(vec![HostValue::from(1)])],
        )
        .into()
}

#[test]
fn test_wrapper_view_is_reused_not_copied() {
    let shared = Rc::new(RefCell::new(doc! { "_id": 7, "x": { "y": 1 } }));
    let view = HostValue::Document(DocumentView::from_shared(Rc::clone(&shared)));

    let built = Converter::new().to_document(None, &view, None).unwrap();
    assert!(Rc::ptr_eq(&built, &shared));

    built.borrow_mut().insert("z", 2);
    assert_eq!(shared.borrow().get_i32("z").unwrap(), 2);
}

#[test]
fn test_read_back_reproduces_shape_and_scalars() {
    let converter = Converter::new();
    let original = converter.to_bson(&sample()).unwrap();

    let read_back = reader::from_bson(&original);
    assert_eq!(converter.to_bson(&read_back).unwrap(), original);

    let HostValue::Object(bag) = read_back else {
        panic!("documents read back as property bags");
    };
    assert!(matches!(bag.get("age"), Some(Ok(HostValue::Int32(30)))));
    assert!(matches!(bag.get("visits"), Some(Ok(HostValue::Int64(5_000_000_000)))));
    assert!(matches!(bag.get("key"), Some(Ok(HostValue::Uuid(_)))));
    assert!(matches!(bag.get("joined"), Some(Ok(HostValue::DateTime(_)))));
    assert!(matches!(bag.get("nothing"), Some(Ok(HostValue::Null))));
    assert!(matches!(bag.get("address"), Some(Ok(HostValue::Object(_)))));
    assert!(matches!(bag.get("tags"), Some(Ok(HostValue::Seq(items))) if items.len() == 2));
}

#[test]
fn test_array_nesting_at_the_ceiling() {
    // A null inside `levels` arrays is `levels + 1` nested values.
    fn nested(levels: usize) -> HostValue {
        (0..levels).fold(HostValue::Null, |inner, _| HostValue::Seq(vec![inner]))
    }

    let converter = Converter::new();
    assert!(converter.to_bson(&nested(DEFAULT_MAX_DEPTH - 1)).is_ok());
    assert_eq!(
        converter.to_bson(&nested(DEFAULT_MAX_DEPTH)),
        Err(ConversionError::DepthExceeded(DEFAULT_MAX_DEPTH))
    );
}

#[test]
fn test_document_nesting_at_the_ceiling() {
    // Every mapping level is one mapping build plus one value conversion.
    fn nested(levels: usize) -> HostMap {
        (1..levels).fold(HostMap::new().with("leaf", 1), |inner, _| {
            HostMap::new().with("child", inner)
        })
    }

    let converter = Converter::new();
    let at_ceiling = nested(DEFAULT_MAX_DEPTH / 2);
    let beyond = nested(DEFAULT_MAX_DEPTH / 2 + 1);

    assert!(converter.document_from_mapping(None, &at_ceiling, None).is_ok());
    assert_eq!(
        converter.document_from_mapping(None, &beyond, None).unwrap_err(),
        ConversionError::DepthExceeded(DEFAULT_MAX_DEPTH)
    );
}

#[test]
fn test_non_string_key_always_fails() {
    let values = [
        HostValue::Null,
        HostValue::from(1),
        HostValue::from("text"),
        HostValue::from(HostMap::new()),
        HostValue::from(Vec::<HostValue>::new()),
    ];

    for value in values {
        let map = HostMap::new().with("ok", 1).with(2, value);
        assert!(matches!(
            Converter::new().document_from_mapping(None, &map, None),
            Err(ConversionError::InvalidKeyType(_))
        ));
    }
}

#[test]
fn test_one_failing_property_becomes_null() {
    let bag = PropertyBag::typed("Person")
        .with("name", "Alice")
        .with_getter("age", || Err("age is not available".to_string()))
        .with("city", "Oslo");

    let document = Converter::new().document_from_object(None, &bag, None).unwrap();
    assert_eq!(
        *document.borrow(),
        doc! { "name": "Alice", "age": null, "city": "Oslo" }
    );
}

#[test]
fn test_identity_queries() {
    let converter = Converter::new();
    let expected = Filter::eq("_id", 5);

    let by_document = converter.identity_query(&HostMap::new().with("_id", 5).into()).unwrap();
    let by_scalar = converter.identity_query(&HostValue::from(5)).unwrap();
    assert_eq!(by_document, expected);
    assert_eq!(by_scalar, expected);

    assert_eq!(
        converter.identity_query(&PropertyBag::new().with("name", "x").into()),
        Err(ConversionError::MissingIdentity("_id".to_string()))
    );
}

#[test]
fn test_sort_keys_follow_input_order() {
    let input = HostValue::from_json(serde_json::json!(["a", { "b": false }]));
    assert_eq!(
        Converter::new().sort_spec(&input).unwrap(),
        vec![Sort::asc("a"), Sort::desc("b")]
    );
}

#[test]
fn test_update_replacement_and_composite() {
    let converter = Converter::new();

    let single = converter
        .update_spec(&HostValue::from_json(serde_json::json!({ "x": 1 })))
        .unwrap();
    assert_eq!(single, Update::Replace(doc! { "x": 1 }));

    let composite = converter
        .update_spec(&HostValue::from_json(serde_json::json!([{ "x": 1 }, { "y": 2 }])))
        .unwrap();
    assert_eq!(
        composite,
        Update::Combine(vec![
            Update::Replace(doc! { "x": 1 }),
            Update::Replace(doc! { "y": 2 }),
        ])
    );
    assert_eq!(composite.render().unwrap(), doc! { "x": 1, "y": 2 });
    assert!(!matches!(single.render().unwrap().get("x"), Some(Bson::Document(_))));
}
