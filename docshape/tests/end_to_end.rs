use std::{any::Any, rc::Rc};

use docshape::{bson::{Bson, doc}, memory::InMemoryCollection, prelude::*};
use futures::executor::block_on;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    #[serde(rename = "_id")]
    id: i32,
    item: String,
    quantity: i32,
}

#[derive(Debug)]
struct Temperature(f64);

impl HostObject for Temperature {
    fn type_name(&self) -> &str {
        "Temperature"
    }

    fn coerce(&self) -> Result<Bson, String> {
        Err("temperature has no direct form".to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_typed_values_through_a_collection() {
    let collection = InMemoryCollection::new("orders");
    let converter = Converter::new();

    let order = Order {
        id: 1,
        item: "pen".to_string(),
        quantity: 2,
    };
    block_on(collection.add_data(order.to_document().unwrap())).unwrap();

    let filter = converter.identity_query(&order.to_host().unwrap()).unwrap();
    block_on(collection.update_data(filter.clone(), Update::inc("quantity", 3), UpdateOptions::default()))
        .unwrap();

    let stored = block_on(collection.get_data(Some(filter), FindOptions::new())).unwrap();
    let read_back: Order = converter.to_typed(&converter.to_host(stored[0].clone().into())).unwrap();
    assert_eq!(read_back.quantity, 5);
}

#[test]
fn test_fallback_hook_rescues_opaque_values() {
    let fallback = |value: &HostValue| -> Result<Option<HostValue>, String> {
        match value {
            HostValue::Opaque(object) => Ok(object
                .as_any()
                .downcast_ref::<Temperature>()
                .map(|t| HostValue::from(format!("{:.1}C", t.0)))),
            _ => Ok(None),
        }
    };
    let converter = Converter::new().fallback(&fallback);

    let reading = HostMap::new()
        .with("_id", "r1")
        .with("value", HostValue::Opaque(Rc::new(Temperature(21.5))));
    let document = converter.to_document(None, &reading.into(), None).unwrap();
    assert_eq!(*document.borrow(), doc! { "_id": "r1", "value": "21.5C" });
}

#[test]
fn test_options_from_json_drive_read_back() {
    let options = ConvertOptions::from_json(r#"{ "output": "object", "max_depth": 8 }"#).unwrap();
    let converter = Converter::with_options(&options);

    assert_eq!(converter.depth_limit(), 8);
    assert!(matches!(
        converter.to_host(Bson::Document(doc! { "a": 1 })),
        HostValue::Object(_)
    ));
}
