//! Update specifications.
//!
//! An [`Update`] is either a literal replacement document, a set of field-level modifier
//! operators, or a composite of further updates applied in order. The two leaf kinds
//! look alike on the wire (`{"x": 1}` vs `{"$set": {"x": 1}}`), so the kind is always
//! explicit: a mapping given to [`Converter::update_spec`] is a replacement, and
//! modifiers must be built with [`Update::set`] and friends.

use bson::{Bson, Document, doc};

use crate::{
    convert::Converter,
    depth::Depth,
    error::{ConversionError, ConversionResult},
    host::HostValue,
};

/// An update specification.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replaces the whole matched document, keeping its identity.
    Replace(Document),
    /// Field-level modifier operators, keyed by operator (`$set`, `$inc`, ...).
    Modify(Document),
    /// Further updates applied in sequence.
    Combine(Vec<Update>),
}

/// The flattened form of an update, ready for a storage driver.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedUpdate {
    Replacement(Document),
    Modifiers(Document),
}

impl RenderedUpdate {
    pub fn is_replacement(&self) -> bool {
        matches!(self, RenderedUpdate::Replacement(_))
    }

    pub fn document(&self) -> &Document {
        match self {
            RenderedUpdate::Replacement(document) | RenderedUpdate::Modifiers(document) => {
                document
            }
        }
    }

    pub fn into_document(self) -> Document {
        match self {
            RenderedUpdate::Replacement(document) | RenderedUpdate::Modifiers(document) => {
                document
            }
        }
    }
}

impl Update {
    /// `$set`: stores `value` at `field`, creating missing parents.
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Update::modifier("$set", field.into(), value.into())
    }

    /// `$unset`: removes `field`.
    pub fn unset(field: impl Into<String>) -> Self {
        Update::modifier("$unset", field.into(), Bson::String(String::new()))
    }

    /// `$inc`: adds `amount` to a numeric `field`, starting from zero when absent.
    pub fn inc(field: impl Into<String>, amount: impl Into<Bson>) -> Self {
        Update::modifier("$inc", field.into(), amount.into())
    }

    /// `$push`: appends `value` to the array at `field`.
    pub fn push(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Update::modifier("$push", field.into(), value.into())
    }

    fn modifier(operator: &str, field: String, value: Bson) -> Self {
        Update::Modify(doc! { operator: { field: value } })
    }

    /// Applies `other` after this update.
    pub fn then(self, other: Update) -> Self {
        match self {
            Update::Combine(mut parts) => {
                parts.push(other);
                Update::Combine(parts)
            }
            first => Update::Combine(vec![first, other]),
        }
    }

    /// Flattens this update into a single replacement or modifier document.
    ///
    /// Replacement parts of a composite merge field by field, modifier parts merge per
    /// operator; in both cases later parts win. A composite that mixes the two kinds, an
    /// empty composite and malformed leaves are [`ConversionError::InvalidUpdateObject`].
    pub fn resolve(&self) -> ConversionResult<RenderedUpdate> {
        match self {
            Update::Replace(document) => {
                check_replacement(document)?;
                Ok(RenderedUpdate::Replacement(document.clone()))
            }
            Update::Modify(document) => {
                check_modifiers(document)?;
                Ok(RenderedUpdate::Modifiers(document.clone()))
            }
            Update::Combine(parts) => {
                let mut merged: Option<RenderedUpdate> = None;
                for part in parts {
                    let next = part.resolve()?;
                    merged = Some(match merged {
                        None => next,
                        Some(current) => combine(current, next)?,
                    });
                }
                merged.ok_or_else(|| {
                    ConversionError::InvalidUpdateObject("empty composite update".to_string())
                })
            }
        }
    }

    /// Renders this update as a driver update document.
    pub fn render(&self) -> ConversionResult<Document> {
        Ok(self.resolve()?.into_document())
    }
}

fn check_replacement(document: &Document) -> ConversionResult<()> {
    match document.keys().find(|key| key.starts_with('$')) {
        Some(key) => Err(ConversionError::InvalidUpdateObject(format!(
            "replacement document contains operator `{key}`; build modifiers explicitly"
        ))),
        None => Ok(()),
    }
}

fn check_modifiers(document: &Document) -> ConversionResult<()> {
    if document.is_empty() {
        return Err(ConversionError::InvalidUpdateObject(
            "modifier document is empty".to_string(),
        ));
    }

    for (operator, fields) in document {
        if !operator.starts_with('$') {
            return Err(ConversionError::InvalidUpdateObject(format!(
                "`{operator}` is not an update operator"
            )));
        }
        if !matches!(fields, Bson::Document(_)) {
            return Err(ConversionError::InvalidUpdateObject(format!(
                "operator `{operator}` requires a document of fields"
            )));
        }
    }
    Ok(())
}

fn combine(current: RenderedUpdate, next: RenderedUpdate) -> ConversionResult<RenderedUpdate> {
    match (current, next) {
        (RenderedUpdate::Replacement(mut current), RenderedUpdate::Replacement(next)) => {
            current.extend(next);
            Ok(RenderedUpdate::Replacement(current))
        }
        (RenderedUpdate::Modifiers(mut current), RenderedUpdate::Modifiers(next)) => {
            for (operator, fields) in next {
                match (current.get_mut(&operator), fields) {
                    (Some(Bson::Document(existing)), Bson::Document(fields)) => {
                        existing.extend(fields)
                    }
                    (_, fields) => {
                        current.insert(operator, fields);
                    }
                }
            }
            Ok(RenderedUpdate::Modifiers(current))
        }
        _ => Err(ConversionError::InvalidUpdateObject(
            "cannot combine a replacement with field modifiers".to_string(),
        )),
    }
}

impl<'f> Converter<'f> {
    /// Derives an update specification from a host value.
    ///
    /// - a recognised update passes through unchanged;
    /// - a mapping, property bag or document is a literal replacement;
    /// - a sequence resolves each element and combines them in order.
    ///
    /// Anything else is [`ConversionError::InvalidUpdateObject`].
    pub fn update_spec(&self, value: &HostValue) -> ConversionResult<Update> {
        self.resolve_update(value, Depth::ROOT)
    }

    /// Derives an update specification, reporting invalid inputs to `sink` instead of
    /// failing.
    ///
    /// Invalid elements of a top-level sequence are reported one by one and skipped, so
    /// a caller sees every bad input of a batch. Returns `None` if nothing usable is
    /// left.
    pub fn update_spec_with(
        &self,
        value: &HostValue,
        sink: &mut dyn FnMut(ConversionError),
    ) -> Option<Update> {
        let items = match sequence_items(value) {
            Ok(Some(items)) => items,
            Ok(None) => {
                return self
                    .resolve_update(value, Depth::ROOT)
                    .map_err(|error| sink(error))
                    .ok();
            }
            Err(error) => {
                sink(error);
                return None;
            }
        };

        let inner = match self.enter(Depth::ROOT) {
            Ok(inner) => inner,
            Err(error) => {
                sink(error);
                return None;
            }
        };

        let parts = items
            .iter()
            .filter_map(|item| self.resolve_update(item, inner).map_err(|e| sink(e)).ok())
            .collect::<Vec<_>>();

        match parts.len() {
            0 => {
                if items.is_empty() {
                    sink(empty_sequence());
                }
                None
            }
            1 => parts.into_iter().next(),
            _ => Some(Update::Combine(parts)),
        }
    }

    fn resolve_update(&self, value: &HostValue, depth: Depth) -> ConversionResult<Update> {
        let inner = self.enter(depth)?;

        if let HostValue::Update(update) = value {
            return Ok(update.clone());
        }

        if let Some(items) = sequence_items(value)? {
            if items.is_empty() {
                return Err(empty_sequence());
            }
            let mut parts = items
                .iter()
                .map(|item| self.resolve_update(item, inner))
                .collect::<ConversionResult<Vec<_>>>()?;
            return Ok(if parts.len() == 1 {
                parts.remove(0)
            } else {
                Update::Combine(parts)
            });
        }

        let document_shaped = match value {
            HostValue::Map(_)
            | HostValue::Object(_)
            | HostValue::Document(_)
            | HostValue::Bson(Bson::Document(_)) => true,
            HostValue::Opaque(object) => object.properties().is_some(),
            _ => false,
        };
        if !document_shaped {
            return Err(ConversionError::InvalidUpdateObject(value.type_name()));
        }

        let document = self.to_document(None, value, None)?.borrow().clone();
        check_replacement(&document)?;
        Ok(Update::Replace(document))
    }
}

/// Elements of a sequence-shaped value, or `None` for anything else.
fn sequence_items(value: &HostValue) -> ConversionResult<Option<Vec<HostValue>>> {
    match value {
        HostValue::Seq(items) => Ok(Some(items.clone())),
        HostValue::Array(view) => view.values().map(Some),
        HostValue::Bson(Bson::Array(items)) => {
            Ok(Some(items.iter().cloned().map(HostValue::Bson).collect()))
        }
        _ => Ok(None),
    }
}

fn empty_sequence() -> ConversionError {
    ConversionError::InvalidUpdateObject("empty update sequence".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{HostMap, PropertyBag},
        view::DocumentView,
    };

    #[test]
    fn test_mapping_is_a_replacement() {
        let map = HostMap::new().with("x", 1);
        let update = Converter::new().update_spec(&map.into()).unwrap();

        assert_eq!(update, Update::Replace(doc! { "x": 1 }));
        assert!(update.resolve().unwrap().is_replacement());
    }

    #[test]
    fn test_sequence_is_combined_in_order() {
        let value: HostValue = vec![
            HostMap::new().with("x", 1).into(),
            HostMap::new().with("y", 2).with("x", 3).into(),
        ]
        .into();
        let update = Converter::new().update_spec(&value).unwrap();

        assert_eq!(
            update,
            Update::Combine(vec![
                Update::Replace(doc! { "x": 1 }),
                Update::Replace(doc! { "y": 2, "x": 3 }),
            ])
        );
        assert_eq!(update.render().unwrap(), doc! { "x": 3, "y": 2 });
    }

    #[test]
    fn test_modifiers_merge_per_operator() {
        let update = Update::set("a", 1)
            .then(Update::inc("n", 2))
            .then(Update::set("b", "x"))
            .then(Update::set("a", 5));

        assert_eq!(
            update.render().unwrap(),
            doc! {
                "$set": { "a": 5, "b": "x" },
                "$inc": { "n": 2 },
            }
        );
    }

    #[test]
    fn test_mixed_kinds_are_rejected() {
        let update = Update::Replace(doc! { "x": 1 }).then(Update::set("y", 2));
        assert!(matches!(update.render(), Err(ConversionError::InvalidUpdateObject(_))));
    }

    #[test]
    fn test_operator_mapping_is_not_a_replacement() {
        let map = HostMap::new().with("$set", HostMap::new().with("x", 1));
        let err = Converter::new().update_spec(&map.into()).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidUpdateObject(message) if message.contains("$set")));
    }

    #[test]
    fn test_update_passes_through() {
        let update = Update::unset("gone");
        assert_eq!(Converter::new().update_spec(&update.clone().into()).unwrap(), update);
        assert_eq!(update.render().unwrap(), doc! { "$unset": { "gone": "" } });
    }

    #[test]
    fn test_invalid_shapes() {
        let converter = Converter::new();
        assert_eq!(
            converter.update_spec(&42.into()).unwrap_err(),
            ConversionError::InvalidUpdateObject("Int32".to_string())
        );
        assert!(matches!(
            converter.update_spec(&HostValue::Seq(Vec::new())),
            Err(ConversionError::InvalidUpdateObject(_))
        ));
        assert!(matches!(
            Update::Modify(doc! { "x": 1 }).render(),
            Err(ConversionError::InvalidUpdateObject(_))
        ));
    }

    #[test]
    fn test_soft_sink_collects_every_bad_input() {
        let value: HostValue = vec![
            HostMap::new().with("x", 1).into(),
            HostValue::from(7),
            PropertyBag::new().with("y", 2).into(),
            HostValue::from("nope"),
        ]
        .into();

        let mut errors = Vec::new();
        let update = Converter::new().update_spec_with(&value, &mut |e| errors.push(e));

        assert_eq!(
            update,
            Some(Update::Combine(vec![
                Update::Replace(doc! { "x": 1 }),
                Update::Replace(doc! { "y": 2 }),
            ]))
        );
        assert_eq!(
            errors,
            vec![
                ConversionError::InvalidUpdateObject("Int32".to_string()),
                ConversionError::InvalidUpdateObject("String".to_string()),
            ]
        );
    }

    #[test]
    fn test_soft_sink_single_value() {
        let mut errors = Vec::new();
        let update = Converter::new().update_spec_with(&HostValue::Null, &mut |e| errors.push(e));

        assert_eq!(update, None);
        assert_eq!(errors, vec![ConversionError::InvalidUpdateObject("Null".to_string())]);
    }

    #[test]
    fn test_stale_array_view_is_reported() {
        let root = DocumentView::new(doc! { "list": [{ "x": 1 }] });
        let Some(list) = root.get("list") else {
            panic!("expected a nested array view");
        };
        root.set("list", &HostValue::from(5), &Converter::new()).unwrap();

        assert!(matches!(
            Converter::new().update_spec(&list),
            Err(ConversionError::StaleView(path)) if path == "$.list"
        ));

        let mut errors = Vec::new();
        assert_eq!(Converter::new().update_spec_with(&list, &mut |e| errors.push(e)), None);
        assert_eq!(errors, vec![ConversionError::StaleView("$.list".to_string())]);
    }

    #[test]
    fn test_nested_sequences_are_depth_bounded() {
        let mut value = HostValue::from(HostMap::new().with("x", 1));
        for _ in 0..5 {
            value = vec![value].into();
        }

        assert!(Converter::new().max_depth(10).update_spec(&value).is_ok());
        assert!(matches!(
            Converter::new().max_depth(4).update_spec(&value),
            Err(ConversionError::DepthExceeded(_))
        ));
    }
}
