//! Field projections.

use bson::{Bson, Document};

use crate::{
    convert::Converter,
    error::{ConversionError, ConversionResult},
    host::HostValue,
};

/// An ordered list of fields to include or exclude from returned documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    entries: Vec<(String, bool)>,
}

impl Projection {
    pub fn new() -> Self {
        Projection::default()
    }

    /// Includes each of `fields`.
    pub fn fields(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        fields
            .into_iter()
            .fold(Projection::new(), |projection, field| projection.include(field))
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.set(field.into(), true);
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.set(field.into(), false);
        self
    }

    fn set(&mut self, field: String, included: bool) {
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = included,
            None => self.entries.push((field, included)),
        }
    }

    /// Iterates `(field, included)` pairs in order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(field, included)| (field.as_str(), *included))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders as a driver projection document, `{field: 1 | 0}`.
    pub fn render(&self) -> Document {
        self.entries
            .iter()
            .map(|(field, included)| (field.clone(), Bson::Int32(i32::from(*included))))
            .collect()
    }
}

impl<'f> Converter<'f> {
    /// Derives a field projection from a host value.
    ///
    /// A recognised projection passes through; a field name or a sequence of field names
    /// includes those fields. Null and an empty sequence mean no projection. Any other
    /// shape, including a sequence mixing names with anything else, is
    /// [`ConversionError::InvalidProjectionObject`].
    pub fn projection_spec(&self, value: &HostValue) -> ConversionResult<Option<Projection>> {
        let names = match value {
            HostValue::Projection(projection) => return Ok(Some(projection.clone())),
            value if value.is_null() => return Ok(None),
            HostValue::String(_) | HostValue::Bson(Bson::String(_)) => vec![value.clone()],
            HostValue::Seq(items) => items.clone(),
            HostValue::Array(view) => view.values()?,
            HostValue::Bson(Bson::Array(items)) => {
                items.iter().cloned().map(HostValue::Bson).collect()
            }
            other => return Err(ConversionError::InvalidProjectionObject(other.type_name())),
        };

        let fields = names
            .iter()
            .map(|name| {
                name.as_str()
                    .filter(|field| !field.is_empty())
                    .ok_or_else(|| ConversionError::InvalidProjectionObject(name.type_name()))
            })
            .collect::<ConversionResult<Vec<_>>>()?;

        Ok((!fields.is_empty()).then(|| Projection::fields(fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostMap;
    use bson::doc;

    #[test]
    fn test_names_are_included() {
        let value: HostValue = vec![HostValue::from("a"), HostValue::from("b.c")].into();
        let projection = Converter::new().projection_spec(&value).unwrap().unwrap();

        assert_eq!(projection, Projection::fields(["a", "b.c"]));
        assert_eq!(projection.render(), doc! { "a": 1, "b.c": 1 });
    }

    #[test]
    fn test_projection_passes_through() {
        let projection = Projection::new().include("a").exclude("_id");
        let derived = Converter::new()
            .projection_spec(&projection.clone().into())
            .unwrap();

        assert_eq!(derived, Some(projection));
        assert_eq!(derived.unwrap().render(), doc! { "a": 1, "_id": 0 });
    }

    #[test]
    fn test_null_and_single_name() {
        let converter = Converter::new();
        assert_eq!(converter.projection_spec(&HostValue::Null).unwrap(), None);
        assert_eq!(
            converter.projection_spec(&"a".into()).unwrap(),
            Some(Projection::fields(["a"]))
        );
    }

    #[test]
    fn test_mixed_forms_are_rejected() {
        let converter = Converter::new();
        let mixed: HostValue = vec![HostValue::from("a"), HostMap::new().with("b", 1).into()].into();

        assert_eq!(
            converter.projection_spec(&mixed).unwrap_err(),
            ConversionError::InvalidProjectionObject("Map".to_string())
        );
        assert!(matches!(
            converter.projection_spec(&HostMap::new().with("a", 1).into()),
            Err(ConversionError::InvalidProjectionObject(_))
        ));
    }

    #[test]
    fn test_include_then_exclude_keeps_position() {
        let projection = Projection::fields(["a", "b"]).exclude("a");
        assert_eq!(
            projection.entries().collect::<Vec<_>>(),
            vec![("a", false), ("b", true)]
        );
    }
}
