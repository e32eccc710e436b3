//! Documents from mappings, property bags and views.
//!
//! Every builder can append into an existing target document instead of a fresh one,
//! and can be restricted or renamed by a [`Selector`] list. Entries are fully converted
//! before the target is touched, so a failed build leaves the target unchanged.

use bson::{Bson, Document};
use tracing::warn;

use crate::{
    convert::Converter,
    depth::Depth,
    error::{ConversionError, ConversionResult},
    host::{HostMap, HostValue, Property, PropertyBag},
    selector::{Selector, SourceRef},
    view::{DocumentView, SharedDocument},
};

type Entries = Vec<(String, Bson)>;

impl<'f> Converter<'f> {
    /// Builds a document from a mapping.
    ///
    /// Keys must be non-empty strings; any other key fails the whole build with
    /// [`ConversionError::InvalidKeyType`].
    pub fn document_from_mapping(
        &self,
        target: Option<SharedDocument>,
        map: &HostMap,
        selectors: Option<&[Selector]>,
    ) -> ConversionResult<SharedDocument> {
        let entries = self.mapping_entries(map, selectors, Depth::ROOT)?;
        Ok(merge(target, entries))
    }

    /// Builds a document from a dynamic property bag.
    ///
    /// A property that fails to read is stored as `Null`; the rest of the bag is kept.
    pub fn document_from_object(
        &self,
        target: Option<SharedDocument>,
        bag: &PropertyBag,
        selectors: Option<&[Selector]>,
    ) -> ConversionResult<SharedDocument> {
        let entries = self.object_entries(bag, selectors, Depth::ROOT)?;
        Ok(merge(target, entries))
    }

    /// Builds a document from a wrapper view.
    ///
    /// Without a target and without selectors the view's own backing document is
    /// returned, not a copy. Nested views have no document of their own and are copied.
    pub fn document_from_view(
        &self,
        target: Option<SharedDocument>,
        view: &DocumentView,
        selectors: Option<&[Selector]>,
    ) -> ConversionResult<SharedDocument> {
        if target.is_none() && selectors.is_none() {
            if let Some(shared) = view.shared() {
                return Ok(shared);
            }
        }

        let document = view.to_document()?;
        let entries = self.bson_entries(&document, selectors, Depth::ROOT)?;
        Ok(merge(target, entries))
    }

    /// Builds a document from any document-shaped host value.
    pub fn to_document(
        &self,
        target: Option<SharedDocument>,
        value: &HostValue,
        selectors: Option<&[Selector]>,
    ) -> ConversionResult<SharedDocument> {
        match value {
            HostValue::Map(map) => self.document_from_mapping(target, map, selectors),
            HostValue::Object(bag) => self.document_from_object(target, bag, selectors),
            HostValue::Document(view) => self.document_from_view(target, view, selectors),
            HostValue::Bson(Bson::Document(document)) => {
                let entries = self.bson_entries(document, selectors, Depth::ROOT)?;
                Ok(merge(target, entries))
            }
            HostValue::Opaque(object) => match object.properties() {
                Some(bag) => self.document_from_object(target, &bag, selectors),
                None => Err(ConversionError::UnsupportedType {
                    type_name: object.type_name().to_string(),
                    detail: "object exposes no properties".to_string(),
                }),
            },
            other => Err(ConversionError::UnsupportedType {
                type_name: other.type_name(),
                detail: "expected a mapping or an object with properties".to_string(),
            }),
        }
    }

    pub(crate) fn mapping_document(
        &self,
        map: &HostMap,
        selectors: Option<&[Selector]>,
        depth: Depth,
    ) -> ConversionResult<Document> {
        Ok(self.mapping_entries(map, selectors, depth)?.into_iter().collect())
    }

    pub(crate) fn object_document(
        &self,
        bag: &PropertyBag,
        selectors: Option<&[Selector]>,
        depth: Depth,
    ) -> ConversionResult<Document> {
        Ok(self.object_entries(bag, selectors, depth)?.into_iter().collect())
    }

    fn mapping_entries(
        &self,
        map: &HostMap,
        selectors: Option<&[Selector]>,
        depth: Depth,
    ) -> ConversionResult<Entries> {
        let inner = self.enter(depth)?;

        let keys = map
            .iter()
            .map(|(key, _)| field_name(key))
            .collect::<ConversionResult<Vec<_>>>()?;

        match selectors {
            None => keys
                .into_iter()
                .zip(map.iter())
                .map(|(key, (_, value))| -> ConversionResult<(String, Bson)> {
                    Ok((key, self.convert_value(value, inner)?))
                })
                .collect(),
            Some(selectors) => self.selected_entries(SourceRef::Map(map), selectors, inner),
        }
    }

    fn object_entries(
        &self,
        bag: &PropertyBag,
        selectors: Option<&[Selector]>,
        depth: Depth,
    ) -> ConversionResult<Entries> {
        let inner = self.enter(depth)?;

        match selectors {
            None => bag
                .properties()
                .map(|property| -> ConversionResult<(String, Bson)> {
                    let value = read_property(bag, property);
                    Ok((property.name().to_string(), self.convert_value(&value, inner)?))
                })
                .collect(),
            Some(selectors) => self.selected_entries(SourceRef::Object(bag), selectors, inner),
        }
    }

    fn bson_entries(
        &self,
        document: &Document,
        selectors: Option<&[Selector]>,
        depth: Depth,
    ) -> ConversionResult<Entries> {
        let inner = self.enter(depth)?;

        let Some(selectors) = selectors else {
            return Ok(document
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect());
        };

        let mut entries = Entries::with_capacity(selectors.len());
        for selector in selectors {
            match selector {
                Selector::Property { field, property } => {
                    if let Some(value) = document.get(property) {
                        entries.push((field.clone(), value.clone()));
                    }
                }
                Selector::Computed { field, accessor } => {
                    let value = accessor(SourceRef::Document(document))
                        .map_err(|message| callback_failure("Document", message))?;
                    entries.push((field.clone(), self.convert_value(&value, inner)?));
                }
            }
        }
        Ok(entries)
    }

    fn selected_entries(
        &self,
        source: SourceRef<'_>,
        selectors: &[Selector],
        depth: Depth,
    ) -> ConversionResult<Entries> {
        let mut entries = Entries::with_capacity(selectors.len());
        for selector in selectors {
            let (field, value) = match selector {
                Selector::Property { field, property } => {
                    let value = match source {
                        SourceRef::Object(bag) => bag
                            .property(property)
                            .map(|found| read_property(bag, found)),
                        other => other.get(property),
                    };
                    match value {
                        Some(value) => (field, value),
                        None => continue,
                    }
                }
                Selector::Computed { field, accessor } => {
                    let value = accessor(source)
                        .map_err(|message| callback_failure(&source_type(source), message))?;
                    (field, value)
                }
            };
            entries.push((field.clone(), self.convert_value(&value, depth)?));
        }
        Ok(entries)
    }
}

fn merge(target: Option<SharedDocument>, entries: Entries) -> SharedDocument {
    let target = target.unwrap_or_default();
    {
        let mut document = target.borrow_mut();
        for (key, value) in entries {
            document.insert(key, value);
        }
    }
    target
}

fn field_name(key: &HostValue) -> ConversionResult<String> {
    match key.as_str() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        Some(_) => Err(ConversionError::InvalidKeyType("empty String".to_string())),
        None => Err(ConversionError::InvalidKeyType(key.type_name())),
    }
}

fn read_property(bag: &PropertyBag, property: &Property) -> HostValue {
    property.read().unwrap_or_else(|error| {
        warn!(
            type_name = bag.type_name(),
            property = property.name(),
            error = %error,
            "property read failed, storing null"
        );
        HostValue::Null
    })
}

fn source_type(source: SourceRef<'_>) -> String {
    match source {
        SourceRef::Map(_) => "Map".to_string(),
        SourceRef::Object(bag) => bag.type_name().to_string(),
        SourceRef::Document(_) => "Document".to_string(),
    }
}

fn callback_failure(type_name: &str, message: String) -> ConversionError {
    ConversionError::ConversionCallbackFailure {
        type_name: type_name.to_string(),
        message,
    }
}
