//! Host values into document values.
//!
//! [`Converter::to_bson`] dispatches on the shape of a host value in a fixed priority
//! order:
//!
//! 1. null
//! 2. values that already are document values (including wrapper views)
//! 3. strings
//! 4. mappings and property bags, built into nested documents
//! 5. sequences, converted element by element into arrays
//! 6. native scalars
//! 7. anything else: the object's own coercion, then a registered type handler, then
//!    the caller's [`FallbackConverter`], retried once with the fallback disabled
//!
//! Every recursive step enters the [`Depth`] guard.

use bson::{Binary, Bson, spec::BinarySubtype};
use tracing::debug;

use crate::{
    config::{ConvertOptions, OutputKind},
    depth::{DEFAULT_MAX_DEPTH, Depth},
    error::{ConversionError, ConversionResult},
    host::{HostObject, HostValue},
    reader, registry, view,
};

/// Caller-supplied hook invoked when a value has no direct conversion path.
///
/// Returning `Ok(Some(value))` asks the converter to retry with `value`; `Ok(None)` means
/// the hook has nothing usable. An `Err` is reported as
/// [`ConversionError::ConversionCallbackFailure`].
pub trait FallbackConverter {
    fn convert(&self, value: &HostValue) -> Result<Option<HostValue>, String>;
}

impl<F> FallbackConverter for F
where
    F: Fn(&HostValue) -> Result<Option<HostValue>, String>,
{
    fn convert(&self, value: &HostValue) -> Result<Option<HostValue>, String> {
        self(value)
    }
}

/// The conversion engine entry point.
///
/// A converter holds options and an optional fallback hook, never per-call state, so it
/// is cheap to copy and safe to reuse across independent conversions.
#[derive(Clone, Copy)]
pub struct Converter<'f> {
    max_depth: usize,
    output: OutputKind,
    fallback: Option<&'f dyn FallbackConverter>,
}

impl Default for Converter<'_> {
    fn default() -> Self {
        Converter {
            max_depth: DEFAULT_MAX_DEPTH,
            output: OutputKind::default(),
            fallback: None,
        }
    }
}

impl std::fmt::Debug for Converter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("max_depth", &self.max_depth)
            .field("output", &self.output)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<'f> Converter<'f> {
    /// Creates a converter with default options and no fallback hook.
    pub fn new() -> Self {
        Converter::default()
    }

    /// Creates a converter from options.
    pub fn with_options(options: &ConvertOptions) -> Self {
        Converter {
            max_depth: options.max_depth,
            output: options.output,
            fallback: None,
        }
    }

    /// Returns this converter with a fallback hook.
    pub fn fallback(mut self, fallback: &'f dyn FallbackConverter) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Returns this converter with another recursion ceiling.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns this converter with another read-back representation.
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    pub fn output(&self) -> OutputKind {
        self.output
    }

    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }

    /// Converts a host value into a document value.
    pub fn to_bson(&self, value: &HostValue) -> ConversionResult<Bson> {
        self.convert_value(value, Depth::ROOT)
    }

    /// Converts a sequence into its elements, or any other value into a single element.
    pub fn to_bson_values(&self, value: &HostValue) -> ConversionResult<Vec<Bson>> {
        match self.to_bson(value)? {
            Bson::Array(items) => Ok(items),
            other => Ok(vec![other]),
        }
    }

    /// Exposes a document value read back from storage, as configured by [`OutputKind`].
    pub fn to_host(&self, value: Bson) -> HostValue {
        match self.output {
            OutputKind::View => view::wrap(value),
            OutputKind::Object => reader::from_bson(&value),
        }
    }

    pub(crate) fn enter(&self, depth: Depth) -> ConversionResult<Depth> {
        depth.enter(self.max_depth)
    }

    pub(crate) fn convert_value(&self, value: &HostValue, depth: Depth) -> ConversionResult<Bson> {
        let inner = self.enter(depth)?;

        match value {
            HostValue::Null => Ok(Bson::Null),
            HostValue::Bson(bson) => Ok(bson.clone()),
            HostValue::Document(view) => Ok(Bson::Document(view.to_document()?)),
            HostValue::Array(view) => Ok(Bson::Array(view.to_vec()?)),
            HostValue::String(text) => Ok(Bson::String(text.clone())),
            HostValue::Map(map) => Ok(Bson::Document(self.mapping_document(map, None, inner)?)),
            HostValue::Object(bag) => Ok(Bson::Document(self.object_document(bag, None, inner)?)),
            HostValue::Seq(items) => Ok(Bson::Array(
                items
                    .iter()
                    .map(|item| self.convert_value(item, inner))
                    .collect::<ConversionResult<Vec<_>>>()?,
            )),
            HostValue::Boolean(value) => Ok(Bson::Boolean(*value)),
            HostValue::Int32(value) => Ok(Bson::Int32(*value)),
            HostValue::Int64(value) => Ok(Bson::Int64(*value)),
            HostValue::Double(value) => Ok(Bson::Double(*value)),
            HostValue::DateTime(value) => Ok(Bson::DateTime(bson::DateTime::from_chrono(*value))),
            HostValue::Binary(binary) => Ok(Bson::Binary(binary.clone())),
            HostValue::Uuid(uuid) => Ok(Bson::Binary(Binary {
                subtype: BinarySubtype::Uuid,
                bytes: uuid.as_bytes().to_vec(),
            })),
            HostValue::ObjectId(id) => Ok(Bson::ObjectId(*id)),
            HostValue::Query(expr) => Ok(Bson::Document(crate::query::render_filter(expr)?)),
            HostValue::Update(update) => Ok(Bson::Document(update.render()?)),
            HostValue::Projection(projection) => Ok(Bson::Document(projection.render())),
            HostValue::Opaque(object) => self.convert_opaque(value, object.as_ref(), depth, inner),
        }
    }

    fn convert_opaque(
        &self,
        value: &HostValue,
        object: &dyn HostObject,
        depth: Depth,
        inner: Depth,
    ) -> ConversionResult<Bson> {
        let detail = match object.coerce() {
            Ok(bson) => return Ok(bson),
            Err(detail) => detail,
        };

        if let Some(result) = registry::coerce(object) {
            return result.map_err(|message| ConversionError::ConversionCallbackFailure {
                type_name: object.type_name().to_string(),
                message,
            });
        }

        if let Some(bag) = object.properties() {
            return Ok(Bson::Document(self.object_document(&bag, None, inner)?));
        }

        let Some(fallback) = self.fallback else {
            return Err(ConversionError::UnsupportedType {
                type_name: object.type_name().to_string(),
                detail,
            });
        };

        debug!(type_name = object.type_name(), "invoking fallback converter");
        match fallback.convert(value) {
            Ok(Some(replacement)) => {
                debug!(
                    type_name = object.type_name(),
                    replacement = %replacement.type_name(),
                    "retrying conversion without fallback"
                );
                let retry = Converter {
                    fallback: None,
                    ..*self
                };
                retry.convert_value(&replacement, depth)
            }
            Ok(None) => Err(ConversionError::UnsupportedType {
                type_name: object.type_name().to_string(),
                detail,
            }),
            Err(message) => Err(ConversionError::ConversionCallbackFailure {
                type_name: object.type_name().to_string(),
                message: format!("{message} (coercion failed: {detail})"),
            }),
        }
    }
}
