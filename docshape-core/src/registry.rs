//! Process-wide custom type handlers.
//!
//! Handlers teach the converter how to coerce opaque host objects by type name. They are
//! installed once, before conversion traffic starts; the first call to
//! [`register_type_handlers`] wins and every later call is a no-op, not an error.
//!
//! ```ignore
//! use docshape_core::registry::register_type_handlers;
//!
//! register_type_handlers(|registry| {
//!     registry.register("Money", |object| {
//!         let money = object.as_any().downcast_ref::<Money>().ok_or("not money")?;
//!         Ok(bson::Bson::Int64(money.cents))
//!     });
//! });
//! ```

use std::{collections::HashMap, sync::OnceLock};

use bson::Bson;
use tracing::{debug, info};

use crate::host::HostObject;

/// Coerces one host object type into a document value.
pub type TypeHandler = Box<dyn Fn(&dyn HostObject) -> Result<Bson, String> + Send + Sync>;

/// Type handlers keyed by [`HostObject::type_name`].
#[derive(Default)]
pub struct TypeRegistry {
    handlers: HashMap<String, TypeHandler>,
}

impl TypeRegistry {
    /// Registers a handler for `type_name`, replacing any earlier one.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        handler: impl Fn(&dyn HostObject) -> Result<Bson, String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.handlers.insert(type_name.into(), Box::new(handler));
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeHandler> {
        self.handlers.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// Installs the process-wide type handlers.
///
/// Returns `true` if this call performed the registration and `false` if handlers were
/// already installed, in which case `configure` is not invoked.
pub fn register_type_handlers(configure: impl FnOnce(&mut TypeRegistry)) -> bool {
    let mut installed = false;
    REGISTRY.get_or_init(|| {
        let mut registry = TypeRegistry::default();
        configure(&mut registry);
        installed = true;
        info!(handlers = registry.len(), "registered custom type handlers");
        registry
    });

    if !installed {
        debug!("custom type handlers already registered, ignoring");
    }
    installed
}

/// Returns whether type handlers have been installed.
pub fn is_registered() -> bool {
    REGISTRY.get().is_some()
}

/// Coerces `object` with its registered handler, if any.
pub(crate) fn coerce(object: &dyn HostObject) -> Option<Result<Bson, String>> {
    REGISTRY
        .get()
        .and_then(|registry| registry.get(object.type_name()))
        .map(|handler| handler(object))
}
