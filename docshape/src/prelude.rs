//! Convenient re-exports of commonly used types from docshape.
//!
//! ```ignore
//! use docshape::prelude::*;
//! ```
//!
//! This provides access to:
//! - The converter, its options and the host model
//! - Wrapper views and selectors
//! - Query, update, sort and projection types
//! - The collection seam and error types

pub use docshape_core::{
    backend::{CollectionBuilder, DataCollection, FindOptions, UpdateOptions, UpdateResult},
    config::{ConvertOptions, OutputKind},
    convert::{Converter, FallbackConverter},
    document::TypedDocument,
    error::{ConversionError, ConversionResult, StoreError, StoreResult},
    host::{HostMap, HostObject, HostValue, Property, PropertyBag},
    projection::Projection,
    query::{Expr, FieldOp, Filter, FilterRenderer, QueryVisitor, render_filter},
    registry::{TypeRegistry, register_type_handlers},
    selector::{Selector, SourceRef},
    sort::{Sort, SortDirection, render_sort},
    update::{RenderedUpdate, Update},
    view::{ArrayView, DocumentView, SharedDocument},
};
