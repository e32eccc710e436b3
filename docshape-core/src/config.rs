//! Conversion options.
//!
//! Options can be built in code or parsed from JSON:
//!
//! ```ignore
//! use docshape_core::config::{ConvertOptions, OutputKind};
//!
//! let options = ConvertOptions::from_json(r#"{ "max_depth": 32, "output": "object" }"#)?;
//! assert_eq!(options.output, OutputKind::Object);
//! ```

use serde::{Deserialize, Serialize};

use crate::{depth::DEFAULT_MAX_DEPTH, error::ConversionResult};

/// How documents read back from storage are exposed to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Lazy wrapper views over the returned document.
    #[default]
    View,
    /// Fully materialised property bags.
    Object,
}

/// Options shared by every conversion made through a [`Converter`](crate::convert::Converter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Maximum recursion depth of a single conversion call (default: 100).
    pub max_depth: usize,
    /// Representation used when documents are handed back to the host.
    pub output: OutputKind,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            output: OutputKind::View,
        }
    }
}

impl ConvertOptions {
    /// Parses options from a JSON object. Missing fields take their defaults.
    pub fn from_json(input: &str) -> ConversionResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Returns a copy of these options with another recursion ceiling.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns a copy of these options with another output representation.
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }
}
