//! pybridge turns statically declared Rust function and method
//! signatures into the glue code required to expose them as callables in
//! a CPython extension module: a C bridge source, a C header, and a Rust
//! bridge source consumed by the external cargo build.

pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod extract;
pub mod generate;
pub mod registry;
pub mod signature;
pub mod types;

// Re-export commonly used types
pub use crate::config::GenerateConfig;
pub use crate::errors::{BridgeError, Direction};
pub use crate::extract::{extract_files, Declaration, Extraction, TypeBinding};
pub use crate::generate::generate;
pub use crate::registry::{HelperKey, HelperRegistry};
pub use crate::signature::{to_snake_case, NamingOptions, SignatureRecord};
pub use crate::types::{resolve, Kind, TypeDescriptor};
