//! CLI command implementations.
//!
//! Each submodule handles one command with its configuration and
//! execution logic. Commands assemble a validated [`crate::config::GenerateConfig`]
//! and drive the library; they never exit the process themselves.

pub mod codegen;

pub use codegen::{handle_codegen, CodegenConfig};
