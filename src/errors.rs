//! Error taxonomy for the bridge generator.
//!
//! Every error is terminal for the invocation: components below the CLI
//! driver never exit the process, they propagate one of these variants up
//! and the driver reports the first error and exits non-zero.

use std::path::PathBuf;
use thiserror::Error;

/// Conversion direction that was requested from a kind table.
///
/// Carried by [`BridgeError::MissingConversion`] so the diagnostic names
/// which table lacked an entry, not just that one did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `PyArg_ParseTupleAndKeywords` format code.
    ArgFormat,
    /// C declaration type for an argument.
    CType,
    /// Rust `extern "C"` signature fragment.
    ExternType,
    /// Python type annotation in the rendered doc signature.
    PyAnnotation,
    /// Host value into a Python object (result materialization).
    IntoPython,
    /// Python object into a host value (argument materialization).
    FromPython,
    /// Raw C argument value into a host value.
    FromC,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::ArgFormat => "argument parse format",
            Direction::CType => "C argument type",
            Direction::ExternType => "extern signature fragment",
            Direction::PyAnnotation => "Python type annotation",
            Direction::IntoPython => "result materialization",
            Direction::FromPython => "argument materialization",
            Direction::FromC => "C argument materialization",
        };
        f.write_str(name)
    }
}

/// Unified error type for a generator invocation.
///
/// The variants follow the taxonomy: input errors (unreadable or
/// unparsable sources, namespace mismatch, unsupported shapes), derivation
/// errors (a kind with no table entry for a requested direction, doc
/// quoting), emission errors (formatter or write failures), and the
/// zero-output configuration error.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error(
        "all input files must belong to the same package: {} is in '{found}', expected '{expected}'",
        path.display()
    )]
    PackageMismatch {
        expected: String,
        found: String,
        path: PathBuf,
    },

    #[error("type '{ty}' of '{declaration}' is not supported")]
    UnsupportedType { declaration: String, ty: String },

    #[error(
        "invalid return arity {arity} for '{declaration}': return nothing, one value, or Result"
    )]
    ReturnArity { declaration: String, arity: usize },

    #[error("second return value '{ty}' of '{declaration}' is not an error")]
    SecondReturnNotError { declaration: String, ty: String },

    #[error("receiver '{receiver}' of '{declaration}' is taken by value: only &self and &mut self are supported")]
    ValueReceiver { declaration: String, receiver: String },

    #[error("no {direction} for kind {kind} in '{declaration}'")]
    MissingConversion {
        declaration: String,
        kind: String,
        direction: Direction,
    },

    #[error("cannot quote documentation of '{declaration}': {reason}")]
    DocQuoting { declaration: String, reason: String },

    #[error("generated {} does not parse: {message}", path.display())]
    InvalidGenerated { path: PathBuf, message: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no exported declarations found: mark functions with 'py:export' or pass --export-all")]
    NoExports,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_type(declaration: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::UnsupportedType {
            declaration: declaration.into(),
            ty: ty.into(),
        }
    }

    /// True for the variants that describe the input sources rather than
    /// the generator's own derivation or emission.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Parse { .. }
                | Self::PackageMismatch { .. }
                | Self::UnsupportedType { .. }
                | Self::ReturnArity { .. }
                | Self::SecondReturnNotError { .. }
                | Self::ValueReceiver { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
