//! Closed type vocabulary and the resolver from `syn` type expressions.
//!
//! The resolver is pure and stateless: it maps a raw type expression to a
//! [`TypeDescriptor`] or returns a descriptive error carrying the literal
//! source text. It never terminates the process; the extractor turns a
//! resolution failure into a fatal diagnostic naming the declaration.

use quote::ToTokens;

/// Shape of a type for code-generation purposes.
///
/// The vocabulary is intentionally closed: every conversion table in the
/// signature builder matches exhaustively on this enum, so adding a kind
/// forces every table to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// `num_complex::Complex32`, a pair of `f32`.
    Complex32,
    /// `num_complex::Complex64`, a pair of `f64`.
    Complex64,
    /// `String` or `&str`.
    Str,
    /// `Vec<u8>`, mapped to Python `bytes` rather than a generic list.
    Bytes,
    /// `Vec<T>` for any other supported element type.
    Seq,
    /// `HashMap<K, V>`.
    Map,
    /// Reference, raw pointer, or `Box` to a named host type, exposed to
    /// Python as a wrapped handle.
    Handle,
    /// `*mut PyObject`: the runtime's own object, flows unconverted.
    PyObjectPtr,
    /// No return value.
    Unit,
    /// The `E` position of a `Result<T, E>` return.
    ErrorFlag,
}

impl Kind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Kind::I8
                | Kind::I16
                | Kind::I32
                | Kind::I64
                | Kind::Isize
                | Kind::U8
                | Kind::U16
                | Kind::U32
                | Kind::U64
                | Kind::Usize
        )
    }

    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Kind::Bool
                | Kind::F32
                | Kind::F64
                | Kind::Complex32
                | Kind::Complex64
                | Kind::Str
        ) || self.is_integer()
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A kind plus nested descriptors for composite kinds and the literal
/// source text of the host type.
///
/// Invariant: `Seq` always has `elem`, `Map` always has `key` and `value`,
/// `Handle` always has `type_name`. Host types are values and pointers,
/// never descriptor graphs, so descriptors cannot cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub kind: Kind,
    pub elem: Option<Box<TypeDescriptor>>,
    pub key: Option<Box<TypeDescriptor>>,
    pub value: Option<Box<TypeDescriptor>>,
    /// Literal Rust spelling of the expression, e.g. `&str`,
    /// `HashMap<String, i64>`, `Box<Counter>`.
    pub repr: String,
    /// Named host type for `Handle` descriptors.
    pub type_name: Option<String>,
}

impl TypeDescriptor {
    pub fn scalar(kind: Kind, repr: impl Into<String>) -> Self {
        Self {
            kind,
            elem: None,
            key: None,
            value: None,
            repr: repr.into(),
            type_name: None,
        }
    }

    pub fn seq(elem: TypeDescriptor, repr: impl Into<String>) -> Self {
        Self {
            kind: Kind::Seq,
            elem: Some(Box::new(elem)),
            key: None,
            value: None,
            repr: repr.into(),
            type_name: None,
        }
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor, repr: impl Into<String>) -> Self {
        Self {
            kind: Kind::Map,
            elem: None,
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
            repr: repr.into(),
            type_name: None,
        }
    }

    pub fn handle(type_name: impl Into<String>, repr: impl Into<String>) -> Self {
        Self {
            kind: Kind::Handle,
            elem: None,
            key: None,
            value: None,
            repr: repr.into(),
            type_name: Some(type_name.into()),
        }
    }

    pub fn unit() -> Self {
        Self::scalar(Kind::Unit, "()")
    }

    pub fn py_object_ptr(repr: impl Into<String>) -> Self {
        Self::scalar(Kind::PyObjectPtr, repr)
    }

    pub fn is_unit(&self) -> bool {
        self.kind == Kind::Unit
    }
}

/// Resolution failure carrying the literal source text of the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedType {
    pub text: String,
}

impl std::fmt::Display for UnresolvedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type '{}' is not supported", self.text)
    }
}

/// Literal source text of a type expression.
///
/// `syn` token streams space every token; this compacts the stream back to
/// the conventional spelling so diagnostics and generated casts read like
/// the source (`Vec<u8>`, `&mut Counter`, `*mut PyObject`).
pub fn type_text(ty: &syn::Type) -> String {
    compact_tokens(&ty.to_token_stream().to_string())
}

fn compact_tokens(tokens: &str) -> String {
    let chars: Vec<char> = tokens.chars().collect();
    let mut out = String::with_capacity(tokens.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = out.chars().last();
            let next = chars.get(i + 1).copied();
            let drop_before = matches!(next, Some('<' | '>' | ',' | ':' | ')' | ';'));
            let drop_after = matches!(prev, Some('<' | '&' | '*' | ':' | '('));
            if drop_before || drop_after {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn last_segment(path: &syn::Path) -> Option<&syn::PathSegment> {
    path.segments.last()
}

fn scalar_kind(ident: &str) -> Option<Kind> {
    let kind = match ident {
        "bool" => Kind::Bool,
        "i8" => Kind::I8,
        "i16" => Kind::I16,
        "i32" => Kind::I32,
        "i64" => Kind::I64,
        "isize" => Kind::Isize,
        "u8" => Kind::U8,
        "u16" => Kind::U16,
        "u32" => Kind::U32,
        "u64" => Kind::U64,
        "usize" => Kind::Usize,
        "f32" => Kind::F32,
        "f64" => Kind::F64,
        "Complex32" => Kind::Complex32,
        "Complex64" => Kind::Complex64,
        "String" | "str" => Kind::Str,
        _ => return None,
    };
    Some(kind)
}

fn single_generic_arg(segment: &syn::PathSegment) -> Option<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) if args.args.len() == 1 => {
            match args.args.first() {
                Some(syn::GenericArgument::Type(ty)) => Some(ty),
                _ => None,
            }
        }
        _ => None,
    }
}

fn two_generic_args(segment: &syn::PathSegment) -> Option<(&syn::Type, &syn::Type)> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) if args.args.len() == 2 => {
            let mut types = args.args.iter().filter_map(|a| match a {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            });
            match (types.next(), types.next()) {
                (Some(k), Some(v)) => Some((k, v)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// True when the expression is a raw pointer to the runtime's own object
/// representation, e.g. `*mut PyObject` or `*mut pyo3_ffi::PyObject`.
pub fn is_py_object_ptr(ty: &syn::Type) -> bool {
    let syn::Type::Ptr(ptr) = ty else {
        return false;
    };
    let syn::Type::Path(path) = ptr.elem.as_ref() else {
        return false;
    };
    last_segment(&path.path).is_some_and(|s| s.ident == "PyObject")
}

/// Resolve a raw type expression to a [`TypeDescriptor`].
///
/// Recursive for `Vec` elements and `HashMap` key/value positions. `Vec`
/// whose element resolves to `U8` is special-cased to [`Kind::Bytes`]
/// because CPython represents it with its own `bytes` value type.
pub fn resolve(ty: &syn::Type) -> Result<TypeDescriptor, UnresolvedType> {
    let repr = type_text(ty);
    match ty {
        syn::Type::Path(path) => {
            let Some(segment) = last_segment(&path.path) else {
                return Err(UnresolvedType { text: repr });
            };
            let ident = segment.ident.to_string();
            if segment.arguments.is_none() {
                if let Some(kind) = scalar_kind(&ident) {
                    return Ok(TypeDescriptor::scalar(kind, repr));
                }
                return Err(UnresolvedType { text: repr });
            }
            match ident.as_str() {
                "Vec" => {
                    let Some(inner) = single_generic_arg(segment) else {
                        return Err(UnresolvedType { text: repr });
                    };
                    let elem = resolve(inner)?;
                    if elem.kind == Kind::U8 {
                        return Ok(TypeDescriptor::scalar(Kind::Bytes, repr));
                    }
                    Ok(TypeDescriptor::seq(elem, repr))
                }
                "HashMap" => {
                    let Some((key, value)) = two_generic_args(segment) else {
                        return Err(UnresolvedType { text: repr });
                    };
                    let key = resolve(key)?;
                    let value = resolve(value)?;
                    Ok(TypeDescriptor::map(key, value, repr))
                }
                "Box" => {
                    let Some(inner) = single_generic_arg(segment) else {
                        return Err(UnresolvedType { text: repr });
                    };
                    match named_type(inner) {
                        Some(name) => Ok(TypeDescriptor::handle(name, repr)),
                        None => Err(UnresolvedType { text: repr }),
                    }
                }
                _ => Err(UnresolvedType { text: repr }),
            }
        }

        syn::Type::Reference(reference) => match reference.elem.as_ref() {
            syn::Type::Path(path)
                if last_segment(&path.path).is_some_and(|s| {
                    s.ident == "str" && s.arguments.is_none()
                }) =>
            {
                Ok(TypeDescriptor::scalar(Kind::Str, repr))
            }
            inner => match named_type(inner) {
                Some(name) => Ok(TypeDescriptor::handle(name, repr)),
                None => Err(UnresolvedType { text: repr }),
            },
        },

        syn::Type::Ptr(ptr) => {
            if is_py_object_ptr(ty) {
                return Ok(TypeDescriptor::py_object_ptr(repr));
            }
            match named_type(ptr.elem.as_ref()) {
                Some(name) => Ok(TypeDescriptor::handle(name, repr)),
                None => Err(UnresolvedType { text: repr }),
            }
        }

        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => Ok(TypeDescriptor::unit()),

        syn::Type::Paren(paren) => resolve(&paren.elem),

        _ => Err(UnresolvedType { text: repr }),
    }
}

/// Name of a plain named type (a path with no generic arguments that is
/// not one of the scalar spellings), or `None`.
fn named_type(ty: &syn::Type) -> Option<String> {
    let syn::Type::Path(path) = ty else {
        return None;
    };
    let segment = last_segment(&path.path)?;
    if !segment.arguments.is_none() {
        return None;
    }
    let ident = segment.ident.to_string();
    if scalar_kind(&ident).is_some() || ident == "PyObject" {
        return None;
    }
    Some(ident)
}
