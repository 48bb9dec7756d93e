//! Derived signature records and the per-kind conversion tables.
//!
//! A [`SignatureRecord`] is built exactly once per declaration and is
//! immutable afterwards: every derived field the three artifacts need is
//! computed here, so no fallible work is left for rendering time. The
//! builder also returns the converter helpers its expressions reference,
//! which the generator merges into the [`crate::registry::HelperRegistry`].
//!
//! Every table matches exhaustively on [`Kind`]; a kind without an entry
//! for a requested direction is an explicit
//! [`BridgeError::MissingConversion`], never a silent default.

use crate::errors::{BridgeError, Direction, Result};
use crate::extract::Declaration;
use crate::registry::HelperKey;
use crate::types::{Kind, TypeDescriptor};

/// Identifier handling shared by the builder and the generator.
#[derive(Debug, Clone, Copy)]
pub struct NamingOptions {
    /// Apply the PascalCase/camelCase to snake_case transform to
    /// declaration and parameter names.
    pub snake_case: bool,
}

impl NamingOptions {
    fn transform(&self, name: &str) -> String {
        if self.snake_case {
            to_snake_case(name)
        } else {
            name.to_string()
        }
    }
}

/// A declaration plus every derived field required by the artifacts.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub decl: Declaration,
    /// Python-facing callable name.
    pub py_name: String,
    /// C entry point name, `pyexport_...`.
    pub c_name: String,
    /// Rust bridge symbol called by the C entry point, `rsexport_...`.
    pub symbol: String,
    /// `PyMethodDef` flags for the entry point.
    pub method_flags: &'static str,
    /// Concatenated `PyArg_ParseTupleAndKeywords` format codes.
    pub format_string: String,
    /// Python-facing parameter names, in order.
    pub kwlist: Vec<String>,
    /// `name: hint` fragments for the rendered call signature.
    pub py_params_hinted: Vec<String>,
    /// Rust `extern "C"` parameter fragments, receiver first when present.
    pub extern_params: Vec<String>,
    /// C parameter declarations for the header and the entry locals.
    pub c_params: Vec<String>,
    /// C-to-host conversion expression per parameter.
    pub arg_exprs: Vec<String>,
    /// Doc string as a quoted C literal.
    pub doc_literal: String,
    /// Materialization of the result variable `v` into a Python object.
    pub ret_expr: String,
    /// Emit a pending-exception check after argument materialization.
    pub checks_arg_errors: bool,
}

impl SignatureRecord {
    pub fn has_args(&self) -> bool {
        !self.decl.params.is_empty()
    }

    pub fn has_receiver(&self) -> bool {
        self.decl.receiver.is_some()
    }

    /// Build the record and report the discovered helper requirements.
    pub fn build(
        decl: Declaration,
        options: &NamingOptions,
    ) -> Result<(SignatureRecord, Vec<HelperKey>)> {
        let qualified = decl.qualified_name();
        let mut helpers = Vec::new();

        let base = options.transform(&decl.name);
        let owner_part = decl.owner.as_deref().map(|owner| options.transform(owner));
        let (py_name, suffix) = match (&owner_part, &decl.receiver) {
            // Methods live on the type object and keep the bare name.
            (Some(owner), Some(_)) => (base.clone(), format!("{owner}_{base}")),
            // Associated functions surface as module-level callables and
            // carry the type prefix to stay collision-free.
            (Some(owner), None) => (format!("{owner}_{base}"), format!("{owner}_{base}")),
            _ => (base.clone(), base.clone()),
        };
        let c_name = format!("pyexport_{suffix}");
        let symbol = format!("rsexport_{suffix}");

        let mut format_string = String::new();
        let mut kwlist = Vec::new();
        let mut py_params_hinted = Vec::new();
        let mut extern_params = Vec::new();
        let mut c_params = Vec::new();
        let mut arg_exprs = Vec::new();
        let mut checks_arg_errors = false;

        if decl.receiver.is_some() {
            extern_params.push("recv: *mut c_void".to_string());
        }

        for param in &decl.params {
            let py_param = options.transform(&param.name);
            format_string.push_str(arg_format(&param.ty, &qualified)?);
            py_params_hinted.push(format!(
                "{py_param}: {}",
                py_annotation(&param.ty, &qualified)?
            ));
            extern_params.push(format!(
                "{py_param}: {}",
                extern_type(&param.ty, &qualified)?
            ));
            c_params.push(format!("{}{py_param}", c_type(&param.ty, &qualified)?));
            arg_exprs.push(from_c_expr(&param.ty, &py_param, &qualified, &mut helpers)?);
            kwlist.push(py_param);
            checks_arg_errors |= materializes_from_object(param.ty.kind);
        }

        let method_flags = if kwlist.is_empty() && decl.receiver.is_none() {
            "METH_NOARGS"
        } else {
            "METH_VARARGS | METH_KEYWORDS"
        };

        let ret_expr = into_py_expr(&decl.ret, "v", &qualified, &mut helpers)?;
        if decl.returns_error {
            helpers.push(HelperKey::RaiseErr);
        }

        let doc_literal = doc_literal(&decl, &py_name, &py_params_hinted, &qualified)?;

        let record = SignatureRecord {
            decl,
            py_name,
            c_name,
            symbol,
            method_flags,
            format_string,
            kwlist,
            py_params_hinted,
            extern_params,
            c_params,
            arg_exprs,
            doc_literal,
            ret_expr,
            checks_arg_errors,
        };
        Ok((record, helpers))
    }
}

/// PascalCase/camelCase to snake_case, keeping acronym runs together:
/// `FunctionReturnInt` becomes `function_return_int`, `HTTPServer`
/// becomes `http_server`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let after_lower =
                i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_ascii_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if after_lower || acronym_end {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn missing(declaration: &str, kind: Kind, direction: Direction) -> BridgeError {
    BridgeError::MissingConversion {
        declaration: declaration.to_string(),
        kind: kind.to_string(),
        direction,
    }
}

/// True when the argument arrives as a `PyObject *` and is materialized
/// by a fallible converter rather than parsed by format code.
fn materializes_from_object(kind: Kind) -> bool {
    matches!(kind, Kind::Seq | Kind::Map | Kind::Bytes | Kind::Handle)
}

/// `PyArg_ParseTupleAndKeywords` format code per kind.
///
/// The table is deliberately narrower than the materialization tables:
/// CPython has no signed 8-bit or unsigned native-width code, so those
/// kinds are fine as results but fatal as parameters.
fn arg_format(desc: &TypeDescriptor, declaration: &str) -> Result<&'static str> {
    let code = match desc.kind {
        Kind::Bool => "p",
        Kind::I16 => "h",
        Kind::I32 => "i",
        Kind::I64 => "L",
        Kind::Isize => "n",
        Kind::U8 => "B",
        Kind::U16 => "H",
        Kind::U32 => "I",
        Kind::U64 => "K",
        Kind::F32 => "f",
        Kind::F64 => "d",
        Kind::Complex32 | Kind::Complex64 => "D",
        Kind::Str => "s",
        Kind::Bytes | Kind::Seq | Kind::Map | Kind::Handle | Kind::PyObjectPtr => "O",
        Kind::I8 | Kind::Usize | Kind::Unit | Kind::ErrorFlag => {
            return Err(missing(declaration, desc.kind, Direction::ArgFormat))
        }
    };
    Ok(code)
}

/// C declaration type per kind, trailing separator included so the
/// parameter name concatenates directly (`long long v`, `PyObject *v`).
fn c_type(desc: &TypeDescriptor, declaration: &str) -> Result<&'static str> {
    let ty = match desc.kind {
        Kind::Bool => "int ",
        Kind::I16 => "short ",
        Kind::I32 => "int ",
        Kind::I64 => "long long ",
        Kind::Isize => "Py_ssize_t ",
        Kind::U8 => "unsigned char ",
        Kind::U16 => "unsigned short ",
        Kind::U32 => "unsigned int ",
        Kind::U64 => "unsigned long long ",
        Kind::F32 => "float ",
        Kind::F64 => "double ",
        Kind::Complex32 | Kind::Complex64 => "Py_complex ",
        Kind::Str => "const char *",
        Kind::Bytes | Kind::Seq | Kind::Map | Kind::Handle | Kind::PyObjectPtr => "PyObject *",
        Kind::I8 | Kind::Usize | Kind::Unit | Kind::ErrorFlag => {
            return Err(missing(declaration, desc.kind, Direction::CType))
        }
    };
    Ok(ty)
}

/// Rust `extern "C"` parameter type per kind.
fn extern_type(desc: &TypeDescriptor, declaration: &str) -> Result<&'static str> {
    let ty = match desc.kind {
        Kind::Bool => "c_int",
        Kind::I16 => "c_short",
        Kind::I32 => "c_int",
        Kind::I64 => "c_longlong",
        Kind::Isize => "Py_ssize_t",
        Kind::U8 => "c_uchar",
        Kind::U16 => "c_ushort",
        Kind::U32 => "c_uint",
        Kind::U64 => "c_ulonglong",
        Kind::F32 => "c_float",
        Kind::F64 => "c_double",
        Kind::Complex32 | Kind::Complex64 => "Py_complex",
        Kind::Str => "*const c_char",
        Kind::Bytes | Kind::Seq | Kind::Map | Kind::Handle | Kind::PyObjectPtr => {
            "*mut PyObject"
        }
        Kind::I8 | Kind::Usize | Kind::Unit | Kind::ErrorFlag => {
            return Err(missing(declaration, desc.kind, Direction::ExternType))
        }
    };
    Ok(ty)
}

/// Python type annotation per kind, recursive for composites.
fn py_annotation(desc: &TypeDescriptor, declaration: &str) -> Result<String> {
    let hint = match desc.kind {
        Kind::Unit => "NoneType".to_string(),
        Kind::Bool => "bool".to_string(),
        Kind::F32 | Kind::F64 => "float".to_string(),
        Kind::Complex32 | Kind::Complex64 => "complex".to_string(),
        Kind::Str => "str".to_string(),
        Kind::Bytes => "bytes".to_string(),
        Kind::PyObjectPtr => "object".to_string(),
        Kind::Handle => desc
            .type_name
            .clone()
            .ok_or_else(|| missing(declaration, desc.kind, Direction::PyAnnotation))?,
        Kind::Seq => {
            let elem = desc
                .elem
                .as_ref()
                .ok_or_else(|| missing(declaration, desc.kind, Direction::PyAnnotation))?;
            format!("List[{}]", py_annotation(elem, declaration)?)
        }
        Kind::Map => {
            let (key, value) = map_parts(desc, declaration, Direction::PyAnnotation)?;
            format!(
                "Dict[{}, {}]",
                py_annotation(key, declaration)?,
                py_annotation(value, declaration)?
            )
        }
        kind if kind.is_integer() => "int".to_string(),
        kind => return Err(missing(declaration, kind, Direction::PyAnnotation)),
    };
    Ok(hint)
}

fn map_parts<'d>(
    desc: &'d TypeDescriptor,
    declaration: &str,
    direction: Direction,
) -> Result<(&'d TypeDescriptor, &'d TypeDescriptor)> {
    match (&desc.key, &desc.value) {
        (Some(key), Some(value)) => Ok((key, value)),
        _ => Err(missing(declaration, desc.kind, direction)),
    }
}

/// Host value into a Python object. Composite kinds recurse through a
/// generated closure built from the nested kind's own rule.
fn into_py_expr(
    desc: &TypeDescriptor,
    var: &str,
    declaration: &str,
    helpers: &mut Vec<HelperKey>,
) -> Result<String> {
    let expr = match desc.kind {
        Kind::Unit => {
            helpers.push(HelperKey::PyNone);
            "py_none()".to_string()
        }
        Kind::Bool => {
            helpers.push(HelperKey::FromBool);
            format!("py_from_bool({var})")
        }
        Kind::I8 | Kind::I16 | Kind::I32 | Kind::I64 | Kind::Isize => {
            helpers.push(HelperKey::FromI64);
            format!("py_from_i64({var} as i64)")
        }
        Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64 | Kind::Usize => {
            helpers.push(HelperKey::FromU64);
            format!("py_from_u64({var} as u64)")
        }
        Kind::F32 | Kind::F64 => {
            helpers.push(HelperKey::FromF64);
            format!("py_from_f64({var} as f64)")
        }
        Kind::Complex32 => {
            helpers.push(HelperKey::FromComplex32);
            format!("py_from_complex32({var})")
        }
        Kind::Complex64 => {
            helpers.push(HelperKey::FromComplex64);
            format!("py_from_complex64({var})")
        }
        Kind::Str => {
            helpers.push(HelperKey::FromStr);
            if desc.repr.starts_with('&') {
                format!("py_from_str({var})")
            } else {
                format!("py_from_str(&{var})")
            }
        }
        Kind::Bytes => {
            helpers.push(HelperKey::FromBytes);
            format!("py_from_bytes(&{var})")
        }
        Kind::Seq => {
            let elem = desc
                .elem
                .as_ref()
                .ok_or_else(|| missing(declaration, desc.kind, Direction::IntoPython))?;
            helpers.push(HelperKey::FromVec);
            let elem_expr = into_py_expr(elem, "v", declaration, helpers)?;
            format!("py_from_vec({var}, |v| {elem_expr})")
        }
        Kind::Map => {
            let (key, value) = map_parts(desc, declaration, Direction::IntoPython)?;
            helpers.push(HelperKey::FromMap);
            let key_expr = into_py_expr(key, "k", declaration, helpers)?;
            let value_expr = into_py_expr(value, "v", declaration, helpers)?;
            format!("py_from_map({var}, |k| {key_expr}, |v| {value_expr})")
        }
        Kind::Handle => {
            let name = desc
                .type_name
                .as_deref()
                .ok_or_else(|| missing(declaration, desc.kind, Direction::IntoPython))?;
            let snake = to_snake_case(name);
            if desc.repr.starts_with("Box<") {
                helpers.push(HelperKey::Wrap(name.to_string()));
                format!("{snake}_to_py_object(Box::into_raw({var}) as *mut c_void)")
            } else if desc.repr.starts_with("*mut ") {
                helpers.push(HelperKey::Wrap(name.to_string()));
                format!("{snake}_to_py_object({var} as *mut c_void)")
            } else {
                // A borrowed handle cannot transfer ownership out.
                return Err(missing(declaration, desc.kind, Direction::IntoPython));
            }
        }
        Kind::PyObjectPtr => var.to_string(),
        Kind::ErrorFlag => {
            helpers.push(HelperKey::RaiseErr);
            format!("py_raise_err(&{var})")
        }
    };
    Ok(expr)
}

/// Python object into a host value: the inverse table, used for `"O"`
/// format arguments and inside composite closures.
fn from_py_expr(
    desc: &TypeDescriptor,
    var: &str,
    declaration: &str,
    helpers: &mut Vec<HelperKey>,
) -> Result<String> {
    let expr = match desc.kind {
        Kind::Bool => {
            helpers.push(HelperKey::AsBool);
            format!("py_as_bool({var})")
        }
        Kind::I8 | Kind::I16 | Kind::I32 | Kind::I64 | Kind::Isize => {
            helpers.push(HelperKey::AsI64);
            format!("py_as_i64({var}) as {}", desc.repr)
        }
        Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64 | Kind::Usize => {
            helpers.push(HelperKey::AsU64);
            format!("py_as_u64({var}) as {}", desc.repr)
        }
        Kind::F32 | Kind::F64 => {
            helpers.push(HelperKey::AsF64);
            format!("py_as_f64({var}) as {}", desc.repr)
        }
        Kind::Complex32 => {
            helpers.push(HelperKey::AsComplex32);
            format!("py_as_complex32({var})")
        }
        Kind::Complex64 => {
            helpers.push(HelperKey::AsComplex64);
            format!("py_as_complex64({var})")
        }
        Kind::Str => {
            if desc.repr.starts_with('&') {
                // A borrowed str cannot outlive the temporary object.
                return Err(missing(declaration, desc.kind, Direction::FromPython));
            }
            helpers.push(HelperKey::AsString);
            format!("py_as_string({var})")
        }
        Kind::Bytes => {
            helpers.push(HelperKey::AsBytes);
            format!("py_as_bytes({var})")
        }
        Kind::Seq => {
            let elem = desc
                .elem
                .as_ref()
                .ok_or_else(|| missing(declaration, desc.kind, Direction::FromPython))?;
            helpers.push(HelperKey::VecFrom);
            let elem_expr = from_py_expr(elem, "o", declaration, helpers)?;
            format!("py_vec_from({var}, |o| {elem_expr})")
        }
        Kind::Map => {
            let (key, value) = map_parts(desc, declaration, Direction::FromPython)?;
            helpers.push(HelperKey::MapFrom);
            let key_expr = from_py_expr(key, "o", declaration, helpers)?;
            let value_expr = from_py_expr(value, "o", declaration, helpers)?;
            format!("py_map_from({var}, |o| {key_expr}, |o| {value_expr})")
        }
        Kind::Handle => {
            let name = desc
                .type_name
                .as_deref()
                .ok_or_else(|| missing(declaration, desc.kind, Direction::FromPython))?;
            let snake = to_snake_case(name);
            helpers.push(HelperKey::Unwrap(name.to_string()));
            if desc.repr.starts_with("&mut ") {
                format!("&mut *({snake}_from_py_object({var}) as *mut super::{name})")
            } else if desc.repr.starts_with('&') {
                format!("&*({snake}_from_py_object({var}) as *const super::{name})")
            } else if desc.repr.starts_with("*mut ") {
                format!("{snake}_from_py_object({var}) as *mut super::{name}")
            } else if desc.repr.starts_with("*const ") {
                format!("{snake}_from_py_object({var}) as *const super::{name}")
            } else {
                // Box would take ownership away from the Python wrapper.
                return Err(missing(declaration, desc.kind, Direction::FromPython));
            }
        }
        Kind::PyObjectPtr => var.to_string(),
        Kind::Unit | Kind::ErrorFlag => {
            return Err(missing(declaration, desc.kind, Direction::FromPython))
        }
    };
    Ok(expr)
}

/// Raw C argument value into a host value. Scalars cast through the
/// literal host spelling; object-carrying kinds defer to the Python-object
/// table.
fn from_c_expr(
    desc: &TypeDescriptor,
    var: &str,
    declaration: &str,
    helpers: &mut Vec<HelperKey>,
) -> Result<String> {
    let expr = match desc.kind {
        Kind::Bool => format!("{var} != 0"),
        Kind::I16 | Kind::I32 | Kind::I64 | Kind::Isize => {
            format!("{var} as {}", desc.repr)
        }
        Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64 => format!("{var} as {}", desc.repr),
        Kind::F32 | Kind::F64 => format!("{var} as {}", desc.repr),
        Kind::Complex32 => {
            helpers.push(HelperKey::ComplexFromC32);
            format!("py_complex_to_complex32({var})")
        }
        Kind::Complex64 => {
            helpers.push(HelperKey::ComplexFromC64);
            format!("py_complex_to_complex64({var})")
        }
        Kind::Str => {
            if desc.repr.starts_with('&') {
                helpers.push(HelperKey::CStrToStr);
                format!("c_str_to_str({var})")
            } else {
                helpers.push(HelperKey::CStrToString);
                format!("c_str_to_string({var})")
            }
        }
        Kind::Bytes | Kind::Seq | Kind::Map | Kind::Handle | Kind::PyObjectPtr => {
            from_py_expr(desc, var, declaration, helpers)?
        }
        Kind::I8 | Kind::Usize | Kind::Unit | Kind::ErrorFlag => {
            return Err(missing(declaration, desc.kind, Direction::FromC))
        }
    };
    Ok(expr)
}

/// Rendered call-signature line plus the doc body, quoted as a C string
/// literal.
fn doc_literal(
    decl: &Declaration,
    py_name: &str,
    py_params_hinted: &[String],
    qualified: &str,
) -> Result<String> {
    let mut text = format!("{py_name}({})", py_params_hinted.join(", "));
    if !decl.ret.is_unit() {
        text.push_str(&format!(" -> {}", py_annotation(&decl.ret, qualified)?));
    }
    if !decl.doc.is_empty() {
        text.push_str("\n\n");
        text.push_str(&decl.doc);
    }
    quote_c_literal(&text, qualified)
}

/// Quote text as a C string literal. Newlines and backslashes escape
/// cleanly; an embedded quote does not and fails the record.
// TODO: escape embedded quotes instead of rejecting the doc string
pub fn quote_c_literal(text: &str, declaration: &str) -> Result<String> {
    if text.contains('"') {
        return Err(BridgeError::DocQuoting {
            declaration: declaration.to_string(),
            reason: "text contains a quote".to_string(),
        });
    }
    let escaped = text.replace('\\', "\\\\").replace('\n', "\\n");
    Ok(format!("\"{escaped}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use std::path::PathBuf;

    const SNAKE: NamingOptions = NamingOptions { snake_case: true };
    const RAW: NamingOptions = NamingOptions { snake_case: false };

    fn declarations(source: &str) -> Vec<Declaration> {
        let mut extractor = Extractor::new(false);
        extractor
            .ingest(source, &PathBuf::from("test.rs"), "crate")
            .unwrap();
        let extraction = extractor.finish();
        let mut decls = extraction.functions;
        for binding in extraction.types {
            decls.extend(binding.methods);
            decls.extend(binding.funcs);
        }
        decls
    }

    fn build_one(source: &str, options: &NamingOptions) -> (SignatureRecord, Vec<HelperKey>) {
        let mut decls = declarations(source);
        assert_eq!(decls.len(), 1, "expected exactly one declaration");
        SignatureRecord::build(decls.remove(0), options).unwrap()
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("FunctionReturnInt"), "function_return_int");
        assert_eq!(to_snake_case("Add"), "add");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("parseJSONValue"), "parse_json_value");
    }

    #[test]
    fn test_add_end_to_end_derivation() {
        let (record, _) = build_one(
            r#"
            /// py:export
            pub fn Add(a: i64, b: i64) -> i64 { a + b }
            "#,
            &SNAKE,
        );
        assert_eq!(record.py_name, "add");
        assert_eq!(record.c_name, "pyexport_add");
        assert_eq!(record.symbol, "rsexport_add");
        assert_eq!(record.format_string, "LL");
        assert_eq!(record.doc_literal, "\"add(a: int, b: int) -> int\"");
        assert_eq!(record.ret_expr, "py_from_i64(v as i64)");
        assert_eq!(record.method_flags, "METH_VARARGS | METH_KEYWORDS");
        assert!(!record.decl.returns_error);
    }

    #[test]
    fn test_transform_disabled_keeps_names() {
        let (record, _) = build_one(
            r#"
            /// py:export
            pub fn FunctionReturnInt(Value: i64) -> i64 { Value }
            "#,
            &RAW,
        );
        assert_eq!(record.py_name, "FunctionReturnInt");
        assert_eq!(record.c_name, "pyexport_FunctionReturnInt");
        assert_eq!(record.kwlist, vec!["Value"]);
    }

    #[test]
    fn test_transform_enabled_renames() {
        let (record, _) = build_one(
            r#"
            /// py:export
            pub fn FunctionReturnInt(Value: i64) -> i64 { Value }
            "#,
            &SNAKE,
        );
        assert_eq!(record.py_name, "function_return_int");
        assert_eq!(record.kwlist, vec!["value"]);
    }

    #[test]
    fn test_no_args_uses_meth_noargs() {
        let (record, _) = build_one(
            r#"
            /// py:export
            pub fn tick() {}
            "#,
            &SNAKE,
        );
        assert_eq!(record.method_flags, "METH_NOARGS");
        assert_eq!(record.format_string, "");
        assert_eq!(record.ret_expr, "py_none()");
    }

    #[test]
    fn test_error_flag_registers_raise_helper() {
        let (record, helpers) = build_one(
            r#"
            /// py:export
            pub fn checked(v: i64) -> Result<i64, String> { Ok(v) }
            "#,
            &SNAKE,
        );
        assert!(record.decl.returns_error);
        assert_eq!(record.ret_expr, "py_from_i64(v as i64)");
        assert!(helpers.contains(&HelperKey::RaiseErr));
        assert!(helpers.contains(&HelperKey::FromI64));
    }

    #[test]
    fn test_sequence_materialization_recurses() {
        let (record, helpers) = build_one(
            r#"
            /// py:export
            pub fn spans() -> Vec<Vec<i64>> { Vec::new() }
            "#,
            &SNAKE,
        );
        assert_eq!(
            record.ret_expr,
            "py_from_vec(v, |v| py_from_vec(v, |v| py_from_i64(v as i64)))"
        );
        assert!(helpers.contains(&HelperKey::FromVec));
        assert!(helpers.contains(&HelperKey::FromI64));
    }

    #[test]
    fn test_map_argument_materialization() {
        let (record, helpers) = build_one(
            r#"
            /// py:export
            pub fn tally(counts: HashMap<String, i64>) {}
            "#,
            &SNAKE,
        );
        assert_eq!(record.format_string, "O");
        assert_eq!(
            record.arg_exprs[0],
            "py_map_from(counts, |o| py_as_string(o), |o| py_as_i64(o) as i64)"
        );
        assert_eq!(record.py_params_hinted[0], "counts: Dict[str, int]");
        assert!(record.checks_arg_errors);
        assert!(helpers.contains(&HelperKey::MapFrom));
        assert!(helpers.contains(&HelperKey::AsString));
        assert!(helpers.contains(&HelperKey::AsI64));
    }

    #[test]
    fn test_str_argument_forms() {
        let (record, helpers) = build_one(
            r#"
            /// py:export
            pub fn greet(name: &str, title: String) {}
            "#,
            &SNAKE,
        );
        assert_eq!(record.format_string, "ss");
        assert_eq!(record.arg_exprs[0], "c_str_to_str(name)");
        assert_eq!(record.arg_exprs[1], "c_str_to_string(title)");
        assert!(helpers.contains(&HelperKey::CStrToStr));
        assert!(helpers.contains(&HelperKey::CStrToString));
    }

    #[test]
    fn test_method_naming_embeds_owner() {
        let (record, _) = build_one(
            r#"
            pub struct Counter { n: i64 }
            impl Counter {
                /// py:export
                pub fn IncrementBy(&mut self, step: i64) -> i64 { self.n += step; self.n }
            }
            "#,
            &SNAKE,
        );
        assert_eq!(record.py_name, "increment_by");
        assert_eq!(record.c_name, "pyexport_counter_increment_by");
        assert_eq!(record.symbol, "rsexport_counter_increment_by");
        assert_eq!(record.extern_params[0], "recv: *mut c_void");
        assert_eq!(record.method_flags, "METH_VARARGS | METH_KEYWORDS");
    }

    #[test]
    fn test_constructor_returns_wrapped_handle() {
        let (record, helpers) = build_one(
            r#"
            pub struct Counter { n: i64 }
            impl Counter {
                /// py:export
                pub fn new() -> Box<Counter> { Box::new(Counter { n: 0 }) }
            }
            "#,
            &SNAKE,
        );
        assert_eq!(record.py_name, "counter_new");
        assert_eq!(
            record.ret_expr,
            "counter_to_py_object(Box::into_raw(v) as *mut c_void)"
        );
        assert!(helpers.contains(&HelperKey::Wrap("Counter".to_string())));
    }

    #[test]
    fn test_handle_argument_unwraps() {
        let (record, helpers) = build_one(
            r#"
            pub struct Counter { n: i64 }
            /// py:export
            pub fn merge(a: &Counter, b: &mut Counter) {}
            "#,
            &SNAKE,
        );
        assert_eq!(record.format_string, "OO");
        assert_eq!(
            record.arg_exprs[0],
            "&*(counter_from_py_object(a) as *const super::Counter)"
        );
        assert_eq!(
            record.arg_exprs[1],
            "&mut *(counter_from_py_object(b) as *mut super::Counter)"
        );
        assert!(helpers.contains(&HelperKey::Unwrap("Counter".to_string())));
    }

    #[test]
    fn test_unsupported_arg_format_is_fatal_and_named() {
        let mut decls = declarations(
            r#"
            /// py:export
            pub fn sized(n: usize) {}
            "#,
        );
        let err = SignatureRecord::build(decls.remove(0), &SNAKE).unwrap_err();
        match err {
            BridgeError::MissingConversion {
                declaration,
                kind,
                direction,
            } => {
                assert_eq!(declaration, "sized");
                assert_eq!(kind, "Usize");
                assert_eq!(direction, Direction::ArgFormat);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_doc_with_quote_fails_record_construction() {
        let mut decls = declarations(
            r#"
            /// py:export
            /// Prints "hello".
            pub fn hello() {}
            "#,
        );
        let err = SignatureRecord::build(decls.remove(0), &SNAKE).unwrap_err();
        assert!(matches!(err, BridgeError::DocQuoting { .. }), "{err}");
    }

    #[test]
    fn test_doc_body_is_appended_after_blank_line() {
        let (record, _) = build_one(
            r#"
            /// py:export
            /// Doubles the argument.
            pub fn double(v: i64) -> i64 { v * 2 }
            "#,
            &SNAKE,
        );
        assert_eq!(
            record.doc_literal,
            "\"double(v: int) -> int\\n\\nDoubles the argument.\""
        );
    }

    #[test]
    fn test_every_scalar_kind_converts_in_both_object_directions() {
        // Round-trip coverage at the table level: each scalar kind has
        // both a host-to-Python and a Python-to-host rule.
        let scalars = [
            (Kind::Bool, "bool"),
            (Kind::I8, "i8"),
            (Kind::I16, "i16"),
            (Kind::I32, "i32"),
            (Kind::I64, "i64"),
            (Kind::Isize, "isize"),
            (Kind::U8, "u8"),
            (Kind::U16, "u16"),
            (Kind::U32, "u32"),
            (Kind::U64, "u64"),
            (Kind::Usize, "usize"),
            (Kind::F32, "f32"),
            (Kind::F64, "f64"),
            (Kind::Complex32, "Complex32"),
            (Kind::Complex64, "Complex64"),
            (Kind::Str, "String"),
        ];
        for (kind, repr) in scalars {
            let desc = TypeDescriptor::scalar(kind, repr);
            let mut helpers = Vec::new();
            into_py_expr(&desc, "v", "probe", &mut helpers)
                .unwrap_or_else(|e| panic!("into_py for {kind}: {e}"));
            from_py_expr(&desc, "o", "probe", &mut helpers)
                .unwrap_or_else(|e| panic!("from_py for {kind}: {e}"));
        }
    }

    #[test]
    fn test_passthrough_return_stays_unconverted() {
        let (record, helpers) = build_one(
            "pub fn raw() -> *mut PyObject { std::ptr::null_mut() }",
            &SNAKE,
        );
        assert_eq!(record.ret_expr, "v");
        assert!(helpers.is_empty());
    }
}
