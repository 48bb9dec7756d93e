//! Rendering of the three coordinated artifacts.
//!
//! Every record is fully built before any rendering starts, so no
//! fallible derivation happens mid-render; the renderers only assemble
//! already-derived strings. If any artifact fails to format or write,
//! every artifact written during this invocation is deleted before the
//! error is returned, so a failed run never leaves an inconsistent set.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, trace};

use crate::config::GenerateConfig;
use crate::errors::{BridgeError, Result};
use crate::extract::Extraction;
use crate::registry::{helper_source, HelperRegistry};
use crate::signature::{quote_c_literal, to_snake_case, NamingOptions, SignatureRecord};

/// Template identity of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    RustBridge,
    CSource,
    CHeader,
}

type Formatter = fn(&str, &Path) -> Result<String>;

/// One target file: name, template, optional post-processing formatter.
/// Transient; write-once per invocation.
struct Artifact {
    path: PathBuf,
    template: Template,
    formatter: Option<Formatter>,
}

/// A type with its exported methods and constructor-style functions.
struct TypeView {
    type_name: String,
    doc_literal: String,
    methods: Vec<SignatureRecord>,
    funcs: Vec<SignatureRecord>,
}

/// Shared data view all three templates render from.
struct View<'a> {
    config: &'a GenerateConfig,
    package: &'a str,
    functions: Vec<SignatureRecord>,
    types: Vec<TypeView>,
    registry: HelperRegistry,
}

impl View<'_> {
    /// Every record, module-level functions first, then each type's
    /// methods and constructors.
    fn records(&self) -> impl Iterator<Item = &SignatureRecord> {
        self.functions.iter().chain(
            self.types
                .iter()
                .flat_map(|t| t.methods.iter().chain(t.funcs.iter())),
        )
    }

    /// Entries of the module-level method table: functions plus
    /// constructor-style functions of every type.
    fn module_level(&self) -> impl Iterator<Item = &SignatureRecord> {
        self.functions
            .iter()
            .chain(self.types.iter().flat_map(|t| t.funcs.iter()))
    }

    /// Named types needing a Python wrapper object: every type with
    /// exported members plus every type referenced through handle
    /// conversions, sorted.
    fn handle_types(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            self.types.iter().map(|t| t.type_name.clone()).collect();
        names.extend(self.registry.handle_types().iter().map(|s| s.to_string()));
        names.into_iter().collect()
    }
}

/// Generate all three artifacts for one extraction.
pub fn generate(config: &GenerateConfig, extraction: &Extraction) -> Result<()> {
    if extraction.is_empty() {
        return Err(BridgeError::NoExports);
    }

    let view = build_view(config, extraction)?;

    let artifacts = [
        Artifact {
            path: config.rust_source.clone(),
            template: Template::RustBridge,
            formatter: Some(format_rust),
        },
        Artifact {
            path: config.c_source.clone(),
            template: Template::CSource,
            formatter: Some(format_c),
        },
        Artifact {
            path: config.c_header.clone(),
            template: Template::CHeader,
            formatter: Some(format_c),
        },
    ];

    let mut written: Vec<PathBuf> = Vec::new();
    for artifact in &artifacts {
        trace!("rendering {}", artifact.path.display());
        if let Err(err) = write_artifact(artifact, &view) {
            cleanup(&written);
            return Err(err);
        }
        written.push(artifact.path.clone());
    }
    debug!("generated {} artifacts", written.len());
    Ok(())
}

/// Force every record's derivation and merge all helper requirements.
fn build_view<'a>(
    config: &'a GenerateConfig,
    extraction: &'a Extraction,
) -> Result<View<'a>> {
    let options = NamingOptions {
        snake_case: config.snake_case,
    };
    let mut registry = HelperRegistry::new();

    let mut build = |decls: &[crate::extract::Declaration]| -> Result<Vec<SignatureRecord>> {
        let mut records = Vec::with_capacity(decls.len());
        for decl in decls {
            let (record, helpers) = SignatureRecord::build(decl.clone(), &options)?;
            registry.merge(helpers);
            records.push(record);
        }
        Ok(records)
    };

    let functions = build(&extraction.functions)?;
    let mut types = Vec::with_capacity(extraction.types.len());
    for binding in &extraction.types {
        types.push(TypeView {
            type_name: binding.type_name.clone(),
            doc_literal: quote_c_literal(&binding.doc, &binding.type_name)?,
            methods: build(&binding.methods)?,
            funcs: build(&binding.funcs)?,
        });
    }

    Ok(View {
        config,
        package: &extraction.package,
        functions,
        types,
        registry,
    })
}

fn write_artifact(artifact: &Artifact, view: &View) -> Result<()> {
    let text = match artifact.template {
        Template::RustBridge => render_rust(view),
        Template::CSource => render_c(view),
        Template::CHeader => render_header(view),
    };
    let text = match artifact.formatter {
        Some(formatter) => formatter(&text, &artifact.path)?,
        None => text,
    };
    if let Err(source) = fs::write(&artifact.path, text) {
        // The write may have left a partial file on this path.
        let _ = fs::remove_file(&artifact.path);
        return Err(BridgeError::Write {
            path: artifact.path.clone(),
            source,
        });
    }
    Ok(())
}

fn cleanup(written: &[PathBuf]) {
    for path in written {
        debug!("removing {}", path.display());
        if let Err(err) = fs::remove_file(path) {
            error!("failed to remove {}: {err}", path.display());
        }
    }
}

/// The Rust artifact must parse before it is written; a malformed render
/// is an emission failure, not something to hand to the external build.
fn format_rust(text: &str, path: &Path) -> Result<String> {
    if let Err(err) = syn::parse_file(text) {
        return Err(BridgeError::InvalidGenerated {
            path: path.to_path_buf(),
            message: err.to_string(),
        });
    }
    Ok(squeeze_blank_lines(text))
}

fn format_c(text: &str, _path: &Path) -> Result<String> {
    Ok(squeeze_blank_lines(text))
}

/// Collapse runs of blank lines and drop leading ones.
fn squeeze_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = true;
    for line in text.lines() {
        if line.trim().is_empty() {
            if !blank_run {
                out.push('\n');
            }
            blank_run = true;
        } else {
            out.push_str(line);
            out.push('\n');
            blank_run = false;
        }
    }
    out
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn header_guard(path: &Path) -> String {
    file_name(path)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Host-side call expression for a record.
fn call_expr(record: &SignatureRecord) -> String {
    let args = record
        .kwlist
        .join(", ");
    match (&record.decl.owner, &record.decl.receiver) {
        (Some(owner), Some(receiver)) => {
            let cast = if receiver.mutable {
                format!("&mut *(recv as *mut super::{owner})")
            } else {
                format!("&*(recv as *const super::{owner})")
            };
            format!("({cast}).{}({args})", record.decl.name)
        }
        (Some(owner), None) => format!("super::{owner}::{}({args})", record.decl.name),
        _ => format!("super::{}({args})", record.decl.name),
    }
}

fn render_rust(view: &View) -> String {
    let mut out = String::new();
    let w = &mut out;

    let _ = writeln!(
        w,
        "// Code generated by pybridge from package {}. DO NOT EDIT.",
        view.package
    );
    let _ = writeln!(
        w,
        "// Include this file as a sibling module of the exported items."
    );
    match view.config.tags.as_slice() {
        [] => {}
        [tag] => {
            let _ = writeln!(w, "#![cfg(feature = \"{tag}\")]");
        }
        tags => {
            let features: Vec<String> =
                tags.iter().map(|t| format!("feature = \"{t}\"")).collect();
            let _ = writeln!(w, "#![cfg(all({}))]", features.join(", "));
        }
    }
    let _ = writeln!(
        w,
        "#![allow(unused_imports, unused_variables, dead_code, non_snake_case, clippy::all)]"
    );
    let _ = writeln!(w);
    let _ = writeln!(w, "use std::collections::HashMap;");
    let _ = writeln!(
        w,
        "use std::os::raw::{{c_char, c_double, c_float, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulonglong, c_ushort, c_void}};"
    );
    let _ = writeln!(w);
    let _ = writeln!(w, "use pyo3_ffi::*;");
    let _ = writeln!(w);

    let handle_types = view.handle_types();
    if !handle_types.is_empty() {
        let _ = writeln!(w, "extern \"C\" {{");
        for name in &handle_types {
            let snake = to_snake_case(name);
            let _ = writeln!(
                w,
                "    fn pyexport_{snake}_wrap(handle: *mut c_void) -> *mut PyObject;"
            );
            let _ = writeln!(
                w,
                "    fn pyexport_{snake}_unwrap(obj: *mut PyObject) -> *mut c_void;"
            );
        }
        let _ = writeln!(w, "}}");
        let _ = writeln!(w);
    }

    for record in view.records() {
        render_rust_wrapper(w, record);
        let _ = writeln!(w);
    }

    for key in view.registry.iter() {
        let _ = writeln!(w, "{}", helper_source(key).trim());
        let _ = writeln!(w);
    }

    out
}

fn render_rust_wrapper(w: &mut String, record: &SignatureRecord) {
    let _ = writeln!(w, "#[no_mangle]");
    let _ = writeln!(
        w,
        "pub unsafe extern \"C\" fn {}({}) -> *mut PyObject {{",
        record.symbol,
        record.extern_params.join(", ")
    );
    for (name, expr) in record.kwlist.iter().zip(&record.arg_exprs) {
        let _ = writeln!(w, "    let {name} = {expr};");
    }
    if record.checks_arg_errors {
        let _ = writeln!(w, "    if !PyErr_Occurred().is_null() {{");
        let _ = writeln!(w, "        return std::ptr::null_mut();");
        let _ = writeln!(w, "    }}");
    }

    let call = call_expr(record);
    if record.decl.returns_error {
        let _ = writeln!(w, "    match {call} {{");
        if record.decl.ret.is_unit() {
            let _ = writeln!(w, "        Ok(()) => {},", record.ret_expr);
        } else {
            let _ = writeln!(w, "        Ok(v) => {},", record.ret_expr);
        }
        let _ = writeln!(w, "        Err(e) => py_raise_err(&e),");
        let _ = writeln!(w, "    }}");
    } else if record.decl.ret.is_unit() {
        let _ = writeln!(w, "    {call};");
        let _ = writeln!(w, "    {}", record.ret_expr);
    } else {
        let _ = writeln!(w, "    let v = {call};");
        let _ = writeln!(w, "    {}", record.ret_expr);
    }
    let _ = writeln!(w, "}}");
}

fn render_c(view: &View) -> String {
    let mut out = String::new();
    let w = &mut out;
    let module = &view.config.module_name;

    let _ = writeln!(
        w,
        "/* Code generated by pybridge from package {}. DO NOT EDIT. */",
        view.package
    );
    let _ = writeln!(w, "#define PY_SSIZE_T_CLEAN");
    let _ = writeln!(w, "#include <Python.h>");
    let _ = writeln!(w, "#include \"{}\"", file_name(&view.config.c_header));
    let _ = writeln!(w);

    let handle_types = view.handle_types();
    for name in &handle_types {
        let _ = writeln!(w, "typedef struct {{");
        let _ = writeln!(w, "    PyObject_HEAD");
        let _ = writeln!(w, "    void *handle;");
        let _ = writeln!(w, "}} PyTo_{name};");
        let _ = writeln!(w);
        let _ = writeln!(w, "static PyTypeObject PyTo_{name}_Type;");
        let _ = writeln!(w);
        let snake = to_snake_case(name);
        let _ = writeln!(w, "PyObject *pyexport_{snake}_wrap(void *handle) {{");
        let _ = writeln!(
            w,
            "    PyTo_{name} *obj = PyObject_New(PyTo_{name}, &PyTo_{name}_Type);"
        );
        let _ = writeln!(w, "    if (obj == NULL) {{");
        let _ = writeln!(w, "        return NULL;");
        let _ = writeln!(w, "    }}");
        let _ = writeln!(w, "    obj->handle = handle;");
        let _ = writeln!(w, "    return (PyObject *)obj;");
        let _ = writeln!(w, "}}");
        let _ = writeln!(w);
        let _ = writeln!(w, "void *pyexport_{snake}_unwrap(PyObject *obj) {{");
        let _ = writeln!(w, "    return ((PyTo_{name} *)obj)->handle;");
        let _ = writeln!(w, "}}");
        let _ = writeln!(w);
    }

    for record in view.records() {
        render_c_entry(w, record);
        let _ = writeln!(w);
    }

    for ty in &view.types {
        let _ = writeln!(w, "static PyMethodDef PyTo_{}_methods[] = {{", ty.type_name);
        for record in &ty.methods {
            let _ = writeln!(w, "    {},", method_def_entry(record));
        }
        let _ = writeln!(w, "    {{NULL, NULL, 0, NULL}},");
        let _ = writeln!(w, "}};");
        let _ = writeln!(w);
    }

    for name in &handle_types {
        let doc = view
            .types
            .iter()
            .find(|t| &t.type_name == name)
            .map(|t| t.doc_literal.clone())
            .unwrap_or_else(|| "\"\"".to_string());
        let has_methods = view
            .types
            .iter()
            .any(|t| &t.type_name == name && !t.methods.is_empty());
        let _ = writeln!(w, "static PyTypeObject PyTo_{name}_Type = {{");
        let _ = writeln!(w, "    PyVarObject_HEAD_INIT(NULL, 0)");
        let _ = writeln!(w, "    .tp_name = \"{module}.{name}\",");
        let _ = writeln!(w, "    .tp_basicsize = sizeof(PyTo_{name}),");
        let _ = writeln!(w, "    .tp_itemsize = 0,");
        let _ = writeln!(w, "    .tp_flags = Py_TPFLAGS_DEFAULT,");
        let _ = writeln!(w, "    .tp_doc = {doc},");
        if has_methods {
            let _ = writeln!(w, "    .tp_methods = PyTo_{name}_methods,");
        }
        let _ = writeln!(w, "}};");
        let _ = writeln!(w);
    }

    let _ = writeln!(w, "static PyMethodDef {module}_methods[] = {{");
    for record in view.module_level() {
        let _ = writeln!(w, "    {},", method_def_entry(record));
    }
    let _ = writeln!(w, "    {{NULL, NULL, 0, NULL}},");
    let _ = writeln!(w, "}};");
    let _ = writeln!(w);

    let _ = writeln!(w, "static struct PyModuleDef {module}_module = {{");
    let _ = writeln!(w, "    PyModuleDef_HEAD_INIT,");
    let _ = writeln!(w, "    \"{module}\",");
    let _ = writeln!(w, "    NULL,");
    let _ = writeln!(w, "    -1,");
    let _ = writeln!(w, "    {module}_methods,");
    let _ = writeln!(w, "}};");
    let _ = writeln!(w);

    let _ = writeln!(w, "PyMODINIT_FUNC PyInit_{module}(void) {{");
    let _ = writeln!(w, "    PyObject *module = PyModule_Create(&{module}_module);");
    let _ = writeln!(w, "    if (module == NULL) {{");
    let _ = writeln!(w, "        return NULL;");
    let _ = writeln!(w, "    }}");
    for name in &handle_types {
        let _ = writeln!(w, "    if (PyType_Ready(&PyTo_{name}_Type) < 0) {{");
        let _ = writeln!(w, "        return NULL;");
        let _ = writeln!(w, "    }}");
        let _ = writeln!(w, "    Py_INCREF(&PyTo_{name}_Type);");
        let _ = writeln!(
            w,
            "    PyModule_AddObject(module, \"{name}\", (PyObject *)&PyTo_{name}_Type);"
        );
    }
    let _ = writeln!(w, "    return module;");
    let _ = writeln!(w, "}}");

    out
}

fn method_def_entry(record: &SignatureRecord) -> String {
    format!(
        "{{\"{}\", (PyCFunction){}, {}, {}}}",
        record.py_name, record.c_name, record.method_flags, record.doc_literal
    )
}

fn render_c_entry(w: &mut String, record: &SignatureRecord) {
    let is_method = record.has_receiver();
    if record.method_flags == "METH_NOARGS" {
        let _ = writeln!(
            w,
            "static PyObject *{}(PyObject *self, PyObject *args) {{",
            record.c_name
        );
    } else {
        let _ = writeln!(
            w,
            "static PyObject *{}(PyObject *self, PyObject *args, PyObject *kwargs) {{",
            record.c_name
        );
    }

    if record.has_args() {
        let names: Vec<String> = record
            .kwlist
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect();
        let _ = writeln!(
            w,
            "    static char *kwlist[] = {{{}, NULL}};",
            names.join(", ")
        );
        for param in &record.c_params {
            let _ = writeln!(w, "    {param};");
        }
        let refs: Vec<String> = record.kwlist.iter().map(|name| format!("&{name}")).collect();
        let _ = writeln!(
            w,
            "    if (!PyArg_ParseTupleAndKeywords(args, kwargs, \"{}\", kwlist, {})) {{",
            record.format_string,
            refs.join(", ")
        );
        let _ = writeln!(w, "        return NULL;");
        let _ = writeln!(w, "    }}");
    }

    let owner = record.decl.owner.as_deref().unwrap_or_default();
    let mut call_args: Vec<String> = Vec::new();
    if is_method {
        call_args.push(format!("((PyTo_{owner} *)self)->handle"));
    }
    call_args.extend(record.kwlist.iter().cloned());
    let _ = writeln!(w, "    return {}({});", record.symbol, call_args.join(", "));
    let _ = writeln!(w, "}}");
}

fn render_header(view: &View) -> String {
    let mut out = String::new();
    let w = &mut out;
    let guard = header_guard(&view.config.c_header);

    let _ = writeln!(
        w,
        "/* Code generated by pybridge from package {}. DO NOT EDIT. */",
        view.package
    );
    let _ = writeln!(w, "#ifndef {guard}");
    let _ = writeln!(w, "#define {guard}");
    let _ = writeln!(w);
    let _ = writeln!(w, "#define PY_SSIZE_T_CLEAN");
    let _ = writeln!(w, "#include <Python.h>");
    let _ = writeln!(w);

    for record in view.records() {
        let mut params: Vec<String> = Vec::new();
        if record.has_receiver() {
            params.push("void *recv".to_string());
        }
        params.extend(record.c_params.iter().cloned());
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        let _ = writeln!(w, "PyObject *{}({});", record.symbol, params);
    }

    let handle_types = view.handle_types();
    if !handle_types.is_empty() {
        let _ = writeln!(w);
        for name in &handle_types {
            let snake = to_snake_case(name);
            let _ = writeln!(w, "PyObject *pyexport_{snake}_wrap(void *handle);");
            let _ = writeln!(w, "void *pyexport_{snake}_unwrap(PyObject *obj);");
        }
    }

    let _ = writeln!(w);
    let _ = writeln!(w, "#endif /* {guard} */");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use std::path::PathBuf;

    fn extraction(source: &str) -> Extraction {
        let mut extractor = Extractor::new(false);
        extractor
            .ingest(source, &PathBuf::from("test.rs"), "crate")
            .unwrap();
        extractor.finish()
    }

    fn config_in(dir: &Path) -> GenerateConfig {
        GenerateConfig {
            output_dir: Some(dir.to_path_buf()),
            ..GenerateConfig::default()
        }
        .resolved()
        .unwrap()
    }

    const SAMPLE: &str = r#"
        /// py:export
        /// Adds two numbers.
        pub fn Add(a: i64, b: i64) -> i64 { a + b }

        /// py:export
        pub fn Fails(v: i64) -> Result<i64, String> { Ok(v) }
    "#;

    #[test]
    fn test_zero_exports_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let extraction = extraction("pub fn unmarked() {}");
        let err = generate(&config, &extraction).unwrap_err();
        assert!(matches!(err, BridgeError::NoExports), "{err}");
        assert!(!config.rust_source.exists());
    }

    #[test]
    fn test_generates_three_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        generate(&config, &extraction(SAMPLE)).unwrap();

        let rust = fs::read_to_string(&config.rust_source).unwrap();
        let c = fs::read_to_string(&config.c_source).unwrap();
        let header = fs::read_to_string(&config.c_header).unwrap();

        assert!(rust.contains("rsexport_add"));
        assert!(rust.contains("py_from_i64"));
        assert!(c.contains("pyexport_add"));
        assert!(c.contains("PyInit_rsmodule"));
        assert!(c.contains("\"LL\""));
        assert!(header.contains("PyObject *rsexport_add(long long a, long long b);"));
    }

    #[test]
    fn test_error_path_is_exclusive_with_value_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        generate(&config, &extraction(SAMPLE)).unwrap();
        let rust = fs::read_to_string(&config.rust_source).unwrap();

        let wrapper = rust
            .split("fn rsexport_fails")
            .nth(1)
            .and_then(|rest| rest.split("\n}\n").next())
            .expect("wrapper for rsexport_fails");
        assert!(wrapper.contains("Ok(v) => py_from_i64(v as i64)"));
        assert!(wrapper.contains("Err(e) => py_raise_err(&e)"));
    }

    #[test]
    fn test_generated_rust_parses() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        generate(&config, &extraction(SAMPLE)).unwrap();
        let rust = fs::read_to_string(&config.rust_source).unwrap();
        syn::parse_file(&rust).unwrap();
    }

    #[test]
    fn test_determinism_across_runs() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let config_a = config_in(dir_a.path());
        let config_b = config_in(dir_b.path());
        let source = r#"
            /// py:export
            pub fn first(m: HashMap<String, i64>) {}

            /// py:export
            pub fn second(m: HashMap<String, i64>) -> Vec<f64> { Vec::new() }
        "#;
        generate(&config_a, &extraction(source)).unwrap();
        generate(&config_b, &extraction(source)).unwrap();

        for (a, b) in config_a
            .artifact_paths()
            .iter()
            .zip(config_b.artifact_paths())
        {
            assert_eq!(
                fs::read_to_string(a).unwrap(),
                fs::read_to_string(b).unwrap()
            );
        }
    }

    #[test]
    fn test_helper_dedup_across_declarations() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let source = r#"
            /// py:export
            pub fn first(m: HashMap<String, i64>) {}

            /// py:export
            pub fn second(m: HashMap<String, i64>) {}
        "#;
        generate(&config, &extraction(source)).unwrap();
        let rust = fs::read_to_string(&config.rust_source).unwrap();

        // One map converter and one helper per key/value kind.
        assert_eq!(rust.matches("unsafe fn py_map_from").count(), 1);
        assert_eq!(rust.matches("unsafe fn py_as_string").count(), 1);
        assert_eq!(rust.matches("unsafe fn py_as_i64").count(), 1);
    }

    #[test]
    fn test_late_failure_removes_earlier_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerateConfig {
            rust_source: dir.path().join("pyexports.rs"),
            // Unwritable: the parent directory does not exist.
            c_source: dir.path().join("missing").join("pyexports.c"),
            c_header: dir.path().join("pyexports.h"),
            ..GenerateConfig::default()
        };
        let err = generate(&config, &extraction(SAMPLE)).unwrap_err();
        assert!(matches!(err, BridgeError::Write { .. }), "{err}");
        assert!(
            !config.rust_source.exists(),
            "rust artifact should be rolled back"
        );
        assert!(!config.c_header.exists());
    }

    #[test]
    fn test_methods_render_type_object_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let source = r#"
            /// A running tally.
            pub struct Counter { n: i64 }

            impl Counter {
                /// py:export
                pub fn new() -> Box<Counter> { Box::new(Counter { n: 0 }) }

                /// py:export
                pub fn increment(&mut self, step: i64) -> i64 { self.n += step; self.n }
            }
        "#;
        generate(&config, &extraction(source)).unwrap();
        let rust = fs::read_to_string(&config.rust_source).unwrap();
        let c = fs::read_to_string(&config.c_source).unwrap();
        let header = fs::read_to_string(&config.c_header).unwrap();

        assert!(c.contains("typedef struct"));
        assert!(c.contains("PyTo_Counter_methods"));
        assert!(c.contains(".tp_name = \"rsmodule.Counter\""));
        assert!(c.contains("((PyTo_Counter *)self)->handle"));
        assert!(c.contains("\"counter_new\""));
        assert!(header.contains("PyObject *pyexport_counter_wrap(void *handle);"));
        assert!(rust.contains("fn rsexport_counter_increment(recv: *mut c_void, step: c_longlong)"));
        assert!(rust.contains("(&mut *(recv as *mut super::Counter)).increment(step)"));
        assert!(rust.contains("counter_to_py_object(Box::into_raw(v) as *mut c_void)"));
        syn::parse_file(&rust).unwrap();
    }

    #[test]
    fn test_tags_gate_rust_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerateConfig {
            tags: vec!["python".to_string()],
            output_dir: Some(dir.path().to_path_buf()),
            ..GenerateConfig::default()
        }
        .resolved()
        .unwrap();
        generate(&config, &extraction(SAMPLE)).unwrap();
        let rust = fs::read_to_string(&config.rust_source).unwrap();
        assert!(rust.contains("#![cfg(feature = \"python\")]"));
    }

    #[test]
    fn test_squeeze_blank_lines() {
        assert_eq!(squeeze_blank_lines("a\n\n\n\nb\n"), "a\n\nb\n");
        assert_eq!(squeeze_blank_lines("\n\na\n"), "a\n");
    }
}
