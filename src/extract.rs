//! Declaration extraction from Rust source files.
//!
//! Reads each input file, detects the owning Cargo package, and collects
//! the exportable declarations: top-level functions, inherent-impl methods
//! and associated functions. All input files must belong to the same
//! package; the first mismatch aborts the run naming both packages.
//!
//! A function is included when its doc comment contains the `py:export`
//! marker, when its sole return type is `*mut PyObject` (auto-export), or
//! when export-all mode is on. Everything else is skipped with a trace
//! log. Inclusion is decided before any type resolution, so unexported
//! declarations may use unsupported types freely.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::errors::{BridgeError, Result};
use crate::types::{self, Kind, TypeDescriptor};

/// Marker token inside a doc comment flagging a declaration for export.
pub const EXPORT_MARKER: &str = "py:export";

/// Package name used for input files without a surrounding Cargo package.
const FALLBACK_PACKAGE: &str = "crate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub type_name: String,
    pub mutable: bool,
}

/// A parsed function or method signature. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub params: Vec<Param>,
    /// Return descriptor; [`Kind::Unit`] when the function returns nothing
    /// or only an error.
    pub ret: TypeDescriptor,
    /// True for `Result<T, E>` returns: the error flag position fires the
    /// error-raising path instead of the value path.
    pub returns_error: bool,
    pub receiver: Option<Receiver>,
    /// Owning type for methods and associated functions.
    pub owner: Option<String>,
    pub doc: String,
    /// True when the export came from an explicit marker rather than the
    /// auto-export rule or export-all mode.
    pub marked: bool,
}

impl Declaration {
    /// Diagnostic name: `Counter::increment` for methods, bare name
    /// otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}::{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Declarations grouped under a named type: methods (self receiver) and
/// constructor-style functions returning a handle to the type.
#[derive(Debug, Clone, Default)]
pub struct TypeBinding {
    pub type_name: String,
    pub doc: String,
    pub methods: Vec<Declaration>,
    pub funcs: Vec<Declaration>,
}

/// Result of one extraction pass over all input files.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub package: String,
    pub functions: Vec<Declaration>,
    pub types: Vec<TypeBinding>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.types.iter().all(|t| t.methods.is_empty() && t.funcs.is_empty())
    }
}

#[derive(Debug)]
struct LocalType {
    name: String,
    doc: String,
}

/// Accumulates declarations across input files, then groups them.
pub struct Extractor {
    export_all: bool,
    package: Option<String>,
    functions: Vec<Declaration>,
    impl_decls: Vec<Declaration>,
    local_types: Vec<LocalType>,
}

/// Extract declarations from a list of source files.
pub fn extract_files(files: &[PathBuf], export_all: bool) -> Result<Extraction> {
    let mut extractor = Extractor::new(export_all);
    for path in files {
        extractor.process_file(path)?;
    }
    Ok(extractor.finish())
}

impl Extractor {
    pub fn new(export_all: bool) -> Self {
        Self {
            export_all,
            package: None,
            functions: Vec::new(),
            impl_decls: Vec::new(),
            local_types: Vec::new(),
        }
    }

    pub fn process_file(&mut self, path: &Path) -> Result<()> {
        trace!("processing {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| BridgeError::io(path, e))?;
        let package = detect_package(path);
        self.ingest(&content, path, &package)
    }

    /// Ingest one parsed source file attributed to `package`.
    pub fn ingest(&mut self, source: &str, path: &Path, package: &str) -> Result<()> {
        match &self.package {
            None => {
                debug!("detected package '{package}'");
                self.package = Some(package.to_string());
            }
            Some(expected) if expected != package => {
                return Err(BridgeError::PackageMismatch {
                    expected: expected.clone(),
                    found: package.to_string(),
                    path: path.to_path_buf(),
                });
            }
            Some(_) => {}
        }

        let file =
            syn::parse_file(source).map_err(|e| BridgeError::parse(path, e.to_string()))?;

        for item in &file.items {
            match item {
                syn::Item::Fn(f) if is_public(&f.vis) => {
                    if let Some(decl) = self.process_fn(None, &f.sig, &f.attrs)? {
                        debug!("exporting {}", decl.name);
                        self.functions.push(decl);
                    }
                }
                syn::Item::Struct(s) if is_public(&s.vis) => {
                    let (doc, _) = process_doc(&doc_lines(&s.attrs));
                    self.local_types.push(LocalType {
                        name: s.ident.to_string(),
                        doc,
                    });
                }
                syn::Item::Enum(e) if is_public(&e.vis) => {
                    let (doc, _) = process_doc(&doc_lines(&e.attrs));
                    self.local_types.push(LocalType {
                        name: e.ident.to_string(),
                        doc,
                    });
                }
                syn::Item::Impl(imp) => self.process_impl(imp)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn process_impl(&mut self, imp: &syn::ItemImpl) -> Result<()> {
        if imp.trait_.is_some() || !imp.generics.params.is_empty() {
            return Ok(());
        }
        let Some(owner) = impl_target(&imp.self_ty) else {
            return Ok(());
        };
        for item in &imp.items {
            let syn::ImplItem::Fn(method) = item else {
                continue;
            };
            if !is_public(&method.vis) {
                continue;
            }
            if let Some(decl) = self.process_fn(Some(&owner), &method.sig, &method.attrs)? {
                debug!("exporting {}.{}", owner, decl.name);
                self.impl_decls.push(decl);
            }
        }
        Ok(())
    }

    fn process_fn(
        &self,
        owner: Option<&str>,
        sig: &syn::Signature,
        attrs: &[syn::Attribute],
    ) -> Result<Option<Declaration>> {
        let name = sig.ident.to_string();
        let qualified = match owner {
            Some(owner) => format!("{owner}::{name}"),
            None => name.clone(),
        };

        if !sig.generics.params.is_empty() || sig.asyncness.is_some() {
            debug!("skipping {qualified}: generic or async signatures are not exportable");
            return Ok(None);
        }

        let (doc, marked) = process_doc(&doc_lines(attrs));
        let auto = sole_py_object_return(&sig.output);
        if !(self.export_all || marked || auto) {
            trace!("skipping {qualified}");
            return Ok(None);
        }

        let mut receiver = None;
        let mut params = Vec::new();
        for arg in &sig.inputs {
            match arg {
                syn::FnArg::Receiver(recv) => {
                    let owner = owner.unwrap_or("Self");
                    if recv.reference.is_none() {
                        return Err(BridgeError::ValueReceiver {
                            declaration: qualified,
                            receiver: owner.to_string(),
                        });
                    }
                    receiver = Some(Receiver {
                        type_name: owner.to_string(),
                        mutable: recv.mutability.is_some(),
                    });
                }
                syn::FnArg::Typed(typed) => {
                    let ty = types::resolve(&typed.ty).map_err(|e| {
                        BridgeError::unsupported_type(qualified.as_str(), e.text)
                    })?;
                    params.push(Param {
                        name: pat_name(&typed.pat, params.len()),
                        ty,
                    });
                }
            }
        }

        let (ret, returns_error) = self.return_shape(&qualified, &sig.output)?;

        Ok(Some(Declaration {
            name,
            params,
            ret,
            returns_error,
            receiver,
            owner: owner.map(str::to_string),
            doc,
            marked,
        }))
    }

    /// Classify the return: nothing, one value, or `Result<T, E>` where
    /// the `E` position is the error flag. Tuple returns are the invalid
    /// arity shapes.
    fn return_shape(
        &self,
        qualified: &str,
        output: &syn::ReturnType,
    ) -> Result<(TypeDescriptor, bool)> {
        let ty = match output {
            syn::ReturnType::Default => return Ok((TypeDescriptor::unit(), false)),
            syn::ReturnType::Type(_, ty) => ty.as_ref(),
        };

        if let syn::Type::Tuple(tuple) = ty {
            if tuple.elems.is_empty() {
                return Ok((TypeDescriptor::unit(), false));
            }
            if tuple.elems.len() == 2 {
                return Err(BridgeError::SecondReturnNotError {
                    declaration: qualified.to_string(),
                    ty: types::type_text(&tuple.elems[1]),
                });
            }
            return Err(BridgeError::ReturnArity {
                declaration: qualified.to_string(),
                arity: tuple.elems.len(),
            });
        }

        if let Some(ok_ty) = result_ok_type(ty) {
            let ret = match ok_ty {
                Some(syn::Type::Tuple(tuple)) if tuple.elems.is_empty() => {
                    TypeDescriptor::unit()
                }
                Some(inner) => types::resolve(inner).map_err(|e| {
                    BridgeError::unsupported_type(qualified, e.text)
                })?,
                None => TypeDescriptor::unit(),
            };
            return Ok((ret, true));
        }

        let ret = types::resolve(ty)
            .map_err(|e| BridgeError::unsupported_type(qualified, e.text))?;
        Ok((ret, false))
    }

    /// Group accumulated declarations: methods and associated functions
    /// under their owning type, marked top-level functions returning a
    /// handle to a known local type under that type as constructor-style
    /// functions, everything else stays module-level.
    pub fn finish(self) -> Extraction {
        let mut bindings: BTreeMap<String, TypeBinding> = BTreeMap::new();
        let type_doc = |name: &str| {
            self.local_types
                .iter()
                .find(|t| t.name == name)
                .map(|t| t.doc.clone())
                .unwrap_or_default()
        };

        for decl in &self.impl_decls {
            let owner = decl.owner.clone().unwrap_or_default();
            let binding = bindings.entry(owner.clone()).or_insert_with(|| TypeBinding {
                type_name: owner.clone(),
                doc: type_doc(&owner),
                ..TypeBinding::default()
            });
            if decl.receiver.is_some() {
                binding.methods.push(decl.clone());
            } else {
                binding.funcs.push(decl.clone());
            }
        }

        let mut functions = Vec::new();
        for decl in self.functions {
            let constructor_for = match (&decl.receiver, decl.ret.kind) {
                (None, Kind::Handle) => decl
                    .ret
                    .type_name
                    .as_deref()
                    .filter(|name| self.local_types.iter().any(|t| &t.name == name))
                    .map(str::to_string),
                _ => None,
            };
            match constructor_for {
                Some(owner) => {
                    let binding =
                        bindings.entry(owner.clone()).or_insert_with(|| TypeBinding {
                            type_name: owner.clone(),
                            doc: type_doc(&owner),
                            ..TypeBinding::default()
                        });
                    binding.funcs.push(decl);
                }
                None => functions.push(decl),
            }
        }

        Extraction {
            package: self.package.unwrap_or_else(|| FALLBACK_PACKAGE.to_string()),
            functions,
            types: bindings.into_values().collect(),
        }
    }
}

fn is_public(vis: &syn::Visibility) -> bool {
    matches!(vis, syn::Visibility::Public(_))
}

/// Named target of an inherent impl block, or `None` for anything the
/// closed vocabulary cannot bind methods to.
fn impl_target(self_ty: &syn::Type) -> Option<String> {
    let syn::Type::Path(path) = self_ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if !segment.arguments.is_none() {
        return None;
    }
    Some(segment.ident.to_string())
}

fn pat_name(pat: &syn::Pat, index: usize) -> String {
    match pat {
        syn::Pat::Ident(ident) => ident.ident.to_string(),
        _ => format!("arg{index}"),
    }
}

fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Split doc lines into the doc body and the export flag, stripping
/// marker lines from the body.
fn process_doc(lines: &[String]) -> (String, bool) {
    let mut body = String::new();
    let mut marked = false;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with(EXPORT_MARKER) {
            marked = true;
        } else {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(trimmed);
        }
    }
    (body.trim().to_string(), marked)
}

/// True when the function's sole return type is `*mut PyObject`, which
/// auto-exports it without the marker.
fn sole_py_object_return(output: &syn::ReturnType) -> bool {
    match output {
        syn::ReturnType::Type(_, ty) => types::is_py_object_ptr(ty),
        syn::ReturnType::Default => false,
    }
}

/// Returns `Some(ok_type)` when the type is a `Result` spelling; the
/// inner option is `None` for single-argument aliases like
/// `anyhow::Result<T>` with the value position elided entirely.
fn result_ok_type(ty: &syn::Type) -> Option<Option<&syn::Type>> {
    let syn::Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => {
            let mut types = args.args.iter().filter_map(|a| match a {
                syn::GenericArgument::Type(t) => Some(t),
                _ => None,
            });
            types.next().map(Some)
        }
        _ => None,
    }
}

/// Nearest-ancestor Cargo package name for an input file.
fn detect_package(path: &Path) -> String {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    for dir in resolved.ancestors().skip(1) {
        let manifest = dir.join("Cargo.toml");
        if !manifest.is_file() {
            continue;
        }
        if let Some(name) = manifest_package_name(&manifest) {
            return name;
        }
        // A workspace manifest without [package]; keep walking up.
    }
    FALLBACK_PACKAGE.to_string()
}

fn manifest_package_name(manifest: &Path) -> Option<String> {
    let content = fs::read_to_string(manifest).ok()?;
    let value: toml::Value = content.parse().ok()?;
    value
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
