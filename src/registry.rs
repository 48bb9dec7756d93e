//! Deduplicated accumulator of converter helper requirements.
//!
//! The signature builder reports every helper its conversion expressions
//! reference; the code generator merges them here and emits the
//! definitions in sorted key order, so the generated output is
//! independent of discovery order and each helper appears exactly once no
//! matter how many declarations need it.

use std::collections::BTreeSet;

/// Identity of one emitted helper. The derived ordering is the emission
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum HelperKey {
    /// `None` singleton with the reference count bumped.
    PyNone,
    FromBool,
    FromI64,
    FromU64,
    FromF64,
    FromComplex32,
    FromComplex64,
    FromStr,
    FromBytes,
    /// List from a `Vec`, element closure applied in order.
    FromVec,
    /// Dict from a `HashMap`, key/value closures applied pairwise.
    FromMap,
    AsBool,
    AsI64,
    AsU64,
    AsF64,
    AsComplex32,
    AsComplex64,
    AsString,
    AsBytes,
    /// `Vec` from a list, element closure applied in order.
    VecFrom,
    /// `HashMap` from a dict, key/value closures applied pairwise.
    MapFrom,
    /// Raise a Python exception from a host error's `Display` output.
    RaiseErr,
    ComplexFromC32,
    ComplexFromC64,
    CStrToString,
    CStrToStr,
    /// Wrap an owned pointer to the named type into its Python object.
    Wrap(String),
    /// Extract the handle pointer back out of the Python object.
    Unwrap(String),
}

impl HelperKey {
    /// Named host type for the per-type handle helpers.
    pub fn handle_type(&self) -> Option<&str> {
        match self {
            HelperKey::Wrap(name) | HelperKey::Unwrap(name) => Some(name),
            _ => None,
        }
    }
}

/// Accumulator of helper requirements, deduplicated and iterated in
/// sorted order. Scoped to one generator invocation.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    keys: BTreeSet<HelperKey>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, keys: impl IntoIterator<Item = HelperKey>) {
        self.keys.extend(keys);
    }

    pub fn contains(&self, key: &HelperKey) -> bool {
        self.keys.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HelperKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Distinct named types needing wrap/unwrap support, sorted.
    pub fn handle_types(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.keys.iter().filter_map(HelperKey::handle_type).collect();
        set.into_iter().collect()
    }
}

/// Rust source of one helper definition in the generated bridge.
///
/// The bodies call `pyo3_ffi` directly; the generated file imports it
/// wholesale, so the snippets stay unqualified like handwritten FFI code.
pub fn helper_source(key: &HelperKey) -> String {
    match key {
        HelperKey::PyNone => r#"
unsafe fn py_none() -> *mut PyObject {
    let none = Py_None();
    Py_IncRef(none);
    none
}
"#
        .to_string(),
        HelperKey::FromBool => r#"
unsafe fn py_from_bool(v: bool) -> *mut PyObject {
    PyBool_FromLong(v as c_long)
}
"#
        .to_string(),
        HelperKey::FromI64 => r#"
unsafe fn py_from_i64(v: i64) -> *mut PyObject {
    PyLong_FromLongLong(v as c_longlong)
}
"#
        .to_string(),
        HelperKey::FromU64 => r#"
unsafe fn py_from_u64(v: u64) -> *mut PyObject {
    PyLong_FromUnsignedLongLong(v as c_ulonglong)
}
"#
        .to_string(),
        HelperKey::FromF64 => r#"
unsafe fn py_from_f64(v: f64) -> *mut PyObject {
    PyFloat_FromDouble(v)
}
"#
        .to_string(),
        HelperKey::FromComplex32 => r#"
unsafe fn py_from_complex32(v: num_complex::Complex32) -> *mut PyObject {
    PyComplex_FromDoubles(v.re as f64, v.im as f64)
}
"#
        .to_string(),
        HelperKey::FromComplex64 => r#"
unsafe fn py_from_complex64(v: num_complex::Complex64) -> *mut PyObject {
    PyComplex_FromDoubles(v.re, v.im)
}
"#
        .to_string(),
        HelperKey::FromStr => r#"
unsafe fn py_from_str(v: &str) -> *mut PyObject {
    PyUnicode_FromStringAndSize(v.as_ptr() as *const c_char, v.len() as Py_ssize_t)
}
"#
        .to_string(),
        HelperKey::FromBytes => r#"
unsafe fn py_from_bytes(v: &[u8]) -> *mut PyObject {
    PyBytes_FromStringAndSize(v.as_ptr() as *const c_char, v.len() as Py_ssize_t)
}
"#
        .to_string(),
        HelperKey::FromVec => r#"
unsafe fn py_from_vec<T>(v: Vec<T>, f: impl Fn(T) -> *mut PyObject) -> *mut PyObject {
    let list = PyList_New(v.len() as Py_ssize_t);
    if list.is_null() {
        return list;
    }
    for (i, e) in v.into_iter().enumerate() {
        PyList_SetItem(list, i as Py_ssize_t, f(e));
    }
    list
}
"#
        .to_string(),
        HelperKey::FromMap => r#"
unsafe fn py_from_map<K, V>(
    v: HashMap<K, V>,
    fk: impl Fn(K) -> *mut PyObject,
    fv: impl Fn(V) -> *mut PyObject,
) -> *mut PyObject {
    let dict = PyDict_New();
    if dict.is_null() {
        return dict;
    }
    for (k, x) in v {
        let key = fk(k);
        let value = fv(x);
        PyDict_SetItem(dict, key, value);
        Py_DecRef(key);
        Py_DecRef(value);
    }
    dict
}
"#
        .to_string(),
        HelperKey::AsBool => r#"
unsafe fn py_as_bool(o: *mut PyObject) -> bool {
    PyObject_IsTrue(o) == 1
}
"#
        .to_string(),
        HelperKey::AsI64 => r#"
unsafe fn py_as_i64(o: *mut PyObject) -> i64 {
    PyLong_AsLongLong(o) as i64
}
"#
        .to_string(),
        HelperKey::AsU64 => r#"
unsafe fn py_as_u64(o: *mut PyObject) -> u64 {
    PyLong_AsUnsignedLongLong(o) as u64
}
"#
        .to_string(),
        HelperKey::AsF64 => r#"
unsafe fn py_as_f64(o: *mut PyObject) -> f64 {
    PyFloat_AsDouble(o)
}
"#
        .to_string(),
        HelperKey::AsComplex32 => r#"
unsafe fn py_as_complex32(o: *mut PyObject) -> num_complex::Complex32 {
    num_complex::Complex32::new(
        PyComplex_RealAsDouble(o) as f32,
        PyComplex_ImagAsDouble(o) as f32,
    )
}
"#
        .to_string(),
        HelperKey::AsComplex64 => r#"
unsafe fn py_as_complex64(o: *mut PyObject) -> num_complex::Complex64 {
    num_complex::Complex64::new(PyComplex_RealAsDouble(o), PyComplex_ImagAsDouble(o))
}
"#
        .to_string(),
        HelperKey::AsString => r#"
unsafe fn py_as_string(o: *mut PyObject) -> String {
    let mut size: Py_ssize_t = 0;
    let data = PyUnicode_AsUTF8AndSize(o, &mut size);
    if data.is_null() {
        return String::new();
    }
    let bytes = std::slice::from_raw_parts(data as *const u8, size as usize);
    String::from_utf8_lossy(bytes).into_owned()
}
"#
        .to_string(),
        HelperKey::AsBytes => r#"
unsafe fn py_as_bytes(o: *mut PyObject) -> Vec<u8> {
    let mut data: *mut c_char = std::ptr::null_mut();
    let mut size: Py_ssize_t = 0;
    if PyBytes_AsStringAndSize(o, &mut data, &mut size) != 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(data as *const u8, size as usize).to_vec()
}
"#
        .to_string(),
        HelperKey::VecFrom => r#"
unsafe fn py_vec_from<T>(o: *mut PyObject, f: impl Fn(*mut PyObject) -> T) -> Vec<T> {
    let len = PyList_Size(o);
    if len < 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        out.push(f(PyList_GetItem(o, i)));
    }
    out
}
"#
        .to_string(),
        HelperKey::MapFrom => r#"
unsafe fn py_map_from<K: Eq + std::hash::Hash, V>(
    o: *mut PyObject,
    fk: impl Fn(*mut PyObject) -> K,
    fv: impl Fn(*mut PyObject) -> V,
) -> HashMap<K, V> {
    let mut out = HashMap::new();
    let mut pos: Py_ssize_t = 0;
    let mut key: *mut PyObject = std::ptr::null_mut();
    let mut value: *mut PyObject = std::ptr::null_mut();
    while PyDict_Next(o, &mut pos, &mut key, &mut value) != 0 {
        out.insert(fk(key), fv(value));
    }
    out
}
"#
        .to_string(),
        HelperKey::RaiseErr => r#"
unsafe fn py_raise_err<E: std::fmt::Display>(err: &E) -> *mut PyObject {
    let text = err.to_string().replace('\0', " ");
    let message = std::ffi::CString::new(text)
        .unwrap_or_else(|_| std::ffi::CString::new("error").unwrap());
    PyErr_SetString(PyExc_RuntimeError, message.as_ptr());
    std::ptr::null_mut()
}
"#
        .to_string(),
        HelperKey::ComplexFromC32 => r#"
unsafe fn py_complex_to_complex32(v: Py_complex) -> num_complex::Complex32 {
    num_complex::Complex32::new(v.real as f32, v.imag as f32)
}
"#
        .to_string(),
        HelperKey::ComplexFromC64 => r#"
unsafe fn py_complex_to_complex64(v: Py_complex) -> num_complex::Complex64 {
    num_complex::Complex64::new(v.real, v.imag)
}
"#
        .to_string(),
        HelperKey::CStrToString => r#"
unsafe fn c_str_to_string(p: *const c_char) -> String {
    if p.is_null() {
        return String::new();
    }
    std::ffi::CStr::from_ptr(p).to_string_lossy().into_owned()
}
"#
        .to_string(),
        HelperKey::CStrToStr => r#"
unsafe fn c_str_to_str<'a>(p: *const c_char) -> &'a str {
    if p.is_null() {
        return "";
    }
    std::ffi::CStr::from_ptr(p).to_str().unwrap_or("")
}
"#
        .to_string(),
        HelperKey::Wrap(name) => {
            let snake = crate::signature::to_snake_case(name);
            format!(
                r#"
unsafe fn {snake}_to_py_object(handle: *mut c_void) -> *mut PyObject {{
    pyexport_{snake}_wrap(handle)
}}
"#
            )
        }
        HelperKey::Unwrap(name) => {
            let snake = crate::signature::to_snake_case(name);
            format!(
                r#"
unsafe fn {snake}_from_py_object(obj: *mut PyObject) -> *mut c_void {{
    pyexport_{snake}_unwrap(obj)
}}
"#
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_deduplicates() {
        let mut registry = HelperRegistry::new();
        registry.merge([HelperKey::AsString, HelperKey::AsI64, HelperKey::MapFrom]);
        registry.merge([HelperKey::AsString, HelperKey::AsI64, HelperKey::MapFrom]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_iteration_is_sorted_regardless_of_discovery_order() {
        let mut forward = HelperRegistry::new();
        forward.merge([HelperKey::FromI64, HelperKey::AsString, HelperKey::PyNone]);
        let mut reverse = HelperRegistry::new();
        reverse.merge([HelperKey::PyNone, HelperKey::AsString, HelperKey::FromI64]);

        let a: Vec<_> = forward.iter().collect();
        let b: Vec<_> = reverse.iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.first(), Some(&&HelperKey::PyNone));
    }

    #[test]
    fn test_wrap_keys_sort_by_type_name() {
        let mut registry = HelperRegistry::new();
        registry.merge([
            HelperKey::Wrap("Zeta".to_string()),
            HelperKey::Wrap("Alpha".to_string()),
        ]);
        let keys: Vec<_> = registry.iter().collect();
        assert_eq!(keys[0], &HelperKey::Wrap("Alpha".to_string()));
    }

    #[test]
    fn test_handle_types_collects_both_directions() {
        let mut registry = HelperRegistry::new();
        registry.merge([
            HelperKey::Wrap("Counter".to_string()),
            HelperKey::Unwrap("Counter".to_string()),
            HelperKey::Unwrap("Gauge".to_string()),
        ]);
        assert_eq!(registry.handle_types(), vec!["Counter", "Gauge"]);
    }

    #[test]
    fn test_every_helper_has_a_source() {
        let keys = [
            HelperKey::PyNone,
            HelperKey::FromBool,
            HelperKey::FromI64,
            HelperKey::FromU64,
            HelperKey::FromF64,
            HelperKey::FromComplex32,
            HelperKey::FromComplex64,
            HelperKey::FromStr,
            HelperKey::FromBytes,
            HelperKey::FromVec,
            HelperKey::FromMap,
            HelperKey::AsBool,
            HelperKey::AsI64,
            HelperKey::AsU64,
            HelperKey::AsF64,
            HelperKey::AsComplex32,
            HelperKey::AsComplex64,
            HelperKey::AsString,
            HelperKey::AsBytes,
            HelperKey::VecFrom,
            HelperKey::MapFrom,
            HelperKey::RaiseErr,
            HelperKey::ComplexFromC32,
            HelperKey::ComplexFromC64,
            HelperKey::CStrToString,
            HelperKey::CStrToStr,
            HelperKey::Wrap("Counter".to_string()),
            HelperKey::Unwrap("Counter".to_string()),
        ];
        for key in keys {
            let source = helper_source(&key);
            assert!(source.contains("unsafe fn"), "{key:?}");
        }
    }
}
