//! Deterministic cache keys.
//!
//! A key is the optional prefix followed by the SHA-256 hex digest of a
//! canonical JSON document describing one invocation:
//!
//! ```text
//! {"args":[...],"func":"module::name","kwargs":[["name",value],...]}
//! ```
//!
//! Object members are sorted at every depth and keyword arguments are kept
//! sorted by name, so the same inputs always hash to the same key.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;

/// Builds a [`FunctionId`] for a function defined in the calling module.
///
/// ```ignore
/// let id = function_id!("find_user");
/// assert_eq!(id.to_string(), format!("{}::find_user", module_path!()));
/// ```
#[macro_export]
macro_rules! function_id {
    ($name:expr) => {
        $crate::FunctionId::new(module_path!(), $name)
    };
}

/// Fully-qualified identity of a memoized function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId {
    module: String,
    name: String,
}

impl FunctionId {
    /// Creates a function identity from a module path and a name.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Module path part.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Function name part.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// A cache key as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the key text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalised arguments of one invocation.
///
/// Values that cannot be represented as JSON are recorded as an
/// `"<opaque:TYPE>"` marker and mark the whole call as opaque; opaque calls
/// are never looked up or stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
    opaque: bool,
}

impl CallArgs {
    /// Empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a positional argument.
    #[must_use]
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.push_arg(value);
        self
    }

    /// Adds a keyword argument. A repeated name replaces the earlier value.
    #[must_use]
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.push_kwarg(name, value);
        self
    }

    /// Appends a positional argument in place.
    pub fn push_arg<T: Serialize + ?Sized>(&mut self, value: &T) {
        let value = self.normalize(value);
        self.positional.push(value);
    }

    /// Inserts a keyword argument in place.
    pub fn push_kwarg<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) {
        let value = self.normalize(value);
        self.keyword.insert(name.into(), value);
    }

    /// Whether some argument could not be serialized.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Positional arguments in call order.
    #[must_use]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword arguments sorted by name.
    #[must_use]
    pub const fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    fn normalize<T: Serialize + ?Sized>(&mut self, value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(value) => canonicalize(value),
            Err(_) => {
                self.opaque = true;
                Value::String(format!("<opaque:{}>", type_name::<T>()))
            }
        }
    }
}

/// Conversion of a call's arguments into [`CallArgs`].
pub trait IntoCallArgs {
    /// Normalise the arguments for key building.
    fn call_args(&self) -> CallArgs;
}

impl IntoCallArgs for () {
    fn call_args(&self) -> CallArgs {
        CallArgs::new()
    }
}

impl IntoCallArgs for CallArgs {
    fn call_args(&self) -> CallArgs {
        self.clone()
    }
}

macro_rules! impl_tuple_call_args {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> IntoCallArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn call_args(&self) -> CallArgs {
                let ($($name,)+) = self;
                let mut args = CallArgs::new();
                $(args.push_arg($name);)+
                args
            }
        }
    };
}

impl_tuple_call_args!(A);
impl_tuple_call_args!(A, B);
impl_tuple_call_args!(A, B, C);
impl_tuple_call_args!(A, B, C, D);
impl_tuple_call_args!(A, B, C, D, E);
impl_tuple_call_args!(A, B, C, D, E, G);

/// Treats the fields of a struct as keyword arguments.
///
/// `Option` fields that are `None` become `null` keywords; skip them with
/// `#[serde(skip_serializing_if = "Option::is_none")]` to make them absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kwargs<T>(pub T);

impl<T: Serialize> IntoCallArgs for Kwargs<T> {
    fn call_args(&self) -> CallArgs {
        let mut args = CallArgs::new();
        match serde_json::to_value(&self.0) {
            Ok(Value::Object(fields)) => {
                for (name, value) in fields {
                    args.keyword.insert(name, canonicalize(value));
                }
            }
            Ok(Value::Null) => {}
            Ok(other) => args.positional.push(canonicalize(other)),
            Err(_) => {
                args.opaque = true;
                args.positional
                    .push(Value::String(format!("<opaque:{}>", type_name::<T>())));
            }
        }
        args
    }
}

/// Derive the cache key for one invocation.
#[must_use]
pub fn build_key(id: &FunctionId, args: &CallArgs, prefix: Option<&str>) -> CacheKey {
    let digest = Sha256::digest(canonical_document(id, args).as_bytes());
    let mut key = prefix.map(sanitize_prefix).unwrap_or_default();
    key.push_str(&hex::encode(digest));
    CacheKey(key)
}

fn canonical_document(id: &FunctionId, args: &CallArgs) -> String {
    let kwargs = args
        .keyword
        .iter()
        .map(|(name, value)| Value::Array(vec![Value::String(name.clone()), value.clone()]))
        .collect();

    let mut doc = Map::new();
    doc.insert("args".to_string(), Value::Array(args.positional.clone()));
    doc.insert("func".to_string(), Value::String(id.to_string()));
    doc.insert("kwargs".to_string(), Value::Array(kwargs));

    Value::Object(doc).to_string()
}

/// Rebuilds objects with their members in key order at every depth.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { '_' } else { c })
        .collect()
}
