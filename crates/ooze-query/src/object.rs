//! Queryable objects: typed, attribute-addressable records.
//!
//! Every record the engine hands out is a [`QueryObject`]: a [`TypeTag`], an
//! optional identity key (usually a dot-separated hierarchical path) and a
//! sorted map of named [`Value`]s. Objects are immutable once built; query
//! operations always produce new objects.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{OozeError, Result};

// ============================================================================
// Type tags
// ============================================================================

/// Named record type, optionally refining a parent type.
///
/// `TypeTag::named` is `const`, so adapters expose their record types as
/// constants. Derived tags (`TypeTag::derived`) are built at runtime, e.g. one
/// per log parser, and still answer `is(&parent)`. A tag made by
/// [`TypeTag::unique`] equals only itself and its clones, whatever its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag {
    name: Cow<'static, str>,
    parent: Option<Arc<TypeTag>>,
    serial: u64,
}

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

impl TypeTag {
    pub const fn named(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            parent: None,
            serial: 0,
        }
    }

    pub fn derived(name: impl Into<String>, parent: &TypeTag) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            parent: Some(Arc::new(parent.clone())),
            serial: 0,
        }
    }

    /// Like [`TypeTag::derived`], but distinct from every other tag built so
    /// far, including ones with the same name and parent.
    pub fn unique(name: impl Into<String>, parent: &TypeTag) -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            ..Self::derived(name, parent)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&TypeTag> {
        self.parent.as_deref()
    }

    /// True when `other` is this tag or one of its ancestors.
    pub fn is(&self, other: &TypeTag) -> bool {
        let mut cur = Some(self);
        while let Some(tag) = cur {
            if tag == other {
                return true;
            }
            cur = tag.parent();
        }
        false
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Tag of objects built ad hoc through [`QueryObject::from_mapping`].
pub const OBJECT: TypeTag = TypeTag::named("Object");

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Object(Box<QueryObject>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Floats and ints both read as `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&QueryObject> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Stable textual form used for hashing join keys.
    pub(crate) fn join_key(&self) -> String {
        match self {
            Value::Int(v) => format!("i:{v}"),
            Value::Float(v) => format!("f:{}", v.to_bits()),
            Value::Str(v) => format!("s:{v}"),
            Value::Object(v) => format!("o:{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<QueryObject> for Value {
    fn from(v: QueryObject) -> Self {
        Value::Object(Box::new(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Object(v) => write!(f, "{v}"),
        }
    }
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct QueryObject {
    tag: TypeTag,
    key: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl QueryObject {
    pub fn new(tag: TypeTag, key: Option<String>, fields: BTreeMap<String, Value>) -> Self {
        Self { tag, key, fields }
    }

    pub fn builder(tag: TypeTag) -> QueryObjectBuilder {
        QueryObjectBuilder {
            tag,
            key: None,
            fields: BTreeMap::new(),
        }
    }

    /// Ad hoc object from name/value pairs. A string `path` entry becomes the
    /// identity key, so the result can be handed to the binder.
    pub fn from_mapping<K, V, I>(mapping: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields: BTreeMap<String, Value> = mapping
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let key = fields
            .get("path")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self::new(OBJECT, key, fields)
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.fields.get(name).ok_or_else(|| OozeError::FieldNotFound {
            field: name.to_string(),
            on: self.describe(),
        })
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_int().ok_or_else(|| mismatch(name, "int", value))
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        value.as_float().ok_or_else(|| mismatch(name, "float", value))
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "string", value))
    }

    /// Copy of this object keeping only `names`; tag and key survive.
    pub fn project(&self, names: &[&str]) -> Result<QueryObject> {
        let mut fields = BTreeMap::new();
        for name in names {
            fields.insert((*name).to_string(), self.get(name)?.clone());
        }
        Ok(Self::new(self.tag.clone(), self.key.clone(), fields))
    }

    /// Union of both field sets; on a name collision `self` wins.
    pub fn merge(&self, other: &QueryObject) -> QueryObject {
        let mut fields = other.fields.clone();
        for (name, value) in &self.fields {
            fields.insert(name.clone(), value.clone());
        }
        Self::new(self.tag.clone(), self.key.clone(), fields)
    }

    pub(crate) fn describe(&self) -> String {
        match &self.key {
            Some(key) => format!("{}({key})", self.tag),
            None => self.tag.to_string(),
        }
    }
}

fn mismatch(field: &str, expected: &'static str, found: &Value) -> OozeError {
    OozeError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: found.kind_name(),
    }
}

impl fmt::Display for QueryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.describe())?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

pub struct QueryObjectBuilder {
    tag: TypeTag,
    key: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl QueryObjectBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field_opt(self, name: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.field(name, value),
            None => self,
        }
    }

    pub fn build(self) -> QueryObject {
        QueryObject::new(self.tag, self.key, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNAL: TypeTag = TypeTag::named("Signal");

    #[test]
    fn derived_tags_answer_for_their_parents() {
        let item = TypeTag::named("LogItem");
        let child = TypeTag::derived("Fetch", &item);
        let grandchild = TypeTag::derived("FetchRetry", &child);

        assert!(grandchild.is(&item));
        assert!(grandchild.is(&child));
        assert!(!item.is(&child));
        assert!(!child.is(&SIGNAL));
    }

    #[test]
    fn unique_tags_differ_despite_equal_names() {
        let item = TypeTag::named("LogItem");
        let a = TypeTag::unique("Log", &item);
        let b = TypeTag::unique("Log", &item);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, TypeTag::derived("Log", &item));
        assert!(a.is(&item) && b.is(&item));
        assert!(!a.is(&b));
        assert_eq!(a.to_string(), "Log");
    }

    #[test]
    fn missing_field_reports_owner() {
        let obj = QueryObject::builder(SIGNAL)
            .key("top.clk")
            .field("width", 1)
            .build();
        let err = obj.get("value").unwrap_err();
        assert!(matches!(err, OozeError::FieldNotFound { ref field, .. } if field == "value"));
        assert!(err.to_string().contains("Signal(top.clk)"));
    }

    #[test]
    fn typed_accessors_check_kind() {
        let obj = QueryObject::builder(SIGNAL)
            .field("width", 8)
            .field("name", "clk")
            .build();
        assert_eq!(obj.int("width").unwrap(), 8);
        assert_eq!(obj.float("width").unwrap(), 8.0);
        assert!(matches!(
            obj.int("name"),
            Err(OozeError::TypeMismatch { expected: "int", found: "string", .. })
        ));
    }

    #[test]
    fn mapping_path_becomes_key() {
        let obj = QueryObject::from_mapping([("path", "top.inst")]);
        assert_eq!(obj.key(), Some("top.inst"));
        assert_eq!(obj.tag(), &OBJECT);
        assert_eq!(obj.str("path").unwrap(), "top.inst");
    }

    #[test]
    fn display_sorts_fields() {
        let obj = QueryObject::builder(SIGNAL)
            .key("a")
            .field("z", 1)
            .field("b", "x")
            .field("f", 1.5)
            .build();
        assert_eq!(obj.to_string(), r#"Signal(a){b: "x", f: 1.5, z: 1}"#);
    }

    #[test]
    fn merge_prefers_self() {
        let left = QueryObject::from_mapping([("path", Value::from("a")), ("v", Value::from(1))]);
        let right = QueryObject::from_mapping([("v", Value::from(2)), ("w", Value::from(3))]);
        let merged = left.merge(&right);
        assert_eq!(merged.int("v").unwrap(), 1);
        assert_eq!(merged.int("w").unwrap(), 3);
        assert_eq!(merged.key(), Some("a"));
    }
}
