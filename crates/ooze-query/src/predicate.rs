//! Predicate operators for `filter` and the `source` mapping function.
//!
//! - [`Fields`]: AND of per-field constraints (equality or [`Like`]).
//! - [`like`]: regex search, as a field constraint or against identity keys.
//! - [`inside`]: hierarchical containment over dot-separated keys.
//! - [`source_of`] / [`source`]: net-connectivity traversal through a
//!   [`Connectivity`] provider.
//!
//! Any `Fn(&Element) -> Result<bool>` is a predicate too.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use crate::collection::{Element, QueryCollection};
use crate::error::{OozeError, Result};
use crate::object::{QueryObject, Value};

pub const DEFAULT_SEPARATOR: char = '.';

pub trait Predicate {
    fn test(&self, element: &Element) -> Result<bool>;
}

impl<F> Predicate for F
where
    F: Fn(&Element) -> Result<bool>,
{
    fn test(&self, element: &Element) -> Result<bool> {
        self(element)
    }
}

// ============================================================================
// Field constraints
// ============================================================================

#[derive(Debug, Clone)]
pub enum FieldMatch {
    Eq(Value),
    Like(Like),
}

impl FieldMatch {
    fn matches(&self, field: &str, value: &Value) -> Result<bool> {
        match self {
            FieldMatch::Eq(expected) => Ok(expected == value),
            FieldMatch::Like(like) => match value.as_str() {
                Some(text) => Ok(like.is_match(text)),
                None => Err(OozeError::TypeMismatch {
                    field: field.to_string(),
                    expected: "string",
                    found: value.kind_name(),
                }),
            },
        }
    }
}

macro_rules! field_match_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldMatch {
                fn from(v: $ty) -> Self {
                    FieldMatch::Eq(Value::from(v))
                }
            }
        )*
    };
}

field_match_from_value!(i64, i32, u32, usize, f64, &str, String, QueryObject);

impl From<Value> for FieldMatch {
    fn from(v: Value) -> Self {
        FieldMatch::Eq(v)
    }
}

impl From<Like> for FieldMatch {
    fn from(v: Like) -> Self {
        FieldMatch::Like(v)
    }
}

/// Conjunction of field constraints: `where(definition = "mod1", name = like(..))`.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    constraints: BTreeMap<String, FieldMatch>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, expected: impl Into<FieldMatch>) -> Self {
        self.constraints.insert(field.into(), expected.into());
        self
    }
}

impl Predicate for Fields {
    fn test(&self, element: &Element) -> Result<bool> {
        for (field, expected) in &self.constraints {
            if !expected.matches(field, element.get(field)?)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// ============================================================================
// like
// ============================================================================

/// Regular-expression search (partial match, not anchored).
#[derive(Debug, Clone)]
pub struct Like {
    regex: Regex,
}

pub fn like(pattern: &str) -> Result<Like> {
    Ok(Like {
        regex: Regex::new(pattern)?,
    })
}

impl Like {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Standalone, a `Like` matches the element's identity key.
impl Predicate for Like {
    fn test(&self, element: &Element) -> Result<bool> {
        Ok(element.key().is_some_and(|key| self.is_match(key)))
    }
}

// ============================================================================
// inside
// ============================================================================

#[derive(Debug, Clone)]
pub struct Inside {
    containers: Vec<String>,
    separator: char,
}

/// Elements located at or below any keyed element of `container`.
pub fn inside(container: &QueryCollection) -> Inside {
    Inside::from_keys(container.iter().filter_map(Element::key))
}

impl Inside {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            containers: keys.into_iter().map(Into::into).collect(),
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn of(object: &QueryObject) -> Self {
        Self::from_keys(object.key())
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.containers
            .iter()
            .any(|c| is_within(key, c, self.separator))
    }
}

/// `key == container`, or `key` continues `container` right after a separator.
pub fn is_within(key: &str, container: &str, separator: char) -> bool {
    match key.strip_prefix(container) {
        Some("") => true,
        Some(rest) => rest.starts_with(separator),
        None => false,
    }
}

impl Predicate for Inside {
    fn test(&self, element: &Element) -> Result<bool> {
        Ok(element.key().is_some_and(|key| self.contains(key)))
    }
}

// ============================================================================
// Connectivity: source / source_of
// ============================================================================

/// Structural connectivity provider, answered by netlist sources.
pub trait Connectivity: Send + Sync {
    /// Instances driving the port or variable identified by `key`.
    fn drivers(&self, key: &str) -> Vec<QueryObject>;
}

/// Accepts elements that drive at least one of the targets.
#[derive(Debug, Clone)]
pub struct SourceOf {
    drivers: HashSet<String>,
}

pub fn source_of<C: Connectivity + ?Sized>(conn: &C, targets: &QueryCollection) -> SourceOf {
    let drivers = targets
        .iter()
        .filter_map(Element::key)
        .flat_map(|key| conn.drivers(key))
        .filter_map(|obj| obj.key().map(str::to_string))
        .collect();
    SourceOf { drivers }
}

impl SourceOf {
    pub fn driver_keys(&self) -> impl Iterator<Item = &str> {
        self.drivers.iter().map(String::as_str)
    }
}

impl Predicate for SourceOf {
    fn test(&self, element: &Element) -> Result<bool> {
        Ok(element.key().is_some_and(|key| self.drivers.contains(key)))
    }
}

/// The unique driver of a port or variable.
pub fn resolve_source<C: Connectivity + ?Sized>(conn: &C, element: &Element) -> Result<QueryObject> {
    let Some(key) = element.key() else {
        return Err(OozeError::resolution(
            element.to_string(),
            "element has no identity key",
        ));
    };
    let mut drivers = conn.drivers(key);
    match drivers.len() {
        1 => Ok(drivers.remove(0)),
        0 => Err(OozeError::resolution(key, "no driver")),
        n => Err(OozeError::resolution(key, format!("{n} drivers"))),
    }
}

/// Mapping function form of [`resolve_source`], for `QueryCollection::map`.
pub fn source<C: Connectivity + ?Sized>(conn: &C) -> impl Fn(&Element) -> Result<Element> + '_ {
    move |element: &Element| resolve_source(conn, element).map(Element::Object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::TypeTag;

    const INST: TypeTag = TypeTag::named("Instance");

    fn inst(path: &str) -> Element {
        QueryObject::builder(INST)
            .key(path)
            .field("path", path)
            .field("name", path.rsplit('.').next().unwrap_or(path))
            .build()
            .into()
    }

    #[test]
    fn within_requires_separator_boundary() {
        assert!(is_within("top.inst1", "top.inst1", '.'));
        assert!(is_within("top.inst1.a", "top.inst1", '.'));
        assert!(!is_within("top.inst12", "top.inst1", '.'));
        assert!(!is_within("top", "top.inst1", '.'));
        assert!(is_within("top/inst1", "top", '/'));
    }

    #[test]
    fn like_searches_rather_than_anchors() {
        let pattern = like(r"inst\d{2,}").unwrap();
        assert!(pattern.is_match("top.inst12"));
        assert!(!pattern.is_match("top.inst1"));
        assert!(pattern.test(&inst("top.inst12")).unwrap());
        assert!(like("(").is_err());
    }

    #[test]
    fn fields_combine_equality_and_like() {
        let pred = Fields::new()
            .with("name", like("^inst").unwrap())
            .with("path", "top.inst3");
        assert!(pred.test(&inst("top.inst3")).unwrap());
        assert!(!pred.test(&inst("top.inst4")).unwrap());

        let missing = Fields::new().with("definition", "mod1");
        assert!(missing.test(&inst("top.inst3")).is_err());
    }

    #[test]
    fn like_on_non_string_field_is_a_type_error() {
        let element: Element = QueryObject::from_mapping([("width", 3)]).into();
        let pred = Fields::new().with("width", like("3").unwrap());
        assert!(matches!(
            pred.test(&element),
            Err(OozeError::TypeMismatch { .. })
        ));
    }

    struct Chain2;

    impl Connectivity for Chain2 {
        fn drivers(&self, key: &str) -> Vec<QueryObject> {
            match key {
                "top.b.in" => vec![QueryObject::builder(INST).key("top.a").build()],
                "top.c.in" => vec![
                    QueryObject::builder(INST).key("top.a").build(),
                    QueryObject::builder(INST).key("top.b").build(),
                ],
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn source_requires_a_unique_driver() {
        let port = |p: &str| Element::from(QueryObject::from_mapping([("path", p)]));
        let map = source(&Chain2);
        assert_eq!(map(&port("top.b.in")).unwrap().key(), Some("top.a"));
        assert!(matches!(
            map(&port("top.c.in")),
            Err(OozeError::Resolution { .. })
        ));
        assert!(map(&port("top.a.in")).is_err());
    }

    #[test]
    fn source_of_collects_driver_keys() {
        let targets = QueryCollection::from_objects([QueryObject::from_mapping([(
            "path", "top.b.in",
        )])]);
        let pred = source_of(&Chain2, &targets);
        assert!(pred.test(&inst("top.a")).unwrap());
        assert!(!pred.test(&inst("top.b")).unwrap());
    }
}
