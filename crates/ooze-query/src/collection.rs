//! Ordered query collections and the relational-style algebra over them.
//!
//! A [`QueryCollection`] is an ordered list of [`Element`]s: plain objects,
//! chains produced by the sequence engine, or transactions. Order is
//! discovery order and every operation preserves it. All operations are pure
//! and return a new collection.
//!
//! A collection of exactly one element forwards field access to that element
//! (`coll.field("path")` is `coll[0].path`); any other size fails with
//! [`OozeError::Shape`].

use std::collections::HashMap;
use std::fmt;

use crate::error::{OozeError, Result};
use crate::object::{QueryObject, TypeTag, Value};
use crate::predicate::{Fields, Predicate};
use crate::transaction::Transaction;

/// Tag reported by chain elements.
pub static CHAIN: TypeTag = TypeTag::named("Chain");

// ============================================================================
// Elements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Object(QueryObject),
    Chain(QueryCollection),
    Transaction(Transaction),
}

impl Element {
    pub fn tag(&self) -> &TypeTag {
        match self {
            Element::Object(obj) => obj.tag(),
            Element::Chain(_) => &CHAIN,
            Element::Transaction(tx) => tx.record().tag(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Element::Object(obj) => obj.key(),
            Element::Chain(_) => None,
            Element::Transaction(tx) => tx.record().key(),
        }
    }

    /// The record behind this element. Chains have none.
    pub fn as_object(&self) -> Option<&QueryObject> {
        match self {
            Element::Object(obj) => Some(obj),
            Element::Chain(_) => None,
            Element::Transaction(tx) => Some(tx.record()),
        }
    }

    pub fn as_chain(&self) -> Option<&QueryCollection> {
        match self {
            Element::Chain(chain) => Some(chain),
            Element::Transaction(tx) => Some(tx.chain()),
            Element::Object(_) => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Element::Transaction(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn object(&self) -> Result<&QueryObject> {
        self.as_object().ok_or(OozeError::Shape {
            expected: "an object element",
            len: self.as_chain().map_or(0, QueryCollection::len),
        })
    }

    /// Field access. A chain forwards to its single element.
    pub fn get(&self, name: &str) -> Result<&Value> {
        match self {
            Element::Object(obj) => obj.get(name),
            Element::Chain(chain) => chain.field(name),
            Element::Transaction(tx) => tx.record().get(name),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self {
            Element::Chain(chain) => chain.single()?.int(name),
            _ => self.object()?.int(name),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self {
            Element::Chain(chain) => chain.single()?.float(name),
            _ => self.object()?.float(name),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        match self {
            Element::Chain(chain) => chain.single()?.str(name),
            _ => self.object()?.str(name),
        }
    }

    pub fn time(&self) -> Result<i64> {
        self.int("time")
    }
}

impl From<QueryObject> for Element {
    fn from(obj: QueryObject) -> Self {
        Element::Object(obj)
    }
}

impl From<QueryCollection> for Element {
    fn from(chain: QueryCollection) -> Self {
        Element::Chain(chain)
    }
}

impl From<Transaction> for Element {
    fn from(tx: Transaction) -> Self {
        Element::Transaction(tx)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Object(obj) => write!(f, "{obj}"),
            Element::Chain(chain) => write!(f, "{chain}"),
            Element::Transaction(tx) => write!(f, "{tx}"),
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryCollection {
    elements: Vec<Element>,
}

impl QueryCollection {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn from_objects(objects: impl IntoIterator<Item = QueryObject>) -> Self {
        objects.into_iter().map(Element::Object).collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Element> {
        self.elements.get(index).ok_or(OozeError::Index {
            index,
            len: self.elements.len(),
        })
    }

    pub fn first(&self) -> Option<&Element> {
        self.elements.first()
    }

    pub fn last(&self) -> Option<&Element> {
        self.elements.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    // ------------------------------------------------------------------
    // Singleton forwarding
    // ------------------------------------------------------------------

    pub fn single(&self) -> Result<&Element> {
        match self.elements.as_slice() {
            [only] => Ok(only),
            _ => Err(OozeError::Shape {
                expected: "exactly one element",
                len: self.elements.len(),
            }),
        }
    }

    pub fn field(&self, name: &str) -> Result<&Value> {
        self.single()?.get(name)
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.single()?.int(name)
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        self.single()?.float(name)
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        self.single()?.str(name)
    }

    pub fn key(&self) -> Result<Option<&str>> {
        Ok(self.single()?.key())
    }

    // ------------------------------------------------------------------
    // Algebra
    // ------------------------------------------------------------------

    /// Elements whose tag is (or refines) any of `tags`.
    pub fn select(&self, tags: &[TypeTag]) -> QueryCollection {
        self.elements
            .iter()
            .filter(|e| tags.iter().any(|t| e.tag().is(t)))
            .cloned()
            .collect()
    }

    /// The `where` operation. Keeps every element the predicate accepts; a
    /// predicate error aborts the whole call.
    pub fn filter<P: Predicate>(&self, predicate: P) -> Result<QueryCollection> {
        let mut out = Vec::new();
        for element in &self.elements {
            if predicate.test(element)? {
                out.push(element.clone());
            }
        }
        Ok(Self::new(out))
    }

    pub fn where_eq(&self, field: &str, value: impl Into<Value>) -> Result<QueryCollection> {
        self.filter(Fields::new().with(field, value.into()))
    }

    /// Projection: each element keeps only the named fields.
    pub fn project(&self, names: &[&str]) -> Result<QueryCollection> {
        self.elements
            .iter()
            .map(|e| Ok(Element::Object(e.object()?.project(names)?)))
            .collect()
    }

    /// Bare values of one field, in order.
    pub fn values(&self, name: &str) -> Result<Vec<Value>> {
        self.elements
            .iter()
            .map(|e| e.get(name).cloned())
            .collect()
    }

    pub fn map<F>(&self, mut f: F) -> Result<QueryCollection>
    where
        F: FnMut(&Element) -> Result<Element>,
    {
        self.elements.iter().map(|e| f(e)).collect()
    }

    /// Inner join on equal values of `key`.
    ///
    /// Merged objects carry both field sets with `self` winning collisions.
    /// Output follows `self` order; several partners for one element appear in
    /// `other` order.
    pub fn join(&self, other: &QueryCollection, key: &str) -> Result<QueryCollection> {
        let mut index: HashMap<String, Vec<&QueryObject>> = HashMap::new();
        for element in &other.elements {
            let obj = element.object()?;
            index
                .entry(obj.get(key)?.join_key())
                .or_default()
                .push(obj);
        }

        let mut out = Vec::new();
        for element in &self.elements {
            let obj = element.object()?;
            if let Some(partners) = index.get(&obj.get(key)?.join_key()) {
                out.extend(partners.iter().map(|p| Element::Object(obj.merge(p))));
            }
        }
        Ok(Self::new(out))
    }
}

impl FromIterator<Element> for QueryCollection {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromIterator<QueryObject> for QueryCollection {
    fn from_iter<I: IntoIterator<Item = QueryObject>>(iter: I) -> Self {
        Self::from_objects(iter)
    }
}

impl IntoIterator for QueryCollection {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryCollection {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for QueryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{element}")?;
        }
        f.write_str("]")
    }
}
