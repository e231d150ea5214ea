//! Data sources, the type registry and the `Ooze` facade.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::collection::{Element, QueryCollection};
use crate::config::OozeConfig;
use crate::error::{OozeError, Result};
use crate::object::{QueryObject, TypeTag, Value};
use crate::predicate::{resolve_source, source_of, Connectivity, Inside, SourceOf};

// ============================================================================
// Sources
// ============================================================================

/// A fully parsed, immutable provider of typed records.
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Record types this source produces.
    fn provides(&self) -> Vec<TypeTag>;

    /// True when some provided type is `tag` or refines it.
    fn produces(&self, tag: &TypeTag) -> bool {
        self.provides().iter().any(|p| p.is(tag))
    }

    /// Records whose type is (or refines) one of `tags`, in source order.
    fn select(&self, tags: &[TypeTag]) -> Result<Vec<QueryObject>>;

    /// Records of `tag` with identity key `key`.
    fn lookup(&self, tag: &TypeTag, key: &str) -> Result<Vec<QueryObject>> {
        Ok(self
            .select(std::slice::from_ref(tag))?
            .into_iter()
            .filter(|obj| obj.key() == Some(key))
            .collect())
    }

    fn connectivity(&self) -> Option<&dyn Connectivity> {
        None
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Attachment-ordered sources plus the provided-type index.
#[derive(Default)]
pub struct TypeRegistry {
    sources: Vec<Arc<dyn DataSource>>,
    by_tag: HashMap<TypeTag, Vec<usize>>,
}

impl TypeRegistry {
    pub fn register(&mut self, source: Arc<dyn DataSource>) -> usize {
        let index = self.sources.len();
        for tag in source.provides() {
            self.by_tag.entry(tag).or_default().push(index);
        }
        self.sources.push(source);
        index
    }

    pub fn sources(&self) -> &[Arc<dyn DataSource>] {
        &self.sources
    }

    /// Indices of sources providing `tag` or a refinement of it, in
    /// attachment order.
    pub fn producers(&self, tag: &TypeTag) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .by_tag
            .iter()
            .filter(|(provided, _)| provided.is(tag))
            .flat_map(|(_, indices)| indices.iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.by_tag.keys()
    }
}

// ============================================================================
// Facade
// ============================================================================

/// Entry point: owns the attached sources and answers type-based queries.
#[derive(Default)]
pub struct Ooze {
    config: OozeConfig,
    registry: TypeRegistry,
}

impl Ooze {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OozeConfig) -> Self {
        Self {
            config,
            registry: TypeRegistry::default(),
        }
    }

    pub fn config(&self) -> &OozeConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn attach<S: DataSource + 'static>(&mut self, source: S) -> Result<()> {
        self.attach_shared(Arc::new(source))
    }

    pub fn attach_shared(&mut self, source: Arc<dyn DataSource>) -> Result<()> {
        if self.config.reject_duplicate_keys {
            check_unique_keys(source.as_ref())?;
        }
        let provides = source.provides();
        let index = self.registry.register(source);
        debug!(
            source = %self.registry.sources[index].name(),
            index,
            types = provides.len(),
            "attached source"
        );
        Ok(())
    }

    /// Every record of the requested types, per source in attachment order.
    pub fn select(&self, tags: &[TypeTag]) -> Result<QueryCollection> {
        let mut out = Vec::new();
        for source in &self.registry.sources {
            let wanted: Vec<TypeTag> = tags
                .iter()
                .filter(|t| source.produces(t))
                .cloned()
                .collect();
            if wanted.is_empty() {
                continue;
            }
            out.extend(source.select(&wanted)?.into_iter().map(Element::Object));
        }
        debug!(types = tags.len(), records = out.len(), "select");
        Ok(QueryCollection::new(out))
    }

    /// Ad hoc object, e.g. a path to hand to [`Ooze::bind`].
    pub fn object<K, V, I>(&self, mapping: I) -> QueryObject
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        QueryObject::from_mapping(mapping)
    }

    pub fn array(&self, elements: impl IntoIterator<Item = Element>) -> QueryCollection {
        elements.into_iter().collect()
    }

    pub fn inside(&self, container: &QueryCollection) -> Inside {
        crate::predicate::inside(container).with_separator(self.config.separator)
    }

    /// Union of the connectivity of every attached source.
    pub fn connectivity(&self) -> Wiring<'_> {
        Wiring {
            parts: self
                .registry
                .sources
                .iter()
                .filter_map(|s| s.connectivity())
                .collect(),
        }
    }

    pub fn source_of(&self, targets: &QueryCollection) -> SourceOf {
        source_of(&self.connectivity(), targets)
    }

    pub fn source(&self) -> impl Fn(&Element) -> Result<Element> + '_ {
        let wiring = self.connectivity();
        move |element: &Element| resolve_source(&wiring, element).map(Element::Object)
    }
}

pub struct Wiring<'a> {
    parts: Vec<&'a dyn Connectivity>,
}

impl Connectivity for Wiring<'_> {
    fn drivers(&self, key: &str) -> Vec<QueryObject> {
        self.parts.iter().flat_map(|c| c.drivers(key)).collect()
    }
}

fn check_unique_keys(source: &dyn DataSource) -> Result<()> {
    for tag in source.provides() {
        let mut seen = HashSet::new();
        for obj in source.select(std::slice::from_ref(&tag))? {
            if obj.tag() != &tag {
                continue;
            }
            if let Some(key) = obj.key() {
                if !seen.insert(key.to_string()) {
                    return Err(OozeError::load(
                        source.name(),
                        format!("duplicate {tag} key `{key}`"),
                    ));
                }
            }
        }
    }
    Ok(())
}
