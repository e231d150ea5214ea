//! Structural netlist source for Ooze.
//!
//! Reads one or more Yosys `write_json` documents, elaborates the instance
//! hierarchy below a top module, and exposes three record types keyed by
//! hierarchical path:
//!
//! - `Instance`: one per elaborated instance, fields `path`, `name`,
//!   `definition` and `parent` (absent on the top instance)
//! - `Port`: one per port of every instance, fields `path`, `name`,
//!   `direction`, `width`, `instance`
//! - `Variable`: one per named net of every instance, fields `path`, `name`,
//!   `width`, `instance`
//!
//! The source also answers driver queries for `source` / `source_of`.

mod netlist;
pub mod yosys;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use ooze_query::{
    Connectivity, DataSource, OozeError, QueryObject, Result, TypeTag, DEFAULT_SEPARATOR,
};
use tracing::debug;

pub use netlist::{InstanceNode, Netlist};
use yosys::{YosysDesign, YosysModule};

pub const INSTANCE: TypeTag = TypeTag::named("Instance");
pub const PORT: TypeTag = TypeTag::named("Port");
pub const VARIABLE: TypeTag = TypeTag::named("Variable");

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone)]
enum Input {
    File(PathBuf),
    Json { origin: String, text: String },
}

/// Collects netlist documents and elaboration options.
#[derive(Debug, Clone, Default)]
pub struct RtlSourceBuilder {
    inputs: Vec<Input>,
    top: Option<String>,
    separator: Option<char>,
}

impl RtlSourceBuilder {
    pub fn add_file(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(Input::File(path.as_ref().to_path_buf()));
        self
    }

    pub fn add_json(mut self, origin: impl Into<String>, text: impl Into<String>) -> Self {
        self.inputs.push(Input::Json {
            origin: origin.into(),
            text: text.into(),
        });
        self
    }

    /// Elaborate from this module instead of the detected top.
    pub fn top(mut self, name: impl Into<String>) -> Self {
        self.top = Some(name.into());
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn build(self) -> Result<RtlSource> {
        if self.inputs.is_empty() {
            return Err(OozeError::load("netlist", "no netlist documents given"));
        }

        let mut origins: Vec<String> = Vec::new();
        let mut defined_in: HashMap<String, String> = HashMap::new();
        let mut modules: BTreeMap<String, YosysModule> = BTreeMap::new();
        for input in self.inputs {
            let (origin, text) = match input {
                Input::File(path) => {
                    let text =
                        std::fs::read_to_string(&path).map_err(|e| OozeError::io(&path, e))?;
                    (path.display().to_string(), text)
                }
                Input::Json { origin, text } => (origin, text),
            };
            let design: YosysDesign = serde_json::from_str(&text)
                .map_err(|e| OozeError::load_at(origin.clone(), e.line(), e.to_string()))?;
            for (name, module) in design.modules {
                if let Some(first) = defined_in.get(&name) {
                    return Err(OozeError::load(
                        origin,
                        format!("module `{name}` is already defined in {first}"),
                    ));
                }
                defined_in.insert(name.clone(), origin.clone());
                modules.insert(name, module);
            }
            origins.push(origin);
        }

        let top = match self.top {
            Some(top) => top,
            None => detect_top(&modules)?,
        };
        let separator = self.separator.unwrap_or(DEFAULT_SEPARATOR);
        let netlist = Netlist::elaborate(modules, &top, separator)?;
        Ok(RtlSource::from_netlist(origins.join(","), netlist))
    }
}

/// The module carrying a `top` attribute, else the single module no other
/// module instantiates.
fn detect_top(modules: &BTreeMap<String, YosysModule>) -> Result<String> {
    let marked: Vec<&String> = modules
        .iter()
        .filter(|(_, m)| m.is_marked_top())
        .map(|(name, _)| name)
        .collect();
    match marked.as_slice() {
        [one] => return Ok((*one).clone()),
        [] => {}
        many => {
            return Err(OozeError::load(
                "netlist",
                format!("several modules are marked top: {many:?}"),
            ))
        }
    }

    let roots: Vec<&String> = modules
        .keys()
        .filter(|name| {
            !modules
                .values()
                .any(|m| m.cells.values().any(|c| &c.cell_type == *name))
        })
        .collect();
    match roots.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(OozeError::load("netlist", "no top module: every module is instantiated")),
        many => Err(OozeError::load(
            "netlist",
            format!("ambiguous top module, candidates {many:?}"),
        )),
    }
}

// ============================================================================
// Source
// ============================================================================

#[derive(Debug, Clone)]
pub struct RtlSource {
    origin: String,
    netlist: Netlist,
    records: Vec<QueryObject>,
    /// Arena index of an instance to its record index.
    instance_records: Vec<usize>,
    by_key: HashMap<String, Vec<usize>>,
}

impl RtlSource {
    pub fn builder() -> RtlSourceBuilder {
        RtlSourceBuilder::default()
    }

    pub fn from_json(origin: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Self::builder().add_json(origin, text).build()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().add_file(path).build()
    }

    fn from_netlist(origin: String, netlist: Netlist) -> Self {
        let sep = netlist.separator();
        let mut records = Vec::new();
        let mut instance_records = Vec::with_capacity(netlist.instances().len());
        let (mut ports, mut variables) = (0usize, 0usize);

        for node in netlist.instances() {
            instance_records.push(records.len());
            let parent = node.parent.map(|p| netlist.instances()[p].path.clone());
            records.push(
                QueryObject::builder(INSTANCE)
                    .key(node.path.clone())
                    .field("path", node.path.clone())
                    .field("name", node.name.clone())
                    .field("definition", node.definition.clone())
                    .field_opt("parent", parent)
                    .build(),
            );

            let Some(module) = netlist.module(&node.definition) else {
                continue;
            };
            for (name, port) in &module.ports {
                let path = format!("{}{sep}{name}", node.path);
                ports += 1;
                records.push(
                    QueryObject::builder(PORT)
                        .key(path.clone())
                        .field("path", path)
                        .field("name", name.clone())
                        .field("direction", port.direction.as_str())
                        .field("width", port.bits.len())
                        .field("instance", node.path.clone())
                        .build(),
                );
            }
            for (name, net) in module.netnames.iter().filter(|(_, n)| n.hide_name == 0) {
                let path = format!("{}{sep}{name}", node.path);
                variables += 1;
                records.push(
                    QueryObject::builder(VARIABLE)
                        .key(path.clone())
                        .field("path", path)
                        .field("name", name.clone())
                        .field("width", net.bits.len())
                        .field("instance", node.path.clone())
                        .build(),
                );
            }
        }

        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            if let Some(key) = record.key() {
                by_key.entry(key.to_string()).or_default().push(index);
            }
        }

        debug!(
            origin = %origin,
            instances = instance_records.len(),
            ports,
            variables,
            "elaborated netlist"
        );

        Self {
            origin,
            netlist,
            records,
            instance_records,
            by_key,
        }
    }

    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    pub fn top(&self) -> Option<&InstanceNode> {
        self.netlist.instances().first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DataSource for RtlSource {
    fn name(&self) -> &str {
        &self.origin
    }

    fn provides(&self) -> Vec<TypeTag> {
        vec![INSTANCE, PORT, VARIABLE]
    }

    fn select(&self, tags: &[TypeTag]) -> Result<Vec<QueryObject>> {
        Ok(self
            .records
            .iter()
            .filter(|r| tags.iter().any(|t| r.tag().is(t)))
            .cloned()
            .collect())
    }

    fn lookup(&self, tag: &TypeTag, key: &str) -> Result<Vec<QueryObject>> {
        Ok(self
            .by_key
            .get(key)
            .into_iter()
            .flatten()
            .map(|&i| &self.records[i])
            .filter(|r| r.tag().is(tag))
            .cloned()
            .collect())
    }

    fn connectivity(&self) -> Option<&dyn Connectivity> {
        Some(self)
    }
}

impl Connectivity for RtlSource {
    fn drivers(&self, key: &str) -> Vec<QueryObject> {
        self.netlist
            .drivers(key)
            .into_iter()
            .filter_map(|i| self.instance_records.get(i))
            .map(|&r| self.records[r].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain() -> String {
        json!({
            "modules": {
                "top": {
                    "ports": {},
                    "cells": {
                        "u_src": { "type": "src", "connections": { "o": [2] } },
                        "u_dst": { "type": "dst", "connections": { "i": [2] } }
                    },
                    "netnames": { "w": { "hide_name": 0, "bits": [2] } }
                },
                "src": {
                    "ports": { "o": { "direction": "output", "bits": [2] } },
                    "netnames": { "o": { "hide_name": 0, "bits": [2] } }
                },
                "dst": {
                    "ports": { "i": { "direction": "input", "bits": [2] } },
                    "netnames": {
                        "i": { "hide_name": 0, "bits": [2] },
                        "$tmp": { "hide_name": 1, "bits": [3] }
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn detects_the_uninstantiated_module_as_top() {
        let rtl = RtlSource::from_json("chain.json", chain()).unwrap();
        assert_eq!(rtl.top().map(|t| t.path.as_str()), Some("top"));
        let paths: Vec<_> = rtl
            .select(&[INSTANCE])
            .unwrap()
            .iter()
            .filter_map(|r| r.key().map(str::to_string))
            .collect();
        assert_eq!(paths, vec!["top", "top.u_dst", "top.u_src"]);
    }

    #[test]
    fn hidden_nets_are_not_variables() {
        let rtl = RtlSource::from_json("chain.json", chain()).unwrap();
        let vars = rtl.select(&[VARIABLE]).unwrap();
        assert_eq!(vars.len(), 3);
        assert!(vars.iter().all(|v| !v.str("name").unwrap().starts_with('$')));
    }

    #[test]
    fn drivers_cross_one_level_of_hierarchy() {
        let rtl = RtlSource::from_json("chain.json", chain()).unwrap();
        let drivers = rtl.drivers("top.u_dst.i");
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].key(), Some("top.u_src"));
        assert!(rtl.drivers("top.u_src.o").is_empty());
        assert_eq!(rtl.drivers("top.w")[0].key(), Some("top.u_src"));
    }

    #[test]
    fn explicit_top_must_exist() {
        let err = RtlSource::builder()
            .add_json("chain.json", chain())
            .top("nope")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
