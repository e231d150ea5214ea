//! Elaborated instance hierarchy and net connectivity.
//!
//! Instances live in an arena (`Vec<InstanceNode>`); parents and children are
//! arena indices, so the tree has no owning back-references. Every port and
//! visible net of every instance is indexed by its hierarchical path together
//! with the net bits it covers in its own module scope.

use std::collections::{BTreeMap, HashMap, HashSet};

use ooze_query::{OozeError, Result};

use crate::yosys::{Bit, YosysModule};

#[derive(Debug, Clone)]
pub struct InstanceNode {
    pub path: String,
    pub name: String,
    pub definition: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Port connections of this instance, in its parent's net numbering.
    connections: BTreeMap<String, Vec<Bit>>,
}

#[derive(Debug, Clone)]
struct NetRef {
    instance: usize,
    bits: Vec<Bit>,
}

#[derive(Debug, Clone)]
pub struct Netlist {
    modules: BTreeMap<String, YosysModule>,
    instances: Vec<InstanceNode>,
    by_path: HashMap<String, usize>,
    nets: HashMap<String, NetRef>,
    separator: char,
}

impl Netlist {
    pub fn elaborate(
        modules: BTreeMap<String, YosysModule>,
        top: &str,
        separator: char,
    ) -> Result<Self> {
        if !modules.contains_key(top) {
            return Err(OozeError::load(
                "netlist",
                format!("top module `{top}` is not defined"),
            ));
        }

        let mut instances = Vec::new();
        let mut ancestry = Vec::new();
        instantiate(
            &modules,
            &mut instances,
            None,
            top,
            top,
            BTreeMap::new(),
            separator,
            &mut ancestry,
        )?;

        let by_path = instances
            .iter()
            .enumerate()
            .map(|(i, node)| (node.path.clone(), i))
            .collect();

        let mut nets = HashMap::new();
        for (index, node) in instances.iter().enumerate() {
            let Some(module) = modules.get(&node.definition) else {
                continue;
            };
            for (name, port) in &module.ports {
                nets.entry(format!("{}{separator}{name}", node.path))
                    .or_insert_with(|| NetRef {
                        instance: index,
                        bits: port.bits.clone(),
                    });
            }
            for (name, net) in module.netnames.iter().filter(|(_, n)| n.hide_name == 0) {
                nets.entry(format!("{}{separator}{name}", node.path))
                    .or_insert_with(|| NetRef {
                        instance: index,
                        bits: net.bits.clone(),
                    });
            }
        }

        Ok(Self {
            modules,
            instances,
            by_path,
            nets,
            separator,
        })
    }

    pub fn instances(&self) -> &[InstanceNode] {
        &self.instances
    }

    pub fn instance(&self, path: &str) -> Option<&InstanceNode> {
        self.by_path.get(path).map(|&i| &self.instances[i])
    }

    pub fn parent_of(&self, path: &str) -> Option<&InstanceNode> {
        self.instance(path)
            .and_then(|node| node.parent)
            .map(|p| &self.instances[p])
    }

    pub fn module(&self, name: &str) -> Option<&YosysModule> {
        self.modules.get(name)
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Arena indices of the instances driving the port or net `key`.
    ///
    /// Drivers are looked for among the children of the owning instance and,
    /// following input ports outwards, among the siblings at every enclosing
    /// level.
    pub fn drivers(&self, key: &str) -> Vec<usize> {
        let Some(net) = self.nets.get(key) else {
            return Vec::new();
        };
        let bits: HashSet<u64> = net.bits.iter().filter_map(Bit::net).collect();
        let mut out = Vec::new();
        self.drivers_in(net.instance, &bits, None, &mut out);
        self.climb(net.instance, &bits, &mut out);
        out
    }

    fn drivers_in(&self, scope: usize, bits: &HashSet<u64>, exclude: Option<usize>, out: &mut Vec<usize>) {
        for &child in &self.instances[scope].children {
            if Some(child) == exclude || out.contains(&child) {
                continue;
            }
            let node = &self.instances[child];
            let Some(module) = self.modules.get(&node.definition) else {
                continue;
            };
            let drives = node.connections.iter().any(|(port, conn)| {
                module.ports.get(port).is_some_and(|p| p.direction.drives())
                    && conn.iter().filter_map(Bit::net).any(|b| bits.contains(&b))
            });
            if drives {
                out.push(child);
            }
        }
    }

    fn climb(&self, inst: usize, bits: &HashSet<u64>, out: &mut Vec<usize>) {
        let node = &self.instances[inst];
        let (Some(parent), Some(module)) = (node.parent, self.modules.get(&node.definition)) else {
            return;
        };

        let mut outer = HashSet::new();
        for (name, port) in module.ports.iter().filter(|(_, p)| p.direction.receives()) {
            let Some(conn) = node.connections.get(name) else {
                continue;
            };
            for (inner, outside) in port.bits.iter().zip(conn) {
                if let (Some(i), Some(o)) = (inner.net(), outside.net()) {
                    if bits.contains(&i) {
                        outer.insert(o);
                    }
                }
            }
        }
        if outer.is_empty() {
            return;
        }
        self.drivers_in(parent, &outer, Some(inst), out);
        self.climb(parent, &outer, out);
    }
}

#[allow(clippy::too_many_arguments)]
fn instantiate(
    modules: &BTreeMap<String, YosysModule>,
    nodes: &mut Vec<InstanceNode>,
    parent: Option<usize>,
    name: &str,
    definition: &str,
    connections: BTreeMap<String, Vec<Bit>>,
    separator: char,
    ancestry: &mut Vec<String>,
) -> Result<()> {
    if ancestry.iter().any(|d| d == definition) {
        return Err(OozeError::load(
            "netlist",
            format!("module `{definition}` instantiates itself"),
        ));
    }
    let Some(module) = modules.get(definition) else {
        return Err(OozeError::load(
            "netlist",
            format!("module `{definition}` is not defined"),
        ));
    };

    let path = match parent {
        Some(p) => format!("{}{separator}{name}", nodes[p].path),
        None => name.to_string(),
    };
    let index = nodes.len();
    nodes.push(InstanceNode {
        path,
        name: name.to_string(),
        definition: definition.to_string(),
        parent,
        children: Vec::new(),
        connections,
    });
    if let Some(p) = parent {
        nodes[p].children.push(index);
    }

    ancestry.push(definition.to_string());
    for (cell_name, cell) in &module.cells {
        if modules.contains_key(&cell.cell_type) {
            instantiate(
                modules,
                nodes,
                Some(index),
                cell_name,
                &cell.cell_type,
                cell.connections.clone(),
                separator,
                ancestry,
            )?;
        }
    }
    ancestry.pop();
    Ok(())
}
