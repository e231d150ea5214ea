//! Serde model of the Yosys `write_json` netlist format.
//!
//! Only the parts needed for hierarchy and connectivity are modelled; unknown
//! keys (parameters, attributes other than `top`, `creator`, ...) are ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YosysDesign {
    #[serde(default)]
    pub modules: BTreeMap<String, YosysModule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YosysModule {
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub ports: BTreeMap<String, YosysPort>,
    #[serde(default)]
    pub cells: BTreeMap<String, YosysCell>,
    #[serde(default)]
    pub netnames: BTreeMap<String, YosysNetname>,
}

impl YosysModule {
    /// Yosys marks the top module with a `top` attribute holding a binary
    /// string (`"00000000000000000000000000000001"`) or a number.
    pub fn is_marked_top(&self) -> bool {
        match self.attributes.get("top") {
            Some(serde_json::Value::String(s)) => s.contains('1'),
            Some(serde_json::Value::Number(n)) => n.as_u64().is_some_and(|v| v != 0),
            Some(serde_json::Value::Bool(b)) => *b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
    Inout,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
            Direction::Inout => "inout",
        }
    }

    pub fn drives(self) -> bool {
        matches!(self, Direction::Output | Direction::Inout)
    }

    pub fn receives(self) -> bool {
        matches!(self, Direction::Input | Direction::Inout)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YosysPort {
    pub direction: Direction,
    #[serde(default)]
    pub bits: Vec<Bit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YosysCell {
    #[serde(rename = "type")]
    pub cell_type: String,
    #[serde(default)]
    pub port_directions: BTreeMap<String, Direction>,
    #[serde(default)]
    pub connections: BTreeMap<String, Vec<Bit>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YosysNetname {
    #[serde(default)]
    pub hide_name: u8,
    #[serde(default)]
    pub bits: Vec<Bit>,
}

/// A net bit: a numbered signal or a constant (`"0"`, `"1"`, `"x"`, `"z"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Bit {
    Net(u64),
    Const(String),
}

impl Bit {
    pub fn net(&self) -> Option<u64> {
        match self {
            Bit::Net(id) => Some(*id),
            Bit::Const(_) => None,
        }
    }
}
