//! Log source for Ooze.
//!
//! Every non-blank line of a log file becomes one record carrying a `time`
//! field plus the fields its [`LogParser`] declares. Two parsers are provided
//! for: [`PrintfParser`], built from the `$display` format string, and any
//! user type implementing [`LogParser`].
//!
//! All records are `LogItem`s; each parser additionally tags its records with
//! its own type (derived from `LogItem`) so `select` can tell them apart.

pub mod printf;

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use ooze_query::{DataSource, OozeError, QueryObject, Result, TypeTag, Value};
use tracing::debug;

pub use printf::PrintfParser;

/// Every log record is (a refinement of) this type.
pub const LOG_ITEM: TypeTag = TypeTag::named("LogItem");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFieldKind {
    Int,
    Hex,
    Float,
    Str,
    Time,
}

impl LogFieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            LogFieldKind::Int | LogFieldKind::Hex | LogFieldKind::Time => {
                matches!(value, Value::Int(_))
            }
            LogFieldKind::Float => matches!(value, Value::Float(_)),
            LogFieldKind::Str => matches!(value, Value::Str(_)),
        }
    }
}

/// One parsed line. The time is mandatory.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    time: i64,
    values: BTreeMap<String, Value>,
}

impl LogRecord {
    pub fn new(time: i64) -> Self {
        Self {
            time,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Line parsing strategy.
pub trait LogParser: Send + Sync {
    /// Type given to this parser's records.
    fn record_type(&self) -> &TypeTag;

    /// Declared output fields, excluding `time`.
    fn schema(&self) -> &[(String, LogFieldKind)];

    fn parse(&self, line: &str) -> anyhow::Result<LogRecord>;
}

// ============================================================================
// Source
// ============================================================================

#[derive(Debug, Default)]
pub struct LogSource {
    records: Vec<QueryObject>,
    types: Vec<TypeTag>,
}

impl LogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` line by line. Returns the number of records added; on
    /// any error nothing from this file is kept.
    pub fn add_file(&mut self, path: impl AsRef<Path>, parser: &dyn LogParser) -> Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| OozeError::io(path, e))?;
        self.add_reader(&path.display().to_string(), std::io::BufReader::new(file), parser)
    }

    pub fn add_lines(&mut self, origin: &str, text: &str, parser: &dyn LogParser) -> Result<usize> {
        self.add_reader(origin, text.as_bytes(), parser)
    }

    pub fn add_reader(
        &mut self,
        origin: &str,
        reader: impl BufRead,
        parser: &dyn LogParser,
    ) -> Result<usize> {
        let tag = parser.record_type().clone();
        let mut parsed = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let lineno = index + 1;
            let line = line.map_err(|e| OozeError::load_at(origin, lineno, e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = parser
                .parse(&line)
                .map_err(|e| OozeError::load_at(origin, lineno, format!("{e:#}")))?;
            let object = to_object(&tag, parser.schema(), record)
                .map_err(|msg| OozeError::load_at(origin, lineno, msg))?;
            parsed.push(object);
        }

        let added = parsed.len();
        debug!(origin, records = added, tag = %tag, "parsed log");
        self.records.extend(parsed);
        if !self.types.contains(&tag) {
            self.types.push(tag);
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn to_object(
    tag: &TypeTag,
    schema: &[(String, LogFieldKind)],
    record: LogRecord,
) -> std::result::Result<QueryObject, String> {
    for (name, kind) in schema {
        let value = record
            .values
            .get(name)
            .ok_or_else(|| format!("parser did not produce declared field `{name}`"))?;
        if !kind.accepts(value) {
            return Err(format!(
                "field `{name}` is {} but was declared {kind:?}",
                value.kind_name()
            ));
        }
    }
    if let Some(extra) = record
        .values
        .keys()
        .find(|k| !schema.iter().any(|(name, _)| name == *k))
    {
        return Err(format!("parser produced undeclared field `{extra}`"));
    }

    let mut builder = QueryObject::builder(tag.clone()).field("time", record.time);
    for (name, value) in record.values {
        builder = builder.field(name, value);
    }
    Ok(builder.build())
}

impl DataSource for LogSource {
    fn name(&self) -> &str {
        "log"
    }

    fn provides(&self) -> Vec<TypeTag> {
        let mut tags = vec![LOG_ITEM];
        tags.extend(self.types.iter().cloned());
        tags
    }

    fn select(&self, tags: &[TypeTag]) -> Result<Vec<QueryObject>> {
        Ok(self
            .records
            .iter()
            .filter(|r| tags.iter().any(|t| r.tag().is(t)))
            .cloned()
            .collect())
    }
}
