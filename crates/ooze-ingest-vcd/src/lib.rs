//! Waveform (VCD) source for Ooze.
//!
//! A VCD file is parsed once into a [`Waveform`]: one [`Signal`] per declared
//! variable, each pointing at a [`Timeline`] of value changes with strictly
//! increasing times. Variables declared with the same identifier code share a
//! timeline.
//!
//! [`VcdSource`] exposes the signals as `VcdSignal` records keyed by their
//! hierarchical path. Values are read through the mapping functions
//! [`get_value`] and [`pre_value`], which produce `VcdValue` records.

mod parser;

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use ooze_query::{
    DataSource, Element, OozeError, QueryObject, Result, TypeTag, DEFAULT_SEPARATOR,
};
use tracing::{debug, warn};

use parser::{next_command, Command, RawValue};

pub const VCD_SIGNAL: TypeTag = TypeTag::named("VcdSignal");
pub const VCD_VALUE: TypeTag = TypeTag::named("VcdValue");

// ============================================================================
// Waveform model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Bit string, most significant bit first; may contain `x`/`z`.
    Bits(String),
    Real(f64),
}

impl Sample {
    /// Integer reading; `x` and `z` bits read as 0, bits past 64 are dropped.
    pub fn as_uint(&self) -> u64 {
        match self {
            Sample::Bits(bits) => bits
                .chars()
                .fold(0u64, |acc, c| (acc << 1) | u64::from(c == '1')),
            Sample::Real(v) => *v as u64,
        }
    }

    pub fn raw(&self) -> String {
        match self {
            Sample::Bits(bits) => bits.clone(),
            Sample::Real(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub time: u64,
    pub sample: Sample,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    changes: Vec<Change>,
}

impl Timeline {
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Latest change at or before `time`.
    pub fn value_at(&self, time: u64) -> Option<&Change> {
        let idx = self.changes.partition_point(|c| c.time <= time);
        idx.checked_sub(1).map(|i| &self.changes[i])
    }

    /// Latest change strictly before `time`.
    pub fn before(&self, time: u64) -> Option<&Change> {
        let idx = self.changes.partition_point(|c| c.time < time);
        idx.checked_sub(1).map(|i| &self.changes[i])
    }

    fn record(&mut self, time: u64, sample: Sample) {
        match self.changes.last_mut() {
            Some(last) if last.time == time => last.sample = sample,
            _ => self.changes.push(Change { time, sample }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub path: String,
    pub name: String,
    pub width: u32,
    pub kind: String,
    timeline: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Waveform {
    signals: Vec<Signal>,
    timelines: Vec<Timeline>,
    by_path: HashMap<String, usize>,
    times: BTreeSet<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformStats {
    pub signals: usize,
    pub aliased: usize,
    pub changes: usize,
}

impl Waveform {
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn signal(&self, path: &str) -> Option<&Signal> {
        self.by_path.get(path).map(|&i| &self.signals[i])
    }

    pub fn timeline(&self, signal: &Signal) -> &Timeline {
        &self.timelines[signal.timeline]
    }

    /// Every time at which at least one signal changes.
    pub fn times(&self) -> impl Iterator<Item = u64> + '_ {
        self.times.iter().copied()
    }

    pub fn stats(&self) -> WaveformStats {
        WaveformStats {
            signals: self.signals.len(),
            aliased: self.signals.len() - self.timelines.len(),
            changes: self.timelines.iter().map(|t| t.changes.len()).sum(),
        }
    }

    fn parse(origin: &str, text: &str, separator: char) -> Result<Self> {
        let mut wave = Waveform::default();
        let mut scopes: Vec<&str> = Vec::new();
        let mut codes: HashMap<&str, usize> = HashMap::new();
        let mut now = 0u64;
        let mut input = text;

        loop {
            let rest = input.trim_start();
            if rest.is_empty() {
                break;
            }
            let line = || line_of(text, rest);
            let (next, cmd) = next_command(rest).map_err(|_| {
                let snippet: String = rest.chars().take(24).collect();
                OozeError::load_at(origin, line(), format!("unexpected input `{snippet}`"))
            })?;
            input = next;

            match cmd {
                Command::Scope(name) => scopes.push(name),
                Command::Upscope => {
                    if scopes.pop().is_none() {
                        return Err(OozeError::load_at(
                            origin,
                            line(),
                            "$upscope without $scope",
                        ));
                    }
                }
                Command::Var(decl) => {
                    let timeline = *codes.entry(decl.code).or_insert_with(|| {
                        wave.timelines.push(Timeline::default());
                        wave.timelines.len() - 1
                    });
                    let mut path = String::new();
                    for scope in &scopes {
                        path.push_str(scope);
                        path.push(separator);
                    }
                    path.push_str(decl.name);
                    wave.by_path.entry(path.clone()).or_insert(wave.signals.len());
                    wave.signals.push(Signal {
                        path,
                        name: decl.name.to_string(),
                        width: decl.width,
                        kind: decl.kind.to_string(),
                        timeline,
                    });
                }
                Command::EndDefinitions | Command::DumpMarker => {}
                Command::Section(keyword) => match keyword {
                    "date" | "version" | "timescale" | "comment" => {}
                    other => {
                        warn!(origin, line = line(), section = other, "skipping unknown VCD section")
                    }
                },
                Command::Time(t) => {
                    if t < now {
                        return Err(OozeError::load_at(
                            origin,
                            line(),
                            format!("time #{t} goes backwards from #{now}"),
                        ));
                    }
                    now = t;
                }
                Command::Change { code, value } => {
                    let Some(&timeline) = codes.get(code) else {
                        return Err(OozeError::load_at(
                            origin,
                            line(),
                            format!("value change for undeclared code `{code}`"),
                        ));
                    };
                    let sample = match value {
                        RawValue::Scalar(c) => Sample::Bits(c.to_ascii_lowercase().to_string()),
                        RawValue::Vector(bits) => Sample::Bits(bits.to_ascii_lowercase()),
                        RawValue::Real(real) => Sample::Real(real.parse().map_err(|_| {
                            OozeError::load_at(origin, line(), format!("bad real value `{real}`"))
                        })?),
                    };
                    wave.timelines[timeline].record(now, sample);
                    wave.times.insert(now);
                }
            }
        }

        if !scopes.is_empty() {
            return Err(OozeError::load(origin, "unterminated $scope"));
        }
        Ok(wave)
    }
}

fn line_of(text: &str, rest: &str) -> usize {
    text[..text.len() - rest.len()].matches('\n').count() + 1
}

// ============================================================================
// Source
// ============================================================================

/// Reader options.
#[derive(Debug, Clone)]
pub struct VcdReader {
    separator: char,
}

impl Default for VcdReader {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl VcdReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<VcdSource> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| OozeError::io(path, e))?;
        self.read_text(&path.display().to_string(), &text)
    }

    pub fn read_text(&self, origin: &str, text: &str) -> Result<VcdSource> {
        let waveform = Waveform::parse(origin, text, self.separator)?;
        let stats = waveform.stats();
        debug!(
            origin,
            signals = stats.signals,
            aliased = stats.aliased,
            changes = stats.changes,
            "parsed VCD"
        );
        Ok(VcdSource {
            origin: origin.to_string(),
            waveform: Arc::new(waveform),
        })
    }
}

pub struct VcdSource {
    origin: String,
    waveform: Arc<Waveform>,
}

impl VcdSource {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        VcdReader::new().read_file(path)
    }

    pub fn from_text(origin: &str, text: &str) -> Result<Self> {
        VcdReader::new().read_text(origin, text)
    }

    /// Shared handle for [`get_value`] / [`pre_value`].
    pub fn waveform(&self) -> Arc<Waveform> {
        Arc::clone(&self.waveform)
    }

    pub fn stats(&self) -> WaveformStats {
        self.waveform.stats()
    }

    fn signal_record(&self, signal: &Signal) -> QueryObject {
        QueryObject::builder(VCD_SIGNAL)
            .key(signal.path.clone())
            .field("path", signal.path.clone())
            .field("name", signal.name.clone())
            .field("width", signal.width)
            .field("kind", signal.kind.clone())
            .field("changes", self.waveform.timeline(signal).changes.len())
            .build()
    }
}

impl DataSource for VcdSource {
    fn name(&self) -> &str {
        &self.origin
    }

    fn provides(&self) -> Vec<TypeTag> {
        vec![VCD_SIGNAL]
    }

    fn select(&self, tags: &[TypeTag]) -> Result<Vec<QueryObject>> {
        if !tags.iter().any(|t| VCD_SIGNAL.is(t)) {
            return Ok(Vec::new());
        }
        Ok(self
            .waveform
            .signals
            .iter()
            .map(|s| self.signal_record(s))
            .collect())
    }

    fn lookup(&self, tag: &TypeTag, key: &str) -> Result<Vec<QueryObject>> {
        if !VCD_SIGNAL.is(tag) {
            return Ok(Vec::new());
        }
        Ok(self
            .waveform
            .signal(key)
            .map(|s| self.signal_record(s))
            .into_iter()
            .collect())
    }
}

// ============================================================================
// Mapping functions
// ============================================================================

fn value_record(signal: &Signal, change: &Change) -> Result<QueryObject> {
    let time = i64::try_from(change.time)
        .map_err(|_| OozeError::resolution(&signal.path, "time does not fit a signed 64-bit integer"))?;
    let value = i64::try_from(change.sample.as_uint())
        .map_err(|_| OozeError::resolution(&signal.path, "value does not fit a signed 64-bit integer"))?;
    Ok(QueryObject::builder(VCD_VALUE)
        .key(signal.path.clone())
        .field("path", signal.path.clone())
        .field("name", signal.name.clone())
        .field("time", time)
        .field("value", value)
        .field("raw", change.sample.raw())
        .build())
}

fn signal_of<'w>(waveform: &'w Waveform, element: &Element) -> Result<&'w Signal> {
    let key = element
        .key()
        .ok_or_else(|| OozeError::resolution(element.to_string(), "element has no path"))?;
    waveform
        .signal(key)
        .ok_or_else(|| OozeError::resolution(key, "not a signal of this waveform"))
}

/// Maps a signal to its value at `time`: the latest change at or before it.
pub fn get_value(waveform: &Arc<Waveform>, time: u64) -> impl Fn(&Element) -> Result<Element> {
    let waveform = Arc::clone(waveform);
    move |element: &Element| {
        let signal = signal_of(&waveform, element)?;
        let change = waveform
            .timeline(signal)
            .value_at(time)
            .ok_or_else(|| OozeError::resolution(&signal.path, format!("no value at or before #{time}")))?;
        Ok(Element::Object(value_record(signal, change)?))
    }
}

/// Maps a value (from [`get_value`]) to the change right before it.
pub fn pre_value(waveform: &Arc<Waveform>) -> impl Fn(&Element) -> Result<Element> {
    let waveform = Arc::clone(waveform);
    move |element: &Element| {
        let signal = signal_of(&waveform, element)?;
        let time = u64::try_from(element.int("time")?)
            .map_err(|_| OozeError::resolution(&signal.path, "negative time"))?;
        let change = waveform
            .timeline(signal)
            .before(time)
            .ok_or_else(|| OozeError::resolution(&signal.path, format!("no change before #{time}")))?;
        Ok(Element::Object(value_record(signal, change)?))
    }
}
