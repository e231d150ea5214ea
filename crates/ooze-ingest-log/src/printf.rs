//! printf-style line parser.
//!
//! The format string mirrors the `$display` call that produced the log:
//!
//! | token | captures | field kind |
//! |---|---|---|
//! | `%t` | decimal timestamp (exactly one) | time |
//! | `%d` | decimal integer | int |
//! | `%x` / `%X` | hexadecimal integer | hex |
//! | `%s` | word (`\w+`) | string |
//! | `%m` | hierarchical name (`a.b$c`) | string |
//! | `%f` | signed decimal float | float |
//!
//! Width digits (`%08X`) are ignored, `\` makes the next character literal and
//! everything else matches itself. The compiled pattern is searched, so a
//! line may carry a prefix or suffix the format does not mention.

use anyhow::{anyhow, bail, Context};
use ooze_query::{OozeError, TypeTag};
use regex::Regex;

use crate::{LogFieldKind, LogParser, LogRecord, LOG_ITEM};

#[derive(Debug, Clone)]
pub struct PrintfParser {
    regex: Regex,
    tokens: Vec<Token>,
    schema: Vec<(String, LogFieldKind)>,
    tag: TypeTag,
}

#[derive(Debug, Clone)]
enum Token {
    Time,
    Field(String, LogFieldKind),
}

impl PrintfParser {
    /// `names` label the non-time tokens, in order.
    pub fn new(format: &str, names: &[&str]) -> ooze_query::Result<Self> {
        let (pattern, kinds) = compile(format)?;

        let times = kinds.iter().filter(|k| **k == LogFieldKind::Time).count();
        if times != 1 {
            return Err(OozeError::Config(format!(
                "log format `{format}` needs exactly one %t, found {times}"
            )));
        }
        if kinds.len() - 1 != names.len() {
            return Err(OozeError::Config(format!(
                "log format `{format}` has {} value token(s) but {} name(s) were given",
                kinds.len() - 1,
                names.len()
            )));
        }

        let mut labels = names.iter();
        let mut tokens = Vec::with_capacity(kinds.len());
        let mut schema = Vec::with_capacity(names.len());
        for kind in kinds {
            if kind == LogFieldKind::Time {
                tokens.push(Token::Time);
            } else if let Some(name) = labels.next() {
                tokens.push(Token::Field((*name).to_string(), kind));
                schema.push(((*name).to_string(), kind));
            }
        }

        Ok(Self {
            regex: Regex::new(&pattern)?,
            tokens,
            schema,
            tag: TypeTag::unique("Log", &LOG_ITEM),
        })
    }

    /// Names this parser's record type. Parsers given the same name share
    /// one type; unnamed parsers each get a type of their own.
    pub fn with_type(mut self, name: &str) -> Self {
        self.tag = TypeTag::derived(name, &LOG_ITEM);
        self
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl LogParser for PrintfParser {
    fn record_type(&self) -> &TypeTag {
        &self.tag
    }

    fn schema(&self) -> &[(String, LogFieldKind)] {
        &self.schema
    }

    fn parse(&self, line: &str) -> anyhow::Result<LogRecord> {
        let caps = self
            .regex
            .captures(line)
            .ok_or_else(|| anyhow!("line does not match `{}`", self.regex.as_str()))?;

        let mut time = None;
        let mut fields = Vec::with_capacity(self.schema.len());
        for (i, token) in self.tokens.iter().enumerate() {
            let text = caps
                .get(i + 1)
                .map(|m| m.as_str())
                .ok_or_else(|| anyhow!("token {} did not capture", i + 1))?;
            match token {
                Token::Time => {
                    time = Some(text.parse::<i64>().with_context(|| format!("bad time `{text}`"))?)
                }
                Token::Field(name, kind) => fields.push((name, convert(*kind, text)?)),
            }
        }

        let Some(time) = time else {
            bail!("no timestamp captured");
        };
        let mut record = LogRecord::new(time);
        for (name, value) in fields {
            record = record.with(name.as_str(), value);
        }
        Ok(record)
    }
}

fn convert(kind: LogFieldKind, text: &str) -> anyhow::Result<ooze_query::Value> {
    let value = match kind {
        LogFieldKind::Int | LogFieldKind::Time => text
            .parse::<i64>()
            .with_context(|| format!("bad integer `{text}`"))?
            .into(),
        LogFieldKind::Hex => {
            let wide = u64::from_str_radix(text, 16)
                .with_context(|| format!("bad hex value `{text}`"))?;
            i64::try_from(wide)
                .map_err(|_| anyhow!("hex value `{text}` does not fit a signed 64-bit integer"))?
                .into()
        }
        LogFieldKind::Float => text
            .parse::<f64>()
            .with_context(|| format!("bad float `{text}`"))?
            .into(),
        LogFieldKind::Str => text.into(),
    };
    Ok(value)
}

/// Translates the format into a regex, one capture group per token.
fn compile(format: &str) -> ooze_query::Result<(String, Vec<LogFieldKind>)> {
    let mut pattern = String::with_capacity(format.len() * 2);
    let mut kinds = Vec::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(lit) => pattern.push_str(&regex::escape(lit.encode_utf8(&mut [0; 4]))),
                None => {
                    return Err(OozeError::Config(format!(
                        "log format `{format}` ends with a dangling escape"
                    )))
                }
            },
            '%' => {
                let conv = chars.by_ref().find(|c| !c.is_ascii_digit());
                let (kind, group) = match conv {
                    Some('t') => (LogFieldKind::Time, r"\s?(\d+)"),
                    Some('d') => (LogFieldKind::Int, r"\s?(\d+)"),
                    Some('x' | 'X') => (LogFieldKind::Hex, r"\s?([\da-fA-F]+)"),
                    Some('s') => (LogFieldKind::Str, r"(\w+)"),
                    Some('m') => (LogFieldKind::Str, r"([\w$.]+)"),
                    Some('f') => (LogFieldKind::Float, r"([+-]?(?:[0-9]*[.])?[0-9]+)"),
                    Some(other) => {
                        return Err(OozeError::Config(format!(
                            "log format `{format}` uses unknown conversion %{other}"
                        )))
                    }
                    None => {
                        return Err(OozeError::Config(format!(
                            "log format `{format}` ends inside a conversion"
                        )))
                    }
                };
                kinds.push(kind);
                pattern.push_str(group);
            }
            lit => pattern.push_str(&regex::escape(lit.encode_utf8(&mut [0; 4]))),
        }
    }
    Ok((pattern, kinds))
}
