//! VCD tokenizer.
//!
//! VCD is a whitespace-separated command stream. Each call to
//! [`next_command`] consumes one command: a header section
//! (`$scope ... $end`, `$var ... $end`, ...), a timestamp (`#100`) or a value
//! change (`1!`, `b1010 %`, `r0.5 #`).

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{map, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command<'a> {
    Scope(&'a str),
    Upscope,
    Var(VarDecl<'a>),
    EndDefinitions,
    /// `$dumpvars`/`$dumpon`/... openers and the bare `$end` closing them.
    DumpMarker,
    /// Any other `$keyword ... $end` section.
    Section(&'a str),
    Time(u64),
    Change { code: &'a str, value: RawValue<'a> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VarDecl<'a> {
    pub kind: &'a str,
    pub width: u32,
    pub code: &'a str,
    pub name: &'a str,
    pub range: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RawValue<'a> {
    Scalar(char),
    Vector(&'a str),
    Real(&'a str),
}

// ============================================================================
// Parsers
// ============================================================================

fn word(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(i)
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(multispace0, inner)
}

fn end(i: &str) -> IResult<&str, &str> {
    ws(tag("$end"))(i)
}

fn scope(i: &str) -> IResult<&str, Command<'_>> {
    map(
        tuple((tag("$scope"), ws(word), ws(word), end)),
        |(_, _kind, name, _)| Command::Scope(name),
    )(i)
}

fn upscope(i: &str) -> IResult<&str, Command<'_>> {
    map(pair(tag("$upscope"), end), |_| Command::Upscope)(i)
}

fn enddefinitions(i: &str) -> IResult<&str, Command<'_>> {
    map(pair(tag("$enddefinitions"), end), |_| Command::EndDefinitions)(i)
}

fn range(i: &str) -> IResult<&str, &str> {
    recognize(tuple((char('['), take_until("]"), char(']'))))(i)
}

fn var(i: &str) -> IResult<&str, Command<'_>> {
    map(
        tuple((
            tag("$var"),
            ws(word),
            ws(map_res(digit1, str::parse::<u32>)),
            ws(word),
            ws(word),
            opt(ws(range)),
            end,
        )),
        |(_, kind, width, code, name, range, _)| {
            Command::Var(VarDecl {
                kind,
                width,
                code,
                name,
                range,
            })
        },
    )(i)
}

fn section(i: &str) -> IResult<&str, Command<'_>> {
    let (i, keyword) = preceded(
        char('$'),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    )(i)?;
    match keyword {
        "dumpvars" | "dumpall" | "dumpon" | "dumpoff" | "end" => Ok((i, Command::DumpMarker)),
        _ => {
            let (i, _) = take_until("$end")(i)?;
            let (i, _) = tag("$end")(i)?;
            Ok((i, Command::Section(keyword)))
        }
    }
}

fn time(i: &str) -> IResult<&str, Command<'_>> {
    map(
        map_res(preceded(char('#'), digit1), str::parse::<u64>),
        Command::Time,
    )(i)
}

fn vector(i: &str) -> IResult<&str, Command<'_>> {
    map(
        pair(preceded(one_of("bB"), word), ws(word)),
        |(value, code)| Command::Change {
            code,
            value: RawValue::Vector(value),
        },
    )(i)
}

fn real(i: &str) -> IResult<&str, Command<'_>> {
    map(
        pair(preceded(one_of("rR"), word), ws(word)),
        |(value, code)| Command::Change {
            code,
            value: RawValue::Real(value),
        },
    )(i)
}

fn scalar(i: &str) -> IResult<&str, Command<'_>> {
    map(pair(one_of("01xzXZ"), word), |(value, code)| {
        Command::Change {
            code,
            value: RawValue::Scalar(value),
        }
    })(i)
}

pub(crate) fn next_command(i: &str) -> IResult<&str, Command<'_>> {
    preceded(
        multispace0,
        alt((
            scope,
            upscope,
            var,
            enddefinitions,
            section,
            time,
            vector,
            real,
            scalar,
        )),
    )(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(mut input: &str) -> Vec<Command<'_>> {
        let mut out = Vec::new();
        while !input.trim().is_empty() {
            let (rest, cmd) = next_command(input).unwrap();
            out.push(cmd);
            input = rest;
        }
        out
    }

    #[test]
    fn header_commands() {
        let cmds = all(
            "$date today $end\n$timescale 1ns $end\n$scope module top $end\n\
             $var wire 8 # data [7:0] $end\n$var reg 1 ! clk $end\n$upscope $end\n\
             $enddefinitions $end",
        );
        assert_eq!(cmds[0], Command::Section("date"));
        assert_eq!(cmds[1], Command::Section("timescale"));
        assert_eq!(cmds[2], Command::Scope("top"));
        assert_eq!(
            cmds[3],
            Command::Var(VarDecl {
                kind: "wire",
                width: 8,
                code: "#",
                name: "data",
                range: Some("[7:0]"),
            })
        );
        assert!(matches!(cmds[4], Command::Var(VarDecl { range: None, name: "clk", .. })));
        assert_eq!(cmds[5], Command::Upscope);
        assert_eq!(cmds[6], Command::EndDefinitions);
    }

    #[test]
    fn value_changes() {
        let cmds = all("#0\n$dumpvars\n0!\nb1010 #\nr1.5 $\n$end\n#15\nx!\nB1z %");
        assert_eq!(
            cmds,
            vec![
                Command::Time(0),
                Command::DumpMarker,
                Command::Change {
                    code: "!",
                    value: RawValue::Scalar('0')
                },
                Command::Change {
                    code: "#",
                    value: RawValue::Vector("1010")
                },
                Command::Change {
                    code: "$",
                    value: RawValue::Real("1.5")
                },
                Command::DumpMarker,
                Command::Time(15),
                Command::Change {
                    code: "!",
                    value: RawValue::Scalar('x')
                },
                Command::Change {
                    code: "%",
                    value: RawValue::Vector("1z")
                },
            ]
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(next_command("@12").is_err());
        assert!(next_command("$comment never closed").is_err());
    }
}
