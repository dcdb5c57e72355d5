//! DSL grammar
//!
//! ```text
//! dsl   := ε | term ("." term)*
//! term  := name "(" [arg ("," arg)*] ")"
//! arg   := token [":" token?]
//! token := [A-Za-z0-9_+-]+
//! ```
//!
//! Syntax is checked first with nom; the resulting raw terms are then lowered
//! into a [`ConstraintSet`], which is where function names and argument
//! shapes are validated. Any failure rejects the whole string.

use crate::constraint::{Category, ConstraintSet};
use crate::error::{DslError, Result};
use crate::window::{Bound, Window};
use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char as pchar, multispace0},
    combinator::{all_consuming, opt},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult,
};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

#[derive(Debug)]
struct RawTerm<'a> {
    name: &'a str,
    args: Vec<RawArg<'a>>,
}

#[derive(Debug)]
struct RawArg<'a> {
    head: &'a str,
    tail: Option<&'a str>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn arg(input: &str) -> IResult<&str, RawArg<'_>> {
    let (input, head) = ws(take_while1(is_token_char))(input)?;
    let (input, tail) = opt(preceded(pchar(':'), ws(take_while(is_token_char))))(input)?;
    Ok((input, RawArg { head, tail }))
}

fn term(input: &str) -> IResult<&str, RawTerm<'_>> {
    let (input, name) = ws(take_while1(is_name_char))(input)?;
    let (input, args) = delimited(
        pchar('('),
        separated_list0(pchar(','), arg),
        ws(pchar(')')),
    )(input)?;
    Ok((input, RawTerm { name, args }))
}

fn terms(input: &str) -> IResult<&str, Vec<RawTerm<'_>>> {
    separated_list1(pchar('.'), term)(input)
}

/// Parse DSL text into a constraint set
///
/// Empty or whitespace-only text yields the empty set.
///
/// # Errors
/// Returns error if any term is malformed, names an unknown function, or
/// carries arguments of the wrong shape
pub fn parse(text: &str) -> Result<ConstraintSet> {
    if text.trim().is_empty() {
        return Ok(ConstraintSet::new());
    }

    let raw = match all_consuming(terms)(text) {
        Ok((_, raw)) => raw,
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            let message = match e.input.chars().next() {
                Some(c) => format!("unexpected '{c}'"),
                None => "unexpected end of input".to_string(),
            };
            return Err(DslError::Syntax {
                input: text.to_string(),
                offset: text.len() - e.input.len(),
                message,
            });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(DslError::Syntax {
                input: text.to_string(),
                offset: text.len(),
                message: "unexpected end of input".to_string(),
            });
        }
    };

    let mut set = ConstraintSet::new();
    for term in raw {
        lower(&mut set, &term)?;
    }
    Ok(set)
}

impl FromStr for ConstraintSet {
    type Err = DslError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

fn lower(set: &mut ConstraintSet, term: &RawTerm<'_>) -> Result<()> {
    let category = Category::from_function(term.name).ok_or_else(|| DslError::UnknownFunction {
        name: term.name.to_string(),
    })?;
    let function = category.function();
    if term.args.is_empty() {
        return Err(DslError::invalid_argument(function, "expects at least one argument"));
    }

    match category {
        Category::Window => {
            let [range] = term.args.as_slice() else {
                return Err(DslError::invalid_argument(function, "expects exactly one range"));
            };
            let start: Bound = range.head.parse()?;
            let end = match range.tail {
                None | Some("") => None,
                Some(end) => Some(end.parse::<Bound>()?),
            };
            set.window = Some(Window { start, end });
        }
        Category::Context => {
            let context = set.context.get_or_insert_with(BTreeMap::new);
            for arg in &term.args {
                let value = match arg.tail {
                    None => None,
                    Some("") => {
                        return Err(DslError::invalid_argument(
                            function,
                            format!("empty value for key '{}'", arg.head),
                        ))
                    }
                    Some(v) => Some(v.to_string()),
                };
                context.insert(arg.head.to_string(), value);
            }
        }
        Category::ContextAny => {
            let any = set.context_any.get_or_insert_with(BTreeMap::new);
            for arg in &term.args {
                let value = pair_value(function, arg)?;
                any.entry(arg.head.to_string())
                    .or_insert_with(BTreeSet::new)
                    .insert(value.to_string());
            }
        }
        Category::Case => {
            let case = set.case.get_or_insert_with(BTreeMap::new);
            for arg in &term.args {
                let variant = pair_value(function, arg)?;
                case.insert(arg.head.to_string(), variant.to_string());
            }
        }
        Category::Visited => {
            let names = names(function, &term.args)?;
            set.visited.get_or_insert_with(BTreeSet::new).extend(names);
        }
        Category::VisitedAny => {
            let group = names(function, &term.args)?;
            set.visited_any.get_or_insert_with(Vec::new).push(group);
        }
        Category::Exclude => {
            let names = names(function, &term.args)?;
            set.exclude.get_or_insert_with(BTreeSet::new).extend(names);
        }
    }
    Ok(())
}

fn pair_value<'a>(function: &str, arg: &RawArg<'a>) -> Result<&'a str> {
    match arg.tail {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DslError::invalid_argument(
            function,
            format!("expected '{}:<value>'", arg.head),
        )),
    }
}

fn names(function: &str, args: &[RawArg<'_>]) -> Result<BTreeSet<String>> {
    args.iter()
        .map(|arg| match arg.tail {
            None => Ok(arg.head.to_string()),
            Some(_) => Err(DslError::invalid_argument(
                function,
                format!("unexpected ':' after '{}'", arg.head),
            )),
        })
        .collect()
}
