//! `FromStr` for [`Message`].
//!
//! Tokenised with `nom`: optional `@tags`, optional `:source`, a mandatory
//! command, middle params, then an optional `:trailing` that swallows the
//! rest of the line.

use std::str::FromStr;

use nom::{
    bytes::complete::{take_till, take_till1, take_while},
    character::complete::char,
    combinator::{not, opt, rest},
    multi::many0,
    sequence::{pair, preceded},
    IResult,
};

use crate::command::Command;
use crate::error::MessageParseError;
use crate::source::Source;

use super::tags::Tags;
use super::types::Message;

fn spaces(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c == ' ')(input)
}

/// `@` followed by the tag block, which may be empty.
fn tag_block(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_till(|c: char| c == ' '))(input)
}

/// `:` followed by the source token, which may be empty.
fn source_token(input: &str) -> IResult<&str, &str> {
    preceded(pair(spaces, char(':')), take_till(|c: char| c == ' '))(input)
}

fn verb(input: &str) -> IResult<&str, &str> {
    preceded(spaces, take_till1(|c: char| c == ' '))(input)
}

fn middle_param(input: &str) -> IResult<&str, &str> {
    preceded(
        pair(spaces, not(char(':'))),
        take_till1(|c: char| c == ' '),
    )(input)
}

fn trailing_text(input: &str) -> IResult<&str, &str> {
    preceded(pair(spaces, char(':')), rest)(input)
}

fn params(input: &str) -> IResult<&str, (Vec<&str>, Option<&str>)> {
    pair(many0(middle_param), opt(trailing_text))(input)
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let line = s.strip_suffix('\n').unwrap_or(s);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let (input, block) =
            opt(tag_block)(line).map_err(|_| MessageParseError::InvalidTags)?;
        let tags = block.map(Tags::parse).transpose()?;

        let (input, token) =
            opt(source_token)(input).map_err(|_| MessageParseError::InvalidSource)?;
        let source = token.map(str::parse::<Source>).transpose()?;

        let had_prefix = tags.is_some() || source.is_some();
        let (input, name) = match verb(input) {
            Ok(found) => found,
            Err(_) if had_prefix => return Err(MessageParseError::PartialMessage),
            Err(_) => return Err(MessageParseError::NoCommand),
        };
        let command: Command = name.parse()?;

        let (_, (middle, trailing)) =
            params(input).map_err(|_| MessageParseError::PartialMessage)?;

        Ok(Message {
            raw: line.to_owned(),
            tags,
            source,
            command,
            params: middle.into_iter().map(str::to_owned).collect(),
            trailing: trailing.map(str::to_owned),
        })
    }
}
