//! Tokenizer for the flattened transcript format.
//!
//! A context is a run of `<Speaker> text </Speaker>` and
//! `<action> ... </action>` segments. Tags are recognised only when a `<` is
//! followed by a `>` with no other `<` in between; anything else is text.

use std::collections::HashSet;

/// Tag name used for stage directions
pub const ACTION_TAG: &str = "action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Open(&'a str),
    Close(&'a str),
    Text(&'a str),
}

/// Iterator over the tokens of a context string
pub struct Tokens<'a> {
    rest: &'a str,
}

pub fn tokenize(context: &str) -> Tokens<'_> {
    Tokens { rest: context }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = self.rest;
        if rest.is_empty() {
            return None;
        }

        if let Some(len) = tag_len(rest) {
            let inner = &rest[1..len - 1];
            self.rest = &rest[len..];
            return Some(match inner.strip_prefix('/') {
                Some(name) => Token::Close(name.trim()),
                None => Token::Open(inner.trim()),
            });
        }

        // Text runs up to the next '<' that starts a tag
        let end = rest
            .match_indices('<')
            .map(|(pos, _)| pos)
            .find(|&pos| pos > 0 && tag_len(&rest[pos..]).is_some())
            .unwrap_or(rest.len());
        let (text, tail) = rest.split_at(end);
        self.rest = tail;
        Some(Token::Text(text))
    }
}

/// Byte length of the tag at the start of `s`, if `s` starts with one
fn tag_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('<')?;
    let close = body.find(|c: char| c == '<' || c == '>')?;
    if body.as_bytes()[close] != b'>' || body[..close].trim().is_empty() {
        return None;
    }
    Some(close + 2)
}

/// Names of opening tags in first-appearance order, without duplicates,
/// skipping any name in `excluded`.
pub fn speaker_tags<'a>(context: &'a str, excluded: &[&str]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    tokenize(context)
        .filter_map(|token| match token {
            Token::Open(name) => Some(name),
            _ => None,
        })
        .filter(|name| !name.is_empty() && !excluded.iter().any(|ex| ex == name))
        .filter(|name| seen.insert(*name))
        .collect()
}
