//! Spec-file tokenizer using nom
//!
//! Splits JavaScript source into the tokens the spec-file grammar works on.
//! Whitespace and comments are not tokens; each token only records whether a
//! line break preceded it, which is all the statement grammar needs for
//! automatic semicolon insertion.
//!
//! # Token grammar
//!
//! ```ebnf
//! trivia     = { whitespace | line_comment | block_comment };
//! token      = identifier | string | template | number | regex | punctuator;
//! identifier = (letter | "_" | "$"), { letter | digit | "_" | "$" };
//! string     = "'", { char | escape }, "'" | '"', { char | escape }, '"';
//! template   = "`", { char | escape | "${", balanced, "}" }, "`";
//! number     = digits, [".", digits], [exponent] | ".", digits, [exponent] | "0x", hexdigits;
//! regex      = "/", { char | class | escape }, "/", { letter };   (* only where an operand is expected *)
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until, take_while},
    character::complete::{
        alpha1, alphanumeric1, char, digit0, digit1, hex_digit1, multispace1, not_line_ending,
        one_of,
    },
    combinator::{opt, recognize},
    error::{Error, ErrorKind},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

use super::ParseError;
use crate::ast::Span;

/// Punctuators, longest first so the first match is the longest one
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@", "#",
];

/// Keywords after which a `/` starts a regular expression rather than a division
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "await", "yield",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident,
    Str { value: String, quote: char },
    Template { raw: String, cooked: Option<String> },
    Number,
    Regex,
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appears between the previous token and this one
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Ident)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        self.span.slice(source)
    }
}

/// Tokenize a whole source file. The last token is always `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut rest = source;

    loop {
        let (after_trivia, trivia) = trivia(rest).map_err(|_| {
            ParseError::at(source, offset_of(source, rest), "invalid whitespace or comment")
        })?;
        let newline_before = trivia.contains('\n') || trivia.contains('\r');
        rest = after_trivia;
        let start = offset_of(source, rest);

        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
                newline_before,
            });
            return Ok(tokens);
        }
        if rest.starts_with("/*") {
            return Err(ParseError::at(source, start, "unterminated block comment"));
        }

        let regex_allowed = regex_allowed_after(tokens.last(), source);
        let (after_token, kind) = next_token(rest, regex_allowed)
            .map_err(|_| ParseError::at(source, start, describe_failure(rest)))?;

        tokens.push(Token {
            kind,
            span: Span::new(start, offset_of(source, after_token)),
            newline_before,
        });
        rest = after_token;
    }
}

fn offset_of(source: &str, rest: &str) -> usize {
    source.len() - rest.len()
}

fn describe_failure(rest: &str) -> String {
    match rest.chars().next() {
        Some('\'') | Some('"') => "unterminated string literal".to_string(),
        Some('`') => "unterminated template literal".to_string(),
        Some('/') => "unterminated regular expression".to_string(),
        Some(c) => format!("unexpected character '{c}'"),
        None => "unexpected end of input".to_string(),
    }
}

fn regex_allowed_after(previous: Option<&Token>, source: &str) -> bool {
    match previous {
        None => true,
        Some(token) => match &token.kind {
            TokenKind::Punct(p) => !matches!(*p, ")" | "]" | "}"),
            TokenKind::Ident => REGEX_PRECEDING_KEYWORDS.contains(&token.text(source)),
            _ => false,
        },
    }
}

fn next_token(input: &str, regex_allowed: bool) -> IResult<&str, TokenKind> {
    if regex_allowed && input.starts_with('/') {
        if let Ok((rest, _)) = regex_literal(input) {
            return Ok((rest, TokenKind::Regex));
        }
    }
    match input.chars().next() {
        Some('\'') | Some('"') => {
            let (rest, (value, quote)) = string_literal(input)?;
            Ok((rest, TokenKind::Str { value, quote }))
        }
        Some('`') => {
            let (rest, (raw, cooked)) = template_literal(input)?;
            Ok((rest, TokenKind::Template { raw, cooked }))
        }
        _ => {
            if let Ok((rest, _)) = number_literal(input) {
                return Ok((rest, TokenKind::Number));
            }
            if let Ok((rest, _)) = identifier(input) {
                return Ok((rest, TokenKind::Ident));
            }
            let (rest, punct) = punctuator(input)?;
            Ok((rest, TokenKind::Punct(punct)))
        }
    }
}

/// Whitespace and comments; returns the skipped text
fn trivia(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((multispace1, line_comment, block_comment))))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), not_line_ending))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"), tag("$"))),
        many0(alt((alphanumeric1, tag("_"), tag("$")))),
    ))(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((
            recognize(pair(tag_no_case("0x"), hex_digit1)),
            recognize(tuple((
                digit1,
                take_while(|c: char| c.is_ascii_digit() || c == '_'),
                opt(pair(char('.'), digit0)),
                opt(exponent),
            ))),
            recognize(tuple((char('.'), digit1, opt(exponent)))),
        )),
        opt(char('n')),
    ))(input)
}

fn punctuator(input: &str) -> IResult<&str, &'static str> {
    for punct in PUNCTUATORS {
        if let Ok((rest, _)) = tag::<_, _, Error<&str>>(*punct)(input) {
            // `a?.5:b` is a conditional, not optional chaining
            if *punct == "?." && rest.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            return Ok((rest, punct));
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

/// Quoted string; returns the cooked value and the quote character
pub fn string_literal(input: &str) -> IResult<&str, (String, char)> {
    let (body, quote) = one_of("'\"")(input)?;
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((&body[i + c.len_utf8()..], (value, quote))),
            '\\' => match chars.next() {
                Some((j, escaped)) => {
                    let consumed = unescape(&body[j..], escaped, &mut value);
                    for _ in 1..consumed {
                        chars.next();
                    }
                }
                None => break,
            },
            '\n' | '\r' => break,
            c => value.push(c),
        }
    }
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

/// Push the value of an escape sequence starting at `rest` (just after the
/// backslash). Returns the number of characters the sequence occupies.
fn unescape(rest: &str, escaped: char, out: &mut String) -> usize {
    match escaped {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        'b' => out.push('\u{8}'),
        'f' => out.push('\u{c}'),
        'v' => out.push('\u{b}'),
        '0' => out.push('\0'),
        '\n' => {}
        'x' => {
            if let Some(c) = rest.get(1..3).and_then(|hex| u32::from_str_radix(hex, 16).ok()).and_then(char::from_u32) {
                out.push(c);
                return 3;
            }
            out.push('x');
        }
        'u' => {
            if let Some(braced) = rest.strip_prefix("u{") {
                if let Some(close) = braced.find('}') {
                    if let Some(c) = u32::from_str_radix(&braced[..close], 16).ok().and_then(char::from_u32) {
                        out.push(c);
                        return close + 3;
                    }
                }
            } else if let Some(c) = rest.get(1..5).and_then(|hex| u32::from_str_radix(hex, 16).ok()).and_then(char::from_u32) {
                out.push(c);
                return 5;
            }
            out.push('u');
        }
        other => out.push(other),
    }
    1
}

/// Template literal; returns the raw text between the backticks and, when
/// there are no substitutions, the cooked value
pub fn template_literal(input: &str) -> IResult<&str, (String, Option<String>)> {
    let (body, _) = char('`')(input)?;
    let mut cooked = String::new();
    let mut substituted = false;
    let mut rest = body;

    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
            Some('`') => {
                let raw = body[..body.len() - rest.len()].to_string();
                let cooked = (!substituted).then_some(cooked);
                return Ok((&rest[1..], (raw, cooked)));
            }
            Some('\\') => match chars.next() {
                Some(escaped) => {
                    let consumed = unescape(&rest[1..], escaped, &mut cooked);
                    let skip: usize = rest[1..].chars().take(consumed).map(char::len_utf8).sum();
                    rest = &rest[1 + skip..];
                }
                None => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
            },
            Some('$') if rest.starts_with("${") => {
                substituted = true;
                let (after, _) = balanced_braces(&rest[1..])
                    .map_err(|_| nom::Err::Failure(Error::new(input, ErrorKind::Char)))?;
                rest = after;
            }
            Some(c) => {
                cooked.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

/// `{ ... }` with nested braces, strings, templates and comments
fn balanced_braces(input: &str) -> IResult<&str, &str> {
    let (mut rest, _) = char('{')(input)?;
    let mut depth = 1usize;

    while depth > 0 {
        if let Ok((after, _)) = alt((line_comment, block_comment))(rest) {
            rest = after;
            continue;
        }
        if let Ok((after, _)) = string_literal(rest) {
            rest = after;
            continue;
        }
        if let Ok((after, _)) = template_literal(rest) {
            rest = after;
            continue;
        }
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
            Some('{') => depth += 1,
            Some('}') => depth -= 1,
            Some(_) => {}
        }
        rest = chars.as_str();
    }
    Ok((rest, &input[..input.len() - rest.len()]))
}

fn regex_literal(input: &str) -> IResult<&str, &str> {
    let (body, _) = char('/')(input)?;
    if body.starts_with('/') || body.starts_with('*') {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Char)));
    }
    let mut in_class = false;
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                let after = &body[i + 1..];
                let (rest, _) = take_while(|c: char| c.is_ascii_alphabetic())(after)?;
                return Ok((rest, &input[..input.len() - rest.len()]));
            }
            '\n' | '\r' => break,
            _ => {}
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}
