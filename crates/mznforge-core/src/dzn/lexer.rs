//! Tokenizer for dzn text.

use crate::error::MalformedDataError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// An unsigned numeric literal, kept as text so the parser can apply a
    /// leading minus before conversion.
    Number { text: String, is_float: bool },
    Str(String),
    Ident(String),
    Equals,
    Semi,
    Comma,
    DotDot,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `[|`
    LBracketBar,
    /// `|]`
    BarRBracket,
    Bar,
    /// `<>`
    Absent,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number { text, .. } => format!("number '{text}'"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Equals => "'='".to_string(),
            Token::Semi => "';'".to_string(),
            Token::Comma => "','".to_string(),
            Token::DotDot => "'..'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracketBar => "'[|'".to_string(),
            Token::BarRBracket => "'|]'".to_string(),
            Token::Bar => "'|'".to_string(),
            Token::Absent => "'<>'".to_string(),
        }
    }
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Spanned>, MalformedDataError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line comment
        if c == b'%' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Block comment
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            loop {
                if i + 1 >= bytes.len() {
                    return Err(MalformedDataError::Unterminated {
                        what: "comment",
                        pos: start,
                    });
                }
                if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let token = match c {
            b'=' => {
                i += 1;
                Token::Equals
            }
            b';' => {
                i += 1;
                Token::Semi
            }
            b',' => {
                i += 1;
                Token::Comma
            }
            b'-' => {
                i += 1;
                Token::Minus
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'{' => {
                i += 1;
                Token::LBrace
            }
            b'}' => {
                i += 1;
                Token::RBrace
            }
            b'.' if bytes.get(i + 1) == Some(&b'.') => {
                i += 2;
                Token::DotDot
            }
            b'[' if bytes.get(i + 1) == Some(&b'|') => {
                i += 2;
                Token::LBracketBar
            }
            b'[' => {
                i += 1;
                Token::LBracket
            }
            b']' => {
                i += 1;
                Token::RBracket
            }
            b'|' if bytes.get(i + 1) == Some(&b']') => {
                i += 2;
                Token::BarRBracket
            }
            b'|' => {
                i += 1;
                Token::Bar
            }
            b'<' if bytes.get(i + 1) == Some(&b'>') => {
                i += 2;
                Token::Absent
            }
            b'"' => {
                let (s, end) = lex_string(text, i)?;
                i = end;
                Token::Str(s)
            }
            b'0'..=b'9' => {
                let (token, end) = lex_number(bytes, i);
                i = end;
                token
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                Token::Ident(text[start..i].to_string())
            }
            _ => {
                let found = text[start..].chars().next().unwrap_or('?');
                return Err(MalformedDataError::UnexpectedToken {
                    pos: start,
                    found: format!("character '{found}'"),
                    expected: "a dzn token",
                });
            }
        };
        tokens.push(Spanned { token, pos: start });
    }

    Ok(tokens)
}

fn lex_number(bytes: &[u8], start: usize) -> (Token, usize) {
    let mut i = start;
    let text_of = |end: usize| String::from_utf8_lossy(&bytes[start..end]).into_owned();

    // Hexadecimal and octal integers
    if bytes[i] == b'0' && matches!(bytes.get(i + 1), Some(b'x') | Some(b'o')) {
        let hex = bytes[i + 1] == b'x';
        let digit = |b: u8| if hex { b.is_ascii_hexdigit() } else { (b'0'..=b'7').contains(&b) };
        if bytes.get(i + 2).is_some_and(|b| digit(*b)) {
            i += 2;
            while i < bytes.len() && digit(bytes[i]) {
                i += 1;
            }
            return (
                Token::Number {
                    text: text_of(i),
                    is_float: false,
                },
                i,
            );
        }
    }

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut is_float = false;

    // Fraction only when a digit follows the dot, so `1..5` stays a range.
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }

    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    (
        Token::Number {
            text: text_of(i),
            is_float,
        },
        i,
    )
}

fn lex_string(text: &str, start: usize) -> Result<(String, usize), MalformedDataError> {
    let mut out = String::new();
    let mut chars = text[start + 1..].char_indices();
    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => return Ok((out, start + 1 + offset + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            '\n' => break,
            c => out.push(c),
        }
    }
    Err(MalformedDataError::Unterminated {
        what: "string",
        pos: start,
    })
}
