//! Tokenizer for rule text

use crate::{ExprError, Result};

/// A single lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal
    Number(f32),
    /// Identifier (variable or function name)
    Ident(String),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `-=`
    MinusAssign,
    /// `*=`
    StarAssign,
    /// `/=`
    SlashAssign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// Statement separator (`\n` or `;`)
    Separator,
}

/// Tokenize rule text, recording the byte offset of each token.
///
/// Newlines and semicolons both lex to [`Token::Separator`]; runs of
/// separators collapse in the parser, so multi-line rules and
/// semicolon-joined rules normalize to the same statement sequence.
pub fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        match c {
            ' ' | '\t' | '\r' => pos += 1,
            '\n' | ';' => {
                tokens.push((Token::Separator, pos));
                pos += 1;
            }
            '(' => {
                tokens.push((Token::LParen, pos));
                pos += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                pos += 1;
            }
            ',' => {
                tokens.push((Token::Comma, pos));
                pos += 1;
            }
            '&' => {
                tokens.push((Token::Amp, pos));
                pos += 1;
            }
            '|' => {
                tokens.push((Token::Pipe, pos));
                pos += 1;
            }
            '+' | '-' | '*' | '/' => {
                let compound = bytes.get(pos + 1) == Some(&b'=');
                let token = match (c, compound) {
                    ('+', false) => Token::Plus,
                    ('+', true) => Token::PlusAssign,
                    ('-', false) => Token::Minus,
                    ('-', true) => Token::MinusAssign,
                    ('*', false) => Token::Star,
                    ('*', true) => Token::StarAssign,
                    ('/', false) => Token::Slash,
                    _ => Token::SlashAssign,
                };
                tokens.push((token, pos));
                pos += if compound { 2 } else { 1 };
            }
            '=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((Token::EqEq, pos));
                    pos += 2;
                } else {
                    tokens.push((Token::Assign, pos));
                    pos += 1;
                }
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((Token::NotEq, pos));
                    pos += 2;
                } else {
                    return Err(ExprError::parse(pos, "expected '=' after '!'"));
                }
            }
            '<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((Token::Le, pos));
                    pos += 2;
                } else {
                    tokens.push((Token::Lt, pos));
                    pos += 1;
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((Token::Ge, pos));
                    pos += 2;
                } else {
                    tokens.push((Token::Gt, pos));
                    pos += 1;
                }
            }
            _ if c.is_ascii_digit() => {
                let (value, len) = lex_number(&text[pos..], pos)?;
                tokens.push((Token::Number(value), pos));
                pos += len;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < bytes.len() {
                    let c = bytes[pos] as char;
                    if c.is_ascii_alphanumeric() || c == '_' {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(text[start..pos].to_string()), start));
            }
            _ => {
                return Err(ExprError::parse(pos, format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

fn lex_number(text: &str, offset: usize) -> Result<(f32, usize)> {
    let bytes = text.as_bytes();
    let mut len = 0;

    while len < bytes.len() && bytes[len].is_ascii_digit() {
        len += 1;
    }
    if len < bytes.len() && bytes[len] == b'.' {
        len += 1;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
        }
    }
    if len < bytes.len() && (bytes[len] == b'e' || bytes[len] == b'E') {
        let mut exp_len = len + 1;
        if exp_len < bytes.len() && (bytes[exp_len] == b'+' || bytes[exp_len] == b'-') {
            exp_len += 1;
        }
        let digits_start = exp_len;
        while exp_len < bytes.len() && bytes[exp_len].is_ascii_digit() {
            exp_len += 1;
        }
        if exp_len > digits_start {
            len = exp_len;
        }
    }

    text[..len]
        .parse::<f32>()
        .map(|v| (v, len))
        .map_err(|_| ExprError::parse(offset, format!("bad numeric literal '{}'", &text[..len])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_statement() {
        let tokens = tokenize("v += w").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].0, Token::Ident("v".to_string()));
        assert_eq!(tokens[1].0, Token::PlusAssign);
        assert_eq!(tokens[2].0, Token::Ident("w".to_string()));
    }

    #[test]
    fn test_tokenize_numbers() {
        let tokens = tokenize("1.5e-3 + 42").unwrap();
        assert_eq!(tokens[0].0, Token::Number(1.5e-3));
        assert_eq!(tokens[2].0, Token::Number(42.0));
    }

    #[test]
    fn test_newline_and_semicolon_separate() {
        let a = tokenize("x = 1\ny = 2").unwrap();
        let b = tokenize("x = 1; y = 2").unwrap();
        let kinds_a: Vec<_> = a.into_iter().map(|(t, _)| t).collect();
        let kinds_b: Vec<_> = b.into_iter().map(|(t, _)| t).collect();
        assert_eq!(kinds_a, kinds_b);
    }

    #[test]
    fn test_comparison_operators() {
        let tokens = tokenize("i == j != k <= l >= m").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|(t, _)| t).collect();
        assert!(kinds.contains(&Token::EqEq));
        assert!(kinds.contains(&Token::NotEq));
        assert!(kinds.contains(&Token::Le));
        assert!(kinds.contains(&Token::Ge));
    }

    #[test]
    fn test_bad_character() {
        let err = tokenize("v @= w").unwrap_err();
        assert!(matches!(err, ExprError::Parse { .. }));
    }

    #[test]
    fn test_bare_bang_rejected() {
        assert!(tokenize("v ! w").is_err());
    }
}
