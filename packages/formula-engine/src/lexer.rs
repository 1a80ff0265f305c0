//! Tokenizer for formula text

use crate::error::{FormulaError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Question,
    Colon,
    Comma,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Character offset of the token start
    pub position: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| FormulaError::parse(start, format!("invalid number '{}'", text)))?;
            tokens.push(Token {
                kind: TokenKind::Number(n),
                position: start,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let kind = match text.as_str() {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                _ => TokenKind::Ident(text),
            };
            tokens.push(Token {
                kind,
                position: start,
            });
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut text = String::new();
            let mut closed = false;
            while i < chars.len() {
                match chars[i] {
                    '\\' if i + 1 < chars.len() => {
                        text.push(chars[i + 1]);
                        i += 2;
                    }
                    ch if ch == quote => {
                        closed = true;
                        i += 1;
                        break;
                    }
                    ch => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            if !closed {
                return Err(FormulaError::parse(start, "unterminated string literal"));
            }
            tokens.push(Token {
                kind: TokenKind::Str(text),
                position: start,
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (kind, width) = match (c, next) {
            ('=', Some('=')) => {
                // Accept both == and ===
                if chars.get(i + 2) == Some(&'=') {
                    (TokenKind::EqEq, 3)
                } else {
                    (TokenKind::EqEq, 2)
                }
            }
            ('!', Some('=')) => {
                if chars.get(i + 2) == Some(&'=') {
                    (TokenKind::NotEq, 3)
                } else {
                    (TokenKind::NotEq, 2)
                }
            }
            ('<', Some('=')) => (TokenKind::LtEq, 2),
            ('>', Some('=')) => (TokenKind::GtEq, 2),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('!', _) => (TokenKind::Bang, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('?', _) => (TokenKind::Question, 1),
            (':', _) => (TokenKind::Colon, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            _ => {
                return Err(FormulaError::parse(
                    start,
                    format!("unexpected character '{}'", c),
                ))
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        i += width;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(
            kinds("price * quantity"),
            vec![
                TokenKind::Ident("price".into()),
                TokenKind::Star,
                TokenKind::Ident("quantity".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_and_comparisons() {
        assert_eq!(
            kinds("first + ' ' + last === 'x'"),
            vec![
                TokenKind::Ident("first".into()),
                TokenKind::Plus,
                TokenKind::Str(" ".into()),
                TokenKind::Plus,
                TokenKind::Ident("last".into()),
                TokenKind::EqEq,
                TokenKind::Str("x".into()),
            ]
        );
    }

    #[test]
    fn test_rejects_host_syntax() {
        // Member access, assignment and statements have no token
        assert!(tokenize("window.location").is_err());
        assert!(tokenize("a = 1").is_err());
        assert!(tokenize("a; b").is_err());
        assert!(tokenize("`template`").is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(err, FormulaError::Parse { position: 0, .. }));
    }
}
