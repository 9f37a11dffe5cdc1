use risp_core::{RispError, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Sym(char),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// The literal source text of the token (quotes included for strings).
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

/// Open-bracket balance counters, one per bracket shape. Updated by
/// `next` only; the reader snapshots these to terminate variadic reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Brackets {
    pub round: i32,
    pub square: i32,
    pub curly: i32,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    pos: usize,
    line: usize,
    col: usize,
}

/// A lazy token stream over source text. `look_next` computes the next
/// token without committing position or bracket state; `next` commits.
pub struct Lexer {
    chars: Vec<char>,
    cursor: Cursor,
    brackets: Brackets,
}

fn is_delimiter(ch: char) -> bool {
    matches!(
        ch,
        ' ' | '\t' | '\r' | '\n' | '(' | ')' | '[' | ']' | '{' | '}' | ';' | '`' | '%' | '"'
    )
}

fn is_number(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    if chars.peek() == Some(&'-') {
        chars.next();
    }
    let mut digits = 0;
    while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
        chars.next();
        digits += 1;
    }
    if digits == 0 {
        return false;
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        let mut frac = 0;
        while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            chars.next();
            frac += 1;
        }
        if frac == 0 {
            return false;
        }
    }
    chars.next().is_none()
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            cursor: Cursor {
                pos: 0,
                line: 1,
                col: 1,
            },
            brackets: Brackets::default(),
        }
    }

    pub fn brackets(&self) -> Brackets {
        self.brackets
    }

    /// Peek the next token without advancing or touching bracket counters.
    pub fn look_next(&self) -> Result<Token, RispError> {
        self.scan(self.cursor).map(|(tok, _)| tok)
    }

    /// Consume the next token, advancing position and bracket counters.
    /// A close bracket while its counter is non-positive is an
    /// unmatched-bracket error.
    pub fn next(&mut self) -> Result<Token, RispError> {
        let (tok, cursor) = self.scan(self.cursor)?;
        if let TokenKind::Sym(ch) = tok.kind {
            match ch {
                '(' => self.brackets.round += 1,
                '[' => self.brackets.square += 1,
                '{' => self.brackets.curly += 1,
                ')' | ']' | '}' => {
                    let counter = match ch {
                        ')' => &mut self.brackets.round,
                        ']' => &mut self.brackets.square,
                        _ => &mut self.brackets.curly,
                    };
                    if *counter <= 0 {
                        return Err(RispError::Lex {
                            message: format!("unmatched `{ch}`"),
                            span: tok.span,
                        });
                    }
                    *counter -= 1;
                }
                _ => {}
            }
        }
        self.cursor = cursor;
        Ok(tok)
    }

    fn scan(&self, mut cur: Cursor) -> Result<(Token, Cursor), RispError> {
        // Whitespace and `;`-to-end-of-line comments
        while cur.pos < self.chars.len() {
            match self.chars[cur.pos] {
                ' ' | '\t' | '\r' => {
                    cur.pos += 1;
                    cur.col += 1;
                }
                '\n' => {
                    cur.pos += 1;
                    cur.line += 1;
                    cur.col = 1;
                }
                ';' => {
                    while cur.pos < self.chars.len() && self.chars[cur.pos] != '\n' {
                        cur.pos += 1;
                        cur.col += 1;
                    }
                }
                _ => break,
            }
        }

        let span = Span::new(cur.line, cur.col);
        if cur.pos >= self.chars.len() {
            return Ok((
                Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    span,
                },
                cur,
            ));
        }

        let ch = self.chars[cur.pos];
        match ch {
            '(' | ')' | '[' | ']' | '{' | '}' | '`' | '%' => {
                cur.pos += 1;
                cur.col += 1;
                Ok((
                    Token {
                        kind: TokenKind::Sym(ch),
                        text: ch.to_string(),
                        span,
                    },
                    cur,
                ))
            }
            '"' => {
                // Non-greedy multiline string body, no escape processing
                cur.pos += 1;
                cur.col += 1;
                let mut body = String::new();
                loop {
                    if cur.pos >= self.chars.len() {
                        return Err(RispError::Lex {
                            message: "unterminated string".to_string(),
                            span,
                        });
                    }
                    let c = self.chars[cur.pos];
                    cur.pos += 1;
                    if c == '"' {
                        cur.col += 1;
                        break;
                    }
                    if c == '\n' {
                        cur.line += 1;
                        cur.col = 1;
                    } else {
                        cur.col += 1;
                    }
                    body.push(c);
                }
                let text = format!("\"{body}\"");
                Ok((
                    Token {
                        kind: TokenKind::Str(body),
                        text,
                        span,
                    },
                    cur,
                ))
            }
            _ => {
                // Longest run of non-delimiter characters, reclassified as
                // a number when the whole run matches -?\d+(\.\d+)?
                let start = cur.pos;
                while cur.pos < self.chars.len() && !is_delimiter(self.chars[cur.pos]) {
                    cur.pos += 1;
                    cur.col += 1;
                }
                let text: String = self.chars[start..cur.pos].iter().collect();
                if text.is_empty() {
                    return Err(RispError::Lex {
                        message: "unexpected character series".to_string(),
                        span,
                    });
                }
                let kind = if is_number(&text) {
                    match text.parse::<f64>() {
                        Ok(n) => TokenKind::Number(n),
                        Err(_) => TokenKind::Ident(text.clone()),
                    }
                } else {
                    TokenKind::Ident(text.clone())
                };
                Ok((Token { kind, text, span }, cur))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next().expect("lex failure");
            if tok.is_eof() {
                break;
            }
            tokens.push(tok);
        }
        tokens
    }

    #[test]
    fn test_literals_concat_to_source_minus_whitespace() {
        let src = "add 1 2.5 -3 x?! \"a b\"";
        let glued: String = drain(src).iter().map(|t| t.text.clone()).collect();
        let expected: String = src.split_whitespace().collect();
        // the string literal contains a space, which split_whitespace eats
        assert_eq!(glued.replace(' ', ""), expected);

        let src = "let inc n 41";
        let glued: String = drain(src).iter().map(|t| t.text.clone()).collect();
        assert_eq!(glued, "letincn41");
    }

    #[test]
    fn test_number_classification() {
        let toks = drain("41 -3 2.5 -0.25 5a - 1.2.3 1.");
        let kinds: Vec<&TokenKind> = toks.iter().map(|t| &t.kind).collect();
        assert!(matches!(kinds[0], TokenKind::Number(n) if *n == 41.0));
        assert!(matches!(kinds[1], TokenKind::Number(n) if *n == -3.0));
        assert!(matches!(kinds[2], TokenKind::Number(n) if *n == 2.5));
        assert!(matches!(kinds[3], TokenKind::Number(n) if *n == -0.25));
        assert!(matches!(kinds[4], TokenKind::Ident(s) if s == "5a"));
        assert!(matches!(kinds[5], TokenKind::Ident(s) if s == "-"));
        assert!(matches!(kinds[6], TokenKind::Ident(s) if s == "1.2.3"));
        assert!(matches!(kinds[7], TokenKind::Ident(s) if s == "1."));
    }

    #[test]
    fn test_look_next_is_idempotent() {
        let mut lexer = Lexer::new("(add 1)");
        let a = lexer.look_next().unwrap();
        let b = lexer.look_next().unwrap();
        assert_eq!(a.kind, b.kind);
        assert_eq!(lexer.brackets(), Brackets::default());
        let c = lexer.next().unwrap();
        assert_eq!(a.kind, c.kind);
        assert_eq!(lexer.brackets().round, 1);
    }

    #[test]
    fn test_balanced_counters_return_to_zero() {
        let mut lexer = Lexer::new("(let xs [1 2 { (3 4) }])");
        loop {
            let tok = lexer.next().unwrap();
            assert!(lexer.brackets().round >= 0);
            assert!(lexer.brackets().square >= 0);
            assert!(lexer.brackets().curly >= 0);
            if tok.is_eof() {
                break;
            }
        }
        assert_eq!(lexer.brackets(), Brackets::default());
    }

    #[test]
    fn test_unmatched_close_bracket() {
        let mut lexer = Lexer::new(")");
        let err = lexer.next().unwrap_err();
        assert!(err.to_string().contains("unmatched `)`"));
    }

    #[test]
    fn test_multiline_string() {
        let toks = drain("\"a\nb\" x");
        assert!(matches!(&toks[0].kind, TokenKind::Str(s) if s == "a\nb"));
        // the following token's coordinates account for the newline
        assert_eq!(toks[1].span.line, 2);
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc");
        let err = lexer.next().unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let toks = drain("1 ; comment ( [ \"\n2");
        assert_eq!(toks.len(), 2);
        assert!(matches!(toks[1].kind, TokenKind::Number(n) if n == 2.0));
    }

    #[test]
    fn test_percent_and_backtick_are_symbols() {
        let toks = drain("%name`");
        assert!(matches!(toks[0].kind, TokenKind::Sym('%')));
        assert!(matches!(&toks[1].kind, TokenKind::Ident(s) if s == "name"));
        assert!(matches!(toks[2].kind, TokenKind::Sym('`')));
    }
}
