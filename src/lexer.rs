use logos::Logos;
use std::fmt;
use std::iter::Peekable;
use thiserror::Error;

use crate::source::{LineIndex, Position, Span};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Skip block comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("fn")]
    Fn,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),
    #[regex(r"[0-9]+(\.[0-9]*)?", |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    })]
    Number(f64),
    #[token("\"", lex_string)]
    String(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("|")]
    Pipe,
    #[token("->")]
    Arrow,

    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
}

impl TokenKind {
    /// Tokens after which a `-` can only mean subtraction.
    fn ends_value(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_) | TokenKind::RParen | TokenKind::RBracket
        )
    }
}

/// Scans a double-quoted string whose opening quote has just been matched.
/// Strings may span lines; an unknown escape keeps its backslash.
fn lex_string(lex: &mut logos::Lexer<TokenKind>) -> Result<String, LexerErrorKind> {
    let remainder = lex.remainder();
    let mut value = String::new();
    let mut chars = remainder.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                lex.bump(i + 1);
                return Ok(value);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            c => value.push(c),
        }
    }
    lex.bump(remainder.len());
    Err(LexerErrorKind::UnterminatedString)
}

// Re-escapes so that lexing the display form yields the same string.
fn escape(s: &str) -> String {
    s.chars().fold(String::with_capacity(s.len()), |mut acc, c| {
        match c {
            '"' => acc.push_str("\\\""),
            '\\' => acc.push_str("\\\\"),
            '\n' => acc.push_str("\\n"),
            '\r' => acc.push_str("\\r"),
            '\t' => acc.push_str("\\t"),
            c => acc.push(c),
        }
        acc
    })
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Let => write!(f, "let"),
            TokenKind::Const => write!(f, "const"),
            TokenKind::Fn => write!(f, "fn"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::For => write!(f, "for"),
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", escape(s)),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Assign => write!(f, "="),
            TokenKind::PlusAssign => write!(f, "+="),
            TokenKind::MinusAssign => write!(f, "-="),
            TokenKind::StarAssign => write!(f, "*="),
            TokenKind::SlashAssign => write!(f, "/="),
            TokenKind::Increment => write!(f, "++"),
            TokenKind::Decrement => write!(f, "--"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Semicolon => write!(f, ";"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The exact source spelling.
    pub raw: String,
    pub span: Span,
    pub position: Position,
}

impl Token {
    /// The literal text the token stands for (unescaped for strings).
    pub fn literal(&self) -> String {
        match &self.kind {
            TokenKind::String(s) | TokenKind::Identifier(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[error("Invalid character encountered: '{0}'")]
    InvalidCharacter(char),
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error} at {position}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
    pub position: Position,
}

// Result type alias for convenience
pub type LexerResult<T> = Result<T, LexerError>;

/// Tokenizes canonical source text. The returned sequence ends where the input ends;
/// the first unrecognized character aborts the whole run.
pub fn tokenize(input: &str) -> LexerResult<Vec<Token>> {
    let lines = LineIndex::new(input);
    let mut tokens: Vec<Token> = Vec::new();
    let mut lexer = TokenKind::lexer(input).spanned().peekable();

    while let Some((result, range)) = lexer.next() {
        let span = Span::new(range.start, range.end);
        let position = lines.position(span.start);
        let raw = &input[range];
        let kind = match result {
            Ok(kind) => kind,
            Err(LexerErrorKind::InvalidToken) => {
                let c = raw.chars().next().unwrap_or_default();
                return Err(LexerError {
                    error: LexerErrorKind::InvalidCharacter(c),
                    span,
                    position,
                });
            }
            Err(error) => {
                return Err(LexerError {
                    error,
                    span,
                    position,
                });
            }
        };
        let token = Token {
            kind,
            raw: raw.to_string(),
            span,
            position,
        };
        if token.kind == TokenKind::Minus {
            push_minus(&mut tokens, token, &mut lexer, input);
        } else {
            tokens.push(token);
        }
    }

    log::trace!(target: "lexer", "produced {} tokens", tokens.len());
    Ok(tokens)
}

type SpannedLexer<'s> = Peekable<logos::SpannedIter<'s, TokenKind>>;

/// Emits a `-`, folding it into an adjacent number literal when it sits in
/// prefix position. Prefix negation of anything else is left to the parser.
fn push_minus(tokens: &mut Vec<Token>, minus: Token, lexer: &mut SpannedLexer<'_>, input: &str) {
    let prefix = !tokens.last().is_some_and(|t| t.kind.ends_value());
    let adjacent_number = prefix
        .then(|| {
            lexer.next_if(|(result, range)| {
                matches!(result, Ok(TokenKind::Number(_))) && range.start == minus.span.end
            })
        })
        .flatten();
    match adjacent_number {
        Some((Ok(TokenKind::Number(n)), range)) => tokens.push(Token {
            kind: TokenKind::Number(-n),
            raw: input[minus.span.start..range.end].to_string(),
            span: Span::new(minus.span.start, range.end),
            position: minus.position,
        }),
        _ => tokens.push(minus),
    }
}
