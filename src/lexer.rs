use logos::Logos;
use std::fmt;
use tracing::trace;

use crate::Span;

/// Raw lexemes recognised by logos. `tokenize` maps these onto the public
/// `TokenKind`, turning anything logos cannot match into an `Invalid` token.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[\s,]+")] // Whitespace and commas separate tokens
#[logos(skip r";[^\n]*")] // Line comments
enum Lexeme {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("true")]
    #[token("false")]
    Boolean,
    // A leading '-' only starts a number when a digit follows it
    #[regex(r"-?[0-9]+")]
    Number,
    #[regex(r#""([^"\\]|\\.)*""#)]
    String,
    // Longest match means this only wins when no closing quote exists
    #[regex(r#""([^"\\]|\\.)*\\?"#)]
    UnterminatedString,
    #[regex(r#"[^\s,()\[\]{}";0-9\-][^\s,()\[\]{}]*"#)]
    #[regex(r"-([^\s,()\[\]{}0-9][^\s,()\[\]{}]*)?")]
    Symbol,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Symbol,
    Number,
    String,
    Boolean,
    Invalid,
}

impl TokenKind {
    pub fn is_open(self) -> bool {
        matches!(
            self,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace
        )
    }

    pub fn is_close(self) -> bool {
        matches!(
            self,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace
        )
    }
}

impl From<Lexeme> for TokenKind {
    fn from(lexeme: Lexeme) -> Self {
        match lexeme {
            Lexeme::LParen => TokenKind::LParen,
            Lexeme::RParen => TokenKind::RParen,
            Lexeme::LBracket => TokenKind::LBracket,
            Lexeme::RBracket => TokenKind::RBracket,
            Lexeme::LBrace => TokenKind::LBrace,
            Lexeme::RBrace => TokenKind::RBrace,
            Lexeme::Boolean => TokenKind::Boolean,
            Lexeme::Number => TokenKind::Number,
            Lexeme::String => TokenKind::String,
            Lexeme::UnterminatedString => TokenKind::Invalid,
            Lexeme::Symbol => TokenKind::Symbol,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Symbol => write!(f, "symbol"),
            TokenKind::Number => write!(f, "number"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Boolean => write!(f, "boolean"),
            TokenKind::Invalid => write!(f, "invalid token"),
        }
    }
}

/// A lexed token. For `Invalid` tokens `text` holds the diagnostic instead
/// of the source slice; `span` always points at the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn offset(&self) -> usize {
        self.span.start
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

pub const EOF_IN_STRING: &str = "EOF in string";

/// Tokenizes the whole input eagerly. Never fails: problems are reported as
/// `TokenKind::Invalid` tokens for the reader to surface.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexeme::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end);
        let token = match result {
            Ok(Lexeme::UnterminatedString) => Token::new(TokenKind::Invalid, EOF_IN_STRING, span),
            Ok(lexeme) => Token::new(lexeme.into(), lexer.slice(), span),
            Err(()) => Token::new(
                TokenKind::Invalid,
                format!("invalid token '{}'", lexer.slice()),
                span,
            ),
        };
        tokens.push(token);
    }
    trace!(count = tokens.len(), "tokenized input");
    tokens
}
