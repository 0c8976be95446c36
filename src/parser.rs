use crate::Span;
use crate::lexer::{Token, TokenKind};
use crate::types::{Node, NodeKind};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{}", .token.text)]
    Invalid { token: Token },
    #[error("unbalanced aggregate-kind: '{}' does not close a {current}", .token.text)]
    Mismatched { token: Token, current: NodeKind },
    #[error("unbalanced: multiple atoms outside list at '{}'", .token.text)]
    MultipleTopLevel { token: Token },
    #[error("unbalanced tree: '{}' is never closed", .open.text)]
    Unbalanced { open: Token },
    #[error("no tokens parsed")]
    Empty,
    #[error("number '{}' does not fit in a 64-bit integer", .token.text)]
    InvalidNumber { token: Token },
    #[error("unknown escape sequence '\\{escape}' in string")]
    InvalidEscape { token: Token, escape: char },
}

impl ParseError {
    /// The token the error originates from, when there is one.
    pub fn token(&self) -> Option<&Token> {
        match self {
            ParseError::Invalid { token }
            | ParseError::Mismatched { token, .. }
            | ParseError::MultipleTopLevel { token }
            | ParseError::InvalidNumber { token }
            | ParseError::InvalidEscape { token, .. } => Some(token),
            ParseError::Unbalanced { open } => Some(open),
            ParseError::Empty => None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        self.token().map(|token| token.span)
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

fn aggregate_kind(kind: TokenKind) -> Option<NodeKind> {
    match kind {
        TokenKind::LParen | TokenKind::RParen => Some(NodeKind::List),
        TokenKind::LBracket | TokenKind::RBracket => Some(NodeKind::Vector),
        TokenKind::LBrace | TokenKind::RBrace => Some(NodeKind::Hashmap),
        _ => None,
    }
}

fn new_aggregate(kind: NodeKind, span: Span) -> Node {
    match kind {
        NodeKind::Vector => Node::new_vector(Vec::new(), span),
        NodeKind::Hashmap => Node::new_hashmap(Vec::new(), span),
        _ => Node::new_list(Vec::new(), span),
    }
}

mod unescape {
    use super::{ParseError, ParseResult};
    use crate::lexer::Token;

    // Strips the surrounding quotes and resolves escapes
    pub fn unescape(token: &Token) -> ParseResult<String> {
        let text = &token.text;
        let inner = text
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(text);
        // un-escaping should only ever reduce the length of the string.
        let mut result = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => result.push('\n'),
                    Some('r') => result.push('\r'),
                    Some('t') => result.push('\t'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(escape) => {
                        return Err(ParseError::InvalidEscape {
                            token: token.clone(),
                            escape,
                        });
                    }
                    // The lexer never produces a STRING token ending in a lone backslash
                    None => result.push('\\'),
                }
            } else {
                result.push(c);
            }
        }
        Ok(result)
    }
}

/// Stack-based reader. `stack` holds the aggregates still open, each with
/// the token that opened it; the innermost one is the cursor. With nothing
/// open the cursor is the Root.
pub struct Parser {
    tokens: std::vec::IntoIter<Token>,
    root: Node,
    stack: Vec<(Node, Token)>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter(),
            root: Node::new_root(Span::default()),
            stack: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Node {
        match self.stack.last_mut() {
            Some((node, _)) => node,
            None => &mut self.root,
        }
    }

    fn root_is_occupied(&self) -> bool {
        self.stack.is_empty()
            && self
                .root
                .kind
                .children()
                .is_some_and(|children| !children.is_empty())
    }

    fn append(&mut self, node: Node) {
        if let Some(children) = self.current().kind.children_mut() {
            children.push(node);
        }
    }

    fn open(&mut self, token: Token, kind: NodeKind) -> ParseResult<()> {
        if self.root_is_occupied() {
            return Err(ParseError::MultipleTopLevel { token });
        }
        let node = new_aggregate(kind, token.span);
        self.stack.push((node, token));
        Ok(())
    }

    fn close(&mut self, token: Token, kind: NodeKind) -> ParseResult<()> {
        let current = self.current().node_kind();
        if current != kind {
            return Err(ParseError::Mismatched { token, current });
        }
        if let Some((mut node, _)) = self.stack.pop() {
            node.span = node.span.merge(token.span);
            self.append(node);
        }
        Ok(())
    }

    fn leaf(&mut self, token: Token) -> ParseResult<()> {
        if self.root_is_occupied() {
            return Err(ParseError::MultipleTopLevel { token });
        }
        let span = token.span;
        let node = match token.kind {
            TokenKind::Number => match token.text.parse::<i64>() {
                Ok(n) => Node::new_number(n, span),
                Err(_) => return Err(ParseError::InvalidNumber { token }),
            },
            TokenKind::String => Node::new_string(unescape::unescape(&token)?, span),
            TokenKind::Boolean => Node::new_bool(token.text == "true", span),
            TokenKind::Symbol if token.text == "nil" => Node::new_nil(span),
            TokenKind::Symbol => Node::new_symbol(token.text, span),
            // Delimiters and invalid tokens are dispatched before reaching here
            _ => return Err(ParseError::Invalid { token }),
        };
        self.append(node);
        Ok(())
    }

    /// Consumes the token stream. On success the returned Root holds exactly
    /// one child.
    pub fn parse(mut self) -> ParseResult<Node> {
        while let Some(token) = self.tokens.next() {
            trace!(kind = ?token.kind, text = %token.text, depth = self.stack.len(), "reading token");
            match (token.kind, aggregate_kind(token.kind)) {
                (TokenKind::Invalid, _) => return Err(ParseError::Invalid { token }),
                (kind, Some(aggregate)) if kind.is_open() => self.open(token, aggregate)?,
                (_, Some(aggregate)) => self.close(token, aggregate)?,
                (_, None) => self.leaf(token)?,
            }
        }

        // Report the innermost aggregate left open
        if let Some((_, open)) = self.stack.pop() {
            return Err(ParseError::Unbalanced { open });
        }
        let mut root = self.root;
        let span = match root.kind.children() {
            Some([only]) => only.span,
            _ => return Err(ParseError::Empty),
        };
        root.span = span;
        Ok(root)
    }
}

/// Reads a token stream into a Root node.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Node> {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Node> {
    parse(crate::lexer::tokenize(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper for asserting successful parsing; compares the single top-level form
    fn assert_parse(input: &str, expected: Node) {
        match parse_str(input) {
            Ok(root) => {
                assert_eq!(root.node_kind(), NodeKind::Root, "Input: '{}'", input);
                assert_eq!(
                    root.kind.children(),
                    Some(std::slice::from_ref(&expected)),
                    "Input: '{}'",
                    input
                );
            }
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper for asserting parse errors
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                // Compare enum variants, ignoring specific content for simplicity
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn assert_printed(input: &str, expected_output: &str) {
        let node = match parse_str(input) {
            Ok(result) => result,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        assert_eq!(node.to_string(), expected_output, "Input: '{}'", input);
    }

    fn dummy_token() -> Token {
        Token::new(TokenKind::Invalid, "", Span::default())
    }

    fn number(n: i64, start: usize, end: usize) -> Node {
        Node::new_number(n, Span::new(start, end))
    }

    fn symbol(s: &str, start: usize, end: usize) -> Node {
        Node::new_symbol(s, Span::new(start, end))
    }

    #[test]
    fn test_parse_atoms() {
        assert_parse("123", number(123, 0, 3));
        assert_parse("-45", number(-45, 0, 3));
        assert_parse("symbol", symbol("symbol", 0, 6));
        assert_parse("+", symbol("+", 0, 1));
        assert_parse("true", Node::new_bool(true, Span::new(0, 4)));
        assert_parse("false", Node::new_bool(false, Span::new(0, 5)));
        assert_parse("nil", Node::new_nil(Span::new(0, 3)));
        assert_parse(
            r#""hello world""#,
            Node::new_string("hello world", Span::new(0, 13)),
        );
        assert_parse(
            r#""with \"quotes\"\n""#,
            Node::new_string("with \"quotes\"\n", Span::new(0, 19)),
        );
    }

    #[test]
    fn test_parse_empty_aggregates() {
        assert_parse("()", Node::new_list(vec![], Span::new(0, 2)));
        assert_parse("( )", Node::new_list(vec![], Span::new(0, 3)));
        assert_parse("[]", Node::new_vector(vec![], Span::new(0, 2)));
        assert_parse("{}", Node::new_hashmap(vec![], Span::new(0, 2)));
    }

    #[test]
    fn test_parse_simple_list() {
        assert_parse(
            "(+ 10 20)",
            Node::new_list(
                vec![symbol("+", 1, 2), number(10, 3, 5), number(20, 6, 8)],
                Span::new(0, 9),
            ),
        );
    }

    #[test]
    fn test_parse_nested() {
        assert_parse(
            "(a [b {c}] d)",
            Node::new_list(
                vec![
                    symbol("a", 1, 2),
                    Node::new_vector(
                        vec![
                            symbol("b", 4, 5),
                            Node::new_hashmap(vec![symbol("c", 7, 8)], Span::new(6, 9)),
                        ],
                        Span::new(3, 10),
                    ),
                    symbol("d", 11, 12),
                ],
                Span::new(0, 13),
            ),
        );
        assert_printed("(()())", "(() ())");
        assert_printed(" [ 1 , 2 ,3 ] ; trailing", "[1 2 3]");
    }

    #[test]
    fn test_root_has_exactly_one_child() {
        let root = parse_str("(a b)").expect("should parse");
        assert_eq!(root.kind.children().map(|c| c.len()), Some(1));
        let root = parse_str("42").expect("should parse");
        assert_eq!(root.kind.children().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_parse_errors_multiple_top_level() {
        let error = ParseError::MultipleTopLevel {
            token: dummy_token(),
        };
        assert_parse_error("1 2", error.clone());
        assert_parse_error("(a) b", error.clone());
        assert_parse_error("(a) (b)", error.clone());
        assert_parse_error("a (b)", error);
    }

    #[test]
    fn test_parse_errors_mismatched() {
        let error = ParseError::Mismatched {
            token: dummy_token(),
            current: NodeKind::Root,
        };
        assert_parse_error(")", error.clone());
        assert_parse_error("(1))", error.clone());
        assert_parse_error("(1]", error.clone());
        assert_parse_error("[1}", error.clone());
        assert_parse_error("{(1})", error);

        match parse_str("(a]") {
            Err(ParseError::Mismatched { token, current }) => {
                assert_eq!(token.text, "]");
                assert_eq!(token.span, Span::new(2, 3));
                assert_eq!(current, NodeKind::List);
            }
            other => panic!("Expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_unbalanced() {
        let error = ParseError::Unbalanced {
            open: dummy_token(),
        };
        assert_parse_error("(", error.clone());
        assert_parse_error("(1 2", error.clone());
        assert_parse_error("[(1 2)", error);

        match parse_str("(a [b") {
            Err(ParseError::Unbalanced { open }) => assert_eq!(open.text, "["),
            other => panic!("Expected unbalanced, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_empty() {
        assert_parse_error("", ParseError::Empty);
        assert_parse_error("   ", ParseError::Empty);
        assert_parse_error("; just a comment", ParseError::Empty);
    }

    #[test]
    fn test_parse_invalid_token() {
        let error = ParseError::Invalid {
            token: dummy_token(),
        };
        assert_parse_error("\"", error.clone());
        assert_parse_error("(1 \"abc", error);
        match parse_str("(1 \"abc") {
            Err(e) => {
                assert_eq!(e.to_string(), "EOF in string");
                assert_eq!(e.span(), Some(Span::new(3, 7)));
            }
            Ok(node) => panic!("Expected error, got {:?}", node),
        }
    }

    #[test]
    fn test_parse_invalid_number() {
        assert_parse_error(
            "99999999999999999999",
            ParseError::InvalidNumber {
                token: dummy_token(),
            },
        );
    }

    #[test]
    fn test_parse_invalid_escape() {
        assert_parse_error(
            r#""bad \q""#,
            ParseError::InvalidEscape {
                token: dummy_token(),
                escape: 'q',
            },
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ParseError::Empty.to_string(), "no tokens parsed");
        let error = parse_str("1 2").expect_err("should fail");
        assert_eq!(
            error.to_string(),
            "unbalanced: multiple atoms outside list at '2'"
        );
        assert_eq!(error.span(), Some(Span::new(2, 3)));
        assert_eq!(ParseError::Empty.token(), None);
    }
}
