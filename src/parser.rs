use crate::ast::{BinaryOperator, FunctionDeclaration, Node, NodeKind, Property};
use crate::lexer::{LexerError, Token, TokenKind};
use crate::source::{Position, Span};
use std::iter::Peekable;
use std::rc::Rc;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token '{}' at {}, expected {expected}", .found.kind, .found.position)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Unexpected end of input at {position}, expected {expected}")]
    UnexpectedEof { expected: String, position: Position },
    #[error("Malformed ternary at {position}: expected `condition -> a | b`")]
    InvalidTernary { span: Span, position: Position },
    #[error("Invalid target for '{operator}' at {position}: expected a variable or member path")]
    InvalidAssignmentTarget {
        operator: String,
        span: Span,
        position: Position,
    },
    #[error("Constant '{name}' must be initialized at {position}")]
    MissingInitializer {
        name: String,
        span: Span,
        position: Position,
    },
    #[error("Malformed for loop at {position}: {message}")]
    InvalidForLoop {
        message: String,
        span: Span,
        position: Position,
    },
    // Propagate lexer errors when parsing directly from a string
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { found, .. } => found.position,
            ParseError::UnexpectedEof { position, .. }
            | ParseError::InvalidTernary { position, .. }
            | ParseError::InvalidAssignmentTarget { position, .. }
            | ParseError::MissingInitializer { position, .. }
            | ParseError::InvalidForLoop { position, .. } => *position,
            ParseError::LexerError(lex_err) => lex_err.position,
        }
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: Peekable<IntoIter<Token>>,
    // Position of the last consumed token, and of the end of input
    position: Position,
    end: Position,
    last_span: Span,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let end = tokens.last().map_or_else(Position::default, end_of);
        Parser {
            tokens: tokens.into_iter().peekable(),
            position: Position::default(),
            end,
            last_span: Span::default(),
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.next()?;
        self.position = token.position;
        self.last_span = token.span;
        Some(token)
    }

    fn peek_kind(&mut self) -> Option<&TokenKind> {
        self.tokens.peek().map(|t| &t.kind)
    }

    fn check(&mut self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    // Consumes the next token only if it is of the given kind.
    fn eat(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.check(kind) {
            self.next_token()
        } else {
            None
        }
    }

    fn unexpected(&self, found: Option<Token>, expected: &str) -> ParseError {
        match found {
            Some(found) => ParseError::UnexpectedToken {
                found,
                expected: expected.to_string(),
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                position: self.end,
            },
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        match self.next_token() {
            Some(token) if token.kind == kind => Ok(token),
            other => Err(self.unexpected(other, expected)),
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<(String, Span)> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                span,
                ..
            }) => Ok((name, span)),
            other => Err(self.unexpected(other, expected)),
        }
    }

    // Span from `start` to the end of the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(self.last_span)
    }

    fn skip_semicolons(&mut self) {
        while self.eat(&TokenKind::Semicolon).is_some() {}
    }

    /// Parses the entire token stream as a program.
    pub fn parse(mut self) -> ParseResult<Node> {
        let mut statements = Vec::new();
        self.skip_semicolons();
        while self.tokens.peek().is_some() {
            statements.push(self.parse_statement()?);
            self.skip_semicolons();
        }
        let span = match (statements.first(), statements.last()) {
            (Some(first), Some(last)) => first.span.merge(last.span),
            _ => Span::default(),
        };
        log::debug!(target: "parser", "parsed program with {} statements", statements.len());
        Ok(Node::new(NodeKind::Program(statements), span))
    }

    fn parse_statement(&mut self) -> ParseResult<Node> {
        match self.peek_kind() {
            Some(TokenKind::Let) | Some(TokenKind::Const) => self.parse_variable_declaration(),
            Some(TokenKind::If) => self.parse_if_statement(),
            Some(TokenKind::For) => self.parse_for_statement(),
            Some(TokenKind::Identifier(name)) if name == "try" => self.parse_try_catch(),
            _ => self.parse_expression(),
        }
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<Node> {
        let keyword = self.next_token().ok_or_else(|| self.unexpected(None, "'let' or 'const'"))?;
        let constant = keyword.kind == TokenKind::Const;
        let (name, _) = self.expect_identifier("a variable name")?;

        let value = if self.eat(&TokenKind::Assign).is_some() {
            Some(self.parse_expression()?.boxed())
        } else if constant {
            return Err(ParseError::MissingInitializer {
                name,
                span: self.span_from(keyword.span),
                position: keyword.position,
            });
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::VariableDeclaration {
                constant,
                name,
                value,
            },
            self.span_from(keyword.span),
        ))
    }

    /// Parses `{ statement* }`.
    fn parse_block(&mut self) -> ParseResult<Vec<Node>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut statements = Vec::new();
        loop {
            self.skip_semicolons();
            match self.peek_kind() {
                Some(TokenKind::RBrace) => break,
                Some(_) => statements.push(self.parse_statement()?),
                None => return Err(self.unexpected(None, "'}'")),
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(statements)
    }

    fn parse_if_statement(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(TokenKind::If, "'if'")?;
        self.expect(TokenKind::LParen, "'(' after 'if'")?;
        let test = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')' after the if condition")?;
        let body = self.parse_block()?;

        let alternate = if self.eat(&TokenKind::Else).is_some() {
            if self.check(&TokenKind::If) {
                // `else if` chains become a single nested if statement
                Some(vec![self.parse_if_statement()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::IfStatement {
                test: test.boxed(),
                body,
                alternate,
            },
            self.span_from(keyword.span),
        ))
    }

    fn parse_for_statement(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::LParen, "'(' after 'for'")?;

        if !matches!(self.peek_kind(), Some(TokenKind::Let | TokenKind::Const)) {
            return Err(ParseError::InvalidForLoop {
                message: "the initializer must be a variable declaration".to_string(),
                span: self.span_from(keyword.span),
                position: keyword.position,
            });
        }
        let init = self.parse_variable_declaration()?;
        self.expect(TokenKind::Semicolon, "';' after the loop initializer")?;
        let test = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "';' after the loop condition")?;
        let update = self.parse_expression()?;
        if !matches!(update.kind, NodeKind::AssignmentExpression { .. }) {
            return Err(ParseError::InvalidForLoop {
                message: "the update must be an assignment".to_string(),
                span: update.span,
                position: self.position,
            });
        }
        self.expect(TokenKind::RParen, "')' after the loop update")?;
        let body = self.parse_block()?;

        Ok(Node::new(
            NodeKind::ForStatement {
                init: init.boxed(),
                test: test.boxed(),
                update: update.boxed(),
                body,
            },
            self.span_from(keyword.span),
        ))
    }

    // `try` and `catch` are ordinary identifiers recognized by their text.
    fn parse_try_catch(&mut self) -> ParseResult<Node> {
        let (_, start) = self.expect_identifier("'try'")?;
        let body = self.parse_block()?;
        match self.next_token() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) if name == "catch" => {}
            other => return Err(self.unexpected(other, "'catch' after the try block")),
        }
        let alternate = self.parse_block()?;
        Ok(Node::new(
            NodeKind::TryCatchStatement { body, alternate },
            self.span_from(start),
        ))
    }

    pub fn parse_expression(&mut self) -> ParseResult<Node> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Node> {
        let left = self.parse_ternary()?;

        let compound = match self.peek_kind() {
            Some(TokenKind::Assign) => {
                self.next_token();
                let value = self.parse_assignment()?;
                let span = left.span.merge(value.span);
                return Ok(Node::new(
                    NodeKind::AssignmentExpression {
                        assignee: left.boxed(),
                        value: value.boxed(),
                    },
                    span,
                ));
            }
            Some(TokenKind::PlusAssign) => BinaryOperator::Add,
            Some(TokenKind::MinusAssign) => BinaryOperator::Subtract,
            Some(TokenKind::StarAssign) => BinaryOperator::Multiply,
            Some(TokenKind::SlashAssign) => BinaryOperator::Divide,
            Some(TokenKind::Increment) | Some(TokenKind::Decrement) => {
                return self.parse_step(left);
            }
            _ => return Ok(left),
        };

        let operator_token = self.next_token().ok_or_else(|| self.unexpected(None, "an operator"))?;
        self.check_target(&left, &operator_token)?;
        let operand = self.parse_assignment()?;
        Ok(desugar_update(left, compound, operand))
    }

    // `target++` / `target--`
    fn parse_step(&mut self, target: Node) -> ParseResult<Node> {
        let operator_token = self.next_token().ok_or_else(|| self.unexpected(None, "'++' or '--'"))?;
        self.check_target(&target, &operator_token)?;
        let operator = if operator_token.kind == TokenKind::Increment {
            BinaryOperator::Add
        } else {
            BinaryOperator::Subtract
        };
        let one = Node::new(NodeKind::NumericLiteral(1.0), operator_token.span);
        Ok(desugar_update(target, operator, one))
    }

    fn check_target(&self, target: &Node, operator: &Token) -> ParseResult<()> {
        if target.is_assignable() {
            Ok(())
        } else {
            Err(ParseError::InvalidAssignmentTarget {
                operator: operator.kind.to_string(),
                span: target.span,
                position: operator.position,
            })
        }
    }

    /// `cond -> a | b` becomes an immediately invoked anonymous function
    /// whose body is `if (cond) { a } else { b }`.
    fn parse_ternary(&mut self) -> ParseResult<Node> {
        let test = self.parse_logical()?;
        let Some(arrow) = self.eat(&TokenKind::Arrow) else {
            return Ok(test);
        };
        if !matches!(
            test.kind,
            NodeKind::BinaryExpression { .. } | NodeKind::Identifier(_)
        ) {
            return Err(ParseError::InvalidTernary {
                span: test.span,
                position: arrow.position,
            });
        }

        let branches = self.parse_logical()?;
        let span = test.span.merge(branches.span);
        let (consequent, alternate) = match branches.kind {
            NodeKind::BinaryExpression {
                left,
                right,
                operator: BinaryOperator::Or,
            } => (*left, *right),
            _ => {
                return Err(ParseError::InvalidTernary {
                    span: branches.span,
                    position: arrow.position,
                });
            }
        };

        let branch = Node::new(
            NodeKind::IfStatement {
                test: test.boxed(),
                body: vec![consequent],
                alternate: Some(vec![alternate]),
            },
            span,
        );
        let function = Node::new(
            NodeKind::FunctionDeclaration(Rc::new(FunctionDeclaration {
                name: None,
                parameters: Vec::new(),
                body: vec![branch],
            })),
            span,
        );
        Ok(Node::new(
            NodeKind::CallExpression {
                callee: function.boxed(),
                arguments: Vec::new(),
            },
            span,
        ))
    }

    fn parse_logical(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Parser::parse_additive, |kind| match kind {
            TokenKind::AndAnd => Some(BinaryOperator::And),
            TokenKind::Pipe => Some(BinaryOperator::Or),
            _ => None,
        })
    }

    // Comparisons share the additive level, left-associative.
    fn parse_additive(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Parser::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOperator::Add),
            TokenKind::Minus => Some(BinaryOperator::Subtract),
            TokenKind::EqEq => Some(BinaryOperator::Equal),
            TokenKind::NotEq => Some(BinaryOperator::NotEqual),
            TokenKind::Lt => Some(BinaryOperator::LessThan),
            TokenKind::Gt => Some(BinaryOperator::GreaterThan),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Parser::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOperator::Multiply),
            TokenKind::Slash => Some(BinaryOperator::Divide),
            TokenKind::Percent => Some(BinaryOperator::Modulo),
            _ => None,
        })
    }

    /// Prefix `-` binds tighter than any binary operator and reads as `0 - operand`.
    fn parse_unary(&mut self) -> ParseResult<Node> {
        let Some(minus) = self.eat(&TokenKind::Minus) else {
            return self.parse_call_member();
        };
        let operand = self.parse_unary()?;
        let zero = Node::new(
            NodeKind::NumericLiteral(0.0),
            Span::new(minus.span.start, minus.span.start),
        );
        let span = minus.span.merge(operand.span);
        Ok(Node::new(
            NodeKind::BinaryExpression {
                left: zero.boxed(),
                right: operand.boxed(),
                operator: BinaryOperator::Subtract,
            },
            span,
        ))
    }

    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Parser) -> ParseResult<Node>,
        operator_for: fn(&TokenKind) -> Option<BinaryOperator>,
    ) -> ParseResult<Node> {
        let mut left = operand(self)?;
        while let Some(operator) = self.peek_kind().and_then(operator_for) {
            self.next_token();
            let right = operand(self)?;
            let span = left.span.merge(right.span);
            left = Node::new(
                NodeKind::BinaryExpression {
                    left: left.boxed(),
                    right: right.boxed(),
                    operator,
                },
                span,
            );
        }
        Ok(left)
    }

    /// Parses arbitrarily interleaved `.name`, `[expr]` and `(args)` suffixes.
    fn parse_call_member(&mut self) -> ParseResult<Node> {
        let mut expr = self.parse_primary()?;
        loop {
            let kind = match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.next_token();
                    let (name, span) = self.expect_identifier("a property name after '.'")?;
                    NodeKind::MemberExpression {
                        object: expr.boxed(),
                        property: Node::new(NodeKind::Identifier(name), span).boxed(),
                        computed: false,
                    }
                }
                Some(TokenKind::LBracket) => {
                    self.next_token();
                    let property = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    NodeKind::MemberExpression {
                        object: expr.boxed(),
                        property: property.boxed(),
                        computed: true,
                    }
                }
                Some(TokenKind::LParen) => {
                    self.next_token();
                    let arguments = self.parse_comma_separated(TokenKind::RParen, |p| {
                        p.parse_expression()
                    })?;
                    NodeKind::CallExpression {
                        callee: expr.boxed(),
                        arguments,
                    }
                }
                _ => return Ok(expr),
            };
            let span = self.span_from(expr_start(&kind));
            expr = Node::new(kind, span);
        }
    }

    /// Parses `item (, item)* ,?` up to and including `close`.
    fn parse_comma_separated<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Parser) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close).is_some() {
                return Ok(items);
            }
            items.push(item(self)?);
            if self.eat(&TokenKind::Comma).is_none() {
                let expected = format!("',' or '{}'", close);
                self.expect(close, &expected)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let token = match self.next_token() {
            Some(token) => token,
            None => return Err(self.unexpected(None, "an expression")),
        };
        let span = token.span;
        match token.kind {
            TokenKind::Identifier(name) => Ok(Node::new(NodeKind::Identifier(name), span)),
            TokenKind::Number(n) => Ok(Node::new(NodeKind::NumericLiteral(n), span)),
            TokenKind::String(s) => Ok(Node::new(NodeKind::StringLiteral(s), span)),
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let elements =
                    self.parse_comma_separated(TokenKind::RBracket, |p| p.parse_expression())?;
                Ok(Node::new(
                    NodeKind::ArrayLiteral(elements),
                    self.span_from(span),
                ))
            }
            TokenKind::LBrace => {
                let properties =
                    self.parse_comma_separated(TokenKind::RBrace, Parser::parse_property)?;
                Ok(Node::new(
                    NodeKind::ObjectLiteral(properties),
                    self.span_from(span),
                ))
            }
            TokenKind::Fn => self.parse_function(span),
            kind => Err(self.unexpected(
                Some(Token { kind, ..token }),
                "an expression",
            )),
        }
    }

    fn parse_property(&mut self) -> ParseResult<Property> {
        let (key, span, shorthand_allowed) = match self.next_token() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                span,
                ..
            }) => (name, span, true),
            Some(Token {
                kind: TokenKind::String(s),
                span,
                ..
            }) => (s, span, false),
            other => return Err(self.unexpected(other, "a property key")),
        };

        let value = if self.eat(&TokenKind::Colon).is_some() {
            Some(self.parse_expression()?)
        } else if shorthand_allowed {
            None
        } else {
            let next = self.next_token();
            return Err(self.unexpected(next, "':' after a string key"));
        };
        Ok(Property {
            key,
            value,
            span: self.span_from(span),
        })
    }

    /// Parses the rest of `fn name?(params) { body }` after the `fn` keyword.
    fn parse_function(&mut self, start: Span) -> ParseResult<Node> {
        let name = match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => Some(self.expect_identifier("a function name")?.0),
            _ => None,
        };
        self.expect(TokenKind::LParen, "'(' before the parameter list")?;
        let parameters = self.parse_comma_separated(TokenKind::RParen, |p| {
            p.expect_identifier("a parameter name").map(|(name, _)| name)
        })?;
        let body = self.parse_block()?;

        Ok(Node::new(
            NodeKind::FunctionDeclaration(Rc::new(FunctionDeclaration {
                name,
                parameters,
                body,
            })),
            self.span_from(start),
        ))
    }
}

// `target = target op operand`
fn desugar_update(target: Node, operator: BinaryOperator, operand: Node) -> Node {
    let span = target.span.merge(operand.span);
    let value = Node::new(
        NodeKind::BinaryExpression {
            left: target.clone().boxed(),
            right: operand.boxed(),
            operator,
        },
        span,
    );
    Node::new(
        NodeKind::AssignmentExpression {
            assignee: target.boxed(),
            value: value.boxed(),
        },
        span,
    )
}

fn expr_start(kind: &NodeKind) -> Span {
    match kind {
        NodeKind::MemberExpression { object, .. } => object.span,
        NodeKind::CallExpression { callee, .. } => callee.span,
        _ => Span::default(),
    }
}

// Where the input ends, given its final token
fn end_of(token: &Token) -> Position {
    match token.raw.rfind('\n') {
        Some(i) => Position {
            line: token.position.line + token.raw.matches('\n').count(),
            column: token.raw[i + 1..].chars().count() + 1,
        },
        None => Position {
            line: token.position.line,
            column: token.position.column + token.raw.chars().count(),
        },
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Node> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}
