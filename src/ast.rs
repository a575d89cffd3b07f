use crate::source::Span;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind, // The statement or expression itself
    pub span: Span,     // The source span it covers
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }

    /// Identifiers and member chains are the only things a value can be stored into.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Identifier(_) | NodeKind::MemberExpression { .. }
        )
    }
}

/// Every statement is also an expression: executing it yields a value.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program(Vec<Node>),
    VariableDeclaration {
        constant: bool,
        name: String,
        value: Option<Box<Node>>,
    },
    // Shared with every closure created from it
    FunctionDeclaration(Rc<FunctionDeclaration>),
    IfStatement {
        test: Box<Node>,
        body: Vec<Node>,
        alternate: Option<Vec<Node>>,
    },
    ForStatement {
        init: Box<Node>,
        test: Box<Node>,
        update: Box<Node>,
        body: Vec<Node>,
    },
    TryCatchStatement {
        body: Vec<Node>,
        alternate: Vec<Node>,
    },
    AssignmentExpression {
        assignee: Box<Node>,
        value: Box<Node>,
    },
    BinaryExpression {
        left: Box<Node>,
        right: Box<Node>,
        operator: BinaryOperator,
    },
    CallExpression {
        callee: Box<Node>,
        arguments: Vec<Node>,
    },
    MemberExpression {
        object: Box<Node>,
        property: Box<Node>,
        computed: bool,
    },
    Identifier(String),
    NumericLiteral(f64),
    StringLiteral(String),
    ArrayLiteral(Vec<Node>),
    ObjectLiteral(Vec<Property>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: Option<String>, // None for anonymous functions
    pub parameters: Vec<String>,
    pub body: Vec<Node>,
}

impl FunctionDeclaration {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// An object literal entry. A missing value is shorthand for the variable named `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Option<Node>,
    pub span: Span,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "|",
        };
        write!(f, "{}", symbol)
    }
}
