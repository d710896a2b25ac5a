//! Formula parser
//!
//! Converts a sequence of tokens into an Abstract Syntax Tree (AST).
//! Uses recursive descent parsing with operator precedence, lowest first:
//! comparison, additive, multiplicative, unary sign, power, postfix call.

use super::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "^" | "**" => BinaryOp::Pow,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

/// Abstract Syntax Tree node for formula expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Whole-column reference
    Column(String),
    /// Function call; `x.f(a)` is parsed as `f(x, a)`
    Call { name: String, args: Vec<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
}

impl Expr {
    /// Column names referenced anywhere in the expression
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_columns(out)),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Unary { operand, .. } => operand.collect_columns(out),
            Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) => {}
        }
    }
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Token index
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (token {})", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

/// Deepest nesting a formula may have, counting both parentheses and the
/// height of the resulting tree
pub const MAX_DEPTH: usize = 256;

/// An expression and the height of its tree
type Node = (Expr, usize);

/// Parser for formula tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Parse the tokens into an AST
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("Empty expression", 0));
        }
        let (expr, _) = self.comparison()?;

        if let Some(token) = self.peek() {
            return Err(ParseError::new(
                format!("Unexpected token after expression: {:?}", token),
                self.position,
            ));
        }

        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        if self.match_token(expected) {
            Ok(())
        } else {
            Err(ParseError::new(format!("Expected {}", what), self.position))
        }
    }

    fn too_deep(&self) -> ParseError {
        ParseError::new(
            format!("Expression nested more than {} levels deep", MAX_DEPTH),
            self.position,
        )
    }

    /// Run one level of recursive descent
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Wrap children in a new node, refusing trees taller than `MAX_DEPTH`
    fn node(&self, expr: Expr, child_height: usize) -> Result<Node, ParseError> {
        let height = child_height + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((expr, height))
    }

    /// Consume the current token if it is one of the given operators
    fn match_any_operator(&mut self, ops: &[&str]) -> Option<BinaryOp> {
        if let Some(Token::Operator(s)) = self.peek() {
            if ops.contains(&s.as_str()) {
                let op = BinaryOp::from_symbol(s);
                self.position += 1;
                return op;
            }
        }
        None
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn binary_node(&self, op: BinaryOp, left: Node, right: Node) -> Result<Node, ParseError> {
        let child_height = left.1.max(right.1);
        self.node(Self::binary(op, left.0, right.0), child_height)
    }

    /// Comparison: additive (( "==" | "!=" | "<" | ">" | "<=" | ">=" ) additive)*
    fn comparison(&mut self) -> Result<Node, ParseError> {
        let mut left = self.additive()?;
        while let Some(op) = self.match_any_operator(&["==", "!=", "<", ">", "<=", ">="]) {
            let right = self.additive()?;
            left = self.binary_node(op, left, right)?;
        }
        Ok(left)
    }

    /// Additive: multiplicative (( "+" | "-" ) multiplicative)*
    fn additive(&mut self) -> Result<Node, ParseError> {
        let mut left = self.multiplicative()?;
        while let Some(op) = self.match_any_operator(&["+", "-"]) {
            let right = self.multiplicative()?;
            left = self.binary_node(op, left, right)?;
        }
        Ok(left)
    }

    /// Multiplicative: unary (( "*" | "/" | "%" ) unary)*
    fn multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut left = self.unary()?;
        while let Some(op) = self.match_any_operator(&["*", "/", "%"]) {
            let right = self.unary()?;
            left = self.binary_node(op, left, right)?;
        }
        Ok(left)
    }

    /// Unary: ( "-" | "+" ) unary | power
    fn unary(&mut self) -> Result<Node, ParseError> {
        if let Some(Token::Operator(s)) = self.peek() {
            let op = match s.as_str() {
                "-" => Some(UnaryOp::Neg),
                "+" => Some(UnaryOp::Plus),
                _ => None,
            };
            if let Some(op) = op {
                self.position += 1;
                let (operand, height) = self.nested(Self::unary)?;
                return self.node(
                    Expr::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    height,
                );
            }
        }
        self.power()
    }

    /// Power: postfix (( "^" | "**" ) unary)?  (right-associative)
    fn power(&mut self) -> Result<Node, ParseError> {
        let base = self.postfix()?;
        if let Some(op) = self.match_any_operator(&["^", "**"]) {
            let exponent = self.nested(Self::unary)?;
            return self.binary_node(op, base, exponent);
        }
        Ok(base)
    }

    /// Postfix: primary ( "." IDENT "(" args ")" )*
    fn postfix(&mut self) -> Result<Node, ParseError> {
        let mut node = self.primary()?;
        while self.match_token(&Token::Dot) {
            let name = match self.advance() {
                Some(Token::Identifier(name)) => name,
                _ => {
                    return Err(ParseError::new(
                        "Expected method name after '.'",
                        self.position,
                    ))
                }
            };
            self.expect(&Token::OpenParen, &format!("'(' after .{}", name))?;
            let (receiver, receiver_height) = node;
            let (rest, rest_height) = self.arguments()?;
            let mut args = vec![receiver];
            args.extend(rest);
            node = self.node(Expr::Call { name, args }, receiver_height.max(rest_height))?;
        }
        Ok(node)
    }

    /// Arguments after an opening parenthesis, through the closing one,
    /// with the height of the tallest
    fn arguments(&mut self) -> Result<(Vec<Expr>, usize), ParseError> {
        let mut args = Vec::new();
        let mut height = 0;
        if self.match_token(&Token::CloseParen) {
            return Ok((args, height));
        }
        loop {
            let (arg, arg_height) = self.nested(Self::comparison)?;
            args.push(arg);
            height = height.max(arg_height);
            if self.match_token(&Token::CloseParen) {
                return Ok((args, height));
            }
            self.expect(&Token::Comma, "',' or ')' in argument list")?;
        }
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let position = self.position;
        match self.advance() {
            Some(Token::Number(n)) => Ok((Expr::Number(n), 1)),
            Some(Token::Text(s)) => Ok((Expr::Text(s), 1)),
            Some(Token::QuotedIdentifier(name)) => Ok((Expr::Column(name), 1)),
            Some(Token::Identifier(name)) => {
                if self.match_token(&Token::OpenParen) {
                    let (args, height) = self.arguments()?;
                    return self.node(Expr::Call { name, args }, height);
                }
                let expr = match name.as_str() {
                    "true" | "True" | "TRUE" => Expr::Boolean(true),
                    "false" | "False" | "FALSE" => Expr::Boolean(false),
                    _ => Expr::Column(name),
                };
                Ok((expr, 1))
            }
            Some(Token::OpenParen) => {
                let node = self.nested(Self::comparison)?;
                self.expect(&Token::CloseParen, "')'")?;
                Ok(node)
            }
            Some(token) => Err(ParseError::new(
                format!("Unexpected token: {:?}", token),
                position,
            )),
            None => Err(ParseError::new("Unexpected end of expression", position)),
        }
    }
}

/// Parse tokens into an AST
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    Parser::new(tokens).parse()
}
