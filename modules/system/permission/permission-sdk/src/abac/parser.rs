//! Policy expression parser (Pratt parsing over boolean operators).

use super::lexer::{Token, TokenKind, syntax_error, tokenize};
use crate::error::ConfigurationError;

/// Which attribute map a path reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Root {
    User,
    Resource,
    Context,
}

impl Root {
    fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "user" | "userAttrs" => Some(Self::User),
            "resource" | "resourceAttrs" => Some(Self::Resource),
            "context" | "contextAttrs" => Some(Self::Context),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Path {
    pub root: Root,
    /// Key, then nested object keys.
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Path(Path),
    Literal(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Set {
    /// Inclusive numeric range, written `[lo, hi]`.
    Range(f64, f64),
    Values(Vec<Literal>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Bool(bool),
    /// A bare attribute path, read as a boolean flag.
    Flag(Path),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    In {
        operand: Operand,
        set: Set,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,  // || OR
    And, // && AND
}

/// Bound on both the tree height and the `(`/`!` nesting of one expression.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    /// Open parentheses and negations on the current descent.
    depth: usize,
}

/// Parse `src` into an expression tree.
pub(crate) fn parse(src: &str) -> Result<Expr, ConfigurationError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        current: 0,
        depth: 0,
    };
    if parser.peek().kind == TokenKind::Eof {
        return Err(syntax_error(0, "empty expression"));
    }
    let (expr, _) = parser.parse_precedence(Precedence::Lowest)?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(syntax_error(
            trailing.pos,
            format!("unexpected {}", trailing.kind.describe()),
        ));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ConfigurationError> {
        let token = self.advance();
        if &token.kind == kind {
            Ok(token)
        } else {
            Err(syntax_error(
                token.pos,
                format!("expected {what}, found {}", token.kind.describe()),
            ))
        }
    }

    fn within_depth(depth: usize, pos: usize) -> Result<usize, ConfigurationError> {
        if depth > MAX_DEPTH {
            return Err(syntax_error(pos, "expression nested too deeply"));
        }
        Ok(depth)
    }

    fn descend(&mut self, pos: usize) -> Result<(), ConfigurationError> {
        self.depth = Self::within_depth(self.depth + 1, pos)?;
        Ok(())
    }

    /// Each parse step yields the subtree and its height.
    fn parse_precedence(
        &mut self,
        precedence: Precedence,
    ) -> Result<(Expr, usize), ConfigurationError> {
        let (mut left, mut height) = self.parse_unary()?;

        loop {
            let next = match self.peek().kind {
                TokenKind::Or => Precedence::Or,
                TokenKind::And => Precedence::And,
                _ => Precedence::Lowest,
            };
            if precedence >= next {
                return Ok((left, height));
            }
            let op = self.advance();
            let (right, right_height) = self.parse_precedence(next)?;
            height = Self::within_depth(height.max(right_height) + 1, op.pos)?;
            left = match next {
                Precedence::Or => Expr::Or(Box::new(left), Box::new(right)),
                _ => Expr::And(Box::new(left), Box::new(right)),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<(Expr, usize), ConfigurationError> {
        if self.peek().kind == TokenKind::Not {
            let op = self.advance();
            self.descend(op.pos)?;
            let (inner, height) = self.parse_unary()?;
            self.depth -= 1;
            let height = Self::within_depth(height + 1, op.pos)?;
            return Ok((Expr::Not(Box::new(inner)), height));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<(Expr, usize), ConfigurationError> {
        if self.peek().kind == TokenKind::LParen {
            let open = self.advance();
            self.descend(open.pos)?;
            let inner = self.parse_precedence(Precedence::Lowest)?;
            self.expect(&TokenKind::RParen, "')'")?;
            self.depth -= 1;
            return Ok(inner);
        }

        self.parse_leaf().map(|expr| (expr, 1))
    }

    fn parse_leaf(&mut self) -> Result<Expr, ConfigurationError> {
        let start = self.peek().pos;
        let left = self.parse_operand()?;

        let op = match self.peek().kind {
            TokenKind::EqEq => Some(CmpOp::Eq),
            TokenKind::BangEq => Some(CmpOp::Ne),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Ge => Some(CmpOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_operand()?;
            return Ok(Expr::Compare { left, op, right });
        }

        match self.peek().kind {
            TokenKind::In => {
                self.advance();
                let set = self.parse_set()?;
                Ok(Expr::In { operand: left, set })
            }
            TokenKind::Not => {
                self.advance();
                self.expect(&TokenKind::In, "'in' after 'not'")?;
                let set = self.parse_set()?;
                Ok(Expr::Not(Box::new(Expr::In { operand: left, set })))
            }
            _ => match left {
                Operand::Literal(Literal::Bool(b)) => Ok(Expr::Bool(b)),
                Operand::Path(path) => Ok(Expr::Flag(path)),
                Operand::Literal(_) => Err(syntax_error(
                    start,
                    "expected comparison operator after literal",
                )),
            },
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ConfigurationError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(ident) => {
                let root = Root::from_ident(&ident).ok_or_else(|| {
                    syntax_error(token.pos, format!("unknown attribute root '{ident}'"))
                })?;
                self.parse_path(root, token.pos).map(Operand::Path)
            }
            TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::True | TokenKind::False => {
                Self::literal(token).map(Operand::Literal)
            }
            other => Err(syntax_error(
                token.pos,
                format!("expected attribute or literal, found {}", other.describe()),
            )),
        }
    }

    fn parse_path(&mut self, root: Root, pos: usize) -> Result<Path, ConfigurationError> {
        let mut segments = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let key = self.advance();
                    match key.kind {
                        TokenKind::Ident(name) => segments.push(name),
                        other => {
                            return Err(syntax_error(
                                key.pos,
                                format!("expected attribute key, found {}", other.describe()),
                            ));
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.advance();
                    match key.kind {
                        TokenKind::Str(name) => segments.push(name),
                        other => {
                            return Err(syntax_error(
                                key.pos,
                                format!("expected quoted key, found {}", other.describe()),
                            ));
                        }
                    }
                    self.expect(&TokenKind::RBracket, "']'")?;
                }
                _ => break,
            }
        }
        if segments.is_empty() {
            return Err(syntax_error(pos, "attribute path needs a key"));
        }
        Ok(Path { root, segments })
    }

    fn parse_set(&mut self) -> Result<Set, ConfigurationError> {
        let open = self.expect(&TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        if self.peek().kind == TokenKind::RBracket {
            self.advance();
        } else {
            loop {
                let token = self.advance();
                items.push(Self::literal(token)?);
                let sep = self.advance();
                match sep.kind {
                    TokenKind::Comma => {}
                    TokenKind::RBracket => break,
                    other => {
                        return Err(syntax_error(
                            sep.pos,
                            format!("expected ',' or ']', found {}", other.describe()),
                        ));
                    }
                }
            }
        }

        if let &[Literal::Num(lo), Literal::Num(hi)] = &items[..] {
            if lo > hi {
                return Err(syntax_error(open.pos, "range lower bound exceeds upper bound"));
            }
            return Ok(Set::Range(lo, hi));
        }
        Ok(Set::Values(items))
    }

    fn literal(token: Token) -> Result<Literal, ConfigurationError> {
        match token.kind {
            TokenKind::Str(s) => Ok(Literal::Str(s)),
            TokenKind::Number(n) => Ok(Literal::Num(n)),
            TokenKind::True => Ok(Literal::Bool(true)),
            TokenKind::False => Ok(Literal::Bool(false)),
            other => Err(syntax_error(
                token.pos,
                format!("expected literal, found {}", other.describe()),
            )),
        }
    }
}
