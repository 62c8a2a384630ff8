//! Recursive-descent parser for rule programs and predicate expressions

use crate::ast::{AssignOp, BinaryOp, Expr, Program, Stmt};
use crate::lexer::{tokenize, Token};
use crate::{ExprError, Result};

/// Functions the evaluator accepts, with their arity.
///
/// `rand` and `randn` are resolved through the caller's scope so the engine
/// controls seeding; the rest are evaluated internally.
const FUNCTIONS: &[(&str, usize)] = &[
    ("exp", 1),
    ("abs", 1),
    ("floor", 1),
    ("min", 2),
    ("max", 2),
    ("clip", 3),
    ("rand", 0),
    ("randn", 0),
];

/// Parse rule text into a program of assignment statements.
///
/// Statements are separated by newlines or semicolons; blank lines are
/// ignored. Fails on anything that is not `ident op expr`.
pub fn parse_program(text: &str) -> Result<Program> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens);
    let mut stmts = Vec::new();

    loop {
        parser.skip_separators();
        if parser.at_end() {
            break;
        }
        stmts.push(parser.statement()?);
        if !parser.at_end() {
            parser.expect_separator()?;
        }
    }

    Ok(Program { stmts })
}

/// Parse a single expression, e.g. a connectivity predicate.
///
/// The whole input must be one expression; assignment operators and multiple
/// statements are rejected.
pub fn parse_expression(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens);
    parser.skip_separators();
    let expr = parser.expression()?;
    parser.skip_separators();
    if !parser.at_end() {
        return Err(ExprError::parse(
            parser.offset(),
            "trailing input after expression",
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .or_else(|| self.tokens.last().map(|(_, p)| *p + 1))
            .unwrap_or(0)
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Separator)) {
            self.pos += 1;
        }
    }

    fn expect_separator(&mut self) -> Result<()> {
        match self.peek() {
            Some(Token::Separator) => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(ExprError::parse(
                self.offset(),
                "expected end of statement",
            )),
            None => Ok(()),
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        let offset = self.offset();
        let target = match self.advance() {
            Some(Token::Ident(name)) => name,
            _ => return Err(ExprError::parse(offset, "expected variable name")),
        };

        let offset = self.offset();
        let op = match self.advance() {
            Some(Token::Assign) => AssignOp::Set,
            Some(Token::PlusAssign) => AssignOp::Add,
            Some(Token::MinusAssign) => AssignOp::Sub,
            Some(Token::StarAssign) => AssignOp::Mul,
            Some(Token::SlashAssign) => AssignOp::Div,
            _ => return Err(ExprError::parse(offset, "expected assignment operator")),
        };

        let value = self.expression()?;
        Ok(Stmt { target, op, value })
    }

    fn expression(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.cmp_expr()?;
        while matches!(self.peek(), Some(Token::Amp)) {
            self.pos += 1;
            let rhs = self.cmp_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.add_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            let inner = self.unary_expr()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    let args = self.call_args()?;
                    self.check_call(&name, args.len())?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(ExprError::parse(self.offset(), "expected ')'")),
                }
            }
            _ => Err(ExprError::parse(offset, "expected expression")),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(ExprError::parse(self.offset(), "expected ',' or ')'")),
            }
        }
        Ok(args)
    }

    fn check_call(&self, name: &str, found: usize) -> Result<()> {
        match FUNCTIONS.iter().find(|(f, _)| *f == name) {
            Some(&(_, expected)) if expected == found => Ok(()),
            Some(&(_, expected)) => Err(ExprError::WrongArity {
                name: name.to_string(),
                expected,
                found,
            }),
            None => Err(ExprError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}
