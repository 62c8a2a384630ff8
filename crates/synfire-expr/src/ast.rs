//! Abstract syntax for rule programs

use std::collections::BTreeSet;

/// Binary operators, in rule-text notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&` over truth values
    And,
    /// `|` over truth values
    Or,
}

impl BinaryOp {
    /// Whether this operator yields a truth value (1.0 or 0.0)
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::And | Self::Or
        )
    }
}

/// An expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f32),
    /// Variable reference, resolved through the scope at evaluation time
    Variable(String),
    /// Unary negation
    Neg(Box<Expr>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Function call
    Call {
        /// Function name
        name: String,
        /// Argument expressions
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Whether the expression's top-level value is a truth value.
    ///
    /// The predicate connectivity form uses this to decide between a direct
    /// mask (`i == j`) and a per-pair connection probability
    /// (`exp(-abs(i-j)*0.1)`).
    pub fn is_boolean(&self) -> bool {
        matches!(self, Expr::Binary { op, .. } if op.is_boolean())
    }

    /// Collect every variable name referenced by this expression
    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
}

/// A single assignment statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Variable being written
    pub target: String,
    /// Assignment operator
    pub op: AssignOp,
    /// Right-hand side
    pub value: Expr,
}

/// A compiled rule program: an ordered sequence of assignment statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Statements in source order
    pub stmts: Vec<Stmt>,
}

impl Program {
    /// Every variable name the program reads or writes
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for stmt in &self.stmts {
            out.insert(stmt.target.clone());
            stmt.value.collect_variables(&mut out);
        }
        out
    }

    /// Variable names written by at least one statement
    pub fn targets(&self) -> BTreeSet<String> {
        self.stmts.iter().map(|s| s.target.clone()).collect()
    }

    /// Whether a program mentions a given name anywhere
    pub fn references(&self, name: &str) -> bool {
        self.identifiers().contains(name)
    }
}
