//! Program evaluation against a caller-supplied scope

use crate::ast::{AssignOp, BinaryOp, Expr, Program, Stmt};
use crate::{ExprError, Result};

/// Resolves variable loads, stores, and stateful calls during evaluation.
///
/// The engine implements this over its per-synapse state matrix and the
/// linked population's arrays; tests implement it over a plain map. `load`
/// returning `None` surfaces as [`ExprError::UnknownVariable`]; `store`
/// returning `false` likewise. `call` handles the stateful functions
/// (`rand`, `randn`) so the caller controls the random stream.
pub trait Scope {
    /// Read a variable's current value
    fn load(&mut self, name: &str) -> Option<f32>;

    /// Write a variable, returning false if the name cannot be written
    fn store(&mut self, name: &str, value: f32) -> bool;

    /// Invoke a scope-provided function
    fn call(&mut self, name: &str, args: &[f32]) -> Option<f32>;
}

impl Expr {
    /// Evaluate the expression. Truth values are 1.0 / 0.0; division by zero
    /// follows IEEE semantics (infinities, NaN) rather than erroring.
    pub fn eval(&self, scope: &mut dyn Scope) -> Result<f32> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => scope.load(name).ok_or_else(|| ExprError::UnknownVariable {
                name: name.clone(),
            }),
            Expr::Neg(inner) => Ok(-inner.eval(scope)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(scope)?;
                let b = rhs.eval(scope)?;
                Ok(apply_binary(*op, a, b))
            }
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(scope)?);
                }
                eval_call(name, &values, scope)
            }
        }
    }
}

fn apply_binary(op: BinaryOp, a: f32, b: f32) -> f32 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Eq => bool_value(a == b),
        BinaryOp::Ne => bool_value(a != b),
        BinaryOp::Lt => bool_value(a < b),
        BinaryOp::Le => bool_value(a <= b),
        BinaryOp::Gt => bool_value(a > b),
        BinaryOp::Ge => bool_value(a >= b),
        BinaryOp::And => bool_value(a != 0.0 && b != 0.0),
        BinaryOp::Or => bool_value(a != 0.0 || b != 0.0),
    }
}

fn bool_value(v: bool) -> f32 {
    if v {
        1.0
    } else {
        0.0
    }
}

fn eval_call(name: &str, args: &[f32], scope: &mut dyn Scope) -> Result<f32> {
    match (name, args) {
        ("exp", [x]) => Ok(x.exp()),
        ("abs", [x]) => Ok(x.abs()),
        ("floor", [x]) => Ok(x.floor()),
        ("min", [a, b]) => Ok(a.min(*b)),
        ("max", [a, b]) => Ok(a.max(*b)),
        ("clip", [x, lo, hi]) => Ok(x.max(*lo).min(*hi)),
        _ => scope
            .call(name, args)
            .ok_or_else(|| ExprError::CallFailed {
                name: name.to_string(),
            }),
    }
}

impl Stmt {
    /// Execute the statement: evaluate the right-hand side and combine it
    /// into the target per the assignment operator.
    pub fn run(&self, scope: &mut dyn Scope) -> Result<()> {
        let rhs = self.value.eval(scope)?;
        let result = match self.op {
            AssignOp::Set => rhs,
            _ => {
                let current = scope
                    .load(&self.target)
                    .ok_or_else(|| ExprError::UnknownVariable {
                        name: self.target.clone(),
                    })?;
                match self.op {
                    AssignOp::Add => current + rhs,
                    AssignOp::Sub => current - rhs,
                    AssignOp::Mul => current * rhs,
                    AssignOp::Div => current / rhs,
                    AssignOp::Set => unreachable!(),
                }
            }
        };
        if scope.store(&self.target, result) {
            Ok(())
        } else {
            Err(ExprError::UnknownVariable {
                name: self.target.clone(),
            })
        }
    }
}

impl Program {
    /// Run every statement in order against the scope
    pub fn run(&self, scope: &mut dyn Scope) -> Result<()> {
        for stmt in &self.stmts {
            stmt.run(scope)?;
        }
        Ok(())
    }
}
