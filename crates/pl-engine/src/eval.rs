use pl_core::PromptValue;
use pl_parser::{BinaryOp, Expr};

use crate::functions::FunctionRegistry;
use crate::scope::Scope;

/// Evaluates an expression against the scope. Evaluation is total: missing
/// variables and paths resolve to null, and failed coercions yield null or
/// false, so only parse-time problems can abort a render.
pub fn eval_expr(expr: &Expr, scope: &Scope, functions: &FunctionRegistry) -> PromptValue {
    match expr {
        Expr::Null => PromptValue::Null,
        Expr::Bool(value) => PromptValue::Bool(*value),
        Expr::Number(value) => PromptValue::Number(*value),
        Expr::Str(value) => PromptValue::String(value.clone()),
        Expr::Var(name) => scope.get(name).cloned().unwrap_or(PromptValue::Null),
        Expr::Field { base, name } => match eval_expr(base, scope, functions) {
            PromptValue::Map(entries) => entries.get(name).cloned().unwrap_or(PromptValue::Null),
            _ => PromptValue::Null,
        },
        Expr::Index { base, index } => {
            let base = eval_expr(base, scope, functions);
            let index = eval_expr(index, scope, functions);
            match base {
                PromptValue::List(values) => index
                    .coerce_number()
                    .filter(|value| value.fract() == 0.0 && *value >= 0.0)
                    .and_then(|value| values.get(value as usize).cloned())
                    .unwrap_or(PromptValue::Null),
                PromptValue::Map(entries) => entries
                    .get(&index.to_display())
                    .cloned()
                    .unwrap_or(PromptValue::Null),
                _ => PromptValue::Null,
            }
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, scope, functions))
                .collect::<Vec<_>>();
            functions.call(name, &args)
        }
        Expr::Not(inner) => PromptValue::Bool(!eval_expr(inner, scope, functions).is_truthy()),
        Expr::Neg(inner) => match eval_expr(inner, scope, functions).coerce_number() {
            Some(value) => PromptValue::Number(-value),
            None => PromptValue::Null,
        },
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, scope, functions),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    scope: &Scope,
    functions: &FunctionRegistry,
) -> PromptValue {
    // Short-circuit operators evaluate to the deciding operand, which makes
    // `{{ npc.title or "stranger" }}` fallbacks work.
    match op {
        BinaryOp::And => {
            let left = eval_expr(left, scope, functions);
            if !left.is_truthy() {
                return left;
            }
            return eval_expr(right, scope, functions);
        }
        BinaryOp::Or => {
            let left = eval_expr(left, scope, functions);
            if left.is_truthy() {
                return left;
            }
            return eval_expr(right, scope, functions);
        }
        _ => {}
    }

    let left = eval_expr(left, scope, functions);
    let right = eval_expr(right, scope, functions);

    match op {
        BinaryOp::Eq => PromptValue::Bool(left.loose_eq(&right)),
        BinaryOp::Ne => PromptValue::Bool(!left.loose_eq(&right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            PromptValue::Bool(eval_ordering(op, &left, &right))
        }
        BinaryOp::Add => {
            if matches!(left, PromptValue::String(_)) || matches!(right, PromptValue::String(_)) {
                return PromptValue::String(left.to_display() + &right.to_display());
            }
            eval_arithmetic(op, &left, &right)
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            eval_arithmetic(op, &left, &right)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn eval_ordering(op: BinaryOp, left: &PromptValue, right: &PromptValue) -> bool {
    if let (PromptValue::String(left), PromptValue::String(right)) = (left, right) {
        return match op {
            BinaryOp::Lt => left < right,
            BinaryOp::Le => left <= right,
            BinaryOp::Gt => left > right,
            BinaryOp::Ge => left >= right,
            _ => false,
        };
    }

    let (Some(left), Some(right)) = (left.coerce_number(), right.coerce_number()) else {
        return false;
    };
    match op {
        BinaryOp::Lt => left < right,
        BinaryOp::Le => left <= right,
        BinaryOp::Gt => left > right,
        BinaryOp::Ge => left >= right,
        _ => false,
    }
}

fn eval_arithmetic(op: BinaryOp, left: &PromptValue, right: &PromptValue) -> PromptValue {
    let (Some(left), Some(right)) = (left.coerce_number(), right.coerce_number()) else {
        return PromptValue::Null;
    };
    let value = match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div => left / right,
        BinaryOp::Rem => left % right,
        _ => return PromptValue::Null,
    };
    PromptValue::Number(value)
}
