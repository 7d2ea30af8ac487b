use crate::error::{ErrorKind, RaisedError};
use crate::ir::BinOp;
use crate::val::Val;

fn coerce_error(op: BinOp, lhs: &Val, rhs: &Val) -> RaisedError {
    match lhs {
        Val::Int(_) | Val::Float(_) | Val::Str(_) | Val::List(_) => {
            RaisedError::type_error(format!("{} can't be coerced into {}", rhs.type_name(), lhs.type_name()))
        }
        _ => RaisedError::new(
            ErrorKind::NoMethodError,
            format!("undefined method '{}' for {}", op.symbol(), lhs.type_name()),
        ),
    }
}

fn overflow() -> RaisedError {
    RaisedError::new(ErrorKind::RuntimeError, "integer overflow")
}

fn floor_div(a: i64, b: i64) -> Result<i64, RaisedError> {
    if b == 0 {
        return Err(RaisedError::new(ErrorKind::ZeroDivisionError, "divided by 0"));
    }
    let q = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) { Ok(q - 1) } else { Ok(q) }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, RaisedError> {
    if b == 0 {
        return Err(RaisedError::new(ErrorKind::ZeroDivisionError, "divided by 0"));
    }
    let r = a.checked_rem(b).ok_or_else(overflow)?;
    if r != 0 && ((r < 0) != (b < 0)) { Ok(r + b) } else { Ok(r) }
}

fn as_float(v: &Val) -> Option<f64> {
    match v {
        Val::Int(i) => Some(*i as f64),
        Val::Float(x) => Some(*x),
        _ => None,
    }
}

fn arith(op: BinOp, lhs: &Val, rhs: &Val) -> Result<Val, RaisedError> {
    if let (Val::Int(a), Val::Int(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        let out = match op {
            BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
            BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
            BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
            BinOp::Div => floor_div(a, b)?,
            BinOp::Mod => floor_mod(a, b)?,
            _ => unreachable!("comparison routed to arith"),
        };
        return Ok(Val::Int(out));
    }
    if let (Some(a), Some(b)) = (as_float(lhs), as_float(rhs)) {
        let out = match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Mod => a - b * (a / b).floor(),
            _ => unreachable!("comparison routed to arith"),
        };
        return Ok(Val::Float(out));
    }
    match (op, lhs, rhs) {
        (BinOp::Add, Val::Str(a), Val::Str(b)) => Ok(Val::str(format!("{}{}", a, b))),
        (BinOp::Add, Val::List(a), Val::List(b)) => Ok(Val::list(a.iter().chain(b.iter()).cloned())),
        _ => Err(coerce_error(op, lhs, rhs)),
    }
}

fn compare(op: BinOp, lhs: &Val, rhs: &Val) -> Result<Val, RaisedError> {
    let ordering = match (lhs, rhs) {
        (Val::Str(a), Val::Str(b)) => a.partial_cmp(b),
        _ => match (as_float(lhs), as_float(rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(RaisedError::new(
                    ErrorKind::ArgumentError,
                    format!("comparison of {} with {} failed", lhs.type_name(), rhs.type_name()),
                ));
            }
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Val::Bool(false));
    };
    let out = match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!("arithmetic routed to compare"),
    };
    Ok(Val::Bool(out))
}

pub(crate) fn binop(op: BinOp, lhs: &Val, rhs: &Val) -> Result<Val, RaisedError> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => arith(op, lhs, rhs),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, lhs, rhs),
        BinOp::Eq => Ok(Val::Bool(lhs == rhs)),
        BinOp::Ne => Ok(Val::Bool(lhs != rhs)),
    }
}
