use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use super::{Label, Operand, ScopeRef, SiteId, Variable};
use crate::error::ErrorKind;
use crate::val::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }
}

/// One IR instruction. At most one result variable; every operand is a variable or a
/// literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instr {
    /// Method / lambda entry arity check. Procs skip it.
    CheckArity {
        required: u16,
        optional: u16,
        rest: bool,
    },
    ReceivePreReqdArg {
        result: Variable,
        index: u16,
    },
    ReceiveOptArg {
        result: Variable,
        index: u16,
        post_required: u16,
    },
    ReceiveRestArg {
        result: Variable,
        arg_index: u16,
        required: u16,
        optional: u16,
    },
    ReceivePostReqdArg {
        result: Variable,
        index: u16,
        pre_required: u16,
        #[serde(default)]
        optional: u16,
        #[serde(default)]
        rest: bool,
        post_required: u16,
    },
    ReceiveKeywordArg {
        result: Variable,
        name: Arc<str>,
        expected_used: u16,
    },
    ReceiveKeywordRestArg {
        result: Variable,
        expected_used: u16,
    },
    ReceiveClosure {
        result: Variable,
    },
    /// Binds the error that transferred control into a rescue block.
    ReceiveException {
        result: Variable,
    },
    Copy {
        result: Variable,
        value: Operand,
    },
    /// `result = default` when `result` currently holds the undefined marker.
    CopyIfUndefined {
        result: Variable,
        default: Operand,
    },
    BinOp {
        result: Variable,
        #[serde(rename = "operator")]
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    BuildList {
        result: Variable,
        items: Vec<Operand>,
    },
    BuildMap {
        result: Variable,
        entries: Vec<(Arc<str>, Operand)>,
    },
    BuildClosure {
        result: Variable,
        body: ScopeRef,
        kind: BlockKind,
    },
    Call {
        result: Option<Variable>,
        method: Arc<str>,
        #[serde(default)]
        args: Vec<Operand>,
        #[serde(default)]
        block: Option<Operand>,
    },
    Yield {
        result: Variable,
        #[serde(default)]
        args: Vec<Operand>,
        site: SiteId,
    },
    CallClosure {
        result: Variable,
        closure: Operand,
        #[serde(default)]
        args: Vec<Operand>,
        site: SiteId,
    },
    Eval {
        result: Variable,
        body: ScopeRef,
    },
    Raise {
        kind: ErrorKind,
        message: Operand,
    },
    Jump {
        target: Label,
    },
    BranchIfFalse {
        cond: Operand,
        target: Label,
    },
    Return {
        value: Operand,
    },
    NonLocalReturn {
        value: Operand,
    },
    Break {
        value: Operand,
    },
    Redo,
    Nop,
}

impl Instr {
    pub fn name(&self) -> &'static str {
        match self {
            Instr::CheckArity { .. } => "check_arity",
            Instr::ReceivePreReqdArg { .. } => "recv_pre_reqd_arg",
            Instr::ReceiveOptArg { .. } => "recv_opt_arg",
            Instr::ReceiveRestArg { .. } => "recv_rest_arg",
            Instr::ReceivePostReqdArg { .. } => "recv_post_reqd_arg",
            Instr::ReceiveKeywordArg { .. } => "recv_kw_arg",
            Instr::ReceiveKeywordRestArg { .. } => "recv_kw_rest_arg",
            Instr::ReceiveClosure { .. } => "recv_closure",
            Instr::ReceiveException { .. } => "recv_exception",
            Instr::Copy { .. } => "copy",
            Instr::CopyIfUndefined { .. } => "copy_if_undef",
            Instr::BinOp { .. } => "binop",
            Instr::BuildList { .. } => "build_list",
            Instr::BuildMap { .. } => "build_map",
            Instr::BuildClosure { .. } => "build_closure",
            Instr::Call { .. } => "call",
            Instr::Yield { .. } => "yield",
            Instr::CallClosure { .. } => "call_closure",
            Instr::Eval { .. } => "eval",
            Instr::Raise { .. } => "raise",
            Instr::Jump { .. } => "jump",
            Instr::BranchIfFalse { .. } => "b_false",
            Instr::Return { .. } => "return",
            Instr::NonLocalReturn { .. } => "nonlocal_return",
            Instr::Break { .. } => "break",
            Instr::Redo => "redo",
            Instr::Nop => "nop",
        }
    }

    pub fn result(&self) -> Option<Variable> {
        match self {
            Instr::ReceivePreReqdArg { result, .. }
            | Instr::ReceiveOptArg { result, .. }
            | Instr::ReceiveRestArg { result, .. }
            | Instr::ReceivePostReqdArg { result, .. }
            | Instr::ReceiveKeywordArg { result, .. }
            | Instr::ReceiveKeywordRestArg { result, .. }
            | Instr::ReceiveClosure { result }
            | Instr::ReceiveException { result }
            | Instr::Copy { result, .. }
            | Instr::CopyIfUndefined { result, .. }
            | Instr::BinOp { result, .. }
            | Instr::BuildList { result, .. }
            | Instr::BuildMap { result, .. }
            | Instr::BuildClosure { result, .. }
            | Instr::Yield { result, .. }
            | Instr::CallClosure { result, .. }
            | Instr::Eval { result, .. } => Some(*result),
            Instr::Call { result, .. } => *result,
            _ => None,
        }
    }

    /// Every operand read by this instruction, in evaluation order.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instr::Copy { value, .. }
            | Instr::Return { value }
            | Instr::NonLocalReturn { value }
            | Instr::Break { value } => vec![value],
            Instr::CopyIfUndefined { default, .. } => vec![default],
            Instr::BinOp { lhs, rhs, .. } => vec![lhs, rhs],
            Instr::BuildList { items, .. } => items.iter().collect(),
            Instr::BuildMap { entries, .. } => entries.iter().map(|(_, v)| v).collect(),
            Instr::Call { args, block, .. } => args.iter().chain(block.iter()).collect(),
            Instr::Yield { args, .. } => args.iter().collect(),
            Instr::CallClosure { closure, args, .. } => std::iter::once(closure).chain(args.iter()).collect(),
            Instr::Raise { message, .. } => vec![message],
            Instr::BranchIfFalse { cond, .. } => vec![cond],
            _ => Vec::new(),
        }
    }

    /// Ends a basic block: nothing after it in the same block can run.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Jump { .. }
                | Instr::Return { .. }
                | Instr::NonLocalReturn { .. }
                | Instr::Break { .. }
                | Instr::Raise { .. }
                | Instr::Redo
        )
    }

    /// Argument-binding prologue instructions. `redo` restarts a closure body after them.
    pub fn is_argument_prologue(&self) -> bool {
        matches!(
            self,
            Instr::CheckArity { .. }
                | Instr::ReceivePreReqdArg { .. }
                | Instr::ReceiveOptArg { .. }
                | Instr::ReceiveRestArg { .. }
                | Instr::ReceivePostReqdArg { .. }
                | Instr::ReceiveKeywordArg { .. }
                | Instr::ReceiveKeywordRestArg { .. }
                | Instr::ReceiveClosure { .. }
                | Instr::CopyIfUndefined { .. }
        )
    }

    pub fn branch_target(&self) -> Option<Label> {
        match self {
            Instr::Jump { target } | Instr::BranchIfFalse { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn site(&self) -> Option<SiteId> {
        match self {
            Instr::Yield { site, .. } | Instr::CallClosure { site, .. } => Some(*site),
            _ => None,
        }
    }

    pub fn scope_ref(&self) -> Option<ScopeRef> {
        match self {
            Instr::BuildClosure { body, .. } | Instr::Eval { body, .. } => Some(*body),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Operand]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result() {
            write!(f, "{} = ", result)?;
        }
        let name = self.name();
        match self {
            Instr::CheckArity {
                required,
                optional,
                rest,
            } => write!(f, "{}(req: {}, opt: {}, rest: {})", name, required, optional, rest),
            Instr::ReceivePreReqdArg { index, .. } => write!(f, "{}({})", name, index),
            Instr::ReceiveOptArg {
                index, post_required, ..
            } => write!(f, "{}({}, post: {})", name, index, post_required),
            Instr::ReceiveRestArg {
                arg_index,
                required,
                optional,
                ..
            } => write!(f, "{}({}, req: {}, opt: {})", name, arg_index, required, optional),
            Instr::ReceivePostReqdArg {
                index,
                pre_required,
                post_required,
                ..
            } => write!(f, "{}({}, pre: {}, post: {})", name, index, pre_required, post_required),
            Instr::ReceiveKeywordArg {
                name: key,
                expected_used,
                ..
            } => write!(f, "{}({}, used: {})", name, key, expected_used),
            Instr::ReceiveKeywordRestArg { expected_used, .. } => write!(f, "{}(used: {})", name, expected_used),
            Instr::ReceiveClosure { .. } | Instr::ReceiveException { .. } | Instr::Redo | Instr::Nop => {
                write!(f, "{}", name)
            }
            Instr::Copy { value, .. } => write!(f, "{}({})", name, value),
            Instr::CopyIfUndefined { default, .. } => write!(f, "{}({})", name, default),
            Instr::BinOp { op, lhs, rhs, .. } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Instr::BuildList { items, .. } => {
                write!(f, "{}[", name)?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Instr::BuildMap { entries, .. } => {
                write!(f, "{}{{", name)?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Instr::BuildClosure { body, kind, .. } => write!(f, "{}({}, {})", name, kind, body),
            Instr::Call {
                method, args, block, ..
            } => {
                write!(f, "{} {}(", name, method)?;
                write_list(f, args)?;
                write!(f, ")")?;
                if let Some(block) = block {
                    write!(f, " &{}", block)?;
                }
                Ok(())
            }
            Instr::Yield { args, site, .. } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ") [{}]", site)
            }
            Instr::CallClosure {
                closure, args, site, ..
            } => {
                write!(f, "{} {}(", name, closure)?;
                write_list(f, args)?;
                write!(f, ") [{}]", site)
            }
            Instr::Eval { body, .. } => write!(f, "{}({})", name, body),
            Instr::Raise { kind, message } => write!(f, "{} {}({})", name, kind, message),
            Instr::Jump { target } => write!(f, "{} {}", name, target),
            Instr::BranchIfFalse { cond, target } => write!(f, "{}({}, {})", name, cond, target),
            Instr::Return { value } | Instr::NonLocalReturn { value } | Instr::Break { value } => {
                write!(f, "{}({})", name, value)
            }
        }
    }
}
