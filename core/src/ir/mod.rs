//! Instruction graph: programs own scopes, scopes own basic blocks, blocks own
//! instructions and a listener bus that observes edits.

mod block;
pub mod builder;
mod instr;
pub mod listener;
mod operand;
pub mod passes;
mod program;
mod scope;

pub use block::BasicBlock;
pub use builder::{ProgramBuilder, ScopeBuilder};
pub use instr::{BinOp, Instr};
pub use listener::{EditKind, InstrEvent, InstrListener, ListenerBus, ListenerId};
pub use operand::{Label, Literal, Operand, ScopeRef, SiteId, Variable};
pub use program::IrProgram;
pub use scope::{IrScope, Signature};
