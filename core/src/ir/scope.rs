use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use super::{BasicBlock, Label};
use crate::scope::StaticScope;

/// Declared positional parameter shape, used for proc argument restructuring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub required: u16,
    #[serde(default)]
    pub optional: u16,
    #[serde(default)]
    pub rest: bool,
    #[serde(default)]
    pub post: u16,
}

impl Signature {
    pub fn fixed(required: u16) -> Self {
        Self {
            required,
            ..Self::default()
        }
    }

    /// Whether a proc with this signature spreads a single list argument over its
    /// parameters (`|a, b|` and `|a, *rest|` do, `|a|` and `|*rest|` do not).
    pub fn spreads_single_list(&self) -> bool {
        let named = self.required + self.optional + self.post;
        named > 1 || (self.rest && named > 0)
    }
}

/// Compiled body of one lexical scope: its static descriptor plus blocks in layout order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrScope {
    static_scope: Arc<StaticScope>,
    #[serde(default)]
    signature: Signature,
    #[serde(default)]
    temps: u32,
    blocks: Vec<BasicBlock>,
}

impl IrScope {
    pub fn new(static_scope: StaticScope, signature: Signature, temps: u32, blocks: Vec<BasicBlock>) -> Self {
        Self {
            static_scope: Arc::new(static_scope),
            signature,
            temps,
            blocks,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.static_scope.name()
    }

    #[inline]
    pub fn static_scope(&self) -> &Arc<StaticScope> {
        &self.static_scope
    }

    #[inline]
    pub fn signature(&self) -> Signature {
        self.signature
    }

    #[inline]
    pub fn temps(&self) -> u32 {
        self.temps
    }

    #[inline]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [BasicBlock] {
        &mut self.blocks
    }

    pub fn block_index(&self, label: Label) -> Option<usize> {
        self.blocks.iter().position(|b| b.label() == label)
    }

    /// Position right after the argument-binding prologue of the entry block.
    pub fn body_start(&self) -> (usize, usize) {
        let prologue = self
            .blocks
            .first()
            .map(|b| b.instrs().iter().take_while(|i| i.is_argument_prologue()).count())
            .unwrap_or(0);
        (0, prologue)
    }

    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(BasicBlock::len).sum()
    }
}

impl fmt::Display for IrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = &self.static_scope;
        write!(f, "{:?} {}", scope.kind(), scope.name())?;
        if let Some(parent) = scope.parent() {
            write!(f, " < {}", parent)?;
        }
        if scope.is_argument_scope() {
            write!(f, " [argument scope]")?;
        }
        writeln!(f)?;
        let vars: Vec<&str> = (0..scope.variable_count())
            .filter_map(|i| scope.variable_name(i))
            .collect();
        writeln!(f, "  vars: [{}] temps: {}", vars.join(", "), self.temps)?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}
