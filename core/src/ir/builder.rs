//! Programmatic IR construction.
//!
//! Scopes are reserved first so closures and methods can reference each other by
//! `ScopeRef` before their bodies exist, then defined one by one.

use std::sync::Arc;

use anyhow::{Result, anyhow, bail};

use super::{BasicBlock, Instr, IrProgram, IrScope, Label, Operand, ScopeRef, Signature, SiteId, Variable};
use crate::scope::{ScopeKind, StaticScope};
use crate::util::fast_map::{FastHashMap, fast_hash_map_new};

#[derive(Default)]
pub struct ProgramBuilder {
    scopes: Vec<Option<IrScope>>,
    methods: FastHashMap<Arc<str>, ScopeRef>,
    sites: u32,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            methods: fast_hash_map_new(),
            sites: 0,
        }
    }

    pub fn reserve(&mut self) -> ScopeRef {
        self.scopes.push(None);
        ScopeRef((self.scopes.len() - 1) as u32)
    }

    pub fn define(&mut self, scope_ref: ScopeRef, scope: IrScope) -> Result<()> {
        let slot = self
            .scopes
            .get_mut(scope_ref.index())
            .ok_or_else(|| anyhow!("scope {} was never reserved", scope_ref))?;
        if slot.is_some() {
            bail!("scope {} defined twice", scope_ref);
        }
        *slot = Some(scope);
        Ok(())
    }

    /// Reserve and define in one step.
    pub fn add(&mut self, scope: IrScope) -> ScopeRef {
        let scope_ref = self.reserve();
        self.scopes[scope_ref.index()] = Some(scope);
        scope_ref
    }

    pub fn method<N: Into<Arc<str>>>(&mut self, name: N, scope_ref: ScopeRef) {
        self.methods.insert(name.into(), scope_ref);
    }

    pub fn site(&mut self) -> SiteId {
        self.sites += 1;
        SiteId(self.sites - 1)
    }

    pub fn finish(self, entry: ScopeRef) -> Result<IrProgram> {
        let scopes = self
            .scopes
            .into_iter()
            .enumerate()
            .map(|(i, scope)| scope.ok_or_else(|| anyhow!("scope @{} reserved but never defined", i)))
            .collect::<Result<Vec<_>>>()?;
        let program = IrProgram::from_parts(scopes, entry, self.methods, self.sites);
        program.validate()?;
        Ok(program)
    }
}

/// Builds one [`IrScope`]. Instructions go into the current block; `start_block` opens
/// a new one after it in layout order.
pub struct ScopeBuilder {
    static_scope: StaticScope,
    signature: Signature,
    temps: u32,
    blocks: Vec<BasicBlock>,
    next_label: u32,
    rescue: Option<Label>,
}

impl ScopeBuilder {
    pub fn new<N: Into<Arc<str>>>(name: N, kind: ScopeKind) -> Self {
        Self::from_static(StaticScope::new(name, kind))
    }

    pub fn script() -> Self {
        Self::new("main", ScopeKind::Script)
    }

    pub fn method<N: Into<Arc<str>>>(name: N) -> Self {
        Self::new(name, ScopeKind::Method)
    }

    pub fn closure<N: Into<Arc<str>>>(name: N, parent: ScopeRef) -> Self {
        Self::from_static(StaticScope::new(name, ScopeKind::Closure).with_parent(parent))
    }

    pub fn eval(parent: ScopeRef) -> Self {
        Self::from_static(StaticScope::new("(eval)", ScopeKind::Eval).with_parent(parent))
    }

    pub fn from_static(static_scope: StaticScope) -> Self {
        Self {
            static_scope,
            signature: Signature::default(),
            temps: 0,
            blocks: vec![BasicBlock::new(Label(0))],
            next_label: 1,
            rescue: None,
        }
    }

    pub fn argument_scope(mut self) -> Self {
        self.static_scope = self.static_scope.with_argument_scope(true);
        self
    }

    pub fn keywords(mut self) -> Self {
        self.static_scope = self.static_scope.with_keywords(true);
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn local<N: Into<Arc<str>>>(&mut self, name: N) -> Variable {
        Variable::local(self.static_scope.add_variable(name))
    }

    pub fn temp(&mut self) -> Variable {
        self.temps += 1;
        Variable::Temp(self.temps - 1)
    }

    /// Allocate a label for a block that will be started later.
    pub fn label(&mut self) -> Label {
        self.next_label += 1;
        Label(self.next_label - 1)
    }

    pub fn start_block(&mut self, label: Label) -> &mut Self {
        self.blocks.push(BasicBlock::new(label).with_rescue(self.rescue));
        self
    }

    /// Protect the current block and every block started afterwards with `rescue`
    /// (`None` ends the region).
    pub fn protect(&mut self, rescue: Option<Label>) -> &mut Self {
        self.rescue = rescue;
        if let Some(block) = self.blocks.last_mut() {
            block.set_rescue(rescue);
        }
        self
    }

    pub fn emit(&mut self, instr: Instr) -> &mut Self {
        if let Some(block) = self.blocks.last_mut() {
            block.push(instr);
        }
        self
    }

    pub fn ret<O: Into<Operand>>(&mut self, value: O) -> &mut Self {
        self.emit(Instr::Return { value: value.into() })
    }

    pub fn finish(self) -> IrScope {
        IrScope::new(self.static_scope, self.signature, self.temps, self.blocks)
    }
}
