use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::{Instr, IrScope, Label, Operand, ScopeRef, Variable};
use crate::scope::ScopeKind;
use crate::util::fast_map::FastHashMap;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

fn next_program_id() -> u64 {
    NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed)
}

/// A complete unit handed over by the compiler: every scope, the entry scope, and the
/// flat method table.
#[derive(Debug, Serialize, Deserialize)]
pub struct IrProgram {
    #[serde(skip, default = "next_program_id")]
    id: u64,
    entry: ScopeRef,
    #[serde(default)]
    methods: FastHashMap<Arc<str>, ScopeRef>,
    #[serde(default)]
    sites: u32,
    scopes: Vec<IrScope>,
}

impl IrProgram {
    pub(crate) fn from_parts(
        scopes: Vec<IrScope>,
        entry: ScopeRef,
        methods: FastHashMap<Arc<str>, ScopeRef>,
        sites: u32,
    ) -> Self {
        Self {
            id: next_program_id(),
            entry,
            methods,
            sites,
            scopes,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let program: IrProgram = serde_json::from_str(text).context("malformed IR program")?;
        program.validate()?;
        Ok(program)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Process-unique identity, part of every closure's call target.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn entry(&self) -> ScopeRef {
        self.entry
    }

    #[inline]
    pub fn scope(&self, scope: ScopeRef) -> Option<&IrScope> {
        self.scopes.get(scope.index())
    }

    pub fn scope_mut(&mut self, scope: ScopeRef) -> Option<&mut IrScope> {
        self.scopes.get_mut(scope.index())
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeRef, &IrScope)> {
        self.scopes.iter().enumerate().map(|(i, s)| (ScopeRef(i as u32), s))
    }

    pub fn scopes_mut(&mut self) -> impl Iterator<Item = &mut IrScope> {
        self.scopes.iter_mut()
    }

    pub fn method(&self, name: &str) -> Option<ScopeRef> {
        self.methods.get(name).copied()
    }

    /// Method names in sorted order.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(|k| &**k).collect();
        names.sort_unstable();
        names
    }

    #[inline]
    pub fn site_count(&self) -> usize {
        self.sites as usize
    }

    /// Structural checks the interpreter relies on: every label, scope reference, site
    /// and variable an instruction names must exist.
    pub fn validate(&self) -> Result<()> {
        if self.scope(self.entry).is_none() {
            bail!("entry scope {} does not exist", self.entry);
        }
        for (name, scope_ref) in &self.methods {
            let scope = self
                .scope(*scope_ref)
                .ok_or_else(|| anyhow!("method '{}' refers to missing scope {}", name, scope_ref))?;
            let st = scope.static_scope();
            if st.kind() != ScopeKind::Method {
                bail!("method '{}' refers to {:?} scope '{}'", name, st.kind(), st.name());
            }
        }
        for (scope_ref, scope) in self.scopes() {
            self.validate_scope(scope_ref, scope)
                .with_context(|| format!("in scope {} '{}'", scope_ref, scope.name()))?;
        }
        Ok(())
    }

    fn validate_scope(&self, scope_ref: ScopeRef, scope: &IrScope) -> Result<()> {
        if scope.blocks().is_empty() {
            bail!("scope has no blocks");
        }
        if let Some(parent) = scope.static_scope().parent() {
            if self.scope(parent).is_none() {
                bail!("parent scope {} does not exist", parent);
            }
        }

        let mut labels: Vec<Label> = scope.blocks().iter().map(|b| b.label()).collect();
        labels.sort_unstable();
        if let Some(dup) = labels.windows(2).find(|w| w[0] == w[1]) {
            bail!("duplicate label {}", dup[0]);
        }
        let has_label = |label: Label| labels.binary_search(&label).is_ok();

        for block in scope.blocks() {
            if let Some(rescue) = block.rescue() {
                if !has_label(rescue) {
                    bail!("block {} names missing rescue label {}", block.label(), rescue);
                }
            }
            for (idx, instr) in block.instrs().iter().enumerate() {
                self.validate_instr(scope_ref, scope, instr, &has_label)
                    .with_context(|| format!("at {}:{} `{}`", block.label(), idx, instr))?;
            }
        }
        Ok(())
    }

    fn validate_instr(
        &self,
        scope_ref: ScopeRef,
        scope: &IrScope,
        instr: &Instr,
        has_label: &dyn Fn(Label) -> bool,
    ) -> Result<()> {
        if let Some(target) = instr.branch_target() {
            if !has_label(target) {
                bail!("jump to missing label {}", target);
            }
        }
        if let Some(site) = instr.site() {
            if site.index() >= self.site_count() {
                bail!("{} out of range ({} sites)", site, self.sites);
            }
        }
        if let Some(body) = instr.scope_ref() {
            let target = self
                .scope(body)
                .ok_or_else(|| anyhow!("reference to missing scope {}", body))?;
            let expected = match instr {
                Instr::Eval { .. } => ScopeKind::Eval,
                _ => ScopeKind::Closure,
            };
            if target.static_scope().kind() != expected {
                bail!("{} is a {:?} scope, expected {:?}", body, target.static_scope().kind(), expected);
            }
            if target.static_scope().parent() != Some(scope_ref) {
                bail!("{} is not lexically nested in this scope", body);
            }
        }
        let operand_vars = instr.operands().into_iter().filter_map(Operand::as_variable);
        for var in instr.result().into_iter().chain(operand_vars) {
            self.validate_variable(scope, var)?;
        }
        Ok(())
    }

    fn validate_variable(&self, scope: &IrScope, var: Variable) -> Result<()> {
        match var {
            Variable::Temp(n) => {
                if n >= scope.temps() {
                    bail!("temp {} out of range ({} temps)", var, scope.temps());
                }
            }
            Variable::Local { depth, index } => {
                let mut target = scope;
                for _ in 0..depth {
                    let parent = target
                        .static_scope()
                        .parent()
                        .ok_or_else(|| anyhow!("{} reaches past the outermost scope", var))?;
                    target = self
                        .scope(parent)
                        .ok_or_else(|| anyhow!("parent scope {} does not exist", parent))?;
                }
                let size = target.static_scope().variable_count();
                if usize::from(index) >= size {
                    bail!("{} out of range ({} variables in '{}')", var, size, target.name());
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for IrProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; entry {}, {} sites", self.entry, self.sites)?;
        for name in self.method_names() {
            if let Some(scope) = self.method(name) {
                writeln!(f, "; def {} -> {}", name, scope)?;
            }
        }
        for (scope_ref, scope) in self.scopes() {
            writeln!(f)?;
            write!(f, "{} {}", scope_ref, scope)?;
        }
        Ok(())
    }
}
