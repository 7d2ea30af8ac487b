//! Per-site inline caching for block invocation (`yield` and closure calls).
//!
//! A site remembers the call target of the last closure it saw. Same target: the
//! cached body is reused without consulting the closure. Different target: the site
//! re-specializes, until `megamorphic_threshold` changes push it to the generic path
//! for good. Every tier resolves to the same body, so results never depend on the tier.

use tracing::debug;

use crate::ir::{ScopeRef, SiteId};
use crate::val::{CallTarget, Closure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    Cached { target: CallTarget, body: ScopeRef, hits: u64 },
    General,
}

#[derive(Debug, Clone)]
pub struct DispatchSite {
    state: DispatchState,
    misses: u32,
}

impl Default for DispatchSite {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchSite {
    pub fn new() -> Self {
        Self {
            state: DispatchState::Uninitialized,
            misses: 0,
        }
    }

    /// A site that never caches.
    pub fn general() -> Self {
        Self {
            state: DispatchState::General,
            misses: 0,
        }
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// Body to execute for `closure` at this site.
    pub fn resolve(&mut self, site: SiteId, closure: &Closure, megamorphic_threshold: u32) -> ScopeRef {
        let current = closure.call_target();
        match self.state {
            DispatchState::Cached {
                target,
                body,
                ref mut hits,
            } if target == current => {
                *hits += 1;
                return body;
            }
            DispatchState::General => return closure.body(),
            DispatchState::Uninitialized => {
                debug!(target: "irk::dispatch", %site, body = %closure.body(), "site specialized");
            }
            DispatchState::Cached { .. } => {
                self.misses += 1;
                if self.misses >= megamorphic_threshold {
                    debug!(target: "irk::dispatch", %site, misses = self.misses, "site went megamorphic");
                    self.state = DispatchState::General;
                    return closure.body();
                }
                debug!(target: "irk::dispatch", %site, body = %closure.body(), "site re-specialized");
            }
        }
        self.state = DispatchState::Cached {
            target: current,
            body: closure.body(),
            hits: 0,
        };
        closure.body()
    }
}
