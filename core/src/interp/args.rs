//! Incoming-argument binding for the `Receive*` instruction family.
//!
//! A frame's [`CallArgs`] holds the caller's values untouched. When the callee accepts
//! keywords and the trailing value is a map, that map doubles as the keyword hash: it
//! still counts toward `len()`, positional binders ignore it, and keyword binders work
//! on a private copy so the caller's map is never mutated.

use std::sync::Arc;

use crate::error::{ArityMismatch, RaisedError};
use crate::util::fast_map::FastHashMap;
use crate::val::Val;

#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    values: Vec<Val>,
    keywords: Option<FastHashMap<Arc<str>, Val>>,
}

impl CallArgs {
    pub fn new(values: Vec<Val>, accepts_keywords: bool) -> Self {
        let keywords = if accepts_keywords {
            values.last().and_then(Val::as_map).cloned()
        } else {
            None
        };
        Self { values, keywords }
    }

    pub fn positional(values: Vec<Val>) -> Self {
        Self::new(values, false)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn keyword_hash_count(&self) -> usize {
        usize::from(self.keywords.is_some())
    }

    #[inline]
    pub fn positional_len(&self) -> usize {
        self.values.len() - self.keyword_hash_count()
    }

    pub fn values(&self) -> &[Val] {
        &self.values
    }

    /// Keys not yet claimed by a keyword receiver.
    pub fn remaining_keywords(&self) -> Option<&FastHashMap<Arc<str>, Val>> {
        self.keywords.as_ref()
    }

    /// Proc argument restructuring: a lone list argument becomes the argument list.
    pub fn spread_single_list(&mut self) -> bool {
        if self.values.len() != 1 || self.keywords.is_some() {
            return false;
        }
        let Some(items) = self.values[0].as_list() else {
            return false;
        };
        self.values = items.to_vec();
        true
    }

    pub fn check_arity(&self, required: u16, optional: u16, rest: bool) -> Result<(), RaisedError> {
        let actual = self.positional_len();
        let required = usize::from(required);
        let max = required + usize::from(optional);
        if actual < required || (!rest && actual > max) {
            return Err(RaisedError::arity(ArityMismatch {
                actual,
                min: required,
                max: if rest { None } else { Some(max) },
            }));
        }
        Ok(())
    }

    /// Leading required argument. Procs (`lenient`) bind `nil` for a missing one.
    pub fn receive_pre_required(&self, index: u16, lenient: bool) -> Result<Val, RaisedError> {
        let index = usize::from(index);
        if index < self.positional_len() {
            return Ok(self.values[index].clone());
        }
        if lenient {
            return Ok(Val::Nil);
        }
        Err(RaisedError::arity(ArityMismatch {
            actual: self.positional_len(),
            min: index + 1,
            max: None,
        }))
    }

    /// Optional argument at absolute position `index`, or the undefined marker when the
    /// caller did not supply enough values to reach it after the trailing required ones.
    pub fn receive_optional(&self, index: u16, post_required: u16) -> Val {
        let index = usize::from(index);
        if index + usize::from(post_required) < self.positional_len() {
            self.values[index].clone()
        } else {
            Val::Undefined
        }
    }

    /// Fresh list of the values left after `required + optional` are netted out,
    /// starting at `arg_index`.
    pub fn receive_rest(&self, arg_index: u16, required: u16, optional: u16) -> Val {
        let fixed = usize::from(required) + usize::from(optional);
        let n = self.positional_len();
        if n <= fixed {
            return Val::list([]);
        }
        let start = usize::from(arg_index);
        match self.values.get(start..start + (n - fixed)) {
            Some(slice) => Val::List(slice.to_vec().into()),
            None => Val::list([]),
        }
    }

    /// `index`-th trailing required argument. Reads from the end when enough values were
    /// passed, from right after the leading required ones otherwise; missing ones are `nil`.
    pub fn receive_post_required(
        &self,
        index: u16,
        pre_required: u16,
        optional: u16,
        rest: bool,
        post_required: u16,
    ) -> Val {
        let n = self.positional_len();
        let index = usize::from(index);
        let pre = usize::from(pre_required);
        let opt = usize::from(optional);
        let post = usize::from(post_required);

        if n.saturating_sub(pre) < post {
            if pre + index >= n {
                return Val::Nil;
            }
            return self.values[pre + index].clone();
        }
        if !rest && n > pre + post + opt {
            self.values[pre + opt + index].clone()
        } else {
            self.values[n - post + index].clone()
        }
    }

    fn keyword_guard(&self, expected_used: u16) -> Result<(), RaisedError> {
        let len = self.values.len();
        if usize::from(expected_used) == len {
            return Err(RaisedError::arity(ArityMismatch {
                actual: len - 1,
                min: usize::from(expected_used),
                max: None,
            }));
        }
        Ok(())
    }

    /// Claim keyword `name`. Undefined when there is no keyword hash or the key is absent.
    pub fn receive_keyword(&mut self, name: &str, expected_used: u16) -> Result<Val, RaisedError> {
        if self.keywords.is_none() {
            return Ok(Val::Undefined);
        }
        self.keyword_guard(expected_used)?;
        Ok(self
            .keywords
            .as_mut()
            .and_then(|kw| kw.remove(name))
            .unwrap_or(Val::Undefined))
    }

    /// Every keyword not claimed so far, as a fresh map.
    pub fn receive_keyword_rest(&mut self, expected_used: u16) -> Result<Val, RaisedError> {
        if self.keywords.is_none() {
            return Ok(Val::empty_map());
        }
        self.keyword_guard(expected_used)?;
        let rest = self.keywords.as_ref().cloned().unwrap_or_default();
        Ok(Val::Map(Arc::new(rest)))
    }
}
