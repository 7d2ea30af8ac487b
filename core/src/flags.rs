//! Per-object boolean flag bit allocation across a type hierarchy.
//!
//! Bits are handed out first-come-first-served. A type continues numbering from the
//! next free index recorded on itself or, failing that, on its nearest registered
//! ancestor, so a descendant never reuses a bit its lineage already owns. Allocation is
//! a setup-time operation; the whole registry sits behind a single lock.

use std::{fmt, hash::Hash};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::util::fast_map::{FastHashMap, fast_hash_map_new};

/// Flags live in a `u64` mask.
pub const MAX_FLAG_BITS: u32 = 64;

/// Single-parent type relation supplied by the host type system.
pub trait TypeHierarchy<K> {
    fn parent_of(&self, ty: &K) -> Option<K>;
}

impl<K, F> TypeHierarchy<K> for F
where
    F: Fn(&K) -> Option<K>,
{
    fn parent_of(&self, ty: &K) -> Option<K> {
        self(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    /// Registration order produced a bit shared between a type and an ancestor or
    /// descendant. This is a configuration bug, not a runtime condition.
    Overlap { ty: String, other: String, bit: u32 },
    Exhausted { ty: String },
}

impl fmt::Display for FlagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagError::Overlap { ty, other, bit } => {
                write!(f, "flag bit {} of {} overlaps a bit already claimed by {}", bit, ty, other)
            }
            FlagError::Exhausted { ty } => {
                write!(f, "no free flag bits left for {} (limit {})", ty, MAX_FLAG_BITS)
            }
        }
    }
}

impl std::error::Error for FlagError {}

#[derive(Debug, Clone, Default)]
struct FlagSlots {
    next_bit: u32,
    claimed: Vec<u32>,
}

pub struct FlagRegistry<K> {
    slots: Mutex<FastHashMap<K, FlagSlots>>,
}

static GLOBAL_REGISTRY: Lazy<FlagRegistry<&'static str>> = Lazy::new(FlagRegistry::new);

impl FlagRegistry<&'static str> {
    /// Process-wide registry keyed by type name.
    pub fn global() -> &'static FlagRegistry<&'static str> {
        &GLOBAL_REGISTRY
    }
}

impl<K> Default for FlagRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> FlagRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(fast_hash_map_new()),
        }
    }

    /// Claim the next bit for `ty` and return it as a mask.
    pub fn allocate_flag<H>(&self, hierarchy: &H, ty: &K) -> Result<u64, FlagError>
    where
        H: TypeHierarchy<K> + ?Sized,
    {
        let mut slots = self.slots.lock();

        let bit = Self::inherited_next_bit(&slots, hierarchy, ty);
        if bit >= MAX_FLAG_BITS {
            return Err(FlagError::Exhausted {
                ty: format!("{:?}", ty),
            });
        }

        if let Some(other) = Self::find_conflict(&slots, hierarchy, ty, bit) {
            let err = FlagError::Overlap {
                ty: format!("{:?}", ty),
                other: format!("{:?}", other),
                bit,
            };
            error!(target: "irk::flags", "{}", err);
            return Err(err);
        }

        let entry = slots.entry(ty.clone()).or_default();
        entry.claimed.push(bit);
        entry.next_bit = bit + 1;
        debug!(target: "irk::flags", ty = ?ty, bit, "allocated flag");
        Ok(1u64 << bit)
    }

    /// Setup-time variant of [`allocate_flag`](Self::allocate_flag) for hosts that
    /// register their built-in types at boot: any failure is a configuration bug and
    /// stops the process with the diagnostic.
    ///
    /// # Panics
    ///
    /// On [`FlagError::Overlap`] or [`FlagError::Exhausted`].
    pub fn allocate_flag_or_abort<H>(&self, hierarchy: &H, ty: &K) -> u64
    where
        H: TypeHierarchy<K> + ?Sized,
    {
        match self.allocate_flag(hierarchy, ty) {
            Ok(mask) => mask,
            Err(err) => panic!("fatal flag configuration error: {}", err),
        }
    }

    fn inherited_next_bit<H>(slots: &FastHashMap<K, FlagSlots>, hierarchy: &H, ty: &K) -> u32
    where
        H: TypeHierarchy<K> + ?Sized,
    {
        let mut cursor = Some(ty.clone());
        while let Some(current) = cursor {
            if let Some(entry) = slots.get(&current) {
                return entry.next_bit;
            }
            cursor = hierarchy.parent_of(&current);
        }
        0
    }

    fn find_conflict<H>(slots: &FastHashMap<K, FlagSlots>, hierarchy: &H, ty: &K, bit: u32) -> Option<K>
    where
        H: TypeHierarchy<K> + ?Sized,
    {
        let mut cursor = hierarchy.parent_of(ty);
        while let Some(ancestor) = cursor {
            if slots.get(&ancestor).is_some_and(|entry| entry.claimed.contains(&bit)) {
                return Some(ancestor);
            }
            cursor = hierarchy.parent_of(&ancestor);
        }

        slots
            .iter()
            .filter(|(other, entry)| *other != ty && entry.claimed.contains(&bit))
            .find(|(other, _)| Self::is_ancestor(hierarchy, ty, other))
            .map(|(other, _)| other.clone())
    }

    fn is_ancestor<H>(hierarchy: &H, ancestor: &K, ty: &K) -> bool
    where
        H: TypeHierarchy<K> + ?Sized,
    {
        let mut cursor = hierarchy.parent_of(ty);
        while let Some(current) = cursor {
            if &current == ancestor {
                return true;
            }
            cursor = hierarchy.parent_of(&current);
        }
        false
    }

    /// Bits claimed directly by `ty`, in allocation order. Empty for unknown types.
    pub fn claimed_bits(&self, ty: &K) -> Vec<u32> {
        self.slots
            .lock()
            .get(ty)
            .map(|entry| entry.claimed.clone())
            .unwrap_or_default()
    }

    pub fn claimed_mask(&self, ty: &K) -> u64 {
        self.claimed_bits(ty).iter().fold(0, |mask, bit| mask | (1u64 << bit))
    }

    /// Next free index recorded on `ty` itself, if it ever allocated.
    pub fn next_free(&self, ty: &K) -> Option<u32> {
        self.slots.lock().get(ty).map(|entry| entry.next_bit)
    }

    /// Lineage of `ty` from the root down, each with its directly claimed bits.
    /// Types that never allocated appear with an empty list.
    pub fn describe<H>(&self, hierarchy: &H, ty: &K) -> Vec<(K, Vec<u32>)>
    where
        H: TypeHierarchy<K> + ?Sized,
    {
        let slots = self.slots.lock();
        let mut lineage = Vec::new();
        let mut cursor = Some(ty.clone());
        while let Some(current) = cursor {
            let bits = slots.get(&current).map(|e| e.claimed.clone()).unwrap_or_default();
            cursor = hierarchy.parent_of(&current);
            lineage.push((current, bits));
        }
        lineage.reverse();
        lineage
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
