use std::sync::Arc;

pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[inline]
pub fn fast_hash_map_new<K, V>() -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::default()
}

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}

/// Build a symbol-keyed map from `(name, value)` pairs; later duplicates win.
pub fn symbol_map_from_pairs<V, I, S>(pairs: I) -> FastHashMap<Arc<str>, V>
where
    I: IntoIterator<Item = (S, V)>,
    S: Into<Arc<str>>,
{
    let iter = pairs.into_iter();
    let mut map = fast_hash_map_with_capacity(iter.size_hint().0);
    for (key, value) in iter {
        map.insert(key.into(), value);
    }
    map
}
