#[cfg(all(feature = "rustc-hash", not(feature = "std-hash")))]
pub type FastMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[cfg(any(not(feature = "rustc-hash"), feature = "std-hash"))]
pub type FastMap<K, V> = std::collections::HashMap<K, V>;
