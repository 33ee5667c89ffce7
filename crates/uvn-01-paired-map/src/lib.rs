//! A map keyed by unordered pairs `(a, b)` with `a != b`, canonicalized to
//! `(min, max)` so that `assert(a, b, v)` and `assert(b, a, v)` observe the
//! same stored value. Used to hold per-link preshared secrets
//! (`uvn-02-keymaterial`) and per-link WireGuard keypairs
//! (`uvn-04-vpnconfig`), where both ends of a backbone edge must agree on
//! exactly one value without a designated "owner" side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical key for an unordered pair: always `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey<T>(pub T, pub T);

impl<T: Ord + Copy> PairKey<T> {
    pub fn new(a: T, b: T) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Raised by [`PairedValueMap::get`] and [`PairedValueMap::pick`] when no
/// value has ever been asserted for the pair.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub struct PairNotFound;

impl fmt::Display for PairNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no value has been asserted for this pair")
    }
}

/// A symmetric association `{a, b} -> V`, `a != b`.
///
/// Equivalent to the reference `PairedValuesMap`: `assert` is a
/// get-or-create keyed on the canonical `(min, max)` ordering, so the
/// first caller to assert a value for a pair "wins" and every later
/// caller — regardless of which side of the pair it is — observes that
/// same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedValueMap<T, V> {
    entries: BTreeMap<PairKey<T>, V>,
}

impl<T, V> Default for PairedValueMap<T, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Copy, V> PairedValueMap<T, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the value for `(a, b)`, inserting `generate()` if
    /// absent. Idempotent: a second `assert` with a different generator
    /// for the same pair (in either order) still returns the first value.
    pub fn assert_with(&mut self, a: T, b: T, generate: impl FnOnce() -> V) -> &V {
        self.entries
            .entry(PairKey::new(a, b))
            .or_insert_with(generate)
    }

    /// Get-or-create using a fixed value rather than a generator.
    pub fn assert(&mut self, a: T, b: T, value: V) -> &V
    where
        V: Clone,
    {
        self.assert_with(a, b, || value)
    }

    /// Look up the value for `(a, b)`, failing if none has been asserted.
    pub fn get(&self, a: T, b: T) -> Result<&V, PairNotFound> {
        self.entries.get(&PairKey::new(a, b)).ok_or(PairNotFound)
    }

    /// Returns the element of `(va, vb)` that corresponds to `target`
    /// under the canonical ordering of `(a, b)`: if `target` is the
    /// smaller of the pair, `va` is returned, otherwise `vb`.
    pub fn pick<'a>(a: T, b: T, target: T, values: (&'a V, &'a V)) -> &'a V {
        let key = PairKey::new(a, b);
        if key.0 == target {
            values.0
        } else {
            values.1
        }
    }

    /// Removes every entry mentioning `peer`, e.g. when a cell is banned
    /// and its per-link key material must not be retained.
    pub fn purge(&mut self, peer: T) {
        self.entries.retain(|k, _| k.0 != peer && k.1 != peer);
    }

    pub fn contains(&self, a: T, b: T) -> bool {
        self.entries.contains_key(&PairKey::new(a, b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, T, &V)> {
        self.entries.iter().map(|(k, v)| (k.0, k.1, v))
    }
}
