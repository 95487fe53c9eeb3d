//! Stable 64-bit symbol hashing for mode/level tokens (spec §4.1)

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// A 64-bit identifier derived by a stable hash of a short ASCII token.
///
/// Symbol `0` is reserved for "unloaded/absent" (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub u64);

impl Symbol {
    /// The reserved "unloaded/absent" symbol.
    pub const NONE: Symbol = Symbol(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// FNV-1a 64-bit hash, chosen for being a small, dependency-free, and
/// deterministic-across-processes hash suitable for stable symbol ids.
fn fnv1a(token: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for byte in token.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn registry() -> &'static Mutex<HashMap<u64, String>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Hashes `token` into a `Symbol`, registering the token so it can later be
/// recovered by [`token_of`]. Hashing the empty string always yields
/// [`Symbol::NONE`], matching the "unloaded" sentinel.
pub fn symbol(token: &str) -> Symbol {
    if token.is_empty() {
        return Symbol::NONE;
    }

    let hash = fnv1a(token);
    registry().lock().entry(hash).or_insert_with(|| token.to_string());
    Symbol(hash)
}

/// Recovers the token a [`Symbol`] was derived from, if it was produced via
/// [`symbol`] in this process. Unknown symbols decode to a hex fallback
/// rather than erroring, per spec §4.1.
pub fn token_of(sym: Symbol) -> String {
    if sym.is_none() {
        return String::new();
    }

    registry()
        .lock()
        .get(&sym.0)
        .cloned()
        .unwrap_or_else(|| format!("{:#018x}", sym.0))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symbol_round_trip() {
        let sym = symbol("echo_arena");
        assert_eq!(token_of(sym), "echo_arena");
    }

    #[test]
    fn symbol_is_deterministic() {
        assert_eq!(symbol("echo_combat"), symbol("echo_combat"));
    }

    #[test]
    fn empty_token_is_none_symbol() {
        assert_eq!(symbol(""), Symbol::NONE);
        assert!(symbol("").is_none());
    }

    #[test]
    fn unknown_symbol_decodes_to_hex_fallback() {
        let unknown = Symbol(0xdead_beef_cafe_1234);
        assert_eq!(token_of(unknown), "0xdeadbeefcafe1234");
    }
}
