//! # Ledger Configuration & Constants
//!
//! Every fixed value the ledger depends on lives here: the composite-key
//! namespace, the two built-in asset kinds, the conversion collector, the
//! genesis table, and the sled tree layout.
//!
//! The genesis table and key namespace are part of the on-disk format.
//! Changing either after a ledger has been seeded orphans existing records.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version string reported by hosts (`/status`, `version` subcommand).
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Key Namespace
// ---------------------------------------------------------------------------

/// Object type used as the first composite-key component of every asset.
/// All asset keys share the `\u{0}Asset\u{0}` prefix.
pub const ASSET_NAMESPACE: &str = "Asset";

/// Component delimiter for composite keys. Also the leading byte, so that
/// composite keys never collide with plain keys written by other code.
pub const COMPOSITE_KEY_DELIMITER: char = '\u{0}';

/// Highest Unicode scalar. Reserved as a range-end sentinel and therefore
/// rejected inside key components.
pub const MAX_UNICODE_RUNE: char = '\u{10FFFF}';

// ---------------------------------------------------------------------------
// Asset Kinds
// ---------------------------------------------------------------------------

/// The spendable currency.
pub const KIND_GEM: &str = "gem";

/// The earned-experience counter. Minted 1:1 by gem conversion.
pub const KIND_EXP: &str = "exp";

/// Owner that collects the gem spent in a gem → exp conversion.
pub const DEFAULT_COLLECTOR: &str = "Distrib";

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Records written by `InitLedger`, as `(kind, owner, amount)`.
///
/// Order matters only for log readability; the seeding writes are
/// independent keys.
pub const GENESIS_ASSETS: [(&str, &str, u64); 6] = [
    (KIND_EXP, DEFAULT_COLLECTOR, 5),
    (KIND_GEM, "SEO", 3000),
    (KIND_GEM, "Team1", 1),
    (KIND_EXP, "Team1", 6),
    (KIND_GEM, "Team2", 15),
    (KIND_EXP, "Team2", 15),
];

// ---------------------------------------------------------------------------
// Host Defaults
// ---------------------------------------------------------------------------

/// How many times a host re-runs an invocation that lost an optimistic
/// concurrency race before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default port for the JSON-RPC and REST API.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// sled tree holding the world state (`key -> version || value`).
pub const WORLD_STATE_TREE: &str = "world_state";

/// sled tree holding commit metadata.
pub const METADATA_TREE: &str = "metadata";

/// Length of the big-endian version prefix stored in front of every value.
pub const VERSION_PREFIX_LEN: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_six_distinct_identities() {
        let mut ids: Vec<(&str, &str)> = GENESIS_ASSETS.iter().map(|(k, o, _)| (*k, *o)).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn genesis_only_uses_builtin_kinds() {
        assert!(GENESIS_ASSETS
            .iter()
            .all(|(kind, _, _)| *kind == KIND_GEM || *kind == KIND_EXP));
    }

    #[test]
    fn namespace_is_a_valid_key_component() {
        assert!(!ASSET_NAMESPACE.is_empty());
        assert!(!ASSET_NAMESPACE.contains(COMPOSITE_KEY_DELIMITER));
        assert!(!ASSET_NAMESPACE.contains(MAX_UNICODE_RUNE));
    }
}
