//! Id minting: `<PREFIX><6 decimal digits>`, mod 1_000_000, wrapping.
//!
//! The counter kept in the store's `admin` collection is a hint only — the
//! authoritative uniqueness check is always the entity collection's own
//! lookup before insert. This mirrors `admin_get_next`/`_next_available_code`
//! in the system this service replaces: probe from the hint, linear-scan for
//! the first free slot, and only advance the hint once an id is actually
//! consumed.

use std::sync::Arc;

use crate::store::Store;

const MODULUS: u32 = 1_000_000;

pub struct IdMinter {
    store: Arc<Store>,
}

impl IdMinter {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn format(prefix: &str, n: u32) -> String {
        format!("{prefix}{:06}", n % MODULUS)
    }

    async fn exists(&self, prefix: &str, candidate: &str) -> bool {
        match prefix {
            "SKU" => self.store.sku_exists(candidate).await,
            "BAT" => self.store.batch_exists(candidate).await,
            "BIN" => self.store.bin_exists(candidate).await,
            "MIX" => self.store.mixture_exists(candidate).await,
            "TPL" => self.store.step_template_exists(candidate).await,
            "INS" => self.store.step_instance_exists(candidate).await,
            _ => false,
        }
    }

    /// Returns the lowest-numbered free id for `prefix`, probing up to
    /// `MODULUS` candidates starting from the stored hint before wrapping.
    pub async fn next(&self, prefix: &str) -> String {
        let start = self.store.admin_counter(prefix).await;
        for offset in 0..MODULUS {
            let n = (start + offset) % MODULUS;
            let candidate = Self::format(prefix, n);
            if !self.exists(prefix, &candidate).await {
                return candidate;
            }
        }
        // Collection is fully saturated (never happens in practice); fall
        // back to the hint itself rather than looping forever.
        Self::format(prefix, start)
    }

    /// Called after an id minted by `next` (or supplied by the caller) has
    /// actually been consumed by a successful insert. Never rewinds the
    /// counter past an id that was inserted out of band below the hint.
    pub async fn advance_past(&self, prefix: &str, consumed: &str) {
        let Some(digits) = consumed.strip_prefix(prefix) else {
            return;
        };
        let Ok(n) = digits.parse::<u32>() else {
            return;
        };
        let current = self.store.admin_counter(prefix).await;
        if n >= current {
            self.store.set_admin_counter(prefix, (n + 1) % MODULUS).await;
        }
    }
}
