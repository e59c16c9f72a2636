//! Sequential human-readable IDs (`ORD1000000001`, `ITM1000000001`)
//!
//! The numeric part is the highest well-formed ID already present in the
//! scope plus one. IDs that do not match `<prefix><10 digits>` are legacy or
//! foreign and are skipped. Allocation itself happens inside a redb write
//! transaction (see [`OrderStorage::allocate_id_txn`]), which is what makes it
//! linearizable per scope.

use super::storage::{OrderStorage, StorageResult};

/// Numeric width of every generated ID
pub const ID_DIGITS: usize = 10;

/// Numeric part of the very first ID in an empty scope
pub const ID_BASE: u64 = 1_000_000_001;

/// ID scope; orders and order items are numbered independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdScope {
    Orders,
    OrderItems,
}

impl IdScope {
    pub const fn prefix(&self) -> &'static str {
        match self {
            IdScope::Orders => "ORD",
            IdScope::OrderItems => "ITM",
        }
    }
}

/// Format `prefix` + zero-padded number
pub fn format_id(prefix: &str, number: u64) -> String {
    format!("{prefix}{number:0width$}", width = ID_DIGITS)
}

/// Numeric part of a well-formed ID, `None` for anything else
pub fn parse_id(prefix: &str, id: &str) -> Option<u64> {
    let digits = id.strip_prefix(prefix)?;
    if digits.len() != ID_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `highest + 1`, or [`ID_BASE`] when the scope is empty
pub(crate) fn next_number(highest: Option<u64>) -> u64 {
    match highest {
        Some(n) if n >= ID_BASE => n + 1,
        _ => ID_BASE,
    }
}

/// Upper bound (exclusive) of the key range holding `<prefix><digits>` keys.
///
/// ':' sorts right after '9', so every well-formed key is below it.
pub(crate) fn scan_upper_bound(prefix: &str) -> String {
    format!("{prefix}:")
}

/// Stand-alone generator for callers that need an ID before writing a record
#[derive(Clone)]
pub struct SequentialIdGenerator {
    storage: OrderStorage,
}

impl SequentialIdGenerator {
    pub fn new(storage: OrderStorage) -> Self {
        Self { storage }
    }

    /// Allocate the next ID in `scope` (own write transaction)
    ///
    /// The ID is recorded as issued, so consecutive calls never repeat even if
    /// the caller never persists a record under it.
    pub fn next_id(&self, scope: IdScope) -> StorageResult<String> {
        let txn = self.storage.begin_write()?;
        let id = self.storage.allocate_id_txn(&txn, scope)?;
        txn.commit()?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_ten_digits() {
        assert_eq!(format_id("ORD", ID_BASE), "ORD1000000001");
        assert_eq!(format_id("ITM", 42), "ITM0000000042");
    }

    #[test]
    fn test_parse_rejects_foreign_ids() {
        assert_eq!(parse_id("ORD", "ORD1000000007"), Some(1_000_000_007));
        assert_eq!(parse_id("ORD", "ORD12"), None);
        assert_eq!(parse_id("ORD", "ORD10000000x1"), None);
        assert_eq!(parse_id("ORD", "ITM1000000007"), None);
        assert_eq!(parse_id("ORD", "ord1000000007"), None);
        assert_eq!(parse_id("ORD", "ORD+000000007"), None);
    }

    #[test]
    fn test_next_number_starts_at_base() {
        assert_eq!(format_id("ORD", next_number(None)), "ORD1000000001");
    }

    #[test]
    fn test_legacy_ids_do_not_count() {
        let existing = ["ORD1000000003", "legacy-42", "ORD99", "ORD1000000001"];
        let highest = existing.iter().filter_map(|id| parse_id("ORD", id)).max();
        assert_eq!(format_id("ORD", next_number(highest)), "ORD1000000004");
    }

    #[test]
    fn test_next_number_ignores_values_below_base() {
        assert_eq!(next_number(Some(5)), ID_BASE);
        assert_eq!(next_number(Some(ID_BASE)), ID_BASE + 1);
    }

    #[test]
    fn test_scan_bound_covers_well_formed_keys() {
        let upper = scan_upper_bound("ORD");
        assert!("ORD9999999999" < upper.as_str());
        assert!("ORD0000000000" >= "ORD");
        assert!("ORE" > upper.as_str());
    }

    #[test]
    fn test_generator_is_monotonic() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let generator = SequentialIdGenerator::new(storage);

        let ids: Vec<String> = (0..5)
            .map(|_| generator.next_id(IdScope::Orders).unwrap())
            .collect();
        let expected: Vec<String> = (0..5).map(|n| format_id("ORD", ID_BASE + n)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_scopes_are_independent() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let generator = SequentialIdGenerator::new(storage);

        assert_eq!(generator.next_id(IdScope::Orders).unwrap(), "ORD1000000001");
        assert_eq!(generator.next_id(IdScope::OrderItems).unwrap(), "ITM1000000001");
        assert_eq!(generator.next_id(IdScope::Orders).unwrap(), "ORD1000000002");
    }
}
