//! Property tests for the pairwise contact-material table.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)] // Standard in tests

use clatter_contact::{ContactMaterial, ContactMaterialTable, MaterialId, MaterialPair};
use proptest::prelude::*;

fn entry() -> impl Strategy<Value = ContactMaterial> {
    (0.0..60.0_f64, 0.0..=1.0_f64).prop_map(|(f, r)| ContactMaterial::new(f, r))
}

proptest! {
    #[test]
    fn lookup_is_symmetric(
        inserts in prop::collection::vec((0u32..8, 0u32..8, entry()), 0..40),
        a in 0u32..8,
        b in 0u32..8,
    ) {
        let mut table = ContactMaterialTable::new();
        for (x, y, e) in &inserts {
            table.insert(MaterialId(*x), MaterialId(*y), *e).unwrap();
        }

        let ab = table.resolve(MaterialId(a), MaterialId(b));
        let ba = table.resolve(MaterialId(b), MaterialId(a));
        prop_assert_eq!(ab, ba);
        prop_assert_eq!(table.get(MaterialId(a), MaterialId(b)), table.get(MaterialId(b), MaterialId(a)));
    }

    #[test]
    fn at_most_one_entry_per_unordered_pair(
        inserts in prop::collection::vec((0u32..6, 0u32..6, entry()), 0..60),
    ) {
        let mut table = ContactMaterialTable::new();
        let mut distinct = std::collections::BTreeSet::new();
        for (x, y, e) in &inserts {
            table.insert(MaterialId(*x), MaterialId(*y), *e).unwrap();
            distinct.insert(MaterialPair::new(MaterialId(*x), MaterialId(*y)));
        }

        prop_assert_eq!(table.len(), distinct.len());
        prop_assert!(table.len() <= 21);
    }

    #[test]
    fn last_insert_wins(x in 0u32..10, y in 0u32..10, first in entry(), second in entry()) {
        let mut table = ContactMaterialTable::new();
        table.insert(MaterialId(x), MaterialId(y), first).unwrap();
        table.insert(MaterialId(y), MaterialId(x), second).unwrap();

        let lookup = table.resolve(MaterialId(x), MaterialId(y));
        prop_assert!(lookup.is_registered());
        prop_assert_eq!(lookup.material(), second);
    }

    #[test]
    fn fully_populated_table_never_falls_back(n in 1usize..12) {
        let ids: Vec<_> = (0..n).map(|i| MaterialId(u32::try_from(i).unwrap())).collect();
        let mut table = ContactMaterialTable::new();
        table
            .insert_all_pairs(&ids, |a, b| ContactMaterial::new(50.0, if a == b { 0.2 } else { 0.1 }))
            .unwrap();

        prop_assert_eq!(table.len(), n * (n + 1) / 2);
        for &a in &ids {
            for &b in &ids {
                prop_assert!(table.resolve(a, b).is_registered());
            }
        }
    }
}
