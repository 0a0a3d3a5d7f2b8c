//! Dedup and ordering applied to every catalog read.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{Category, Gift};

/// Normalize raw storage records, then dedup and sort them.
///
/// Records without an integral id are dropped.
pub fn merge_records(raw: &[Value]) -> Vec<Gift> {
    dedup_by_id(raw.iter().filter_map(Gift::from_value))
}

/// Keep one record per id (the last one seen) in display order.
pub fn dedup_by_id<I>(gifts: I) -> Vec<Gift>
where
    I: IntoIterator<Item = Gift>,
{
    let mut by_id = BTreeMap::new();
    for gift in gifts {
        by_id.insert(gift.id, gift);
    }
    let mut unique: Vec<Gift> = by_id.into_values().collect();
    sort_for_display(&mut unique);
    unique
}

/// Open-amount gifts first, then ascending id.
pub fn sort_for_display(gifts: &mut [Gift]) {
    gifts.sort_by(|a, b| {
        b.open_amount
            .cmp(&a.open_amount)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Client-side category filter over an already ordered catalog. `None` keeps everything.
pub fn filter_by_category(gifts: &[Gift], category: Option<Category>) -> Vec<Gift> {
    match category {
        Some(category) => gifts
            .iter()
            .filter(|g| g.category == category)
            .cloned()
            .collect(),
        None => gifts.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::initial_catalog;
    use serde_json::json;

    fn gift(id: i64, name: &str, open_amount: bool) -> Gift {
        Gift::from_value(&json!({ "id": id, "name": name, "openAmount": open_amount })).unwrap()
    }

    #[test]
    fn test_dedup_keeps_last_occurrence() {
        let merged = dedup_by_id(vec![
            gift(2, "first two", false),
            gift(1, "only one", false),
            gift(2, "second two", false),
            gift(10, "surprise", true),
            gift(2, "third two", false),
        ]);

        assert_eq!(merged.len(), 3);
        let two = merged.iter().find(|g| g.id == 2).unwrap();
        assert_eq!(two.name, "third two");
    }

    #[test]
    fn test_open_amount_sorts_first_then_by_id() {
        let merged = dedup_by_id(vec![
            gift(7, "", false),
            gift(12, "", true),
            gift(3, "", false),
            gift(10, "", true),
            gift(1, "", false),
        ]);

        let order: Vec<(bool, i64)> = merged.iter().map(|g| (g.open_amount, g.id)).collect();
        assert_eq!(
            order,
            vec![(true, 10), (true, 12), (false, 1), (false, 3), (false, 7)]
        );
    }

    #[test]
    fn test_merge_records_skips_records_without_id() {
        let raw = vec![
            json!({ "id": 1, "name": "Blender" }),
            json!(null),
            json!({ "name": "orphan" }),
            json!({ "id": 1, "name": "Blender v2" }),
        ];

        let merged = merge_records(&raw);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Blender v2");
    }

    #[test]
    fn test_initial_catalog_is_already_in_display_order() {
        let catalog = initial_catalog();
        assert_eq!(dedup_by_id(catalog.clone()), catalog);
    }

    #[test]
    fn test_filter_by_category() {
        let catalog = initial_catalog();

        let kitchen = filter_by_category(&catalog, Some(Category::Kitchen));
        assert_eq!(kitchen.iter().map(|g| g.id).collect::<Vec<_>>(), vec![4, 5, 6]);

        assert_eq!(filter_by_category(&catalog, None).len(), catalog.len());
    }
}
