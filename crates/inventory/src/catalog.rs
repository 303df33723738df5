//! Category grouping.

use std::collections::BTreeMap;

use serde::Serialize;

/// Bucket for items without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Count items per category, mapping `None` to [`UNCATEGORIZED`], ordered by name.
pub fn category_counts<'a, I>(categories: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for c in categories {
        *counts
            .entry(c.unwrap_or(UNCATEGORIZED).to_string())
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect()
}
