//! Category filter and free-text search over an in-memory package list.

use std::str::FromStr;

use serde::Serialize;

use crate::models::package::{Category, PackageRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(CategoryFilter::All),
            slug => Category::from_slug(slug)
                .map(CategoryFilter::Only)
                .ok_or_else(|| format!("Unknown category '{slug}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryOption {
    pub id: &'static str,
    pub name: &'static str,
}

/// The filter options in display order, `all` first.
pub fn categories() -> Vec<CategoryOption> {
    std::iter::once(CategoryOption {
        id: "all",
        name: "All Packages",
    })
    .chain(Category::ALL.into_iter().map(|c| CategoryOption {
        id: c.slug(),
        name: c.display_name(),
    }))
    .collect()
}

/// True when the record passes both the category and the search term.
///
/// The term matches case-insensitively as a substring of the title, the short
/// description or the location. An empty term matches everything.
pub fn matches(record: &PackageRecord, category: CategoryFilter, term: &str) -> bool {
    let in_category = match category {
        CategoryFilter::All => true,
        CategoryFilter::Only(c) => record.category == Some(c),
    };
    if !in_category {
        return false;
    }
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    [&record.title, &record.description, &record.location]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// The visible subset, in input order.
pub fn filter_packages(
    records: &[PackageRecord],
    category: CategoryFilter,
    term: &str,
) -> Vec<PackageRecord> {
    records
        .iter()
        .filter(|record| matches(record, category, term))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use uuid::Uuid;

    use crate::models::package::{Difficulty, Status};

    fn record(title: &str, description: &str, location: &str, category: Option<Category>) -> PackageRecord {
        PackageRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            full_description: String::new(),
            duration: "3 Days".to_string(),
            location: location.to_string(),
            category,
            difficulty: Difficulty::Easy,
            status: Status::Active,
            price: None,
            highlights: vec![],
            includes: vec![],
            excludes: vec![],
            itinerary: vec![],
            image: String::new(),
            images: vec![],
            created_at: DateTime::<Utc>::default(),
            updated_at: None,
        }
    }

    fn sample() -> Vec<PackageRecord> {
        vec![
            record("Alleppey Houseboat", "Overnight cruise", "Alappuzha", Some(Category::Backwaters)),
            record("Munnar Escape", "Tea gardens and mist", "Munnar", Some(Category::HillStation)),
            record("Kovalam Sands", "Lighthouse beach stay", "Kovalam", Some(Category::Beach)),
            record("Periyar Safari", "Boat ride among elephants", "Thekkady", Some(Category::Wildlife)),
            record("Uncategorised", "Legacy entry", "Kochi", None),
        ]
    }

    #[test]
    fn test_all_and_empty_term_is_identity() {
        let records = sample();
        assert_eq!(filter_packages(&records, CategoryFilter::All, ""), records);
    }

    #[test]
    fn test_category_exact_match() {
        let visible = filter_packages(&sample(), CategoryFilter::Only(Category::Beach), "");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Kovalam Sands");
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let records = sample();
        assert_eq!(filter_packages(&records, CategoryFilter::All, "HOUSEBOAT").len(), 1);
        assert_eq!(filter_packages(&records, CategoryFilter::All, "elephants").len(), 1);
        assert_eq!(filter_packages(&records, CategoryFilter::All, "thekkady").len(), 1);
        assert!(filter_packages(&records, CategoryFilter::All, "snow").is_empty());
    }

    #[test]
    fn test_category_and_search_compose() {
        let records = sample();
        let visible = filter_packages(&records, CategoryFilter::Only(Category::HillStation), "cruise");
        assert!(visible.is_empty());
        let visible = filter_packages(&records, CategoryFilter::Only(Category::Backwaters), "cruise");
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn test_parse_category_filter() {
        assert_eq!("all".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!("".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!(
            "complete-tour".parse::<CategoryFilter>(),
            Ok(CategoryFilter::Only(Category::CompleteTour))
        );
        assert!("cruise".parse::<CategoryFilter>().is_err());
    }

    #[test]
    fn test_categories_lists_all_first() {
        let options = categories();
        assert_eq!(options.len(), 9);
        assert_eq!(options[0], CategoryOption { id: "all", name: "All Packages" });
        assert_eq!(options[2].name, "Hill Stations");
    }

    fn arbitrary_category() -> impl Strategy<Value = CategoryFilter> {
        prop_oneof![
            Just(CategoryFilter::All),
            (0..Category::ALL.len()).prop_map(|i| CategoryFilter::Only(Category::ALL[i])),
        ]
    }

    fn arbitrary_records() -> impl Strategy<Value = Vec<PackageRecord>> {
        prop::collection::vec(
            (
                "[a-zA-Z ]{0,12}",
                "[a-zA-Z ]{0,20}",
                "[a-zA-Z]{0,8}",
                prop::option::of(0..Category::ALL.len()),
            )
                .prop_map(|(title, description, location, category)| {
                    record(&title, &description, &location, category.map(|i| Category::ALL[i]))
                }),
            0..12,
        )
    }

    proptest! {
        #[test]
        fn prop_all_and_empty_term_is_identity(records in arbitrary_records()) {
            prop_assert_eq!(filter_packages(&records, CategoryFilter::All, ""), records);
        }

        #[test]
        fn prop_filter_is_ordered_subset(
            records in arbitrary_records(),
            category in arbitrary_category(),
            term in "[a-zA-Z ]{0,3}",
        ) {
            let visible = filter_packages(&records, category, &term);
            prop_assert!(visible.len() <= records.len());
            // Every visible record appears in the input, in the same order
            let mut remaining = records.iter();
            for record in &visible {
                prop_assert!(remaining.any(|candidate| candidate == record));
                prop_assert!(matches(record, category, &term));
            }
        }

        #[test]
        fn prop_filter_is_deterministic(
            records in arbitrary_records(),
            category in arbitrary_category(),
            term in "[a-z]{0,4}",
        ) {
            prop_assert_eq!(
                filter_packages(&records, category, &term),
                filter_packages(&records, category, &term)
            );
        }
    }
}
