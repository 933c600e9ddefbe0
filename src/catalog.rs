// src/catalog.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed category set and the item pool registered for each category

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Record category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Food,
    Toys,
    Electronics,
    Books,
    Stationery,
    Tools,
}

impl Category {
    /// Every category, in draw order
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::Toys,
        Category::Electronics,
        Category::Books,
        Category::Stationery,
        Category::Tools,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Toys => "Toys",
            Category::Electronics => "Electronics",
            Category::Books => "Books",
            Category::Stationery => "Stationery",
            Category::Tools => "Tools",
        }
    }

    /// Item pool for this category; items are only ever drawn from here
    pub fn items(self) -> &'static [&'static str] {
        match self {
            Category::Food => &[
                "whole milk",
                "yogurt",
                "cream cheese",
                "bottled water",
                "soda",
                "tropical fruit",
                "citrus fruit",
                "berries",
                "semi-finished bread",
                "rolls/buns",
                "chocolate",
                "bottled beer",
            ],
            Category::Toys => &[
                "building blocks",
                "action figure",
                "doll",
                "puzzle",
                "board game",
                "toy car",
                "plush bear",
                "yo-yo",
                "kite",
                "water gun",
                "RC drone",
                "slime",
            ],
            Category::Electronics => &[
                "battery AA",
                "battery AAA",
                "USB cable",
                "HDMI cable",
                "phone charger",
                "power bank",
                "headphones",
                "bluetooth speaker",
                "LED bulb",
                "extension cord",
                "wireless mouse",
                "keyboard",
            ],
            Category::Books => &[
                "novel",
                "textbook",
                "children book",
                "cookbook",
                "travel guide",
                "mystery novel",
                "sci-fi novel",
                "fantasy novel",
                "comic book",
                "workbook",
                "dictionary",
                "magazine",
            ],
            Category::Stationery => &[
                "paper clips",
                "notebook",
                "gel pen",
                "highlighter",
                "stapler",
                "sticky notes",
                "binder",
                "eraser",
                "pencil",
                "marker",
                "correction tape",
                "ruler",
            ],
            Category::Tools => &[
                "hammer",
                "screwdriver",
                "wrench",
                "drill bits",
                "pliers",
                "tape measure",
                "utility knife",
                "level",
                "sandpaper",
                "nails",
                "screws",
                "toolbox",
            ],
        }
    }

    /// Whether `item` is registered in this category's pool
    pub fn owns_item(self, item: &str) -> bool {
        self.items().contains(&item)
    }

    /// Size of the smallest pool across all categories
    pub fn smallest_pool() -> usize {
        Category::ALL
            .iter()
            .map(|c| c.items().len())
            .min()
            .unwrap_or(0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_category_round_trips_through_name() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
        assert!(matches!(
            "Garden".parse::<Category>(),
            Err(Error::UnknownCategory(name)) if name == "Garden"
        ));
    }

    #[test]
    fn test_pools_are_disjoint_and_unique() {
        let mut seen = HashSet::new();
        for cat in Category::ALL {
            assert_eq!(cat.items().len(), 12);
            for item in cat.items() {
                assert!(!item.contains('"'), "item {item:?} would break quoting");
                assert!(seen.insert(*item), "item {item:?} registered twice");
            }
        }
        assert_eq!(Category::smallest_pool(), 12);
    }
}
