//! Fixed food-guidance reference tables and per-request random sampling.
//!
//! Sampling is intentionally non-deterministic: the dashboard shows a
//! different pair of entries on each request.

use rand::seq::SliceRandom;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FoodEntry {
    pub name: &'static str,
    pub description: &'static str,
}

pub const SAFE_FOODS: &[FoodEntry] = &[
    FoodEntry {
        name: "Carrots, sweet potato, broccoli",
        description: "Good for digestion in moderate amounts.",
    },
    FoodEntry {
        name: "Apples, pears, bananas",
        description: "Always remove seeds and peel first.",
    },
    FoodEntry {
        name: "Plain cooked chicken",
        description: "Unseasoned and boneless only.",
    },
    FoodEntry {
        name: "Pumpkin",
        description: "Plain pumpkin helps with digestion.",
    },
    FoodEntry {
        name: "Blueberries",
        description: "A safe low-calorie treat in small amounts.",
    },
];

pub const UNSAFE_FOODS: &[FoodEntry] = &[
    FoodEntry {
        name: "Chocolate",
        description: "Theobromine is highly toxic to pets.",
    },
    FoodEntry {
        name: "Onions, garlic, chives",
        description: "Damage red blood cells and cause anemia.",
    },
    FoodEntry {
        name: "Grapes and raisins",
        description: "Can cause acute kidney failure.",
    },
    FoodEntry {
        name: "Xylitol (sugar-free gum)",
        description: "Triggers dangerous insulin release.",
    },
    FoodEntry {
        name: "Alcohol and caffeine",
        description: "Even small amounts are dangerous.",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct FoodGuide {
    pub good_foods: Vec<FoodEntry>,
    pub bad_foods: Vec<FoodEntry>,
}

/// Sample `count` entries from each table. A table smaller than `count`
/// comes back whole rather than failing.
pub fn sample_guide(count: usize) -> FoodGuide {
    let mut rng = rand::thread_rng();
    FoodGuide {
        good_foods: SAFE_FOODS
            .choose_multiple(&mut rng, count)
            .cloned()
            .collect(),
        bad_foods: UNSAFE_FOODS
            .choose_multiple(&mut rng, count)
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_returns_requested_count() {
        let guide = sample_guide(2);
        assert_eq!(guide.good_foods.len(), 2);
        assert_eq!(guide.bad_foods.len(), 2);
    }

    #[test]
    fn sampled_entries_come_from_the_tables() {
        let guide = sample_guide(2);
        for entry in &guide.good_foods {
            assert!(SAFE_FOODS.contains(entry));
        }
        for entry in &guide.bad_foods {
            assert!(UNSAFE_FOODS.contains(entry));
        }
    }

    #[test]
    fn oversized_request_returns_the_whole_table() {
        let guide = sample_guide(100);
        assert_eq!(guide.good_foods.len(), SAFE_FOODS.len());
        assert_eq!(guide.bad_foods.len(), UNSAFE_FOODS.len());
    }
}
