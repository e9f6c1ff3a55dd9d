/// A closed set of accepted values for an enum-like field. Values outside
/// the set are dropped, never treated as an error.
#[derive(Debug, Clone, Copy)]
pub struct Whitelist {
    pub name: &'static str,
    pub allowed: &'static [&'static str],
}

impl Whitelist {
    pub const fn new(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self { name, allowed }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.allowed.contains(&value)
    }

    /// Set-valued projection: unknown values and repeats are dropped, first
    /// occurrence order is kept.
    pub fn project<I, S>(&self, values: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<String> = Vec::new();
        for value in self.project_by(values, |v| v.as_ref()) {
            let value = value.as_ref();
            if !kept.iter().any(|k| k == value) {
                kept.push(value.to_string());
            }
        }
        kept
    }

    /// Keeps the items whose key is in the set, preserving order.
    pub fn project_by<T, I, F>(&self, items: I, key: F) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> &str,
    {
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        for item in items {
            if self.contains(key(&item)) {
                kept.push(item);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(field = self.name, dropped, "Dropped values outside whitelist");
        }
        kept
    }
}

pub const ITEM_TAGS: Whitelist = Whitelist::new(
    "tags",
    &[
        "spicy",
        "vegetarian",
        "vegan",
        "gluten_free",
        "contains_nuts",
        "contains_seafood",
        "contains_pork",
        "contains_alcohol",
        "popular",
        "signature",
    ],
);

pub const ALLERGEN_TYPES: Whitelist = Whitelist::new(
    "allergens.type",
    &[
        "peanut",
        "shellfish",
        "fish",
        "gluten",
        "dairy",
        "egg",
        "soy",
        "tree_nut",
        "sesame",
    ],
);

pub const DIETARY_FLAGS: Whitelist = Whitelist::new(
    "dietaryFlags",
    &["halal", "vegetarian", "vegan", "raw", "contains_alcohol"],
);
