// Reference highlight colors
//
// Each distinct reference gets a palette index that stays put while the
// reference stays in the formula. Indices freed by removed references are
// reused lowest-first.

use rustc_hash::{FxHashMap, FxHashSet};

/// Dedup key of a reference: whitespace removed, upper-cased.
pub fn normalize_key(reference: &str) -> String {
    reference.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_uppercase).collect()
}

#[derive(Debug, Clone, Default)]
pub struct ColorIndexMap {
    indices: FxHashMap<String, usize>,
}

impl ColorIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sync with the references currently in the formula, in order of appearance.
    pub fn update<'a>(&mut self, references: impl IntoIterator<Item = &'a str>) {
        let mut seen = FxHashSet::default();
        let keys: Vec<String> = references
            .into_iter()
            .map(normalize_key)
            .filter(|key| seen.insert(key.clone()))
            .collect();

        // Garbage collect: drop keys no longer present
        self.indices.retain(|key, _| seen.contains(key));

        for key in keys {
            if self.indices.contains_key(&key) {
                continue;
            }
            let taken: FxHashSet<usize> = self.indices.values().copied().collect();
            let free = (0..).find(|i| !taken.contains(i)).unwrap_or(0);
            self.indices.insert(key, free);
        }
    }

    pub fn index_of(&self, reference: &str) -> Option<usize> {
        self.indices.get(&normalize_key(reference)).copied()
    }
}

/// Palette color for an index, wrapping around.
pub fn palette_color(palette: &[u32], index: usize) -> u32 {
    if palette.is_empty() {
        return 0;
    }
    palette[index % palette.len()]
}
