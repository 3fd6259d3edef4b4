use std::collections::HashMap;

/// Interned handle for a species name. Two tags on the same species share
/// the same id, giving O(1) equality instead of string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeciesId(pub u32);

/// Interned handle for a chromosome name, scoped globally (not per-species);
/// callers compare `(SpeciesId, ChrId)` pairs together, mirroring the
/// original's `(species*, chr*)` pair comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChrId(pub u32);

/// A simple string interner used for species and chromosome names.
#[derive(Debug, Default)]
pub struct Interner {
    names: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for `name`, interning it if this is the
    /// first time it is seen.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    pub fn resolve(&self, id: u32) -> &str {
        &self.names[id as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
