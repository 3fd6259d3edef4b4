use std::collections::BTreeSet;

use crate::interner::SpeciesId;
use crate::link::LinkId;

/// Stable handle into `Graph::anchors`. Anchors are never removed from the
/// arena, so ids stay valid for the lifetime of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u32);

/// A vertex in the synteny graph.
///
/// `links` is a non-owning, insertion-ordered list of the links incident to
/// this anchor; a loop link (front == back) appears twice.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub name: String,
    pub num: u32,
    pub species: BTreeSet<SpeciesId>,
    pub links: Vec<LinkId>,
}

impl Anchor {
    pub fn new(name: String) -> Self {
        Anchor {
            name,
            num: 0,
            species: BTreeSet::new(),
            links: Vec::new(),
        }
    }

    pub fn add_link(&mut self, link: LinkId) {
        self.links.push(link);
    }

    /// Removes one occurrence of `link` from the incidence list.
    pub fn remove_link(&mut self, link: LinkId) {
        if let Some(pos) = self.links.iter().position(|&l| l == link) {
            self.links.remove(pos);
        }
    }
}
