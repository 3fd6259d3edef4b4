use crate::anchor::AnchorId;
use crate::tag::Tag;

/// Stable handle into `Graph::links`. A `None` arena slot means the link
/// has been deleted; the id itself is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

/// A hyper-edge: an ordered anchor path of length >= 2 plus a non-empty
/// bundle of tags that all traverse that path.
#[derive(Debug, Clone)]
pub struct Link {
    pub path: Vec<AnchorId>,
    pub tags: Vec<Tag>,
}

impl Link {
    pub fn new(front: AnchorId, back: AnchorId) -> Self {
        Link {
            path: vec![front, back],
            tags: Vec::new(),
        }
    }

    pub fn front(&self) -> AnchorId {
        self.path[0]
    }

    pub fn back(&self) -> AnchorId {
        *self.path.last().unwrap()
    }

    pub fn is_loop(&self) -> bool {
        self.front() == self.back()
    }

    /// Reverses the anchor path and negates every tag's strand. The tag
    /// set itself is invariant under reversal.
    pub fn reverse(&mut self) {
        self.path.reverse();
        for t in self.tags.iter_mut() {
            t.strand = -t.strand;
        }
    }

    pub fn shortest_region_length(&self) -> u64 {
        self.tags.iter().map(Tag::length).min().unwrap_or(0)
    }

    pub fn longest_region_length(&self) -> u64 {
        self.tags.iter().map(Tag::length).max().unwrap_or(0)
    }

    pub fn is_valid(&self, min_anchors: u32, min_regions: u32, min_length: u64) -> bool {
        self.path.len() as u32 >= min_anchors
            && self.tags.len() as u32 >= min_regions
            && self.shortest_region_length() >= min_length
    }

    /// Two links are alternative paths of one another iff their endpoint
    /// pairs are equal as unordered sets.
    pub fn is_an_alternative_path_of(&self, other: &Link) -> bool {
        (self.front() == other.front() && self.back() == other.back())
            || (self.front() == other.back() && self.back() == other.front())
    }

    /// Greedy LCS-style mismatch count between this link's path and
    /// `other`'s, after orienting `other` to start at the same endpoint.
    /// Not true Levenshtein distance; see Design Notes for why this
    /// specific approximation is preserved.
    pub fn get_num_of_mismatches(&self, other: &Link) -> u32 {
        let oriented;
        let other_path: &[AnchorId] = if self.front() == other.front() {
            &other.path
        } else {
            oriented = {
                let mut p = other.path.clone();
                p.reverse();
                p
            };
            &oriented
        };
        path_distance(&self.path, other_path)
    }

    /// Resolves `get_matching_tags` for the given orientation flags,
    /// trying both signs of any flag that is `0`. Returns the signs that
    /// succeeded along with, for each tag of `self`, the matched tag
    /// index in `other`.
    pub fn resolve_matching(
        &self,
        other: &Link,
        s1: i8,
        s2: i8,
        permissive: bool,
    ) -> Option<(i8, i8, Vec<usize>)> {
        let self_match = std::ptr::eq(self, other);
        let s1_candidates: &[i8] = if s1 == 0 { &[1, -1] } else { std::slice::from_ref(&s1) };
        let s2_candidates: &[i8] = if s2 == 0 { &[1, -1] } else { std::slice::from_ref(&s2) };
        for &cs1 in s1_candidates {
            for &cs2 in s2_candidates {
                if let Some(mapping) = match_fixed(self, other, cs1, cs2, permissive, self_match) {
                    return Some((cs1, cs2, mapping));
                }
            }
        }
        None
    }
}

/// Fixed-sign tag matcher (spec.md §4.1). Returns, for each tag of
/// `link1`, the index of its unique matching tag in `link2`, or `None` if
/// any tag of `link1` is left unmatched, or (in strict mode) any tag of
/// `link2` is left unclaimed.
fn match_fixed(
    link1: &Link,
    link2: &Link,
    s1: i8,
    s2: i8,
    permissive: bool,
    self_match: bool,
) -> Option<Vec<usize>> {
    let mut claimed = vec![false; link2.tags.len()];
    let mut mapping = vec![None; link1.tags.len()];

    for (i, t1) in link1.tags.iter().enumerate() {
        let mut found = None;
        for (j, t2) in link2.tags.iter().enumerate() {
            if self_match && i == j {
                continue;
            }
            if !t1.same_locus(t2) || !t1.overlaps(t2) {
                continue;
            }
            let u1 = s1 * t1.strand;
            let u2 = s2 * t2.strand;
            if u1 != 0 && u2 != 0 && u1.signum() != u2.signum() {
                // Two overlapping tags with contradictory orientation
                // kill the whole match attempt, not just this pair.
                return None;
            }
            if claimed[j] {
                continue;
            }
            let ok = (u1 == 1 && u2 == 1 && t1.start < t2.start && t1.end < t2.end)
                || (u1 == -1 && u2 == -1 && t2.start < t1.start && t2.end < t1.end)
                || u1 == 0
                || u2 == 0;
            if ok {
                found = Some(j);
                break;
            }
        }
        match found {
            Some(j) => {
                claimed[j] = true;
                mapping[i] = Some(j);
            }
            None => return None,
        }
    }

    if !permissive && claimed.iter().any(|&c| !c) {
        return None;
    }

    Some(mapping.into_iter().map(|m| m.unwrap()).collect())
}

/// Greedy longest-common-subsequence-style distance between two anchor
/// paths: advance both cursors on a match, otherwise jump to the nearer
/// forthcoming match on either side, charging one mismatch per skipped
/// anchor (two if neither side has a forthcoming match).
pub(crate) fn path_distance(path1: &[AnchorId], path2: &[AnchorId]) -> u32 {
    let mut i = 0usize;
    let mut j = 0usize;
    let mut mismatches = 0u32;
    while i < path1.len() && j < path2.len() {
        if path1[i] == path2[j] {
            i += 1;
            j += 1;
            continue;
        }
        let f1 = path1[i + 1..].iter().position(|&a| a == path2[j]);
        let f2 = path2[j + 1..].iter().position(|&a| a == path1[i]);
        match (f1, f2) {
            (Some(d1), Some(d2)) if d1 <= d2 => {
                i += d1 + 1;
                mismatches += d1 as u32;
            }
            (Some(_), Some(d2)) => {
                j += d2 + 1;
                mismatches += d2 as u32;
            }
            (Some(d1), None) => {
                i += d1 + 1;
                mismatches += d1 as u32;
            }
            (None, Some(d2)) => {
                j += d2 + 1;
                mismatches += d2 as u32;
            }
            (None, None) => {
                i += 1;
                j += 1;
                mismatches += 2;
            }
        }
    }
    mismatches + (path1.len() - i) as u32 + (path2.len() - j) as u32
}

/// Weaves `path2`'s anchors not present along `path1`'s course into
/// `path1`, using the same greedy alignment as `path_distance`. `path1`
/// and `path2` must share the same front and back anchor.
pub(crate) fn weave_paths(path1: &[AnchorId], path2: &[AnchorId]) -> Vec<AnchorId> {
    let mut merged = Vec::with_capacity(path1.len().max(path2.len()));
    let mut i = 0usize;
    let mut j = 0usize;
    while i < path1.len() && j < path2.len() {
        if path1[i] == path2[j] {
            merged.push(path1[i]);
            i += 1;
            j += 1;
            continue;
        }
        let f1 = path1[i + 1..].iter().position(|&a| a == path2[j]);
        let f2 = path2[j + 1..].iter().position(|&a| a == path1[i]);
        match (f1, f2) {
            (Some(d1), Some(d2)) if d1 <= d2 => {
                merged.extend_from_slice(&path1[i..i + d1 + 1]);
                i += d1 + 1;
            }
            (Some(_), Some(d2)) => {
                merged.extend_from_slice(&path2[j..j + d2 + 1]);
                j += d2 + 1;
            }
            (Some(d1), None) => {
                merged.extend_from_slice(&path1[i..i + d1 + 1]);
                i += d1 + 1;
            }
            (None, Some(d2)) => {
                merged.extend_from_slice(&path2[j..j + d2 + 1]);
                j += d2 + 1;
            }
            (None, None) => {
                merged.push(path1[i]);
                i += 1;
            }
        }
    }
    merged.extend_from_slice(&path1[i..]);
    merged.extend_from_slice(&path2[j..]);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::{ChrId, SpeciesId};

    fn a(n: u32) -> AnchorId {
        AnchorId(n)
    }

    fn tag(start: u64, end: u64, strand: i8) -> Tag {
        Tag::new(SpeciesId(0), ChrId(0), start, end, strand)
    }

    /// Invariant 4: reverse is an involution.
    #[test]
    fn reverse_is_involution() {
        let mut link = Link::new(a(0), a(2));
        link.path = vec![a(0), a(1), a(2)];
        link.tags.push(tag(10, 20, 1));
        link.tags.push(tag(30, 40, -1));
        let original_path = link.path.clone();
        let original_strands: Vec<i8> = link.tags.iter().map(|t| t.strand).collect();

        link.reverse();
        link.reverse();

        assert_eq!(link.path, original_path);
        let strands: Vec<i8> = link.tags.iter().map(|t| t.strand).collect();
        assert_eq!(strands, original_strands);
    }

    /// Invariant 2/3: a tag's interval must be non-empty and its strand
    /// must be one of {-1, 0, 1}; `Tag::new` enforces both via debug_assert.
    #[test]
    #[should_panic]
    fn tag_rejects_empty_interval() {
        tag(20, 10, 1);
    }

    #[test]
    #[should_panic]
    fn tag_rejects_invalid_strand() {
        tag(10, 20, 2);
    }

    /// Invariant 8: is_an_alternative_path is symmetric and reflexive on
    /// endpoint pairs.
    #[test]
    fn alternative_path_is_symmetric_and_reflexive() {
        let direct = Link::new(a(0), a(2));
        let mut via_detour = Link::new(a(0), a(2));
        via_detour.path = vec![a(0), a(1), a(2)];

        assert!(direct.is_an_alternative_path_of(&via_detour));
        assert!(via_detour.is_an_alternative_path_of(&direct));
        assert!(direct.is_an_alternative_path_of(&direct));

        let unrelated = Link::new(a(3), a(4));
        assert!(!direct.is_an_alternative_path_of(&unrelated));
    }

    /// path_distance is the greedy LCS-style metric the spec requires, not
    /// true Levenshtein: a single internal insertion costs 0, not 1.
    #[test]
    fn path_distance_is_greedy_lcs_not_levenshtein() {
        let p1 = [a(0), a(1), a(2)];
        let p2 = [a(0), a(9), a(1), a(2)];
        assert_eq!(path_distance(&p1, &p2), 0);
    }

    #[test]
    fn weave_paths_terminates_and_includes_both_sides() {
        let p1 = [a(0), a(1), a(2)];
        let p2 = [a(0), a(9), a(1), a(2)];
        let merged = weave_paths(&p1, &p2);
        assert!(merged.contains(&a(9)));
        assert_eq!(merged.first(), Some(&a(0)));
        assert_eq!(merged.last(), Some(&a(2)));
    }
}
