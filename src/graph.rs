use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

use log::{debug, info, warn};

use crate::anchor::{Anchor, AnchorId};
use crate::error::{EnredoError, Result};
use crate::interner::Interner;
use crate::link::{weave_paths, Link, LinkId};
use crate::tag::Tag;

/// Counters for rows dropped by the loader's thresholds (spec.md §7:
/// "thresholded drops are silent except for summary counters").
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    pub rows_read: u64,
    pub rows_skipped_score: u64,
    pub rows_skipped_gap: u64,
    pub tags_created: u64,
}

struct PrevHit {
    anchor: AnchorId,
    species: crate::interner::SpeciesId,
    chr: crate::interner::ChrId,
    start: u64,
    end: u64,
}

/// The synteny multigraph: an arena of anchors and links plus the
/// interned species/chromosome name tables (spec.md §3).
pub struct Graph {
    pub anchors: Vec<Anchor>,
    anchor_index: HashMap<String, AnchorId>,
    pub links: Vec<Option<Link>>,
    pub species: Interner,
    pub chrs: Interner,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            anchors: Vec::new(),
            anchor_index: HashMap::new(),
            links: Vec::new(),
            species: Interner::new(),
            chrs: Interner::new(),
        }
    }

    pub fn anchor(&self, id: AnchorId) -> &Anchor {
        &self.anchors[id.0 as usize]
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links[id.0 as usize].as_ref()
    }

    pub fn link_count(&self) -> usize {
        self.links.iter().filter(|l| l.is_some()).count()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    fn get_or_create_anchor(&mut self, name: &str) -> AnchorId {
        if let Some(&id) = self.anchor_index.get(name) {
            return id;
        }
        let id = AnchorId(self.anchors.len() as u32);
        self.anchors.push(Anchor::new(name.to_string()));
        self.anchor_index.insert(name.to_string(), id);
        id
    }

    fn register(&mut self, link_id: LinkId, front: AnchorId, back: AnchorId) {
        self.anchors[front.0 as usize].add_link(link_id);
        if back == front {
            self.anchors[front.0 as usize].add_link(link_id);
        } else {
            self.anchors[back.0 as usize].add_link(link_id);
        }
    }

    fn deregister(&mut self, link_id: LinkId, front: AnchorId, back: AnchorId) {
        self.anchors[front.0 as usize].remove_link(link_id);
        if back == front {
            self.anchors[front.0 as usize].remove_link(link_id);
        } else {
            self.anchors[back.0 as usize].remove_link(link_id);
        }
    }

    /// Finds the existing 2-anchor link between `a` and `b`, creating and
    /// registering one if none exists (mirrors `Anchor::get_direct_Link`).
    fn get_direct_link(&mut self, a: AnchorId, b: AnchorId) -> LinkId {
        for &l in &self.anchors[a.0 as usize].links {
            if let Some(link) = &self.links[l.0 as usize] {
                if link.path.len() == 2
                    && ((link.front() == a && link.back() == b)
                        || (link.front() == b && link.back() == a))
                {
                    return l;
                }
            }
        }
        let id = LinkId(self.links.len() as u32);
        self.links.push(Some(Link::new(a, b)));
        self.register(id, a, b);
        id
    }

    // ---------------------------------------------------------------
    // 4.11 Loader
    // ---------------------------------------------------------------

    pub fn populate(
        &mut self,
        reader: impl BufRead,
        min_score: f32,
        max_gap_length: u64,
    ) -> Result<LoadStats> {
        let mut stats = LoadStats::default();
        let mut prev: Option<PrevHit> = None;

        for (line_no, line) in reader.lines().enumerate() {
            let line_no = line_no as u64 + 1;
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed == "--" {
                prev = None;
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            if tokens.len() != 7 {
                return Err(EnredoError::MalformedRow {
                    line: line_no,
                    text: line.clone(),
                });
            }
            let [anchor_name, species_name, chr_name, start_s, end_s, strand_s, score_s] =
                [tokens[0], tokens[1], tokens[2], tokens[3], tokens[4], tokens[5], tokens[6]];

            let start: u64 = start_s.parse().map_err(|_| EnredoError::MalformedRow {
                line: line_no,
                text: line.clone(),
            })?;
            let end: u64 = end_s.parse().map_err(|_| EnredoError::MalformedRow {
                line: line_no,
                text: line.clone(),
            })?;
            if start > end {
                return Err(EnredoError::StartAfterEnd { line: line_no });
            }
            parse_strand(strand_s).ok_or_else(|| EnredoError::BadStrand {
                line: line_no,
                value: strand_s.to_string(),
            })?;
            let score: f32 = score_s.parse().map_err(|_| EnredoError::MalformedRow {
                line: line_no,
                text: line.clone(),
            })?;

            stats.rows_read += 1;
            if score < min_score {
                stats.rows_skipped_score += 1;
                continue;
            }

            let species_id = crate::interner::SpeciesId(self.species.intern(species_name));
            let chr_id = crate::interner::ChrId(self.chrs.intern(chr_name));
            let anchor_id = self.get_or_create_anchor(anchor_name);
            self.anchors[anchor_id.0 as usize].num += 1;
            self.anchors[anchor_id.0 as usize].species.insert(species_id);

            if let Some(p) = &prev {
                if p.species == species_id && p.chr == chr_id && p.end < start {
                    let gap = start.saturating_sub(p.end + 1);
                    if max_gap_length != 0 && gap > max_gap_length {
                        stats.rows_skipped_gap += 1;
                    } else {
                        let link_id = self.get_direct_link(p.anchor, anchor_id);
                        let strand = if p.anchor == anchor_id {
                            0
                        } else {
                            let front = self.links[link_id.0 as usize].as_ref().unwrap().front();
                            if front == p.anchor {
                                1
                            } else if front == anchor_id {
                                -1
                            } else {
                                return Err(EnredoError::UnexpectedOrientation { line: line_no });
                            }
                        };
                        let tag = Tag::new(species_id, chr_id, p.start, end, strand);
                        self.links[link_id.0 as usize]
                            .as_mut()
                            .unwrap()
                            .tags
                            .push(tag);
                        stats.tags_created += 1;
                    }
                }
            }

            prev = Some(PrevHit {
                anchor: anchor_id,
                species: species_id,
                chr: chr_id,
                start,
                end,
            });
        }

        info!(
            "loaded {} rows ({} anchors, {} tags, {} dropped for score, {} dropped for gap)",
            stats.rows_read,
            self.anchors.len(),
            stats.tags_created,
            stats.rows_skipped_score,
            stats.rows_skipped_gap
        );
        Ok(stats)
    }

    // ---------------------------------------------------------------
    // 4.2 Concatenation and minimize
    // ---------------------------------------------------------------

    /// Attempts `try_to_concatenate_with`. Returns `false` (not an error)
    /// when no valid tag bijection exists for the requested orientation.
    pub fn concatenate(&mut self, this_id: LinkId, other_id: LinkId, s1: i8, s2: i8) -> Result<bool> {
        if this_id == other_id {
            return Ok(false);
        }
        let mut link_this = match self.links[this_id.0 as usize].take() {
            Some(l) => l,
            None => return Ok(false),
        };
        let resolved = match &self.links[other_id.0 as usize] {
            Some(other_ref) => link_this.resolve_matching(other_ref, s1, s2, false),
            None => {
                self.links[this_id.0 as usize] = Some(link_this);
                return Ok(false);
            }
        };
        let (rs1, rs2, mapping) = match resolved {
            Some(v) => v,
            None => {
                self.links[this_id.0 as usize] = Some(link_this);
                return Ok(false);
            }
        };

        let mut link_other = self.links[other_id.0 as usize].take().unwrap();
        if rs1 == -1 {
            link_this.reverse();
        }
        if rs2 == -1 {
            link_other.reverse();
        }

        let old_front = link_this.front();
        let old_mid = link_this.back();
        let other_front = link_other.front();
        let other_back = link_other.back();
        if old_mid != other_front {
            self.links[this_id.0 as usize] = Some(link_this);
            self.links[other_id.0 as usize] = Some(link_other);
            return Err(EnredoError::AnchorMatchInvariant { anchor: old_mid });
        }

        let mut combined_path = link_this.path.clone();
        combined_path.extend_from_slice(&link_other.path[1..]);
        let is_palindrome = combined_path.iter().eq(combined_path.iter().rev());

        for (i, &j) in mapping.iter().enumerate() {
            let t2 = link_other.tags[j];
            let t1 = &mut link_this.tags[i];
            t1.start = t1.start.min(t2.start);
            t1.end = t1.end.max(t2.end);
            if is_palindrome {
                t1.strand = 0;
            } else if t1.strand == 0 {
                t1.strand = t2.strand;
            }
        }
        link_this.path = combined_path;
        let new_back = link_this.back();

        self.deregister(other_id, other_front, other_back);
        self.deregister(this_id, old_front, old_mid);
        self.register(this_id, old_front, new_back);

        self.links[this_id.0 as usize] = Some(link_this);
        self.links[other_id.0 as usize] = None;
        debug!("concatenated {:?} into {:?}", other_id, this_id);
        Ok(true)
    }

    fn minimize_anchor(&mut self, anchor_id: AnchorId) -> Result<()> {
        loop {
            let snapshot = self.anchors[anchor_id.0 as usize].links.clone();
            let mut merged = false;
            'search: for i in 0..snapshot.len() {
                for j in 0..i {
                    let l1 = snapshot[i];
                    let l2 = snapshot[j];
                    if l1 == l2 {
                        continue;
                    }
                    let (link1, link2) = match (&self.links[l1.0 as usize], &self.links[l2.0 as usize]) {
                        (Some(a), Some(b)) => (a, b),
                        _ => continue,
                    };
                    if link1.tags.len() != link2.tags.len() {
                        continue;
                    }
                    let s1 = match flag_as_trailing(link1, anchor_id) {
                        Some(s) => s,
                        None => continue,
                    };
                    let s2 = match flag_as_leading(link2, anchor_id) {
                        Some(s) => s,
                        None => continue,
                    };
                    if self.concatenate(l1, l2, s1, s2)? {
                        merged = true;
                        break 'search;
                    }
                }
            }
            if !merged {
                break;
            }
        }
        Ok(())
    }

    /// Runs anchor-local minimize over every anchor, in stable name order.
    pub fn minimize(&mut self) -> Result<()> {
        let mut ids: Vec<AnchorId> = (0..self.anchors.len() as u32).map(AnchorId).collect();
        ids.sort_by(|a, b| self.anchors[a.0 as usize].name.cmp(&self.anchors[b.0 as usize].name));
        for id in ids {
            self.minimize_anchor(id)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 4.3 Merge alternative paths
    // ---------------------------------------------------------------

    fn merge_links(&mut self, this_id: LinkId, other_id: LinkId) {
        let mut other = self.links[other_id.0 as usize].take().unwrap();
        let this_front = self.links[this_id.0 as usize].as_ref().unwrap().front();
        if other.front() != this_front {
            other.reverse();
        }
        let other_front = other.front();
        let other_back = other.back();
        {
            let this_link = self.links[this_id.0 as usize].as_mut().unwrap();
            let new_path = weave_paths(&this_link.path, &other.path);
            this_link.path = new_path;
            this_link.tags.append(&mut other.tags);
        }
        self.deregister(other_id, other_front, other_back);
        self.links[other_id.0 as usize] = None;
        debug!("merged alternative path {:?} into {:?}", other_id, this_id);
    }

    pub fn merge_alternative_paths(&mut self, max_mismatches: u32) {
        'restart: loop {
            let anchor_ids: Vec<AnchorId> = (0..self.anchors.len() as u32).map(AnchorId).collect();
            for anchor_id in anchor_ids {
                let snapshot = self.anchors[anchor_id.0 as usize].links.clone();
                for i in 0..snapshot.len() {
                    for j in (i + 1)..snapshot.len() {
                        let l1 = snapshot[i];
                        let l2 = snapshot[j];
                        if l1 == l2 {
                            continue;
                        }
                        let is_alt = match (&self.links[l1.0 as usize], &self.links[l2.0 as usize]) {
                            (Some(a), Some(b)) => a.is_an_alternative_path_of(b),
                            _ => false,
                        };
                        if !is_alt {
                            continue;
                        }
                        let mismatches = {
                            let a = self.links[l1.0 as usize].as_ref().unwrap();
                            let b = self.links[l2.0 as usize].as_ref().unwrap();
                            a.get_num_of_mismatches(b)
                        };
                        if max_mismatches != 0 && mismatches > max_mismatches {
                            continue;
                        }
                        self.merge_links(l1, l2);
                        continue 'restart;
                    }
                }
            }
            break;
        }
    }

    // ---------------------------------------------------------------
    // split primitive, shared by simplify / split-unselected / palindrome
    // resolution / assimilate-small-insertions
    // ---------------------------------------------------------------

    /// Splits tags at `flagged` indices off into a new link sharing the
    /// same anchor path. Errors (hard invariant violation) if either side
    /// would be left empty.
    fn split_link(&mut self, link_id: LinkId, flagged: &[usize]) -> Result<LinkId> {
        let link = self.links[link_id.0 as usize].as_mut().unwrap();
        if flagged.is_empty() || flagged.len() >= link.tags.len() {
            return Err(EnredoError::EmptyLinkInvariant { link: link_id });
        }
        let mut flagged_set = vec![false; link.tags.len()];
        for &i in flagged {
            flagged_set[i] = true;
        }
        let mut new_tags = Vec::with_capacity(flagged.len());
        let mut keep_tags = Vec::with_capacity(link.tags.len() - flagged.len());
        for (i, t) in link.tags.iter().enumerate() {
            if flagged_set[i] {
                new_tags.push(*t);
            } else {
                keep_tags.push(*t);
            }
        }
        link.tags = keep_tags;
        let path = link.path.clone();
        let front = link.front();
        let back = link.back();

        let new_id = LinkId(self.links.len() as u32);
        self.links.push(Some(Link { path, tags: new_tags }));
        self.register(new_id, front, back);
        Ok(new_id)
    }

    fn delete_link(&mut self, link_id: LinkId) {
        if let Some(link) = &self.links[link_id.0 as usize] {
            let front = link.front();
            let back = link.back();
            self.deregister(link_id, front, back);
        }
        self.links[link_id.0 as usize] = None;
    }

    fn candidate_link_ids(&self) -> Vec<LinkId> {
        self.links
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|_| LinkId(i as u32)))
            .collect()
    }

    fn neighbours(&self, anchor_id: AnchorId, exclude: LinkId) -> Vec<LinkId> {
        self.anchors[anchor_id.0 as usize]
            .links
            .iter()
            .copied()
            .filter(|&l| l != exclude && self.links[l.0 as usize].is_some())
            .collect()
    }

    // ---------------------------------------------------------------
    // 4.4 Simplify (non-aggressive)
    // ---------------------------------------------------------------

    pub fn simplify(&mut self, min_anchors: u32, min_regions: u32, min_length: u64) -> Result<()> {
        'restart: loop {
            for link_id in self.candidate_link_ids() {
                let link = match self.link(link_id) {
                    Some(l) => l,
                    None => continue,
                };
                if link.tags.len() as u32 <= min_regions
                    || link.is_valid(min_anchors, min_regions, min_length)
                {
                    continue;
                }
                let front = link.front();
                let back = link.back();
                let n = link.tags.len();

                let front_candidates: Vec<LinkId> = self
                    .neighbours(front, link_id)
                    .into_iter()
                    .filter(|&f| self.fits_simplify_neighbour(f, n, min_regions))
                    .collect();
                let back_candidates: Vec<LinkId> = self
                    .neighbours(back, link_id)
                    .into_iter()
                    .filter(|&b| self.fits_simplify_neighbour(b, n, min_regions))
                    .collect();

                for &f in &front_candidates {
                    for &b in &back_candidates {
                        if f == b {
                            continue;
                        }
                        let link = self.link(link_id).unwrap();
                        let front_link = self.link(f).unwrap();
                        let back_link = self.link(b).unwrap();

                        let s_leading = match flag_as_trailing(link, front) {
                            Some(s) => s,
                            None => continue,
                        };
                        let s_f_trailing = match flag_as_leading(front_link, front) {
                            Some(s) => s,
                            None => continue,
                        };
                        let front_match = match link.resolve_matching(front_link, s_leading, s_f_trailing, true) {
                            Some((_, _, m)) => m,
                            None => continue,
                        };

                        let s_trailing = match flag_as_trailing(link, back) {
                            Some(s) => s,
                            None => continue,
                        };
                        let s_b_leading = match flag_as_leading(back_link, back) {
                            Some(s) => s,
                            None => continue,
                        };
                        let back_match = match link.resolve_matching(back_link, s_trailing, s_b_leading, true) {
                            Some((_, _, m)) => m,
                            None => continue,
                        };

                        let mut flanked = Vec::new();
                        let mut blocking = 0;
                        for i in 0..n {
                            let on_front = front_match.get(i).is_some();
                            let on_back = back_match.get(i).is_some();
                            match (on_front, on_back) {
                                (true, true) => flanked.push(i),
                                (true, false) | (false, true) => blocking += 1,
                                (false, false) => {}
                            }
                        }
                        if blocking == 0 && !flanked.is_empty() && flanked.len() < n {
                            self.split_link(link_id, &flanked)?;
                            info!("simplify: split link {:?}, {} flanked tags", link_id, flanked.len());
                            continue 'restart;
                        }
                    }
                }
            }
            return Ok(());
        }
    }

    fn fits_simplify_neighbour(&self, id: LinkId, this_len: usize, min_regions: u32) -> bool {
        match self.link(id) {
            Some(l) => (l.tags.len() as u32) >= min_regions && l.tags.len() < this_len,
            None => false,
        }
    }

    // ---------------------------------------------------------------
    // 4.5 Simplify-aggressive
    // ---------------------------------------------------------------

    pub fn simplify_aggressive(
        &mut self,
        min_anchors: u32,
        min_regions: u32,
        min_length: u64,
    ) -> Result<()> {
        'restart: loop {
            for link_id in self.candidate_link_ids() {
                let link = match self.link(link_id) {
                    Some(l) => l,
                    None => continue,
                };
                if (link.tags.len() as u32) < min_regions {
                    continue;
                }
                let front = link.front();
                let back = link.back();
                let n = link.tags.len();

                let is_invalid_and_big = |id: LinkId, this_len: usize| -> bool {
                    match self.link(id) {
                        Some(l) => {
                            l.tags.len() >= this_len
                                && ((l.path.len() as u32) < min_anchors
                                    || l.shortest_region_length() < min_length)
                        }
                        None => false,
                    }
                };

                let front_candidates: Vec<LinkId> = self
                    .neighbours(front, link_id)
                    .into_iter()
                    .filter(|&f| is_invalid_and_big(f, n))
                    .collect();
                let back_candidates: Vec<LinkId> = self
                    .neighbours(back, link_id)
                    .into_iter()
                    .filter(|&b| is_invalid_and_big(b, n))
                    .collect();

                for &f in &front_candidates {
                    for &b in &back_candidates {
                        if f == b {
                            continue;
                        }
                        let link = self.link(link_id).unwrap();
                        let front_link = self.link(f).unwrap();
                        let back_link = self.link(b).unwrap();

                        let s_leading = match flag_as_trailing(link, front) {
                            Some(s) => s,
                            None => continue,
                        };
                        let s_f_trailing = match flag_as_leading(front_link, front) {
                            Some(s) => s,
                            None => continue,
                        };
                        let front_match = match link.resolve_matching(front_link, s_leading, s_f_trailing, true) {
                            Some((_, _, m)) => m,
                            None => continue,
                        };

                        let s_trailing = match flag_as_trailing(link, back) {
                            Some(s) => s,
                            None => continue,
                        };
                        let s_b_leading = match flag_as_leading(back_link, back) {
                            Some(s) => s,
                            None => continue,
                        };
                        let back_match = match link.resolve_matching(back_link, s_trailing, s_b_leading, true) {
                            Some((_, _, m)) => m,
                            None => continue,
                        };

                        if front_match.len() != n || back_match.len() != n {
                            continue;
                        }

                        let front_unmatched: Vec<usize> = (0..front_link.tags.len())
                            .filter(|j| !front_match.contains(j))
                            .collect();
                        let back_unmatched: Vec<usize> = (0..back_link.tags.len())
                            .filter(|j| !back_match.contains(j))
                            .collect();

                        let mut did_split = false;
                        if !front_unmatched.is_empty() {
                            self.split_link(f, &front_unmatched)?;
                            did_split = true;
                        }
                        if !back_unmatched.is_empty() {
                            self.split_link(b, &back_unmatched)?;
                            did_split = true;
                        }
                        if did_split {
                            info!("simplify-aggressive: split neighbours of {:?}", link_id);
                            continue 'restart;
                        }
                    }
                }
            }
            return Ok(());
        }
    }

    // ---------------------------------------------------------------
    // 4.6 Split-unselected-links
    // ---------------------------------------------------------------

    pub fn split_unselected_links(
        &mut self,
        min_anchors: u32,
        min_regions: u32,
        min_length: u64,
    ) -> Result<()> {
        for link_id in self.candidate_link_ids() {
            loop {
                let link = match self.link(link_id) {
                    Some(l) => l,
                    None => break,
                };
                if link.tags.len() as u32 <= min_regions
                    || link.is_valid(min_anchors, min_regions, min_length)
                {
                    break;
                }
                if link.tags.len() <= 1 {
                    break;
                }
                self.split_link(link_id, &[0])?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 4.7 Resolve-small-palindromes
    // ---------------------------------------------------------------

    pub fn resolve_small_palindromes(
        &mut self,
        min_anchors: u32,
        min_regions: u32,
        min_length: u64,
    ) -> Result<()> {
        for link_id in self.candidate_link_ids() {
            let (is_candidate, n) = match self.link(link_id) {
                Some(l) => (
                    !l.is_valid(min_anchors, min_regions, min_length) && l.tags.len() % 2 == 0 && l.tags.len() >= 2,
                    l.tags.len(),
                ),
                None => continue,
            };
            if !is_candidate {
                continue;
            }

            let self_match = {
                let link = self.link(link_id).unwrap();
                link.resolve_matching(link, 1, -1, false)
                    .or_else(|| link.resolve_matching(link, -1, 1, false))
            };
            let mapping = match self_match {
                Some((_, _, m)) => m,
                None => continue,
            };

            // Split into the half whose tags start before their pair.
            let link = self.link(link_id).unwrap();
            let mut first_half = Vec::new();
            let mut seen = vec![false; n];
            for i in 0..n {
                if seen[i] {
                    continue;
                }
                let j = mapping[i];
                seen[i] = true;
                seen[j] = true;
                let (earlier, _later) = if link.tags[i].start <= link.tags[j].start {
                    (i, j)
                } else {
                    (j, i)
                };
                first_half.push(earlier);
            }

            let new_id = self.split_link(link_id, &first_half)?;
            if self.concatenate(link_id, new_id, 0, 0)? {
                if let Some(link) = self.links[link_id.0 as usize].as_mut() {
                    for t in link.tags.iter_mut() {
                        t.strand = 0;
                    }
                }
                info!("resolved small palindrome at link {:?}", link_id);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 4.8 Assimilate-small-insertions
    // ---------------------------------------------------------------

    pub fn assimilate_small_insertions(
        &mut self,
        min_anchors: u32,
        min_regions: u32,
        min_length: u64,
        max_insertion_length: u64,
    ) -> Result<()> {
        for link_id in self.candidate_link_ids() {
            let link = match self.link(link_id) {
                Some(l) => l,
                None => continue,
            };
            if link.is_valid(min_anchors, min_regions, min_length) {
                continue;
            }
            if link.longest_region_length() > max_insertion_length {
                continue;
            }
            let front = link.front();
            let back = link.back();
            let n = link.tags.len();

            let front_candidates: Vec<LinkId> = self
                .neighbours(front, link_id)
                .into_iter()
                .filter(|&f| match self.link(f) {
                    Some(l) => l.is_valid(min_anchors, min_regions, min_length) && l.tags.len() > n,
                    None => false,
                })
                .collect();
            let back_candidates: Vec<LinkId> = self
                .neighbours(back, link_id)
                .into_iter()
                .filter(|&b| match self.link(b) {
                    Some(l) => l.is_valid(min_anchors, min_regions, min_length) && l.tags.len() > n,
                    None => false,
                })
                .collect();

            let mut resolved = None;
            'outer: for &f in &front_candidates {
                for &b in &back_candidates {
                    if f == b || self.link(f).unwrap().tags.len() != self.link(b).unwrap().tags.len() {
                        continue;
                    }
                    let link = self.link(link_id).unwrap();
                    let front_link = self.link(f).unwrap();
                    let back_link = self.link(b).unwrap();

                    let s_leading = match flag_as_trailing(link, front) {
                        Some(s) => s,
                        None => continue,
                    };
                    let s_f_trailing = match flag_as_leading(front_link, front) {
                        Some(s) => s,
                        None => continue,
                    };
                    let front_match = match link.resolve_matching(front_link, s_leading, s_f_trailing, true) {
                        Some((_, _, m)) if m.len() == n => m,
                        _ => continue,
                    };

                    let s_trailing = match flag_as_trailing(link, back) {
                        Some(s) => s,
                        None => continue,
                    };
                    let s_b_leading = match flag_as_leading(back_link, back) {
                        Some(s) => s,
                        None => continue,
                    };
                    let back_match = match link.resolve_matching(back_link, s_trailing, s_b_leading, true) {
                        Some((_, _, m)) if m.len() == n => m,
                        _ => continue,
                    };

                    let s_f_leading = match flag_as_leading(front_link, front) {
                        Some(s) => s,
                        None => continue,
                    };
                    let s_b_trailing_at_back = flag_as_trailing(back_link, back).unwrap_or(-2);
                    let front_to_back = if s_b_trailing_at_back != -2 {
                        front_link.resolve_matching(back_link, s_f_leading, s_b_trailing_at_back, true)
                    } else {
                        None
                    };

                    // Classify each front-link tag: must map to exactly one
                    // of {this_link, back_link}, never both / neither.
                    let mut weird = false;
                    for ft in 0..front_link.tags.len() {
                        let maps_to_this = front_match.contains(&ft);
                        let maps_to_back = front_to_back
                            .as_ref()
                            .map(|(_, _, m)| m.contains(&ft))
                            .unwrap_or(false);
                        if maps_to_this && maps_to_back {
                            weird = true;
                            warn!("assimilate-small-insertions: WEIRD INSERTION at link {:?}", link_id);
                            break;
                        }
                    }
                    if weird {
                        continue;
                    }

                    resolved = Some((f, front_match, back_match));
                    break 'outer;
                }
            }

            if let Some((f, front_match, _back_match)) = resolved {
                let this_tags: Vec<Tag> = self.link(link_id).unwrap().tags.clone();
                {
                    let front_link = self.links[f.0 as usize].as_mut().unwrap();
                    for (i, &ft) in front_match.iter().enumerate() {
                        let t_l = this_tags[i];
                        let f_tag = &mut front_link.tags[ft];
                        if f_tag.end < t_l.end {
                            f_tag.end = t_l.end;
                        } else if f_tag.start > t_l.start {
                            f_tag.start = t_l.start;
                        }
                    }
                }
                self.delete_link(link_id);
                info!("assimilated small insertion {:?} into {:?}", link_id, f);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 4.9 Split-unbalanced-links
    // ---------------------------------------------------------------

    pub fn split_unbalanced_links(&mut self, max_ratio: f64) -> Result<()> {
        if max_ratio <= 1.0 {
            return Ok(());
        }
        for link_id in self.candidate_link_ids() {
            let link = match self.link(link_id) {
                Some(l) => l,
                None => continue,
            };
            if link.tags.len() <= 1 {
                continue;
            }
            let mut by_species: BTreeMap<u32, (u64, u64)> = BTreeMap::new();
            for t in &link.tags {
                let len = t.length();
                let e = by_species.entry(t.species.0).or_insert((u64::MAX, 0));
                e.0 = e.0.min(len);
                e.1 = e.1.max(len);
            }
            let unbalanced = by_species
                .values()
                .any(|&(shortest, longest)| (shortest as f64) * max_ratio < longest as f64);
            if !unbalanced {
                continue;
            }
            let drop: Vec<usize> = link
                .tags
                .iter()
                .enumerate()
                .filter(|(_, t)| {
                    let (_, longest) = by_species[&t.species.0];
                    (t.length() as f64) * max_ratio < longest as f64
                })
                .map(|(i, _)| i)
                .collect();
            if drop.is_empty() {
                continue;
            }
            if drop.len() >= link.tags.len() {
                return Err(EnredoError::EmptyLinkInvariant { link: link_id });
            }
            let mut keep = Vec::with_capacity(link.tags.len() - drop.len());
            let link_mut = self.links[link_id.0 as usize].as_mut().unwrap();
            let drop_set: std::collections::HashSet<usize> = drop.into_iter().collect();
            for (i, t) in link_mut.tags.iter().enumerate() {
                if !drop_set.contains(&i) {
                    keep.push(*t);
                }
            }
            let dropped = link_mut.tags.len() - keep.len();
            link_mut.tags = keep;
            info!("split-unbalanced-links: dropped {} tags from {:?}", dropped, link_id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // 4.10 Validity / bridge predicates
    // ---------------------------------------------------------------

    pub fn is_valid_link(&self, id: LinkId, min_anchors: u32, min_regions: u32, min_length: u64) -> bool {
        match self.link(id) {
            Some(l) => l.is_valid(min_anchors, min_regions, min_length),
            None => false,
        }
    }

    pub fn is_bridge(&self, id: LinkId, min_anchors: u32, min_regions: u32, min_length: u64) -> bool {
        let link = match self.link(id) {
            Some(l) => l,
            None => return false,
        };
        if link.is_valid(min_anchors, min_regions, min_length) || link.is_loop() || link.tags.len() < 2 {
            return false;
        }
        let front = link.front();
        let back = link.back();

        let front_ok = self.neighbours(front, id).into_iter().any(|f| {
            let fl = match self.link(f) {
                Some(l) if l.is_valid(min_anchors, min_regions, min_length) && !l.is_loop() => l,
                _ => return false,
            };
            let s_l = match flag_as_trailing(link, front) {
                Some(s) => s,
                None => return false,
            };
            let s_f = match flag_as_leading(fl, front) {
                Some(s) => s,
                None => return false,
            };
            link.resolve_matching(fl, s_l, s_f, true).is_some()
        });
        let back_ok = self.neighbours(back, id).into_iter().any(|b| {
            let bl = match self.link(b) {
                Some(l) if l.is_valid(min_anchors, min_regions, min_length) && !l.is_loop() => l,
                _ => return false,
            };
            let s_l = match flag_as_trailing(link, back) {
                Some(s) => s,
                None => return false,
            };
            let s_b = match flag_as_leading(bl, back) {
                Some(s) => s,
                None => return false,
            };
            link.resolve_matching(bl, s_l, s_b, true).is_some()
        });
        front_ok && back_ok
    }

    // ---------------------------------------------------------------
    // Diagnostics (ambient stack: histogram / stats reporting)
    // ---------------------------------------------------------------

    /// Histogram of incident-link counts per anchor, bucketed 0..=cap
    /// (overflow bucketed at `cap`). Grounded on `graph.cpp`'s
    /// `print_anchors_histogram`.
    pub fn anchor_histogram(&self, cap: usize) -> Vec<u64> {
        let mut hist = vec![0u64; cap + 1];
        for a in &self.anchors {
            let bucket = a.links.len().min(cap);
            hist[bucket] += 1;
        }
        hist
    }

    /// Summary stats over all live links, grounded on `graph.cpp`'s
    /// `print_stats`.
    pub fn block_stats(&self) -> BlockStats {
        let mut regions_hist: BTreeMap<usize, u64> = BTreeMap::new();
        let mut total_links = 0u64;
        let mut total_tags = 0u64;
        for link in self.links.iter().flatten() {
            total_links += 1;
            total_tags += link.tags.len() as u64;
            *regions_hist.entry(link.tags.len()).or_insert(0) += 1;
        }
        BlockStats {
            total_links,
            total_tags,
            regions_histogram: regions_hist,
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone)]
pub struct BlockStats {
    pub total_links: u64,
    pub total_tags: u64,
    pub regions_histogram: BTreeMap<usize, u64>,
}

fn parse_strand(s: &str) -> Option<i8> {
    match s {
        "+" | "1" => Some(1),
        "-" | "-1" => Some(-1),
        "0" => Some(0),
        _ => None,
    }
}

/// Orientation flag for `link` acting as the *trailing* edge into `at`
/// (i.e. `link` ends at `at`): loop -> 0, back == at -> +1, front == at
/// -> -1. Mirrors `Anchor::minimize`'s flag for the first link of a pair.
fn flag_as_trailing(link: &Link, at: AnchorId) -> Option<i8> {
    if link.front() == link.back() {
        Some(0)
    } else if link.back() == at {
        Some(1)
    } else if link.front() == at {
        Some(-1)
    } else {
        None
    }
}

/// Orientation flag for `link` acting as the *leading* edge out of `at`
/// (i.e. `link` starts at `at`): loop -> 0, back == at -> -1, front == at
/// -> +1. Mirrors `Anchor::minimize`'s flag for the second link of a pair.
fn flag_as_leading(link: &Link, at: AnchorId) -> Option<i8> {
    if link.front() == link.back() {
        Some(0)
    } else if link.back() == at {
        Some(-1)
    } else if link.front() == at {
        Some(1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::{ChrId, SpeciesId};

    fn push_anchor(g: &mut Graph, name: &str) -> AnchorId {
        let id = AnchorId(g.anchors.len() as u32);
        g.anchors.push(Anchor::new(name.to_string()));
        id
    }

    fn push_link(g: &mut Graph, path: Vec<AnchorId>, tags: Vec<Tag>) -> LinkId {
        let id = LinkId(g.links.len() as u32);
        let front = path[0];
        let back = *path.last().unwrap();
        g.links.push(Some(Link { path, tags }));
        g.register(id, front, back);
        id
    }

    fn tag(start: u64, end: u64, strand: i8) -> Tag {
        Tag::new(SpeciesId(0), ChrId(0), start, end, strand)
    }

    /// Invariant 1: every link is registered exactly once on each distinct
    /// endpoint, or twice on a shared endpoint for a loop link.
    #[test]
    fn anchor_incidence_matches_link_endpoints() {
        let mut g = Graph::new();
        let a = push_anchor(&mut g, "A");
        let b = push_anchor(&mut g, "B");
        let link_id = push_link(&mut g, vec![a, b], vec![tag(0, 10, 1)]);
        assert_eq!(g.anchors[a.0 as usize].links, vec![link_id]);
        assert_eq!(g.anchors[b.0 as usize].links, vec![link_id]);

        let loop_id = push_link(&mut g, vec![a, a], vec![tag(0, 10, 1)]);
        assert_eq!(
            g.anchors[a.0 as usize].links,
            vec![link_id, loop_id, loop_id]
        );
    }

    /// Invariant 5: concatenation with a 1:1 tag bijection is conservative
    /// on tag count; merging an alternative path is additive.
    #[test]
    fn concatenate_is_conservative_merge_is_additive() {
        let mut g = Graph::new();
        let a = push_anchor(&mut g, "A");
        let b = push_anchor(&mut g, "B");
        let c = push_anchor(&mut g, "C");
        let this_id = push_link(&mut g, vec![a, b], vec![tag(0, 10, 1)]);
        let other_id = push_link(&mut g, vec![b, c], vec![tag(5, 20, 1)]);

        let merged = g.concatenate(this_id, other_id, 1, 1).unwrap();
        assert!(merged);
        let result = g.link(this_id).unwrap();
        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.path, vec![a, b, c]);

        let extra_id = push_link(&mut g, vec![a, b, c], vec![tag(100, 110, 1)]);
        g.merge_links(this_id, extra_id);
        let after_merge = g.link(this_id).unwrap();
        assert_eq!(after_merge.tags.len(), 2);
    }

    /// Invariant 6: after minimize, no further concatenation is possible
    /// at any anchor (the pass has reached its fixpoint).
    #[test]
    fn minimize_reaches_a_fixpoint() {
        let mut g = Graph::new();
        g.populate(
            std::io::Cursor::new(
                "A sp chr 10 20 + 1\nB sp chr 30 40 + 1\nC sp chr 50 60 + 1\n",
            ),
            0.0,
            100_000,
        )
        .unwrap();
        g.minimize().unwrap();
        let once = g.link_count();
        g.minimize().unwrap();
        assert_eq!(g.link_count(), once);
    }

    /// Invariant 7: splitting along exactly the tag partition that an
    /// earlier merge combined restores the original tag multiset.
    #[test]
    fn split_then_merge_restores_original_tags() {
        let mut g = Graph::new();
        let a = push_anchor(&mut g, "A");
        let b = push_anchor(&mut g, "B");
        let original = vec![tag(0, 10, 1), tag(20, 30, 1), tag(40, 50, 1)];
        let link_id = push_link(&mut g, vec![a, b], original.clone());

        let split_id = g.split_link(link_id, &[0, 2]).unwrap();
        assert_eq!(g.link(link_id).unwrap().tags.len(), 1);
        assert_eq!(g.link(split_id).unwrap().tags.len(), 2);

        g.merge_links(link_id, split_id);
        let mut restored: Vec<(u64, u64)> =
            g.link(link_id).unwrap().tags.iter().map(|t| (t.start, t.end)).collect();
        let mut expected: Vec<(u64, u64)> = original.iter().map(|t| (t.start, t.end)).collect();
        restored.sort();
        expected.sort();
        assert_eq!(restored, expected);
    }

    /// Regression for the front/back flag-pairing bug: a bridge candidate
    /// flanked by a genuine forward continuation on its front side (and a
    /// symmetric continuation on its back side) must be recognized on
    /// both sides, not just the back.
    #[test]
    fn is_bridge_recognizes_front_side_continuation() {
        let mut g = Graph::new();
        let a = push_anchor(&mut g, "A");
        let b = push_anchor(&mut g, "B");
        let c = push_anchor(&mut g, "C");
        let d = push_anchor(&mut g, "D");

        let front_id = push_link(&mut g, vec![a, b], vec![tag(0, 100, 1), tag(0, 100, 1)]);
        let bridge_id = push_link(&mut g, vec![b, c], vec![tag(90, 110, 1), tag(90, 110, 1)]);
        let back_id = push_link(&mut g, vec![c, d], vec![tag(105, 300, 1), tag(105, 300, 1)]);

        assert!(g.is_bridge(bridge_id, 2, 1, 50));
        assert!(g.link(front_id).unwrap().is_valid(2, 1, 50));
        assert!(g.link(back_id).unwrap().is_valid(2, 1, 50));
    }
}
