use std::collections::HashSet;
use std::io::{self, Write};

use crate::graph::Graph;
use crate::link::LinkId;
use crate::tag::Tag;

/// Validity/bridge filter thresholds shared by the simplify passes and
/// the emitter (spec.md §4.10, §4.12).
#[derive(Debug, Clone, Copy)]
pub struct EmitThresholds {
    pub min_anchors: u32,
    pub min_regions: u32,
    pub min_length: u64,
    pub print_all: bool,
}

/// Walks every link once (deduplicated via an identity-keyed set, per
/// spec.md §5), prints those passing validity or the bridge predicate,
/// and returns the number of blocks emitted.
pub fn emit_blocks(graph: &Graph, out: &mut impl Write, thresholds: EmitThresholds) -> io::Result<u64> {
    let mut seen: HashSet<LinkId> = HashSet::new();
    let mut count = 0u64;

    for anchor in &graph.anchors {
        for &link_id in &anchor.links {
            if !seen.insert(link_id) {
                continue;
            }
            let link = match graph.link(link_id) {
                Some(l) => l,
                None => continue,
            };

            if thresholds.print_all {
                write_block(out, graph, link_id, &link.tags)?;
                count += 1;
                continue;
            }

            if link.is_valid(thresholds.min_anchors, thresholds.min_regions, thresholds.min_length) {
                write_block(out, graph, link_id, &link.tags)?;
                count += 1;
            } else if graph.is_bridge(
                link_id,
                thresholds.min_anchors,
                thresholds.min_regions,
                thresholds.min_length,
            ) {
                if let Some(trimmed) = trim_bridge_tags(graph, link_id) {
                    write_block(out, graph, link_id, &trimmed)?;
                    count += 1;
                }
            }
        }
    }
    Ok(count)
}

/// Clips a bridge link's tags against whichever neighbour's matching tag
/// overlaps them, dropping any tag whose interval collapses, requiring at
/// least two tags to remain. spec.md §4.10: "trim each bridge tag by
/// clipping its start or end to the boundary implied by the neighbour's
/// matching tag (the side that overlaps)". No surviving implementation of
/// this predicate exists in the retrieved original source, so this
/// follows the prose directly.
fn trim_bridge_tags(graph: &Graph, link_id: LinkId) -> Option<Vec<Tag>> {
    let link = graph.link(link_id)?;
    let mut tags = link.tags.clone();

    for &neighbour_id in &graph.anchor(link.front()).links {
        if neighbour_id == link_id {
            continue;
        }
        if let Some(neighbour) = graph.link(neighbour_id) {
            for t in tags.iter_mut() {
                for nt in &neighbour.tags {
                    if t.same_locus(nt) && t.overlaps(nt) && nt.start <= t.start {
                        t.start = t.start.max(nt.end + 1);
                    }
                }
            }
        }
    }
    for &neighbour_id in &graph.anchor(link.back()).links {
        if neighbour_id == link_id {
            continue;
        }
        if let Some(neighbour) = graph.link(neighbour_id) {
            for t in tags.iter_mut() {
                for nt in &neighbour.tags {
                    if t.same_locus(nt) && t.overlaps(nt) && nt.end >= t.end && nt.start > 0 {
                        t.end = t.end.min(nt.start.saturating_sub(1));
                    }
                }
            }
        }
    }

    tags.retain(|t| t.start <= t.end);
    if tags.len() < 2 {
        None
    } else {
        Some(tags)
    }
}

fn write_block(out: &mut impl Write, graph: &Graph, link_id: LinkId, tags: &[Tag]) -> io::Result<()> {
    let link = graph.link(link_id).expect("live link");
    let path: Vec<&str> = link.path.iter().map(|&a| graph.anchor(a).name.as_str()).collect();
    write!(out, "block")?;
    for name in &path {
        write!(out, " - {}", name)?;
    }
    writeln!(out, "  (made of {} genomic regions)", tags.len())?;
    for t in tags {
        writeln!(
            out,
            "{}:{}:{}:{} [{}] l={}",
            graph.species.resolve(t.species.0),
            graph.chrs.resolve(t.chr.0),
            t.start,
            t.end,
            t.strand,
            t.length()
        )?;
    }
    writeln!(out)?;
    Ok(())
}
