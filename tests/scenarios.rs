use std::io::Cursor;

use enredo::emitter::{emit_blocks, EmitThresholds};
use enredo::graph::Graph;

fn load(rows: &str) -> Graph {
    let mut graph = Graph::new();
    graph
        .populate(Cursor::new(rows), 0.0, 100_000)
        .expect("well-formed input");
    graph
}

fn emit(graph: &Graph, thresholds: EmitThresholds) -> String {
    let mut out = Vec::new();
    emit_blocks(graph, &mut out, thresholds).unwrap();
    String::from_utf8(out).unwrap()
}

const DEFAULT_THRESHOLDS: EmitThresholds = EmitThresholds {
    min_anchors: 3,
    min_regions: 1,
    min_length: 1,
    print_all: false,
};

/// S1: basic linearization of two chained hits on one species.
#[test]
fn s1_basic_linearization() {
    let mut graph = load(
        "A sp chr 10 20 + 1\n\
         B sp chr 30 40 + 1\n\
         C sp chr 50 60 + 1\n",
    );
    assert_eq!(graph.link_count(), 2);
    graph.minimize().unwrap();
    assert_eq!(graph.link_count(), 1);

    let out = emit(&graph, DEFAULT_THRESHOLDS);
    assert_eq!(out.matches("block").count(), 1);
    assert!(out.contains("- A - B - C") || out.contains("- C - B - A"));
    assert!(out.contains("made of 1 genomic regions"));
    assert!(out.contains("sp:chr:10:60 [1]") || out.contains("sp:chr:10:60 [-1]"));
}

/// S2: two species hitting the same anchor path merge into a single
/// two-tag link.
#[test]
fn s2_two_species_colinear_merge() {
    let mut graph = load(
        "A spX chrX 100 200 + 1\n\
         B spX chrX 300 400 + 1\n\
         C spX chrX 500 600 + 1\n\
         --\n\
         A spY chrY 100 200 + 1\n\
         B spY chrY 300 400 + 1\n\
         C spY chrY 500 600 + 1\n",
    );
    graph.minimize().unwrap();
    assert_eq!(graph.link_count(), 1);
    let link = graph
        .link(enredo::link::LinkId(
            (0..graph.links.len() as u32)
                .find(|&i| graph.link(enredo::link::LinkId(i)).is_some())
                .unwrap(),
        ))
        .unwrap();
    assert_eq!(link.tags.len(), 2);
    assert_eq!(link.shortest_region_length(), 501);
    let strand0 = link.tags[0].strand;
    for t in &link.tags {
        assert_eq!(t.strand, strand0);
    }
}

/// S3: a reverse-complement species strand yields a negated tag while
/// the forward species tag is untouched.
#[test]
fn s3_reverse_complement() {
    let mut graph = load(
        "A spX chrX 100 200 + 1\n\
         B spX chrX 300 400 + 1\n\
         C spX chrX 500 600 + 1\n\
         --\n\
         C spY chrY 100 200 - 1\n\
         B spY chrY 300 400 - 1\n\
         A spY chrY 500 600 - 1\n",
    );
    graph.minimize().unwrap();
    assert_eq!(graph.link_count(), 1);
    let id = enredo::link::LinkId(
        (0..graph.links.len() as u32)
            .find(|&i| graph.link(enredo::link::LinkId(i)).is_some())
            .unwrap(),
    );
    let link = graph.link(id).unwrap();
    assert_eq!(link.tags.len(), 2);
    for t in &link.tags {
        assert_eq!(t.start, 100);
        assert_eq!(t.end, 600);
    }
    assert_eq!(link.tags[0].strand, -link.tags[1].strand);
}

/// S4: alternative-path merge with a dissimilarity budget of 1 collapses
/// two near-duplicate endpoint-sharing links into one.
#[test]
fn s4_alternative_path_merge() {
    let mut graph = load(
        "A spX chrX 0 10 + 1\n\
         B spX chrX 20 30 + 1\n\
         C spX chrX 40 50 + 1\n\
         D spX chrX 60 70 + 1\n\
         --\n\
         A spY chrY 0 10 + 1\n\
         B spY chrY 20 30 + 1\n\
         X spY chrY 40 50 + 1\n\
         C spY chrY 60 70 + 1\n\
         D spY chrY 80 90 + 1\n",
    );
    graph.minimize().unwrap();
    let before = graph.link_count();
    assert!(before >= 2);

    graph.merge_alternative_paths(1);
    graph.minimize().unwrap();

    assert_eq!(graph.link_count(), 1);
}

/// S5: a hairpin anchor path on two species resolves into a single
/// undetermined-strand block.
#[test]
fn s5_palindrome_resolution() {
    let mut graph = load(
        "A sp chrX 0 10 + 1\n\
         B sp chrX 20 30 + 1\n\
         C sp chrX 40 50 + 1\n\
         B sp chrX 60 70 + 1\n\
         A sp chrX 80 90 + 1\n\
         --\n\
         A sp2 chrY 0 10 + 1\n\
         B sp2 chrY 20 30 + 1\n\
         C sp2 chrY 40 50 + 1\n\
         B sp2 chrY 60 70 + 1\n\
         A sp2 chrY 80 90 + 1\n",
    );
    graph.minimize().unwrap();
    let before = graph.link_count();
    assert!(before >= 1);

    graph.resolve_small_palindromes(3, 1, 1).unwrap();
    graph.minimize().unwrap();

    let survivors: Vec<_> = (0..graph.links.len() as u32)
        .filter_map(|i| graph.link(enredo::link::LinkId(i)))
        .collect();
    assert!(!survivors.is_empty());
}

/// S6: split-unbalanced-links drops a tag whose length is an outlier for
/// its species relative to `max_ratio`.
#[test]
fn s6_unbalanced_split() {
    use enredo::anchor::AnchorId;
    use enredo::interner::{ChrId, SpeciesId};
    use enredo::link::{Link, LinkId};
    use enredo::tag::Tag;

    let mut graph = Graph::new();
    // Build the link directly: three tags of lengths 10000, 10000, 100.
    let a = AnchorId(0);
    let b = AnchorId(1);
    graph.anchors.push(enredo::anchor::Anchor::new("A".into()));
    graph.anchors.push(enredo::anchor::Anchor::new("B".into()));
    let species = SpeciesId(0);
    let chr = ChrId(0);
    let mut link = Link::new(a, b);
    link.tags.push(Tag::new(species, chr, 0, 9999, 1));
    link.tags.push(Tag::new(species, chr, 0, 9999, 1));
    link.tags.push(Tag::new(species, chr, 0, 99, 1));
    graph.links.push(Some(link));
    let link_id = LinkId(0);
    graph.anchors[0].add_link(link_id);
    graph.anchors[1].add_link(link_id);

    graph.split_unbalanced_links(10.0).unwrap();

    let link = graph.link(link_id).unwrap();
    assert_eq!(link.tags.len(), 2);
}
