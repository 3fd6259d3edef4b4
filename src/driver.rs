use log::info;

use crate::emitter::{emit_blocks, EmitThresholds};
use crate::error::Result;
use crate::graph::Graph;

/// Thresholds and simplification level that sequence the rewrite passes
/// (spec.md §4.12).
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub min_score: f32,
    pub max_gap_length: u64,
    pub min_length: u64,
    pub min_regions: u32,
    pub min_anchors: u32,
    pub max_path_dissimilarity: u32,
    pub simplify_level: u8,
    pub max_ratio: f64,
    pub max_insertion_length: u64,
    pub print_all: bool,
}

pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Driver { config }
    }

    /// Runs the pass sequence for `self.config.simplify_level` against
    /// `graph`, then writes the resulting blocks to `out`.
    pub fn run(&self, graph: &mut Graph, out: &mut impl std::io::Write) -> Result<u64> {
        let c = &self.config;

        self.level_0(graph)?;

        if c.simplify_level >= 1 && c.simplify_level <= 4 {
            match c.simplify_level {
                1 => {
                    graph.simplify(c.min_anchors, c.min_regions, c.min_length)?;
                    graph.minimize()?;
                }
                2..=4 => {
                    graph.simplify(c.min_anchors, 1, c.min_length)?;
                    graph.minimize()?;
                    if c.simplify_level == 3 {
                        graph.merge_alternative_paths(c.max_path_dissimilarity);
                        graph.minimize()?;
                    } else if c.simplify_level == 4 {
                        for k in 1..=c.max_path_dissimilarity {
                            graph.merge_alternative_paths(k);
                            graph.minimize()?;
                        }
                    }
                }
                _ => unreachable!(),
            }
        } else if c.simplify_level >= 5 {
            loop {
                let before = graph.link_count();
                graph.simplify(c.min_anchors, 1, c.min_length)?;
                graph.minimize()?;
                if graph.link_count() == before {
                    break;
                }
            }
            if c.simplify_level >= 6 {
                loop {
                    let before = graph.link_count();
                    graph.simplify_aggressive(c.min_anchors, c.min_regions, c.min_length)?;
                    graph.minimize()?;
                    graph.simplify(c.min_anchors, c.min_regions, c.min_length)?;
                    graph.minimize()?;
                    if graph.link_count() == before {
                        break;
                    }
                }
            }
            if c.simplify_level >= 7 {
                graph.split_unselected_links(c.min_anchors, c.min_regions, c.min_length)?;
                graph.simplify(c.min_anchors, c.min_regions, c.min_length)?;
                graph.minimize()?;
                graph.simplify_aggressive(c.min_anchors, c.min_regions, c.min_length)?;
                graph.minimize()?;
                graph.resolve_small_palindromes(c.min_anchors, c.min_regions, c.min_length)?;
                graph.minimize()?;
                graph.assimilate_small_insertions(
                    c.min_anchors,
                    c.min_regions,
                    c.min_length,
                    c.max_insertion_length,
                )?;
                graph.minimize()?;
                loop {
                    let before = graph.link_count();
                    graph.merge_alternative_paths(0);
                    graph.minimize()?;
                    if graph.link_count() == before {
                        break;
                    }
                }
                graph.assimilate_small_insertions(
                    c.min_anchors,
                    c.min_regions,
                    c.min_length,
                    c.max_insertion_length,
                )?;
                graph.minimize()?;
            }
        }

        if c.max_ratio > 1.0 {
            graph.split_unbalanced_links(c.max_ratio)?;
            graph.minimize()?;
        }

        let stats = graph.block_stats();
        info!(
            "pre-emit: {} links, {} tags",
            stats.total_links, stats.total_tags
        );

        let thresholds = EmitThresholds {
            min_anchors: c.min_anchors,
            min_regions: c.min_regions,
            min_length: c.min_length,
            print_all: c.print_all,
        };
        let emitted = emit_blocks(graph, out, thresholds)?;
        info!("emitted {} blocks", emitted);
        Ok(emitted)
    }

    fn level_0(&self, graph: &mut Graph) -> Result<()> {
        graph.minimize()?;
        for k in 1..=self.config.max_path_dissimilarity {
            graph.merge_alternative_paths(k);
            graph.minimize()?;
        }
        Ok(())
    }
}
