// src/crawl/frontier.rs
// =============================================================================
// Depth-bounded, breadth-first exploration state for one crawl session.
//
// How it works:
// 1. The seed is admitted: it goes into `visited` and into the first round
// 2. The controller fetches every URL of the current round
// 3. expand() folds the round's outbound links into the next round, skipping
//    anything already in `visited`
// 4. Repeat until a round comes back empty
//
// Admission, not completion, is the dedup boundary: a URL is inserted into
// `visited` the moment it is put into a round. A page linked from ten
// different pages of one round is still fetched exactly once.
//
// The depth budget is checked once per round boundary:
// - depth 0: only the seed is fetched
// - depth 1: the seed plus the pages it links to
// - depth n: everything within n link hops of the seed
// =============================================================================

use crate::crawl::page::{PageResult, PageUrl};
use std::collections::HashSet;

#[derive(Debug)]
pub struct Frontier {
    visited: HashSet<PageUrl>,
    current_round: Vec<PageUrl>,
    depth_remaining: i64,
    round: usize,
}

impl Frontier {
    // The seed is always part of round 0, whatever the depth.
    pub fn new(seed: PageUrl, depth: i64) -> Self {
        let mut visited = HashSet::new();
        visited.insert(seed.clone());

        Frontier {
            visited,
            current_round: vec![seed],
            depth_remaining: depth,
            round: 0,
        }
    }

    /// URLs admitted for the round that is about to be dispatched.
    pub fn current_round(&self) -> &[PageUrl] {
        &self.current_round
    }

    /// Zero-based index of the current round (its graph distance from the seed).
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn depth_remaining(&self) -> i64 {
        self.depth_remaining
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    #[cfg(test)]
    pub fn is_visited(&self, url: &PageUrl) -> bool {
        self.visited.contains(url)
    }

    /// Computes the next round from the results of the current one.
    ///
    /// Links of successful results are admitted in result order, then link
    /// order. Failed results contribute nothing. Once the depth budget is
    /// spent the next round is empty regardless of what was discovered.
    pub fn expand(&mut self, round_results: &[PageResult]) -> Vec<PageUrl> {
        let mut next_round = Vec::new();

        if self.depth_remaining > 0 {
            for result in round_results.iter().filter(|r| r.success) {
                for link in &result.links {
                    // Links are stored normalized already; normalizing again
                    // guards against fetchers that build PageUrl by hand.
                    let link = PageUrl::from_url(link.as_url().clone());
                    if self.visited.insert(link.clone()) {
                        next_round.push(link);
                    }
                }
            }
        }

        self.depth_remaining -= 1;
        self.round += 1;
        self.current_round = next_round.clone();

        tracing::debug!(
            round = self.round,
            admitted = next_round.len(),
            visited = self.visited.len(),
            depth_remaining = self.depth_remaining,
            "frontier expanded"
        );

        next_round
    }
}
