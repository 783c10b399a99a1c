//! Hierarchy-preserving result assembly.
//!
//! A structural recall pass walks each category tree with a plain substring
//! test, so the user sees every match together with the groups that lead to
//! it. The weighted scores from the search engine then reorder each category
//! without breaking the nesting: sibling subtrees are sorted among themselves,
//! each keyed by the best score inside it, and a group always heads its own
//! block. Subtrees with no score at all keep their structural position.

use crate::indexer::CategoryTree;
use crate::interface::{CategoryResults, Entry, HierarchicalResult, IndexedEntry, SearchMatch};
use crate::search::normalize_query;
use std::collections::HashMap;

/// Structural matches of one category tree, depth-first.
///
/// A group is emitted (as a parent) when any descendant matched, followed by
/// those descendants; otherwise only when it matches itself. `query` must
/// already be trimmed and lowercased.
pub fn collect_matching(category_key: &str, category_title: &str, root: &Entry, query: &str) -> Vec<HierarchicalResult> {
    let mut results = Vec::new();
    let ctx = Walk {
        category_key,
        category_title,
        query,
    };
    ctx.collect(root, None, 0, &mut results);
    results
}

struct Walk<'a> {
    category_key: &'a str,
    category_title: &'a str,
    query: &'a str,
}

impl Walk<'_> {
    fn collect(&self, group: &Entry, parent_key: Option<&str>, depth: usize, out: &mut Vec<HierarchicalResult>) {
        for child in &group.children {
            let direct = self.matches(child);

            if child.is_group() {
                let mut descendants = Vec::new();
                let child_key = Some(child.key.as_str()).filter(|key| !key.is_empty());
                self.collect(child, child_key, depth + 1, &mut descendants);

                if !descendants.is_empty() || direct {
                    out.push(self.result(child, parent_key, depth, true));
                    out.append(&mut descendants);
                }
            } else if direct {
                out.push(self.result(child, parent_key, depth, false));
            }
        }
    }

    fn matches(&self, entry: &Entry) -> bool {
        entry.title.to_lowercase().contains(self.query)
            || entry.summary.to_lowercase().contains(self.query)
            || entry.key.to_lowercase().contains(self.query)
    }

    fn result(&self, entry: &Entry, parent_key: Option<&str>, depth: usize, is_parent: bool) -> HierarchicalResult {
        HierarchicalResult {
            entry: IndexedEntry {
                key: entry.key.clone(),
                title: entry.title.clone(),
                summary: entry.summary.clone(),
                category_key: self.category_key.to_string(),
                category_title: self.category_title.to_string(),
                is_group: entry.is_group(),
                depth,
                parent_key: parent_key.map(str::to_string),
            },
            is_parent,
            score: None,
        }
    }
}

/// Attach scores by key and reorder sibling subtrees by their best score.
///
/// Rows must be in the pre-order produced by [`collect_matching`]. A group
/// stays ahead of its descendants and its block stays contiguous.
pub fn rank_by_scores(results: &mut [HierarchicalResult], scores: &HashMap<&str, f32>) {
    for result in results.iter_mut() {
        if !result.entry.key.is_empty() {
            result.score = scores.get(result.entry.key.as_str()).copied();
        }
    }

    let mut order = Vec::with_capacity(results.len());
    order_siblings(results, 0, results.len(), &mut order);

    let reordered: Vec<HierarchicalResult> = order.into_iter().map(|i| results[i].clone()).collect();
    results.clone_from_slice(&reordered);
}

/// Row range `[start, end)` of one subtree: its head row and every deeper row after it
type Block = (usize, usize);

fn order_siblings(results: &[HierarchicalResult], start: usize, end: usize, order: &mut Vec<usize>) {
    let blocks = sibling_blocks(results, start, end);

    let best: Vec<Option<f32>> = blocks.iter().map(|&block| block_score(results, block)).collect();

    let slots: Vec<usize> = (0..blocks.len()).filter(|&i| best[i].is_some()).collect();
    let mut scored: Vec<(Block, f32)> = slots
        .iter()
        .filter_map(|&i| best[i].map(|score| (blocks[i], score)))
        .collect();
    // stable: equal scores keep tree order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut arranged = blocks;
    for (slot, (block, _)) in slots.into_iter().zip(scored) {
        arranged[slot] = block;
    }

    for (head, block_end) in arranged {
        order.push(head);
        order_siblings(results, head + 1, block_end, order);
    }
}

fn sibling_blocks(results: &[HierarchicalResult], start: usize, end: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut head = start;
    while head < end {
        let depth = results[head].entry.depth;
        let mut next = head + 1;
        while next < end && results[next].entry.depth > depth {
            next += 1;
        }
        blocks.push((head, next));
        head = next;
    }
    blocks
}

/// Best score anywhere in the subtree
fn block_score(results: &[HierarchicalResult], (start, end): Block) -> Option<f32> {
    results[start..end].iter().filter_map(|r| r.score).reduce(f32::max)
}

/// Per-category hierarchical results for `query`, ordered with `matches`.
///
/// Categories without structural matches are omitted. A blank query yields
/// nothing.
pub fn assemble(trees: &[CategoryTree], query: &str, matches: &[SearchMatch]) -> Vec<CategoryResults> {
    let query = normalize_query(query);
    if query.is_empty() {
        return Vec::new();
    }

    trees
        .iter()
        .filter_map(|tree| {
            let mut results = collect_matching(&tree.key, &tree.title, &tree.root, &query);
            if results.is_empty() {
                return None;
            }

            // matches arrive best-first, so the first score seen for a key wins
            let mut scores: HashMap<&str, f32> = HashMap::new();
            for m in matches.iter().filter(|m| m.entry.category_key == tree.key) {
                if !m.entry.key.is_empty() {
                    scores.entry(m.entry.key.as_str()).or_insert(m.score);
                }
            }
            rank_by_scores(&mut results, &scores);

            Some(CategoryResults {
                category_key: tree.key.clone(),
                category_title: tree.title.clone(),
                results,
            })
        })
        .collect()
}
