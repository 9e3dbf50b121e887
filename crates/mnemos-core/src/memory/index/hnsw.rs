//! Hierarchical Navigable Small World index.
//!
//! ## Layout
//!
//! ```text
//! layer 2   e ─────────────── x
//! layer 1   e ──── a ──────── x ──── b
//! layer 0   e ─ c ─ a ─ d ─ f ─ x ─ g ─ b
//! ```
//!
//! Every node lives on layers `0..=level`, with `level` drawn from an
//! exponential distribution. Search descends greedily from the entry point
//! on the top layer, then runs a beam search of width `ef` on layer 0.
//! Nodes keep at most `M` links per upper layer and `2M` on layer 0.
//!
//! Removal unlinks the node everywhere, reconnects its former neighbours
//! among themselves and re-elects the entry point, so the graph never holds
//! tombstones.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Metric, Neighbor, SimilarityIndex};
use crate::config::IndexConfig;
use crate::{MemoryError, MemoryResult};

/// Upper bound on node level
const MAX_LEVEL: usize = 16;

/// Graph construction and search parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Links per node on upper layers (layer 0 keeps twice as many)
    pub max_connections: usize,
    /// Beam width while inserting
    pub ef_construction: usize,
    /// Beam width while querying
    pub ef_search: usize,
    /// Seed for the level generator
    pub seed: Option<u64>,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
            seed: None,
        }
    }
}

impl HnswParams {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            seed: config.seed,
        }
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.max_connections * 2
        } else {
            self.max_connections
        }
    }
}

/// HNSW approximate nearest-neighbour index
pub struct HnswIndex {
    dimensions: usize,
    metric: Metric,
    params: HnswParams,
    level_mult: f64,
    graph: RwLock<Graph>,
}

struct Node {
    id: String,
    vector: Vec<f32>,
    /// Outgoing links per layer, `links.len() == level + 1`
    links: Vec<Vec<usize>>,
}

struct Graph {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    slots: HashMap<String, usize>,
    entry: Option<usize>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    slot: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl HnswIndex {
    pub fn new(dimensions: usize, metric: Metric, params: HnswParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let level_mult = 1.0 / (params.max_connections.max(2) as f64).ln();

        Self {
            dimensions,
            metric,
            params,
            level_mult,
            graph: RwLock::new(Graph {
                nodes: Vec::new(),
                free: Vec::new(),
                slots: HashMap::new(),
                entry: None,
                rng,
            }),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> MemoryResult<()> {
        if vector.len() != self.dimensions {
            return Err(MemoryError::dimension_mismatch(self.dimensions, vector.len()));
        }
        Ok(())
    }
}

impl Graph {
    fn node(&self, slot: usize) -> Option<&Node> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn level_of(&self, slot: usize) -> usize {
        self.node(slot).map_or(0, |n| n.links.len().saturating_sub(1))
    }

    fn links(&self, slot: usize, layer: usize) -> &[usize] {
        self.node(slot)
            .and_then(|n| n.links.get(layer))
            .map_or(&[][..], Vec::as_slice)
    }

    fn distance(&self, metric: Metric, query: &[f32], slot: usize) -> f32 {
        self.node(slot)
            .map_or(f32::MAX, |n| metric.distance(query, &n.vector))
    }

    fn random_level(&mut self, level_mult: f64) -> usize {
        let r: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        ((-r.ln() * level_mult).floor() as usize).min(MAX_LEVEL)
    }

    fn allocate(&mut self, node: Node) -> usize {
        let id = node.id.clone();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.slots.insert(id, slot);
        slot
    }

    /// Walk to the closest node on one layer, one hop at a time.
    fn greedy(&self, metric: Metric, query: &[f32], mut current: usize, layer: usize) -> usize {
        let mut best = self.distance(metric, query, current);
        loop {
            let mut improved = false;
            for &next in self.links(current, layer) {
                let d = self.distance(metric, query, next);
                if d < best {
                    best = d;
                    current = next;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search on one layer. Results are sorted closest first.
    fn search_layer(
        &self,
        metric: Metric,
        query: &[f32],
        entry: usize,
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let ef = ef.max(1);
        let start = Candidate {
            distance: self.distance(metric, query, entry),
            slot: entry,
        };

        let mut visited = HashSet::from([entry]);
        let mut frontier = BinaryHeap::from([Reverse(start)]);
        let mut results = BinaryHeap::from([start]);

        while let Some(Reverse(current)) = frontier.pop() {
            let worst = results.peek().map_or(f32::MAX, |c| c.distance);
            if current.distance > worst && results.len() >= ef {
                break;
            }

            for &next in self.links(current.slot, layer) {
                if !visited.insert(next) {
                    continue;
                }
                let worst = results.peek().map_or(f32::MAX, |c| c.distance);
                let distance = self.distance(metric, query, next);
                if results.len() < ef || distance < worst {
                    let candidate = Candidate { distance, slot: next };
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Pick up to `m` links from candidates sorted closest first, preferring
    /// candidates that are closer to the base than to anything already
    /// picked, then topping up with the closest of the rest.
    fn select_neighbors(&self, metric: Metric, candidates: &[Candidate], m: usize) -> Vec<usize> {
        let mut selected: Vec<usize> = Vec::with_capacity(m);
        let mut skipped = Vec::new();

        for candidate in candidates {
            if selected.len() >= m {
                break;
            }
            let Some(node) = self.node(candidate.slot) else {
                continue;
            };
            let diverse = selected.iter().all(|&chosen| {
                self.node(chosen)
                    .map_or(true, |c| metric.distance(&node.vector, &c.vector) > candidate.distance)
            });
            if diverse {
                selected.push(candidate.slot);
            } else {
                skipped.push(candidate.slot);
            }
        }

        for slot in skipped {
            if selected.len() >= m {
                break;
            }
            selected.push(slot);
        }

        selected
    }

    fn set_links(&mut self, slot: usize, layer: usize, links: Vec<usize>) {
        if let Some(layer_links) = self
            .nodes
            .get_mut(slot)
            .and_then(Option::as_mut)
            .and_then(|n| n.links.get_mut(layer))
        {
            *layer_links = links;
        }
    }

    /// Re-select the links of `slot` on `layer` from `pool`.
    fn relink(&mut self, metric: Metric, slot: usize, layer: usize, pool: &[usize], max: usize) {
        let Some(base) = self.node(slot).map(|n| n.vector.clone()) else {
            return;
        };

        let mut candidates: Vec<Candidate> = pool
            .iter()
            .filter(|&&other| other != slot && self.node(other).is_some())
            .map(|&other| Candidate {
                distance: self.distance(metric, &base, other),
                slot: other,
            })
            .collect();
        candidates.sort();
        candidates.dedup_by_key(|c| c.slot);

        let chosen = self.select_neighbors(metric, &candidates, max);
        self.set_links(slot, layer, chosen);
    }

    fn connect(&mut self, metric: Metric, from: usize, to: usize, layer: usize, max: usize) {
        let mut links = self.links(from, layer).to_vec();
        if links.contains(&to) {
            return;
        }
        links.push(to);
        if links.len() > max {
            self.relink(metric, from, layer, &links, max);
        } else {
            self.set_links(from, layer, links);
        }
    }

    fn detach(&mut self, metric: Metric, params: &HnswParams, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        let Some(removed) = self.nodes.get_mut(slot).and_then(Option::take) else {
            return false;
        };
        self.free.push(slot);

        // Links are one-directional, so finding every back-link means a full
        // scan. Removal is O(N) in the number of nodes.
        for node in self.nodes.iter_mut().flatten() {
            for layer_links in &mut node.links {
                layer_links.retain(|&s| s != slot);
            }
        }

        // Reconnect former neighbours so the layer stays navigable.
        for (layer, former) in removed.links.iter().enumerate() {
            for &neighbor in former {
                if self.node(neighbor).is_none() {
                    continue;
                }
                let mut pool = self.links(neighbor, layer).to_vec();
                pool.extend(
                    former
                        .iter()
                        .copied()
                        .filter(|&s| s != neighbor && self.level_of(s) >= layer),
                );
                self.relink(metric, neighbor, layer, &pool, params.max_links(layer));
            }
        }

        if self.entry == Some(slot) {
            self.entry = self
                .nodes
                .iter()
                .enumerate()
                .filter_map(|(s, n)| n.as_ref().map(|n| (s, n.links.len())))
                .max_by_key(|&(_, levels)| levels)
                .map(|(s, _)| s);
        }

        true
    }
}

impl SimilarityIndex for HnswIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn insert(&self, id: &str, vector: &[f32]) -> MemoryResult<()> {
        self.check_dimensions(vector)?;

        let mut guard = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        let graph = &mut *guard;

        graph.detach(self.metric, &self.params, id);

        let level = graph.random_level(self.level_mult);
        let slot = graph.allocate(Node {
            id: id.to_string(),
            vector: vector.to_vec(),
            links: vec![Vec::new(); level + 1],
        });

        let Some(entry) = graph.entry else {
            graph.entry = Some(slot);
            return Ok(());
        };

        let top = graph.level_of(entry);
        let mut current = entry;
        for layer in (level + 1..=top).rev() {
            current = graph.greedy(self.metric, vector, current, layer);
        }

        for layer in (0..=level.min(top)).rev() {
            let found = graph.search_layer(
                self.metric,
                vector,
                current,
                self.params.ef_construction,
                layer,
            );
            let chosen = graph.select_neighbors(self.metric, &found, self.params.max_connections);
            graph.set_links(slot, layer, chosen.clone());

            let max = self.params.max_links(layer);
            for neighbor in chosen {
                graph.connect(self.metric, neighbor, slot, layer, max);
            }

            if let Some(best) = found.first() {
                current = best.slot;
            }
        }

        if level > top {
            graph.entry = Some(slot);
        }

        Ok(())
    }

    fn remove(&self, id: &str) -> bool {
        self.graph
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .detach(self.metric, &self.params, id)
    }

    fn query(&self, vector: &[f32], k: usize) -> MemoryResult<Vec<Neighbor>> {
        self.check_dimensions(vector)?;

        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = graph.entry else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut current = entry;
        for layer in (1..=graph.level_of(entry)).rev() {
            current = graph.greedy(self.metric, vector, current, layer);
        }

        let found = graph.search_layer(
            self.metric,
            vector,
            current,
            self.params.ef_search.max(k),
            0,
        );

        Ok(found
            .into_iter()
            .take(k)
            .filter_map(|c| {
                graph.node(c.slot).map(|node| Neighbor {
                    id: node.id.clone(),
                    vector: node.vector.clone(),
                    distance: c.distance,
                })
            })
            .collect())
    }

    fn contains(&self, id: &str) -> bool {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .contains_key(id)
    }

    fn len(&self) -> usize {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::index::FlatIndex;

    fn seeded(dimensions: usize) -> HnswIndex {
        HnswIndex::new(
            dimensions,
            Metric::Cosine,
            HnswParams {
                seed: Some(7),
                ..Default::default()
            },
        )
    }

    fn random_vectors(count: usize, dimensions: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| (0..dimensions).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Basic operations
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = seeded(4);
        assert!(index.query(&[1.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert!(!index.remove("missing"));
    }

    #[test]
    fn test_single_vector_round_trip() {
        let index = seeded(3);
        index.insert("only", &[0.2, 0.4, 0.6]).unwrap();

        let hits = index.query(&[0.2, 0.4, 0.6], 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "only");
        assert_eq!(hits[0].vector, vec![0.2, 0.4, 0.6]);
        assert!(hits[0].distance.abs() < 0.001);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let index = seeded(3);
        assert!(matches!(
            index.insert("a", &[1.0, 2.0]),
            Err(MemoryError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(index.is_empty());

        index.insert("a", &[1.0, 2.0, 3.0]).unwrap();
        assert!(index.query(&[1.0], 1).is_err());
    }

    #[test]
    fn test_insert_same_id_replaces_vector() {
        let index = seeded(2);
        index.insert("a", &[1.0, 0.0]).unwrap();
        index.insert("b", &[0.0, 1.0]).unwrap();
        index.insert("a", &[0.0, 1.0]).unwrap();

        assert_eq!(index.len(), 2);
        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert!(hits.iter().all(|n| n.vector == vec![0.0, 1.0]));
    }

    #[test]
    fn test_remove_all_then_reuse() {
        let index = seeded(2);
        for (i, v) in [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]].iter().enumerate() {
            index.insert(&format!("n{}", i), v).unwrap();
        }
        for i in 0..3 {
            assert!(index.remove(&format!("n{}", i)));
        }
        assert!(index.is_empty());
        assert!(index.query(&[1.0, 0.0], 3).unwrap().is_empty());

        index.insert("fresh", &[1.0, 0.0]).unwrap();
        assert_eq!(index.query(&[1.0, 0.0], 1).unwrap()[0].id, "fresh");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Search quality
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_recall_against_exact_search() {
        let dimensions = 16;
        let hnsw = seeded(dimensions);
        let flat = FlatIndex::new(dimensions, Metric::Cosine);

        for (i, vector) in random_vectors(500, dimensions, 1).iter().enumerate() {
            let id = format!("v{}", i);
            hnsw.insert(&id, vector).unwrap();
            flat.insert(&id, vector).unwrap();
        }

        let k = 10;
        let mut hits = 0;
        let queries = random_vectors(20, dimensions, 2);
        for query in &queries {
            let exact: HashSet<String> =
                flat.query(query, k).unwrap().into_iter().map(|n| n.id).collect();
            hits += hnsw
                .query(query, k)
                .unwrap()
                .into_iter()
                .filter(|n| exact.contains(&n.id))
                .count();
        }

        let recall = hits as f64 / (queries.len() * k) as f64;
        assert!(recall >= 0.9, "recall@10 was {}", recall);
    }

    #[test]
    fn test_removed_vectors_never_returned() {
        let dimensions = 8;
        let index = seeded(dimensions);
        let vectors = random_vectors(100, dimensions, 3);
        for (i, vector) in vectors.iter().enumerate() {
            index.insert(&format!("v{}", i), vector).unwrap();
        }
        for i in (0..100).step_by(2) {
            assert!(index.remove(&format!("v{}", i)));
        }
        assert_eq!(index.len(), 50);

        let mut self_hits = 0;
        for (i, vector) in vectors.iter().enumerate() {
            let hits = index.query(vector, 5).unwrap();
            assert!(hits.iter().all(|n| {
                let n: usize = n.id[1..].parse().unwrap();
                n % 2 == 1
            }));
            if i % 2 == 1 && hits.first().map(|n| n.id.as_str()) == Some(format!("v{}", i).as_str()) {
                self_hits += 1;
            }
        }
        assert!(self_hits >= 45, "only {} of 50 survivors found themselves", self_hits);
    }

    #[test]
    fn test_heavy_churn_keeps_survivors_reachable() {
        let dimensions = 16;
        let index = seeded(dimensions);
        let vectors = random_vectors(600, dimensions, 17);
        for (i, vector) in vectors.iter().enumerate() {
            index.insert(&format!("v{}", i), vector).unwrap();
        }
        for i in 0..500 {
            assert!(index.remove(&format!("v{}", i)));
        }
        assert_eq!(index.len(), 100);

        let mut self_hits = 0;
        for (i, vector) in vectors.iter().enumerate().skip(500) {
            let hits = index.query(vector, 3).unwrap();
            assert!(hits.iter().all(|n| n.id[1..].parse::<usize>().unwrap() >= 500));
            if hits.first().map(|n| n.id.as_str()) == Some(format!("v{}", i).as_str()) {
                self_hits += 1;
            }
        }
        assert!(self_hits >= 90, "only {} of 100 survivors found themselves", self_hits);
    }

    #[test]
    fn test_euclidean_metric() {
        let index = HnswIndex::new(2, Metric::Euclidean, HnswParams::default());
        index.insert("near", &[1.0, 1.0]).unwrap();
        index.insert("far", &[10.0, 10.0]).unwrap();

        let hits = index.query(&[0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].id, "near");
        assert!((hits[0].distance - 2f32.sqrt()).abs() < 0.001);
    }
}
