//! Weighted co-occurrence graph shared by the entity services.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use gransk_core::{Network, NetworkLink, NetworkNode, Related};

/// Undirected graph: two entities are linked once per document they share.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoOccurrence {
    edges: BTreeMap<String, BTreeMap<String, u64>>,
    /// Entity set last counted for each document.
    documents: BTreeMap<String, BTreeSet<String>>,
    /// Number of documents mentioning each entity.
    mentions: BTreeMap<String, u64>,
}

impl CoOccurrence {
    /// Count every pair of `entity_ids` once for `doc_id`.
    ///
    /// A document seen before has its earlier pairs replaced. Returns `false`
    /// when its entity set is unchanged.
    pub fn add_document(&mut self, doc_id: &str, entity_ids: &[&str]) -> bool {
        let unique: BTreeSet<String> = entity_ids.iter().map(|id| (*id).to_string()).collect();
        let unchanged = self
            .documents
            .get(doc_id)
            .map_or(unique.is_empty(), |previous| *previous == unique);
        if unchanged {
            return false;
        }

        if let Some(previous) = self.documents.remove(doc_id) {
            self.count(&previous, false);
        }
        self.count(&unique, true);
        if !unique.is_empty() {
            self.documents.insert(doc_id.to_string(), unique);
        }
        true
    }

    fn count(&mut self, entities: &BTreeSet<String>, add: bool) {
        for a in entities {
            bump(&mut self.mentions, a, add);
            for b in entities {
                if a == b {
                    continue;
                }
                let inner = self.edges.entry(a.clone()).or_default();
                bump(inner, b, add);
                if inner.is_empty() {
                    self.edges.remove(a);
                }
            }
        }
    }

    /// Direct neighbours, strongest first, ties by id.
    pub fn neighbours(&self, id: &str) -> Vec<Related> {
        let mut related: Vec<Related> = self
            .edges
            .get(id)
            .into_iter()
            .flatten()
            .map(|(other, weight)| Related {
                id: other.clone(),
                weight: *weight,
            })
            .collect();
        related.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
        related
    }

    /// Breadth-first neighbourhood of `id` up to `hops` steps.
    ///
    /// Links are only reported between returned nodes, each once.
    pub fn network(&self, id: &str, hops: usize) -> Network {
        if !self.mentions.contains_key(id) {
            return Network::default();
        }

        let mut distance: BTreeMap<&str, usize> = BTreeMap::new();
        let mut order: Vec<&str> = Vec::new();
        let mut queue = VecDeque::new();
        distance.insert(id, 0);
        order.push(id);
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            let depth = distance[current];
            if depth >= hops {
                continue;
            }
            for next in self.edges.get(current).into_iter().flat_map(|m| m.keys()) {
                let next = next.as_str();
                if !distance.contains_key(next) {
                    distance.insert(next, depth + 1);
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }

        let nodes = order
            .iter()
            .map(|n| NetworkNode {
                id: (*n).to_string(),
                hops: distance[n],
            })
            .collect();

        let mut links = Vec::new();
        for source in &order {
            for (target, weight) in self.edges.get(*source).into_iter().flatten() {
                if source < &target.as_str() && distance.contains_key(target.as_str()) {
                    links.push(NetworkLink {
                        source: (*source).to_string(),
                        target: target.clone(),
                        weight: *weight,
                    });
                }
            }
        }
        links.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.target.cmp(&b.target)));

        Network { nodes, links }
    }
}

/// Increment or decrement `key`, dropping it at zero.
fn bump(counts: &mut BTreeMap<String, u64>, key: &str, add: bool) {
    if add {
        *counts.entry(key.to_string()).or_default() += 1;
    } else if let Some(count) = counts.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> CoOccurrence {
        let mut g = CoOccurrence::default();
        g.add_document("d1", &["a", "b"]);
        g.add_document("d2", &["a", "b", "c"]);
        g.add_document("d3", &["c", "d"]);
        g.add_document("d4", &["e"]);
        g
    }

    #[test]
    fn neighbours_sorted_by_weight_then_id() {
        let g = graph();
        let related = g.neighbours("a");
        assert_eq!(
            related,
            vec![
                Related { id: "b".into(), weight: 2 },
                Related { id: "c".into(), weight: 1 },
            ]
        );
        assert!(g.neighbours("e").is_empty());
        assert!(g.neighbours("zzz").is_empty());
    }

    #[test]
    fn same_document_is_counted_once() {
        let mut g = CoOccurrence::default();
        assert!(g.add_document("d1", &["a", "b", "a"]));
        assert!(!g.add_document("d1", &["b", "a"]));
        assert_eq!(g.neighbours("a")[0].weight, 1);
    }

    #[test]
    fn readding_with_changed_entities_replaces_pairs() {
        let mut g = graph();
        assert!(g.add_document("d2", &["a", "x"]));

        assert_eq!(
            g.neighbours("a"),
            vec![
                Related { id: "b".into(), weight: 1 },
                Related { id: "x".into(), weight: 1 },
            ]
        );
        assert_eq!(g.neighbours("c"), vec![Related { id: "d".into(), weight: 1 }]);

        // No entities left: the document stops contributing.
        assert!(g.add_document("d3", &[]));
        assert!(g.neighbours("c").is_empty());
        assert_eq!(g.network("d", 1), Network::default());
        assert!(!g.add_document("d3", &[]));
    }

    #[test]
    fn lone_entity_network_is_its_root() {
        let g = graph();
        let network = g.network("e", 2);
        assert_eq!(network.nodes, vec![NetworkNode { id: "e".into(), hops: 0 }]);
        assert!(network.links.is_empty());
    }

    #[test]
    fn network_respects_hops() {
        let g = graph();

        let one = g.network("a", 1);
        let ids: Vec<_> = one.nodes.iter().map(|n| (n.id.as_str(), n.hops)).collect();
        assert_eq!(ids, vec![("a", 0), ("b", 1), ("c", 1)]);
        // b-c are both within reach, so their link is reported too.
        assert_eq!(one.links.len(), 3);

        let two = g.network("a", 2);
        assert_eq!(two.nodes.len(), 4);
        assert!(two.nodes.iter().any(|n| n.id == "d" && n.hops == 2));
        assert!(two.links.iter().all(|l| l.source < l.target));

        let zero = g.network("a", 0);
        assert_eq!(zero.nodes.len(), 1);
        assert!(zero.links.is_empty());
    }

    #[test]
    fn unknown_entity_has_empty_network() {
        assert_eq!(graph().network("nope", 3), Network::default());
    }
}
