//! # Transfer Graph
//!
//! Directed graph of transfer-eligible locations. Vertices keep the order in
//! which the location service lists them; that order is the tie-break for
//! equal-cost paths.
//!
//! ## Edge selection
//!
//! For every ordered pair of distinct locations the most specific tier that
//! yields an applicable template decides the edge:
//!
//! 1. pair overrides for (source, target), which always apply
//! 2. source overrides for the source
//! 3. target overrides for the target
//! 4. base templates
//!
//! Tiers 2-4 only apply a template when its node serves both endpoints. Within
//! a tier the cheapest template wins, the first declared on ties.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use super::errors::{TransferError, TransferResult};
use crate::models::{AdjacencyEdge, AdjacencyList, Location, TransferCapabilities, TransferTemplate};

/// Which rule produced an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOrigin {
    PairOverride,
    SourceOverride,
    TargetOverride,
    Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferEdge {
    pub from: usize,
    pub to: usize,
    pub template: TransferTemplate,
    pub origin: EdgeOrigin,
}

impl TransferEdge {
    pub fn base_weight(&self) -> f64 {
        self.template.cost_weight
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferGraph {
    vertices: Vec<Location>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<TransferEdge>>,
}

impl TransferGraph {
    /// Build the graph. Locations with `allow_transfers = false` are left out.
    pub fn build(
        locations: &[Location],
        capabilities: &TransferCapabilities,
    ) -> TransferResult<Self> {
        validate_weights(capabilities)?;

        let vertices: Vec<Location> = locations
            .iter()
            .filter(|location| location.allow_transfers)
            .cloned()
            .collect();
        let index = vertices
            .iter()
            .enumerate()
            .map(|(position, location)| (location.location_id.clone(), position))
            .collect();

        let mut edges = vec![Vec::new(); vertices.len()];
        for (from, source) in vertices.iter().enumerate() {
            for (to, target) in vertices.iter().enumerate() {
                if from == to {
                    continue;
                }
                if let Some((template, origin)) = select_template(capabilities, source, target) {
                    edges[from].push(TransferEdge {
                        from,
                        to,
                        template: template.clone(),
                        origin,
                    });
                }
            }
        }

        Ok(Self {
            vertices,
            index,
            edges,
        })
    }

    /// Resolve a location id, falling back to the location name
    pub fn vertex(&self, reference: &str) -> Option<usize> {
        self.index.get(reference).copied().or_else(|| {
            self.vertices
                .iter()
                .position(|location| location.location_name == reference)
        })
    }

    pub fn location(&self, vertex: usize) -> Option<&Location> {
        self.vertices.get(vertex)
    }

    pub fn locations(&self) -> &[Location] {
        &self.vertices
    }

    pub fn edges_from(&self, vertex: usize) -> &[TransferEdge] {
        self.edges.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&TransferEdge> {
        self.edges_from(from).iter().find(|edge| edge.to == to)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Base-weight adjacency list keyed by location id
    pub fn adjacency_list(&self) -> AdjacencyList {
        self.vertices
            .iter()
            .zip(&self.edges)
            .map(|(location, outgoing)| {
                let edges = outgoing
                    .iter()
                    .map(|edge| AdjacencyEdge {
                        target: self.vertices[edge.to].location_id.clone(),
                        node: edge.template.node.clone(),
                        action: edge.template.action.clone(),
                        weight: edge.base_weight(),
                    })
                    .collect();
                (location.location_id.clone(), edges)
            })
            .collect()
    }

    /// Dijkstra from `source` to `target` under `weight`, which must be
    /// non-negative. Returns the edges of the cheapest path and its cost.
    ///
    /// Vertices with equal tentative cost are expanded in insertion order and
    /// a distance is only replaced by a strictly lower one, so equal-cost
    /// paths resolve the same way every time.
    pub fn shortest_path<F>(
        &self,
        source: usize,
        target: usize,
        weight: F,
    ) -> Option<(Vec<&TransferEdge>, f64)>
    where
        F: Fn(&TransferEdge) -> f64,
    {
        if source >= self.vertices.len() || target >= self.vertices.len() {
            return None;
        }

        let mut distance = vec![f64::INFINITY; self.vertices.len()];
        let mut previous: Vec<Option<&TransferEdge>> = vec![None; self.vertices.len()];
        let mut settled = vec![false; self.vertices.len()];
        let mut frontier = BinaryHeap::new();

        distance[source] = 0.0;
        frontier.push(Frontier {
            cost: 0.0,
            vertex: source,
        });

        while let Some(Frontier { cost, vertex }) = frontier.pop() {
            if settled[vertex] {
                continue;
            }
            settled[vertex] = true;
            if vertex == target {
                break;
            }

            for edge in self.edges_from(vertex) {
                if settled[edge.to] {
                    continue;
                }
                let candidate = cost + weight(edge);
                if candidate < distance[edge.to] {
                    distance[edge.to] = candidate;
                    previous[edge.to] = Some(edge);
                    frontier.push(Frontier {
                        cost: candidate,
                        vertex: edge.to,
                    });
                }
            }
        }

        if !distance[target].is_finite() {
            return None;
        }

        let mut path = Vec::new();
        let mut cursor = target;
        while let Some(edge) = previous[cursor] {
            path.push(edge);
            cursor = edge.from;
        }
        path.reverse();
        Some((path, distance[target]))
    }
}

/// Min-heap entry: lowest cost first, then lowest vertex index
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    vertex: usize,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

fn validate_weights(capabilities: &TransferCapabilities) -> TransferResult<()> {
    let overrides = capabilities
        .source_overrides
        .values()
        .chain(capabilities.target_overrides.values())
        .chain(capabilities.pair_overrides.values().flat_map(BTreeMap::values))
        .flatten();

    for template in capabilities.transfer_templates.iter().chain(overrides) {
        if !template.cost_weight.is_finite() || template.cost_weight < 0.0 {
            return Err(TransferError::InvalidWeight {
                node: template.node.clone(),
                action: template.action.clone(),
                weight: template.cost_weight,
            });
        }
    }
    Ok(())
}

/// Overrides may be keyed by location id or name; the id wins when both exist
fn lookup<'a, V>(map: &'a BTreeMap<String, V>, location: &Location) -> Option<&'a V> {
    map.get(&location.location_id)
        .or_else(|| map.get(&location.location_name))
}

fn cheapest<'a, I>(candidates: I) -> Option<&'a TransferTemplate>
where
    I: IntoIterator<Item = &'a TransferTemplate>,
{
    candidates.into_iter().fold(None, |best, template| match best {
        Some(current) if current.cost_weight <= template.cost_weight => Some(current),
        _ => Some(template),
    })
}

fn select_template<'a>(
    capabilities: &'a TransferCapabilities,
    source: &Location,
    target: &Location,
) -> Option<(&'a TransferTemplate, EdgeOrigin)> {
    let serves_both =
        |template: &&TransferTemplate| source.served_by(&template.node) && target.served_by(&template.node);

    if let Some(template) = lookup(&capabilities.pair_overrides, source)
        .and_then(|targets| lookup(targets, target))
        .and_then(|templates| cheapest(templates))
    {
        return Some((template, EdgeOrigin::PairOverride));
    }

    if let Some(template) = lookup(&capabilities.source_overrides, source)
        .and_then(|templates| cheapest(templates.iter().filter(serves_both)))
    {
        return Some((template, EdgeOrigin::SourceOverride));
    }

    if let Some(template) = lookup(&capabilities.target_overrides, target)
        .and_then(|templates| cheapest(templates.iter().filter(serves_both)))
    {
        return Some((template, EdgeOrigin::TargetOverride));
    }

    cheapest(capabilities.transfer_templates.iter().filter(serves_both))
        .map(|template| (template, EdgeOrigin::Template))
}
