use crate::core::models::candidate::CandidateSet;
use crate::core::models::ids::CandidateId;
use crate::core::utils::geometry::{
    circumcenter, find_duplicate_coordinates, min_distance, planar_distance,
};
use itertools::Itertools;
use nalgebra::Point2;
use spade::{DelaunayTriangulation, HasPosition, Triangulation};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Minimum number of distinct sites for a non-degenerate tessellation.
pub const MIN_DISTINCT_SITES: usize = 4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("Planar tessellation needs at least 4 distinct points, got {distinct}")]
    DegenerateInput { distinct: usize },

    #[error("Candidate {0} is not a node of the adjacency graph")]
    UnknownIdentifier(CandidateId),

    #[error("Neighbourhood multiplier must be finite and positive, got {0}")]
    InvalidMultiplier(f64),

    #[error("Candidate {0} has no tessellation neighbours to derive a radius from")]
    NoDirectNeighbors(CandidateId),

    #[error("Triangulation failed: {0}")]
    Triangulation(String),
}

/// Relative tolerance, against the length of the Delaunay edge, below which
/// its dual Voronoi ridge counts as a single point.
const RIDGE_LENGTH_TOLERANCE: f64 = 1e-9;

/// A ridge shared by two inner triangles with (nearly) the same circumcentre
/// has zero length: the four sites are cocircular and their cells only touch
/// at a corner. Hull edges border a single triangle and always have a ridge.
fn is_point_ridge(ends: Option<&[Point2<f64>]>, edge_length: f64) -> bool {
    match ends {
        Some([first, second]) => {
            planar_distance(first, second) <= RIDGE_LENGTH_TOLERANCE * edge_length
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
struct Site {
    position: spade::Point2<f64>,
    node: usize,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> spade::Point2<f64> {
        self.position
    }
}

/// Natural-neighbour graph over candidate sites.
///
/// Two candidates are adjacent iff their Voronoi cells share a border of
/// positive length. Every such pair is joined by a Delaunay edge; Delaunay
/// edges between cocircular sites whose cells only meet at a corner are
/// dropped.
///
/// Every candidate is a node; candidates stacked on the coordinate of an
/// earlier candidate own no cell and are kept as zero-degree nodes.
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    ids: Vec<CandidateId>,
    coordinates: Vec<Point2<f64>>,
    index: HashMap<CandidateId, usize>,
    adjacency: Vec<Vec<usize>>,
    edge_count: usize,
}

impl AdjacencyGraph {
    /// Builds the graph from the Delaunay triangulation of `points`.
    ///
    /// # Errors
    ///
    /// [`GraphError::DegenerateInput`] if fewer than four distinct coordinates
    /// are present.
    #[instrument(skip_all, name = "adjacency_build", fields(points = points.len()))]
    pub fn build(points: &CandidateSet) -> Result<Self, GraphError> {
        let ids: Vec<CandidateId> = points.ids().collect();
        let coordinates: Vec<Point2<f64>> = points.iter().map(|c| c.coordinate).collect();

        let duplicates = find_duplicate_coordinates(&coordinates);
        let distinct = coordinates.len() - duplicates.len();
        if distinct < MIN_DISTINCT_SITES {
            return Err(GraphError::DegenerateInput { distinct });
        }
        for (&duplicate, &first) in duplicates.iter().sorted() {
            warn!(
                candidate = %ids[duplicate],
                shares_with = %ids[first],
                "Candidate shares its coordinate with an earlier site; it will have no neighbours."
            );
        }

        let sites: Vec<Site> = coordinates
            .iter()
            .enumerate()
            .filter(|(node, _)| !duplicates.contains_key(node))
            .map(|(node, p)| Site {
                position: spade::Point2::new(p.x, p.y),
                node,
            })
            .collect();

        let triangulation: DelaunayTriangulation<Site> =
            DelaunayTriangulation::bulk_load(sites)
                .map_err(|e| GraphError::Triangulation(format!("{e:?}")))?;

        // Circumcentres of the inner triangles on either side of each edge.
        // They are the endpoints of the dual Voronoi ridge.
        let mut ridge_ends: HashMap<(usize, usize), Vec<Point2<f64>>> = HashMap::new();
        for face in triangulation.inner_faces() {
            let [a, b, c] = face.vertices().map(|v| v.data().node);
            let Some(center) =
                circumcenter(&coordinates[a], &coordinates[b], &coordinates[c])
            else {
                continue;
            };
            for (p, q) in [(a, b), (b, c), (c, a)] {
                ridge_ends
                    .entry((p.min(q), p.max(q)))
                    .or_default()
                    .push(center);
            }
        }

        let delaunay_edges: Vec<(usize, usize)> = triangulation
            .undirected_edges()
            .map(|edge| {
                let [a, b] = edge.vertices();
                let (a, b) = (a.data().node, b.data().node);
                (a.min(b), a.max(b))
            })
            .filter(|(a, b)| a != b)
            .sorted()
            .dedup()
            .collect();

        let (edges, touching): (Vec<_>, Vec<_>) =
            delaunay_edges.into_iter().partition(|&(a, b)| {
                !is_point_ridge(
                    ridge_ends.get(&(a, b)).map(Vec::as_slice),
                    planar_distance(&coordinates[a], &coordinates[b]),
                )
            });
        if !touching.is_empty() {
            debug!(
                dropped = touching.len(),
                "Dropped Delaunay edges between cells that meet only at a point."
            );
        }

        let graph = Self::from_parts(ids, coordinates, &edges);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Adjacency graph built."
        );
        Ok(graph)
    }

    fn from_parts(
        ids: Vec<CandidateId>,
        coordinates: Vec<Point2<f64>>,
        edges: &[(usize, usize)],
    ) -> Self {
        let index = ids
            .iter()
            .enumerate()
            .map(|(node, &id)| (id, node))
            .collect();
        let mut adjacency = vec![Vec::new(); ids.len()];
        for &(a, b) in edges {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
            neighbors.dedup();
        }
        let edge_count = adjacency.iter().map(Vec::len).sum::<usize>() / 2;

        Self {
            ids,
            coordinates,
            index,
            adjacency,
            edge_count,
        }
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.index.contains_key(&id)
    }

    /// Node ids in input order.
    pub fn ids(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.ids.iter().copied()
    }

    pub fn coordinate(&self, id: CandidateId) -> Result<Point2<f64>, GraphError> {
        self.node(id).map(|node| self.coordinates[node])
    }

    pub fn neighbors(
        &self,
        id: CandidateId,
    ) -> Result<impl Iterator<Item = CandidateId> + '_, GraphError> {
        let node = self.node(id)?;
        Ok(self.adjacency[node].iter().map(|&n| self.ids[n]))
    }

    pub fn degree(&self, id: CandidateId) -> Result<usize, GraphError> {
        self.node(id).map(|node| self.adjacency[node].len())
    }

    /// Every edge exactly once, as `(lower node, higher node)` in input order.
    pub fn edges(&self) -> impl Iterator<Item = (CandidateId, CandidateId)> + '_ {
        self.adjacency.iter().enumerate().flat_map(move |(a, neighbors)| {
            neighbors
                .iter()
                .filter(move |&&b| a < b)
                .map(move |&b| (self.ids[a], self.ids[b]))
        })
    }

    /// `multiplier` times the distance from `origin` to its nearest direct
    /// neighbour.
    pub fn neighborhood_threshold(
        &self,
        origin: CandidateId,
        multiplier: f64,
    ) -> Result<f64, GraphError> {
        let node = self.node(origin)?;
        self.threshold_for(node, multiplier)
    }

    /// All candidates reachable from `origin` without leaving a disc centred
    /// on `origin`.
    ///
    /// The radius is `multiplier` times the distance from `origin` to its
    /// nearest direct neighbour. It is computed once, before the traversal,
    /// and never recomputed at later hops, so dense regions get a tight disc
    /// and sparse regions a loose one.
    ///
    /// **Traversal rule.** This is a breadth-first walk with a visited set and
    /// a FIFO queue in which a node is admitted, and later expanded, only if
    /// its straight-line distance *from `origin`* is within the radius. It is
    /// not a shortest-path or hop-limited search, and the distance is never
    /// measured from the node the walk arrived through. A node outside the
    /// disc is not expanded, so sites behind it are found only if another
    /// chain of in-disc nodes leads to them. Each node is examined once.
    ///
    /// The result maps every admitted neighbour to its coordinate and never
    /// contains `origin` itself.
    ///
    /// # Errors
    ///
    /// - [`GraphError::UnknownIdentifier`] if `origin` is not a node.
    /// - [`GraphError::InvalidMultiplier`] if `multiplier` is not finite and positive.
    /// - [`GraphError::NoDirectNeighbors`] if `origin` has degree zero.
    pub fn neighbors_within_radius(
        &self,
        origin: CandidateId,
        multiplier: f64,
    ) -> Result<HashMap<CandidateId, Point2<f64>>, GraphError> {
        let start = self.node(origin)?;
        let threshold = self.threshold_for(start, multiplier)?;
        let center = self.coordinates[start];

        let mut visited = vec![false; self.node_count()];
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut admitted = HashMap::new();

        while let Some(current) = queue.pop_front() {
            for &next in &self.adjacency[current] {
                if visited[next] {
                    continue;
                }
                // Whether `next` is in the disc does not depend on the path to
                // it, so a rejected node can be marked too.
                visited[next] = true;
                if planar_distance(&center, &self.coordinates[next]) <= threshold {
                    admitted.insert(self.ids[next], self.coordinates[next]);
                    queue.push_back(next);
                }
            }
        }

        debug!(
            origin = %origin,
            threshold,
            admitted = admitted.len(),
            "Radius-bounded neighbourhood expanded."
        );
        Ok(admitted)
    }

    fn node(&self, id: CandidateId) -> Result<usize, GraphError> {
        self.index
            .get(&id)
            .copied()
            .ok_or(GraphError::UnknownIdentifier(id))
    }

    fn threshold_for(&self, node: usize, multiplier: f64) -> Result<f64, GraphError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(GraphError::InvalidMultiplier(multiplier));
        }
        let center = self.coordinates[node];
        let nearest = min_distance(
            &center,
            self.adjacency[node].iter().map(|&n| &self.coordinates[n]),
        )
        .ok_or(GraphError::NoDirectNeighbors(self.ids[node]))?;
        Ok(multiplier * nearest)
    }
}
