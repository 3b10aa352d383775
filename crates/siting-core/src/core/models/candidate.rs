use super::ids::CandidateId;
use nalgebra::Point2;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CandidateError {
    #[error("Candidate {0} appears more than once in the point set")]
    DuplicateIdentifier(CandidateId),

    #[error("Candidate {id} has a non-finite coordinate ({x}, {y})")]
    InvalidCoordinate { id: CandidateId, x: f64, y: f64 },
}

/// A potential facility site at a fixed planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub coordinate: Point2<f64>,
}

impl Candidate {
    pub fn new(id: CandidateId, x: f64, y: f64) -> Self {
        Self {
            id,
            coordinate: Point2::new(x, y),
        }
    }
}

/// An ordered, duplicate-free collection of candidates.
///
/// Insertion order is preserved and is the ordering every downstream structure
/// (notably the adjacency graph) is derived from, so two sets built from the
/// same sequence always produce identical results.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    index: HashMap<CandidateId, usize>,
}

impl CandidateSet {
    /// Builds a set from candidates in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError::DuplicateIdentifier`] if an id occurs twice and
    /// [`CandidateError::InvalidCoordinate`] for NaN or infinite coordinates.
    pub fn new(candidates: impl IntoIterator<Item = Candidate>) -> Result<Self, CandidateError> {
        let candidates: Vec<Candidate> = candidates.into_iter().collect();
        let mut index = HashMap::with_capacity(candidates.len());

        for (position, candidate) in candidates.iter().enumerate() {
            let Candidate { id, coordinate } = *candidate;
            if !coordinate.x.is_finite() || !coordinate.y.is_finite() {
                return Err(CandidateError::InvalidCoordinate {
                    id,
                    x: coordinate.x,
                    y: coordinate.y,
                });
            }
            if index.insert(id, position).is_some() {
                return Err(CandidateError::DuplicateIdentifier(id));
            }
        }

        Ok(Self { candidates, index })
    }

    /// Convenience constructor from `(id, x, y)` triples.
    pub fn from_coordinates(
        points: impl IntoIterator<Item = (CandidateId, f64, f64)>,
    ) -> Result<Self, CandidateError> {
        Self::new(
            points
                .into_iter()
                .map(|(id, x, y)| Candidate::new(id, x, y)),
        )
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: CandidateId) -> Option<&Candidate> {
        self.index.get(&id).map(|&position| &self.candidates[position])
    }

    pub fn coordinate(&self, id: CandidateId) -> Option<Point2<f64>> {
        self.get(id).map(|candidate| candidate.coordinate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.candidates.iter().map(|candidate| candidate.id)
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}
