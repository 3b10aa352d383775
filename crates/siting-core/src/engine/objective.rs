use serde::Serialize;

/// Scalar objectives of one candidate subset, all to be maximised.
///
/// - `reduction`: composited reduction effect weighted by population.
/// - `coverage`: composited coverage weighted by population.
/// - `fairness`: composited coverage weighted by isolation.
///
/// Vectors of different subsets are not additive; compositing takes the
/// cell-wise maximum, so only [`CompositeEvaluator`](super::composite::CompositeEvaluator)
/// can combine candidates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ObjectiveVector {
    pub reduction: f64,
    pub coverage: f64,
    pub fairness: f64,
}

impl ObjectiveVector {
    pub fn new(reduction: f64, coverage: f64, fairness: f64) -> Self {
        Self {
            reduction,
            coverage,
            fairness,
        }
    }

    #[inline]
    pub fn as_array(&self) -> [f64; 3] {
        [self.reduction, self.coverage, self.fairness]
    }
}

impl From<ObjectiveVector> for (f64, f64, f64) {
    fn from(v: ObjectiveVector) -> Self {
        (v.reduction, v.coverage, v.fairness)
    }
}

impl From<ObjectiveVector> for [f64; 3] {
    fn from(v: ObjectiveVector) -> Self {
        v.as_array()
    }
}
