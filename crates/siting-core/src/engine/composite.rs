use super::error::EngineError;
use super::objective::ObjectiveVector;
use super::store::LayerStore;
use crate::core::models::grid::GlobalGrid;
use crate::core::models::ids::CandidateId;
use crate::core::models::raster::{Baselines, EffectRaster, RasterError};
use ndarray::{Array2, ArrayView2, Zip, s};
use tracing::{debug, instrument, trace};

/// Global-grid accumulators left after max-compositing a subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    reduction: Array2<f32>,
    coverage: Array2<f32>,
}

/// Per-cell objective contributions of a [`Composite`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedComposite {
    pub reduction: Array2<f64>,
    pub coverage: Array2<f64>,
    pub fairness: Array2<f64>,
}

impl Composite {
    fn empty(shape: (usize, usize)) -> Self {
        Self {
            reduction: Array2::zeros(shape),
            coverage: Array2::zeros(shape),
        }
    }

    pub fn reduction(&self) -> ArrayView2<'_, f32> {
        self.reduction.view()
    }

    pub fn coverage(&self) -> ArrayView2<'_, f32> {
        self.coverage.view()
    }

    /// Reduces the accumulators against the baselines.
    ///
    /// Products are summed in `f64` in row-major order, so the result is
    /// reproducible for a given composite.
    pub fn objectives(&self, baselines: &Baselines) -> Result<ObjectiveVector, RasterError> {
        self.check_baselines(baselines)?;
        let population = baselines.population.data();
        let isolation = baselines.isolation.data();

        Ok(ObjectiveVector {
            reduction: weighted_sum(self.reduction.view(), population),
            coverage: weighted_sum(self.coverage.view(), population),
            fairness: weighted_sum(self.coverage.view(), isolation),
        })
    }

    pub fn weighted(&self, baselines: &Baselines) -> Result<WeightedComposite, RasterError> {
        self.check_baselines(baselines)?;
        let population = baselines.population.data();
        let isolation = baselines.isolation.data();

        Ok(WeightedComposite {
            reduction: weighted_cells(self.reduction.view(), population),
            coverage: weighted_cells(self.coverage.view(), population),
            fairness: weighted_cells(self.coverage.view(), isolation),
        })
    }

    fn check_baselines(&self, baselines: &Baselines) -> Result<(), RasterError> {
        let shape = self.reduction.dim();
        for (what, found) in [
            ("population baseline", baselines.population.shape()),
            ("isolation baseline", baselines.isolation.shape()),
        ] {
            if found != shape {
                return Err(RasterError::DimensionMismatch {
                    what,
                    expected: shape,
                    found,
                });
            }
        }
        Ok(())
    }

    fn blend(&mut self, reduction: &EffectRaster, coverage: &EffectRaster) {
        for (accumulator, raster) in [
            (&mut self.reduction, reduction),
            (&mut self.coverage, coverage),
        ] {
            let window = raster.window();
            if window.is_empty() {
                continue;
            }
            // Values are non-negative, so blending into the window alone
            // matches a max against a zero-filled full-grid placement.
            Zip::from(accumulator.slice_mut(s![window.row_range(), window.col_range()]))
                .and(raster.data())
                .for_each(|acc, &value| *acc = acc.max(value));
        }
    }
}

fn weighted_sum(values: ArrayView2<'_, f32>, weights: ArrayView2<'_, f32>) -> f64 {
    Zip::from(values)
        .and(weights)
        .fold(0.0f64, |sum, &v, &w| sum + v as f64 * w as f64)
}

fn weighted_cells(values: ArrayView2<'_, f32>, weights: ArrayView2<'_, f32>) -> Array2<f64> {
    Zip::from(values)
        .and(weights)
        .map_collect(|&v, &w| v as f64 * w as f64)
}

/// Scores candidate subsets against fixed baselines.
///
/// The evaluator only borrows its inputs and keeps no state between calls;
/// a shared reference may be used from several threads at once.
pub struct CompositeEvaluator<'a> {
    store: &'a LayerStore,
    grid: &'a GlobalGrid,
    baselines: &'a Baselines,
}

impl<'a> CompositeEvaluator<'a> {
    pub fn new(
        store: &'a LayerStore,
        grid: &'a GlobalGrid,
        baselines: &'a Baselines,
    ) -> Result<Self, EngineError> {
        baselines.validate_against(grid)?;
        Ok(Self {
            store,
            grid,
            baselines,
        })
    }

    /// Max-composites the reduction and coverage layers of `subset`.
    ///
    /// Every candidate must carry all three layers even though the time layer
    /// does not enter the composite. Order and repetition within `subset` do
    /// not affect the result.
    #[instrument(skip_all, name = "composite", fields(subset_size = subset.len()))]
    pub fn composite(&self, subset: &[CandidateId]) -> Result<Composite, EngineError> {
        let mut composite = Composite::empty(self.grid.shape());

        for &id in subset {
            let layers = self.store.layers(id)?;
            for raster in layers {
                if !raster.window().fits_within(self.grid) {
                    let window = raster.window();
                    return Err(RasterError::DimensionMismatch {
                        what: "effect raster window",
                        expected: self.grid.shape(),
                        found: (
                            window.row_off + window.height,
                            window.col_off + window.width,
                        ),
                    }
                    .into());
                }
            }
            let [reduction, coverage, _time] = layers;
            composite.blend(reduction, coverage);
            trace!(candidate = %id, "Candidate composited.");
        }

        Ok(composite)
    }

    /// Objective vector `(reduction, coverage, fairness)` of `subset`.
    ///
    /// An empty subset scores zero everywhere.
    pub fn evaluate(&self, subset: &[CandidateId]) -> Result<ObjectiveVector, EngineError> {
        if subset.is_empty() {
            return Ok(ObjectiveVector::default());
        }
        let objectives = self.composite(subset)?.objectives(self.baselines)?;
        debug!(
            subset_size = subset.len(),
            reduction = objectives.reduction,
            coverage = objectives.coverage,
            fairness = objectives.fairness,
            "Subset evaluated."
        );
        Ok(objectives)
    }

    pub fn grid(&self) -> &GlobalGrid {
        self.grid
    }

    pub fn baselines(&self) -> &Baselines {
        self.baselines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::grid::{GeoTransform, GridWindow};
    use crate::core::models::raster::Layer;
    use ndarray::array;

    fn grid(size: usize) -> GlobalGrid {
        GlobalGrid::new(size, size, GeoTransform::new(0.0, size as f64, 1.0, -1.0)).unwrap()
    }

    fn uniform_baselines(size: usize, isolation: Array2<f32>) -> Baselines {
        Baselines::ingest(Array2::ones((size, size)), isolation, &grid(size)).unwrap()
    }

    fn add_candidate(store: &mut LayerStore, id: u64, window: GridWindow, value: f32) {
        for layer in Layer::ALL {
            let data = Array2::from_elem(window.shape(), value);
            store.insert(
                CandidateId(id),
                layer,
                EffectRaster::new(data, window).unwrap(),
            );
        }
    }

    fn ids(raw: &[u64]) -> Vec<CandidateId> {
        raw.iter().copied().map(CandidateId).collect()
    }

    fn two_block_store() -> LayerStore {
        let mut store = LayerStore::new();
        add_candidate(&mut store, 1, GridWindow::new(0, 0, 2, 2), 3.0);
        add_candidate(&mut store, 2, GridWindow::new(3, 3, 2, 2), 3.0);
        store
    }

    mod evaluation {
        use super::*;

        #[test]
        fn empty_subset_scores_zero() {
            let store = two_block_store();
            let grid = grid(5);
            let baselines = uniform_baselines(5, Array2::ones((5, 5)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            assert_eq!(evaluator.evaluate(&[]).unwrap(), ObjectiveVector::default());
        }

        #[test]
        fn disjoint_blocks_add_up() {
            let store = two_block_store();
            let grid = grid(5);
            let baselines = uniform_baselines(5, Array2::ones((5, 5)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            assert_eq!(
                evaluator.evaluate(&ids(&[1, 2])).unwrap(),
                ObjectiveVector::new(24.0, 24.0, 24.0)
            );
            assert_eq!(
                evaluator.evaluate(&ids(&[1])).unwrap(),
                ObjectiveVector::new(12.0, 12.0, 12.0)
            );
            assert_eq!(
                evaluator.evaluate(&ids(&[2])).unwrap(),
                ObjectiveVector::new(12.0, 12.0, 12.0)
            );
        }

        #[test]
        fn overlap_keeps_the_maximum() {
            let mut store = LayerStore::new();
            add_candidate(&mut store, 1, GridWindow::new(0, 0, 1, 1), 5.0);
            add_candidate(&mut store, 2, GridWindow::new(0, 0, 1, 1), 8.0);
            let grid = grid(2);
            let baselines = uniform_baselines(2, Array2::ones((2, 2)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            let objectives = evaluator.evaluate(&ids(&[1, 2])).unwrap();
            assert_eq!(objectives.reduction, 8.0);
            assert_eq!(objectives.coverage, 8.0);
        }

        #[test]
        fn order_and_duplicates_do_not_matter() {
            let mut store = two_block_store();
            add_candidate(&mut store, 3, GridWindow::new(1, 1, 3, 3), 2.0);
            let grid = grid(5);
            let baselines = uniform_baselines(5, Array2::from_elem((5, 5), 0.5));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            let forward = evaluator.evaluate(&ids(&[1, 2, 3])).unwrap();
            assert_eq!(evaluator.evaluate(&ids(&[3, 2, 1])).unwrap(), forward);
            assert_eq!(evaluator.evaluate(&ids(&[1, 3, 1, 2, 3])).unwrap(), forward);
        }

        #[test]
        fn fairness_weights_coverage_by_isolation() {
            let store = two_block_store();
            let grid = grid(5);
            let mut isolation = Array2::zeros((5, 5));
            isolation[[0, 0]] = 2.0;
            isolation[[4, 4]] = 10.0;
            let baselines = uniform_baselines(5, isolation);
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            let objectives = evaluator.evaluate(&ids(&[1, 2])).unwrap();
            assert_eq!(objectives.coverage, 24.0);
            assert_eq!(objectives.fairness, 3.0 * 2.0 + 3.0 * 10.0);
        }

        #[test]
        fn clipped_raster_contributes_only_inside_grid() {
            let grid = grid(5);
            let raw = Array2::from_elem((2, 4), 1.0f32);
            let alignment =
                crate::core::models::grid::align_to_grid(nalgebra::Point2::new(3.0, 5.0), 2, 4, &grid);
            let mut store = LayerStore::new();
            for layer in Layer::ALL {
                store.insert(
                    CandidateId(1),
                    layer,
                    EffectRaster::ingest(raw.view(), &alignment, 1.0).unwrap(),
                );
            }
            let baselines = uniform_baselines(5, Array2::ones((5, 5)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            assert_eq!(evaluator.evaluate(&ids(&[1])).unwrap().reduction, 4.0);
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn unknown_candidate_is_reported() {
            let store = two_block_store();
            let grid = grid(5);
            let baselines = uniform_baselines(5, Array2::ones((5, 5)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            assert!(matches!(
                evaluator.evaluate(&ids(&[1, 42])),
                Err(EngineError::UnknownIdentifier(CandidateId(42)))
            ));
        }

        #[test]
        fn missing_time_layer_is_reported() {
            let mut store = LayerStore::new();
            let window = GridWindow::new(0, 0, 1, 1);
            for layer in [Layer::Reduction, Layer::Coverage] {
                store.insert(
                    CandidateId(1),
                    layer,
                    EffectRaster::new(array![[1.0]], window).unwrap(),
                );
            }
            let grid = grid(2);
            let baselines = uniform_baselines(2, Array2::ones((2, 2)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            assert!(matches!(
                evaluator.evaluate(&ids(&[1])),
                Err(EngineError::MissingLayer {
                    layer: Layer::Time,
                    ..
                })
            ));
        }

        #[test]
        fn window_past_grid_edge_is_rejected() {
            let mut store = LayerStore::new();
            add_candidate(&mut store, 1, GridWindow::new(1, 1, 2, 2), 1.0);
            let grid = grid(2);
            let baselines = uniform_baselines(2, Array2::ones((2, 2)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            assert!(matches!(
                evaluator.evaluate(&ids(&[1])),
                Err(EngineError::Raster {
                    source: RasterError::DimensionMismatch { .. }
                })
            ));
        }

        #[test]
        fn baselines_must_match_grid() {
            let store = LayerStore::new();
            let baselines = uniform_baselines(3, Array2::ones((3, 3)));
            let grid = grid(4);
            assert!(matches!(
                CompositeEvaluator::new(&store, &grid, &baselines),
                Err(EngineError::Raster { .. })
            ));
        }
    }

    mod composite_output {
        use super::*;

        #[test]
        fn composite_exposes_accumulators() {
            let store = two_block_store();
            let grid = grid(5);
            let baselines = uniform_baselines(5, Array2::ones((5, 5)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            let composite = evaluator.composite(&ids(&[1])).unwrap();
            assert_eq!(composite.reduction()[[0, 0]], 3.0);
            assert_eq!(composite.reduction()[[4, 4]], 0.0);
            assert_eq!(composite.coverage().sum(), 12.0);
        }

        #[test]
        fn weighted_cells_sum_to_objectives() {
            let store = two_block_store();
            let grid = grid(5);
            let mut isolation = Array2::from_elem((5, 5), 0.25);
            isolation[[3, 3]] = 4.0;
            let baselines = uniform_baselines(5, isolation);
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();

            let composite = evaluator.composite(&ids(&[1, 2])).unwrap();
            let weighted = composite.weighted(&baselines).unwrap();
            let objectives = composite.objectives(&baselines).unwrap();

            assert_eq!(weighted.reduction.sum(), objectives.reduction);
            assert_eq!(weighted.coverage.sum(), objectives.coverage);
            assert_eq!(weighted.fairness.sum(), objectives.fairness);
            assert_eq!(weighted.fairness[[3, 3]], 12.0);
        }

        #[test]
        fn objectives_reject_foreign_baselines() {
            let store = two_block_store();
            let grid = grid(5);
            let baselines = uniform_baselines(5, Array2::ones((5, 5)));
            let evaluator = CompositeEvaluator::new(&store, &grid, &baselines).unwrap();
            let composite = evaluator.composite(&ids(&[1])).unwrap();

            let other = uniform_baselines(3, Array2::ones((3, 3)));
            assert!(composite.objectives(&other).is_err());
        }
    }
}
