use crate::core::models::candidate::CandidateSet;
use crate::core::models::grid::GlobalGrid;
use crate::core::models::ids::CandidateId;
use crate::core::models::raster::Baselines;
use crate::core::spatial::adjacency::AdjacencyGraph;
use crate::engine::composite::{Composite, CompositeEvaluator};
use crate::engine::config::SitingConfig;
use crate::engine::error::EngineError;
use crate::engine::objective::ObjectiveVector;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::store::LayerStore;
use nalgebra::Point2;
use std::collections::HashMap;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Everything an external optimizer needs to propose and score subsets.
///
/// Built once per run; every query afterwards is read-only.
#[derive(Debug)]
pub struct SitingProblem {
    candidates: CandidateSet,
    graph: AdjacencyGraph,
    store: LayerStore,
    grid: GlobalGrid,
    baselines: Baselines,
    config: SitingConfig,
}

impl SitingProblem {
    /// Builds the adjacency graph and checks that every candidate has all
    /// three layers and that the baselines match `grid`.
    #[instrument(skip_all, name = "siting_problem_setup")]
    pub fn new(
        candidates: CandidateSet,
        store: LayerStore,
        grid: GlobalGrid,
        baselines: Baselines,
        config: SitingConfig,
    ) -> Result<Self, EngineError> {
        baselines.validate_against(&grid)?;
        for id in candidates.ids() {
            store.layers(id)?;
        }
        let graph = AdjacencyGraph::build(&candidates)?;

        info!(
            candidates = candidates.len(),
            edges = graph.edge_count(),
            grid_width = grid.width(),
            grid_height = grid.height(),
            "Siting problem ready."
        );

        Ok(Self {
            candidates,
            graph,
            store,
            grid,
            baselines,
            config,
        })
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn grid(&self) -> &GlobalGrid {
        &self.grid
    }

    pub fn baselines(&self) -> &Baselines {
        &self.baselines
    }

    pub fn config(&self) -> &SitingConfig {
        &self.config
    }

    /// Candidates within the configured neighbourhood radius of `origin`.
    pub fn neighborhood(
        &self,
        origin: CandidateId,
    ) -> Result<HashMap<CandidateId, Point2<f64>>, EngineError> {
        Ok(self
            .graph
            .neighbors_within_radius(origin, self.config.neighborhood.multiplier)?)
    }

    fn evaluator(&self) -> Result<CompositeEvaluator<'_>, EngineError> {
        CompositeEvaluator::new(&self.store, &self.grid, &self.baselines)
    }

    pub fn evaluate(&self, subset: &[CandidateId]) -> Result<ObjectiveVector, EngineError> {
        self.evaluator()?.evaluate(subset)
    }

    pub fn composite(&self, subset: &[CandidateId]) -> Result<Composite, EngineError> {
        self.evaluator()?.composite(subset)
    }

    /// Scores one generation of subsets. Results follow the input order.
    #[instrument(skip_all, name = "evaluate_population", fields(population = subsets.len()))]
    pub fn evaluate_population(
        &self,
        subsets: &[Vec<CandidateId>],
        reporter: &ProgressReporter,
    ) -> Result<Vec<ObjectiveVector>, EngineError> {
        let evaluator = self.evaluator()?;

        reporter.phase("Evaluate", || {
            reporter.report(Progress::TaskStart {
                total_steps: subsets.len() as u64,
            });

            #[cfg(not(feature = "parallel"))]
            let iterator = subsets.iter().enumerate();

            #[cfg(feature = "parallel")]
            let iterator = subsets.par_iter().enumerate();

            let results = iterator
                .map(|(index, subset)| {
                    let objectives = evaluator.evaluate(subset)?;
                    reporter.report(Progress::SubsetEvaluated { index, objectives });
                    reporter.report(Progress::TaskIncrement);
                    Ok::<_, EngineError>(objectives)
                })
                .collect::<Result<Vec<_>, EngineError>>();

            reporter.report(Progress::TaskFinish);
            results
        })
    }
}
