use super::config::IngestConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::grid::{GlobalGrid, GridWindow, align_to_grid};
use crate::core::models::ids::{CandidateId, RasterId};
use crate::core::models::raster::{EffectRaster, Layer};
use nalgebra::Point2;
use ndarray::Array2;
use slotmap::SlotMap;
use std::collections::HashMap;
use tracing::{info, instrument, trace, warn};

/// Raw bands of one candidate as handed over by the loader.
///
/// All three bands share `top_left`, the planar coordinate of the outer
/// top-left corner of their first cell.
#[derive(Debug, Clone)]
pub struct CandidateBands {
    pub reduction: Array2<f32>,
    pub coverage: Array2<f32>,
    pub time: Array2<f32>,
    pub top_left: Point2<f64>,
}

impl CandidateBands {
    fn band(&self, layer: Layer) -> &Array2<f32> {
        match layer {
            Layer::Reduction => &self.reduction,
            Layer::Coverage => &self.coverage,
            Layer::Time => &self.time,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateLayers {
    pub reduction: Option<RasterId>,
    pub coverage: Option<RasterId>,
    pub time: Option<RasterId>,
}

impl CandidateLayers {
    pub fn get(&self, layer: Layer) -> Option<RasterId> {
        match layer {
            Layer::Reduction => self.reduction,
            Layer::Coverage => self.coverage,
            Layer::Time => self.time,
        }
    }

    fn slot_mut(&mut self, layer: Layer) -> &mut Option<RasterId> {
        match layer {
            Layer::Reduction => &mut self.reduction,
            Layer::Coverage => &mut self.coverage,
            Layer::Time => &mut self.time,
        }
    }
}

/// Owns every ingested effect raster, keyed by candidate and layer.
///
/// Rasters live in an arena; candidates refer to them by [`RasterId`]. The
/// store is only mutated during ingestion and is read-only afterwards, so a
/// shared reference can be handed to any number of evaluators.
#[derive(Debug, Default)]
pub struct LayerStore {
    rasters: SlotMap<RasterId, EffectRaster>,
    candidates: HashMap<CandidateId, CandidateLayers>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `raster` as the `layer` of `id`, replacing any previous one.
    pub fn insert(&mut self, id: CandidateId, layer: Layer, raster: EffectRaster) -> RasterId {
        let raster_id = self.rasters.insert(raster);
        let slot = self.candidates.entry(id).or_default().slot_mut(layer);
        if let Some(previous) = slot.replace(raster_id) {
            self.rasters.remove(previous);
        }
        raster_id
    }

    /// Aligns, rescales and stores all three bands of one candidate.
    ///
    /// A single alignment is derived from `top_left` and the reduction band's
    /// shape and applied to every band. Returns the window the candidate
    /// occupies on `grid`, which is empty if it misses the grid entirely.
    pub fn ingest_candidate(
        &mut self,
        id: CandidateId,
        bands: &CandidateBands,
        grid: &GlobalGrid,
        scales: &IngestConfig,
    ) -> Result<GridWindow, EngineError> {
        let (height, width) = bands.reduction.dim();
        let alignment = align_to_grid(bands.top_left, height, width, grid);
        if alignment.window.is_empty() {
            warn!(candidate = %id, "Candidate rasters lie entirely outside the global grid.");
        }

        let mut ingested = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            let raster =
                EffectRaster::ingest(bands.band(layer).view(), &alignment, scales.scale_for(layer))?;
            ingested.push((layer, raster));
        }
        for (layer, raster) in ingested {
            self.insert(id, layer, raster);
        }

        trace!(
            candidate = %id,
            row_off = alignment.window.row_off,
            col_off = alignment.window.col_off,
            height = alignment.window.height,
            width = alignment.window.width,
            "Candidate ingested."
        );
        Ok(alignment.window)
    }

    #[instrument(skip_all, name = "layer_store_ingest")]
    pub fn ingest_all<I>(
        &mut self,
        candidates: I,
        grid: &GlobalGrid,
        scales: &IngestConfig,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (CandidateId, CandidateBands)>,
        I::IntoIter: ExactSizeIterator,
    {
        let candidates = candidates.into_iter();
        let total = candidates.len();

        reporter.phase("Ingest", || {
            reporter.report(Progress::TaskStart {
                total_steps: total as u64,
            });
            for (id, bands) in candidates {
                let window = self.ingest_candidate(id, &bands, grid, scales)?;
                if window.is_empty() {
                    reporter.report(Progress::Message(format!(
                        "Candidate {id} lies outside the global grid and contributes nothing."
                    )));
                }
                reporter.report(Progress::CandidateIngested { id });
                reporter.report(Progress::TaskIncrement);
            }
            reporter.report(Progress::TaskFinish);
            Ok::<(), EngineError>(())
        })?;

        info!(
            candidates = self.len(),
            rasters = self.rasters.len(),
            "Layer store populated."
        );
        Ok(())
    }

    pub fn layer(&self, id: CandidateId, layer: Layer) -> Result<&EffectRaster, EngineError> {
        let entry = self
            .candidates
            .get(&id)
            .ok_or(EngineError::UnknownIdentifier(id))?;
        entry
            .get(layer)
            .and_then(|raster_id| self.rasters.get(raster_id))
            .ok_or(EngineError::MissingLayer { id, layer })
    }

    /// All three layers of `id` in [`Layer::ALL`] order.
    pub fn layers(&self, id: CandidateId) -> Result<[&EffectRaster; 3], EngineError> {
        Ok([
            self.layer(id, Layer::Reduction)?,
            self.layer(id, Layer::Coverage)?,
            self.layer(id, Layer::Time)?,
        ])
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        self.candidates.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.candidates.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::grid::GeoTransform;
    use crate::engine::config::SitingConfig;
    use ndarray::array;
    use std::sync::{Arc, Mutex};

    fn grid() -> GlobalGrid {
        GlobalGrid::new(4, 4, GeoTransform::new(0.0, 4.0, 1.0, -1.0)).unwrap()
    }

    fn unit_scales() -> IngestConfig {
        IngestConfig {
            reduction_scale: 1.0,
            coverage_scale: 1.0,
            time_scale: 1.0,
        }
    }

    fn bands(value: f32, top_left: (f64, f64)) -> CandidateBands {
        CandidateBands {
            reduction: Array2::from_elem((2, 2), value),
            coverage: Array2::from_elem((2, 2), value * 2.0),
            time: Array2::from_elem((2, 2), value * 3.0),
            top_left: Point2::new(top_left.0, top_left.1),
        }
    }

    #[test]
    fn ingest_places_all_layers_with_one_alignment() {
        let mut store = LayerStore::new();
        store
            .ingest_candidate(CandidateId(1), &bands(1.0, (1.0, 3.0)), &grid(), &unit_scales())
            .unwrap();

        let [reduction, coverage, time] = store.layers(CandidateId(1)).unwrap();
        for raster in [reduction, coverage, time] {
            assert_eq!(raster.window(), &GridWindow::new(1, 1, 2, 2));
        }
        assert_eq!(coverage.data(), Array2::from_elem((2, 2), 2.0f32));
        assert_eq!(time.data(), Array2::from_elem((2, 2), 3.0f32));
    }

    #[test]
    fn ingest_applies_configured_scales() {
        let mut store = LayerStore::new();
        let raw = CandidateBands {
            reduction: array![[2000.0, -500.0]],
            coverage: array![[0.5, 1.0]],
            time: array![[4000.0, f32::NAN]],
            top_left: Point2::new(0.0, 4.0),
        };
        store
            .ingest_candidate(CandidateId(7), &raw, &grid(), &SitingConfig::default().ingest)
            .unwrap();

        let reduction = store.layer(CandidateId(7), Layer::Reduction).unwrap();
        assert!((reduction.data()[[0, 0]] - 2.0).abs() < 1e-6);
        assert_eq!(reduction.data()[[0, 1]], 0.0);
        let time = store.layer(CandidateId(7), Layer::Time).unwrap();
        assert!((time.data()[[0, 0]] - 4.0).abs() < 1e-6);
        assert_eq!(time.data()[[0, 1]], 0.0);
        assert_eq!(
            store.layer(CandidateId(7), Layer::Coverage).unwrap().data()[[0, 1]],
            1.0
        );
    }

    #[test]
    fn raster_outside_grid_is_stored_empty() {
        let mut store = LayerStore::new();
        let window = store
            .ingest_candidate(CandidateId(2), &bands(1.0, (10.0, 3.0)), &grid(), &unit_scales())
            .unwrap();
        assert!(window.is_empty());
        let raster = store.layer(CandidateId(2), Layer::Reduction).unwrap();
        assert!(raster.is_empty());
        assert_eq!(raster.data().len(), 0);
    }

    #[test]
    fn unknown_candidate_and_missing_layer_are_distinguished() {
        let mut store = LayerStore::new();
        store.insert(
            CandidateId(3),
            Layer::Reduction,
            EffectRaster::new(Array2::ones((1, 1)), GridWindow::new(0, 0, 1, 1)).unwrap(),
        );

        assert!(matches!(
            store.layer(CandidateId(9), Layer::Reduction),
            Err(EngineError::UnknownIdentifier(CandidateId(9)))
        ));
        assert!(matches!(
            store.layers(CandidateId(3)),
            Err(EngineError::MissingLayer {
                id: CandidateId(3),
                layer: Layer::Coverage
            })
        ));
    }

    #[test]
    fn insert_replaces_previous_raster() {
        let mut store = LayerStore::new();
        let window = GridWindow::new(0, 0, 1, 1);
        store.insert(
            CandidateId(1),
            Layer::Time,
            EffectRaster::new(array![[1.0]], window).unwrap(),
        );
        store.insert(
            CandidateId(1),
            Layer::Time,
            EffectRaster::new(array![[5.0]], window).unwrap(),
        );

        assert_eq!(store.len(), 1);
        assert_eq!(store.rasters.len(), 1);
        assert_eq!(
            store.layer(CandidateId(1), Layer::Time).unwrap().data()[[0, 0]],
            5.0
        );
    }

    #[test]
    fn ingest_all_flags_candidates_outside_grid() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        let mut store = LayerStore::new();
        store
            .ingest_all(
                vec![
                    (CandidateId(1), bands(1.0, (0.0, 4.0))),
                    (CandidateId(2), bands(1.0, (40.0, 4.0))),
                ],
                &grid(),
                &unit_scales(),
                &reporter,
            )
            .unwrap();

        let messages: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Progress::Message(text) => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("#2"));
    }

    #[test]
    fn ingest_all_reports_progress() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        let mut store = LayerStore::new();
        store
            .ingest_all(
                vec![
                    (CandidateId(1), bands(1.0, (0.0, 4.0))),
                    (CandidateId(2), bands(2.0, (2.0, 2.0))),
                ],
                &grid(),
                &unit_scales(),
                &reporter,
            )
            .unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.contains(CandidateId(2)));
        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&Progress::PhaseStart { name: "Ingest" }));
        assert_eq!(events[1], Progress::TaskStart { total_steps: 2 });
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Progress::CandidateIngested { .. }))
                .count(),
            2
        );
        assert_eq!(events.last(), Some(&Progress::PhaseFinish));
    }
}
