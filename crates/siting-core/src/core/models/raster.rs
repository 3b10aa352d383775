use super::grid::{Alignment, GlobalGrid, GridWindow};
use ndarray::{Array2, ArrayView2, s};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RasterError {
    #[error("Dimension mismatch for {what}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid global grid: {0}")]
    InvalidGrid(String),
}

/// The three pre-simulated effect layers carried by every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    Reduction,
    Coverage,
    Time,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Reduction, Layer::Coverage, Layer::Time];

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Reduction => "reduction",
            Layer::Coverage => "coverage",
            Layer::Time => "time",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// One candidate's effect layer, already placed on the global grid.
///
/// `data` covers exactly `window`; every cell is finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRaster {
    data: Array2<f32>,
    window: GridWindow,
}

impl EffectRaster {
    /// Wraps already-placed data, clamping negative and non-finite cells to zero.
    pub fn new(mut data: Array2<f32>, window: GridWindow) -> Result<Self, RasterError> {
        if data.dim() != window.shape() {
            return Err(RasterError::DimensionMismatch {
                what: "effect raster window",
                expected: window.shape(),
                found: data.dim(),
            });
        }
        data.mapv_inplace(sanitize);
        Ok(Self { data, window })
    }

    /// Crops `raw` to the aligned window, rescales it by `scale` and clamps
    /// the result to non-negative values.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::DimensionMismatch`] if `raw` does not reach the
    /// extent the alignment expects to read from it.
    pub fn ingest(
        raw: ArrayView2<'_, f32>,
        alignment: &Alignment,
        scale: f32,
    ) -> Result<Self, RasterError> {
        let window = alignment.window;
        let row_end = alignment.source_row + window.height;
        let col_end = alignment.source_col + window.width;
        let (raw_rows, raw_cols) = raw.dim();
        if row_end > raw_rows || col_end > raw_cols {
            return Err(RasterError::DimensionMismatch {
                what: "source raster",
                expected: (row_end, col_end),
                found: raw.dim(),
            });
        }

        let data = raw
            .slice(s![alignment.source_row..row_end, alignment.source_col..col_end])
            .mapv(|value| sanitize(value * scale));
        Ok(Self { data, window })
    }

    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn window(&self) -> &GridWindow {
        &self.window
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// A dense weight grid matching the global grid exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineRaster {
    data: Array2<f32>,
}

impl BaselineRaster {
    /// Validates the shape against `grid` and normalises NaN, infinite and
    /// negative cells to zero.
    pub fn ingest(mut raw: Array2<f32>, grid: &GlobalGrid) -> Result<Self, RasterError> {
        if raw.dim() != grid.shape() {
            return Err(RasterError::DimensionMismatch {
                what: "baseline raster",
                expected: grid.shape(),
                found: raw.dim(),
            });
        }
        raw.mapv_inplace(sanitize);
        Ok(Self { data: raw })
    }

    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Population and isolation weights the composite is reduced against.
#[derive(Debug, Clone, PartialEq)]
pub struct Baselines {
    pub population: BaselineRaster,
    pub isolation: BaselineRaster,
}

impl Baselines {
    pub fn new(population: BaselineRaster, isolation: BaselineRaster) -> Self {
        Self {
            population,
            isolation,
        }
    }

    pub fn ingest(
        population: Array2<f32>,
        isolation: Array2<f32>,
        grid: &GlobalGrid,
    ) -> Result<Self, RasterError> {
        Ok(Self {
            population: BaselineRaster::ingest(population, grid)?,
            isolation: BaselineRaster::ingest(isolation, grid)?,
        })
    }

    /// Checks both rasters still match `grid`.
    pub fn validate_against(&self, grid: &GlobalGrid) -> Result<(), RasterError> {
        for (what, raster) in [
            ("population baseline", &self.population),
            ("isolation baseline", &self.isolation),
        ] {
            if raster.shape() != grid.shape() {
                return Err(RasterError::DimensionMismatch {
                    what,
                    expected: grid.shape(),
                    found: raster.shape(),
                });
            }
        }
        Ok(())
    }
}
