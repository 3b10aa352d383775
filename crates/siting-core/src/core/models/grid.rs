use super::raster::RasterError;
use nalgebra::Point2;
use std::ops::Range;
use tracing::debug;

const OFFSET_SNAP_TOLERANCE: f64 = 1e-6;

/// North-up affine mapping from grid cells to planar coordinates.
///
/// `origin_x`/`origin_y` locate the outer top-left corner of cell `(0, 0)`.
/// `pixel_height` follows the GDAL convention and is negative for rasters whose
/// rows run from north to south. Rotation terms are not supported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Builds a transform from the first six GDAL geotransform coefficients
    /// laid out as `[a, b, c, d, e, f]` (rasterio's `Affine` ordering).
    pub fn from_affine(coefficients: [f64; 6]) -> Result<Self, RasterError> {
        let [a, b, c, d, e, f] = coefficients;
        if b != 0.0 || d != 0.0 {
            return Err(RasterError::InvalidGrid(format!(
                "rotated transforms are not supported (b = {b}, d = {d})"
            )));
        }
        Ok(Self::new(c, f, a, e))
    }

    /// Planar coordinate of the centre of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> Point2<f64> {
        Point2::new(
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    fn validate(&self) -> Result<(), RasterError> {
        let values = [
            self.origin_x,
            self.origin_y,
            self.pixel_width,
            self.pixel_height,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RasterError::InvalidGrid(
                "transform coefficients must be finite".to_string(),
            ));
        }
        if self.pixel_width <= 0.0 {
            return Err(RasterError::InvalidGrid(format!(
                "pixel width must be positive, got {}",
                self.pixel_width
            )));
        }
        if self.pixel_height == 0.0 {
            return Err(RasterError::InvalidGrid(
                "pixel height must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The single raster coordinate system every effect and baseline raster is
/// aligned into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalGrid {
    width: usize,
    height: usize,
    transform: GeoTransform,
}

impl GlobalGrid {
    pub fn new(width: usize, height: usize, transform: GeoTransform) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidGrid(format!(
                "grid must have at least one cell, got {width}x{height}"
            )));
        }
        transform.validate()?;
        Ok(Self {
            width,
            height,
            transform,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(rows, cols)`, the ndarray shape of a raster covering the whole grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Point2<f64> {
        self.transform.cell_center(row, col)
    }

    /// The cell containing `point`, or `None` if it lies outside the grid.
    pub fn cell_at(&self, point: &Point2<f64>) -> Option<(usize, usize)> {
        let col = ((point.x - self.transform.origin_x) / self.transform.pixel_width).floor();
        let row = ((point.y - self.transform.origin_y) / self.transform.pixel_height).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }
}

/// A rectangular block of global-grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridWindow {
    pub row_off: usize,
    pub col_off: usize,
    pub height: usize,
    pub width: usize,
}

impl GridWindow {
    pub fn new(row_off: usize, col_off: usize, height: usize, width: usize) -> Self {
        Self {
            row_off,
            col_off,
            height,
            width,
        }
    }

    pub fn row_range(&self) -> Range<usize> {
        self.row_off..self.row_off + self.height
    }

    pub fn col_range(&self) -> Range<usize> {
        self.col_off..self.col_off + self.width
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    pub fn fits_within(&self, grid: &GlobalGrid) -> bool {
        self.row_off + self.height <= grid.height() && self.col_off + self.width <= grid.width()
    }
}

/// Where a source raster lands on the global grid after clipping.
///
/// `source_row`/`source_col` give the first source cell that survived the
/// clip; they are non-zero only when the raster hangs off the top or left
/// edge of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alignment {
    pub window: GridWindow,
    pub source_row: usize,
    pub source_col: usize,
}

/// Computes the clipped placement of a `height` x `width` raster whose outer
/// top-left corner sits at `top_left` in planar coordinates.
///
/// Offsets are the coordinate delta divided by the cell size, truncated toward
/// zero. Anything outside `[0, width) x [0, height)` of the grid is dropped
/// silently; a raster that misses the grid entirely yields an empty window.
pub fn align_to_grid(
    top_left: Point2<f64>,
    height: usize,
    width: usize,
    grid: &GlobalGrid,
) -> Alignment {
    let transform = grid.transform();
    let col_start = cell_offset(top_left.x - transform.origin_x, transform.pixel_width);
    let row_start = cell_offset(top_left.y - transform.origin_y, transform.pixel_height);

    let (col_off, clipped_width, source_col) = clip_axis(col_start, width, grid.width());
    let (row_off, clipped_height, source_row) = clip_axis(row_start, height, grid.height());

    if clipped_width != width || clipped_height != height {
        debug!(
            row_start,
            col_start,
            height,
            width,
            clipped_height,
            clipped_width,
            "Raster window truncated to global grid bounds."
        );
    }

    Alignment {
        window: GridWindow::new(row_off, col_off, clipped_height, clipped_width),
        source_row,
        source_col,
    }
}

fn cell_offset(delta: f64, cell_size: f64) -> i64 {
    let cells = delta / cell_size;
    let nearest = cells.round();
    if (cells - nearest).abs() < OFFSET_SNAP_TOLERANCE {
        nearest as i64
    } else {
        cells.trunc() as i64
    }
}

/// Returns `(offset, length, source_skip)` of `[start, start + len)` clipped
/// to `[0, limit)`.
fn clip_axis(start: i64, len: usize, limit: usize) -> (usize, usize, usize) {
    let stop = start.saturating_add(len as i64);
    let clipped_start = start.clamp(0, limit as i64);
    let clipped_stop = stop.clamp(0, limit as i64);
    if clipped_stop <= clipped_start {
        return (clipped_start as usize, 0, 0);
    }
    let skip = (clipped_start - start) as usize;
    (
        clipped_start as usize,
        (clipped_stop - clipped_start) as usize,
        skip,
    )
}
