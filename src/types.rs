use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Reflectance sample as decoded from a band (DN or scaled reflectance)
pub type Reflectance = f32;

/// NDVI cell value; `NaN` marks an invalid cell
pub type NdviValue = f32;

/// Spectral band role in the index computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandKind {
    /// Red reflectance (Sentinel-2 B04)
    Red,
    /// Near-infrared reflectance (Sentinel-2 B08)
    Nir,
}

impl std::fmt::Display for BandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandKind::Red => write!(f, "RED"),
            BandKind::Nir => write!(f, "NIR"),
        }
    }
}

/// Grid axis reported by alignment failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Width,
    Height,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Width => write!(f, "width"),
            Dimension::Height => write!(f, "height"),
        }
    }
}

/// Single-band reflectance raster.
///
/// Samples are stored row-major in an `(height, width)` array. The grid is
/// immutable once built; per-pixel validity is derived from the no-data
/// marker (non-finite samples are always no-data).
#[derive(Debug, Clone)]
pub struct RasterGrid {
    data: Array2<Reflectance>,
    nodata: Option<Reflectance>,
}

impl RasterGrid {
    /// Wrap a decoded sample array
    pub fn new(data: Array2<Reflectance>, nodata: Option<Reflectance>) -> NdviResult<Self> {
        let (height, width) = data.dim();
        if width == 0 || height == 0 {
            return Err(NdviError::InvalidGrid(format!(
                "grid must have non-zero dimensions, got {}x{}",
                width, height
            )));
        }
        Ok(Self { data, nodata })
    }

    /// Build a grid from nested rows; every row must have the same length
    pub fn from_rows(rows: &[Vec<Reflectance>], nodata: Option<Reflectance>) -> NdviResult<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);

        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(NdviError::InvalidGrid(format!(
                "row {} has {} samples, expected {}",
                idx,
                row.len(),
                width
            )));
        }

        let flat: Vec<Reflectance> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let data = Array2::from_shape_vec((height, width), flat)
            .map_err(|e| NdviError::InvalidGrid(format!("shape error: {}", e)))?;
        Self::new(data, nodata)
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// `(width, height)`
    pub fn shape(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }

    pub fn nodata(&self) -> Option<Reflectance> {
        self.nodata
    }

    pub fn data(&self) -> &Array2<Reflectance> {
        &self.data
    }

    /// Whether a sample of this grid is missing data
    #[inline]
    pub fn is_nodata(&self, value: Reflectance) -> bool {
        !value.is_finite() || self.nodata.map_or(false, |nd| value == nd)
    }

    /// Sample at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<Reflectance> {
        self.data.get([y, x]).copied()
    }

    /// Largest valid sample, if any
    pub fn valid_max(&self) -> Option<Reflectance> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_nodata(v))
            .fold(None, |acc: Option<Reflectance>, v| Some(acc.map_or(v, |m| m.max(v))))
    }
}

/// Per-pixel NDVI values, same shape as the source bands.
#[derive(Debug, Clone)]
pub struct NdviGrid {
    values: Array2<NdviValue>,
}

impl NdviGrid {
    /// Sentinel stored for invalid cells
    pub const INVALID: NdviValue = f32::NAN;

    pub(crate) fn from_array(values: Array2<NdviValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &Array2<NdviValue> {
        &self.values
    }

    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// NDVI at column `x`, row `y`; `None` when out of bounds or invalid
    pub fn get(&self, x: usize, y: usize) -> Option<NdviValue> {
        self.values.get([y, x]).copied().filter(|v| !v.is_nan())
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Vegetation class over the NDVI domain, ordered from densest to barest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Category {
    Dense = 0,
    Moderate = 1,
    Sparse = 2,
    VerySparse = 3,
    NoVegetation = 4,
}

/// Static description of one category: NDVI range and display color
#[derive(Debug, Clone, Copy)]
pub struct CategoryInfo {
    pub category: Category,
    pub label: &'static str,
    pub key: &'static str,
    /// Inclusive lower bound
    pub lower: f64,
    /// Upper bound, exclusive unless `upper_inclusive`
    pub upper: f64,
    pub upper_inclusive: bool,
    pub color: [u8; 3],
}

/// The one category table shared by classification, rendering and the legend.
pub static CATEGORY_TABLE: [CategoryInfo; 5] = [
    CategoryInfo {
        category: Category::Dense,
        label: "Dense/Healthy",
        key: "dense",
        lower: 0.6,
        upper: 1.0,
        upper_inclusive: true,
        color: [0x22, 0x8B, 0x22],
    },
    CategoryInfo {
        category: Category::Moderate,
        label: "Moderate",
        key: "moderate",
        lower: 0.4,
        upper: 0.6,
        upper_inclusive: false,
        color: [0xAD, 0xFF, 0x2F],
    },
    CategoryInfo {
        category: Category::Sparse,
        label: "Sparse/Stressed",
        key: "sparse",
        lower: 0.2,
        upper: 0.4,
        upper_inclusive: false,
        color: [0xFF, 0xD7, 0x00],
    },
    CategoryInfo {
        category: Category::VerySparse,
        label: "Very Sparse",
        key: "very_sparse",
        lower: 0.0,
        upper: 0.2,
        upper_inclusive: false,
        color: [0xFF, 0x45, 0x00],
    },
    CategoryInfo {
        category: Category::NoVegetation,
        label: "No Vegetation",
        key: "no_vegetation",
        lower: -1.0,
        upper: 0.0,
        upper_inclusive: false,
        color: [0x8B, 0x00, 0x00],
    },
];

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Dense,
        Category::Moderate,
        Category::Sparse,
        Category::VerySparse,
        Category::NoVegetation,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static CategoryInfo {
        &CATEGORY_TABLE[self.index()]
    }

    pub fn label(self) -> &'static str {
        self.info().label
    }

    pub fn color(self) -> [u8; 3] {
        self.info().color
    }

    /// Whether `value` falls inside this category's range
    #[inline]
    pub fn contains(self, value: NdviValue) -> bool {
        self.contains_exact(value as f64)
    }

    /// Range test against the decimal bounds, for unnarrowed NDVI values
    #[inline]
    pub fn contains_exact(self, value: f64) -> bool {
        let info = self.info();
        value >= info.lower
            && (value < info.upper || (info.upper_inclusive && value <= info.upper))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-pixel category labels; `None` marks an invalid cell.
#[derive(Debug, Clone)]
pub struct ClassificationGrid {
    classes: Array2<Option<Category>>,
}

impl ClassificationGrid {
    pub(crate) fn from_array(classes: Array2<Option<Category>>) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &Array2<Option<Category>> {
        &self.classes
    }

    pub fn width(&self) -> usize {
        self.classes.ncols()
    }

    pub fn height(&self) -> usize {
        self.classes.nrows()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Category> {
        self.classes.get([y, x]).copied().flatten()
    }

    /// Pixel count per category, indexed by `Category::index`
    pub fn counts(&self) -> [usize; 5] {
        let mut counts = [0usize; 5];
        for class in self.classes.iter().flatten() {
            counts[class.index()] += 1;
        }
        counts
    }
}

/// Error types for NDVI processing
#[derive(Debug, thiserror::Error)]
pub enum NdviError {
    #[error("Error reading {band} band: {reason}")]
    Decode { band: BandKind, reason: String },

    #[error(
        "Band dimension mismatch ({dimension}): RED {}x{} vs NIR {}x{}",
        .red.0, .red.1, .nir.0, .nir.1
    )]
    Alignment {
        dimension: Dimension,
        /// `(width, height)` of the red band
        red: (usize, usize),
        /// `(width, height)` of the NIR band
        nir: (usize, usize),
    },

    #[error(
        "Band value ranges are incompatible: RED max {red_max} vs NIR max {nir_max} (ratio {ratio:.1} > {limit})"
    )]
    ScaleMismatch {
        red_max: f32,
        nir_max: f32,
        ratio: f32,
        limit: f32,
    },

    #[error(
        "{band} band has {pixels} pixels, exceeding the limit of {limit}; downsample the input"
    )]
    ResourceLimit {
        band: BandKind,
        pixels: usize,
        limit: usize,
    },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Rendering error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NdviError {
    /// True when the failure was caused by the submitted bands rather than
    /// by the processor itself
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            NdviError::Decode { .. }
                | NdviError::Alignment { .. }
                | NdviError::ScaleMismatch { .. }
                | NdviError::ResourceLimit { .. }
                | NdviError::InvalidGrid(_)
        )
    }

    /// Short machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            NdviError::Decode { .. } => "decode",
            NdviError::Alignment { .. } | NdviError::ScaleMismatch { .. } => "alignment",
            NdviError::ResourceLimit { .. } => "resource_limit",
            NdviError::InvalidGrid(_) => "invalid_grid",
            NdviError::Render(_) => "render",
            NdviError::Io(_) => "io",
            NdviError::Serialization(_) => "serialization",
        }
    }
}

/// Result type for NDVI operations
pub type NdviResult<T> = Result<T, NdviError>;
