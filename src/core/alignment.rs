use crate::types::{Dimension, NdviError, NdviResult, RasterGrid};
use serde::{Deserialize, Serialize};

/// Band alignment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    /// Largest tolerated ratio between the bands' maximum valid samples.
    /// `None` disables the value-range check.
    pub max_scale_ratio: Option<f32>,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            max_scale_ratio: Some(1000.0),
        }
    }
}

/// Gate ensuring a Red/NIR pair is comparable pixel-for-pixel.
///
/// Mismatches are fatal: the bands are never cropped or resampled to fit.
pub struct AlignmentValidator {
    params: AlignmentParams,
}

impl AlignmentValidator {
    pub fn new(params: AlignmentParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(AlignmentParams::default())
    }

    /// Validate the pair and hand both grids back unchanged
    pub fn validate(&self, red: RasterGrid, nir: RasterGrid) -> NdviResult<(RasterGrid, RasterGrid)> {
        self.check(&red, &nir)?;
        Ok((red, nir))
    }

    /// Validate without taking ownership
    pub fn check(&self, red: &RasterGrid, nir: &RasterGrid) -> NdviResult<()> {
        log::debug!(
            "Validating band alignment: RED {}x{}, NIR {}x{}",
            red.width(),
            red.height(),
            nir.width(),
            nir.height()
        );

        let dimension = if red.width() != nir.width() {
            Some(Dimension::Width)
        } else if red.height() != nir.height() {
            Some(Dimension::Height)
        } else {
            None
        };

        if let Some(dimension) = dimension {
            log::warn!(
                "Rejecting band pair: {} mismatch (RED {:?} vs NIR {:?})",
                dimension,
                red.shape(),
                nir.shape()
            );
            return Err(NdviError::Alignment {
                dimension,
                red: red.shape(),
                nir: nir.shape(),
            });
        }

        if let Some(limit) = self.params.max_scale_ratio {
            self.check_value_ranges(red, nir, limit)?;
        }

        Ok(())
    }

    fn check_value_ranges(&self, red: &RasterGrid, nir: &RasterGrid, limit: f32) -> NdviResult<()> {
        let (red_max, nir_max) = match (red.valid_max(), nir.valid_max()) {
            (Some(r), Some(n)) if r > 0.0 && n > 0.0 => (r, n),
            // Nothing to compare; such pixels end up invalid anyway
            _ => return Ok(()),
        };

        let ratio = red_max.max(nir_max) / red_max.min(nir_max);
        log::debug!(
            "Band value ranges: RED max {}, NIR max {}, ratio {:.2}",
            red_max,
            nir_max,
            ratio
        );

        if ratio > limit {
            return Err(NdviError::ScaleMismatch {
                red_max,
                nir_max,
                ratio,
                limit,
            });
        }
        Ok(())
    }
}
