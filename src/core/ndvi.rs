use crate::core::classify::classify_exact;
use crate::types::{Dimension, NdviError, NdviGrid, NdviResult, NdviValue, RasterGrid, Reflectance};
use ndarray::{Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

/// Index formula as surfaced to consumers
pub const NDVI_FORMULA: &str = "NDVI = (NIR - Red) / (NIR + Red)";

/// NDVI computation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NdviParams {
    /// Rows per processing tile
    pub tile_rows: usize,
}

impl Default for NdviParams {
    fn default() -> Self {
        Self { tile_rows: 512 }
    }
}

/// Normalized difference of one NIR/Red sample pair.
///
/// Returns [`NdviGrid::INVALID`] for a zero denominator and for any result
/// outside `[-1, 1]`; out-of-range values are never clamped. The stored
/// `f32` always falls in the same category as the unnarrowed value.
#[inline]
pub fn normalized_difference(nir: Reflectance, red: Reflectance) -> NdviValue {
    let nir = nir as f64;
    let red = red as f64;

    let denominator = nir + red;
    if denominator == 0.0 {
        return NdviGrid::INVALID;
    }

    let value = (nir - red) / denominator;
    if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
        return NdviGrid::INVALID;
    }
    narrow(value)
}

/// Narrow to `f32`, stepping one ulp back toward `value` when rounding
/// carried it across a category bound
fn narrow(value: f64) -> NdviValue {
    let narrowed = value as NdviValue;
    if classify_exact(narrowed as f64) == classify_exact(value) {
        return narrowed;
    }
    if (narrowed as f64) > value {
        next_down(narrowed)
    } else {
        next_up(narrowed)
    }
}

fn next_up(x: f32) -> f32 {
    if x == 0.0 {
        f32::from_bits(1)
    } else if x > 0.0 {
        f32::from_bits(x.to_bits() + 1)
    } else {
        f32::from_bits(x.to_bits() - 1)
    }
}

fn next_down(x: f32) -> f32 {
    if x == 0.0 {
        f32::from_bits(0x8000_0001)
    } else if x > 0.0 {
        f32::from_bits(x.to_bits() - 1)
    } else {
        f32::from_bits(x.to_bits() + 1)
    }
}

/// Per-pixel NDVI computer.
///
/// The map is pixel-independent, so the grid is split into row tiles that
/// are processed in parallel. Inputs are only read.
pub struct NdviComputer {
    params: NdviParams,
}

impl NdviComputer {
    pub fn new(params: NdviParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(NdviParams::default())
    }

    /// Compute NDVI for an aligned Red/NIR pair
    pub fn compute(&self, red: &RasterGrid, nir: &RasterGrid) -> NdviResult<NdviGrid> {
        if red.shape() != nir.shape() {
            let dimension = if red.width() != nir.width() {
                Dimension::Width
            } else {
                Dimension::Height
            };
            return Err(NdviError::Alignment {
                dimension,
                red: red.shape(),
                nir: nir.shape(),
            });
        }

        let (width, height) = red.shape();
        let tile_rows = self.params.tile_rows.max(1);
        log::info!(
            "Computing NDVI for {}x{} pixels ({} rows per tile)",
            width,
            height,
            tile_rows
        );
        let start_time = std::time::Instant::now();

        let mut values = Array2::<NdviValue>::from_elem((height, width), NdviGrid::INVALID);

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            values
                .axis_chunks_iter_mut(Axis(0), tile_rows)
                .into_par_iter()
                .enumerate()
                .for_each(|(tile_idx, mut tile)| {
                    let start_row = tile_idx * tile_rows;
                    for (local_row, out_row) in tile.axis_iter_mut(Axis(0)).enumerate() {
                        compute_row(red, nir, start_row + local_row, out_row);
                    }
                });
        }

        #[cfg(not(feature = "parallel"))]
        {
            for (row, out_row) in values.axis_iter_mut(Axis(0)).enumerate() {
                compute_row(red, nir, row, out_row);
            }
        }

        let ndvi = NdviGrid::from_array(values);
        log::info!(
            "NDVI computed in {:?}: {} of {} pixels valid",
            start_time.elapsed(),
            ndvi.valid_count(),
            red.pixel_count()
        );
        Ok(ndvi)
    }
}

fn compute_row(red: &RasterGrid, nir: &RasterGrid, row: usize, mut out: ArrayViewMut1<NdviValue>) {
    let red_row = red.data().row(row);
    let nir_row = nir.data().row(row);

    for ((cell, &r), &n) in out.iter_mut().zip(red_row.iter()).zip(nir_row.iter()) {
        *cell = if red.is_nodata(r) || nir.is_nodata(n) {
            NdviGrid::INVALID
        } else {
            normalized_difference(n, r)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grids(red: &[Vec<f32>], nir: &[Vec<f32>], nodata: Option<f32>) -> (RasterGrid, RasterGrid) {
        (
            RasterGrid::from_rows(red, nodata).unwrap(),
            RasterGrid::from_rows(nir, nodata).unwrap(),
        )
    }

    #[test]
    fn test_reference_grid() {
        let (red, nir) = grids(
            &[vec![100.0, 50.0], vec![0.0, 100.0]],
            &[vec![200.0, 50.0], vec![0.0, 0.0]],
            Some(0.0),
        );
        let ndvi = NdviComputer::standard().compute(&red, &nir).unwrap();

        assert_relative_eq!(ndvi.get(0, 0).unwrap(), 1.0 / 3.0, epsilon = 1e-6);
        assert_eq!(ndvi.get(1, 0), Some(0.0));
        assert_eq!(ndvi.get(0, 1), None);
        assert_eq!(ndvi.get(1, 1), None);
        assert_eq!(ndvi.valid_count(), 2);
    }

    #[test]
    fn test_zero_denominator_without_nodata_marker() {
        let (red, nir) = grids(&[vec![0.0, 100.0]], &[vec![0.0, 0.0]], None);
        let ndvi = NdviComputer::standard().compute(&red, &nir).unwrap();

        assert_eq!(ndvi.get(0, 0), None);
        assert_eq!(ndvi.get(1, 0), Some(-1.0));
    }

    #[test]
    fn test_equal_bands_give_exact_zero() {
        for value in [1.0f32, 37.5, 1234.0, 65534.0] {
            assert_eq!(normalized_difference(value, value), 0.0);
        }
    }

    #[test]
    fn test_out_of_range_is_invalid_not_clamped() {
        // Malformed negative reflectance pushes the ratio past 1
        let value = normalized_difference(100.0, -50.0);
        assert!(value.is_nan());
        let value = normalized_difference(-10.0, 5.0);
        assert!(value.is_nan());
    }

    #[test]
    fn test_narrowing_keeps_category() {
        use crate::core::classify::classify_value;
        use crate::types::Category;

        // Exact ratio is 0.39999999403..., nearest f32 is 0.4
        let value = normalized_difference(716.0282, 306.86923);
        assert!(value < 0.4);
        assert_eq!(classify_value(value), Some(Category::Sparse));

        // Underflow to -0.0 would land in Very Sparse
        let value = narrow(-1.0e-50);
        assert!(value < 0.0);
        assert_eq!(classify_value(value), Some(Category::NoVegetation));

        assert_eq!(narrow(0.5), 0.5);
    }

    #[test]
    fn test_values_stay_in_range() {
        let samples = [1.0f32, 2.0, 10.0, 333.0, 4096.0, 10000.0, 65535.0];
        for &nir in &samples {
            for &red in &samples {
                let value = normalized_difference(nir, red);
                assert!((-1.0..=1.0).contains(&value), "{} out of range", value);
            }
        }
    }

    #[test]
    fn test_tile_height_does_not_change_result() {
        let red: Vec<Vec<f32>> = (0..37)
            .map(|r| (0..23).map(|c| ((r * 31 + c * 7) % 97) as f32).collect())
            .collect();
        let nir: Vec<Vec<f32>> = (0..37)
            .map(|r| (0..23).map(|c| ((r * 13 + c * 29) % 89) as f32).collect())
            .collect();
        let (red, nir) = grids(&red, &nir, Some(0.0));

        let single = NdviComputer::new(NdviParams { tile_rows: 1 }).compute(&red, &nir).unwrap();
        let whole = NdviComputer::new(NdviParams { tile_rows: 1000 }).compute(&red, &nir).unwrap();
        let odd = NdviComputer::new(NdviParams { tile_rows: 5 }).compute(&red, &nir).unwrap();

        for ((a, b), c) in single.values().iter().zip(whole.values()).zip(odd.values()) {
            assert_eq!(a.to_bits(), b.to_bits());
            assert_eq!(a.to_bits(), c.to_bits());
        }
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let (red, _) = grids(&[vec![1.0, 2.0]], &[vec![1.0, 2.0]], None);
        let nir = RasterGrid::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], None).unwrap();
        let err = NdviComputer::standard().compute(&red, &nir).unwrap_err();
        assert!(matches!(
            err,
            NdviError::Alignment {
                dimension: Dimension::Height,
                ..
            }
        ));
    }
}
