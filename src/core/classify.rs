use crate::types::{Category, ClassificationGrid, NdviGrid, NdviValue, CATEGORY_TABLE};
use ndarray::Zip;

/// Map one NDVI value to its category.
///
/// Ranges are half-open `[lower, upper)` except Dense, which includes 1.0.
/// Invalid (`NaN`) or out-of-domain values yield `None`.
#[inline]
pub fn classify_value(value: NdviValue) -> Option<Category> {
    classify_exact(value as f64)
}

/// [`classify_value`] for an NDVI value that has not been narrowed to `f32`
#[inline]
pub fn classify_exact(value: f64) -> Option<Category> {
    CATEGORY_TABLE
        .iter()
        .map(|info| info.category)
        .find(|category| category.contains_exact(value))
}

/// Labels every NDVI cell with its vegetation category
pub struct Classifier;

impl Classifier {
    /// Classify a whole grid; invalid cells stay invalid
    pub fn classify(ndvi: &NdviGrid) -> ClassificationGrid {
        log::debug!("Classifying {}x{} NDVI grid", ndvi.width(), ndvi.height());

        #[cfg(feature = "parallel")]
        let classes = Zip::from(ndvi.values()).par_map_collect(|&value| classify_value(value));

        #[cfg(not(feature = "parallel"))]
        let classes = Zip::from(ndvi.values()).map_collect(|&value| classify_value(value));

        ClassificationGrid::from_array(classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_boundaries_are_exact() {
        assert_eq!(classify_value(1.0), Some(Category::Dense));
        assert_eq!(classify_value(0.6), Some(Category::Dense));
        assert_eq!(classify_value(0.59999), Some(Category::Moderate));
        assert_eq!(classify_value(0.4), Some(Category::Moderate));
        assert_eq!(classify_value(0.39999), Some(Category::Sparse));
        assert_eq!(classify_value(0.2), Some(Category::Sparse));
        assert_eq!(classify_value(0.19999), Some(Category::VerySparse));
        assert_eq!(classify_value(0.0), Some(Category::VerySparse));
        assert_eq!(classify_value(-0.0001), Some(Category::NoVegetation));
        assert_eq!(classify_value(-1.0), Some(Category::NoVegetation));
    }

    #[test]
    fn test_invalid_is_never_bucketed() {
        assert_eq!(classify_value(f32::NAN), None);
        assert_eq!(classify_value(1.0001), None);
        assert_eq!(classify_value(-1.0001), None);
    }

    #[test]
    fn test_stored_values_agree_with_decimal_bounds() {
        // Nearest f32 to each bound sits at or above it
        assert_eq!(classify_exact(0.3999999940331108), Some(Category::Sparse));
        assert_eq!(classify_value(0.39999998), Some(Category::Sparse));
        assert_eq!(classify_exact(-1e-12), Some(Category::NoVegetation));
        assert_eq!(classify_value(-0.0), Some(Category::VerySparse));
    }

    #[test]
    fn test_classify_grid() {
        let ndvi = NdviGrid::from_array(array![[0.75, 0.5, f32::NAN], [0.3, 0.1, -0.4]]);
        let classes = Classifier::classify(&ndvi);

        assert_eq!(classes.get(0, 0), Some(Category::Dense));
        assert_eq!(classes.get(1, 0), Some(Category::Moderate));
        assert_eq!(classes.get(2, 0), None);
        assert_eq!(classes.get(0, 1), Some(Category::Sparse));
        assert_eq!(classes.get(1, 1), Some(Category::VerySparse));
        assert_eq!(classes.get(2, 1), Some(Category::NoVegetation));
        assert_eq!(classes.counts(), [1, 1, 1, 1, 1]);
    }
}
