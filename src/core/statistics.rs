use crate::types::{Category, ClassificationGrid, NdviError, NdviGrid, NdviResult};
use serde::{Deserialize, Serialize};

/// Rounding applied to reported statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsParams {
    /// Decimal places for percentages
    pub percent_decimals: u32,
    /// Decimal places for mean/std/min/max NDVI
    pub ndvi_decimals: u32,
}

impl Default for StatisticsParams {
    fn default() -> Self {
        Self {
            percent_decimals: 2,
            ndvi_decimals: 3,
        }
    }
}

/// Round to `decimals` places, ties away from zero. Never returns `-0.0`.
pub fn round_half_away(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor + 0.0
}

/// `count / total` as a percentage rounded to `decimals` places.
///
/// Rounds in integer arithmetic so exact ties (29 of 800 is 3.625%) go up.
pub fn percent_of(count: usize, total: usize, decimals: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let exact = 10u128
        .checked_pow(decimals + 2)
        .and_then(|scale| (count as u128).checked_mul(2 * scale))
        .map(|scaled| (scaled + total as u128) / (2 * total as u128));

    match exact {
        Some(units) => units as f64 / 10f64.powi(decimals as i32),
        None => round_half_away(count as f64 * 100.0 / total as f64, decimals),
    }
}

/// Share of valid pixels falling in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: Category,
    pub label: String,
    pub pixels: usize,
    pub percent: f64,
}

/// Aggregate vegetation statistics over the valid pixels of one computation.
///
/// The four bucket fields collapse the five categories as
/// healthy = Dense, moderate = Moderate, stressed = Sparse/Stressed and
/// bare land = Very Sparse + No Vegetation; `categories` keeps the full
/// five-way split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub healthy_vegetation_percent: f64,
    pub moderate_vegetation_percent: f64,
    pub stressed_vegetation_percent: f64,
    pub bare_land_percent: f64,
    pub mean_ndvi: f64,
    pub std_ndvi: f64,
    pub min_ndvi: f64,
    pub max_ndvi: f64,
    pub total_valid_pixels: usize,
    pub total_pixels: usize,
    pub categories: Vec<CategoryShare>,
}

impl StatisticsSummary {
    /// Percentage of valid pixels in `category`
    pub fn percent(&self, category: Category) -> f64 {
        self.categories
            .iter()
            .find(|share| share.category == category)
            .map_or(0.0, |share| share.percent)
    }

    pub fn has_valid_pixels(&self) -> bool {
        self.total_valid_pixels > 0
    }
}

#[derive(Debug, Clone, Copy)]
struct RowTally {
    counts: [usize; 5],
    valid: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for RowTally {
    fn default() -> Self {
        Self {
            counts: [0; 5],
            valid: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl RowTally {
    fn merge(mut self, other: &RowTally) -> RowTally {
        for (total, count) in self.counts.iter_mut().zip(other.counts.iter()) {
            *total += count;
        }
        self.valid += other.valid;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self
    }
}

/// Evaluate `f` for every row and return the results in row order.
/// Reducing the returned vector sequentially keeps float sums deterministic.
fn per_row<T, F>(height: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..height).into_par_iter().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..height).map(f).collect()
    }
}

/// Reduces classification and NDVI grids to a [`StatisticsSummary`]
pub struct StatisticsAggregator {
    params: StatisticsParams,
}

impl StatisticsAggregator {
    pub fn new(params: StatisticsParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(StatisticsParams::default())
    }

    /// Aggregate over valid pixels only.
    ///
    /// With zero valid pixels every percentage and NDVI aggregate is `0`.
    pub fn aggregate(
        &self,
        classes: &ClassificationGrid,
        ndvi: &NdviGrid,
    ) -> NdviResult<StatisticsSummary> {
        if classes.width() != ndvi.width() || classes.height() != ndvi.height() {
            return Err(NdviError::InvalidGrid(format!(
                "classification grid {}x{} does not match NDVI grid {}x{}",
                classes.width(),
                classes.height(),
                ndvi.width(),
                ndvi.height()
            )));
        }

        let height = ndvi.height();
        let total_pixels = ndvi.values().len();
        let class_rows = classes.classes();
        let values = ndvi.values();

        let tallies = per_row(height, |row| {
            let mut tally = RowTally::default();
            for (class, &value) in class_rows.row(row).iter().zip(values.row(row).iter()) {
                if let Some(category) = class {
                    tally.counts[category.index()] += 1;
                }
                if !value.is_nan() {
                    let v = value as f64;
                    tally.valid += 1;
                    tally.sum += v;
                    tally.min = tally.min.min(v);
                    tally.max = tally.max.max(v);
                }
            }
            tally
        });
        let total = tallies.iter().fold(RowTally::default(), |acc, t| acc.merge(t));

        let classified: usize = total.counts.iter().sum();
        if classified != total.valid {
            return Err(NdviError::InvalidGrid(format!(
                "{} classified pixels but {} valid NDVI values",
                classified, total.valid
            )));
        }

        if total.valid == 0 {
            log::warn!("No valid NDVI pixels in {} total; reporting zeroed statistics", total_pixels);
            return Ok(self.zeroed(total_pixels));
        }

        let valid = total.valid as f64;
        let mean = total.sum / valid;

        let squared_deviations = per_row(height, |row| {
            values
                .row(row)
                .iter()
                .filter(|v| !v.is_nan())
                .map(|&v| {
                    let d = v as f64 - mean;
                    d * d
                })
                .sum::<f64>()
        });
        let variance = squared_deviations.iter().sum::<f64>() / valid;

        let pct = |count: usize| percent_of(count, total.valid, self.params.percent_decimals);
        let ndvi_round = |v: f64| round_half_away(v, self.params.ndvi_decimals);

        let count_of = |category: Category| total.counts[category.index()];
        let categories = Category::ALL
            .iter()
            .map(|&category| CategoryShare {
                category,
                label: category.label().to_string(),
                pixels: count_of(category),
                percent: pct(count_of(category)),
            })
            .collect();

        let summary = StatisticsSummary {
            healthy_vegetation_percent: pct(count_of(Category::Dense)),
            moderate_vegetation_percent: pct(count_of(Category::Moderate)),
            stressed_vegetation_percent: pct(count_of(Category::Sparse)),
            bare_land_percent: pct(count_of(Category::VerySparse) + count_of(Category::NoVegetation)),
            mean_ndvi: ndvi_round(mean),
            std_ndvi: ndvi_round(variance.sqrt()),
            min_ndvi: ndvi_round(total.min),
            max_ndvi: ndvi_round(total.max),
            total_valid_pixels: total.valid,
            total_pixels,
            categories,
        };

        log::info!(
            "NDVI statistics: {} valid of {} pixels, mean {:.3}, healthy {:.2}%, bare {:.2}%",
            summary.total_valid_pixels,
            summary.total_pixels,
            summary.mean_ndvi,
            summary.healthy_vegetation_percent,
            summary.bare_land_percent
        );
        Ok(summary)
    }

    fn zeroed(&self, total_pixels: usize) -> StatisticsSummary {
        StatisticsSummary {
            healthy_vegetation_percent: 0.0,
            moderate_vegetation_percent: 0.0,
            stressed_vegetation_percent: 0.0,
            bare_land_percent: 0.0,
            mean_ndvi: 0.0,
            std_ndvi: 0.0,
            min_ndvi: 0.0,
            max_ndvi: 0.0,
            total_valid_pixels: 0,
            total_pixels,
            categories: Category::ALL
                .iter()
                .map(|&category| CategoryShare {
                    category,
                    label: category.label().to_string(),
                    pixels: 0,
                    percent: 0.0,
                })
                .collect(),
        }
    }
}
