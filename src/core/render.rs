//! False-color rendering of NDVI grids.
//!
//! Colors come from the shared category table, so the legend, the image
//! and the statistics always agree on what each class looks like.

use crate::core::classify::classify_value;
use crate::types::{
    Category, ClassificationGrid, NdviError, NdviGrid, NdviResult, NdviValue, CATEGORY_TABLE,
};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

/// How valid pixels are colored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Flat category colors
    Classified,
    /// Category colors as evenly spaced stops over [-1, 1], interpolated
    Gradient,
}

/// Rendering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    pub mode: RenderMode,
    /// RGBA for invalid pixels. Default: fully transparent.
    pub background: [u8; 4],
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            mode: RenderMode::Classified,
            background: [0, 0, 0, 0],
        }
    }
}

/// Encoded NDVI map, one pixel per grid cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl RenderedImage {
    pub const CONTENT_TYPE: &'static str = "image/png";

    pub fn bytes(&self) -> &[u8] {
        &self.png
    }
}

/// One legend row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub category: Category,
    pub label: String,
    pub range: String,
    pub color: String,
}

/// `#RRGGBB`
pub fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Legend derived from the category table, densest class first
pub fn legend() -> Vec<LegendEntry> {
    CATEGORY_TABLE
        .iter()
        .map(|info| {
            let close = if info.upper_inclusive { ']' } else { ')' };
            LegendEntry {
                category: info.category,
                label: info.label.to_string(),
                range: format!("[{:.1}, {:.1}{}", info.lower, info.upper, close),
                color: hex_color(info.color),
            }
        })
        .collect()
}

fn lerp_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

/// Continuous color for an NDVI value in [-1, 1]
pub fn gradient_color(value: NdviValue) -> [u8; 3] {
    // Stops run from No Vegetation at -1 to Dense at +1
    let stops = CATEGORY_TABLE.len() - 1;
    let t = ((value.clamp(-1.0, 1.0) + 1.0) / 2.0) * stops as f32;
    let lower = (t.floor() as usize).min(stops - 1);
    let frac = t - lower as f32;

    let from = CATEGORY_TABLE[stops - lower].color;
    let to = CATEGORY_TABLE[stops - lower - 1].color;
    lerp_color(from, to, frac)
}

/// Maps NDVI grids to RGBA pixels and encodes them as PNG
pub struct ColorRenderer {
    params: RenderParams,
}

impl ColorRenderer {
    pub fn new(params: RenderParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(RenderParams::default())
    }

    /// Render, classifying each pixel on the fly
    pub fn render(&self, ndvi: &NdviGrid) -> NdviResult<RenderedImage> {
        log::info!("Rendering {}x{} NDVI map ({:?})", ndvi.width(), ndvi.height(), self.params.mode);
        let rgba = self.fill(ndvi, |_, _, value| self.color_for(value, classify_value(value)));
        self.encode(ndvi.width(), ndvi.height(), &rgba)
    }

    /// Render reusing an existing classification of `ndvi`
    pub fn render_classified(
        &self,
        ndvi: &NdviGrid,
        classes: &ClassificationGrid,
    ) -> NdviResult<RenderedImage> {
        if classes.width() != ndvi.width() || classes.height() != ndvi.height() {
            return Err(NdviError::InvalidGrid(format!(
                "classification grid {}x{} does not match NDVI grid {}x{}",
                classes.width(),
                classes.height(),
                ndvi.width(),
                ndvi.height()
            )));
        }

        log::info!("Rendering {}x{} NDVI map ({:?})", ndvi.width(), ndvi.height(), self.params.mode);
        let class_array = classes.classes();
        let rgba = self.fill(ndvi, |row, col, value| self.color_for(value, class_array[[row, col]]));
        self.encode(ndvi.width(), ndvi.height(), &rgba)
    }

    /// `None` means the pixel is invalid and gets the background
    fn color_for(&self, value: NdviValue, class: Option<Category>) -> Option<[u8; 3]> {
        match self.params.mode {
            RenderMode::Classified => class.map(Category::color),
            RenderMode::Gradient => class.map(|_| gradient_color(value)),
        }
    }

    /// Row-major RGBA buffer; rows are filled independently
    fn fill<F>(&self, ndvi: &NdviGrid, color: F) -> Vec<u8>
    where
        F: Fn(usize, usize, NdviValue) -> Option<[u8; 3]> + Sync,
    {
        let width = ndvi.width();
        let values = ndvi.values();
        let background = self.params.background;
        let mut rgba = vec![0u8; values.len() * 4];

        let fill_row = |row: usize, out: &mut [u8]| {
            for (col, (pixel, &value)) in out.chunks_exact_mut(4).zip(values.row(row).iter()).enumerate() {
                match color(row, col, value) {
                    Some([r, g, b]) => pixel.copy_from_slice(&[r, g, b, 255]),
                    None => pixel.copy_from_slice(&background),
                }
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            rgba.par_chunks_mut(width * 4)
                .enumerate()
                .for_each(|(row, out)| fill_row(row, out));
        }

        #[cfg(not(feature = "parallel"))]
        {
            for (row, out) in rgba.chunks_mut(width * 4).enumerate() {
                fill_row(row, out);
            }
        }

        rgba
    }

    fn encode(&self, width: usize, height: usize, rgba: &[u8]) -> NdviResult<RenderedImage> {
        let start_time = std::time::Instant::now();
        let width = u32::try_from(width)
            .map_err(|_| NdviError::Render(format!("width {} too large for PNG", width)))?;
        let height = u32::try_from(height)
            .map_err(|_| NdviError::Render(format!("height {} too large for PNG", height)))?;

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(rgba, width, height, ColorType::Rgba8)
            .map_err(|e| NdviError::Render(format!("PNG encoding failed: {}", e)))?;

        log::debug!("Encoded {}x{} PNG ({} bytes) in {:?}", width, height, png.len(), start_time.elapsed());
        Ok(RenderedImage { width, height, png })
    }
}
