use crate::core::ndvi::NDVI_FORMULA;
use crate::core::render::{legend, LegendEntry, RenderedImage};
use crate::core::statistics::StatisticsSummary;
use crate::types::{NdviError, NdviResult};
use serde::Serialize;

/// The single artifact of one NDVI computation: rendered map plus statistics.
/// Both response shapes are views over it; neither recomputes anything.
#[derive(Debug, Clone)]
pub struct NdviAnalysis {
    pub image: RenderedImage,
    pub statistics: StatisticsSummary,
}

/// Binary response: PNG body with statistics carried as sidecar headers
#[derive(Debug, Clone)]
pub struct ImageResponse<'a> {
    pub content_type: &'static str,
    pub body: &'a [u8],
    pub headers: Vec<(&'static str, String)>,
}

/// Structured response body
#[derive(Debug, Clone, Serialize)]
pub struct JsonResponse<'a> {
    pub status: &'static str,
    pub message: &'static str,
    pub statistics: &'a StatisticsSummary,
    pub legend: Vec<LegendEntry>,
    pub formula: &'static str,
}

/// Error body for a failed computation
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub kind: &'static str,
    pub detail: String,
    /// Whether the caller's input caused the failure
    pub input_error: bool,
}

impl From<&NdviError> for ErrorResponse {
    fn from(err: &NdviError) -> Self {
        Self {
            status: "error",
            kind: err.kind(),
            detail: err.to_string(),
            input_error: err.is_input_error(),
        }
    }
}

impl NdviAnalysis {
    pub fn new(image: RenderedImage, statistics: StatisticsSummary) -> Self {
        Self { image, statistics }
    }

    /// PNG body plus `X-*` statistics headers
    pub fn image_response(&self) -> ImageResponse<'_> {
        let stats = &self.statistics;
        ImageResponse {
            content_type: RenderedImage::CONTENT_TYPE,
            body: self.image.bytes(),
            headers: vec![
                ("X-Healthy-Vegetation", stats.healthy_vegetation_percent.to_string()),
                ("X-Moderate-Vegetation", stats.moderate_vegetation_percent.to_string()),
                ("X-Stressed-Vegetation", stats.stressed_vegetation_percent.to_string()),
                ("X-Bare-Land", stats.bare_land_percent.to_string()),
                ("X-Mean-NDVI", stats.mean_ndvi.to_string()),
            ],
        }
    }

    pub fn json_response(&self) -> JsonResponse<'_> {
        JsonResponse {
            status: "success",
            message: "NDVI computed successfully",
            statistics: &self.statistics,
            legend: legend(),
            formula: NDVI_FORMULA,
        }
    }

    /// Serialized structured response
    pub fn to_json(&self) -> NdviResult<String> {
        Ok(serde_json::to_string(&self.json_response())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::Classifier;
    use crate::core::render::ColorRenderer;
    use crate::core::statistics::StatisticsAggregator;
    use crate::types::{Dimension, NdviGrid};
    use ndarray::array;

    fn analysis() -> NdviAnalysis {
        let ndvi = NdviGrid::from_array(array![[0.8, 0.5], [0.1, f32::NAN]]);
        let classes = Classifier::classify(&ndvi);
        let statistics = StatisticsAggregator::standard().aggregate(&classes, &ndvi).unwrap();
        let image = ColorRenderer::standard().render_classified(&ndvi, &classes).unwrap();
        NdviAnalysis::new(image, statistics)
    }

    #[test]
    fn test_image_response_headers_match_statistics() {
        let analysis = analysis();
        let response = analysis.image_response();

        assert_eq!(response.content_type, "image/png");
        assert_eq!(response.body, analysis.image.png.as_slice());

        let header = |name: &str| {
            response
                .headers
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
                .unwrap()
        };
        assert_eq!(header("X-Healthy-Vegetation"), "33.33");
        assert_eq!(header("X-Moderate-Vegetation"), "33.33");
        assert_eq!(header("X-Bare-Land"), "33.33");
        assert_eq!(header("X-Mean-NDVI"), analysis.statistics.mean_ndvi.to_string());
    }

    #[test]
    fn test_json_response_shape() {
        let analysis = analysis();
        let value: serde_json::Value = serde_json::from_str(&analysis.to_json().unwrap()).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["formula"], NDVI_FORMULA);
        let stats = &value["statistics"];
        assert_eq!(stats["healthy_vegetation_percent"], 33.33);
        assert_eq!(stats["stressed_vegetation_percent"], 0.0);
        assert_eq!(stats["total_valid_pixels"], 3);
        assert_eq!(stats["categories"].as_array().unwrap().len(), 5);
        assert_eq!(value["legend"][0]["color"], "#228B22");
    }

    #[test]
    fn test_error_response() {
        let err = NdviError::Alignment {
            dimension: Dimension::Width,
            red: (10, 10),
            nir: (9, 10),
        };
        let body = ErrorResponse::from(&err);
        assert_eq!(body.status, "error");
        assert_eq!(body.kind, "alignment");
        assert!(body.input_error);
        assert!(body.detail.contains("RED 10x10 vs NIR 9x10"));
    }
}
