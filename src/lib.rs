//! Verdant: A Fast, Modular Sentinel-2 Vegetation-Health Processor
//!
//! Computes the Normalized Difference Vegetation Index from a pair of
//! co-registered Red (B04) and Near-Infrared (B08) rasters, classifies it
//! into five vegetation classes, renders a false-color map and aggregates
//! coverage statistics.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BandKind, Category, CategoryInfo, ClassificationGrid, Dimension, NdviError, NdviGrid,
    NdviResult, RasterGrid, CATEGORY_TABLE,
};

pub use crate::io::{BandInput, BandReader, NdviAnalysis};
pub use crate::core::{NdviProcessor, PipelineParams, StatisticsSummary, RenderedImage, NDVI_FORMULA};

#[cfg(feature = "python")]
mod python {
    use super::*;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyBytes;

    fn to_py_err(err: NdviError) -> PyErr {
        if err.is_input_error() {
            PyValueError::new_err(err.to_string())
        } else {
            PyRuntimeError::new_err(err.to_string())
        }
    }

    /// Python wrapper for NdviAnalysis
    #[pyclass(name = "NdviAnalysis")]
    struct PyNdviAnalysis {
        inner: NdviAnalysis,
    }

    #[pymethods]
    impl PyNdviAnalysis {
        #[getter]
        fn image_png<'py>(&self, py: Python<'py>) -> &'py PyBytes {
            PyBytes::new(py, self.inner.image.bytes())
        }

        #[getter]
        fn width(&self) -> u32 {
            self.inner.image.width
        }

        #[getter]
        fn height(&self) -> u32 {
            self.inner.image.height
        }

        #[getter]
        fn healthy_vegetation_percent(&self) -> f64 {
            self.inner.statistics.healthy_vegetation_percent
        }

        #[getter]
        fn moderate_vegetation_percent(&self) -> f64 {
            self.inner.statistics.moderate_vegetation_percent
        }

        #[getter]
        fn stressed_vegetation_percent(&self) -> f64 {
            self.inner.statistics.stressed_vegetation_percent
        }

        #[getter]
        fn bare_land_percent(&self) -> f64 {
            self.inner.statistics.bare_land_percent
        }

        #[getter]
        fn mean_ndvi(&self) -> f64 {
            self.inner.statistics.mean_ndvi
        }

        fn statistics_json(&self) -> PyResult<String> {
            serde_json::to_string(&self.inner.statistics).map_err(|e| to_py_err(e.into()))
        }

        fn response_json(&self) -> PyResult<String> {
            self.inner.to_json().map_err(to_py_err)
        }

        fn response_headers(&self) -> Vec<(String, String)> {
            self.inner
                .image_response()
                .headers
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect()
        }

        fn __repr__(&self) -> String {
            format!(
                "NdviAnalysis({}x{}, mean_ndvi={}, valid_pixels={})",
                self.inner.image.width,
                self.inner.image.height,
                self.inner.statistics.mean_ndvi,
                self.inner.statistics.total_valid_pixels
            )
        }
    }

    /// Compute NDVI from uploaded Red and NIR band bytes
    #[pyfunction]
    #[pyo3(signature = (red_bytes, red_filename, nir_bytes, nir_filename, params_json=None))]
    fn compute_ndvi(
        py: Python<'_>,
        red_bytes: &[u8],
        red_filename: &str,
        nir_bytes: &[u8],
        nir_filename: &str,
        params_json: Option<&str>,
    ) -> PyResult<PyNdviAnalysis> {
        let params = match params_json {
            Some(json) => PipelineParams::from_json_str(json).map_err(to_py_err)?,
            None => PipelineParams::default(),
        };
        let red = BandInput::new(red_filename, red_bytes.to_vec());
        let nir = BandInput::new(nir_filename, nir_bytes.to_vec());

        let analysis = py
            .allow_threads(|| NdviProcessor::new(params).process(&red, &nir))
            .map_err(to_py_err)?;
        Ok(PyNdviAnalysis { inner: analysis })
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyNdviAnalysis>()?;
        m.add_function(wrap_pyfunction!(compute_ndvi, m)?)?;
        m.add("NDVI_FORMULA", NDVI_FORMULA)?;
        Ok(())
    }
}
