use crate::core::alignment::{AlignmentParams, AlignmentValidator};
use crate::core::classify::Classifier;
use crate::core::ndvi::{NdviComputer, NdviParams};
use crate::core::render::{ColorRenderer, RenderParams};
use crate::core::statistics::{StatisticsAggregator, StatisticsParams};
use crate::io::band_reader::{BandInput, BandReader, DecodeParams};
use crate::io::response::NdviAnalysis;
use crate::types::{BandKind, NdviResult, RasterGrid};
use serde::{Deserialize, Serialize};

/// Parameters for the complete Red/NIR → NDVI pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub decode: DecodeParams,
    pub alignment: AlignmentParams,
    pub ndvi: NdviParams,
    pub statistics: StatisticsParams,
    pub render: RenderParams,
}

impl PipelineParams {
    /// Load parameters from a JSON document; omitted fields keep defaults
    pub fn from_json_str(json: &str) -> NdviResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Vegetation-health processor: decode → validate → compute → classify →
/// aggregate/render → assemble.
///
/// Holds configuration only. Every call owns its grids, so one processor can
/// serve concurrent requests.
pub struct NdviProcessor {
    reader: BandReader,
    validator: AlignmentValidator,
    computer: NdviComputer,
    aggregator: StatisticsAggregator,
    renderer: ColorRenderer,
}

impl NdviProcessor {
    pub fn new(params: PipelineParams) -> Self {
        log::debug!("NDVI pipeline parameters: {:?}", params);
        Self {
            reader: BandReader::new(params.decode),
            validator: AlignmentValidator::new(params.alignment),
            computer: NdviComputer::new(params.ndvi),
            aggregator: StatisticsAggregator::new(params.statistics),
            renderer: ColorRenderer::new(params.render),
        }
    }

    /// Processor with Sentinel-2 defaults
    pub fn standard() -> Self {
        Self::new(PipelineParams::default())
    }

    /// Run the full pipeline on two uploaded band files
    pub fn process(&self, red: &BandInput, nir: &BandInput) -> NdviResult<NdviAnalysis> {
        log::info!(
            "Processing NDVI request: RED '{}', NIR '{}'",
            red.filename,
            nir.filename
        );
        let start_time = std::time::Instant::now();

        let red_grid = self.reader.read_band(red, BandKind::Red)?;
        let nir_grid = self.reader.read_band(nir, BandKind::Nir)?;
        let decode_time = start_time.elapsed();

        let analysis = self.process_grids(red_grid, nir_grid)?;

        log::info!("NDVI request complete in {:?}", start_time.elapsed());
        log::info!("  - Decode: {:?}", decode_time);
        log::info!("  - Compute/render: {:?}", start_time.elapsed() - decode_time);
        Ok(analysis)
    }

    /// Run the pipeline on already decoded grids.
    ///
    /// The decoder's pixel budget applies here too.
    pub fn process_grids(&self, red: RasterGrid, nir: RasterGrid) -> NdviResult<NdviAnalysis> {
        self.reader.check_budget(BandKind::Red, red.pixel_count())?;
        self.reader.check_budget(BandKind::Nir, nir.pixel_count())?;

        let (red, nir) = self.validator.validate(red, nir)?;

        let ndvi = self.computer.compute(&red, &nir)?;
        // Source bands are no longer needed
        drop(red);
        drop(nir);

        let classes = Classifier::classify(&ndvi);
        let statistics = self.aggregator.aggregate(&classes, &ndvi)?;
        let image = self.renderer.render_classified(&ndvi, &classes)?;

        Ok(NdviAnalysis::new(image, statistics))
    }
}
