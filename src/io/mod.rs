//! Band decoding and response shaping

pub mod band_reader;
pub mod response;

pub use band_reader::{BandReader, BandInput, DecodeParams, RasterFormat};
pub use response::{NdviAnalysis, ImageResponse, JsonResponse, ErrorResponse};
