use crate::types::{BandKind, NdviError, NdviResult, RasterGrid, Reflectance};
use gdal::Dataset;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of unique `/vsimem/` names for concurrent decodes
static MEM_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Band decoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParams {
    /// No-data value assumed when the file declares none
    pub sensor_nodata: Option<Reflectance>,
    /// Largest accepted raster, in pixels
    pub max_pixels: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            sensor_nodata: Some(0.0),   // Sentinel-2 NO_DATA
            max_pixels: 150_000_000,    // one full 10 m tile with headroom
        }
    }
}

/// An uploaded band file, fully materialized in memory
#[derive(Debug, Clone)]
pub struct BandInput {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl BandInput {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a band file from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> NdviResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }
}

/// Raster container formats accepted for band input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// TIFF / GeoTIFF / BigTIFF
    Tiff,
    /// JPEG2000 (JP2 box format or raw codestream)
    Jpeg2000,
}

const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];
const J2K_CODESTREAM: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

impl RasterFormat {
    /// Identify the container from its leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'I', b'I', 0x2A, 0x00, ..]
            | [b'M', b'M', 0x00, 0x2A, ..]
            | [b'I', b'I', 0x2B, 0x00, ..]
            | [b'M', b'M', 0x00, 0x2B, ..] => Some(RasterFormat::Tiff),
            _ if bytes.starts_with(&JP2_SIGNATURE) || bytes.starts_with(&J2K_CODESTREAM) => {
                Some(RasterFormat::Jpeg2000)
            }
            _ => None,
        }
    }

    /// Identify the container from the file extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        match extension.as_str() {
            "tif" | "tiff" => Some(RasterFormat::Tiff),
            "jp2" | "j2k" => Some(RasterFormat::Jpeg2000),
            _ => None,
        }
    }

    /// Content sniffing first, extension as fallback
    pub fn detect(bytes: &[u8], filename: &str) -> Option<Self> {
        Self::sniff(bytes).or_else(|| Self::from_filename(filename))
    }

    fn extension(self) -> &'static str {
        match self {
            RasterFormat::Tiff => "tif",
            RasterFormat::Jpeg2000 => "jp2",
        }
    }
}

/// Borrowed byte buffer registered with GDAL's in-memory filesystem.
/// The file is unlinked when the guard drops; GDAL never owns the buffer.
struct MemFile<'a> {
    path: String,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> MemFile<'a> {
    fn register(path: String, data: &'a [u8]) -> Result<Self, String> {
        let c_path = CString::new(path.as_str()).map_err(|e| e.to_string())?;

        let handle = unsafe {
            gdal_sys::VSIFileFromMemBuffer(
                c_path.as_ptr(),
                data.as_ptr() as *mut std::os::raw::c_uchar,
                data.len() as gdal_sys::vsi_l_offset,
                0, // don't take ownership
            )
        };
        if handle.is_null() {
            return Err(format!("GDAL refused in-memory file {}", path));
        }
        unsafe {
            gdal_sys::VSIFCloseL(handle);
        }

        Ok(Self {
            path,
            _data: PhantomData,
        })
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for MemFile<'_> {
    fn drop(&mut self) {
        if let Ok(c_path) = CString::new(self.path.as_str()) {
            unsafe {
                gdal_sys::VSIUnlink(c_path.as_ptr());
            }
        }
    }
}

fn decode_error(band: BandKind, reason: impl Into<String>) -> NdviError {
    NdviError::Decode {
        band,
        reason: reason.into(),
    }
}

/// Reader turning uploaded JPEG2000/TIFF bytes into reflectance grids
pub struct BandReader {
    params: DecodeParams,
}

impl BandReader {
    pub fn new(params: DecodeParams) -> Self {
        Self { params }
    }

    /// Reader with Sentinel-2 defaults
    pub fn standard() -> Self {
        Self::new(DecodeParams::default())
    }

    pub fn params(&self) -> &DecodeParams {
        &self.params
    }

    /// Reject a band larger than `max_pixels`
    pub fn check_budget(&self, kind: BandKind, pixels: usize) -> NdviResult<()> {
        if pixels > self.params.max_pixels {
            log::warn!(
                "{} band has {} pixels, limit is {}",
                kind,
                pixels,
                self.params.max_pixels
            );
            return Err(NdviError::ResourceLimit {
                band: kind,
                pixels,
                limit: self.params.max_pixels,
            });
        }
        Ok(())
    }

    /// Decode an uploaded band into a [`RasterGrid`]
    pub fn read_band(&self, input: &BandInput, kind: BandKind) -> NdviResult<RasterGrid> {
        let format = RasterFormat::detect(&input.bytes, &input.filename).ok_or_else(|| {
            decode_error(
                kind,
                format!(
                    "unsupported format for '{}' (expected .jp2, .tif or .tiff)",
                    input.filename
                ),
            )
        })?;

        log::info!(
            "Decoding {} band from '{}' ({:?}, {} bytes)",
            kind,
            input.filename,
            format,
            input.bytes.len()
        );
        let start_time = std::time::Instant::now();

        let id = MEM_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let vsi_path = format!(
            "/vsimem/verdant_{}_{}_{}.{}",
            std::process::id(),
            kind.to_string().to_lowercase(),
            id,
            format.extension()
        );
        let mem_file = MemFile::register(vsi_path, &input.bytes)
            .map_err(|reason| decode_error(kind, reason))?;

        let dataset = Dataset::open(mem_file.path())
            .map_err(|e| decode_error(kind, format!("corrupt or unreadable container: {}", e)))?;

        let grid = self.read_from_dataset(&dataset, kind);
        drop(dataset);

        log::info!("{} band decode completed in: {:?}", kind, start_time.elapsed());
        grid
    }

    /// Decode a band file from disk
    pub fn read_band_file<P: AsRef<Path>>(&self, path: P, kind: BandKind) -> NdviResult<RasterGrid> {
        let input = BandInput::from_path(path)?;
        self.read_band(&input, kind)
    }

    fn read_from_dataset(&self, dataset: &Dataset, kind: BandKind) -> NdviResult<RasterGrid> {
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count();
        log::debug!("{} raster dimensions: {} x {}, bands: {}", kind, width, height, band_count);

        if width == 0 || height == 0 {
            return Err(decode_error(
                kind,
                format!("zero-dimension raster ({}x{})", width, height),
            ));
        }

        // Budget check happens before any sample buffer is allocated
        self.check_budget(kind, width.saturating_mul(height))?;

        if band_count < 1 {
            return Err(decode_error(kind, "raster contains no bands"));
        }
        if band_count > 1 {
            log::warn!(
                "{} raster has {} bands; only band 1 is used",
                kind,
                band_count
            );
        }

        let band = dataset
            .rasterband(1)
            .map_err(|e| decode_error(kind, format!("failed to get band 1: {}", e)))?;
        log::debug!("{} band data type: {:?}", kind, band.band_type());

        let declared_nodata = band.no_data_value();
        let buffer = band
            .read_as::<f32>((0, 0), (width, height), (width, height), None)
            .map_err(|e| decode_error(kind, format!("failed to read samples: {}", e)))?;

        let data = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| decode_error(kind, format!("failed to reshape samples: {}", e)))?;

        let nodata = match declared_nodata {
            Some(value) => Some(value as Reflectance),
            None => {
                log::debug!(
                    "{} band declares no no-data value, using sensor default {:?}",
                    kind,
                    self.params.sensor_nodata
                );
                self.params.sensor_nodata
            }
        };

        RasterGrid::new(data, nodata).map_err(|e| decode_error(kind, e.to_string()))
    }
}
