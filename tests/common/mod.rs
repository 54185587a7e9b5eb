#![allow(dead_code)]

use gdal::raster::Buffer;
use gdal::DriverManager;
use std::path::Path;

/// Write a float32 GeoTIFF with `bands` identical bands
pub fn write_geotiff(path: &Path, rows: &[Vec<f32>], nodata: Option<f64>, bands: usize) {
    let height = rows.len();
    let width = rows[0].len();

    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver not available");
    let dataset = driver
        .create_with_band_type::<f32, _>(
            path,
            width.try_into().unwrap(),
            height.try_into().unwrap(),
            bands.try_into().unwrap(),
        )
        .expect("Failed to create GeoTIFF");

    let data: Vec<f32> = rows.iter().flatten().copied().collect();
    for index in 1..=bands {
        let mut band = dataset
            .rasterband(index.try_into().unwrap())
            .expect("Failed to get band");
        if let Some(value) = nodata {
            band.set_no_data_value(Some(value)).expect("Failed to set no-data value");
        }
        let buffer = Buffer {
            size: (width, height),
            data: data.clone(),
        };
        band.write((0, 0), (width, height), &buffer)
            .expect("Failed to write samples");
    }
}

/// GeoTIFF file contents for a single-band grid
pub fn geotiff_bytes(rows: &[Vec<f32>], nodata: Option<f64>) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("band.tif");
    write_geotiff(&path, rows, nodata, 1);
    std::fs::read(&path).expect("Failed to read GeoTIFF back")
}

/// Rows of `width` samples produced by `f(row, col)`
pub fn synthetic_rows<F: Fn(usize, usize) -> f32>(width: usize, height: usize, f: F) -> Vec<Vec<f32>> {
    (0..height)
        .map(|r| (0..width).map(|c| f(r, c)).collect())
        .collect()
}
