mod common;

use common::{geotiff_bytes, synthetic_rows, write_geotiff};
use verdant::io::{BandInput, BandReader, DecodeParams};
use verdant::{BandKind, NdviError};

#[test]
fn test_decode_geotiff_samples() {
    let rows = vec![vec![100.0, 200.0, 300.0], vec![400.0, 500.0, 600.0]];
    let input = BandInput::new("T43QCC_B04_10m.tif", geotiff_bytes(&rows, None));

    let grid = BandReader::standard()
        .read_band(&input, BandKind::Red)
        .expect("Failed to decode GeoTIFF");

    assert_eq!(grid.shape(), (3, 2));
    assert_eq!(grid.get(0, 0), Some(100.0));
    assert_eq!(grid.get(2, 1), Some(600.0));
    // No declared no-data: the Sentinel-2 default applies
    assert_eq!(grid.nodata(), Some(0.0));
}

#[test]
fn test_declared_nodata_wins_over_sensor_default() {
    let rows = vec![vec![65535.0, 10.0], vec![0.0, 20.0]];
    let input = BandInput::new("B08.tif", geotiff_bytes(&rows, Some(65535.0)));

    let grid = BandReader::standard().read_band(&input, BandKind::Nir).unwrap();

    assert_eq!(grid.nodata(), Some(65535.0));
    assert!(grid.is_nodata(65535.0));
    assert!(!grid.is_nodata(0.0));
}

#[test]
fn test_sensor_nodata_can_be_disabled() {
    let rows = vec![vec![0.0, 10.0]];
    let reader = BandReader::new(DecodeParams {
        sensor_nodata: None,
        ..DecodeParams::default()
    });
    let grid = reader
        .read_band(&BandInput::new("red.tif", geotiff_bytes(&rows, None)), BandKind::Red)
        .unwrap();

    assert_eq!(grid.nodata(), None);
    assert!(!grid.is_nodata(0.0));
}

#[test]
fn test_pixel_budget_is_enforced() {
    let rows = synthetic_rows(8, 8, |r, c| (r * 8 + c) as f32 + 1.0);
    let reader = BandReader::new(DecodeParams {
        max_pixels: 32,
        ..DecodeParams::default()
    });

    let result = reader.read_band(&BandInput::new("big.tif", geotiff_bytes(&rows, None)), BandKind::Red);
    match result {
        Err(NdviError::ResourceLimit { band, pixels, limit }) => {
            assert_eq!(band, BandKind::Red);
            assert_eq!(pixels, 64);
            assert_eq!(limit, 32);
        }
        other => panic!("expected resource limit error, got {:?}", other.map(|g| g.shape())),
    }
}

#[test]
fn test_multiband_input_uses_first_band() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("composite.tif");
    write_geotiff(&path, &[vec![7.0, 8.0]], None, 3);

    let grid = BandReader::standard()
        .read_band_file(&path, BandKind::Nir)
        .unwrap();
    assert_eq!(grid.shape(), (2, 1));
    assert_eq!(grid.get(1, 0), Some(8.0));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = BandReader::standard().read_band_file("/nonexistent/B04.jp2", BandKind::Red);
    assert!(matches!(result, Err(NdviError::Io(_))));
}

#[test]
fn test_truncated_geotiff_is_decode_error() {
    let rows = synthetic_rows(16, 16, |r, c| (r + c) as f32 + 1.0);
    let mut bytes = geotiff_bytes(&rows, None);
    bytes.truncate(16);

    let result = BandReader::standard().read_band(&BandInput::new("nir.tif", bytes), BandKind::Nir);
    assert!(matches!(result, Err(NdviError::Decode { band: BandKind::Nir, .. })));
}
