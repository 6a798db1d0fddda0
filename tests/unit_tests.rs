// tests/unit_tests.rs
use image::RgbImage;
use vegscan::error::AnalysisError;
use vegscan::processing::indices::{IndexCalculator, EVI, NDVI, SAVI, VARI};
use vegscan::processing::resample::resample_area;
use vegscan::processing::{IndexStatistics, VegetationIndex, ZoneClassifier};
use vegscan::raster::{Raster, RasterBandSet};

/// Band set of `width x height` pixels, cycling through the given values.
fn create_test_bands(
    width: usize,
    height: usize,
    nir_values: Option<&[f32]>,
    red_values: &[f32],
    green_values: &[f32],
    blue_values: &[f32],
) -> RasterBandSet {
    let fill = |values: &[f32]| {
        let data = (0..width * height).map(|i| values[i % values.len()]).collect();
        Raster::new((width, height), data).unwrap()
    };

    RasterBandSet::new(
        RgbImage::new(width as u32, height as u32),
        fill(red_values),
        fill(green_values),
        fill(blue_values),
        nir_values.map(fill),
    )
    .unwrap()
}

/// Test NDVI on the reference 2x2 reflectance tile
#[test]
fn test_ndvi_reference_tile() {
    let red: [f32; 4] = [0.1, 0.2, 0.1, 0.2];
    let nir: [f32; 4] = [0.3, 0.3, 0.1, 0.1];
    let expected = [0.5, 0.2, 0.0, -0.33];

    let bands = create_test_bands(2, 2, Some(&nir), &red, &[0.1], &[0.05]);
    let result = NDVI::new(None).calculate(&bands).unwrap();

    assert_eq!(result.shape(), (2, 2));
    for (i, expected) in expected.iter().enumerate() {
        assert!(
            (result.data()[i] - expected).abs() < 1e-2,
            "Expected {}, got {} at index {}",
            expected,
            result.data()[i],
            i
        );
    }
}

/// NIR == RED must give exactly neutral NDVI, including all-zero pixels
#[test]
fn test_ndvi_equal_bands_is_zero() {
    let values: [f32; 4] = [0.0, 0.05, 0.3, 0.9];
    let bands = create_test_bands(2, 2, Some(&values), &values, &[0.1], &[0.1]);
    let result = NDVI::new(None).calculate(&bands).unwrap();

    for (i, v) in result.data().iter().enumerate() {
        assert!(v.abs() <= 1e-6, "Expected 0, got {} at index {}", v, i);
    }
}

/// NDVI and VARI stay within [-1, 1] for any reflectance input
#[test]
fn test_ndvi_vari_bounds() {
    let test_cases = [
        // NIR, RED, GREEN, BLUE
        (0.9, 0.01, 0.02, 0.5),
        (0.0, 0.8, 0.0, 0.9),
        (0.3, 0.3, 0.31, 0.6),
        (0.01, 0.0, 0.5, 0.49),
        (1.0, 1.0, 1.0, 1.0),
    ];

    let nir: Vec<f32> = test_cases.iter().map(|c| c.0).collect();
    let red: Vec<f32> = test_cases.iter().map(|c| c.1).collect();
    let green: Vec<f32> = test_cases.iter().map(|c| c.2).collect();
    let blue: Vec<f32> = test_cases.iter().map(|c| c.3).collect();
    let bands = create_test_bands(5, 1, Some(&nir), &red, &green, &blue);

    for calculator in [VegetationIndex::Ndvi.calculator(), VegetationIndex::Vari.calculator()] {
        let result = calculator.calculate(&bands).unwrap();
        for v in result.data() {
            assert!((-1.0..=1.0).contains(v), "{} out of range: {}", calculator.name(), v);
        }
    }
}

/// Test SAVI calculation with known values
#[test]
fn test_savi_calculation() {
    // SAVI = ((NIR - RED) / (NIR + RED + L)) * (1 + L)
    let factors_and_expected = [
        (0.0, 0.33333), // L=0: SAVI = NDVI
        (0.5, 0.3),     // Standard L value
        (1.0, 0.28571), // High L value
    ];

    for (soil_factor, expected) in factors_and_expected {
        let bands = create_test_bands(1, 1, Some(&[0.5]), &[0.25], &[0.1], &[0.1]);
        let result = SAVI::new(soil_factor, None).calculate(&bands).unwrap();

        assert!(
            (result.data()[0] - expected).abs() < 1e-4,
            "With soil factor {}, expected {}, got {}",
            soil_factor,
            expected,
            result.data()[0]
        );
    }
}

/// Test EVI calculation with known values
#[test]
fn test_evi_calculation() {
    // EVI = 2.5 * (NIR - RED) / (NIR + 6*RED - 7.5*BLUE + 1)
    let test_cases = [
        // NIR, RED, BLUE, Expected EVI
        (0.5, 0.25, 0.15, 0.33333),
        (0.3, 0.3, 0.1, 0.0),
        (0.4, 0.1, 0.05, 0.46154),
    ];

    let nir: Vec<f32> = test_cases.iter().map(|c| c.0).collect();
    let red: Vec<f32> = test_cases.iter().map(|c| c.1).collect();
    let blue: Vec<f32> = test_cases.iter().map(|c| c.2).collect();
    let bands = create_test_bands(3, 1, Some(&nir), &red, &[0.1], &blue);
    let result = EVI::new(None).calculate(&bands).unwrap();

    for (i, (_, _, _, expected)) in test_cases.iter().enumerate() {
        assert!(
            (result.data()[i] - expected).abs() < 1e-4,
            "Expected {}, got {} at index {}",
            expected,
            result.data()[i],
            i
        );
    }
}

/// SAVI and EVI stay finite wherever the inputs are finite
#[test]
fn test_savi_evi_finite() {
    // The EVI denominator cancels for the last pixel: 0 + 6*0.125 - 7.5*0.2333.. + 1
    let nir: [f32; 4] = [0.0, 0.0, 1.0, 0.0];
    let red: [f32; 4] = [0.0, 0.0, 0.0, 0.125];
    let blue: [f32; 4] = [0.0, 1.0, 0.0, 0.23333333];
    let bands = create_test_bands(2, 2, Some(&nir), &red, &[0.0], &blue);

    for index in [VegetationIndex::Savi, VegetationIndex::Evi] {
        let result = index.calculator().calculate(&bands).unwrap();
        for v in result.data() {
            assert!(v.is_finite(), "{} produced {}", index, v);
        }
    }
}

/// NaN pixels stay NaN through index math
#[test]
fn test_nodata_propagates() {
    let bands = create_test_bands(2, 1, Some(&[0.5, f32::NAN]), &[0.1, 0.1], &[0.1], &[0.1]);
    let result = NDVI::new(None).calculate(&bands).unwrap();

    assert!(result.data()[0].is_finite());
    assert!(result.data()[1].is_nan());
    assert_eq!(IndexStatistics::compute(&result).valid_pixels, 1);
}

/// NIR indices fail with MissingBand; VARI does not need NIR
#[test]
fn test_missing_nir() {
    let bands = create_test_bands(2, 2, None, &[0.1], &[0.2], &[0.05]);

    for index in [VegetationIndex::Ndvi, VegetationIndex::Savi, VegetationIndex::Evi] {
        let calculator = index.calculator();
        assert!(calculator.requires_nir());
        assert!(matches!(
            calculator.calculate(&bands),
            Err(AnalysisError::MissingBand(_))
        ));
    }
    assert!(VARI::new(None).calculate(&bands).is_ok());
}

/// Test custom naming
#[test]
fn test_custom_names() {
    assert_eq!(NDVI::new(None).name(), "NDVI");
    assert_eq!(NDVI::new(Some("Custom NDVI".to_string())).name(), "Custom NDVI");
    assert_eq!(VARI::new(Some("My VARI".to_string())).name(), "My VARI");
    assert_eq!(SAVI::new(0.5, Some("Custom SAVI".to_string())).name(), "Custom SAVI");
    assert_eq!(EVI::new(None).name(), "EVI");
}

/// Resampling NIR onto the red grid, then NDVI, yields the red grid's shape
#[test]
fn test_resampled_nir_ndvi_shape() {
    let red = Raster::filled((6, 4), 0.1f32);
    let coarse_nir = Raster::filled((3, 2), 0.3f32);

    let nir = resample_area(&coarse_nir, red.shape()).unwrap();
    let ndvi = NDVI::from_bands(&nir, &red).unwrap();

    assert_eq!(ndvi.shape(), (6, 4));
    assert!(ndvi.data().iter().all(|v| (v - 0.5).abs() < 1e-4));
}

/// Zone percentages of a fully valid raster sum to 100
#[test]
fn test_zone_percentages_sum_to_100() {
    let data: Vec<f32> = (0..97).map(|i| -1.0 + 2.0 * i as f32 / 96.0).collect();
    let map = Raster::new((97, 1), data).unwrap();

    let zones = ZoneClassifier::default().classify(&map);
    assert!((zones.total() - 100.0).abs() <= 0.1, "total {}", zones.total());
}
