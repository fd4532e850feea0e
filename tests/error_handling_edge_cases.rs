//! Configuration errors and boundary conditions

use bgstrip::ocr::tesseract::parse_tsv;
use bgstrip::segmentation::models::format_size;
use bgstrip::{
    parse_color, parse_pass, BgStripError, ColorPass, ModelCache, ModelPreset, ModelSource,
    ProcessingMode, ProcessingOptions, Raster, RgbColor, TesseractRecognizer, TextDetectionMode,
    TextRecognizer,
};
use image::{DynamicImage, Rgba};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_threshold_bounds() {
    let ok = ProcessingOptions::builder()
        .mode(ProcessingMode::Color)
        .pass(ColorPass::new(RgbColor::WHITE, 441))
        .build();
    assert!(ok.is_ok());

    let err = ProcessingOptions::builder()
        .mode(ProcessingMode::Color)
        .pass(ColorPass::new(RgbColor::WHITE, 442))
        .build()
        .unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, BgStripError::InvalidConfig(_)));
    assert!(message.contains("442"));
    assert!(message.contains("0-441"));

    let err = ProcessingOptions::builder().text_threshold(500).build().unwrap_err();
    assert!(err.to_string().contains("text threshold"));
}

#[test]
fn test_mode_requirements() {
    let err = ProcessingOptions::builder()
        .mode(ProcessingMode::Color)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("at least one reference color"));

    let err = ProcessingOptions::builder()
        .mode(ProcessingMode::Hybrid)
        .text_detection(TextDetectionMode::Color)
        .text_colors(Vec::new())
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("text color"));

    // OCR detection does not need text colors
    assert!(ProcessingOptions::builder()
        .mode(ProcessingMode::Hybrid)
        .text_colors(Vec::new())
        .build()
        .is_ok());
}

#[test]
fn test_ocr_confidence_bounds() {
    for bad in [-1.0, 100.5, f32::NAN, f32::INFINITY] {
        assert!(
            ProcessingOptions::builder().ocr_min_confidence(bad).build().is_err(),
            "{bad} accepted"
        );
    }
    assert!(ProcessingOptions::builder().ocr_min_confidence(0.0).build().is_ok());
    assert!(ProcessingOptions::builder().ocr_min_confidence(100.0).build().is_ok());
}

#[test]
fn test_feather_with_many_passes_is_not_an_error() {
    let options = ProcessingOptions::builder()
        .mode(ProcessingMode::Color)
        .pass(ColorPass::new(RgbColor::WHITE, 20))
        .pass(ColorPass::new(RgbColor::BLACK, 20))
        .feather(15)
        .build()
        .unwrap();
    assert_eq!(options.feather, 15);
}

#[test]
fn test_json_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("options.json");
    std::fs::write(
        &path,
        r#"{
            "mode": "color",
            "passes": [{ "color": { "r": 0, "g": 255, "b": 0 }, "threshold": 25 }],
            "feather": 6
        }"#,
    )
    .unwrap();

    let options = ProcessingOptions::from_json_file(&path).unwrap();
    assert_eq!(options.mode, ProcessingMode::Color);
    assert_eq!(options.passes, vec![ColorPass::new(RgbColor::new(0, 255, 0), 25)]);
    assert_eq!(options.feather, 6);
    assert_eq!(options.text_padding, 10);
    assert_eq!(options.segmentation.model, ModelSource::Preset(ModelPreset::U2Net));

    std::fs::write(&path, r#"{ "mode": "color" }"#).unwrap();
    assert!(ProcessingOptions::from_json_file(&path).is_err());

    std::fs::write(&path, "{ not json").unwrap();
    let err = ProcessingOptions::from_json_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));

    assert!(ProcessingOptions::from_json_file(temp.path().join("absent.json")).is_err());
}

#[test]
fn test_options_json_roundtrip_keeps_model_source() {
    let options = ProcessingOptions::builder()
        .model(ModelSource::File {
            path: PathBuf::from("/models/custom.onnx"),
            preprocessing: ModelPreset::IsNetGeneralUse.preprocessing(),
        })
        .build()
        .unwrap();
    let json = serde_json::to_string(&options).unwrap();
    let back: ProcessingOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, options);
}

#[test]
fn test_color_parsing_errors() {
    assert_eq!(parse_color("#FFF").unwrap(), RgbColor::WHITE);
    assert_eq!(parse_color(" 10, 20 ,30 ").unwrap(), RgbColor::new(10, 20, 30));
    assert_eq!(parse_color("Grey").unwrap(), parse_color("gray").unwrap());

    for bad in ["", "#12345", "zzzzzz", "256,0,0", "1,2", "chartreuse"] {
        assert!(parse_color(bad).is_err(), "{bad:?} accepted");
    }

    let pass = parse_pass("white", 33).unwrap();
    assert_eq!(pass.threshold, 33);
    assert_eq!(parse_pass("#000000:0", 33).unwrap().threshold, 0);
    assert!(parse_pass("white:442", 33).is_err());
    assert!(parse_pass("white:abc", 33).is_err());
}

#[test]
fn test_missing_models_are_reported() {
    let temp = TempDir::new().unwrap();
    let cache = ModelCache::with_dir(temp.path().join("models")).unwrap();
    assert!(cache.scan_cached_models().unwrap().is_empty());

    let err = cache.resolve(&ModelSource::Preset(ModelPreset::U2NetP)).unwrap_err();
    assert!(err.to_string().contains("--only-download --model u2netp"));

    let err = cache
        .resolve(&ModelSource::File {
            path: temp.path().join("nope.onnx"),
            preprocessing: ModelPreset::U2Net.preprocessing(),
        })
        .unwrap_err();
    assert!(matches!(err, BgStripError::Model(_)));

    // An empty placeholder is not a usable model
    std::fs::write(cache.model_path(ModelPreset::Silueta), b"").unwrap();
    assert!(!cache.is_cached(ModelPreset::Silueta));
    std::fs::write(cache.model_path(ModelPreset::Silueta), b"onnx").unwrap();
    let cached = cache.scan_cached_models().unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].preset, ModelPreset::Silueta);
    assert_eq!(format_size(cached[0].size_bytes), "4 B");
}

#[test]
fn test_missing_tesseract_is_an_ocr_error() {
    let recognizer = TesseractRecognizer::new().with_binary("/nonexistent/bin/tesseract-ocr");
    let image = DynamicImage::ImageRgba8(Raster::from_pixel(4, 4, Rgba([0, 0, 0, 255])).into_image());
    let err = recognizer.recognize(&image).unwrap_err();
    assert!(err.is_ocr());
}

#[test]
fn test_tsv_tolerates_garbage_rows() {
    let report = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                  5\t1\t1\t1\t1\t1\t10\t20\t30\t12\t88.5\tHello\n\
                  5\t1\t1\t1\t1\t2\tx\t20\t30\t12\t88.5\tBroken\n\
                  short\trow\n\
                  4\t1\t1\t1\t1\t0\t10\t20\t70\t12\t-1\t\n";
    let words = parse_tsv(report);
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].text, "Hello");
    assert_eq!((words[0].x0, words[0].y0, words[0].x1, words[0].y1), (10, 20, 40, 32));
}

#[test]
fn test_empty_raster_edge_cases() {
    let raster = Raster::new(0, 0);
    assert!(raster.is_empty());
    assert!(bgstrip::detect_text_regions_by_color(&raster, &[RgbColor::BLACK], 60).is_empty());
    let out = bgstrip::classify(raster, &[ColorPass::new(RgbColor::BLACK, 441)]);
    assert_eq!(out.dimensions(), (0, 0));

    let err = bgstrip::composite_mask(Raster::new(2, 2), &Raster::new(3, 2), &[], 0).unwrap_err();
    assert!(err.to_string().contains("Compositing"));
}
