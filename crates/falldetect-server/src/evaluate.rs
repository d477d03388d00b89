//! Offline accuracy check over a labelled image directory.
//!
//! Labels come from filenames: `_0_` marks a negative sample (no fall),
//! `_1_` a positive one, e.g. `fallingtest_1_017.jpg`. The cache is bypassed.

use std::path::{Path, PathBuf};

use falldetect_core::{Verdict, VisionSettings};
use falldetect_infer::{decode_image, EnsembleClassifier, HttpVisionBackend, ResourceGate};
use tracing::{info, warn};

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// One evaluated file.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub filename: String,
    pub expected: Option<Verdict>,
    pub outcome: Result<(Verdict, f64), String>,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub samples: Vec<SampleResult>,
}

impl EvaluationReport {
    pub fn labelled(&self, verdict: Verdict) -> usize {
        self.samples
            .iter()
            .filter(|s| s.expected == Some(verdict))
            .count()
    }

    /// Samples that have a label and classified without error.
    pub fn evaluated(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.expected.is_some() && s.outcome.is_ok())
            .count()
    }

    pub fn correct(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| matches!((&s.expected, &s.outcome), (Some(e), Ok((v, _))) if e == v))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.samples.iter().filter(|s| s.outcome.is_err()).count()
    }

    pub fn accuracy(&self) -> Option<f64> {
        let evaluated = self.evaluated();
        (evaluated > 0).then(|| self.correct() as f64 / evaluated as f64)
    }
}

/// Expected verdict encoded in a filename, if any.
pub fn expected_label(filename: &str) -> Option<Verdict> {
    if filename.contains("_0_") {
        Some(Verdict::Negative)
    } else if filename.contains("_1_") {
        Some(Verdict::Positive)
    } else {
        None
    }
}

/// Supported image files in `dir`, sorted by name.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}

/// Classify every path through the gate. Blocking.
pub fn evaluate_images(
    gate: &ResourceGate,
    classifier: &EnsembleClassifier,
    paths: &[PathBuf],
) -> EvaluationReport {
    let mut report = EvaluationReport::default();

    for (i, path) in paths.iter().enumerate() {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("Evaluating {}/{}: {}", i + 1, paths.len(), filename);

        let outcome = std::fs::read(path)
            .map_err(falldetect_core::Error::from)
            .and_then(|bytes| {
                gate.with_resource(|backend| {
                    let image = decode_image(&bytes)?;
                    classifier.classify(backend, &image)
                })
            })
            .map(|o| (o.verdict, o.confidence))
            .map_err(|e| {
                warn!("{} failed: {}", filename, e);
                e.to_string()
            });

        report.samples.push(SampleResult {
            expected: expected_label(&filename),
            filename,
            outcome,
        });
    }

    report
}

/// Warm up the configured backend and evaluate `dir`.
pub async fn run(dir: &Path, settings: VisionSettings) -> anyhow::Result<EvaluationReport> {
    let paths = list_images(dir)?;
    if paths.is_empty() {
        anyhow::bail!("No supported images found in {}", dir.display());
    }

    let classifier = EnsembleClassifier::from_settings(&settings);
    let backend = HttpVisionBackend::connect(settings).await?;
    let gate = ResourceGate::with_backend(Box::new(backend));

    let report =
        tokio::task::spawn_blocking(move || evaluate_images(&gate, &classifier, &paths)).await?;
    Ok(report)
}

pub fn print_report(report: &EvaluationReport) {
    for sample in &report.samples {
        let expected = sample.expected.map(|v| v.as_str()).unwrap_or("-");
        match &sample.outcome {
            Ok((verdict, confidence)) => {
                let mark = match sample.expected {
                    Some(e) if e == *verdict => "ok",
                    Some(_) => "MISS",
                    None => "",
                };
                println!(
                    "{:<40} expected={:<8} got={:<8} confidence={:.3} {}",
                    sample.filename, expected, verdict, confidence, mark
                );
            }
            Err(e) => println!("{:<40} expected={:<8} error: {}", sample.filename, expected, e),
        }
    }

    println!();
    println!("Negative samples (_0_): {}", report.labelled(Verdict::Negative));
    println!("Positive samples (_1_): {}", report.labelled(Verdict::Positive));
    println!("Failed:                 {}", report.failures());
    println!(
        "Correct:                {}/{}",
        report.correct(),
        report.evaluated()
    );
    match report.accuracy() {
        Some(acc) => println!("Accuracy:               {:.1}%", acc * 100.0),
        None => println!("Accuracy:               n/a (no labelled samples)"),
    }
}
