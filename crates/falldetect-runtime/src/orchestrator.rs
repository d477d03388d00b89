//! Orchestrator: fingerprint → cache lookup → gated classification → insert.
//!
//! Calls block the current thread (SQLite and the gate are both blocking);
//! async callers should run them on the blocking pool. Two racing requests
//! for the same novel image both classify; only the stored row is
//! deduplicated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use falldetect_core::{Error, Result};
use falldetect_infer::{decode_image, sniff_format, EnsembleClassifier, ResourceGate};
use falldetect_store::{Fingerprint, FingerprintCache, NewEntry};
use tracing::{debug, info, warn};

use crate::types::*;

/// Default cap on images per batch request.
pub const DEFAULT_MAX_BATCH: usize = 10;

pub struct Orchestrator {
    cache: Arc<dyn FingerprintCache>,
    gate: Arc<ResourceGate>,
    classifier: EnsembleClassifier,
    max_batch: usize,
    write_failures: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<dyn FingerprintCache>,
        gate: Arc<ResourceGate>,
        classifier: EnsembleClassifier,
    ) -> Self {
        Self {
            cache,
            gate,
            classifier,
            max_batch: DEFAULT_MAX_BATCH,
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Number of fresh results that could not be persisted.
    pub fn cache_write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Classify one payload, serving repeats from the cache.
    pub fn handle_request(&self, bytes: &[u8]) -> Result<ClassificationResponse> {
        sniff_format(bytes)?;
        let fingerprint = Fingerprint::of(bytes)?;

        if let Some(entry) = self.cache.lookup(&fingerprint)? {
            info!("Cache hit for {}", fingerprint.short());
            return Ok(ClassificationResponse::from_entry(&entry, true));
        }

        if !self.gate.is_ready() {
            return Err(Error::ResourceNotReady("service warming up".to_string()));
        }

        let start = Instant::now();
        let (outcome, width, height) = self.gate.with_resource(|backend| {
            let image = decode_image(bytes)?;
            let outcome = self.classifier.classify(backend, &image)?;
            Ok((outcome, image.width(), image.height()))
        })?;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        let entry = NewEntry {
            verdict: outcome.verdict,
            confidence: outcome.confidence,
            image_width: width,
            image_height: height,
            processing_time_ms,
        };
        match self.cache.insert(&fingerprint, &entry) {
            Ok(true) => {}
            Ok(false) => debug!("{} stored by a concurrent request", fingerprint.short()),
            Err(e) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Result for {} not cached: {}", fingerprint.short(), e);
            }
        }

        info!(
            "Processed {} -> {} ({}ms)",
            fingerprint.short(),
            outcome.verdict,
            processing_time_ms
        );

        Ok(ClassificationResponse {
            fingerprint: fingerprint.to_string(),
            verdict: outcome.verdict,
            confidence: outcome.confidence,
            image_size: format!("{}x{}", width, height),
            processing_time_ms,
            cached: false,
        })
    }

    /// Classify several named payloads in order.
    ///
    /// Readiness and the batch limit are checked for the whole batch up
    /// front; every other failure is reported on its item.
    pub fn handle_batch(&self, items: Vec<BatchInput>) -> Result<Vec<BatchItemResult>> {
        if !self.gate.is_ready() {
            return Err(Error::ResourceNotReady("service warming up".to_string()));
        }
        if items.len() > self.max_batch {
            return Err(Error::InvalidInput(format!(
                "Maximum {} images per batch",
                self.max_batch
            )));
        }

        let results = items
            .into_iter()
            .map(|item| {
                let outcome = check_content_type(item.content_type.as_deref())
                    .and_then(|_| self.handle_request(&item.bytes));
                match outcome {
                    Ok(response) => BatchItemResult::Classified {
                        filename: item.filename,
                        response,
                    },
                    Err(e) => {
                        warn!("Batch item {} failed: {}", item.filename, e);
                        BatchItemResult::Failed {
                            error: e.public_message(),
                            filename: item.filename,
                        }
                    }
                }
            })
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::time::Duration;

    use falldetect_core::config::DEFAULT_PRESENCE_QUESTION;
    use falldetect_core::Verdict;
    use falldetect_infer::VisionBackend;
    use falldetect_store::{CacheEntry, CacheStats, SqliteFingerprintCache};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;

    /// Scripted backend keyed by crop width; counts every call.
    struct FakeBackend {
        presence: Vec<(u32, &'static str)>,
        condition: Vec<(u32, &'static str)>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl VisionBackend for FakeBackend {
        fn ask(&mut self, image: &DynamicImage, question: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            let table = if question == DEFAULT_PRESENCE_QUESTION {
                &self.presence
            } else {
                &self.condition
            };
            Ok(table
                .iter()
                .find(|(w, _)| *w == image.width())
                .map(|(_, a)| a.to_string())
                .unwrap_or_else(|| "No".to_string()))
        }
    }

    /// Delegates reads to SQLite; every write fails.
    struct ReadOnlyCache {
        inner: SqliteFingerprintCache,
        lookups: AtomicUsize,
    }

    impl FingerprintCache for ReadOnlyCache {
        fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(fingerprint)
        }

        fn insert(&self, _fingerprint: &Fingerprint, _entry: &NewEntry) -> Result<bool> {
            Err(Error::CacheWriteFailure("database is locked".to_string()))
        }

        fn stats(&self) -> Result<CacheStats> {
            self.inner.stats()
        }

        fn ping(&self) -> bool {
            false
        }
    }

    fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn no_person_backend(calls: Arc<AtomicUsize>) -> Box<dyn VisionBackend> {
        Box::new(FakeBackend {
            presence: vec![],
            condition: vec![],
            calls,
            delay: Duration::ZERO,
        })
    }

    fn orchestrator_with(
        backend: Option<Box<dyn VisionBackend>>,
    ) -> (Orchestrator, Arc<SqliteFingerprintCache>, TempDir) {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(SqliteFingerprintCache::open(dir.path()).unwrap());
        let gate = match backend {
            Some(b) => ResourceGate::with_backend(b),
            None => ResourceGate::new(),
        };
        let orchestrator = Orchestrator::new(
            cache.clone(),
            Arc::new(gate),
            EnsembleClassifier::default(),
        );
        (orchestrator, cache, dir)
    }

    #[test]
    fn test_fresh_then_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (orch, _cache, _dir) = orchestrator_with(Some(no_person_backend(calls.clone())));
        let bytes = png(40, 30, 10);

        let fresh = orch.handle_request(&bytes).unwrap();
        assert_eq!(fresh.verdict, Verdict::Negative);
        assert_eq!(fresh.confidence, 1.0);
        assert_eq!(fresh.image_size, "40x30");
        assert!(!fresh.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let again = orch.handle_request(&bytes).unwrap();
        assert!(again.cached);
        assert_eq!(ClassificationResponse { cached: false, ..again }, fresh);
        // Classifier not consulted on the hit.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_two_of_three_positive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = FakeBackend {
            presence: vec![(50, "Yes"), (20, "Yes"), (16, "No")],
            condition: vec![(50, "Yes"), (20, "Yes")],
            calls: calls.clone(),
            delay: Duration::ZERO,
        };
        let (orch, cache, _dir) = orchestrator_with(Some(Box::new(backend)));
        let bytes = png(50, 20, 0);

        let response = orch.handle_request(&bytes).unwrap();
        assert_eq!(response.verdict, Verdict::Positive);
        assert_eq!(response.confidence, 0.667);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let stored = cache.lookup(&Fingerprint::of(&bytes).unwrap()).unwrap().unwrap();
        assert_eq!(stored.verdict, Verdict::Positive);
        assert_eq!(stored.confidence, 0.667);
    }

    #[test]
    fn test_malformed_input_touches_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(ReadOnlyCache {
            inner: SqliteFingerprintCache::open(dir.path()).unwrap(),
            lookups: AtomicUsize::new(0),
        });
        let gate = Arc::new(ResourceGate::with_backend(no_person_backend(calls.clone())));
        let orch = Orchestrator::new(cache.clone(), gate, EnsembleClassifier::default());

        for payload in [b"".as_slice(), b"hello, not an image".as_slice()] {
            let err = orch.handle_request(payload).unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
        }
        assert_eq!(cache.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_write_failure_still_answers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(ReadOnlyCache {
            inner: SqliteFingerprintCache::open(dir.path()).unwrap(),
            lookups: AtomicUsize::new(0),
        });
        let gate = Arc::new(ResourceGate::with_backend(no_person_backend(calls.clone())));
        let orch = Orchestrator::new(cache, gate, EnsembleClassifier::default());

        let response = orch.handle_request(&png(8, 8, 1)).unwrap();
        assert_eq!(response.verdict, Verdict::Negative);
        assert_eq!(response.confidence, 1.0);
        assert!(!response.cached);
        assert_eq!(orch.cache_write_failures(), 1);
    }

    #[test]
    fn test_not_ready_fails_fast_under_load() {
        let (orch, _cache, _dir) = orchestrator_with(None);
        let bytes = png(8, 8, 2);
        let start = Instant::now();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let err = orch.handle_request(&bytes).unwrap_err();
                    assert_eq!(err.kind(), "resource_not_ready");
                });
            }
        });
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cache_hit_served_while_not_ready() {
        let (orch, cache, _dir) = orchestrator_with(None);
        let bytes = png(6, 4, 3);
        let fingerprint = Fingerprint::of(&bytes).unwrap();
        cache
            .insert(
                &fingerprint,
                &NewEntry {
                    verdict: Verdict::Positive,
                    confidence: 0.667,
                    image_width: 6,
                    image_height: 4,
                    processing_time_ms: 42,
                },
            )
            .unwrap();

        let response = orch.handle_request(&bytes).unwrap();
        assert!(response.cached);
        assert_eq!(response.fingerprint, fingerprint.to_string());
        assert_eq!(response.processing_time_ms, 42);
    }

    #[test]
    fn test_racing_duplicates_both_classify() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = FakeBackend {
            presence: vec![],
            condition: vec![],
            calls: calls.clone(),
            delay: Duration::from_millis(30),
        };
        let (orch, cache, _dir) = orchestrator_with(Some(Box::new(backend)));
        let bytes = png(12, 12, 4);
        let barrier = Barrier::new(2);

        let responses: Vec<ClassificationResponse> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        orch.handle_request(&bytes).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(responses.iter().all(|r| !r.cached));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(cache.stats().unwrap().total_processed, 1);
        assert_eq!(orch.cache_write_failures(), 0);
    }

    #[test]
    fn test_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (orch, _cache, _dir) = orchestrator_with(Some(no_person_backend(calls.clone())));
        let image = png(10, 10, 5);

        let results = orch
            .handle_batch(vec![
                BatchInput {
                    filename: "a.png".into(),
                    content_type: Some("image/png".into()),
                    bytes: image.clone(),
                },
                BatchInput {
                    filename: "notes.txt".into(),
                    content_type: Some("text/plain".into()),
                    bytes: b"text".to_vec(),
                },
                BatchInput {
                    filename: "a-copy.png".into(),
                    content_type: None,
                    bytes: image,
                },
            ])
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], BatchItemResult::Classified { response, .. } if !response.cached));
        assert!(matches!(&results[1], BatchItemResult::Failed { filename, .. } if filename == "notes.txt"));
        assert!(matches!(&results[2], BatchItemResult::Classified { response, .. } if response.cached));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// Every lookup fails as if the database were unreadable.
    struct UnreadableCache;

    impl FingerprintCache for UnreadableCache {
        fn lookup(&self, _fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
            Err(Error::CacheReadFailure("disk I/O error".to_string()))
        }

        fn insert(&self, _fingerprint: &Fingerprint, _entry: &NewEntry) -> Result<bool> {
            Ok(true)
        }

        fn stats(&self) -> Result<CacheStats> {
            Err(Error::CacheReadFailure("disk I/O error".to_string()))
        }

        fn ping(&self) -> bool {
            false
        }
    }

    /// Fails every question with a verbose upstream error.
    struct BrokenBackend {
        calls: Arc<AtomicUsize>,
    }

    impl VisionBackend for BrokenBackend {
        fn ask(&mut self, _image: &DynamicImage, _question: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::ClassificationFailure(
                "API error 500 Internal: CUDA OOM at /opt/models/smol/weights.bin".to_string(),
            ))
        }
    }

    #[test]
    fn test_lookup_failure_skips_classification() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(ResourceGate::with_backend(no_person_backend(calls.clone())));
        let orch = Orchestrator::new(
            Arc::new(UnreadableCache),
            gate,
            EnsembleClassifier::default(),
        );

        let err = orch.handle_request(&png(8, 8, 6)).unwrap_err();
        assert_eq!(err.kind(), "cache_read_failure");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backend_failure_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = BrokenBackend { calls: calls.clone() };
        let (orch, cache, _dir) = orchestrator_with(Some(Box::new(backend)));
        let bytes = png(9, 9, 7);

        let err = orch.handle_request(&bytes).unwrap_err();
        assert_eq!(err.kind(), "classification_failure");
        // First failure aborts the remaining crops.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.lookup(&Fingerprint::of(&bytes).unwrap()).unwrap().is_none());
        assert_eq!(cache.stats().unwrap().total_processed, 0);
    }

    #[test]
    fn test_batch_errors_hide_internals() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = BrokenBackend { calls };
        let (orch, _cache, _dir) = orchestrator_with(Some(Box::new(backend)));

        let results = orch
            .handle_batch(vec![BatchInput {
                filename: "scene.png".into(),
                content_type: Some("image/png".into()),
                bytes: png(5, 5, 8),
            }])
            .unwrap();

        let json = serde_json::to_string(&results).unwrap();
        assert!(!json.contains("/opt/models"));
        assert!(!json.contains("CUDA"));
        assert!(matches!(
            &results[0],
            BatchItemResult::Failed { filename, error }
                if filename == "scene.png" && error == "classification failed"
        ));
    }

    #[test]
    fn test_batch_limits() {
        let (cold, _cache, _dir) = orchestrator_with(None);
        assert_eq!(cold.handle_batch(vec![]).unwrap_err().kind(), "resource_not_ready");

        let calls = Arc::new(AtomicUsize::new(0));
        let (orch, _cache2, _dir2) = orchestrator_with(Some(no_person_backend(calls)));
        let orch = orch.with_max_batch(1);
        let item = BatchInput {
            filename: "x.png".into(),
            content_type: None,
            bytes: png(2, 2, 0),
        };
        let err = orch.handle_batch(vec![item.clone(), item]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
