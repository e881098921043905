//! Mock collaborators and helpers for pipeline tests

use super::{Collaborators, Pipeline};
use crate::config::Config;
use crate::conversion::Converter;
use crate::delivery::{Mailer, OutgoingMail};
use crate::error::{DeliveryError, FetchError, GenerationError};
use crate::extraction::{Extractor, NormalizedDocument};
use crate::types::{Event, JobKey};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};

pub(crate) const MOCK_TITLE: &str = "Mock Article";

/// How a mock collaborator responds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Extractor whose outcome depends on the URL path
///
/// `/fail` fails, `/panic` panics, anything else succeeds. An optional gate
/// holds every call until a permit is added.
#[derive(Default)]
pub(crate) struct MockExtractor {
    pub(crate) calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
}

impl MockExtractor {
    pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, url: &url::Url) -> Result<NormalizedDocument, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match url.path() {
            "/fail" => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
            "/panic" => panic!("extractor exploded"),
            _ => Ok(NormalizedDocument::new(MOCK_TITLE, "<p>Mock body.</p>")),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Converter that writes a `.mobi` next to the document
pub(crate) struct MockConverter {
    behavior: Behavior,
    pub(crate) calls: AtomicUsize,
    pub(crate) last_document: Mutex<Option<String>>,
}

impl MockConverter {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_document: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Converter for MockConverter {
    async fn convert(&self, document: &Path) -> Result<PathBuf, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let html = tokio::fs::read_to_string(document).await.unwrap();
        *self.last_document.lock().unwrap() = Some(html);

        match self.behavior {
            Behavior::Succeed => {
                let output = document.with_extension("mobi");
                tokio::fs::write(&output, b"MOBI").await.unwrap();
                Ok(output)
            }
            Behavior::Fail => Err(GenerationError::Failed {
                code: Some(1),
                output: "Error(prcgen): mock failure".into(),
            }),
            Behavior::Panic => panic!("converter exploded"),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A mail the mock mailer accepted
#[derive(Clone, Debug)]
pub(crate) struct SentMail {
    pub(crate) to: String,
    pub(crate) subject: String,
    pub(crate) attachment: PathBuf,
    pub(crate) attachment_existed: bool,
}

/// Mailer that records what it was asked to send
pub(crate) struct MockMailer {
    behavior: Behavior,
    pub(crate) sent: Mutex<Vec<SentMail>>,
}

impl MockMailer {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingMail<'_>) -> Result<(), DeliveryError> {
        match self.behavior {
            Behavior::Succeed => {
                self.sent.lock().unwrap().push(SentMail {
                    to: mail.to.to_string(),
                    subject: mail.subject.to_string(),
                    attachment: mail.attachment.to_path_buf(),
                    attachment_existed: mail.attachment.exists(),
                });
                Ok(())
            }
            Behavior::Fail => Err(DeliveryError::Rejected {
                status: 500,
                body: "mock failure".into(),
            }),
            Behavior::Panic => panic!("mailer exploded"),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Mocks plus the pipeline wired to them
pub(crate) struct TestPipeline {
    pub(crate) pipeline: Pipeline,
    pub(crate) extractor: Arc<MockExtractor>,
    pub(crate) converter: Arc<MockConverter>,
    pub(crate) mailer: Arc<MockMailer>,
    pub(crate) events: broadcast::Receiver<Event>,
    pub(crate) work_dir: PathBuf,
    _dir: tempfile::TempDir,
}

/// Config with a temporary work directory and short timeouts
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.pipeline.work_dir = dir.join("work");
    config.pipeline.shutdown_timeout = Duration::from_secs(5);
    config.validation.blacklist = vec!["blocked.example".to_string()];
    config
}

pub(crate) async fn start_with(
    extractor: MockExtractor,
    converter: Behavior,
    mailer: Behavior,
    configure: impl FnOnce(&mut Config),
) -> TestPipeline {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    configure(&mut config);
    let work_dir = config.pipeline.work_dir.clone();

    let extractor = Arc::new(extractor);
    let converter = Arc::new(MockConverter::new(converter));
    let mailer = Arc::new(MockMailer::new(mailer));
    let collaborators = Collaborators {
        extractor: extractor.clone(),
        converter: converter.clone(),
        mailer: mailer.clone(),
    };

    let pipeline = Pipeline::start(config, collaborators).await.unwrap();
    let events = pipeline.subscribe();

    TestPipeline {
        pipeline,
        extractor,
        converter,
        mailer,
        events,
        work_dir,
        _dir: dir,
    }
}

pub(crate) async fn start(converter: Behavior, mailer: Behavior) -> TestPipeline {
    start_with(MockExtractor::default(), converter, mailer, |_| {}).await
}

/// Collect `count` Cleaned events as (key, delivered) pairs
pub(crate) async fn cleaned(
    events: &mut broadcast::Receiver<Event>,
    count: usize,
) -> Vec<(JobKey, bool)> {
    let collect = async {
        let mut cleaned = Vec::new();
        while cleaned.len() < count {
            if let Event::Cleaned { key, delivered } = events.recv().await.unwrap() {
                cleaned.push((key, delivered));
            }
        }
        cleaned
    };
    tokio::time::timeout(Duration::from_secs(10), collect)
        .await
        .expect("timed out waiting for jobs to be cleaned")
}

/// Poll until `condition` holds
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
