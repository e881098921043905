//! The three forward stages: extract, convert, email

use super::worker::{CleanupTicket, StageOutcome, StageWorker};
use crate::conversion::Converter;
use crate::delivery::{Mailer, OutgoingMail};
use crate::extraction::{Extractor, readability};
use crate::types::{Event, Job, Stage};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub(crate) const EXTRACTING: &str = "Extracting...";
pub(crate) const CONVERTING: &str = "Converting...";
pub(crate) const SENDING: &str = "Sending...";
pub(crate) const DELIVERED: &str = "Done! Your article should arrive shortly.";

const MAX_SLUG_LEN: usize = 60;

/// A job whose article has been written to its workspace
#[derive(Debug)]
pub(crate) struct Extracted {
    pub(crate) job: Job,
    pub(crate) title: String,
    pub(crate) document: PathBuf,
}

/// A job whose e-book has been generated
#[derive(Debug)]
pub(crate) struct Converted {
    pub(crate) job: Job,
    pub(crate) title: String,
    pub(crate) ebook: PathBuf,
}

/// File-name-safe rendering of an article title
pub(crate) fn slug(title: &str) -> String {
    let mut slug = String::new();
    for word in title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.extend(word.chars().flat_map(char::to_lowercase));
        if slug.chars().count() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "article".to_string()
    } else {
        slug.to_string()
    }
}

/// Fetches (or takes client-supplied) content and writes the normalized document
pub(crate) struct ExtractStage {
    extractor: Arc<dyn Extractor>,
}

impl ExtractStage {
    pub(crate) fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl StageWorker for ExtractStage {
    type Input = Job;
    type Output = Extracted;
    const STAGE: Stage = Stage::Extract;

    fn job(input: &Job) -> &Job {
        input
    }

    async fn process(&self, job: Job) -> StageOutcome<Extracted> {
        job.progress().report(EXTRACTING);

        let document = match job.content() {
            Some(content) => {
                debug!(job = %job.key(), "using client-supplied content");
                readability::normalize_blocking(content.to_string(), job.url().clone()).await
            }
            None => {
                debug!(job = %job.key(), extractor = self.extractor.name(), url = %job.url(), "fetching article");
                self.extractor.extract(job.url()).await
            }
        };
        let document = match document {
            Ok(document) => document,
            Err(e) => return StageOutcome::divert(job, e),
        };

        if let Err(e) = tokio::fs::create_dir_all(job.workspace()).await {
            return StageOutcome::divert(job, e);
        }
        let path = job
            .workspace()
            .join(format!("{}.html", slug(&document.title)));
        if let Err(e) = tokio::fs::write(&path, document.to_html()).await {
            return StageOutcome::divert(job, e);
        }

        debug!(job = %job.key(), title = %document.title, path = %path.display(), "article extracted");
        StageOutcome::Forward(Extracted {
            job,
            title: document.title,
            document: path,
        })
    }
}

/// Runs the e-book generator on the extracted document
pub(crate) struct ConvertStage {
    converter: Arc<dyn Converter>,
}

impl ConvertStage {
    pub(crate) fn new(converter: Arc<dyn Converter>) -> Self {
        Self { converter }
    }
}

#[async_trait]
impl StageWorker for ConvertStage {
    type Input = Extracted;
    type Output = Converted;
    const STAGE: Stage = Stage::Convert;

    fn job(input: &Extracted) -> &Job {
        &input.job
    }

    async fn process(&self, input: Extracted) -> StageOutcome<Converted> {
        let Extracted {
            job,
            title,
            document,
        } = input;
        job.progress().report(CONVERTING);

        match self.converter.convert(&document).await {
            Ok(ebook) => {
                debug!(job = %job.key(), converter = self.converter.name(), ebook = %ebook.display(), "article converted");
                StageOutcome::Forward(Converted { job, title, ebook })
            }
            Err(e) => StageOutcome::divert(job, e),
        }
    }
}

/// Mails the generated e-book
///
/// Both outcomes end at Cleanup: success forwards a delivered ticket,
/// failure diverts.
pub(crate) struct EmailStage {
    mailer: Arc<dyn Mailer>,
    event_tx: broadcast::Sender<Event>,
}

impl EmailStage {
    pub(crate) fn new(mailer: Arc<dyn Mailer>, event_tx: broadcast::Sender<Event>) -> Self {
        Self { mailer, event_tx }
    }
}

#[async_trait]
impl StageWorker for EmailStage {
    type Input = Converted;
    type Output = CleanupTicket;
    const STAGE: Stage = Stage::Email;

    fn job(input: &Converted) -> &Job {
        &input.job
    }

    async fn process(&self, input: Converted) -> StageOutcome<CleanupTicket> {
        let Converted { job, title, ebook } = input;
        job.progress().report(SENDING);

        let mail = OutgoingMail {
            to: job.email(),
            subject: &title,
            attachment: &ebook,
        };
        if let Err(e) = self.mailer.send(mail).await {
            return StageOutcome::divert(job, e);
        }

        job.progress().report(DELIVERED);
        info!(job = %job.key(), mailer = self.mailer.name(), "article delivered");
        self.event_tx.send(Event::Delivered { key: job.key() }).ok();
        StageOutcome::Forward(CleanupTicket::delivered(job))
    }
}
