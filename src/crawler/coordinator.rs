//! Crawler coordinator - run orchestration
//!
//! This module owns one run from login to logout:
//! - Resolving the requested sections
//! - Logging in and keeping the session alive
//! - Driving each section's [`CrawlController`] page by page
//! - Passing every new post through parse, classify, anonymize and aggregate
//! - Honoring cancellation and the run time limit between page fetches
//! - Optionally running one independent worker per section

use crate::analysis::{Aggregator, Anonymizer, Classifier, InsightAnalyzer, Insights, Summary};
use crate::config::{Config, Credentials};
use crate::crawler::controller::{crawl, CrawlController};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::PostParser;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::session::SessionManager;
use crate::post::{Post, Section};
use crate::state::TerminationReason;
use crate::ForumError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How one section's crawl ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionReport {
    pub section: Section,
    pub outcome: TerminationReason,
    pub pages_fetched: u32,

    /// New posts kept from this section
    pub posts: usize,

    /// Posts dropped because their id was already seen in this section
    pub duplicates: usize,

    pub detail: Option<String>,
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub posts: Vec<Post>,
    pub summary: Summary,
    pub insights: Insights,
    pub sections: Vec<SectionReport>,

    /// Set when an authentication failure ended the run early
    pub aborted: bool,
    pub abort_reason: Option<String>,
}

impl RunReport {
    /// Number of sections that ended for a reason other than a natural end
    pub fn abandoned_sections(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.outcome.is_abandoned())
            .count()
    }
}

/// Main run coordinator
pub struct Coordinator {
    config: Arc<Config>,
    classifier: Arc<Classifier>,
    insights: InsightAnalyzer,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator for a validated configuration
    pub fn new(config: Config) -> Self {
        let classifier = Arc::new(Classifier::new(&config.classifier));
        let insights = InsightAnalyzer::new(&config.insights);
        Self {
            config: Arc::new(config),
            classifier,
            insights,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned token (e.g. wired to Ctrl-C)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the configured mode: sequential or one worker per section
    pub async fn execute(
        &self,
        credentials: &Credentials,
        sections: &[String],
    ) -> Result<RunReport, ForumError> {
        if self.config.crawler.parallel_sections {
            self.run_parallel(credentials, sections).await
        } else {
            self.run(credentials, sections).await
        }
    }

    /// Crawls the sections one after another through a single session
    ///
    /// # Arguments
    ///
    /// * `credentials` - Forum account to log in with
    /// * `sections` - Section names; empty means every configured section
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run finished, possibly aborted by an
    ///   authentication failure (see [`RunReport::aborted`])
    /// * `Err(ForumError)` - Unknown section or unusable configuration; no
    ///   request was made
    pub async fn run(
        &self,
        credentials: &Credentials,
        sections: &[String],
    ) -> Result<RunReport, ForumError> {
        let sections = self.resolve(sections)?;
        let started_at = Utc::now();
        let deadline = self.deadline();

        tracing::info!(
            "Starting run over {} section(s): {}",
            sections.len(),
            section_list(&sections)
        );

        let mut worker = Worker::new(
            Arc::clone(&self.config),
            Arc::clone(&self.classifier),
            Anonymizer::from_config(&self.config.privacy),
            self.cancel.clone(),
            deadline,
        )?;

        if let Err(e) = worker.login(credentials).await {
            return match e {
                ForumError::AuthFailure { .. } => Ok(self.aborted_report(started_at, e)),
                other => Err(other),
            };
        }

        for section in sections {
            if worker.abort_reason.is_some() {
                break;
            }
            worker.crawl_section(section).await?;
        }

        let output = worker.finish().await;
        Ok(self.assemble(started_at, vec![output]))
    }

    /// Crawls every section in its own task with its own session and limiter
    ///
    /// Tokens agree across workers (shared salt), but each worker only
    /// redacts usernames it has seen itself. An authentication failure in
    /// one worker cancels the others between pages.
    pub async fn run_parallel(
        &self,
        credentials: &Credentials,
        sections: &[String],
    ) -> Result<RunReport, ForumError> {
        let sections = self.resolve(sections)?;
        let started_at = Utc::now();
        let deadline = self.deadline();
        let run_token = self.cancel.child_token();
        let anonymizer = Anonymizer::from_config(&self.config.privacy);

        tracing::info!(
            "Starting parallel run over {} section(s): {}",
            sections.len(),
            section_list(&sections)
        );

        let mut tasks = JoinSet::new();
        for (index, section) in sections.into_iter().enumerate() {
            let mut worker = Worker::new(
                Arc::clone(&self.config),
                Arc::clone(&self.classifier),
                anonymizer.fork(),
                run_token.clone(),
                deadline,
            )?;
            let credentials = credentials.clone();
            let run_token = run_token.clone();

            tasks.spawn(async move {
                match worker.login(&credentials).await {
                    Ok(()) => {
                        if let Err(e) = worker.crawl_section(section).await {
                            tracing::error!("Worker for section failed: {}", e);
                        }
                    }
                    Err(e) => worker.abort(e),
                }
                if worker.abort_reason.is_some() {
                    run_token.cancel();
                }
                (index, worker.finish().await)
            });
        }

        let mut outputs = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(output) => outputs.push(output),
                Err(e) => tracing::error!("Section worker panicked: {}", e),
            }
        }
        outputs.sort_by_key(|(index, _)| *index);

        Ok(self.assemble(
            started_at,
            outputs.into_iter().map(|(_, output)| output).collect(),
        ))
    }

    fn resolve(&self, names: &[String]) -> Result<Vec<Section>, ForumError> {
        let sections = if names.is_empty() {
            self.config.all_sections()
        } else {
            self.config.resolve_sections(names)?
        };

        // Unusable page templates fail here, before the first request
        for section in &sections {
            crawl(&self.config, section.clone(), self.config.crawler.max_pages)?;
        }
        Ok(sections)
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .crawler
            .max_run_time_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs))
    }

    fn aborted_report(&self, started_at: DateTime<Utc>, error: ForumError) -> RunReport {
        tracing::error!("Run aborted: {}", error);
        RunReport {
            started_at,
            finished_at: Utc::now(),
            posts: Vec::new(),
            summary: Summary::empty(self.config.output.high_engagement_threshold),
            insights: Insights::default(),
            sections: Vec::new(),
            aborted: true,
            abort_reason: Some(error.to_string()),
        }
    }

    fn assemble(&self, started_at: DateTime<Utc>, outputs: Vec<WorkerOutput>) -> RunReport {
        let mut aggregator = Aggregator::new(self.config.output.high_engagement_threshold);
        let mut posts = Vec::new();
        let mut sections = Vec::new();
        let mut abort_reason = None;

        for output in outputs {
            aggregator.merge(&output.aggregator);
            posts.extend(output.posts);
            sections.extend(output.sections);
            if abort_reason.is_none() {
                abort_reason = output.abort_reason;
            }
        }

        let insights = self.insights.analyze(&posts);
        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            posts,
            summary: aggregator.summary(),
            insights,
            sections,
            aborted: abort_reason.is_some(),
            abort_reason,
        };

        tracing::info!(
            "Run finished: {} posts from {} section(s), {} abandoned{}",
            report.posts.len(),
            report.sections.len(),
            report.abandoned_sections(),
            if report.aborted { ", aborted" } else { "" }
        );
        report
    }
}

fn section_list(sections: &[Section]) -> String {
    sections
        .iter()
        .map(Section::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What a worker hands back when it is done
struct WorkerOutput {
    posts: Vec<Post>,
    aggregator: Aggregator,
    sections: Vec<SectionReport>,
    abort_reason: Option<String>,
}

/// One session's worth of pipeline state
struct Worker {
    config: Arc<Config>,
    classifier: Arc<Classifier>,
    fetcher: PageFetcher,
    anonymizer: Anonymizer,
    aggregator: Aggregator,
    seen: HashSet<(Section, String)>,
    posts: Vec<Post>,
    sections: Vec<SectionReport>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    abort_reason: Option<String>,
}

impl Worker {
    fn new(
        config: Arc<Config>,
        classifier: Arc<Classifier>,
        anonymizer: Anonymizer,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Self, ForumError> {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let session = SessionManager::new(&config, limiter)?;
        let fetcher = PageFetcher::new(session, &config);
        let aggregator = Aggregator::new(config.output.high_engagement_threshold);

        Ok(Self {
            config,
            classifier,
            fetcher,
            anonymizer,
            aggregator,
            seen: HashSet::new(),
            posts: Vec::new(),
            sections: Vec::new(),
            cancel,
            deadline,
            abort_reason: None,
        })
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<(), ForumError> {
        self.fetcher.session_mut().login(credentials).await
    }

    fn abort(&mut self, error: ForumError) {
        tracing::error!("Run aborted: {}", error);
        self.abort_reason = Some(error.to_string());
    }

    fn should_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                tracing::warn!("Maximum run time reached");
                true
            }
            _ => false,
        }
    }

    /// Walks one section until its controller stops
    async fn crawl_section(&mut self, section: Section) -> Result<(), ForumError> {
        let mut controller = crawl(&self.config, section.clone(), self.config.crawler.max_pages)?;
        let parser = PostParser::new(self.config.base_url()?);
        self.aggregator.register(&section);
        let mut duplicates = 0;

        tracing::info!("Crawling section {}", section);

        loop {
            if self.should_stop() {
                controller.cancel();
            }
            let Some(request) = controller.next_page() else {
                break;
            };

            if let Err(e) = self.ensure_session().await {
                controller.record_error(&e);
                self.abort(e);
                break;
            }

            let body = match self.fetcher.fetch(&request.url).await {
                Ok(body) => body,
                Err(e) => {
                    controller.record_error(&e);
                    if matches!(e, ForumError::AuthFailure { .. }) {
                        self.abort(e);
                        break;
                    }
                    continue;
                }
            };

            match parser.parse(&body, &section) {
                Ok(posts) => {
                    let found = posts.len();
                    let mut kept = 0;
                    for post in posts {
                        if self.accept(post) {
                            kept += 1;
                        }
                    }
                    duplicates += found - kept;
                    tracing::debug!(
                        "Page {} of {}: {} posts, {} new",
                        request.page,
                        section,
                        found,
                        kept
                    );
                    controller.record_page(kept);
                }
                Err(e) => {
                    tracing::warn!("Skipping page {} of {}: {}", request.page, section, e);
                    controller.skip_page();
                }
            }
        }

        self.sections.push(section_report(controller, duplicates));
        Ok(())
    }

    /// Renews a session that timed out before the next page request
    async fn ensure_session(&mut self) -> Result<(), ForumError> {
        if self.fetcher.session().is_valid() {
            return Ok(());
        }
        tracing::info!("Session no longer valid, logging in again");
        self.fetcher.session_mut().reauthenticate().await
    }

    /// Runs one post through the pipeline; false for a repeat
    fn accept(&mut self, post: Post) -> bool {
        let key = (post.section.clone(), post.post_id.clone());
        if !self.seen.insert(key) {
            return false;
        }

        let post = self.classifier.classify(post);
        let post = self.anonymizer.anonymize(post);
        self.aggregator.fold(&post);
        self.posts.push(post);
        true
    }

    async fn finish(mut self) -> WorkerOutput {
        self.fetcher.session_mut().logout().await;
        WorkerOutput {
            posts: self.posts,
            aggregator: self.aggregator,
            sections: self.sections,
            abort_reason: self.abort_reason,
        }
    }
}

fn section_report(controller: CrawlController, duplicates: usize) -> SectionReport {
    let state = controller.into_state();
    let outcome = state.termination.unwrap_or(TerminationReason::Cancelled);
    tracing::info!(
        "Section {} finished ({}): {} pages, {} posts",
        state.section,
        outcome,
        state.pages_fetched,
        state.posts_collected
    );

    SectionReport {
        section: state.section,
        outcome,
        pages_fetched: state.pages_fetched,
        posts: state.posts_collected,
        duplicates,
        detail: state.detail,
    }
}
