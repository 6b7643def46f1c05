//! Harvest orchestration.
//!
//! A single control loop drives categories, keywords, and pages in order.
//! Each page's surviving candidates are fanned out to a bounded worker pool
//! and the loop blocks until the whole batch has settled before it advances,
//! so quota counters only ever see the control thread. Reaching a quota stops
//! further dispatch; it does not cancel downloads already in flight, which is
//! why a category may land slightly past its target.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info};

use crate::harvest::config_loader::{ConfigError, ConfigManager};
use crate::harvest::dedup::UrlDeduplicator;
use crate::harvest::download_engine::{DownloadEngine, DownloadOutcome};
use crate::harvest::query_planner::{Category, QueryPlanner};
use crate::harvest::quota::{QuotaTracker, count_existing_files};
use crate::harvest::search_client::SearchClient;

/// Error types for the harvest run
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error(
        "Search credentials are not configured; edit search.toml or set GOOGLE_API_KEY and GOOGLE_CX"
    )]
    Credentials,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for the harvest run
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Aggregate figures for one run. The grand total counts what the run left
/// behind: images downloaded this run plus the on-disk counts of categories
/// that were already satisfied and skipped.
#[derive(Debug, Default, Clone)]
pub struct HarvestSummary {
    pub grand_total: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub skipped_categories: usize,
}

/// Drives the whole harvest: categories, keywords, pages, download batches.
pub struct Harvester {
    search_client: SearchClient,
    download_engine: Arc<DownloadEngine>,
    dedup: Arc<UrlDeduplicator>,
    quota: QuotaTracker,
    planner: QueryPlanner,
    categories: Vec<Category>,
    keywords: Vec<String>,
    root_dir: PathBuf,
    download_slots: Arc<Semaphore>,
    page_sleep: Duration,
}

impl Harvester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search_client: SearchClient,
        download_engine: DownloadEngine,
        categories: Vec<Category>,
        keywords: Vec<String>,
        planner: QueryPlanner,
        root_dir: PathBuf,
        download_workers: usize,
        page_sleep: Duration,
    ) -> Self {
        Self {
            search_client,
            download_engine: Arc::new(download_engine),
            dedup: Arc::new(UrlDeduplicator::new()),
            quota: QuotaTracker::new(),
            planner,
            categories,
            keywords,
            root_dir,
            download_slots: Arc::new(Semaphore::new(download_workers.max(1))),
            page_sleep,
        }
    }

    /// Builds the harvester from loaded configuration. Placeholder
    /// credentials abort here, before any request is issued.
    pub fn from_config(config: &ConfigManager) -> HarvestResult<Self> {
        if !config.has_valid_credentials() {
            return Err(HarvestError::Credentials);
        }

        let app_config = config.app_config();
        let search_config = config.search_config();

        let client = Client::builder()
            .user_agent(concat!("breed_harvester/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(app_config.rate.request_timeout_secs))
            .build()?;

        let search_client = SearchClient::from_config(client.clone(), app_config, search_config);
        let download_engine = DownloadEngine::new(client, app_config.pools.write_buffer_bytes);

        let root_dir = PathBuf::from(&app_config.paths.root_dir);
        let categories = search_config
            .query
            .categories
            .iter()
            .map(|name| Category::new(name, &root_dir, search_config.query.quota))
            .collect();
        let planner = QueryPlanner::new(
            app_config.limits.page_size,
            app_config.limits.per_query_cap,
        );

        Ok(Self::new(
            search_client,
            download_engine,
            categories,
            search_config.query.keywords.clone(),
            planner,
            root_dir,
            app_config.pools.download_workers,
            Duration::from_millis(app_config.rate.page_sleep_ms),
        ))
    }

    /// Runs the harvest over every configured category and returns the
    /// aggregate figures.
    pub async fn run(&self) -> HarvestResult<HarvestSummary> {
        let mut summary = HarvestSummary::default();
        tokio::fs::create_dir_all(&self.root_dir).await?;

        for category in &self.categories {
            tokio::fs::create_dir_all(&category.output_dir).await?;

            // The disk is the sole source of cross-run state.
            let on_disk = count_existing_files(&category.output_dir)?;
            self.quota.seed(&category.slug, category.quota, on_disk);

            if self.quota.is_satisfied(&category.slug) {
                info!(
                    "{} already has {} images (quota {}), skipping",
                    category.name, on_disk, category.quota
                );
                summary.grand_total += on_disk;
                summary.skipped_categories += 1;
                continue;
            }

            info!(
                "{}: {} of {} images on disk, harvesting the rest",
                category.name, on_disk, category.quota
            );
            let progress = self.category_progress(category, on_disk);

            for keyword in &self.keywords {
                if self.quota.is_satisfied(&category.slug) {
                    break;
                }

                let query = format!("{} {}", category.name, keyword);
                let mut keyword_got = 0usize;

                for page in self.planner.plan(&query) {
                    if self.quota.is_satisfied(&category.slug) {
                        break;
                    }

                    let items = self.search_client.search(&page.query, page.start_index).await;
                    if items.is_empty() {
                        // End of results for this keyword, including the
                        // degraded retries-exhausted case.
                        break;
                    }

                    let batch: Vec<String> = items
                        .into_iter()
                        .map(|item| item.link)
                        .filter(|url| self.dedup.claim(url))
                        .collect();

                    let outcomes = self
                        .download_batch(batch, &category.output_dir, &progress)
                        .await;
                    for outcome in &outcomes {
                        if outcome.success {
                            self.quota.record_success(&category.slug);
                            keyword_got += 1;
                            summary.downloaded += 1;
                            summary.grand_total += 1;
                        } else {
                            summary.failed += 1;
                        }
                    }

                    if self.quota.is_satisfied(&category.slug) {
                        break;
                    }
                    sleep(self.page_sleep).await;
                }

                info!(
                    "[{}] '{}' -> +{} images, total {}/{}",
                    category.name,
                    keyword,
                    keyword_got,
                    self.quota.count(&category.slug),
                    category.quota
                );
            }

            progress.finish_and_clear();
            info!(
                "Finished {}: {}/{} images in {}",
                category.name,
                self.quota.count(&category.slug),
                category.quota,
                category.output_dir.display()
            );
        }

        info!(
            "Harvest complete: {} images across {} categories ({} downloaded this run, {} failed)",
            summary.grand_total,
            self.categories.len(),
            summary.downloaded,
            summary.failed
        );
        Ok(summary)
    }

    /// Fans one page's claimed URLs out to the worker pool and waits for the
    /// whole batch. Completion order within the batch is unspecified.
    async fn download_batch(
        &self,
        urls: Vec<String>,
        dest_dir: &Path,
        progress: &ProgressBar,
    ) -> Vec<DownloadOutcome> {
        let mut join_set = JoinSet::new();
        for url in urls {
            let slots = self.download_slots.clone();
            let engine = self.download_engine.clone();
            let dest = dest_dir.to_path_buf();
            let progress = progress.clone();
            join_set.spawn(async move {
                let _permit = slots.acquire_owned().await.unwrap();
                let outcome = engine.fetch(&url, &dest).await;
                if outcome.success {
                    progress.inc(1);
                }
                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Download worker failed to join: {}", e);
                    outcomes.push(DownloadOutcome::failure());
                }
            }
        }
        outcomes
    }

    fn category_progress(&self, category: &Category, on_disk: usize) -> ProgressBar {
        let progress_style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {prefix}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");

        let progress = ProgressBar::new(category.quota as u64);
        progress.set_style(progress_style);
        progress.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
        progress.set_prefix(category.name.clone());
        progress.set_position(on_disk as u64);
        progress
    }
}
