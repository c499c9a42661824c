//! Unified fetch orchestration
//!
//! Every fetch follows the same path:
//!
//! 1. Resolve the domain and fail fast if its circuit is open
//! 2. Look up a credential (unless skipped)
//! 3. Build the escalation plan: the initial backend (rule or forced)
//!    followed by every configured stronger backend
//! 4. For each planned backend: acquire a permit, call the adapter, report
//!    the outcome to the scheduler, release the permit
//! 5. Stop at the first acceptable result; a low-quality result buys
//!    exactly one escalation attempt
//!
//! Admission refusals (open circuit, admission timeout) stop the plan
//! without being reported back to the scheduler.

mod types;

pub use types::{FetchOptions, FetchResult, RawResult};

use crate::backend::{BackendHealth, BackendRequest, BackendSet, FetchBackend, PageContent, RawContent};
use crate::config::Config;
use crate::credentials::{CredentialProvider, NoCredentials, StaticCredentials};
use crate::scheduler::{DomainPermit, DomainScheduler};
use crate::strategy::{QualityEvaluator, QualityVerdict, ResolvedStrategy, Strategy, StrategyRules};
use crate::url::domain_of;
use crate::FetchError;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Default backend timeout when none is configured
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything one call needs, resolved once up front
struct Prepared {
    domain: String,
    plan: Vec<Strategy>,
    request: BackendRequest,
    authenticated: bool,
}

/// Page outcome kept while the plan is walked
struct Kept<T> {
    strategy: Strategy,
    content: T,
    escalated: bool,
}

/// Composes scheduler, rules, quality evaluator and backends
pub struct Orchestrator {
    scheduler: Arc<DomainScheduler>,
    rules: StrategyRules,
    quality: QualityEvaluator,
    backends: BackendSet,
    credentials: Arc<dyn CredentialProvider>,
    default_timeout: Duration,
}

impl Orchestrator {
    pub fn new(scheduler: Arc<DomainScheduler>, rules: StrategyRules, backends: BackendSet) -> Self {
        Self {
            scheduler,
            rules,
            quality: QualityEvaluator::default(),
            backends,
            credentials: Arc::new(NoCredentials),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builds the scheduler, rules, backends and credentials from config
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let scheduler = Arc::new(DomainScheduler::from_config(config)?);
        let orchestrator = Self::new(
            scheduler,
            StrategyRules::from_config(config),
            BackendSet::from_config(config)?,
        )
        .with_quality(QualityEvaluator::from_config(&config.strategy))
        .with_credentials(Arc::new(StaticCredentials::from_entries(&config.credentials)))
        .with_timeout(Duration::from_millis(config.fetch.timeout_ms));

        Ok(orchestrator)
    }

    pub fn with_quality(mut self, quality: QualityEvaluator) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The shared scheduler, for stats and runtime reconfiguration
    pub fn scheduler(&self) -> &Arc<DomainScheduler> {
        &self.scheduler
    }

    pub fn rules(&self) -> &StrategyRules {
        &self.rules
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Fetches a page, falling back and escalating across backends
    ///
    /// Never fails: errors are reported in the returned [`FetchResult`].
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        let started = Instant::now();
        let mut result = FetchResult::pending(url);

        let prepared = match self.prepare(url, options) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::debug!("Not fetching {}: {}", url, err);
                result.error = Some(err.to_string());
                result.duration_ms = elapsed_ms(started);
                return result;
            }
        };
        result.authenticated = prepared.authenticated;

        let mut kept: Option<Kept<PageContent>> = None;
        let mut failures = Vec::new();
        let mut stopped: Option<FetchError> = None;

        for (index, &strategy) in prepared.plan.iter().enumerate() {
            let has_next = index + 1 < prepared.plan.len();
            result.attempted.push(strategy);

            match self.attempt_page(strategy, &prepared, options).await {
                Ok(page) => {
                    if let Some(original) = kept.as_mut() {
                        // Escalation attempt: prefer it unless it came back empty
                        if page.is_empty() {
                            tracing::info!(
                                "{} escalation for {} returned nothing, keeping {} result",
                                strategy,
                                url,
                                original.strategy
                            );
                        } else {
                            *original = Kept {
                                strategy,
                                content: page,
                                escalated: true,
                            };
                        }
                        break;
                    }

                    let verdict =
                        self.quality
                            .evaluate(&page.html, &page.text, page.title.as_deref());
                    kept = Some(Kept {
                        strategy,
                        content: page,
                        escalated: false,
                    });

                    match verdict {
                        QualityVerdict::Escalate(reason) if has_next => {
                            tracing::info!(
                                "Escalating {} from {} to {}: {:?}",
                                url,
                                strategy,
                                prepared.plan[index + 1],
                                reason
                            );
                        }
                        _ => break,
                    }
                }
                Err(err) if err.is_admission() => {
                    stopped = Some(err);
                    break;
                }
                Err(err) => {
                    tracing::warn!("{} failed for {}: {}", strategy, url, err);
                    if is_auth_rejection(&err) && prepared.authenticated {
                        result.credential_likely_expired = true;
                    }
                    failures.push(format!("{}: {}", strategy, err));
                    if kept.is_some() {
                        break;
                    }
                }
            }
        }

        result.duration_ms = elapsed_ms(started);

        match (kept, stopped) {
            (Some(kept), _) => {
                result.success = true;
                result.strategy_used = Some(kept.strategy);
                result.escalated = kept.escalated;
                result.final_url = kept.content.final_url;
                result.title = kept.content.title;
                result.html_content = Some(kept.content.html);
                result.text_content = Some(kept.content.text);
                tracing::debug!(
                    "Fetched {} via {} in {}ms",
                    url,
                    kept.strategy,
                    result.duration_ms
                );
            }
            (None, Some(err)) => {
                result.error = Some(err.to_string());
            }
            (None, None) => {
                let err = FetchError::AllStrategiesExhausted {
                    url: url.to_string(),
                    attempts: failures,
                };
                tracing::warn!("{}", err);
                result.error = Some(err.to_string());
            }
        }

        if result.credential_likely_expired {
            tracing::warn!("Credential for {} looks expired", prepared.domain);
        }

        result
    }

    /// Fetches a resource without content extraction
    ///
    /// Uses the same admission and fallback machinery as [`fetch`](Self::fetch).
    /// An HTML body that is an unrendered shell is escalated once.
    ///
    /// # Errors
    ///
    /// * `FetchError::CircuitOpen` / `FetchError::AdmissionTimeout` - No
    ///   result was obtained before admission was refused
    /// * `FetchError::AllStrategiesExhausted` - Every planned backend failed
    pub async fn fetch_raw(&self, url: &str, options: &FetchOptions) -> Result<RawResult, FetchError> {
        let started = Instant::now();
        let prepared = self.prepare(url, options)?;

        let mut kept: Option<Kept<RawContent>> = None;
        let mut failures = Vec::new();
        let mut credential_likely_expired = false;

        for (index, &strategy) in prepared.plan.iter().enumerate() {
            let has_next = index + 1 < prepared.plan.len();

            match self.attempt_raw(strategy, &prepared, options).await {
                Ok(raw) => {
                    if let Some(original) = kept.as_mut() {
                        if !raw.body.trim().is_empty() {
                            *original = Kept {
                                strategy,
                                content: raw,
                                escalated: true,
                            };
                        }
                        break;
                    }

                    let shell = raw.is_html() && self.quality.is_likely_unrendered_shell(&raw.body);
                    kept = Some(Kept {
                        strategy,
                        content: raw,
                        escalated: false,
                    });
                    if !(shell && has_next) {
                        break;
                    }
                    tracing::info!("Raw body of {} is an unrendered shell, escalating", url);
                }
                Err(err) if err.is_admission() => {
                    if kept.is_none() {
                        return Err(err);
                    }
                    break;
                }
                Err(err) => {
                    tracing::warn!("{} raw fetch failed for {}: {}", strategy, url, err);
                    if is_auth_rejection(&err) && prepared.authenticated {
                        credential_likely_expired = true;
                    }
                    failures.push(format!("{}: {}", strategy, err));
                    if kept.is_some() {
                        break;
                    }
                }
            }
        }

        let Some(kept) = kept else {
            let err = FetchError::AllStrategiesExhausted {
                url: url.to_string(),
                attempts: failures,
            };
            tracing::warn!("{}", err);
            return Err(err);
        };

        Ok(RawResult {
            final_url: kept.content.final_url,
            body: kept.content.body,
            content_type: kept.content.content_type,
            status_code: kept.content.status,
            strategy_used: kept.strategy,
            duration_ms: elapsed_ms(started),
            authenticated: prepared.authenticated,
            credential_likely_expired,
            escalated: kept.escalated,
        })
    }

    /// Fetches many URLs concurrently
    ///
    /// No extra concurrency limit is applied; the scheduler gates each domain.
    /// Results are returned in input order.
    pub async fn fetch_batch(&self, urls: &[String], options: &FetchOptions) -> Vec<FetchResult> {
        tracing::debug!("Batch of {} URLs", urls.len());
        join_all(urls.iter().map(|url| self.fetch(url, options))).await
    }

    /// Queries every configured backend's health endpoint
    pub async fn health(&self) -> Vec<BackendHealth> {
        let checks = self.backends.available().into_iter().filter_map(|strategy| {
            self.backends.get(strategy).map(|backend| async move {
                backend
                    .health()
                    .await
                    .unwrap_or_else(|err| BackendHealth {
                        strategy,
                        available: false,
                        status: err.to_string(),
                        running: None,
                    })
            })
        });

        join_all(checks).await
    }

    fn prepare(&self, url: &str, options: &FetchOptions) -> Result<Prepared, FetchError> {
        let (parsed, domain) = domain_of(url)?;

        if self.scheduler.is_circuit_open(&domain) {
            let retry_after_ms = self
                .scheduler
                .domain_stats(&domain)
                .map_or(0, |stats| stats.circuit_remaining_ms);
            return Err(FetchError::CircuitOpen {
                domain,
                retry_after_ms,
            });
        }

        let cookie = self.credential_for(&parsed, options);
        let resolved = self.rules.resolve_domain(&domain);
        let initial = options.forced_strategy.unwrap_or(resolved.strategy);

        let plan: Vec<Strategy> = initial
            .escalation_path()
            .filter(|strategy| self.backends.is_available(*strategy))
            .collect();
        if plan.is_empty() {
            return Err(FetchError::BackendUnavailable(initial));
        }

        tracing::trace!("Plan for {}: {:?}", url, plan);

        Ok(Prepared {
            authenticated: cookie.is_some(),
            request: self.backend_request(parsed, resolved, options, cookie),
            domain,
            plan,
        })
    }

    fn credential_for(&self, url: &Url, options: &FetchOptions) -> Option<String> {
        if options.skip_credentials {
            return None;
        }

        let cookie = self.credentials.cookie_for_url(url);
        if cookie.is_none() && self.credentials.requires_auth(url) {
            tracing::warn!("{} requires authentication but no credential is configured", url);
        }
        cookie
    }

    fn backend_request(
        &self,
        url: Url,
        resolved: ResolvedStrategy,
        options: &FetchOptions,
        cookie: Option<String>,
    ) -> BackendRequest {
        BackendRequest {
            url,
            headers: resolved.headers,
            referer: options.referer.clone(),
            cookie,
            timeout: options.timeout.unwrap_or(self.default_timeout),
            needs_scroll: resolved.needs_scroll,
        }
    }

    /// Acquires a permit for one backend attempt
    async fn admit(
        &self,
        strategy: Strategy,
        prepared: &Prepared,
        options: &FetchOptions,
    ) -> Result<(Arc<dyn FetchBackend>, DomainPermit), FetchError> {
        let backend = self
            .backends
            .get(strategy)
            .cloned()
            .ok_or(FetchError::BackendUnavailable(strategy))?;

        let permit = self
            .scheduler
            .acquire_with_wait(&prepared.domain, options.admission_wait)
            .await?;

        tracing::debug!("Attempting {} via {}", prepared.request.url, strategy);
        Ok((backend, permit))
    }

    /// Reports one attempt's outcome; admission errors are not reported
    ///
    /// With `missing_ok`, a 404/410 is neither a success nor a failure.
    fn report<T>(&self, domain: &str, outcome: &Result<T, FetchError>, options: &FetchOptions) {
        match outcome {
            Ok(_) => self.scheduler.report_success(domain),
            Err(err) if options.missing_ok && matches!(err.status(), Some(404) | Some(410)) => {
                tracing::debug!("{} reported missing resource, not counted", domain);
            }
            Err(err) if err.is_site_failure() => self.scheduler.report_failure(domain),
            Err(_) => {}
        }
    }

    async fn attempt_page(
        &self,
        strategy: Strategy,
        prepared: &Prepared,
        options: &FetchOptions,
    ) -> Result<PageContent, FetchError> {
        let (backend, permit) = self.admit(strategy, prepared, options).await?;
        let outcome = backend.fetch_page(&prepared.request).await;
        self.report(&prepared.domain, &outcome, options);
        drop(permit);
        outcome
    }

    async fn attempt_raw(
        &self,
        strategy: Strategy,
        prepared: &Prepared,
        options: &FetchOptions,
    ) -> Result<RawContent, FetchError> {
        let (backend, permit) = self.admit(strategy, prepared, options).await?;
        let outcome = backend.fetch_raw(&prepared.request).await;
        self.report(&prepared.domain, &outcome, options);
        drop(permit);
        outcome
    }
}

fn is_auth_rejection(err: &FetchError) -> bool {
    matches!(err.status(), Some(401) | Some(403))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
