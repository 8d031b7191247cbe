use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use challenge_core::{RewardCatalog, StatsCalculator};
use challenge_persistence::{CompletionStore, LocalCompletionStore, StoreError};
use challenge_types::{ChallengeCompletion, DateRange, StatsReport, StatsSource, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum StatsOutcome {
    Fresh(StatsReport),
    /// A newer request for the same user started before this one finished;
    /// this is the newer request's report.
    Superseded(StatsReport),
}

impl StatsOutcome {
    pub fn report(&self) -> &StatsReport {
        match self {
            StatsOutcome::Fresh(report) | StatsOutcome::Superseded(report) => report,
        }
    }

    pub fn into_report(self) -> StatsReport {
        match self {
            StatsOutcome::Fresh(report) | StatsOutcome::Superseded(report) => report,
        }
    }
}

type ReportWatch = watch::Receiver<Option<StatsReport>>;

struct InFlight {
    generation: u64,
    /// Hands the older request the newer one's result.
    supersede: oneshot::Sender<ReportWatch>,
}

struct Ticket {
    generation: u64,
    superseded: oneshot::Receiver<ReportWatch>,
    done: watch::Sender<Option<StatsReport>>,
}

enum Race {
    Fetched(StatsReport),
    Superseded(Option<ReportWatch>),
}

pub struct ChallengeStatsService {
    authoritative: Arc<dyn CompletionStore>,
    fallback: Arc<dyn CompletionStore>,
    mirror: Option<Arc<LocalCompletionStore>>,
    catalog: Arc<RewardCatalog>,
    calculator: StatsCalculator,
    fetch_timeout: Duration,
    window_days: u32,
    in_flight: DashMap<UserId, InFlight>,
    generations: AtomicU64,
}

impl ChallengeStatsService {
    pub fn new(
        authoritative: Arc<dyn CompletionStore>,
        fallback: Arc<dyn CompletionStore>,
        catalog: Arc<RewardCatalog>,
        calculator: StatsCalculator,
    ) -> Self {
        Self {
            authoritative,
            fallback,
            mirror: None,
            catalog,
            calculator,
            fetch_timeout: Duration::from_secs(3),
            window_days: 30,
            in_flight: DashMap::new(),
            generations: AtomicU64::new(0),
        }
    }

    /// Copy every successful authoritative fetch into `local`, so the
    /// fallback path has recent data the next time it is needed.
    pub fn with_mirror(mut self, local: Arc<LocalCompletionStore>) -> Self {
        self.mirror = Some(local);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn default_range(&self, now: DateTime<Utc>) -> DateRange {
        DateRange::last_days(self.calculator.clock().day_key(now), self.window_days)
    }

    pub async fn get_stats(&self, user_id: UserId, range: Option<DateRange>) -> StatsOutcome {
        self.get_stats_at(user_id, range, Utc::now()).await
    }

    /// Stats for `user_id` over `range` (default: the configured window
    /// ending today). Store failures degrade the report instead of
    /// surfacing as errors. When a newer request for the same user starts,
    /// this one stops fetching and answers with the newer request's report.
    pub async fn get_stats_at(
        &self,
        user_id: UserId,
        range: Option<DateRange>,
        now: DateTime<Utc>,
    ) -> StatsOutcome {
        let range = range.unwrap_or_else(|| self.default_range(now));
        let Ticket {
            generation,
            mut superseded,
            done,
        } = self.begin(user_id);

        let race = tokio::select! {
            biased;
            newer = &mut superseded => Race::Superseded(newer.ok()),
            report = self.fetch_report(user_id, range, now) => Race::Fetched(report),
        };

        let outcome = match race {
            Race::Fetched(report) if self.is_current(user_id, generation) => {
                StatsOutcome::Fresh(report)
            }
            // Overtaken after the fetch finished.
            Race::Fetched(report) => match superseded.await {
                Ok(newer) => self.follow(user_id, generation, newer, range, now).await,
                Err(_) => StatsOutcome::Fresh(report),
            },
            Race::Superseded(Some(newer)) => {
                self.follow(user_id, generation, newer, range, now).await
            }
            Race::Superseded(None) => {
                StatsOutcome::Fresh(self.fetch_report(user_id, range, now).await)
            }
        };

        self.in_flight
            .remove_if(&user_id, |_, in_flight| in_flight.generation == generation);
        done.send_replace(Some(outcome.report().clone()));
        outcome
    }

    /// Wait for the newer request's report. If it was abandoned before
    /// finishing, fetch again.
    async fn follow(
        &self,
        user_id: UserId,
        generation: u64,
        mut newer: ReportWatch,
        range: DateRange,
        now: DateTime<Utc>,
    ) -> StatsOutcome {
        debug!("Stats request {} for user {} was superseded", generation, user_id);
        let report = match newer.wait_for(Option::is_some).await {
            Ok(report) => (*report).clone(),
            Err(_) => None,
        };
        match report {
            Some(report) => StatsOutcome::Superseded(report),
            None => StatsOutcome::Fresh(self.fetch_report(user_id, range, now).await),
        }
    }

    fn begin(&self, user_id: UserId) -> Ticket {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let (supersede, superseded) = oneshot::channel();
        let (done, result) = watch::channel(None);
        let previous = self.in_flight.insert(
            user_id,
            InFlight {
                generation,
                supersede,
            },
        );
        if let Some(previous) = previous {
            // The older request may already be gone.
            let _ = previous.supersede.send(result);
        }
        Ticket {
            generation,
            superseded,
            done,
        }
    }

    fn is_current(&self, user_id: UserId, generation: u64) -> bool {
        self.in_flight
            .get(&user_id)
            .is_some_and(|in_flight| in_flight.generation == generation)
    }

    async fn fetch_report(&self, user_id: UserId, range: DateRange, now: DateTime<Utc>) -> StatsReport {
        match self.fetch_authoritative(user_id, range).await {
            Ok(completions) => {
                if let Some(mirror) = &self.mirror {
                    if let Err(err) = mirror.mirror_authoritative(&completions).await {
                        warn!("Failed to refresh local store for user {}: {}", user_id, err);
                    }
                }
                return self.report(&completions, now, StatsSource::Authoritative);
            }
            Err(err) => warn!(
                "Authoritative stats fetch for user {} failed, using local store: {}",
                user_id, err
            ),
        }

        match self.fallback.find(user_id, range).await {
            Ok(completions) => self.report(&completions, now, StatsSource::LocalFallback),
            Err(err) => {
                warn!("Local stats fetch for user {} failed: {}", user_id, err);
                self.report(&[], now, StatsSource::Empty)
            }
        }
    }

    async fn fetch_authoritative(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<ChallengeCompletion>, StoreError> {
        tokio::time::timeout(self.fetch_timeout, self.authoritative.find(user_id, range))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    fn report(
        &self,
        completions: &[ChallengeCompletion],
        now: DateTime<Utc>,
        source: StatsSource,
    ) -> StatsReport {
        StatsReport {
            stats: self.calculator.calculate(completions, now, &self.catalog),
            source,
            degraded: source != StatsSource::Authoritative,
        }
    }
}
