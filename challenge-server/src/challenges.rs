use std::sync::Arc;

use challenge_core::{DayClock, fallback_challenge};
use challenge_persistence::ChallengeLookup;
use challenge_types::TodayChallenge;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

/// Resolves which challenge a user should play today.
pub struct ChallengeCatalog {
    challenges: Arc<dyn ChallengeLookup>,
    clock: DayClock,
}

impl ChallengeCatalog {
    pub fn new(challenges: Arc<dyn ChallengeLookup>, clock: DayClock) -> Self {
        Self { challenges, clock }
    }

    pub fn current_day(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn today(&self) -> TodayChallenge {
        self.today_at(Utc::now()).await
    }

    /// The published challenge for the current day, or the built-in one for
    /// that date when none is published or the store cannot be read.
    pub async fn today_at(&self, now: DateTime<Utc>) -> TodayChallenge {
        let day = self.clock.day_key(now);
        match self.challenges.active_challenge_on(day).await {
            Ok(Some(challenge)) => TodayChallenge {
                challenge,
                fallback: false,
            },
            Ok(None) => TodayChallenge {
                challenge: fallback_challenge(day),
                fallback: true,
            },
            Err(err) => {
                warn!("Failed to load challenge for {}, serving fallback: {}", day, err);
                TodayChallenge {
                    challenge: fallback_challenge(day),
                    fallback: true,
                }
            }
        }
    }
}
