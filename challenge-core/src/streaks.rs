use std::collections::{BTreeMap, BTreeSet};

use challenge_types::{ChallengeCompletion, ChallengeStats, DailyChallengeHistory, HistoryStatus};
use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::{DayClock, RewardCatalog};

/// Upper bound on the back-filled history, one year including a leap day.
pub const MAX_HISTORY_WINDOW_DAYS: u32 = 366;

/// Turns a user's completions into [`ChallengeStats`].
///
/// This is the only place streak math lives. The stats service runs it over
/// whatever snapshot it managed to fetch, authoritative or local, so both
/// paths agree whenever their inputs agree.
#[derive(Debug, Clone)]
pub struct StatsCalculator {
    clock: DayClock,
    history_window: Option<u32>,
}

impl StatsCalculator {
    pub fn new(clock: DayClock) -> Self {
        Self {
            clock,
            history_window: None,
        }
    }

    /// Back-fill `challenge_history` with placeholder rows so it always
    /// covers the `days` days ending today, at most
    /// [`MAX_HISTORY_WINDOW_DAYS`].
    pub fn with_history_window(mut self, days: u32) -> Self {
        self.history_window = Some(days.min(MAX_HISTORY_WINDOW_DAYS));
        self
    }

    pub fn clock(&self) -> DayClock {
        self.clock
    }

    pub fn calculate(
        &self,
        completions: &[ChallengeCompletion],
        now: DateTime<Utc>,
        catalog: &RewardCatalog,
    ) -> ChallengeStats {
        let today = self.clock.day_key(now);
        let by_day = group_by_day(completions);

        // Days after today only come from clock skew; they never extend a streak.
        let active_days: BTreeSet<NaiveDate> =
            by_day.keys().copied().filter(|day| *day <= today).collect();

        let current_streak = current_streak(&active_days, today);
        let longest_streak = longest_streak(&active_days);
        let total_points = completions
            .iter()
            .fold(0u32, |sum, c| sum.saturating_add(c.earned_points));

        let completed_today = by_day
            .get(&today)
            .map(|entries| entries.iter().map(|c| c.game_type.to_string()).collect())
            .unwrap_or_default();

        let evaluation = catalog.evaluate(current_streak, total_points);

        ChallengeStats {
            current_streak,
            longest_streak,
            last_active_day: active_days.last().copied(),
            total_points,
            completed_today,
            challenge_history: self.history(&by_day, today),
            unlocked_rewards: evaluation.unlocked,
            next_rewards: evaluation.next,
        }
    }

    fn history(
        &self,
        by_day: &BTreeMap<NaiveDate, Vec<&ChallengeCompletion>>,
        today: NaiveDate,
    ) -> Vec<DailyChallengeHistory> {
        let mut days: BTreeSet<NaiveDate> = by_day.keys().copied().collect();
        if let Some(window) = self.history_window {
            let mut cursor = Some(today);
            for _ in 0..window {
                let Some(day) = cursor else { break };
                days.insert(day);
                cursor = day.checked_sub_days(Days::new(1));
            }
        }

        days.into_iter()
            .rev()
            .map(|date| {
                let entries = by_day.get(&date).map(Vec::as_slice).unwrap_or_default();
                history_entry(date, today, entries)
            })
            .collect()
    }
}

/// Group completions by day-key. Entries inside a day are put in a fixed
/// order so that the result never depends on the order of the input.
pub fn group_by_day(
    completions: &[ChallengeCompletion],
) -> BTreeMap<NaiveDate, Vec<&ChallengeCompletion>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&ChallengeCompletion>> = BTreeMap::new();
    for completion in completions {
        by_day
            .entry(completion.challenge_date)
            .or_default()
            .push(completion);
    }
    for entries in by_day.values_mut() {
        entries.sort_by(|a, b| {
            a.completed_at
                .cmp(&b.completed_at)
                .then_with(|| a.id.cmp(&b.id))
                .then_with(|| a.game_type.as_str().cmp(b.game_type.as_str()))
        });
    }
    by_day
}

/// Consecutive days ending today, or ending yesterday when today has no
/// completion yet.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(day) = cursor.filter(|day| days.contains(day)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

fn history_entry(
    date: NaiveDate,
    today: NaiveDate,
    entries: &[&ChallengeCompletion],
) -> DailyChallengeHistory {
    let completed_challenges: Vec<String> =
        entries.iter().map(|c| c.game_type.to_string()).collect();
    let points = entries
        .iter()
        .fold(0u32, |sum, c| sum.saturating_add(c.earned_points));

    let status = if !completed_challenges.is_empty() {
        HistoryStatus::Completed
    } else if date == today {
        HistoryStatus::InProgress
    } else {
        HistoryStatus::Missed
    };

    let formatted_date = if date == today {
        "Today".to_string()
    } else {
        date.format("%b %-d, %Y").to_string()
    };

    DailyChallengeHistory {
        date,
        formatted_date,
        completed_challenges,
        total_challenges: 1,
        points,
        status,
    }
}
