use std::collections::HashSet;
use std::path::Path;

use challenge_types::{RequirementType, Reward, RewardProgress};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read reward catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reward catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate reward id '{0}'")]
    DuplicateId(String),
    #[error("reward '{0}' has a zero requirement")]
    ZeroRequirement(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardEvaluation {
    pub unlocked: Vec<Reward>,
    pub next: Vec<RewardProgress>,
}

/// Static table of unlockable rewards, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardCatalog {
    rewards: Vec<Reward>,
}

impl RewardCatalog {
    pub fn new(rewards: Vec<Reward>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for reward in &rewards {
            if !seen.insert(reward.id.as_str()) {
                return Err(CatalogError::DuplicateId(reward.id.clone()));
            }
            if reward.requirement_value == 0 {
                return Err(CatalogError::ZeroRequirement(reward.id.clone()));
            }
        }
        Ok(Self { rewards })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let rewards: Vec<Reward> = serde_json::from_str(json)?;
        Self::new(rewards)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    /// Split the catalog into what the user has already unlocked and, per
    /// requirement type, the cheapest reward still ahead of them.
    pub fn evaluate(&self, current_streak: u32, total_points: u32) -> RewardEvaluation {
        let current_for = |requirement_type: RequirementType| match requirement_type {
            RequirementType::Streak => current_streak,
            RequirementType::Points => total_points,
        };

        let unlocked = self
            .rewards
            .iter()
            .filter(|reward| current_for(reward.requirement_type) >= reward.requirement_value)
            .cloned()
            .collect();

        let next = [RequirementType::Streak, RequirementType::Points]
            .into_iter()
            .filter_map(|requirement_type| {
                let current = current_for(requirement_type);
                self.rewards
                    .iter()
                    .filter(|reward| {
                        reward.requirement_type == requirement_type
                            && reward.requirement_value > current
                    })
                    .min_by(|a, b| {
                        a.requirement_value
                            .cmp(&b.requirement_value)
                            .then_with(|| a.id.cmp(&b.id))
                    })
                    .map(|reward| progress_toward(reward, current))
            })
            .collect();

        RewardEvaluation { unlocked, next }
    }
}

impl Default for RewardCatalog {
    fn default() -> Self {
        Self {
            rewards: vec![
                Reward::new("reward-1", "3-Day Streak Badge", RequirementType::Streak, 3),
                Reward::new("reward-2", "7-Day Streak Badge", RequirementType::Streak, 7),
                Reward::new("reward-3", "14-Day Streak Badge", RequirementType::Streak, 14),
                Reward::new("reward-4", "30-Day Streak Badge", RequirementType::Streak, 30),
                Reward::new("reward-5", "Bronze Brain", RequirementType::Points, 500),
                Reward::new("reward-6", "Silver Brain", RequirementType::Points, 1000),
                Reward::new("reward-7", "Gold Brain", RequirementType::Points, 2500),
                Reward::new("reward-8", "Platinum Brain", RequirementType::Points, 5000),
            ],
        }
    }
}

pub fn progress_toward(reward: &Reward, current: u32) -> RewardProgress {
    let requirement = reward.requirement_value;
    let progress_percent = if requirement == 0 {
        100
    } else {
        (u64::from(current) * 100 / u64::from(requirement)).min(100) as u8
    };

    RewardProgress {
        reward: reward.clone(),
        current,
        progress_percent,
        remaining: requirement.saturating_sub(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(rewards: &[Reward]) -> Vec<&str> {
        rewards.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_nothing_unlocked_for_new_user() {
        let evaluation = RewardCatalog::default().evaluate(0, 0);

        assert!(evaluation.unlocked.is_empty());
        assert_eq!(evaluation.next.len(), 2);
        assert_eq!(evaluation.next[0].reward.title, "3-Day Streak Badge");
        assert_eq!(evaluation.next[0].remaining, 3);
        assert_eq!(evaluation.next[1].reward.title, "Bronze Brain");
        assert_eq!(evaluation.next[1].progress_percent, 0);
    }

    #[test]
    fn test_points_progress_toward_bronze() {
        let evaluation = RewardCatalog::default().evaluate(0, 300);
        let points = evaluation
            .next
            .iter()
            .find(|p| p.reward.requirement_type == RequirementType::Points)
            .unwrap();

        assert_eq!(points.reward.requirement_value, 500);
        assert_eq!(points.remaining, 200);
        assert_eq!(points.progress_percent, 60);
        assert_eq!(points.current, 300);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let evaluation = RewardCatalog::default().evaluate(7, 1000);

        assert_eq!(
            ids(&evaluation.unlocked),
            vec!["reward-1", "reward-2", "reward-5", "reward-6"]
        );
        assert_eq!(evaluation.next[0].reward.id, "reward-3");
        assert_eq!(evaluation.next[1].reward.id, "reward-7");
    }

    #[test]
    fn test_fully_unlocked_type_contributes_no_next_reward() {
        let evaluation = RewardCatalog::default().evaluate(45, 120);

        assert_eq!(evaluation.next.len(), 1);
        assert_eq!(evaluation.next[0].reward.requirement_type, RequirementType::Points);
    }

    #[test]
    fn test_progress_is_clamped() {
        let reward = Reward::new("r", "R", RequirementType::Points, 10);
        assert_eq!(progress_toward(&reward, 25).progress_percent, 100);
        assert_eq!(progress_toward(&reward, 25).remaining, 0);
    }

    #[test]
    fn test_catalog_rejects_duplicates_and_zero_thresholds() {
        let duplicate = vec![
            Reward::new("a", "A", RequirementType::Streak, 3),
            Reward::new("a", "B", RequirementType::Points, 10),
        ];
        assert!(matches!(
            RewardCatalog::new(duplicate),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));

        let zero = vec![Reward::new("z", "Z", RequirementType::Points, 0)];
        assert!(matches!(
            RewardCatalog::new(zero),
            Err(CatalogError::ZeroRequirement(_))
        ));
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"[
            {"id": "s5", "title": "Five", "requirement_type": "streak", "requirement_value": 5},
            {"id": "p50", "title": "Fifty", "requirement_type": "points", "requirement_value": 50}
        ]"#;
        let catalog = RewardCatalog::from_json(json).unwrap();

        assert_eq!(catalog.rewards().len(), 2);
        assert_eq!(ids(&catalog.evaluate(5, 10).unlocked), vec!["s5"]);
    }
}
