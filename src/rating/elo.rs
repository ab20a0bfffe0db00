//! ELO rating system implementation
//!
//! Integer ratings, logistic expected scores with the classic 400-point
//! scale, and a floor of +1 for winners so heavy favorites still gain a
//! point on a win.

use crate::rating::engine::RatingEngine;
use crate::types::{MatchRatingOutcome, PlayerId, RatingChange, DEFAULT_RATING};
use serde::{Deserialize, Serialize};

/// Configuration for the ELO rating system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloConfig {
    /// K-factor: maximum rating movement per match
    pub k_factor: f64,
    /// Rating assigned to players with no history, and the fallback for
    /// empty team averages
    pub base_rating: i32,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            base_rating: DEFAULT_RATING,
        }
    }
}

impl EloConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.k_factor <= 0.0 {
            return Err(crate::error::GameError::ConfigurationError {
                message: "K-factor must be positive".to_string(),
            }
            .into());
        }

        if self.base_rating <= 0 {
            return Err(crate::error::GameError::ConfigurationError {
                message: "Base rating must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// ELO rating engine implementation
#[derive(Debug)]
pub struct EloRatingEngine {
    config: EloConfig,
}

impl EloRatingEngine {
    /// Create a new ELO engine with the given configuration
    pub fn new(config: EloConfig) -> crate::error::Result<Self> {
        config.validate()?;

        Ok(Self { config })
    }

    /// Engine with default parameters (k=32, base 1000)
    pub fn with_defaults() -> Self {
        Self {
            config: EloConfig::default(),
        }
    }

    pub fn base_rating(&self) -> i32 {
        self.config.base_rating
    }
}

impl RatingEngine for EloRatingEngine {
    fn expected_score(&self, a: i32, b: i32) -> f64 {
        1.0 / (1.0 + 10f64.powf((b - a) as f64 / 400.0))
    }

    fn new_rating(&self, current: i32, expected: f64, actual: f64) -> i32 {
        let raw = (current as f64 + self.config.k_factor * (actual - expected)).round() as i32;

        if actual > 0.5 {
            // Winner floor: at least one point gained
            raw.max(current + 1)
        } else {
            raw
        }
    }

    fn team_average(&self, ratings: &[i32]) -> i32 {
        if ratings.is_empty() {
            return self.config.base_rating;
        }

        let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
        (sum as f64 / ratings.len() as f64).round() as i32
    }

    fn process_match(
        &self,
        winning_team: &[(PlayerId, i32)],
        losing_team: &[(PlayerId, i32)],
    ) -> MatchRatingOutcome {
        let winning_ratings: Vec<i32> = winning_team.iter().map(|(_, r)| *r).collect();
        let losing_ratings: Vec<i32> = losing_team.iter().map(|(_, r)| *r).collect();

        let winning_team_average = self.team_average(&winning_ratings);
        let losing_team_average = self.team_average(&losing_ratings);

        let mut changes = Vec::with_capacity(winning_team.len() + losing_team.len());

        for (player_id, rating) in winning_team {
            let expected = self.expected_score(*rating, losing_team_average);
            let new_rating = self.new_rating(*rating, expected, 1.0);
            changes.push(RatingChange {
                player_id: player_id.clone(),
                old_rating: *rating,
                new_rating,
                delta: new_rating - rating,
            });
        }

        for (player_id, rating) in losing_team {
            let expected = self.expected_score(*rating, winning_team_average);
            let new_rating = self.new_rating(*rating, expected, 0.0);
            changes.push(RatingChange {
                player_id: player_id.clone(),
                old_rating: *rating,
                new_rating,
                delta: new_rating - rating,
            });
        }

        MatchRatingOutcome {
            winning_team_average,
            losing_team_average,
            changes,
        }
    }
}
