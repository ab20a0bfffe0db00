//! Map catalog traits and implementations
//!
//! The catalog answers one question: which maps is a given game mode
//! eligible to be played on. Random-map games draw from it at lobby
//! formation, and all-pick resolution falls back to it when every player
//! picked the random sentinel.

use crate::error::{GameError, Result};
use crate::maps::RANDOM_PICK;
use crate::types::{GameMode, MapId};
use serde::{Deserialize, Serialize};

/// The eligible maps for one game mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapPool {
    pub mode: GameMode,
    pub maps: Vec<MapId>,
}

impl MapPool {
    /// Default competitive pool
    pub fn competitive() -> Self {
        Self {
            mode: GameMode::Competitive,
            maps: vec![
                "dust2".to_string(),
                "mirage".to_string(),
                "inferno".to_string(),
                "nuke".to_string(),
                "overpass".to_string(),
                "vertigo".to_string(),
                "ancient".to_string(),
                "anubis".to_string(),
            ],
        }
    }

    /// Default wingman pool
    pub fn wingman() -> Self {
        Self {
            mode: GameMode::Wingman,
            maps: vec![
                "shortdust".to_string(),
                "shortnuke".to_string(),
                "lake".to_string(),
                "cbble".to_string(),
                "overpass".to_string(),
                "vertigo".to_string(),
            ],
        }
    }

    /// Default duel pool
    pub fn duel() -> Self {
        Self {
            mode: GameMode::Duel,
            maps: vec![
                "aim_map".to_string(),
                "aim_redline".to_string(),
                "awp_lego".to_string(),
            ],
        }
    }
}

/// Trait for resolving the maps a game mode may be played on
pub trait MapCatalog: Send + Sync {
    /// List the eligible map identifiers for a mode
    ///
    /// Never returns an empty list: an unconfigured mode is a
    /// `ConfigurationError`, so selection resolution always has something
    /// to draw from.
    fn eligible_maps(&self, mode: GameMode) -> Result<Vec<MapId>>;

    /// All modes this catalog has pools for
    fn available_modes(&self) -> Vec<GameMode>;

    /// Validate a pool before accepting it
    fn validate_pool(&self, pool: &MapPool) -> Result<()>;
}

/// Static catalog backed by fixed per-mode pools
#[derive(Debug, Clone)]
pub struct StaticMapCatalog {
    duel_pool: MapPool,
    wingman_pool: MapPool,
    competitive_pool: MapPool,
}

impl StaticMapCatalog {
    /// Create a catalog with the default pools
    pub fn new() -> Self {
        Self {
            duel_pool: MapPool::duel(),
            wingman_pool: MapPool::wingman(),
            competitive_pool: MapPool::competitive(),
        }
    }

    /// Create a catalog from explicit pools
    ///
    /// Every mode must be covered exactly once and every pool must pass
    /// validation.
    pub fn with_pools(pools: Vec<MapPool>) -> Result<Self> {
        let mut duel_pool = None;
        let mut wingman_pool = None;
        let mut competitive_pool = None;

        for pool in pools {
            let slot = match pool.mode {
                GameMode::Duel => &mut duel_pool,
                GameMode::Wingman => &mut wingman_pool,
                GameMode::Competitive => &mut competitive_pool,
            };
            if slot.is_some() {
                return Err(GameError::ConfigurationError {
                    message: format!("Duplicate map pool for mode {}", pool.mode),
                }
                .into());
            }
            *slot = Some(pool);
        }

        let catalog = Self {
            duel_pool: duel_pool.ok_or_else(|| GameError::ConfigurationError {
                message: "Missing map pool for mode duel".to_string(),
            })?,
            wingman_pool: wingman_pool.ok_or_else(|| GameError::ConfigurationError {
                message: "Missing map pool for mode wingman".to_string(),
            })?,
            competitive_pool: competitive_pool.ok_or_else(|| GameError::ConfigurationError {
                message: "Missing map pool for mode competitive".to_string(),
            })?,
        };

        catalog.validate_pool(&catalog.duel_pool)?;
        catalog.validate_pool(&catalog.wingman_pool)?;
        catalog.validate_pool(&catalog.competitive_pool)?;

        Ok(catalog)
    }

    fn pool_for(&self, mode: GameMode) -> &MapPool {
        match mode {
            GameMode::Duel => &self.duel_pool,
            GameMode::Wingman => &self.wingman_pool,
            GameMode::Competitive => &self.competitive_pool,
        }
    }
}

impl Default for StaticMapCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MapCatalog for StaticMapCatalog {
    fn eligible_maps(&self, mode: GameMode) -> Result<Vec<MapId>> {
        let pool = self.pool_for(mode);
        if pool.maps.is_empty() {
            return Err(GameError::ConfigurationError {
                message: format!("No maps configured for mode {}", mode),
            }
            .into());
        }
        Ok(pool.maps.clone())
    }

    fn available_modes(&self) -> Vec<GameMode> {
        vec![GameMode::Duel, GameMode::Wingman, GameMode::Competitive]
    }

    fn validate_pool(&self, pool: &MapPool) -> Result<()> {
        if pool.maps.is_empty() {
            return Err(GameError::ConfigurationError {
                message: format!("Map pool for mode {} is empty", pool.mode),
            }
            .into());
        }

        for map_id in &pool.maps {
            if map_id == RANDOM_PICK {
                return Err(GameError::ConfigurationError {
                    message: format!(
                        "Map pool for mode {} contains the reserved identifier '{}'",
                        pool.mode, RANDOM_PICK
                    ),
                }
                .into());
            }
        }

        let mut seen = std::collections::HashSet::new();
        for map_id in &pool.maps {
            if !seen.insert(map_id) {
                return Err(GameError::ConfigurationError {
                    message: format!(
                        "Map pool for mode {} lists '{}' more than once",
                        pool.mode, map_id
                    ),
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pools_cover_every_mode() {
        let catalog = StaticMapCatalog::new();
        for mode in catalog.available_modes() {
            let maps = catalog.eligible_maps(mode).unwrap();
            assert!(!maps.is_empty(), "mode {} has no maps", mode);
        }
    }

    #[test]
    fn test_default_pool_contents() {
        let catalog = StaticMapCatalog::new();
        let competitive = catalog.eligible_maps(GameMode::Competitive).unwrap();
        let duel = catalog.eligible_maps(GameMode::Duel).unwrap();
        assert!(competitive.contains(&"dust2".to_string()));
        assert!(duel.contains(&"aim_map".to_string()));
    }

    #[test]
    fn test_with_pools_rejects_duplicate_mode() {
        let result = StaticMapCatalog::with_pools(vec![
            MapPool::duel(),
            MapPool::duel(),
            MapPool::wingman(),
            MapPool::competitive(),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_pools_rejects_missing_mode() {
        let result = StaticMapCatalog::with_pools(vec![MapPool::duel(), MapPool::wingman()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let catalog = StaticMapCatalog::new();
        let pool = MapPool {
            mode: GameMode::Duel,
            maps: Vec::new(),
        };
        assert!(catalog.validate_pool(&pool).is_err());
    }

    #[test]
    fn test_validate_rejects_random_sentinel() {
        let catalog = StaticMapCatalog::new();
        let pool = MapPool {
            mode: GameMode::Competitive,
            maps: vec!["dust2".to_string(), RANDOM_PICK.to_string()],
        };
        assert!(catalog.validate_pool(&pool).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_map() {
        let catalog = StaticMapCatalog::new();
        let pool = MapPool {
            mode: GameMode::Wingman,
            maps: vec!["lake".to_string(), "lake".to_string()],
        };
        assert!(catalog.validate_pool(&pool).is_err());
    }

    #[test]
    fn test_custom_pools_accepted() {
        let catalog = StaticMapCatalog::with_pools(vec![
            MapPool {
                mode: GameMode::Duel,
                maps: vec!["arena".to_string()],
            },
            MapPool {
                mode: GameMode::Wingman,
                maps: vec!["lake".to_string()],
            },
            MapPool {
                mode: GameMode::Competitive,
                maps: vec!["mirage".to_string(), "nuke".to_string()],
            },
        ])
        .unwrap();

        let maps = catalog.eligible_maps(GameMode::Duel).unwrap();
        assert_eq!(maps, vec!["arena".to_string()]);
    }
}
