//! Map selection coordination
//!
//! Drives the per-mode selection protocols against the game store:
//! host-pick (the host's first valid call resolves), all-pick (everyone
//! picks, the random sentinel is replaced from the other players' concrete
//! picks), and random-map (rolled from the catalog when the lobby forms).
//!
//! Resolution stamps the selected map, the completion flag, and the epoch
//! millisecond at which clients should begin the reveal animation; the
//! reveal window tells them how long to run it before trusting the result.

use crate::error::{GameError, Result};
use crate::maps::catalog::MapCatalog;
use crate::maps::RANDOM_PICK;
use crate::store::{GameStore, MapResolution, PickSnapshot, StatusChange};
use crate::types::{Game, GameId, GameMode, GameStatus, MapId, MapSelectionMode};
use crate::utils;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one `select_map` call
#[derive(Debug, Clone)]
pub enum SelectionProgress {
    /// All-pick round still waiting on other players
    Pending {
        players_with_selections: u32,
        total_players: u32,
    },
    /// Selection has resolved; the game carries the final map and the
    /// reveal animation stamp
    ///
    /// `newly_resolved` is true for exactly one call per game: the one
    /// whose resolution committed. Callers announce the result only then.
    Resolved { game: Game, newly_resolved: bool },
}

/// Coordinates map picks for lobbies
pub struct MapSelectionCoordinator {
    store: Arc<dyn GameStore>,
    catalog: Arc<dyn MapCatalog>,
    reveal_window: Duration,
}

impl MapSelectionCoordinator {
    pub fn new(
        store: Arc<dyn GameStore>,
        catalog: Arc<dyn MapCatalog>,
        reveal_window: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            reveal_window,
        }
    }

    /// How long clients should run the reveal animation after the stamp
    pub fn reveal_window(&self) -> Duration {
        self.reveal_window
    }

    /// Handle one map pick from a player
    ///
    /// The pick may be a concrete map identifier or the `random` sentinel.
    /// Fails `SelectionAlreadyComplete` once a resolution has been
    /// committed, and `InvalidStateTransition` when the game is not in the
    /// lobby phase.
    pub async fn select_map(
        &self,
        game_id: GameId,
        player_id: &str,
        map_id: &str,
    ) -> Result<SelectionProgress> {
        let game = self
            .store
            .get_game(game_id)
            .await?
            .ok_or_else(|| GameError::NotFound {
                what: format!("game {}", game_id),
            })?;

        if game.map_selection_complete {
            return Err(GameError::SelectionAlreadyComplete {
                game_id: game_id.to_string(),
            }
            .into());
        }

        if game.status != GameStatus::Lobby {
            return Err(GameError::InvalidStateTransition {
                from: game.status.to_string(),
                to: GameStatus::Lobby.to_string(),
            }
            .into());
        }

        match game.selection_mode {
            MapSelectionMode::HostPick => self.select_host_pick(&game, player_id, map_id).await,
            MapSelectionMode::AllPick => self.select_all_pick(&game, player_id, map_id).await,
            // Random-map games resolve at lobby formation; any later pick
            // is a re-selection
            MapSelectionMode::RandomMap => Err(GameError::SelectionAlreadyComplete {
                game_id: game_id.to_string(),
            }
            .into()),
        }
    }

    /// Roll the map a lobby should form with, when the mode calls for one
    ///
    /// Returns `None` for modes where players pick after the lobby forms.
    pub fn roll_lobby_map(
        &self,
        mode: GameMode,
        selection_mode: MapSelectionMode,
    ) -> Result<Option<MapResolution>> {
        match selection_mode {
            MapSelectionMode::RandomMap => {
                let pool = self.catalog.eligible_maps(mode)?;
                let map_id = pool[utils::uniform_index(pool.len())].clone();
                debug!("Rolled random map '{}' for a forming {} lobby", map_id, mode);
                Ok(Some(MapResolution {
                    map_id,
                    anim_select_start_time: utils::epoch_millis(utils::current_timestamp()),
                    pick_updates: Vec::new(),
                }))
            }
            MapSelectionMode::AllPick | MapSelectionMode::HostPick => Ok(None),
        }
    }

    async fn select_host_pick(
        &self,
        game: &Game,
        player_id: &str,
        map_id: &str,
    ) -> Result<SelectionProgress> {
        if player_id != game.host_id {
            return Err(GameError::NotHost {
                player_id: player_id.to_string(),
            }
            .into());
        }

        let map_id = if map_id == RANDOM_PICK {
            let pool = self.catalog.eligible_maps(game.mode)?;
            pool[utils::uniform_index(pool.len())].clone()
        } else {
            map_id.to_string()
        };

        let resolution = MapResolution {
            map_id: map_id.clone(),
            anim_select_start_time: utils::epoch_millis(utils::current_timestamp()),
            pick_updates: vec![(game.host_id.clone(), map_id.clone())],
        };

        match self.store.resolve_map_selection(game.id, resolution).await? {
            StatusChange::Applied(game) => {
                info!("Host '{}' selected map '{}' for game {}", player_id, map_id, game.id);
                Ok(SelectionProgress::Resolved {
                    game,
                    newly_resolved: true,
                })
            }
            // A concurrent call committed first; this one is a re-selection
            StatusChange::Skipped(_) => Err(GameError::SelectionAlreadyComplete {
                game_id: game.id.to_string(),
            }
            .into()),
        }
    }

    async fn select_all_pick(
        &self,
        game: &Game,
        player_id: &str,
        map_id: &str,
    ) -> Result<SelectionProgress> {
        let snapshot = self
            .store
            .record_map_pick(game.id, player_id, map_id.to_string())
            .await?;

        let total_players = snapshot.players.len() as u32;
        let players_with_selections = snapshot
            .players
            .iter()
            .filter(|p| p.map_selection.is_some())
            .count() as u32;

        if !snapshot.all_selected() {
            debug!(
                "Recorded pick '{}' from '{}' for game {} ({}/{} selected)",
                map_id, player_id, game.id, players_with_selections, total_players
            );
            return Ok(SelectionProgress::Pending {
                players_with_selections,
                total_players,
            });
        }

        let resolution = self.resolve_all_pick(&snapshot)?;
        let map_id = resolution.map_id.clone();

        // Both arms end with the same resolved game: if a concurrent caller
        // committed first, their resolution stands and ours is dropped
        let change = self.store.resolve_map_selection(game.id, resolution).await?;
        let newly_resolved = change.was_applied();
        let game = change.game().clone();

        if newly_resolved {
            info!(
                "All {} players picked; game {} resolved to map '{}'",
                total_players, game.id, map_id
            );
        }

        Ok(SelectionProgress::Resolved {
            game,
            newly_resolved,
        })
    }

    /// Turn a fully-selected pick snapshot into a final map
    ///
    /// Sentinel picks are replaced by uniform draws from the set of the
    /// other players' concrete picks, falling back to the mode's catalog
    /// when nobody picked a concrete map. The final map is then drawn
    /// uniformly from the per-player picks, so a map chosen by two players
    /// is twice as likely.
    fn resolve_all_pick(&self, snapshot: &PickSnapshot) -> Result<MapResolution> {
        let mut picks = Vec::with_capacity(snapshot.players.len());
        for player in &snapshot.players {
            let pick = player
                .map_selection
                .clone()
                .ok_or_else(|| GameError::InternalError {
                    message: format!(
                        "Player {} lost their selection during resolution",
                        player.player_id
                    ),
                })?;
            picks.push((player.player_id.clone(), pick));
        }

        // Sorted and deduped so the draw space is stable across callers
        let mut concrete: Vec<MapId> = picks
            .iter()
            .filter(|(_, pick)| pick != RANDOM_PICK)
            .map(|(_, pick)| pick.clone())
            .collect();
        concrete.sort();
        concrete.dedup();

        let replacement_pool = if concrete.is_empty() {
            self.catalog.eligible_maps(snapshot.game.mode)?
        } else {
            concrete
        };

        let mut pick_updates = Vec::new();
        let mut final_pool = Vec::with_capacity(picks.len());
        for (player_id, pick) in picks {
            if pick == RANDOM_PICK {
                let drawn = replacement_pool[utils::uniform_index(replacement_pool.len())].clone();
                pick_updates.push((player_id, drawn.clone()));
                final_pool.push(drawn);
            } else {
                final_pool.push(pick);
            }
        }

        let map_id = final_pool[utils::uniform_index(final_pool.len())].clone();

        Ok(MapResolution {
            map_id,
            anim_select_start_time: utils::epoch_millis(utils::current_timestamp()),
            pick_updates,
        })
    }
}
