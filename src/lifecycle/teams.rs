//! Team assembly when a full queue becomes a lobby

use crate::rating::RatingEngine;
use crate::types::{GameId, GamePlayer, PlayerId, Team};

/// Lobbies always form exactly two teams
pub const TEAM_COUNT: u32 = 2;

/// Split a full queue into two even teams
///
/// `players` must be in join order with the host first. The host anchors
/// team 1 and the rest alternate, so every even capacity splits evenly and
/// the assignment is deterministic for a given join order.
pub fn assign_teams(players: &[GamePlayer]) -> Vec<(PlayerId, u32)> {
    players
        .iter()
        .enumerate()
        .map(|(index, player)| {
            let team = (index % TEAM_COUNT as usize) as u32 + 1;
            (player.player_id.clone(), team)
        })
        .collect()
}

/// Build the team records for a forming lobby
///
/// `ratings` pairs each player with their current rating; members missing
/// from it are skipped, and an empty team averages to the base rating.
pub fn build_teams(
    game_id: GameId,
    assignments: &[(PlayerId, u32)],
    ratings: &[(PlayerId, i32)],
    engine: &dyn RatingEngine,
) -> Vec<Team> {
    let mut teams = Vec::with_capacity(TEAM_COUNT as usize);
    for number in 1..=TEAM_COUNT {
        let members: Vec<i32> = assignments
            .iter()
            .filter(|(_, team)| *team == number)
            .filter_map(|(player_id, _)| {
                ratings
                    .iter()
                    .find(|(candidate, _)| candidate == player_id)
                    .map(|(_, rating)| *rating)
            })
            .collect();

        teams.push(Team {
            game_id,
            number,
            name: format!("Team {}", number),
            average_rating: engine.team_average(&members),
        });
    }
    teams
}
