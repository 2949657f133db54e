//! Game definition management: the reusable rule sets sessions are started
//! from.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::GameEntity,
    dto::game::{CreateGameRequest, GameSummary},
    error::ServiceError,
    services::storage_supervisor,
    state::{SharedState, game::Game},
};

/// Create a game definition, filling omitted sequence knobs from the
/// configured defaults.
pub fn create_game(state: &SharedState, request: CreateGameRequest) -> GameSummary {
    let rules = request.rules.into_rules(state.config().sequence_defaults());
    let game = Game {
        id: Uuid::new_v4(),
        name: request.name,
        rules,
        created_at: SystemTime::now(),
    };
    state.games().insert(game.id, game.clone());

    info!(game_id = %game.id, name = %game.name, "game created");
    let entity = GameEntity::from(game.clone());
    storage_supervisor::spawn_write(state, "save_game", move |store| store.save_game(entity));
    GameSummary::from(&game)
}

/// Games sorted by name.
pub fn list_games(state: &SharedState) -> Vec<GameSummary> {
    let mut games: Vec<GameSummary> = state
        .games()
        .iter()
        .map(|game| GameSummary::from(game.value()))
        .collect();
    games.sort_by(|a, b| a.name.cmp(&b.name));
    games
}

/// Remove a game definition. A session started from it keeps its frozen
/// copy of the rules.
pub fn delete_game(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    state
        .games()
        .remove(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}` not found")))?;

    storage_supervisor::spawn_write(state, "delete_game", move |store| store.delete_game(id));
    Ok(())
}
