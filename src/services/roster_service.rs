//! Roster management: teams, badges and stations. The in-memory registries
//! are authoritative; every mutation is mirrored to the store best-effort.

use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{BadgeEntity, StationEntity, TeamEntity},
        storage::StorageResult,
    },
    dto::roster::{
        BadgeSummary, CreateBadgeRequest, CreateStationRequest, CreateTeamRequest, StationSummary,
        TeamSummary, UpdateBadgeRequest, UpdateStationRequest, UpdateTeamRequest,
    },
    error::ServiceError,
    services::storage_supervisor,
    state::{
        SharedState,
        game::{Badge, Game, Station, Team},
    },
};

/// Register a new team, picking the first unused color when the request
/// leaves it out.
pub fn create_team(state: &SharedState, request: CreateTeamRequest) -> TeamSummary {
    let color = request.color.unwrap_or_else(|| {
        let used: Vec<String> = state.teams().iter().map(|team| team.color.clone()).collect();
        state.config().first_unused_color(&used)
    });

    let team = Team {
        id: Uuid::new_v4(),
        name: request.name,
        color,
        updated_at: SystemTime::now(),
    };
    state.teams().insert(team.id, team.clone());

    info!(team_id = %team.id, name = %team.name, "team created");
    let entity = TeamEntity::from(team.clone());
    storage_supervisor::spawn_write(state, "save_team", move |store| store.save_team(entity));
    TeamSummary::from(&team)
}

/// Teams sorted by name for stable listings.
pub fn list_teams(state: &SharedState) -> Vec<TeamSummary> {
    let mut teams: Vec<TeamSummary> = state
        .teams()
        .iter()
        .map(|team| TeamSummary::from(team.value()))
        .collect();
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    teams
}

/// Rename or recolor a team.
pub fn update_team(
    state: &SharedState,
    id: Uuid,
    request: UpdateTeamRequest,
) -> Result<TeamSummary, ServiceError> {
    let team = {
        let mut entry = state
            .teams()
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("team `{id}` not found")))?;
        if let Some(name) = request.name {
            entry.name = name;
        }
        if let Some(color) = request.color {
            entry.color = color;
        }
        entry.updated_at = SystemTime::now();
        entry.clone()
    };

    let entity = TeamEntity::from(team.clone());
    storage_supervisor::spawn_write(state, "save_team", move |store| store.save_team(entity));
    Ok(TeamSummary::from(&team))
}

/// Remove a team and unassign every badge that pointed at it. A running
/// session keeps its frozen roster snapshot.
pub fn delete_team(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let (id, team) = state
        .teams()
        .remove(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("team `{id}` not found")))?;

    let mut orphaned: Vec<BadgeEntity> = Vec::new();
    for mut badge in state.badges().iter_mut() {
        if badge.team_id == Some(id) {
            badge.team_id = None;
            orphaned.push(badge.clone().into());
        }
    }

    info!(team_id = %id, name = %team.name, unassigned_badges = orphaned.len(), "team deleted");
    storage_supervisor::spawn_write(state, "delete_team", move |store| store.delete_team(id));
    if !orphaned.is_empty() {
        storage_supervisor::spawn_write(state, "save_badge", move |store| async move {
            for badge in orphaned {
                store.save_badge(badge).await?;
            }
            Ok(())
        });
    }
    Ok(())
}

/// Register a badge ahead of time, optionally assigning it to a team.
pub fn create_badge(
    state: &SharedState,
    request: CreateBadgeRequest,
) -> Result<BadgeSummary, ServiceError> {
    if let Some(team_id) = request.team_id {
        if !state.teams().contains_key(&team_id) {
            return Err(ServiceError::NotFound(format!("team `{team_id}` not found")));
        }
    }

    let badge = Badge {
        rfid_uid: request.rfid_uid,
        player_name: request.player_name,
        team_id: request.team_id,
        created_at: SystemTime::now(),
    };

    match state.badges().entry(badge.rfid_uid.clone()) {
        Entry::Occupied(_) => {
            return Err(ServiceError::InvalidInput(format!(
                "badge `{}` is already registered",
                badge.rfid_uid
            )));
        }
        Entry::Vacant(slot) => {
            slot.insert(badge.clone());
        }
    }

    info!(rfid_uid = %badge.rfid_uid, "badge registered");
    let entity = BadgeEntity::from(badge.clone());
    storage_supervisor::spawn_write(state, "save_badge", move |store| store.save_badge(entity));
    Ok(BadgeSummary::from(&badge))
}

/// Badges sorted by tag uid.
pub fn list_badges(state: &SharedState) -> Vec<BadgeSummary> {
    let mut badges: Vec<BadgeSummary> = state
        .badges()
        .iter()
        .map(|badge| BadgeSummary::from(badge.value()))
        .collect();
    badges.sort_by(|a, b| a.rfid_uid.cmp(&b.rfid_uid));
    badges
}

/// Update a badge's player name or team assignment. `null` fields clear the
/// value, omitted fields leave it unchanged.
pub fn update_badge(
    state: &SharedState,
    rfid_uid: &str,
    request: UpdateBadgeRequest,
) -> Result<BadgeSummary, ServiceError> {
    if let Some(Some(team_id)) = request.team_id {
        if !state.teams().contains_key(&team_id) {
            return Err(ServiceError::NotFound(format!("team `{team_id}` not found")));
        }
    }

    let badge = {
        let mut entry = state
            .badges()
            .get_mut(rfid_uid)
            .ok_or_else(|| ServiceError::NotFound(format!("badge `{rfid_uid}` not found")))?;
        if let Some(player_name) = request.player_name {
            entry.player_name = player_name;
        }
        if let Some(team_id) = request.team_id {
            entry.team_id = team_id;
        }
        entry.clone()
    };

    let entity = BadgeEntity::from(badge.clone());
    storage_supervisor::spawn_write(state, "save_badge", move |store| store.save_badge(entity));
    Ok(BadgeSummary::from(&badge))
}

/// Remove a badge from the registry.
pub fn delete_badge(state: &SharedState, rfid_uid: &str) -> Result<(), ServiceError> {
    state
        .badges()
        .remove(rfid_uid)
        .ok_or_else(|| ServiceError::NotFound(format!("badge `{rfid_uid}` not found")))?;

    let rfid_uid = rfid_uid.to_owned();
    storage_supervisor::spawn_write(state, "delete_badge", move |store| {
        store.delete_badge(rfid_uid)
    });
    Ok(())
}

/// Register a station. New stations are active unless the request says
/// otherwise.
pub fn create_station(state: &SharedState, request: CreateStationRequest) -> StationSummary {
    let station = Station {
        id: Uuid::new_v4(),
        name: request.name,
        location: request.location,
        is_active: request.is_active.unwrap_or(true),
    };
    state.stations().insert(station.id, station.clone());

    info!(station_id = %station.id, name = %station.name, "station registered");
    let entity = StationEntity::from(station.clone());
    storage_supervisor::spawn_write(state, "save_station", move |store| {
        store.save_station(entity)
    });
    StationSummary::from(&station)
}

/// Stations sorted by name.
pub fn list_stations(state: &SharedState) -> Vec<StationSummary> {
    let mut stations: Vec<StationSummary> = state
        .stations()
        .iter()
        .map(|station| StationSummary::from(station.value()))
        .collect();
    stations.sort_by(|a, b| a.name.cmp(&b.name));
    stations
}

/// Update a station's name, location or active flag.
pub fn update_station(
    state: &SharedState,
    id: Uuid,
    request: UpdateStationRequest,
) -> Result<StationSummary, ServiceError> {
    let station = {
        let mut entry = state
            .stations()
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("station `{id}` not found")))?;
        if let Some(name) = request.name {
            entry.name = name;
        }
        if let Some(location) = request.location {
            entry.location = location;
        }
        if let Some(is_active) = request.is_active {
            entry.is_active = is_active;
        }
        entry.clone()
    };

    let entity = StationEntity::from(station.clone());
    storage_supervisor::spawn_write(state, "save_station", move |store| {
        store.save_station(entity)
    });
    Ok(StationSummary::from(&station))
}

/// Remove a station. A running session keeps its frozen station set.
pub fn delete_station(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    state
        .stations()
        .remove(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("station `{id}` not found")))?;

    storage_supervisor::spawn_write(state, "delete_station", move |store| {
        store.delete_station(id)
    });
    Ok(())
}

/// How a scanned tag resolved against the badge registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagResolution {
    /// The badge is assigned to this team.
    Assigned(Uuid),
    /// The badge is registered but carries no team assignment.
    Unassigned,
    /// First sighting; the badge was auto-registered unassigned.
    Unknown,
}

/// Resolve the team behind a tag. Unknown tags are auto-registered as
/// unassigned badges under the same entry guard, so concurrent scans of a
/// fresh tag create exactly one badge.
pub fn resolve_team_for_tag(state: &SharedState, rfid_uid: &str) -> TagResolution {
    match state.badges().entry(rfid_uid.to_owned()) {
        Entry::Occupied(entry) => match entry.get().team_id {
            Some(team_id) => TagResolution::Assigned(team_id),
            None => TagResolution::Unassigned,
        },
        Entry::Vacant(slot) => {
            let badge = Badge {
                rfid_uid: rfid_uid.to_owned(),
                player_name: None,
                team_id: None,
                created_at: SystemTime::now(),
            };
            slot.insert(badge.clone());
            debug!(rfid_uid, "auto-registered unknown badge");

            let entity = BadgeEntity::from(badge);
            storage_supervisor::spawn_write(state, "save_badge", move |store| {
                store.save_badge(entity)
            });
            TagResolution::Unknown
        }
    }
}

/// Fill the in-memory registries from the store after a (re)connect.
///
/// Registries that already hold entries are left alone; memory is
/// authoritative once populated.
pub async fn hydrate_from_store(
    state: &SharedState,
    store: &dyn GameStore,
) -> StorageResult<()> {
    if state.teams().is_empty() {
        for entity in store.list_teams().await? {
            let team = Team::from(entity);
            state.teams().insert(team.id, team);
        }
    }
    if state.badges().is_empty() {
        for entity in store.list_badges().await? {
            let badge = Badge::from(entity);
            state.badges().insert(badge.rfid_uid.clone(), badge);
        }
    }
    if state.stations().is_empty() {
        for entity in store.list_stations().await? {
            let station = Station::from(entity);
            state.stations().insert(station.id, station);
        }
    }
    if state.games().is_empty() {
        for entity in store.list_games().await? {
            let game = Game::from(entity);
            state.games().insert(game.id, game);
        }
    }

    info!(
        teams = state.teams().len(),
        badges = state.badges().len(),
        stations = state.stations().len(),
        games = state.games().len(),
        "roster registries hydrated from storage"
    );
    Ok(())
}
