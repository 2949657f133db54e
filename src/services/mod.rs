/// OpenAPI documentation generation.
pub mod documentation;
/// Game definition management.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Roster management for teams, badges and stations.
pub mod roster_service;
/// King-of-the-Hill scan handling and the shared scan audit feed.
pub mod scan_service;
/// Sequence scan handling with idempotent replay.
pub mod sequence_service;
/// Session lifecycle and standings projections.
pub mod session_service;
/// Periodic win evaluation and standings broadcasts.
pub mod session_ticker;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor and best-effort writes.
pub mod storage_supervisor;
