use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response for diagnostics information
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsResponse {
    /// Attached WebSocket connections
    pub n_conn: u32,
    /// Live rooms in memory
    pub n_rooms: u32,
    /// Participants across all rooms
    pub n_participants: u32,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}
