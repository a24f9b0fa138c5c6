//! Job DTOs for client communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response to a successful submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreated {
    pub id: Uuid,
}
