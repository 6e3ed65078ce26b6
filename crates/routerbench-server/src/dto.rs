use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    pub run_id: Uuid,
}
