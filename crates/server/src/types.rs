use serde::{Deserialize, Serialize};

/// The envelope every JSON endpoint answers with.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub result: T,
}

/// `{"ok": true}` style acknowledgements.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatusFilter {
    pub status: Option<String>,
}
