//! Wire messages of the ticket protocol.
//!
//! Every message is one JSON object tagged by `type`. Responses carry an
//! optional `error` field: absent or empty means success, non-empty is a
//! protocol-level failure reported by the server.

use serde::{Deserialize, Serialize};

/// Credentials block of a `create-ticket` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUser {
    pub uid: String,
    pub play_key: String,
}

/// The six request/response messages exchanged with the matchmaking server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "create-ticket")]
    CreateTicket { user: TicketUser },

    #[serde(rename = "create-ticket-resp", rename_all = "camelCase")]
    CreateTicketResp {
        #[serde(default)]
        ticket_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "get-ticket", rename_all = "camelCase")]
    GetTicket { ticket_id: String },

    #[serde(rename = "get-ticket-resp", rename_all = "camelCase")]
    GetTicketResp {
        #[serde(default)]
        is_assigned: bool,
        #[serde(default)]
        opp_address: String,
        #[serde(default)]
        is_host: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "delete-ticket", rename_all = "camelCase")]
    DeleteTicket { ticket_id: String },

    #[serde(rename = "delete-ticket-resp", rename_all = "camelCase")]
    DeleteTicketResp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Interpret a response `error` field: `None` or `""` is success.
pub(crate) fn reported_error(error: &Option<String>) -> Option<&str> {
    match error.as_deref() {
        Some(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}
