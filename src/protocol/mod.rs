//! Wire contract for the HTTP API
//!
//! JSON bodies use camelCase field names so the dashboard frontend can keep
//! its existing `connectionId`/`phoneNumber`/`hasQrCode` shapes.

mod message;

pub use message::{
    ActionResponse, ConnectionSummary, CreateRequest, CreateResponse, ErrorResponse,
    IncomingRequest, LoseRequest, PairRequest, QrFormat, QrQuery, QrResponse, RenameRequest,
    SendRequest, StatusResponse,
};

/// Prefix shared by every session route
pub const API_PREFIX: &str = "/api/whatsapp";
