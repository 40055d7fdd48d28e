//! Translation between the client-side (axum) and upstream-side (tungstenite) message types.
//!
//! Text and binary payloads cross unchanged. Ping/pong stay with the side that
//! received them; both libraries answer pings on their own.

use axum::extract::ws::Message as ClientMessage;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// What the relay does with one received message.
#[derive(Debug, PartialEq)]
pub enum Relayed<M> {
    Forward(M),
    Skip,
    Close,
}

pub fn from_client(message: ClientMessage) -> Relayed<UpstreamMessage> {
    match message {
        ClientMessage::Text(text) => Relayed::Forward(UpstreamMessage::Text(text.as_str().into())),
        ClientMessage::Binary(data) => Relayed::Forward(UpstreamMessage::Binary(data)),
        ClientMessage::Ping(_) | ClientMessage::Pong(_) => Relayed::Skip,
        ClientMessage::Close(_) => Relayed::Close,
    }
}

pub fn from_upstream(message: UpstreamMessage) -> Relayed<ClientMessage> {
    match message {
        UpstreamMessage::Text(text) => Relayed::Forward(ClientMessage::Text(text.as_str().into())),
        UpstreamMessage::Binary(data) => Relayed::Forward(ClientMessage::Binary(data)),
        UpstreamMessage::Ping(_) | UpstreamMessage::Pong(_) | UpstreamMessage::Frame(_) => {
            Relayed::Skip
        }
        UpstreamMessage::Close(_) => Relayed::Close,
    }
}
