/* This file defines how data travels through the web socket.
    WsMessage is the envelope enum { type, payload }; the variants are:
    Authenticate -> first message of a connection that did not pass ?token=
    AuthOk       -> server confirms the connection identity
    JoinGroup / LeaveGroup -> room subscription events from the client
    SendMessage  -> push ingestion event from the client (carries its own token)
    Message      -> delivery event from the server to every room member
    Error        -> out of band error during the auth handshake
*/
use serde::{Deserialize, Serialize};

use crate::{error::Error, models::Message, models::User};

/// Messaggio WS con envelope { type, payload }.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Client → Server: autenticazione della connessione.
    #[serde(rename = "authenticate")]
    Authenticate(Authenticate),
    /// Server → Client: connessione autenticata.
    #[serde(rename = "authOk")]
    AuthOk(User),
    /// Client → Server: iscrizione alla room di un gruppo.
    #[serde(rename = "joinGroup")]
    JoinGroup(JoinGroup),
    /// Client → Server: uscita dalla room di un gruppo.
    #[serde(rename = "leaveGroup")]
    LeaveGroup(LeaveGroup),
    /// Client → Server: richiesta di inviare un messaggio (push).
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessage),
    /// Server → Client: evento di nuovo messaggio.
    #[serde(rename = "message")]
    Message(Message),
    /// Server → Client: errore fuori banda.
    #[serde(rename = "error")]
    Error(Error),
}

/// Payload per l'autenticazione della connessione (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticate {
    pub token: String,
}

/// Payload per l'iscrizione ad una room (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroup {
    pub group_id: String,
}

/// Payload per l'uscita da una room (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGroup {
    pub group_id: String,
}

/// Payload per l'invio di un messaggio via push (C→S).
/// Porta il proprio token: l'identità del mittente è quella del token
/// dell'evento, verificata ad ogni invio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub group_id: String,
    pub content: String,
    pub token: String,
}
