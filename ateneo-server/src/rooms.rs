/* Room registry: per ogni gruppo, l'insieme delle connessioni WS vive
    iscritte alla sua room. Stato effimero: nessuna connessione sopravvive
    qui al proprio socket, e nessuna autorizzazione viene decisa qui (la
    membership è già stata verificata da chi chiama join).
*/
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;

use ateneo_core::protocol::ws::WsMessage;

pub struct RoomRegistry {
    /// group_id -> (conn_id -> sender della connessione)
    rooms: DashMap<String, HashMap<String, UnboundedSender<String>>>,
    /// Indice inverso conn_id -> gruppi, per la pulizia alla disconnessione.
    joined: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            joined: DashMap::new(),
        }
    }

    /// Iscrive una connessione alla room di un gruppo. Idempotente.
    pub fn join(&self, group_id: &str, conn_id: &str, tx: UnboundedSender<String>) {
        self.rooms
            .entry(group_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), tx);
        self.joined
            .entry(conn_id.to_string())
            .or_default()
            .insert(group_id.to_string());
    }

    /// Rimuove una connessione dalla room di un gruppo. Idempotente.
    pub fn leave(&self, group_id: &str, conn_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(group_id) {
            room.remove(conn_id);
            let empty = room.is_empty();
            drop(room);
            if empty {
                // niente iscritti: la room non deve occupare memoria
                self.rooms.remove_if(group_id, |_, conns| conns.is_empty());
            }
        }
        if let Some(mut groups) = self.joined.get_mut(conn_id) {
            groups.remove(group_id);
            let empty = groups.is_empty();
            drop(groups);
            if empty {
                self.joined.remove_if(conn_id, |_, g| g.is_empty());
            }
        }
    }

    /// Toglie la connessione da ogni room in cui era iscritta. Va invocata
    /// quando il trasporto segnala la chiusura, senza aspettare una leave
    /// esplicita dal client.
    pub fn on_disconnect(&self, conn_id: &str) {
        let groups = match self.joined.remove(conn_id) {
            Some((_, groups)) => groups,
            None => return,
        };
        for group_id in groups {
            if let Some(mut room) = self.rooms.get_mut(&group_id) {
                room.remove(conn_id);
                let empty = room.is_empty();
                drop(room);
                if empty {
                    self.rooms.remove_if(&group_id, |_, conns| conns.is_empty());
                }
            }
        }
    }

    /// Consegna un evento ad ogni connessione iscritta alla room in questo
    /// momento, mittente incluso se iscritto. L'invio passa da canali
    /// unbounded e non blocca mai; una consegna fallita (socket già morto)
    /// viene scartata e il giro continua per gli altri. Ritorna quante
    /// consegne sono andate a buon fine.
    pub fn broadcast(&self, group_id: &str, msg: &WsMessage) -> usize {
        let text = serde_json::to_string(msg).expect("serialize ws message");
        let room = match self.rooms.get(group_id) {
            Some(room) => room,
            None => return 0,
        };
        let mut delivered = 0;
        for (conn_id, tx) in room.iter() {
            if tx.send(text.clone()).is_ok() {
                delivered += 1;
            } else {
                // il ricevente è già caduto; ci penserà on_disconnect
                tracing::debug!("dropping delivery to dead connection {}", conn_id);
            }
        }
        delivered
    }

    /// Numero di connessioni attualmente iscritte alla room (per i test e i log).
    pub fn room_size(&self, group_id: &str) -> usize {
        self.rooms.get(group_id).map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
