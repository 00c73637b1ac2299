//! The connection registry: every live (or recently dropped) connection.
//!
//! A record is created the moment a transport opens, before the player
//! has picked a name:
//!
//! ```text
//! register() ──→ set_display_name() ──→ set_ready()
//!     │                 │                    │
//!     ▼                 ▼                    ▼
//! [awaiting join]    [joined]          [joined, ready]
//!                        │
//!                        ▼ mark_disconnected()
//!                  [disconnected] ──(grace delay)──→ purge()
//! ```
//!
//! Records are kept in insertion order. The order only decides the order
//! of roster entries and of broadcast delivery.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `Vec` with no locking. It is owned by
//! the session actor task and never shared.

use mathdrop_protocol::{PlayerId, PlayerSummary, Recipient};
use mathdrop_transport::ConnectionId;
use rand::Rng;

use crate::RegistryError;

/// Characters used in generated tokens (lowercase base-36).
const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of a generated token.
const TOKEN_LEN: usize = 9;

/// The registry's record of one connection.
///
/// `H` is the transport handle (the server uses the player's outbox
/// sender). The record owns it exclusively; dropping the record drops
/// the handle.
#[derive(Debug)]
pub struct ConnectionRecord<H> {
    id: PlayerId,
    connection_id: ConnectionId,
    handle: H,
    display_name: Option<String>,
    ready: bool,
    connected: bool,
}

impl<H> ConnectionRecord<H> {
    /// The token handed to this connection in its `welcome`.
    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// The transport connection this record was registered for.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// The transport handle used to deliver messages.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// The display name, once the player has joined.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Whether the player has sent `ready`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// `false` once the transport has closed.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the player has joined (has a display name).
    pub fn is_joined(&self) -> bool {
        self.display_name.is_some()
    }

    /// Joined and still connected: counts toward the all-ready rule and
    /// receives broadcasts.
    pub fn is_participant(&self) -> bool {
        self.connected && self.is_joined()
    }

    /// The roster entry for this record, if it has joined.
    pub fn summary(&self) -> Option<PlayerSummary> {
        let screen_name = self.display_name.clone()?;
        Some(PlayerSummary {
            id: self.id.clone(),
            screen_name,
            ready: self.ready,
            connected: self.connected,
        })
    }
}

/// Ordered map from player token to connection record.
#[derive(Debug)]
pub struct ConnectionRegistry<H> {
    records: Vec<ConnectionRecord<H>>,
}

impl<H> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ConnectionRegistry<H> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Registers a freshly opened connection and returns its new token.
    ///
    /// The record starts connected, not ready, and without a name.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyRegistered`] if `connection_id` already
    /// has a record.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        handle: H,
    ) -> Result<PlayerId, RegistryError> {
        if self
            .records
            .iter()
            .any(|r| r.connection_id == connection_id)
        {
            return Err(RegistryError::AlreadyRegistered(connection_id));
        }

        let id = self.unused_token();
        self.records.push(ConnectionRecord {
            id: id.clone(),
            connection_id,
            handle,
            display_name: None,
            ready: false,
            connected: true,
        });
        tracing::debug!(player_id = %id, %connection_id, "connection registered");
        Ok(id)
    }

    /// Sets the display name for a record. Names are trimmed and set once.
    ///
    /// Returns the stored (trimmed) name.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownPlayer`]: no such record
    /// - [`RegistryError::EmptyName`]: nothing left after trimming
    /// - [`RegistryError::NameAlreadySet`]: the record already joined
    pub fn set_display_name(
        &mut self,
        id: &PlayerId,
        name: &str,
    ) -> Result<&str, RegistryError> {
        let record = self.get_mut(id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName(id.clone()));
        }
        if record.display_name.is_some() {
            return Err(RegistryError::NameAlreadySet(id.clone()));
        }
        let stored = record.display_name.insert(name.to_owned());
        Ok(stored.as_str())
    }

    /// Marks a joined record as ready.
    ///
    /// Idempotent: returns `Ok(true)` if the flag changed, `Ok(false)` if
    /// it was already set.
    ///
    /// # Errors
    /// [`RegistryError::UnknownPlayer`] or [`RegistryError::NotJoined`].
    pub fn set_ready(&mut self, id: &PlayerId) -> Result<bool, RegistryError> {
        let record = self.get_mut(id)?;
        if !record.is_joined() {
            return Err(RegistryError::NotJoined(id.clone()));
        }
        let changed = !record.ready;
        record.ready = true;
        Ok(changed)
    }

    /// Clears every record's ready flag. Returns how many were set.
    pub fn clear_ready(&mut self) -> usize {
        let mut cleared = 0;
        for record in self.records.iter_mut().filter(|r| r.ready) {
            record.ready = false;
            cleared += 1;
        }
        cleared
    }

    /// Marks a record as disconnected without removing it.
    ///
    /// # Errors
    /// [`RegistryError::UnknownPlayer`] or
    /// [`RegistryError::AlreadyDisconnected`].
    pub fn mark_disconnected(&mut self, id: &PlayerId) -> Result<(), RegistryError> {
        let record = self.get_mut(id)?;
        if !record.connected {
            return Err(RegistryError::AlreadyDisconnected(id.clone()));
        }
        record.connected = false;
        Ok(())
    }

    /// Removes a disconnected record and returns it.
    ///
    /// # Errors
    /// [`RegistryError::UnknownPlayer`] or
    /// [`RegistryError::StillConnected`]: purging a live connection is a
    /// logic error.
    pub fn purge(&mut self, id: &PlayerId) -> Result<ConnectionRecord<H>, RegistryError> {
        let index = self
            .records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| RegistryError::UnknownPlayer(id.clone()))?;
        if self.records[index].connected {
            return Err(RegistryError::StillConnected(id.clone()));
        }
        Ok(self.records.remove(index))
    }

    /// The roster: every joined record not yet purged, in join order.
    ///
    /// Disconnected records still appear (with `connected: false`) until
    /// they are purged.
    pub fn snapshot(&self) -> Vec<PlayerSummary> {
        self.records.iter().filter_map(ConnectionRecord::summary).collect()
    }

    /// Connected, joined records in insertion order.
    pub fn participants(&self) -> impl Iterator<Item = &ConnectionRecord<H>> {
        self.records.iter().filter(|r| r.is_participant())
    }

    /// Returns `true` when at least `min_players` participants exist and
    /// every one of them is ready.
    pub fn all_ready(&self, min_players: usize) -> bool {
        let mut count = 0;
        for record in self.participants() {
            if !record.ready {
                return false;
            }
            count += 1;
        }
        count >= min_players
    }

    /// Resolves a [`Recipient`] to the connected records that should get
    /// the message.
    ///
    /// `All` and `AllExcept` select participants only. `Player` selects
    /// the named record as long as its transport is open, joined or not.
    pub fn recipients<'a>(
        &'a self,
        to: &'a Recipient,
    ) -> impl Iterator<Item = &'a ConnectionRecord<H>> + 'a {
        self.records.iter().filter(move |r| match to {
            Recipient::All => r.is_participant(),
            Recipient::AllExcept(excluded) => r.is_participant() && &r.id != excluded,
            Recipient::Player(id) => r.connected && &r.id == id,
        })
    }

    /// Looks up a record by token.
    pub fn get(&self, id: &PlayerId) -> Option<&ConnectionRecord<H>> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Number of records (any state).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn get_mut(&mut self, id: &PlayerId) -> Result<&mut ConnectionRecord<H>, RegistryError> {
        self.records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RegistryError::UnknownPlayer(id.clone()))
    }

    /// Draws tokens until one is not in use.
    fn unused_token(&self) -> PlayerId {
        loop {
            let candidate = generate_token();
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

/// Generates a 9-character lowercase base-36 token.
fn generate_token() -> PlayerId {
    let mut rng = rand::rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();
    PlayerId(token)
}

// =========================================================================
// Tests
// =========================================================================
