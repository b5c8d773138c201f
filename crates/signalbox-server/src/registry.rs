//! Participant registry: display name to connection handle, plus the
//! dispatcher pointer and the state of any open election.
//!
//! The registry is plain data. The relay keeps it behind a single lock, so
//! every method here observes and leaves a consistent state.
//!
//! # Invariants
//!
//! - Each handle is registered under exactly one name; [`rename`] moves it
//!   in one step.
//! - The dispatcher is either unset or a registered name.
//! - An election is open only while the dispatcher is unset.
//! - Handshakes are held only while an election is open, and only for
//!   registered names.
//!
//! [`rename`]: ParticipantRegistry::rename

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

/// Registry lookup and update failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another connection already holds the name.
    #[error("duplicate participant name: {0}")]
    DuplicateName(String),

    /// No connection is registered under the name.
    #[error("unknown participant: {0}")]
    UnknownName(String),
}

/// Role assigned on admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First participant of a fresh session; now the dispatcher.
    Dispatcher,
    /// Joined an existing session.
    Participant,
}

/// Result of removing a participant.
#[derive(Debug)]
pub struct Removal<H> {
    /// Handle that was registered under the name
    pub handle: H,
    /// Epoch of the election opened because the dispatcher left
    pub election: Option<u64>,
}

#[derive(Debug)]
struct Entry<H> {
    handle: H,
    joined: u64,
}

/// Name-keyed registry of connected participants.
#[derive(Debug)]
pub struct ParticipantRegistry<H> {
    entries: HashMap<String, Entry<H>>,
    dispatcher: Option<String>,
    election: Option<u64>,
    epochs: u64,
    joins: u64,
    /// Handshake frames that arrived with no dispatcher to receive them
    held: Vec<(String, Bytes)>,
}

impl<H> Default for ParticipantRegistry<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            dispatcher: None,
            election: None,
            epochs: 0,
            joins: 0,
            held: Vec::new(),
        }
    }
}

impl<H> ParticipantRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// An empty registry starts a fresh session: the newcomer becomes
    /// dispatcher and any election still waiting on its grace period is
    /// closed.
    ///
    /// # Errors
    ///
    /// `RegistryError::DuplicateName` if `name` is taken.
    pub fn admit(&mut self, name: &str, handle: H) -> Result<Admission, RegistryError> {
        if self.entries.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let seed = self.entries.is_empty();
        self.joins += 1;
        self.entries.insert(name.to_string(), Entry { handle, joined: self.joins });

        if seed {
            self.dispatcher = Some(name.to_string());
            self.election = None;
            self.held.clear();
            Ok(Admission::Dispatcher)
        } else {
            Ok(Admission::Participant)
        }
    }

    /// Move a connection from `from` to `to`, carrying the dispatcher role
    /// with it.
    ///
    /// # Errors
    ///
    /// - `RegistryError::UnknownName` if nothing is registered under `from`
    /// - `RegistryError::DuplicateName` if `to` is held by another connection
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), RegistryError> {
        if !self.entries.contains_key(from) {
            return Err(RegistryError::UnknownName(from.to_string()));
        }
        if from == to {
            return Ok(());
        }
        if self.entries.contains_key(to) {
            return Err(RegistryError::DuplicateName(to.to_string()));
        }

        if let Some(entry) = self.entries.remove(from) {
            self.entries.insert(to.to_string(), entry);
        }
        if self.dispatcher.as_deref() == Some(from) {
            self.dispatcher = Some(to.to_string());
        }
        Ok(())
    }

    /// Unregister `name`. Removing the dispatcher opens a new election.
    pub fn remove(&mut self, name: &str) -> Option<Removal<H>> {
        let entry = self.entries.remove(name)?;
        self.held.retain(|(held, _)| held != name);

        let election = if self.dispatcher.as_deref() == Some(name) {
            self.dispatcher = None;
            self.epochs += 1;
            self.election = Some(self.epochs);
            self.election
        } else {
            None
        };

        Some(Removal { handle: entry.handle, election })
    }

    /// Handle registered under `name`.
    pub fn handle(&self, name: &str) -> Option<&H> {
        self.entries.get(name).map(|entry| &entry.handle)
    }

    /// Current dispatcher, unset while an election is open or the session is
    /// empty.
    pub fn dispatcher(&self) -> Option<&str> {
        self.dispatcher.as_deref()
    }

    /// Epoch of the open election, if any.
    pub fn election(&self) -> Option<u64> {
        self.election
    }

    /// Make `name` the dispatcher if an election is open.
    ///
    /// Returns `false` when there is no election to win (the first claim
    /// already did) or `name` is not registered.
    pub fn claim(&mut self, name: &str) -> bool {
        if self.election.is_none() || !self.entries.contains_key(name) {
            return false;
        }
        self.election = None;
        self.dispatcher = Some(name.to_string());
        true
    }

    /// Close election `epoch` by appointing the longest-connected participant.
    ///
    /// Returns the appointee. A stale epoch (the election was already settled
    /// or superseded) changes nothing; an empty registry closes the election
    /// and leaves the dispatcher unset.
    pub fn appoint(&mut self, epoch: u64) -> Option<String> {
        if self.election != Some(epoch) {
            return None;
        }
        self.election = None;

        let name = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.joined)
            .map(|(name, _)| name.clone())?;
        self.dispatcher = Some(name.clone());
        Some(name)
    }

    /// Keep `name`'s handshake frame for whoever wins the open election.
    ///
    /// Returns `false`, holding nothing, when no election is open or `name`
    /// is not registered.
    pub fn hold_handshake(&mut self, name: &str, frame: Bytes) -> bool {
        if self.election.is_none() || !self.entries.contains_key(name) {
            return false;
        }
        self.held.push((name.to_string(), frame));
        true
    }

    /// Drain the held handshakes, in arrival order, for delivery to the
    /// dispatcher. The dispatcher's own handshake is dropped.
    pub fn take_handshakes(&mut self) -> Vec<(String, Bytes)> {
        let dispatcher = self.dispatcher.as_deref();
        std::mem::take(&mut self.held)
            .into_iter()
            .filter(|(name, _)| Some(name.as_str()) != dispatcher)
            .collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no participant is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Clone> ParticipantRegistry<H> {
    /// Every participant except `exclude`, with a clone of its handle.
    pub fn recipients(&self, exclude: Option<&str>) -> Vec<(String, H)> {
        self.entries
            .iter()
            .filter(|(name, _)| Some(name.as_str()) != exclude)
            .map(|(name, entry)| (name.clone(), entry.handle.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_admission_seeds_dispatcher() {
        let mut registry = ParticipantRegistry::new();
        assert_eq!(registry.admit("10.0.0.1:5000", 1), Ok(Admission::Dispatcher));
        assert_eq!(registry.admit("10.0.0.2:5000", 2), Ok(Admission::Participant));
        assert_eq!(registry.dispatcher(), Some("10.0.0.1:5000"));
    }

    #[test]
    fn admit_rejects_duplicate_name() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        assert_eq!(registry.admit("a", 2), Err(RegistryError::DuplicateName("a".into())));
        assert_eq!(registry.handle("a"), Some(&1));
    }

    #[test]
    fn rename_carries_dispatcher_role() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("10.0.0.1:5000", 1).unwrap();
        registry.rename("10.0.0.1:5000", "Alice").unwrap();

        assert_eq!(registry.dispatcher(), Some("Alice"));
        assert_eq!(registry.handle("Alice"), Some(&1));
        assert_eq!(registry.handle("10.0.0.1:5000"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rename_errors() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();

        assert_eq!(registry.rename("zz", "c"), Err(RegistryError::UnknownName("zz".into())));
        assert_eq!(registry.rename("a", "b"), Err(RegistryError::DuplicateName("b".into())));
        assert_eq!(registry.rename("a", "a"), Ok(()));
    }

    #[test]
    fn removing_dispatcher_opens_election() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();

        let removal = registry.remove("a").unwrap();
        assert_eq!(removal.handle, 1);
        assert_eq!(removal.election, Some(1));
        assert_eq!(registry.dispatcher(), None);
        assert_eq!(registry.election(), Some(1));
    }

    #[test]
    fn removing_participant_keeps_dispatcher() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();

        assert_eq!(registry.remove("b").unwrap().election, None);
        assert_eq!(registry.dispatcher(), Some("a"));
        assert!(registry.remove("b").is_none());
    }

    #[test]
    fn appoint_picks_longest_connected() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("c", 3).unwrap();
        registry.admit("b", 2).unwrap();
        registry.rename("c", "zed").unwrap();

        let epoch = registry.remove("a").unwrap().election.unwrap();
        assert_eq!(registry.appoint(epoch), Some("zed".to_string()));
        assert_eq!(registry.dispatcher(), Some("zed"));
        assert_eq!(registry.election(), None);
    }

    #[test]
    fn appoint_on_empty_registry_leaves_pointer_unset() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();

        let epoch = registry.remove("a").unwrap().election.unwrap();
        assert_eq!(registry.appoint(epoch), None);
        assert_eq!(registry.dispatcher(), None);
        assert_eq!(registry.election(), None);
    }

    #[test]
    fn claim_wins_open_election_once() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();
        registry.admit("c", 3).unwrap();

        let epoch = registry.remove("a").unwrap().election.unwrap();
        assert!(registry.claim("c"));
        assert!(!registry.claim("b"));
        assert_eq!(registry.dispatcher(), Some("c"));

        // Grace timer fires afterwards and does nothing
        assert_eq!(registry.appoint(epoch), None);
        assert_eq!(registry.dispatcher(), Some("c"));
    }

    #[test]
    fn claim_without_election_is_ignored() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();

        assert!(!registry.claim("b"));
        assert_eq!(registry.dispatcher(), Some("a"));
    }

    #[test]
    fn reseed_supersedes_stale_election() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        let epoch = registry.remove("a").unwrap().election.unwrap();

        assert_eq!(registry.admit("b", 2), Ok(Admission::Dispatcher));
        assert_eq!(registry.appoint(epoch), None);
        assert_eq!(registry.dispatcher(), Some("b"));
    }

    #[test]
    fn handshakes_held_until_election_settles() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();
        assert!(!registry.hold_handshake("b", Bytes::from_static(b"b")));

        let epoch = registry.remove("a").unwrap().election.unwrap();
        registry.admit("d", 3).unwrap();
        registry.admit("e", 4).unwrap();
        assert!(registry.hold_handshake("b", Bytes::from_static(b"b")));
        assert!(registry.hold_handshake("d", Bytes::from_static(b"d")));
        assert!(registry.hold_handshake("e", Bytes::from_static(b"e")));
        assert!(!registry.hold_handshake("ghost", Bytes::from_static(b"g")));
        registry.remove("e");

        assert_eq!(registry.appoint(epoch).as_deref(), Some("b"));
        let held = registry.take_handshakes();
        assert_eq!(held, [("d".to_string(), Bytes::from_static(b"d"))]);
        assert!(registry.take_handshakes().is_empty());
    }

    #[test]
    fn reseed_discards_held_handshakes() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();
        registry.remove("a");
        assert!(registry.hold_handshake("b", Bytes::from_static(b"b")));
        registry.remove("b");

        registry.admit("c", 3).unwrap();
        assert!(registry.take_handshakes().is_empty());
    }

    #[test]
    fn recipients_exclude_sender() {
        let mut registry = ParticipantRegistry::new();
        registry.admit("a", 1).unwrap();
        registry.admit("b", 2).unwrap();
        registry.admit("c", 3).unwrap();

        let mut names: Vec<_> = registry.recipients(Some("b")).into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(registry.recipients(None).len(), 3);
    }
}
