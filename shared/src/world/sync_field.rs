use std::{
    any::Any,
    collections::HashSet,
    time::{Duration, Instant},
};

use log::warn;

use netsync_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

use crate::{
    messages::channel_mode::ChannelMode,
    types::{ConnectionId, HostType},
    world::error::SyncFieldError,
};

/// Controls how a SyncField is replicated
#[derive(Clone, Debug, PartialEq)]
pub struct SyncFieldConfig {
    /// Delivery mode for regular updates. The first update a connection
    /// receives is always sent ordered and reliable.
    pub mode: ChannelMode,
    /// Minimum time between two updates
    pub send_interval: Duration,
    /// Replicate to the owning connection only
    pub owner_only: bool,
}

impl Default for SyncFieldConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::SequencedUnreliable,
            send_interval: Duration::from_millis(100),
            owner_only: false,
        }
    }
}

/// Type-erased view of a `SyncField<T>` used by the replication loop
pub trait FieldSlot: Any {
    fn config(&self) -> &SyncFieldConfig;

    /// Writes the current value
    fn write_value(&self, writer: &mut dyn ByteWrite);

    /// Overwrites the value from a replication message and fires the change
    /// callback
    fn read_value(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr>;

    /// Returns true when the current value must be pushed to the field's
    /// audience now
    fn network_update(&mut self, now: Instant) -> bool;

    /// Records that `connection` received an update. Returns true the first
    /// time, which means the update must go out ordered and reliable.
    fn mark_pushed(&mut self, connection: ConnectionId) -> bool;

    /// Forgets per-connection state once `connection` stops observing
    fn forget_connection(&mut self, connection: &ConnectionId);

    fn value_type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A single replicated value owned by the server.
///
/// Changes are coalesced: the server compares the current value against the
/// last value it sent, so a change that is undone within one send interval
/// produces no traffic.
pub struct SyncField<T: Serde + 'static> {
    host: HostType,
    config: SyncFieldConfig,
    value: T,
    last_sent: T,
    dirty: bool,
    last_sent_at: Option<Instant>,
    pushed_to: HashSet<ConnectionId>,
    on_change: Option<Box<dyn FnMut(&T)>>,
}

impl<T: Serde + 'static> SyncField<T> {
    pub fn new(initial: T) -> Self {
        Self {
            host: HostType::Server,
            config: SyncFieldConfig::default(),
            last_sent: initial.clone(),
            value: initial,
            dirty: false,
            last_sent_at: None,
            pushed_to: HashSet::new(),
            on_change: None,
        }
    }

    pub fn with_config(mut self, config: SyncFieldConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_on_change<F: FnMut(&T) + 'static>(mut self, on_change: F) -> Self {
        self.on_change = Some(Box::new(on_change));
        self
    }

    pub(crate) fn attach(&mut self, host: HostType) {
        self.host = host;
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn config(&self) -> &SyncFieldConfig {
        &self.config
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_on_change<F: FnMut(&T) + 'static>(&mut self, on_change: F) {
        self.on_change = Some(Box::new(on_change));
    }

    /// Sets a new value. Only the server may do this.
    pub fn set(&mut self, value: T) -> Result<(), SyncFieldError> {
        if self.host != HostType::Server {
            warn!("Rejected SyncField set on a client");
            return Err(SyncFieldError::ClientCannotSet);
        }
        if value == self.value {
            return Ok(());
        }
        self.value = value;
        self.dirty = true;
        self.fire_on_change();
        Ok(())
    }

    fn fire_on_change(&mut self) {
        if let Some(on_change) = self.on_change.as_mut() {
            on_change(&self.value);
        }
    }

    fn interval_elapsed(&self, now: Instant) -> bool {
        match self.last_sent_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.config.send_interval,
        }
    }
}

impl<T: Serde + 'static> FieldSlot for SyncField<T> {
    fn config(&self) -> &SyncFieldConfig {
        &self.config
    }

    fn write_value(&self, writer: &mut dyn ByteWrite) {
        self.value.ser(writer);
    }

    fn read_value(&mut self, reader: &mut ByteReader) -> Result<(), SerdeErr> {
        self.value = T::de(reader)?;
        self.last_sent = self.value.clone();
        self.fire_on_change();
        Ok(())
    }

    fn network_update(&mut self, now: Instant) -> bool {
        if self.host != HostType::Server || !self.dirty || !self.interval_elapsed(now) {
            return false;
        }
        self.dirty = false;
        if self.value == self.last_sent {
            return false;
        }
        self.last_sent = self.value.clone();
        self.last_sent_at = Some(now);
        true
    }

    fn mark_pushed(&mut self, connection: ConnectionId) -> bool {
        self.pushed_to.insert(connection)
    }

    fn forget_connection(&mut self, connection: &ConnectionId) {
        self.pushed_to.remove(connection);
    }

    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
