use std::any::TypeId;

use netsync_serde::{ByteReader, ByteWrite, ByteWriter, Serde, SerdeErr};

use crate::{
    messages::channel_mode::ChannelMode,
    types::{ConnectionId, HostType, ObjectId},
};

/// Who should run a remote call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcReceiver {
    /// One connection, which must observe the entity
    Target(ConnectionId),
    /// Every connection observing the entity, plus the server itself
    All,
    /// The server only
    Server,
}

impl Serde for RpcReceiver {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        match self {
            RpcReceiver::Target(connection) => {
                0u8.ser(writer);
                connection.ser(writer);
            }
            RpcReceiver::All => 1u8.ser(writer),
            RpcReceiver::Server => 2u8.ser(writer),
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match u8::de(reader)? {
            0 => Ok(RpcReceiver::Target(ConnectionId::de(reader)?)),
            1 => Ok(RpcReceiver::All),
            2 => Ok(RpcReceiver::Server),
            other => Err(SerdeErr::InvalidValue {
                type_name: "RpcReceiver",
                value: other as u64,
            }),
        }
    }
}

/// Controls who may call an RPC slot and how calls travel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcConfig {
    /// Any connection may call, not just the entity's owner
    pub can_call_by_everyone: bool,
    pub mode: ChannelMode,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            can_call_by_everyone: false,
            mode: ChannelMode::OrderedReliable,
        }
    }
}

/// Passed to an RPC body when it runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RpcContext {
    pub object_id: ObjectId,
    /// The calling connection, when known. Calls relayed to clients do not
    /// carry it.
    pub caller: Option<ConnectionId>,
    pub host: HostType,
}

type RpcBody = Box<dyn FnMut(&RpcContext, &mut ByteReader) -> Result<(), SerdeErr>>;
type RpcValidator = Box<dyn Fn(&mut ByteReader) -> Result<(), SerdeErr>>;

/// A callable slot on a component. Parameters are stored type-erased, so the
/// server can check and relay a call without running it.
pub struct RpcSlot {
    config: RpcConfig,
    params_type: TypeId,
    params_type_name: &'static str,
    validate: RpcValidator,
    body: RpcBody,
}

impl RpcSlot {
    pub fn new<P, F>(config: RpcConfig, mut body: F) -> Self
    where
        P: Serde + 'static,
        F: FnMut(&RpcContext, P) + 'static,
    {
        Self {
            config,
            params_type: TypeId::of::<P>(),
            params_type_name: std::any::type_name::<P>(),
            validate: Box::new(|reader: &mut ByteReader| P::de(reader).map(|_| ())),
            body: Box::new(move |context: &RpcContext, reader: &mut ByteReader| {
                let params = P::de(reader)?;
                body(context, params);
                Ok(())
            }),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn accepts<P: 'static>(&self) -> bool {
        self.params_type == TypeId::of::<P>()
    }

    pub fn params_type_name(&self) -> &'static str {
        self.params_type_name
    }

    /// The server and the owner may always call; anyone else only when the
    /// slot is open
    pub fn is_authorized(&self, owner: Option<ConnectionId>, caller: Option<ConnectionId>) -> bool {
        match caller {
            None => true,
            Some(caller) => self.config.can_call_by_everyone || owner == Some(caller),
        }
    }

    /// Checks that `params` decode as this slot's parameter type
    pub fn validate(&self, params: &[u8]) -> Result<(), SerdeErr> {
        (self.validate)(&mut ByteReader::new(params))
    }

    /// Decodes the parameters and runs the body
    pub fn invoke(&mut self, context: &RpcContext, params: &[u8]) -> Result<(), SerdeErr> {
        (self.body)(context, &mut ByteReader::new(params))
    }
}

/// Encodes call parameters once so they can be relayed or invoked
pub fn encode_params<P: Serde>(params: &P) -> Box<[u8]> {
    let mut writer = ByteWriter::new();
    params.ser(&mut writer);
    writer.to_bytes()
}
