/// Delivery guarantee requested from the transport for one outgoing message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    UnorderedUnreliable,
    SequencedUnreliable,
    UnorderedReliable,
    SequencedReliable,
    OrderedReliable,
}

impl ChannelMode {
    pub fn is_reliable(&self) -> bool {
        match self {
            ChannelMode::UnorderedUnreliable | ChannelMode::SequencedUnreliable => false,
            ChannelMode::UnorderedReliable
            | ChannelMode::SequencedReliable
            | ChannelMode::OrderedReliable => true,
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, ChannelMode::OrderedReliable)
    }
}

impl Default for ChannelMode {
    fn default() -> Self {
        ChannelMode::OrderedReliable
    }
}
