/// Upper bound on the element count of any length-prefixed sequence read off
/// the wire. Larger prefixes are rejected before anything is allocated.
pub const MAX_SEQUENCE_LENGTH: u64 = 1 << 20;
