pub mod component;
pub mod entity;
pub mod error;
pub mod handles;
pub mod object_id_allocator;
pub mod registry;
pub mod replication;
pub mod rpc;
pub mod sync_field;
pub mod sync_list;
pub mod transform;
