use std::{fmt, marker::PhantomData};

use crate::types::{ComponentIndex, SlotIndex};

// Handles are plain (component, slot) pairs. The prototype builder hands them
// out in declaration order, so applications may also build them as constants.

macro_rules! slot_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            component: ComponentIndex,
            slot: SlotIndex,
            phantom: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub const fn new(component: ComponentIndex, slot: SlotIndex) -> Self {
                Self {
                    component,
                    slot,
                    phantom: PhantomData,
                }
            }

            pub fn component(&self) -> ComponentIndex {
                self.component
            }

            pub fn slot(&self) -> SlotIndex {
                self.slot
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.component == other.component && self.slot == other.slot
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}, {})", stringify!($name), self.component, self.slot)
            }
        }
    };
}

slot_handle!(
    /// Typed address of a `SyncField<T>` inside an entity
    FieldHandle
);
slot_handle!(
    /// Typed address of a `SyncList<T>` inside an entity
    ListHandle
);
slot_handle!(
    /// Typed address of an RPC slot taking parameters `P`
    RpcHandle
);
