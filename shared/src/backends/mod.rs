cfg_if! {
    if #[cfg(not(target_arch = "wasm32"))] {
        mod native;
        pub use native::timestamp::{TimeError, Timestamp};
    }
}
