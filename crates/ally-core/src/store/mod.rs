// ── Device storage ──

pub(crate) mod collection;
mod device_store;

pub use device_store::DeviceStore;
