pub mod local;
pub mod networked;

pub use local::LocalBackend;
pub use networked::NetworkedBackend;
