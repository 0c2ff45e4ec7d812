//! High-level entry point
//!
//! [`ODataV4Adapter`] wires the translator, normalizers and batch protocol
//! around one [`Transport`](crate::transport::Transport).

mod adapter;

pub use adapter::ODataV4Adapter;
