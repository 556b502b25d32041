//! External Collaborator Sources
//!
//! The hosts override and interface-info seams consumed by the cache engine.

mod hosts;
mod iface;

pub use hosts::{HostsOverride, StaticHosts};
pub use iface::{AssumeAll, IfaceInfo, InterfaceProvider};
