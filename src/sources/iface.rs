//! Interface Info Source
//!
//! Answers "does this machine have a usable IPv4/IPv6 interface", consumed by
//! ADDRCONFIG-style result filtering. Enumeration of actual interfaces is an
//! external concern; the engine only sees the two booleans.

// == Interface Info ==
/// Availability of non-loopback interfaces per address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceInfo {
    /// At least one non-loopback IPv4 interface exists
    pub has4: bool,
    /// At least one non-loopback IPv6 interface exists
    pub has6: bool,
}

// == Interface Provider Contract ==
/// Supplies the current interface availability on demand.
///
/// Re-queried by the engine after a "network changed" signal
/// (`update_interface_info`) and whenever the server list changes.
pub trait InterfaceProvider: Send + Sync {
    /// Returns the current interface availability.
    fn interfaces(&self) -> IfaceInfo;
}

// == Assume All ==
/// Default provider that reports both families as available, leaving
/// ADDRCONFIG filtering a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeAll;

impl InterfaceProvider for AssumeAll {
    fn interfaces(&self) -> IfaceInfo {
        IfaceInfo {
            has4: true,
            has6: true,
        }
    }
}
