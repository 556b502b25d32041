//! Result Shaper Module
//!
//! Pure policy application over a raw entry list: family selection,
//! IPv4-mapped-IPv6 synthesis, interface-availability filtering and
//! single-entry selection.

use crate::cache::{AddressFamily, Entry};
use crate::sources::IfaceInfo;

// == Lookup Hints ==
/// Optional shaping behaviors, mirroring the classic resolver hint flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupHints {
    /// V4MAPPED: when family 6 is requested and no native IPv6 entries
    /// exist, synthesize them from the IPv4 entries
    pub v4_mapped: bool,
    /// ADDRCONFIG: only return families for which the machine has at least
    /// one non-loopback interface
    pub addr_config: bool,
}

// == Lookup Options ==
/// Caller policy applied to a raw entry list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Restrict results to one address family; `None` keeps both
    pub family: Option<AddressFamily>,
    /// Shaping hints
    pub hints: LookupHints,
}

impl LookupOptions {
    /// Options restricted to one address family.
    pub fn family(family: AddressFamily) -> Self {
        Self {
            family: Some(family),
            ..Self::default()
        }
    }
}

// == Shape ==
/// Applies caller policy to a raw entry list.
///
/// Order of the input is preserved: the authoritative path produces family-4
/// entries before family-6, the fallback path produces system order.
pub fn shape(entries: Vec<Entry>, options: &LookupOptions, iface: IfaceInfo) -> Vec<Entry> {
    let mut shaped = match options.family {
        Some(AddressFamily::V6) => {
            let native: Vec<Entry> = entries
                .iter()
                .filter(|entry| entry.family() == AddressFamily::V6)
                .cloned()
                .collect();

            if native.is_empty() && options.hints.v4_mapped {
                entries.iter().map(Entry::to_v4_mapped).collect()
            } else {
                native
            }
        }
        Some(AddressFamily::V4) => entries
            .into_iter()
            .filter(|entry| entry.family() == AddressFamily::V4)
            .collect(),
        None => entries,
    };

    if options.hints.addr_config {
        shaped.retain(|entry| match entry.family() {
            AddressFamily::V4 => iface.has4,
            AddressFamily::V6 => iface.has6,
        });
    }

    shaped
}

// == Pick ==
/// Selects one entry with an unweighted uniform random choice.
///
/// This is a deliberate load-distribution policy; passing a seeded rng makes
/// the choice reproducible under test.
pub fn pick<'a>(entries: &'a [Entry], rng: &mut fastrand::Rng) -> Option<&'a Entry> {
    match entries {
        [] => None,
        [only] => Some(only),
        _ => entries.get(rng.usize(..entries.len())),
    }
}
