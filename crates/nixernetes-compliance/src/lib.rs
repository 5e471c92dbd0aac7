//! Compliance profiles
//!
//! Turns a [`ComplianceLevel`](nixernetes_common::declaration::ComplianceLevel)
//! or a named environment profile into the concrete enforcement flags the
//! compiler acts on.

#![deny(missing_docs)]

mod profile;
mod resolver;

pub use profile::{ComplianceProfile, PodSecurityLevel, ProfileOverrides};
pub use resolver::{ComplianceProfileResolver, NamedProfile};
