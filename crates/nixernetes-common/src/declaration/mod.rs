//! Application declarations
//!
//! An [`Application`] is the input to the compiler: one container image,
//! the ports it exposes, the applications it calls and the compliance
//! posture it must satisfy. Declarations are immutable once handed to the
//! compiler.

mod application;
mod compliance;
mod dependency;
mod ports;

pub use application::{validate_image, Application};
pub use compliance::{ComplianceLevel, ComplianceRequest, KNOWN_FRAMEWORKS};
pub use dependency::{DependencyRef, ExternalTarget};
pub use ports::{PortSpec, Protocol};
