//! SCEP collaborators: message building/unwrapping and the wire transport.

mod cms_engine;
mod engine;
mod transport;

pub use cms_engine::CmsEngine;
pub use engine::{
    EnrollmentMaterial, Envelope, EnvelopeAlgorithms, PkiStatus, ScepEngine, UnwrapKeys,
};
pub use transport::{CONTENT_TYPE_CA_CERT, HttpTransport, Reply, Transport};
