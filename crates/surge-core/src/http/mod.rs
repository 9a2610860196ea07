pub mod client;
pub mod transport;

pub use client::{HttpTransport, HttpTransportBuilder};
pub use transport::{
    Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse,
};
