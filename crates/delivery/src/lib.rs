//! Delivery client for the downstream conversions API: a transport seam,
//! a bounded-retry client, and a scripted transport for tests.

pub mod client;
pub mod testing;
pub mod transport;

pub use client::{ConversionsClient, RetryPolicy};
pub use transport::{ConversionTransport, HttpTransport, TransportFailure, TransportResponse};
