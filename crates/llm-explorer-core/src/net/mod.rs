//! Request/response types and the network seam.
//!
//! Everything the page context asks for is a [`Request`]; everything that
//! comes back, whether from the network or the offline cache, is a
//! [`Response`]. The [`Fetcher`] trait is the only place real HTTP happens,
//! so tests swap in counting fakes.

pub mod fetcher;
pub mod request;

pub use fetcher::{Fetcher, HttpFetcher, OfflineFetcher};
pub use request::{Request, RequestKey, Response, ResponseKind, ResponseSource};
