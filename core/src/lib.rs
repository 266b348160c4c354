//! Synchronous client for the EasyPost shipping API.
//!
//! # Overview
//! Typed operations for addresses, parcels, shipments, rate quotes, label
//! purchase, customs declarations, refunds, batches and scan forms. Records
//! are flattened into the service's nested form convention, sent over one
//! blocking HTTP round-trip, and the JSON answer is mapped back onto the
//! same records.
//!
//! # Design
//! - `EasyPostClient` owns an immutable `Config` (credential + base URL) and
//!   a `Transport`; no process-wide state.
//! - Each operation has a pure `build_*` counterpart producing an
//!   `HttpRequest`, so request encoding is testable without a network.
//! - A nested address, parcel or customs info is sent by id when it has one
//!   and by full value otherwise.
//! - Failures come back as `ApiError`; an `error` field in an otherwise
//!   well-formed body is reported as `ApiError::Remote`.
//!
//! ```no_run
//! use easypost_core::{Address, Config, EasyPostClient};
//!
//! let client = EasyPostClient::new(Config::new("EZTK..."));
//! let address = client.create_address(&Address {
//!     name: "Jane Doe".to_string(),
//!     street1: "1 Main St".to_string(),
//!     city: "Springfield".to_string(),
//!     state: "IL".to_string(),
//!     zip: "62704".to_string(),
//!     country: "US".to_string(),
//!     ..Address::default()
//! })?;
//! println!("created {}", address.id);
//! # Ok::<(), easypost_core::ApiError>(())
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod form;
pub mod http;
pub mod services;
pub mod types;

pub use client::EasyPostClient;
pub use config::Config;
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{
    Address, Batch, BatchMode, BatchStatus, CustomsInfo, CustomsItem, Parcel, PostageLabel, Rate,
    Refund, ScanForm, Shipment, ShippingOptions, VerifiedAddress,
};
