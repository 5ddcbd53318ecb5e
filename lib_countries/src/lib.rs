//! # lib_countries
//!
//! Country metadata and exchange-rate refresh pipeline.
//!
//! The pipeline core is always compiled: domain types, the record
//! reconciler, the refresh coordinator, the source and store traits and the
//! in-memory store. Everything that talks to the outside world sits behind a
//! folder-level feature (`retrieve`, `connections`, `imaging`, `configs`,
//! `loggers`; `full` enables all of them).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod domain;
pub mod errors;
pub mod reconcile;
pub mod refresh;
pub mod sources;
pub mod store;
pub mod summary;

#[cfg(feature = "configs")]
pub mod configs;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "imaging")]
pub mod imaging;

#[cfg(feature = "loggers")]
pub mod loggers;

#[cfg(feature = "retrieve")]
pub mod retrieve;

pub use domain::{CountryDraft, CountryRecord, CountryQuery, SortOrder, StoreStatus, UpsertOutcome};
pub use errors::{ImageError, ReconcileError, RefreshError, SourceError, StoreError};
pub use refresh::{RefreshCoordinator, RefreshReport};
pub use sources::{CountrySource, RateOrigin, RateSource, RateTable};
pub use store::{CountryStore, MemoryCountryStore};
pub use summary::{ImageCache, SummaryRenderer, SummarySnapshot};
