//! sparkify-etl library interface
//!
//! Batch ETL from raw song metadata and activity logs into a star schema:
//! `songs`, `artists`, `users`, `time` dimensions and the `songplays` fact
//! table, persisted as partitioned Parquet.

pub mod error;
pub mod extract;
pub mod join;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod tables;

pub use crate::error::{EtlError, EtlResult};
pub use crate::pipeline::{run, RunSummary};
pub use crate::session::EtlSession;
