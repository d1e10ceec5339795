//! # powerschool - PowerSchool REST API client for Rust
//!
//! An async client for the PowerSchool student information system API.
//! It handles the OAuth2 client-credentials exchange, token renewal, paged
//! collections and PowerQuery execution, and passes records through as raw
//! JSON values.
//!
//! ## Features
//!
//! - OAuth2 client-credentials authentication with cached, single-flight
//!   token renewal
//! - Single record, collection and count requests with expansions,
//!   extensions and queries
//! - Count-driven pagination that never returns a partial collection
//! - PowerQuery execution with typed validation errors
//! - Record creation returning the new record's id
//!
//! ## Basic Usage
//!
//! ```no_run
//! use powerschool::{Config, PowerSchool, QueryOptions};
//!
//! # async fn run() -> Result<(), powerschool::RestError> {
//! let client = PowerSchool::new(Config::new(
//!     "https://ps.example.org",
//!     "client-id",
//!     "client-secret",
//! ))?;
//!
//! // A single record, unwrapped from its envelope
//! let student = client.student_for_dcid(1234, Some("demographics")).await?;
//! println!("{}", student["name"]["last_name"]);
//!
//! // Every page of a collection
//! let students = client
//!     .fetch_all(
//!         "ws/v1/district/student",
//!         &QueryOptions::new().query("school_enrollment.enroll_status==A"),
//!     )
//!     .await?;
//! println!("{} active students", students.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## PowerQuery
//!
//! ```no_run
//! use powerschool::{json, PowerSchool};
//!
//! # async fn run(client: &PowerSchool) -> Result<(), powerschool::RestError> {
//! let rows = client
//!     .power_query(
//!         "ws/schema/query/com.pearson.core.student.search",
//!         Some(&json!({"lastname": "Smith"})),
//!     )
//!     .await?;
//! println!("{} matching students", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod powerquery;
pub mod response;
pub mod rest;
pub mod token;

// Re-export main types for convenience
pub use client::Config;
pub use endpoints::Resource;
pub use error::{RestError, Result};
pub use response::{OneOrMany, ResourceId};
pub use rest::{PowerSchool, QueryOptions};
pub use token::{Token, TokenManager};

// Re-export serde_json for convenience
pub use serde_json::json;
