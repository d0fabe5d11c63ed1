//! Typed data access for paginated JSON REST backends.
//!
//! # Overview
//! Maps Rust entity types onto Django-REST-Framework-style endpoints:
//! `results`/`next` page envelopes, `Authorization: Token` auth and
//! path-templated CRUD. The network itself stays outside the crate; the core
//! talks to an `HttpClient`, and `Connection` implements that capability on
//! top of any host `Transport`.
//!
//! # Design
//! - `field` / `entity`: entity types declare their fields once; the
//!   resulting `EntityCodec` is cached per type and converts whole entities
//!   to and from wire objects, keeping "not supplied" apart from `null`.
//! - `pagination`: `PageWalker` lazily streams records across pages, either
//!   following `next` links or incrementing a page parameter.
//! - `gateway`: `Gateway<E>` exposes create/read/update/delete for one
//!   resource, in standard, single-resource, read-only and list-only
//!   variants. Filters and update payloads can be entity types of their own.
//! - `http` / `connection`: the capability seam and the plain-data request
//!   and response types a transport executes.

pub mod auth;
pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod gateway;
pub mod http;
pub mod pagination;

#[cfg(test)]
mod testing;

pub use config::ConnectionConfig;
pub use connection::{Connection, Transport};
pub use entity::{from_wire, to_wire, Entity, EntityCodec, ForeignKey};
pub use error::{ApiError, ApiResult, HttpBody};
pub use field::{FieldSpec, FieldTable, Maybe, WireValue};
pub use gateway::{filter_query, Gateway, GatewayKind, Read};
pub use http::{Headers, HttpClient, HttpMethod, HttpRequest, HttpResponse, Query};
pub use pagination::{LogProgress, PageProgress, PageWalker, PaginationConfig, ProgressCallback};

#[doc(hidden)]
pub mod __private {
    pub use serde_json::Value;
}
