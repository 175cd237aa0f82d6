//! Single-user todo list served over HTTP and persisted in an embedded [sled](https://docs.rs/sled) store.
//!
//! The binary wires [`Config`], [`TodoStore`] and [`Server`] together; everything else here is
//! exported so the pieces can be assembled and tested on their own.

mod config;
mod db;
mod host;
mod html;
mod result;
mod todo;

pub use config::*;
pub use db::*;
pub use host::*;
pub use html::*;
pub use result::*;
pub use todo::*;

pub use axum::{
    self,
    body::Body,
    extract::{Form, Path, Query, Request, State},
    http::{self, header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
pub use async_trait::async_trait;
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use std::sync::Arc;
pub use tower::{Layer, Service};
pub use tracing::{debug, error, info, trace, warn};
