//! # Domain Models
//!
//! Value types that flow through the aggregation pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RawQuery`] | Untrusted search input (keyword plus optional filters) |
//! | [`Query`] | Normalized query; keyword terms are never empty |
//! | [`Filter`] | Closed filter set: date, category, source |
//! | [`ProviderResult`] | Decoded payload of one provider |
//! | [`ProviderOutcome`] | One aggregate slot: value with cache status, or error |
//! | [`AggregateResult`] | Provider → outcome mapping for one request |
//! | [`UtcDateTime`] | RFC3339 UTC timestamp |

mod query;
mod result;
mod timestamp;

pub use query::{Filter, Query, RawQuery};
pub use result::{AggregateResult, CacheStatus, ProviderOutcome, ProviderResult};
pub use timestamp::UtcDateTime;
