//! URL handling module for channel-harvest
//!
//! Raw capture URLs arrive in many shapes: with or without a scheme, on the
//! mobile or `www.` host, percent-encoded, with tracking queries, or in the
//! legacy `/browse/...` redirect form. This module reduces each of them to a
//! single canonical identity string, or rejects it.

mod canonical;

pub use canonical::{canonicalize, Canonicalizer, Rejection};
