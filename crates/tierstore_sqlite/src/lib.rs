// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! SQLite relational store.
//!
//! [`SqliteStore`] persists records of one type as JSON rows and translates
//! [`FieldCondition`](tierstore_tier::FieldCondition)s into SQL:
//!
//! | Condition | SQL                                                   |
//! |-----------|-------------------------------------------------------|
//! | `Exact`   | `json_extract(body, '$.f') IS ?`                      |
//! | `Range`   | `json_extract(body, '$.f') BETWEEN ? AND ?` (numbers and times only) |
//! | `Like`    | `instr(json_extract(body, '$.f'), ?) > 0` (text only, case-sensitive) |
//!
//! A lookup that finds no row is `Ok(None)` or an empty vector. Every other
//! SQLite failure is reported as
//! [`Error::BackingStore`](tierstore_tier::Error::BackingStore) naming the
//! operation that failed.

mod predicate;
mod store;

#[doc(inline)]
pub use store::SqliteStore;
