//! Book-keeping for a small gold shop: clients, orders, gold stock movements
//! and daily metal rates in one SQLite file, plus the invoice and report
//! documents derived from them.
//!
//! Nothing derived is ever stored. Stock, totals and summaries are recomputed
//! from the raw rows by [`ledger`], then laid out by [`invoice`] and [`report`]
//! into a [`document::Document`] that [`pdf`] renders.

use time::{Date, OffsetDateTime, UtcOffset};

pub mod db;
pub mod document;
pub mod error;
pub mod format;
pub mod invoice;
pub mod ledger;
pub mod models;
pub mod pdf;
pub mod report;
pub mod sample;

pub use db::Store;
pub use error::{LedgerError, Result};

/// The shop's calendar date: today in the machine's local time zone, used for
/// orders placed, rates set and report headers. Falls back to UTC when the
/// local offset cannot be determined.
pub fn today_local() -> Date {
    let offset = match UtcOffset::current_local_offset() {
        Ok(offset) => Some(offset),
        Err(e) => {
            tracing::debug!(error = %e, "local UTC offset unavailable; dating entries in UTC");
            None
        }
    };
    date_at_offset(OffsetDateTime::now_utc(), offset)
}

fn date_at_offset(now: OffsetDateTime, offset: Option<UtcOffset>) -> Date {
    now.to_offset(offset.unwrap_or(UtcOffset::UTC)).date()
}
