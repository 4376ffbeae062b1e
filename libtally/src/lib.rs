//! Tally - a text based double-entry accounting engine
//! ---
//!
//! Tally reads a journal of dated directives (account openings,
//! transactions, prices, balance assertions, closings, accruals) and answers
//! questions about the state of the books: balance sheets as of a date or
//! over a partitioned range, optionally valued in a single reporting
//! commodity.
//!
//! Processing is a pipeline of day-keyed stages: the journal groups
//! directives into day records, the [booking engine][booking::Booker]
//! maintains the cumulative balance under open/close and assertion checks,
//! the [price stage][prices::PriceUpdater] accumulates the exchange graph
//! and stamps each day with a normalized price table, the
//! [valuator][valuation::Valuator] values postings and rebalances held
//! positions against `Equity:Valuation`, and the
//! [partitioner][period::Partitioner] collapses the stream to reporting
//! endpoints before aggregation.

extern crate pest;
#[macro_use]
extern crate pest_derive;

/// Position keys and the balance maps kept per day.
pub mod amounts;

/// The booking engine: cumulative balances under open/close, transaction
/// and assertion checks.
pub mod booking;

pub mod error;

/// Day records and the journal builder.
pub mod journal;

/// Directive types and accrual expansion.
pub mod model;

/// Our main parser entrypoints.
pub mod parser;

/// Reporting intervals, date series and the period partitioner.
pub mod period;

/// The stage runtime: ordered day propagation, cancellation, first-error.
pub mod pipeline;

/// The price graph and per-day normalization.
pub mod prices;

/// Interned accounts and commodities, e.g. `Assets:Bank:Checking`.
pub mod registry;

/// Aggregation into reports, account mapping, the register.
pub mod report;

/// The table model consumed by the text and CSV renderers.
pub mod table;

/// Valuation of postings and valuation-adjustment bookings.
pub mod valuation;

pub use error::{JournalError, Result};
pub use journal::{Day, Journal};
pub use parser::parse;
