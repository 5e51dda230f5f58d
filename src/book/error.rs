//! Order book error types

use crate::model::Side;
use rust_decimal::Decimal;
use std::fmt;

/// Errors that can occur while querying or updating a replayed book.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum BookError {
    /// The side cannot absorb the requested volume
    NotEnoughLiquidity {
        /// Side of the attempted traversal
        side: Side,
        /// Volume requested
        requested: Decimal,
        /// Volume actually available on that side
        available: Decimal,
    },

    /// A snapshot or diff arrived with a non-increasing update id
    StaleUpdate {
        /// The last update id applied to the book
        last_applied: u64,
        /// The update id that was rejected
        received: u64,
    },
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::NotEnoughLiquidity {
                side,
                requested,
                available,
            } => {
                write!(
                    f,
                    "not enough liquidity for {side} traversal: requested {requested}, available {available}"
                )
            }
            BookError::StaleUpdate {
                last_applied,
                received,
            } => {
                write!(
                    f,
                    "stale book update: received id {received}, last applied {last_applied}"
                )
            }
        }
    }
}

impl std::error::Error for BookError {}
