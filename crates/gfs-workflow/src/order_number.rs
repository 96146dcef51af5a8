//! Install order numbers.
//!
//! Format: `INS-<epoch millis>-<9 uppercase hex chars>`. The token is opaque;
//! nothing parses it back. Uniqueness is ultimately enforced by the store
//! (`uq_install_orders_order_number`), the random suffix just makes a clash
//! within the same millisecond practically impossible.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const ORDER_NUMBER_PREFIX: &str = "INS";

const SUFFIX_LEN: usize = 9;

pub fn next_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        ORDER_NUMBER_PREFIX,
        now.timestamp_millis(),
        suffix[..SUFFIX_LEN].to_ascii_uppercase()
    )
}
