//! Keyset pagination tokens for subtree value scans.
//!
//! A token is the `(group_id, date)` position of the last row returned,
//! joined with `|`. Group paths never end in a date-shaped suffix, and the
//! date never contains `|`, so splitting from the right is unambiguous.

use chrono::NaiveDate;

use strata_core::errors::StorageError;

pub fn encode_token(group_id: &str, date: NaiveDate) -> String {
    format!("{group_id}|{}", date.format("%Y-%m-%d"))
}

pub fn decode_token(token: &str) -> Result<(String, NaiveDate), StorageError> {
    let invalid = || StorageError::InvalidPageToken {
        token: token.to_string(),
    };
    let (group_id, date) = token.rsplit_once('|').ok_or_else(invalid)?;
    if group_id.is_empty() {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
    Ok((group_id.to_string(), date))
}
