use std::collections::HashMap;
use std::io::BufRead;

use super::CounterFilter;
use super::error::StatParseError;

/// Parses a `name value` counter stream such as `/proc/vmstat`.
///
/// Only the first two whitespace separated tokens of a line are considered; lines with fewer are
/// skipped. Names rejected by `filter` are skipped before their value is looked at. A repeated
/// name keeps its last value.
///
/// # Errors
///
/// Returns [`StatParseError::InvalidKeyValue`] if an accepted value is not a decimal `u64`, and
/// [`StatParseError::Io`] if reading fails.
pub fn parse_counters_from_reader<R: BufRead>(
    buf: &mut R,
    filter: &CounterFilter,
) -> Result<HashMap<String, u64>, StatParseError> {
    let mut counters = HashMap::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(val)) = (parts.next(), parts.next()) {
            if filter.is_match(key) {
                let parsed = val
                    .parse::<u64>()
                    .map_err(|source| StatParseError::InvalidKeyValue {
                        key: key.to_owned(),
                        value: val.to_owned(),
                        line: lineno,
                        source,
                    })?;
                counters.insert(key.to_owned(), parsed);
            }
        }
        line.clear();
    }

    Ok(counters)
}
