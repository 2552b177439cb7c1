//! Episode range expressions such as `1-3,5,7-9`.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

const FULLWIDTH_COMMA: char = '\u{FF0C}';

/// Errors from [`parse_episode_ranges`]. No partial result is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// A number or range falls outside `1..=max`.
    #[error("episode {part} is out of range 1-{max}\n  Suggestion: Pick episodes between 1 and {max}")]
    OutOfBounds {
        /// The offending part, normalized (`start-end` or `n`).
        part: String,
        /// Largest valid episode number.
        max: usize,
    },

    /// A part is not a number or a `start-end` pair.
    #[error("invalid episode selection '{part}'\n  Suggestion: Use numbers, commas and hyphens, for example 1-3,5,7-9")]
    Invalid {
        /// The offending part as typed.
        part: String,
    },
}

/// Parses a 1-based inclusive selection into sorted, de-duplicated 0-based
/// indices.
///
/// Parts are separated by ASCII or full-width commas. Each part is a number
/// `n` or a range `a-b`; a reversed range is treated as `b-a`.
///
/// # Errors
///
/// Returns [`RangeError::Invalid`] for any part that is not a number or pair,
/// and [`RangeError::OutOfBounds`] for any bound below 1 or above `max`.
pub fn parse_episode_ranges(input: &str, max: usize) -> Result<Vec<usize>, RangeError> {
    let mut picked = BTreeSet::new();

    for raw in input.split([',', FULLWIDTH_COMMA]) {
        let part = raw.trim();
        if let Some((start, end)) = part.split_once('-') {
            let (mut start, mut end) = (parse_bound(start, part)?, parse_bound(end, part)?);
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            if start < 1 || end > max {
                return Err(RangeError::OutOfBounds {
                    part: format!("{start}-{end}"),
                    max,
                });
            }
            picked.extend(start - 1..end);
        } else {
            let number = parse_bound(part, part)?;
            if number < 1 || number > max {
                return Err(RangeError::OutOfBounds {
                    part: number.to_string(),
                    max,
                });
            }
            picked.insert(number - 1);
        }
    }

    debug!(input, selected = picked.len(), "parsed episode selection");
    Ok(picked.into_iter().collect())
}

fn parse_bound(text: &str, part: &str) -> Result<usize, RangeError> {
    text.trim().parse::<usize>().map_err(|_| RangeError::Invalid {
        part: part.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_ranges_and_numbers() {
        assert_eq!(
            parse_episode_ranges("1-3,5,7-9", 10).unwrap(),
            vec![0, 1, 2, 4, 6, 7, 8]
        );
    }

    #[test]
    fn test_reversed_range_is_swapped() {
        assert_eq!(
            parse_episode_ranges("5-2", 10).unwrap(),
            parse_episode_ranges("2-5", 10).unwrap()
        );
    }

    #[test]
    fn test_duplicates_collapse_and_order_is_irrelevant() {
        assert_eq!(parse_episode_ranges("3,1,2-3,1", 5).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_fullwidth_comma_and_whitespace() {
        assert_eq!(parse_episode_ranges(" 1 ，3 - 4 ", 5).unwrap(), vec![0, 2, 3]);
    }

    #[test]
    fn test_zero_is_out_of_bounds() {
        let err = parse_episode_ranges("0", 10).unwrap_err();
        assert_eq!(
            err,
            RangeError::OutOfBounds {
                part: "0".to_string(),
                max: 10
            }
        );
    }

    #[test]
    fn test_upper_bound_error_names_range_and_valid_bounds() {
        let err = parse_episode_ranges("1,8-12", 10).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("8-12"), "Expected offending range in: {msg}");
        assert!(msg.contains("1-10"), "Expected valid bounds in: {msg}");
    }

    #[test]
    fn test_invalid_parts_reject_whole_input() {
        for input in ["", "a", "1,,2", "1-", "-3", "1-2-3", "2,x"] {
            assert!(
                matches!(parse_episode_ranges(input, 10), Err(RangeError::Invalid { .. })),
                "expected Invalid for {input:?}"
            );
        }
    }

    #[test]
    fn test_exact_max_is_accepted() {
        assert_eq!(parse_episode_ranges("10", 10).unwrap(), vec![9]);
    }
}
