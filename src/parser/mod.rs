//! Parsing of user selections.
//!
//! # Example
//!
//! ```
//! use vodgrab_core::parser::parse_episode_ranges;
//!
//! let picked = parse_episode_ranges("1-3,5,7-9", 10).unwrap();
//! assert_eq!(picked, vec![0, 1, 2, 4, 6, 7, 8]);
//! ```

mod range;

pub use range::{RangeError, parse_episode_ranges};
