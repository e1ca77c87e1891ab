//! Argument grouping: common, left-only and right-only vectors.

use serde::Serialize;

use crate::config::ConfigError;

/// Split `items` at the first occurrence of `delimiter`.
///
/// Returns the elements before and after the delimiter, which itself is dropped.
/// If the delimiter is absent, everything lands in the first half.
pub fn split_once<T: PartialEq + Clone>(items: &[T], delimiter: &T) -> (Vec<T>, Vec<T>) {
    match items.iter().position(|item| item == delimiter) {
        Some(i) => (items[..i].to_vec(), items[i + 1..].to_vec()),
        None => (items.to_vec(), Vec::new()),
    }
}

/// Arguments grouped by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgGroups {
    pub common: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl ArgGroups {
    /// Group `args` as `COMMON [d LEFT [d RIGHT]]`.
    ///
    /// Fails if `args` is empty or either effective vector would be empty.
    pub fn parse(args: &[String], delimiter: &str) -> Result<Self, ConfigError> {
        if args.is_empty() {
            return Err(ConfigError::NoArgs);
        }
        let delimiter = delimiter.to_string();
        let (common, rest) = split_once(args, &delimiter);
        let (left, right) = split_once(&rest, &delimiter);
        let groups = Self {
            common,
            left,
            right,
        };
        if groups.left_args().is_empty() {
            return Err(ConfigError::NoLeftArgs);
        }
        if groups.right_args().is_empty() {
            return Err(ConfigError::NoRightArgs);
        }
        Ok(groups)
    }

    /// Effective left argv: common + left.
    pub fn left_args(&self) -> Vec<String> {
        [self.common.as_slice(), self.left.as_slice()].concat()
    }

    /// Effective right argv: common + right.
    pub fn right_args(&self) -> Vec<String> {
        [self.common.as_slice(), self.right.as_slice()].concat()
    }
}
