//! Strict string-to-scalar converters.
//!
//! All of them require the whole token to match; trailing garbage makes the
//! conversion fail. Failure is an `Option`, not an error: whether a bad
//! token is fatal depends on where it appears, which is the caller's call.

use simvex_core::SimTime;

pub fn parse_int(s: &str) -> Option<i32> {
  s.parse().ok()
}

pub fn parse_int64(s: &str) -> Option<i64> {
  s.parse().ok()
}

pub fn parse_double(s: &str) -> Option<f64> {
  s.parse().ok()
}

pub fn parse_simtime(s: &str) -> Option<SimTime> {
  s.parse().ok()
}
