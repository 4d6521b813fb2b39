// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::shared::error::{KruiseError, Result};
use std::time::Duration;

/// Parses durations in the `1h30m`, `60s`, `500ms` form kubectl accepts for
/// timeout flags. A bare `0` is the only unit-less value allowed.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(s).map_err(|e| {
        KruiseError::usage(format!("invalid duration \"{}\": {}", input, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration(" 2m ").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("60").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("1m x").is_err());
        assert!(parse_duration("x1m").is_err());
    }

    #[test]
    fn test_parse_duration_out_of_range() {
        let err = parse_duration("99999999999999999999999999999999999h").unwrap_err();
        assert!(matches!(err, KruiseError::Usage(_)));
        assert!(err.to_string().starts_with("invalid duration"));
    }
}
