use std::fmt;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

pub const SHORT_HANDLE_MS: u64 = 60 * 1000;
pub const MEDIUM_HANDLE_MS: u64 = 3 * 60 * 1000;
pub const LONG_HANDLE_MS: u64 = 5 * 60 * 1000;

const FIXED_HANDLE_MS: [u64; 3] = [SHORT_HANDLE_MS, MEDIUM_HANDLE_MS, LONG_HANDLE_MS];

/// How long a dispatcher stays busy with one call.
///
/// Serialized as the setting strings `"1"`, `"3"`, `"5"` and `"random"`.
/// Anything else deserializes to the medium value rather than failing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HandleTime {
    OneMinute,
    #[default]
    ThreeMinutes,
    FiveMinutes,
    Random,
}

impl HandleTime {
    pub const ALL: [HandleTime; 4] = [
        HandleTime::OneMinute,
        HandleTime::ThreeMinutes,
        HandleTime::FiveMinutes,
        HandleTime::Random,
    ];

    pub fn parse(setting: &str) -> Self {
        match setting.trim().to_lowercase().as_str() {
            "1" => HandleTime::OneMinute,
            "3" => HandleTime::ThreeMinutes,
            "5" => HandleTime::FiveMinutes,
            "random" => HandleTime::Random,
            _ => HandleTime::ThreeMinutes,
        }
    }

    pub fn as_setting(&self) -> &'static str {
        match self {
            HandleTime::OneMinute => "1",
            HandleTime::ThreeMinutes => "3",
            HandleTime::FiveMinutes => "5",
            HandleTime::Random => "random",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            HandleTime::OneMinute => "1 min",
            HandleTime::ThreeMinutes => "3 min",
            HandleTime::FiveMinutes => "5 min",
            HandleTime::Random => "random (1/3/5 min)",
        }
    }

    pub fn duration_ms(&self, rng: &mut dyn RngCore) -> u64 {
        match self {
            HandleTime::OneMinute => SHORT_HANDLE_MS,
            HandleTime::ThreeMinutes => MEDIUM_HANDLE_MS,
            HandleTime::FiveMinutes => LONG_HANDLE_MS,
            HandleTime::Random => FIXED_HANDLE_MS[rng.gen_range(0..FIXED_HANDLE_MS.len())],
        }
    }
}

impl From<String> for HandleTime {
    fn from(value: String) -> Self {
        HandleTime::parse(&value)
    }
}

impl From<HandleTime> for String {
    fn from(value: HandleTime) -> Self {
        value.as_setting().to_string()
    }
}

impl fmt::Display for HandleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_setting())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn fixed_settings_always_yield_their_value() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(HandleTime::OneMinute.duration_ms(&mut rng), SHORT_HANDLE_MS);
            assert_eq!(
                HandleTime::ThreeMinutes.duration_ms(&mut rng),
                MEDIUM_HANDLE_MS
            );
            assert_eq!(HandleTime::FiveMinutes.duration_ms(&mut rng), LONG_HANDLE_MS);
        }
    }

    #[test]
    fn random_reaches_every_fixed_value_and_nothing_else() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = HashSet::new();
        for _ in 0..300 {
            let value = HandleTime::Random.duration_ms(&mut rng);
            assert!(FIXED_HANDLE_MS.contains(&value), "unexpected {}", value);
            seen.insert(value);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn unrecognized_setting_falls_back_to_medium() {
        assert_eq!(HandleTime::parse("7"), HandleTime::ThreeMinutes);
        assert_eq!(HandleTime::parse(""), HandleTime::ThreeMinutes);
        assert_eq!(HandleTime::parse(" RANDOM "), HandleTime::Random);
    }

    #[test]
    fn deserializes_unknown_strings_without_error() {
        let parsed: HandleTime = serde_json::from_str("\"forever\"").unwrap();
        assert_eq!(parsed, HandleTime::ThreeMinutes);
        let parsed: HandleTime = serde_json::from_str("\"5\"").unwrap();
        assert_eq!(parsed, HandleTime::FiveMinutes);
        assert_eq!(
            serde_json::to_string(&HandleTime::Random).unwrap(),
            "\"random\""
        );
    }
}
