//! `HH:MM` wall-clock times as they appear on tour schedules.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

pub fn parse_tour_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

pub mod hhmm {
    use super::*;

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_tour_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid tour time '{}', expected HH:MM", raw)))
    }
}
