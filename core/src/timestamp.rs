//! Timestamps as written by the acquisition software (`21-Mar-2011 14:45:54`).

use crate::prelude::{ProcessingError, ProcessingResult};
use chrono::NaiveDateTime;

pub const MATLAB_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

pub fn parse_matlab_date(text: &str) -> ProcessingResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), MATLAB_DATE_FORMAT)
        .map_err(|e| ProcessingError::InvalidTimestamp(format!("{:?}: {}", text, e)))
}

pub fn format_matlab_date(timestamp: &NaiveDateTime) -> String {
    timestamp.format(MATLAB_DATE_FORMAT).to_string()
}

/// `#[serde(with = "crate::timestamp::matlab_date")]` support.
pub mod matlab_date {
    use super::{format_matlab_date, parse_matlab_date};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_matlab_date(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_matlab_date(&text).map_err(serde::de::Error::custom)
    }
}
