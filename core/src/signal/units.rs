use crate::prelude::{ProcessingError, ProcessingResult};
use std::f64::consts::PI;

const CONVERSIONS: &[(&str, &str, f64)] = &[
    ("degree", "radian", PI / 180.0),
    ("degree/second", "radian/second", PI / 180.0),
    ("degree/second/second", "radian/second/second", PI / 180.0),
    ("inch*pound", "newton*meter", 25.4 / 1000.0 * 4.448_221_62),
    ("pound", "newton", 4.448_221_62),
    ("feet/second", "meter/second", 12.0 * 2.54 / 100.0),
    ("mile/hour", "meter/second", 1609.344 / 3600.0),
];

/// Multiplier taking a value in `from` units to `to` units. Each table entry
/// is usable in both directions.
pub fn conversion_factor(from: &str, to: &str) -> ProcessingResult<f64> {
    if from == to {
        return Ok(1.0);
    }
    CONVERSIONS
        .iter()
        .find_map(|&(src, dst, factor)| {
            if src == from && dst == to {
                Some(factor)
            } else if src == to && dst == from {
                Some(1.0 / factor)
            } else {
                None
            }
        })
        .ok_or_else(|| ProcessingError::UnknownConversion {
            from: from.to_string(),
            to: to.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_and_inverse_lookups() {
        assert!((conversion_factor("degree", "radian").unwrap() - PI / 180.0).abs() < 1e-12);
        assert!((conversion_factor("newton", "pound").unwrap() - 1.0 / 4.448_221_62).abs() < 1e-12);
        assert_eq!(conversion_factor("volts", "volts").unwrap(), 1.0);
    }

    #[test]
    fn unknown_pairs_fail() {
        assert!(matches!(
            conversion_factor("volts", "radian"),
            Err(ProcessingError::UnknownConversion { .. })
        ));
    }
}
