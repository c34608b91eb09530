use crate::navigation::checksum::ChecksumCodec;
use crate::prelude::{ProcessingError, ProcessingResult};
use nom::{
    character::complete::{char, hex_digit1, multispace0},
    combinator::{all_consuming, rest},
    sequence::{preceded, terminated},
    IResult,
};

/// Header token of a register-read response.
pub const REGISTER_READ_HEADER: &str = "VNRRG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    RegisterRead,
    AsyncOutput,
}

/// One decoded line of navigation telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub kind: FrameKind,
    pub header: String,
    /// Tokens after the header, checksum excluded.
    pub values: Vec<String>,
    pub checksum_valid: bool,
    pub computed_checksum: String,
    pub provided_checksum: Option<String>,
}

impl RawFrame {
    /// Numeric payload, or the reason this frame must be treated as corrupted.
    pub fn numeric_values(&self, expected: usize) -> ProcessingResult<Vec<f64>> {
        if !self.checksum_valid {
            return Err(ProcessingError::ChecksumMismatch {
                computed: self.computed_checksum.clone(),
                provided: self.provided_checksum.clone().unwrap_or_default(),
            });
        }
        if self.values.len() != expected {
            return Err(ProcessingError::FrameShapeMismatch {
                expected,
                found: self.values.len(),
            });
        }
        let parsed: Vec<f64> = self
            .values
            .iter()
            .filter_map(|token| token.trim().parse::<f64>().ok())
            .collect();
        if parsed.len() != expected {
            return Err(ProcessingError::FrameShapeMismatch {
                expected,
                found: parsed.len(),
            });
        }
        Ok(parsed)
    }

    /// Register payload: the tokens after the register id.
    pub fn register_payload(&self) -> &[String] {
        self.values.get(1..).unwrap_or(&[])
    }
}

fn body(line: &str) -> IResult<&str, &str> {
    preceded(char('$'), rest)(line)
}

fn checksum_trailer(trailer: &str) -> IResult<&str, &str> {
    all_consuming(terminated(hex_digit1, multispace0))(trailer)
}

/// Splits `$content*HH\r\n` into content and checksum; `None` when the line
/// does not have that shape.
fn split_frame(line: &str) -> Option<(&str, &str)> {
    let (_, framed) = body(line).ok()?;
    let (content, trailer) = framed.rsplit_once('*')?;
    let (_, checksum) = checksum_trailer(trailer).ok()?;
    Some((content, checksum))
}

pub struct FrameParser;

impl FrameParser {
    /// Never fails: malformed lines come back with `checksum_valid == false`.
    pub fn parse(line: &str) -> RawFrame {
        let (content, provided, shaped) = match split_frame(line) {
            Some((content, checksum)) => (content, Some(checksum.to_string()), true),
            None => {
                let trimmed = line.trim();
                (trimmed.strip_prefix('$').unwrap_or(trimmed), None, false)
            }
        };

        let computed_checksum = ChecksumCodec::compute(content);
        let checksum_valid = shaped
            && provided
                .as_deref()
                .map(|checksum| ChecksumCodec::verify(content, checksum))
                .unwrap_or(false);

        let mut tokens = content.split(',').map(str::to_string);
        let header = tokens.next().unwrap_or_default();
        let kind = if header == REGISTER_READ_HEADER {
            FrameKind::RegisterRead
        } else {
            FrameKind::AsyncOutput
        };

        RawFrame {
            kind,
            header,
            values: tokens.collect(),
            checksum_valid,
            computed_checksum,
            provided_checksum: provided,
        }
    }

    /// Renders a complete frame around `content`.
    pub fn encode(content: &str) -> String {
        format!("${}*{}\r\n", content, ChecksumCodec::compute(content))
    }
}

/// Drops everything from the first non-printable character on.
pub fn sanitize_line(raw: &str) -> &str {
    match raw.find(|c: char| !(' '..='~').contains(&c)) {
        Some(index) => &raw[..index],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_async_output() {
        let line = FrameParser::encode("VNYMR,+010.071,-002.285,+001.754");
        let frame = FrameParser::parse(&line);
        assert_eq!(frame.kind, FrameKind::AsyncOutput);
        assert_eq!(frame.header, "VNYMR");
        assert_eq!(frame.values, vec!["+010.071", "-002.285", "+001.754"]);
        assert!(frame.checksum_valid);
        assert_eq!(frame.numeric_values(3).unwrap(), vec![10.071, -2.285, 1.754]);
    }

    #[test]
    fn detects_register_reads() {
        let frame = FrameParser::parse(&FrameParser::encode("VNRRG,07,50"));
        assert_eq!(frame.kind, FrameKind::RegisterRead);
        assert_eq!(frame.register_payload(), ["50".to_string()]);
    }

    #[test]
    fn lowercase_checksum_is_accepted() {
        let content = "VNRRG,06,14";
        let line = format!(
            "${}*{}\r\n",
            content,
            ChecksumCodec::compute(content).to_ascii_lowercase()
        );
        assert!(FrameParser::parse(&line).checksum_valid);
    }

    #[test]
    fn wrong_checksum_is_reported_not_raised() {
        let content = "VNYMR,1.0,2.0";
        let bad = if ChecksumCodec::compute(content) == "00" { "01" } else { "00" };
        let frame = FrameParser::parse(&format!("${}*{}\r\n", content, bad));
        assert!(!frame.checksum_valid);
        assert!(matches!(
            frame.numeric_values(2),
            Err(ProcessingError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn malformed_lines_fail_softly() {
        for line in ["", "VNYMR,1,2*00", "$VNYMR,1,2", "$VNYMR,1,2*ZZ", "garbage"] {
            let frame = FrameParser::parse(line);
            assert!(!frame.checksum_valid, "{:?} should not validate", line);
        }
    }

    #[test]
    fn last_asterisk_delimits_checksum() {
        let content = "VNYMR,1*2,3";
        let line = FrameParser::encode(content);
        let frame = FrameParser::parse(&line);
        assert!(frame.checksum_valid);
        assert_eq!(frame.values, vec!["1*2", "3"]);
    }

    #[test]
    fn shape_mismatch_on_valid_checksum() {
        let frame = FrameParser::parse(&FrameParser::encode("VNYMR,1.0,2.0"));
        assert!(matches!(
            frame.numeric_values(3),
            Err(ProcessingError::FrameShapeMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn sanitize_cuts_at_control_characters() {
        assert_eq!(sanitize_line("$VNYMR,1*00\r\n\u{0}junk"), "$VNYMR,1*00");
        assert_eq!(sanitize_line("AccelerationX"), "AccelerationX");
    }
}
