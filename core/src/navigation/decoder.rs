use crate::navigation::frame::{sanitize_line, FrameParser};
use crate::prelude::{ProcessingError, SENTINEL};
use log::debug;
use ndarray::Array2;
use serde::Serialize;

/// Channel-by-sample matrix (rows are channels, columns are samples).
pub type ChannelMatrix = Array2<f64>;

/// Counters describing how a stream was recovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub lines: usize,
    pub checksum_failures: usize,
    pub shape_mismatches: usize,
    pub sentinel_columns: usize,
    pub truncated_columns: usize,
}

impl DecodeReport {
    pub fn corrupted_frames(&self) -> usize {
        self.checksum_failures + self.shape_mismatches
    }
}

/// Turns asynchronous navigation output lines into a gap-filled matrix.
///
/// A corrupted line becomes an all-NaN column. A corrupted line that is not
/// the first one becomes two such columns: the unit has been observed to
/// merge two damaged transmissions into one line, and the extra column keeps
/// sample indices in step with the acquisition channel. The result is then
/// cut back to one column per input line. This compensation is an empirical
/// heuristic tuned on recorded traces.
#[derive(Debug, Clone, Copy)]
pub struct AsyncStreamDecoder {
    expected_columns: usize,
}

impl AsyncStreamDecoder {
    pub fn new(expected_columns: usize) -> Self {
        Self { expected_columns }
    }

    pub fn expected_columns(&self) -> usize {
        self.expected_columns
    }

    pub fn decode<S: AsRef<str>>(&self, lines: &[S]) -> ChannelMatrix {
        self.decode_with_report(lines).0
    }

    pub fn decode_with_report<S: AsRef<str>>(&self, lines: &[S]) -> (ChannelMatrix, DecodeReport) {
        let sentinel = vec![SENTINEL; self.expected_columns];
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(lines.len() + 1);
        let mut report = DecodeReport {
            lines: lines.len(),
            ..Default::default()
        };

        for (index, line) in lines.iter().enumerate() {
            let frame = FrameParser::parse(sanitize_line(line.as_ref()));
            match frame.numeric_values(self.expected_columns) {
                Ok(values) => columns.push(values),
                Err(err) => {
                    match err {
                        ProcessingError::ChecksumMismatch { .. } => report.checksum_failures += 1,
                        _ => report.shape_mismatches += 1,
                    }
                    debug!("navigation line {} replaced with sentinels: {}", index, err);
                    columns.push(sentinel.clone());
                    report.sentinel_columns += 1;
                    if index > 0 {
                        columns.push(sentinel.clone());
                        report.sentinel_columns += 1;
                    }
                }
            }
        }

        report.truncated_columns = columns.len().saturating_sub(lines.len());
        columns.truncate(lines.len());
        while columns.len() < lines.len() {
            columns.push(sentinel.clone());
        }

        let matrix = Array2::from_shape_fn((self.expected_columns, columns.len()), |(row, col)| {
            columns[col][row]
        });
        (matrix, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(values: &[f64]) -> String {
        let body: Vec<String> = values.iter().map(|v| format!("{:+.3}", v)).collect();
        FrameParser::encode(&format!("VNQMR,{}", body.join(",")))
    }

    fn corrupt(values: &[f64]) -> String {
        let good = line(values);
        // flip the payload without touching the checksum
        good.replacen('+', "-", 1)
    }

    #[test]
    fn clean_stream_decodes_every_line() {
        let lines = vec![
            line(&[1.0, 2.0, 3.0, 4.0]),
            line(&[5.0, 6.0, 7.0, 8.0]),
            line(&[9.0, 10.0, 11.0, 12.0]),
        ];
        let (matrix, report) = AsyncStreamDecoder::new(4).decode_with_report(&lines);
        assert_eq!(matrix.dim(), (4, 3));
        assert_eq!(matrix[[0, 0]], 1.0);
        assert_eq!(matrix[[3, 2]], 12.0);
        assert_eq!(matrix.column(1).to_vec(), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(report.corrupted_frames(), 0);
        assert_eq!(report.truncated_columns, 0);
    }

    #[test]
    fn leading_corruption_emits_single_sentinel() {
        let lines = vec![
            corrupt(&[1.0, 2.0]),
            line(&[3.0, 4.0]),
            line(&[5.0, 6.0]),
        ];
        let (matrix, report) = AsyncStreamDecoder::new(2).decode_with_report(&lines);
        assert_eq!(matrix.dim(), (2, 3));
        assert!(matrix.column(0).iter().all(|v| v.is_nan()));
        assert_eq!(matrix.column(1).to_vec(), vec![3.0, 4.0]);
        assert_eq!(matrix.column(2).to_vec(), vec![5.0, 6.0]);
        assert_eq!(report.sentinel_columns, 1);
        assert_eq!(report.truncated_columns, 0);
    }

    #[test]
    fn later_corruption_emits_two_sentinels_then_truncates() {
        let lines = vec![
            line(&[1.0, 2.0, 3.0, 4.0]),
            corrupt(&[5.0, 6.0, 7.0, 8.0]),
            line(&[9.0, 10.0, 11.0, 12.0]),
        ];
        let (matrix, report) = AsyncStreamDecoder::new(4).decode_with_report(&lines);
        assert_eq!(matrix.dim(), (4, 3));
        assert_eq!(matrix.column(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(matrix.column(1).iter().all(|v| v.is_nan()));
        // the compensating sentinel shifts the third line out of the window
        assert!(matrix.column(2).iter().all(|v| v.is_nan()));
        assert_eq!(report.checksum_failures, 1);
        assert_eq!(report.sentinel_columns, 2);
        assert_eq!(report.truncated_columns, 1);
    }

    #[test]
    fn wrong_width_frames_become_sentinels() {
        let lines = vec![line(&[1.0, 2.0]), line(&[3.0, 4.0, 5.0])];
        let (matrix, report) = AsyncStreamDecoder::new(2).decode_with_report(&lines);
        assert_eq!(matrix.dim(), (2, 2));
        assert!(matrix.column(1).iter().all(|v| v.is_nan()));
        assert_eq!(report.shape_mismatches, 1);
    }

    #[test]
    fn non_numeric_payload_is_corruption() {
        let lines = vec![FrameParser::encode("VNQMR,1.0,abc")];
        let matrix = AsyncStreamDecoder::new(2).decode(&lines);
        assert!(matrix.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn empty_stream_yields_empty_matrix() {
        let lines: Vec<String> = Vec::new();
        assert_eq!(AsyncStreamDecoder::new(3).decode(&lines).dim(), (3, 0));
    }

    #[test]
    fn trailing_control_garbage_is_ignored() {
        let lines = vec![format!("{}\u{0}\u{1b}[2J", line(&[1.0, 2.0]).trim_end())];
        let (matrix, report) = AsyncStreamDecoder::new(2).decode_with_report(&lines);
        assert_eq!(matrix.column(0).to_vec(), vec![1.0, 2.0]);
        assert_eq!(report.corrupted_frames(), 0);
    }
}
