//! Result line formatting

use chrono::{Local, NaiveDateTime};
use std::fmt;

/// Local-time format of the leading timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One analysis outcome, rendered as a single log line:
///
/// `2024-05-01 12:00:00 - used prompt: <prompt> and rules: <rules>`
///
/// followed by ` - analysis: <text>` when the analyzer returned something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRecord {
    pub timestamp: NaiveDateTime,
    pub prompt: String,
    pub rules: String,
    pub analysis: String,
}

impl AnalysisRecord {
    /// Record stamped with the current local time
    pub fn now(prompt: &str, rules: &str, analysis: &str) -> Self {
        Self::at(Local::now().naive_local(), prompt, rules, analysis)
    }

    pub fn at(timestamp: NaiveDateTime, prompt: &str, rules: &str, analysis: &str) -> Self {
        Self {
            timestamp,
            prompt: prompt.to_string(),
            rules: rules.to_string(),
            analysis: analysis.to_string(),
        }
    }

    /// Render as one line without the trailing newline
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AnalysisRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - used prompt: {} and rules: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            single_line(&self.prompt),
            single_line(&self.rules)
        )?;

        let analysis = single_line(&self.analysis);
        if !analysis.is_empty() {
            write!(f, " - analysis: {}", analysis)?;
        }
        Ok(())
    }
}

/// Join non-blank lines with spaces
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 7)
            .unwrap()
    }

    #[test]
    fn test_line_without_analysis() {
        let record = AnalysisRecord::at(noon(), "describe", "be concise", "");
        assert_eq!(
            record.to_line(),
            "2024-05-01 12:00:07 - used prompt: describe and rules: be concise"
        );
    }

    #[test]
    fn test_line_with_analysis() {
        let record = AnalysisRecord::at(noon(), "describe", "be concise", "A cat.");
        assert_eq!(
            record.to_line(),
            "2024-05-01 12:00:07 - used prompt: describe and rules: be concise - analysis: A cat."
        );
    }

    #[test]
    fn test_multiline_analysis_is_flattened() {
        let record = AnalysisRecord::at(noon(), "describe", "be concise", "A cat.\n\n  Sleeping.\r\n");
        let line = record.to_line();

        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
        assert!(line.ends_with("analysis: A cat. Sleeping."));
    }

    #[test]
    fn test_now_uses_expected_format() {
        let line = AnalysisRecord::now("p", "r", "").to_line();
        let (stamp, rest) = line.split_at(19);

        assert!(NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(rest, " - used prompt: p and rules: r");
    }
}
