//! Execution report TSV.
//!
//! One row per skill execution, appended to a tab-separated file.
//!
//! Columns: `timestamp_ms`, skill, `num_ac_calls`, `skill_success`, reward,
//!          `aff_reward`, `aff_success`, done, message

use crate::controller::ExecutionResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A single row in the execution report.
#[derive(Debug, Clone)]
pub struct ReportRow {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Skill name (e.g., `reach`, `close`).
    pub skill: String,
    pub num_ac_calls: Option<u32>,
    pub skill_success: Option<bool>,
    /// Accumulated environment reward.
    pub reward: Option<f64>,
    pub aff_reward: Option<f64>,
    pub aff_success: Option<bool>,
    pub done: Option<bool>,
    /// Free-form note, such as an error message.
    pub message: String,
}

impl ReportRow {
    pub fn new(timestamp_ms: i64, skill: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            skill: skill.into(),
            num_ac_calls: None,
            skill_success: None,
            reward: None,
            aff_reward: None,
            aff_success: None,
            done: None,
            message: String::new(),
        }
    }

    /// Fill the outcome columns from an execution result.
    pub fn with_result(mut self, result: &ExecutionResult) -> Self {
        self.num_ac_calls = Some(result.num_ac_calls);
        self.skill_success = Some(result.skill_success);
        self.reward = Some(result.reward);
        self.aff_reward = Some(result.aff_reward);
        self.aff_success = Some(result.aff_success);
        self.done = Some(result.done);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    fn to_tsv_line(&self) -> String {
        let num_ac_calls = self.num_ac_calls.map(|n| n.to_string()).unwrap_or_default();
        let skill_success = self.skill_success.map(|s| s.to_string()).unwrap_or_default();
        let reward = self.reward.map(|r| format!("{r:.6}")).unwrap_or_default();
        let aff_reward = self.aff_reward.map(|r| format!("{r:.6}")).unwrap_or_default();
        let aff_success = self.aff_success.map(|s| s.to_string()).unwrap_or_default();
        let done = self.done.map(|d| d.to_string()).unwrap_or_default();

        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.timestamp_ms,
            sanitize_field(&self.skill),
            num_ac_calls,
            skill_success,
            reward,
            aff_reward,
            aff_success,
            done,
            sanitize_field(&self.message),
        )
    }
}

/// Replace characters that would break the TSV layout.
fn sanitize_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

const HEADER: &str =
    "timestamp_ms\tskill\tnum_ac_calls\tskill_success\treward\taff_reward\taff_success\tdone\tmessage";

/// Appending writer for execution reports.
pub struct ReportWriter {
    writer: BufWriter<File>,
}

impl std::fmt::Debug for ReportWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportWriter")
            .field("writer", &"BufWriter<File>")
            .finish()
    }
}

impl ReportWriter {
    /// Open `path` for appending, writing the header if the file is new.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        let exists = path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        if !exists {
            writeln!(writer, "{HEADER}")?;
        }

        Ok(Self { writer })
    }

    pub fn write_row(&mut self, row: &ReportRow) -> std::io::Result<()> {
        writeln!(self.writer, "{}", row.to_tsv_line())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
