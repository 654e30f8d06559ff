//! Totals for a run: per assembly and across assemblies.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution totals for one assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Cleanup failures and error messages.
    pub errors: u32,
    #[serde(with = "seconds")]
    pub time: Duration,
}

impl ExecutionSummary {
    pub fn passed(&self) -> u32 {
        self.total
            .saturating_sub(self.failed.saturating_add(self.skipped))
    }

    /// `failed + skipped <= total`.
    pub fn is_consistent(&self) -> bool {
        u64::from(self.failed) + u64::from(self.skipped) <= u64::from(self.total)
    }

    /// Failed tests plus errors, the number reported as the exit code.
    pub fn problems(&self) -> u32 {
        self.failed.saturating_add(self.errors)
    }

    /// Generate colorized string to report this summary.
    pub fn report_str(&self, name: Option<&str>) -> String {
        use colored::*;

        let mut buf = String::new();
        if let Some(name) = name {
            buf.push_str(&name.bold().to_string());
            buf.push_str(": ");
        }
        buf.push_str(&format!("{} passing", self.passed()).green().to_string());
        buf.push_str(" / ");
        buf.push_str(&format!("{} failing", self.failed).red().to_string());
        buf.push_str(" / ");
        buf.push_str(&format!("{} skipped", self.skipped).yellow().to_string());
        if self.errors > 0 {
            buf.push_str(" / ");
            buf.push_str(&format!("{} errors", self.errors).red().bold().to_string());
        }
        buf.push_str(
            &format!(" ({:.3}s)", self.time.as_secs_f64())
                .dimmed()
                .to_string(),
        );
        buf
    }
}

/// Summaries of every assembly in a run plus the wall-clock time it took.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(with = "seconds")]
    pub elapsed: Duration,
    pub summaries: Vec<(String, ExecutionSummary)>,
}

impl RunSummary {
    pub fn push(&mut self, assembly: impl Into<String>, summary: ExecutionSummary) {
        self.summaries.push((assembly.into(), summary));
    }

    /// Sum of every assembly summary. `time` is the sum of execution
    /// times, not the wall-clock time.
    pub fn totals(&self) -> ExecutionSummary {
        self.summaries.iter().fold(
            ExecutionSummary::default(),
            |acc, (_, s)| ExecutionSummary {
                total: acc.total.saturating_add(s.total),
                failed: acc.failed.saturating_add(s.failed),
                skipped: acc.skipped.saturating_add(s.skipped),
                errors: acc.errors.saturating_add(s.errors),
                time: acc.time + s.time,
            },
        )
    }

    pub fn report_str(&self) -> String {
        use colored::*;

        let mut buf = String::new();
        for (name, summary) in &self.summaries {
            buf.push_str("  ");
            buf.push_str(&summary.report_str(Some(name)));
            buf.push('\n');
        }
        if self.summaries.len() > 1 {
            buf.push_str("  ");
            buf.push_str(&self.totals().report_str(Some("total")));
            buf.push('\n');
        }
        buf.push_str(
            &format!("  finished in {:.3}s", self.elapsed.as_secs_f64())
                .dimmed()
                .to_string(),
        );
        buf
    }
}

/// Durations on the wire are decimal seconds.
pub(crate) mod seconds {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
