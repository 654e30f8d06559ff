//! Listing and running the tests of one assembly: the glue between the
//! command line, a [FrameworkProxy] and the sinks.
use crate::{
    boundary::{Boundary, IsolationPolicy},
    errors::HostError,
    host::Registry,
    message::Message,
    project::ProjectAssembly,
    proxy::FrameworkProxy,
    sink::{DiscoverySink, ExecutionSink, MessageSink},
    summary::ExecutionSummary,
    test_case::TestCase,
};
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Pre-filters selecting a subset of the discovered tests.
#[derive(Debug, Default)]
pub struct Filters {
    /// Only tests of this fully qualified type.
    pub class: Option<String>,
    /// Include display names that match.
    pub include: Option<Regex>,
    /// Remove display names that match.
    pub exclude: Option<Regex>,
}

impl Filters {
    /// True when nothing is filtered out and the whole assembly can be run
    /// in one go.
    pub fn is_empty(&self) -> bool {
        self.class.is_none() && self.include.is_none() && self.exclude.is_none()
    }

    pub fn accepts(&self, test_case: &TestCase) -> bool {
        let name = test_case.display_name();
        self.exclude.as_ref().map_or(true, |ex| !ex.is_match(name))
            && self.include.as_ref().map_or(true, |inc| inc.is_match(name))
    }
}

/// Command line settings that take precedence over configuration files.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub isolation: Option<IsolationPolicy>,
    pub shadow_copy: bool,
    pub shadow_copy_folder: Option<PathBuf>,
}

/// Prints a line per interesting test result, then forwards to the
/// execution sink.
struct Progress<'a> {
    assembly: &'a str,
    verbose: bool,
    inner: &'a ExecutionSink,
}

impl Progress<'_> {
    fn report_str(&self, message: &Message) -> Option<String> {
        use colored::*;

        let (mark, test, suffix) = match message {
            Message::TestPassed {
                test,
                execution_time,
                ..
            } if self.verbose => (
                "✓".green(),
                test.green(),
                format!(" ({:.3}s)", execution_time).dimmed(),
            ),
            Message::TestFailed { test, failure, .. } => (
                "✗".red(),
                test.red(),
                failure
                    .top_frame()
                    .map(|frame| format!(" ({})", frame))
                    .unwrap_or_default()
                    .dimmed(),
            ),
            Message::TestSkipped { test, reason } => (
                "-".yellow(),
                test.yellow(),
                format!(" ({})", reason).dimmed(),
            ),
            Message::CleanupFailure { scope, name, .. } => (
                "!".red().bold(),
                name.red(),
                format!(" ({:?} cleanup failed)", scope).dimmed(),
            ),
            _ => return None,
        };
        Some(format!(
            "{} {}{}{}{}",
            mark,
            self.assembly.bold(),
            ":".bold(),
            test,
            suffix
        ))
    }
}

impl MessageSink for Progress<'_> {
    fn on_message(&self, message: &Message) -> bool {
        if let Some(line) = self.report_str(message) {
            println!("{}", line);
        }
        self.inner.on_message(message)
    }
}

/// Lists and runs assemblies with a shared registry, filters and overrides.
pub struct Runner {
    registry: Arc<Registry>,
    filters: Filters,
    overrides: Overrides,
    verbose: bool,
}

impl Runner {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            filters: Filters::default(),
            overrides: Overrides::default(),
            verbose: false,
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn project(&self, assembly: &Path) -> ProjectAssembly {
        let project = ProjectAssembly::new(assembly);
        match &self.overrides.config {
            Some(config) => project.with_config(config),
            None => project,
        }
    }

    fn open(&self, project: &ProjectAssembly) -> Result<FrameworkProxy, HostError> {
        let mut options = project.boundary_options()?;
        if let Some(policy) = self.overrides.isolation {
            options = options.with_policy(policy);
        }
        if self.overrides.shadow_copy {
            options.shadow_copy = true;
        }
        if let Some(folder) = &self.overrides.shadow_copy_folder {
            options.shadow_copy_folder = Some(folder.clone());
        }
        let boundary = Boundary::create(&options, Arc::clone(&self.registry))?;
        FrameworkProxy::with_boundary(project, boundary)
    }

    fn discover(
        &self,
        project: &ProjectAssembly,
        proxy: &FrameworkProxy,
    ) -> Result<Vec<TestCase>, HostError> {
        let options = &project.configuration()?.discovery;
        let sink = DiscoverySink::new();
        match &self.filters.class {
            Some(class) => proxy.find_in_type(class, false, &sink, options)?,
            None => proxy.find(false, &sink, options)?,
        }
        // A type without tests yields no messages at all, not even a
        // completion, so read what arrived instead of waiting.
        Ok(sink
            .into_test_cases()
            .into_iter()
            .filter(|test_case| self.filters.accepts(test_case))
            .collect())
    }

    /// Test cases of `assembly` that pass the filters.
    pub fn list(&self, assembly: &Path) -> Result<Vec<TestCase>, HostError> {
        let project = self.project(assembly);
        let proxy = self.open(&project)?;
        self.discover(&project, &proxy)
    }

    /// Run the tests of `assembly` that pass the filters.
    pub fn run(&self, assembly: &Path) -> Result<ExecutionSummary, HostError> {
        let project = self.project(assembly);
        let proxy = self.open(&project)?;
        let config = project.configuration()?;
        let name = project.name();

        let sink = ExecutionSink::new();
        let progress = Progress {
            assembly: &name,
            verbose: self.verbose,
            inner: &sink,
        };

        if self.filters.is_empty() {
            proxy.run_all(&progress, &config.discovery, &config.execution)?;
        } else {
            let selected = self.discover(&project, &proxy)?;
            if selected.is_empty() {
                log::info!("{}: no tests match the filters", name);
                return Ok(ExecutionSummary::default());
            }
            proxy.run_tests(&selected, &progress, &config.execution)?;
        }

        sink.summary().copied().ok_or_else(|| {
            HostError::Protocol(format!(
                "{}: the framework returned without reporting totals",
                name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FailureInfo;

    #[test]
    fn filters_match_display_names() {
        let filters = Filters {
            include: Some(Regex::new("^Math").unwrap()),
            exclude: Some(Regex::new("slow").unwrap()),
            ..Filters::default()
        };
        assert!(!filters.is_empty());
        assert!(filters.accepts(&TestCase::new("1", "Math.add")));
        assert!(!filters.accepts(&TestCase::new("2", "Math.slow")));
        assert!(!filters.accepts(&TestCase::new("3", "Strings.concat")));
        assert!(Filters::default().accepts(&TestCase::new("3", "Strings.concat")));
    }

    #[test]
    fn progress_lines_name_the_assembly() {
        colored::control::set_override(false);
        let sink = ExecutionSink::new();
        let progress = Progress {
            assembly: "math",
            verbose: false,
            inner: &sink,
        };
        let passed = Message::TestPassed {
            test: "Math.add".to_string(),
            execution_time: 0.5,
            output: String::new(),
        };
        assert_eq!(progress.report_str(&passed), None);
        let skipped = Message::TestSkipped {
            test: "Math.slow".to_string(),
            reason: "too slow".to_string(),
        };
        assert_eq!(
            progress.report_str(&skipped).as_deref(),
            Some("- math:Math.slow (too slow)")
        );
        let failed = Message::TestFailed {
            test: "Math.div".to_string(),
            execution_time: 0.5,
            output: String::new(),
            failure: FailureInfo::new("DivideByZero", "boom")
                .with_stack_trace("at Math.div (tests/demo.rs:20)"),
        };
        assert_eq!(
            progress.report_str(&failed).as_deref(),
            Some("✗ math:Math.div (tests/demo.rs:20)")
        );
    }
}
