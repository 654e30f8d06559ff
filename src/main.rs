use runt_host::{
    cli::Opts,
    errors::HostError,
    host::Registry,
    runner::{Filters, Overrides, Runner},
    summary::{ExecutionSummary, RunSummary},
};

use futures::stream::{self, StreamExt};
use regex::Regex;
use std::{path::PathBuf, sync::Arc, time::Instant};
use structopt::StructOpt;
use tokio::{runtime, task};

fn regex(flag: &str, pattern: Option<&String>) -> Result<Option<Regex>, HostError> {
    pattern
        .map(|reg| {
            Regex::new(reg).map_err(|err| {
                HostError::Configuration(format!("Invalid --{} regex: {}", flag, err))
            })
        })
        .transpose()
}

/// Expand glob patterns. A pattern that matches nothing is kept as is so
/// the missing assembly is reported by name.
fn expand(patterns: &[String]) -> Result<Vec<PathBuf>, HostError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .map_err(|err| {
                HostError::Configuration(format!("Glob pattern error in {}: {}", pattern, err))
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                HostError::Configuration(format!("Failed to read globbed path: {}", err))
            })?;
        if matches.is_empty() {
            paths.push(PathBuf::from(pattern));
        } else {
            paths.extend(matches);
        }
    }
    Ok(paths)
}

fn list(runner: &Runner, assemblies: &[PathBuf]) -> Result<i32, HostError> {
    use colored::*;
    for assembly in assemblies {
        let name = runner.project(assembly).name();
        for test_case in runner.list(assembly)? {
            println!(
                "{}{}{}",
                name.blue(),
                ":".blue(),
                test_case.display_name().blue()
            );
        }
    }
    Ok(0)
}

/// Run every assembly, at most `jobs` at a time. Boundary calls block, so
/// each assembly runs on the blocking pool.
async fn run_all(runner: Arc<Runner>, assemblies: Vec<PathBuf>, jobs: usize) -> RunSummary {
    let start = Instant::now();
    let mut results: Vec<(String, ExecutionSummary)> =
        stream::iter(assemblies.into_iter().map(|assembly| {
            let runner = Arc::clone(&runner);
            async move {
                let name = runner.project(&assembly).name();
                let summary = task::spawn_blocking(move || runner.run(&assembly))
                    .await
                    .unwrap_or_else(|err| {
                        Err(HostError::Boundary(format!("assembly run aborted: {}", err)))
                    })
                    .unwrap_or_else(|err| {
                        println!("{}: error: {}", name, err);
                        ExecutionSummary {
                            errors: 1,
                            ..ExecutionSummary::default()
                        }
                    });
                (name, summary)
            }
        }))
        .buffer_unordered(jobs.max(1))
        .collect()
        .await;

    let mut run = RunSummary::default();
    results.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, summary) in results {
        run.push(name, summary);
    }
    run.elapsed = start.elapsed();
    run
}

fn run() -> Result<i32, HostError> {
    let opts = Opts::from_args();

    let filters = Filters {
        class: opts.class.clone(),
        include: regex("include", opts.include_filter.as_ref())?,
        exclude: regex("exclude", opts.exclude_filter.as_ref())?,
    };
    let overrides = Overrides {
        config: opts.config.clone(),
        isolation: opts.isolation,
        shadow_copy: opts.shadow_copy,
        shadow_copy_folder: opts.shadow_copy_folder.clone(),
    };
    let assemblies = expand(&opts.assemblies)?;

    // Frameworks loaded in-process must be linked into the binary that
    // hosts them; this one only reaches frameworks through a boundary.
    let runner = Runner::new(Arc::new(Registry::new()))
        .with_filters(filters)
        .with_overrides(overrides)
        .verbose(opts.verbose);

    if opts.list {
        return list(&runner, &assemblies);
    }

    let jobs = opts.jobs_limit.unwrap_or_else(num_cpus::get);
    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(jobs.max(1))
        .build()?;
    let summary = runtime.block_on(run_all(Arc::new(runner), assemblies, jobs));
    println!("{}", summary.report_str());
    Ok(summary.totals().problems() as i32)
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::new().filter_or("RUNT_HOST_LOG", "warn"),
    )
    .init();

    std::process::exit(match run() {
        Err(err) => {
            println!("error: {}", err);
            1
        }
        Ok(problems) => problems,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_assembly_is_reported_once_in_name_order() {
        let runner = Arc::new(Runner::new(Arc::new(Registry::new())));
        let dir = tempfile::tempdir().unwrap();
        let assemblies: Vec<PathBuf> = ["c.bin", "a.bin", "b.bin"]
            .iter()
            .map(|name| dir.path().join(name))
            .collect();

        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .build()
            .unwrap();
        let summary = runtime.block_on(run_all(runner, assemblies, 2));

        // Nothing can host these, so each one is a single error.
        let names: Vec<_> = summary.summaries.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(summary.totals().errors, 3);
        assert_eq!(summary.totals().total, 0);
    }
}
