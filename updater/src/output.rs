//! Human-facing output for the `modsync` CLI.
//!
//! Progress and results are written to stderr as plain lines; log records go
//! through `env_logger` separately.

use std::fmt::Display;
use std::io::Write;

use modsync_common::ProviderDescriptor;

use crate::auth::{AuthorizationPrompt, UserCode};
use crate::pipeline::PackageReport;
use crate::registry::ProviderRegistry;
use crate::resolver::Resolution;

/// Write one line, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; nothing sensible to do on failure.
    }
}

/// One status line for a package.
///
/// # Example
///
/// ```
/// use modsync_common::PackageIdentity;
/// use modsync_updater::pipeline::PackageReport;
/// use modsync_updater::output::report_line;
/// use modsync_updater::resolver::Resolution;
///
/// let report = PackageReport {
///     identity: PackageIdentity::new("Foo", "Bar"),
///     resolution: Resolution::NoUpdate,
///     outcome: None,
/// };
/// assert_eq!(report_line(&report), "Foo by Bar: up to date");
/// ```
#[must_use]
pub fn report_line(report: &PackageReport) -> String {
    let status = match (&report.resolution, report.outcome) {
        (Resolution::NoUpdate, _) => "up to date".to_owned(),
        (Resolution::Error(reason), _) => format!("error: {reason}"),
        (Resolution::UpdateFound(update), None) => format!(
            "update available: {} from {}",
            update.release.version(),
            update.provider
        ),
        (Resolution::UpdateFound(update), Some(outcome)) => format!(
            "updated to {} ({} installed, {} failed)",
            update.release.version(),
            outcome.succeeded,
            outcome.failed
        ),
    };
    format!("{}: {status}", report.identity)
}

/// Closing summary for a run.
#[must_use]
pub fn summary_line(reports: &[PackageReport]) -> String {
    let updates = reports
        .iter()
        .filter(|r| matches!(r.resolution, Resolution::UpdateFound(_)))
        .count();
    let errors = reports.iter().filter(|r| r.is_error()).count();
    let (installed, failed) = reports
        .iter()
        .filter_map(|r| r.outcome)
        .fold((0, 0), |(ok, bad), o| (ok + o.succeeded, bad + o.failed));
    let plural = if reports.len() == 1 { "package" } else { "packages" };
    format!(
        "{} {plural} checked: {updates} with updates, {errors} errors; {installed} files installed, {failed} failed",
        reports.len()
    )
}

/// Print a report line per package followed by the summary.
pub fn print_reports(stderr: &mut dyn Write, reports: &[PackageReport]) {
    for report in reports {
        write_stderr_line(stderr, report_line(report));
    }
    write_stderr_line(stderr, "");
    write_stderr_line(stderr, summary_line(reports));
}

fn descriptor_line(descriptor: &ProviderDescriptor) -> String {
    let brute = if descriptor.brute_check_capable {
        ", brute check"
    } else {
        ""
    };
    format!("  {descriptor} ({}{brute})", descriptor.source_link)
}

/// List loaded providers in resolution order, then handlers with the
/// extensions they own.
pub fn print_registry(stderr: &mut dyn Write, registry: &ProviderRegistry) {
    write_stderr_line(stderr, "Search providers:");
    for provider in registry.providers() {
        write_stderr_line(stderr, descriptor_line(provider.descriptor()));
    }
    write_stderr_line(stderr, "");
    write_stderr_line(stderr, "Install handlers:");
    let claimed = registry.claimed_extensions();
    for handler in registry.handlers() {
        let descriptor = handler.descriptor();
        let extensions = claimed
            .get(&descriptor.name)
            .map(|exts| exts.join(", "))
            .unwrap_or_default();
        write_stderr_line(stderr, format!("  {descriptor} [{extensions}]"));
    }
}

/// Lines asking the user to approve a device code.
#[must_use]
pub fn prompt_text(code: &UserCode) -> String {
    format!(
        "Open {} and enter the code {}\nThe code expires in {} minutes.",
        code.verification_uri,
        code.user_code,
        code.expires_in.as_secs() / 60
    )
}

/// Prompt that prints the device code to stderr and always proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

impl AuthorizationPrompt for ConsolePrompt {
    fn present(&self, code: &UserCode) -> bool {
        write_stderr_line(&mut std::io::stderr(), prompt_text(code));
        true
    }
}
