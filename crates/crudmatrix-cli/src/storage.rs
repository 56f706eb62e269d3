//! Persistent report storage: `~/.crudmatrix/reports/` unless `--report-dir` is given
//!
//! Every `crudmatrix run` and `crudmatrix demo` saves its report regardless of
//! `--output` mode. Directory layout: `{target}_{timestamp}_{suite}/`

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crudmatrix_core::{ScenarioResult, SuiteConfig, SuiteReport, to_http_file};

/// Everything needed to persist a run.
pub struct ReportData<'a> {
    /// `None` for in-process suites
    pub config: Option<&'a SuiteConfig>,
    pub report: &'a SuiteReport,
    /// Base URL, or a label for in-process runs
    pub target: &'a str,
    pub duration_secs: f64,
}

/// Save a report under `base` (default `~/.crudmatrix/reports/`).
///
/// Returns the report directory path on success.
pub fn save_report(data: &ReportData, base: Option<&Path>) -> Result<PathBuf, std::io::Error> {
    let base = match base {
        Some(dir) => dir.to_path_buf(),
        None => report_base_dir()?,
    };
    let report_dir = base.join(build_dir_name(data.target, &data.report.suite));
    std::fs::create_dir_all(&report_dir)?;

    // config.toml: snapshot of the config used
    if let Some(config) = data.config {
        let config_toml =
            toml::to_string_pretty(config).map_err(|e| std::io::Error::other(e.to_string()))?;
        std::fs::write(report_dir.join("config.toml"), config_toml)?;
    }

    // summary.json: verdict + counts + metadata
    let verdict = data.report.verdict();
    let summary = serde_json::json!({
        "verdict": {
            "status": verdict.status.to_string(),
            "exit_code": verdict.exit_code,
            "reason": verdict.reason,
        },
        "stats": {
            "total": data.report.total(),
            "passed": data.report.passed(),
            "failed": data.report.failed(),
            "errors": data.report.errored(),
        },
        "meta": {
            "suite": data.report.suite,
            "timestamp": timestamp_iso(),
            "duration_secs": data.duration_secs,
            "target": data.target,
        },
    });
    std::fs::write(
        report_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary).unwrap_or_default(),
    )?;

    // report.json: every scenario result
    std::fs::write(
        report_dir.join("report.json"),
        serde_json::to_string_pretty(data.report).unwrap_or_default(),
    )?;

    // reproductions.http: failing and erroring scenarios, for replay in IDE/curl
    let problems: Vec<ScenarioResult> = data.report.problems().cloned().collect();
    if !problems.is_empty() {
        std::fs::write(
            report_dir.join("reproductions.http"),
            to_http_file(&problems, "base_url"),
        )?;
    }

    Ok(report_dir)
}

fn report_base_dir() -> Result<PathBuf, std::io::Error> {
    let home = std::env::var("HOME")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".crudmatrix").join("reports"))
}

/// `{target}_{timestamp}_{suite}` e.g. `localhost_8000_20261019T093000_departments`
fn build_dir_name(target: &str, suite: &str) -> String {
    format!("{}_{}_{}", sanitize(target), timestamp_compact(), sanitize(suite))
}

/// `"http://localhost:8000/api"` → `"localhost_8000"`; other labels keep safe characters only.
fn sanitize(target: &str) -> String {
    let host = target
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or(target);
    let cleaned: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// `"20261019T093000"`: filesystem-safe compact timestamp.
fn timestamp_compact() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}{mo:02}{d:02}T{h:02}{mi:02}{s:02}")
}

/// `"2026-10-19T09:30:00Z"`: ISO 8601 for JSON.
fn timestamp_iso() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

fn utc_now() -> (i32, u32, u32, u32, u32, u32) {
    let epoch_secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let days = (epoch_secs / 86400) as i64;
    let tod = epoch_secs % 86400;
    let (y, m, d) = civil_from_days(days);
    (
        y,
        m,
        d,
        (tod / 3600) as u32,
        ((tod % 3600) / 60) as u32,
        (tod % 60) as u32,
    )
}

/// Epoch days → (year, month, day), Howard Hinnant's `civil_from_days`.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
