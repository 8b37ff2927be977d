use crate::model::{Classification, ScanReport, Severity};
use anyhow::Result;
use std::fmt;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Compromised")]
    compromised: String,
    #[tabled(rename = "Found")]
    found: String,
    #[tabled(rename = "Lockfile")]
    lockfile: String,
}

#[derive(Tabled)]
struct BundleRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Marker")]
    marker: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    print!("{}", TableReport { report, color: true });
    Ok(())
}

/// The table report without color codes, for writing to a file.
pub(super) fn render_text(report: &ScanReport) -> String {
    TableReport {
        report,
        color: false,
    }
    .to_string()
}

struct TableReport<'a> {
    report: &'a ScanReport,
    color: bool,
}

impl fmt::Display for TableReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (report, color) = (self.report, self.color);

        writeln!(f)?;
        writeln!(
            f,
            "Scan completed at: {}",
            report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "[i] Checked {} lockfiles against {} watchlist entries",
            report.lockfiles_scanned, report.watchlist_size
        )?;

        if !report.findings.is_empty() {
            // exact matches first
            let rows: Vec<FindingRow> = report
                .exact_findings()
                .chain(report.mismatch_findings())
                .map(|finding| FindingRow {
                    severity: format_classification(&finding.classification, color),
                    package: finding.entry.name.clone(),
                    compromised: finding.entry.version.clone(),
                    found: truncate(&finding.classification.found_versions(), 40),
                    lockfile: finding.lockfile.display().to_string(),
                })
                .collect();

            writeln!(f)?;
            writeln!(f, "Found {} watchlisted packages:", rows.len())?;
            writeln!(f)?;
            writeln!(f, "{}", Table::new(rows).with(Style::rounded()))?;
        }

        if !report.errors.is_empty() {
            writeln!(f)?;
            for error in &report.errors {
                writeln!(
                    f,
                    "{} {}: {}",
                    paint("[x]", "31", color),
                    error.lockfile.display(),
                    error.message
                )?;
            }
        }

        if !report.bundle_hits.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "{} Payload markers found in {} built files:",
                paint("[!]", "33", color),
                report.bundle_hits.len()
            )?;
            writeln!(f)?;

            let rows: Vec<BundleRow> = report
                .bundle_hits
                .iter()
                .map(|h| BundleRow {
                    file: h.file.display().to_string(),
                    line: h.line,
                    marker: h.marker.clone(),
                })
                .collect();
            writeln!(f, "{}", Table::new(rows).with(Style::rounded()))?;
        }

        if !report.affected_dirs.is_empty() {
            writeln!(f)?;
            writeln!(f, "Affected projects:")?;
            for dir in &report.affected_dirs {
                writeln!(f, "  {}", dir.display())?;
            }
        }

        writeln!(f)?;
        self.write_summary(f)
    }
}

impl TableReport<'_> {
    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let exact = report.exact_findings().count();
        let mismatched = report.mismatch_findings().count();

        writeln!(f, "Summary:")?;
        writeln!(f, "  Lockfiles scanned: {}", report.lockfiles_scanned)?;
        if exact > 0 || mismatched > 0 {
            writeln!(
                f,
                "  Findings: {} exact, {} version mismatch",
                exact, mismatched
            )?;
        }
        if !report.errors.is_empty() {
            writeln!(f, "  Unreadable lockfiles: {}", report.errors.len())?;
        }

        let severity = report.severity();
        writeln!(f)?;
        writeln!(
            f,
            "Result: {} (exit {})",
            format_severity(severity, self.color),
            severity.exit_code()
        )
    }
}

fn format_classification(classification: &Classification, color: bool) -> String {
    match classification {
        Classification::ExactMatch(_) => paint("[!!] EXACT", "31", color),
        Classification::VersionMismatch(_) => paint("[!] MISMATCH", "33", color),
        Classification::Absent => "-".to_string(),
    }
}

fn format_severity(severity: Severity, color: bool) -> String {
    match severity {
        Severity::Exact => paint("COMPROMISED VERSION LOCKED", "31", color),
        Severity::Warning => paint("WARNING", "33", color),
        Severity::Clean => paint("CLEAN", "32", color),
    }
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if color {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
