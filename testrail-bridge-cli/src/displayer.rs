// Copyright (c) The testrail-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The default console presentation of a test session.

use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use swrite::{SWrite, swrite};
use testrail_bridge::{
    events::{CollectedItem, Outcome, Phase, PhaseReport, SessionEvent},
    markers::CaseReferenceExtractor,
};

/// Writes a line for each session event, ahead of reporting.
#[derive(Debug)]
pub(crate) struct SessionDisplayer {
    extractor: CaseReferenceExtractor,
    all_phases: bool,
    styles: Styles,
    stats: DisplayStats,
}

impl SessionDisplayer {
    /// Creates a displayer.
    ///
    /// Passing setup and teardown phases are only shown if `all_phases` is
    /// set.
    pub(crate) fn new(extractor: CaseReferenceExtractor, all_phases: bool) -> Self {
        Self {
            extractor,
            all_phases,
            styles: Styles::default(),
            stats: DisplayStats::default(),
        }
    }

    pub(crate) fn colorize(&mut self) {
        self.styles.colorize();
    }

    pub(crate) fn write_event(
        &mut self,
        event: &SessionEvent,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match event {
            SessionEvent::CollectionFinished { items } => self.write_collected(items, writer),
            SessionEvent::PhaseReport(report) => self.write_report(report, writer),
            SessionEvent::SessionFinished { exit_status } => {
                self.write_summary(*exit_status, writer)
            }
        }
    }

    fn write_collected(&self, items: &[CollectedItem], writer: &mut dyn Write) -> io::Result<()> {
        let tracked = items
            .iter()
            .filter(|item| self.extractor.extract(*item).is_some())
            .count();

        writeln!(writer, "------------")?;
        write!(writer, "{:>12} ", "Collected".style(self.styles.pass))?;
        writeln!(
            writer,
            "{} {}, {} tracked in TestRail",
            items.len().style(self.styles.count),
            tests_str(items.len()),
            tracked.style(self.styles.count),
        )
    }

    fn write_report(&mut self, report: &PhaseReport, writer: &mut dyn Write) -> io::Result<()> {
        let passing_outside_call = report.outcome.is_passed() && report.phase != Phase::Call;
        if passing_outside_call && !self.all_phases {
            return Ok(());
        }
        if !passing_outside_call {
            self.stats.record(&report.outcome);
        }

        let (label, style) = match &report.outcome {
            Outcome::Passed => ("PASS".to_owned(), self.styles.pass),
            Outcome::Failed => ("FAIL".to_owned(), self.styles.fail),
            Outcome::Skipped => ("SKIP".to_owned(), self.styles.skip),
            Outcome::XFail => ("XFAIL".to_owned(), self.styles.skip),
            Outcome::Other(other) => (other.to_uppercase(), self.styles.fail),
        };
        write!(writer, "{:>12} ", label.style(style))?;

        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(writer, "[{:>8.3}s] ", report.duration)?;

        write!(writer, "{}", report.name.style(self.styles.name))?;
        if report.phase != Phase::Call {
            write!(writer, " ({})", report.phase)?;
        }
        writeln!(writer)?;

        if report.outcome == Outcome::Failed
            && let Some(longrepr) = report.longrepr.as_deref()
        {
            for line in longrepr.lines() {
                writeln!(writer, "    {}", line.style(self.styles.fail_output))?;
            }
        }
        Ok(())
    }

    fn write_summary(&self, exit_status: i32, writer: &mut dyn Write) -> io::Result<()> {
        let summary_style = if self.stats.failed > 0 || self.stats.other > 0 {
            self.styles.fail
        } else if self.stats.total() == 0 {
            self.styles.skip
        } else {
            self.styles.pass
        };
        write!(
            writer,
            "------------\n{:>12} ",
            "Summary".style(summary_style)
        )?;
        write!(
            writer,
            "{} {} reported",
            self.stats.total().style(self.styles.count),
            results_str(self.stats.total()),
        )?;

        let mut summary_str = String::new();
        write_stats_str(&self.stats, &self.styles, &mut summary_str);
        if !summary_str.is_empty() {
            write!(writer, ": {summary_str}")?;
        }
        writeln!(writer, " (exit status {exit_status})")
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct DisplayStats {
    passed: usize,
    failed: usize,
    skipped: usize,
    xfailed: usize,
    other: usize,
}

impl DisplayStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::XFail => self.xfailed += 1,
            Outcome::Other(_) => self.other += 1,
        }
    }

    fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.xfailed + self.other
    }
}

fn write_stats_str(stats: &DisplayStats, styles: &Styles, out: &mut String) {
    let parts = [
        (stats.passed, "passed", styles.pass),
        (stats.failed, "failed", styles.fail),
        (stats.skipped, "skipped", styles.skip),
        (stats.xfailed, "xfailed", styles.skip),
        (stats.other, "other", styles.fail),
    ];
    for (count, label, style) in parts.into_iter().filter(|(count, ..)| *count > 0) {
        if !out.is_empty() {
            out.push_str(", ");
        }
        swrite!(out, "{} {}", count.style(styles.count), label.style(style));
    }
}

fn tests_str(count: usize) -> &'static str {
    if count == 1 { "test" } else { "tests" }
}

fn results_str(count: usize) -> &'static str {
    if count == 1 { "result" } else { "results" }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    name: Style,
    pass: Style,
    fail: Style,
    fail_output: Style,
    skip: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.name = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.fail_output = Style::new().magenta();
        self.skip = Style::new().yellow().bold();
    }
}
