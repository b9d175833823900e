//! Window planner
//!
//! Turns a request span into an ordered, gap-free, non-overlapping list of
//! query tasks: windows in chronological order, and for each window every
//! pattern in configuration order.

use crate::plan::task::{DateRange, Granularity, QueryTask, Window};
use crate::PlanError;
use chrono::{Datelike, Days, NaiveDate};
use std::fmt;

/// A previously reached position in the planned task sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// Window label (snapshot id, or first day of a date window)
    pub window: String,
    /// Pattern within the window; None means the window's first pattern
    pub pattern: Option<String>,
}

impl ResumePoint {
    fn matches(&self, task: &QueryTask) -> bool {
        task.window.label() == self.window
            && self
                .pattern
                .as_ref()
                .map_or(true, |pattern| *pattern == task.pattern)
    }

    fn not_found(&self) -> PlanError {
        PlanError::UnknownResumePoint {
            window: self.window.clone(),
            pattern: self.pattern.clone(),
        }
    }
}

impl fmt::Display for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Some(pattern) => write!(f, "{} @ {}", pattern, self.window),
            None => f.write_str(&self.window),
        }
    }
}

/// Partitions a date range into consecutive windows
///
/// # Examples
///
/// ```
/// use channel_harvest::plan::{split_range, DateRange, Granularity};
///
/// let span = DateRange::new("2024-01-15".parse().unwrap(), "2024-03-10".parse().unwrap()).unwrap();
/// let windows = split_range(span, Granularity::Month);
/// assert_eq!(windows.len(), 3);
/// assert_eq!(windows[0].to.to_string(), "2024-01-31");
/// assert_eq!(windows[2].to.to_string(), "2024-03-10");
/// ```
pub fn split_range(range: DateRange, granularity: Granularity) -> Vec<DateRange> {
    let mut windows = Vec::new();
    let mut start = range.from;

    loop {
        let natural_end = match granularity {
            Granularity::Whole => range.to,
            Granularity::Month => last_day_of_month(start),
            Granularity::Days(n) => start
                .checked_add_days(Days::new(u64::from(n.max(1)) - 1))
                .unwrap_or(range.to),
        };
        let end = natural_end.min(range.to);
        windows.push(DateRange { from: start, to: end });

        match end.succ_opt() {
            Some(next) if end < range.to => start = next,
            _ => break,
        }
    }

    windows
}

/// Plans range tasks: every window crossed with every pattern
pub fn plan_range(
    range: DateRange,
    granularity: Granularity,
    patterns: &[String],
) -> Result<Vec<QueryTask>, PlanError> {
    let windows = split_range(range, granularity)
        .into_iter()
        .map(Window::Range)
        .collect::<Vec<_>>();
    cross(windows, patterns)
}

/// Plans snapshot tasks: every snapshot crossed with every pattern
pub fn plan_snapshots(snapshots: &[String], patterns: &[String]) -> Result<Vec<QueryTask>, PlanError> {
    let windows = snapshots
        .iter()
        .cloned()
        .map(Window::Snapshot)
        .collect::<Vec<_>>();
    cross(windows, patterns)
}

fn cross(windows: Vec<Window>, patterns: &[String]) -> Result<Vec<QueryTask>, PlanError> {
    let tasks: Vec<QueryTask> = windows
        .into_iter()
        .flat_map(|window| {
            patterns
                .iter()
                .map(move |pattern| QueryTask::new(window.clone(), pattern.clone()))
        })
        .collect();

    if tasks.is_empty() {
        return Err(PlanError::EmptyPlan);
    }
    Ok(tasks)
}

/// Drops every task strictly before `point`, keeping the rest in order
///
/// The task at `point` itself is kept. Fails if no task matches.
pub fn resume_at(tasks: Vec<QueryTask>, point: &ResumePoint) -> Result<Vec<QueryTask>, PlanError> {
    let index = tasks
        .iter()
        .position(|task| point.matches(task))
        .ok_or_else(|| point.not_found())?;
    Ok(tasks.into_iter().skip(index).collect())
}

/// Drops every task up to and including `point`
///
/// Used when `point` is the last task a previous run completed.
pub fn resume_after(tasks: Vec<QueryTask>, point: &ResumePoint) -> Result<Vec<QueryTask>, PlanError> {
    let index = tasks
        .iter()
        .rposition(|task| point.matches(task))
        .ok_or_else(|| point.not_found())?;
    Ok(tasks.into_iter().skip(index + 1).collect())
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(from: &str, to: &str) -> DateRange {
        DateRange::new(date(from), date(to)).unwrap()
    }

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    /// Asserts windows are ordered, contiguous, non-overlapping and cover `span`
    fn assert_exact_cover(span: DateRange, windows: &[DateRange]) {
        assert!(!windows.is_empty());
        assert_eq!(windows.first().unwrap().from, span.from);
        assert_eq!(windows.last().unwrap().to, span.to);
        for pair in windows.windows(2) {
            assert!(pair[0].from <= pair[0].to);
            assert_eq!(pair[0].to.succ_opt().unwrap(), pair[1].from);
        }
        let total: u64 = windows.iter().map(|w| w.days()).sum();
        assert_eq!(total, span.days());
    }

    #[test]
    fn test_whole_is_single_window() {
        let span = range("2018-01-01", "2024-12-31");
        assert_eq!(split_range(span, Granularity::Whole), vec![span]);
    }

    #[test]
    fn test_month_windows_clamped() {
        let span = range("2023-12-15", "2024-02-10");
        let windows = split_range(span, Granularity::Month);
        assert_eq!(
            windows,
            vec![
                range("2023-12-15", "2023-12-31"),
                range("2024-01-01", "2024-01-31"),
                range("2024-02-01", "2024-02-10"),
            ]
        );
    }

    #[test]
    fn test_day_windows() {
        let span = range("2024-01-01", "2024-01-10");
        let windows = split_range(span, Granularity::Days(4));
        assert_eq!(
            windows,
            vec![
                range("2024-01-01", "2024-01-04"),
                range("2024-01-05", "2024-01-08"),
                range("2024-01-09", "2024-01-10"),
            ]
        );
    }

    #[test]
    fn test_coverage_for_many_spans() {
        let starts = ["2020-02-28", "2023-12-31", "2024-01-01", "2024-06-15"];
        let lengths = [0u64, 1, 6, 30, 31, 59, 365, 800];
        let granularities = [
            Granularity::Whole,
            Granularity::Month,
            Granularity::Days(1),
            Granularity::Days(7),
            Granularity::Days(45),
        ];

        for start in starts {
            for len in lengths {
                let from = date(start);
                let to = from.checked_add_days(Days::new(len)).unwrap();
                let span = DateRange::new(from, to).unwrap();
                for granularity in granularities {
                    assert_exact_cover(span, &split_range(span, granularity));
                }
            }
        }
    }

    #[test]
    fn test_plan_order_is_window_major() {
        let tasks = plan_range(
            range("2024-01-01", "2024-02-29"),
            Granularity::Month,
            &patterns(&["a/", "b/"]),
        )
        .unwrap();

        let order: Vec<(String, String)> = tasks
            .iter()
            .map(|t| (t.window.label(), t.pattern.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2024-01-01".to_string(), "a/".to_string()),
                ("2024-01-01".to_string(), "b/".to_string()),
                ("2024-02-01".to_string(), "a/".to_string()),
                ("2024-02-01".to_string(), "b/".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_plans_are_errors() {
        assert!(matches!(
            plan_snapshots(&[], &patterns(&["a"])),
            Err(PlanError::EmptyPlan)
        ));
        assert!(matches!(
            plan_range(range("2024-01-01", "2024-01-01"), Granularity::Whole, &[]),
            Err(PlanError::EmptyPlan)
        ));
    }

    #[test]
    fn test_resume_at_window_and_pattern() {
        let snaps = patterns(&["CC-MAIN-2024-10", "CC-MAIN-2024-18", "CC-MAIN-2024-22"]);
        let tasks = plan_snapshots(&snaps, &patterns(&["p1", "p2"])).unwrap();

        let point = ResumePoint {
            window: "CC-MAIN-2024-18".to_string(),
            pattern: Some("p2".to_string()),
        };
        let rest = resume_at(tasks.clone(), &point).unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].pattern, "p2");
        assert_eq!(rest[1].window.label(), "CC-MAIN-2024-22");
        assert_eq!(rest[..], tasks[3..]);
    }

    #[test]
    fn test_resume_at_window_only() {
        let snaps = patterns(&["CC-MAIN-2024-10", "CC-MAIN-2024-18"]);
        let tasks = plan_snapshots(&snaps, &patterns(&["p1", "p2"])).unwrap();
        let point = ResumePoint {
            window: "CC-MAIN-2024-18".to_string(),
            pattern: None,
        };
        let rest = resume_at(tasks, &point).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].pattern, "p1");
    }

    #[test]
    fn test_resume_after_checkpoint() {
        let tasks = plan_range(
            range("2024-01-01", "2024-03-31"),
            Granularity::Month,
            &patterns(&["a/", "b/"]),
        )
        .unwrap();
        let point = ResumePoint {
            window: "2024-02-01".to_string(),
            pattern: Some("b/".to_string()),
        };
        let rest = resume_after(tasks, &point).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].window.label(), "2024-03-01");
        assert_eq!(rest[0].pattern, "a/");
    }

    #[test]
    fn test_unknown_resume_point() {
        let tasks = plan_snapshots(&patterns(&["CC-MAIN-2024-10"]), &patterns(&["p1"])).unwrap();
        let point = ResumePoint {
            window: "CC-MAIN-2023-50".to_string(),
            pattern: None,
        };
        assert!(matches!(
            resume_at(tasks, &point),
            Err(PlanError::UnknownResumePoint { .. })
        ));
    }
}
