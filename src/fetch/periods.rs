// src/fetch/periods.rs
use chrono::{Datelike, Local};
use std::fmt;

pub const PERIOD_PLACEHOLDER: &str = "{period}";

/// One monthly release, identified by its `(year, month)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The calendar month we are in right now (local time).
    pub fn current() -> Self {
        let now = Local::now();
        Self::new(now.year(), now.month())
    }

    /// Canonical `YYYYMM` key used in file and entry names.
    pub fn key(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    pub fn prev(&self) -> Self {
        if self.month <= 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// Substitute the period key into a URL template.
    pub fn url(&self, template: &str) -> String {
        template.replace(PERIOD_PLACEHOLDER, &self.key())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Descending walk over the months strictly before `now`, down to and including `start`.
///
/// The current month is never yielded: its release has not been published yet.
#[derive(Debug, Clone)]
pub struct Periods {
    next: Period,
    start: Period,
}

impl Periods {
    pub fn new(start: Period, now: Period) -> Self {
        Self {
            next: now.prev(),
            start,
        }
    }

    /// Walk back from the current month.
    pub fn since(start: Period) -> Self {
        Self::new(start, Period::current())
    }
}

impl Iterator for Periods {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        if self.next < self.start {
            return None;
        }
        let out = self.next;
        self.next = out.prev();
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_zero_padded() {
        assert_eq!(Period::new(2024, 2).key(), "202402");
        assert_eq!(Period::new(2023, 12).to_string(), "202312");
    }

    #[test]
    fn prev_rolls_over_january() {
        assert_eq!(Period::new(2024, 1).prev(), Period::new(2023, 12));
        assert_eq!(Period::new(2024, 7).prev(), Period::new(2024, 6));
    }

    #[test]
    fn walks_back_excluding_current_including_start() {
        let got: Vec<_> = Periods::new(Period::new(2023, 11), Period::new(2024, 2)).collect();
        assert_eq!(
            got,
            vec![
                Period::new(2024, 1),
                Period::new(2023, 12),
                Period::new(2023, 11),
            ]
        );
    }

    #[test]
    fn empty_when_start_is_current_month() {
        let now = Period::new(2024, 2);
        assert_eq!(Periods::new(now, now).count(), 0);
    }

    #[test]
    fn empty_when_start_is_in_the_future() {
        let got = Periods::new(Period::new(2025, 1), Period::new(2024, 2)).count();
        assert_eq!(got, 0);
    }

    #[test]
    fn spans_multiple_years() {
        let got: Vec<_> = Periods::new(Period::new(2021, 3), Period::new(2024, 3)).collect();
        assert_eq!(got.len(), 36);
        assert_eq!(got.first(), Some(&Period::new(2024, 2)));
        assert_eq!(got.last(), Some(&Period::new(2021, 3)));
        assert!(got.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn url_substitutes_key() {
        let url = Period::new(2024, 5).url("https://host/BASE_DE_DADOS_CNES_{period}.ZIP");
        assert_eq!(url, "https://host/BASE_DE_DADOS_CNES_202405.ZIP");
    }
}
