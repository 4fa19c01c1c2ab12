use std::fmt::Display;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::search::title_episode_number;

pub const UNTITLED: &str = "Sin título";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub broadcast_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EpisodeRecord {
    /// Numeric designator at the start of the title, with any `.` removed.
    pub fn episode_number(&self) -> Option<String> {
        title_episode_number(&self.title)
    }

    /// Serialized names of the fields this record carries, in column order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = vec!["id", "title", "url", "broadcastDate"];
        if self.duration.is_some() {
            names.push("duration");
        }
        if self.description.is_some() {
            names.push("description");
        }
        names
    }

    pub fn field_value(&self, name: &str) -> &str {
        match name {
            "id" => &self.id,
            "title" => &self.title,
            "url" => &self.url,
            "broadcastDate" => &self.broadcast_date,
            "duration" => self.duration.as_deref().unwrap_or_default(),
            "description" => self.description.as_deref().unwrap_or_default(),
            _ => "",
        }
    }
}

impl Display for EpisodeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.title)?;
        if !self.broadcast_date.is_empty() {
            writeln!(f, "Date: {}", self.broadcast_date)?;
        }
        if let Some(duration) = self.duration.as_deref().filter(|d| !d.is_empty()) {
            writeln!(f, "Duration: {}", duration)?;
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(f, "Description: {}", description)?;
        }
        Ok(())
    }
}

/// Inclusive range of months during which the program was broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub const DISCOPOLIS: DateWindow = DateWindow {
        start: NaiveDate::from_ymd_opt(2008, 2, 1).expect("invalid window start"),
        end: NaiveDate::from_ymd_opt(2021, 6, 1).expect("invalid window end"),
    };

    /// Builds a window from two (month, year) pairs. `None` if either month is
    /// not a calendar month or the window would be empty.
    pub fn new(start: (u32, i32), end: (u32, i32)) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(start.1, start.0, 1)?;
        let end = NaiveDate::from_ymd_opt(end.1, end.0, 1)?;
        (start <= end).then_some(Self { start, end })
    }

    pub fn end(&self) -> (u32, i32) {
        (self.end.month(), self.end.year())
    }

    pub fn contains(&self, month: u32, year: i32) -> bool {
        NaiveDate::from_ymd_opt(year, month, 1)
            .is_some_and(|date| self.start <= date && date <= self.end)
    }

    /// Every (month, year) in the window, oldest first.
    pub fn months(&self) -> impl Iterator<Item = (u32, i32)> + use<> {
        let end = self.end;
        std::iter::successors(Some(self.start), |date| {
            date.checked_add_months(Months::new(1))
        })
        .take_while(move |date| *date <= end)
        .map(|date| (date.month(), date.year()))
    }
}

impl Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%B %Y"),
            self.end.format("%B %Y")
        )
    }
}
