use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::amounts::Amounts;
use crate::error::Result;
use crate::journal::Day;
use crate::pipeline::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interval {
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
    Once,
}

impl Interval {
    pub fn end_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Interval::Days | Interval::Once => date,
            Interval::Weeks => {
                let rest = 6 - date.weekday().num_days_from_monday() as i64;
                date + chrono::Duration::days(rest)
            }
            Interval::Months => {
                let (year, month) = next_month(date.year(), date.month());
                first_of(year, month).pred_opt().expect("date in range")
            }
            Interval::Quarters => {
                let quarter_end = 3 * ((date.month() - 1) / 3 + 1);
                let (year, month) = next_month(date.year(), quarter_end);
                first_of(year, month).pred_opt().expect("date in range")
            }
            Interval::Years => {
                NaiveDate::from_ymd_opt(date.year(), 12, 31).expect("date in range")
            }
        }
    }

    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Interval::Days | Interval::Once => date,
            Interval::Weeks => {
                let rest = date.weekday().num_days_from_monday() as i64;
                date - chrono::Duration::days(rest)
            }
            Interval::Months => first_of(date.year(), date.month()),
            Interval::Quarters => first_of(date.year(), 3 * ((date.month() - 1) / 3) + 1),
            Interval::Years => first_of(date.year(), 1),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::Days => "daily",
            Interval::Weeks => "weekly",
            Interval::Months => "monthly",
            Interval::Quarters => "quarterly",
            Interval::Years => "yearly",
            Interval::Once => "once",
        };
        f.write_str(s)
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Interval, String> {
        match s {
            "daily" => Ok(Interval::Days),
            "weekly" => Ok(Interval::Weeks),
            "monthly" => Ok(Interval::Months),
            "quarterly" => Ok(Interval::Quarters),
            "yearly" => Ok(Interval::Years),
            "once" => Ok(Interval::Once),
            _ => Err(format!("invalid interval `{}'", s)),
        }
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn first_of(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("date in range")
}

pub fn series(t0: NaiveDate, t1: NaiveDate, interval: Interval) -> Vec<NaiveDate> {
    let baseline = interval
        .start_of(t0)
        .pred_opt()
        .expect("date in range");
    let mut res = vec![baseline];
    if interval == Interval::Once {
        res.push(t1);
        return res;
    }
    let mut date = t0;
    loop {
        let end = interval.end_of(date).min(t1);
        res.push(end);
        if end >= t1 {
            break;
        }
        date = end.succ_opt().expect("date in range");
    }
    res
}

#[derive(Clone, Debug)]
pub struct Partition {
    points: Vec<NaiveDate>,
    emit_from: usize,
}

impl Partition {
    pub fn new(from: NaiveDate, to: NaiveDate, interval: Interval, last: usize) -> Partition {
        let points = series(from, to, interval);
        let mut emit_from = 1;
        if last > 0 && last < points.len() - 1 {
            emit_from = points.len() - last;
        }
        Partition { points, emit_from }
    }

    pub fn endpoints(&self) -> &[NaiveDate] {
        &self.points[self.emit_from..]
    }

    pub fn align(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.endpoints().iter().find(|&&e| e >= date).copied()
    }
}

pub struct Partitioner {
    partition: Partition,
    diff: bool,
    idx: usize,
    amounts: Amounts,
    values: Amounts,
    prev_amounts: Amounts,
    prev_values: Amounts,
}

impl Partitioner {
    pub fn new(partition: Partition, diff: bool) -> Partitioner {
        Partitioner {
            partition,
            diff,
            idx: 0,
            amounts: Amounts::new(),
            values: Amounts::new(),
            prev_amounts: Amounts::new(),
            prev_values: Amounts::new(),
        }
    }

    fn flush(&mut self, mut day: Day, out: &mut Vec<Day>) {
        day.amounts = self.amounts.clone();
        day.values = self.values.clone();
        if self.diff {
            day.amounts.minus(&self.prev_amounts);
            day.values.minus(&self.prev_values);
            self.prev_amounts = self.amounts.clone();
            self.prev_values = self.values.clone();
        }
        if self.idx >= self.partition.emit_from {
            out.push(day);
        }
        self.idx += 1;
    }

    fn flush_until(&mut self, date: NaiveDate, out: &mut Vec<Day>) {
        while self.idx < self.partition.points.len() && self.partition.points[self.idx] < date {
            let synthesized = Day::new(self.partition.points[self.idx]);
            self.flush(synthesized, out);
        }
    }
}

impl Stage for Partitioner {
    fn process(&mut self, day: Day) -> Result<Vec<Day>> {
        let mut out = Vec::new();
        self.flush_until(day.date, &mut out);
        if self.idx >= self.partition.points.len() {
            return Ok(out);
        }
        self.amounts = day.amounts.clone();
        self.values = day.values.clone();
        if day.date == self.partition.points[self.idx] {
            self.flush(day, &mut out);
        }
        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<Day>> {
        let mut out = Vec::new();
        while self.idx < self.partition.points.len() {
            let synthesized = Day::new(self.partition.points[self.idx]);
            self.flush(synthesized, &mut out);
        }
        Ok(out)
    }
}
