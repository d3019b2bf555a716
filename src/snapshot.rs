//! The observation endpoint's data model (spec §6).
//!
//! The core publishes three read-only collections — failures, non-finished
//! jobs, and started tasks — as flat entries, plus a small predicate
//! language (`pname[*][:beg[..end]]`) consumers use to filter them. The
//! HTTP/HTML surface that would serve this over a network is out of scope
//! (spec §1); this module only builds and filters the data it would serve.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One row of a snapshot collection, matching spec §6's field list exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub category: Option<String>,
    pub rcode: Option<i32>,
    /// Wall-clock duration in seconds (`tstop - tstart`, or elapsed so far
    /// for still-running jobs).
    pub duration: Option<f64>,
    pub memkind: Option<String>,
    pub memsize: Option<u64>,
    pub name: String,
    pub numadded: Option<u64>,
    pub numdone: Option<u64>,
    pub numterm: Option<u64>,
    pub pid: Option<u32>,
    pub task: Option<String>,
    /// Unix epoch seconds.
    pub tstart: Option<f64>,
    pub tstop: Option<f64>,
}

impl SnapshotEntry {
    fn field_value(&self, property: &str) -> Option<FieldValue> {
        match property {
            "category" => self.category.clone().map(FieldValue::Text),
            "rcode" => self.rcode.map(|v| FieldValue::Num(v as f64)),
            "duration" => self.duration.map(FieldValue::Num),
            "memkind" => self.memkind.clone().map(FieldValue::Text),
            "memsize" => self.memsize.map(|v| FieldValue::Num(v as f64)),
            "name" => Some(FieldValue::Text(self.name.clone())),
            "numadded" => self.numadded.map(|v| FieldValue::Num(v as f64)),
            "numdone" => self.numdone.map(|v| FieldValue::Num(v as f64)),
            "numterm" => self.numterm.map(|v| FieldValue::Num(v as f64)),
            "pid" => self.pid.map(|v| FieldValue::Num(v as f64)),
            "task" => self.task.clone().map(FieldValue::Text),
            "tstart" => self.tstart.map(FieldValue::Num),
            "tstop" => self.tstop.map(FieldValue::Num),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Num(f64),
    Text(String),
}

impl FieldValue {
    fn matches_exact(&self, literal: &str) -> bool {
        match self {
            FieldValue::Text(s) => s == literal,
            FieldValue::Num(n) => literal.parse::<f64>().is_ok_and(|lit| *n == lit),
        }
    }

    fn in_range(&self, beg: f64, end: f64) -> bool {
        match self {
            FieldValue::Num(n) => *n >= beg && *n < end,
            FieldValue::Text(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
enum Constraint {
    /// No `:range` was given: the property must be present with any
    /// non-null value (unless the `*` marker also allows absence).
    AnyPresent,
    Exact(String),
    Range(f64, f64),
}

/// A single `pname[*][:beg[..end]]` filter term.
#[derive(Debug, Clone)]
pub struct Predicate {
    property: String,
    allow_absent: bool,
    constraint: Constraint,
}

impl Predicate {
    pub fn parse(term: &str) -> Result<Self> {
        let term = term.trim();
        if term.is_empty() {
            return Err(Error::ConfigInvalid("empty predicate term".into()));
        }
        let (left, right) = match term.split_once(':') {
            Some((l, r)) => (l, Some(r)),
            None => (term, None),
        };
        let (property, allow_absent) = match left.strip_suffix('*') {
            Some(p) => (p, true),
            None => (left, false),
        };
        if property.is_empty() {
            return Err(Error::ConfigInvalid(format!(
                "predicate term '{term}' has no property name"
            )));
        }
        let constraint = match right {
            None => Constraint::AnyPresent,
            Some(range) => match range.split_once("..") {
                Some((beg, end)) => {
                    let beg: f64 = beg.parse().map_err(|_| {
                        Error::ConfigInvalid(format!("invalid range start in '{term}'"))
                    })?;
                    let end: f64 = end.parse().map_err(|_| {
                        Error::ConfigInvalid(format!("invalid range end in '{term}'"))
                    })?;
                    Constraint::Range(beg, end)
                }
                None => Constraint::Exact(range.to_string()),
            },
        };
        Ok(Predicate {
            property: property.to_string(),
            allow_absent,
            constraint,
        })
    }

    fn matches(&self, entry: &SnapshotEntry) -> bool {
        match entry.field_value(&self.property) {
            None => self.allow_absent,
            Some(value) => match &self.constraint {
                Constraint::AnyPresent => true,
                Constraint::Exact(literal) => value.matches_exact(literal),
                Constraint::Range(beg, end) => value.in_range(*beg, *end),
            },
        }
    }
}

/// Multiple predicates combined with AND, `|`-separated in source form.
#[derive(Debug, Clone, Default)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

impl PredicateSet {
    pub fn parse(spec: &str) -> Result<Self> {
        let predicates = spec
            .split('|')
            .map(Predicate::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(PredicateSet { predicates })
    }

    pub fn matches(&self, entry: &SnapshotEntry) -> bool {
        self.predicates.iter().all(|p| p.matches(entry))
    }
}

/// Default cap on the number of jobs returned by a query (`jlim`).
pub const DEFAULT_JLIM: usize = 100;

/// The three collections the observation endpoint publishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Finished jobs with non-zero exit code, and tasks having at least one
    /// failed job.
    pub failures: Vec<SnapshotEntry>,
    /// Non-finished jobs (waiting + active).
    pub jobs: Vec<SnapshotEntry>,
    /// Tasks whose first descendant job has started.
    pub tasks: Vec<SnapshotEntry>,
}

impl PoolSnapshot {
    /// Serialize the whole snapshot to a single JSON line, the shape an
    /// observation endpoint would write to its response body. `SnapshotEntry`
    /// holds only strings, integers, and finite floats, so this cannot fail.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("snapshot JSON encoding failed")
    }

    /// Filter `jobs` by an optional predicate set, capped at `jlim` entries
    /// (0 means use [`DEFAULT_JLIM`]).
    pub fn query_jobs(&self, filter: Option<&PredicateSet>, jlim: usize) -> Vec<&SnapshotEntry> {
        query(&self.jobs, filter, jlim)
    }

    pub fn query_failures(
        &self,
        filter: Option<&PredicateSet>,
        jlim: usize,
    ) -> Vec<&SnapshotEntry> {
        query(&self.failures, filter, jlim)
    }

    pub fn query_tasks(&self, filter: Option<&PredicateSet>, jlim: usize) -> Vec<&SnapshotEntry> {
        query(&self.tasks, filter, jlim)
    }
}

fn query<'a>(
    entries: &'a [SnapshotEntry],
    filter: Option<&PredicateSet>,
    jlim: usize,
) -> Vec<&'a SnapshotEntry> {
    let cap = if jlim == 0 { DEFAULT_JLIM } else { jlim };
    entries
        .iter()
        .filter(|e| filter.is_none_or(|f| f.matches(e)))
        .take(cap)
        .collect()
}
