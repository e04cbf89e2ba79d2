// 🔎 Interval filters
// Inclusive interval-intersection tests over tables of time-bound records:
// - filter_dates: keep rows whose interval meets a date range
// - filter_memberships: keep rows whose interval meets any interval of the
//   same entity in another table
//
// An absent bound never excludes anything: an absent end is an open interval,
// an absent start is unknown.

use crate::dates;
use crate::error::{Error, Result};
use crate::table::{Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// INTERVALS
// ============================================================================

/// A possibly open-ended span of days, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Interval {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Interval { start, end }
    }

    /// Inclusive overlap test.
    ///
    /// Two intervals are disjoint only when one starts strictly after the
    /// other ends; a comparison involving an absent bound is never true.
    pub fn intersects(&self, other: &Interval) -> bool {
        let starts_after = |a: &Interval, b: &Interval| match (a.start, b.end) {
            (Some(start), Some(end)) => start > end,
            _ => false,
        };
        !(starts_after(self, other) || starts_after(other, self))
    }
}

// ============================================================================
// DATE RANGE
// ============================================================================

/// Inclusive filter bounds, validated on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

/// Unchecked bounds as they arrive from a serialized form
#[derive(Deserialize)]
struct RawDateRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = Error;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        DateRange::new(raw.from, raw.to)
    }
}

impl DateRange {
    /// Coerce both bounds and check `from <= to`
    pub fn new(from: impl Into<Value>, to: impl Into<Value>) -> Result<Self> {
        let from = dates::coerce(&from.into())?;
        let to = dates::coerce(&to.into())?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(Error::InvalidDateRange { from, to });
            }
        }

        Ok(DateRange { from, to })
    }

    /// A single day: both bounds set to `on`
    pub fn on(on: impl Into<Value>) -> Result<Self> {
        let on = dates::coerce(&on.into())?;
        Ok(DateRange { from: on, to: on })
    }

    /// The no-op range
    pub fn unbounded() -> Self {
        DateRange::default()
    }

    pub fn from(&self) -> Option<NaiveDate> {
        self.from
    }

    pub fn to(&self) -> Option<NaiveDate> {
        self.to
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn as_interval(&self) -> Interval {
        Interval::new(self.from, self.to)
    }
}

// ============================================================================
// FILTER DATES
// ============================================================================

/// Keep the rows whose `[start_col, end_col]` interval meets `range`.
///
/// A row is excluded when `range.from` is after its end, or `range.to` is
/// before its start. Row order and columns are preserved.
pub fn filter_dates(
    table: &Table,
    start_col: &str,
    end_col: &str,
    range: &DateRange,
) -> Result<Table> {
    let start = table.column_index(start_col)?;
    let end = table.column_index(end_col)?;

    if table.is_empty() || range.is_unbounded() {
        return Ok(table.clone());
    }

    let bounds = range.as_interval();
    let mut keep = Vec::with_capacity(table.len());
    for row in table.rows() {
        let interval = Interval::new(dates::coerce(&row[start])?, dates::coerce(&row[end])?);
        keep.push(interval.intersects(&bounds));
    }

    let filtered = table.retain_by_mask(&keep);
    tracing::debug!(
        "filter_dates on {}..{}: {} -> {} rows",
        start_col,
        end_col,
        table.len(),
        filtered.len()
    );
    Ok(filtered)
}

// ============================================================================
// FILTER MEMBERSHIPS
// ============================================================================

/// Column names used by `filter_memberships`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipColumns {
    /// Id of each target record
    pub target_id: String,
    pub target_start: String,
    pub target_end: String,
    pub filter_start: String,
    pub filter_end: String,
    /// Entity key present in both tables (e.g. `person_id`)
    pub join: String,
}

impl MembershipColumns {
    pub fn new(
        target_id: &str,
        target_start: &str,
        target_end: &str,
        filter_start: &str,
        filter_end: &str,
        join: &str,
    ) -> Self {
        MembershipColumns {
            target_id: target_id.to_string(),
            target_start: target_start.to_string(),
            target_end: target_end.to_string(),
            filter_start: filter_start.to_string(),
            filter_end: filter_end.to_string(),
            join: join.to_string(),
        }
    }
}

/// Keep the target rows whose interval meets at least one filter interval
/// belonging to the same entity.
///
/// Matching is decided per target id: an id is kept if any of its rows
/// intersects. Targets whose entity has no filter records are dropped.
pub fn filter_memberships(
    target: &Table,
    filter_set: &Table,
    cols: &MembershipColumns,
) -> Result<Table> {
    let t_id = target.column_index(&cols.target_id)?;
    let t_start = target.column_index(&cols.target_start)?;
    let t_end = target.column_index(&cols.target_end)?;
    let f_start = filter_set.column_index(&cols.filter_start)?;
    let f_end = filter_set.column_index(&cols.filter_end)?;
    let f_join = filter_set.column_index(&cols.join)?;
    let t_join = target.column_index(&cols.join)?;

    if target.is_empty() {
        return Ok(target.clone());
    }

    // Filter intervals grouped by entity
    let mut by_entity: HashMap<&Value, Vec<Interval>> = HashMap::new();
    for row in filter_set.rows() {
        let interval = Interval::new(dates::coerce(&row[f_start])?, dates::coerce(&row[f_end])?);
        by_entity.entry(&row[f_join]).or_default().push(interval);
    }

    // Match status per target id
    let mut matched: HashMap<&Value, bool> = HashMap::new();
    for row in target.rows() {
        let interval = Interval::new(dates::coerce(&row[t_start])?, dates::coerce(&row[t_end])?);
        let hit = by_entity
            .get(&row[t_join])
            .map_or(false, |intervals| intervals.iter().any(|f| interval.intersects(f)));
        *matched.entry(&row[t_id]).or_insert(false) |= hit;
    }

    let keep: Vec<bool> = target
        .rows()
        .iter()
        .map(|row| matched.get(&row[t_id]).copied().unwrap_or(false))
        .collect();

    let filtered = target.retain_by_mask(&keep);
    tracing::debug!(
        "filter_memberships on {}: {} -> {} rows",
        cols.target_id,
        target.len(),
        filtered.len()
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEM_A: &str = "
        person_id,  membership_id,  start_date,     end_date
        p1,         a1,             2001-01-01,     2001-12-31
        p1,         a2,             2005-01-01,     2005-12-31
        p1,         a3,             2006-01-01,     2006-12-31
        p1,         a4,             2010-01-01,     2010-12-31
        p2,         a5,             2005-01-01,     2005-12-31
        p2,         a6,             2006-01-01,     2006-12-31
        p2,         a7,             2010-01-01,     2010-12-31
        p2,         a8,             2015-01-01,     2015-12-31
    ";

    const MEM_B: &str = "
        person_id,  membership_id,  start_date,     end_date
        p1,         b1,             2001-06-01,     2002-06-30
        p1,         b2,             2004-01-01,     2004-12-31
        p1,         b3,             2006-01-01,     2006-12-31
        p1,         b4,             2011-01-01,     2011-12-31
        p2,         b5,             2004-01-01,     2004-12-31
        p2,         b6,             2006-01-01,     2006-12-31
        p2,         b7,             2011-01-01,     2011-12-31
        p2,         b8,             2015-06-01,     2016-06-30
    ";

    fn mem(csv: &str) -> Table {
        Table::from_csv_str(csv, &["start_date", "end_date"]).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ids(table: &Table) -> Vec<String> {
        table
            .column_values("membership_id")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    fn cols() -> MembershipColumns {
        MembershipColumns::new(
            "membership_id",
            "start_date",
            "end_date",
            "start_date",
            "end_date",
            "person_id",
        )
    }

    // ------------------------------------------------------------------------
    // filter_dates
    // ------------------------------------------------------------------------

    #[test]
    fn test_filter_dates_missing_column() {
        let a = mem(MEM_A);
        let range = DateRange::new("2005-01-01", Value::Null).unwrap();

        let err = filter_dates(&a, "no_such_column", "end_date", &range).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column } if column == "no_such_column"));

        let err = filter_dates(&a, "start_date", "no_such_column", &range).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn test_date_range_rejects_reversed_bounds() {
        let err = DateRange::new("2010-01-01", "2009-12-31").unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_rejects_bad_strings() {
        assert!(matches!(
            DateRange::new("2010-01-XX", "2010-12-31"),
            Err(Error::DateFormat { .. })
        ));
        assert!(matches!(
            DateRange::new("2010-01-01", "2010-12-XX"),
            Err(Error::DateFormat { .. })
        ));
    }

    #[test]
    fn test_filter_dates_without_dates_is_noop() {
        let a = mem(MEM_A);
        let f = filter_dates(&a, "start_date", "end_date", &DateRange::unbounded()).unwrap();
        assert_eq!(f, a);
    }

    #[test]
    fn test_filter_dates_excludes_rows_before_from_date() {
        let a = mem(MEM_A);
        let range = DateRange::new("2004-12-31", Value::Null).unwrap();
        let f = filter_dates(&a, "start_date", "end_date", &range).unwrap();

        assert_eq!(f.len(), a.len() - 1);
        assert_eq!(f.columns(), a.columns());
        assert_eq!(ids(&f)[0], "a2");
    }

    #[test]
    fn test_filter_dates_excludes_rows_after_to_date() {
        let a = mem(MEM_A);
        let range = DateRange::new(Value::Null, "2011-01-01").unwrap();
        let f = filter_dates(&a, "start_date", "end_date", &range).unwrap();

        assert_eq!(f.len(), a.len() - 1);
        assert_eq!(ids(&f).last().unwrap(), "a7");
    }

    #[test]
    fn test_filter_dates_excludes_rows_outside_both_dates() {
        let a = mem(MEM_A);
        let range = DateRange::new("2004-12-31", "2011-01-01").unwrap();
        let f = filter_dates(&a, "start_date", "end_date", &range).unwrap();

        assert_eq!(ids(&f), vec!["a2", "a3", "a4", "a5", "a6", "a7"]);
    }

    #[test]
    fn test_filter_dates_includes_partial_intersection() {
        let a = mem(MEM_A);
        let range = DateRange::new("2005-06-30", "2010-06-30").unwrap();
        let f = filter_dates(&a, "start_date", "end_date", &range).unwrap();

        assert_eq!(f.len(), a.len() - 2);
        assert_eq!(ids(&f)[0], "a2");
        assert_eq!(ids(&f).last().unwrap(), "a7");
    }

    #[test]
    fn test_filter_dates_includes_rows_enclosing_dates() {
        let a = mem(MEM_A);
        let range = DateRange::on("2005-06-30").unwrap();
        let f = filter_dates(&a, "start_date", "end_date", &range).unwrap();

        assert_eq!(ids(&f), vec!["a2", "a5"]);
    }

    #[test]
    fn test_filter_dates_boundary_day_is_inclusive() {
        let t = Table::from_csv_str(
            "membership_id, start_date, end_date\nx, 2010-05-06, 2010-05-06",
            &["start_date", "end_date"],
        )
        .unwrap();
        let f = filter_dates(&t, "start_date", "end_date", &DateRange::on(d(2010, 5, 6)).unwrap())
            .unwrap();
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn test_filter_dates_keeps_open_intervals() {
        let t = Table::from_csv_str(
            "membership_id, start_date, end_date\nopen, 2015-05-07, NA\nnostart, NA, 2001-01-01",
            &["start_date", "end_date"],
        )
        .unwrap();

        let later = DateRange::new("2030-01-01", Value::Null).unwrap();
        let f = filter_dates(&t, "start_date", "end_date", &later).unwrap();
        assert_eq!(ids(&f), vec!["open"]);

        let upto = DateRange::new(Value::Null, "2015-05-07").unwrap();
        let f = filter_dates(&t, "start_date", "end_date", &upto).unwrap();
        assert_eq!(ids(&f), vec!["open", "nostart"]);

        let before = DateRange::new(Value::Null, "2015-05-06").unwrap();
        let f = filter_dates(&t, "start_date", "end_date", &before).unwrap();
        assert_eq!(ids(&f), vec!["nostart"]);
    }

    #[test]
    fn test_filter_dates_narrowing_is_monotonic() {
        let a = mem(MEM_A);
        let wide = DateRange::new("2001-01-01", "2015-12-31").unwrap();
        let narrow = DateRange::new("2005-06-30", "2006-06-30").unwrap();

        let f_wide = filter_dates(&a, "start_date", "end_date", &wide).unwrap();
        let f_narrow = filter_dates(&a, "start_date", "end_date", &narrow).unwrap();
        assert!(f_narrow.len() <= f_wide.len());
    }

    // ------------------------------------------------------------------------
    // filter_memberships
    // ------------------------------------------------------------------------

    #[test]
    fn test_filter_memberships_missing_columns() {
        let a = mem(MEM_A);
        let b = mem(MEM_B);

        let variants = [
            MembershipColumns::new("no_such_column", "start_date", "end_date", "start_date", "end_date", "person_id"),
            MembershipColumns::new("membership_id", "no_such_column", "end_date", "start_date", "end_date", "person_id"),
            MembershipColumns::new("membership_id", "start_date", "no_such_column", "start_date", "end_date", "person_id"),
            MembershipColumns::new("membership_id", "start_date", "end_date", "no_such_column", "end_date", "person_id"),
            MembershipColumns::new("membership_id", "start_date", "end_date", "start_date", "no_such_column", "person_id"),
            MembershipColumns::new("membership_id", "start_date", "end_date", "start_date", "end_date", "no_such_column"),
        ];

        for cols in &variants {
            let err = filter_memberships(&a, &b, cols).unwrap_err();
            assert!(matches!(err, Error::MissingColumn { .. }), "{:?}", cols);
        }
    }

    #[test]
    fn test_filter_memberships_filters_correct_memberships() {
        let a = mem(MEM_A);
        let b = mem(MEM_B);

        let f = filter_memberships(&a, &b, &cols()).unwrap();

        assert_eq!(f.columns(), a.columns());
        assert_eq!(ids(&f), vec!["a1", "a3", "a6", "a8"]);
        assert_eq!(
            f.date_column("start_date").unwrap(),
            vec![
                Some(d(2001, 1, 1)),
                Some(d(2006, 1, 1)),
                Some(d(2006, 1, 1)),
                Some(d(2015, 1, 1)),
            ]
        );
    }

    #[test]
    fn test_filter_memberships_drops_unmatched_entities() {
        let a = mem(MEM_A);
        let b = mem(MEM_B);
        let only_p1 = b.retain_by_mask(&[true, true, true, true, false, false, false, false]);

        let f = filter_memberships(&a, &only_p1, &cols()).unwrap();
        assert_eq!(ids(&f), vec!["a1", "a3"]);
    }

    #[test]
    fn test_filter_dates_empty_table() {
        let empty = Table::empty(&["person_id", "membership_id", "start_date", "end_date"]);
        let range = DateRange::new("2005-01-01", "2006-01-01").unwrap();
        assert_eq!(filter_dates(&empty, "start_date", "end_date", &range).unwrap(), empty);
    }

    #[test]
    fn test_date_range_deserialize_checks_order() {
        let range: DateRange =
            serde_json::from_str(r#"{"from":"2019-01-01","to":"2020-01-01"}"#).unwrap();
        assert_eq!(range.from(), Some(d(2019, 1, 1)));
        assert_eq!(range.to(), Some(d(2020, 1, 1)));

        let open: DateRange = serde_json::from_str(r#"{"from":null,"to":"2020-01-01"}"#).unwrap();
        assert_eq!(open.from(), None);

        let reversed =
            serde_json::from_str::<DateRange>(r#"{"from":"2020-01-01","to":"2019-01-01"}"#);
        assert!(reversed.is_err());
    }

    #[test]
    fn test_filter_memberships_matches_per_target_id() {
        // m1 spans two rows; only the 2006 row meets a p1 interval in MEM_B
        let target = mem("
            person_id,  membership_id,  start_date,     end_date
            p1,         m1,             2005-01-01,     2005-12-31
            p1,         m1,             2006-01-01,     2006-12-31
            p1,         m2,             2008-01-01,     2008-12-31
        ");

        let f = filter_memberships(&target, &mem(MEM_B), &cols()).unwrap();

        assert_eq!(ids(&f), vec!["m1", "m1"]);
        assert_eq!(
            f.date_column("start_date").unwrap(),
            vec![Some(d(2005, 1, 1)), Some(d(2006, 1, 1))]
        );
    }

    #[test]
    fn test_filter_memberships_empty_target() {
        let a = Table::empty(&["person_id", "membership_id", "start_date", "end_date"]);
        let f = filter_memberships(&a, &mem(MEM_B), &cols()).unwrap();
        assert!(f.is_empty());
    }

    #[test]
    fn test_intersection_is_symmetric() {
        let cases = [
            (Interval::new(Some(d(2001, 1, 1)), Some(d(2001, 12, 31))), Interval::new(Some(d(2001, 6, 1)), Some(d(2002, 6, 30)))),
            (Interval::new(Some(d(2005, 1, 1)), Some(d(2005, 12, 31))), Interval::new(Some(d(2004, 1, 1)), Some(d(2004, 12, 31)))),
            (Interval::new(Some(d(2015, 1, 1)), None), Interval::new(Some(d(2016, 1, 1)), Some(d(2016, 12, 31)))),
            (Interval::new(None, None), Interval::new(Some(d(2016, 1, 1)), Some(d(2016, 12, 31)))),
            (Interval::new(Some(d(2010, 1, 1)), Some(d(2010, 1, 1))), Interval::new(Some(d(2010, 1, 1)), None)),
        ];

        for (a, b) in &cases {
            assert_eq!(a.intersects(b), b.intersects(a), "{:?} / {:?}", a, b);
        }
        assert!(cases[0].0.intersects(&cases[0].1));
        assert!(!cases[1].0.intersects(&cases[1].1));
        assert!(cases[3].0.intersects(&cases[3].1));
    }
}
