// 🗳️ General Elections - Dissolution calendar
// The reference calendar of UK general elections since 1929, and the rule that
// ends a Commons seat incumbency at dissolution rather than at the election.

use crate::dates;
use crate::error::{Error, Result};
use crate::table::{Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const GENERAL_ELECTIONS_CSV: &str = "
    name,        dissolution,       election
    1929,        1929-05-10,        1929-05-30
    1931,        1931-10-07,        1931-10-27
    1935,        1935-10-25,        1935-11-14
    1945,        1945-06-15,        1945-07-05
    1950,        1950-02-03,        1950-02-23
    1951,        1951-10-05,        1951-10-25
    1955,        1955-05-06,        1955-05-26
    1959,        1959-09-18,        1959-10-08
    1964,        1964-09-25,        1964-10-15
    1966,        1966-03-10,        1966-03-31
    1970,        1970-05-29,        1970-06-18
    1974 (Feb),  1974-02-08,        1974-02-28
    1974 (Oct),  1974-09-20,        1974-10-10
    1979,        1979-04-07,        1979-05-03
    1983,        1983-05-13,        1983-06-09
    1987,        1987-05-18,        1987-06-11
    1992,        1992-03-16,        1992-04-09
    1997,        1997-04-08,        1997-05-01
    2001,        2001-05-14,        2001-06-07
    2005,        2005-04-11,        2005-05-05
    2010,        2010-04-12,        2010-05-06
    2015,        2015-03-30,        2015-05-07
    2017,        2017-05-03,        2017-06-08
    2019,        2019-11-06,        2019-12-12
    2024,        2024-05-30,        2024-07-04
";

// ============================================================================
// CALENDAR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralElection {
    pub name: String,
    pub dissolution: NaiveDate,
    pub election: NaiveDate,
}

/// Dissolution and election dates for point lookups by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDates {
    pub dissolution: NaiveDate,
    pub election: NaiveDate,
}

/// Chronologically ordered, non-overlapping general elections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCalendar")]
pub struct ElectionCalendar {
    elections: Vec<GeneralElection>,
}

/// Unchecked entries as they arrive from a serialized form
#[derive(Deserialize)]
struct RawCalendar {
    elections: Vec<GeneralElection>,
}

impl TryFrom<RawCalendar> for ElectionCalendar {
    type Error = Error;

    fn try_from(raw: RawCalendar) -> Result<Self> {
        ElectionCalendar::new(raw.elections)
    }
}

impl ElectionCalendar {
    /// Build a calendar, checking that each dissolution precedes its
    /// election, each election precedes the next dissolution, and names are
    /// unique.
    pub fn new(elections: Vec<GeneralElection>) -> Result<Self> {
        let mut names = HashSet::new();
        for e in &elections {
            if e.dissolution >= e.election {
                return Err(Error::InvalidCalendar(format!(
                    "{}: dissolution {} is not before election {}",
                    e.name, e.dissolution, e.election
                )));
            }
            if !names.insert(e.name.as_str()) {
                return Err(Error::InvalidCalendar(format!(
                    "duplicate election name {}",
                    e.name
                )));
            }
        }

        for pair in elections.windows(2) {
            if pair[0].election >= pair[1].dissolution {
                return Err(Error::InvalidCalendar(format!(
                    "{} election {} is not before {} dissolution {}",
                    pair[0].name, pair[0].election, pair[1].name, pair[1].dissolution
                )));
            }
        }

        Ok(ElectionCalendar { elections })
    }

    pub fn elections(&self) -> &[GeneralElection] {
        &self.elections
    }

    pub fn len(&self) -> usize {
        self.elections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elections.is_empty()
    }

    /// The calendar keyed by election name
    pub fn to_map(&self) -> BTreeMap<String, ElectionDates> {
        self.elections
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    ElectionDates {
                        dissolution: e.dissolution,
                        election: e.election,
                    },
                )
            })
            .collect()
    }

    /// The calendar as a `name, dissolution, election` table
    pub fn to_table(&self) -> Table {
        let rows = self
            .elections
            .iter()
            .map(|e| {
                vec![
                    Value::from(e.name.as_str()),
                    Value::Date(e.dissolution),
                    Value::Date(e.election),
                ]
            })
            .collect();
        Table::empty(&["name", "dissolution", "election"]).with_rows(rows)
    }

    /// End date of a sitting incumbency.
    ///
    /// A date in `(dissolution, election]` of some election is moved back to
    /// that dissolution; any other date is returned unchanged. Entries cannot
    /// overlap, so the first match is the only match.
    pub fn clip(&self, end: NaiveDate) -> NaiveDate {
        self.elections
            .iter()
            .find(|e| e.dissolution < end && end <= e.election)
            .map_or(end, |e| e.dissolution)
    }
}

/// UK general elections since 1929
pub fn general_elections() -> Result<ElectionCalendar> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(GENERAL_ELECTIONS_CSV.trim().as_bytes());

    let elections = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<GeneralElection>, csv::Error>>()?;

    ElectionCalendar::new(elections)
}

/// UK general elections since 1929, keyed by name
pub fn general_elections_map() -> Result<BTreeMap<String, ElectionDates>> {
    Ok(general_elections()?.to_map())
}

// ============================================================================
// DISSOLUTION ADJUSTMENT
// ============================================================================

/// Clip every end date in `end_col` to dissolution where it falls between a
/// dissolution and the following election. Absent (open) end dates stay open.
pub fn adjust_end_dates(table: &Table, end_col: &str, calendar: &ElectionCalendar) -> Result<Table> {
    let ends = table.date_column(end_col)?;

    let mut adjusted = 0;
    let values: Vec<Value> = ends
        .into_iter()
        .map(|end| match end {
            Some(end) => {
                let clipped = calendar.clip(end);
                if clipped != end {
                    adjusted += 1;
                }
                Value::Date(clipped)
            }
            None => Value::Null,
        })
        .collect();

    tracing::debug!("moved {} end dates back to dissolution", adjusted);
    table.replace_column(end_col, values)
}

/// Parse `name, dissolution, election` rows into a calendar
pub fn calendar_from_table(table: &Table) -> Result<ElectionCalendar> {
    let names = table.column_values("name")?;
    let dissolutions = table.date_column("dissolution")?;
    let elections = table.date_column("election")?;

    let mut entries = Vec::with_capacity(table.len());
    for ((name, dissolution), election) in names.into_iter().zip(dissolutions).zip(elections) {
        let (Some(dissolution), Some(election)) = (dissolution, election) else {
            return Err(Error::InvalidCalendar(format!(
                "{} is missing a dissolution or election date",
                name
            )));
        };
        entries.push(GeneralElection {
            name: name.to_string(),
            dissolution,
            election,
        });
    }

    ElectionCalendar::new(entries)
}

impl GeneralElection {
    pub fn new(name: &str, dissolution: &str, election: &str) -> Result<Self> {
        Ok(GeneralElection {
            name: name.to_string(),
            dissolution: dates::parse_iso_date(dissolution)?,
            election: dates::parse_iso_date(election)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_general_elections_invariants() {
        let ge = general_elections().unwrap();

        assert_eq!(ge.len(), 25);
        assert_eq!(ge.elections()[0].name, "1929");
        assert_eq!(ge.elections()[11].name, "1974 (Feb)");

        for e in ge.elections() {
            assert!(e.dissolution < e.election);
        }
        for pair in ge.elections().windows(2) {
            assert!(pair[0].election < pair[1].dissolution);
        }
    }

    #[test]
    fn test_general_elections_map() {
        let ge = general_elections_map().unwrap();
        assert_eq!(ge.len(), 25);

        let e2017 = ge["2017"];
        assert_eq!(e2017.dissolution, d(2017, 5, 3));
        assert_eq!(e2017.election, d(2017, 6, 8));

        for e in ge.values() {
            assert!(e.dissolution < e.election);
        }
    }

    #[test]
    fn test_calendar_rejects_broken_invariants() {
        let reversed = vec![GeneralElection::new("x", "2017-06-08", "2017-05-03").unwrap()];
        assert!(matches!(
            ElectionCalendar::new(reversed),
            Err(Error::InvalidCalendar(_))
        ));

        let overlapping = vec![
            GeneralElection::new("a", "2017-05-03", "2017-06-08").unwrap(),
            GeneralElection::new("b", "2017-06-01", "2017-07-01").unwrap(),
        ];
        assert!(ElectionCalendar::new(overlapping).is_err());

        let duplicate = vec![
            GeneralElection::new("a", "2015-03-30", "2015-05-07").unwrap(),
            GeneralElection::new("a", "2017-05-03", "2017-06-08").unwrap(),
        ];
        assert!(ElectionCalendar::new(duplicate).is_err());
    }

    #[test]
    fn test_calendar_deserialize_checks_invariants() {
        let valid = r#"{"elections": [
            {"name": "2015", "dissolution": "2015-03-30", "election": "2015-05-07"},
            {"name": "2017", "dissolution": "2017-05-03", "election": "2017-06-08"}
        ]}"#;
        let calendar: ElectionCalendar = serde_json::from_str(valid).unwrap();
        assert_eq!(calendar.len(), 2);

        let reversed = r#"{"elections": [
            {"name": "x", "dissolution": "2017-06-08", "election": "2017-05-03"}
        ]}"#;
        assert!(serde_json::from_str::<ElectionCalendar>(reversed).is_err());

        let duplicate = r#"{"elections": [
            {"name": "a", "dissolution": "2015-03-30", "election": "2015-05-07"},
            {"name": "a", "dissolution": "2017-05-03", "election": "2017-06-08"}
        ]}"#;
        assert!(serde_json::from_str::<ElectionCalendar>(duplicate).is_err());

        // Serialized calendars read back unchanged
        let builtin = general_elections().unwrap();
        let text = serde_json::to_string(&builtin).unwrap();
        assert_eq!(serde_json::from_str::<ElectionCalendar>(&text).unwrap(), builtin);
    }

    #[test]
    fn test_clip_to_dissolution() {
        let calendar = ElectionCalendar::new(vec![
            GeneralElection::new("2017", "2017-04-18", "2017-06-08").unwrap(),
        ])
        .unwrap();

        // Election day moves back to dissolution
        assert_eq!(calendar.clip(d(2017, 6, 8)), d(2017, 4, 18));
        assert_eq!(calendar.clip(d(2017, 4, 19)), d(2017, 4, 18));

        // Dissolution day itself and dates outside the window are untouched
        assert_eq!(calendar.clip(d(2017, 4, 18)), d(2017, 4, 18));
        assert_eq!(calendar.clip(d(2017, 6, 9)), d(2017, 6, 9));
    }

    #[test]
    fn test_adjust_end_dates() {
        let table = Table::from_csv_str(
            "
            seat_incumbency_id, seat_incumbency_end_date
            s1,                 2017-06-08
            s2,                 2017-04-18
            s3,                 NA
            s4,                 2012-01-01
            ",
            &["seat_incumbency_end_date"],
        )
        .unwrap();

        let calendar = ElectionCalendar::new(vec![
            GeneralElection::new("2017", "2017-04-18", "2017-06-08").unwrap(),
        ])
        .unwrap();

        let adjusted = adjust_end_dates(&table, "seat_incumbency_end_date", &calendar).unwrap();
        assert_eq!(
            adjusted.date_column("seat_incumbency_end_date").unwrap(),
            vec![Some(d(2017, 4, 18)), Some(d(2017, 4, 18)), None, Some(d(2012, 1, 1))]
        );

        let err = adjust_end_dates(&table, "no_such_column", &calendar).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn test_calendar_table_round_trip() {
        let ge = general_elections().unwrap();
        let back = calendar_from_table(&ge.to_table()).unwrap();
        assert_eq!(back, ge);
    }
}
