// 🔗 Span Combiner - Merge consecutive party memberships
// Consecutive memberships of the same party by the same person collapse into
// one continuous span: earliest start, latest end. An open membership anywhere
// in a run leaves the merged span open.

use crate::dates::{cmp_absent_last, max_date_poisoned, min_date_poisoned};
use crate::error::{Error, Result};
use crate::table::{Table, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exact column layout of a party memberships table
pub const PARTY_MEMBERSHIP_COLUMNS: [&str; 11] = [
    "person_id",
    "mnis_id",
    "given_name",
    "family_name",
    "display_name",
    "party_id",
    "party_mnis_id",
    "party_name",
    "party_membership_id",
    "party_membership_start_date",
    "party_membership_end_date",
];

/// Column layout of combined party memberships (no membership id)
pub const MERGED_PARTY_MEMBERSHIP_COLUMNS: [&str; 10] = [
    "person_id",
    "mnis_id",
    "given_name",
    "family_name",
    "display_name",
    "party_id",
    "party_mnis_id",
    "party_name",
    "party_membership_start_date",
    "party_membership_end_date",
];

// ============================================================================
// RECORDS
// ============================================================================

/// One party membership as fetched from the data platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMembership {
    pub person_id: String,
    pub mnis_id: String,
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub party_id: String,
    pub party_mnis_id: String,
    pub party_name: String,
    pub party_membership_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A continuous span of membership of one party.
///
/// Membership ids are gone: one span may stand for several records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPartyMembership {
    pub person_id: String,
    pub mnis_id: String,
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,
    pub party_id: String,
    pub party_mnis_id: String,
    pub party_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn text(value: &Value) -> String {
    value.to_string()
}

impl PartyMembership {
    /// Read typed records from a table with exactly the expected columns
    pub fn from_table(table: &Table) -> Result<Vec<PartyMembership>> {
        let matches = table.columns().len() == PARTY_MEMBERSHIP_COLUMNS.len()
            && table
                .columns()
                .iter()
                .zip(PARTY_MEMBERSHIP_COLUMNS)
                .all(|(have, want)| have == want);

        if !matches {
            return Err(Error::Structure(format!(
                "party memberships do not have the expected columns: found [{}]",
                table.columns().join(", ")
            )));
        }

        let start = table.date_column("party_membership_start_date")?;
        let end = table.date_column("party_membership_end_date")?;

        Ok(table
            .rows()
            .iter()
            .zip(start.into_iter().zip(end))
            .map(|(row, (start_date, end_date))| PartyMembership {
                person_id: text(&row[0]),
                mnis_id: text(&row[1]),
                given_name: text(&row[2]),
                family_name: text(&row[3]),
                display_name: text(&row[4]),
                party_id: text(&row[5]),
                party_mnis_id: text(&row[6]),
                party_name: text(&row[7]),
                party_membership_id: text(&row[8]),
                start_date,
                end_date,
            })
            .collect())
    }
}

impl MergedPartyMembership {
    pub fn to_table(spans: &[MergedPartyMembership]) -> Table {
        let rows = spans
            .iter()
            .map(|s| {
                vec![
                    Value::from(s.person_id.as_str()),
                    Value::from(s.mnis_id.as_str()),
                    Value::from(s.given_name.as_str()),
                    Value::from(s.family_name.as_str()),
                    Value::from(s.display_name.as_str()),
                    Value::from(s.party_id.as_str()),
                    Value::from(s.party_mnis_id.as_str()),
                    Value::from(s.party_name.as_str()),
                    Value::from(s.start_date),
                    Value::from(s.end_date),
                ]
            })
            .collect();
        Table::empty(&MERGED_PARTY_MEMBERSHIP_COLUMNS).with_rows(rows)
    }
}

// ============================================================================
// RUNS
// ============================================================================

/// Number each row by run: the run id advances whenever the key differs from
/// the previous row's key.
pub fn assign_runs<K: PartialEq>(keys: &[K]) -> Vec<usize> {
    keys.iter()
        .fold(
            (None::<&K>, 0usize, Vec::with_capacity(keys.len())),
            |(previous, run, mut runs), key| {
                let run = if previous == Some(key) { run } else { run + 1 };
                runs.push(run);
                (Some(key), run, runs)
            },
        )
        .2
}

// ============================================================================
// COMBINE
// ============================================================================

/// Collapse consecutive memberships of the same party into single spans.
///
/// Records are ordered by person and start date; every record needs a start
/// date. Output is sorted by family name, then start date.
pub fn combine_party_memberships(
    memberships: &[PartyMembership],
) -> Result<Vec<MergedPartyMembership>> {
    if let Some(m) = memberships.iter().find(|m| m.start_date.is_none()) {
        return Err(Error::Structure(format!(
            "party membership {} has no start date",
            m.party_membership_id
        )));
    }

    let mut sorted: Vec<&PartyMembership> = memberships.iter().collect();
    sorted.sort_by(|a, b| {
        a.person_id
            .cmp(&b.person_id)
            .then_with(|| cmp_absent_last(&a.start_date, &b.start_date))
    });

    let keys: Vec<(&str, &str)> = sorted
        .iter()
        .map(|m| (m.person_id.as_str(), m.party_id.as_str()))
        .collect();
    let runs = assign_runs(&keys);

    // Descriptive attributes: first record seen for each person and party
    let mut attributes: HashMap<(&str, &str), &PartyMembership> = HashMap::new();
    for (key, m) in keys.iter().zip(&sorted) {
        attributes.entry(*key).or_insert(*m);
    }

    // Rows of a run are adjacent after sorting
    let mut spans = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && runs[j] == runs[i] {
            j += 1;
        }

        let group = &sorted[i..j];
        let first = attributes[&keys[i]];
        spans.push(MergedPartyMembership {
            person_id: first.person_id.clone(),
            mnis_id: first.mnis_id.clone(),
            given_name: first.given_name.clone(),
            family_name: first.family_name.clone(),
            display_name: first.display_name.clone(),
            party_id: first.party_id.clone(),
            party_mnis_id: first.party_mnis_id.clone(),
            party_name: first.party_name.clone(),
            start_date: min_date_poisoned(group.iter().map(|m| m.start_date)),
            end_date: max_date_poisoned(group.iter().map(|m| m.end_date)),
        });

        i = j;
    }

    spans.sort_by(|a, b| {
        a.family_name
            .cmp(&b.family_name)
            .then_with(|| cmp_absent_last(&a.start_date, &b.start_date))
    });

    tracing::debug!(
        "combined {} party memberships into {} spans",
        memberships.len(),
        spans.len()
    );
    Ok(spans)
}

/// Table-level form of `combine_party_memberships`
pub fn combine_party_membership_table(table: &Table) -> Result<Table> {
    let memberships = PartyMembership::from_table(table)?;
    let spans = combine_party_memberships(&memberships)?;
    Ok(MergedPartyMembership::to_table(&spans))
}
