// 🏛️ Record Pipeline - Fetch, filter, reconcile, sort
// One fixed linear pipeline per record category:
//
//   raw rows → filter_dates → filter_memberships (while a member)
//            → dissolution adjustment (Commons tenure) | span combining (party)
//            → sort by family name and start date
//
// Every call recomputes from a fresh fetch; nothing is cached.

use crate::combine::combine_party_membership_table;
use crate::elections::{self, adjust_end_dates, ElectionCalendar};
use crate::error::{Error, Result};
use crate::filter::{filter_dates, filter_memberships, DateRange, MembershipColumns};
use crate::queries::{Category, House, IntervalColumns};
use crate::sparql::RawSource;
use crate::table::{Table, Value};
use std::collections::HashSet;

/// Entity key shared by every category
pub const PERSON_ID: &str = "person_id";

/// Sort key for every output table
pub const FAMILY_NAME: &str = "family_name";

// ============================================================================
// QUERY OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Inclusive date bounds; unbounded by default
    pub range: DateRange,
    /// Keep only records overlapping the person's own tenure (default true)
    pub while_member: bool,
    /// Merge consecutive same-party memberships (party memberships only)
    pub collapse: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            range: DateRange::unbounded(),
            while_member: true,
            collapse: false,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    /// Set the date bounds. A present `on` date wins over `from` and `to`.
    pub fn with_dates(
        self,
        from: impl Into<Value>,
        to: impl Into<Value>,
        on: impl Into<Value>,
    ) -> Result<Self> {
        let on = on.into();
        let range = if on.is_null() {
            DateRange::new(from, to)?
        } else {
            DateRange::on(on)?
        };
        Ok(QueryOptions { range, ..self })
    }

    pub fn with_range(self, range: DateRange) -> Self {
        QueryOptions { range, ..self }
    }

    pub fn while_member(self, while_member: bool) -> Self {
        QueryOptions {
            while_member,
            ..self
        }
    }

    pub fn collapse(self, collapse: bool) -> Self {
        QueryOptions { collapse, ..self }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline<'a, S: RawSource> {
    source: &'a S,
    calendar: ElectionCalendar,
}

impl<'a, S: RawSource> Pipeline<'a, S> {
    /// Pipeline over `source` using the built-in general elections calendar
    pub fn new(source: &'a S) -> Result<Self> {
        Ok(Pipeline {
            source,
            calendar: elections::general_elections()?,
        })
    }

    pub fn with_calendar(source: &'a S, calendar: ElectionCalendar) -> Self {
        Pipeline { source, calendar }
    }

    pub fn calendar(&self) -> &ElectionCalendar {
        &self.calendar
    }

    /// Run the pipeline for any category
    pub fn fetch(&self, category: Category, house: House, options: &QueryOptions) -> Result<Table> {
        match category {
            Category::Members => self.fetch_members(house, options),
            Category::Tenure => self.fetch_memberships(house, options),
            Category::PartyMemberships => self.fetch_party_memberships(house, options),
            Category::GovernmentRoles => self.fetch_government_roles(house, options),
            Category::OppositionRoles => self.fetch_opposition_roles(house, options),
            Category::CommitteeMemberships => self.fetch_committee_memberships(house, options),
        }
    }

    /// Key details, one row per member of `house`.
    ///
    /// With date bounds, keeps members with at least one seat incumbency
    /// meeting the range.
    pub fn fetch_members(&self, house: House, options: &QueryOptions) -> Result<Table> {
        let members = self.source.fetch_raw(Category::Members, Some(house))?;

        let members = if options.range.is_unbounded() {
            members
        } else {
            let tenure = columns_of(Category::Tenure)?;
            let memberships = self.fetch_memberships(house, &QueryOptions::default())?;
            let matching = filter_dates(&memberships, tenure.start, tenure.end, &options.range)?;

            let people: HashSet<&Value> = matching.column_values(PERSON_ID)?.into_iter().collect();
            let keep: Vec<bool> = members
                .column_values(PERSON_ID)?
                .into_iter()
                .map(|p| people.contains(p))
                .collect();
            members.retain_by_mask(&keep)
        };

        members.sort_by_column(FAMILY_NAME)
    }

    /// Seat incumbencies in `house`.
    ///
    /// Commons end dates falling between a dissolution and the following
    /// election are moved back to the dissolution.
    pub fn fetch_memberships(&self, house: House, options: &QueryOptions) -> Result<Table> {
        let cols = columns_of(Category::Tenure)?;
        let raw = self.source.fetch_raw(Category::Tenure, Some(house))?;
        let filtered = self.filter_range(raw, &cols, options)?;

        let adjusted = match house {
            House::Commons => adjust_end_dates(&filtered, cols.end, &self.calendar)?,
            House::Lords => filtered,
        };

        adjusted.sort_by_name_and_date(FAMILY_NAME, cols.start)
    }

    /// Party memberships of members of `house`, optionally collapsed into
    /// continuous spans per party.
    pub fn fetch_party_memberships(&self, house: House, options: &QueryOptions) -> Result<Table> {
        let memberships = self.fetch_filtered(Category::PartyMemberships, house, options)?;

        if options.collapse {
            return combine_party_membership_table(&memberships);
        }

        sort_category(&memberships, Category::PartyMemberships)
    }

    pub fn fetch_government_roles(&self, house: House, options: &QueryOptions) -> Result<Table> {
        let roles = self.fetch_filtered(Category::GovernmentRoles, house, options)?;
        sort_category(&roles, Category::GovernmentRoles)
    }

    pub fn fetch_opposition_roles(&self, house: House, options: &QueryOptions) -> Result<Table> {
        let roles = self.fetch_filtered(Category::OppositionRoles, house, options)?;
        sort_category(&roles, Category::OppositionRoles)
    }

    pub fn fetch_committee_memberships(&self, house: House, options: &QueryOptions) -> Result<Table> {
        let memberships = self.fetch_filtered(Category::CommitteeMemberships, house, options)?;
        sort_category(&memberships, Category::CommitteeMemberships)
    }

    // ========================================================================
    // STAGES
    // ========================================================================

    /// Fetch, date filter and (optionally) restrict to the member's tenure
    fn fetch_filtered(&self, category: Category, house: House, options: &QueryOptions) -> Result<Table> {
        let cols = columns_of(category)?;
        let raw = self.source.fetch_raw(category, Some(house))?;
        let filtered = self.filter_range(raw, &cols, options)?;

        if !options.while_member {
            return Ok(filtered);
        }

        let tenure = columns_of(Category::Tenure)?;
        let memberships = self.fetch_memberships(house, &QueryOptions::default())?;
        let membership_cols = MembershipColumns::new(
            cols.id,
            cols.start,
            cols.end,
            tenure.start,
            tenure.end,
            PERSON_ID,
        );
        let kept = filter_memberships(&filtered, &memberships, &membership_cols)?;
        tracing::debug!(
            "{}: {} of {} rows overlap the member's tenure",
            category,
            kept.len(),
            filtered.len()
        );
        Ok(kept)
    }

    fn filter_range(&self, table: Table, cols: &IntervalColumns, options: &QueryOptions) -> Result<Table> {
        if options.range.is_unbounded() {
            return Ok(table);
        }
        filter_dates(&table, cols.start, cols.end, &options.range)
    }
}

/// Id and interval columns of `category`; key details have none
fn columns_of(category: Category) -> Result<IntervalColumns> {
    category
        .interval_columns()
        .ok_or_else(|| Error::Structure(format!("{} records have no interval", category)))
}

fn sort_category(table: &Table, category: Category) -> Result<Table> {
    let cols = columns_of(category)?;
    table.sort_by_name_and_date(FAMILY_NAME, cols.start)
}
