// 📜 Queries - SPARQL templates for each record category
// Each category knows its query and the columns that hold its id and its
// interval. The engine only relies on those column names.

use serde::{Deserialize, Serialize};
use std::fmt;

const PREFIXES: &str = "
    PREFIX : <https://id.parliament.uk/schema/>
    PREFIX d: <https://id.parliament.uk/>";

const DISPLAY_NAME: &str = "<http://example.com/F31CBD81AD8343898B49DC65743F0BDF>";
const FULL_TITLE: &str = "<http://example.com/D79B0BAC513C4A9A87C9D5AFF1FC632F>";

/// Path from a member to the house of each of their seats
const MEMBER_HOUSE: &str =
    ":memberHasParliamentaryIncumbency/:seatIncumbencyHasHouseSeat/:houseSeatHasHouse ?house";

// ============================================================================
// HOUSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum House {
    Commons,
    Lords,
}

impl House {
    /// Data platform id of the house
    pub fn id(&self) -> &'static str {
        match self {
            House::Commons => "1AFu55Hs",
            House::Lords => "WkUWUBMx",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            House::Commons => "Commons",
            House::Lords => "Lords",
        }
    }
}

impl fmt::Display for House {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn house_constraint(house: Option<House>) -> String {
    house
        .map(|h| format!("BIND(d:{} AS ?house)", h.id()))
        .unwrap_or_default()
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Key details, one row per person
    Members,
    /// Seat incumbencies
    Tenure,
    PartyMemberships,
    GovernmentRoles,
    OppositionRoles,
    CommitteeMemberships,
}

/// Where a category keeps its id and its interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalColumns {
    pub id: &'static str,
    pub start: &'static str,
    pub end: &'static str,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Members => "members",
            Category::Tenure => "memberships",
            Category::PartyMemberships => "party_memberships",
            Category::GovernmentRoles => "government_roles",
            Category::OppositionRoles => "opposition_roles",
            Category::CommitteeMemberships => "committee_memberships",
        }
    }

    /// Interval columns; `None` for key details, which have no interval
    pub fn interval_columns(&self) -> Option<IntervalColumns> {
        let (id, start, end) = match self {
            Category::Members => return None,
            Category::Tenure => (
                "seat_incumbency_id",
                "seat_incumbency_start_date",
                "seat_incumbency_end_date",
            ),
            Category::PartyMemberships => (
                "party_membership_id",
                "party_membership_start_date",
                "party_membership_end_date",
            ),
            Category::GovernmentRoles => (
                "government_incumbency_id",
                "government_incumbency_start_date",
                "government_incumbency_end_date",
            ),
            Category::OppositionRoles => (
                "opposition_incumbency_id",
                "opposition_incumbency_start_date",
                "opposition_incumbency_end_date",
            ),
            Category::CommitteeMemberships => (
                "committee_membership_id",
                "committee_membership_start_date",
                "committee_membership_end_date",
            ),
        };
        Some(IntervalColumns { id, start, end })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// QUERY BUILDING
// ============================================================================

/// The SELECT query fetching raw rows of `category`, optionally restricted
/// to members of one house.
pub fn build_query(category: Category, house: Option<House>) -> String {
    match category {
        Category::Members => members_query(house),
        Category::Tenure => tenure_query(house),
        Category::PartyMemberships => party_memberships_query(house),
        Category::GovernmentRoles => incumbency_query(house, "government", "Government"),
        Category::OppositionRoles => incumbency_query(house, "opposition", "Opposition"),
        Category::CommitteeMemberships => committee_memberships_query(house),
    }
}

/// A minimal query used to check the endpoint is reachable
pub fn probe_query() -> &'static str {
    "SELECT * WHERE { ?s ?p ?o . } LIMIT 1"
}

fn members_query(house: Option<House>) -> String {
    format!(
        "{PREFIXES}
        SELECT DISTINCT
            ?person_id ?mnis_id ?given_name ?family_name ?other_names
            ?display_name ?full_title ?gender ?date_of_birth ?date_of_death
        WHERE {{
            {constraint}
            ?person_id :memberMnisId ?mnis_id ;
                :personGivenName ?given_name ;
                :personFamilyName ?family_name ;
                {DISPLAY_NAME} ?display_name ;
                {FULL_TITLE} ?full_title ;
                :personHasGenderIdentity/:genderIdentityHasGender/:genderName ?gender ;
                {MEMBER_HOUSE} .
            OPTIONAL {{ ?person_id :personOtherNames ?other_names . }}
            OPTIONAL {{ ?person_id :personDateOfBirth ?date_of_birth . }}
            OPTIONAL {{ ?person_id :personDateOfDeath ?date_of_death . }}
        }}",
        constraint = house_constraint(house),
    )
}

fn tenure_query(house: Option<House>) -> String {
    // Commons seats belong to constituencies, Lords seats have a seat type
    let (select, seat) = match house {
        Some(House::Lords) => (
            "?seat_type_id ?seat_type_name",
            "?seat :houseSeatHasHouse ?house ;
                :houseSeatHasHouseSeatType ?seat_type_id .
            ?seat_type_id :houseSeatTypeName ?seat_type_name .",
        ),
        _ => (
            "?constituency_id ?constituency_name ?constituency_ons_id",
            "?seat :houseSeatHasHouse ?house ;
                :houseSeatHasConstituencyGroup ?constituency_id .
            ?constituency_id :constituencyGroupName ?constituency_name .
            OPTIONAL { ?constituency_id :constituencyGroupOnsCode ?constituency_ons_id . }",
        ),
    };

    format!(
        "{PREFIXES}
        SELECT DISTINCT
            ?person_id ?mnis_id ?given_name ?family_name ?display_name
            {select}
            ?seat_incumbency_id ?seat_incumbency_start_date ?seat_incumbency_end_date
        WHERE {{
            {constraint}
            ?person_id :memberMnisId ?mnis_id ;
                :personGivenName ?given_name ;
                :personFamilyName ?family_name ;
                {DISPLAY_NAME} ?display_name ;
                :memberHasParliamentaryIncumbency ?seat_incumbency_id .
            ?seat_incumbency_id a :SeatIncumbency ;
                :seatIncumbencyHasHouseSeat ?seat ;
                :parliamentaryIncumbencyStartDate ?seat_incumbency_start_date .
            OPTIONAL {{ ?seat_incumbency_id :parliamentaryIncumbencyEndDate ?seat_incumbency_end_date . }}
            {seat}
        }}",
        constraint = house_constraint(house),
    )
}

fn party_memberships_query(house: Option<House>) -> String {
    format!(
        "{PREFIXES}
        SELECT DISTINCT
            ?person_id ?mnis_id ?given_name ?family_name ?display_name
            ?party_id ?party_mnis_id ?party_name
            ?party_membership_id ?party_membership_start_date ?party_membership_end_date
        WHERE {{
            {constraint}
            ?person_id :memberMnisId ?mnis_id ;
                :personGivenName ?given_name ;
                :personFamilyName ?family_name ;
                {DISPLAY_NAME} ?display_name ;
                :partyMemberHasPartyMembership ?party_membership_id ;
                {MEMBER_HOUSE} .
            ?party_membership_id a :PartyMembership ;
                :partyMembershipHasParty ?party_id ;
                :partyMembershipStartDate ?party_membership_start_date .
            OPTIONAL {{ ?party_membership_id :partyMembershipEndDate ?party_membership_end_date . }}
            ?party_id :partyMnisId ?party_mnis_id ;
                :partyName ?party_name .
        }}",
        constraint = house_constraint(house),
    )
}

/// Government and opposition roles share one shape
fn incumbency_query(house: Option<House>, prefix: &str, class: &str) -> String {
    format!(
        "{PREFIXES}
        SELECT DISTINCT
            ?person_id ?mnis_id ?given_name ?family_name ?display_name
            ?position_id ?position_name
            ?{prefix}_incumbency_id ?{prefix}_incumbency_start_date ?{prefix}_incumbency_end_date
        WHERE {{
            {constraint}
            ?person_id :memberMnisId ?mnis_id ;
                :personGivenName ?given_name ;
                :personFamilyName ?family_name ;
                {DISPLAY_NAME} ?display_name ;
                :{prefix}PersonHas{class}Incumbency ?{prefix}_incumbency_id ;
                {MEMBER_HOUSE} .
            ?{prefix}_incumbency_id a :{class}Incumbency ;
                :{prefix}IncumbencyHas{class}Position ?position_id ;
                :incumbencyStartDate ?{prefix}_incumbency_start_date .
            OPTIONAL {{ ?{prefix}_incumbency_id :incumbencyEndDate ?{prefix}_incumbency_end_date . }}
            ?position_id :positionName ?position_name .
        }}",
        constraint = house_constraint(house),
    )
}

fn committee_memberships_query(house: Option<House>) -> String {
    format!(
        "{PREFIXES}
        SELECT DISTINCT
            ?person_id ?mnis_id ?given_name ?family_name ?display_name
            ?committee_id ?committee_name ?committee_type_id ?committee_type_name
            ?committee_membership_id ?committee_membership_start_date ?committee_membership_end_date
        WHERE {{
            {constraint}
            ?person_id :memberMnisId ?mnis_id ;
                :personGivenName ?given_name ;
                :personFamilyName ?family_name ;
                {DISPLAY_NAME} ?display_name ;
                :personHasFormalBodyMembership ?committee_membership_id ;
                {MEMBER_HOUSE} .
            ?committee_membership_id :formalBodyMembershipHasFormalBody ?committee_id ;
                :formalBodyMembershipStartDate ?committee_membership_start_date .
            OPTIONAL {{ ?committee_membership_id :formalBodyMembershipEndDate ?committee_membership_end_date . }}
            ?committee_id a :FormalBody ;
                :formalBodyName ?committee_name .
            OPTIONAL {{
                ?committee_id :formalBodyHasFormalBodyType ?committee_type_id ;
                    :formalBodyHasFormalBodyType/:formalBodyTypeName ?committee_type_name .
            }}
        }}",
        constraint = house_constraint(house),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_house_constraint() {
        assert_eq!(house_constraint(None), "");
        assert_eq!(house_constraint(Some(House::Commons)), "BIND(d:1AFu55Hs AS ?house)");
        assert!(build_query(Category::PartyMemberships, Some(House::Lords))
            .contains("BIND(d:WkUWUBMx AS ?house)"));
    }

    #[test]
    fn test_queries_select_interval_columns() {
        for category in [
            Category::Tenure,
            Category::PartyMemberships,
            Category::GovernmentRoles,
            Category::OppositionRoles,
            Category::CommitteeMemberships,
        ] {
            let cols = category.interval_columns().unwrap();
            let query = build_query(category, Some(House::Commons));
            for col in [cols.id, cols.start, cols.end] {
                assert!(query.contains(&format!("?{}", col)), "{} missing {}", category, col);
            }
        }
        assert!(Category::Members.interval_columns().is_none());
    }

    #[test]
    fn test_tenure_query_differs_by_house() {
        let commons = build_query(Category::Tenure, Some(House::Commons));
        let lords = build_query(Category::Tenure, Some(House::Lords));

        assert!(commons.contains("?constituency_name"));
        assert!(commons.contains("OPTIONAL { ?constituency_id"));
        assert!(lords.contains("?seat_type_name"));
        assert!(!lords.contains("?constituency_name"));
    }

    #[test]
    fn test_role_queries_use_their_own_classes() {
        let government = build_query(Category::GovernmentRoles, None);
        assert!(government.contains(":governmentPersonHasGovernmentIncumbency"));
        assert!(government.contains("a :GovernmentIncumbency"));

        let opposition = build_query(Category::OppositionRoles, None);
        assert!(opposition.contains(":oppositionIncumbencyHasOppositionPosition"));
    }
}
