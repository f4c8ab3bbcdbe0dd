//! Canonical schema vocabulary
//!
//! `BuildingField` is the closed set of scalar fields every mapped snapshot
//! can carry. Anything else an import supplies lives in extra data.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use seed_common::values::is_blank_str;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Date layouts accepted from imports and edits, tried in order
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%b-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Scalar field of the canonical building schema
///
/// Serializes as its column name (`address_line_1`, `custom_id_1`, ...), so
/// maps keyed by field round-trip through JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildingField {
    PmPropertyId,
    PmParentPropertyId,
    TaxLotId,
    CustomId1,
    JurisdictionPropertyId,
    PropertyName,
    AddressLine1,
    AddressLine2,
    City,
    StateProvince,
    PostalCode,
    District,
    LotNumber,
    BlockNumber,
    YearBuilt,
    BuildingCount,
    GrossFloorArea,
    ConditionedFloorArea,
    OccupiedFloorArea,
    SiteEui,
    SiteEuiWeatherNormalized,
    SourceEui,
    SourceEuiWeatherNormalized,
    EnergyScore,
    EnergyAlerts,
    SpaceAlerts,
    BuildingCertification,
    UseDescription,
    PropertyNotes,
    Owner,
    OwnerEmail,
    OwnerTelephone,
    OwnerAddress,
    OwnerCityState,
    OwnerPostalCode,
    YearEnding,
    ReleaseDate,
    GenerationDate,
    RecentSaleDate,
}

impl BuildingField {
    pub const ALL: [BuildingField; 39] = [
        BuildingField::PmPropertyId,
        BuildingField::PmParentPropertyId,
        BuildingField::TaxLotId,
        BuildingField::CustomId1,
        BuildingField::JurisdictionPropertyId,
        BuildingField::PropertyName,
        BuildingField::AddressLine1,
        BuildingField::AddressLine2,
        BuildingField::City,
        BuildingField::StateProvince,
        BuildingField::PostalCode,
        BuildingField::District,
        BuildingField::LotNumber,
        BuildingField::BlockNumber,
        BuildingField::YearBuilt,
        BuildingField::BuildingCount,
        BuildingField::GrossFloorArea,
        BuildingField::ConditionedFloorArea,
        BuildingField::OccupiedFloorArea,
        BuildingField::SiteEui,
        BuildingField::SiteEuiWeatherNormalized,
        BuildingField::SourceEui,
        BuildingField::SourceEuiWeatherNormalized,
        BuildingField::EnergyScore,
        BuildingField::EnergyAlerts,
        BuildingField::SpaceAlerts,
        BuildingField::BuildingCertification,
        BuildingField::UseDescription,
        BuildingField::PropertyNotes,
        BuildingField::Owner,
        BuildingField::OwnerEmail,
        BuildingField::OwnerTelephone,
        BuildingField::OwnerAddress,
        BuildingField::OwnerCityState,
        BuildingField::OwnerPostalCode,
        BuildingField::YearEnding,
        BuildingField::ReleaseDate,
        BuildingField::GenerationDate,
        BuildingField::RecentSaleDate,
    ];

    /// Identifier fields; an exact match on any of them identifies a building
    pub const IDENTIFIERS: [BuildingField; 3] = [
        BuildingField::PmPropertyId,
        BuildingField::TaxLotId,
        BuildingField::CustomId1,
    ];

    /// Fields holding calendar dates, stored as `YYYY-MM-DD`
    pub const DATES: [BuildingField; 4] = [
        BuildingField::YearEnding,
        BuildingField::ReleaseDate,
        BuildingField::GenerationDate,
        BuildingField::RecentSaleDate,
    ];

    pub fn is_date(&self) -> bool {
        Self::DATES.contains(self)
    }

    /// Value as it should be stored for this field
    ///
    /// Date fields are rewritten to ISO form when the text parses as a date;
    /// unparseable dates are kept as given. Other fields pass through.
    pub fn clean(&self, value: &str) -> String {
        if !self.is_date() || is_blank_str(value) {
            return value.to_string();
        }
        match parse_date(value) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => {
                warn!(field = self.as_str(), value = %value, "Unrecognized date; stored as given");
                value.to_string()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingField::PmPropertyId => "pm_property_id",
            BuildingField::PmParentPropertyId => "pm_parent_property_id",
            BuildingField::TaxLotId => "tax_lot_id",
            BuildingField::CustomId1 => "custom_id_1",
            BuildingField::JurisdictionPropertyId => "jurisdiction_property_id",
            BuildingField::PropertyName => "property_name",
            BuildingField::AddressLine1 => "address_line_1",
            BuildingField::AddressLine2 => "address_line_2",
            BuildingField::City => "city",
            BuildingField::StateProvince => "state_province",
            BuildingField::PostalCode => "postal_code",
            BuildingField::District => "district",
            BuildingField::LotNumber => "lot_number",
            BuildingField::BlockNumber => "block_number",
            BuildingField::YearBuilt => "year_built",
            BuildingField::BuildingCount => "building_count",
            BuildingField::GrossFloorArea => "gross_floor_area",
            BuildingField::ConditionedFloorArea => "conditioned_floor_area",
            BuildingField::OccupiedFloorArea => "occupied_floor_area",
            BuildingField::SiteEui => "site_eui",
            BuildingField::SiteEuiWeatherNormalized => "site_eui_weather_normalized",
            BuildingField::SourceEui => "source_eui",
            BuildingField::SourceEuiWeatherNormalized => "source_eui_weather_normalized",
            BuildingField::EnergyScore => "energy_score",
            BuildingField::EnergyAlerts => "energy_alerts",
            BuildingField::SpaceAlerts => "space_alerts",
            BuildingField::BuildingCertification => "building_certification",
            BuildingField::UseDescription => "use_description",
            BuildingField::PropertyNotes => "property_notes",
            BuildingField::Owner => "owner",
            BuildingField::OwnerEmail => "owner_email",
            BuildingField::OwnerTelephone => "owner_telephone",
            BuildingField::OwnerAddress => "owner_address",
            BuildingField::OwnerCityState => "owner_city_state",
            BuildingField::OwnerPostalCode => "owner_postal_code",
            BuildingField::YearEnding => "year_ending",
            BuildingField::ReleaseDate => "release_date",
            BuildingField::GenerationDate => "generation_date",
            BuildingField::RecentSaleDate => "recent_sale_date",
        }
    }
}

/// Calendar date of a date or date-time string
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

impl fmt::Display for BuildingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown building field: {}", s))
    }
}

impl Serialize for BuildingField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BuildingField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Origin and processing stage of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    AssessedRaw,
    Assessed,
    PortfolioRaw,
    Portfolio,
    GreenButtonRaw,
    GreenButton,
    /// Result of merging two snapshots (or of a user edit)
    Composite,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::AssessedRaw => "ASSESSED_RAW",
            SourceType::Assessed => "ASSESSED",
            SourceType::PortfolioRaw => "PORTFOLIO_RAW",
            SourceType::Portfolio => "PORTFOLIO",
            SourceType::GreenButtonRaw => "GREEN_BUTTON_RAW",
            SourceType::GreenButton => "GREEN_BUTTON",
            SourceType::Composite => "COMPOSITE",
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(
            self,
            SourceType::AssessedRaw | SourceType::PortfolioRaw | SourceType::GreenButtonRaw
        )
    }

    /// Mapped counterpart of a raw source type; non-raw types map to themselves
    pub fn mapped(&self) -> SourceType {
        match self {
            SourceType::AssessedRaw => SourceType::Assessed,
            SourceType::PortfolioRaw => SourceType::Portfolio,
            SourceType::GreenButtonRaw => SourceType::GreenButton,
            other => *other,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSESSED_RAW" => Ok(SourceType::AssessedRaw),
            "ASSESSED" => Ok(SourceType::Assessed),
            "PORTFOLIO_RAW" => Ok(SourceType::PortfolioRaw),
            "PORTFOLIO" => Ok(SourceType::Portfolio),
            "GREEN_BUTTON_RAW" => Ok(SourceType::GreenButtonRaw),
            "GREEN_BUTTON" => Ok(SourceType::GreenButton),
            "COMPOSITE" => Ok(SourceType::Composite),
            other => Err(format!("unknown source type: {}", other)),
        }
    }
}

/// How a merge was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Merged by the import matcher
    Auto,
    /// Merged by a user
    Manual,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Auto => "AUTO",
            MatchType::Manual => "MANUAL",
        }
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTO" => Ok(MatchType::Auto),
            "MANUAL" => Ok(MatchType::Manual),
            other => Err(format!("unknown match type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_unique_and_parse_back() {
        let mut seen = std::collections::HashSet::new();
        for field in BuildingField::ALL {
            assert!(seen.insert(field.as_str()), "duplicate name {}", field);
            assert_eq!(field.as_str().parse::<BuildingField>().unwrap(), field);
        }
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&BuildingField::AddressLine1).unwrap();
        assert_eq!(json, "\"address_line_1\"");
        let json = serde_json::to_string(&BuildingField::CustomId1).unwrap();
        assert_eq!(json, "\"custom_id_1\"");
    }

    #[test]
    fn test_clean_normalizes_dates() {
        for field in BuildingField::DATES {
            assert_eq!(field.clean("12/31/2013"), "2013-12-31");
            assert_eq!(field.clean("2013-12-31"), "2013-12-31");
        }
        assert_eq!(BuildingField::YearEnding.clean("2015/12/30"), "2015-12-30");
        assert_eq!(BuildingField::ReleaseDate.clean("2014-01-02 13:45:00"), "2014-01-02");
        assert_eq!(BuildingField::ReleaseDate.clean("2014-01-02T08:00:00Z"), "2014-01-02");
    }

    #[test]
    fn test_clean_keeps_other_values() {
        assert_eq!(BuildingField::YearEnding.clean("sometime in 2013"), "sometime in 2013");
        assert_eq!(BuildingField::YearEnding.clean(""), "");
        assert_eq!(BuildingField::YearEnding.clean("13/45/2013"), "13/45/2013");
        assert_eq!(BuildingField::PropertyName.clean("12/31/2013"), "12/31/2013");
        assert!(!BuildingField::YearBuilt.is_date());
    }

    #[test]
    fn test_source_type_mapping() {
        assert!(SourceType::PortfolioRaw.is_raw());
        assert_eq!(SourceType::PortfolioRaw.mapped(), SourceType::Portfolio);
        assert_eq!(SourceType::Composite.mapped(), SourceType::Composite);
        assert_eq!("GREEN_BUTTON_RAW".parse::<SourceType>().unwrap(), SourceType::GreenButtonRaw);
    }
}
