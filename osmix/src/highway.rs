//! Highway tag classification, used by the routing graph builder to
//! pick a `default_speeds` entry and a connection-predicate hint for the
//! merge engine.

use std::fmt::Display;
use std::str::FromStr;

/// OSM `highway` key values. See
/// <https://wiki.openstreetmap.org/wiki/Key:highway>.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Hash)]
pub enum Highway {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    MotorwayLink,
    TrunkLink,
    PrimaryLink,
    SecondaryLink,
    TertiaryLink,
    LivingStreet,
    Service,
    Pedestrian,
    Track,
    Footway,
    Bridleway,
    Steps,
    Path,
    Cycleway,
    Other(String),
}

impl Highway {
    /// Lower is higher-priority. The top 7 classes rank 1-7; their `*_link`
    /// variants inherit the parent's rank; everything else is 8, since
    /// ranking minor/special types against each other is not meaningful.
    pub fn hierarchy(&self) -> u64 {
        match self {
            Highway::Motorway | Highway::MotorwayLink => 1,
            Highway::Trunk | Highway::TrunkLink => 2,
            Highway::Primary | Highway::PrimaryLink => 3,
            Highway::Secondary | Highway::SecondaryLink => 4,
            Highway::Tertiary | Highway::TertiaryLink => 5,
            Highway::Unclassified => 6,
            Highway::Residential => 7,
            Highway::Other(_) => 10,
            _ => 8,
        }
    }

    /// Default speed in km/h when a way carries no parseable `maxspeed`,
    /// used by `build_graph`.
    pub fn default_speed_kmh(&self) -> f64 {
        match self {
            Highway::Motorway | Highway::MotorwayLink => 100.0,
            Highway::Trunk | Highway::TrunkLink => 90.0,
            Highway::Primary | Highway::PrimaryLink => 70.0,
            Highway::Secondary | Highway::SecondaryLink => 60.0,
            Highway::Tertiary | Highway::TertiaryLink => 50.0,
            Highway::Unclassified | Highway::Residential | Highway::LivingStreet => 30.0,
            Highway::Service | Highway::Track => 20.0,
            Highway::Pedestrian | Highway::Footway | Highway::Bridleway | Highway::Steps | Highway::Path | Highway::Cycleway => 5.0,
            Highway::Other(_) => 50.0,
        }
    }

    /// True for the five non-motor classes the merge engine's connection
    /// predicate treats as compatible with an arbitrary highway.
    pub fn is_footlike(&self) -> bool {
        matches!(
            self,
            Highway::Footway | Highway::Path | Highway::Cycleway | Highway::Bridleway | Highway::Steps
        )
    }
}

impl Display for Highway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Highway::Motorway => write!(f, "motorway"),
            Highway::Trunk => write!(f, "trunk"),
            Highway::Primary => write!(f, "primary"),
            Highway::Secondary => write!(f, "secondary"),
            Highway::Tertiary => write!(f, "tertiary"),
            Highway::Unclassified => write!(f, "unclassified"),
            Highway::Residential => write!(f, "residential"),
            Highway::MotorwayLink => write!(f, "motorway_link"),
            Highway::TrunkLink => write!(f, "trunk_link"),
            Highway::PrimaryLink => write!(f, "primary_link"),
            Highway::SecondaryLink => write!(f, "secondary_link"),
            Highway::TertiaryLink => write!(f, "tertiary_link"),
            Highway::LivingStreet => write!(f, "living_street"),
            Highway::Service => write!(f, "service"),
            Highway::Pedestrian => write!(f, "pedestrian"),
            Highway::Track => write!(f, "track"),
            Highway::Footway => write!(f, "footway"),
            Highway::Bridleway => write!(f, "bridleway"),
            Highway::Steps => write!(f, "steps"),
            Highway::Path => write!(f, "path"),
            Highway::Cycleway => write!(f, "cycleway"),
            Highway::Other(tag) => write!(f, "{tag}"),
        }
    }
}

impl FromStr for Highway {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().replace('_', "").as_str() {
            "motorway" => Highway::Motorway,
            "trunk" => Highway::Trunk,
            "primary" => Highway::Primary,
            "secondary" => Highway::Secondary,
            "tertiary" => Highway::Tertiary,
            "unclassified" => Highway::Unclassified,
            "residential" => Highway::Residential,
            "motorwaylink" => Highway::MotorwayLink,
            "trunklink" => Highway::TrunkLink,
            "primarylink" => Highway::PrimaryLink,
            "secondarylink" => Highway::SecondaryLink,
            "tertiarylink" => Highway::TertiaryLink,
            "livingstreet" => Highway::LivingStreet,
            "service" => Highway::Service,
            "pedestrian" => Highway::Pedestrian,
            "track" => Highway::Track,
            "footway" => Highway::Footway,
            "bridleway" => Highway::Bridleway,
            "steps" => Highway::Steps,
            "path" => Highway::Path,
            "cycleway" => Highway::Cycleway,
            other => Highway::Other(other.to_string()),
        })
    }
}

impl Eq for Highway {}

impl Ord for Highway {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hierarchy().cmp(&other.hierarchy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_and_separator_insensitively() {
        assert_eq!("Motorway".parse::<Highway>().unwrap(), Highway::Motorway);
        assert_eq!("motorway_link".parse::<Highway>().unwrap(), Highway::MotorwayLink);
        assert_eq!("MOTORWAYLINK".parse::<Highway>().unwrap(), Highway::MotorwayLink);
    }

    #[test]
    fn unknown_values_fall_back_to_other() {
        assert_eq!("raceway".parse::<Highway>().unwrap(), Highway::Other("raceway".to_string()));
    }

    #[test]
    fn link_roads_share_parent_hierarchy_and_speed() {
        assert_eq!(Highway::Motorway.hierarchy(), Highway::MotorwayLink.hierarchy());
        assert_eq!(Highway::Motorway.default_speed_kmh(), Highway::MotorwayLink.default_speed_kmh());
    }

    #[test]
    fn ordering_follows_hierarchy() {
        assert!(Highway::Motorway < Highway::Residential);
        assert!(Highway::Residential < Highway::Other("raceway".to_string()));
    }
}
