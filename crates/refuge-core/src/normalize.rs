//! Normalization of raw source records into canonical entities.
//!
//! Pure functions, no I/O. Raw tag maps stop here: downstream code only
//! ever sees [`Shelter`] and [`Disaster`].
//!
//! # Shelter classification
//!
//! First match wins:
//!
//! | Rule | Tags | Type |
//! |------|------|------|
//! | 1 | `emergency=assembly_point` or `building=emergency_shelter` | emergency |
//! | 2 | `amenity=community_centre` / `community_center` / `social_facility` | temporary |
//! | 3 | `building=civic` / `building=public` | long-term |
//! | 4 | anything else | temporary |
//!
//! # Severity
//!
//! `high` when magnitude ≥ 6.0, `medium` when ≥ 4.0, otherwise `low`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    format_decimal, Amenity, ContactInfo, Disaster, DisasterKind, QuakeRecord, RawElement,
    Severity, Shelter, ShelterType,
};

type Tags = BTreeMap<String, String>;

/// Keys scanned for a capacity figure, in priority order.
const CAPACITY_KEYS: [&str; 3] = ["capacity", "beds", "seats"];

/// Source tag → canonical amenity, for tags whose value must be `yes`.
const AMENITY_TAGS: [(&str, Amenity); 5] = [
    ("wheelchair", Amenity::WheelchairAccessible),
    ("internet_access", Amenity::Internet),
    ("toilets", Amenity::Restrooms),
    ("drinking_water", Amenity::Water),
    ("shower", Amenity::Showers),
];

// ============ Shelters ============

/// Classify a tagged element. Always resolves to a type: elements with none
/// of the recognized tags fall through to `temporary`.
pub fn classify_shelter(tags: &Tags) -> ShelterType {
    let emergency = tag(tags, "emergency");
    let amenity = tag(tags, "amenity");
    let building = tag(tags, "building");

    if emergency == Some("assembly_point") || building == Some("emergency_shelter") {
        ShelterType::Emergency
    } else if matches!(
        amenity,
        Some("community_centre" | "community_center" | "social_facility")
    ) {
        ShelterType::Temporary
    } else if matches!(building, Some("civic" | "public")) {
        ShelterType::LongTerm
    } else {
        ShelterType::Temporary
    }
}

/// Parse a capacity from heterogeneous strings like `"120"`, `"50-75 beds"`.
///
/// Scans `capacity`, `beds`, `seats` in order and takes the first token
/// before any whitespace or hyphen. A value that does not parse moves on to
/// the next key instead of aborting.
pub fn parse_capacity(tags: &Tags) -> Option<u32> {
    CAPACITY_KEYS.iter().find_map(|key| {
        let raw = tags.get(*key)?;
        let token = raw.split_whitespace().next()?.split('-').next()?;
        token.parse::<u32>().ok()
    })
}

/// Compose `"<number> <street>, <city>, <state>, <postcode>"` from
/// `addr:*` tags, omitting missing parts. `None` when nothing is present.
pub fn build_address(tags: &Tags) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    match (tag(tags, "addr:housenumber"), tag(tags, "addr:street")) {
        (Some(number), Some(street)) => parts.push(format!("{} {}", number, street)),
        (None, Some(street)) => parts.push(street.to_string()),
        _ => {}
    }
    for key in ["addr:city", "addr:state", "addr:postcode"] {
        if let Some(v) = tag(tags, key) {
            parts.push(v.to_string());
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

pub fn extract_amenities(tags: &Tags) -> BTreeSet<Amenity> {
    AMENITY_TAGS
        .iter()
        .filter(|(key, _)| match tag(tags, key) {
            Some("yes") => true,
            // internet_access carries the medium instead of a plain yes
            Some("wlan" | "wifi" | "wired" | "terminal") => *key == "internet_access",
            _ => false,
        })
        .map(|(_, amenity)| *amenity)
        .collect()
}

/// Contact details from `phone`/`website`/`email`, falling back to the
/// `contact:*` namespace. `None` when no field is present.
pub fn extract_contact(tags: &Tags) -> Option<ContactInfo> {
    let pick = |key: &str| {
        tag(tags, key)
            .or_else(|| tag(tags, &format!("contact:{}", key)))
            .map(str::to_string)
    };
    let contact = ContactInfo {
        phone: pick("phone"),
        website: pick("website"),
        email: pick("email"),
    };
    if contact.is_empty() {
        None
    } else {
        Some(contact)
    }
}

/// Human-readable summary used as the embedding input.
pub fn describe_shelter(name: &str, tags: &Tags, shelter_type: ShelterType) -> String {
    let mut sentences = vec![format!("{} is a {} shelter", name, shelter_type)];

    if let Some(amenity) = tag(tags, "amenity") {
        sentences.push(format!("classified as {}", amenity));
    }
    if let Some(description) = tag(tags, "description") {
        sentences.push(description.to_string());
    }
    if let Some(hours) = tag(tags, "opening_hours") {
        sentences.push(format!("Open {}", hours));
    }

    sentences.join(". ")
}

/// Map one raw element to a [`Shelter`]. Returns `None` when the element has
/// no resolvable point. The embedding is left unset.
pub fn normalize_element(element: &RawElement) -> Option<Shelter> {
    let location = element.position?;
    let tags = &element.tags;

    let shelter_type = classify_shelter(tags);
    let name = tag(tags, "name").unwrap_or("Unknown").to_string();
    let description = describe_shelter(&name, tags, shelter_type);

    Some(Shelter {
        id: format!("{}/{}", element.kind.as_str(), element.id),
        name,
        location,
        address: build_address(tags),
        shelter_type,
        capacity: parse_capacity(tags),
        amenities: extract_amenities(tags),
        contact_info: extract_contact(tags),
        description,
        embedding: None,
    })
}

/// Normalize a batch, dropping elements that cannot be mapped.
pub fn normalize_elements(elements: &[RawElement]) -> Vec<Shelter> {
    elements
        .iter()
        .filter_map(|el| {
            let shelter = normalize_element(el);
            if shelter.is_none() {
                debug!(id = el.id, kind = el.kind.as_str(), "dropping element without a position");
            }
            shelter
        })
        .collect()
}

fn tag<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

// ============ Disasters ============

/// Magnitude thresholds for severity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            high: 6.0,
            medium: 4.0,
        }
    }
}

impl SeverityThresholds {
    pub fn classify(&self, magnitude: f64) -> Severity {
        if magnitude >= self.high {
            Severity::High
        } else if magnitude >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// `"Magnitude 6.1 earthquake occurred in <place> - This is considered a
/// strong earthquake"`. Magnitude and place appear verbatim.
pub fn describe_quake(magnitude: f64, place: &str, thresholds: &SeverityThresholds) -> String {
    let mut text = format!(
        "Magnitude {} earthquake occurred in {}",
        format_decimal(magnitude),
        place
    );
    match thresholds.classify(magnitude) {
        Severity::High => text.push_str(" - This is considered a strong earthquake"),
        Severity::Medium => text.push_str(" - This is a moderate earthquake"),
        Severity::Low => {}
    }
    text
}

/// Map a seismic record to a [`Disaster`]. Returns `None` for a non-finite
/// magnitude or an out-of-range timestamp.
pub fn normalize_quake(record: &QuakeRecord, thresholds: &SeverityThresholds) -> Option<Disaster> {
    if !record.magnitude.is_finite() {
        return None;
    }
    let time = DateTime::from_timestamp_millis(record.time_ms)?;

    Some(Disaster {
        kind: DisasterKind::Earthquake,
        place: record.place.clone(),
        magnitude: record.magnitude,
        coordinates: record.coordinates,
        time,
        description: describe_quake(record.magnitude, &record.place, thresholds),
        severity: thresholds.classify(record.magnitude),
    })
}

pub fn normalize_quakes(records: &[QuakeRecord], thresholds: &SeverityThresholds) -> Vec<Disaster> {
    records
        .iter()
        .filter_map(|r| {
            let disaster = normalize_quake(r, thresholds);
            if disaster.is_none() {
                debug!(place = %r.place, time_ms = r.time_ms, "dropping malformed quake record");
            }
            disaster
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ElementKind, GeoPoint};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn element(pairs: &[(&str, &str)]) -> RawElement {
        RawElement {
            kind: ElementKind::Node,
            id: 42,
            position: Some(GeoPoint::new(-73.99, 40.73)),
            tags: tags(pairs),
        }
    }

    #[test]
    fn test_emergency_beats_community_centre() {
        let t = tags(&[("emergency", "assembly_point"), ("amenity", "community_centre")]);
        assert_eq!(classify_shelter(&t), ShelterType::Emergency);
    }

    #[test]
    fn test_classification_rules() {
        assert_eq!(
            classify_shelter(&tags(&[("building", "emergency_shelter")])),
            ShelterType::Emergency
        );
        assert_eq!(
            classify_shelter(&tags(&[("amenity", "social_facility"), ("building", "civic")])),
            ShelterType::Temporary
        );
        assert_eq!(
            classify_shelter(&tags(&[("building", "public")])),
            ShelterType::LongTerm
        );
        assert_eq!(
            classify_shelter(&tags(&[("leisure", "community_centre")])),
            ShelterType::Temporary
        );
        assert_eq!(classify_shelter(&Tags::new()), ShelterType::Temporary);
    }

    #[test]
    fn test_capacity_range_takes_lower_bound() {
        assert_eq!(parse_capacity(&tags(&[("capacity", "50-75 beds")])), Some(50));
        assert_eq!(parse_capacity(&tags(&[("capacity", "120")])), Some(120));
    }

    #[test]
    fn test_capacity_falls_through_keys() {
        assert_eq!(
            parse_capacity(&tags(&[("capacity", "n/a"), ("beds", "30")])),
            Some(30)
        );
        assert_eq!(
            parse_capacity(&tags(&[("capacity", "n/a"), ("beds", "many"), ("seats", "200 seats")])),
            Some(200)
        );
        assert_eq!(parse_capacity(&tags(&[("capacity", "n/a")])), None);
        assert_eq!(parse_capacity(&tags(&[("capacity", "")])), None);
        assert_eq!(parse_capacity(&tags(&[("capacity", "-5")])), None);
    }

    #[test]
    fn test_address_composition() {
        let full = tags(&[
            ("addr:housenumber", "100"),
            ("addr:street", "Main St"),
            ("addr:city", "Springfield"),
            ("addr:state", "IL"),
            ("addr:postcode", "62701"),
        ]);
        assert_eq!(
            build_address(&full).as_deref(),
            Some("100 Main St, Springfield, IL, 62701")
        );

        let partial = tags(&[("addr:street", "Main St"), ("addr:postcode", "62701")]);
        assert_eq!(build_address(&partial).as_deref(), Some("Main St, 62701"));

        assert_eq!(build_address(&tags(&[("addr:housenumber", "9")])), None);
        assert_eq!(build_address(&Tags::new()), None);
    }

    #[test]
    fn test_amenities_and_contact() {
        let t = tags(&[
            ("wheelchair", "yes"),
            ("toilets", "no"),
            ("internet_access", "wlan"),
            ("shower", "yes"),
            ("contact:phone", "+1 555 0100"),
        ]);
        let amenities = extract_amenities(&t);
        assert!(amenities.contains(&Amenity::WheelchairAccessible));
        assert!(amenities.contains(&Amenity::Internet));
        assert!(amenities.contains(&Amenity::Showers));
        assert!(!amenities.contains(&Amenity::Restrooms));

        let contact = extract_contact(&t).unwrap();
        assert_eq!(contact.phone.as_deref(), Some("+1 555 0100"));
        assert!(contact.website.is_none());
        assert!(extract_contact(&Tags::new()).is_none());
    }

    #[test]
    fn test_normalize_element_full() {
        let el = element(&[
            ("name", "Eastside Community Center"),
            ("amenity", "community_centre"),
            ("opening_hours", "Mo-Fr 09:00-17:00"),
            ("capacity", "250"),
        ]);
        let shelter = normalize_element(&el).unwrap();
        assert_eq!(shelter.id, "node/42");
        assert_eq!(shelter.shelter_type, ShelterType::Temporary);
        assert_eq!(shelter.capacity, Some(250));
        assert_eq!(
            shelter.description,
            "Eastside Community Center is a temporary shelter. classified as community_centre. Open Mo-Fr 09:00-17:00"
        );
        assert!(shelter.embedding.is_none());
        assert!(shelter.address.is_none());
    }

    #[test]
    fn test_normalize_element_defaults_name() {
        let shelter = normalize_element(&element(&[("building", "civic")])).unwrap();
        assert_eq!(shelter.name, "Unknown");
        assert_eq!(shelter.shelter_type, ShelterType::LongTerm);
    }

    #[test]
    fn test_element_without_position_dropped() {
        let mut el = element(&[("amenity", "community_centre")]);
        el.position = None;
        assert!(normalize_element(&el).is_none());
        assert!(normalize_elements(&[el]).is_empty());
    }

    #[test]
    fn test_severity_boundaries() {
        let th = SeverityThresholds::default();
        let got: Vec<Severity> = [3.9, 4.0, 5.9, 6.0, 9.1]
            .iter()
            .map(|m| th.classify(*m))
            .collect();
        assert_eq!(
            got,
            vec![
                Severity::Low,
                Severity::Medium,
                Severity::Medium,
                Severity::High,
                Severity::High
            ]
        );
    }

    #[test]
    fn test_reconfigured_thresholds() {
        let th = SeverityThresholds {
            high: 5.0,
            medium: 3.0,
        };
        assert_eq!(th.classify(5.0), Severity::High);
        assert_eq!(th.classify(3.5), Severity::Medium);
    }

    #[test]
    fn test_normalize_quake() {
        let record = QuakeRecord {
            magnitude: 6.2,
            coordinates: GeoPoint::new(-117.6, 35.7),
            time_ms: 1_700_000_000_000,
            place: "Ridgecrest, California".into(),
        };
        let d = normalize_quake(&record, &SeverityThresholds::default()).unwrap();
        assert_eq!(d.severity, Severity::High);
        assert_eq!(d.time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(
            d.description,
            "Magnitude 6.2 earthquake occurred in Ridgecrest, California - This is considered a strong earthquake"
        );
    }

    #[test]
    fn test_quake_description_low_has_no_suffix() {
        let text = describe_quake(2.0, "Nowhere", &SeverityThresholds::default());
        assert_eq!(text, "Magnitude 2.0 earthquake occurred in Nowhere");
    }

    #[test]
    fn test_malformed_quakes_dropped() {
        let ok = QuakeRecord {
            magnitude: 4.5,
            coordinates: GeoPoint::new(0.0, 0.0),
            time_ms: 0,
            place: "A".into(),
        };
        let nan = QuakeRecord {
            magnitude: f64::NAN,
            ..ok.clone()
        };
        let bad_time = QuakeRecord {
            time_ms: i64::MAX,
            ..ok.clone()
        };
        let out = normalize_quakes(&[ok, nan, bad_time], &SeverityThresholds::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Medium);
    }
}
