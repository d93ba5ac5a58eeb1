use crate::constants::{
    INDONESIA_LAT_MAX, INDONESIA_LAT_MIN, INDONESIA_LNG_MAX, INDONESIA_LNG_MIN,
};
use crate::domain::{Confidence, GeoCandidate};
use crate::scoring::PlaceKind;

/// Verdict on the winning candidate's coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validation {
    InBounds(Confidence),
    OutOfBounds { latitude: f64, longitude: f64 },
}

pub fn in_bounds(latitude: f64, longitude: f64) -> bool {
    (INDONESIA_LAT_MIN..=INDONESIA_LAT_MAX).contains(&latitude)
        && (INDONESIA_LNG_MIN..=INDONESIA_LNG_MAX).contains(&longitude)
}

/// Confidence tier by how administratively precise the match is. Address
/// components carrying building-level markers win over the coarser place
/// classification.
pub fn derive_confidence(candidate: &GeoCandidate) -> Confidence {
    let has = |key: &str| candidate.address.contains_key(key);
    if has("house_number") || has("building") || has("shop") || has("amenity") {
        return Confidence::High;
    }

    match PlaceKind::from_candidate(candidate) {
        PlaceKind::Building => Confidence::High,
        PlaceKind::Street
        | PlaceKind::Village
        | PlaceKind::UrbanVillage
        | PlaceKind::SubDistrict => Confidence::Medium,
        PlaceKind::City | PlaceKind::Regency | PlaceKind::Province | PlaceKind::Unknown => {
            Confidence::Low
        }
    }
}

/// Reject coordinates outside Indonesia's bounding envelope regardless of
/// score; identically named places abroad must never be persisted.
pub fn validate(candidate: &GeoCandidate) -> Validation {
    if !in_bounds(candidate.latitude, candidate.longitude) {
        return Validation::OutOfBounds {
            latitude: candidate.latitude,
            longitude: candidate.longitude,
        };
    }
    Validation::InBounds(derive_confidence(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn candidate(latitude: f64, longitude: f64, place_type: &str) -> GeoCandidate {
        GeoCandidate {
            latitude,
            longitude,
            display_name: "Somewhere, Indonesia".to_string(),
            importance: 0.2,
            class: Some("place".to_string()),
            place_type: Some(place_type.to_string()),
            address: BTreeMap::new(),
        }
    }

    #[test]
    fn bounding_envelope() {
        assert!(in_bounds(-7.45, 110.62));
        assert!(in_bounds(-11.0, 95.0));
        assert!(in_bounds(6.0, 141.0));
        // Monroe County, New York
        assert!(!in_bounds(43.16, -77.61));
        assert!(!in_bounds(-11.01, 110.0));
        assert!(!in_bounds(-7.0, 141.5));
    }

    #[test]
    fn out_of_bounds_candidate_is_rejected() {
        let c = candidate(43.16, -77.61, "village");
        assert_eq!(
            validate(&c),
            Validation::OutOfBounds {
                latitude: 43.16,
                longitude: -77.61
            }
        );
    }

    #[test]
    fn village_level_is_medium() {
        assert_eq!(validate(&candidate(-7.45, 110.62, "village")), Validation::InBounds(Confidence::Medium));
        assert_eq!(validate(&candidate(-7.45, 110.62, "suburb")), Validation::InBounds(Confidence::Medium));
        assert_eq!(validate(&candidate(-7.45, 110.62, "city_district")), Validation::InBounds(Confidence::Medium));
    }

    #[test]
    fn city_and_coarser_is_low() {
        assert_eq!(validate(&candidate(-7.45, 110.62, "city")), Validation::InBounds(Confidence::Low));
        assert_eq!(validate(&candidate(-7.45, 110.62, "county")), Validation::InBounds(Confidence::Low));
        assert_eq!(validate(&candidate(-7.45, 110.62, "state")), Validation::InBounds(Confidence::Low));
    }

    #[test]
    fn building_markers_are_high() {
        let mut c = candidate(-7.45, 110.62, "village");
        c.address
            .insert("house_number".to_string(), "12".to_string());
        assert_eq!(validate(&c), Validation::InBounds(Confidence::High));

        let c = candidate(-7.45, 110.62, "house");
        assert_eq!(validate(&c), Validation::InBounds(Confidence::High));
    }
}
