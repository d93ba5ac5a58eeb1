use crate::domain::{GeoCandidate, ScoreComponent, ScoreContribution, ScoredCandidate};
use std::cmp::Ordering;

const COUNTRY_BONUS: f64 = 30.0;
const TOKEN_MATCH_BONUS: f64 = 20.0;
const IMPORTANCE_WEIGHT: f64 = 25.0;

/// How administratively precise a candidate is, derived from the provider's
/// place classification. Falls back to the address-component map for opaque
/// classifications such as boundary/administrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceKind {
    Building,
    Street,
    Village,
    UrbanVillage,
    SubDistrict,
    City,
    Regency,
    Province,
    Unknown,
}

impl PlaceKind {
    pub fn from_candidate(candidate: &GeoCandidate) -> Self {
        if let Some(kind) = Self::from_classification(
            candidate.class.as_deref(),
            candidate.place_type.as_deref(),
        ) {
            return kind;
        }
        Self::from_address_components(candidate)
    }

    fn from_classification(class: Option<&str>, place_type: Option<&str>) -> Option<Self> {
        if let Some(class) = class {
            match class {
                "building" | "shop" | "amenity" | "office" => return Some(PlaceKind::Building),
                "highway" => return Some(PlaceKind::Street),
                _ => {}
            }
        }
        match place_type? {
            "house" | "building" | "apartments" | "residential" => Some(PlaceKind::Building),
            "road" | "street" => Some(PlaceKind::Street),
            "village" | "hamlet" => Some(PlaceKind::Village),
            "suburb" | "neighbourhood" | "quarter" => Some(PlaceKind::UrbanVillage),
            "city_district" | "district" | "subdistrict" => Some(PlaceKind::SubDistrict),
            "city" | "town" => Some(PlaceKind::City),
            "county" | "regency" => Some(PlaceKind::Regency),
            "state" | "province" => Some(PlaceKind::Province),
            _ => None,
        }
    }

    /// Boundary results report type "administrative"; the address map still
    /// reveals the most specific level present.
    fn from_address_components(candidate: &GeoCandidate) -> Self {
        let has = |key: &str| candidate.address.contains_key(key);
        if has("house_number") || has("building") || has("shop") || has("amenity") {
            PlaceKind::Building
        } else if has("village") || has("hamlet") {
            PlaceKind::Village
        } else if has("suburb") || has("neighbourhood") {
            PlaceKind::UrbanVillage
        } else if has("city_district") || has("district") {
            PlaceKind::SubDistrict
        } else if has("city") || has("town") {
            PlaceKind::City
        } else if has("county") {
            PlaceKind::Regency
        } else if has("state") {
            PlaceKind::Province
        } else {
            PlaceKind::Unknown
        }
    }
}

/// Hard filter: a candidate whose country does not resolve to Indonesia is
/// excluded from consideration entirely, never merely penalized.
pub fn is_in_country(candidate: &GeoCandidate) -> bool {
    if let Some(code) = candidate.address.get("country_code") {
        return code.eq_ignore_ascii_case("id");
    }
    if let Some(country) = candidate.address.get("country") {
        return country.to_lowercase().contains("indonesia");
    }
    candidate.display_name.to_lowercase().contains("indonesia")
}

/// +20 for each normalized token found in the display name or equal to an
/// address-component value. Returns the match count alongside the bonus.
pub fn token_match_bonus(tokens: &[String], candidate: &GeoCandidate) -> (usize, f64) {
    let display = candidate.display_name.to_lowercase();
    let mut matched = 0;
    for token in tokens {
        let in_display = display.contains(token.as_str());
        let in_components = candidate
            .address
            .values()
            .any(|v| v.eq_ignore_ascii_case(token));
        if in_display || in_components {
            matched += 1;
        }
    }
    (matched, matched as f64 * TOKEN_MATCH_BONUS)
}

/// Extra reward for multi-level address agreement over single coincidental
/// word hits. Fires at three simultaneous matches and grows linearly with
/// the match count, capped at +30.
pub fn multi_token_bonus(matched: usize) -> f64 {
    if matched < 3 {
        return 0.0;
    }
    (15.0 + 5.0 * (matched as f64 - 3.0)).min(30.0)
}

/// Specificity bonus: the more precise the administrative level, the higher
/// the reward.
pub fn specificity_bonus(kind: PlaceKind) -> f64 {
    match kind {
        PlaceKind::Village => 40.0,
        PlaceKind::UrbanVillage => 35.0,
        PlaceKind::SubDistrict => 30.0,
        PlaceKind::City => 20.0,
        PlaceKind::Regency => 15.0,
        PlaceKind::Province => 10.0,
        PlaceKind::Building | PlaceKind::Street | PlaceKind::Unknown => 0.0,
    }
}

/// Bonus for tokens that exactly equal an address-component value, graded by
/// the component's administrative level and accumulated across components.
pub fn exact_match_bonus(tokens: &[String], candidate: &GeoCandidate) -> f64 {
    let mut bonus = 0.0;
    for token in tokens {
        for (key, value) in &candidate.address {
            if !value.eq_ignore_ascii_case(token) {
                continue;
            }
            bonus += match key.as_str() {
                "village" | "hamlet" | "suburb" | "neighbourhood" => 35.0,
                "city_district" | "district" => 30.0,
                "city" | "town" | "county" | "state" => 25.0,
                _ => 0.0,
            };
        }
    }
    bonus
}

pub fn importance_bonus(importance: f64) -> f64 {
    importance * IMPORTANCE_WEIGHT
}

fn score_one(tokens: &[String], candidate: GeoCandidate, provider_rank: usize) -> ScoredCandidate {
    let (matched, token_bonus) = token_match_bonus(tokens, &candidate);
    let specificity = specificity_bonus(PlaceKind::from_candidate(&candidate));

    let weighted = [
        (ScoreComponent::Country, COUNTRY_BONUS),
        (ScoreComponent::TokenMatch, token_bonus),
        (ScoreComponent::MultiToken, multi_token_bonus(matched)),
        (ScoreComponent::Specificity, specificity),
        (
            ScoreComponent::ExactMatch,
            exact_match_bonus(tokens, &candidate),
        ),
        (
            ScoreComponent::Importance,
            importance_bonus(candidate.importance),
        ),
    ];

    // Zero-point components are omitted from the audit trail
    let contributions: Vec<ScoreContribution> = weighted
        .into_iter()
        .filter(|(_, points)| *points != 0.0)
        .map(|(component, points)| ScoreContribution { component, points })
        .collect();
    let score = contributions.iter().map(|c| c.points).sum();

    ScoredCandidate {
        candidate,
        score,
        contributions,
        specificity,
        provider_rank,
    }
}

/// Rank the provider's candidates for a query. Out-of-country candidates are
/// dropped first; the rest are scored and sorted descending, ties broken by
/// specificity, then raw provider importance, then the provider's original
/// ranking. An empty return means no in-country candidate existed.
pub fn score_candidates(tokens: &[String], candidates: Vec<GeoCandidate>) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .enumerate()
        .filter(|(_, c)| is_in_country(c))
        .map(|(rank, c)| score_one(tokens, c, rank))
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(
                b.specificity
                    .partial_cmp(&a.specificity)
                    .unwrap_or(Ordering::Equal),
            )
            .then(
                b.candidate
                    .importance
                    .partial_cmp(&a.candidate.importance)
                    .unwrap_or(Ordering::Equal),
            )
            .then(a.provider_rank.cmp(&b.provider_rank))
    });

    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn candidate(
        display_name: &str,
        place_type: &str,
        importance: f64,
        address: &[(&str, &str)],
    ) -> GeoCandidate {
        GeoCandidate {
            latitude: -7.0,
            longitude: 110.0,
            display_name: display_name.to_string(),
            importance,
            class: Some("place".to_string()),
            place_type: Some(place_type.to_string()),
            address: address
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn village_beats_city_for_ampel_boyolali() {
        let tokens = tokens(&["ampel", "boyolali"]);
        let village = candidate(
            "Ampel, Boyolali, Jawa Tengah, Indonesia",
            "village",
            0.35,
            &[("country_code", "id")],
        );
        let city = candidate(
            "Boyolali, Jawa Tengah, Indonesia",
            "city",
            0.5,
            &[("country_code", "id")],
        );

        let scored = score_candidates(&tokens, vec![city, village]);
        assert_eq!(scored.len(), 2);

        // 30 country + 40 token match + 40 village specificity + 8.75 importance
        assert!((scored[0].score - 118.75).abs() < 1e-9);
        assert_eq!(scored[0].candidate.place_type.as_deref(), Some("village"));

        // 30 country + 20 token match + 20 city specificity + 12.5 importance
        assert!((scored[1].score - 82.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_country_candidates_are_excluded_entirely() {
        let tokens = tokens(&["jakarta"]);
        let foreign = candidate(
            "Jakarta, Monroe County, New York, United States",
            "hamlet",
            0.9,
            &[("country_code", "us"), ("country", "United States")],
        );
        let scored = score_candidates(&tokens, vec![foreign]);
        assert!(scored.is_empty());
    }

    #[test]
    fn multi_token_bonus_requires_three_matches() {
        assert_eq!(multi_token_bonus(0), 0.0);
        assert_eq!(multi_token_bonus(2), 0.0);
        assert_eq!(multi_token_bonus(3), 15.0);
        assert_eq!(multi_token_bonus(4), 20.0);
        assert_eq!(multi_token_bonus(6), 30.0);
        // Capped
        assert_eq!(multi_token_bonus(10), 30.0);
    }

    #[test]
    fn exact_component_matches_are_graded_by_level() {
        let tokens = tokens(&["ampel", "boyolali"]);
        let c = candidate(
            "Ampel, Boyolali, Jawa Tengah, Indonesia",
            "village",
            0.0,
            &[
                ("village", "Ampel"),
                ("county", "Boyolali"),
                ("state", "Jawa Tengah"),
                ("country_code", "id"),
            ],
        );
        // village exact +35, county exact +25
        assert_eq!(exact_match_bonus(&tokens, &c), 60.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let tokens = tokens(&["ampel", "boyolali", "jawa", "tengah"]);
        let candidates = vec![
            candidate(
                "Ampel, Boyolali, Jawa Tengah, Indonesia",
                "village",
                0.35,
                &[("village", "Ampel"), ("country_code", "id")],
            ),
            candidate(
                "Boyolali, Jawa Tengah, Indonesia",
                "county",
                0.42,
                &[("county", "Boyolali"), ("country_code", "id")],
            ),
            candidate(
                "Jawa Tengah, Indonesia",
                "state",
                0.61,
                &[("state", "Jawa Tengah"), ("country_code", "id")],
            ),
        ];

        let first = score_candidates(&tokens, candidates.clone());
        let second = score_candidates(&tokens, candidates);
        let scores =
            |v: &[ScoredCandidate]| v.iter().map(|s| (s.score, s.provider_rank)).collect::<Vec<_>>();
        assert_eq!(scores(&first), scores(&second));
    }

    #[test]
    fn ties_break_on_specificity_then_importance_then_rank() {
        let tokens = tokens(&["sidomulyo"]);
        // Same token match; specificity difference offset by importance so
        // totals are equal: village 40 + 0.0*25 == suburb 35 + 0.2*25
        let village = candidate(
            "Sidomulyo, Indonesia",
            "village",
            0.0,
            &[("country_code", "id")],
        );
        let suburb = candidate(
            "Sidomulyo, Indonesia",
            "suburb",
            0.2,
            &[("country_code", "id")],
        );
        let scored = score_candidates(&tokens, vec![suburb.clone(), village]);
        assert!((scored[0].score - scored[1].score).abs() < 1e-9);
        assert_eq!(scored[0].candidate.place_type.as_deref(), Some("village"));

        // Fully identical candidates keep the provider's original order
        let scored = score_candidates(&tokens, vec![suburb.clone(), suburb]);
        assert_eq!(scored[0].provider_rank, 0);
    }

    #[test]
    fn boundary_results_fall_back_to_address_components() {
        let c = GeoCandidate {
            latitude: -7.1,
            longitude: 110.4,
            display_name: "Ungaran Timur, Semarang, Jawa Tengah, Indonesia".to_string(),
            importance: 0.3,
            class: Some("boundary".to_string()),
            place_type: Some("administrative".to_string()),
            address: [
                ("city_district", "Ungaran Timur"),
                ("county", "Semarang"),
                ("country_code", "id"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        };
        assert_eq!(PlaceKind::from_candidate(&c), PlaceKind::SubDistrict);
        assert_eq!(specificity_bonus(PlaceKind::from_candidate(&c)), 30.0);
    }
}
