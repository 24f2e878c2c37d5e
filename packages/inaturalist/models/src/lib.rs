#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! iNaturalist API payload types.
//!
//! Read types mirror the v1 JSON API (`api.inaturalist.org/v1`); only the
//! fields the sync needs are declared, everything else is ignored. Write
//! types mirror the legacy `observations.json` endpoints, which are the ones
//! that accept observation field values on create.

use serde::{Deserialize, Serialize};

/// Evidence value marking a nest.
pub const EVIDENCE_NEST: &str = "nest";

/// Evidence value marking an individual.
pub const EVIDENCE_INDIVIDUAL: &str = "individual";

// ── Read API ─────────────────────────────────────────────────────────────

/// A page of observations from `GET /v1/observations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservationPage {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub results: Vec<InatObservation>,
}

/// One observation as returned by the v1 API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InatObservation {
    pub id: i64,
    /// Exact observation instant, when the observer gave a time.
    #[serde(default)]
    pub time_observed_at: Option<String>,
    /// Date/time as typed by the observer.
    #[serde(default)]
    pub observed_on_string: Option<String>,
    #[serde(default)]
    pub observed_on_details: Option<ObservedOnDetails>,
    /// IANA zone the observer's naive times are written in.
    #[serde(default)]
    pub observed_time_zone: Option<String>,
    /// `[longitude, latitude]` point.
    #[serde(default)]
    pub geojson: Option<PointGeometry>,
    #[serde(default)]
    pub place_guess: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Current (observation) taxon.
    #[serde(default)]
    pub taxon: Option<InatTaxon>,
    /// Taxon agreed on by the community, if there is consensus.
    #[serde(default)]
    pub community_taxon_id: Option<i64>,
    #[serde(default)]
    pub quality_grade: Option<String>,
    /// Observation field values.
    #[serde(default)]
    pub ofvs: Vec<ObservationFieldValue>,
    #[serde(default)]
    pub photos: Vec<InatPhoto>,
}

/// Broken-down observation date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObservedOnDetails {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub hour: Option<u32>,
}

/// A `GeoJSON` point.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PointGeometry {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// A taxon reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InatTaxon {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// An observation field value. Values arrive as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ObservationFieldValue {
    pub field_id: i64,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ObservationFieldValue {
    /// Returns the value as text, whatever its JSON type.
    #[must_use]
    pub fn value_text(&self) -> Option<String> {
        match &self.value {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// A photo attached to an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InatPhoto {
    pub id: i64,
    /// Square thumbnail URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl InatPhoto {
    /// Medium-size variant of the photo URL.
    #[must_use]
    pub fn medium_url(&self) -> Option<String> {
        self.url.as_ref().map(|u| u.replacen("/square.", "/medium.", 1))
    }
}

impl InatObservation {
    /// Looks up an observation field value by field ID.
    #[must_use]
    pub fn field_value(&self, field_id: i64) -> Option<String> {
        self.ofvs
            .iter()
            .find(|ofv| ofv.field_id == field_id)
            .and_then(ObservationFieldValue::value_text)
    }

    /// Returns `(latitude, longitude)` from the point geometry.
    #[must_use]
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        match self.geojson.as_ref()?.coordinates.as_slice() {
            [lon, lat, ..] => Some((*lat, *lon)),
            _ => None,
        }
    }
}

/// Response of `POST /oauth/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// One element of the `POST /observations.json` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedObservation {
    pub id: i64,
}

// ── Write API ────────────────────────────────────────────────────────────

/// Request body for `POST /oauth/token` (resource owner password grant).
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub grant_type: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

/// An observation field value to set on push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValueAttribute {
    pub observation_field_id: i64,
    pub value: String,
}

/// Observation fields sent on create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushObservation {
    /// Only sent on create; the community owns the identification after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxon_id: Option<i64>,
    pub observed_on_string: String,
    pub time_zone: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub place_guess: String,
    pub observation_field_values_attributes: Vec<FieldValueAttribute>,
}

/// Body of `POST /observations.json`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest<'a> {
    pub observation: &'a PushObservation,
}

/// Body of `PUT /observations/{id}.json`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRequest<'a> {
    /// Existing photos are left alone.
    pub ignore_photos: u8,
    pub observation: &'a PushObservation,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "total_results": 1,
        "page": 1,
        "per_page": 200,
        "results": [{
            "id": 18166477,
            "observed_on_string": "2018-11-09 12:30:00",
            "time_observed_at": "2018-11-09T12:30:00+01:00",
            "observed_on_details": {"date": "2018-11-09", "year": 2018, "month": 11, "day": 9, "hour": 12},
            "geojson": {"type": "Point", "coordinates": [4.3588, 50.8466]},
            "place_guess": "Brussel",
            "description": null,
            "taxon": {"id": 119019, "name": "Vespa velutina", "rank": "species"},
            "community_taxon_id": 119019,
            "quality_grade": "research",
            "ofvs": [
                {"field_id": 9613, "value": "42"},
                {"field_id": 9770, "value": "nest"},
                {"field_id": 1, "value": 3}
            ],
            "photos": [{"id": 5, "url": "https://static.inaturalist.org/photos/5/square.jpg"}],
            "user": {"login": "someone"}
        }]
    }"#;

    #[test]
    fn parses_v1_page() {
        let page: ObservationPage = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(page.total_results, 1);
        let obs = &page.results[0];
        assert_eq!(obs.id, 18_166_477);
        assert_eq!(obs.taxon.as_ref().map(|t| t.id), Some(119_019));
        assert_eq!(obs.lat_lon(), Some((50.8466, 4.3588)));
        assert_eq!(obs.field_value(9770).as_deref(), Some("nest"));
        assert_eq!(obs.field_value(1).as_deref(), Some("3"));
        assert_eq!(obs.field_value(2), None);
        assert_eq!(
            obs.photos[0].medium_url().as_deref(),
            Some("https://static.inaturalist.org/photos/5/medium.jpg")
        );
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let obs: InatObservation = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(obs.lat_lon().is_none());
        assert!(obs.ofvs.is_empty());
    }

    #[test]
    fn create_body_omits_absent_taxon() {
        let push = PushObservation {
            taxon_id: None,
            observed_on_string: "2024-05-01T10:00:00+00:00".to_string(),
            time_zone: "Brussels".to_string(),
            description: String::new(),
            latitude: 50.0,
            longitude: 4.0,
            place_guess: "Gent".to_string(),
            observation_field_values_attributes: vec![FieldValueAttribute {
                observation_field_id: 9613,
                value: "7".to_string(),
            }],
        };
        let body = serde_json::to_value(UpdateRequest {
            ignore_photos: 1,
            observation: &push,
        })
        .unwrap();
        assert!(body["observation"].get("taxon_id").is_none());
        assert_eq!(body["ignore_photos"], 1);
        assert_eq!(
            body["observation"]["observation_field_values_attributes"][0]["value"],
            "7"
        );
    }
}
