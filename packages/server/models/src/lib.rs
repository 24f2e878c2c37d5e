#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the Vespa-Watch server.
//!
//! These types are serialized to JSON for the browser widgets. They are
//! separate from the database row types so the API contract can evolve
//! independently of the schema.

pub mod config;
pub mod forms;
pub mod viewer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vespawatch_database_models::{
    BoundingBox, ManagementActionRow, ObservationQuery, ObservationRow, PictureRow, UserRow,
    ZoneRow,
};
use vespawatch_observation_models::{Choice, ObservationKind};

use crate::forms::FieldErrors;
use crate::viewer::Viewer;

/// Public URL prefix of uploaded media.
pub const MEDIA_URL: &str = "/media/";

/// Public URL of a stored picture path. Pictures pulled from iNaturalist
/// are stored by their remote URL and returned unchanged.
#[must_use]
pub fn media_url(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{MEDIA_URL}{}", path.trim_start_matches('/'))
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// One entry of a choice list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiChoice {
    pub value: String,
    pub label: String,
}

/// All values of a choice enumeration, in display order.
#[must_use]
pub fn choices<C: Choice>() -> Vec<ApiChoice> {
    C::all()
        .iter()
        .map(|c| ApiChoice {
            value: c.code().to_string(),
            label: c.label().to_string(),
        })
        .collect()
}

// ── Observations ────────────────────────────────────────────────

/// Observer contact details, only shown to staff and zone users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiObserver {
    pub observer_name: Option<String>,
    pub observer_email: Option<String>,
    pub observer_phone: Option<String>,
    pub observer_is_beekeeper: Option<bool>,
}

/// Management action summary carried by every nest. `action` is empty and
/// `actionCode` null while the nest has no action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNestAction {
    pub action: String,
    pub action_code: Option<String>,
    pub action_id: Option<i64>,
}

/// An observation as returned by the API.
///
/// `inaturalist_id` and `observation_time` keep their snake-case names;
/// the map and list widgets read them that way.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiObservation {
    pub id: i64,
    /// `individual` or `nest`.
    pub subject: &'static str,
    pub species: String,
    pub taxon_id: Option<i64>,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "inaturalist_id")]
    pub inaturalist_id: Option<i64>,
    pub inat_vv_confirmed: Option<bool>,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "observation_time")]
    pub observation_time: i64,
    pub comments: String,
    /// Left out when the caller asked for `includePictures=false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    pub zone: Option<String>,
    pub originates_in_vespawatch: bool,
    /// Nests only.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub nest_action: Option<ApiNestAction>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub observer: Option<ApiObserver>,
}

impl ApiObservation {
    /// Converts a row for `viewer`, hiding contact details they may not see.
    #[must_use]
    pub fn from_row(row: ObservationRow, viewer: &Viewer) -> Self {
        let species = row.species_name();

        let observer = viewer.sees_observer_contact().then(|| ApiObserver {
            observer_name: row.observer.name.clone(),
            observer_email: row.observer.email.clone(),
            observer_phone: row.observer.phone.clone(),
            observer_is_beekeeper: row.observer.is_beekeeper,
        });

        let nest_action = (row.kind == ObservationKind::Nest).then(|| ApiNestAction {
            action: row
                .action_result
                .map(|r| r.label().to_string())
                .unwrap_or_default(),
            action_code: row.action_result.map(|r| r.code().to_string()),
            action_id: row.action_id,
        });

        Self {
            id: row.id,
            subject: row.kind.subject(),
            species,
            taxon_id: row.taxon_id,
            location: row.location,
            latitude: row.latitude,
            longitude: row.longitude,
            inaturalist_id: row.inaturalist_id,
            inat_vv_confirmed: row.inat_vv_confirmed,
            observation_time: row.observation_time.timestamp_millis(),
            comments: row.comments,
            image_urls: Some(row.picture_paths.iter().map(|p| media_url(p)).collect()),
            zone: row.zone_name,
            originates_in_vespawatch: row.originates_in_vespawatch,
            nest_action,
            observer,
        }
    }

    /// Drops the picture URLs.
    #[must_use]
    pub fn without_pictures(self) -> Self {
        Self {
            image_urls: None,
            ..self
        }
    }
}

/// Column-level view of an observation returned for `light=true`: stored
/// values only, no derived labels, pictures or contact details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightObservation {
    pub id: i64,
    pub kind: &'static str,
    pub taxon: Option<i64>,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observation_time: DateTime<Utc>,
    pub inaturalist_id: Option<i64>,
    pub inat_vv_confirmed: Option<bool>,
    pub originates_in_vespawatch: bool,
    pub zone: Option<i64>,
}

impl From<&ObservationRow> for LightObservation {
    fn from(row: &ObservationRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind.code(),
            taxon: row.taxon_id,
            location: row.location.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
            observation_time: row.observation_time,
            inaturalist_id: row.inaturalist_id,
            inat_vv_confirmed: row.inat_vv_confirmed,
            originates_in_vespawatch: row.originates_in_vespawatch,
            zone: row.zone_id,
        }
    }
}

/// `GET /api/individuals` response.
#[derive(Debug, Serialize)]
pub struct IndividualsResponse<T> {
    pub individuals: Vec<T>,
}

/// `GET /api/nests` response.
#[derive(Debug, Serialize)]
pub struct NestsResponse<T> {
    pub nests: Vec<T>,
}

/// `GET /api/observations` response.
#[derive(Debug, Serialize)]
pub struct ObservationsResponse<T> {
    pub observations: Vec<T>,
}

const fn default_true() -> bool {
    true
}

/// Query parameters for the observation list endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationQueryParams {
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Start of the time window (ISO 8601).
    pub from: Option<DateTime<Utc>>,
    /// End of the time window (ISO 8601).
    pub to: Option<DateTime<Utc>>,
    /// Bounding box as `west,south,east,north`.
    pub bbox: Option<String>,
    /// Only observations of the tracked target species.
    #[serde(default)]
    pub vv_only: bool,
    /// Only nests whose iNaturalist community identification confirms
    /// the target species.
    #[serde(default)]
    pub confirmed_only: bool,
    /// Only observations in this zone.
    pub zone_id: Option<i64>,
    /// Only observations inside any fire-brigade zone.
    #[serde(default)]
    pub fl_only: bool,
    /// Include `imageUrls` in the full representation.
    #[serde(default = "default_true")]
    pub include_pictures: bool,
    /// Return [`LightObservation`]s instead of [`ApiObservation`]s.
    #[serde(default)]
    pub light: bool,
}

impl Default for ObservationQueryParams {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
            from: None,
            to: None,
            bbox: None,
            vv_only: false,
            confirmed_only: false,
            zone_id: None,
            fl_only: false,
            include_pictures: true,
            light: false,
        }
    }
}

impl ObservationQueryParams {
    /// Builds the database query for `kind` (`None` for both kinds).
    /// `confirmedOnly` only applies to nests.
    ///
    /// # Errors
    ///
    /// Returns a `bbox` field error when the bounding box is malformed.
    pub fn to_query(
        &self,
        kind: Option<ObservationKind>,
    ) -> Result<ObservationQuery, FieldErrors> {
        let bbox = match self.bbox.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(BoundingBox::parse(raw).ok_or_else(|| {
                let mut errors = FieldErrors::new();
                errors.add(
                    "bbox",
                    "Enter four comma-separated coordinates: west,south,east,north.",
                );
                errors
            })?),
        };

        Ok(ObservationQuery {
            kind,
            bbox,
            from: self.from,
            to: self.to,
            vv_only: self.vv_only,
            confirmed_only: self.confirmed_only && kind == Some(ObservationKind::Nest),
            zone_id: self.zone_id,
            in_any_zone: self.fl_only,
            originates_in_vespawatch: None,
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        })
    }
}

/// Response to a successful observation create or update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSaved {
    pub id: i64,
    pub zone: Option<String>,
}

// ── Management actions ──────────────────────────────────────────

/// A management action as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiManagementAction {
    pub id: i64,
    pub nest_id: i64,
    pub action_time: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub number_of_persons: Option<i32>,
    pub comments: String,
    pub result: String,
    pub result_display: String,
    pub method: Option<String>,
    pub product: Option<String>,
    pub aftercare: Option<String>,
    pub nest_site: Option<String>,
    pub nest_type: Option<String>,
    pub problems: Vec<String>,
    pub person_name: Option<String>,
}

impl From<ManagementActionRow> for ApiManagementAction {
    fn from(row: ManagementActionRow) -> Self {
        Self {
            id: row.id,
            nest_id: row.nest_id,
            action_time: row.action_time,
            duration_minutes: row.duration_minutes,
            number_of_persons: row.number_of_persons,
            comments: row.comments,
            result: row.result.code().to_string(),
            result_display: row.result.label().to_string(),
            method: row.method.map(|c| c.code().to_string()),
            product: row.product.map(|c| c.code().to_string()),
            aftercare: row.aftercare.map(|c| c.code().to_string()),
            nest_site: row.nest_site.map(|c| c.code().to_string()),
            nest_type: row.nest_type.map(|c| c.code().to_string()),
            problems: row.problems.iter().map(|p| p.code().to_string()).collect(),
            person_name: row.username,
        }
    }
}

/// `?action_id=` query of the action endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionIdParams {
    pub action_id: i64,
}

/// Response to a successful action save.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSaved {
    pub result: &'static str,
    pub action_id: i64,
}

// ── Pictures ────────────────────────────────────────────────────

/// `?filename=` query of the picture upload endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PictureUploadParams {
    pub filename: Option<String>,
}

/// Response to a picture upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PictureSaved {
    pub image_id: i64,
    #[serde(rename = "type")]
    pub picture_type: &'static str,
    pub name: String,
}

/// Picture metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPicture {
    pub id: i64,
    pub subject: &'static str,
    pub observation_id: Option<i64>,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<PictureRow> for ApiPicture {
    fn from(row: PictureRow) -> Self {
        Self {
            id: row.id,
            subject: row.kind.subject(),
            observation_id: row.observation_id,
            url: media_url(&row.path),
            created_at: row.created_at,
        }
    }
}

/// Name of the picture type reported after upload.
#[must_use]
pub const fn picture_type(kind: ObservationKind) -> &'static str {
    match kind {
        ObservationKind::Individual => "IndividualPicture",
        ObservationKind::Nest => "NestPicture",
    }
}

// ── Zones and users ─────────────────────────────────────────────

/// `?lat=&lon=` query of the zone lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneLookupParams {
    pub lat: f64,
    pub lon: f64,
}

/// A zone as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiZone {
    pub id: i64,
    pub name: String,
}

impl From<ZoneRow> for ApiZone {
    fn from(row: ZoneRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// The logged-in user, as returned by `/api/login` and `/api/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub zone_id: Option<i64>,
}

impl From<&UserRow> for ApiUser {
    fn from(user: &UserRow) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            zone_id: user.zone_id,
        }
    }
}

/// Response to a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: ApiUser,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use vespawatch_database_models::ObserverInfo;
    use vespawatch_observation_models::{ActionResult, NestSize};

    use super::*;

    fn nest_row() -> ObservationRow {
        ObservationRow {
            id: 12,
            kind: ObservationKind::Nest,
            taxon_id: Some(1),
            taxon_name: Some("Vespa velutina".to_string()),
            location: "Brugge".to_string(),
            observation_time: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            comments: "Hoog in de boom".to_string(),
            latitude: 51.2,
            longitude: 3.2,
            zone_id: Some(4),
            zone_name: Some("Zone West".to_string()),
            inaturalist_id: None,
            inaturalist_species: None,
            inat_vv_confirmed: None,
            originates_in_vespawatch: true,
            observer: ObserverInfo {
                name: Some("An".to_string()),
                email: Some("an@example.org".to_string()),
                phone: None,
                is_beekeeper: Some(false),
            },
            individual_count: None,
            behaviour: None,
            nest_height: None,
            nest_size: Some(NestSize::More25Cm),
            duplicate_of_id: None,
            action_result: Some(ActionResult::SuccessfullyTreated),
            action_id: Some(3),
            picture_paths: vec![
                "nest_pictures/abc.jpg".to_string(),
                "https://static.inaturalist.org/photos/1/medium.jpg".to_string(),
            ],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn anonymous_nest_json_has_no_contact_fields() {
        let json =
            serde_json::to_value(ApiObservation::from_row(nest_row(), &Viewer::anonymous()))
                .unwrap();

        assert_eq!(json["subject"], "nest");
        assert_eq!(json["species"], "Vespa velutina");
        assert_eq!(json["observation_time"], 1_719_792_000_000_i64);
        assert_eq!(json["action"], "Successfully treated");
        assert_eq!(json["actionCode"], "ST");
        assert_eq!(json["zone"], "Zone West");
        assert_eq!(
            json["imageUrls"],
            serde_json::json!([
                "/media/nest_pictures/abc.jpg",
                "https://static.inaturalist.org/photos/1/medium.jpg"
            ])
        );
        assert!(json.get("observerEmail").is_none());
    }

    #[test]
    fn staff_sees_contact_fields() {
        let staff = Viewer {
            user_id: Some(1),
            username: Some("admin".to_string()),
            role: viewer::Role::Staff,
        };
        let json = serde_json::to_value(ApiObservation::from_row(nest_row(), &staff)).unwrap();
        assert_eq!(json["observerEmail"], "an@example.org");
        assert_eq!(json["observerIsBeekeeper"], false);
    }

    #[test]
    fn individual_json_has_no_action() {
        let row = ObservationRow {
            kind: ObservationKind::Individual,
            inaturalist_species: Some("Vespa velutina nigrithorax".to_string()),
            ..nest_row()
        };
        let json = serde_json::to_value(ApiObservation::from_row(row, &Viewer::anonymous()))
            .unwrap();
        assert_eq!(json["subject"], "individual");
        assert_eq!(json["species"], "Vespa velutina nigrithorax");
        assert!(json.get("action").is_none());
        assert!(json.get("actionCode").is_none());
    }

    #[test]
    fn choices_carry_code_and_label() {
        let list = choices::<ActionResult>();
        assert_eq!(
            list.first(),
            Some(&ApiChoice {
                value: "ST".to_string(),
                label: "Successfully treated".to_string(),
            })
        );
        assert_eq!(list.len(), ActionResult::all().len());
    }

    #[test]
    fn nest_json_keys_match_widget_contract() {
        let json =
            serde_json::to_value(ApiObservation::from_row(nest_row(), &Viewer::anonymous()))
                .unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();

        assert_eq!(
            keys,
            [
                "action",
                "actionCode",
                "actionId",
                "comments",
                "id",
                "imageUrls",
                "inatVvConfirmed",
                "inaturalist_id",
                "latitude",
                "location",
                "longitude",
                "observation_time",
                "originatesInVespawatch",
                "species",
                "subject",
                "taxonId",
                "zone",
            ]
        );
    }

    #[test]
    fn nest_without_action_has_empty_action() {
        let row = ObservationRow {
            action_result: None,
            action_id: None,
            ..nest_row()
        };
        let json = serde_json::to_value(ApiObservation::from_row(row, &Viewer::anonymous()))
            .unwrap();
        assert_eq!(json["action"], "");
        assert!(json["actionCode"].is_null());
        assert!(json.get("actionCode").is_some());
    }

    #[test]
    fn pictures_can_be_left_out() {
        let json = serde_json::to_value(
            ApiObservation::from_row(nest_row(), &Viewer::anonymous()).without_pictures(),
        )
        .unwrap();
        assert!(json.get("imageUrls").is_none());
    }

    #[test]
    fn light_json_uses_stored_values() {
        let json = serde_json::to_value(LightObservation::from(&nest_row())).unwrap();
        assert_eq!(json["kind"], "NEST");
        assert_eq!(json["zone"], 4);
        assert!(json.get("species").is_none());
        assert!(json.get("imageUrls").is_none());
    }

    #[test]
    fn confirmed_only_applies_to_nests() {
        let params = ObservationQueryParams {
            confirmed_only: true,
            bbox: Some("2.5,50.6,5.9,51.5".to_string()),
            ..ObservationQueryParams::default()
        };

        assert!(params.to_query(Some(ObservationKind::Nest)).unwrap().confirmed_only);
        assert!(!params.to_query(Some(ObservationKind::Individual)).unwrap().confirmed_only);
        assert!(params.to_query(None).unwrap().bbox.is_some());
    }

    #[test]
    fn malformed_bbox_is_a_field_error() {
        for bbox in ["2.5,50.6,5.9", "2.5,50.6,5.9,51.5,7", "2.5,x,5.9,51.5"] {
            let params = ObservationQueryParams {
                bbox: Some(bbox.to_string()),
                ..ObservationQueryParams::default()
            };
            let errors = params.to_query(None).unwrap_err();
            assert!(errors.get("bbox").is_some(), "{bbox}");
        }

        let blank = ObservationQueryParams {
            bbox: Some("  ".to_string()),
            ..ObservationQueryParams::default()
        };
        assert!(blank.to_query(None).unwrap().bbox.is_none());
    }

    #[test]
    fn media_url_prefixes_local_paths() {
        assert_eq!(media_url("individual_pictures/x.png"), "/media/individual_pictures/x.png");
        assert_eq!(media_url("http://a/b.jpg"), "http://a/b.jpg");
    }
}
