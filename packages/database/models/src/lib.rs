#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `PostGIS` database. They are distinct from the API response types in
//! `vespawatch_server_models` and the iNaturalist payload types in
//! `vespawatch_inaturalist_models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vespawatch_observation_models::{
    ActionAftercare, ActionMethod, ActionProblem, ActionProduct, ActionResult, Behaviour,
    NestHeight, NestSite, NestSize, NestType, ObservationKind,
};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Parses a `"west,south,east,north"` string. Every one of the four
    /// parts must be a finite number in coordinate range.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect::<Option<Vec<f64>>>()?;

        let [west, south, east, north] = parts[..] else {
            return None;
        };

        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        (lon_ok(west) && lon_ok(east) && lat_ok(south) && lat_ok(north) && south <= north)
            .then(|| Self::new(west, south, east, north))
    }
}

/// Which observations a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    /// No spatial restriction.
    #[default]
    Everything,
    /// Only observations whose point lies inside the given zone polygon.
    Zone(i64),
}

/// Parameters for listing observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationQuery {
    /// Restrict to one kind.
    pub kind: Option<ObservationKind>,
    /// Spatial bounding box filter.
    pub bbox: Option<BoundingBox>,
    /// Minimum observation time.
    pub from: Option<DateTime<Utc>>,
    /// Maximum observation time.
    pub to: Option<DateTime<Utc>>,
    /// Only observations of the tracked target species.
    pub vv_only: bool,
    /// Only observations confirmed as the target species on iNaturalist.
    pub confirmed_only: bool,
    /// Only observations assigned to this zone.
    pub zone_id: Option<i64>,
    /// Only observations inside any imported zone.
    pub in_any_zone: bool,
    /// Filter on origin (`Some(true)` = created on this site).
    pub originates_in_vespawatch: Option<bool>,
    /// Maximum number of results, `None` for all.
    pub limit: Option<u32>,
    /// Number of results to skip.
    pub offset: u32,
}

/// A taxon (species) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonRow {
    /// Primary key.
    pub id: i64,
    /// Scientific name.
    pub name: String,
    /// Common name.
    pub vernacular_name: String,
    /// Whether this is the invasive species the site tracks.
    pub is_target: bool,
    /// iNaturalist taxon used when pushing observations.
    pub inaturalist_push_taxon_id: Option<i64>,
    /// iNaturalist taxa that reconcile to this taxon when pulling.
    pub inaturalist_pull_taxon_ids: Vec<i64>,
}

/// A fire-brigade zone row (without its geometry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRow {
    /// Primary key.
    pub id: i64,
    /// Zone name.
    pub name: String,
}

/// A zone with its boundary as a `GeoJSON` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneGeometryRow {
    /// Primary key.
    pub id: i64,
    /// Zone name.
    pub name: String,
    /// `MultiPolygon` geometry serialized as `GeoJSON`.
    pub geojson: String,
}

/// A user account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    /// Primary key.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: Option<String>,
    /// Encoded password hash.
    pub password_hash: String,
    /// Inactive users cannot log in.
    pub is_active: bool,
    /// Staff users see and manage everything.
    pub is_staff: bool,
    /// Superusers administer other users.
    pub is_superuser: bool,
    /// Zone for fire-brigade users.
    pub zone_id: Option<i64>,
}

/// Values for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Contact email.
    pub email: Option<String>,
    /// Encoded password hash.
    pub password_hash: String,
    /// Staff flag.
    pub is_staff: bool,
    /// Superuser flag.
    pub is_superuser: bool,
    /// Zone for fire-brigade users.
    pub zone_id: Option<i64>,
}

/// Contact details of the person who reported an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverInfo {
    /// Full name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Whether the observer keeps bees.
    pub is_beekeeper: Option<bool>,
}

/// Fields shared by inserts and updates of an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    /// Individual or nest.
    pub kind: ObservationKind,
    /// Identified taxon.
    pub taxon_id: Option<i64>,
    /// Free-text place description.
    pub location: String,
    /// When the observation was made.
    pub observation_time: DateTime<Utc>,
    /// Observer comments.
    pub comments: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Explicit zone; when `None` the zone is looked up from the point.
    pub zone_id: Option<i64>,
    /// Matching iNaturalist observation.
    pub inaturalist_id: Option<i64>,
    /// Species name as identified on iNaturalist.
    pub inaturalist_species: Option<String>,
    /// Whether iNaturalist confirms the target species.
    pub inat_vv_confirmed: Option<bool>,
    /// Created on this site rather than pulled from iNaturalist.
    pub originates_in_vespawatch: bool,
    /// Observer contact details.
    pub observer: ObserverInfo,
    /// Number of individuals seen.
    pub individual_count: Option<i32>,
    /// Behaviour of the individuals.
    pub behaviour: Option<Behaviour>,
    /// Nest height.
    pub nest_height: Option<NestHeight>,
    /// Nest size.
    pub nest_size: Option<NestSize>,
    /// Nest this one duplicates.
    pub duplicate_of_id: Option<i64>,
}

/// An observation row as retrieved from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    /// Primary key.
    pub id: i64,
    /// Individual or nest.
    pub kind: ObservationKind,
    /// Identified taxon.
    pub taxon_id: Option<i64>,
    /// Scientific name of the identified taxon.
    pub taxon_name: Option<String>,
    /// Free-text place description.
    pub location: String,
    /// When the observation was made.
    pub observation_time: DateTime<Utc>,
    /// Observer comments.
    pub comments: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Assigned zone.
    pub zone_id: Option<i64>,
    /// Name of the assigned zone.
    pub zone_name: Option<String>,
    /// Matching iNaturalist observation.
    pub inaturalist_id: Option<i64>,
    /// Species name as identified on iNaturalist.
    pub inaturalist_species: Option<String>,
    /// Whether iNaturalist confirms the target species.
    pub inat_vv_confirmed: Option<bool>,
    /// Created on this site rather than pulled from iNaturalist.
    pub originates_in_vespawatch: bool,
    /// Observer contact details.
    pub observer: ObserverInfo,
    /// Number of individuals seen.
    pub individual_count: Option<i32>,
    /// Behaviour of the individuals.
    pub behaviour: Option<Behaviour>,
    /// Nest height.
    pub nest_height: Option<NestHeight>,
    /// Nest size.
    pub nest_size: Option<NestSize>,
    /// Nest this one duplicates.
    pub duplicate_of_id: Option<i64>,
    /// Result of the management action on this nest, if any.
    pub action_result: Option<ActionResult>,
    /// Management action on this nest, if any.
    pub action_id: Option<i64>,
    /// Attached picture paths (relative to the media root, or remote URLs).
    pub picture_paths: Vec<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl ObservationRow {
    /// Whether this observation has been pushed to (or pulled from) iNaturalist.
    #[must_use]
    pub const fn exists_in_inaturalist(&self) -> bool {
        self.inaturalist_id.is_some()
    }

    /// Observations pulled from iNaturalist are read-only here.
    #[must_use]
    pub const fn can_be_edited_or_deleted(&self) -> bool {
        self.originates_in_vespawatch
    }

    /// Once a local observation is on iNaturalist, its identification
    /// follows the community there and cannot be changed locally.
    #[must_use]
    pub const fn species_can_be_locally_changed(&self) -> bool {
        !(self.originates_in_vespawatch && self.exists_in_inaturalist())
    }

    /// Species name to display: the iNaturalist identification when known.
    #[must_use]
    pub fn species_name(&self) -> String {
        self.inaturalist_species
            .clone()
            .or_else(|| self.taxon_name.clone())
            .unwrap_or_default()
    }
}

/// Values for creating or updating a management action.
#[derive(Debug, Clone, PartialEq)]
pub struct NewManagementAction {
    /// Nest the action applies to.
    pub nest_id: i64,
    /// User who recorded the action.
    pub user_id: Option<i64>,
    /// When the action took place.
    pub action_time: DateTime<Utc>,
    /// Time spent on site, in minutes.
    pub duration_minutes: Option<i32>,
    /// Number of people involved.
    pub number_of_persons: Option<i32>,
    /// Free-text comments.
    pub comments: String,
    /// Outcome.
    pub result: ActionResult,
    /// Treatment method.
    pub method: Option<ActionMethod>,
    /// Treatment product.
    pub product: Option<ActionProduct>,
    /// Aftercare.
    pub aftercare: Option<ActionAftercare>,
    /// Nest site.
    pub nest_site: Option<NestSite>,
    /// State of the nest.
    pub nest_type: Option<NestType>,
    /// Problems encountered.
    pub problems: Vec<ActionProblem>,
}

/// A management action row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementActionRow {
    /// Primary key.
    pub id: i64,
    /// Nest the action applies to.
    pub nest_id: i64,
    /// User who recorded the action.
    pub user_id: Option<i64>,
    /// Name of the user who recorded the action.
    pub username: Option<String>,
    /// When the action took place.
    pub action_time: DateTime<Utc>,
    /// Time spent on site, in minutes.
    pub duration_minutes: Option<i32>,
    /// Number of people involved.
    pub number_of_persons: Option<i32>,
    /// Free-text comments.
    pub comments: String,
    /// Outcome.
    pub result: ActionResult,
    /// Treatment method.
    pub method: Option<ActionMethod>,
    /// Treatment product.
    pub product: Option<ActionProduct>,
    /// Aftercare.
    pub aftercare: Option<ActionAftercare>,
    /// Nest site.
    pub nest_site: Option<NestSite>,
    /// State of the nest.
    pub nest_type: Option<NestType>,
    /// Problems encountered.
    pub problems: Vec<ActionProblem>,
}

/// An uploaded picture row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureRow {
    /// Primary key.
    pub id: i64,
    /// Kind of observation the picture belongs to.
    pub kind: ObservationKind,
    /// Observation, once the form attaches the picture.
    pub observation_id: Option<i64>,
    /// Path relative to the media root.
    pub path: String,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(originates: bool, inat: Option<i64>) -> ObservationRow {
        ObservationRow {
            id: 1,
            kind: ObservationKind::Nest,
            taxon_id: Some(1),
            taxon_name: Some("Vespa velutina".to_string()),
            location: String::new(),
            observation_time: Utc::now(),
            comments: String::new(),
            latitude: 51.0,
            longitude: 4.0,
            zone_id: None,
            zone_name: None,
            inaturalist_id: inat,
            inaturalist_species: None,
            inat_vv_confirmed: None,
            originates_in_vespawatch: originates,
            observer: ObserverInfo::default(),
            individual_count: None,
            behaviour: None,
            nest_height: None,
            nest_size: None,
            duplicate_of_id: None,
            action_result: None,
            action_id: None,
            picture_paths: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn species_locked_once_pushed() {
        assert!(row(true, None).species_can_be_locally_changed());
        assert!(!row(true, Some(42)).species_can_be_locally_changed());
        assert!(row(false, Some(42)).species_can_be_locally_changed());
    }

    #[test]
    fn pulled_observations_are_read_only() {
        assert!(row(true, None).can_be_edited_or_deleted());
        assert!(!row(false, Some(42)).can_be_edited_or_deleted());
    }

    #[test]
    fn species_name_prefers_inaturalist() {
        let mut r = row(false, Some(1));
        assert_eq!(r.species_name(), "Vespa velutina");
        r.inaturalist_species = Some("Vespa crabro".to_string());
        assert_eq!(r.species_name(), "Vespa crabro");
    }

    #[test]
    fn parses_bbox() {
        let bbox = BoundingBox::parse("2.5, 50.6,5.9,51.5").unwrap();
        assert!((bbox.west - 2.5).abs() < f64::EPSILON);
        assert!((bbox.north - 51.5).abs() < f64::EPSILON);
        assert!(BoundingBox::parse("1,2,3").is_none());
    }

    #[test]
    fn bbox_rejects_malformed_parts() {
        assert!(BoundingBox::parse("2.5,oops,50.6,5.9,51.5").is_none());
        assert!(BoundingBox::parse("2.5,50.6,5.9,51.5,7").is_none());
        assert!(BoundingBox::parse("2.5,,5.9,51.5").is_none());
        assert!(BoundingBox::parse("2.5,50.6,5.9,NaN").is_none());
        assert!(BoundingBox::parse("2.5,95,5.9,96").is_none());
        assert!(BoundingBox::parse("2.5,51.5,5.9,50.6").is_none());
    }
}
