//! Request bodies for creating and editing records, with field-level
//! validation.
//!
//! Validation collects every problem instead of stopping at the first, so
//! the browser can highlight all offending fields at once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vespawatch_database_models::{
    NewManagementAction, NewObservation, ObservationRow, ObserverInfo,
};
use vespawatch_observation_models::{
    ActionAftercare, ActionMethod, ActionProblem, ActionProduct, ActionResult, Behaviour, Choice,
    NestHeight, NestSize, NestSite, NestType, ObservationKind,
};

const REQUIRED: &str = "This field is required.";
const NESTS_ONLY: &str = "Only allowed for nests.";
const INDIVIDUALS_ONLY: &str = "Only allowed for individuals.";
const SPECIES_LOCKED: &str = "Observation already pushed, species can't be changed anymore!";

/// Field name to list of error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Returns `Ok(value)` when no errors were recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` if any error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn invalid_choice(code: &str) -> String {
    format!("Select a valid choice. {code} is not one of the available choices.")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Parses an optional choice code, recording an error for unknown codes.
fn parse_choice<C: Choice>(
    errors: &mut FieldErrors,
    field: &str,
    code: Option<&str>,
) -> Option<C> {
    let code = non_blank(code)?;
    let parsed = C::from_code(code);
    if parsed.is_none() {
        errors.add(field, invalid_choice(code));
    }
    parsed
}

fn required<T: Copy>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

// ── Observations ────────────────────────────────────────────────

/// Body of `POST /api/individuals`, `POST /api/nests`, and
/// `PUT /api/observations/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservationForm {
    pub taxon_id: Option<i64>,
    pub location: String,
    pub observation_time: Option<DateTime<Utc>>,
    pub comments: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub observer_name: Option<String>,
    pub observer_email: Option<String>,
    pub observer_phone: Option<String>,
    pub observer_is_beekeeper: Option<bool>,
    pub individual_count: Option<i32>,
    pub behaviour: Option<String>,
    pub nest_height: Option<String>,
    pub nest_size: Option<String>,
    pub duplicate_of_id: Option<i64>,
    /// Previously uploaded pictures to attach.
    pub image_ids: Vec<i64>,
}

impl ObservationForm {
    /// Validates a new observation of `kind` submitted through the public
    /// form.
    ///
    /// # Errors
    ///
    /// Returns the field errors if any field is missing or invalid.
    pub fn validate(
        &self,
        kind: ObservationKind,
        now: DateTime<Utc>,
    ) -> Result<NewObservation, FieldErrors> {
        let mut errors = FieldErrors::new();

        let taxon_id = required(&mut errors, "taxonId", self.taxon_id);
        let observation_time = required(&mut errors, "observationTime", self.observation_time);
        if observation_time.is_some_and(|t| t > now) {
            errors.add("observationTime", "Observation time cannot be in the future.");
        }

        let latitude = required(&mut errors, "latitude", self.latitude);
        if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            errors.add("latitude", "Latitude must be between -90 and 90.");
        }
        let longitude = required(&mut errors, "longitude", self.longitude);
        if longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
            errors.add("longitude", "Longitude must be between -180 and 180.");
        }

        let email = non_blank(self.observer_email.as_deref());
        if email.is_some_and(|e| !e.contains('@')) {
            errors.add("observerEmail", "Enter a valid email address.");
        }

        let mut behaviour = None;
        let mut nest_height = None;
        let mut nest_size = None;

        match kind {
            ObservationKind::Individual => {
                if self.individual_count.is_some_and(|c| c < 1) {
                    errors.add("individualCount", "Ensure this value is at least 1.");
                }
                behaviour =
                    parse_choice::<Behaviour>(&mut errors, "behaviour", self.behaviour.as_deref());

                if non_blank(self.nest_height.as_deref()).is_some() {
                    errors.add("nestHeight", NESTS_ONLY);
                }
                if non_blank(self.nest_size.as_deref()).is_some() {
                    errors.add("nestSize", NESTS_ONLY);
                }
                if self.duplicate_of_id.is_some() {
                    errors.add("duplicateOfId", NESTS_ONLY);
                }
            }
            ObservationKind::Nest => {
                nest_height = parse_choice::<NestHeight>(
                    &mut errors,
                    "nestHeight",
                    self.nest_height.as_deref(),
                );
                nest_size =
                    parse_choice::<NestSize>(&mut errors, "nestSize", self.nest_size.as_deref());

                if self.individual_count.is_some() {
                    errors.add("individualCount", INDIVIDUALS_ONLY);
                }
                if non_blank(self.behaviour.as_deref()).is_some() {
                    errors.add("behaviour", INDIVIDUALS_ONLY);
                }
            }
        }

        let (Some(observation_time), Some(latitude), Some(longitude)) =
            (observation_time, latitude, longitude)
        else {
            return Err(errors);
        };

        errors.into_result(NewObservation {
            kind,
            taxon_id,
            location: self.location.trim().to_string(),
            observation_time,
            comments: self.comments.trim().to_string(),
            latitude,
            longitude,
            zone_id: None,
            inaturalist_id: None,
            inaturalist_species: None,
            inat_vv_confirmed: None,
            originates_in_vespawatch: true,
            observer: ObserverInfo {
                name: non_blank(self.observer_name.as_deref()).map(ToString::to_string),
                email: email.map(ToString::to_string),
                phone: non_blank(self.observer_phone.as_deref()).map(ToString::to_string),
                is_beekeeper: self.observer_is_beekeeper,
            },
            individual_count: self.individual_count,
            behaviour,
            nest_height,
            nest_size,
            duplicate_of_id: self.duplicate_of_id,
        })
    }

    /// Validates an edit of `existing`.
    ///
    /// The kind and the iNaturalist link are kept. The species cannot change
    /// once a locally created observation is on iNaturalist.
    ///
    /// # Errors
    ///
    /// Returns the field errors if any field is missing or invalid.
    pub fn validate_edit(
        &self,
        existing: &ObservationRow,
        now: DateTime<Utc>,
    ) -> Result<NewObservation, FieldErrors> {
        let result = self.validate(existing.kind, now);

        if self.taxon_id != existing.taxon_id && !existing.species_can_be_locally_changed() {
            let mut errors = result.err().unwrap_or_default();
            errors.add("taxonId", SPECIES_LOCKED);
            return Err(errors);
        }

        result.map(|new| NewObservation {
            zone_id: existing.zone_id,
            inaturalist_id: existing.inaturalist_id,
            inaturalist_species: existing.inaturalist_species.clone(),
            inat_vv_confirmed: existing.inat_vv_confirmed,
            originates_in_vespawatch: existing.originates_in_vespawatch,
            ..new
        })
    }
}

// ── Management actions ──────────────────────────────────────────

/// Body of `POST /api/save_management_action/`. An `actionId` updates that
/// action; without one a new action is created.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagementActionForm {
    pub action_id: Option<i64>,
    pub nest: Option<i64>,
    pub action_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub number_of_persons: Option<i32>,
    pub comments: String,
    pub result: Option<String>,
    pub method: Option<String>,
    pub product: Option<String>,
    pub aftercare: Option<String>,
    pub nest_site: Option<String>,
    pub nest_type: Option<String>,
    pub problems: Vec<String>,
}

impl ManagementActionForm {
    /// Validates the form. `user_id` becomes the author of the action.
    ///
    /// # Errors
    ///
    /// Returns the field errors if any field is missing or invalid.
    pub fn validate(&self, user_id: Option<i64>) -> Result<NewManagementAction, FieldErrors> {
        let mut errors = FieldErrors::new();

        let nest_id = required(&mut errors, "nest", self.nest);
        let action_time = required(&mut errors, "actionTime", self.action_time);

        let result = if non_blank(self.result.as_deref()).is_none() {
            errors.add("result", REQUIRED);
            None
        } else {
            parse_choice::<ActionResult>(&mut errors, "result", self.result.as_deref())
        };

        if self.duration_minutes.is_some_and(|d| d < 0) {
            errors.add("durationMinutes", "Ensure this value is at least 0.");
        }
        if self.number_of_persons.is_some_and(|n| n < 0) {
            errors.add("numberOfPersons", "Ensure this value is at least 0.");
        }

        let method = parse_choice::<ActionMethod>(&mut errors, "method", self.method.as_deref());
        let product = parse_choice::<ActionProduct>(&mut errors, "product", self.product.as_deref());
        let aftercare =
            parse_choice::<ActionAftercare>(&mut errors, "aftercare", self.aftercare.as_deref());
        let nest_site =
            parse_choice::<NestSite>(&mut errors, "nestSite", self.nest_site.as_deref());
        let nest_type =
            parse_choice::<NestType>(&mut errors, "nestType", self.nest_type.as_deref());

        let mut problems = Vec::with_capacity(self.problems.len());
        for code in &self.problems {
            if let Some(problem) = parse_choice::<ActionProblem>(&mut errors, "problems", Some(code))
            {
                problems.push(problem);
            }
        }

        let (Some(nest_id), Some(action_time), Some(result)) = (nest_id, action_time, result)
        else {
            return Err(errors);
        };

        errors.into_result(NewManagementAction {
            nest_id,
            user_id,
            action_time,
            duration_minutes: self.duration_minutes,
            number_of_persons: self.number_of_persons,
            comments: self.comments.trim().to_string(),
            result,
            method,
            product,
            aftercare,
            nest_site,
            nest_type,
            problems,
        })
    }
}

// ── Auth ────────────────────────────────────────────────────────

/// Body of `POST /api/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Body of `PUT /api/me`. Only the contact email is user-editable; the
/// zone of a fire-brigade account is set by an administrator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub email: Option<String>,
}

impl ProfileForm {
    /// The trimmed email, `None` when cleared.
    ///
    /// # Errors
    ///
    /// Returns an `email` field error for an address without `@`.
    pub fn validate(&self) -> Result<Option<String>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = non_blank(self.email.as_deref());
        if email.is_some_and(|e| !e.contains('@')) {
            errors.add("email", "Enter a valid email address.");
        }
        errors.into_result(email.map(ToString::to_string))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
    }

    fn valid_form() -> ObservationForm {
        ObservationForm {
            taxon_id: Some(1),
            location: " Gent ".to_string(),
            observation_time: Some(Utc.with_ymd_and_hms(2024, 8, 30, 10, 0, 0).unwrap()),
            latitude: Some(51.05),
            longitude: Some(3.72),
            observer_email: Some("jan@example.org".to_string()),
            ..ObservationForm::default()
        }
    }

    #[test]
    fn valid_individual_passes() {
        let form = ObservationForm {
            individual_count: Some(3),
            behaviour: Some("FO".to_string()),
            ..valid_form()
        };
        let new = form.validate(ObservationKind::Individual, now()).unwrap();

        assert_eq!(new.kind, ObservationKind::Individual);
        assert_eq!(new.location, "Gent");
        assert_eq!(new.behaviour, Some(Behaviour::Foraging));
        assert!(new.originates_in_vespawatch);
        assert_eq!(new.observer.email.as_deref(), Some("jan@example.org"));
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let errors = ObservationForm::default()
            .validate(ObservationKind::Nest, now())
            .unwrap_err();

        for field in ["taxonId", "observationTime", "latitude", "longitude"] {
            assert_eq!(errors.get(field), Some(&[REQUIRED.to_string()][..]), "{field}");
        }
    }

    #[test]
    fn coordinates_out_of_range() {
        let form = ObservationForm {
            latitude: Some(91.0),
            longitude: Some(-180.5),
            ..valid_form()
        };
        let errors = form.validate(ObservationKind::Nest, now()).unwrap_err();
        assert!(errors.get("latitude").is_some());
        assert!(errors.get("longitude").is_some());
    }

    #[test]
    fn boundary_coordinates_are_valid() {
        let form = ObservationForm {
            latitude: Some(-90.0),
            longitude: Some(180.0),
            ..valid_form()
        };
        assert!(form.validate(ObservationKind::Nest, now()).is_ok());
    }

    #[test]
    fn future_time_is_rejected() {
        let form = ObservationForm {
            observation_time: Some(now() + chrono::Duration::hours(1)),
            ..valid_form()
        };
        let errors = form.validate(ObservationKind::Nest, now()).unwrap_err();
        assert!(errors.get("observationTime").is_some());
    }

    #[test]
    fn nest_fields_on_individual_are_rejected() {
        let form = ObservationForm {
            nest_height: Some("BELOW_4_METER".to_string()),
            duplicate_of_id: Some(4),
            ..valid_form()
        };
        let errors = form
            .validate(ObservationKind::Individual, now())
            .unwrap_err();
        assert_eq!(errors.get("nestHeight"), Some(&[NESTS_ONLY.to_string()][..]));
        assert!(errors.get("duplicateOfId").is_some());
    }

    #[test]
    fn individual_fields_on_nest_are_rejected() {
        let form = ObservationForm {
            individual_count: Some(2),
            ..valid_form()
        };
        let errors = form.validate(ObservationKind::Nest, now()).unwrap_err();
        assert_eq!(
            errors.get("individualCount"),
            Some(&[INDIVIDUALS_ONLY.to_string()][..])
        );
    }

    #[test]
    fn unknown_choice_code_is_rejected() {
        let form = ObservationForm {
            nest_size: Some("HUGE".to_string()),
            ..valid_form()
        };
        let errors = form.validate(ObservationKind::Nest, now()).unwrap_err();
        assert_eq!(
            errors.get("nestSize"),
            Some(&[invalid_choice("HUGE")][..])
        );
    }

    #[test]
    fn invalid_email_is_rejected() {
        let form = ObservationForm {
            observer_email: Some("not an address".to_string()),
            ..valid_form()
        };
        let errors = form.validate(ObservationKind::Nest, now()).unwrap_err();
        assert!(errors.get("observerEmail").is_some());
    }

    fn existing(inaturalist_id: Option<i64>) -> ObservationRow {
        ObservationRow {
            id: 5,
            kind: ObservationKind::Nest,
            taxon_id: Some(1),
            taxon_name: None,
            location: String::new(),
            observation_time: now(),
            comments: String::new(),
            latitude: 51.0,
            longitude: 4.0,
            zone_id: Some(2),
            zone_name: None,
            inaturalist_id,
            inaturalist_species: None,
            inat_vv_confirmed: None,
            originates_in_vespawatch: true,
            observer: ObserverInfo::default(),
            individual_count: None,
            behaviour: None,
            nest_height: None,
            nest_size: None,
            duplicate_of_id: None,
            action_result: None,
            action_id: None,
            picture_paths: Vec::new(),
            created_at: now(),
        }
    }

    #[test]
    fn species_is_locked_after_push() {
        let form = ObservationForm {
            taxon_id: Some(2),
            ..valid_form()
        };

        let errors = form.validate_edit(&existing(Some(99)), now()).unwrap_err();
        assert_eq!(errors.get("taxonId"), Some(&[SPECIES_LOCKED.to_string()][..]));

        let edited = form.validate_edit(&existing(None), now()).unwrap();
        assert_eq!(edited.taxon_id, Some(2));
        assert_eq!(edited.zone_id, Some(2));
    }

    #[test]
    fn pushed_observation_keeps_link_on_edit() {
        let edited = valid_form().validate_edit(&existing(Some(99)), now()).unwrap();
        assert_eq!(edited.inaturalist_id, Some(99));
        assert_eq!(edited.kind, ObservationKind::Nest);
    }

    #[test]
    fn management_action_requires_nest_time_and_result() {
        let errors = ManagementActionForm::default().validate(Some(1)).unwrap_err();
        assert!(errors.get("nest").is_some());
        assert!(errors.get("actionTime").is_some());
        assert_eq!(errors.get("result"), Some(&[REQUIRED.to_string()][..]));
    }

    #[test]
    fn management_action_parses_choices() {
        let form = ManagementActionForm {
            nest: Some(5),
            action_time: Some(now()),
            duration_minutes: Some(30),
            number_of_persons: Some(2),
            result: Some("ST".to_string()),
            method: Some("FR".to_string()),
            nest_type: Some("INACTIVE_NEST".to_string()),
            problems: vec!["XX".to_string()],
            ..ManagementActionForm::default()
        };
        let errors = form.validate(Some(1)).unwrap_err();
        assert_eq!(errors.get("problems"), Some(&[invalid_choice("XX")][..]));

        let form = ManagementActionForm {
            problems: Vec::new(),
            ..form
        };
        let action = form.validate(Some(1)).unwrap();
        assert_eq!(action.result, ActionResult::SuccessfullyTreated);
        assert_eq!(action.method, Some(ActionMethod::Freezer));
        assert_eq!(action.nest_type, Some(NestType::InactiveNest));
        assert_eq!(action.user_id, Some(1));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let form = ManagementActionForm {
            nest: Some(5),
            action_time: Some(now()),
            result: Some("ST".to_string()),
            duration_minutes: Some(-1),
            ..ManagementActionForm::default()
        };
        let errors = form.validate(None).unwrap_err();
        assert!(errors.get("durationMinutes").is_some());
    }

    #[test]
    fn profile_email_is_trimmed_or_cleared() {
        let form = ProfileForm {
            email: Some(" an@example.org ".to_string()),
        };
        assert_eq!(form.validate().unwrap().as_deref(), Some("an@example.org"));

        let cleared = ProfileForm {
            email: Some("  ".to_string()),
        };
        assert_eq!(cleared.validate().unwrap(), None);

        let bad = ProfileForm {
            email: Some("nope".to_string()),
        };
        assert!(bad.validate().unwrap_err().get("email").is_some());
    }

    #[test]
    fn field_errors_serialize_as_map() {
        let mut errors = FieldErrors::new();
        errors.add("latitude", "bad");
        errors.add("latitude", "worse");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({"latitude": ["bad", "worse"]})
        );
    }
}
