//! Mapping between iNaturalist observations and local rows.

use vespawatch_database::taxa::pull_index;
use vespawatch_database_models::{NewObservation, ObservationRow, ObserverInfo, TaxonRow};
use vespawatch_inaturalist::parse;
use vespawatch_inaturalist_models::{
    EVIDENCE_INDIVIDUAL, EVIDENCE_NEST, FieldValueAttribute, InatObservation, PushObservation,
};
use vespawatch_observation_models::ObservationKind;
use vespawatch_settings::InaturalistSettings;

use crate::SyncError;

/// Resolves an iNaturalist taxon ID to a local taxon.
///
/// # Errors
///
/// Returns [`SyncError::SpeciesMatch`] if no local taxon pulls that ID.
pub fn reconcile_taxon(taxa: &[TaxonRow], inat_taxon_id: i64) -> Result<&TaxonRow, SyncError> {
    pull_index(taxa)
        .get(&inat_taxon_id)
        .copied()
        .ok_or(SyncError::SpeciesMatch { inat_taxon_id })
}

/// Whether the community identification is the tracked target species.
///
/// `None` when the community has not reached an identification yet.
#[must_use]
pub fn target_confirmed(taxa: &[TaxonRow], obs: &InatObservation) -> Option<bool> {
    let community = obs.community_taxon_id?;
    Some(
        taxa.iter()
            .any(|t| t.is_target && t.inaturalist_pull_taxon_ids.contains(&community)),
    )
}

/// Builds the local row for an observation that was created on iNaturalist.
///
/// # Errors
///
/// Returns [`SyncError`] if the taxon is unknown, or the time or location
/// cannot be determined.
pub fn to_new_observation(
    obs: &InatObservation,
    taxa: &[TaxonRow],
    settings: &InaturalistSettings,
) -> Result<NewObservation, SyncError> {
    let inat_taxon_id = obs
        .taxon
        .as_ref()
        .map(|t| t.id)
        .ok_or_else(|| SyncError::Invalid {
            inaturalist_id: obs.id,
            message: "no taxon".to_string(),
        })?;
    let taxon = reconcile_taxon(taxa, inat_taxon_id)?;

    let observation_time = parse::observation_time(obs).ok_or_else(|| SyncError::Invalid {
        inaturalist_id: obs.id,
        message: "unparseable observation date".to_string(),
    })?;

    let (latitude, longitude) = obs.lat_lon().ok_or_else(|| SyncError::Invalid {
        inaturalist_id: obs.id,
        message: "no coordinates".to_string(),
    })?;

    Ok(NewObservation {
        kind: parse::observation_kind(obs, settings.evidence_field_id),
        taxon_id: Some(taxon.id),
        location: obs.place_guess.clone().unwrap_or_default(),
        observation_time,
        comments: obs.description.clone().unwrap_or_default(),
        latitude,
        longitude,
        zone_id: None,
        inaturalist_id: Some(obs.id),
        inaturalist_species: obs.taxon.as_ref().and_then(|t| t.name.clone()),
        inat_vv_confirmed: target_confirmed(taxa, obs),
        originates_in_vespawatch: false,
        observer: ObserverInfo::default(),
        individual_count: None,
        behaviour: None,
        nest_height: None,
        nest_size: None,
        duplicate_of_id: None,
    })
}

/// The local taxon a pushed observation should move to, when the community
/// identification disagrees with the current one.
///
/// Returns `Ok(None)` when there is no community identification or it
/// already matches.
///
/// # Errors
///
/// Returns [`SyncError::SpeciesMatch`] if the community taxon is unknown.
pub fn community_taxon_change(
    local: &ObservationRow,
    obs: &InatObservation,
    taxa: &[TaxonRow],
) -> Result<Option<i64>, SyncError> {
    let Some(community) = obs.community_taxon_id else {
        return Ok(None);
    };

    let current_matches = local
        .taxon_id
        .and_then(|id| taxa.iter().find(|t| t.id == id))
        .is_some_and(|t| t.inaturalist_pull_taxon_ids.contains(&community));

    if current_matches {
        return Ok(None);
    }

    reconcile_taxon(taxa, community).map(|t| Some(t.id))
}

/// Builds the payload pushed to iNaturalist for a local observation.
///
/// The taxon is only sent when creating; afterwards the identification is
/// owned by the iNaturalist community.
#[must_use]
pub fn to_push_observation(
    row: &ObservationRow,
    taxa: &[TaxonRow],
    settings: &InaturalistSettings,
    create: bool,
) -> PushObservation {
    let evidence = match row.kind {
        ObservationKind::Nest => EVIDENCE_NEST,
        ObservationKind::Individual => EVIDENCE_INDIVIDUAL,
    };

    let taxon_id = if create {
        row.taxon_id
            .and_then(|id| taxa.iter().find(|t| t.id == id))
            .and_then(|t| t.inaturalist_push_taxon_id)
    } else {
        None
    };

    PushObservation {
        taxon_id,
        observed_on_string: row.observation_time.to_rfc3339(),
        time_zone: settings.time_zone.clone(),
        description: row.comments.clone(),
        latitude: row.latitude,
        longitude: row.longitude,
        place_guess: row.location.clone(),
        observation_field_values_attributes: vec![
            FieldValueAttribute {
                observation_field_id: settings.vespawatch_id_field_id,
                value: row.id.to_string(),
            },
            FieldValueAttribute {
                observation_field_id: settings.evidence_field_id,
                value: evidence.to_string(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use vespawatch_inaturalist_models::{InatTaxon, ObservationFieldValue, PointGeometry};

    use super::*;

    fn taxa() -> Vec<TaxonRow> {
        vec![
            TaxonRow {
                id: 1,
                name: "Vespa velutina".to_string(),
                vernacular_name: "Asian hornet".to_string(),
                is_target: true,
                inaturalist_push_taxon_id: Some(119_019),
                inaturalist_pull_taxon_ids: vec![119_019, 560_197],
            },
            TaxonRow {
                id: 2,
                name: "Vespa crabro".to_string(),
                vernacular_name: "European hornet".to_string(),
                is_target: false,
                inaturalist_push_taxon_id: Some(54_327),
                inaturalist_pull_taxon_ids: vec![54_327],
            },
        ]
    }

    fn inat(taxon_id: i64, community: Option<i64>, evidence: Option<&str>) -> InatObservation {
        InatObservation {
            id: 900,
            time_observed_at: Some("2024-08-10T09:15:00Z".to_string()),
            geojson: Some(PointGeometry {
                coordinates: vec![3.72, 51.05],
            }),
            place_guess: Some("Gent".to_string()),
            taxon: Some(InatTaxon {
                id: taxon_id,
                name: Some("Vespa velutina nigrithorax".to_string()),
            }),
            community_taxon_id: community,
            ofvs: evidence
                .map(|e| ObservationFieldValue {
                    field_id: 9770,
                    value: serde_json::json!(e),
                })
                .into_iter()
                .collect(),
            ..InatObservation::default()
        }
    }

    fn local_row(taxon_id: Option<i64>) -> ObservationRow {
        ObservationRow {
            id: 42,
            kind: ObservationKind::Nest,
            taxon_id,
            taxon_name: None,
            location: "Tuin".to_string(),
            observation_time: Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap(),
            comments: "Onder de dakgoot".to_string(),
            latitude: 51.0,
            longitude: 3.7,
            zone_id: None,
            zone_name: None,
            inaturalist_id: None,
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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pulled_nest_maps_to_local_taxon() {
        let settings = InaturalistSettings::default();
        let new = to_new_observation(&inat(560_197, Some(119_019), Some("nest")), &taxa(), &settings)
            .unwrap();

        assert_eq!(new.kind, ObservationKind::Nest);
        assert_eq!(new.taxon_id, Some(1));
        assert_eq!(new.inaturalist_id, Some(900));
        assert!(!new.originates_in_vespawatch);
        assert_eq!(new.inat_vv_confirmed, Some(true));
        assert!((new.latitude - 51.05).abs() < f64::EPSILON);
        assert!((new.longitude - 3.72).abs() < f64::EPSILON);
        assert_eq!(new.location, "Gent");
    }

    #[test]
    fn missing_evidence_means_individual() {
        let new = to_new_observation(
            &inat(119_019, None, None),
            &taxa(),
            &InaturalistSettings::default(),
        )
        .unwrap();
        assert_eq!(new.kind, ObservationKind::Individual);
        assert_eq!(new.inat_vv_confirmed, None);
    }

    #[test]
    fn unknown_taxon_is_a_species_match_error() {
        let err = to_new_observation(
            &inat(1, None, None),
            &taxa(),
            &InaturalistSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::SpeciesMatch { inat_taxon_id: 1 }));
    }

    #[test]
    fn community_disagreement_moves_taxon() {
        let obs = inat(119_019, Some(54_327), Some("nest"));
        assert_eq!(
            community_taxon_change(&local_row(Some(1)), &obs, &taxa()).unwrap(),
            Some(2)
        );
        assert_eq!(
            community_taxon_change(&local_row(Some(2)), &obs, &taxa()).unwrap(),
            None
        );
        let no_community = inat(119_019, None, None);
        assert_eq!(
            community_taxon_change(&local_row(Some(2)), &no_community, &taxa()).unwrap(),
            None
        );
        assert!(community_taxon_change(&local_row(Some(1)), &inat(1, Some(7), None), &taxa())
            .is_err());
    }

    #[test]
    fn push_sends_taxon_only_on_create() {
        let settings = InaturalistSettings::default();
        let row = local_row(Some(1));

        let create = to_push_observation(&row, &taxa(), &settings, true);
        assert_eq!(create.taxon_id, Some(119_019));
        assert_eq!(create.place_guess, "Tuin");
        assert_eq!(create.time_zone, "Brussels");
        assert_eq!(
            create.observation_field_values_attributes,
            vec![
                FieldValueAttribute {
                    observation_field_id: settings.vespawatch_id_field_id,
                    value: "42".to_string(),
                },
                FieldValueAttribute {
                    observation_field_id: settings.evidence_field_id,
                    value: "nest".to_string(),
                },
            ]
        );

        let update = to_push_observation(&row, &taxa(), &settings, false);
        assert_eq!(update.taxon_id, None);
        assert_eq!(update.observed_on_string, "2024-08-01T12:00:00+00:00");
    }
}
