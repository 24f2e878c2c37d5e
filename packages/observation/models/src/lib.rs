#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Observation kinds and management action choice enumerations.
//!
//! Every enumeration here is stored in the database by its short code
//! (e.g. `"ST"` for a successfully treated nest) and exposed to the
//! browser widgets as `{value, label}` pairs through the [`Choice`] trait.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// A fixed set of coded values with human-readable labels.
pub trait Choice: Copy + Into<&'static str> + 'static {
    /// Returns all variants, in display order.
    fn all() -> &'static [Self];

    /// Returns the human-readable label for this value.
    fn label(self) -> &'static str;

    /// Returns the short code stored in the database.
    fn code(self) -> &'static str {
        self.into()
    }

    /// Looks up a value by its stored code.
    #[must_use]
    fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.code() == code)
    }
}

/// What was observed: a single hornet or a nest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationKind {
    /// One or more individual hornets.
    Individual,
    /// A nest.
    Nest,
}

impl ObservationKind {
    /// Returns the lowercase subject name used by the map widgets.
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Nest => "nest",
        }
    }

    /// Returns the media sub-directory where pictures of this kind live.
    #[must_use]
    pub const fn picture_dir(self) -> &'static str {
        match self {
            Self::Individual => "individual_pictures",
            Self::Nest => "nest_pictures",
        }
    }
}

impl Choice for ObservationKind {
    fn all() -> &'static [Self] {
        &[Self::Individual, Self::Nest]
    }

    fn label(self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::Nest => "Nest",
        }
    }
}

/// Behaviour of an observed individual.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum Behaviour {
    /// Foraging.
    #[serde(rename = "FO")]
    #[strum(serialize = "FO")]
    Foraging,
    /// Hunting at a beehive.
    #[serde(rename = "HU")]
    #[strum(serialize = "HU")]
    HuntingAtHive,
    /// Sitting on a flower.
    #[serde(rename = "FL")]
    #[strum(serialize = "FL")]
    AtFlower,
    /// Anything else.
    #[serde(rename = "OT")]
    #[strum(serialize = "OT")]
    Other,
}

impl Choice for Behaviour {
    fn all() -> &'static [Self] {
        &[
            Self::Foraging,
            Self::HuntingAtHive,
            Self::AtFlower,
            Self::Other,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::Foraging => "Foraging",
            Self::HuntingAtHive => "Hunting at hive",
            Self::AtFlower => "At flower",
            Self::Other => "Other",
        }
    }
}

/// Height of a nest above the ground.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum NestHeight {
    /// Reachable without special equipment.
    #[serde(rename = "BELOW_4_METER")]
    #[strum(serialize = "BELOW_4_METER")]
    Below4Meter,
    /// Needs a telescopic handle or a lift.
    #[serde(rename = "ABOVE_4_METER")]
    #[strum(serialize = "ABOVE_4_METER")]
    Above4Meter,
}

impl Choice for NestHeight {
    fn all() -> &'static [Self] {
        &[Self::Below4Meter, Self::Above4Meter]
    }

    fn label(self) -> &'static str {
        match self {
            Self::Below4Meter => "< 4 meters",
            Self::Above4Meter => "> 4 meters",
        }
    }
}

/// Diameter of a nest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum NestSize {
    /// Smaller than 25 cm.
    #[serde(rename = "LESS_25_CM")]
    #[strum(serialize = "LESS_25_CM")]
    Less25Cm,
    /// Larger than 25 cm.
    #[serde(rename = "MORE_25_CM")]
    #[strum(serialize = "MORE_25_CM")]
    More25Cm,
}

impl Choice for NestSize {
    fn all() -> &'static [Self] {
        &[Self::Less25Cm, Self::More25Cm]
    }

    fn label(self) -> &'static str {
        match self {
            Self::Less25Cm => "Smaller than 25cm",
            Self::More25Cm => "Larger than 25cm",
        }
    }
}

/// Result of a nest removal action.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum ActionResult {
    /// The nest was treated and is no longer active.
    #[serde(rename = "ST")]
    #[strum(serialize = "ST")]
    SuccessfullyTreated,
    /// A treatment was attempted but the nest is still active.
    #[serde(rename = "UT")]
    #[strum(serialize = "UT")]
    UnsuccessfullyTreated,
    /// Nothing was done.
    #[serde(rename = "UN")]
    #[strum(serialize = "UN")]
    Untreated,
    /// Not reported.
    #[serde(rename = "UK")]
    #[strum(serialize = "UK")]
    Unknown,
}

impl Choice for ActionResult {
    fn all() -> &'static [Self] {
        &[
            Self::SuccessfullyTreated,
            Self::UnsuccessfullyTreated,
            Self::Untreated,
            Self::Unknown,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::SuccessfullyTreated => "Successfully treated",
            Self::UnsuccessfullyTreated => "Unsuccessfully treated",
            Self::Untreated => "Untreated",
            Self::Unknown => "Unknown",
        }
    }
}

/// Method used to treat a nest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum ActionMethod {
    /// Freezer.
    #[serde(rename = "FR")]
    #[strum(serialize = "FR")]
    Freezer,
    /// Telescopic handle.
    #[serde(rename = "TH")]
    #[strum(serialize = "TH")]
    TelescopicHandle,
    /// Killing jar or box.
    #[serde(rename = "KJ")]
    #[strum(serialize = "KJ")]
    KillingJar,
    /// Liquid sprayer.
    #[serde(rename = "LS")]
    #[strum(serialize = "LS")]
    LiquidSprayer,
    /// Powder distributor.
    #[serde(rename = "PD")]
    #[strum(serialize = "PD")]
    PowderDistributor,
    /// The nest was not treated.
    #[serde(rename = "NNT")]
    #[strum(serialize = "NNT")]
    NestNotTreated,
    /// Other.
    #[serde(rename = "O")]
    #[strum(serialize = "O")]
    Other,
    /// Not reported.
    #[serde(rename = "UK")]
    #[strum(serialize = "UK")]
    Unknown,
}

impl Choice for ActionMethod {
    fn all() -> &'static [Self] {
        &[
            Self::Freezer,
            Self::TelescopicHandle,
            Self::KillingJar,
            Self::LiquidSprayer,
            Self::PowderDistributor,
            Self::NestNotTreated,
            Self::Other,
            Self::Unknown,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::Freezer => "Freezer",
            Self::TelescopicHandle => "Telescopic handle",
            Self::KillingJar => "Killing jar/box",
            Self::LiquidSprayer => "Liquid sprayer",
            Self::PowderDistributor => "Powder distributor",
            Self::NestNotTreated => "Nest not treated",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }
}

/// Product used to treat a nest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum ActionProduct {
    /// Permas-D.
    #[serde(rename = "PD")]
    #[strum(serialize = "PD")]
    PermasD,
    /// Liquid nitrogen.
    #[serde(rename = "LN")]
    #[strum(serialize = "LN")]
    LiquidNitrogen,
    /// Vespa.
    #[serde(rename = "V")]
    #[strum(serialize = "V")]
    Vespa,
    /// Ficam D.
    #[serde(rename = "FD")]
    #[strum(serialize = "FD")]
    FicamD,
    /// Topscore PAL.
    #[serde(rename = "TP")]
    #[strum(serialize = "TP")]
    TopscorePal,
    /// Ether, acetone or ethyl acetate.
    #[serde(rename = "EE")]
    #[strum(serialize = "EE")]
    Ether,
    /// Diatomaceous earth.
    #[serde(rename = "DE")]
    #[strum(serialize = "DE")]
    DiatomaceousEarth,
    /// Other.
    #[serde(rename = "O")]
    #[strum(serialize = "O")]
    Other,
    /// No product.
    #[serde(rename = "N")]
    #[strum(serialize = "N")]
    NoProduct,
    /// Not reported.
    #[serde(rename = "UK")]
    #[strum(serialize = "UK")]
    Unknown,
}

impl Choice for ActionProduct {
    fn all() -> &'static [Self] {
        &[
            Self::PermasD,
            Self::LiquidNitrogen,
            Self::Vespa,
            Self::FicamD,
            Self::TopscorePal,
            Self::Ether,
            Self::DiatomaceousEarth,
            Self::Other,
            Self::NoProduct,
            Self::Unknown,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::PermasD => "Permas-D",
            Self::LiquidNitrogen => "Liquid nitrogen",
            Self::Vespa => "Vespa",
            Self::FicamD => "Ficam D",
            Self::TopscorePal => "Topscore PAL",
            Self::Ether => "Ether / acetone / ethyl acetate",
            Self::DiatomaceousEarth => "Diatomaceous earth",
            Self::Other => "Other",
            Self::NoProduct => "None",
            Self::Unknown => "Unknown",
        }
    }
}

/// What happened to the nest material after treatment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum ActionAftercare {
    /// Nest completely removed.
    #[serde(rename = "NCR")]
    #[strum(serialize = "NCR")]
    CompletelyRemoved,
    /// Nest partially removed.
    #[serde(rename = "NPR")]
    #[strum(serialize = "NPR")]
    PartiallyRemoved,
    /// Nest left in place.
    #[serde(rename = "NNR")]
    #[strum(serialize = "NNR")]
    NotRemoved,
    /// Not reported.
    #[serde(rename = "UK")]
    #[strum(serialize = "UK")]
    Unknown,
}

impl Choice for ActionAftercare {
    fn all() -> &'static [Self] {
        &[
            Self::CompletelyRemoved,
            Self::PartiallyRemoved,
            Self::NotRemoved,
            Self::Unknown,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::CompletelyRemoved => "Nest completely removed",
            Self::PartiallyRemoved => "Nest partially removed",
            Self::NotRemoved => "Nest not removed",
            Self::Unknown => "Unknown",
        }
    }
}

/// Where the nest was built.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum NestSite {
    /// Under a roof or overhang.
    #[serde(rename = "UR")]
    #[strum(serialize = "UR")]
    UnderRoof,
    /// Inside a building.
    #[serde(rename = "IB")]
    #[strum(serialize = "IB")]
    InsideBuilding,
    /// In a tree.
    #[serde(rename = "TR")]
    #[strum(serialize = "TR")]
    Tree,
    /// In a hedge or bush.
    #[serde(rename = "HB")]
    #[strum(serialize = "HB")]
    HedgeOrBush,
    /// On or in the ground.
    #[serde(rename = "GR")]
    #[strum(serialize = "GR")]
    Ground,
    /// Other.
    #[serde(rename = "O")]
    #[strum(serialize = "O")]
    Other,
    /// Not reported.
    #[serde(rename = "UK")]
    #[strum(serialize = "UK")]
    Unknown,
}

impl Choice for NestSite {
    fn all() -> &'static [Self] {
        &[
            Self::UnderRoof,
            Self::InsideBuilding,
            Self::Tree,
            Self::HedgeOrBush,
            Self::Ground,
            Self::Other,
            Self::Unknown,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::UnderRoof => "Under roof or overhang",
            Self::InsideBuilding => "Inside building",
            Self::Tree => "Tree",
            Self::HedgeOrBush => "Hedge or bush",
            Self::Ground => "Ground",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }
}

/// State of the nest found on site.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NestType {
    /// Active primary nest, built by the queen in spring.
    ActivePrimaryNest,
    /// Active nest in its first weeks.
    ActiveEmbryonicNest,
    /// Active secondary nest, moved up into the canopy.
    ActiveSecondaryNest,
    /// Abandoned or empty.
    InactiveNest,
    /// Not confirmed as a nest.
    PotentialNest,
}

impl Choice for NestType {
    fn all() -> &'static [Self] {
        &[
            Self::ActivePrimaryNest,
            Self::ActiveEmbryonicNest,
            Self::ActiveSecondaryNest,
            Self::InactiveNest,
            Self::PotentialNest,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::ActivePrimaryNest => "Active primary nest",
            Self::ActiveEmbryonicNest => "Active embryonic nest",
            Self::ActiveSecondaryNest => "Active secondary nest",
            Self::InactiveNest => "Inactive/empty nest",
            Self::PotentialNest => "Potential nest",
        }
    }
}

/// Problems encountered during a removal action.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum ActionProblem {
    /// The nest could not be reached.
    #[serde(rename = "NA")]
    #[strum(serialize = "NA")]
    NotAccessible,
    /// The nest was not found at the reported location.
    #[serde(rename = "NF")]
    #[strum(serialize = "NF")]
    NotFound,
    /// The nest was too high for the available equipment.
    #[serde(rename = "TH")]
    #[strum(serialize = "TH")]
    TooHigh,
    /// Weather conditions prevented the action.
    #[serde(rename = "WE")]
    #[strum(serialize = "WE")]
    Weather,
    /// The owner refused access.
    #[serde(rename = "OR")]
    #[strum(serialize = "OR")]
    OwnerRefused,
    /// Other.
    #[serde(rename = "O")]
    #[strum(serialize = "O")]
    Other,
}

impl ActionProblem {
    /// Encodes a set of problems as a comma-separated code list.
    #[must_use]
    pub fn encode_list(problems: &[Self]) -> String {
        let mut codes: Vec<Self> = problems.to_vec();
        codes.sort();
        codes.dedup();
        codes
            .iter()
            .map(|p| p.code())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Decodes a comma-separated code list, skipping unknown codes.
    #[must_use]
    pub fn decode_list(encoded: &str) -> Vec<Self> {
        encoded
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .filter_map(Self::from_code)
            .collect()
    }
}

impl Choice for ActionProblem {
    fn all() -> &'static [Self] {
        &[
            Self::NotAccessible,
            Self::NotFound,
            Self::TooHigh,
            Self::Weather,
            Self::OwnerRefused,
            Self::Other,
        ]
    }

    fn label(self) -> &'static str {
        match self {
            Self::NotAccessible => "Nest not accessible",
            Self::NotFound => "Nest not found",
            Self::TooHigh => "Nest too high",
            Self::Weather => "Bad weather",
            Self::OwnerRefused => "Owner refused access",
            Self::Other => "Other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_codes_roundtrip<C: Choice + PartialEq + std::fmt::Debug>() {
        for choice in C::all() {
            assert_eq!(C::from_code(choice.code()), Some(*choice));
            assert!(!choice.label().is_empty(), "{choice:?} has no label");
        }
    }

    #[test]
    fn all_choices_roundtrip_through_codes() {
        assert_codes_roundtrip::<ObservationKind>();
        assert_codes_roundtrip::<Behaviour>();
        assert_codes_roundtrip::<NestHeight>();
        assert_codes_roundtrip::<NestSize>();
        assert_codes_roundtrip::<ActionResult>();
        assert_codes_roundtrip::<ActionMethod>();
        assert_codes_roundtrip::<ActionProduct>();
        assert_codes_roundtrip::<ActionAftercare>();
        assert_codes_roundtrip::<NestSite>();
        assert_codes_roundtrip::<NestType>();
        assert_codes_roundtrip::<ActionProblem>();
    }

    #[test]
    fn codes_match_stored_values() {
        assert_eq!(ActionResult::SuccessfullyTreated.code(), "ST");
        assert_eq!(ActionMethod::NestNotTreated.code(), "NNT");
        assert_eq!(ActionProduct::NoProduct.code(), "N");
        assert_eq!(Behaviour::HuntingAtHive.code(), "HU");
        assert_eq!(ObservationKind::Nest.code(), "NEST");
        assert_eq!(NestHeight::Below4Meter.code(), "BELOW_4_METER");
        assert_eq!(NestType::InactiveNest.code(), "INACTIVE_NEST");
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(ActionResult::from_code("XX").is_none());
        assert!(ActionMethod::from_code("").is_none());
    }

    #[test]
    fn problem_list_is_sorted_and_deduplicated() {
        let encoded = ActionProblem::encode_list(&[
            ActionProblem::Weather,
            ActionProblem::NotAccessible,
            ActionProblem::Weather,
        ]);
        assert_eq!(encoded, "NA,WE");
        assert_eq!(
            ActionProblem::decode_list("NA, WE,,bogus"),
            vec![ActionProblem::NotAccessible, ActionProblem::Weather]
        );
    }

    #[test]
    fn kind_subject_and_picture_dir() {
        assert_eq!(ObservationKind::Individual.subject(), "individual");
        assert_eq!(ObservationKind::Nest.picture_dir(), "nest_pictures");
    }
}
