//! The configuration object embedded in every page and served at
//! `/api/config`.

use std::collections::BTreeMap;

use serde::Serialize;
use vespawatch_settings::{CircleSettings, Settings};

/// Endpoints the browser widgets call, keyed by the name they look up.
pub const API_ENDPOINTS: &[(&str, &str)] = &[
    ("observationsUrl", "/api/observations"),
    ("individualsUrl", "/api/individuals"),
    ("nestsUrl", "/api/nests"),
    ("observationUrl", "/api/observations/"),
    ("actionResultsUrl", "/api/action_results"),
    ("actionMethodsUrl", "/api/action_methods"),
    ("actionProductsUrl", "/api/action_products"),
    ("actionAftercareUrl", "/api/action_aftercare"),
    ("actionNestSitesUrl", "/api/action_nest_sites"),
    ("actionNestTypesUrl", "/api/action_nest_types"),
    ("actionProblemsUrl", "/api/action_problems"),
    ("actionSaveUrl", "/api/save_management_action/"),
    ("actionLoadUrl", "/api/get_management_action/"),
    ("actionDeleteUrl", "/api/delete_management_action/"),
    ("individualPicturesUrl", "/api/individual_pictures/"),
    ("nestPicturesUrl", "/api/nest_pictures/"),
    ("picturesUrl", "/api/pictures/"),
    ("zoneUrl", "/api/zone"),
    ("loginUrl", "/api/login"),
    ("logoutUrl", "/api/logout"),
    ("meUrl", "/api/me"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleConfig {
    pub fill_opacity: f64,
    pub stroke_opacity: f64,
    pub stroke_width: u32,
    pub nest_radius: u32,
    pub individual_radius: u32,
    pub individual_color: String,
    pub nest_color: String,
    pub unknown_color: String,
}

impl From<&CircleSettings> for CircleConfig {
    fn from(c: &CircleSettings) -> Self {
        Self {
            fill_opacity: c.fill_opacity,
            stroke_opacity: c.stroke_opacity,
            stroke_width: c.stroke_width,
            nest_radius: c.nest_radius,
            individual_radius: c.individual_radius,
            individual_color: c.individual_color.clone(),
            nest_color: c.nest_color.clone(),
            unknown_color: c.unknown_color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub circle: CircleConfig,
    pub initial_position: [f64; 2],
    pub initial_zoom: u8,
    pub tile_layer_base_url: String,
    pub tile_layer_options: serde_json::Value,
}

/// Values the browser widgets read from `window.VESPAWATCH`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsConfig {
    pub current_language_code: String,
    pub debug: bool,
    pub base_url: String,
    pub static_root: String,
    pub apis: BTreeMap<&'static str, String>,
    pub map: MapConfig,
}

impl JsConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let base = settings.site.base_url.trim_end_matches('/');

        Self {
            current_language_code: settings.site.language_code.clone(),
            debug: settings.site.debug,
            base_url: base.to_string(),
            static_root: settings.site.static_root.clone(),
            apis: API_ENDPOINTS
                .iter()
                .map(|(name, path)| (*name, format!("{base}{path}")))
                .collect(),
            map: MapConfig {
                circle: CircleConfig::from(&settings.map.circle),
                initial_position: settings.map.initial_position,
                initial_zoom: settings.map.initial_zoom,
                tile_layer_base_url: settings.map.tile_layer_base_url.clone(),
                tile_layer_options: settings.map.tile_layer_options.clone(),
            },
        }
    }

    /// A `<script>` block assigning this object to `window.VESPAWATCH`.
    ///
    /// `<` is escaped so a value cannot close the script element.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn script_tag(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?.replace('<', "\\u003c");
        Ok(format!("<script>window.VESPAWATCH = {json};</script>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_uses_camel_case_and_absolute_api_urls() {
        let mut settings = Settings::default();
        settings.site.base_url = "https://vespawatch.be/".to_string();

        let json = serde_json::to_value(JsConfig::from_settings(&settings)).unwrap();

        assert_eq!(json["currentLanguageCode"], "en");
        assert_eq!(json["baseUrl"], "https://vespawatch.be");
        assert_eq!(
            json["apis"]["nestsUrl"],
            "https://vespawatch.be/api/nests"
        );
        assert_eq!(json["map"]["initialZoom"], 8);
        assert_eq!(json["map"]["circle"]["nestColor"], "#DD3B2D");
    }

    #[test]
    fn script_tag_escapes_closing_tags() {
        let mut settings = Settings::default();
        settings.site.language_code = "</script>".to_string();

        let tag = JsConfig::from_settings(&settings).script_tag().unwrap();
        assert!(tag.starts_with("<script>window.VESPAWATCH = {"));
        assert_eq!(tag.matches("</script>").count(), 1);
    }
}
