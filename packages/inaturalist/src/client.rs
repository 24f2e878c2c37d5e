//! iNaturalist HTTP client.

use std::time::Duration;

use vespawatch_inaturalist_models::{
    CreateRequest, CreatedObservation, ObservationPage, PushObservation, TokenRequest,
    TokenResponse, UpdateRequest,
};
use vespawatch_settings::InaturalistSettings;

use crate::InatError;
use crate::retry::{self, RetryPolicy};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates are not idempotent.
const CREATE_POLICY: RetryPolicy = RetryPolicy::ONCE;

/// Client for the iNaturalist read and write APIs.
pub struct InatClient {
    http: reqwest::Client,
    settings: InaturalistSettings,
    access_token: Option<String>,
}

impl InatClient {
    /// Creates an unauthenticated client. Reads work right away; writes need
    /// [`InatClient::authenticate`] first.
    ///
    /// # Errors
    ///
    /// Returns [`InatError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: InaturalistSettings) -> Result<Self, InatError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vespawatch/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            settings,
            access_token: None,
        })
    }

    /// Returns the settings this client was built with.
    #[must_use]
    pub const fn settings(&self) -> &InaturalistSettings {
        &self.settings
    }

    fn site_url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.api_url.trim_end_matches('/'))
    }

    fn token(&self) -> Result<&str, InatError> {
        self.access_token.as_deref().ok_or_else(|| InatError::Auth {
            message: "not authenticated".to_string(),
        })
    }

    /// Obtains an access token with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`InatError::Auth`] if credentials are missing or rejected.
    pub async fn authenticate(&mut self) -> Result<(), InatError> {
        let s = &self.settings;
        let (Some(username), Some(password), Some(app_id), Some(app_secret)) = (
            s.username.as_deref(),
            s.password.as_deref(),
            s.app_id.as_deref(),
            s.app_secret.as_deref(),
        ) else {
            return Err(InatError::Auth {
                message: "INAT_USERNAME, INAT_PASSWORD, INAT_APP_ID and INAT_APP_SECRET are required"
                    .to_string(),
            });
        };

        let body = TokenRequest {
            client_id: app_id,
            client_secret: app_secret,
            grant_type: "password",
            username,
            password,
        };
        let url = self.site_url("/oauth/token");

        let response: TokenResponse = retry::send_json(|| self.http.post(&url).json(&body))
            .await
            .map_err(|e| match e {
                InatError::Status { status, message } if status == 401 || status == 400 => {
                    InatError::Auth {
                        message: format!("token request rejected ({status}): {message}"),
                    }
                }
                other => other,
            })?;

        log::info!("Authenticated to iNaturalist as {username}");
        self.access_token = Some(response.access_token);
        Ok(())
    }

    /// Fetches one page of observations of the given taxa, in ascending ID
    /// order, strictly after `id_above`.
    ///
    /// # Errors
    ///
    /// Returns [`InatError`] if the request fails.
    pub async fn fetch_page(
        &self,
        taxon_ids: &[i64],
        id_above: i64,
        per_page: u32,
    ) -> Result<ObservationPage, InatError> {
        let url = self.api_url("/v1/observations");

        let mut params: Vec<(&str, String)> = vec![
            (
                "taxon_id",
                taxon_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ("order_by", "id".to_string()),
            ("order", "asc".to_string()),
            ("per_page", per_page.to_string()),
            ("id_above", id_above.to_string()),
        ];
        if let Some(place_id) = self.settings.place_id {
            params.push(("place_id", place_id.to_string()));
        }

        log::debug!("Fetching iNaturalist page after id {id_above}");
        retry::send_json(|| self.http.get(&url).query(&params)).await
    }

    /// Creates an observation and returns its iNaturalist ID.
    ///
    /// Sent once: a create whose response was lost may still have gone
    /// through, and a second attempt would duplicate it. The caller keeps
    /// the local record unlinked and tries again on the next push.
    ///
    /// # Errors
    ///
    /// Returns [`InatError`] if not authenticated or the request fails.
    pub async fn create_observation(&self, obs: &PushObservation) -> Result<i64, InatError> {
        let token = self.token()?;
        let url = self.site_url("/observations.json");
        let body = CreateRequest { observation: obs };

        let created: Vec<CreatedObservation> = retry::send_json_with(CREATE_POLICY, || {
            self.http.post(&url).bearer_auth(token).json(&body)
        })
        .await?;

        created
            .first()
            .map(|c| c.id)
            .ok_or_else(|| InatError::Unexpected {
                message: "create returned no observation".to_string(),
            })
    }

    /// Updates an existing observation. Photos are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`InatError`] if not authenticated or the request fails.
    pub async fn update_observation(
        &self,
        id: i64,
        obs: &PushObservation,
    ) -> Result<(), InatError> {
        let token = self.token()?;
        let url = self.site_url(&format!("/observations/{id}.json"));
        let body = UpdateRequest {
            ignore_photos: 1,
            observation: obs,
        };

        retry::send(|| self.http.put(&url).bearer_auth(token).json(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let client = InatClient::new(InaturalistSettings {
            base_url: "https://www.inaturalist.org/".to_string(),
            ..InaturalistSettings::default()
        })
        .unwrap();

        assert_eq!(
            client.site_url("/oauth/token"),
            "https://www.inaturalist.org/oauth/token"
        );
        assert_eq!(
            client.api_url("/v1/observations"),
            "https://api.inaturalist.org/v1/observations"
        );
    }

    #[test]
    fn creates_are_never_resent() {
        assert_eq!(CREATE_POLICY.max_retries, 0);
        assert_eq!(CREATE_POLICY.max_body_retries, 0);
    }

    #[test]
    fn writes_require_a_token() {
        let client = InatClient::new(InaturalistSettings::default()).unwrap();
        assert!(matches!(client.token(), Err(InatError::Auth { .. })));
    }

    #[tokio::test]
    async fn authenticate_without_credentials_fails_fast() {
        let mut client = InatClient::new(InaturalistSettings::default()).unwrap();
        assert!(matches!(
            client.authenticate().await,
            Err(InatError::Auth { .. })
        ));
    }
}
