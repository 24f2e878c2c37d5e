//! Server-rendered HTML shells.
//!
//! Every page is the same document skeleton with the JS config island, a
//! navigation bar, and a page-specific body. The interactive parts (map,
//! forms, management dashboard) are mounted by the widgets in the static
//! bundle on the element with `id="app"`.

use std::fmt::Write as _;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use vespawatch_database::observations;
use vespawatch_database_models::{ObservationQuery, ObservationRow};
use vespawatch_observation_models::ObservationKind;
use vespawatch_server_models::config::JsConfig;

use crate::AppState;
use crate::auth;
use crate::error::ApiError;

/// Observations listed on `/obs/`.
pub const LATEST_OBSERVATIONS: u32 = 40;

/// Observations listed on the home page.
pub const HOME_OBSERVATIONS: u32 = 4;

/// A static informational page.
#[derive(Debug, Clone, Copy)]
pub struct InfoPage {
    pub path: &'static str,
    pub title: &'static str,
    pub widget: &'static str,
}

pub const INFO_PAGES: &[InfoPage] = &[
    InfoPage {
        path: "/get-involved/",
        title: "Get involved",
        widget: "get-involved",
    },
    InfoPage {
        path: "/identification/",
        title: "Identification",
        widget: "identification",
    },
    InfoPage {
        path: "/about/links/",
        title: "Links",
        widget: "about-links",
    },
    InfoPage {
        path: "/about/management/",
        title: "Nest management",
        widget: "about-management",
    },
    InfoPage {
        path: "/about/professional-eradicators/",
        title: "Professional eradicators",
        widget: "about-professional-eradicators",
    },
    InfoPage {
        path: "/about/privacy-policy/",
        title: "Privacy policy",
        widget: "about-privacy-policy",
    },
    InfoPage {
        path: "/about/project/",
        title: "About the project",
        widget: "about-project",
    },
    InfoPage {
        path: "/about/vespa-velutina/",
        title: "About Vespa velutina",
        widget: "about-vespa-velutina",
    },
    InfoPage {
        path: "/obs/add/",
        title: "Add an observation",
        widget: "obs-create",
    },
    InfoPage {
        path: "/obs/individual/add/",
        title: "Report individuals",
        widget: "individual-form",
    },
    InfoPage {
        path: "/obs/nest/add/",
        title: "Report a nest",
        widget: "nest-form",
    },
    InfoPage {
        path: "/login/",
        title: "Log in",
        widget: "login",
    },
];

const NAV: &[(&str, &str)] = &[
    ("/", "Home"),
    ("/obs/", "Observations"),
    ("/obs/add/", "Report"),
    ("/identification/", "Identification"),
    ("/get-involved/", "Get involved"),
    ("/about/project/", "About"),
    ("/management/", "Management"),
];

/// Escapes text for HTML element content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a full page.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if the config cannot be serialized.
pub fn render_page(
    config: &JsConfig,
    title: &str,
    widget: &str,
    attrs: &[(&str, String)],
    body: &str,
) -> Result<String, serde_json::Error> {
    let static_root = escape_html(&config.static_root);
    let mut nav = String::new();
    for (href, label) in NAV {
        let _ = write!(nav, r#"<li><a href="{href}">{label}</a></li>"#);
    }

    let mut data = String::new();
    for (name, value) in attrs {
        let _ = write!(data, r#" data-{name}="{}""#, escape_html(value));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Vespa-Watch</title>
<link rel="stylesheet" href="{static_root}vespawatch.css">
{config_tag}
</head>
<body>
<nav><ul>{nav}</ul></nav>
<main id="app" data-widget="{widget}"{data}>
<h1>{title}</h1>
{body}
</main>
<script src="{static_root}vespawatch.js" defer></script>
</body>
</html>
"#,
        lang = escape_html(&config.current_language_code),
        title = escape_html(title),
        widget = escape_html(widget),
        config_tag = config.script_tag()?,
    ))
}

/// Renders observations as a plain list, used before the widgets load.
#[must_use]
pub fn observation_list(rows: &[ObservationRow]) -> String {
    if rows.is_empty() {
        return "<p>No observations yet.</p>".to_string();
    }

    let mut html = String::from(r#"<ul class="observations">"#);
    for row in rows {
        let kind = match row.kind {
            ObservationKind::Individual => "Individual",
            ObservationKind::Nest => "Nest",
        };
        let _ = write!(
            html,
            r#"<li data-id="{}">{kind} of <em>{}</em>, {} ({})</li>"#,
            row.id,
            escape_html(&row.species_name()),
            escape_html(&row.location),
            row.observation_time.format("%Y-%m-%d"),
        );
    }
    html.push_str("</ul>");
    html
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn found(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

fn login_redirect(next: &str) -> HttpResponse {
    found(&format!("/login/?next={next}"))
}

/// Handler answering `302` to a fixed location.
pub fn redirect_to(
    location: &'static str,
) -> impl Fn() -> std::future::Ready<HttpResponse> + Clone {
    move || std::future::ready(found(location))
}

async fn latest(state: &AppState, req: &HttpRequest, limit: u32) -> Result<String, ApiError> {
    let viewer = auth::current_viewer(req, state.db.as_ref()).await?;
    let query = ObservationQuery {
        limit: Some(limit),
        ..ObservationQuery::default()
    };
    let rows = observations::list_observations(state.db.as_ref(), &query, viewer.scope()).await?;
    Ok(observation_list(&rows))
}

/// `GET /`
pub async fn home(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let body = latest(&state, &req, HOME_OBSERVATIONS).await?;
    Ok(html(render_page(&state.js_config, "Vespa-Watch", "home", &[], &body)?))
}

/// `GET /obs/`
pub async fn latest_observations(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let body = latest(&state, &req, LATEST_OBSERVATIONS).await?;
    Ok(html(render_page(
        &state.js_config,
        "Latest observations",
        "observations",
        &[],
        &body,
    )?))
}

/// Handler for one of the [`INFO_PAGES`].
pub fn info_page(
    page: InfoPage,
) -> impl Fn(web::Data<AppState>) -> std::future::Ready<Result<HttpResponse, ApiError>> + Clone {
    move |state: web::Data<AppState>| {
        std::future::ready(
            render_page(&state.js_config, page.title, page.widget, &[], "")
                .map(html)
                .map_err(ApiError::from),
        )
    }
}

/// `GET /management/`
pub async fn management(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let viewer = auth::current_viewer(&req, state.db.as_ref()).await?;
    if !viewer.is_authenticated() {
        return Ok(login_redirect("/management/"));
    }

    let attrs = [
        ("username", viewer.username.clone().unwrap_or_default()),
        ("is-staff", viewer.is_staff().to_string()),
    ];
    Ok(html(render_page(
        &state.js_config,
        "Management",
        "management",
        &attrs,
        "",
    )?))
}

/// `GET /profile`
pub async fn profile(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let Some(user) = auth::current_user(&req, state.db.as_ref()).await? else {
        return Ok(login_redirect("/profile"));
    };

    let attrs = [
        ("username", user.username.clone()),
        ("email", user.email.clone().unwrap_or_default()),
        (
            "zone-id",
            user.zone_id.map(|z| z.to_string()).unwrap_or_default(),
        ),
    ];
    Ok(html(render_page(
        &state.js_config,
        "Profile",
        "profile",
        &attrs,
        "",
    )?))
}

/// `GET /management/nest/{id}/`
pub async fn nest_detail(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let viewer = auth::current_viewer(&req, state.db.as_ref()).await?;
    if !viewer.is_authenticated() {
        return Ok(login_redirect(&format!("/management/nest/{id}/")));
    }

    let nest = observations::get_observation(state.db.as_ref(), id, viewer.scope())
        .await?
        .filter(|o| o.kind == ObservationKind::Nest)
        .ok_or_else(|| ApiError::not_found("Nest", id))?;

    let attrs = [
        ("nest-id", nest.id.to_string()),
        (
            "action-id",
            nest.action_id.map(|a| a.to_string()).unwrap_or_default(),
        ),
    ];
    let title = format!("Nest {} ({})", nest.id, nest.species_name());
    Ok(html(render_page(
        &state.js_config,
        &title,
        "nest-detail",
        &attrs,
        &observation_list(std::slice::from_ref(&nest)),
    )?))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use vespawatch_database_models::ObserverInfo;
    use vespawatch_settings::Settings;

    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;"
        );
    }

    #[test]
    fn page_embeds_config_and_widget() {
        let config = JsConfig::from_settings(&Settings::default());
        let page = render_page(
            &config,
            "Report a nest",
            "nest-form",
            &[("nest-id", "5".to_string())],
            "",
        )
        .unwrap();

        assert!(page.contains("window.VESPAWATCH = {"));
        assert!(page.contains(r#"data-widget="nest-form""#));
        assert!(page.contains(r#"data-nest-id="5""#));
        assert!(page.contains("<title>Report a nest | Vespa-Watch</title>"));
        assert!(page.contains(r#"<html lang="en">"#));
    }

    #[test]
    fn observation_list_escapes_user_text() {
        let row = ObservationRow {
            id: 1,
            kind: ObservationKind::Individual,
            taxon_id: None,
            taxon_name: Some("Vespa velutina".to_string()),
            location: "<b>Gent</b>".to_string(),
            observation_time: Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap(),
            comments: String::new(),
            latitude: 51.0,
            longitude: 3.7,
            zone_id: None,
            zone_name: None,
            inaturalist_id: None,
            inaturalist_species: None,
            inat_vv_confirmed: None,
            originates_in_vespawatch: true,
            observer: ObserverInfo::default(),
            individual_count: Some(1),
            behaviour: None,
            nest_height: None,
            nest_size: None,
            duplicate_of_id: None,
            action_result: None,
            action_id: None,
            picture_paths: Vec::new(),
            created_at: Utc::now(),
        };

        let html = observation_list(&[row]);
        assert!(html.contains("Individual of <em>Vespa velutina</em>"));
        assert!(html.contains("&lt;b&gt;Gent&lt;/b&gt;"));
        assert!(html.contains("2024-05-03"));
        assert_eq!(observation_list(&[]), "<p>No observations yet.</p>");
    }

    #[actix_web::test]
    async fn form_index_paths_redirect_to_add() {
        use actix_web::{App, test};

        let app = test::init_service(
            App::new()
                .route(
                    "/obs/individual/",
                    web::get().to(redirect_to("/obs/individual/add/")),
                )
                .route("/obs/nest/", web::get().to(redirect_to("/obs/nest/add/"))),
        )
        .await;

        for (from, to) in [
            ("/obs/individual/", "/obs/individual/add/"),
            ("/obs/nest/", "/obs/nest/add/"),
        ] {
            let req = test::TestRequest::get().uri(from).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), actix_web::http::StatusCode::FOUND);
            assert_eq!(resp.headers().get(header::LOCATION).unwrap(), to);
        }
    }

    #[test]
    fn home_lists_four_observations() {
        assert_eq!(HOME_OBSERVATIONS, 4);
        assert!(
            INFO_PAGES
                .iter()
                .any(|p| p.path == "/about/professional-eradicators/")
        );
    }

    #[test]
    fn every_info_page_has_a_trailing_slash() {
        assert!(INFO_PAGES.iter().all(|p| p.path.ends_with('/')));
    }
}
