//! Interactive mode for the server.
//!
//! Prompts for the bind address and port before starting the server.

use dialoguer::{Confirm, Input};
use vespawatch_settings::Settings;

/// Runs the server in interactive mode, prompting for configuration.
///
/// The configured address and port are offered as defaults; the answers
/// override them for this run only.
///
/// # Errors
///
/// Returns an error if the server fails to start.
#[allow(clippy::future_not_send)]
pub async fn run(mut settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    println!("Vespa-Watch Server");
    println!();

    settings.server.bind_addr = Input::new()
        .with_prompt("Bind address")
        .default(settings.server.bind_addr.clone())
        .interact_text()
        .unwrap_or_else(|_| settings.server.bind_addr.clone());

    settings.server.port = Input::new()
        .with_prompt("Port")
        .default(settings.server.port)
        .interact_text()
        .unwrap_or(settings.server.port);

    let addr = format!("{}:{}", settings.server.bind_addr, settings.server.port);
    if !Confirm::new()
        .with_prompt(format!("Start server on {addr}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server(settings).await
}
