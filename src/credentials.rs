use anyhow::{anyhow, Result};
use log::info;
use std::env;
use std::time::Duration;

use chatline::ChatConfig;

use crate::{utils, Args};

pub const ENV_BASE_URL: &str = "CHATLINE_BASE_URL";
pub const ENV_API_KEY: &str = "CHATLINE_API_KEY";
pub const ENV_PHONE: &str = "CHATLINE_PHONE";
pub const ENV_TEMP_TOKEN: &str = "CHATLINE_TEMP_TOKEN";

/// Command line value, then environment variable, then an interactive prompt.
fn resolve(arg: &Option<String>, var: &str, prompt: &str) -> String {
    if let Some(value) = arg {
        return value.clone();
    }
    env::var(var).unwrap_or_else(|_| {
        eprintln!("{}", prompt);
        utils::read_line().unwrap_or_default()
    })
}

/// Phone and temporary token are only prompted for when a login will actually happen.
pub fn resolve_config(args: &Args, needs_login: bool) -> Result<ChatConfig> {
    let base_url = resolve(
        &args.base_url,
        ENV_BASE_URL,
        "Enter chat backend URL (e.g., https://chat.example.com/api):",
    );
    if base_url.is_empty() {
        return Err(anyhow!("A backend URL is required"));
    }

    let api_key = resolve(&args.api_key, ENV_API_KEY, "Enter API key:");
    let (phone, temporary_token) = if needs_login {
        (
            resolve(&args.phone, ENV_PHONE, "Enter phone number:"),
            resolve(
                &args.temp_token,
                ENV_TEMP_TOKEN,
                "Enter temporary login token (input will be shown):",
            ),
        )
    } else {
        (
            args.phone.clone().or_else(|| env::var(ENV_PHONE).ok()).unwrap_or_default(),
            args.temp_token.clone().or_else(|| env::var(ENV_TEMP_TOKEN).ok()).unwrap_or_default(),
        )
    };

    info!("Using backend {} for {}", base_url, phone);

    Ok(ChatConfig::new(&base_url, &api_key)
        .with_login(&phone, &temporary_token)
        .with_poll_interval(Duration::from_secs(args.poll_secs.max(1))))
}
