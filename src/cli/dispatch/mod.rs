use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --jwt-secret"))?;

    let config = AuthConfig::new(base_url, SecretString::from(jwt_secret))
        .with_session_ttl_days(
            matches
                .get_one::<i64>("session-ttl-days")
                .copied()
                .unwrap_or(7),
        )
        .with_production(matches.get_flag("production"));

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        config,
    })
}
