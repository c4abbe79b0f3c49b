use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;
use thiserror::Error;

/// Shortest accepted JWT signing key, in bytes. HS256 wants at least 256 bits.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Longest accepted login lifetime, in seconds.
pub const MAX_AUTH_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Server settings, read from `Rocket.toml` or `ROCKET_*` environment variables.
///
/// Values are checked on extraction, so a server with a missing or unusable setting never launches.
#[derive(Debug, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct Config {
    jwt_secret: String,
    auth_ttl: Duration,
}

impl Config {
    /// Key used to sign JWTs.
    /// Configured via `JWT_SECRET`.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// How long an authentication token stays valid.
    /// Configured in seconds via `AUTH_TTL`.
    pub fn auth_ttl(&self) -> Duration {
        self.auth_ttl
    }
}

/// Settings exactly as written in the configuration sources.
#[derive(Deserialize)]
struct RawConfig {
    jwt_secret: String,
    auth_ttl: u64,
}

/// Reasons the configuration is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`jwt_secret` must be at least {MIN_JWT_SECRET_LENGTH} bytes")]
    WeakJwtSecret,
    #[error("`auth_ttl` must be between 1 and {MAX_AUTH_TTL_SECONDS} seconds, got {0}")]
    AuthTtlOutOfRange(u64),
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        if raw.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::WeakJwtSecret);
        }
        let out_of_range = ConfigError::AuthTtlOutOfRange(raw.auth_ttl);
        if raw.auth_ttl == 0 || raw.auth_ttl > MAX_AUTH_TTL_SECONDS {
            return Err(out_of_range);
        }
        let seconds = i64::try_from(raw.auth_ttl).map_err(|_| out_of_range)?;
        Ok(Self {
            jwt_secret: raw.jwt_secret,
            auth_ttl: Duration::seconds(seconds),
        })
    }
}

/// Loads and checks the [`Config`], then puts it in managed state.
/// Ignition fails if it is missing or invalid.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        match rocket.figment().extract::<Config>() {
            Ok(config) => Ok(rocket.manage(config)),
            Err(err) => {
                error!("Refusing to launch with the current configuration");
                rocket::config::pretty_print_error(err);
                Err(rocket)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use rocket::figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    use super::*;

    fn figment(jwt_secret: &str, auth_ttl: u64) -> Figment {
        Figment::new()
            .merge(Serialized::default("jwt_secret", jwt_secret))
            .merge(Serialized::default("auth_ttl", auth_ttl))
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn valid_config() {
        let config: Config = figment(SECRET, 3600).extract().unwrap();
        assert_eq!(config.jwt_secret(), SECRET.as_bytes());
        assert_eq!(config.auth_ttl(), Duration::hours(1));
    }

    #[test]
    fn short_secrets_are_rejected() {
        let raw = RawConfig {
            jwt_secret: "change me".to_string(),
            auth_ttl: 3600,
        };
        assert_eq!(Config::try_from(raw).unwrap_err(), ConfigError::WeakJwtSecret);
        assert!(figment("", 3600).extract::<Config>().is_err());
    }

    #[test]
    fn unusable_ttls_are_rejected() {
        for auth_ttl in [0, MAX_AUTH_TTL_SECONDS + 1, i64::MAX as u64 + 1, u64::MAX] {
            let raw = RawConfig {
                jwt_secret: SECRET.to_string(),
                auth_ttl,
            };
            assert_eq!(
                Config::try_from(raw).unwrap_err(),
                ConfigError::AuthTtlOutOfRange(auth_ttl)
            );
            assert!(figment(SECRET, auth_ttl).extract::<Config>().is_err());
        }

        let longest: Config = figment(SECRET, MAX_AUTH_TTL_SECONDS).extract().unwrap();
        assert_eq!(longest.auth_ttl(), Duration::days(365));
    }

    #[test]
    fn release_profile_ships_no_secret() {
        let shipped = Figment::from(Toml::file("Rocket.toml").nested());

        let release = shipped.clone().select("release");
        assert!(release.extract_inner::<String>("jwt_secret").is_err());
        assert!(release.extract::<Config>().is_err());

        let debug = shipped.select("debug");
        assert!(debug.extract::<Config>().is_ok());
    }
}
