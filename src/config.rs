use crate::login::DEFAULT_ACCESS_CODE;
use crate::record::{DatasetKind, Tribe, default_tribes};
use std::env;
use std::path::PathBuf;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STATIC_DIR: &str = "static";

/// Runtime settings, read from the environment with fallbacks.
///
/// | variable             | default                    |
/// |----------------------|----------------------------|
/// | `TRIBES_DATA_DIR`    | `.`                        |
/// | `TRIBES_ACCESS_CODE` | `1247`                     |
/// | `TRIBES_TRIBES`      | `Tribo Levi,Tribo Judá`    |
/// | `TRIBES_HOST`        | `127.0.0.1`                |
/// | `PORT`               | `3000`                     |
/// | `TRIBES_STATIC_DIR`  | `static`                   |
///
/// Empty values count as unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub access_code: String,
    pub tribes: Vec<Tribe>,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            access_code: DEFAULT_ACCESS_CODE.to_string(),
            tribes: default_tribes(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Config::default();

        let tribes = get("TRIBES_TRIBES")
            .map(|list| list.split(',').filter_map(Tribe::new).collect::<Vec<_>>())
            .filter(|tribes| !tribes.is_empty())
            .unwrap_or(defaults.tribes);

        let port = match get("PORT") {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                log::warn!("ignoring PORT={}, using {}", value, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Config {
            data_dir: get("TRIBES_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            access_code: get("TRIBES_ACCESS_CODE").unwrap_or(defaults.access_code),
            tribes,
            host: get("TRIBES_HOST").unwrap_or(defaults.host),
            port,
            static_dir: get("TRIBES_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn data_file(&self, kind: DatasetKind) -> PathBuf {
        self.data_dir.join(kind.default_file_name())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
