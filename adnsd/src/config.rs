//! Configuration loading: a config file merged with `ADNSD_*`
//! environment variables, the environment always winning.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Path to a single zone master file.
    pub zonefile: Option<PathBuf>,
    /// Path to a directory of zone master files, merged together.
    pub zones_dir: Option<PathBuf>,
    pub port: u16,
    /// Either an IPv4 or an IPv6 address; dual-stack listening is not
    /// supported, matching a single UDP socket's address family.
    pub interface: IpAddr,
    pub daemon: bool,
    pub write_pid: bool,
    pub pid_file: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            zonefile: None,
            zones_dir: None,
            port: 53,
            interface: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            daemon: false,
            write_pid: false,
            pid_file: PathBuf::from("/var/run/adnsd.pid"),
            log_file: None,
            log_level: "info".to_string(),
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from `path`, if given, then apply any `ADNSD_*`
    /// environment variable overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }

        builder
            .add_source(Environment::with_prefix("ADNSD").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// The single source (file or directory) the zone loader should
    /// read from.  `zones_dir` takes precedence if both are set.
    pub fn zone_source(&self) -> Option<&Path> {
        self.zones_dir
            .as_deref()
            .or(self.zonefile.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let settings = Settings::default();
        assert_eq!(53, settings.port);
        assert!(settings.zone_source().is_none());
    }

    #[test]
    fn zones_dir_takes_precedence_over_zonefile() {
        let mut settings = Settings::default();
        settings.zonefile = Some(PathBuf::from("/a/single.zone"));
        settings.zones_dir = Some(PathBuf::from("/a/dir"));
        assert_eq!(Some(Path::new("/a/dir")), settings.zone_source());
    }

    #[test]
    fn env_override_wins_over_file() {
        std::env::set_var("ADNSD_PORT", "5353");
        let settings = Settings::load(None).unwrap();
        std::env::remove_var("ADNSD_PORT");
        assert_eq!(5353, settings.port);
    }
}
