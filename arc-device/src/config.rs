use std::{path::PathBuf, time::Duration};

use arc_protocol::ApiVersion;

/// Device names the ARC kernel drivers register on Linux
pub const DEFAULT_DEVICE_NAMES: [&str; 2] = ["AstroPCIe", "Arc66PCIe"];

/// Runtime settings for the PCIe driver.
///
/// Created once at process start and passed by value to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// How long to wait for a command reply
    pub reply_timeout: Duration,
    /// How long to wait for the controller id
    pub id_timeout: Duration,
    /// Directory scanned for device nodes
    pub device_dir: PathBuf,
    /// Substrings identifying ARC device nodes
    pub device_names: Vec<String>,
    /// Passed to the OS open call unchanged
    pub open_flags: u64,
    /// Log every command with its reply at info level
    pub log_commands: bool,
    pub version: ApiVersion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(1500),
            id_timeout: Duration::from_millis(500),
            device_dir: PathBuf::from("/dev"),
            device_names: DEFAULT_DEVICE_NAMES.iter().map(|s| s.to_string()).collect(),
            open_flags: 0,
            log_commands: false,
            version: ApiVersion::current(),
        }
    }
}

impl Config {
    /// The library banner, e.g. `ARC Gen III Base API Library. [ Version: 3.6.2 ]`
    pub fn banner(&self) -> String {
        format!("ARC Gen III Base API Library. [ Version: {} ]", self.version)
    }
}

/// Builder to create a [Config] instance
///
/// # Example
///
/// ```
/// use arc_device::config::Builder;
/// use std::time::Duration;
///
/// let config = Builder::new()
///     .reply_timeout(Duration::from_secs(3))
///     .log_commands(true)
///     .build();
/// assert!(config.log_commands);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the time to wait for a command reply
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// Set the time to wait for the controller id
    pub fn id_timeout(mut self, timeout: Duration) -> Self {
        self.config.id_timeout = timeout;
        self
    }

    /// Set the directory that is scanned for device nodes
    pub fn device_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.device_dir = dir.into();
        self
    }

    /// Replace the device name substrings to look for
    pub fn device_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.device_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn open_flags(mut self, flags: u64) -> Self {
        self.config.open_flags = flags;
        self
    }

    /// Log every command and its reply
    pub fn log_commands(mut self, enable: bool) -> Self {
        self.config.log_commands = enable;
        self
    }

    /// Build and return the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.reply_timeout, Duration::from_millis(1500));
    assert_eq!(config.id_timeout, Duration::from_millis(500));
    assert_eq!(config.device_dir, PathBuf::from("/dev"));
    assert_eq!(config.device_names, vec!["AstroPCIe", "Arc66PCIe"]);
    assert!(!config.log_commands);
}

#[test]
fn banner_carries_version() {
    assert_eq!(
        Config::default().banner(),
        "ARC Gen III Base API Library. [ Version: 3.6.2 ]"
    );
}

#[test]
fn builder_overrides() {
    let config = Builder::new()
        .device_dir("/tmp/devs")
        .device_names(["ArcSim"])
        .open_flags(0o4000)
        .id_timeout(Duration::from_millis(20))
        .build();
    assert_eq!(config.device_dir, PathBuf::from("/tmp/devs"));
    assert_eq!(config.device_names, vec!["ArcSim"]);
    assert_eq!(config.open_flags, 0o4000);
    assert_eq!(config.id_timeout, Duration::from_millis(20));
    assert_eq!(config.reply_timeout, Duration::from_millis(1500));
}
