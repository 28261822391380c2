// Worker launch and lifecycle configuration

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use super::{env_parse, env_string};

/// How the load-generation worker is launched.
///
/// The final command line is:
/// `<program> <leading_args...> [-f <locustfile>] --headless -u N -r N -t T --host URL`
#[derive(Debug, Clone)]
pub struct WorkerCommandConfig {
    /// Executable to run (`LOCUST_BIN`)
    pub program: String,
    /// Arguments placed before the generated ones (`LOCUST_ARGS`, whitespace-separated)
    pub leading_args: Vec<String>,
    /// Locustfile passed with `-f` (`LOCUST_FILE`); None omits the flag
    pub locustfile: Option<PathBuf>,
    /// Working directory for the worker (`LOCUST_WORKDIR`)
    pub working_dir: Option<PathBuf>,
    /// Exported to the worker as METRICS_API_URL so it knows where to post samples
    pub metrics_url: Option<String>,
    /// Target used when a start request omits `host` (`LOCUST_DEFAULT_HOST`)
    pub default_host: Option<String>,
}

impl Default for WorkerCommandConfig {
    fn default() -> Self {
        Self {
            program: "locust".to_string(),
            leading_args: Vec::new(),
            locustfile: Some(PathBuf::from("locustfile.py")),
            working_dir: None,
            metrics_url: None,
            default_host: None,
        }
    }
}

impl WorkerCommandConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let program = env_string("LOCUST_BIN").unwrap_or(defaults.program);
        let leading_args = env_string("LOCUST_ARGS")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        // LOCUST_FILE="" disables -f entirely (e.g. when LOCUST_ARGS already carries it)
        let locustfile = match std::env::var("LOCUST_FILE") {
            Ok(s) if s.trim().is_empty() => None,
            Ok(s) => Some(PathBuf::from(s.trim())),
            Err(_) => defaults.locustfile,
        };

        let working_dir = env_string("LOCUST_WORKDIR").map(PathBuf::from);
        if let Some(dir) = &working_dir {
            if !dir.is_dir() {
                bail!("LOCUST_WORKDIR {} is not a directory", dir.display());
            }
        }

        let default_host = match env_string("LOCUST_DEFAULT_HOST") {
            Some(host) => Some(locust_dashboard_core::run::validate_host(&host)?),
            None => None,
        };

        Ok(Self {
            program,
            leading_args,
            locustfile,
            working_dir,
            metrics_url: env_string("METRICS_API_URL"),
            default_host,
        })
    }
}

/// Worker lifecycle timeouts
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long a stopped worker gets to exit after SIGINT before SIGKILL
    pub stop_grace: Duration,
    /// How long to wait for exit after SIGKILL before giving up on the wait
    pub kill_wait: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            kill_wait: Duration::from_secs(5),
        }
    }
}

impl SupervisorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stop_grace: env_parse::<u64>("LOCUST_STOP_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stop_grace),
            kill_wait: env_parse::<u64>("LOCUST_KILL_WAIT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.kill_wait),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_command_defaults() {
        let config = WorkerCommandConfig::default();
        assert_eq!(config.program, "locust");
        assert!(config.leading_args.is_empty());
        assert_eq!(config.locustfile, Some(PathBuf::from("locustfile.py")));
        assert!(config.default_host.is_none());
    }

    #[test]
    fn test_supervisor_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.stop_grace, Duration::from_secs(10));
        assert_eq!(config.kill_wait, Duration::from_secs(5));
    }
}
