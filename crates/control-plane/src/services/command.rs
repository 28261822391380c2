// Worker command line
//
// Builds the process the supervisor spawns. The worker is put in its own
// process group so stop signals reach any children it forks.

use locust_dashboard_core::RunParameters;
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use tokio::process::Command;
use uuid::Uuid;

use crate::config::WorkerCommandConfig;

/// Environment variable telling the worker where to post samples
pub const METRICS_URL_ENV: &str = "METRICS_API_URL";
/// Environment variable carrying the run id, so the worker can tag its samples
pub const RUN_ID_ENV: &str = "LOCUST_RUN_ID";

/// Arguments passed after the program name
pub fn worker_argv(config: &WorkerCommandConfig, parameters: &RunParameters) -> Vec<String> {
    let mut args = config.leading_args.clone();
    if let Some(locustfile) = &config.locustfile {
        args.push("-f".to_string());
        args.push(locustfile.display().to_string());
    }
    args.push("--headless".to_string());
    args.extend(parameters.worker_args());
    args
}

/// Ready-to-spawn command for one run
pub fn worker_command(
    config: &WorkerCommandConfig,
    parameters: &RunParameters,
    run_id: Uuid,
) -> Command {
    let mut command = std::process::Command::new(&config.program);
    command
        .args(worker_argv(config, parameters))
        .env(RUN_ID_ENV, run_id.to_string())
        .stdin(Stdio::null())
        .process_group(0);

    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }
    if let Some(url) = &config.metrics_url {
        command.env(METRICS_URL_ENV, url);
    }

    let mut command = Command::from(command);
    command.kill_on_drop(true);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parameters() -> RunParameters {
        RunParameters::new(10, 2, "1m", "http://example.com").unwrap()
    }

    #[test]
    fn test_default_command_line() {
        let argv = worker_argv(&WorkerCommandConfig::default(), &parameters());
        assert_eq!(
            argv,
            vec![
                "-f",
                "locustfile.py",
                "--headless",
                "-u",
                "10",
                "-r",
                "2",
                "-t",
                "1m",
                "--host",
                "http://example.com"
            ]
        );
    }

    #[test]
    fn test_leading_args_and_no_locustfile() {
        let config = WorkerCommandConfig {
            program: "python3".to_string(),
            leading_args: vec!["-m".to_string(), "locust".to_string()],
            locustfile: None,
            ..Default::default()
        };
        let argv = worker_argv(&config, &parameters());
        assert_eq!(&argv[..3], &["-m", "locust", "--headless"]);
        assert!(!argv.contains(&"-f".to_string()));
    }

    #[test]
    fn test_command_program_and_env() {
        let config = WorkerCommandConfig {
            program: "locust".to_string(),
            locustfile: Some(PathBuf::from("/srv/locustfile.py")),
            metrics_url: Some("http://127.0.0.1:8000/api/metrics".to_string()),
            ..Default::default()
        };
        let run_id = Uuid::now_v7();
        let command = worker_command(&config, &parameters(), run_id);
        let std_command = command.as_std();

        assert_eq!(std_command.get_program(), "locust");
        let envs: Vec<_> = std_command.get_envs().collect();
        assert!(envs.iter().any(|(k, v)| *k == METRICS_URL_ENV
            && v.map(|v| v == "http://127.0.0.1:8000/api/metrics").unwrap_or(false)));
        let run_id_text = run_id.to_string();
        assert!(envs.iter().any(|(k, v)| *k == RUN_ID_ENV
            && v.map(|v| v == run_id_text.as_str()).unwrap_or(false)));
    }
}
