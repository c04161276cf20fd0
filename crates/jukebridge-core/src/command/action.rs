use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, PathsConfig, ServicesConfig, SystemConfig};
use crate::{Error, Result};

/// A service the daemon can start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Rfid,
    Gpio,
}

impl Service {
    #[must_use]
    pub fn unit(self, services: &ServicesConfig) -> &str {
        match self {
            Service::Rfid => &services.rfid_unit,
            Service::Gpio => &services.gpio_unit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceVerb {
    Start,
    Stop,
}

impl ServiceVerb {
    /// `start` or `stop`, any case.
    #[must_use]
    pub fn parse(parameter: &str) -> Option<Self> {
        match parameter.to_lowercase().as_str() {
            "start" => Some(ServiceVerb::Start),
            "stop" => Some(ServiceVerb::Stop),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceVerb::Start => "start",
            ServiceVerb::Stop => "stop",
        }
    }
}

/// A validated side effect requested by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Service {
        service: Service,
        verb: ServiceVerb,
    },
    SwipeCard {
        card_id: String,
    },
    PlayFolder {
        folder: String,
        recursive: bool,
    },
    Playout {
        command: &'static str,
        value: Option<String>,
    },
}

/// Program and argument vector of an action. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Action {
    #[must_use]
    pub fn invocation(
        &self,
        paths: &PathsConfig,
        services: &ServicesConfig,
        system: &SystemConfig,
    ) -> Invocation {
        match self {
            Action::Service { service, verb } => Invocation {
                program: system.sudo.clone(),
                args: vec![
                    system.systemctl.clone().into_os_string(),
                    verb.as_str().into(),
                    service.unit(services).into(),
                ],
            },
            Action::SwipeCard { card_id } => Invocation {
                program: paths.trigger_play(),
                args: vec![format!("-i={card_id}").into()],
            },
            Action::PlayFolder { folder, recursive } => {
                let mut args: Vec<OsString> = vec![format!("-d={folder}").into()];
                if *recursive {
                    args.push("-v=recursive".into());
                }
                Invocation {
                    program: paths.trigger_play(),
                    args,
                }
            }
            Action::Playout { command, value } => {
                let mut args: Vec<OsString> = vec![format!("-c={command}").into()];
                if let Some(value) = value {
                    args.push(format!("-v={value}").into());
                }
                Invocation {
                    program: paths.playout_controls(),
                    args,
                }
            }
        }
    }
}

/// Runs actions without reporting their outcome to the caller.
pub trait ActionRunner: Send + Sync {
    /// Start `action` and return immediately.
    fn run(&self, action: Action);
}

/// Runs actions as child processes, one at a time, in the order given.
///
/// A single worker task waits for each child before starting the next, so a
/// later `setvolume` can never land before an earlier one.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    paths: PathsConfig,
    services: ServicesConfig,
    system: SystemConfig,
    queue: mpsc::UnboundedSender<Invocation>,
}

impl ScriptRunner {
    /// Start the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn(config: &Config) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(rx));
        Self {
            paths: config.paths.clone(),
            services: config.services.clone(),
            system: config.system.clone(),
            queue,
        }
    }
}

impl ActionRunner for ScriptRunner {
    fn run(&self, action: Action) {
        let invocation = action.invocation(&self.paths, &self.services, &self.system);
        info!("Running {:?}", action);

        if self.queue.send(invocation).is_err() {
            warn!("Action worker stopped, dropping {:?}", action);
        }
    }
}

async fn run_queue(mut rx: mpsc::UnboundedReceiver<Invocation>) {
    while let Some(invocation) = rx.recv().await {
        execute(&invocation).await;
    }
    debug!("Action worker stopped");
}

async fn execute(invocation: &Invocation) {
    let program = invocation.program.display().to_string();
    let mut child = match spawn(invocation) {
        Ok(child) => child,
        Err(e) => {
            warn!("{}", e);
            return;
        }
    };

    if let Some(stderr) = child.stderr.take() {
        spawn_stderr_logger(program.clone(), stderr);
    }

    match child.wait().await {
        Ok(status) if status.success() => debug!("{} finished", program),
        Ok(status) => warn!("{} exited with {}", program, status),
        Err(e) => warn!("Failed to wait for {}: {}", program, e),
    }
}

fn spawn(invocation: &Invocation) -> Result<Child> {
    Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::Process(format!(
                "Failed to spawn {}: {}",
                invocation.program.display(),
                e
            ))
        })
}

fn spawn_stderr_logger(program: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{}] stderr: {}", program, line);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(action: &Action) -> Invocation {
        let config = Config::default();
        action.invocation(&config.paths, &config.services, &config.system)
    }

    fn args(invocation: &Invocation) -> Vec<&str> {
        invocation
            .args
            .iter()
            .map(|a| a.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_service_verb_is_case_insensitive() {
        assert_eq!(ServiceVerb::parse("START"), Some(ServiceVerb::Start));
        assert_eq!(ServiceVerb::parse("Stop"), Some(ServiceVerb::Stop));
        assert_eq!(ServiceVerb::parse("maybe"), None);
        assert_eq!(ServiceVerb::parse(""), None);
    }

    #[test]
    fn test_service_invocation() {
        let inv = invocation(&Action::Service {
            service: Service::Gpio,
            verb: ServiceVerb::Stop,
        });
        assert_eq!(inv.program, PathBuf::from("sudo"));
        assert_eq!(
            args(&inv),
            vec!["/bin/systemctl", "stop", "phoniebox-gpio-control.service"]
        );
    }

    #[test]
    fn test_swipe_card_keeps_payload_in_one_argument() {
        let inv = invocation(&Action::SwipeCard {
            card_id: "123; rm -rf /".to_string(),
        });
        assert!(inv.program.ends_with("rfid_trigger_play.sh"));
        assert_eq!(args(&inv), vec!["-i=123; rm -rf /"]);
    }

    #[test]
    fn test_folder_invocation() {
        let plain = invocation(&Action::PlayFolder {
            folder: "Kids Songs".to_string(),
            recursive: false,
        });
        assert_eq!(args(&plain), vec!["-d=Kids Songs"]);

        let recursive = invocation(&Action::PlayFolder {
            folder: "Audiobooks".to_string(),
            recursive: true,
        });
        assert_eq!(args(&recursive), vec!["-d=Audiobooks", "-v=recursive"]);
    }

    #[test]
    fn test_playout_invocation() {
        let plain = invocation(&Action::Playout {
            command: "volumeup",
            value: None,
        });
        assert!(plain.program.ends_with("playout_controls.sh"));
        assert_eq!(args(&plain), vec!["-c=volumeup"]);

        let with_value = invocation(&Action::Playout {
            command: "setvolume",
            value: Some("40".to_string()),
        });
        assert_eq!(args(&with_value), vec!["-c=setvolume", "-v=40"]);
    }

    #[tokio::test]
    async fn test_spawn_missing_program_is_process_error() {
        let inv = Invocation {
            program: PathBuf::from("/nonexistent/playout_controls.sh"),
            args: Vec::new(),
        };
        assert!(matches!(spawn(&inv), Err(Error::Process(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_runner_keeps_arrival_order() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("volume.log");
        let script = dir.path().join("playout_controls.sh");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n[ \"$2\" = \"-v=30\" ] && sleep 0.3\necho \"${{2#-v=}}\" >> {}\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = Config::default();
        config.paths.scripts_dir = dir.path().to_path_buf();
        let runner = ScriptRunner::spawn(&config);

        for value in ["30", "40"] {
            runner.run(Action::Playout {
                command: "setvolume",
                value: Some(value.to_string()),
            });
        }

        let mut lines = Vec::new();
        for _ in 0..100 {
            lines = std::fs::read_to_string(&log)
                .unwrap_or_default()
                .lines()
                .map(ToString::to_string)
                .collect();
            if lines.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(lines, vec!["30".to_string(), "40".to_string()]);
    }
}
