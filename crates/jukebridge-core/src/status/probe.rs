use std::ffi::OsStr;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::jobs::{JobQueue, parse_atq};
use super::player::{PlayerStatus, query_player};
use super::system::{parse_temperature, parse_throttled, service_running};
use crate::Result;
use crate::config::{Config, PathsConfig, PlayerConfig, ServicesConfig, SystemConfig};

/// Upper bound for any single helper command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything one probe cycle gathered, before normalization.
///
/// `None` marks a sub-probe that failed or produced nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatus {
    pub player: PlayerStatus,
    pub max_volume: Option<String>,
    pub vol_step: Option<String>,
    pub idle_time: Option<String>,
    pub last_card: Option<String>,
    pub rfid_running: bool,
    pub gpio_running: bool,
    pub jobs: JobQueue,
    pub throttled: Option<u32>,
    pub temperature: Option<String>,
}

/// Source of raw status snapshots.
pub trait StatusSource: Send + Sync {
    /// Gather one snapshot.
    ///
    /// # Errors
    ///
    /// Fails only when the player cannot be reached; every other sub-probe
    /// degrades to an empty value.
    fn probe(&self) -> impl Future<Output = Result<RawStatus>> + Send;
}

/// Probes the player over TCP and the OS through helper commands.
#[derive(Debug, Clone)]
pub struct Prober {
    player: PlayerConfig,
    paths: PathsConfig,
    services: ServicesConfig,
    system: SystemConfig,
}

impl Prober {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            player: config.player.clone(),
            paths: config.paths.clone(),
            services: config.services.clone(),
            system: config.system.clone(),
        }
    }

    async fn playout_value(&self, query: &str) -> Option<String> {
        let script = self.paths.playout_controls();
        command_output(&script, [format!("-c={query}")]).await
    }

    async fn last_card(&self) -> Option<String> {
        let path = self.paths.latest_card_file();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => non_empty(&content),
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn unit_running(&self, unit: &str) -> bool {
        command_output(&self.system.systemctl, ["status", unit])
            .await
            .is_some_and(|output| service_running(&output))
    }

    async fn queued_job(&self, queue: char) -> Option<chrono::NaiveTime> {
        let atq = self.system.atq.as_os_str();
        let letter = queue.to_string();
        let args: [&OsStr; 3] = [atq, OsStr::new("-q"), OsStr::new(&letter)];
        let output = command_output(&self.system.sudo, args).await?;
        parse_atq(&output)
    }

    async fn jobs(&self) -> JobQueue {
        let (stop_after, shutdown_after, shutdown_volume_reduction, idle) = tokio::join!(
            self.queued_job(JobQueue::STOP_AFTER),
            self.queued_job(JobQueue::SHUTDOWN_AFTER),
            self.queued_job(JobQueue::SHUTDOWN_VOLUME_REDUCTION),
            self.queued_job(JobQueue::IDLE),
        );
        JobQueue {
            stop_after,
            shutdown_after,
            shutdown_volume_reduction,
            idle,
        }
    }

    async fn throttled(&self) -> Option<u32> {
        let output = command_output(&self.system.vcgencmd, ["get_throttled"]).await?;
        let code = parse_throttled(&output);
        if code.is_none() {
            debug!("Unexpected get_throttled output: {}", output);
        }
        code
    }

    async fn temperature(&self) -> Option<String> {
        let output = command_output(&self.system.vcgencmd, ["measure_temp"]).await?;
        parse_temperature(&output)
    }
}

impl StatusSource for Prober {
    async fn probe(&self) -> Result<RawStatus> {
        let player = query_player(&self.player).await?;

        let (
            max_volume,
            vol_step,
            idle_time,
            last_card,
            rfid_running,
            gpio_running,
            jobs,
            throttled,
            temperature,
        ) = tokio::join!(
            self.playout_value("getmaxvolume"),
            self.playout_value("getvolstep"),
            self.playout_value("getidletime"),
            self.last_card(),
            self.unit_running(&self.services.rfid_unit),
            self.unit_running(&self.services.gpio_unit),
            self.jobs(),
            self.throttled(),
            self.temperature(),
        );

        Ok(RawStatus {
            player,
            max_volume,
            vol_step,
            idle_time,
            last_card,
            rfid_running,
            gpio_running,
            jobs,
            throttled,
            temperature,
        })
    }
}

/// Trimmed stdout of a helper command, `None` if it could not run or printed
/// nothing.
///
/// A non-zero exit still yields its output: `systemctl status` exits 3 for a
/// stopped unit and `atq` prints nothing for an empty queue.
async fn command_output<I, S>(program: &Path, args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(COMMAND_TIMEOUT, command.output()).await {
        Ok(Ok(output)) => non_empty(&String::from_utf8_lossy(&output.stdout)),
        Ok(Err(e)) => {
            debug!("Failed to run {}: {}", program.display(), e);
            None
        }
        Err(_) => {
            warn!(
                "{} did not finish within {:?}",
                program.display(),
                COMMAND_TIMEOUT
            );
            None
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Trimmed contents of a small text file, `-` if unreadable or empty.
///
/// Used for the version and edition stamps announced on connect.
#[must_use]
pub fn read_stamp(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| non_empty(&content))
        .unwrap_or_else(|| super::SENTINEL.to_string())
}
