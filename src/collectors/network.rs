//! Network state: interfaces with counters, ARP cache, routing table,
//! open connections, and an optional timed traffic-counter capture.

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{bounded, RecvTimeoutError};
use log::debug;
use serde::{Deserialize, Serialize};
use sysinfo::{NetworkExt, NetworksExt, System, SystemExt};

use super::artifacts::ModuleCore;
use super::collector::{CollectionModule, ModuleContext};
use crate::config::ModuleSettings;
use crate::constants::{CAPTURE_JOIN_GRACE_SECS, CAPTURE_SAMPLE_INTERVAL_MS};
use crate::models::{ModuleInfo, ModuleState};
use crate::orchestrator::CancellationToken;

pub const MODULE_ID: &str = "network";

/// Network interface information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: String,
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
    pub received_packets: u64,
    pub transmitted_packets: u64,
    pub errors_on_received: u64,
    pub errors_on_transmitted: u64,
}

/// One sample of the traffic capture job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSample {
    pub elapsed_ms: u64,
    pub interface: String,
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

/// A platform command whose output becomes one artifact
struct CommandSpec {
    file_name: &'static str,
    program: &'static str,
    args: &'static [&'static str],
}

#[cfg(target_os = "linux")]
const COMMANDS: &[CommandSpec] = &[
    CommandSpec { file_name: "arp_cache.txt", program: "ip", args: &["neigh", "show"] },
    CommandSpec { file_name: "routing_table.txt", program: "ip", args: &["route", "show"] },
    CommandSpec { file_name: "connections.txt", program: "ss", args: &["-tunap"] },
];

#[cfg(target_os = "macos")]
const COMMANDS: &[CommandSpec] = &[
    CommandSpec { file_name: "arp_cache.txt", program: "arp", args: &["-a"] },
    CommandSpec { file_name: "routing_table.txt", program: "netstat", args: &["-rn"] },
    CommandSpec { file_name: "connections.txt", program: "netstat", args: &["-an"] },
];

#[cfg(target_os = "windows")]
const COMMANDS: &[CommandSpec] = &[
    CommandSpec { file_name: "arp_cache.txt", program: "arp", args: &["-a"] },
    CommandSpec { file_name: "routing_table.txt", program: "route", args: &["print"] },
    CommandSpec { file_name: "connections.txt", program: "netstat", args: &["-ano"] },
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const COMMANDS: &[CommandSpec] = &[];

pub struct NetworkModule {
    core: ModuleCore,
    capture: Duration,
}

impl NetworkModule {
    /// `capture_seconds` (default 0) enables the timed traffic capture.
    pub fn new(settings: &ModuleSettings) -> Result<Self> {
        let capture_secs = match settings.get("capture_seconds") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("Invalid capture_seconds value: {}", value))?,
            None => 0,
        };

        Ok(Self {
            core: ModuleCore::new(Self::info()),
            capture: Duration::from_secs(capture_secs),
        })
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo::new(
            MODULE_ID,
            "Network",
            env!("CARGO_PKG_VERSION"),
            "Interfaces, ARP cache, routing table, connections and optional traffic capture",
        )
    }

    fn collect(&mut self, ctx: &ModuleContext) -> Result<()> {
        let mut system = System::new();
        system.refresh_networks_list();
        system.refresh_networks();

        let interfaces = collect_interfaces(&system);
        ctx.log.info(MODULE_ID, &format!("Found {} network interfaces", interfaces.len()));
        self.core.write_json(ctx, "interfaces.json", &interfaces)?;
        self.core.set_progress(20.0);

        for (i, spec) in COMMANDS.iter().enumerate() {
            match run_command(spec.program, spec.args) {
                Ok(output) => {
                    self.core.write_text(ctx, spec.file_name, &output)?;
                }
                Err(e) => ctx.log.warning(
                    MODULE_ID,
                    &format!("Skipping {}: {:#}", spec.file_name, e),
                ),
            }
            self.core
                .set_progress(20.0 + 40.0 * (i + 1) as f32 / COMMANDS.len().max(1) as f32);
        }

        if !self.capture.is_zero() {
            ctx.log.info(
                MODULE_ID,
                &format!("Starting {}s traffic capture", self.capture.as_secs()),
            );
            match run_timed_capture(
                self.capture,
                Duration::from_millis(CAPTURE_SAMPLE_INTERVAL_MS),
                Duration::from_secs(CAPTURE_JOIN_GRACE_SECS),
                ctx.cancel.clone(),
            ) {
                Ok(samples) => {
                    ctx.log.info(MODULE_ID, &format!("Captured {} traffic samples", samples.len()));
                    self.core.write_text(ctx, "traffic_capture.csv", &samples_to_csv(&samples))?;
                }
                Err(e) => ctx.log.warning(MODULE_ID, &format!("Traffic capture failed: {:#}", e)),
            }
        }
        self.core.set_progress(80.0);

        self.core.finalize(ctx)?;
        self.core.set_progress(100.0);
        ctx.log.success(MODULE_ID, "Network collection completed");
        Ok(())
    }
}

impl CollectionModule for NetworkModule {
    fn initialize(&mut self, ctx: &ModuleContext) -> Result<()> {
        self.core.prepare_dir(ctx)?;
        Ok(())
    }

    fn execute(&mut self, ctx: &ModuleContext) -> Result<()> {
        self.core.set_state(ModuleState::Running);
        let result = self.collect(ctx);
        self.core.set_state(if result.is_ok() {
            ModuleState::Completed
        } else {
            ModuleState::Failed
        });
        result
    }

    fn cleanup(&mut self, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }

    fn get_status(&self) -> ModuleState {
        self.core.state()
    }

    fn get_progress(&self) -> f32 {
        self.core.progress()
    }

    fn get_module_info(&self) -> ModuleInfo {
        self.core.info().clone()
    }
}

/// Collect network interfaces with their counters, ordered by name
pub fn collect_interfaces(system: &System) -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = system
        .networks()
        .iter()
        .map(|(name, data)| NetworkInterface {
            name: name.to_string(),
            mac: data.mac_address().to_string(),
            received_bytes: data.total_received(),
            transmitted_bytes: data.total_transmitted(),
            received_packets: data.total_packets_received(),
            transmitted_packets: data.total_packets_transmitted(),
            errors_on_received: data.total_errors_on_received(),
            errors_on_transmitted: data.total_errors_on_transmitted(),
        })
        .collect();

    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

fn run_command(program: &str, args: &[&str]) -> Result<String> {
    debug!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .context(format!("Failed to execute {}", program))?;

    if !output.status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Sample interface counters on a background thread for `duration`.
///
/// The job stops early when `cancel` fires. The caller waits at most
/// `duration + grace`; a job still running after that is abandoned.
pub fn run_timed_capture(
    duration: Duration,
    interval: Duration,
    grace: Duration,
    cancel: CancellationToken,
) -> Result<Vec<TrafficSample>> {
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name("network-capture".to_string())
        .spawn(move || {
            let samples = sample_counters(duration, interval, &cancel);
            let _ = tx.send(samples);
        })
        .context("Failed to spawn capture job")?;

    match rx.recv_timeout(duration + grace) {
        Ok(samples) => Ok(samples),
        Err(RecvTimeoutError::Timeout) => Err(anyhow!(
            "Capture job did not finish within {}s",
            (duration + grace).as_secs()
        )),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("Capture job terminated unexpectedly")),
    }
}

fn sample_counters(duration: Duration, interval: Duration, cancel: &CancellationToken) -> Vec<TrafficSample> {
    let started = Instant::now();
    let mut system = System::new();
    system.refresh_networks_list();
    let mut samples = Vec::new();

    loop {
        system.refresh_networks();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        for (name, data) in system.networks() {
            samples.push(TrafficSample {
                elapsed_ms,
                interface: name.to_string(),
                received_bytes: data.received(),
                transmitted_bytes: data.transmitted(),
            });
        }

        if cancel.is_cancelled() || started.elapsed() >= duration {
            break;
        }
        thread::sleep(interval.min(duration.saturating_sub(started.elapsed())));
    }

    samples
}

fn samples_to_csv(samples: &[TrafficSample]) -> String {
    let mut csv = String::from("Elapsed_Ms,Interface,Received_Bytes,Transmitted_Bytes\n");
    for s in samples {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            s.elapsed_ms, s.interface, s.received_bytes, s.transmitted_bytes
        ));
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_capture_setting_is_rejected() {
        let mut settings = ModuleSettings::new();
        settings.insert("capture_seconds".into(), "soon".into());
        assert!(NetworkModule::new(&settings).is_err());

        settings.insert("capture_seconds".into(), " 3 ".into());
        assert_eq!(NetworkModule::new(&settings).unwrap().capture, Duration::from_secs(3));
    }

    #[test]
    fn test_capture_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let samples = run_timed_capture(
            Duration::from_secs(30),
            Duration::from_millis(50),
            Duration::from_secs(1),
            cancel,
        )
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(samples.iter().all(|s| s.elapsed_ms < 5_000));
    }

    #[test]
    fn test_capture_runs_for_duration() {
        let started = Instant::now();
        run_timed_capture(
            Duration::from_millis(300),
            Duration::from_millis(100),
            Duration::from_secs(2),
            CancellationToken::new(),
        )
        .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_samples_csv() {
        let csv = samples_to_csv(&[TrafficSample {
            elapsed_ms: 1000,
            interface: "eth0".into(),
            received_bytes: 10,
            transmitted_bytes: 20,
        }]);
        assert_eq!(csv.lines().nth(1), Some("1000,eth0,10,20"));
    }
}
