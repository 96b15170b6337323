//! Live system state: host and CPU details, running processes, memory,
//! disks and the collector's environment, gathered with `sysinfo`.

pub mod models;

use anyhow::Result;
use log::debug;
use sysinfo::{CpuExt, DiskExt, PidExt, ProcessExt, ProcessStatus, System, SystemExt};

use self::models::*;
use super::artifacts::ModuleCore;
use super::collector::{CollectionModule, ModuleContext};
use crate::config::ModuleSettings;
use crate::logging::escape_csv;
use crate::models::{ModuleInfo, ModuleState};

pub const MODULE_ID: &str = "live_system";

pub struct LiveSystemModule {
    core: ModuleCore,
    system: Option<System>,
}

impl LiveSystemModule {
    pub fn new(_settings: &ModuleSettings) -> Result<Self> {
        Ok(Self {
            core: ModuleCore::new(Self::info()),
            system: None,
        })
    }

    pub fn info() -> ModuleInfo {
        ModuleInfo::new(
            MODULE_ID,
            "Live System",
            env!("CARGO_PKG_VERSION"),
            "System information, running processes, memory, disks and environment",
        )
    }
}

impl CollectionModule for LiveSystemModule {
    fn initialize(&mut self, ctx: &ModuleContext) -> Result<()> {
        self.core.prepare_dir(ctx)?;
        self.system = Some(System::new_all());
        self.core.set_state(ModuleState::Initialized);
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
        self.system = None;
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

impl LiveSystemModule {
    fn collect(&mut self, ctx: &ModuleContext) -> Result<()> {
        let system = self.system.get_or_insert_with(System::new_all);
        system.refresh_all();

        let system_info = collect_system_info(system);
        let processes = collect_processes(system);
        let memory = collect_memory(system);
        let disks = collect_disks(system);
        let environment: EnvironmentSnapshot = std::env::vars().collect();

        ctx.log.info(MODULE_ID, "Collecting system information");
        self.core.write_json(ctx, "system_info.json", &system_info)?;
        self.core.set_progress(20.0);

        ctx.log.info(MODULE_ID, &format!("Collecting {} processes", processes.len()));
        self.core.write_text(ctx, "processes.csv", &processes_to_csv(&processes))?;
        self.core.write_json(ctx, "processes.json", &processes)?;
        self.core.set_progress(50.0);

        self.core.write_json(ctx, "memory.json", &memory)?;
        self.core.write_json(ctx, "disks.json", &disks)?;
        self.core.set_progress(70.0);

        self.core.write_json(ctx, "environment.json", &environment)?;
        self.core.set_progress(80.0);

        self.core.finalize(ctx)?;
        self.core.set_progress(100.0);

        ctx.log.success(
            MODULE_ID,
            &format!("Collected {} processes and {} disks", processes.len(), disks.len()),
        );
        Ok(())
    }
}

/// Collect system information
pub fn collect_system_info(system: &System) -> SystemInfo {
    debug!("Collecting system information");

    let cpu_info = CpuInfo {
        count: system.cpus().len(),
        brand: system.cpus().first().map(|cpu| cpu.brand().to_string()),
        frequency: system.cpus().first().map_or(0, |cpu| cpu.frequency()),
    };

    SystemInfo {
        hostname: system.host_name(),
        os_name: system.name(),
        os_version: system.os_version(),
        kernel_version: system.kernel_version(),
        uptime_secs: system.uptime(),
        boot_time: system.boot_time(),
        cpu_info,
    }
}

fn status_label(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Run => "Running",
        ProcessStatus::Sleep => "Sleeping",
        ProcessStatus::Stop => "Stopped",
        ProcessStatus::Zombie => "Zombie",
        ProcessStatus::Idle => "Idle",
        _ => "Unknown",
    }
}

/// Collect process information, ordered by pid
pub fn collect_processes(system: &System) -> Vec<ProcessInfo> {
    debug!("Collecting process information");

    let mut processes: Vec<ProcessInfo> = system
        .processes()
        .iter()
        .map(|(pid, process)| ProcessInfo {
            pid: pid.as_u32(),
            name: process.name().to_string(),
            cmd: process.cmd().to_vec(),
            exe: Some(process.exe().to_string_lossy().to_string()).filter(|e| !e.is_empty()),
            status: status_label(process.status()).to_string(),
            start_time: process.start_time(),
            cpu_usage: process.cpu_usage(),
            memory_usage: process.memory(),
            parent_pid: process.parent().map(|p| p.as_u32()),
        })
        .collect();

    processes.sort_by_key(|p| p.pid);
    processes
}

/// Collect memory information
pub fn collect_memory(system: &System) -> MemoryInfo {
    MemoryInfo {
        total_memory: system.total_memory(),
        used_memory: system.used_memory(),
        total_swap: system.total_swap(),
        used_swap: system.used_swap(),
    }
}

/// Collect disk information
pub fn collect_disks(system: &System) -> Vec<DiskInfo> {
    debug!("Collecting disk information");

    system
        .disks()
        .iter()
        .map(|disk| DiskInfo {
            name: disk.name().to_string_lossy().to_string(),
            mount_point: Some(disk.mount_point().to_string_lossy().to_string()),
            total_space: disk.total_space(),
            available_space: disk.available_space(),
            file_system: std::str::from_utf8(disk.file_system()).ok().map(|s| s.to_string()),
            is_removable: disk.is_removable(),
        })
        .collect()
}

/// Process table as CSV, one row per process.
pub fn processes_to_csv(processes: &[ProcessInfo]) -> String {
    let mut csv = String::from("PID,PPID,Name,Status,Start_Time,CPU_Usage,Memory_Bytes,Executable,Command_Line\n");
    for p in processes {
        csv.push_str(&format!(
            "{},{},{},{},{},{:.1},{},{},{}\n",
            p.pid,
            p.parent_pid.map(|pp| pp.to_string()).unwrap_or_default(),
            escape_csv(&p.name),
            p.status,
            p.start_time,
            p.cpu_usage,
            p.memory_usage,
            escape_csv(p.exe.as_deref().unwrap_or("")),
            escape_csv(&p.cmd.join(" ")),
        ));
    }
    csv
}
