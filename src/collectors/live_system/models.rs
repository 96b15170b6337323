use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// System information data structure
#[derive(Debug, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub uptime_secs: u64,
    pub boot_time: u64,
    pub cpu_info: CpuInfo,
}

/// CPU information data structure
#[derive(Debug, Serialize, Deserialize)]
pub struct CpuInfo {
    pub count: usize,
    pub brand: Option<String>,
    pub frequency: u64,
}

/// Process information data structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmd: Vec<String>,
    pub exe: Option<String>,
    pub status: String,
    pub start_time: u64,
    pub cpu_usage: f32,
    pub memory_usage: u64,
    pub parent_pid: Option<u32>,
}

/// Memory information data structure
#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_memory: u64,
    pub used_memory: u64,
    pub total_swap: u64,
    pub used_swap: u64,
}

/// Disk information data structure
#[derive(Debug, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: Option<String>,
    pub total_space: u64,
    pub available_space: u64,
    pub file_system: Option<String>,
    pub is_removable: bool,
}

/// Environment of the collecting process
pub type EnvironmentSnapshot = BTreeMap<String, String>;
