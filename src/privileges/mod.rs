//! Elevation checks consulted before and during module scheduling.

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

use log::debug;

/// Modules that cannot do anything useful without elevation.
const ELEVATED_MODULES: &[&str] = &["system_logs"];

/// Outcome of a privilege check for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PrivilegeCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check if the process is running with elevated privileges
pub fn is_elevated() -> bool {
    #[cfg(target_os = "windows")]
    {
        windows::is_admin()
    }
    #[cfg(target_os = "linux")]
    {
        linux::is_root()
    }
    #[cfg(target_os = "macos")]
    {
        macos::is_root()
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        false
    }
}

/// Whether a module id is on the elevated list.
pub fn requires_elevation(module_id: &str) -> bool {
    ELEVATED_MODULES.contains(&module_id)
}

/// Decide whether `module_id` may run with the current privileges.
pub fn check_required_privileges(module_id: &str) -> PrivilegeCheck {
    check_with(module_id, is_elevated())
}

fn check_with(module_id: &str, elevated: bool) -> PrivilegeCheck {
    if !requires_elevation(module_id) || elevated {
        return PrivilegeCheck::allowed();
    }

    debug!("Module {} needs elevation, process is not elevated", module_id);
    PrivilegeCheck::denied(format!(
        "Module '{}' requires elevated privileges. {}",
        module_id,
        get_elevation_instructions()
    ))
}

/// Get instructions for elevating privileges on the current platform
pub fn get_elevation_instructions() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        windows::elevation_instructions()
    }
    #[cfg(target_os = "linux")]
    {
        linux::elevation_instructions()
    }
    #[cfg(target_os = "macos")]
    {
        macos::elevation_instructions()
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        "Run with elevated privileges appropriate for your operating system"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprivileged_modules_always_allowed() {
        assert_eq!(check_with("live_system", false), PrivilegeCheck::allowed());
        assert_eq!(check_with("network", false), PrivilegeCheck::allowed());
    }

    #[test]
    fn test_elevated_module_denied_without_elevation() {
        let check = check_with("system_logs", false);
        assert!(!check.allowed);
        assert!(check.reason.unwrap().contains("requires elevated privileges"));
        assert!(check_with("system_logs", true).allowed);
    }

    #[test]
    fn test_instructions_are_not_empty() {
        assert!(!get_elevation_instructions().is_empty());
    }
}
