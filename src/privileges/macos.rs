/// Effective uid 0
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

pub fn elevation_instructions() -> &'static str {
    "Run with sudo: 'sudo evidence-collector collect'. Unified logs may also need Full Disk Access for the terminal in System Settings > Privacy & Security"
}
