/// Whether the process token belongs to the Administrators group
pub fn is_admin() -> bool {
    use winapi::um::shellapi::IsUserAnAdmin;
    unsafe { IsUserAnAdmin() != 0 }
}

pub fn elevation_instructions() -> &'static str {
    "Run as Administrator by right-clicking the executable and selecting 'Run as administrator'"
}
