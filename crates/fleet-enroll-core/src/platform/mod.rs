#[cfg(target_os = "windows")]
pub fn default_hosts_path() -> &'static str {
    r"C:\Windows\System32\drivers\etc\hosts"
}

#[cfg(not(target_os = "windows"))]
pub fn default_hosts_path() -> &'static str {
    "/etc/hosts"
}
