//! Permission mask derivation from repository configuration.
//!
//! `core.sharedRepository` decides the mode of files the store
//! creates. Only that one key is needed, so the git config is scanned
//! with a purpose-built reader instead of a full config parser:
//! sections in brackets, `key = value` lines, `#`/`;` comments.

use std::path::Path;

/// Umask applied to ingested objects, derived from
/// `<gitdir>/config` `core.sharedRepository`.
pub fn repository_umask(gitdir: &Path) -> u32 {
    let shared = read_shared_repository(&gitdir.join("config"));
    umask_for(shared.as_deref())
}

fn umask_for(shared: Option<&str>) -> u32 {
    match shared {
        Some("true") | Some("group") => 0o777 & !0o660,
        Some("all") | Some("world") | Some("everybody") => 0o777 & !0o664,
        Some("false") | Some("umask") | None => process_umask(),
        Some(octal) => match u32::from_str_radix(octal, 8) {
            Ok(mode) if mode != 0 => 0o777 & !mode,
            _ => process_umask(),
        },
    }
}

fn read_shared_repository(config: &Path) -> Option<String> {
    let text = std::fs::read_to_string(config).ok()?;
    let mut in_core = false;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_core = line.trim_start_matches('[').trim_end_matches(']').trim() == "core";
            continue;
        }
        if !in_core {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("sharedrepository") {
                let value = value.trim().trim_matches('"');
                return Some(value.to_ascii_lowercase());
            }
        }
    }
    None
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn process_umask() -> u32 {
    // read-and-restore; umask has no pure getter
    unsafe {
        let current = libc::umask(0);
        libc::umask(current);
        current as u32
    }
}

#[cfg(not(unix))]
fn process_umask() -> u32 {
    0o022
}
