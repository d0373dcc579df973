//! Platform shims: ownership lookups and permission application.

use std::path::Path;

use lfs_core::Error;

/// Username substituted when the password database has no answer.
const UNKNOWN_USER: &str = "unknown";

/// Username of the calling process.
pub fn current_username() -> String {
    imp::current_username()
}

/// Username of the owner of the file at `path`, or `unknown`.
pub fn file_owner(path: &Path) -> String {
    imp::file_owner(path)
}

/// Create `dir` (and parents) with `mode` applied on unix.
pub fn create_dir_all_with_mode(dir: &Path, mode: u32) -> Result<(), Error> {
    imp::create_dir_all_with_mode(dir, mode)
}

/// Apply `mode` to the file at `path` on unix; a no-op elsewhere.
pub fn set_file_mode(path: &Path, mode: u32) -> Result<(), Error> {
    imp::set_file_mode(path, mode)
}

#[cfg(unix)]
mod imp {
    use super::UNKNOWN_USER;
    use lfs_core::Error;
    use std::ffi::CStr;
    use std::fs;
    use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
    use std::path::Path;

    pub fn current_username() -> String {
        // getuid never fails
        #[allow(unsafe_code)]
        let uid = unsafe { libc::getuid() };
        username_for_uid(uid).unwrap_or_else(|| UNKNOWN_USER.to_owned())
    }

    pub fn file_owner(path: &Path) -> String {
        fs::metadata(path)
            .ok()
            .and_then(|meta| username_for_uid(meta.uid()))
            .unwrap_or_else(|| UNKNOWN_USER.to_owned())
    }

    pub fn create_dir_all_with_mode(dir: &Path, mode: u32) -> Result<(), Error> {
        fs::DirBuilder::new().recursive(true).mode(mode).create(dir)?;
        Ok(())
    }

    pub fn set_file_mode(path: &Path, mode: u32) -> Result<(), Error> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    /// Password-database lookup of `uid`.
    #[allow(unsafe_code)]
    fn username_for_uid(uid: libc::uid_t) -> Option<String> {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut buf = vec![0u8; 1024];
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        loop {
            let rc = unsafe {
                libc::getpwuid_r(
                    uid,
                    &mut pwd,
                    buf.as_mut_ptr().cast::<libc::c_char>(),
                    buf.len(),
                    &mut result,
                )
            };
            if rc == libc::ERANGE && buf.len() < 1 << 20 {
                buf.resize(buf.len() * 2, 0);
                continue;
            }
            if rc != 0 || result.is_null() {
                return None;
            }
            let name = unsafe { CStr::from_ptr(pwd.pw_name) };
            return Some(name.to_string_lossy().into_owned());
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::UNKNOWN_USER;
    use lfs_core::Error;
    use std::fs;
    use std::path::Path;

    pub fn current_username() -> String {
        UNKNOWN_USER.to_owned()
    }

    pub fn file_owner(_path: &Path) -> String {
        UNKNOWN_USER.to_owned()
    }

    pub fn create_dir_all_with_mode(dir: &Path, _mode: u32) -> Result<(), Error> {
        fs::create_dir_all(dir)?;
        Ok(())
    }

    pub fn set_file_mode(_path: &Path, _mode: u32) -> Result<(), Error> {
        Ok(())
    }
}
