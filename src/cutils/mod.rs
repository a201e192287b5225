pub fn cerr<Int: Copy + TryInto<libc::c_long>>(res: Int) -> std::io::Result<Int> {
    match res.try_into() {
        Ok(-1) => Err(std::io::Error::last_os_error()),
        _ => Ok(res),
    }
}

extern "C" {
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    #[cfg_attr(
        any(target_os = "openbsd", target_os = "netbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(target_os = "linux", link_name = "__errno_location")]
    fn errno_location() -> *mut libc::c_int;
}

pub fn errno() -> libc::c_int {
    unsafe { *errno_location() }
}

pub fn set_errno(no: libc::c_int) {
    unsafe { *errno_location() = no };
}

/// Saves `errno` on creation and puts it back when dropped.
///
/// Signal handlers interrupt arbitrary code, so any of them that performs a system call must leave
/// `errno` as it found it.
pub struct SavedErrno(libc::c_int);

impl SavedErrno {
    pub fn save() -> Self {
        Self(errno())
    }
}

impl Drop for SavedErrno {
    fn drop(&mut self) {
        set_errno(self.0)
    }
}
