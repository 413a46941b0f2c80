//! Best-effort return of freed allocator pages to the OS.

/// Ask glibc to hand freed arena pages back to the kernel. Called after
/// dataset load (drops oversized working buffers) and unload (drops the
/// whole dataset). No-op on allocators without a trim facility.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub fn release_to_os() {
    unsafe {
        libc::malloc_trim(0);
    }
    tracing::debug!("malloc_trim requested");
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn release_to_os() {}
