//! Memory backends: anonymous process-local mappings and named POSIX
//! shared memory.
//!
//! Both backends hand out a page-rounded, readable+writable region and own
//! it exclusively (move-only handles; drop releases the mapping). Huge-page
//! mapping, NUMA binding and page pinning are attempted opportunistically:
//! only the primary mapping decides success.

use std::ffi::CString;
use std::io;
use std::ptr::{self, NonNull};

use crate::error::{Result, RingError};

/// Byte region a ring segment lives in.
///
/// The base address is stable for the life of the value; implementors
/// release the mapping on drop.
pub trait Memory {
    /// Base address of the mapped region.
    fn base(&self) -> NonNull<u8>;

    /// Mapped length in bytes (page-rounded).
    fn len(&self) -> u64;
}

fn page_size() -> u64 {
    // SAFETY: sysconf reads a static configuration value.
    let sc = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sc > 0 {
        sc as u64
    } else {
        4096
    }
}

fn round_to_page(size: u64) -> Result<u64> {
    let page = page_size();
    size.checked_add(page - 1)
        .map(|s| s & !(page - 1))
        .ok_or(RingError::SizeOverflow)
}

/// Map `len` bytes, preferring huge pages. ENOMEM means no free huge
/// pages, EINVAL no support at all; both fall back to normal pages.
/// Any other failure is fatal.
///
/// # Safety
///
/// `fd` must be -1 (with `MAP_ANONYMOUS` in `flags`) or a file descriptor
/// valid for a shared mapping of at least `len` bytes.
unsafe fn map_region(len: u64, flags: libc::c_int, fd: libc::c_int) -> Result<NonNull<u8>> {
    let prot = libc::PROT_READ | libc::PROT_WRITE;

    #[cfg(target_os = "linux")]
    {
        let ptr = libc::mmap(
            ptr::null_mut(),
            len as usize,
            prot,
            flags | libc::MAP_HUGETLB,
            fd,
            0,
        );
        if ptr != libc::MAP_FAILED {
            return Ok(NonNull::new_unchecked(ptr.cast()));
        }
        let errno = io::Error::last_os_error().raw_os_error();
        if errno != Some(libc::ENOMEM) && errno != Some(libc::EINVAL) {
            return Err(RingError::system("mmap"));
        }
    }

    let ptr = libc::mmap(ptr::null_mut(), len as usize, prot, flags, fd, 0);
    if ptr == libc::MAP_FAILED {
        return Err(RingError::system("mmap"));
    }
    Ok(NonNull::new_unchecked(ptr.cast()))
}

// Linux mempolicy constants (numaif.h); libc does not export the flag set.
#[cfg(target_os = "linux")]
const MPOL_BIND: libc::c_long = 2;
#[cfg(target_os = "linux")]
const MPOL_MF_STRICT: libc::c_long = 1;

/// Best-effort placement: strict-bind the region to a NUMA node and pin it
/// in RAM. Neither failure is surfaced; only the mapping itself matters.
fn bind_and_pin(base: NonNull<u8>, len: u64, numa: Option<u32>) {
    #[cfg(target_os = "linux")]
    if let Some(node) = numa {
        if node < 64 {
            let mask: libc::c_ulong = 1 << node;
            // SAFETY: the region [base, len) is mapped; mbind only reads
            // the single-word node mask.
            unsafe {
                libc::syscall(
                    libc::SYS_mbind,
                    base.as_ptr(),
                    len as usize,
                    MPOL_BIND,
                    std::ptr::addr_of!(mask),
                    libc::c_ulong::BITS as libc::c_ulong,
                    MPOL_MF_STRICT,
                );
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = numa;

    // SAFETY: the region [base, len) is mapped and owned by the caller.
    unsafe {
        libc::mlock(base.as_ptr().cast(), len as usize);
    }
}

/// Anonymous process-local region.
///
/// Usable by any number of threads in one process; the mapping disappears
/// when the handle drops.
pub struct LocalMem {
    base: NonNull<u8>,
    len: u64,
}

// SAFETY: LocalMem owns its mapping exclusively and only exposes the base
// address and length; all concurrent access to the region contents is
// mediated by the segment protocol.
unsafe impl Send for LocalMem {}
unsafe impl Sync for LocalMem {}

impl LocalMem {
    /// Maps at least `size` bytes of anonymous memory, rounded up to the
    /// page size, optionally strict-bound to `numa` node.
    pub fn new(size: u64, numa: Option<u32>) -> Result<Self> {
        let len = round_to_page(size)?;
        // SAFETY: anonymous private mapping, fd unused.
        let base = unsafe { map_region(len, libc::MAP_PRIVATE | libc::MAP_ANONYMOUS, -1) }?;
        bind_and_pin(base, len, numa);
        Ok(Self { base, len })
    }
}

impl Memory for LocalMem {
    #[inline]
    fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    fn len(&self) -> u64 {
        self.len
    }
}

impl Drop for LocalMem {
    fn drop(&mut self) {
        // SAFETY: base/len describe the mapping created in `new`; the
        // handle is move-only so this runs exactly once.
        unsafe {
            libc::munlock(self.base.as_ptr().cast(), self.len as usize);
            libc::munmap(self.base.as_ptr().cast(), self.len as usize);
        }
    }
}

/// Named POSIX shared-memory region with create-or-attach semantics.
///
/// The first caller for a name creates and sizes the object; later callers
/// attach and must present the identical size. Dropping a handle unmaps
/// and closes but never unlinks: the name stays claimable until
/// [`ShmMem::unlink`] removes it.
pub struct ShmMem {
    base: NonNull<u8>,
    len: u64,
    fd: libc::c_int,
}

// SAFETY: as for LocalMem; the fd is only used by Drop.
unsafe impl Send for ShmMem {}
unsafe impl Sync for ShmMem {}

impl ShmMem {
    /// Creates or attaches the named object at `size` bytes (page-rounded).
    pub fn new(size: u64, name: &str, numa: Option<u32>) -> Result<Self> {
        let len = round_to_page(size)?;
        if i64::try_from(len).is_err() {
            return Err(RingError::SizeOverflow);
        }
        let cname = shm_name(name)?;

        let mut created = true;
        // SAFETY: cname is a valid NUL-terminated string.
        let mut fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL | libc::O_CLOEXEC,
                0o644,
            )
        };
        if fd == -1 && io::Error::last_os_error().raw_os_error() == Some(libc::EEXIST) {
            created = false;
            // SAFETY: as above.
            fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC, 0o644) };
        }
        if fd == -1 {
            return Err(RingError::system("shm_open"));
        }

        if created {
            // SAFETY: fd was just opened read-write.
            if unsafe { libc::ftruncate(fd, len as libc::off_t) } == -1 {
                let err = RingError::system("ftruncate");
                // SAFETY: fd is open and owned here.
                unsafe { libc::close(fd) };
                return Err(err);
            }
        } else {
            let mut st = std::mem::MaybeUninit::<libc::stat>::uninit();
            // SAFETY: fd is open; st is a properly sized out buffer.
            if unsafe { libc::fstat(fd, st.as_mut_ptr()) } == -1 {
                let err = RingError::system("fstat");
                // SAFETY: fd is open and owned here.
                unsafe { libc::close(fd) };
                return Err(err);
            }
            // SAFETY: fstat succeeded and filled the buffer.
            let found = unsafe { st.assume_init() }.st_size as u64;
            if found != len {
                // SAFETY: fd is open and owned here.
                unsafe { libc::close(fd) };
                return Err(RingError::SizeMismatch {
                    expected: len,
                    found,
                });
            }
        }

        // SAFETY: fd refers to an object of exactly `len` bytes.
        let base = match unsafe { map_region(len, libc::MAP_SHARED, fd) } {
            Ok(base) => base,
            Err(err) => {
                // SAFETY: fd is open and owned here.
                unsafe { libc::close(fd) };
                return Err(err);
            }
        };
        bind_and_pin(base, len, numa);

        Ok(Self { base, len, fd })
    }

    /// Removes the name from the shared-memory namespace.
    ///
    /// Idempotent: an unknown name is success. Existing mappings stay
    /// valid; only future attachers are affected. This is also the
    /// recovery path when an initializer died mid-handshake and left a
    /// segment that new attachers would wait on forever.
    pub fn unlink(name: &str) -> Result<()> {
        let cname = shm_name(name)?;
        // SAFETY: cname is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(cname.as_ptr()) } == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOENT) {
                return Ok(());
            }
            return Err(RingError::System {
                call: "shm_unlink",
                source: err,
            });
        }
        Ok(())
    }
}

impl Memory for ShmMem {
    #[inline]
    fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    fn len(&self) -> u64 {
        self.len
    }
}

impl Drop for ShmMem {
    fn drop(&mut self) {
        // SAFETY: base/len/fd come from `new`; move-only handle, runs once.
        // Unlink is deliberately not part of drop.
        unsafe {
            libc::munlock(self.base.as_ptr().cast(), self.len as usize);
            libc::munmap(self.base.as_ptr().cast(), self.len as usize);
            libc::close(self.fd);
        }
    }
}

fn shm_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| RingError::System {
        call: "shm_open",
        source: io::Error::from_raw_os_error(libc::EINVAL),
    })
}
