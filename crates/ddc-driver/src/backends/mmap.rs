//! Memory-mapped register backend
//!
//! Maps the core's AXI register space from a resource file: a UIO node
//! (`/dev/uioN`, map 0) or a sysfs `resourceN` file of the PCIe bridge that
//! exposes it. Access is volatile 32-bit only.
//!
//! [`RegisterInterface`] models no per-access failure, so an offset outside
//! the mapping is logged and dropped (writes) or reads as 0.

use crate::error::{DdcError, Result};
use crate::registers::{BackendType, RegisterInterface};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Memory-mapped register window
#[derive(Debug)]
pub struct MmapRegisters {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
}

impl MmapRegisters {
    /// Map `size` bytes of `path` starting at offset 0.
    ///
    /// Regular files (sysfs resources) must be at least `size` bytes long.
    /// Character devices report no length and are mapped as requested.
    ///
    /// # Errors
    ///
    /// Returns [`DdcError::Mapping`] if the file cannot be opened, is too
    /// short, `size` is 0 or not word-aligned, or mmap fails.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref();

        if size == 0 || size % 4 != 0 {
            return Err(DdcError::mapping(
                path,
                format!("mapping size {size:#x} is not a nonzero multiple of 4"),
            ));
        }

        tracing::debug!("Mapping registers: {} ({size:#x} bytes)", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| DdcError::mapping(path, format!("cannot open: {e}")))?;

        let metadata = file
            .metadata()
            .map_err(|e| DdcError::mapping(path, format!("cannot stat: {e}")))?;

        // Truncation acceptable: resource sizes fit in usize on 64-bit targets
        #[allow(clippy::cast_possible_truncation)]
        let available = metadata.len() as usize;
        if metadata.is_file() && available < size {
            return Err(DdcError::mapping(
                path,
                format!("resource is {available:#x} bytes, need {size:#x}"),
            ));
        }

        // SAFETY: mmap preconditions:
        // - fd is valid (just opened read/write)
        // - size is nonzero and checked against the file length for regular files
        // - PROT_READ|PROT_WRITE with MAP_SHARED so stores reach the device
        // - offset 0 selects the first UIO map / start of the resource
        // The file is kept in the struct so the fd outlives the mapping, and
        // Drop unmaps exactly `size` bytes.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| DdcError::mapping(path, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| DdcError::mapping(path, "mmap returned a null mapping"))?;

        tracing::info!("Mapped {} ({size:#x} bytes at {ptr:p})", path.display());

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Mapped length in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Resource file backing the mapping
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn in_bounds(&self, offset: usize) -> bool {
        offset % 4 == 0 && offset.checked_add(4).is_some_and(|end| end <= self.size)
    }
}

impl RegisterInterface for MmapRegisters {
    fn read32(&self, offset: usize) -> u32 {
        if !self.in_bounds(offset) {
            tracing::error!(
                "Dropped read: offset={offset:#x} outside mapping of {:#x} bytes",
                self.size
            );
            return 0;
        }

        // SAFETY: volatile read from a mapped register.
        // - offset is word-aligned and offset + 4 <= size (checked above)
        // - ptr comes from a successful mmap of `size` bytes still mapped
        // - read_volatile keeps the compiler from eliding or reordering
        //   accesses to registers with side effects
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("read32 @ {offset:#x} = {value:#x}");
        value
    }

    fn write32(&self, offset: usize, value: u32) {
        if !self.in_bounds(offset) {
            tracing::error!(
                "Dropped write of {value:#x}: offset={offset:#x} outside mapping of {:#x} bytes",
                self.size
            );
            return;
        }

        tracing::trace!("write32 @ {offset:#x} = {value:#x}");

        // SAFETY: volatile write to a mapped register.
        // - offset is word-aligned and offset + 4 <= size (checked above)
        // - ptr comes from a successful mmap of `size` bytes still mapped
        // - write_volatile is required: register stores trigger hardware
        //   actions and must be issued exactly once, in program order
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Mmap
    }
}

impl Drop for MmapRegisters {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} ({:#x} bytes)", self.path.display(), self.size);

        // SAFETY: ptr/size are exactly what mmap returned/was given in open(),
        // and nothing can use the mapping after Drop.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: the mapping is owned exclusively by this value and stays valid
// until Drop; moving it to another thread does not invalidate it.
unsafe impl Send for MmapRegisters {}

// SAFETY: all access goes through bounds-checked volatile 32-bit loads and
// stores with no other in-process state. Callers that need ordering across
// several registers serialize through the device lock.
unsafe impl Sync for MmapRegisters {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rejects_unaligned_size() {
        let err = MmapRegisters::open("/dev/null", 6).unwrap_err();
        assert!(matches!(err, DdcError::Mapping { .. }));
    }

    #[test]
    fn rejects_missing_resource() {
        let err = MmapRegisters::open("/nonexistent/uio0", 0x1000).unwrap_err();
        assert!(err.to_string().contains("cannot open"));
    }

    fn resource_file(len: usize) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resource0");
        std::fs::write(&path, vec![0u8; len]).unwrap();
        (dir, path)
    }

    #[test]
    fn rejects_short_regular_file() {
        let (_dir, path) = resource_file(16);
        let err = MmapRegisters::open(&path, 0x1000).unwrap_err();
        assert!(err.to_string().contains("need 0x1000"));
    }

    #[test]
    fn file_backed_mapping_round_trips() {
        let (_dir, path) = resource_file(0x1000);
        let regs = MmapRegisters::open(&path, 0x1000).unwrap();
        regs.write32(0x10, 0xDEAD_BEEF);
        assert_eq!(regs.read32(0x10), 0xDEAD_BEEF);
        // out of range: dropped, reads 0
        regs.write32(0x1000, 1);
        assert_eq!(regs.read32(0x1000), 0);
        assert_eq!(regs.backend_type(), BackendType::Mmap);
        assert_eq!(regs.path(), path.as_path());
    }

    #[test]
    #[ignore = "requires a DDC core behind /dev/uio0"]
    fn uio_identification() {
        let regs = MmapRegisters::open("/dev/uio0", ddc_chip::regs::REGION_SIZE).unwrap();
        let year = regs.read32(ddc_chip::regs::HDL_USER_YEAR);
        assert_ne!(year, 0);
    }
}
