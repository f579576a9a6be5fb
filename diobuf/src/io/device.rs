use std::io;

/// Capability surface of the descriptor the writer drives.
///
/// The writer borrows the descriptor and never opens or closes it;
/// everything it needs goes through these six calls, so the state
/// machine can be exercised against a fake in tests.
pub trait Device {
    /// Best-effort write; may consume fewer bytes than given.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Forces durability of everything written so far.
    fn sync(&mut self) -> io::Result<()>;

    /// Advisory hint to drop cached pages for the whole file.
    fn evict_cache(&mut self) -> io::Result<()>;

    /// Enables or disables cache-bypass mode on the open descriptor.
    fn set_direct_mode(&mut self, enabled: bool) -> io::Result<()>;

    /// Direct-I/O memory alignment required for this file, or `None`
    /// when the filesystem does not report one.
    fn dio_mem_align(&self) -> io::Result<Option<u32>>;

    /// Native block size of the containing filesystem.
    fn fs_block_size(&self) -> io::Result<u64>;
}

impl<D: Device + ?Sized> Device for &mut D {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }

    fn evict_cache(&mut self) -> io::Result<()> {
        (**self).evict_cache()
    }

    fn set_direct_mode(&mut self, enabled: bool) -> io::Result<()> {
        (**self).set_direct_mode(enabled)
    }

    fn dio_mem_align(&self) -> io::Result<Option<u32>> {
        (**self).dio_mem_align()
    }

    fn fs_block_size(&self) -> io::Result<u64> {
        (**self).fs_block_size()
    }
}

#[cfg(target_os = "linux")]
pub use self::direct_file::DirectFile;

#[cfg(target_os = "linux")]
mod direct_file {
    use std::{
        fs::File,
        io::{self, Write},
        mem,
        os::fd::AsRawFd,
    };

    use super::Device;

    /// [`Device`] implementation over a borrowed descriptor, typically
    /// one opened with `O_DIRECT`. Dropping a `DirectFile` leaves the
    /// descriptor open.
    #[derive(Debug)]
    pub struct DirectFile<'a> {
        file: &'a File,
    }

    impl<'a> DirectFile<'a> {
        pub fn new(file: &'a File) -> Self {
            Self { file }
        }
    }

    impl Device for DirectFile<'_> {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.file.write(data)
        }

        fn sync(&mut self) -> io::Result<()> {
            self.file.sync_all()
        }

        fn evict_cache(&mut self) -> io::Result<()> {
            // Length 0 covers the whole file.
            let ret = unsafe {
                libc::posix_fadvise(self.file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED)
            };
            if ret != 0 {
                return Err(io::Error::from_raw_os_error(ret));
            }
            Ok(())
        }

        fn set_direct_mode(&mut self, enabled: bool) -> io::Result<()> {
            let fd = self.file.as_raw_fd();
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            if flags == -1 {
                return Err(io::Error::last_os_error());
            }
            let flags = if enabled {
                flags | libc::O_DIRECT
            } else {
                flags & !libc::O_DIRECT
            };
            if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn dio_mem_align(&self) -> io::Result<Option<u32>> {
            let mut stx: libc::statx = unsafe { mem::zeroed() };
            // STATX_DIOALIGN is filled on Linux >= 6.1 for filesystems
            // that support direct I/O.
            let ret = unsafe {
                libc::statx(
                    self.file.as_raw_fd(),
                    c"".as_ptr(),
                    libc::AT_EMPTY_PATH | libc::AT_STATX_SYNC_AS_STAT,
                    libc::STATX_DIOALIGN,
                    &mut stx,
                )
            };
            if ret == -1 {
                let err = io::Error::last_os_error();
                return match err.raw_os_error() {
                    Some(libc::ENOSYS) | Some(libc::EOPNOTSUPP) => Ok(None),
                    _ => Err(err),
                };
            }
            if (stx.stx_mask & libc::STATX_DIOALIGN) == 0 || stx.stx_dio_mem_align == 0 {
                return Ok(None);
            }
            Ok(Some(stx.stx_dio_mem_align))
        }

        fn fs_block_size(&self) -> io::Result<u64> {
            let mut stat: libc::statfs = unsafe { mem::zeroed() };
            if unsafe { libc::fstatfs(self.file.as_raw_fd(), &mut stat) } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(stat.f_bsize as u64)
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod test {
    use super::{Device, DirectFile};

    #[test]
    fn direct_file_capability_surface() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut dev = DirectFile::new(tmp.as_file());

        assert_eq!(dev.write(b"hello").unwrap(), 5);
        dev.sync().unwrap();
        dev.evict_cache().unwrap();
        dev.set_direct_mode(false).unwrap();

        // The alignment query must never error out just because the
        // filesystem lacks direct I/O support.
        assert!(dev.dio_mem_align().is_ok());
        assert!(dev.fs_block_size().unwrap() > 0);

        let on_disk = std::fs::read(tmp.path()).unwrap();
        assert_eq!(on_disk, b"hello");
    }
}
