use tracing::debug;

use crate::{error::Error, io::device::Device};

/// Smallest alignment O_DIRECT accepts on common filesystems.
const MIN_DIRECT_ALIGN: u64 = 512;

/// Alignment used when the filesystem reports something smaller or
/// nothing usable.
const SAFE_DIRECT_ALIGN: u64 = 4096;

/// Picks the block size that governs both buffer alignment and write
/// rounding for `dev`.
///
/// The kernel's precise requirement (`STATX_DIOALIGN`) wins when the
/// filesystem reports one. Otherwise the filesystem block size is used,
/// upgraded to 4096 when smaller: sub-512 values are unreliable, and
/// 512-byte writes on 4Kn media pay a read-modify-write penalty.
pub fn resolve_block_size<D: Device>(dev: &D) -> Result<usize, Error> {
    if let Some(align) = dev.dio_mem_align()? {
        return Ok(align as usize);
    }

    let bsize = dev.fs_block_size()?;
    let picked = if bsize < MIN_DIRECT_ALIGN {
        debug!(bsize, "filesystem block size unreliable, using 4096");
        SAFE_DIRECT_ALIGN
    } else if bsize < SAFE_DIRECT_ALIGN {
        debug!(bsize, "upgrading block size to 4096");
        SAFE_DIRECT_ALIGN
    } else {
        bsize
    };
    Ok(picked as usize)
}

#[cfg(test)]
mod test {
    use super::resolve_block_size;
    use crate::io::mock::MockDevice;

    #[test]
    fn kernel_reported_alignment_wins() {
        let dev = MockDevice::with_dio_align(512);
        assert_eq!(resolve_block_size(&dev).unwrap(), 512);

        let dev = MockDevice::with_dio_align(4096);
        assert_eq!(resolve_block_size(&dev).unwrap(), 4096);
    }

    #[test]
    fn small_fs_block_size_upgrades_to_4096() {
        // "Unsupported" from the kernel query falls back to the
        // filesystem block size, which gets the upgrade heuristic.
        let dev = MockDevice::with_fs_block_size(512);
        assert_eq!(resolve_block_size(&dev).unwrap(), 4096);

        let dev = MockDevice::with_fs_block_size(1024);
        assert_eq!(resolve_block_size(&dev).unwrap(), 4096);
    }

    #[test]
    fn unreliable_fs_block_size_forced_to_4096() {
        for bsize in [0, 1, 100, 511] {
            let dev = MockDevice::with_fs_block_size(bsize);
            assert_eq!(resolve_block_size(&dev).unwrap(), 4096);
        }
    }

    #[test]
    fn large_fs_block_size_kept() {
        let dev = MockDevice::with_fs_block_size(8192);
        assert_eq!(resolve_block_size(&dev).unwrap(), 8192);
    }
}
