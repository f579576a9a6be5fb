use std::{collections::VecDeque, io};

use crate::io::device::Device;

/// Everything the writer did to the device, in call order. Failed calls
/// are not recorded; an `Op::Write` means bytes actually reached the
/// device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Write { len: usize, direct: bool },
    Sync,
    Evict,
    Toggle { enabled: bool },
}

#[derive(Debug)]
pub(crate) struct WriteRecord {
    pub data: Vec<u8>,
    pub ptr: usize,
    pub direct: bool,
}

/// Scriptable in-memory stand-in for a descriptor.
#[derive(Debug)]
pub(crate) struct MockDevice {
    pub ops: Vec<Op>,
    pub writes: Vec<WriteRecord>,
    pub direct: bool,
    pub dio_align: Option<u32>,
    pub fs_bsize: u64,
    /// Results consumed by successive writes; once drained, every write
    /// accepts all bytes.
    pub script: VecDeque<io::Result<usize>>,
    /// When set, re-enabling direct mode fails.
    pub fail_enable_direct: bool,
}

impl MockDevice {
    fn new(dio_align: Option<u32>, fs_bsize: u64) -> Self {
        Self {
            ops: Vec::new(),
            writes: Vec::new(),
            direct: true,
            dio_align,
            fs_bsize,
            script: VecDeque::new(),
            fail_enable_direct: false,
        }
    }

    pub fn with_dio_align(align: u32) -> Self {
        Self::new(Some(align), 4096)
    }

    pub fn with_fs_block_size(bsize: u64) -> Self {
        Self::new(None, bsize)
    }

    pub fn script_write(&mut self, res: io::Result<usize>) {
        self.script.push_back(res);
    }

    /// All bytes the device accepted, in order.
    pub fn data(&self) -> Vec<u8> {
        self.writes.iter().flat_map(|w| w.data.clone()).collect()
    }

    /// Bytes written while direct mode was off.
    pub fn buffered_bytes(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| !w.direct)
            .map(|w| w.data.len())
            .sum()
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn sync_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == Op::Sync).count()
    }

    pub fn evict_count(&self) -> usize {
        self.ops.iter().filter(|op| **op == Op::Evict).count()
    }
}

impl Device for MockDevice {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let res = self.script.pop_front().unwrap_or(Ok(data.len()));
        let n = res?.min(data.len());
        self.ops.push(Op::Write {
            len: n,
            direct: self.direct,
        });
        self.writes.push(WriteRecord {
            data: data[..n].to_vec(),
            ptr: data.as_ptr() as usize,
            direct: self.direct,
        });
        Ok(n)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.ops.push(Op::Sync);
        Ok(())
    }

    fn evict_cache(&mut self) -> io::Result<()> {
        self.ops.push(Op::Evict);
        Ok(())
    }

    fn set_direct_mode(&mut self, enabled: bool) -> io::Result<()> {
        if enabled && self.fail_enable_direct {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "direct mode not supported",
            ));
        }
        self.direct = enabled;
        self.ops.push(Op::Toggle { enabled });
        Ok(())
    }

    fn dio_mem_align(&self) -> io::Result<Option<u32>> {
        Ok(self.dio_align)
    }

    fn fs_block_size(&self) -> io::Result<u64> {
        Ok(self.fs_bsize)
    }
}
