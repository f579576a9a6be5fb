use tracing::{debug, warn};

use crate::{
    error::Error,
    io::{alignment::resolve_block_size, device::Device},
    util::{DEFAULT_BUF_SIZE, buffer::Buffer, round_up},
};

fn is_block_aligned(ptr: *const u8, block_size: usize) -> bool {
    ptr as usize % block_size == 0
}

/// Puts the descriptor back into direct mode when the scope ends, no
/// matter how the tail write went.
struct RestoreDirectMode<'a, D: Device>(&'a mut D);

impl<D: Device> Drop for RestoreDirectMode<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.0.set_direct_mode(true) {
            warn!(%err, "failed to re-enable direct mode");
        }
    }
}

/// Buffered writer over a cache-bypassing descriptor.
///
/// Callers write chunks of any size and alignment. Whole blocks leave
/// through the direct descriptor, copy-free when the input is already
/// block-aligned; everything else is staged in an aligned buffer and
/// flushed in full-buffer units. [`close`](DirectWriter::close) drains
/// whatever is left: the aligned bulk while direct mode is still on,
/// then the sub-block tail through a bounded buffered fallback.
///
/// The first descriptor failure is latched; every later call returns it
/// without touching the descriptor again. The caller resubmits the
/// unaccepted remainder if it retries; the writer itself never does.
pub struct DirectWriter<D: Device> {
    dev: D,
    buf: Buffer,
    block_size: usize,
    err: Option<Error>,
    closed: bool,
}

impl<D: Device> DirectWriter<D> {
    /// Creates a writer with the default staging capacity.
    pub fn new(dev: D) -> Result<Self, Error> {
        Self::with_capacity(dev, DEFAULT_BUF_SIZE)
    }

    /// Creates a writer whose staging buffer holds at least `size`
    /// bytes, rounded up to a block multiple. Sizes below the default
    /// are raised to it.
    pub fn with_capacity(dev: D, size: usize) -> Result<Self, Error> {
        let block_size = resolve_block_size(&dev)?;
        let size = round_up(size.max(DEFAULT_BUF_SIZE), block_size);
        let buf = Buffer::new(size, block_size)?;
        Ok(Self {
            dev,
            buf,
            block_size,
            err: None,
            closed: false,
        })
    }

    /// Unused room in the staging buffer.
    pub fn available(&self) -> usize {
        self.buf.available()
    }

    /// Bytes currently staged.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Block size governing alignment and write rounding.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn latch(&mut self, err: Error) -> Error {
        self.err = Some(err.clone());
        err
    }

    /// Writes `data`, returning the number of leading bytes accepted
    /// (written to the descriptor or staged).
    ///
    /// On success that is `data.len()`. `Ok(n)` with `n < data.len()`
    /// means the descriptor failed mid-call: the failure is latched and
    /// returned by every later call, and `data[n..]` was not consumed.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut data = data;
        let mut accepted = 0_usize;

        while data.len() >= self.buf.available() {
            if self.buf.is_empty() && is_block_aligned(data.as_ptr(), self.block_size) {
                // Empty buffer and an already-aligned input: full blocks
                // go straight to the descriptor without a staging copy.
                let aligned = data.len() - data.len() % self.block_size;
                match self.dev.write(&data[..aligned]) {
                    Ok(n) if n == aligned => {
                        accepted += n;
                        data = &data[n..];
                        let staged = self.buf.push(data);
                        accepted += staged;
                        data = &data[staged..];
                    }
                    Ok(n) => {
                        accepted += n;
                        let err = self.latch(Error::ShortWrite {
                            written: n,
                            expected: aligned,
                        });
                        return if accepted > 0 { Ok(accepted) } else { Err(err) };
                    }
                    Err(e) => {
                        let err = self.latch(e.into());
                        return if accepted > 0 { Ok(accepted) } else { Err(err) };
                    }
                }
            } else {
                let staged = self.buf.push(data);
                accepted += staged;
                data = &data[staged..];
                if let Err(e) = self.flush() {
                    let err = self.latch(e);
                    return if accepted > 0 { Ok(accepted) } else { Err(err) };
                }
            }
        }

        // Short remainder stays staged until a later write or close.
        accepted += self.buf.push(data);
        Ok(accepted)
    }

    /// Writes out the staged bytes. On failure or a short write the
    /// unwritten remainder moves to the front of the buffer so the fill
    /// count stays accurate for resumption.
    fn flush(&mut self) -> Result<(), Error> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let fill = self.buf.len();
        match self.dev.write(self.buf.filled()) {
            Ok(n) if n < fill => {
                self.buf.consume(n);
                Err(Error::ShortWrite {
                    written: n,
                    expected: fill,
                })
            }
            Ok(_) => {
                self.buf.clear();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drains the staged bytes and seals the writer.
    ///
    /// Whole blocks leave through the still-direct descriptor. The
    /// remaining tail is smaller than one block and can never satisfy
    /// the alignment contract, so direct mode is switched off for a
    /// single bounded write, restored, and the file is synced before
    /// the touched pages are handed back to the kernel.
    ///
    /// A second call returns [`Error::AlreadyClosed`] and performs no
    /// I/O, even if the first call failed. The underlying descriptor
    /// stays open.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        self.closed = true;

        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.buf.is_empty() {
            return Ok(());
        }

        let fill = self.buf.len();
        let aligned = fill - fill % self.block_size;
        if aligned > 0 {
            debug!(aligned, "draining aligned bulk");
            match self.dev.write(&self.buf.filled()[..aligned]) {
                Ok(n) if n < aligned => {
                    self.buf.consume(n);
                    return Err(Error::ShortWrite {
                        written: n,
                        expected: aligned,
                    });
                }
                Ok(n) => self.buf.consume(n),
                Err(e) => return Err(e.into()),
            }
        }

        if !self.buf.is_empty() {
            let tail = self.buf.len();
            debug!(tail, "draining tail through the page cache");
            self.dev.set_direct_mode(false)?;
            let written = {
                let mut dev = RestoreDirectMode(&mut self.dev);
                dev.0.write(self.buf.filled())
            };
            let n = written?;
            if n < tail {
                self.buf.consume(n);
                return Err(Error::ShortWrite {
                    written: n,
                    expected: tail,
                });
            }
            self.buf.clear();
            // The tail went through the page cache; make it durable,
            // then drop the cached pages it left behind.
            self.dev.sync()?;
            let _ = self.dev.evict_cache();
        }
        Ok(())
    }
}
