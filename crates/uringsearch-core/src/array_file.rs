//! The sorted array file and in-memory element access.
//!
//! Elements are native-endian `u64`, sorted ascending, packed with no
//! header. The file is opened read-only and never modified.

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

use nix::fcntl::{posix_fadvise, PosixFadviseAdvice};
use nix::sys::uio::pread;

use crate::error::{Result, SearchError};
use crate::interval::{SearchInterval, ELEMENT_WIDTH};

/// Element count for a file of `len_bytes`, or the validation error.
pub fn element_count(len_bytes: u64) -> Result<u64> {
    if len_bytes % ELEMENT_WIDTH != 0 {
        return Err(SearchError::Misaligned { len: len_bytes, width: ELEMENT_WIDTH });
    }
    match len_bytes / ELEMENT_WIDTH {
        0 => Err(SearchError::Empty),
        n => Ok(n),
    }
}

/// Decode packed native-endian elements.
pub fn decode_elements(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(ELEMENT_WIDTH as usize)
        .map(|chunk| {
            let mut raw = [0u8; ELEMENT_WIDTH as usize];
            raw.copy_from_slice(chunk);
            u64::from_ne_bytes(raw)
        })
        .collect()
}

/// Synchronous access to the elements being searched.
///
/// The driver uses this for everything that is not a probe: the bulk read
/// behind a linear scan and readahead hints.
pub trait ElementSource {
    /// Number of elements.
    fn len(&self) -> u64;

    /// True if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every element of `interval` in one transfer.
    fn read_range(&self, interval: SearchInterval) -> io::Result<Vec<u64>>;

    /// Hint that `interval` will be read soon. Must not block on I/O.
    fn prefetch(&self, interval: SearchInterval) -> io::Result<()>;
}

/// A validated, open array file.
///
/// Closing happens on drop.
#[derive(Debug)]
pub struct SortedArrayFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl SortedArrayFile {
    /// Open `path` read-only and validate its shape.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| SearchError::Open { path: path.to_path_buf(), source })?;
        let len_bytes = file.metadata().map_err(SearchError::Metadata)?.len();
        let len = element_count(len_bytes)?;

        tracing::debug!(path = %path.display(), elements = len, "opened array file");
        Ok(Self { file, path: path.to_path_buf(), len })
    }

    /// Path the file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length in bytes
    pub fn byte_len(&self) -> u64 {
        self.len * ELEMENT_WIDTH
    }

    /// Tell the kernel access will be random, disabling sequential readahead.
    pub fn advise_random(&self) -> io::Result<()> {
        self.fadvise(0, self.byte_len(), PosixFadviseAdvice::POSIX_FADV_RANDOM)
    }

    fn fadvise(&self, offset: u64, len: u64, advice: PosixFadviseAdvice) -> io::Result<()> {
        let offset = libc::off_t::try_from(offset).map_err(io::Error::other)?;
        let len = libc::off_t::try_from(len).map_err(io::Error::other)?;
        posix_fadvise(self.file.as_raw_fd(), offset, len, advice).map_err(io::Error::from)
    }
}

impl ElementSource for SortedArrayFile {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, interval: SearchInterval) -> io::Result<Vec<u64>> {
        let byte_len = usize::try_from(interval.byte_len()).map_err(io::Error::other)?;
        let start = interval.byte_start();
        let mut buf = vec![0u8; byte_len];

        let mut filled = 0usize;
        while filled < byte_len {
            let offset = libc::off_t::try_from(start + filled as u64).map_err(io::Error::other)?;
            match pread(self.file.as_fd(), &mut buf[filled..], offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("array file ended {} bytes into {interval}", filled),
                    ))
                }
                Ok(n) => filled += n,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(decode_elements(&buf))
    }

    fn prefetch(&self, interval: SearchInterval) -> io::Result<()> {
        self.fadvise(
            interval.byte_start(),
            interval.byte_len(),
            PosixFadviseAdvice::POSIX_FADV_WILLNEED,
        )
    }
}

impl AsFd for SortedArrayFile {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for SortedArrayFile {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
