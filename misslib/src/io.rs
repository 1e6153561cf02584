use std::fs::File;
use std::io::{self, Read};

use crate::error::SimError;

/// Size of one trace record in bytes: a single big-endian 32-bit address
pub const RECORD_SIZE: usize = 4;

pub fn get_reader(file: File) -> Result<impl Read, SimError> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        // Keep reads aligned with the 4 byte records, 4096 is the standard block size (or a multiple of it) on most systems
        const BUFFER_SIZE: usize = RECORD_SIZE * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        use std::io::Cursor;
        // The simulator reads the trace strictly front to back, so sequential
        // access advice applies
        unsafe {
            let m = Mmap::map(&file).map_err(|e| SimError::Source {
                records_read: 0,
                source: e,
            })?;
            m.advise(Advice::Sequential).map_err(|e| SimError::Source {
                records_read: 0,
                source: e,
            })?;
            Ok(Cursor::new(m))
        }
    }
}

/// Iterates the fixed-width records of a binary address trace
///
/// Each record is one unsigned 32-bit big-endian address. A clean end of
/// input ends the iteration; input that stops partway through a record is a
/// source error carrying how many full records were read before it. The
/// reader is streamed, the trace is never buffered whole
pub struct AddressTrace<R: Read> {
    reader: R,
    records_read: u64,
}

impl<R: Read> AddressTrace<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            records_read: 0,
        }
    }

    /// Number of full records produced so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

impl<R: Read> Iterator for AddressTrace<R> {
    type Item = Result<u32, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < record.len() {
            match self.reader.read(&mut record[filled..]) {
                Ok(0) if filled == 0 => return None,
                Ok(0) => {
                    return Some(Err(SimError::Source {
                        records_read: self.records_read,
                        source: io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("trace ended {filled} bytes into a {RECORD_SIZE} byte record"),
                        ),
                    }))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Some(Err(SimError::Source {
                        records_read: self.records_read,
                        source: e,
                    }))
                }
            }
        }
        self.records_read += 1;
        Some(Ok(u32::from_be_bytes(record)))
    }
}
