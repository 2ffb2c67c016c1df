// ABOUTME: In-memory line-length index over a journal file, plus torn-tail detection.
// ABOUTME: Lets the store address the last entry by offset without rescanning the file.

use spool_core::EOL;

/// Per-line byte lengths (excluding the end-of-line marker) for a journal,
/// in file order. Each entry contributes exactly two lengths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineIndex {
    lengths: Vec<u64>,
    total: u64,
}

/// Result of scanning raw journal bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub index: LineIndex,
    /// Bytes covered by complete entries. Anything past this offset is a
    /// torn tail left by an interrupted write.
    pub valid_len: u64,
}

impl LineIndex {
    /// Build an index from journal contents, keeping only complete entries.
    /// A trailing line without its end-of-line marker, or a destination line
    /// without its body line, is excluded and reported through `valid_len`.
    pub fn scan(bytes: &[u8]) -> Scan {
        let eol = EOL.as_bytes()[0];
        let mut lengths = Vec::new();
        let mut line_start = 0usize;
        let mut valid_len = 0usize;

        for (pos, byte) in bytes.iter().enumerate() {
            if *byte != eol {
                continue;
            }
            lengths.push((pos - line_start) as u64);
            line_start = pos + 1;
            if lengths.len() % 2 == 0 {
                valid_len = line_start;
            }
        }

        if lengths.len() % 2 == 1 {
            lengths.pop();
        }

        let total = lengths.iter().sum();
        Scan {
            index: Self { lengths, total },
            valid_len: valid_len as u64,
        }
    }

    /// Number of complete entries.
    pub fn entry_count(&self) -> usize {
        self.lengths.len() / 2
    }

    pub fn line_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Bytes the indexed entries occupy on disk, end-of-line markers included.
    pub fn byte_len(&self) -> u64 {
        self.total + (EOL.len() * self.lengths.len()) as u64
    }

    /// (destination, body) line lengths of the last entry.
    pub fn last_entry(&self) -> Option<(u64, u64)> {
        match self.lengths.as_slice() {
            [.., dest, body] => Some((*dest, *body)),
            _ => None,
        }
    }

    /// On-disk size of the last entry, end-of-line markers included.
    pub fn last_entry_len(&self) -> Option<u64> {
        self.last_entry()
            .map(|(dest, body)| dest + body + 2 * EOL.len() as u64)
    }

    /// Drop the last entry from the index, returning its on-disk size.
    pub fn pop_entry(&mut self) -> Option<u64> {
        let len = self.last_entry_len()?;
        let body = self.lengths.pop().unwrap_or(0);
        let dest = self.lengths.pop().unwrap_or(0);
        self.total -= dest + body;
        Some(len)
    }
}
