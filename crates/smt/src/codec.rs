//! Big-endian binary encoding shared by the full and checkpointed formats.

use std::io::{self, Read, Write};

use crate::field::{self, Fe, FE_BYTES};
use crate::tree::{self, Level};
use crate::{Result, SmtError};

pub(crate) fn write_u32<W: Write>(w: &mut W, value: u64, what: &str) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| SmtError::Malformed(format!("{what} {value} does not fit in u32")))?;
    w.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub(crate) fn read_u32<R: Read>(r: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf, what)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SmtError::Malformed(format!("truncated input while reading {what}")),
        _ => SmtError::Io(e),
    })
}

/// `u32 count | count x (u32 index | 32-byte hash)`, ascending by index.
pub(crate) fn write_level<W: Write>(w: &mut W, level: &Level) -> Result<()> {
    write_u32(w, level.len() as u64, "level size")?;
    for (&idx, hash) in level {
        write_u32(w, idx, "node index")?;
        w.write_all(&field::to_be_bytes(hash))?;
    }
    Ok(())
}

/// Reads and checks `u32 depth | u32 numLeaves`.
pub(crate) fn read_header<R: Read>(r: &mut R) -> Result<(usize, u64)> {
    let depth = read_u32(r, "depth")? as usize;
    let num_leaves = u64::from(read_u32(r, "leaf count")?);
    tree::check_shape(depth, num_leaves).map_err(|e| SmtError::Malformed(e.to_string()))?;
    Ok((depth, num_leaves))
}

/// Reads one level, rejecting unsorted or duplicate indices, indices outside
/// the level and non-canonical field encodings.
pub(crate) fn read_level<R: Read>(r: &mut R, level: usize, depth: usize) -> Result<Level> {
    let width = 1u64 << (depth - level);
    let count = u64::from(read_u32(r, "level size")?);
    if count > width {
        return Err(SmtError::Malformed(format!(
            "level {level} claims {count} entries but holds at most {width}"
        )));
    }

    let mut entries = Level::new();
    let mut prev: Option<u64> = None;
    let mut buf = [0u8; FE_BYTES];
    for _ in 0..count {
        let idx = u64::from(read_u32(r, "node index")?);
        if idx >= width {
            return Err(SmtError::Malformed(format!("index {idx} outside level {level}")));
        }
        if prev.is_some_and(|p| idx <= p) {
            return Err(SmtError::Malformed(format!("level {level} indices not strictly ascending")));
        }
        prev = Some(idx);

        read_exact(r, &mut buf, "node hash")?;
        let hash: Fe = field::from_be_bytes(&buf)
            .ok_or_else(|| SmtError::Malformed(format!("non-canonical hash at level {level} index {idx}")))?;
        entries.insert(idx, hash);
    }
    Ok(entries)
}

/// Real leaves occupy `0..num_leaves`; nothing may be stored past them.
pub(crate) fn check_leaf_level(leaves: &Level, num_leaves: u64) -> Result<()> {
    match leaves.last_key_value() {
        Some((&idx, _)) if idx >= num_leaves => Err(SmtError::Malformed(format!(
            "leaf {idx} stored beyond leaf count {num_leaves}"
        ))),
        _ => Ok(()),
    }
}
