//! Archive encoding and decoding

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

use super::{ArchiveMetadata, FLAG_COMPRESSED, MAGIC, VERSION};
use crate::domain::ArchiveError;
use crate::trails::{Archived, ClassMetadata, ObjectKind, Record};

/// Header fields that precede the payload
struct Header {
    flags: u16,
    metadata: ArchiveMetadata,
    class_metadata: ClassMetadata,
}

/// Write `record` as a complete archive
///
/// # Errors
/// I/O failure of the writer, or a metadata block too large for its length
/// prefix.
pub fn save<W: Write>(mut writer: W, record: &Record, compress: bool) -> Result<(), ArchiveError> {
    let base = record.base();
    let metadata = ArchiveMetadata {
        hub_id: base.hub_id(),
        oid: base.oid().clone(),
        created_at: base.created_at(),
        class: record.class_name().to_string(),
    };
    let metadata = serde_json::to_vec(&metadata).map_err(io::Error::from)?;
    let class_metadata = serde_json::to_vec(&record.class_metadata()).map_err(io::Error::from)?;

    let mut payload = serde_json::to_vec(record).map_err(io::Error::from)?;
    let mut flags = 0u16;
    if compress {
        let mut encoder = GzEncoder::new(Vec::with_capacity(payload.len() / 4), Compression::default());
        encoder.write_all(&payload)?;
        payload = encoder.finish()?;
        flags |= FLAG_COMPRESSED;
    }

    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&flags.to_le_bytes())?;
    write_block_u32(&mut writer, &metadata, "metadata")?;
    write_block_u32(&mut writer, &class_metadata, "class metadata")?;
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read the version and both metadata blocks, leaving the payload unread
///
/// # Errors
/// [`ArchiveError::UnsupportedVersion`] or [`ArchiveError::BadFile`] for a
/// damaged header.
pub fn sniff<R: Read>(mut reader: R) -> Result<(u16, ArchiveMetadata, ClassMetadata), ArchiveError> {
    let header = read_header(&mut reader)?;
    Ok((VERSION, header.metadata, header.class_metadata))
}

/// Load an archive that must hold a `T`
///
/// # Errors
/// In order of checking: [`ArchiveError::UnsupportedVersion`],
/// [`ArchiveError::ClassMismatch`] (payload not decoded),
/// [`ArchiveError::WrongObject`] when the payload disagrees with its declared
/// class, and [`ArchiveError::BadFile`] for structural damage.
pub fn load<T: Archived, R: Read>(mut reader: R) -> Result<T, ArchiveError> {
    let header = read_header(&mut reader)?;
    if header.metadata.class != T::CLASS_NAME {
        return Err(ArchiveError::ClassMismatch {
            expected: T::CLASS_NAME.to_string(),
            found: header.metadata.class,
        });
    }
    let record = read_payload(&mut reader, &header)?;
    T::from_record(record).map_err(|other| ArchiveError::WrongObject {
        expected: T::CLASS_NAME.to_string(),
        found: other.class_name().to_string(),
    })
}

/// Load an archive of either kind, dispatching on the declared class name
///
/// # Errors
/// Same as [`load`]; an unknown class name is a
/// [`ArchiveError::ClassMismatch`].
pub fn load_any<R: Read>(mut reader: R) -> Result<Record, ArchiveError> {
    let header = read_header(&mut reader)?;
    let Some(kind) = ObjectKind::from_class_name(&header.metadata.class) else {
        return Err(ArchiveError::ClassMismatch {
            expected: format!("{} or {}", ObjectKind::Trace.class_name(), ObjectKind::Snapshot.class_name()),
            found: header.metadata.class,
        });
    };
    let record = read_payload(&mut reader, &header)?;
    if record.kind() != kind {
        return Err(ArchiveError::WrongObject {
            expected: kind.class_name().to_string(),
            found: record.class_name().to_string(),
        });
    }
    Ok(record)
}

fn write_block_u32<W: Write>(writer: &mut W, block: &[u8], what: &str) -> Result<(), ArchiveError> {
    let len = u32::try_from(block.len()).map_err(|_| ArchiveError::BadFile(format!("{what} block too large")))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(block)?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, ArchiveError> {
    let mut magic = [0u8; 10];
    read_exact(reader, &mut magic, "magic")?;
    if &magic != MAGIC {
        return Err(ArchiveError::BadFile("invalid magic bytes".to_string()));
    }

    let mut word = [0u8; 2];
    read_exact(reader, &mut word, "version")?;
    let version = u16::from_le_bytes(word);
    if version != VERSION {
        return Err(ArchiveError::UnsupportedVersion(version));
    }
    read_exact(reader, &mut word, "flags")?;
    let flags = u16::from_le_bytes(word);

    let metadata = read_block_u32(reader, "metadata")?;
    let metadata: ArchiveMetadata = serde_json::from_slice(&metadata)
        .map_err(|e| ArchiveError::BadFile(format!("invalid metadata block: {e}")))?;
    let class_metadata = read_block_u32(reader, "class metadata")?;
    let class_metadata: ClassMetadata = serde_json::from_slice(&class_metadata)
        .map_err(|e| ArchiveError::BadFile(format!("invalid class metadata block: {e}")))?;

    Ok(Header { flags, metadata, class_metadata })
}

fn read_payload<R: Read>(reader: &mut R, header: &Header) -> Result<Record, ArchiveError> {
    let mut len = [0u8; 8];
    read_exact(reader, &mut len, "payload length")?;
    let len = u64::from_le_bytes(len);

    // A corrupt length must not trigger a huge allocation up front.
    let mut payload = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut payload)?;
    if payload.len() as u64 != len {
        return Err(ArchiveError::BadFile(format!("truncated payload: {} of {len} bytes", payload.len())));
    }
    let mut rest = [0u8; 1];
    if reader.read(&mut rest)? != 0 {
        return Err(ArchiveError::BadFile("trailing bytes after payload".to_string()));
    }

    if header.flags & FLAG_COMPRESSED != 0 {
        let mut decoded = Vec::new();
        GzDecoder::new(payload.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|e| ArchiveError::BadFile(format!("corrupt compressed payload: {e}")))?;
        payload = decoded;
    }

    let record: Record = serde_json::from_slice(&payload)
        .map_err(|e| ArchiveError::BadFile(format!("invalid payload: {e}")))?;
    if record.oid() != &header.metadata.oid {
        return Err(ArchiveError::BadFile(format!(
            "payload oid {} does not match metadata oid {}",
            record.oid(),
            header.metadata.oid
        )));
    }
    Ok(record)
}

fn read_block_u32<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut len = [0u8; 4];
    read_exact(reader, &mut len, what)?;
    let len = u32::from_le_bytes(len);
    let mut block = Vec::new();
    reader.by_ref().take(u64::from(len)).read_to_end(&mut block)?;
    if block.len() as u64 != u64::from(len) {
        return Err(ArchiveError::BadFile(format!("truncated {what} block")));
    }
    Ok(block)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<(), ArchiveError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ArchiveError::BadFile(format!("truncated {what}")),
        _ => ArchiveError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HubId, TraceId};
    use crate::trails::{Snapshot, Trace};

    fn encoded(record: &Record, compress: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        save(&mut buf, record, compress).unwrap();
        buf
    }

    #[test]
    fn test_layout_prefix() {
        let record = Record::from(Snapshot::new(HubId::generate(), Vec::new()));
        let buf = encoded(&record, false);
        assert_eq!(&buf[..10], MAGIC);
        assert_eq!(u16::from_le_bytes([buf[10], buf[11]]), VERSION);
        assert_eq!(u16::from_le_bytes([buf[12], buf[13]]), 0);

        let buf = encoded(&record, true);
        assert_eq!(u16::from_le_bytes([buf[12], buf[13]]), FLAG_COMPRESSED);
    }

    #[test]
    fn test_sniff_reads_metadata_only() {
        let trace = Trace::new(HubId::generate(), TraceId::new("sniffed"), false);
        let oid = trace.base().oid().clone();
        let mut buf = encoded(&Record::from(trace), true);
        // Damage the payload; sniff must not notice.
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let (version, metadata, class_metadata) = sniff(buf.as_slice()).unwrap();
        assert_eq!(version, VERSION);
        assert_eq!(metadata.oid, oid);
        assert_eq!(metadata.class, Trace::CLASS_NAME);
        assert_eq!(class_metadata["trace_id"], serde_json::json!("sniffed"));
    }

    #[test]
    fn test_bad_magic() {
        let record = Record::from(Snapshot::new(HubId::generate(), Vec::new()));
        let mut buf = encoded(&record, false);
        buf[0] = b'X';
        assert!(matches!(load_any(buf.as_slice()), Err(ArchiveError::BadFile(_))));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let record = Record::from(Snapshot::new(HubId::generate(), Vec::new()));
        let buf = encoded(&record, false);
        assert!(matches!(load_any(&buf[..buf.len() - 3]), Err(ArchiveError::BadFile(_))));
        assert!(matches!(load_any(&buf[..12]), Err(ArchiveError::BadFile(_))));

        let mut longer = buf.clone();
        longer.push(0);
        assert!(matches!(load_any(longer.as_slice()), Err(ArchiveError::BadFile(_))));
    }

    #[test]
    fn test_unknown_class_in_load_any() {
        let record = Record::from(Snapshot::new(HubId::generate(), Vec::new()));
        let buf = encoded(&record, false);
        // Rewrite the class name inside the metadata block, keeping its length.
        let class = Snapshot::CLASS_NAME.as_bytes();
        let start = buf.windows(class.len()).position(|w| w == class).unwrap();
        let mut patched = buf.clone();
        patched[start..start + 10].copy_from_slice(b"elsewhere:");
        assert!(matches!(load_any(patched.as_slice()), Err(ArchiveError::ClassMismatch { .. })));
    }
}
