//! Generic columnar file layout.
//!
//! A column item is a data file (concatenated element buffers, no framing)
//! plus a metadata file indexing it. Each `feed` appends one segment to the
//! metadata file: `u64 num_elements` followed by `num_elements × u64
//! element_size`, all little-endian fixed width. The reader recovers the
//! i-th element by summing the sizes before it.

use crate::error::{EngineError, Result};
use bytes::Bytes;
use vidtable_commons::Element;
use vidtable_store::{RandomReadHandle, WriteHandle};

/// Append one batch in the generic layout. Returns bytes written across both
/// files. An empty batch writes only the zero-count header.
pub fn write_generic_column(
    elements: &[Element],
    data: &mut WriteHandle,
    metadata: &mut WriteHandle,
) -> Result<u64> {
    let mut written = 0u64;

    metadata.append_u64(elements.len() as u64)?;
    written += 8;

    // Sizes first so the data file can be indexed without reading it.
    for element in elements {
        metadata.append_u64(element.size() as u64)?;
        written += 8;
    }
    for element in elements {
        data.append(element.as_bytes())?;
        written += element.size() as u64;
    }

    Ok(written)
}

/// Element sizes recovered from a metadata file, in row order across all
/// fed segments.
pub fn read_column_index(metadata: &RandomReadHandle) -> Result<Vec<u64>> {
    let bytes = metadata.read_all()?;
    parse_column_index(&bytes, metadata.path())
}

fn parse_column_index(bytes: &[u8], path: &str) -> Result<Vec<u64>> {
    let mut sizes = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let count = read_u64(bytes, &mut pos, path)?;
        for _ in 0..count {
            sizes.push(read_u64(bytes, &mut pos, path)?);
        }
    }

    Ok(sizes)
}

fn read_u64(bytes: &[u8], pos: &mut usize, path: &str) -> Result<u64> {
    let end = *pos + 8;
    if end > bytes.len() {
        return Err(EngineError::Corrupted(format!(
            "{path}: truncated metadata file ({} bytes, u64 expected at {})",
            bytes.len(),
            pos
        )));
    }
    let value = u64::from_le_bytes(bytes[*pos..end].try_into().expect("sliced to 8 bytes"));
    *pos = end;
    Ok(value)
}

/// Byte offset of each element in the data file.
pub fn element_offsets(sizes: &[u64]) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(sizes.len());
    let mut pos = 0u64;
    for &size in sizes {
        offsets.push(pos);
        pos += size;
    }
    offsets
}

/// Ranged read of the i-th element.
pub fn read_element(
    data: &RandomReadHandle,
    offsets: &[u64],
    sizes: &[u64],
    index: usize,
) -> Result<Bytes> {
    if index >= sizes.len() {
        return Err(EngineError::InvalidEntry(format!(
            "element {index} out of range for {} rows",
            sizes.len()
        )));
    }
    Ok(data.read_at(offsets[index], sizes[index])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use vidtable_store::{BlobStore, StorageConfig};

    fn test_store(name: &str) -> (BlobStore, std::path::PathBuf) {
        let temp_dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&temp_dir);
        let store = BlobStore::from_config(&StorageConfig::posix(&temp_dir)).unwrap();
        (store, temp_dir)
    }

    fn element(bytes: &[u8]) -> Element {
        Element::Bytes(BytesMut::from(bytes))
    }

    #[test]
    fn test_layout_bytes_exactly() {
        let (store, temp_dir) = test_store("vidtable_test_columns_layout");

        let mut data = store.make_write_file("data.bin").unwrap();
        let mut metadata = store.make_write_file("meta.bin").unwrap();
        let elements = vec![element(&[0x01]), element(&[0x02, 0x03]), element(&[0x04])];
        let written = write_generic_column(&elements, &mut data, &mut metadata).unwrap();
        assert_eq!(written, 8 * 4 + 4);
        data.save().unwrap();
        metadata.save().unwrap();

        let meta_bytes = store.get("meta.bin").unwrap();
        let mut expected = Vec::new();
        for v in [3u64, 1, 2, 1] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(&meta_bytes[..], &expected[..]);

        let data_bytes = store.get("data.bin").unwrap();
        assert_eq!(&data_bytes[..], &[0x01, 0x02, 0x03, 0x04]);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_index_roundtrip_with_ranged_reads() {
        let (store, temp_dir) = test_store("vidtable_test_columns_roundtrip");

        let mut data = store.make_write_file("data.bin").unwrap();
        let mut metadata = store.make_write_file("meta.bin").unwrap();
        let payloads: Vec<Vec<u8>> = vec![vec![7; 5], vec![], vec![1, 2, 3]];
        let elements: Vec<Element> = payloads.iter().map(|p| element(p)).collect();
        write_generic_column(&elements, &mut data, &mut metadata).unwrap();
        data.save().unwrap();
        metadata.save().unwrap();

        let meta_reader = store.make_read_file("meta.bin").unwrap();
        let sizes = read_column_index(&meta_reader).unwrap();
        assert_eq!(sizes, vec![5, 0, 3]);

        let data_reader = store.make_read_file("data.bin").unwrap();
        assert_eq!(sizes.iter().sum::<u64>(), data_reader.size().unwrap());

        let offsets = element_offsets(&sizes);
        for (i, payload) in payloads.iter().enumerate() {
            let read = read_element(&data_reader, &offsets, &sizes, i).unwrap();
            assert_eq!(&read[..], &payload[..]);
        }

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_multiple_segments_concatenate() {
        let (store, temp_dir) = test_store("vidtable_test_columns_segments");

        let mut data = store.make_write_file("data.bin").unwrap();
        let mut metadata = store.make_write_file("meta.bin").unwrap();
        write_generic_column(&[element(&[1])], &mut data, &mut metadata).unwrap();
        write_generic_column(&[element(&[2, 2]), element(&[3])], &mut data, &mut metadata)
            .unwrap();
        data.save().unwrap();
        metadata.save().unwrap();

        let sizes = read_column_index(&store.make_read_file("meta.bin").unwrap()).unwrap();
        assert_eq!(sizes, vec![1, 2, 1]);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_empty_batch_writes_only_header() {
        let (store, temp_dir) = test_store("vidtable_test_columns_empty");

        let mut data = store.make_write_file("data.bin").unwrap();
        let mut metadata = store.make_write_file("meta.bin").unwrap();
        let written = write_generic_column(&[], &mut data, &mut metadata).unwrap();
        assert_eq!(written, 8);
        data.save().unwrap();
        metadata.save().unwrap();

        assert_eq!(store.get("data.bin").unwrap().len(), 0);
        assert_eq!(
            &store.get("meta.bin").unwrap()[..],
            &0u64.to_le_bytes()[..]
        );

        let sizes = read_column_index(&store.make_read_file("meta.bin").unwrap()).unwrap();
        assert!(sizes.is_empty());

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_truncated_metadata_is_corrupted() {
        let err = parse_column_index(&[1, 0, 0], "meta.bin").unwrap_err();
        assert!(matches!(err, EngineError::Corrupted(_)));

        // Count promises more sizes than the file holds.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&5u64.to_le_bytes());
        let err = parse_column_index(&bytes, "meta.bin").unwrap_err();
        assert!(matches!(err, EngineError::Corrupted(_)));
    }
}
