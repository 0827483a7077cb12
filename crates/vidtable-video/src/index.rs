//! H.264 Annex-B bytestream indexer.
//!
//! Consumes packets of NAL units separated by `00 00 01` / `00 00 00 01`
//! start codes, writes the stream through to a data file, and records the
//! per-frame index the descriptor needs: where each access unit starts, how
//! many bytes it spans, and which frames are IDR keyframes. SPS and PPS
//! units are hoisted out of the stream into a metadata blob so a decoder can
//! be initialized before any sample is read.
//!
//! The access-unit model is one coded picture per VCL slice: a slice NAL
//! (type 1 or 5) opens a new access unit, and non-VCL units that arrived
//! after the previous slice are attributed to the unit the slice opens.

use crate::error::{Result, VideoError};
use vidtable_store::WriteHandle;

const NAL_NON_IDR_SLICE: u8 = 1;
const NAL_IDR_SLICE: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;

/// Incremental index builder over an Annex-B stream.
///
/// Borrows the item's data-file writer for the duration of a batch; all
/// stream bytes except SPS/PPS are appended to it. Call
/// [`finish`](Self::finish) after the last packet to close the trailing
/// access unit.
pub struct H264Indexer<'a> {
    out: &'a mut WriteHandle,

    bytestream_pos: u64,
    frames: u64,
    num_non_ref_frames: u64,
    metadata_bytes: Vec<u8>,
    keyframe_indices: Vec<u64>,
    sample_offsets: Vec<u64>,
    sample_sizes: Vec<u64>,

    // Open access unit: where it starts, whether its slice has arrived, and
    // where trailing non-VCL units (which belong to the next unit) began.
    au_start: u64,
    au_has_slice: bool,
    pending_non_vcl_start: Option<u64>,
    finished: bool,
}

impl<'a> H264Indexer<'a> {
    pub fn new(out: &'a mut WriteHandle) -> Self {
        let bytestream_pos = out.bytes_written();
        Self {
            out,
            bytestream_pos,
            frames: 0,
            num_non_ref_frames: 0,
            metadata_bytes: Vec::new(),
            keyframe_indices: Vec::new(),
            sample_offsets: Vec::new(),
            sample_sizes: Vec::new(),
            au_start: bytestream_pos,
            au_has_slice: false,
            pending_non_vcl_start: None,
            finished: false,
        }
    }

    /// Feed one packet of complete NAL units. An empty buffer is a no-op.
    pub fn feed_packet(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if self.finished {
            return Err(VideoError::Bitstream(
                "packet fed after the index was finished".into(),
            ));
        }

        let Some((first, _)) = find_start_code(buf, 0) else {
            return Err(VideoError::Bitstream(
                "packet contains no start code".into(),
            ));
        };
        if first != 0 {
            return Err(VideoError::Bitstream(format!(
                "packet does not begin with a start code (first NAL at byte {first})"
            )));
        }

        let mut pos = 0;
        while pos < buf.len() {
            let (unit_start, code_len) = match find_start_code(buf, pos) {
                Some(found) => found,
                None => break,
            };
            let payload_start = unit_start + code_len;
            let unit_end = find_start_code(buf, payload_start)
                .map(|(next, _)| next)
                .unwrap_or(buf.len());

            if payload_start >= unit_end {
                return Err(VideoError::Bitstream(
                    "truncated NAL: start code with no header byte".into(),
                ));
            }

            self.index_nal(&buf[unit_start..unit_end], buf[payload_start])?;
            pos = unit_end;
        }

        Ok(())
    }

    /// Close the trailing access unit. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.au_has_slice {
            self.emit_frame(self.bytestream_pos);
        }
        self.finished = true;
        Ok(())
    }

    fn index_nal(&mut self, unit: &[u8], header: u8) -> Result<()> {
        let nal_type = header & 0x1F;
        let nal_ref_idc = (header >> 5) & 0x3;

        match nal_type {
            NAL_SPS | NAL_PPS => {
                // Hoisted into the descriptor, never into the data file.
                self.metadata_bytes.extend_from_slice(unit);
                Ok(())
            }
            NAL_IDR_SLICE | NAL_NON_IDR_SLICE => {
                if self.au_has_slice {
                    let boundary = self.pending_non_vcl_start.unwrap_or(self.bytestream_pos);
                    self.emit_frame(boundary);
                }
                self.au_has_slice = true;
                self.pending_non_vcl_start = None;

                if nal_type == NAL_IDR_SLICE {
                    self.keyframe_indices.push(self.frames);
                } else if nal_ref_idc == 0 {
                    self.num_non_ref_frames += 1;
                }
                self.write_unit(unit)
            }
            _ => {
                // SEI, AUD, filler: carried with the unit they precede.
                if self.au_has_slice && self.pending_non_vcl_start.is_none() {
                    self.pending_non_vcl_start = Some(self.bytestream_pos);
                }
                self.write_unit(unit)
            }
        }
    }

    fn emit_frame(&mut self, boundary: u64) {
        self.sample_offsets.push(self.au_start);
        self.sample_sizes.push(boundary - self.au_start);
        self.frames += 1;
        self.au_start = boundary;
    }

    fn write_unit(&mut self, unit: &[u8]) -> Result<()> {
        self.out.append(unit)?;
        self.bytestream_pos += unit.len() as u64;
        Ok(())
    }

    /// Number of closed access units.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn num_non_ref_frames(&self) -> u64 {
        self.num_non_ref_frames
    }

    /// SPS + PPS units in stream order, start codes preserved.
    pub fn metadata_bytes(&self) -> &[u8] {
        &self.metadata_bytes
    }

    pub fn keyframe_indices(&self) -> &[u64] {
        &self.keyframe_indices
    }

    pub fn sample_offsets(&self) -> &[u64] {
        &self.sample_offsets
    }

    pub fn sample_sizes(&self) -> &[u64] {
        &self.sample_sizes
    }

    /// Byte offset in the output file after everything written so far.
    pub fn bytestream_pos(&self) -> u64 {
        self.bytestream_pos
    }
}

/// Locate the next Annex-B start code at or after `from`.
///
/// Returns the code's position and length (4 for `00 00 00 01`, else 3).
fn find_start_code(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= buf.len() {
        if buf[i] == 0 && buf[i + 1] == 0 {
            if i + 4 <= buf.len() && buf[i + 2] == 0 && buf[i + 3] == 1 {
                return Some((i, 4));
            }
            if buf[i + 2] == 1 {
                return Some((i, 3));
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidtable_store::{BlobStore, StorageConfig};

    /// Build a NAL unit with a 4-byte start code.
    fn nal(ref_idc: u8, nal_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut unit = vec![0, 0, 0, 1, (ref_idc << 5) | (nal_type & 0x1F)];
        unit.extend_from_slice(payload);
        unit
    }

    fn sps() -> Vec<u8> {
        nal(3, NAL_SPS, &[0x42, 0x00, 0x1E])
    }

    fn pps() -> Vec<u8> {
        nal(3, NAL_PPS, &[0xCE, 0x38, 0x80])
    }

    fn idr(payload: &[u8]) -> Vec<u8> {
        nal(3, NAL_IDR_SLICE, payload)
    }

    fn p_slice(ref_idc: u8, payload: &[u8]) -> Vec<u8> {
        nal(ref_idc, NAL_NON_IDR_SLICE, payload)
    }

    fn test_writer(name: &str) -> (BlobStore, WriteHandle, std::path::PathBuf) {
        let temp_dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&temp_dir);
        let store = BlobStore::from_config(&StorageConfig::posix(&temp_dir)).unwrap();
        let writer = store.make_write_file("stream.bin").unwrap();
        (store, writer, temp_dir)
    }

    #[test]
    fn test_five_frame_stream() {
        let (store, mut writer, temp_dir) = test_writer("vidtable_test_index_five");

        let mut stream = Vec::new();
        stream.extend(sps());
        stream.extend(pps());
        stream.extend(idr(&[0xAA; 40]));
        for _ in 0..4 {
            stream.extend(p_slice(2, &[0xBB; 24]));
        }

        let mut indexer = H264Indexer::new(&mut writer);
        indexer.feed_packet(&stream).unwrap();
        indexer.finish().unwrap();

        assert_eq!(indexer.frames(), 5);
        assert_eq!(indexer.keyframe_indices(), &[0]);
        assert_eq!(indexer.sample_offsets()[0], 0);
        assert_eq!(indexer.num_non_ref_frames(), 0);

        // SPS/PPS are hoisted, everything else lands in the file.
        let idr_len = (4 + 1 + 40) as u64;
        let p_len = (4 + 1 + 24) as u64;
        assert_eq!(indexer.bytestream_pos(), idr_len + 4 * p_len);
        assert_eq!(indexer.sample_sizes(), &[idr_len, p_len, p_len, p_len, p_len]);
        assert_eq!(
            indexer.sample_sizes().iter().sum::<u64>(),
            indexer.bytestream_pos()
        );
        assert_eq!(indexer.metadata_bytes(), [sps(), pps()].concat().as_slice());

        // Offsets strictly increasing and within the stream.
        for pair in indexer.sample_offsets().windows(2) {
            assert!(pair[0] < pair[1]);
        }

        writer.save().unwrap();
        let reader = store.make_read_file("stream.bin").unwrap();
        assert_eq!(reader.size().unwrap(), idr_len + 4 * p_len);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_packets_may_split_frames() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_split");

        let mut indexer = H264Indexer::new(&mut writer);
        indexer.feed_packet(&[sps(), pps()].concat()).unwrap();
        indexer.feed_packet(&idr(&[1; 10])).unwrap();
        assert_eq!(indexer.frames(), 0, "open access unit not yet emitted");

        indexer.feed_packet(&p_slice(2, &[2; 10])).unwrap();
        assert_eq!(indexer.frames(), 1);
        assert_eq!(indexer.sample_offsets().len(), 1);

        indexer.finish().unwrap();
        assert_eq!(indexer.frames(), 2);
        assert_eq!(indexer.sample_offsets().len(), indexer.sample_sizes().len());

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_non_ref_frames_are_counted() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_nonref");

        let mut indexer = H264Indexer::new(&mut writer);
        let mut stream = Vec::new();
        stream.extend(sps());
        stream.extend(pps());
        stream.extend(idr(&[1; 8]));
        stream.extend(p_slice(0, &[2; 8])); // disposable
        stream.extend(p_slice(2, &[3; 8]));
        indexer.feed_packet(&stream).unwrap();
        indexer.finish().unwrap();

        assert_eq!(indexer.frames(), 3);
        assert_eq!(indexer.num_non_ref_frames(), 1);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_sei_belongs_to_following_frame() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_sei");

        let sei = nal(0, 6, &[0x05, 0x04]);
        let mut stream = Vec::new();
        stream.extend(sps());
        stream.extend(pps());
        stream.extend(idr(&[1; 8]));
        stream.extend(sei.clone());
        stream.extend(p_slice(2, &[2; 8]));

        let mut indexer = H264Indexer::new(&mut writer);
        indexer.feed_packet(&stream).unwrap();
        indexer.finish().unwrap();

        assert_eq!(indexer.frames(), 2);
        let idr_len = (4 + 1 + 8) as u64;
        // Frame 0 ends where the SEI begins; the SEI rides with frame 1.
        assert_eq!(indexer.sample_sizes()[0], idr_len);
        assert_eq!(indexer.sample_offsets()[1], idr_len);
        assert_eq!(
            indexer.sample_sizes()[1],
            sei.len() as u64 + (4 + 1 + 8) as u64
        );

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_empty_packet_is_noop() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_empty");

        let mut indexer = H264Indexer::new(&mut writer);
        indexer.feed_packet(&[]).unwrap();
        assert_eq!(indexer.frames(), 0);
        assert_eq!(indexer.bytestream_pos(), 0);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_missing_start_code_is_rejected() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_badstart");

        let mut indexer = H264Indexer::new(&mut writer);
        let err = indexer.feed_packet(&[0x65, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, VideoError::Bitstream(_)));

        // Leading garbage before the first start code is also invalid.
        let mut stream = vec![0xFF];
        stream.extend(idr(&[1; 4]));
        let err = indexer.feed_packet(&stream).unwrap_err();
        assert!(matches!(err, VideoError::Bitstream(_)));

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_truncated_nal_header_is_rejected() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_truncated");

        let mut indexer = H264Indexer::new(&mut writer);
        let err = indexer.feed_packet(&[0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, VideoError::Bitstream(_)));

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_three_byte_start_codes() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_short_code");

        let mut stream = vec![0, 0, 1, (3 << 5) | NAL_SPS, 0x42];
        stream.extend_from_slice(&[0, 0, 1, (3 << 5) | NAL_IDR_SLICE, 0x11, 0x22]);

        let mut indexer = H264Indexer::new(&mut writer);
        indexer.feed_packet(&stream).unwrap();
        indexer.finish().unwrap();

        assert_eq!(indexer.frames(), 1);
        assert_eq!(indexer.metadata_bytes(), &[0, 0, 1, (3 << 5) | NAL_SPS, 0x42]);
        assert_eq!(indexer.bytestream_pos(), 6);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_offsets_bounded_after_each_feed() {
        let (_store, mut writer, temp_dir) = test_writer("vidtable_test_index_bounds");

        let mut indexer = H264Indexer::new(&mut writer);
        indexer.feed_packet(&[sps(), pps()].concat()).unwrap();
        for i in 0..10u8 {
            let unit = if i == 0 {
                idr(&[i; 16])
            } else {
                p_slice(2, &[i; 16])
            };
            indexer.feed_packet(&unit).unwrap();

            assert_eq!(indexer.sample_offsets().len() as u64, indexer.frames());
            for (offset, size) in indexer
                .sample_offsets()
                .iter()
                .zip(indexer.sample_sizes())
            {
                assert!(offset + size <= indexer.bytestream_pos());
            }
        }

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
