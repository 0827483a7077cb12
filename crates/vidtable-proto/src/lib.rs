//! # vidtable-proto
//!
//! Protobuf wire types shared across the vidtable crates.
//!
//! The video descriptor is the index record persisted next to every video
//! column item; sinks and sources receive their storage options as an
//! encoded [`StorageArgs`] blob. Messages are defined directly with prost
//! derives so the crate builds without a protoc toolchain.

use prost::Message;

/// Element kind of the frames in a video column item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FrameKind {
    U8 = 0,
    F32 = 1,
    F64 = 2,
}

/// Codec of the item's data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Codec {
    /// Raw pixel buffers in the generic columnar layout.
    Raw = 0,
    /// Annex-B H.264 bytestream indexed by the descriptor.
    H264 = 1,
}

/// Chroma subsampling of an encoded stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChromaFormat {
    Yuv420 = 0,
    Yuv422 = 1,
    Yuv444 = 2,
}

/// Per video-column-item index record.
///
/// Ties the encoded byte stream in the item's data file to per-frame indices:
/// where each access unit starts, how large it is, which frames are
/// keyframes, and the SPS/PPS parameter sets needed to initialize a decoder.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VideoDescriptor {
    #[prost(int32, tag = "1")]
    pub table_id: i32,
    #[prost(int32, tag = "2")]
    pub column_id: i32,
    #[prost(int32, tag = "3")]
    pub item_id: i32,

    #[prost(enumeration = "FrameKind", tag = "4")]
    pub frame_type: i32,
    #[prost(enumeration = "Codec", tag = "5")]
    pub codec: i32,
    #[prost(uint32, tag = "6")]
    pub width: u32,
    #[prost(uint32, tag = "7")]
    pub height: u32,
    #[prost(uint32, tag = "8")]
    pub channels: u32,
    #[prost(enumeration = "ChromaFormat", tag = "9")]
    pub chroma_format: i32,

    #[prost(uint64, tag = "10")]
    pub num_encoded_videos: u64,
    /// Total frames across all encoded videos in this item.
    #[prost(uint64, tag = "11")]
    pub frames: u64,
    #[prost(uint64, repeated, tag = "12")]
    pub frames_per_video: Vec<u64>,
    #[prost(uint64, repeated, tag = "13")]
    pub keyframes_per_video: Vec<u64>,
    #[prost(uint64, repeated, tag = "14")]
    pub size_per_video: Vec<u64>,

    /// SPS and PPS NAL units, start codes preserved, hoisted out of the
    /// data file.
    #[prost(bytes = "vec", tag = "15")]
    pub metadata_packets: Vec<u8>,
    #[prost(uint64, repeated, tag = "16")]
    pub keyframe_indices: Vec<u64>,
    #[prost(uint64, repeated, tag = "17")]
    pub sample_offsets: Vec<u64>,
    #[prost(uint64, repeated, tag = "18")]
    pub sample_sizes: Vec<u64>,
    #[prost(uint64, tag = "19")]
    pub num_non_ref_frames: u64,

    /// Canonical path of the data file this descriptor indexes.
    #[prost(string, tag = "20")]
    pub data_path: String,
    /// True when the bytestream is hosted outside the table layout and
    /// referenced in place. The save path always writes false.
    #[prost(bool, tag = "21")]
    pub inplace: bool,

    #[prost(uint32, tag = "22")]
    pub time_base_num: u32,
    #[prost(uint32, tag = "23")]
    pub time_base_denom: u32,
}

impl VideoDescriptor {
    pub fn frame_kind(&self) -> FrameKind {
        FrameKind::try_from(self.frame_type).unwrap_or(FrameKind::U8)
    }

    pub fn codec_type(&self) -> Codec {
        Codec::try_from(self.codec).unwrap_or(Codec::Raw)
    }
}

/// Storage options carried in sink/source `args`.
///
/// Recognized storage types are `"posix"` (default), `"s3"`, and `"gcs"`.
/// `base_dir` applies to posix only and defaults to the current directory.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageArgs {
    #[prost(string, tag = "1")]
    pub storage_type: String,
    #[prost(string, tag = "2")]
    pub bucket: String,
    #[prost(string, tag = "3")]
    pub region: String,
    #[prost(string, tag = "4")]
    pub endpoint: String,
    #[prost(string, tag = "5")]
    pub base_dir: String,
}

/// Per-stream arguments for the Files sink: one output path per row.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FilesSinkStreamArgs {
    #[prost(string, repeated, tag = "1")]
    pub paths: Vec<String>,
}

/// Encode a message length-delimited, the framing used for descriptor files.
pub fn encode_length_delimited<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_length_delimited_to_vec()
}

/// Decode a length-delimited message, the inverse of
/// [`encode_length_delimited`].
pub fn decode_length_delimited<M: Message + Default>(
    buf: &[u8],
) -> Result<M, prost::DecodeError> {
    M::decode_length_delimited(buf)
}
