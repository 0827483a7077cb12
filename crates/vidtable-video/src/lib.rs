//! # vidtable-video
//!
//! The video half of the vidtable storage core: indexing an existing H.264
//! Annex-B bytestream into per-frame sample tables, persisting the
//! descriptor record that ties the encoded bytes to frame indices, and the
//! decoder pipeline the load path feeds those samples into.
//!
//! The engine never re-encodes video; the indexer only splits and accounts
//! for a stream some upstream encoder produced.

pub mod decoder;
pub mod error;
pub mod index;
pub mod metadata;

pub use decoder::{
    has_decoder_type, make_decoder, supported_decoder_types, DecoderState, DecoderType,
    FfmpegDecoder, VideoDecoder,
};
pub use error::{Result, VideoError};
pub use index::H264Indexer;
pub use metadata::VideoMetadata;
