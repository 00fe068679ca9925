//! ISO BMFF box serialization primitives.
//!
//! Each box follows the standard layout: 4-byte size (big-endian u32),
//! 4-byte type (ASCII), then box-specific content. Boxes whose content would
//! overflow a 32-bit size use the 64-bit `largesize` form.

/// Write a complete box: size + type + content.
pub(crate) fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    // 32-bit size unless the content forces the largesize form.
    if content.len() as u64 > u32::MAX as u64 - 8 {
        let size = 16 + content.len() as u64;
        let mut out = Vec::with_capacity(16 + content.len());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(box_type);
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(content);
        out
    } else {
        let size = (8 + content.len()) as u32;
        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(box_type);
        out.extend_from_slice(content);
        out
    }
}

/// Write a container box (size + type + children concatenated).
pub(crate) fn write_container_box(box_type: &[u8; 4], children: &[&[u8]]) -> Vec<u8> {
    let children_len: usize = children.iter().map(|c| c.len()).sum();
    let size = (8 + children_len) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

/// Full box header: version byte + 24-bit flags.
pub(crate) fn fullbox_header(version: u8, flags: u32) -> [u8; 4] {
    let val = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
    val.to_be_bytes()
}

// ---------------------------------------------------------------------------
// ftyp box
// ---------------------------------------------------------------------------

/// Generate the `ftyp` box.
/// Major brand: "isom", minor version: 0x200,
/// compatible brands: ["isom", "iso5", "dash"].
pub(crate) fn write_ftyp() -> Vec<u8> {
    let mut content = Vec::with_capacity(4 + 4 + 3 * 4);
    content.extend_from_slice(b"isom");
    content.extend_from_slice(&0x200u32.to_be_bytes());
    content.extend_from_slice(b"isom");
    content.extend_from_slice(b"iso5");
    content.extend_from_slice(b"dash");
    write_box(b"ftyp", &content)
}

// ---------------------------------------------------------------------------
// mvhd box (movie header, version 1 for 64-bit times)
// ---------------------------------------------------------------------------

pub(crate) fn write_mvhd(timescale: u32, duration: u64, next_track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(112);
    content.extend_from_slice(&fullbox_header(1, 0));
    // creation_time / modification_time
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // rate = 1.0 (fixed 16.16)
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    // volume = 1.0 (fixed 8.8)
    content.extend_from_slice(&0x0100u16.to_be_bytes());
    // reserved (2 + 8 bytes)
    content.extend_from_slice(&[0u8; 10]);
    // Matrix (identity)
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x4000_0000u32.to_be_bytes());
    // Pre-defined (6 * 4 bytes)
    content.extend_from_slice(&[0u8; 24]);
    content.extend_from_slice(&next_track_id.to_be_bytes());

    write_box(b"mvhd", &content)
}

// ---------------------------------------------------------------------------
// tkhd box (track header, version 1)
// ---------------------------------------------------------------------------

pub(crate) fn write_tkhd(
    track_id: u32,
    duration: u64,
    is_video: bool,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut content = Vec::with_capacity(96);
    // flags = 7 (enabled | in_movie | in_preview)
    content.extend_from_slice(&fullbox_header(1, 7));
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&track_id.to_be_bytes());
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // reserved (2 * u32)
    content.extend_from_slice(&[0u8; 8]);
    // layer, alternate_group
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    // volume: 0x0100 for audio, 0 for video
    let volume: u16 = if is_video { 0 } else { 0x0100 };
    content.extend_from_slice(&volume.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    // Matrix (identity)
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x4000_0000u32.to_be_bytes());
    // Width and height (16.16 fixed point)
    if is_video {
        content.extend_from_slice(&(width << 16).to_be_bytes());
        content.extend_from_slice(&(height << 16).to_be_bytes());
    } else {
        content.extend_from_slice(&0u32.to_be_bytes());
        content.extend_from_slice(&0u32.to_be_bytes());
    }

    write_box(b"tkhd", &content)
}

// ---------------------------------------------------------------------------
// mdhd box (media header, version 1)
// ---------------------------------------------------------------------------

pub(crate) fn write_mdhd(timescale: u32, duration: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(36);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // language: undetermined (0x55C4)
    content.extend_from_slice(&0x55C4u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());

    write_box(b"mdhd", &content)
}

// ---------------------------------------------------------------------------
// hdlr box (handler reference)
// ---------------------------------------------------------------------------

pub(crate) fn write_hdlr(handler_type: &[u8; 4], name: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(24 + name.len() + 1);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(handler_type);
    content.extend_from_slice(&[0u8; 12]);
    // name (null-terminated)
    content.extend_from_slice(name);
    content.push(0);

    write_box(b"hdlr", &content)
}

// ---------------------------------------------------------------------------
// dinf + dref boxes (data information)
// ---------------------------------------------------------------------------

pub(crate) fn write_dinf() -> Vec<u8> {
    let url_box = {
        let mut c = Vec::with_capacity(4);
        c.extend_from_slice(&fullbox_header(0, 1)); // flags = 1 => self-contained
        write_box(b"url ", &c)
    };
    let dref_box = {
        let mut c = Vec::with_capacity(8 + url_box.len());
        c.extend_from_slice(&fullbox_header(0, 0));
        c.extend_from_slice(&1u32.to_be_bytes()); // entry count
        c.extend_from_slice(&url_box);
        write_box(b"dref", &c)
    };
    write_container_box(b"dinf", &[&dref_box])
}

// ---------------------------------------------------------------------------
// vmhd / smhd boxes (media information headers)
// ---------------------------------------------------------------------------

pub(crate) fn write_vmhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(0, 1));
    // graphicsmode + opcolor
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&[0u8; 6]);
    write_box(b"vmhd", &content)
}

pub(crate) fn write_smhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    // balance + reserved
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    write_box(b"smhd", &content)
}

// ---------------------------------------------------------------------------
// Empty sample tables required inside a fragmented-MP4 init segment
// ---------------------------------------------------------------------------

fn write_empty_stts() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes());
    write_box(b"stts", &content)
}

fn write_empty_stsc() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes());
    write_box(b"stsc", &content)
}

fn write_empty_stsz() -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes()); // sample size
    content.extend_from_slice(&0u32.to_be_bytes()); // sample count
    write_box(b"stsz", &content)
}

fn write_empty_stco() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes());
    write_box(b"stco", &content)
}

// ---------------------------------------------------------------------------
// esds (MPEG-4 elementary stream descriptor)
// ---------------------------------------------------------------------------

/// Write one descriptor: tag + expandable length + content.
fn write_descriptor(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + content.len());
    out.push(tag);
    // Expandable size: 7 bits per byte, high bit = continuation.
    let mut size = content.len() as u32;
    let mut chunks = [0u8; 4];
    let mut n = 0;
    loop {
        chunks[n] = (size & 0x7F) as u8;
        size >>= 7;
        n += 1;
        if size == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let mut b = chunks[i];
        if i > 0 {
            b |= 0x80;
        }
        out.push(b);
    }
    out.extend_from_slice(content);
    out
}

/// Build the `esds` box around an AudioSpecificConfig.
///
/// Descriptor chain: ES_Descriptor(0x03) -> DecoderConfig(0x04) with
/// object type 0x40 (MPEG-4 audio) -> DecoderSpecificInfo(0x05) carrying the
/// config bytes, plus SLConfig(0x06).
pub(crate) fn write_esds(track_id: u32, audio_specific_config: &[u8]) -> Vec<u8> {
    let dec_specific = write_descriptor(0x05, audio_specific_config);

    let mut dec_config = Vec::with_capacity(13 + dec_specific.len());
    dec_config.push(0x40); // objectTypeIndication: MPEG-4 AAC
    dec_config.push(0x15); // streamType audio (0x05 << 2) | upstream 0 | reserved 1
    dec_config.extend_from_slice(&[0u8; 3]); // bufferSizeDB
    dec_config.extend_from_slice(&0u32.to_be_bytes()); // maxBitrate
    dec_config.extend_from_slice(&0u32.to_be_bytes()); // avgBitrate
    dec_config.extend_from_slice(&dec_specific);
    let dec_config = write_descriptor(0x04, &dec_config);

    let sl_config = write_descriptor(0x06, &[0x02]);

    let mut es = Vec::with_capacity(3 + dec_config.len() + sl_config.len());
    es.extend_from_slice(&(track_id as u16).to_be_bytes()); // ES_ID
    es.push(0); // no stream dependency / URL / OCR
    es.extend_from_slice(&dec_config);
    es.extend_from_slice(&sl_config);
    let es = write_descriptor(0x03, &es);

    let mut content = Vec::with_capacity(4 + es.len());
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&es);
    write_box(b"esds", &content)
}

// ---------------------------------------------------------------------------
// stsd sample entries
// ---------------------------------------------------------------------------

/// Visual sample entry (`avc1`/`avc3`/`hev1`/`hvc1`) with its codec
/// configuration box (`avcC`/`hvcC`).
pub(crate) fn write_visual_sample_entry(
    entry_type: &[u8; 4],
    config_type: &[u8; 4],
    width: u32,
    height: u32,
    codec_private: &[u8],
) -> Vec<u8> {
    let mut entry = Vec::with_capacity(78 + codec_private.len() + 8);
    // reserved (6) + data reference index
    entry.extend_from_slice(&[0u8; 6]);
    entry.extend_from_slice(&1u16.to_be_bytes());
    // pre_defined + reserved (16 bytes)
    entry.extend_from_slice(&[0u8; 16]);
    entry.extend_from_slice(&(width as u16).to_be_bytes());
    entry.extend_from_slice(&(height as u16).to_be_bytes());
    // 72 dpi horizontal and vertical resolution (fixed 16.16)
    entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    entry.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    entry.extend_from_slice(&0u32.to_be_bytes());
    // frame count
    entry.extend_from_slice(&1u16.to_be_bytes());
    // compressor name (32 bytes, null-padded)
    entry.extend_from_slice(&[0u8; 32]);
    // depth
    entry.extend_from_slice(&0x0018u16.to_be_bytes());
    entry.extend_from_slice(&(-1i16).to_be_bytes());

    if !codec_private.is_empty() {
        let config_box = write_box(config_type, codec_private);
        entry.extend_from_slice(&config_box);
    }

    write_box(entry_type, &entry)
}

/// Audio sample entry (`mp4a`) with an `esds` box built around the
/// AudioSpecificConfig.
pub(crate) fn write_audio_sample_entry(
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    codec_private: &[u8],
) -> Vec<u8> {
    let mut entry = Vec::with_capacity(28 + codec_private.len() + 16);
    // reserved (6) + data reference index
    entry.extend_from_slice(&[0u8; 6]);
    entry.extend_from_slice(&1u16.to_be_bytes());
    // reserved (2 * u32)
    entry.extend_from_slice(&[0u8; 8]);
    entry.extend_from_slice(&channels.to_be_bytes());
    // sample size (16 bits)
    entry.extend_from_slice(&16u16.to_be_bytes());
    // pre_defined + reserved
    entry.extend_from_slice(&0u16.to_be_bytes());
    entry.extend_from_slice(&0u16.to_be_bytes());
    // sample rate (fixed 16.16; the integer part only holds rates < 65536)
    entry.extend_from_slice(&((sample_rate & 0xFFFF) << 16).to_be_bytes());

    if !codec_private.is_empty() {
        let esds = write_esds(track_id, codec_private);
        entry.extend_from_slice(&esds);
    }

    write_box(b"mp4a", &entry)
}

/// Wrap a sample entry in an `stsd` box.
pub(crate) fn write_stsd(sample_entry: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + sample_entry.len());
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&1u32.to_be_bytes()); // entry count
    content.extend_from_slice(sample_entry);
    write_box(b"stsd", &content)
}

/// Sample table container: `stsd` plus the empty tables a fragmented init
/// segment requires.
pub(crate) fn write_stbl(stsd: &[u8]) -> Vec<u8> {
    let stts = write_empty_stts();
    let stsc = write_empty_stsc();
    let stsz = write_empty_stsz();
    let stco = write_empty_stco();
    write_container_box(b"stbl", &[stsd, &stts, &stsc, &stsz, &stco])
}

// ---------------------------------------------------------------------------
// trex / mvex (movie extends)
// ---------------------------------------------------------------------------

pub(crate) fn write_trex(track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(24);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&track_id.to_be_bytes());
    content.extend_from_slice(&1u32.to_be_bytes()); // default sample description index
    content.extend_from_slice(&0u32.to_be_bytes()); // default sample duration
    content.extend_from_slice(&0u32.to_be_bytes()); // default sample size
    content.extend_from_slice(&0u32.to_be_bytes()); // default sample flags
    write_box(b"trex", &content)
}

pub(crate) fn write_mvex(track_id: u32) -> Vec<u8> {
    let trex = write_trex(track_id);
    write_container_box(b"mvex", &[&trex])
}

// ---------------------------------------------------------------------------
// moof boxes (movie fragment)
// ---------------------------------------------------------------------------

/// Write the `mfhd` box (movie fragment header).
pub(crate) fn write_mfhd(sequence_number: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&sequence_number.to_be_bytes());
    write_box(b"mfhd", &content)
}

/// tfhd flag: sample offsets are relative to the start of the moof.
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x020000;
const TFHD_DEFAULT_SAMPLE_DURATION: u32 = 0x000008;
const TFHD_DEFAULT_SAMPLE_SIZE: u32 = 0x000010;
const TFHD_DEFAULT_SAMPLE_FLAGS: u32 = 0x000020;

/// Write the `tfhd` box with default-base-is-moof and the modal sample
/// defaults; per-sample values in `trun` override them.
pub(crate) fn write_tfhd(
    track_id: u32,
    default_duration: u32,
    default_size: u32,
    default_flags: u32,
) -> Vec<u8> {
    let flags = TFHD_DEFAULT_BASE_IS_MOOF
        | TFHD_DEFAULT_SAMPLE_DURATION
        | TFHD_DEFAULT_SAMPLE_SIZE
        | TFHD_DEFAULT_SAMPLE_FLAGS;
    let mut content = Vec::with_capacity(20);
    content.extend_from_slice(&fullbox_header(0, flags));
    content.extend_from_slice(&track_id.to_be_bytes());
    content.extend_from_slice(&default_duration.to_be_bytes());
    content.extend_from_slice(&default_size.to_be_bytes());
    content.extend_from_slice(&default_flags.to_be_bytes());
    write_box(b"tfhd", &content)
}

/// Write the `tfdt` box. Always version 1 (64-bit base decode time) so long
/// presentations never wrap.
pub(crate) fn write_tfdt(base_media_decode_time: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&base_media_decode_time.to_be_bytes());
    write_box(b"tfdt", &content)
}

/// A single sample's entry in `trun`.
pub(crate) struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
    pub cts_offset: i32,
}

/// Per-entry byte width in a full `trun`.
pub(crate) const TRUN_SAMPLE_SIZE: usize = 16;

const TRUN_DATA_OFFSET: u32 = 0x000001;
const TRUN_SAMPLE_DURATION: u32 = 0x000100;
const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0x000200;
const TRUN_SAMPLE_FLAGS: u32 = 0x000400;
const TRUN_SAMPLE_CTS: u32 = 0x000800;

/// Write the `trun` box, version 1 (signed composition offsets), with
/// per-sample duration, size, flags, and composition offset.
///
/// `data_offset` is the distance from the start of the enclosing moof to the
/// first payload byte in mdat.
pub(crate) fn write_trun(samples: &[TrunSample], data_offset: i32) -> Vec<u8> {
    let flags = TRUN_DATA_OFFSET
        | TRUN_SAMPLE_DURATION
        | TRUN_SAMPLE_SIZE_PRESENT
        | TRUN_SAMPLE_FLAGS
        | TRUN_SAMPLE_CTS;
    let mut content = Vec::with_capacity(12 + samples.len() * TRUN_SAMPLE_SIZE);
    content.extend_from_slice(&fullbox_header(1, flags));
    content.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    content.extend_from_slice(&data_offset.to_be_bytes());
    for s in samples {
        content.extend_from_slice(&s.duration.to_be_bytes());
        content.extend_from_slice(&s.size.to_be_bytes());
        content.extend_from_slice(&s.flags.to_be_bytes());
        content.extend_from_slice(&s.cts_offset.to_be_bytes());
    }
    write_box(b"trun", &content)
}

/// Write the `mdat` box header; the caller appends the payload. Uses the
/// 64-bit `largesize` form when the payload would overflow a 32-bit size.
pub(crate) fn write_mdat_header(data_size: u64) -> Vec<u8> {
    if data_size + 8 > u32::MAX as u64 {
        let mut hdr = Vec::with_capacity(16);
        hdr.extend_from_slice(&1u32.to_be_bytes());
        hdr.extend_from_slice(b"mdat");
        hdr.extend_from_slice(&(data_size + 16).to_be_bytes());
        hdr
    } else {
        let mut hdr = Vec::with_capacity(8);
        hdr.extend_from_slice(&((data_size + 8) as u32).to_be_bytes());
        hdr.extend_from_slice(b"mdat");
        hdr
    }
}
