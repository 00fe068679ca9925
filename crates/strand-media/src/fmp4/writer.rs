//! High-level fMP4 writer.
//!
//! [`build_init`] produces an initialization segment (`ftyp` + `moov`) that
//! alone suffices to initialize a decoder; [`build_segment`] wraps a slice of
//! stored samples as one or more `moof` + `mdat` fragments. Both are pure
//! functions of their inputs; all cross-call state travels in
//! [`WriterOptions`].

use std::collections::HashMap;

use strand_core::{Error, Result};

use super::boxes::{self, TrunSample, TRUN_SAMPLE_SIZE};
use crate::media::{Sample, Track};

/// Sample flags value for a sync sample (depends on nothing).
const FLAGS_SYNC: u32 = 0x0200_0000;
/// Sample flags value for a dependent, non-sync sample.
const FLAGS_NON_SYNC: u32 = 0x0101_0000;

/// Codec families the writer can describe in an init segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// H.264 / AVC, stored as `avc1` or `avc3`.
    Avc,
    /// H.265 / HEVC, stored as `hev1` or `hvc1`.
    Hevc,
    /// AAC-LC / HE-AAC, stored as `mp4a`.
    Aac,
}

impl Codec {
    /// Classify a DASH/HLS codec parameter string (e.g. `avc1.640028`).
    pub fn from_codec_string(codec: &str) -> Result<Codec> {
        let fourcc = codec.split('.').next().unwrap_or(codec);
        match fourcc {
            "avc1" | "avc3" => Ok(Codec::Avc),
            "hev1" | "hvc1" => Ok(Codec::Hevc),
            "mp4a" => Ok(Codec::Aac),
            _ => Err(Error::CodecUnsupported(codec.to_string())),
        }
    }

    fn is_video(self) -> bool {
        matches!(self, Codec::Avc | Codec::Hevc)
    }

    fn config_box_type(self) -> &'static [u8; 4] {
        match self {
            Codec::Avc => b"avcC",
            Codec::Hevc => b"hvcC",
            Codec::Aac => b"esds",
        }
    }
}

/// Options for one [`build_segment`] call.
///
/// `dts_start`/`dts_end` describe the requested window and are informative;
/// timing is recomputed from the samples themselves. `dts_start_absolute` is
/// the base decode time stamped into the first fragment's `tfdt`.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// First sample index (inclusive).
    pub pos_start: usize,
    /// Last sample index (inclusive).
    pub pos_end: usize,
    pub dts_start: u64,
    pub dts_end: u64,
    /// Base decode time for `tfdt`.
    pub dts_start_absolute: u64,
    /// Target sub-fragment duration in track timescale ticks. `0` or any
    /// value covering the whole window emits a single fragment.
    pub fragment_duration: u64,
    /// `mfhd` sequence number of the first fragment; sub-fragments count up
    /// from it.
    pub sequence_number: u32,
}

/// Build the initialization segment for a track.
///
/// Fails with `CodecUnsupported` when the track's codec string names a
/// family the writer cannot describe.
pub fn build_init(track: &Track) -> Result<Vec<u8>> {
    let codec = Codec::from_codec_string(&track.codec)?;
    // The classifier only accepts 4-character sample entry names.
    let entry_type: &[u8; 4] = track.codec.as_bytes()[..4].try_into().unwrap();

    let ftyp = boxes::write_ftyp();

    let (sample_entry, handler, handler_name): (Vec<u8>, &[u8; 4], &[u8]) = if codec.is_video() {
        let (width, height) = track
            .video
            .as_ref()
            .map(|v| (v.width, v.height))
            .unwrap_or((0, 0));
        (
            boxes::write_visual_sample_entry(
                entry_type,
                codec.config_box_type(),
                width,
                height,
                &track.codec_private,
            ),
            b"vide",
            b"VideoHandler",
        )
    } else {
        let (sample_rate, channels) = track
            .audio
            .as_ref()
            .map(|a| (a.sample_rate, a.channels))
            .unwrap_or((0, 0));
        (
            boxes::write_audio_sample_entry(
                track.number,
                sample_rate,
                channels,
                &track.codec_private,
            ),
            b"soun",
            b"SoundHandler",
        )
    };

    let stsd = boxes::write_stsd(&sample_entry);
    let stbl = boxes::write_stbl(&stsd);
    let media_header = if codec.is_video() {
        boxes::write_vmhd()
    } else {
        boxes::write_smhd()
    };
    let dinf = boxes::write_dinf();
    let minf = boxes::write_container_box(b"minf", &[&media_header, &dinf, &stbl]);

    let mdhd = boxes::write_mdhd(track.timescale, track.duration);
    let hdlr = boxes::write_hdlr(handler, handler_name);
    let mdia = boxes::write_container_box(b"mdia", &[&mdhd, &hdlr, &minf]);

    let (width, height) = track
        .video
        .as_ref()
        .map(|v| (v.width, v.height))
        .unwrap_or((0, 0));
    let tkhd = boxes::write_tkhd(track.number, track.duration, codec.is_video(), width, height);
    let trak = boxes::write_container_box(b"trak", &[&tkhd, &mdia]);

    let mvhd = boxes::write_mvhd(track.timescale, track.duration, track.number + 1);
    let mvex = boxes::write_mvex(track.number);
    let moov = boxes::write_container_box(b"moov", &[&mvhd, &trak, &mvex]);

    let mut result = Vec::with_capacity(ftyp.len() + moov.len());
    result.extend_from_slice(&ftyp);
    result.extend_from_slice(&moov);
    Ok(result)
}

/// Build one media segment from the sample range `[pos_start, pos_end]`.
///
/// `sample_data` holds the raw bytes read from the stored asset starting at
/// `samples[pos_start].offset`. The writer emits exactly the requested
/// range; substituting a preceding sync sample for a non-sync start is the
/// caller's decision.
pub fn build_segment(track: &Track, opt: &WriterOptions, sample_data: &[u8]) -> Result<Vec<u8>> {
    let samples = &track.samples;
    if samples.is_empty() || opt.pos_start > opt.pos_end || opt.pos_end >= samples.len() {
        return Err(Error::EmptySampleRange);
    }

    let base = &samples[opt.pos_start];
    let last = &samples[opt.pos_end];
    let need = last.offset + last.length as u64 - base.offset;
    if (sample_data.len() as u64) < need {
        return Err(Error::SampleDataShort {
            need,
            got: sample_data.len() as u64,
        });
    }

    let base_offset = base.offset;
    let base_dts = base.dts;

    // Cut the range into sub-fragments of `fragment_duration` ticks.
    let mut fragments: Vec<(usize, usize)> = Vec::new();
    let mut frag_start = opt.pos_start;
    if opt.fragment_duration > 0 {
        for i in (opt.pos_start + 1)..=opt.pos_end {
            if samples[i].dts - samples[frag_start].dts >= opt.fragment_duration {
                fragments.push((frag_start, i - 1));
                frag_start = i;
            }
        }
    }
    fragments.push((frag_start, opt.pos_end));

    let mut out = Vec::with_capacity(need as usize + fragments.len() * 256);

    for (frag_index, &(fs, fe)) in fragments.iter().enumerate() {
        let frag_samples = &samples[fs..=fe];

        let trun_samples: Vec<TrunSample> = frag_samples
            .iter()
            .map(|s| TrunSample {
                duration: s.duration,
                size: s.length,
                flags: sample_flags(s),
                cts_offset: s.cts_offset,
            })
            .collect();

        let default_duration = modal(frag_samples.iter().map(|s| s.duration));
        let default_size = modal(frag_samples.iter().map(|s| s.length));
        let default_flags = modal(frag_samples.iter().map(sample_flags));

        let mfhd = boxes::write_mfhd(opt.sequence_number + frag_index as u32);
        let tfhd = boxes::write_tfhd(track.number, default_duration, default_size, default_flags);
        let tfdt = boxes::write_tfdt(opt.dts_start_absolute + (samples[fs].dts - base_dts));

        // moof is laid out first; its size determines trun.data_offset, the
        // distance from the moof start to the first mdat payload byte.
        let trun_size = 8 + 12 + trun_samples.len() * TRUN_SAMPLE_SIZE;
        let traf_size = 8 + tfhd.len() + tfdt.len() + trun_size;
        let moof_size = 8 + mfhd.len() + traf_size;

        let payload_size: u64 = frag_samples.iter().map(|s| s.length as u64).sum();
        let mdat_hdr = boxes::write_mdat_header(payload_size);
        let data_offset = (moof_size + mdat_hdr.len()) as i32;

        let trun = boxes::write_trun(&trun_samples, data_offset);
        let traf = boxes::write_container_box(b"traf", &[&tfhd, &tfdt, &trun]);
        let moof = boxes::write_container_box(b"moof", &[&mfhd, &traf]);

        out.extend_from_slice(&moof);
        out.extend_from_slice(&mdat_hdr);
        for s in frag_samples {
            let start = (s.offset - base_offset) as usize;
            out.extend_from_slice(&sample_data[start..start + s.length as usize]);
        }
    }

    Ok(out)
}

fn sample_flags(s: &Sample) -> u32 {
    if s.is_rap() {
        FLAGS_SYNC
    } else {
        FLAGS_NON_SYNC
    }
}

/// Most frequent value; the first value to reach the winning count wins,
/// keeping the output deterministic.
fn modal<I: Iterator<Item = u32>>(values: I) -> u32 {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    let mut best = 0u32;
    let mut best_count = 0u32;
    for v in values {
        let c = counts.entry(v).or_insert(0);
        *c += 1;
        if *c > best_count {
            best_count = *c;
            best = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioParams, MediaType, VideoParams, SAMPLE_FLAG_RAP};

    fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    fn read_u64(data: &[u8], offset: usize) -> u64 {
        u64::from_be_bytes(data[offset..offset + 8].try_into().unwrap())
    }

    /// Walk top-level boxes, returning (type, start, size).
    fn walk_boxes(data: &[u8]) -> Vec<([u8; 4], usize, usize)> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos + 8 <= data.len() {
            let size = read_u32(data, pos) as usize;
            assert!(size >= 8, "box size too small at {pos}");
            assert!(pos + size <= data.len(), "box at {pos} extends past end");
            let mut t = [0u8; 4];
            t.copy_from_slice(&data[pos + 4..pos + 8]);
            out.push((t, pos, size));
            pos += size;
        }
        assert_eq!(pos, data.len(), "boxes do not span the whole buffer");
        out
    }

    fn count_occurrences(data: &[u8], needle: &[u8; 4]) -> usize {
        data.windows(4).filter(|w| w == needle).count()
    }

    fn avc_track(samples: Vec<Sample>) -> Track {
        Track {
            id: 1,
            number: 1,
            media_type: MediaType::Video,
            codec: "avc1.640028".into(),
            mime_type: "video/mp4".into(),
            bandwidth: 2_500_000,
            timescale: 15360,
            media_timescale: 15360,
            duration: samples.iter().map(|s| s.duration as u64).sum(),
            audio: None,
            video: Some(VideoParams {
                width: 1280,
                height: 720,
                fps_num: 30,
                fps_denum: 1,
                sar_w: 1,
                sar_h: 1,
            }),
            codec_private: vec![0x01, 0x64, 0x00, 0x28, 0xFF],
            samples,
        }
    }

    fn aac_track() -> Track {
        Track {
            id: 2,
            number: 2,
            media_type: MediaType::Audio,
            codec: "mp4a.40.2".into(),
            mime_type: "audio/mp4".into(),
            bandwidth: 128_000,
            timescale: 48000,
            media_timescale: 48000,
            duration: 0,
            audio: Some(AudioParams {
                sample_rate: 48000,
                channels: 2,
            }),
            video: None,
            codec_private: vec![0x11, 0x90],
            samples: vec![],
        }
    }

    fn sample(dts: u64, offset: u64, length: u32, rap: bool) -> Sample {
        Sample {
            dts,
            cts_offset: 0,
            duration: 512,
            offset,
            length,
            flags: if rap { SAMPLE_FLAG_RAP } else { 0 },
        }
    }

    fn uniform_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| sample(512 * i as u64, 1000 + 100 * i as u64, 100, i == 0))
            .collect()
    }

    fn whole_range(track: &Track) -> WriterOptions {
        WriterOptions {
            pos_start: 0,
            pos_end: track.samples.len() - 1,
            dts_start: track.samples[0].dts,
            dts_end: track.samples.last().unwrap().dts,
            dts_start_absolute: track.samples[0].dts,
            fragment_duration: 0,
            sequence_number: 1,
        }
    }

    fn sample_bytes(track: &Track) -> Vec<u8> {
        // Distinct byte value per sample so round-trips are checkable.
        let base = track.samples[0].offset;
        let last = track.samples.last().unwrap();
        let len = (last.offset + last.length as u64 - base) as usize;
        let mut data = vec![0u8; len];
        for (i, s) in track.samples.iter().enumerate() {
            let start = (s.offset - base) as usize;
            for b in &mut data[start..start + s.length as usize] {
                *b = (i % 251) as u8 + 1;
            }
        }
        data
    }

    #[test]
    fn init_is_ftyp_then_moov_without_mdat() {
        let track = avc_track(uniform_samples(4));
        let init = build_init(&track).unwrap();

        let top = walk_boxes(&init);
        assert_eq!(top.len(), 2);
        assert_eq!(&top[0].0, b"ftyp");
        assert_eq!(&top[1].0, b"moov");
        assert_eq!(&init[8..12], b"isom"); // major brand

        assert_eq!(count_occurrences(&init, b"trak"), 1);
        assert_eq!(count_occurrences(&init, b"mdat"), 0);
        assert_eq!(count_occurrences(&init, b"trex"), 1);
        assert_eq!(count_occurrences(&init, b"avcC"), 1);
    }

    #[test]
    fn init_is_deterministic() {
        let track = avc_track(uniform_samples(4));
        assert_eq!(build_init(&track).unwrap(), build_init(&track).unwrap());
    }

    #[test]
    fn init_avc3_keeps_entry_name() {
        let mut track = avc_track(uniform_samples(1));
        track.codec = "avc3.640028".into();
        let init = build_init(&track).unwrap();
        assert_eq!(count_occurrences(&init, b"avc3"), 1);
        assert_eq!(count_occurrences(&init, b"avcC"), 1);
    }

    #[test]
    fn init_hevc_uses_hvcc() {
        let mut track = avc_track(uniform_samples(1));
        track.codec = "hvc1.1.6.L93.B0".into();
        let init = build_init(&track).unwrap();
        assert_eq!(count_occurrences(&init, b"hvc1"), 1);
        assert_eq!(count_occurrences(&init, b"hvcC"), 1);
    }

    #[test]
    fn init_audio_uses_mp4a_and_esds() {
        let track = aac_track();
        let init = build_init(&track).unwrap();
        assert_eq!(count_occurrences(&init, b"mp4a"), 1);
        assert_eq!(count_occurrences(&init, b"esds"), 1);
        assert_eq!(count_occurrences(&init, b"smhd"), 1);
        assert_eq!(count_occurrences(&init, b"soun"), 1);
    }

    #[test]
    fn init_unknown_codec_rejected() {
        let mut track = avc_track(uniform_samples(1));
        track.codec = "vp09.00.10.08".into();
        let err = build_init(&track).unwrap_err();
        assert!(matches!(err, Error::CodecUnsupported(_)));
    }

    #[test]
    fn segment_is_moof_then_mdat() {
        let track = avc_track(uniform_samples(4));
        let data = sample_bytes(&track);
        let seg = build_segment(&track, &whole_range(&track), &data).unwrap();

        let top = walk_boxes(&seg);
        assert_eq!(top.len(), 2);
        assert_eq!(&top[0].0, b"moof");
        assert_eq!(&top[1].0, b"mdat");

        // mdat carries exactly the 4 * 100 payload bytes.
        let (_, mdat_start, mdat_size) = top[1];
        assert_eq!(mdat_size, 8 + 400);
        assert_eq!(&seg[mdat_start + 8..mdat_start + 8 + 100], &[1u8; 100][..]);
    }

    #[test]
    fn segment_payload_roundtrip() {
        // Samples with gaps between payload ranges (interleaved storage).
        let samples = vec![
            sample(0, 1000, 100, true),
            sample(512, 1200, 50, false),
            sample(1024, 1400, 75, false),
        ];
        let track = avc_track(samples);
        let data = sample_bytes(&track);
        let seg = build_segment(&track, &whole_range(&track), &data).unwrap();

        let top = walk_boxes(&seg);
        let (_, mdat_start, mdat_size) = top[1];
        assert_eq!(mdat_size, 8 + 100 + 50 + 75);
        let payload = &seg[mdat_start + 8..mdat_start + mdat_size];
        assert!(payload[..100].iter().all(|&b| b == 1));
        assert!(payload[100..150].iter().all(|&b| b == 2));
        assert!(payload[150..].iter().all(|&b| b == 3));
    }

    #[test]
    fn trun_data_offset_reaches_payload() {
        let track = avc_track(uniform_samples(3));
        let data = sample_bytes(&track);
        let seg = build_segment(&track, &whole_range(&track), &data).unwrap();

        let top = walk_boxes(&seg);
        let (_, _, moof_size) = top[0];

        // Find trun inside the moof and read its data_offset.
        let trun_pos = seg
            .windows(4)
            .position(|w| w == b"trun")
            .expect("no trun box")
            - 4;
        let data_offset = read_u32(&seg, trun_pos + 16) as usize;
        assert_eq!(data_offset, moof_size + 8);
        // The byte at data_offset (relative to moof start, here 0) is the
        // first payload byte of the first sample.
        assert_eq!(seg[data_offset], 1);
    }

    #[test]
    fn tfdt_carries_absolute_decode_time() {
        let track = avc_track(uniform_samples(300));
        let mut opt = whole_range(&track);
        // Slice out the second 4-second chunk, as a segment request would.
        opt.pos_start = 120;
        opt.pos_end = 239;
        opt.dts_start_absolute = 61440;
        let base = track.samples[120].offset;
        let last = &track.samples[239];
        let full = sample_bytes(&track);
        let window =
            &full[(base - track.samples[0].offset) as usize
                ..(last.offset + last.length as u64 - track.samples[0].offset) as usize];

        let seg = build_segment(&track, &opt, window).unwrap();
        let tfdt_pos = seg
            .windows(4)
            .position(|w| w == b"tfdt")
            .expect("no tfdt box")
            - 4;
        assert_eq!(seg[tfdt_pos + 8], 1); // version 1
        assert_eq!(read_u64(&seg, tfdt_pos + 12), 61440);
    }

    #[test]
    fn fragment_duration_splits_into_subfragments() {
        let track = avc_track(uniform_samples(4));
        let data = sample_bytes(&track);
        let mut opt = whole_range(&track);
        opt.fragment_duration = 1024; // two samples per fragment

        let seg = build_segment(&track, &opt, &data).unwrap();
        let top = walk_boxes(&seg);
        let types: Vec<&[u8; 4]> = top.iter().map(|(t, _, _)| t).collect();
        assert_eq!(types, vec![b"moof", b"mdat", b"moof", b"mdat"]);

        // Sequence numbers count up from the caller's base.
        let seq_first = read_u32(&seg, top[0].1 + 8 + 8 + 4);
        let seq_second = read_u32(&seg, top[2].1 + 8 + 8 + 4);
        assert_eq!(seq_first, 1);
        assert_eq!(seq_second, 2);

        // The second fragment's tfdt advances by two sample durations.
        let second_moof = &seg[top[2].1..top[2].1 + top[2].2];
        let tfdt_pos = second_moof
            .windows(4)
            .position(|w| w == b"tfdt")
            .expect("no tfdt")
            - 4;
        assert_eq!(read_u64(second_moof, tfdt_pos + 12), 1024);
    }

    #[test]
    fn whole_window_fragment_duration_keeps_one_fragment() {
        let track = avc_track(uniform_samples(4));
        let data = sample_bytes(&track);
        let mut opt = whole_range(&track);
        opt.fragment_duration = track.timescale as u64; // larger than the window
        let seg = build_segment(&track, &opt, &data).unwrap();
        assert_eq!(walk_boxes(&seg).len(), 2);
    }

    #[test]
    fn modal_defaults_land_in_tfhd() {
        // Three samples at 512 ticks, one at 511: the default is 512.
        let mut samples = uniform_samples(4);
        samples[3].duration = 511;
        let track = avc_track(samples);
        let data = sample_bytes(&track);
        let seg = build_segment(&track, &whole_range(&track), &data).unwrap();

        let tfhd_pos = seg
            .windows(4)
            .position(|w| w == b"tfhd")
            .expect("no tfhd")
            - 4;
        assert_eq!(read_u32(&seg, tfhd_pos + 12), 1); // track id
        assert_eq!(read_u32(&seg, tfhd_pos + 16), 512); // default duration
        assert_eq!(read_u32(&seg, tfhd_pos + 20), 100); // default size
        assert_eq!(read_u32(&seg, tfhd_pos + 24), FLAGS_NON_SYNC); // 3 of 4 non-sync
    }

    #[test]
    fn sync_flag_tracks_rap_bit() {
        let track = avc_track(uniform_samples(2));
        let data = sample_bytes(&track);
        let seg = build_segment(&track, &whole_range(&track), &data).unwrap();

        let trun_pos = seg
            .windows(4)
            .position(|w| w == b"trun")
            .expect("no trun")
            - 4;
        // Entries start after fullbox(4) + count(4) + data_offset(4); flags
        // sit at entry offset 8 (after duration and size).
        let first_flags = read_u32(&seg, trun_pos + 20 + 8);
        let second_flags = read_u32(&seg, trun_pos + 20 + TRUN_SAMPLE_SIZE + 8);
        assert_eq!(first_flags, FLAGS_SYNC);
        assert_eq!(second_flags, FLAGS_NON_SYNC);
    }

    #[test]
    fn empty_range_rejected() {
        let track = avc_track(vec![]);
        let opt = WriterOptions {
            pos_start: 0,
            pos_end: 0,
            dts_start: 0,
            dts_end: 0,
            dts_start_absolute: 0,
            fragment_duration: 0,
            sequence_number: 1,
        };
        assert!(matches!(
            build_segment(&track, &opt, &[]),
            Err(Error::EmptySampleRange)
        ));

        let track = avc_track(uniform_samples(2));
        let mut opt = whole_range(&track);
        opt.pos_end = 5; // past the last sample
        assert!(matches!(
            build_segment(&track, &opt, &[0u8; 1000]),
            Err(Error::EmptySampleRange)
        ));
    }

    #[test]
    fn short_sample_data_rejected() {
        let track = avc_track(uniform_samples(3));
        let opt = whole_range(&track);
        let err = build_segment(&track, &opt, &[0u8; 10]).unwrap_err();
        match err {
            Error::SampleDataShort { need, got } => {
                assert_eq!(need, 300);
                assert_eq!(got, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn init_plus_segment_sample_accounting() {
        // Every sample advertised in trun fits inside the mdat payload.
        let track = avc_track(uniform_samples(5));
        let data = sample_bytes(&track);
        let seg = build_segment(&track, &whole_range(&track), &data).unwrap();

        let top = walk_boxes(&seg);
        let (_, _, mdat_size) = top[1];
        let trun_pos = seg
            .windows(4)
            .position(|w| w == b"trun")
            .unwrap()
            - 4;
        let count = read_u32(&seg, trun_pos + 12) as usize;
        let mut advertised = 0u64;
        for i in 0..count {
            advertised += read_u32(&seg, trun_pos + 20 + i * TRUN_SAMPLE_SIZE + 4) as u64;
        }
        assert_eq!(advertised + 8, mdat_size as u64);
    }

    #[test]
    fn modal_prefers_first_winner() {
        assert_eq!(modal([3, 3, 7, 7, 5].into_iter()), 3);
        assert_eq!(modal([7, 3, 3].into_iter()), 3);
        assert_eq!(modal([9].into_iter()), 9);
    }
}
