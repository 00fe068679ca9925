//! DASH MPD generation.
//!
//! Emits a static (VOD) MPD for a [`Playlist`]. Output is byte-identical for
//! identical playlists: representations are iterated in map order and every
//! attribute is written in a fixed sequence.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use strand_core::{Error, Result};

use crate::media::{MediaType, Track};
use crate::playlist::{Playlist, Representation};

/// Generate the MPD document for a playlist.
pub fn generate_mpd(playlist: &Playlist) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_err)?;

    let presentation_duration = print_time(playlist.duration_msec);
    // The source emitted the presentation duration here, which defeats the
    // attribute's purpose; advertise the actual chunk duration instead.
    let max_segment_duration = print_time(1000 * playlist.chunk_duration_sec);

    let mut mpd = BytesStart::new("MPD");
    mpd.push_attribute(("xmlns", "urn:mpeg:dash:schema:mpd:2011"));
    mpd.push_attribute(("minBufferTime", "PT1.500S"));
    mpd.push_attribute(("profiles", "urn:mpeg:dash:profile:full:2011"));
    mpd.push_attribute(("type", "static"));
    mpd.push_attribute(("mediaPresentationDuration", presentation_duration.as_str()));
    mpd.push_attribute(("maxSegmentDuration", max_segment_duration.as_str()));
    writer.write_event(Event::Start(mpd)).map_err(write_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("BaseURL")))
        .map_err(write_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&playlist.base_url)))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("BaseURL")))
        .map_err(write_err)?;

    let mut period = BytesStart::new("Period");
    period.push_attribute(("id", "period_id"));
    writer.write_event(Event::Start(period)).map_err(write_err)?;

    for repr in playlist.repr.values() {
        if repr.tracks.is_empty() {
            continue;
        }

        let mut aset = BytesStart::new("AdaptationSet");
        aset.push_attribute(("segmentAlignment", "true"));
        writer.write_event(Event::Start(aset)).map_err(write_err)?;

        write_representation(&mut writer, playlist, repr)?;

        writer
            .write_event(Event::End(BytesEnd::new("AdaptationSet")))
            .map_err(write_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Period")))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("MPD")))
        .map_err(write_err)?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("mpd not utf-8: {e}")))
}

fn write_representation<W: std::io::Write>(
    writer: &mut Writer<W>,
    playlist: &Playlist,
    repr: &Representation,
) -> Result<()> {
    // The manifest is generated from the first track request; the builder
    // guarantees subsequent requests never change codec or init parameters.
    let track = repr.tracks[0].track();

    let mut el = BytesStart::new("Representation");
    el.push_attribute(("id", repr.id.as_str()));
    el.push_attribute(("startWithSAP", "1"));
    el.push_attribute(("mimeType", track.mime_type.as_str()));
    el.push_attribute(("codecs", track.codec.as_str()));
    el.push_attribute(("bandwidth", track.bandwidth.to_string().as_str()));

    match track.media_type {
        MediaType::Audio => {
            if let Some(audio) = &track.audio {
                el.push_attribute(("audioSamplingRate", audio.sample_rate.to_string().as_str()));
            }
        }
        MediaType::Video => {
            if let Some(video) = &track.video {
                el.push_attribute(("width", video.width.to_string().as_str()));
                el.push_attribute(("height", video.height.to_string().as_str()));
                el.push_attribute((
                    "frameRate",
                    frame_rate(video.fps_num, video.fps_denum).as_str(),
                ));
                el.push_attribute(("sar", format!("{}:{}", video.sar_w, video.sar_h).as_str()));
            }
        }
        MediaType::Other => {}
    }

    writer.write_event(Event::Start(el)).map_err(write_err)?;

    if track.media_type == MediaType::Audio {
        if let Some(audio) = &track.audio {
            let mut channel = BytesStart::new("AudioChannelConfiguration");
            channel.push_attribute((
                "schemeIdUri",
                "urn:mpeg:dash:23003:3:audio_channel_configuration:2011",
            ));
            channel.push_attribute(("value", audio.channels.to_string().as_str()));
            writer
                .write_event(Event::Empty(channel))
                .map_err(write_err)?;
        }
    }

    write_segment_template(writer, playlist, repr, track)?;

    writer
        .write_event(Event::End(BytesEnd::new("Representation")))
        .map_err(write_err)?;
    Ok(())
}

fn write_segment_template<W: std::io::Write>(
    writer: &mut Writer<W>,
    playlist: &Playlist,
    repr: &Representation,
    track: &Track,
) -> Result<()> {
    let duration = track.media_timescale as u64 * playlist.chunk_duration_sec;

    let mut seg = BytesStart::new("SegmentTemplate");
    seg.push_attribute(("timescale", track.media_timescale.to_string().as_str()));
    seg.push_attribute(("duration", duration.to_string().as_str()));
    seg.push_attribute(("initialization", format!("init/{}", repr.id).as_str()));
    seg.push_attribute(("startNumber", "0"));
    seg.push_attribute(("media", format!("play/{}/$Number$", repr.id).as_str()));
    writer.write_event(Event::Empty(seg)).map_err(write_err)
}

/// ISO-8601 duration: `PT<H>H<M>M<S.fff>S` with exactly three fractional
/// digits of seconds.
fn print_time(duration_msec: u64) -> String {
    let h = duration_msec / 3_600_000;
    let m = (duration_msec % 3_600_000) / 60_000;
    let s = (duration_msec % 60_000) as f64 / 1000.0;
    format!("PT{h}H{m}M{s:.3}S")
}

/// Frame rate attribute: the rate reduced by GCD, written `num/denum` only
/// when the reduced denominator exceeds 1.
fn frame_rate(fps_num: u32, fps_denum: u32) -> String {
    let d = gcd(fps_num, fps_denum.max(1));
    let num = fps_num / d;
    let denum = fps_denum.max(1) / d;
    if denum > 1 {
        format!("{num}/{denum}")
    } else {
        num.to_string()
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

fn write_err(e: impl std::fmt::Display) -> Error {
    Error::Internal(format!("mpd write: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioParams, Media, Sample, VideoParams, SAMPLE_FLAG_RAP};
    use crate::playlist::{PlaylistBuilder, TrackRef};
    use std::sync::Arc;

    fn avc_media(duration_sec: u64) -> Arc<Media> {
        let timescale = 15360u32;
        Arc::new(Media {
            tracks: vec![Track {
                id: 1,
                number: 1,
                media_type: MediaType::Video,
                codec: "avc1.640028".into(),
                mime_type: "video/mp4".into(),
                bandwidth: 2_500_000,
                timescale,
                media_timescale: timescale,
                duration: duration_sec * timescale as u64,
                audio: None,
                video: Some(VideoParams {
                    width: 1280,
                    height: 720,
                    fps_num: 30,
                    fps_denum: 1,
                    sar_w: 1,
                    sar_h: 1,
                }),
                codec_private: vec![1],
                samples: vec![Sample {
                    dts: 0,
                    cts_offset: 0,
                    duration: 512,
                    offset: 0,
                    length: 100,
                    flags: SAMPLE_FLAG_RAP,
                }],
            }],
        })
    }

    fn aac_media(duration_sec: u64) -> Arc<Media> {
        let timescale = 48000u32;
        Arc::new(Media {
            tracks: vec![Track {
                id: 1,
                number: 1,
                media_type: MediaType::Audio,
                codec: "mp4a.40.2".into(),
                mime_type: "audio/mp4".into(),
                bandwidth: 128_000,
                timescale,
                media_timescale: timescale,
                duration: duration_sec * timescale as u64,
                audio: Some(AudioParams {
                    sample_rate: 48000,
                    channels: 2,
                }),
                video: None,
                codec_private: vec![0x11, 0x90],
                samples: vec![Sample {
                    dts: 0,
                    cts_offset: 0,
                    duration: 1024,
                    offset: 0,
                    length: 100,
                    flags: SAMPLE_FLAG_RAP,
                }],
            }],
        })
    }

    fn single_video_playlist() -> Playlist {
        let mut b = PlaylistBuilder::new("http://h/", 4);
        b.add_adaptation(vec![("v0", vec![TrackRef::new(avc_media(12), 1)])])
            .unwrap();
        b.build()
    }

    #[test]
    fn single_video_representation() {
        let mpd = generate_mpd(&single_video_playlist()).unwrap();

        assert!(mpd.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(mpd.contains("xmlns=\"urn:mpeg:dash:schema:mpd:2011\""));
        assert!(mpd.contains("type=\"static\""));
        assert!(mpd.contains("minBufferTime=\"PT1.500S\""));
        assert!(mpd.contains("mediaPresentationDuration=\"PT0H0M12.000S\""));
        assert!(mpd.contains("maxSegmentDuration=\"PT0H0M4.000S\""));
        assert!(mpd.contains("<BaseURL>http://h/</BaseURL>"));
        assert!(mpd.contains("<Period id=\"period_id\">"));
        assert_eq!(mpd.matches("<AdaptationSet").count(), 1);
        assert!(mpd.contains("segmentAlignment=\"true\""));
        assert!(mpd.contains("Representation id=\"v0\" startWithSAP=\"1\""));
        assert!(mpd.contains("codecs=\"avc1.640028\""));
        assert!(mpd.contains("bandwidth=\"2500000\""));
        assert!(mpd.contains("width=\"1280\" height=\"720\" frameRate=\"30\" sar=\"1:1\""));
        assert!(mpd.contains(
            "<SegmentTemplate timescale=\"15360\" duration=\"61440\" \
             initialization=\"init/v0\" startNumber=\"0\" media=\"play/v0/$Number$\"/>"
        ));
    }

    #[test]
    fn audio_representation_attributes() {
        let mut b = PlaylistBuilder::new("http://h/", 4);
        b.add_adaptation(vec![("a0", vec![TrackRef::new(aac_media(10), 1)])])
            .unwrap();
        let mpd = generate_mpd(&b.build()).unwrap();

        assert!(mpd.contains("audioSamplingRate=\"48000\""));
        assert!(mpd.contains(
            "<AudioChannelConfiguration \
             schemeIdUri=\"urn:mpeg:dash:23003:3:audio_channel_configuration:2011\" \
             value=\"2\"/>"
        ));
        assert!(!mpd.contains("width="));
    }

    #[test]
    fn avc3_codec_string_is_kept() {
        let media = {
            let mut m = (*avc_media(8)).clone();
            m.tracks[0].codec = "avc3.640028".into();
            Arc::new(m)
        };
        let mut b = PlaylistBuilder::new("http://h/", 4);
        b.add_adaptation(vec![("v0", vec![TrackRef::new(media, 1)])])
            .unwrap();
        let mpd = generate_mpd(&b.build()).unwrap();
        assert!(mpd.contains("codecs=\"avc3.640028\""));
    }

    #[test]
    fn output_is_deterministic() {
        let playlist = single_video_playlist();
        let a = generate_mpd(&playlist).unwrap();
        let b = generate_mpd(&playlist).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn base_url_is_escaped() {
        let mut b = PlaylistBuilder::new("http://h/?a=1&b=2", 4);
        b.add_adaptation(vec![("v0", vec![TrackRef::new(avc_media(8), 1)])])
            .unwrap();
        let mpd = generate_mpd(&b.build()).unwrap();
        assert!(mpd.contains("<BaseURL>http://h/?a=1&amp;b=2</BaseURL>"));
    }

    #[test]
    fn fractional_frame_rate_reduced_by_gcd() {
        assert_eq!(frame_rate(30, 1), "30");
        assert_eq!(frame_rate(60, 2), "30");
        assert_eq!(frame_rate(30000, 1001), "30000/1001");
        assert_eq!(frame_rate(48000, 2002), "24000/1001");
        assert_eq!(frame_rate(25, 0), "25");
    }

    #[test]
    fn print_time_formats() {
        assert_eq!(print_time(0), "PT0H0M0.000S");
        assert_eq!(print_time(12_000), "PT0H0M12.000S");
        assert_eq!(print_time(12_500), "PT0H0M12.500S");
        assert_eq!(print_time(3_722_500), "PT1H2M2.500S");
        assert_eq!(print_time(7_200_000), "PT2H0M0.000S");
    }

    #[test]
    fn empty_representation_skipped() {
        let mut playlist = single_video_playlist();
        playlist.repr.insert(
            "empty".into(),
            Representation {
                id: "empty".into(),
                duration_msec: 0,
                tracks: vec![],
            },
        );
        let mpd = generate_mpd(&playlist).unwrap();
        assert_eq!(mpd.matches("<AdaptationSet").count(), 1);
        assert!(!mpd.contains("\"empty\""));
    }
}
