//! HLS playlist generation: one master playlist plus one variant playlist
//! per representation.
//!
//! The generator supports exactly one period; multi-period presentations are
//! expressed as multiple track-requests inside a representation instead.

use std::collections::BTreeMap;
use std::fmt::Write;

use strand_core::{Error, Result};

use crate::media::MediaType;
use crate::playlist::{segment_count, Playlist, Representation};

/// The rendered playlists: the caller routes each to its URL.
#[derive(Debug, Clone)]
pub struct HlsManifests {
    pub master: String,
    /// Variant playlist per representation id.
    pub variants: BTreeMap<String, String>,
}

/// Generate the master playlist and all variant playlists.
pub fn generate_hls(playlist: &Playlist) -> Result<HlsManifests> {
    if playlist.periods.len() > 1 {
        return Err(Error::HlsMultiPeriod);
    }

    let mut master = String::new();
    writeln!(master, "#EXTM3U").unwrap();
    writeln!(master, "#EXT-X-VERSION:3").unwrap();

    let mut variants = BTreeMap::new();
    let Some(period) = playlist.periods.first() else {
        return Ok(HlsManifests { master, variants });
    };

    // First pass: one EXT-X-MEDIA line per representation, assigning group
    // ids sequentially per media type.
    let mut audio_groups: Vec<String> = Vec::new();
    let mut video_groups: Vec<String> = Vec::new();

    for (adaptation_index, aset) in period.adaptations.iter().enumerate() {
        let adaptation_name = format!("adaptation-{}", adaptation_index + 1);

        for id in &aset.repr_ids {
            let Some(repr) = playlist.repr.get(id) else {
                continue;
            };
            let Some(first) = repr.tracks.first() else {
                continue;
            };

            let (media_type, group_id) = match first.track().media_type {
                MediaType::Audio => {
                    let g = format!("audio-{}", audio_groups.len());
                    audio_groups.push(g.clone());
                    ("AUDIO", g)
                }
                MediaType::Video => {
                    let g = format!("video-{}", video_groups.len());
                    video_groups.push(g.clone());
                    ("VIDEO", g)
                }
                MediaType::Other => ("DATA", String::new()),
            };

            writeln!(
                master,
                "#EXT-X-MEDIA:TYPE={media_type},GROUP-ID=\"{group_id}\",\
                 NAME=\"{adaptation_name}\",AUTOSELECT=YES,URI=\"{}playlist/{id}\"",
                playlist.base_url
            )
            .unwrap();
        }
    }

    // Second pass: a stream entry per representation for every combination
    // of the collected groups, with the synthetic "none" group standing in
    // for an absent media type.
    if audio_groups.is_empty() {
        audio_groups.push("none".into());
    }
    if video_groups.is_empty() {
        video_groups.push("none".into());
    }

    for aset in &period.adaptations {
        for id in &aset.repr_ids {
            let Some(repr) = playlist.repr.get(id) else {
                continue;
            };
            if repr.tracks.is_empty() {
                continue;
            }

            variants.insert(id.clone(), variant_playlist(playlist, repr));

            for audio_group in &audio_groups {
                for video_group in &video_groups {
                    write_stream_entry(&mut master, playlist, repr, audio_group, video_group);
                }
            }
        }
    }

    Ok(HlsManifests { master, variants })
}

fn write_stream_entry(
    master: &mut String,
    playlist: &Playlist,
    repr: &Representation,
    audio_group: &str,
    video_group: &str,
) {
    let track = repr.tracks[0].track();

    write!(
        master,
        "#EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH={},CODECS=\"{}\"",
        track.bandwidth,
        hls_codec(&track.codec)
    )
    .unwrap();

    if track.media_type == MediaType::Video {
        if let Some(video) = &track.video {
            write!(master, ",RESOLUTION={}x{}", video.width, video.height).unwrap();
        }
    }

    if audio_group != "none" {
        write!(master, ",AUDIO=\"{audio_group}\"").unwrap();
    }
    if video_group != "none" {
        write!(master, ",VIDEO=\"{video_group}\"").unwrap();
    }

    writeln!(master).unwrap();
    writeln!(master, "{}playlist/{}", playlist.base_url, repr.id).unwrap();
}

fn variant_playlist(playlist: &Playlist, repr: &Representation) -> String {
    let mut pls = String::new();
    writeln!(pls, "#EXTM3U").unwrap();
    writeln!(pls, "#EXT-X-VERSION:3").unwrap();
    writeln!(pls, "#EXT-X-PLAYLIST-TYPE:VOD").unwrap();
    writeln!(pls, "#EXT-X-MEDIA-SEQUENCE:0").unwrap();
    writeln!(pls, "#EXT-X-TARGETDURATION:{}", playlist.chunk_duration_sec).unwrap();

    let chunk_msec = 1000 * playlist.chunk_duration_sec;
    for tr in &repr.tracks {
        let count = segment_count(tr.duration_msec, playlist.chunk_duration_sec);
        for i in 0..count {
            // Every segment is chunk-sized except the trailing remainder.
            let duration_msec = if i == count - 1 {
                tr.duration_msec - chunk_msec * (count - 1)
            } else {
                chunk_msec
            };
            writeln!(pls, "#EXTINF:{},", duration_msec as f64 / 1000.0).unwrap();
            writeln!(
                pls,
                "{}play/{}/{}",
                playlist.base_url,
                repr.id,
                tr.start_number + i
            )
            .unwrap();
        }
    }

    pls.push_str("#EXT-X-ENDLIST");
    pls
}

/// HLS-advertised codec string: `avc3` sample entries are announced as
/// `avc1` because several players refuse the in-band-parameter-set form.
fn hls_codec(codec: &str) -> String {
    let mut codec = codec.to_string();
    if codec.starts_with("avc3") {
        codec.replace_range(3..4, "1");
    }
    codec
}
