//! Disc, title and stream attribute aggregates built from `CINFO`/`TINFO`/`SINFO` lines

use serde::{Deserialize, Serialize};

/// Declares `GenericInfo` together with its id → field table.
///
/// Each entry binds a robot-mode attribute id to a named string field. The
/// generated `field_mut` is the only way the decoder writes attributes, so an
/// id that is missing from the table is simply ignored.
macro_rules! generic_info {
    ($($id:literal => $field:ident),+ $(,)?) => {
        /// Open attribute bag shared by discs, titles and streams.
        ///
        /// Every attribute is kept as the raw string the ripping tool printed.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct GenericInfo {
            $(
                #[serde(skip_serializing_if = "String::is_empty")]
                pub $field: String,
            )+
        }

        impl GenericInfo {
            /// Highest attribute id known to the table
            pub const MAX_ID: u32 = {
                let ids = [$($id),+];
                let mut max = 0;
                let mut i = 0;
                while i < ids.len() {
                    if ids[i] > max {
                        max = ids[i];
                    }
                    i += 1;
                }
                max
            };

            /// Mutable access to the field bound to `id`, if any
            pub fn field_mut(&mut self, id: u32) -> Option<&mut String> {
                match id {
                    $($id => Some(&mut self.$field),)+
                    _ => None,
                }
            }

            /// Read access to the field bound to `id`, if any
            pub fn field(&self, id: u32) -> Option<&str> {
                match id {
                    $($id => Some(self.$field.as_str()),)+
                    _ => None,
                }
            }

            /// Name of the field bound to `id`, for diagnostics
            pub fn field_name(id: u32) -> Option<&'static str> {
                match id {
                    $($id => Some(stringify!($field)),)+
                    _ => None,
                }
            }
        }
    };
}

generic_info! {
    0 => unknown,
    1 => kind,
    2 => name,
    3 => lang_code,
    4 => lang_name,
    5 => codec_id,
    6 => codec_short,
    7 => codec_long,
    8 => chapter_count,
    9 => duration,
    10 => disk_size,
    11 => disk_size_bytes,
    12 => stream_type_extension,
    13 => bitrate,
    14 => audio_channels_count,
    15 => angle_info,
    16 => source_file_name,
    17 => audio_sample_rate,
    18 => audio_sample_size,
    19 => video_size,
    20 => video_aspect_ratio,
    21 => video_frame_rate,
    22 => stream_flags,
    23 => date_time,
    24 => original_title_id,
    25 => segments_count,
    26 => segments_map,
    27 => output_file_name,
    28 => metadata_language_code,
    29 => metadata_language_name,
    30 => tree_info,
    31 => panel_title,
    32 => volume_name,
    33 => order_weight,
    34 => output_format,
    35 => output_format_description,
    36 => seamless_info,
    37 => panel_text,
    38 => mkv_flags,
    39 => mkv_flags_text,
    40 => audio_channel_layout_name,
    41 => output_codec_short,
    42 => output_conversion_type,
    43 => output_audio_sample_rate,
    44 => output_audio_sample_size,
    45 => output_audio_channels_count,
    46 => output_audio_channel_layout_name,
    47 => output_audio_channel_layout,
    48 => output_audio_mix_description,
    49 => comment,
    50 => offset_sequence_id,
}

impl GenericInfo {
    /// Write `value` into the field bound to `id`.
    ///
    /// Returns false when the id is not in the table (vendor additions), in
    /// which case nothing is written.
    pub fn set(&mut self, id: u32, value: &str) -> bool {
        match self.field_mut(id) {
            Some(field) => {
                field.clear();
                field.push_str(value);
                true
            }
            None => false,
        }
    }
}

/// One elementary stream (video, audio or subtitles) inside a title
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(flatten)]
    pub info: GenericInfo,
}

/// One title (playlist) on the disc, with its streams indexed by stream number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleInfo {
    #[serde(flatten)]
    pub info: GenericInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamInfo>,
}

impl TitleInfo {
    /// Stream slot `index`, growing the stream list so that every index up
    /// to and including it exists
    pub fn ensure_stream(&mut self, index: usize) -> &mut StreamInfo {
        if self.streams.len() <= index {
            self.streams.resize_with(index + 1, StreamInfo::default);
        }
        &mut self.streams[index]
    }
}

/// The whole disc as described by the ripping tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscInfo {
    #[serde(flatten)]
    pub info: GenericInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<TitleInfo>,
}

impl DiscInfo {
    /// Title slot `index`, growing the title list with empty placeholders
    pub fn ensure_title(&mut self, index: usize) -> &mut TitleInfo {
        if self.titles.len() <= index {
            self.titles.resize_with(index + 1, TitleInfo::default);
        }
        &mut self.titles[index]
    }

    /// Stream slot `stream` of title `title`, growing both lists as needed
    pub fn ensure_stream(&mut self, title: usize, stream: usize) -> &mut StreamInfo {
        self.ensure_title(title).ensure_stream(stream)
    }
}
