use super::frame::{AudioCodec, VideoCodec};
use rtmp_stream_amf0::Amf0Value;
use std::collections::HashMap;

/// Contains the metadata information a stream advertises through `onMetaData`
#[derive(PartialEq, Debug, Clone, Default)]
pub struct StreamMetadata {
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_codec_id: Option<u32>,
    pub video_frame_rate: Option<f32>,
    pub video_bitrate_kbps: Option<u32>,
    pub audio_codec_id: Option<u32>,
    pub audio_bitrate_kbps: Option<u32>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    pub audio_is_stereo: Option<bool>,
    pub encoder: Option<String>,
}

impl StreamMetadata {
    pub fn new() -> StreamMetadata {
        Default::default()
    }

    /// The video codec, when the advertised id is one we can decode
    pub fn video_codec(&self) -> Option<VideoCodec> {
        self.video_codec_id.and_then(VideoCodec::from_codec_id)
    }

    pub fn audio_codec(&self) -> Option<AudioCodec> {
        self.audio_codec_id.and_then(AudioCodec::from_codec_id)
    }

    /// Builds the `onMetaData` property map.  In enhanced mode the video codec is advertised
    /// as its FourCC packed into a number, which is what enhanced RTMP servers expect.
    pub fn to_amf0_properties(&self, enhanced: bool) -> HashMap<String, Amf0Value> {
        let mut properties = HashMap::with_capacity(11);
        let mut number = |name: &str, value: Option<f64>| {
            if let Some(value) = value {
                properties.insert(name.to_string(), Amf0Value::Number(value));
            }
        };

        number("width", self.video_width.map(f64::from));
        number("height", self.video_height.map(f64::from));
        number("framerate", self.video_frame_rate.map(f64::from));
        number("videodatarate", self.video_bitrate_kbps.map(f64::from));
        number("audiodatarate", self.audio_bitrate_kbps.map(f64::from));
        number("audiosamplerate", self.audio_sample_rate.map(f64::from));
        number("audiochannels", self.audio_channels.map(f64::from));
        number("audiocodecid", self.audio_codec().map(|_| f64::from(FLV_SOUND_FORMAT_AAC)));

        let video_codec_id = self.video_codec().map(|codec| match (codec, enhanced) {
            (VideoCodec::Avc, _) | (VideoCodec::Hevc, false) => f64::from(legacy_video_codec_id(codec)),
            (VideoCodec::Hevc, true) => f64::from(u32::from_be_bytes(codec.fourcc())),
        });

        number("videocodecid", video_codec_id);

        if let Some(stereo) = self.audio_is_stereo {
            properties.insert("stereo".to_string(), Amf0Value::Boolean(stereo));
        }

        if let Some(encoder) = &self.encoder {
            properties.insert("encoder".to_string(), Amf0Value::Utf8String(encoder.clone()));
        }

        properties
    }

    /// Reads an `onMetaData` property map.  Unknown properties and values of unexpected types
    /// are ignored.
    pub fn from_amf0_properties(properties: &HashMap<String, Amf0Value>) -> StreamMetadata {
        let number = |name: &str| properties.get(name).and_then(|x| x.as_number());
        let whole = |name: &str| number(name).filter(|x| *x >= 0.0).map(|x| x as u32);

        StreamMetadata {
            video_width: whole("width"),
            video_height: whole("height"),
            video_codec_id: properties.get("videocodecid").and_then(read_video_codec_id),
            video_frame_rate: number("framerate").map(|x| x as f32),
            video_bitrate_kbps: whole("videodatarate"),
            audio_codec_id: whole("audiocodecid").and_then(|x| match x {
                x if x == u32::from(FLV_SOUND_FORMAT_AAC) => Some(AudioCodec::Aac.codec_id()),
                _ => None,
            }),
            audio_bitrate_kbps: whole("audiodatarate"),
            audio_sample_rate: whole("audiosamplerate"),
            audio_channels: whole("audiochannels"),
            audio_is_stereo: properties.get("stereo").and_then(Amf0Value::as_bool),
            encoder: properties.get("encoder").and_then(|x| x.as_str()).map(|x| x.to_string()),
        }
    }
}

const FLV_SOUND_FORMAT_AAC: u8 = 10;

fn legacy_video_codec_id(codec: VideoCodec) -> u8 {
    match codec {
        VideoCodec::Avc => 7,
        VideoCodec::Hevc => 12,
    }
}

fn read_video_codec_id(value: &Amf0Value) -> Option<u32> {
    let codec = match value {
        Amf0Value::Number(x) => {
            let id = *x as u32;
            match id {
                7 => Some(VideoCodec::Avc),
                12 => Some(VideoCodec::Hevc),
                fourcc => VideoCodec::from_fourcc(fourcc.to_be_bytes()),
            }
        }

        // Some encoders write the FourCC as text
        Amf0Value::Utf8String(text) => {
            let bytes = text.as_bytes();
            if bytes.len() == 4 {
                VideoCodec::from_fourcc([bytes[0], bytes[1], bytes[2], bytes[3]])
            } else {
                None
            }
        }

        _ => None,
    };

    codec.map(VideoCodec::codec_id)
}
