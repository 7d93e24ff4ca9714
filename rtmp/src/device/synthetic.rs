use super::{DeviceProvider, MediaSink, MediaSource, PreviewSurface, RenderOptions};
use crate::config::{AudioParameters, CaptureConfig, EncoderConfig, VideoParameters, PROFILE_AUTO};
use crate::media::{AudioCodec, DecodeError, EncodeError, MediaFrame, StreamMetadata, VideoCodec};
use crate::time::RtmpTimestamp;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const AAC_SAMPLES_PER_FRAME: u64 = 1024;
const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Everything the synthetic devices were asked to do
#[derive(Debug, Clone, Default)]
pub struct DeviceLog {
    pub sources_opened: usize,
    pub sources_closed: usize,
    pub previews_opened: usize,
    pub previews_closed: usize,
    pub sinks_opened: usize,
    pub sinks_closed: usize,
    pub key_frame_requests: usize,
    pub presented_frames: usize,
    pub rendered: Vec<MediaFrame>,
    pub metadata: Option<StreamMetadata>,
    pub volume: Option<f32>,
}

type SharedLog = Arc<Mutex<DeviceLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, DeviceLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`DeviceProvider`] producing generated media in place of real hardware
#[derive(Clone)]
pub struct SyntheticDevices {
    paced: bool,
    duration: Option<Duration>,
    log: SharedLog,
}

impl SyntheticDevices {
    /// Devices whose sources produce frames in real time
    pub fn new() -> SyntheticDevices {
        SyntheticDevices {
            paced: true,
            duration: None,
            log: Arc::new(Mutex::new(DeviceLog::default())),
        }
    }

    /// Produce frames as fast as they are pulled instead of in real time
    pub fn unpaced(mut self) -> SyntheticDevices {
        self.paced = false;
        self
    }

    /// End sources after this much media
    pub fn with_duration(mut self, duration: Duration) -> SyntheticDevices {
        self.duration = Some(duration);
        self
    }

    pub fn log(&self) -> DeviceLog {
        lock(&self.log).clone()
    }
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        SyntheticDevices::new()
    }
}

impl DeviceProvider for SyntheticDevices {
    fn open_source(
        &self,
        _capture: &CaptureConfig,
        encoder: &EncoderConfig,
    ) -> Result<Box<dyn MediaSource>, EncodeError> {
        lock(&self.log).sources_opened += 1;

        let mut source = SyntheticSource::new(encoder.video.clone(), encoder.audio.clone(), self.paced);
        source.duration = self.duration;
        source.log = Some(self.log.clone());
        Ok(Box::new(source))
    }

    fn open_preview(&self, _capture: &CaptureConfig) -> Result<Box<dyn PreviewSurface>, EncodeError> {
        lock(&self.log).previews_opened += 1;
        Ok(Box::new(SyntheticPreview { log: self.log.clone() }))
    }

    fn open_sink(&self, options: &RenderOptions) -> Result<Box<dyn MediaSink>, DecodeError> {
        let mut log = lock(&self.log);
        log.sinks_opened += 1;
        log.volume = Some(options.volume);

        Ok(Box::new(RecordingSink { log: self.log.clone() }))
    }
}

/// Generates interleaved audio and video frames at the configured rates.
///
/// Video frames are key frames at the start, every ten seconds, and whenever one is
/// requested.  Payloads are filler sized to roughly match the configured bitrates.
pub struct SyntheticSource {
    video: VideoParameters,
    audio: AudioParameters,
    paced: bool,
    duration: Option<Duration>,
    started_at: Option<Instant>,
    pending_headers: Vec<MediaFrame>,
    video_index: u64,
    audio_index: u64,
    key_frame_requested: bool,
    closed: bool,
    log: Option<SharedLog>,
}

impl SyntheticSource {
    pub fn new(video: VideoParameters, audio: AudioParameters, paced: bool) -> SyntheticSource {
        let start = RtmpTimestamp::new(0);
        let pending_headers = vec![
            MediaFrame::audio_sequence_header(AudioCodec::Aac, start, audio_specific_config(&audio)),
            MediaFrame::video_sequence_header(video.codec, start, decoder_configuration(&video)),
        ];

        SyntheticSource {
            video,
            audio,
            paced,
            duration: None,
            started_at: None,
            pending_headers,
            video_index: 0,
            audio_index: 0,
            key_frame_requested: false,
            closed: false,
            log: None,
        }
    }

    fn video_timestamp(&self) -> u64 {
        self.video_index * 1000 / u64::from(self.video.fps.max(1))
    }

    fn audio_timestamp(&self) -> u64 {
        self.audio_index * AAC_SAMPLES_PER_FRAME * 1000 / u64::from(self.audio.sample_rate.max(1))
    }

    fn next_video_frame(&mut self, timestamp: u64) -> MediaFrame {
        let gop = u64::from(self.video.fps) * 10;
        let key_frame = self.video_index % gop.max(1) == 0 || self.key_frame_requested;
        self.key_frame_requested = false;
        self.video_index += 1;

        let size = (self.video.bitrate / 8 / self.video.fps.max(1)).clamp(32, 16_384) as usize;
        let size = if key_frame { size * 3 } else { size };
        let nal_header: &[u8] = match (self.video.codec, key_frame) {
            (VideoCodec::Avc, true) => &[0x65],
            (VideoCodec::Avc, false) => &[0x41],
            (VideoCodec::Hevc, true) => &[0x26, 0x01],
            (VideoCodec::Hevc, false) => &[0x02, 0x01],
        };

        let mut data = BytesMut::with_capacity(size + 4);
        data.put_u32((size - 4) as u32);
        data.put_slice(nal_header);
        data.resize(size, self.video_index as u8);

        MediaFrame::video(
            self.video.codec,
            RtmpTimestamp::from_millis(timestamp),
            0,
            key_frame,
            data.freeze(),
        )
    }

    fn next_audio_frame(&mut self, timestamp: u64) -> MediaFrame {
        self.audio_index += 1;
        let size = (u64::from(self.audio.bitrate) / 8 * AAC_SAMPLES_PER_FRAME / u64::from(self.audio.sample_rate))
            .clamp(8, 2048) as usize;

        MediaFrame::audio(
            AudioCodec::Aac,
            RtmpTimestamp::from_millis(timestamp),
            Bytes::from(vec![0x21; size]),
        )
    }
}

impl MediaSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<MediaFrame>, EncodeError> {
        if self.closed {
            return Ok(None);
        }

        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        if !self.pending_headers.is_empty() {
            return Ok(Some(self.pending_headers.remove(0)));
        }

        let video_timestamp = self.video_timestamp();
        let audio_timestamp = self.audio_timestamp();
        let timestamp = video_timestamp.min(audio_timestamp);

        if let Some(duration) = self.duration {
            if timestamp >= duration.as_millis() as u64 {
                return Ok(None);
            }
        }

        if self.paced {
            let due = started_at + Duration::from_millis(timestamp);
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        let frame = if video_timestamp <= audio_timestamp {
            self.next_video_frame(video_timestamp)
        } else {
            self.next_audio_frame(audio_timestamp)
        };

        Ok(Some(frame))
    }

    fn request_key_frame(&mut self) {
        self.key_frame_requested = true;
        if let Some(log) = &self.log {
            lock(log).key_frame_requests += 1;
        }
    }

    fn close(&mut self) {
        self.closed = true;
        if let Some(log) = &self.log {
            lock(log).sources_closed += 1;
        }
    }
}

struct SyntheticPreview {
    log: SharedLog,
}

impl PreviewSurface for SyntheticPreview {
    fn present(&mut self, _frame: &MediaFrame) {
        lock(&self.log).presented_frames += 1;
    }

    fn close(&mut self) {
        lock(&self.log).previews_closed += 1;
    }
}

/// A sink that records what it was asked to render
struct RecordingSink {
    log: SharedLog,
}

impl MediaSink for RecordingSink {
    fn configure(&mut self, metadata: &StreamMetadata) -> Result<(), DecodeError> {
        lock(&self.log).metadata = Some(metadata.clone());
        Ok(())
    }

    fn render(&mut self, frame: &MediaFrame) -> Result<(), DecodeError> {
        lock(&self.log).rendered.push(frame.clone());
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        lock(&self.log).volume = Some(volume);
    }

    fn close(&mut self) {
        lock(&self.log).sinks_closed += 1;
    }
}

/// Builds the AAC AudioSpecificConfig for the given parameters
pub fn audio_specific_config(audio: &AudioParameters) -> Bytes {
    // Profile constants are the MPEG-4 audio object type minus one
    let object_type = match audio.profile {
        PROFILE_AUTO => 2,
        profile => profile + 1,
    };

    let frequency_index = AAC_SAMPLE_RATES
        .iter()
        .position(|rate| *rate == audio.sample_rate)
        .unwrap_or(4) as u32;

    let mut writer = BitWriter::default();
    if object_type > 31 {
        writer.write(31, 5);
        writer.write(object_type - 32, 6);
    } else {
        writer.write(object_type, 5);
    }

    writer.write(frequency_index, 4);
    writer.write(audio.channels, 4);

    let padding = (8 - writer.length % 8) % 8;
    writer.write(0, padding);
    let total_bytes = (writer.length / 8) as usize;

    let bytes = writer.bits.to_be_bytes();
    Bytes::copy_from_slice(&bytes[bytes.len() - total_bytes..])
}

#[derive(Default)]
struct BitWriter {
    bits: u64,
    length: u32,
}

impl BitWriter {
    fn write(&mut self, value: u32, width: u32) {
        let mask = (1_u64 << width) - 1;
        self.bits = (self.bits << width) | (u64::from(value) & mask);
        self.length += width;
    }
}

/// A minimal avcC / hvcC record.  Good enough for servers that only forward it.
fn decoder_configuration(video: &VideoParameters) -> Bytes {
    match video.codec {
        VideoCodec::Avc => {
            let profile = if video.profile == PROFILE_AUTO { 77 } else { video.profile as u8 };
            Bytes::from(vec![
                0x01, profile, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x04, 0x67, profile, 0x00, 0x1f, 0x01, 0x00, 0x04,
                0x68, 0xce, 0x3c, 0x80,
            ])
        }

        VideoCodec::Hevc => {
            let mut record = vec![0_u8; 23];
            record[0] = 0x01;
            record[1] = 0x01;
            Bytes::from(record)
        }
    }
}
