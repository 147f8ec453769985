//! Joins mp3 fragments into one stream.
//!
//! MPEG audio is a sequence of self-contained frames, so fragments can be
//! appended directly. What each encoder wraps around the frames is removed:
//! a leading ID3v2 tag, a trailing ID3v1 tag, and the Xing/Info or VBRI
//! header frame. The header frame carries the frame count and seek table of
//! its own fragment only, so players would read the wrong duration from the
//! first one and play the later ones as silent frames.

use std::io::Cursor;

const ID3V2_HEADER_LEN: usize = 10;
const ID3V2_FOOTER_FLAG: u8 = 0x10;
const ID3V1_LEN: usize = 128;
const MPEG_HEADER_LEN: usize = 4;
const VBRI_OFFSET: usize = MPEG_HEADER_LEN + 32;

// Layer III bitrates in kbit/s, by bitrate index.
const BITRATES_V1: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Default)]
pub struct Mp3Joiner {
    buf: Vec<u8>,
    fragments: usize,
}

impl Mp3Joiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &[u8]) {
        self.buf
            .extend_from_slice(skip_header_frame(strip_tags(fragment)));
        self.fragments += 1;
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.buf)
    }
}

fn strip_tags(mut data: &[u8]) -> &[u8] {
    while let Some(len) = id3v2_len(data) {
        data = &data[len..];
    }
    if data.len() >= ID3V1_LEN && data[data.len() - ID3V1_LEN..].starts_with(b"TAG") {
        data = &data[..data.len() - ID3V1_LEN];
    }
    data
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MpegVersion {
    V1,
    V2,
    V2_5,
}

/// The parts of a Layer III frame header needed to find the frame's end and
/// its side information.
#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    version: MpegVersion,
    crc: bool,
    mono: bool,
    len: usize,
}

impl FrameHeader {
    fn parse(data: &[u8]) -> Option<Self> {
        let [b0, b1, b2, b3] = *data.get(..MPEG_HEADER_LEN)? else {
            return None;
        };
        if b0 != 0xff || b1 & 0xe0 != 0xe0 {
            return None;
        }
        let version = match (b1 >> 3) & 0b11 {
            0b11 => MpegVersion::V1,
            0b10 => MpegVersion::V2,
            0b00 => MpegVersion::V2_5,
            _ => return None,
        };
        if (b1 >> 1) & 0b11 != 0b01 {
            return None;
        }

        let bitrate_index = usize::from(b2 >> 4);
        let bitrate = match version {
            MpegVersion::V1 => BITRATES_V1.get(bitrate_index)?,
            _ => BITRATES_V2.get(bitrate_index)?,
        } * 1000;
        let sample_rate = match ((b2 >> 2) & 0b11, version) {
            (0, MpegVersion::V1) => 44100,
            (1, MpegVersion::V1) => 48000,
            (2, MpegVersion::V1) => 32000,
            (0, MpegVersion::V2) => 22050,
            (1, MpegVersion::V2) => 24000,
            (2, MpegVersion::V2) => 16000,
            (0, MpegVersion::V2_5) => 11025,
            (1, MpegVersion::V2_5) => 12000,
            (2, MpegVersion::V2_5) => 8000,
            _ => return None,
        };
        if bitrate == 0 {
            // Free format, the length cannot be computed from the header.
            return None;
        }

        let samples_factor = if version == MpegVersion::V1 { 144 } else { 72 };
        let padding = u32::from((b2 >> 1) & 1);
        let len = (samples_factor * bitrate / sample_rate + padding) as usize;

        Some(Self {
            version,
            crc: b1 & 1 == 0,
            mono: b3 >> 6 == 0b11,
            len,
        })
    }

    /// Where a Xing/Info tag starts: after the header, the optional CRC and
    /// the side information.
    fn xing_offset(&self) -> usize {
        let side_info = match (self.version, self.mono) {
            (MpegVersion::V1, false) => 32,
            (MpegVersion::V1, true) => 17,
            (_, false) => 17,
            (_, true) => 9,
        };
        MPEG_HEADER_LEN + if self.crc { 2 } else { 0 } + side_info
    }
}

/// Drops the first frame when it is a Xing/Info or VBRI header frame rather
/// than audio. Anything that does not start with a complete frame is kept.
fn skip_header_frame(data: &[u8]) -> &[u8] {
    let Some(header) = FrameHeader::parse(data) else {
        return data;
    };
    if header.len > data.len() {
        return data;
    }
    let frame = &data[..header.len];
    let at = |offset: usize, tag: &[u8]| frame.get(offset..offset + tag.len()) == Some(tag);
    let xing = header.xing_offset();
    if at(xing, b"Xing".as_slice())
        || at(xing, b"Info".as_slice())
        || at(VBRI_OFFSET, b"VBRI".as_slice())
    {
        &data[header.len..]
    } else {
        data
    }
}

/// Total length of the ID3v2 tag at the start of `data`, if one is present
/// and fits in the buffer.
fn id3v2_len(data: &[u8]) -> Option<usize> {
    if data.len() < ID3V2_HEADER_LEN || !data.starts_with(b"ID3") {
        return None;
    }
    let size_bytes = &data[6..10];
    // Sizes are syncsafe: 7 bits per byte, top bit always clear.
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = size_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(*b));
    let footer = if data[5] & ID3V2_FOOTER_FLAG != 0 {
        ID3V2_HEADER_LEN
    } else {
        0
    };
    let total = ID3V2_HEADER_LEN + size + footer;
    (total <= data.len()).then_some(total)
}
