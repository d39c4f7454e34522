//! Minimal Ogg Vorbis stream builder
//!
//! No Vorbis encoder is available to the tests, so this writes the smallest
//! valid stream by hand: identification, comment and setup headers, then
//! audio packets whose floors are all marked unused. Every packet after the
//! first decodes to one short block of silence.
//!
//! The setup header holds one two-entry scalar codebook, one floor 1 with
//! no partitions, one empty type 0 residue, one mapping and one short-block
//! mode.

/// log2 of the short and long block sizes (256 and 2048)
const SHORT_BLOCK_EXP: u8 = 8;
const LONG_BLOCK_EXP: u8 = 11;

/// Frames produced by each audio packet after the first (short blocks only)
pub const FRAMES_PER_PACKET: u64 = (1 << SHORT_BLOCK_EXP) / 2;

const SERIAL: u32 = 0x7063_6d73;
const CHAINED_SERIAL: u32 = 0x7063_6d74;

/// Ogg Vorbis stream of `packets` silent audio packets.
///
/// `comments` are written verbatim into the comment header
/// (e.g. `"replaygain_track_gain=-6.00 dB"`).
pub fn silent_vorbis_bytes(sample_rate: u32, channels: u8, packets: usize, comments: &[&str]) -> Vec<u8> {
    logical_stream(SERIAL, sample_rate, channels, packets, comments)
}

/// Two silent streams back to back, the second under a new serial.
///
/// Readers see the second stream's first page as a new physical stream.
pub fn chained_vorbis_bytes(sample_rate: u32, channels: u8, packets: usize) -> Vec<u8> {
    let mut out = logical_stream(SERIAL, sample_rate, channels, packets, &[]);
    out.extend(logical_stream(CHAINED_SERIAL, sample_rate, channels, packets, &[]));
    out
}

/// Total frames decoded from a [`silent_vorbis_bytes`] stream
pub fn silent_vorbis_frames(packets: usize) -> u64 {
    FRAMES_PER_PACKET * (packets as u64 - 1)
}

fn logical_stream(serial: u32, sample_rate: u32, channels: u8, packets: usize, comments: &[&str]) -> Vec<u8> {
    assert!(packets > 0 && packets < 255);

    let frames = silent_vorbis_frames(packets);
    let audio: Vec<Vec<u8>> = (0..packets).map(|_| vec![0u8]).collect();

    let mut out = Vec::new();
    out.extend(page(serial, 0x02, 0, 0, &[identification_header(sample_rate, channels)]));
    out.extend(page(serial, 0x00, 0, 1, &[comment_header(comments), setup_header()]));
    out.extend(page(serial, 0x04, frames, 2, &audio));
    out
}

fn identification_header(sample_rate: u32, channels: u8) -> Vec<u8> {
    let mut header = Vec::with_capacity(30);
    header.push(0x01);
    header.extend_from_slice(b"vorbis");
    header.extend_from_slice(&0u32.to_le_bytes()); // version
    header.push(channels);
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes()); // bitrate maximum
    header.extend_from_slice(&0u32.to_le_bytes()); // bitrate nominal
    header.extend_from_slice(&0u32.to_le_bytes()); // bitrate minimum
    header.push((LONG_BLOCK_EXP << 4) | SHORT_BLOCK_EXP);
    header.push(0x01); // framing
    header
}

fn comment_header(comments: &[&str]) -> Vec<u8> {
    const VENDOR: &[u8] = b"pcmstream test fixture";

    let mut header = Vec::new();
    header.push(0x03);
    header.extend_from_slice(b"vorbis");
    header.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    header.extend_from_slice(VENDOR);
    header.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for comment in comments {
        header.extend_from_slice(&(comment.len() as u32).to_le_bytes());
        header.extend_from_slice(comment.as_bytes());
    }
    header.push(0x01); // framing
    header
}

fn setup_header() -> Vec<u8> {
    let mut bits = BitWriter::default();

    // Codebooks: one scalar book, two entries of length 1, no lookup table
    bits.write(0, 8);
    bits.write(0x56_4342, 24);
    bits.write(1, 16); // dimensions
    bits.write(2, 24); // entries
    bits.write(0, 1); // not length-ordered
    bits.write(0, 1); // not sparse
    bits.write(0, 5); // length 1
    bits.write(0, 5); // length 1
    bits.write(0, 4); // lookup type

    // Time domain transforms: one placeholder
    bits.write(0, 6);
    bits.write(0, 16);

    // Floors: one floor 1 without partitions
    bits.write(0, 6);
    bits.write(1, 16);
    bits.write(0, 5); // partitions
    bits.write(1, 2); // multiplier - 1
    bits.write(7, 4); // range bits

    // Residues: one type 0 residue covering nothing
    bits.write(0, 6);
    bits.write(0, 16);
    bits.write(0, 24); // begin
    bits.write(0, 24); // end
    bits.write(0, 24); // partition size - 1
    bits.write(0, 6); // classifications - 1
    bits.write(0, 8); // classbook
    bits.write(0, 3); // cascade low bits
    bits.write(0, 1); // no cascade high bits

    // Mappings: one type 0 mapping, one submap, no coupling
    bits.write(0, 6);
    bits.write(0, 16);
    bits.write(0, 1); // single submap
    bits.write(0, 1); // no coupling
    bits.write(0, 2); // reserved
    bits.write(0, 8); // unused time config
    bits.write(0, 8); // floor
    bits.write(0, 8); // residue

    // Modes: one short-block mode
    bits.write(0, 6);
    bits.write(0, 1); // block flag
    bits.write(0, 16); // window type
    bits.write(0, 16); // transform type
    bits.write(0, 8); // mapping

    bits.write(1, 1); // framing

    let mut header = Vec::new();
    header.push(0x05);
    header.extend_from_slice(b"vorbis");
    header.extend(bits.finish());
    header
}

/// LSB-first bit packer, as Vorbis headers are read
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    fn write(&mut self, value: u32, bits: u32) {
        for i in 0..bits {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 1 << (self.used % 8);
            }
            self.used += 1;
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// One Ogg page holding whole packets shorter than 255 bytes each
fn page(serial: u32, flags: u8, granule: u64, sequence: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut lacing = Vec::new();
    for packet in packets {
        let mut remaining = packet.len();
        while remaining >= 255 {
            lacing.push(255u8);
            remaining -= 255;
        }
        lacing.push(remaining as u8);
    }
    assert!(lacing.len() <= 255);

    let mut out = Vec::new();
    out.extend_from_slice(b"OggS");
    out.push(0); // version
    out.push(flags);
    out.extend_from_slice(&granule.to_le_bytes());
    out.extend_from_slice(&serial.to_le_bytes());
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // checksum, filled below
    out.push(lacing.len() as u8);
    out.extend_from_slice(&lacing);
    for packet in packets {
        out.extend_from_slice(packet);
    }

    let crc = ogg_crc(&out);
    out[22..26].copy_from_slice(&crc.to_le_bytes());
    out
}

/// CRC-32 with polynomial 0x04C11DB7, no reflection, zero initial value
fn ogg_crc(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}

