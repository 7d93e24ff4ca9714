//! HMAC-SHA256 signatures used by the digest ("complex") handshake variant.
//!
//! Servers that deliver H.264 to Flash-era players expect C1 to carry a digest signed with the
//! Flash Player key and answer with an S1/S2 signed by the Media Server key.

use super::errors::HandshakeError;
use super::{PACKET_SIZE, RANDOM_SIZE};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const DIGEST_LENGTH: usize = 32;

const PLAYER_KEY_TEXT: &[u8] = b"Genuine Adobe Flash Player 001";
const SERVER_KEY_TEXT: &[u8] = b"Genuine Adobe Flash Media Server 001";
const KEY_SUFFIX: [u8; 32] = [
    0xf0, 0xee, 0xc2, 0x4a, 0x80, 0x68, 0xbe, 0xe8, 0x2e, 0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e, 0x57,
    0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab, 0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb, 0x31, 0xae,
];

/// Where in packet 1 the digest lives.  Peers may use either scheme.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DigestLayout {
    /// Offset derived from bytes 8..12, digest within the first half of the packet
    First,
    /// Offset derived from bytes 772..776, digest within the second half of the packet
    Second,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyOwner {
    Player,
    Server,
}

impl KeyOwner {
    fn short_key(self) -> &'static [u8] {
        match self {
            KeyOwner::Player => PLAYER_KEY_TEXT,
            KeyOwner::Server => SERVER_KEY_TEXT,
        }
    }

    fn long_key(self) -> Vec<u8> {
        let mut key = self.short_key().to_vec();
        key.extend_from_slice(&KEY_SUFFIX);
        key
    }
}

pub fn digest_offset(packet: &[u8], layout: DigestLayout) -> usize {
    let (start, base) = match layout {
        DigestLayout::First => (8, 12),
        DigestLayout::Second => (772, 776),
    };

    let sum: usize = packet[start..start + 4].iter().map(|x| *x as usize).sum();
    (sum % 728) + base
}

pub fn hmac_sha256(message: &[u8], key: &[u8]) -> Result<[u8; DIGEST_LENGTH], HandshakeError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).map_err(|_| HandshakeError::DigestFailure)?;
    mac.update(message);

    let mut output = [0_u8; DIGEST_LENGTH];
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

fn digest_for_packet(
    packet: &[u8],
    offset: usize,
    owner: KeyOwner,
) -> Result<[u8; DIGEST_LENGTH], HandshakeError> {
    let mut message = Vec::with_capacity(PACKET_SIZE - DIGEST_LENGTH);
    message.extend_from_slice(&packet[..offset]);
    message.extend_from_slice(&packet[offset + DIGEST_LENGTH..]);
    hmac_sha256(&message, owner.short_key())
}

/// Writes the packet 1 digest in place and returns it
pub fn sign_packet_1(
    packet: &mut [u8],
    layout: DigestLayout,
    owner: KeyOwner,
) -> Result<[u8; DIGEST_LENGTH], HandshakeError> {
    let offset = digest_offset(packet, layout);
    let digest = digest_for_packet(packet, offset, owner)?;
    packet[offset..offset + DIGEST_LENGTH].copy_from_slice(&digest);
    Ok(digest)
}

/// Finds a valid packet 1 digest signed by `owner`, trying both layouts
pub fn find_packet_1_digest(
    packet: &[u8],
    owner: KeyOwner,
) -> Result<Option<(DigestLayout, [u8; DIGEST_LENGTH])>, HandshakeError> {
    for layout in [DigestLayout::Second, DigestLayout::First] {
        let offset = digest_offset(packet, layout);
        let expected = digest_for_packet(packet, offset, owner)?;
        if packet[offset..offset + DIGEST_LENGTH] == expected {
            return Ok(Some((layout, expected)));
        }
    }

    Ok(None)
}

/// Builds a packet 2 answering a peer whose packet 1 carried `peer_digest`
pub fn build_packet_2(
    random: &[u8; RANDOM_SIZE],
    peer_digest: &[u8; DIGEST_LENGTH],
    owner: KeyOwner,
) -> Result<Vec<u8>, HandshakeError> {
    let signature_body = PACKET_SIZE - DIGEST_LENGTH;
    let mut packet = Vec::with_capacity(PACKET_SIZE);
    packet.extend_from_slice(&[0; 8]);
    packet.extend_from_slice(&random[..signature_body - 8]);

    let key = hmac_sha256(peer_digest, &owner.long_key())?;
    let signature = hmac_sha256(&packet, &key)?;
    packet.extend_from_slice(&signature);
    Ok(packet)
}

/// Checks a packet 2 that answers our own packet 1 digest
pub fn verify_packet_2(
    packet: &[u8],
    our_digest: &[u8; DIGEST_LENGTH],
    owner: KeyOwner,
) -> Result<bool, HandshakeError> {
    let signature_body = PACKET_SIZE - DIGEST_LENGTH;
    let key = hmac_sha256(our_digest, &owner.long_key())?;
    let expected = hmac_sha256(&packet[..signature_body], &key)?;
    Ok(packet[signature_body..] == expected)
}
