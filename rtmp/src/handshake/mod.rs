//! Sans-I/O RTMP handshake.
//!
//! The handshake is the first exchange on every connection: each peer sends a version byte
//! (packet 0) and a 1536 byte packet 1, then echoes or signs the other side's packet 1 as its
//! packet 2.  Clients created through `Handshake::new` sign C1 with the Flash Player digest so
//! servers that require the digest variant accept them.  Servers echo plain handshakes and sign
//! digest handshakes, whichever the client sent.
//!
//! Bytes are fed in with `process_bytes` as they arrive; anything the handshake produces must be
//! sent to the peer, and any bytes received after the final packet belong to the chunk stream.
//!
//! ```
//! use rtmp_stream::handshake::{Handshake, HandshakeProcessResult, PeerType};
//!
//! let mut client = Handshake::new(PeerType::Client);
//! let mut server = Handshake::new(PeerType::Server);
//!
//! let c0_c1 = client.generate_outbound_p0_and_p1().unwrap();
//! let s0_s1_s2 = match server.process_bytes(&c0_c1).unwrap() {
//!     HandshakeProcessResult::InProgress { response_bytes } => response_bytes,
//!     _ => panic!("server finished early"),
//! };
//!
//! let c2 = match client.process_bytes(&s0_s1_s2).unwrap() {
//!     HandshakeProcessResult::Completed { response_bytes, .. } => response_bytes,
//!     _ => panic!("client did not complete"),
//! };
//!
//! match server.process_bytes(&c2).unwrap() {
//!     HandshakeProcessResult::Completed { .. } => (),
//!     _ => panic!("server did not complete"),
//! }
//! ```

mod digest;
mod errors;

pub use self::errors::HandshakeError;

use self::digest::{DigestLayout, KeyOwner, DIGEST_LENGTH};
use rand::RngCore;
use tracing::debug;

pub const RTMP_VERSION: u8 = 3;
pub(crate) const PACKET_SIZE: usize = 1536;
pub(crate) const RANDOM_SIZE: usize = PACKET_SIZE - 8;

/// Flash Player version advertised in C1 when signing with a digest
const CLIENT_VERSION: [u8; 4] = [0x80, 0x00, 0x07, 0x02];
/// Media server version advertised in S1 when signing with a digest
const SERVER_VERSION: [u8; 4] = [0x04, 0x05, 0x00, 0x01];

/// Which side of the connection this handshake is for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PeerType {
    Client,
    Server,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HandshakeProcessResult {
    /// More bytes are required.  `response_bytes` must be sent to the peer.
    InProgress { response_bytes: Vec<u8> },

    /// The handshake is done.  `response_bytes` must still be sent, and `remaining_bytes`
    /// are the first bytes of the chunk stream.
    Completed {
        response_bytes: Vec<u8>,
        remaining_bytes: Vec<u8>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    NeedToSendP0AndP1,
    WaitingForPacket0,
    WaitingForPacket1,
    WaitingForPacket2,
    Complete,
}

pub struct Handshake {
    peer_type: PeerType,
    use_digest: bool,
    stage: Stage,
    my_packet_1: Vec<u8>,
    my_digest: Option<[u8; DIGEST_LENGTH]>,
    peer_packet_1: Option<Vec<u8>>,
    buffer: Vec<u8>,
}

impl Handshake {
    /// Creates a handshake that signs its packet 1 when acting as a client
    pub fn new(peer_type: PeerType) -> Handshake {
        Handshake {
            peer_type,
            use_digest: peer_type == PeerType::Client,
            stage: Stage::NeedToSendP0AndP1,
            my_packet_1: Vec::new(),
            my_digest: None,
            peer_packet_1: None,
            buffer: Vec::new(),
        }
    }

    /// Creates a client handshake that only ever uses the plain echo variant
    pub fn plain_client() -> Handshake {
        Handshake {
            use_digest: false,
            ..Handshake::new(PeerType::Client)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Produces packet 0 and packet 1.  Clients call this before processing any bytes; servers
    /// send theirs in response to the client's packet 1 instead.
    pub fn generate_outbound_p0_and_p1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        match (self.peer_type, self.stage) {
            (_, Stage::Complete) => return Err(HandshakeError::AlreadyCompleted),
            (PeerType::Server, _) => return Ok(Vec::new()),
            (PeerType::Client, Stage::NeedToSendP0AndP1) => (),
            (PeerType::Client, _) => return Ok(Vec::new()),
        }

        let packet = if self.use_digest {
            let mut packet = new_packet_1(CLIENT_VERSION);
            let digest =
                digest::sign_packet_1(&mut packet, DigestLayout::First, KeyOwner::Player)?;
            self.my_digest = Some(digest);
            packet
        } else {
            new_packet_1([0; 4])
        };

        let mut output = Vec::with_capacity(PACKET_SIZE + 1);
        output.push(RTMP_VERSION);
        output.extend_from_slice(&packet);

        self.my_packet_1 = packet;
        self.stage = Stage::WaitingForPacket0;
        Ok(output)
    }

    pub fn process_bytes(&mut self, data: &[u8]) -> Result<HandshakeProcessResult, HandshakeError> {
        if self.stage == Stage::Complete {
            return Err(HandshakeError::AlreadyCompleted);
        }

        self.buffer.extend_from_slice(data);
        let mut response_bytes = Vec::new();

        loop {
            let starting_stage = self.stage;
            match self.stage {
                Stage::NeedToSendP0AndP1 => match self.peer_type {
                    PeerType::Client => {
                        response_bytes.extend(self.generate_outbound_p0_and_p1()?)
                    }
                    PeerType::Server => self.stage = Stage::WaitingForPacket0,
                },

                Stage::WaitingForPacket0 => self.parse_p0()?,
                Stage::WaitingForPacket1 => response_bytes.extend(self.parse_p1()?),
                Stage::WaitingForPacket2 => response_bytes.extend(self.parse_p2()?),
                Stage::Complete => break,
            }

            if starting_stage == self.stage {
                break;
            }
        }

        if self.stage == Stage::Complete {
            let remaining_bytes = std::mem::take(&mut self.buffer);
            Ok(HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            })
        } else {
            Ok(HandshakeProcessResult::InProgress { response_bytes })
        }
    }

    fn parse_p0(&mut self) -> Result<(), HandshakeError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        match self.buffer.remove(0) {
            RTMP_VERSION => {
                self.stage = Stage::WaitingForPacket1;
                Ok(())
            }

            version => Err(HandshakeError::ProtocolMismatch { version }),
        }
    }

    fn parse_p1(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.buffer.len() < PACKET_SIZE {
            return Ok(Vec::new());
        }

        let peer_packet: Vec<u8> = self.buffer.drain(..PACKET_SIZE).collect();
        self.stage = Stage::WaitingForPacket2;

        match self.peer_type {
            PeerType::Server => self.answer_client_packet_1(&peer_packet),
            PeerType::Client => {
                // C2 is only produced once S2 checks out
                self.peer_packet_1 = Some(peer_packet);
                Ok(Vec::new())
            }
        }
    }

    fn parse_p2(&mut self) -> Result<Vec<u8>, HandshakeError> {
        if self.buffer.len() < PACKET_SIZE {
            return Ok(Vec::new());
        }

        let peer_packet: Vec<u8> = self.buffer.drain(..PACKET_SIZE).collect();
        let response = match self.peer_type {
            PeerType::Client => {
                self.verify_packet_2(&peer_packet, KeyOwner::Server)?;
                let server_packet_1 = self.peer_packet_1.take().unwrap_or_default();
                self.answer_server_packet_1(&server_packet_1)?
            }

            PeerType::Server => {
                self.verify_packet_2(&peer_packet, KeyOwner::Player)?;
                Vec::new()
            }
        };

        self.stage = Stage::Complete;
        Ok(response)
    }

    fn answer_client_packet_1(&mut self, client_packet: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let mut output = Vec::with_capacity(PACKET_SIZE * 2 + 1);
        output.push(RTMP_VERSION);

        match digest::find_packet_1_digest(client_packet, KeyOwner::Player)? {
            Some((layout, client_digest)) => {
                debug!(?layout, "Client sent a digest handshake");
                let mut s1 = new_packet_1(SERVER_VERSION);
                self.my_digest = Some(digest::sign_packet_1(&mut s1, layout, KeyOwner::Server)?);

                let s2 = digest::build_packet_2(&random_bytes(), &client_digest, KeyOwner::Server)?;
                output.extend_from_slice(&s1);
                output.extend_from_slice(&s2);
                self.my_packet_1 = s1;
            }

            None => {
                debug!("Client sent a plain handshake");
                let s1 = new_packet_1([0; 4]);
                output.extend_from_slice(&s1);
                output.extend_from_slice(client_packet);
                self.my_packet_1 = s1;
            }
        }

        Ok(output)
    }

    fn answer_server_packet_1(&self, server_packet: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        if server_packet.len() != PACKET_SIZE {
            return Err(HandshakeError::IncorrectRandomData);
        }

        if self.use_digest {
            if let Some((_, server_digest)) =
                digest::find_packet_1_digest(server_packet, KeyOwner::Server)?
            {
                return digest::build_packet_2(&random_bytes(), &server_digest, KeyOwner::Player);
            }
        }

        Ok(server_packet.to_vec())
    }

    // A packet 2 is accepted when it either echoes our packet 1 or carries a valid signature
    // over our digest.  Peers disagree about the time fields, so only the random data counts.
    fn verify_packet_2(&self, packet: &[u8], signer: KeyOwner) -> Result<(), HandshakeError> {
        if packet[8..] == self.my_packet_1[8..] {
            return Ok(());
        }

        if let Some(my_digest) = &self.my_digest {
            if digest::verify_packet_2(packet, my_digest, signer)? {
                return Ok(());
            }
        }

        Err(HandshakeError::IncorrectRandomData)
    }
}

fn random_bytes() -> [u8; RANDOM_SIZE] {
    let mut random = [0_u8; RANDOM_SIZE];
    rand::thread_rng().fill_bytes(&mut random);
    random
}

fn new_packet_1(version: [u8; 4]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(PACKET_SIZE);
    packet.extend_from_slice(&[0; 4]);
    packet.extend_from_slice(&version);
    packet.extend_from_slice(&random_bytes());
    packet
}
