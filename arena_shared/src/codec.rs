//! Wire codec.
//!
//! All multi-byte values are little-endian and fixed width.
//!
//! Snapshot body, repeated for kind, position, velocity, size:
//!
//! ```text
//! [u8 mask]            bit i set => slot i's field follows
//! [width bytes] * n    one value per set bit, ascending slot order
//! ```
//!
//! Server frames are `[u32 opcode][payload]`; opcode 0 carries a snapshot
//! body, the others carry control messages. Client frames are either a bare
//! four-byte command or a control frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    command::UserCommand,
    entity::{Entity, EntityKind, MAX_ENTITIES},
    error::{NetError, NetResult},
    math::Vec3,
    net::SessionId,
};

pub const OP_SNAPSHOT: u32 = 0;
pub const OP_ASSIGN_ID: u32 = 1;
pub const OP_LEAVE: u32 = 2;
pub const OP_JOIN: u32 = 3;
pub const OP_POSITION: u32 = 4;

/// Fixed width of the name field in a join announcement.
pub const NAME_LEN: usize = 16;

const KIND_LEN: usize = 4;

/// Tracked fields, in wire order.
const FIELD_COUNT: usize = 4;

// ─── Snapshot ───

/// Encodes the snapshot body for `current` relative to `previous`.
///
/// With `force_full` every bit of every mask is set and `previous` is ignored.
/// Slots missing from `previous` always count as changed.
pub fn encode_snapshot(current: &[Entity], previous: &[Entity], force_full: bool) -> Bytes {
    debug_assert!(current.len() <= MAX_ENTITIES);
    let mut out = BytesMut::with_capacity(FIELD_COUNT + current.len() * (KIND_LEN + 3 * Vec3::WIRE_LEN));

    write_group(&mut out, current, previous, force_full, |e| e.kind, |buf, kind: EntityKind| {
        buf.put_u32_le(kind.tag())
    });
    write_group(&mut out, current, previous, force_full, |e| e.position, put_vec3);
    write_group(&mut out, current, previous, force_full, |e| e.velocity, put_vec3);
    write_group(&mut out, current, previous, force_full, |e| e.size, put_vec3);

    out.freeze()
}

fn write_group<T: PartialEq>(
    out: &mut BytesMut,
    current: &[Entity],
    previous: &[Entity],
    force_full: bool,
    field: impl Fn(&Entity) -> T,
    put: impl Fn(&mut BytesMut, T),
) {
    let mask_at = out.len();
    out.put_u8(0);
    let mut mask = 0u8;
    for (i, ent) in current.iter().enumerate().take(MAX_ENTITIES) {
        let changed = force_full
            || previous
                .get(i)
                .map_or(true, |old| field(old) != field(ent));
        if changed {
            mask |= 1 << i;
            put(&mut *out, field(ent));
        }
    }
    out[mask_at] = mask;
}

/// Applies a snapshot body on top of `entities`.
///
/// Either the whole body applies or nothing does: decoding runs against a
/// scratch copy that replaces `entities` only on success.
pub fn decode_snapshot(mut body: &[u8], entities: &mut [Entity]) -> NetResult<()> {
    let mut next = entities.to_vec();

    read_group(&mut body, &mut next, KIND_LEN, |buf, ent| {
        ent.kind = EntityKind::try_from(buf.get_u32_le())?;
        Ok(())
    })?;
    read_group(&mut body, &mut next, Vec3::WIRE_LEN, |buf, ent| {
        ent.position = get_vec3(buf);
        Ok(())
    })?;
    read_group(&mut body, &mut next, Vec3::WIRE_LEN, |buf, ent| {
        ent.velocity = get_vec3(buf);
        Ok(())
    })?;
    read_group(&mut body, &mut next, Vec3::WIRE_LEN, |buf, ent| {
        ent.size = get_vec3(buf);
        Ok(())
    })?;

    if body.has_remaining() {
        return Err(NetError::malformed(format!(
            "{} trailing bytes after snapshot",
            body.remaining()
        )));
    }
    entities.copy_from_slice(&next);
    Ok(())
}

fn read_group(
    body: &mut &[u8],
    entities: &mut [Entity],
    width: usize,
    apply: impl Fn(&mut &[u8], &mut Entity) -> NetResult<()>,
) -> NetResult<()> {
    if !body.has_remaining() {
        return Err(NetError::malformed("snapshot truncated before mask"));
    }
    let mask = body.get_u8();
    for i in 0..MAX_ENTITIES {
        if mask & (1 << i) == 0 {
            continue;
        }
        let ent = entities
            .get_mut(i)
            .ok_or_else(|| NetError::malformed(format!("mask names unknown slot {i}")))?;
        if body.remaining() < width {
            return Err(NetError::malformed(format!("snapshot truncated at slot {i}")));
        }
        apply(body, ent)?;
    }
    Ok(())
}

fn put_vec3(buf: &mut BytesMut, v: Vec3) {
    buf.put_f64_le(v.x);
    buf.put_f64_le(v.y);
    buf.put_f64_le(v.z);
}

fn get_vec3(buf: &mut &[u8]) -> Vec3 {
    let x = buf.get_f64_le();
    let y = buf.get_f64_le();
    let z = buf.get_f64_le();
    Vec3::new(x, y, z)
}

// ─── Control ───

/// Session lifecycle messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMsg {
    /// Server -> new client: your session id.
    AssignId { id: SessionId },
    /// A session left. Inbound, a client's polite goodbye.
    Leave { id: SessionId },
    /// A session joined.
    Join {
        id: SessionId,
        name: String,
        position: Vec3,
    },
    /// Position of a session's avatar.
    Position { id: SessionId, position: Vec3 },
}

impl ControlMsg {
    pub fn opcode(&self) -> u32 {
        match self {
            ControlMsg::AssignId { .. } => OP_ASSIGN_ID,
            ControlMsg::Leave { .. } => OP_LEAVE,
            ControlMsg::Join { .. } => OP_JOIN,
            ControlMsg::Position { .. } => OP_POSITION,
        }
    }
}

pub fn encode_join(id: SessionId, name: &str, position: Vec3) -> Bytes {
    encode_control(&ControlMsg::Join {
        id,
        name: name.to_string(),
        position,
    })
}

pub fn encode_leave(id: SessionId) -> Bytes {
    encode_control(&ControlMsg::Leave { id })
}

/// Encodes a control message with its opcode.
pub fn encode_control(msg: &ControlMsg) -> Bytes {
    let mut buf = BytesMut::with_capacity(8 + NAME_LEN + Vec3::WIRE_LEN);
    buf.put_u32_le(msg.opcode());
    match msg {
        ControlMsg::AssignId { id } | ControlMsg::Leave { id } => buf.put_u32_le(id.0),
        ControlMsg::Join { id, name, position } => {
            buf.put_u32_le(id.0);
            buf.put_slice(&pack_name(name));
            put_vec3(&mut buf, *position);
        }
        ControlMsg::Position { id, position } => {
            buf.put_u32_le(id.0);
            put_vec3(&mut buf, *position);
        }
    }
    buf.freeze()
}

/// Decodes a control frame. Snapshot frames are rejected.
pub fn decode_control(mut frame: &[u8]) -> NetResult<ControlMsg> {
    let opcode = read_opcode(&mut frame)?;
    match opcode {
        OP_ASSIGN_ID | OP_LEAVE => {
            expect_len(frame, 4, opcode)?;
            let id = SessionId(frame.get_u32_le());
            if opcode == OP_ASSIGN_ID {
                Ok(ControlMsg::AssignId { id })
            } else {
                Ok(ControlMsg::Leave { id })
            }
        }
        OP_JOIN => {
            expect_len(frame, 4 + NAME_LEN + Vec3::WIRE_LEN, opcode)?;
            let id = SessionId(frame.get_u32_le());
            let name = unpack_name(&frame[..NAME_LEN])?;
            frame.advance(NAME_LEN);
            let position = get_vec3(&mut frame);
            Ok(ControlMsg::Join { id, name, position })
        }
        OP_POSITION => {
            expect_len(frame, 4 + Vec3::WIRE_LEN, opcode)?;
            let id = SessionId(frame.get_u32_le());
            let position = get_vec3(&mut frame);
            Ok(ControlMsg::Position { id, position })
        }
        other => Err(NetError::malformed(format!("unknown control opcode {other}"))),
    }
}

fn read_opcode(frame: &mut &[u8]) -> NetResult<u32> {
    if frame.remaining() < 4 {
        return Err(NetError::malformed(format!(
            "frame of {} bytes has no opcode",
            frame.remaining()
        )));
    }
    Ok(frame.get_u32_le())
}

fn expect_len(payload: &[u8], len: usize, opcode: u32) -> NetResult<()> {
    if payload.len() != len {
        return Err(NetError::malformed(format!(
            "opcode {opcode} expects {len} payload bytes, got {}",
            payload.len()
        )));
    }
    Ok(())
}

fn pack_name(name: &str) -> [u8; NAME_LEN] {
    let mut out = [0u8; NAME_LEN];
    let mut end = name.len().min(NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    out[..end].copy_from_slice(&name.as_bytes()[..end]);
    out
}

fn unpack_name(raw: &[u8]) -> NetResult<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end])
        .map(str::to_string)
        .map_err(|e| NetError::malformed(format!("join name: {e}")))
}

// ─── Envelopes ───

/// Anything the server sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg {
    Snapshot(Bytes),
    Control(ControlMsg),
}

impl ServerMsg {
    pub fn encode(&self) -> Bytes {
        match self {
            ServerMsg::Snapshot(body) => {
                let mut buf = BytesMut::with_capacity(4 + body.len());
                buf.put_u32_le(OP_SNAPSHOT);
                buf.put_slice(body);
                buf.freeze()
            }
            ServerMsg::Control(msg) => encode_control(msg),
        }
    }

    pub fn decode(frame: &[u8]) -> NetResult<Self> {
        let mut rest = frame;
        match read_opcode(&mut rest)? {
            OP_SNAPSHOT => Ok(ServerMsg::Snapshot(Bytes::copy_from_slice(rest))),
            _ => decode_control(frame).map(ServerMsg::Control),
        }
    }
}

/// Anything a client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg {
    Command(UserCommand),
    Control(ControlMsg),
}

impl ClientMsg {
    pub fn encode(&self) -> Bytes {
        match self {
            ClientMsg::Command(cmd) => Bytes::copy_from_slice(&cmd.encode()),
            ClientMsg::Control(msg) => encode_control(msg),
        }
    }

    /// A frame of exactly four bytes is a command; anything else is control.
    pub fn decode(frame: &[u8]) -> NetResult<Self> {
        if frame.len() == UserCommand::WIRE_LEN {
            UserCommand::decode(frame).map(ClientMsg::Command)
        } else {
            decode_control(frame).map(ClientMsg::Control)
        }
    }
}
