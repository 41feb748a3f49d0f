//! Length-prefixed binary codec for [`Value`].
//!
//! Wire layout per value: `u32` big-endian payload length, `u8` kind tag,
//! payload bytes. Floats are IEEE-754 bit patterns, so encode/decode is a
//! bit-exact round trip.

use crate::error::CoreError;
use crate::value::{Value, ValueKind};

fn kind_byte(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Bool => 0,
        ValueKind::Int => 1,
        ValueKind::Float => 2,
        ValueKind::Vec2 => 3,
        ValueKind::Vec3 => 4,
        ValueKind::Vec4 => 5,
        ValueKind::Quat => 6,
        ValueKind::Rgba => 7,
        ValueKind::Transform => 8,
        ValueKind::Bone => 9,
        ValueKind::Action => 10,
    }
}

fn kind_from_byte(b: u8) -> Option<ValueKind> {
    Some(match b {
        0 => ValueKind::Bool,
        1 => ValueKind::Int,
        2 => ValueKind::Float,
        3 => ValueKind::Vec2,
        4 => ValueKind::Vec3,
        5 => ValueKind::Vec4,
        6 => ValueKind::Quat,
        7 => ValueKind::Rgba,
        8 => ValueKind::Transform,
        9 => ValueKind::Bone,
        10 => ValueKind::Action,
        _ => return None,
    })
}

fn put_f32s(out: &mut Vec<u8>, vs: &[f32]) {
    for v in vs {
        out.extend_from_slice(&v.to_bits().to_be_bytes());
    }
}

/// Append one value to the stream.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    let mut payload = Vec::new();
    match value {
        Value::Bool(b) => payload.push(u8::from(*b)),
        Value::Int(i) => payload.extend_from_slice(&i.to_be_bytes()),
        Value::Float(f) => put_f32s(&mut payload, &[*f]),
        Value::Vec2(v) => put_f32s(&mut payload, v),
        Value::Vec3(v) => put_f32s(&mut payload, v),
        Value::Vec4(v) | Value::Quat(v) | Value::Rgba(v) => put_f32s(&mut payload, v),
        Value::Transform { pos, rot, scale } => {
            put_f32s(&mut payload, pos);
            put_f32s(&mut payload, rot);
            put_f32s(&mut payload, scale);
        }
        Value::Bone(name) => payload.extend_from_slice(name.as_bytes()),
        Value::Action(bytes) => payload.extend_from_slice(bytes),
    }
    out.extend_from_slice(&(payload.len() as u32 + 1).to_be_bytes());
    out.push(kind_byte(value.kind()));
    out.extend_from_slice(&payload);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CoreError> {
        if self.pos + n > self.buf.len() {
            return Err(CoreError::decode("truncated value stream"));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn f32(&mut self) -> Result<f32, CoreError> {
        let b = self.take(4)?;
        Ok(f32::from_bits(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
    }

    fn f32s<const N: usize>(&mut self) -> Result<[f32; N], CoreError> {
        let mut out = [0.0f32; N];
        for slot in out.iter_mut() {
            *slot = self.f32()?;
        }
        Ok(out)
    }
}

/// Decode one value from the front of `buf`, returning it and the number of
/// bytes consumed.
pub fn decode_value(buf: &[u8]) -> Result<(Value, usize), CoreError> {
    let mut r = Reader { buf, pos: 0 };
    let len_bytes = r.take(4)?;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if len == 0 {
        return Err(CoreError::decode("zero-length value frame"));
    }
    let frame_end = r
        .pos
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| CoreError::decode("frame length exceeds buffer"))?;
    let tag = r.take(1)?[0];
    let kind = kind_from_byte(tag).ok_or_else(|| CoreError::decode(format!("bad tag {tag}")))?;
    let payload_len = len - 1;

    let value = match kind {
        ValueKind::Bool => Value::Bool(r.take(1)?[0] != 0),
        ValueKind::Int => {
            let b = r.take(4)?;
            Value::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        }
        ValueKind::Float => Value::Float(r.f32()?),
        ValueKind::Vec2 => Value::Vec2(r.f32s()?),
        ValueKind::Vec3 => Value::Vec3(r.f32s()?),
        ValueKind::Vec4 => Value::Vec4(r.f32s()?),
        ValueKind::Quat => Value::Quat(r.f32s()?),
        ValueKind::Rgba => Value::Rgba(r.f32s()?),
        ValueKind::Transform => Value::Transform {
            pos: r.f32s()?,
            rot: r.f32s()?,
            scale: r.f32s()?,
        },
        ValueKind::Bone => {
            let bytes = r.take(payload_len)?;
            Value::Bone(
                std::str::from_utf8(bytes)
                    .map_err(|_| CoreError::decode("bone name is not utf-8"))?
                    .to_string(),
            )
        }
        ValueKind::Action => Value::Action(r.take(payload_len)?.to_vec()),
    };

    if r.pos != frame_end {
        return Err(CoreError::decode("frame length does not match payload"));
    }
    Ok((value, r.pos))
}
