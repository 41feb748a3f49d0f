//! Value operations: equality, interpolation and quaternion/transform math.
//!
//! - exact equality is bit-exact on float payloads
//! - approximate equality uses per-kind epsilons (quat compares arc distance)
//! - lerp is component-wise; quaternions use shortest-arc slerp
//! - cubic is Catmull-Rom over the `v1 -> v2` segment with clamped tangents
//!
//! All math is hand-rolled on `[f32; N]` arrays; kind mismatches fail soft to
//! the left operand.

use crate::value::{Value, ValueKind, IDENTITY_QUAT};

/// Component epsilon for approximate equality of scalar/vector kinds.
pub const DEFAULT_EPSILON: f32 = 1e-5;
/// Arc epsilon for approximate quaternion equality.
pub const QUAT_EPSILON: f32 = 1e-4;

#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = lerp_f32(a[i], b[i], t);
    }
    out
}

#[inline]
fn bits_eq<const N: usize>(a: &[f32; N], b: &[f32; N]) -> bool {
    (0..N).all(|i| a[i].to_bits() == b[i].to_bits())
}

#[inline]
fn abs_eq<const N: usize>(a: &[f32; N], b: &[f32; N], eps: f32) -> bool {
    (0..N).all(|i| (a[i] - b[i]).abs() <= eps)
}

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 <= 0.0 {
        return IDENTITY_QUAT;
    }
    let inv = len2.sqrt().recip();
    [q[0] * inv, q[1] * inv, q[2] * inv, q[3] * inv]
}

/// Shortest-arc slerp between unit quaternions; falls back to nlerp when the
/// inputs are nearly parallel.
pub fn slerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    let mut dot = dot4(a, b);
    if dot < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        dot = -dot;
    }
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat(lerp_array(&a, &b, t));
    }
    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;
    [
        s0 * a[0] + s1 * b[0],
        s0 * a[1] + s1 * b[1],
        s0 * a[2] + s1 * b[2],
        s0 * a[3] + s1 * b[3],
    ]
}

/// Hamilton product `a * b`.
#[inline]
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Rotate a vector by a unit quaternion.
pub fn rotate_vec3(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    let p = [v[0], v[1], v[2], 0.0];
    let r = quat_mul(quat_mul(q, p), quat_conjugate(q));
    [r[0], r[1], r[2]]
}

/// Yaw/pitch/roll in degrees to a quaternion, z-up with x forward.
pub fn quat_from_euler_degrees(pitch: f32, yaw: f32, roll: f32) -> [f32; 4] {
    let (p, y, r) = (
        pitch.to_radians() * 0.5,
        yaw.to_radians() * 0.5,
        roll.to_radians() * 0.5,
    );
    let (sp, cp) = p.sin_cos();
    let (sy, cy) = y.sin_cos();
    let (sr, cr) = r.sin_cos();
    normalize_quat([
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    ])
}

/// Rotation whose forward (+x) axis points along `dir`, roll held at zero.
/// A zero direction yields identity.
pub fn quat_look_along(dir: [f32; 3]) -> [f32; 4] {
    let len2 = dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2];
    if len2 <= 0.0 {
        return IDENTITY_QUAT;
    }
    let yaw = dir[1].atan2(dir[0]).to_degrees();
    let ground = (dir[0] * dir[0] + dir[1] * dir[1]).sqrt();
    let pitch = (-dir[2]).atan2(ground).to_degrees();
    quat_from_euler_degrees(pitch, yaw, 0.0)
}

/// Heading of a rotation around +z, in degrees in (-180, 180].
pub fn quat_yaw_degrees(q: [f32; 4]) -> f32 {
    let forward = rotate_vec3(q, [1.0, 0.0, 0.0]);
    forward[1].atan2(forward[0]).to_degrees()
}

/// Wrap a degree delta into [-180, 180).
pub fn wrap_degrees(mut deg: f32) -> f32 {
    deg %= 360.0;
    if deg >= 180.0 {
        deg -= 360.0;
    } else if deg < -180.0 {
        deg += 360.0;
    }
    deg
}

/// TRS compose: apply `child` in the space of `parent`.
pub fn transform_mul(
    parent: ([f32; 3], [f32; 4], [f32; 3]),
    child: ([f32; 3], [f32; 4], [f32; 3]),
) -> ([f32; 3], [f32; 4], [f32; 3]) {
    let (pp, pr, ps) = parent;
    let (cp, cr, cs) = child;
    let scaled = [cp[0] * ps[0], cp[1] * ps[1], cp[2] * ps[2]];
    let rotated = rotate_vec3(pr, scaled);
    (
        [pp[0] + rotated[0], pp[1] + rotated[1], pp[2] + rotated[2]],
        normalize_quat(quat_mul(pr, cr)),
        [ps[0] * cs[0], ps[1] * cs[1], ps[2] * cs[2]],
    )
}

/// TRS inverse; zero scale components invert to zero.
pub fn transform_invert(t: ([f32; 3], [f32; 4], [f32; 3])) -> ([f32; 3], [f32; 4], [f32; 3]) {
    let (p, r, s) = t;
    let inv_r = quat_conjugate(r);
    let inv_s = [
        if s[0] != 0.0 { 1.0 / s[0] } else { 0.0 },
        if s[1] != 0.0 { 1.0 / s[1] } else { 0.0 },
        if s[2] != 0.0 { 1.0 / s[2] } else { 0.0 },
    ];
    let unrotated = rotate_vec3(inv_r, [-p[0], -p[1], -p[2]]);
    (
        [
            unrotated[0] * inv_s[0],
            unrotated[1] * inv_s[1],
            unrotated[2] * inv_s[2],
        ],
        inv_r,
        inv_s,
    )
}

/// Bit-exact equality. Distinguishes `-0.0` from `0.0` and never equates NaN.
pub fn exact_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Vec2(x), Value::Vec2(y)) => bits_eq(x, y),
        (Value::Vec3(x), Value::Vec3(y)) => bits_eq(x, y),
        (Value::Vec4(x), Value::Vec4(y)) => bits_eq(x, y),
        (Value::Quat(x), Value::Quat(y)) => bits_eq(x, y),
        (Value::Rgba(x), Value::Rgba(y)) => bits_eq(x, y),
        (
            Value::Transform {
                pos: ap,
                rot: ar,
                scale: asc,
            },
            Value::Transform {
                pos: bp,
                rot: br,
                scale: bsc,
            },
        ) => bits_eq(ap, bp) && bits_eq(ar, br) && bits_eq(asc, bsc),
        (Value::Bone(x), Value::Bone(y)) => x == y,
        (Value::Action(x), Value::Action(y)) => x == y,
        _ => false,
    }
}

/// Approximate equality with the kind's default epsilon.
pub fn almost_eq(a: &Value, b: &Value) -> bool {
    almost_eq_eps(a, b, DEFAULT_EPSILON)
}

/// Approximate equality with an explicit component epsilon. Quaternions use
/// [`QUAT_EPSILON`] on the arc regardless of `eps`.
pub fn almost_eq_eps(a: &Value, b: &Value, eps: f32) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => (x - y).abs() <= eps,
        (Value::Vec2(x), Value::Vec2(y)) => abs_eq(x, y, eps),
        (Value::Vec3(x), Value::Vec3(y)) => abs_eq(x, y, eps),
        (Value::Vec4(x), Value::Vec4(y)) => abs_eq(x, y, eps),
        (Value::Quat(x), Value::Quat(y)) => 1.0 - dot4(*x, *y).abs() <= QUAT_EPSILON,
        (Value::Rgba(x), Value::Rgba(y)) => abs_eq(x, y, eps),
        (
            Value::Transform {
                pos: ap,
                rot: ar,
                scale: asc,
            },
            Value::Transform {
                pos: bp,
                rot: br,
                scale: bsc,
            },
        ) => {
            abs_eq(ap, bp, eps)
                && 1.0 - dot4(*ar, *br).abs() <= QUAT_EPSILON
                && abs_eq(asc, bsc, eps)
        }
        (Value::Bone(x), Value::Bone(y)) => x == y,
        (Value::Action(x), Value::Action(y)) => x == y,
        _ => false,
    }
}

/// Linear interpolation across kinds for `t` in [0, 1].
///
/// Bool steps at the midpoint, Int rounds half away from zero, Quat slerps.
/// Bone and Action are not interpolable and hold the left value, as does any
/// kind mismatch.
pub fn lerp(a: &Value, b: &Value, t: f32) -> Value {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Value::Bool(if t < 0.5 { *x } else { *y }),
        (Value::Int(x), Value::Int(y)) => {
            Value::Int(lerp_f32(*x as f32, *y as f32, t).round() as i32)
        }
        (Value::Float(x), Value::Float(y)) => Value::Float(lerp_f32(*x, *y, t)),
        (Value::Vec2(x), Value::Vec2(y)) => Value::Vec2(lerp_array(x, y, t)),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(lerp_array(x, y, t)),
        (Value::Vec4(x), Value::Vec4(y)) => Value::Vec4(lerp_array(x, y, t)),
        (Value::Quat(x), Value::Quat(y)) => Value::Quat(slerp_quat(*x, *y, t)),
        (Value::Rgba(x), Value::Rgba(y)) => Value::Rgba(lerp_array(x, y, t)),
        (
            Value::Transform {
                pos: ap,
                rot: ar,
                scale: asc,
            },
            Value::Transform {
                pos: bp,
                rot: br,
                scale: bsc,
            },
        ) => Value::Transform {
            pos: lerp_array(ap, bp, t),
            rot: slerp_quat(*ar, *br, t),
            scale: lerp_array(asc, bsc, t),
        },
        _ => a.clone(),
    }
}

#[inline]
fn catmull_rom_f32(v0: f32, v1: f32, v2: f32, v3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * v1)
        + (-v0 + v2) * t
        + (2.0 * v0 - 5.0 * v1 + 4.0 * v2 - v3) * t2
        + (-v0 + 3.0 * v1 - 3.0 * v2 + v3) * t3)
}

#[inline]
fn catmull_rom_array<const N: usize>(
    v0: &[f32; N],
    v1: &[f32; N],
    v2: &[f32; N],
    v3: &[f32; N],
    t: f32,
) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = catmull_rom_f32(v0[i], v1[i], v2[i], v3[i], t);
    }
    out
}

/// Catmull-Rom over the `v1 -> v2` segment with neighbors `v0`, `v3`.
///
/// Quaternions (and the rotation part of transforms) degrade to slerp of the
/// middle segment; tangent composition on the 4-sphere is not attempted.
pub fn cubic(v0: &Value, v1: &Value, v2: &Value, v3: &Value, t: f32) -> Value {
    match (v0, v1, v2, v3) {
        (Value::Float(a), Value::Float(b), Value::Float(c), Value::Float(d)) => {
            Value::Float(catmull_rom_f32(*a, *b, *c, *d, t))
        }
        (Value::Int(a), Value::Int(b), Value::Int(c), Value::Int(d)) => Value::Int(
            catmull_rom_f32(*a as f32, *b as f32, *c as f32, *d as f32, t).round() as i32,
        ),
        (Value::Vec2(a), Value::Vec2(b), Value::Vec2(c), Value::Vec2(d)) => {
            Value::Vec2(catmull_rom_array(a, b, c, d, t))
        }
        (Value::Vec3(a), Value::Vec3(b), Value::Vec3(c), Value::Vec3(d)) => {
            Value::Vec3(catmull_rom_array(a, b, c, d, t))
        }
        (Value::Vec4(a), Value::Vec4(b), Value::Vec4(c), Value::Vec4(d)) => {
            Value::Vec4(catmull_rom_array(a, b, c, d, t))
        }
        (Value::Rgba(a), Value::Rgba(b), Value::Rgba(c), Value::Rgba(d)) => {
            Value::Rgba(catmull_rom_array(a, b, c, d, t))
        }
        (Value::Quat(_), Value::Quat(b), Value::Quat(c), Value::Quat(_)) => {
            Value::Quat(slerp_quat(*b, *c, t))
        }
        (
            Value::Transform { .. },
            Value::Transform {
                pos: bp,
                rot: br,
                scale: bs,
            },
            Value::Transform {
                pos: cp,
                rot: cr,
                scale: cs,
            },
            Value::Transform { .. },
        ) => {
            let (p0, s0) = transform_pos_scale(v0, (bp, bs));
            let (p3, s3) = transform_pos_scale(v3, (cp, cs));
            Value::Transform {
                pos: catmull_rom_array(&p0, bp, cp, &p3, t),
                rot: slerp_quat(*br, *cr, t),
                scale: catmull_rom_array(&s0, bs, cs, &s3, t),
            }
        }
        _ => lerp(v1, v2, t),
    }
}

fn transform_pos_scale(v: &Value, fallback: (&[f32; 3], &[f32; 3])) -> ([f32; 3], [f32; 3]) {
    match v {
        Value::Transform { pos, scale, .. } => (*pos, *scale),
        _ => (*fallback.0, *fallback.1),
    }
}

/// Reflect `v` across `center`: the neighbor substituted for a missing curve
/// endpoint. Non-arithmetic kinds return `center` unchanged.
pub fn mirror(center: &Value, v: &Value) -> Value {
    fn m<const N: usize>(c: &[f32; N], v: &[f32; N]) -> [f32; N] {
        let mut out = [0.0f32; N];
        for i in 0..N {
            out[i] = 2.0 * c[i] - v[i];
        }
        out
    }
    match (center, v) {
        (Value::Float(c), Value::Float(x)) => Value::Float(2.0 * c - x),
        (Value::Int(c), Value::Int(x)) => Value::Int(2 * c - x),
        (Value::Vec2(c), Value::Vec2(x)) => Value::Vec2(m(c, x)),
        (Value::Vec3(c), Value::Vec3(x)) => Value::Vec3(m(c, x)),
        (Value::Vec4(c), Value::Vec4(x)) => Value::Vec4(m(c, x)),
        (Value::Rgba(c), Value::Rgba(x)) => Value::Rgba(m(c, x)),
        (
            Value::Transform {
                pos: cp,
                rot,
                scale: cs,
            },
            Value::Transform {
                pos: vp, scale: vs, ..
            },
        ) => Value::Transform {
            pos: m(cp, vp),
            rot: *rot,
            scale: m(cs, vs),
        },
        _ => center.clone(),
    }
}

/// Combine an additive overlay delta onto a base value.
///
/// Scalars and vectors add, quaternions compose (`delta * base`), transforms
/// do both per part with multiplicative scale. Non-additive kinds take the
/// delta outright.
pub fn additive_combine(base: &Value, delta: &Value) -> Value {
    fn add<const N: usize>(a: &[f32; N], b: &[f32; N]) -> [f32; N] {
        let mut out = [0.0f32; N];
        for i in 0..N {
            out[i] = a[i] + b[i];
        }
        out
    }
    match (base, delta) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Value::Vec2(a), Value::Vec2(b)) => Value::Vec2(add(a, b)),
        (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(add(a, b)),
        (Value::Vec4(a), Value::Vec4(b)) => Value::Vec4(add(a, b)),
        (Value::Rgba(a), Value::Rgba(b)) => Value::Rgba(add(a, b)),
        (Value::Quat(a), Value::Quat(b)) => Value::Quat(normalize_quat(quat_mul(*b, *a))),
        (
            Value::Transform {
                pos: ap,
                rot: ar,
                scale: asc,
            },
            Value::Transform {
                pos: bp,
                rot: br,
                scale: bsc,
            },
        ) => Value::Transform {
            pos: add(ap, bp),
            rot: normalize_quat(quat_mul(*br, *ar)),
            scale: [asc[0] * bsc[0], asc[1] * bsc[1], asc[2] * bsc[2]],
        },
        _ => delta.clone(),
    }
}

/// Per-kind operations table, addressable by stable tag.
///
/// The registry realizes the "dispatch on the discriminator" rule: hosts look
/// kinds up by tag, the functions themselves match on the enum.
#[derive(Copy, Clone)]
pub struct ValueOps {
    pub kind: ValueKind,
    pub exact_eq: fn(&Value, &Value) -> bool,
    pub almost_eq: fn(&Value, &Value) -> bool,
    pub lerp: fn(&Value, &Value, f32) -> Value,
    pub cubic: fn(&Value, &Value, &Value, &Value, f32) -> Value,
}

/// Look up the operations for a `target_type` tag.
pub fn ops_for_tag(tag: &str) -> Option<ValueOps> {
    let kind = ValueKind::from_tag(tag)?;
    Some(ValueOps {
        kind,
        exact_eq,
        almost_eq,
        lerp,
        cubic,
    })
}
