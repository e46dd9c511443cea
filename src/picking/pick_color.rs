//! Pick IDs travel through the GPU as opaque RGBA8 colours: the 24-bit ID in
//! the red, green and blue channels and a fully opaque alpha. The pick target
//! is cleared to transparent black, which decodes to "no object".

/// Colour of pixels not covered by any pickable object.
pub const NO_OBJECT: u32 = 0;

/// Packs an ID into little-endian RGBA8 (`r` in the lowest byte).
pub fn encode(id: u32) -> u32 {
    let r = (id >> 16) & 0xFF;
    let g = (id >> 8) & 0xFF;
    let b = id & 0xFF;
    r | (g << 8) | (b << 16) | (0xFF << 24)
}

pub fn decode(color: u32) -> Option<u32> {
    if color >> 24 == 0 {
        return None;
    }

    let r = color & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = (color >> 16) & 0xFF;
    Some((r << 16) | (g << 8) | b)
}

/// Encoded colour for an optional ID.
pub fn encode_optional(id: Option<u32>) -> u32 {
    id.map(encode).unwrap_or(NO_OBJECT)
}
