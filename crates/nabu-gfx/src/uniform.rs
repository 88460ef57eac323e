//! Constant-update stream.
//!
//! Each record starts with a packed `u32` opcode:
//!
//! ```text
//! 31    27 26     25          12 11         0
//! [ type ][inline][    slot     ][   count   ]
//! ```
//!
//! An inline record is followed by `count * type.size()` value bytes. An
//! indirect record is followed by a packed [`UniformHandle`]; its value is read
//! from the render-side [`UniformTable`] at replay time, so an `update_uniform`
//! issued after the item was recorded is still observed. The stream ends with
//! an opcode whose type field is [`UniformType::End`], which is never zero.

use crate::error::{Fatal, ProtocolError, fatal};
use crate::handle::UniformHandle;

wire_enum! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub enum UniformType {
        /// Texture unit index, stored as `u32`.
        Sampler = 0,
        Vec4 = 1,
        Mat3 = 2,
        Mat4 = 3,
        End = 31,
    }
}

impl UniformType {
    /// Bytes per element.
    pub const fn size(self) -> usize {
        match self {
            UniformType::Sampler => 4,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 36,
            UniformType::Mat4 => 64,
            UniformType::End => 0,
        }
    }
}

const TYPE_SHIFT: u32 = 27;
const INLINE_BIT: u32 = 1 << 26;
const SLOT_SHIFT: u32 = 12;
const SLOT_MASK: u32 = 0x3fff;
const COUNT_MASK: u32 = 0xfff;

pub const MAX_SLOT: u16 = SLOT_MASK as u16;
pub const MAX_COUNT: u16 = COUNT_MASK as u16;

const OPCODE_SIZE: usize = size_of::<u32>();

/// Decoded record header.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformOpcode {
    pub ty: UniformType,
    pub slot: u16,
    pub count: u16,
    pub inline: bool,
}

impl UniformOpcode {
    pub const END: u32 = (UniformType::End as u32) << TYPE_SHIFT;

    /// Payload bytes following this header.
    pub fn payload_size(&self) -> usize {
        if self.inline {
            self.ty.size() * self.count as usize
        } else {
            size_of::<u32>()
        }
    }
}

pub fn encode_opcode(op: UniformOpcode) -> u32 {
    debug_assert!(op.slot <= MAX_SLOT && op.count <= MAX_COUNT);

    ((op.ty as u32) << TYPE_SHIFT)
        | if op.inline { INLINE_BIT } else { 0 }
        | ((op.slot as u32 & SLOT_MASK) << SLOT_SHIFT)
        | (op.count as u32 & COUNT_MASK)
}

pub fn decode_opcode(raw: u32) -> Result<UniformOpcode, ProtocolError> {
    Ok(UniformOpcode {
        ty: UniformType::from_wire((raw >> TYPE_SHIFT) as u8)?,
        slot: ((raw >> SLOT_SHIFT) & SLOT_MASK) as u16,
        count: (raw & COUNT_MASK) as u16,
        inline: raw & INLINE_BIT != 0,
    })
}

/// Byte range `[begin, end)` of the stream written for one item.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct UniformSpan {
    pub begin: u32,
    pub end: u32,
}

impl UniformSpan {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }
}

/// Fixed-size constant-update stream owned by a frame.
pub struct UniformBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl UniformBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            pos: 0,
        }
    }

    /// Current write offset; the start of the next item's span.
    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos as u32
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Appends an inline record carrying `count` elements from `bytes`.
    ///
    /// # Panics
    /// `count` above [`MAX_COUNT`], `slot` above [`MAX_SLOT`] or a byte length
    /// that does not match `count * ty.size()` are caller bugs. Overflow is fatal.
    pub fn write_uniform(&mut self, ty: UniformType, slot: u16, bytes: &[u8], count: u16) {
        assert!(slot <= MAX_SLOT && count <= MAX_COUNT, "uniform slot/count out of range");
        assert_eq!(
            bytes.len(),
            ty.size() * count as usize,
            "uniform value size does not match {ty:?} x {count}"
        );

        let op = encode_opcode(UniformOpcode {
            ty,
            slot,
            count,
            inline: true,
        });
        self.reserve(OPCODE_SIZE + bytes.len());
        self.put(&op.to_ne_bytes());
        self.put(bytes);
    }

    /// Appends an indirect record that resolves `handle` at replay time.
    pub fn write_uniform_handle(
        &mut self,
        ty: UniformType,
        slot: u16,
        handle: UniformHandle,
        count: u16,
    ) {
        assert!(slot <= MAX_SLOT && count <= MAX_COUNT, "uniform slot/count out of range");

        let op = encode_opcode(UniformOpcode {
            ty,
            slot,
            count,
            inline: false,
        });
        self.reserve(2 * OPCODE_SIZE);
        self.put(&op.to_ne_bytes());
        self.put(&handle.to_bits().to_ne_bytes());
    }

    /// Appends the `End` opcode. Space for it is always held back by writes.
    pub fn finish(&mut self) {
        self.put(&UniformOpcode::END.to_ne_bytes());
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Iterates the raw records inside `span`.
    pub fn records(&self, span: UniformSpan) -> Records<'_> {
        let end = (span.end as usize).min(self.pos);
        Records {
            data: &self.data[..end],
            pos: span.begin as usize,
        }
    }

    fn reserve(&self, needed: usize) {
        // The End opcode must always fit.
        if needed + OPCODE_SIZE > self.remaining() {
            fatal(Fatal::UniformBufferOverflow {
                needed,
                remaining: self.remaining().saturating_sub(OPCODE_SIZE),
            });
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }
}

/// Value carried by a record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Payload<'a> {
    Inline(&'a [u8]),
    Handle(UniformHandle),
}

/// Raw record walker; stops at the span end or an `End` opcode.
pub struct Records<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Records<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let start = self.pos;
        let end = start + len;
        if end > self.data.len() {
            return Err(ProtocolError::ReadPastEnd {
                offset: start,
                len,
                end: self.data.len(),
            });
        }
        self.pos = end;
        Ok(&self.data[start..end])
    }

    fn next_record(&mut self) -> Result<Option<(UniformOpcode, Payload<'a>)>, ProtocolError> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let raw = bytemuck::pod_read_unaligned::<u32>(self.take(OPCODE_SIZE)?);
        let op = decode_opcode(raw)?;
        if op.ty == UniformType::End {
            self.pos = self.data.len();
            return Ok(None);
        }

        let payload = self.take(op.payload_size())?;
        let payload = if op.inline {
            Payload::Inline(payload)
        } else {
            let bits = bytemuck::pod_read_unaligned::<u32>(payload);
            Payload::Handle(UniformHandle::from_bits(bits))
        };
        Ok(Some((op, payload)))
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<(UniformOpcode, Payload<'a>), ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// One resolved uniform write, as handed to a backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformRecord<'a> {
    pub ty: UniformType,
    pub slot: u16,
    pub count: u16,
    pub data: &'a [u8],
}

/// Replays a span, resolving indirect records through a [`UniformTable`].
///
/// A malformed stream or an indirect record naming a missing uniform is fatal.
pub struct UniformReplay<'a> {
    records: Records<'a>,
    table: &'a UniformTable,
}

impl<'a> UniformReplay<'a> {
    pub(crate) fn new(records: Records<'a>, table: &'a UniformTable) -> Self {
        Self { records, table }
    }
}

impl<'a> Iterator for UniformReplay<'a> {
    type Item = UniformRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (op, payload) = match self.records.next()? {
            Ok(record) => record,
            Err(e) => fatal(e),
        };
        let data = match payload {
            Payload::Inline(bytes) => bytes,
            Payload::Handle(handle) => match self.table.value(handle) {
                Some(bytes) => bytes,
                None => fatal(ProtocolError::MissingUniform(handle.index())),
            },
        };
        Some(UniformRecord {
            ty: op.ty,
            slot: op.slot,
            count: op.count,
            data,
        })
    }
}

struct UniformSlot {
    generation: u16,
    data: Vec<u8>,
}

/// Render-side current values of every live uniform.
///
/// Written only while draining a frame's command stream, so values are stable
/// for the whole item replay that follows.
pub struct UniformTable {
    slots: Vec<Option<UniformSlot>>,
}

impl UniformTable {
    pub fn new(capacity: u16) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Registers `handle` with a zeroed value.
    pub fn create(&mut self, handle: UniformHandle, ty: UniformType, count: u16) {
        let Some(slot) = self.slots.get_mut(handle.index() as usize) else {
            log::warn!("uniform {handle:?} outside table capacity");
            return;
        };
        *slot = Some(UniformSlot {
            generation: handle.generation(),
            data: vec![0; ty.size() * count as usize],
        });
    }

    /// Overwrites the value; extra bytes are ignored, a short write leaves the tail.
    pub fn update(&mut self, handle: UniformHandle, bytes: &[u8]) {
        let Some(slot) = self.slot_mut(handle) else {
            log::warn!("update of unknown uniform {handle:?}");
            return;
        };
        if bytes.len() != slot.data.len() {
            log::warn!(
                "uniform {handle:?} update of {} bytes, expected {}",
                bytes.len(),
                slot.data.len()
            );
        }
        let n = bytes.len().min(slot.data.len());
        slot.data[..n].copy_from_slice(&bytes[..n]);
    }

    pub fn destroy(&mut self, handle: UniformHandle) {
        if self.slot_mut(handle).is_some() {
            self.slots[handle.index() as usize] = None;
        }
    }

    pub fn value(&self, handle: UniformHandle) -> Option<&[u8]> {
        self.slot(handle).map(|s| s.data.as_slice())
    }

    fn slot(&self, handle: UniformHandle) -> Option<&UniformSlot> {
        self.slots
            .get(handle.index() as usize)?
            .as_ref()
            .filter(|s| s.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: UniformHandle) -> Option<&mut UniformSlot> {
        self.slots
            .get_mut(handle.index() as usize)?
            .as_mut()
            .filter(|s| s.generation == handle.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec4(x: f32) -> [u8; 16] {
        bytemuck::cast([x, x, x, x])
    }

    #[test]
    fn end_opcode_is_not_zero() {
        assert_eq!(UniformOpcode::END, 0xF800_0000);
        assert_ne!(UniformOpcode::END, 0);
        assert_eq!(decode_opcode(UniformOpcode::END).unwrap().ty, UniformType::End);
    }

    #[test]
    fn opcode_fields_round_trip() {
        let op = UniformOpcode {
            ty: UniformType::Mat3,
            slot: MAX_SLOT,
            count: MAX_COUNT,
            inline: true,
        };
        assert_eq!(decode_opcode(encode_opcode(op)).unwrap(), op);

        let op = UniformOpcode {
            ty: UniformType::Sampler,
            slot: 0,
            count: 1,
            inline: false,
        };
        assert_eq!(decode_opcode(encode_opcode(op)).unwrap(), op);
    }

    #[test]
    fn unknown_type_field_is_rejected() {
        assert!(matches!(
            decode_opcode(7 << TYPE_SHIFT),
            Err(ProtocolError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn inline_records_replay_in_order() {
        let mut buf = UniformBuffer::with_capacity(256);
        let table = UniformTable::new(4);

        buf.write_uniform(UniformType::Vec4, 3, &vec4(1.0), 1);
        buf.write_uniform(UniformType::Sampler, 5, &7u32.to_ne_bytes(), 1);
        let span = UniformSpan {
            begin: 0,
            end: buf.pos(),
        };
        buf.finish();

        let out: Vec<_> = UniformReplay::new(buf.records(span), &table).collect();
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].ty, out[0].slot, out[0].data), (UniformType::Vec4, 3, &vec4(1.0)[..]));
        assert_eq!(out[1].data, &7u32.to_ne_bytes());
    }

    #[test]
    fn indirect_record_sees_last_write() {
        let mut buf = UniformBuffer::with_capacity(256);
        let mut table = UniformTable::new(4);
        let h = UniformHandle::new(2, 0);
        table.create(h, UniformType::Vec4, 1);

        table.update(h, &vec4(1.0));
        buf.write_uniform_handle(UniformType::Vec4, 2, h, 1);
        let span = UniformSpan {
            begin: 0,
            end: buf.pos(),
        };
        buf.finish();
        table.update(h, &vec4(9.0));

        let out: Vec<_> = UniformReplay::new(buf.records(span), &table).collect();
        assert_eq!(out[0].data, &vec4(9.0));
    }

    #[test]
    fn records_stop_at_span_end() {
        let mut buf = UniformBuffer::with_capacity(256);
        buf.write_uniform(UniformType::Vec4, 0, &vec4(1.0), 1);
        let first = buf.pos();
        buf.write_uniform(UniformType::Vec4, 1, &vec4(2.0), 1);
        buf.finish();

        let second: Vec<_> = buf
            .records(UniformSpan {
                begin: first,
                end: buf.pos(),
            })
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0.slot, 1);
    }

    #[test]
    fn stale_handle_has_no_value() {
        let mut table = UniformTable::new(4);
        table.create(UniformHandle::new(1, 3), UniformType::Sampler, 1);
        assert!(table.value(UniformHandle::new(1, 2)).is_none());
        table.destroy(UniformHandle::new(1, 3));
        assert!(table.value(UniformHandle::new(1, 3)).is_none());
    }

    #[test]
    #[should_panic(expected = "uniform buffer overflow")]
    fn overflow_is_fatal() {
        let mut buf = UniformBuffer::with_capacity(32);
        buf.write_uniform(UniformType::Vec4, 0, &vec4(0.0), 1);
        buf.write_uniform(UniformType::Vec4, 0, &vec4(0.0), 1);
    }
}
