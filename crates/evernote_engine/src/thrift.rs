//! Minimal Thrift binary protocol (strict framing), enough for the EDAM calls we make.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;
/// Deepest struct/list nesting accepted while skipping unknown fields.
const MAX_SKIP_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThriftError {
    #[error("unexpected end of message at byte {0}")]
    UnexpectedEof(usize),
    #[error("bad protocol version {0:#x}")]
    BadVersion(u32),
    #[error("unknown field type {0}")]
    UnknownType(u8),
    #[error("negative length {0}")]
    NegativeLength(i32),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("unexpected reply to {expected}: got {actual}")]
    WrongMethod { expected: String, actual: String },
    #[error("unexpected message type {0}")]
    WrongMessageType(u8),
    #[error("remote application error {kind}: {message}")]
    Application { kind: i32, message: String },
    #[error("invalid collection element type {0}")]
    InvalidElementType(u8),
    #[error("nesting deeper than {0}")]
    TooDeep(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TType {
    Stop = 0,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
}

impl TType {
    pub fn from_u8(value: u8) -> Result<Self, ThriftError> {
        Ok(match value {
            0 => TType::Stop,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::String,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            other => return Err(ThriftError::UnknownType(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageType,
    pub seq_id: i32,
}

#[derive(Debug, Default)]
pub struct ThriftWriter {
    buf: BytesMut,
}

impl ThriftWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// The encoded message, ready to hand to the HTTP body.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_message_begin(&mut self, name: &str, kind: MessageType, seq_id: i32) {
        self.buf.put_u32(VERSION_1 | kind as u32);
        self.write_string(name);
        self.write_i32(seq_id);
    }

    pub fn write_field_begin(&mut self, ttype: TType, id: i16) {
        self.write_byte(ttype as u8);
        self.write_i16(id);
    }

    pub fn write_field_stop(&mut self) {
        self.write_byte(TType::Stop as u8);
    }

    pub fn write_list_begin(&mut self, element: TType, size: usize) {
        self.write_byte(element as u8);
        self.write_i32(size as i32);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(u8::from(value));
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_binary(&mut self, value: &[u8]) {
        self.write_i32(value.len() as i32);
        self.buf.put_slice(value);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_binary(value.as_bytes());
    }

    pub fn write_string_field(&mut self, id: i16, value: &str) {
        self.write_field_begin(TType::String, id);
        self.write_string(value);
    }

    pub fn write_bool_field(&mut self, id: i16, value: bool) {
        self.write_field_begin(TType::Bool, id);
        self.write_bool(value);
    }

    pub fn write_i32_field(&mut self, id: i16, value: i32) {
        self.write_field_begin(TType::I32, id);
        self.write_i32(value);
    }
}

/// Reads a reply from a borrowed buffer. Every read checks the remaining
/// length first, so truncated input is an error rather than a panic.
pub struct ThriftReader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> ThriftReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    pub fn read_message_begin(&mut self) -> Result<MessageHeader, ThriftError> {
        let first = self.read_i32()?;
        let (name, kind) = if first < 0 {
            let version = first as u32;
            if version & VERSION_MASK != VERSION_1 {
                return Err(ThriftError::BadVersion(version));
            }
            let kind = message_type((version & 0xff) as u8)?;
            (self.read_string()?, kind)
        } else {
            // Old non-strict framing: the name comes first.
            let name = self.read_utf8(first)?;
            let kind = message_type(self.read_byte()?)?;
            (name, kind)
        };
        let seq_id = self.read_i32()?;
        Ok(MessageHeader { name, kind, seq_id })
    }

    /// `None` on the stop marker.
    pub fn read_field_begin(&mut self) -> Result<Option<(TType, i16)>, ThriftError> {
        let ttype = TType::from_u8(self.read_byte()?)?;
        if ttype == TType::Stop {
            return Ok(None);
        }
        let id = self.read_i16()?;
        Ok(Some((ttype, id)))
    }

    /// List or set header. Every element takes at least one byte, so a size
    /// beyond what is left in the buffer is rejected up front.
    pub fn read_list_begin(&mut self) -> Result<(TType, usize), ThriftError> {
        let element = self.read_element_type()?;
        let size = self.read_collection_len(1)?;
        Ok((element, size))
    }

    /// Map header: key type, value type, entry count.
    pub fn read_map_begin(&mut self) -> Result<(TType, TType, usize), ThriftError> {
        let key = self.read_element_type()?;
        let value = self.read_element_type()?;
        let size = self.read_collection_len(2)?;
        Ok((key, value, size))
    }

    pub fn read_bool(&mut self) -> Result<bool, ThriftError> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_byte(&mut self) -> Result<u8, ThriftError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i16(&mut self) -> Result<i16, ThriftError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32, ThriftError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, ThriftError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_binary(&mut self) -> Result<Vec<u8>, ThriftError> {
        let len = self.read_len()?;
        Ok(self.take_slice(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, ThriftError> {
        let len = self.read_i32()?;
        self.read_utf8(len)
    }

    /// Consume a value of any type without interpreting it.
    pub fn skip(&mut self, ttype: TType) -> Result<(), ThriftError> {
        self.skip_nested(ttype, 0)
    }

    fn skip_nested(&mut self, ttype: TType, depth: usize) -> Result<(), ThriftError> {
        if depth > MAX_SKIP_DEPTH {
            return Err(ThriftError::TooDeep(MAX_SKIP_DEPTH));
        }
        match ttype {
            TType::Stop => {}
            TType::Bool | TType::Byte => self.advance(1)?,
            TType::I16 => self.advance(2)?,
            TType::I32 => self.advance(4)?,
            TType::Double | TType::I64 => self.advance(8)?,
            TType::String => {
                let len = self.read_len()?;
                self.advance(len)?;
            }
            TType::Struct => {
                while let Some((field_type, _)) = self.read_field_begin()? {
                    self.skip_nested(field_type, depth + 1)?;
                }
            }
            TType::Map => {
                let (key, value, size) = self.read_map_begin()?;
                for _ in 0..size {
                    self.skip_nested(key, depth + 1)?;
                    self.skip_nested(value, depth + 1)?;
                }
            }
            TType::Set | TType::List => {
                let (element, size) = self.read_list_begin()?;
                for _ in 0..size {
                    self.skip_nested(element, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn read_element_type(&mut self) -> Result<TType, ThriftError> {
        match TType::from_u8(self.read_byte()?)? {
            TType::Stop => Err(ThriftError::InvalidElementType(TType::Stop as u8)),
            element => Ok(element),
        }
    }

    fn read_collection_len(&mut self, min_entry_bytes: usize) -> Result<usize, ThriftError> {
        let size = self.read_len()?;
        if size.saturating_mul(min_entry_bytes) > self.buf.remaining() {
            return Err(ThriftError::UnexpectedEof(self.position()));
        }
        Ok(size)
    }

    fn read_len(&mut self) -> Result<usize, ThriftError> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| ThriftError::NegativeLength(len))
    }

    fn read_utf8(&mut self, len: i32) -> Result<String, ThriftError> {
        let len = usize::try_from(len).map_err(|_| ThriftError::NegativeLength(len))?;
        let bytes = self.take_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ThriftError::InvalidUtf8)
    }

    fn ensure(&self, len: usize) -> Result<(), ThriftError> {
        if self.buf.remaining() < len {
            return Err(ThriftError::UnexpectedEof(self.position()));
        }
        Ok(())
    }

    fn advance(&mut self, len: usize) -> Result<(), ThriftError> {
        self.ensure(len)?;
        self.buf.advance(len);
        Ok(())
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], ThriftError> {
        self.ensure(len)?;
        let buf: &'a [u8] = self.buf;
        let (head, tail) = buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }
}

fn message_type(value: u8) -> Result<MessageType, ThriftError> {
    match value {
        1 => Ok(MessageType::Call),
        2 => Ok(MessageType::Reply),
        3 => Ok(MessageType::Exception),
        4 => Ok(MessageType::Oneway),
        other => Err(ThriftError::WrongMessageType(other)),
    }
}

/// Read the reply header for `method`, turning a remote `TApplicationException` into an error.
pub fn read_reply_header(reader: &mut ThriftReader<'_>, method: &str) -> Result<(), ThriftError> {
    let header = reader.read_message_begin()?;
    if header.kind == MessageType::Exception {
        let mut message = String::new();
        let mut kind = 0;
        while let Some((ttype, id)) = reader.read_field_begin()? {
            match (id, ttype) {
                (1, TType::String) => message = reader.read_string()?,
                (2, TType::I32) => kind = reader.read_i32()?,
                _ => reader.skip(ttype)?,
            }
        }
        return Err(ThriftError::Application { kind, message });
    }
    if header.kind != MessageType::Reply {
        return Err(ThriftError::WrongMessageType(header.kind as u8));
    }
    if header.name != method {
        return Err(ThriftError::WrongMethod {
            expected: method.to_string(),
            actual: header.name,
        });
    }
    Ok(())
}
