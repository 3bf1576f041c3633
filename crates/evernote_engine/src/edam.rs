//! EDAM structures on the wire: the subset of Evernote's Thrift IDL the plugin touches.

use std::fmt;

use evernote_core::{NoteDraft, Notebook, RemoteUser, Resource};

use crate::thrift::{TType, ThriftError, ThriftReader, ThriftWriter};

/// `EDAMErrorCode` values returned inside user and system exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdamErrorCode {
    Unknown,
    BadDataFormat,
    PermissionDenied,
    InternalError,
    DataRequired,
    LimitReached,
    QuotaReached,
    InvalidAuth,
    AuthExpired,
    DataConflict,
    EnmlValidation,
    ShardUnavailable,
    LenTooShort,
    LenTooLong,
    TooFew,
    TooMany,
    UnsupportedOperation,
    TakenDown,
    RateLimitReached,
    Other(i32),
}

impl From<i32> for EdamErrorCode {
    fn from(code: i32) -> Self {
        match code {
            1 => Self::Unknown,
            2 => Self::BadDataFormat,
            3 => Self::PermissionDenied,
            4 => Self::InternalError,
            5 => Self::DataRequired,
            6 => Self::LimitReached,
            7 => Self::QuotaReached,
            8 => Self::InvalidAuth,
            9 => Self::AuthExpired,
            10 => Self::DataConflict,
            11 => Self::EnmlValidation,
            12 => Self::ShardUnavailable,
            13 => Self::LenTooShort,
            14 => Self::LenTooLong,
            15 => Self::TooFew,
            16 => Self::TooMany,
            17 => Self::UnsupportedOperation,
            18 => Self::TakenDown,
            19 => Self::RateLimitReached,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for EdamErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "error code {code}"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// One of the three declared service exceptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdamException {
    User {
        code: EdamErrorCode,
        parameter: Option<String>,
    },
    System {
        code: EdamErrorCode,
        message: Option<String>,
        rate_limit_duration: Option<i32>,
    },
    NotFound {
        identifier: Option<String>,
        key: Option<String>,
    },
}

impl fmt::Display for EdamException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { code, parameter } => {
                write!(f, "user exception {code}")?;
                if let Some(parameter) = parameter {
                    write!(f, " ({parameter})")?;
                }
                Ok(())
            }
            Self::System { code, message, .. } => {
                write!(f, "system exception {code}")?;
                if let Some(message) = message {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            Self::NotFound { identifier, .. } => write!(
                f,
                "not found: {}",
                identifier.as_deref().unwrap_or("unknown identifier")
            ),
        }
    }
}

/// Outcome of decoding a `*_result` struct.
pub enum CallResult<T> {
    Success(T),
    Exception(EdamException),
    /// Neither a value nor an exception: a void or missing result.
    Empty,
}

/// Decode a `*_result` struct: field 0 is the value, 1..=3 are the declared exceptions.
pub fn read_result<T>(
    reader: &mut ThriftReader<'_>,
    mut read_success: impl FnMut(&mut ThriftReader<'_>, TType) -> Result<T, ThriftError>,
) -> Result<CallResult<T>, ThriftError> {
    let mut result = CallResult::Empty;
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match id {
            0 => result = CallResult::Success(read_success(reader, ttype)?),
            1 if ttype == TType::Struct => result = CallResult::Exception(read_user_exception(reader)?),
            2 if ttype == TType::Struct => {
                result = CallResult::Exception(read_system_exception(reader)?)
            }
            3 if ttype == TType::Struct => {
                result = CallResult::Exception(read_not_found_exception(reader)?)
            }
            _ => reader.skip(ttype)?,
        }
    }
    Ok(result)
}

fn read_user_exception(reader: &mut ThriftReader<'_>) -> Result<EdamException, ThriftError> {
    let mut code = EdamErrorCode::Unknown;
    let mut parameter = None;
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match (id, ttype) {
            (1, TType::I32) => code = reader.read_i32()?.into(),
            (2, TType::String) => parameter = Some(reader.read_string()?),
            _ => reader.skip(ttype)?,
        }
    }
    Ok(EdamException::User { code, parameter })
}

fn read_system_exception(reader: &mut ThriftReader<'_>) -> Result<EdamException, ThriftError> {
    let mut code = EdamErrorCode::Unknown;
    let mut message = None;
    let mut rate_limit_duration = None;
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match (id, ttype) {
            (1, TType::I32) => code = reader.read_i32()?.into(),
            (2, TType::String) => message = Some(reader.read_string()?),
            (3, TType::I32) => rate_limit_duration = Some(reader.read_i32()?),
            _ => reader.skip(ttype)?,
        }
    }
    Ok(EdamException::System {
        code,
        message,
        rate_limit_duration,
    })
}

fn read_not_found_exception(reader: &mut ThriftReader<'_>) -> Result<EdamException, ThriftError> {
    let mut identifier = None;
    let mut key = None;
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match (id, ttype) {
            (1, TType::String) => identifier = Some(reader.read_string()?),
            (2, TType::String) => key = Some(reader.read_string()?),
            _ => reader.skip(ttype)?,
        }
    }
    Ok(EdamException::NotFound { identifier, key })
}

pub fn read_user(reader: &mut ThriftReader<'_>) -> Result<RemoteUser, ThriftError> {
    let mut user = RemoteUser {
        id: 0,
        username: String::new(),
    };
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match (id, ttype) {
            (1, TType::I32) => user.id = reader.read_i32()?,
            (2, TType::String) => user.username = reader.read_string()?,
            _ => reader.skip(ttype)?,
        }
    }
    Ok(user)
}

pub fn read_notebook(reader: &mut ThriftReader<'_>) -> Result<Notebook, ThriftError> {
    let mut notebook = Notebook {
        guid: String::new(),
        name: String::new(),
        is_default: false,
    };
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match (id, ttype) {
            (1, TType::String) => notebook.guid = reader.read_string()?,
            (2, TType::String) => notebook.name = reader.read_string()?,
            (4, TType::Bool) => notebook.is_default = reader.read_bool()?,
            _ => reader.skip(ttype)?,
        }
    }
    Ok(notebook)
}

pub fn read_notebook_list(reader: &mut ThriftReader<'_>) -> Result<Vec<Notebook>, ThriftError> {
    let (element, size) = reader.read_list_begin()?;
    let mut notebooks = Vec::with_capacity(size.min(1024));
    for _ in 0..size {
        if element == TType::Struct {
            notebooks.push(read_notebook(reader)?);
        } else {
            reader.skip(element)?;
        }
    }
    Ok(notebooks)
}

/// The fields of a created note we care about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreatedNote {
    pub guid: String,
    pub title: String,
    pub notebook_guid: String,
}

pub fn read_created_note(reader: &mut ThriftReader<'_>) -> Result<CreatedNote, ThriftError> {
    let mut note = CreatedNote::default();
    while let Some((ttype, id)) = reader.read_field_begin()? {
        match (id, ttype) {
            (1, TType::String) => note.guid = reader.read_string()?,
            (2, TType::String) => note.title = reader.read_string()?,
            (11, TType::String) => note.notebook_guid = reader.read_string()?,
            _ => reader.skip(ttype)?,
        }
    }
    Ok(note)
}

/// `Note` struct: title (2), content (3), notebookGuid (11), resources (13).
pub fn write_note(writer: &mut ThriftWriter, note: &NoteDraft) {
    writer.write_string_field(2, &note.title);
    writer.write_string_field(3, &note.body_markup);
    writer.write_string_field(11, &note.notebook_guid);
    writer.write_field_begin(TType::List, 13);
    writer.write_list_begin(TType::Struct, note.resources.len());
    for resource in &note.resources {
        write_resource(writer, resource);
    }
    writer.write_field_stop();
}

fn write_resource(writer: &mut ThriftWriter, resource: &Resource) {
    // Data: bodyHash (1), size (2), body (3).
    writer.write_field_begin(TType::Struct, 3);
    let digest = md5::compute(&resource.data);
    writer.write_field_begin(TType::String, 1);
    writer.write_binary(&digest.0);
    writer.write_i32_field(2, resource.data.len() as i32);
    writer.write_field_begin(TType::String, 3);
    writer.write_binary(&resource.data);
    writer.write_field_stop();

    writer.write_string_field(4, &resource.mime_type);

    let attributes = &resource.attributes;
    writer.write_field_begin(TType::Struct, 11);
    if let Some(source_url) = &attributes.source_url {
        writer.write_string_field(1, source_url);
    }
    if let Some(file_name) = &attributes.file_name {
        writer.write_string_field(10, file_name);
    }
    if let Some(attachment) = attributes.attachment {
        writer.write_bool_field(11, attachment);
    }
    writer.write_field_stop();

    writer.write_field_stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use evernote_core::ResourceAttributes;

    fn encode_note(note: &NoteDraft) -> Vec<u8> {
        let mut writer = ThriftWriter::new();
        write_note(&mut writer, note);
        writer.into_bytes()
    }

    #[test]
    fn note_round_trips_through_the_created_note_reader() {
        let note = NoteDraft {
            title: "Title".to_string(),
            body_markup: "<en-note/>".to_string(),
            notebook_guid: "nb-1".to_string(),
            resources: Vec::new(),
        };
        let bytes = encode_note(&note);
        let created = read_created_note(&mut ThriftReader::new(&bytes)).unwrap();
        assert_eq!(created.title, "Title");
        assert_eq!(created.notebook_guid, "nb-1");
    }

    #[test]
    fn resources_are_encoded_with_their_hash() {
        let note = NoteDraft {
            title: "T".to_string(),
            body_markup: String::new(),
            notebook_guid: "nb".to_string(),
            resources: vec![Resource {
                data: b"abc".to_vec(),
                mime_type: "image/png".to_string(),
                attributes: ResourceAttributes {
                    file_name: Some("a.png".to_string()),
                    ..ResourceAttributes::default()
                },
            }],
        };
        let bytes = encode_note(&note);
        let md5_of_abc = [
            0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1,
            0x7f, 0x72,
        ];
        assert!(bytes.windows(16).any(|w| w == md5_of_abc));
        assert!(bytes.windows(5).any(|w| w == b"a.png"));

        // The whole struct must still be skippable as a unit.
        let mut reader = ThriftReader::new(&bytes);
        reader.skip(TType::Struct).unwrap();
    }

    #[test]
    fn unknown_error_codes_are_preserved() {
        assert_eq!(EdamErrorCode::from(8), EdamErrorCode::InvalidAuth);
        assert_eq!(EdamErrorCode::from(99), EdamErrorCode::Other(99));
        assert_eq!(EdamErrorCode::InvalidAuth.to_string(), "InvalidAuth");
    }
}
