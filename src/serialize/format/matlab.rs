//! MATLAB-struct-literal text format: fields come out as
//! `path.field = value;` and array elements as `path.field(i) = value;`
//! (MATLAB indices are 1-based), with the dotted path built from the
//! nesting of `beginType` calls instead of braces.
//!
//! This format writes no struct-array length on the wire (a MATLAB
//! literal infers array size from how many elements are assigned), so
//! reading a struct array back requires the caller to already know the
//! element count; `read_begin_struct_array` reports that limitation
//! rather than guessing.

use crate::channel::IOChannel;

use crate::serialize::error::{SerializeError, SerializeResult};
use crate::serialize::primitive::{Primitive, PrimitiveKind};

use super::{read_line, write_line, Format};

const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct MatlabFormat {
    path: Vec<String>,
}

impl MatlabFormat {
    pub fn new() -> Self {
        MatlabFormat { path: Vec::new() }
    }

    fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path.join("."), name)
        }
    }
}

fn format_value(value: &Primitive) -> String {
    match value {
        Primitive::Char(v) | Primitive::UChar(v) => v.to_string(),
        Primitive::SChar(v) => v.to_string(),
        Primitive::SInt(v) => v.to_string(),
        Primitive::USInt(v) => v.to_string(),
        Primitive::Int(v) => v.to_string(),
        Primitive::UInt(v) => v.to_string(),
        Primitive::LInt(v) | Primitive::LL(v) => v.to_string(),
        Primitive::ULInt(v) | Primitive::ULL(v) => v.to_string(),
        Primitive::Float(v) => v.to_string(),
        Primitive::Double(v) | Primitive::LDouble(v) => v.to_string(),
        Primitive::String(s) => format!("'{}'", s),
    }
}

fn parse_value(kind: PrimitiveKind, text: &str) -> SerializeResult<Primitive> {
    let bad = || SerializeError::TruncatedStream(format!("could not parse {} from '{}'", kind.name(), text));
    let text = text.trim();
    Ok(match kind {
        PrimitiveKind::Char | PrimitiveKind::UChar => Primitive::Char(text.parse().map_err(|_| bad())?),
        PrimitiveKind::SChar => Primitive::SChar(text.parse().map_err(|_| bad())?),
        PrimitiveKind::SInt => Primitive::SInt(text.parse().map_err(|_| bad())?),
        PrimitiveKind::USInt => Primitive::USInt(text.parse().map_err(|_| bad())?),
        PrimitiveKind::Int => Primitive::Int(text.parse().map_err(|_| bad())?),
        PrimitiveKind::UInt => Primitive::UInt(text.parse().map_err(|_| bad())?),
        PrimitiveKind::LInt => Primitive::LInt(text.parse().map_err(|_| bad())?),
        PrimitiveKind::ULInt => Primitive::ULInt(text.parse().map_err(|_| bad())?),
        PrimitiveKind::LL => Primitive::LL(text.parse().map_err(|_| bad())?),
        PrimitiveKind::ULL => Primitive::ULL(text.parse().map_err(|_| bad())?),
        PrimitiveKind::Float => Primitive::Float(text.parse().map_err(|_| bad())?),
        PrimitiveKind::Double => Primitive::Double(text.parse().map_err(|_| bad())?),
        PrimitiveKind::LDouble => Primitive::LDouble(text.parse().map_err(|_| bad())?),
        PrimitiveKind::String => Primitive::String(text.trim_matches('\'').to_string()),
    })
}

fn split_assignment(line: &str) -> SerializeResult<(&str, &str)> {
    let line = line.trim_end_matches(';').trim();
    line.split_once('=')
        .map(|(lhs, rhs)| (lhs.trim(), rhs.trim()))
        .ok_or_else(|| SerializeError::TruncatedStream(format!("expected 'path = value', got '{line}'")))
}

impl Format for MatlabFormat {
    fn name(&self) -> &'static str {
        "Matlab"
    }

    fn begin_type(&mut self, _channel: &mut dyn IOChannel, name: &str, _declared_type: &str) -> SerializeResult<()> {
        self.path.push(name.to_string());
        Ok(())
    }

    fn end_type(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.path.pop();
        Ok(())
    }

    /// Matlab writes no struct-boundary bytes (see the module doc comment),
    /// so reading back a type just mirrors the path push with nothing to
    /// consume from the channel.
    fn read_begin_type(&mut self, _channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        self.path.push(name.to_string());
        Ok(())
    }

    fn read_end_type(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.path.pop();
        Ok(())
    }

    fn begin_base_type(&mut self, _channel: &mut dyn IOChannel, _name: &str, _kind: PrimitiveKind) -> SerializeResult<()> {
        Ok(())
    }

    fn end_base_type(&mut self, _channel: &mut dyn IOChannel) -> SerializeResult<()> {
        Ok(())
    }

    fn read_begin_base_type(&mut self, _channel: &mut dyn IOChannel, _name: &str, _kind: PrimitiveKind) -> SerializeResult<()> {
        Ok(())
    }

    fn read_end_base_type(&mut self, _channel: &mut dyn IOChannel) -> SerializeResult<()> {
        Ok(())
    }

    fn write_primitive(&mut self, channel: &mut dyn IOChannel, name: &str, value: &Primitive) -> SerializeResult<()> {
        write_line(channel, &format!("{} = {};", self.qualify(name), format_value(value)))
    }

    fn read_primitive(
        &mut self,
        channel: &mut dyn IOChannel,
        _name: &str,
        kind: PrimitiveKind,
        _max_string_len: usize,
    ) -> SerializeResult<Primitive> {
        let line = read_line(channel, MAX_LINE)?;
        let (_, rhs) = split_assignment(&line)?;
        parse_value(kind, rhs)
    }

    fn write_array(&mut self, channel: &mut dyn IOChannel, name: &str, values: &[Primitive]) -> SerializeResult<()> {
        for (i, v) in values.iter().enumerate() {
            write_line(channel, &format!("{}({}) = {};", self.qualify(name), i + 1, format_value(v)))?;
        }
        Ok(())
    }

    fn read_array(
        &mut self,
        channel: &mut dyn IOChannel,
        _name: &str,
        kind: PrimitiveKind,
        len: usize,
        _max_string_len: usize,
    ) -> SerializeResult<Vec<Primitive>> {
        (0..len)
            .map(|_| {
                let line = read_line(channel, MAX_LINE)?;
                let (_, rhs) = split_assignment(&line)?;
                parse_value(kind, rhs)
            })
            .collect()
    }

    fn begin_struct_array(&mut self, _channel: &mut dyn IOChannel, _name: &str, _element_type: &str, _len: u32) -> SerializeResult<()> {
        Ok(())
    }

    fn begin_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, name: &str, index: u32, _len: u32) -> SerializeResult<()> {
        self.path.push(format!("{}({})", name, index + 1));
        Ok(())
    }

    fn end_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.path.pop();
        Ok(())
    }

    fn end_struct_array(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn read_begin_struct_array(&mut self, _channel: &mut dyn IOChannel, name: &str) -> SerializeResult<u32> {
        Err(SerializeError::TruncatedStream(format!(
            "Matlab format does not encode the length of struct array '{name}'; it cannot be read back without an externally known count"
        )))
    }

    fn read_begin_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, name: &str, index: u32, _len: u32) -> SerializeResult<()> {
        self.path.push(format!("{}({})", name, index + 1));
        Ok(())
    }

    fn read_end_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.path.pop();
        Ok(())
    }

    fn read_end_struct_array(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::backends::file::FileChannel;
    use crate::channel::{AccessMode, Permissions};
    use tempfile::NamedTempFile;

    #[test]
    fn nested_field_gets_dotted_path() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = MatlabFormat::new();
        let mut channel = FileChannel::open_payload(
            &path,
            AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
            Permissions::rw_user(),
        )
        .unwrap();
        fmt.begin_type(channel.as_mut(), "root", "Widget").unwrap();
        fmt.write_primitive(channel.as_mut(), "count", &Primitive::Int(3)).unwrap();
        fmt.end_type(channel.as_mut(), "root").unwrap();
        channel.flush().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "root.count = 3;\n");
    }

    #[test]
    fn array_elements_use_one_based_parens() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = MatlabFormat::new();
        let mut channel = FileChannel::open_payload(
            &path,
            AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
            Permissions::rw_user(),
        )
        .unwrap();
        fmt.write_array(channel.as_mut(), "values", &[Primitive::Int(1), Primitive::Int(2)])
            .unwrap();
        channel.flush().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "values(1) = 1;\nvalues(2) = 2;\n");
    }
}
