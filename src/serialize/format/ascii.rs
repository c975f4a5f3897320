//! Human-readable tagged-text format: `name = value;` one field per line,
//! nested aggregates as `name = {` / `};` blocks, indented two spaces per
//! nesting level. Setting the `WITH_TYPE` option to `"TRUE"` additionally
//! emits the declared type as a `/* TypeName */` comment after a struct's
//! opening brace, which is the only thing this format's `set_option`
//! recognizes.

use crate::channel::IOChannel;

use crate::serialize::error::{SerializeError, SerializeResult};
use crate::serialize::primitive::{Primitive, PrimitiveKind};

use super::{read_line, write_line, Format};

const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct AsciiFormat {
    with_type: bool,
    indent: usize,
}

impl AsciiFormat {
    pub fn new() -> Self {
        AsciiFormat { with_type: false, indent: 0 }
    }

    fn pad(&self) -> String {
        "  ".repeat(self.indent)
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
        Primitive::String(s) => s.clone(),
    }
}

fn parse_value(kind: PrimitiveKind, text: &str) -> SerializeResult<Primitive> {
    let bad = || SerializeError::TruncatedStream(format!("could not parse {} from '{}'", kind.name(), text));
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
        PrimitiveKind::String => Primitive::String(text.to_string()),
    })
}

fn split_assignment(line: &str) -> SerializeResult<(&str, &str)> {
    let line = line.trim_end_matches(';').trim();
    line.split_once('=')
        .map(|(lhs, rhs)| (lhs.trim(), rhs.trim()))
        .ok_or_else(|| SerializeError::TruncatedStream(format!("expected 'name = value', got '{line}'")))
}

impl Format for AsciiFormat {
    fn name(&self) -> &'static str {
        "Ascii"
    }

    fn set_option(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("WITH_TYPE") {
            self.with_type = value.eq_ignore_ascii_case("TRUE");
        }
    }

    fn begin_type(&mut self, channel: &mut dyn IOChannel, name: &str, declared_type: &str) -> SerializeResult<()> {
        if self.with_type && !declared_type.is_empty() {
            write_line(channel, &format!("{}{} = {{ /* {} */", self.pad(), name, declared_type))?;
        } else {
            write_line(channel, &format!("{}{} = {{", self.pad(), name))?;
        }
        self.indent += 1;
        Ok(())
    }

    fn end_type(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        write_line(channel, &format!("{}}};", self.pad()))
    }

    fn read_begin_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        let line = read_line(channel, MAX_LINE)?;
        let (lhs, _) = split_assignment(&line)?;
        if lhs != name {
            return Err(SerializeError::NameMismatchOnEnd {
                expected: name.to_string(),
                got: lhs.to_string(),
            });
        }
        self.indent += 1;
        Ok(())
    }

    fn read_end_type(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        let _ = read_line(channel, MAX_LINE)?;
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
        write_line(channel, &format!("{}{} = {};", self.pad(), name, format_value(value)))
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
        write_line(channel, &format!("{}{}.len = {};", self.pad(), name, values.len()))?;
        for (i, v) in values.iter().enumerate() {
            write_line(channel, &format!("{}{}[{}] = {};", self.pad(), name, i, format_value(v)))?;
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
        let header = read_line(channel, MAX_LINE)?;
        let (_, rhs) = split_assignment(&header)?;
        let declared: usize = rhs
            .parse()
            .map_err(|_| SerializeError::TruncatedStream("array length".into()))?;
        if declared != len {
            return Err(SerializeError::UnexpectedPrimitive);
        }
        (0..len)
            .map(|_| {
                let line = read_line(channel, MAX_LINE)?;
                let (_, rhs) = split_assignment(&line)?;
                parse_value(kind, rhs)
            })
            .collect()
    }

    fn begin_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str, element_type: &str, len: u32) -> SerializeResult<()> {
        if self.with_type && !element_type.is_empty() {
            write_line(channel, &format!("{}{}.len = {}; /* {} */", self.pad(), name, len, element_type))
        } else {
            write_line(channel, &format!("{}{}.len = {};", self.pad(), name, len))
        }
    }

    fn begin_struct_array_separator(&mut self, channel: &mut dyn IOChannel, name: &str, index: u32, _len: u32) -> SerializeResult<()> {
        write_line(channel, &format!("{}{}[{}] = {{", self.pad(), name, index))?;
        self.indent += 1;
        Ok(())
    }

    fn end_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        write_line(channel, &format!("{}}};", self.pad()))
    }

    fn end_struct_array(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn read_begin_struct_array(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<u32> {
        let line = read_line(channel, MAX_LINE)?;
        let (lhs, rhs) = line
            .split_once('=')
            .map(|(l, r)| (l.trim(), r.trim()))
            .ok_or_else(|| SerializeError::TruncatedStream(format!("expected 'name.len = N', got '{line}'")))?;
        let _ = lhs;
        let rhs = rhs.split("/*").next().unwrap_or(rhs).trim().trim_end_matches(';').trim();
        rhs.parse()
            .map_err(|_| SerializeError::TruncatedStream("struct array length".into()))
    }

    fn read_begin_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        let _ = read_line(channel, MAX_LINE)?;
        self.indent += 1;
        Ok(())
    }

    fn read_end_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        let _ = read_line(channel, MAX_LINE)?;
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

    fn roundtrip(value: Primitive, kind: PrimitiveKind) -> Primitive {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = AsciiFormat::new();
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.write_primitive(channel.as_mut(), "field", &value).unwrap();
            channel.flush().unwrap();
        }
        let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
        fmt.read_primitive(channel.as_mut(), "field", kind, 0).unwrap()
    }

    #[test]
    fn int_field_roundtrips_as_text() {
        assert_eq!(roundtrip(Primitive::Int(-7), PrimitiveKind::Int), Primitive::Int(-7));
    }

    #[test]
    fn string_field_roundtrips_as_text() {
        assert_eq!(
            roundtrip(Primitive::String("abc".into()), PrimitiveKind::String),
            Primitive::String("abc".into())
        );
    }

    #[test]
    fn with_type_option_emits_type_comment() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = AsciiFormat::new();
        fmt.set_option("WITH_TYPE", "TRUE");
        let mut channel = FileChannel::open_payload(
            &path,
            AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
            Permissions::rw_user(),
        )
        .unwrap();
        fmt.begin_type(channel.as_mut(), "root", "Widget").unwrap();
        fmt.end_type(channel.as_mut(), "root").unwrap();
        channel.flush().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("/* Widget */"));
    }
}
