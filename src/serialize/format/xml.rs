//! Element-per-aggregate XML-flavored text format. Every aggregate opens
//! and closes its own element (`<name>` / `</name>`), leaves come out as
//! `<name>value</name>` on a single line, and arrays get a `length`
//! attribute on the wrapping element. This is a small self-contained
//! grammar tied to what `Serialize` itself emits, not a general-purpose
//! XML parser.

use crate::channel::IOChannel;

use crate::serialize::error::{SerializeError, SerializeResult};
use crate::serialize::primitive::{Primitive, PrimitiveKind};

use super::{read_line, write_line, Format};

const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct XmlFormat {
    indent: usize,
}

impl XmlFormat {
    pub fn new() -> Self {
        XmlFormat { indent: 0 }
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

fn extract_leaf<'a>(line: &'a str, name: &str) -> SerializeResult<&'a str> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    line.trim()
        .strip_prefix(&open)
        .and_then(|rest| rest.strip_suffix(&close))
        .ok_or_else(|| SerializeError::TruncatedStream(format!("expected <{name}>...</{name}>, got '{line}'")))
}

impl Format for XmlFormat {
    fn name(&self) -> &'static str {
        "Xml"
    }

    fn begin_type(&mut self, channel: &mut dyn IOChannel, name: &str, declared_type: &str) -> SerializeResult<()> {
        if !declared_type.is_empty() {
            write_line(channel, &format!("{}<{} type=\"{}\">", self.pad(), name, declared_type))?;
        } else {
            write_line(channel, &format!("{}<{}>", self.pad(), name))?;
        }
        self.indent += 1;
        Ok(())
    }

    fn end_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        write_line(channel, &format!("{}</{}>", self.pad(), name))
    }

    fn read_begin_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        let line = read_line(channel, MAX_LINE)?;
        let line = line.trim();
        if !(line.starts_with(&format!("<{}>", name)) || line.starts_with(&format!("<{} ", name))) {
            return Err(SerializeError::NameMismatchOnEnd {
                expected: name.to_string(),
                got: line.to_string(),
            });
        }
        self.indent += 1;
        Ok(())
    }

    fn read_end_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        let line = read_line(channel, MAX_LINE)?;
        if line.trim() != format!("</{}>", name) {
            return Err(SerializeError::NameMismatchOnEnd {
                expected: name.to_string(),
                got: line,
            });
        }
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
        write_line(channel, &format!("{}<{}>{}</{}>", self.pad(), name, format_value(value), name))
    }

    fn read_primitive(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
        _max_string_len: usize,
    ) -> SerializeResult<Primitive> {
        let line = read_line(channel, MAX_LINE)?;
        let content = extract_leaf(&line, name)?;
        parse_value(kind, content)
    }

    fn write_array(&mut self, channel: &mut dyn IOChannel, name: &str, values: &[Primitive]) -> SerializeResult<()> {
        write_line(channel, &format!("{}<{} length=\"{}\">", self.pad(), name, values.len()))?;
        self.indent += 1;
        for v in values {
            write_line(channel, &format!("{}<item>{}</item>", self.pad(), format_value(v)))?;
        }
        self.indent = self.indent.saturating_sub(1);
        write_line(channel, &format!("{}</{}>", self.pad(), name))
    }

    fn read_array(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
        len: usize,
        _max_string_len: usize,
    ) -> SerializeResult<Vec<Primitive>> {
        let open = read_line(channel, MAX_LINE)?;
        let open = open.trim();
        if !open.starts_with(&format!("<{} length=", name)) {
            return Err(SerializeError::TruncatedStream(format!("expected opening tag for '{name}'")));
        }
        let values = (0..len)
            .map(|_| {
                let line = read_line(channel, MAX_LINE)?;
                let content = extract_leaf(&line, "item")?;
                parse_value(kind, content)
            })
            .collect::<SerializeResult<Vec<_>>>()?;
        let close = read_line(channel, MAX_LINE)?;
        if close.trim() != format!("</{}>", name) {
            return Err(SerializeError::NameMismatchOnEnd {
                expected: name.to_string(),
                got: close,
            });
        }
        Ok(values)
    }

    fn begin_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str, element_type: &str, len: u32) -> SerializeResult<()> {
        if !element_type.is_empty() {
            write_line(channel, &format!("{}<{} length=\"{}\" type=\"{}\">", self.pad(), name, len, element_type))?;
        } else {
            write_line(channel, &format!("{}<{} length=\"{}\">", self.pad(), name, len))?;
        }
        self.indent += 1;
        Ok(())
    }

    fn begin_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, index: u32, _len: u32) -> SerializeResult<()> {
        write_line(channel, &format!("{}<item index=\"{}\">", self.pad(), index))?;
        self.indent += 1;
        Ok(())
    }

    fn end_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        write_line(channel, &format!("{}</item>", self.pad()))
    }

    fn end_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        write_line(channel, &format!("{}</{}>", self.pad(), name))
    }

    fn read_begin_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<u32> {
        let line = read_line(channel, MAX_LINE)?;
        let line = line.trim();
        let prefix = format!("<{} length=\"", name);
        let rest = line
            .strip_prefix(&prefix)
            .ok_or_else(|| SerializeError::TruncatedStream(format!("expected opening tag for '{name}'")))?;
        let len_text = rest
            .split('"')
            .next()
            .ok_or_else(|| SerializeError::TruncatedStream("struct array length attribute".into()))?;
        self.indent += 1;
        len_text
            .parse()
            .map_err(|_| SerializeError::TruncatedStream("struct array length attribute".into()))
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

    fn read_end_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        self.indent = self.indent.saturating_sub(1);
        let line = read_line(channel, MAX_LINE)?;
        if line.trim() != format!("</{}>", name) {
            return Err(SerializeError::NameMismatchOnEnd {
                expected: name.to_string(),
                got: line,
            });
        }
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
    fn leaf_roundtrips_through_file() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = XmlFormat::new();
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.write_primitive(channel.as_mut(), "count", &Primitive::Int(9)).unwrap();
            channel.flush().unwrap();
        }
        let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
        let value = fmt.read_primitive(channel.as_mut(), "count", PrimitiveKind::Int, 0).unwrap();
        assert_eq!(value, Primitive::Int(9));
    }

    #[test]
    fn array_roundtrips_with_length_attribute() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = XmlFormat::new();
        let values = vec![Primitive::Int(1), Primitive::Int(2), Primitive::Int(3)];
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.write_array(channel.as_mut(), "values", &values).unwrap();
            channel.flush().unwrap();
        }
        let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
        let read_back = fmt
            .read_array(channel.as_mut(), "values", PrimitiveKind::Int, 3, 0)
            .unwrap();
        assert_eq!(read_back, values);
    }
}
