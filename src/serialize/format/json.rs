//! Hand-rolled JSON text format (no `serde_json` dependency: this crate
//! does not carry `serde` at all, so JSON gets the same from-scratch
//! lexer/writer treatment as the other text formats rather than pulling
//! in a JSON-specific crate for one format plugin).
//!
//! The root type's fields become the document's top-level object; nested
//! aggregates are objects, struct arrays are JSON arrays of objects.
//! Reading tracks a single pending lookahead byte so the lexer can peek
//! past whitespace and commas without consuming past the start of the
//! next token.

use crate::channel::IOChannel;

use crate::serialize::error::{SerializeError, SerializeResult};
use crate::serialize::primitive::{Primitive, PrimitiveKind};

use super::Format;

#[derive(Debug, Default)]
pub struct JsonFormat {
    /// One entry per currently open object; `true` once that object has
    /// written (or read) at least one field, so the next one knows to
    /// prefix a comma.
    object_stack: Vec<bool>,
    array_stack: Vec<bool>,
    indent: usize,
    lookahead: Option<u8>,
}

impl JsonFormat {
    pub fn new() -> Self {
        JsonFormat::default()
    }

    fn pad(&self) -> String {
        "  ".repeat(self.indent)
    }

    fn write_raw(&self, channel: &mut dyn IOChannel, s: &str) -> SerializeResult<()> {
        channel.write(s.as_bytes())?;
        Ok(())
    }

    fn write_field_prefix(&mut self, channel: &mut dyn IOChannel, key: &str) -> SerializeResult<()> {
        if let Some(written) = self.object_stack.last_mut() {
            if *written {
                self.write_raw(channel, ",")?;
            }
            *written = true;
        }
        self.write_raw(channel, &format!("\n{}\"{}\": ", self.pad(), escape(key)))
    }

    fn read_byte(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<Option<u8>> {
        if let Some(b) = self.lookahead.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        let n = channel.read(&mut buf)?;
        Ok(if n == 0 { None } else { Some(buf[0]) })
    }

    fn unread_byte(&mut self, b: u8) {
        self.lookahead = Some(b);
    }

    fn skip_ws(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<()> {
        loop {
            match self.read_byte(channel)? {
                Some(b) if b == b' ' || b == b'\n' || b == b'\t' || b == b'\r' => continue,
                Some(b) => {
                    self.unread_byte(b);
                    break;
                }
                None => break,
            }
        }
        Ok(())
    }

    fn skip_ws_and_comma(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<()> {
        self.skip_ws(channel)?;
        if let Some(b) = self.read_byte(channel)? {
            if b == b',' {
                self.skip_ws(channel)?;
            } else {
                self.unread_byte(b);
            }
        }
        Ok(())
    }

    fn expect_byte(&mut self, channel: &mut dyn IOChannel, expected: u8) -> SerializeResult<()> {
        match self.read_byte(channel)? {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(SerializeError::TruncatedStream(format!(
                "expected '{}', got '{}'",
                expected as char, b as char
            ))),
            None => Err(SerializeError::TruncatedStream(format!("expected '{}', got eof", expected as char))),
        }
    }

    fn read_quoted(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<String> {
        self.expect_byte(channel, b'"')?;
        let mut out = Vec::new();
        loop {
            match self.read_byte(channel)? {
                None => return Err(SerializeError::TruncatedStream("quoted string".into())),
                Some(b'"') => break,
                Some(b'\\') => match self.read_byte(channel)? {
                    Some(b'"') => out.push(b'"'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(other) => out.push(other),
                    None => return Err(SerializeError::TruncatedStream("quoted string escape".into())),
                },
                Some(b) => out.push(b),
            }
        }
        String::from_utf8(out).map_err(|_| SerializeError::TruncatedStream("quoted string".into()))
    }

    fn read_key(&mut self, channel: &mut dyn IOChannel, expected: &str) -> SerializeResult<()> {
        self.skip_ws_and_comma(channel)?;
        let key = self.read_quoted(channel)?;
        if key != expected {
            return Err(SerializeError::NameMismatchOnEnd {
                expected: expected.to_string(),
                got: key,
            });
        }
        self.skip_ws(channel)?;
        self.expect_byte(channel, b':')?;
        self.skip_ws(channel)?;
        Ok(())
    }

    fn read_bare_token(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<String> {
        let mut out = Vec::new();
        loop {
            match self.read_byte(channel)? {
                None => break,
                Some(b @ (b',' | b'}' | b']' | b' ' | b'\n' | b'\t' | b'\r')) => {
                    self.unread_byte(b);
                    break;
                }
                Some(b) => out.push(b),
            }
        }
        String::from_utf8(out).map_err(|_| SerializeError::TruncatedStream("bare token".into()))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn format_literal(value: &Primitive) -> String {
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
        Primitive::String(s) => format!("\"{}\"", escape(s)),
    }
}

fn parse_literal(kind: PrimitiveKind, text: &str) -> SerializeResult<Primitive> {
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
        PrimitiveKind::String => Primitive::String(text.trim_matches('"').replace("\\\"", "\"").replace("\\\\", "\\")),
    })
}

impl Format for JsonFormat {
    fn name(&self) -> &'static str {
        "Json"
    }

    fn begin_type(&mut self, channel: &mut dyn IOChannel, name: &str, _declared_type: &str) -> SerializeResult<()> {
        if self.object_stack.is_empty() {
            self.write_raw(channel, "{")?;
        } else {
            self.write_field_prefix(channel, name)?;
            self.write_raw(channel, "{")?;
        }
        self.object_stack.push(false);
        self.indent += 1;
        Ok(())
    }

    fn end_type(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.object_stack.pop();
        self.indent = self.indent.saturating_sub(1);
        self.write_raw(channel, &format!("\n{}}}", self.pad()))?;
        if self.object_stack.is_empty() {
            self.write_raw(channel, "\n")?;
        }
        Ok(())
    }

    fn read_begin_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()> {
        if self.object_stack.is_empty() {
            self.skip_ws(channel)?;
            self.expect_byte(channel, b'{')?;
        } else {
            self.read_key(channel, name)?;
            self.expect_byte(channel, b'{')?;
        }
        self.object_stack.push(false);
        Ok(())
    }

    fn read_end_type(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.object_stack.pop();
        self.skip_ws(channel)?;
        self.expect_byte(channel, b'}')
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
        self.write_field_prefix(channel, name)?;
        self.write_raw(channel, &format_literal(value))
    }

    fn read_primitive(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
        _max_string_len: usize,
    ) -> SerializeResult<Primitive> {
        self.read_key(channel, name)?;
        if let Some(written) = self.object_stack.last_mut() {
            *written = true;
        }
        if kind == PrimitiveKind::String {
            let s = self.read_quoted(channel)?;
            Ok(Primitive::String(s))
        } else {
            let token = self.read_bare_token(channel)?;
            parse_literal(kind, &token)
        }
    }

    fn write_array(&mut self, channel: &mut dyn IOChannel, name: &str, values: &[Primitive]) -> SerializeResult<()> {
        self.write_field_prefix(channel, name)?;
        self.write_raw(channel, "[")?;
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.write_raw(channel, ", ")?;
            }
            self.write_raw(channel, &format_literal(v))?;
        }
        self.write_raw(channel, "]")
    }

    fn read_array(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
        len: usize,
        _max_string_len: usize,
    ) -> SerializeResult<Vec<Primitive>> {
        self.read_key(channel, name)?;
        if let Some(written) = self.object_stack.last_mut() {
            *written = true;
        }
        self.expect_byte(channel, b'[')?;
        let mut values = Vec::with_capacity(len);
        for i in 0..len {
            if i > 0 {
                self.skip_ws_and_comma(channel)?;
            } else {
                self.skip_ws(channel)?;
            }
            if kind == PrimitiveKind::String {
                values.push(Primitive::String(self.read_quoted(channel)?));
            } else {
                let token = self.read_bare_token(channel)?;
                values.push(parse_literal(kind, &token)?);
            }
        }
        self.skip_ws(channel)?;
        self.expect_byte(channel, b']')?;
        Ok(values)
    }

    fn begin_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str, _element_type: &str, _len: u32) -> SerializeResult<()> {
        self.write_field_prefix(channel, name)?;
        self.write_raw(channel, "[")?;
        self.array_stack.push(false);
        self.indent += 1;
        Ok(())
    }

    fn begin_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        if let Some(written) = self.array_stack.last_mut() {
            if *written {
                self.write_raw(channel, ",")?;
            }
            *written = true;
        }
        self.write_raw(channel, &format!("\n{}{{", self.pad()))?;
        self.object_stack.push(false);
        self.indent += 1;
        Ok(())
    }

    fn end_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.object_stack.pop();
        self.indent = self.indent.saturating_sub(1);
        self.write_raw(channel, &format!("\n{}}}", self.pad()))
    }

    fn end_struct_array(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.array_stack.pop();
        self.indent = self.indent.saturating_sub(1);
        self.write_raw(channel, &format!("\n{}]", self.pad()))
    }

    fn read_begin_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<u32> {
        self.read_key(channel, name)?;
        if let Some(written) = self.object_stack.last_mut() {
            *written = true;
        }
        self.expect_byte(channel, b'[')?;
        self.array_stack.push(false);
        // JSON arrays carry their own length implicitly (the closing `]`);
        // the caller already knows how many elements to expect from the
        // in-memory collection being deserialized into, so this reports a
        // sentinel the caller is expected to ignore in favor of its own count.
        Ok(u32::MAX)
    }

    fn read_begin_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, index: u32, _len: u32) -> SerializeResult<()> {
        if index > 0 {
            self.skip_ws_and_comma(channel)?;
        } else {
            self.skip_ws(channel)?;
        }
        self.expect_byte(channel, b'{')?;
        self.object_stack.push(false);
        Ok(())
    }

    fn read_end_struct_array_separator(&mut self, channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        self.object_stack.pop();
        self.skip_ws(channel)?;
        self.expect_byte(channel, b'}')
    }

    fn read_end_struct_array(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        self.array_stack.pop();
        self.skip_ws(channel)?;
        self.expect_byte(channel, b']')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::backends::file::FileChannel;
    use crate::channel::{AccessMode, Permissions};
    use tempfile::NamedTempFile;

    #[test]
    fn nested_object_roundtrips() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut fmt = JsonFormat::new();
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.begin_type(channel.as_mut(), "root", "Widget").unwrap();
            fmt.write_primitive(channel.as_mut(), "id", &Primitive::Int(7)).unwrap();
            fmt.begin_type(channel.as_mut(), "nested", "Inner").unwrap();
            fmt.write_primitive(channel.as_mut(), "flag", &Primitive::Char(1)).unwrap();
            fmt.end_type(channel.as_mut(), "nested").unwrap();
            fmt.write_primitive(channel.as_mut(), "label", &Primitive::String("hi \"there\"".into()))
                .unwrap();
            fmt.end_type(channel.as_mut(), "root").unwrap();
            channel.flush().unwrap();
        }

        let mut fmt = JsonFormat::new();
        let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
        fmt.read_begin_type(channel.as_mut(), "root").unwrap();
        let id = fmt.read_primitive(channel.as_mut(), "id", PrimitiveKind::Int, 0).unwrap();
        assert_eq!(id, Primitive::Int(7));
        fmt.read_begin_type(channel.as_mut(), "nested").unwrap();
        let flag = fmt.read_primitive(channel.as_mut(), "flag", PrimitiveKind::Char, 0).unwrap();
        assert_eq!(flag, Primitive::Char(1));
        fmt.read_end_type(channel.as_mut(), "nested").unwrap();
        let label = fmt
            .read_primitive(channel.as_mut(), "label", PrimitiveKind::String, 0)
            .unwrap();
        assert_eq!(label, Primitive::String("hi \"there\"".into()));
        fmt.read_end_type(channel.as_mut(), "root").unwrap();
    }

    #[test]
    fn array_of_ints_roundtrips() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let values = vec![Primitive::Int(1), Primitive::Int(2), Primitive::Int(3)];

        let mut fmt = JsonFormat::new();
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.begin_type(channel.as_mut(), "root", "").unwrap();
            fmt.write_array(channel.as_mut(), "values", &values).unwrap();
            fmt.end_type(channel.as_mut(), "root").unwrap();
            channel.flush().unwrap();
        }

        let mut fmt = JsonFormat::new();
        let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
        fmt.read_begin_type(channel.as_mut(), "root").unwrap();
        let read_back = fmt
            .read_array(channel.as_mut(), "values", PrimitiveKind::Int, 3, 0)
            .unwrap();
        assert_eq!(read_back, values);
        fmt.read_end_type(channel.as_mut(), "root").unwrap();
    }
}
