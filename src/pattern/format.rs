//! Printf style segment formats.
//!
//! A format segment such as `%tel-%04d[8]` renders `tel-0000` .. `tel-0007`.
//! Exactly one integer verb is allowed; `%%` is a literal percent sign.
//!
//! Supported verbs: `d`/`v` (decimal), `x`, `X`, `o`, `b`, with optional
//! `-` (left justify) and `0` (zero pad) flags and a width.

use crate::errors::DefinitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Radix {
    Decimal,
    LowerHex,
    UpperHex,
    Octal,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Verb {
    radix: Radix,
    width: usize,
    zero_pad: bool,
    left: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintfFormat {
    source: String,
    prefix: String,
    verb: Verb,
    suffix: String,
}

impl PrintfFormat {
    pub fn parse(source: &str) -> Result<Self, DefinitionError> {
        let invalid = |reason: &str| DefinitionError::InvalidFormat {
            format: source.to_string(),
            reason: reason.to_string(),
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut verb: Option<Verb> = None;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if verb.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }
            if verb.is_some() {
                return Err(invalid("more than one verb"));
            }

            let mut zero_pad = false;
            let mut left = false;
            while let Some(&flag) = chars.peek() {
                match flag {
                    '0' => zero_pad = true,
                    '-' => left = true,
                    _ => break,
                }
                chars.next();
            }

            let mut width = 0usize;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                width = width * 10 + d as usize;
                chars.next();
            }

            let radix = match chars.next() {
                Some('d') | Some('v') => Radix::Decimal,
                Some('x') => Radix::LowerHex,
                Some('X') => Radix::UpperHex,
                Some('o') => Radix::Octal,
                Some('b') => Radix::Binary,
                Some(other) => return Err(invalid(&format!("unsupported verb '%{other}'"))),
                None => return Err(invalid("dangling '%'")),
            };

            verb = Some(Verb {
                radix,
                width,
                // '-' wins over '0' as in C printf
                zero_pad: zero_pad && !left,
                left,
            });
        }

        let verb = verb.ok_or_else(|| invalid("no integer verb"))?;
        Ok(Self {
            source: source.to_string(),
            prefix,
            verb,
            suffix,
        })
    }

    pub fn render(
        &self,
        n: usize,
    ) -> String {
        let digits = match self.verb.radix {
            Radix::Decimal => n.to_string(),
            Radix::LowerHex => format!("{n:x}"),
            Radix::UpperHex => format!("{n:X}"),
            Radix::Octal => format!("{n:o}"),
            Radix::Binary => format!("{n:b}"),
        };
        let width = self.verb.width;
        let body = if self.verb.left {
            format!("{digits:<width$}")
        } else if self.verb.zero_pad {
            format!("{digits:0>width$}")
        } else {
            format!("{digits:>width$}")
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_zero_padded_decimal() {
        let f = PrintfFormat::parse("tel-%04d").unwrap();
        assert_eq!(f.render(0), "tel-0000");
        assert_eq!(f.render(42), "tel-0042");
        assert_eq!(f.render(123456), "tel-123456");
    }

    #[test]
    fn test_render_radix_and_suffix() {
        assert_eq!(PrintfFormat::parse("n%x.k").unwrap().render(255), "nff.k");
        assert_eq!(PrintfFormat::parse("%X").unwrap().render(255), "FF");
        assert_eq!(PrintfFormat::parse("%o").unwrap().render(8), "10");
        assert_eq!(PrintfFormat::parse("%08b").unwrap().render(5), "00000101");
        assert_eq!(PrintfFormat::parse("%v").unwrap().render(7), "7");
    }

    #[test]
    fn test_render_width_and_justification() {
        assert_eq!(PrintfFormat::parse("[%3d]").unwrap().render(7), "[  7]");
        assert_eq!(PrintfFormat::parse("[%-3d]").unwrap().render(7), "[7  ]");
        assert_eq!(PrintfFormat::parse("[%-03d]").unwrap().render(7), "[7  ]");
    }

    #[test]
    fn test_literal_percent() {
        let f = PrintfFormat::parse("100%%-%d").unwrap();
        assert_eq!(f.render(3), "100%-3");
    }

    #[test]
    fn test_parse_rejects_bad_formats() {
        assert!(PrintfFormat::parse("node").is_err());
        assert!(PrintfFormat::parse("%d-%d").is_err());
        assert!(PrintfFormat::parse("%s").is_err());
        assert!(PrintfFormat::parse("abc%").is_err());
    }
}
