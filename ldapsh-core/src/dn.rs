//! Distinguished names.
//!
//! A [`Dn`] is an ordered sequence of relative name components, most specific
//! first. Parsing normalizes insignificant whitespace and escaping so that two
//! spellings of the same name compare equal; [`Display`](std::fmt::Display)
//! renders the canonical string form.

use std::fmt;
use std::str::FromStr;

use crate::error::DnError;

/// One `type=value` assertion inside a relative name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ava {
    pub attribute: String,
    pub value: String,
}

/// A relative name component: one or more assertions joined by `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            avas: vec![Ava {
                attribute: attribute.into(),
                value: value.into(),
            }],
        }
    }

    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", ava.attribute, escape_value(&ava.value))?;
        }
        Ok(())
    }
}

/// A fully qualified (or relative) name. The empty name denotes the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The empty name.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse the textual form of a name.
    pub fn parse(text: &str) -> Result<Self, DnError> {
        Parser::new(text).parse()
    }

    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Self { rdns }
    }

    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Components, most specific first.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The name with its most specific component removed.
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.is_empty() {
            return None;
        }
        Some(Dn {
            rdns: self.rdns[1..].to_vec(),
        })
    }

    /// Prefix `relative` onto this name: `relative,self`.
    pub fn join(&self, relative: &Dn) -> Dn {
        let mut rdns = relative.rdns.clone();
        rdns.extend(self.rdns.iter().cloned());
        Dn { rdns }
    }

    /// Strip the components shared with `ancestor`, comparing from the least
    /// specific end and stopping at the first mismatch.
    ///
    /// If nothing matches, the full name is returned unchanged.
    pub fn relative_to(&self, ancestor: &Dn) -> Dn {
        let mut mine = self.rdns.clone();
        for rdn in ancestor.rdns.iter().rev() {
            match mine.last() {
                Some(last) if last == rdn => {
                    mine.pop();
                }
                _ => break,
            }
        }
        Dn { rdns: mine }
    }

    /// Whether `ancestor`'s components are a strict suffix of ours.
    pub fn is_descendant_of(&self, ancestor: &Dn) -> bool {
        self.rdns.len() > ancestor.rdns.len()
            && self.rdns[self.rdns.len() - ancestor.rdns.len()..] == ancestor.rdns[..]
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dn::parse(s)
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' | ',' | '+' | '"' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\00"),
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.chars().peekable(),
        }
    }

    fn malformed(&self) -> DnError {
        DnError::Malformed {
            text: self.text.to_string(),
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.chars.peek(), Some(' ')) {
            self.chars.next();
        }
    }

    fn parse(mut self) -> Result<Dn, DnError> {
        if self.text.trim().is_empty() {
            return Ok(Dn::root());
        }

        let mut rdns = Vec::new();
        loop {
            let mut avas = vec![self.ava()?];
            while self.chars.peek() == Some(&'+') {
                self.chars.next();
                avas.push(self.ava()?);
            }
            rdns.push(Rdn { avas });

            match self.chars.next() {
                None => break,
                Some(',') | Some(';') => {
                    if self.chars.peek().is_none() {
                        return Err(self.malformed());
                    }
                }
                Some(_) => return Err(self.malformed()),
            }
        }
        Ok(Dn { rdns })
    }

    fn ava(&mut self) -> Result<Ava, DnError> {
        self.skip_spaces();
        let attribute = self.attribute_type()?;
        self.skip_spaces();
        if self.chars.next() != Some('=') {
            return Err(self.malformed());
        }
        self.skip_spaces();
        let value = if self.chars.peek() == Some(&'"') {
            self.chars.next();
            self.quoted_value()?
        } else {
            self.plain_value()?
        };
        Ok(Ava { attribute, value })
    }

    fn attribute_type(&mut self) -> Result<String, DnError> {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        let valid = match name.chars().next() {
            Some(first) if first.is_ascii_alphabetic() => !name.contains('.'),
            Some(first) if first.is_ascii_digit() => {
                name.chars().all(|c| c.is_ascii_digit() || c == '.')
                    && !name.ends_with('.')
                    && !name.contains("..")
            }
            _ => false,
        };
        if !valid {
            return Err(self.malformed());
        }
        Ok(name)
    }

    fn plain_value(&mut self) -> Result<String, DnError> {
        let mut bytes = Vec::new();
        // Bytes up to here are kept even if the remainder is only spaces.
        let mut significant = 0;
        while let Some(&c) = self.chars.peek() {
            match c {
                ',' | ';' | '+' => break,
                '"' => return Err(self.malformed()),
                '\\' => {
                    self.chars.next();
                    self.escape(&mut bytes)?;
                    significant = bytes.len();
                }
                _ => {
                    self.chars.next();
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    if c != ' ' {
                        significant = bytes.len();
                    }
                }
            }
        }
        bytes.truncate(significant);
        String::from_utf8(bytes).map_err(|_| self.malformed())
    }

    fn quoted_value(&mut self) -> Result<String, DnError> {
        let mut bytes = Vec::new();
        loop {
            match self.chars.next() {
                None => return Err(self.malformed()),
                Some('"') => break,
                Some('\\') => self.escape(&mut bytes)?,
                Some(c) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        self.skip_spaces();
        match self.chars.peek() {
            None | Some(',') | Some(';') | Some('+') => {}
            Some(_) => return Err(self.malformed()),
        }
        String::from_utf8(bytes).map_err(|_| self.malformed())
    }

    /// Handle the character(s) following a backslash.
    fn escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), DnError> {
        let c = self.chars.next().ok_or_else(|| self.malformed())?;
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' | '#' | ' ' => {
                bytes.push(c as u8);
                Ok(())
            }
            _ if c.is_ascii_hexdigit() => {
                let low = self
                    .chars
                    .next()
                    .filter(|l| l.is_ascii_hexdigit())
                    .ok_or_else(|| self.malformed())?;
                let hex = format!("{c}{low}");
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| self.malformed())?;
                bytes.push(byte);
                Ok(())
            }
            _ => Err(self.malformed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dn(s: &str) -> Dn {
        Dn::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_normalize() {
        let parsed = dn("cn=leaf, ou=People ,dc=example,  dc=com");
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed.to_string(), "cn=leaf,ou=People,dc=example,dc=com");
        assert_eq!(parsed, dn("cn=leaf,ou=People,dc=example,dc=com"));
    }

    #[test]
    fn test_empty_is_root() {
        assert!(dn("").is_root());
        assert!(dn("   ").is_root());
        assert_eq!(Dn::root().to_string(), "");
    }

    #[test]
    fn test_malformed() {
        for bad in [
            "foo",
            "=bar",
            "cn=a,",
            "cn=a,,dc=b",
            "cn=a\\",
            "cn=a\\zz",
            "cn=\"open",
            "1cn=x",
            "c n=x",
        ] {
            let err = Dn::parse(bad).unwrap_err();
            assert_eq!(err.to_string(), format!("Malformed DN: {bad}"));
        }
    }

    #[test]
    fn test_escapes() {
        let parsed = dn(r"cn=Smith\, John,dc=example");
        assert_eq!(parsed.rdns()[0].avas()[0].value, "Smith, John");
        assert_eq!(parsed.to_string(), r"cn=Smith\, John,dc=example");

        let hex = dn(r"cn=caf\C3\A9,dc=example");
        assert_eq!(hex.rdns()[0].avas()[0].value, "café");

        let quoted = dn(r#"cn="a,b" ,dc=example"#);
        assert_eq!(quoted.rdns()[0].avas()[0].value, "a,b");
        assert_eq!(quoted.to_string(), r"cn=a\,b,dc=example");

        let trailing = dn(r"cn=x\ ,dc=example");
        assert_eq!(trailing.rdns()[0].avas()[0].value, "x ");
    }

    #[test]
    fn test_multi_valued_rdn() {
        let parsed = dn("cn=a+uid=b,dc=example");
        assert_eq!(parsed.rdns()[0].avas().len(), 2);
        assert_eq!(parsed.to_string(), "cn=a+uid=b,dc=example");
    }

    #[test]
    fn test_numeric_oid_type() {
        let parsed = dn("2.5.4.3=x,dc=example");
        assert_eq!(parsed.rdns()[0].avas()[0].attribute, "2.5.4.3");
    }

    #[test]
    fn test_relative_to_parent() {
        let leaf = dn("cn=leaf,ou=c,dc=example");
        assert_eq!(leaf.relative_to(&dn("ou=c,dc=example")), dn("cn=leaf"));
    }

    #[test]
    fn test_relative_to_grandparent() {
        let leaf = dn("cn=leaf,ou=c,dc=example");
        assert_eq!(leaf.relative_to(&dn("dc=example")).to_string(), "cn=leaf,ou=c");
    }

    #[test]
    fn test_relative_to_self_is_empty() {
        let leaf = dn("cn=leaf,dc=example");
        assert!(leaf.relative_to(&leaf).is_root());
    }

    #[test]
    fn test_relative_out_of_tree_returns_full_name() {
        let leaf = dn("cn=leaf,dc=example");
        assert_eq!(leaf.relative_to(&dn("dc=out_of_tree")), leaf);
        assert_eq!(leaf.relative_to(&Dn::root()), leaf);
    }

    #[test]
    fn test_relative_stops_at_first_mismatch() {
        let leaf = dn("cn=a,ou=y,dc=com");
        assert_eq!(leaf.relative_to(&dn("ou=x,dc=com")).to_string(), "cn=a,ou=y");
    }

    #[test]
    fn test_join_and_parent() {
        let base = dn("dc=example,dc=com");
        let child = base.join(&dn("ou=People"));
        assert_eq!(child.to_string(), "ou=People,dc=example,dc=com");
        assert_eq!(child.parent(), Some(base.clone()));
        assert!(child.is_descendant_of(&base));
        assert!(!base.is_descendant_of(&child));
        assert!(Dn::root().parent().is_none());
    }
}
