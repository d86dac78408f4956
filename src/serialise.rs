// SPDX-License-Identifier: MPL-2.0

//! The line-oriented resumption format.
//!
//! A value is either a quoted string (`"value";` with `\`-escaping of
//! `\ " ; ( )`), the null marker (`null;`), or an object
//! (`ClassName(key=value;key=value;);` with the trailing `;` belonging
//! to each member value). Containers are objects of class `c` with a
//! `count` member and one member per element, keyed `1`..`count`.
//!
//! Writing goes through [`Serialiser`]/[`ObjectWriter`]; reading parses
//! the whole text into a [`Deserialisation`] tree, then each type's
//! `deserialise` picks members off a [`Deserialisator`], which treats
//! unknown class names, missing members and leftover members as fatal.

use crate::error::ResolveError;
use crate::type_aliases::FxIndexMap;

/// Types that can write themselves to the resumption format.
pub trait Serialise {
    fn serialise(&self, s: &mut Serialiser);
}

/// Accumulates serialised output.
#[derive(Debug, Default)]
pub struct Serialiser {
    out: String,
}

impl Serialiser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an object; members go through the returned writer, and the
    /// object is closed when the writer drops.
    pub fn object(&mut self, class_name: &str) -> ObjectWriter<'_> {
        self.out.push_str(class_name);
        self.out.push('(');
        ObjectWriter { serialiser: self }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn escape_write(&mut self, text: &str) {
        for c in text.chars() {
            if matches!(c, '\\' | '"' | ';' | '(' | ')') {
                self.out.push('\\');
            }
            self.out.push(c);
        }
    }
}

/// Writes the members of one object.
pub struct ObjectWriter<'a> {
    serialiser: &'a mut Serialiser,
}

impl ObjectWriter<'_> {
    pub fn member_str(self, name: &str, value: &str) -> Self {
        self.serialiser.raw(name);
        self.serialiser.raw("=\"");
        self.serialiser.escape_write(value);
        self.serialiser.raw("\";");
        self
    }

    pub fn member_bool(self, name: &str, value: bool) -> Self {
        self.member_str(name, if value { "true" } else { "false" })
    }

    pub fn member_usize(self, name: &str, value: usize) -> Self {
        self.member_str(name, &value.to_string())
    }

    pub fn member_null(self, name: &str) -> Self {
        self.serialiser.raw(name);
        self.serialiser.raw("=null;");
        self
    }

    pub fn member<T: Serialise + ?Sized>(self, name: &str, value: &T) -> Self {
        self.serialiser.raw(name);
        self.serialiser.raw("=");
        value.serialise(self.serialiser);
        self
    }

    pub fn member_container<T: Serialise>(self, name: &str, items: &[T]) -> Self {
        self.serialiser.raw(name);
        self.serialiser.raw("=");
        {
            let mut w = self
                .serialiser
                .object("c")
                .member_usize("count", items.len());
            for (i, item) in items.iter().enumerate() {
                w = w.member(&(i + 1).to_string(), item);
            }
        }
        self
    }

    pub fn member_str_container<S: AsRef<str>>(self, name: &str, items: &[S]) -> Self {
        self.serialiser.raw(name);
        self.serialiser.raw("=");
        {
            let mut w = self
                .serialiser
                .object("c")
                .member_usize("count", items.len());
            for (i, item) in items.iter().enumerate() {
                w = w.member_str(&(i + 1).to_string(), item.as_ref());
            }
        }
        self
    }
}

impl Drop for ObjectWriter<'_> {
    fn drop(&mut self) {
        self.serialiser.raw(");");
    }
}

/// One parsed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Deserialisation {
    Null,
    Str(String),
    Object {
        class_name: String,
        children: Vec<(String, Deserialisation)>,
    },
}

impl Deserialisation {
    /// Parses one complete serialised value, requiring the whole input
    /// to be consumed (trailing whitespace excepted).
    pub fn parse(text: &str) -> Result<Self, ResolveError> {
        let chars: Vec<char> = text.chars().collect();
        let mut pos = 0;
        let value = parse_value(&chars, &mut pos)?;
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos != chars.len() {
            return Err(ResolveError::Serialisation(format!(
                "trailing input at offset {pos}"
            )));
        }
        Ok(value)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Deserialisation::Object { class_name, .. } => Some(class_name),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Deserialisation::Null)
    }

    pub fn as_str(&self) -> Result<&str, ResolveError> {
        match self {
            Deserialisation::Str(s) => Ok(s),
            other => Err(ResolveError::Serialisation(format!(
                "expected a string value, got {other:?}"
            ))),
        }
    }

    /// Unpacks a container (`c(count="n";1=...;)`) into its items in
    /// order.
    pub fn into_container(self) -> Result<Vec<Deserialisation>, ResolveError> {
        let mut v = Deserialisator::new(self, "c")?;
        let count = v.member_usize("count")?;
        let mut items = Vec::with_capacity(count);
        for n in 1..=count {
            items.push(v.find_remove_member(&n.to_string())?);
        }
        v.finish()?;
        Ok(items)
    }
}

fn parse_value(chars: &[char], pos: &mut usize) -> Result<Deserialisation, ResolveError> {
    let corrupt = |what: &str, at: usize| {
        ResolveError::Serialisation(format!("{what} at offset {at}"))
    };
    if chars[*pos..].starts_with(&['n', 'u', 'l', 'l', ';']) {
        *pos += 5;
        return Ok(Deserialisation::Null);
    }
    if chars.get(*pos) == Some(&'"') {
        *pos += 1;
        let mut value = String::new();
        loop {
            match chars.get(*pos) {
                Some('\\') => {
                    let c = chars
                        .get(*pos + 1)
                        .ok_or_else(|| corrupt("dangling escape", *pos))?;
                    value.push(*c);
                    *pos += 2;
                }
                Some('"') => {
                    if chars.get(*pos + 1) != Some(&';') {
                        return Err(corrupt("missing ';' after string", *pos));
                    }
                    *pos += 2;
                    return Ok(Deserialisation::Str(value));
                }
                Some(c) => {
                    value.push(*c);
                    *pos += 1;
                }
                None => return Err(corrupt("unterminated string", *pos)),
            }
        }
    }
    // an object: class name, then members up to ");"
    let start = *pos;
    while chars
        .get(*pos)
        .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
    {
        *pos += 1;
    }
    if *pos == start || chars.get(*pos) != Some(&'(') {
        return Err(corrupt("expected a value", start));
    }
    let class_name: String = chars[start..*pos].iter().collect();
    *pos += 1;
    let mut children = Vec::new();
    loop {
        if chars.get(*pos) == Some(&')') {
            if chars.get(*pos + 1) != Some(&';') {
                return Err(corrupt("missing ';' after object", *pos));
            }
            *pos += 2;
            return Ok(Deserialisation::Object {
                class_name,
                children,
            });
        }
        let key_start = *pos;
        while chars
            .get(*pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        {
            *pos += 1;
        }
        if *pos == key_start || chars.get(*pos) != Some(&'=') {
            return Err(corrupt("expected a member key", key_start));
        }
        let key: String = chars[key_start..*pos].iter().collect();
        *pos += 1;
        let child = parse_value(chars, pos)?;
        children.push((key, child));
    }
}

/// Pulls typed members off one parsed object.
#[derive(Debug)]
pub struct Deserialisator {
    class_name: String,
    keys: FxIndexMap<String, Deserialisation>,
}

impl Deserialisator {
    pub fn new(d: Deserialisation, expected_class: &str) -> Result<Self, ResolveError> {
        match d {
            Deserialisation::Object {
                class_name,
                children,
            } => {
                if class_name != expected_class {
                    return Err(ResolveError::Serialisation(format!(
                        "expected class {expected_class:?} but got {class_name:?}"
                    )));
                }
                let mut keys = FxIndexMap::default();
                for (key, value) in children {
                    if keys.insert(key.clone(), value).is_some() {
                        return Err(ResolveError::Serialisation(format!(
                            "duplicate member {key:?} in {class_name:?}"
                        )));
                    }
                }
                Ok(Self { class_name, keys })
            }
            other => Err(ResolveError::Serialisation(format!(
                "expected a {expected_class:?} object, got {other:?}"
            ))),
        }
    }

    pub fn find_remove_member(&mut self, name: &str) -> Result<Deserialisation, ResolveError> {
        self.keys.shift_remove(name).ok_or_else(|| {
            ResolveError::Serialisation(format!(
                "no member {name:?} in {:?}",
                self.class_name
            ))
        })
    }

    pub fn member_str(&mut self, name: &str) -> Result<String, ResolveError> {
        self.find_remove_member(name)?.as_str().map(str::to_owned)
    }

    pub fn member_bool(&mut self, name: &str) -> Result<bool, ResolveError> {
        match self.member_str(name)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ResolveError::Serialisation(format!(
                "bad boolean {other:?} for member {name:?}"
            ))),
        }
    }

    pub fn member_usize(&mut self, name: &str) -> Result<usize, ResolveError> {
        let s = self.member_str(name)?;
        s.parse().map_err(|_| {
            ResolveError::Serialisation(format!("bad integer {s:?} for member {name:?}"))
        })
    }

    /// Checks every member was consumed.
    pub fn finish(self) -> Result<(), ResolveError> {
        if self.keys.is_empty() {
            Ok(())
        } else {
            let leftover: Vec<&str> = self.keys.keys().map(String::as_str).collect();
            Err(ResolveError::Serialisation(format!(
                "leftover members in {:?}: {}",
                self.class_name,
                leftover.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_the_expected_shape() {
        let mut s = Serialiser::new();
        s.object("Thing")
            .member_str("a", "x")
            .member_null("b")
            .member_bool("c", true);
        assert_eq!(s.into_string(), "Thing(a=\"x\";b=null;c=\"true\";);");
    }

    #[test]
    fn escapes_and_unescapes_specials() {
        let mut s = Serialiser::new();
        s.object("Thing").member_str("a", r#"we(ird) "quo;ted" \ value"#);
        let text = s.into_string();
        let mut v = Deserialisator::new(Deserialisation::parse(&text).unwrap(), "Thing").unwrap();
        assert_eq!(v.member_str("a").unwrap(), r#"we(ird) "quo;ted" \ value"#);
        v.finish().unwrap();
    }

    #[test]
    fn nested_objects_and_containers_round_trip() {
        let mut s = Serialiser::new();
        {
            let w = s.object("Outer");
            let w = w.member_str_container("items", &["one", "two"]);
            w.member_null("tail");
        }
        let text = s.into_string();
        assert_eq!(
            text,
            "Outer(items=c(count=\"2\";1=\"one\";2=\"two\";);tail=null;);"
        );
        let mut v = Deserialisator::new(Deserialisation::parse(&text).unwrap(), "Outer").unwrap();
        let items = v.find_remove_member("items").unwrap().into_container().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_str().unwrap(), "two");
        assert!(v.find_remove_member("tail").unwrap().is_null());
        v.finish().unwrap();
    }

    #[test]
    fn wrong_class_and_leftover_keys_are_fatal() {
        let d = Deserialisation::parse("Thing(a=\"x\";);").unwrap();
        assert!(Deserialisator::new(d.clone(), "Other").is_err());

        let v = Deserialisator::new(d, "Thing").unwrap();
        assert!(v.finish().is_err());
    }

    #[test]
    fn truncated_input_is_fatal() {
        assert!(Deserialisation::parse("Thing(a=\"x\";").is_err());
        assert!(Deserialisation::parse("Thing(a=\"x).").is_err());
        assert!(Deserialisation::parse("Thing(a=\"x\";);junk").is_err());
    }
}
