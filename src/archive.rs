//! Reading and writing descriptor documents.
//!
//! One XML element per node, named by the node’s tag. Attributes are written in order, followed
//! by `events` and then `class`, the real type override. Bindings are `<bind>` children that
//! precede the node’s children:
//!
//! ```xml
//! <panel>
//!   <textfield name="user" events="focus">
//!     <bind property="Value" key="UserName"/>
//!   </textfield>
//!   <button text="OK" class="app::FancyButton"/>
//! </panel>
//! ```

use crate::binding::{Binding, Conversion};
use crate::descriptor::{attr_kind, Element};
use crate::events::EventMask;
use crate::value::{CoerceError, Value};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use std::{fs, io};

const BIND: &str = "bind";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("malformed document: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(#[from] AttrError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("the document has no root element")]
    Empty,
    #[error("the document has more than one root element")]
    MultipleRoots,
    #[error("<{0}> is never closed")]
    Unclosed(String),
    #[error("<bind> outside of a node")]
    StrayBinding,
    #[error("<bind> is missing {0:?}")]
    IncompleteBinding(&'static str),
    #[error("unknown conversion {0:?}")]
    Conversion(String),
    #[error("unknown event category {0:?}")]
    Events(String),
    #[error("attribute {name:?}: {source}")]
    Value {
        name: String,
        #[source]
        source: CoerceError,
    },
}

fn attributes(start: &BytesStart) -> Result<Vec<(String, String)>, ArchiveError> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        out.push((key, value));
    }
    Ok(out)
}

fn read_element(start: &BytesStart) -> Result<Element, ArchiveError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut element = Element::new(tag);
    for (name, value) in attributes(start)? {
        match name.as_str() {
            "events" => {
                element.descriptor.events = EventMask::parse_list(&value).map_err(ArchiveError::Events)?;
            }
            "class" => element.descriptor.type_override = Some(value),
            _ => {
                let value = Value::parse(attr_kind(&name), &value).map_err(|source| ArchiveError::Value {
                    name: name.clone(),
                    source,
                })?;
                element.descriptor.attrs.set(&name, value);
            }
        }
    }
    Ok(element)
}

fn read_binding(start: &BytesStart) -> Result<Binding, ArchiveError> {
    let (mut property, mut key, mut conversion) = (None, None, Conversion::None);
    for (name, value) in attributes(start)? {
        match name.as_str() {
            "property" => property = Some(value),
            "key" => key = Some(value),
            "conversion" => conversion = Conversion::parse(&value).ok_or(ArchiveError::Conversion(value))?,
            _ => (),
        }
    }
    let property = property.ok_or(ArchiveError::IncompleteBinding("property"))?;
    let key = key.ok_or(ArchiveError::IncompleteBinding("key"))?;
    Ok(Binding::new(property, key, conversion))
}

fn add_binding(stack: &mut Vec<Option<Element>>, start: &BytesStart) -> Result<(), ArchiveError> {
    let binding = read_binding(start)?;
    match stack.last_mut() {
        Some(Some(parent)) => parent.descriptor.add_binding(binding),
        _ => return Err(ArchiveError::StrayBinding),
    }
    Ok(())
}

/// Parses a descriptor document.
pub fn from_str(markup: &str) -> Result<Element, ArchiveError> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    // `None` marks an open <bind>
    let mut stack: Vec<Option<Element>> = Vec::new();
    let mut root = None;

    let mut close = |element: Option<Element>, stack: &mut Vec<Option<Element>>| -> Result<(), ArchiveError> {
        let element = match element {
            Some(element) => element,
            None => return Ok(()),
        };
        match stack.last_mut() {
            Some(Some(parent)) => parent.children.push(element),
            Some(None) => (),
            None if root.is_none() => root = Some(element),
            None => return Err(ArchiveError::MultipleRoots),
        }
        Ok(())
    };

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.name().as_ref() == BIND.as_bytes() => {
                add_binding(&mut stack, e)?;
                stack.push(None);
            }
            Event::Empty(ref e) if e.name().as_ref() == BIND.as_bytes() => add_binding(&mut stack, e)?,
            Event::Start(ref e) => stack.push(Some(read_element(e)?)),
            Event::Empty(ref e) => {
                let element = read_element(e)?;
                close(Some(element), &mut stack)?;
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    close(element, &mut stack)?;
                }
            }
            Event::Eof => break,
            _ => (),
        }
    }

    if let Some(open) = stack.into_iter().rev().flatten().next() {
        return Err(ArchiveError::Unclosed(open.descriptor.tag));
    }
    root.ok_or(ArchiveError::Empty)
}

pub fn load(path: impl AsRef<Path>) -> Result<Element, ArchiveError> {
    from_str(&fs::read_to_string(path)?)
}

fn write_element<W: io::Write>(writer: &mut Writer<W>, element: &Element) -> Result<(), ArchiveError> {
    let descriptor = &element.descriptor;
    let mut start = BytesStart::new(descriptor.tag.as_str());
    for (name, value) in descriptor.attrs.iter() {
        start.push_attribute((name, value.to_string().as_str()));
    }
    if !descriptor.events.is_empty() {
        start.push_attribute(("events", descriptor.events.to_list().as_str()));
    }
    if let Some(class) = &descriptor.type_override {
        start.push_attribute(("class", class.as_str()));
    }

    if descriptor.bindings.is_empty() && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for binding in &descriptor.bindings {
        let mut bind = BytesStart::new(BIND);
        bind.push_attribute(("property", binding.property()));
        bind.push_attribute(("key", binding.key()));
        if let Some(conversion) = binding.conversion().to_markup() {
            bind.push_attribute(("conversion", conversion.as_str()));
        }
        writer.write_event(Event::Empty(bind))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(descriptor.tag.as_str())))?;
    Ok(())
}

/// Writes a descriptor document.
pub fn to_string(element: &Element) -> Result<String, ArchiveError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_element(&mut writer, element)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).to_string())
}

pub fn save(path: impl AsRef<Path>, element: &Element) -> Result<(), ArchiveError> {
    fs::write(path, to_string(element)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use proptest::prelude::*;

    const FORM: &str = r#"
<panel>
  <textfield name="user" events="focus,action">
    <bind property="Value" key="UserName"/>
    <bind property="Enabled" key="CanEdit" conversion="boolean"/>
  </textfield>
  <combobox selected-index="1">
    <item text="red"/>
    <item text="green &amp; blue"/>
  </combobox>
  <button text="OK" enabled="false" class="app::FancyButton"/>
</panel>
"#;

    #[test]
    fn test_read_form() {
        let root = from_str(FORM).unwrap();
        assert_eq!(root.descriptor.tag, "panel");
        assert_eq!(root.children.len(), 3);

        let field = &root.children[0];
        assert_eq!(field.descriptor.events, EventMask::FOCUS | EventMask::ACTION);
        assert_eq!(field.descriptor.bindings.len(), 2);
        assert_eq!(field.descriptor.bindings[1].conversion(), &Conversion::Boolean);
        assert!(field.children.is_empty());

        let combo = &root.children[1];
        assert_eq!(combo.descriptor.attrs.get("selected-index"), Some(&Value::Int(1)));
        assert_eq!(combo.children[1].descriptor.attrs.get("text"), Some(&Value::text("green & blue")));

        let button = &root.children[2];
        assert_eq!(button.descriptor.attrs.get("enabled"), Some(&Value::Bool(false)));
        assert_eq!(button.descriptor.type_override.as_deref(), Some("app::FancyButton"));
    }

    #[test]
    fn test_class_written_last() {
        let element = Element::new("button")
            .class("app::FancyButton")
            .attr("text", "OK")
            .events(EventMask::ACTION);
        let markup = to_string(&element).unwrap();
        let class = markup.find("class=").unwrap();
        assert!(markup.find("events=").unwrap() < class);
        assert!(markup.find("text=").unwrap() < class);
    }

    #[test]
    fn test_bad_documents() {
        assert!(matches!(from_str(""), Err(ArchiveError::Empty)));
        assert!(matches!(from_str("<panel/><panel/>"), Err(ArchiveError::MultipleRoots)));
        assert!(from_str("<panel><label/>").is_err());
        assert!(matches!(from_str("<bind property=\"Text\" key=\"k\"/>"), Err(ArchiveError::StrayBinding)));
        assert!(matches!(
            from_str("<label><bind key=\"k\"/></label>"),
            Err(ArchiveError::IncompleteBinding("property"))
        ));
        assert!(matches!(
            from_str("<label events=\"hover\"/>"),
            Err(ArchiveError::Events(_))
        ));
        assert!(matches!(from_str("<label x=\"left\"/>"), Err(ArchiveError::Value { .. })));
        assert!(from_str("<panel></label>").is_err());
    }

    fn arb_element() -> impl Strategy<Value = Element> {
        let leaf = (
            prop::sample::select(vec!["panel", "label", "button", "textfield", "checkbox"]),
            proptest::option::of("[a-zA-Z0-9 <>&\"']{0,12}"),
            proptest::option::of(any::<bool>()),
            proptest::option::of(-500i64..500),
            proptest::option::of(any::<(u8, u8, u8)>()),
            proptest::option::of(prop::sample::select(vec!["Value", "Text", "Selected"])),
            any::<bool>(),
        )
            .prop_map(|(tag, text, enabled, x, background, bound, class)| {
                let mut element = Element::new(tag);
                if let Some(text) = text {
                    element = element.attr("text", text);
                }
                if let Some(enabled) = enabled {
                    element = element.attr("enabled", enabled);
                }
                if let Some(x) = x {
                    element = element.attr("x", x);
                }
                if let Some((r, g, b)) = background {
                    element = element.attr("background", Color::from_rgba8(r, g, b, 255));
                }
                if let Some(property) = bound {
                    element = element.bind(Binding::new(property, "Key", Conversion::Text));
                }
                if class {
                    element = element.class("app::Custom").events(EventMask::ACTION | EventMask::DROP_TARGET);
                }
                element
            });
        leaf.prop_recursive(3, 24, 4, |inner| {
            (inner.clone(), prop::collection::vec(inner, 0..4)).prop_map(|(mut parent, children)| {
                parent.children = children;
                parent
            })
        })
    }

    proptest! {
        #[test]
        fn test_round_trip(element in arb_element()) {
            let markup = to_string(&element).unwrap();
            let read = from_str(&markup).unwrap();
            prop_assert_eq!(read.normalized(), element.normalized());
        }
    }
}
