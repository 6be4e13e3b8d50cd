//! Scenario and save-game XML
//!
//! Conditions, listeners and the event queue are persisted as small XML
//! fragments. This module provides a minimal element tree on top of
//! quick-xml plus the typed attribute accessors the loaders share.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::{Result, TriggerError};

fn xml_err<E: Display>(e: E) -> TriggerError {
    TriggerError::Xml(e.to_string())
}

/// One XML element with its attributes, text and child elements
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Builder form of [`XmlElement::set_text`]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attr(key).is_some()
    }

    /// Set an attribute, replacing an existing value
    pub fn set_attr(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Builder form of [`XmlElement::set_attr`]
    pub fn with_attr(mut self, key: &str, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attributes.retain(|(k, _)| k != key);
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// Direct children with the given tag name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn require_child(&self, name: &str) -> Result<&XmlElement> {
        self.child(name)
            .ok_or_else(|| TriggerError::missing_element(&self.name, name))
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Builder form of [`XmlElement::push_child`]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_child(child);
        self
    }

    pub fn require_attr(&self, key: &str) -> Result<&str> {
        self.attr(key)
            .ok_or_else(|| TriggerError::missing_attribute(&self.name, key))
    }

    /// Parse a required attribute
    pub fn parse_attr<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.require_attr(key)?;
        raw.trim()
            .parse()
            .map_err(|_| TriggerError::invalid_attribute(&self.name, key, raw))
    }

    /// Parse an optional attribute, falling back to `default` when absent
    pub fn parse_attr_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        if self.has_attr(key) {
            self.parse_attr(key)
        } else {
            Ok(default)
        }
    }

    /// Parse a required boolean attribute (`0`, `1`, `true` or `false`)
    pub fn bool_attr(&self, key: &str) -> Result<bool> {
        let raw = self.require_attr(key)?;
        parse_bool(raw).ok_or_else(|| TriggerError::invalid_attribute(&self.name, key, raw))
    }

    pub fn bool_attr_or(&self, key: &str, default: bool) -> Result<bool> {
        if self.has_attr(key) {
            self.bool_attr(key)
        } else {
            Ok(default)
        }
    }

    /// Parse a document and return its root element
    pub fn parse(text: &str) -> Result<XmlElement> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event().map_err(xml_err)? {
                XmlEvent::Start(start) => stack.push(element_from_start(&start)?),
                XmlEvent::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                XmlEvent::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| TriggerError::Xml("unexpected end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                XmlEvent::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape().map_err(xml_err)?);
                    }
                }
                XmlEvent::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                XmlEvent::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(TriggerError::Xml(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| TriggerError::Xml("document has no root element".to_string()))
    }

    /// Serialize this element (and its subtree) as an indented document
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(xml_err)
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            writer.write_event(XmlEvent::Empty(start)).map_err(xml_err)?;
            return Ok(());
        }

        writer.write_event(XmlEvent::Start(start)).map_err(xml_err)?;
        if !self.text.is_empty() {
            writer
                .write_event(XmlEvent::Text(BytesText::new(&self.text)))
                .map_err(xml_err)?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(XmlEvent::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_err)?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(TriggerError::Xml("document has more than one root element".to_string()));
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Mapping between player identities and their position in the player list
///
/// Persisted events store a player *index*; this table translates at both
/// save and load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerMap {
    ids: Vec<u32>,
}

impl PlayerMap {
    /// Build a table from player identities in list order
    pub fn new(ids: Vec<u32>) -> Self {
        Self { ids }
    }

    pub fn index_of(&self, player_id: u32) -> Option<usize> {
        self.ids.iter().position(|&id| id == player_id)
    }

    pub fn id_at(&self, index: usize) -> Option<u32> {
        self.ids.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Everything loaders and savers need besides the element itself
#[derive(Debug, Clone, Copy)]
pub struct XmlContext<'a> {
    pub players: &'a PlayerMap,
    pub config: &'a EngineConfig,
}

impl<'a> XmlContext<'a> {
    pub fn new(players: &'a PlayerMap, config: &'a EngineConfig) -> Self {
        Self { players, config }
    }
}
