//! Preference XML decoder
//!
//! The document is first read into a plain element tree, then walked against
//! the schema. Child configuration is looked up depth-first over the whole
//! schema subtree of the parent; elements with no configuration are kept with
//! every attribute so nothing is lost silently.

use crate::config::compile_time::decoders::MAX_XML_DEPTH;
use crate::config::schema::{ChildConfig, FileSchema, SchemaNode};
use crate::error::DecodeError;
use crate::text::decode_text;
use crate::tree::{DecodedTree, Node, Tree};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const FORMAT: &str = "XML";

#[derive(Debug, Default)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn count_children(&self, tag: &str) -> usize {
        self.children.iter().filter(|c| c.tag == tag).count()
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, DecodeError> {
    let mut element = Element {
        tag: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Element::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(DecodeError::malformed(FORMAT, "multiple root elements")),
    }
    Ok(())
}

fn parse_document(text: &str) -> Result<Element, DecodeError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.len() >= MAX_XML_DEPTH {
                    return Err(DecodeError::Limit {
                        format: FORMAT,
                        what: format!("nesting deeper than {}", MAX_XML_DEPTH),
                    });
                }
                stack.push(start_element(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = start_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DecodeError::malformed(FORMAT, "unbalanced end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| DecodeError::malformed(FORMAT, e.to_string()))?;
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DecodeError::malformed(
                    FORMAT,
                    format!("at byte {}: {}", reader.buffer_position(), e),
                ))
            }
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::malformed(FORMAT, "unclosed element"));
    }
    root.ok_or_else(|| DecodeError::malformed(FORMAT, "no root element"))
}

fn convert(element: &Element, config: &SchemaNode) -> Node {
    let mut data = Tree::new();

    match config.attribute_whitelist() {
        Some(whitelist) => {
            for name in whitelist {
                if let Some(value) = element.attribute(name) {
                    data.insert(name.clone(), Node::text(value));
                }
            }
        }
        None => {
            for (name, value) in &element.attributes {
                data.insert(name.clone(), Node::text(value.as_str()));
            }
        }
    }

    let text = element.text.trim();
    if element.children.is_empty() && !text.is_empty() {
        return Node::text(text);
    }

    let permissive = SchemaNode::permissive();
    for child in &element.children {
        let child_config = match config.child_config(&child.tag) {
            ChildConfig::Included(node) => node,
            ChildConfig::NotFound => &permissive,
            ChildConfig::Excluded => continue,
        };
        let value = convert(child, child_config);

        if element.count_children(&child.tag) > 1 {
            let slot = data
                .entry(child.tag.clone())
                .or_insert_with(|| Node::List(Vec::new()));
            if let Node::List(items) = slot {
                items.push(value);
            }
        } else {
            data.insert(child.tag.clone(), value);
        }
    }

    Node::Tree(data)
}

/// Decode a preference XML document into `{file_name: tree}`
pub fn decode(
    bytes: &[u8],
    file_name: &str,
    schema: &FileSchema,
) -> Result<Option<DecodedTree>, DecodeError> {
    let decoded = decode_text(bytes);
    let root = parse_document(&decoded.text)?;

    let config = match schema.xml_root(&root.tag) {
        ChildConfig::Included(node) => node,
        ChildConfig::NotFound | ChildConfig::Excluded => return Ok(None),
    };

    let body = convert(&root, config);
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(DecodedTree::new(file_name, body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const GROUPS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Groups clsid="{3125E937-EB16-4b4c-9934-544FC6D24D26}">
  <Group clsid="{6D4A79E4-529C-4481-ABD0-F5BD7EA93BA7}" name="Administrators (built-in)" uid="{A}">
    <Properties action="U" newName="" description="" deleteAllUsers="0" deleteAllGroups="0" removeAccounts="0" groupSid="S-1-5-32-544" groupName="Administrators (built-in)">
      <Members>
        <Member name="CORP\helpdesk" action="ADD" sid="S-1-5-21-1-2-3-1105"/>
        <Member name="%computername%\svc" action="ADD" sid=""/>
      </Members>
    </Properties>
    <Filters><FilterComputer bool="AND" not="0" type="NETBIOS" name="WS01"/></Filters>
  </Group>
  <User clsid="{DF5F1855-51E5-4d24-8B1A-D9BDE98BA1D1}" name="localadmin" uid="{B}">
    <Properties action="U" cpassword="j1Uyj3Vx8TY9LtLZil2uAuZkFQA/4latT76ZwgdHdhw" userName="localadmin" secret="dropped"/>
  </User>
</Groups>"#;

    fn schema() -> FileSchema {
        FileSchema::builtin().unwrap()
    }

    #[test]
    fn test_groups_document() {
        let tree = decode(GROUPS_XML.as_bytes(), "Groups.xml", &schema())
            .unwrap()
            .unwrap();
        assert_eq!(tree.label, "Groups.xml");

        let group = tree.body.get("Group").unwrap();
        let props = group.get("Properties").unwrap();
        assert_eq!(props.get_str("groupSid"), Some("S-1-5-32-544"));

        let members = props.get("Members").unwrap().get("Member").unwrap();
        assert_matches!(members, Node::List(items) if items.len() == 2);

        // Unknown elements are captured with every attribute
        let filter = group.get("Filters").unwrap().get("FilterComputer").unwrap();
        assert_eq!(filter.get_str("name"), Some("WS01"));
    }

    #[test]
    fn test_attribute_whitelist_applies() {
        let tree = decode(GROUPS_XML.as_bytes(), "Groups.xml", &schema())
            .unwrap()
            .unwrap();
        let props = tree.body.get("User").unwrap().get("Properties").unwrap();
        assert!(props.get("cpassword").is_some());
        assert!(props.get("secret").is_none());
    }

    #[test]
    fn test_unknown_root_is_no_data() {
        let doc = r#"<Shortcuts clsid="x"><Shortcut name="a"/></Shortcuts>"#;
        assert_matches!(decode(doc.as_bytes(), "Shortcuts.xml", &schema()), Ok(None));
    }

    #[test]
    fn test_excluded_child_is_dropped() {
        let schema = FileSchema::from_toml_str(
            r#"
policy_files = []
[xml.Root]
include = true
[xml.Root.elements.Hidden]
attributes = ["a"]
"#,
        )
        .unwrap();
        let doc = r#"<Root><Hidden a="1"/><Shown b="2"/></Root>"#;
        let tree = decode(doc.as_bytes(), "x.xml", &schema).unwrap().unwrap();
        assert!(tree.body.get("Hidden").is_none());
        assert_eq!(tree.body.get("Shown").unwrap().get_str("b"), Some("2"));
    }

    #[test]
    fn test_text_only_element_collapses_to_scalar() {
        let schema = FileSchema::from_toml_str("policy_files = []\n[xml.Root]\ninclude = true\n").unwrap();
        let doc = "<Root><Command>\n  cmd.exe /c whoami\n</Command></Root>";
        let tree = decode(doc.as_bytes(), "x.xml", &schema).unwrap().unwrap();
        assert_eq!(tree.body.get("Command"), Some(&Node::text("cmd.exe /c whoami")));
    }

    #[test]
    fn test_empty_result_is_no_data() {
        let schema = FileSchema::from_toml_str(
            "policy_files = []\n[xml.Root]\ninclude = true\nattributes = [\"keep\"]\n",
        )
        .unwrap();
        assert_matches!(decode(b"<Root other=\"1\"/>", "x.xml", &schema), Ok(None));
    }

    #[test]
    fn test_malformed_document_is_error() {
        let result = decode(b"<Groups><Group></Groups>", "Groups.xml", &schema());
        assert_matches!(result, Err(DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_utf16_document() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in r#"<Groups clsid="c"/>"#.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let tree = decode(&bytes, "Groups.xml", &schema()).unwrap().unwrap();
        assert_eq!(tree.body.get_str("clsid"), Some("c"));
    }
}
