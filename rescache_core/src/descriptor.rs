//! Resource descriptors.
//!
//! A descriptor is the immutable declaration of one resource parsed from an
//! index document:
//!
//! ```json
//! { "Name": "Grass", "Source": "LocalData", "Data": "images/grass.png" }
//! ```
//!
//! `Source` is optional and defaults to `LocalData`. `Data` is a logical path
//! for `LocalData`, a URL for `ExternalData` and an inline object for
//! `DirectData`.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DescriptorError;

/// Names starting with this character are reserved by the engine.
pub const RESERVED_SIGIL: char = '+';

/// Name under which every container exposes its fallback instance.
pub const DEFAULT_NAME: &str = "Default";

pub const NAME_KEY: &str = "Name";
pub const SOURCE_KEY: &str = "Source";
pub const DATA_KEY: &str = "Data";

const LOCAL_DATA: &str = "LocalData";
const EXTERNAL_DATA: &str = "ExternalData";
const DIRECT_DATA: &str = "DirectData";

/// Where the payload of a resource comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayloadSource {
    /// Structured data embedded in the descriptor.
    Inline(Value),
    /// Logical path resolved against the data directories.
    FileRef(String),
    /// Remote location.
    RemoteRef(String),
}

impl PayloadSource {
    /// Source type keyword as written in index documents.
    pub fn source_type(&self) -> &'static str {
        match self {
            PayloadSource::Inline(_) => DIRECT_DATA,
            PayloadSource::FileRef(_) => LOCAL_DATA,
            PayloadSource::RemoteRef(_) => EXTERNAL_DATA,
        }
    }
}

/// Immutable declaration of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    name: String,
    source: PayloadSource,
}

impl Descriptor {
    /// Builds a descriptor, validating the name.
    pub fn new(name: impl Into<String>, source: PayloadSource) -> Result<Self, DescriptorError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, source })
    }

    /// Parses a resource definition object.
    pub fn parse(definition: &Value) -> Result<Self, DescriptorError> {
        let object = definition.as_object().ok_or(DescriptorError::NotAnObject)?;

        let name = object
            .get(NAME_KEY)
            .ok_or(DescriptorError::MissingName)?
            .as_str()
            .ok_or(DescriptorError::NameNotString)?;

        let source_type = match object.get(SOURCE_KEY) {
            None => LOCAL_DATA,
            Some(Value::String(s)) => s.as_str(),
            Some(other) => return Err(DescriptorError::UnknownSource(other.to_string())),
        };

        let data = object.get(DATA_KEY).ok_or(DescriptorError::MissingData)?;

        let source = match source_type {
            LOCAL_DATA => {
                let path = data.as_str().ok_or(DescriptorError::InvalidData {
                    source_type: LOCAL_DATA,
                    expected: "a file path string",
                })?;
                PayloadSource::FileRef(path.replace('\\', "/"))
            }
            EXTERNAL_DATA => {
                let url = data.as_str().ok_or(DescriptorError::InvalidData {
                    source_type: EXTERNAL_DATA,
                    expected: "a URL string",
                })?;
                if !is_url(url) {
                    return Err(DescriptorError::InvalidUrl(url.to_string()));
                }
                PayloadSource::RemoteRef(url.to_string())
            }
            DIRECT_DATA => {
                if !data.is_object() {
                    return Err(DescriptorError::InvalidData {
                        source_type: DIRECT_DATA,
                        expected: "a JSON object",
                    });
                }
                PayloadSource::Inline(data.clone())
            }
            other => return Err(DescriptorError::UnknownSource(other.to_string())),
        };

        Self::new(name, source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &PayloadSource {
        &self.source
    }
}

fn validate_name(name: &str) -> Result<(), DescriptorError> {
    if name.is_empty() {
        return Err(DescriptorError::EmptyName);
    }
    if name.starts_with(RESERVED_SIGIL) {
        return Err(DescriptorError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Accepts `scheme://rest` with an alphabetic-led scheme and a non-empty rest.
fn is_url(candidate: &str) -> bool {
    let Some((scheme, rest)) = candidate.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let leads_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    leads_with_letter
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
}

/// Derives a resource name from a file located under a store directory.
///
/// `data/Images/terrain/grass.png` under store `Images` gives
/// `terrain/grass`. Returns `None` when the path is not inside the store.
pub fn resource_name_from_path(path: &Path, store: &str) -> Option<String> {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    let store_index = components.iter().rposition(|part| *part == store)?;
    let relative = &components[store_index + 1..];
    let (file, dirs) = relative.split_last()?;
    let stem = Path::new(file).file_stem()?.to_str()?;

    let mut name = dirs.join("/");
    if !name.is_empty() {
        name.push('/');
    }
    name.push_str(stem);
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_local_data_by_default() {
        let d = Descriptor::parse(&json!({"Name": "Grass", "Data": "images/grass.png"})).unwrap();
        assert_eq!(d.name(), "Grass");
        assert_eq!(d.source(), &PayloadSource::FileRef("images/grass.png".into()));
    }

    #[test]
    fn parses_every_source_type() {
        let inline = Descriptor::parse(&json!({
            "Name": "Red", "Source": "DirectData", "Data": {"Color": [1, 0, 0, 1]}
        }))
        .unwrap();
        assert!(matches!(inline.source(), PayloadSource::Inline(v) if v["Color"][0] == 1));

        let remote = Descriptor::parse(&json!({
            "Name": "Far", "Source": "ExternalData", "Data": "https://cdn.example.com/far.png"
        }))
        .unwrap();
        assert_eq!(remote.source().source_type(), "ExternalData");
    }

    #[test]
    fn backslashes_are_normalized() {
        let d = Descriptor::parse(&json!({"Name": "Rock", "Data": "images\\rock.png"})).unwrap();
        assert_eq!(d.source(), &PayloadSource::FileRef("images/rock.png".into()));
    }

    #[test]
    fn rejects_reserved_and_empty_names() {
        assert_eq!(
            Descriptor::parse(&json!({"Name": "+Engine", "Data": "x"})),
            Err(DescriptorError::ReservedName("+Engine".into()))
        );
        assert_eq!(
            Descriptor::parse(&json!({"Name": "", "Data": "x"})),
            Err(DescriptorError::EmptyName)
        );
        assert_eq!(
            Descriptor::new("+Built", PayloadSource::FileRef("a".into())),
            Err(DescriptorError::ReservedName("+Built".into()))
        );
    }

    #[test]
    fn rejects_malformed_definitions() {
        assert_eq!(Descriptor::parse(&json!([1, 2])), Err(DescriptorError::NotAnObject));
        assert_eq!(
            Descriptor::parse(&json!({"Data": "x"})),
            Err(DescriptorError::MissingName)
        );
        assert_eq!(
            Descriptor::parse(&json!({"Name": 12, "Data": "x"})),
            Err(DescriptorError::NameNotString)
        );
        assert_eq!(
            Descriptor::parse(&json!({"Name": "A"})),
            Err(DescriptorError::MissingData)
        );
        assert_eq!(
            Descriptor::parse(&json!({"Name": "A", "Source": "Carrier", "Data": "x"})),
            Err(DescriptorError::UnknownSource("Carrier".into()))
        );
        assert!(matches!(
            Descriptor::parse(&json!({"Name": "A", "Source": "DirectData", "Data": "x"})),
            Err(DescriptorError::InvalidData { .. })
        ));
        assert_eq!(
            Descriptor::parse(&json!({"Name": "A", "Source": "ExternalData", "Data": "nowhere"})),
            Err(DescriptorError::InvalidUrl("nowhere".into()))
        );
    }

    #[test]
    fn url_check() {
        assert!(is_url("http://example.com/a.wav"));
        assert!(is_url("s3+https://bucket/key"));
        assert!(!is_url("://missing-scheme"));
        assert!(!is_url("1ftp://host"));
        assert!(!is_url("https://"));
    }

    #[test]
    fn name_from_path() {
        assert_eq!(
            resource_name_from_path(Path::new("data/Images/terrain/grass.png"), "Images"),
            Some("terrain/grass".to_string())
        );
        assert_eq!(
            resource_name_from_path(Path::new("/opt/game/Sounds/step.wav"), "Sounds"),
            Some("step".to_string())
        );
        assert_eq!(resource_name_from_path(Path::new("data/Sounds/step.wav"), "Images"), None);
        assert_eq!(resource_name_from_path(Path::new("data/Images"), "Images"), None);
    }
}
