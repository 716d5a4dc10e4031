use crate::error::{Result, WeaveError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use tracing::debug;

/// Extract the package identifier from an AndroidManifest.xml.
///
/// Only the root `manifest` element's `package` attribute is consulted.
pub fn package_from_manifest(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        WeaveError::Configuration(format!(
            "failed to read manifest {}: {}",
            path.display(),
            e
        ))
    })?;
    package_from_manifest_text(&contents).ok_or_else(|| {
        WeaveError::Configuration(format!(
            "manifest {} declares no package attribute",
            path.display()
        ))
    })
}

fn package_from_manifest_text(contents: &str) -> Option<String> {
    let mut reader = Reader::from_str(contents);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"manifest" {
                    for attr in e.attributes().filter_map(|a| a.ok()) {
                        if attr.key.as_ref() == b"package" {
                            return Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                    // Root element seen without the attribute; nothing
                    // further in the document can supply it.
                    return None;
                }
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                debug!("Error parsing manifest: {:?}", e);
                return None;
            }
            _ => {}
        }
        buf.clear();
    }
}
