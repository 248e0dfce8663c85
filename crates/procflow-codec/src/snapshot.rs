//! Instance snapshot wire format.
//!
//! ```xml
//! <processInstance id="…" processDefinitionId="…" currentActivityId="…">
//!   <artifacts>
//!     <artifact id="…" name="…" contentType="…" artifactDefinitionId="…"
//!               creationDate="1700000000000" commitDate="0">
//!       <content><![CDATA[<value>true</value>]]></content>
//!       <shares>
//!         <share key="site" value="north-01"/>
//!       </shares>
//!     </artifact>
//!   </artifacts>
//! </processInstance>
//! ```
//!
//! Content that is not valid UTF-8, or that would terminate a CDATA section,
//! is written as base64 text with `encoding="base64"` on the `content` element.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, warn};

use crate::artifact::{Artifact, SharedPair};
use crate::error::CodecError;

const TAG_PROCESS_INSTANCE: &[u8] = b"processInstance";
const TAG_ARTIFACTS: &str = "artifacts";
const TAG_ARTIFACT: &[u8] = b"artifact";
const TAG_CONTENT: &[u8] = b"content";
const TAG_SHARES: &str = "shares";
const TAG_SHARE: &[u8] = b"share";

const ATTR_ID: &str = "id";
const ATTR_NAME: &str = "name";
const ATTR_CONTENT_TYPE: &str = "contentType";
const ATTR_ARTIFACT_DEFINITION_ID: &str = "artifactDefinitionId";
const ATTR_CREATION_DATE: &str = "creationDate";
const ATTR_COMMIT_DATE: &str = "commitDate";
const ATTR_PROCESS_DEFINITION_ID: &str = "processDefinitionId";
const ATTR_CURRENT_ACTIVITY_ID: &str = "currentActivityId";
const ATTR_ENCODING: &str = "encoding";
const ATTR_KEY: &str = "key";
const ATTR_VALUE: &str = "value";

const ENCODING_BASE64: &str = "base64";

/// Share key marking an artifact whose activity is no longer on the instance's path
pub const INTERRUPTED_SHARE_KEY: &str = "__interrupted__";

/// Instance-level attributes carried on the root element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Process instance id
    pub instance_id: String,
    /// Process definition id
    pub process_definition_id: String,
    /// Activity the instance was positioned at when encoded
    pub current_activity_id: String,
}

/// One persisted artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Artifact definition the artifact answers
    pub artifact_definition_id: String,
    /// The artifact itself
    pub artifact: Artifact,
    /// Whether the owning activity had dropped off the instance's path
    pub interrupted: bool,
}

/// Full artifact history of one instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSnapshot {
    /// Root attributes
    pub header: SnapshotHeader,
    /// Entries in activity enumeration order
    pub entries: Vec<ArtifactEntry>,
}

/// An artifact entry that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Zero-based position of the entry in the document
    pub index: usize,
    /// Why it was skipped
    pub reason: String,
}

/// Result of a tolerant decode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSnapshot {
    /// Root attributes, if the root element was found
    pub header: Option<SnapshotHeader>,
    /// Entries that decoded cleanly
    pub entries: Vec<ArtifactEntry>,
    /// Entries that were dropped
    pub skipped: Vec<SkippedEntry>,
    /// Set when the document broke off outside of any artifact entry
    pub truncated: Option<String>,
}

/// Serialize a snapshot into the wire format
pub fn encode_snapshot(snapshot: &InstanceSnapshot) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new(Vec::new());

    let mut root = BytesStart::new("processInstance");
    root.push_attribute((ATTR_ID, snapshot.header.instance_id.as_str()));
    root.push_attribute((
        ATTR_PROCESS_DEFINITION_ID,
        snapshot.header.process_definition_id.as_str(),
    ));
    root.push_attribute((
        ATTR_CURRENT_ACTIVITY_ID,
        snapshot.header.current_activity_id.as_str(),
    ));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new(TAG_ARTIFACTS)))?;

    for entry in &snapshot.entries {
        write_entry(&mut writer, entry)?;
    }

    writer.write_event(Event::End(BytesEnd::new(TAG_ARTIFACTS)))?;
    writer.write_event(Event::End(BytesEnd::new("processInstance")))?;

    Ok(writer.into_inner())
}

fn write_entry(writer: &mut Writer<Vec<u8>>, entry: &ArtifactEntry) -> Result<(), CodecError> {
    let artifact = &entry.artifact;
    let creation_date = artifact.creation_date.to_string();
    let commit_date = artifact.commit_date.to_string();

    let mut start = BytesStart::new("artifact");
    start.push_attribute((ATTR_ID, artifact.id.as_str()));
    start.push_attribute((ATTR_NAME, artifact.name.as_str()));
    start.push_attribute((ATTR_CONTENT_TYPE, artifact.content_type.as_str()));
    start.push_attribute((ATTR_ARTIFACT_DEFINITION_ID, entry.artifact_definition_id.as_str()));
    start.push_attribute((ATTR_CREATION_DATE, creation_date.as_str()));
    start.push_attribute((ATTR_COMMIT_DATE, commit_date.as_str()));
    writer.write_event(Event::Start(start))?;

    match std::str::from_utf8(&artifact.content) {
        Ok(text) if !text.contains("]]>") => {
            writer.write_event(Event::Start(BytesStart::new("content")))?;
            writer.write_event(Event::CData(BytesCData::new(text)))?;
        }
        _ => {
            let mut content = BytesStart::new("content");
            content.push_attribute((ATTR_ENCODING, ENCODING_BASE64));
            writer.write_event(Event::Start(content))?;
            let encoded = STANDARD.encode(&artifact.content);
            writer.write_event(Event::Text(BytesText::new(&encoded)))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("content")))?;

    let already_marked = artifact
        .shared_information
        .iter()
        .any(|pair| pair.key == INTERRUPTED_SHARE_KEY);
    let mark_interrupted = entry.interrupted && !already_marked;

    if !artifact.shared_information.is_empty() || mark_interrupted {
        writer.write_event(Event::Start(BytesStart::new(TAG_SHARES)))?;
        for pair in &artifact.shared_information {
            write_share(writer, &pair.key, &pair.value)?;
        }
        if mark_interrupted {
            write_share(writer, INTERRUPTED_SHARE_KEY, "true")?;
        }
        writer.write_event(Event::End(BytesEnd::new(TAG_SHARES)))?;
    }

    writer.write_event(Event::End(BytesEnd::new("artifact")))?;
    Ok(())
}

fn write_share(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<(), CodecError> {
    let mut share = BytesStart::new("share");
    share.push_attribute((ATTR_KEY, key));
    share.push_attribute((ATTR_VALUE, value));
    writer.write_event(Event::Empty(share))?;
    Ok(())
}

/// Artifact entry being assembled while its element is open
#[derive(Default)]
struct PendingEntry {
    attributes: HashMap<String, String>,
    content: Option<Vec<u8>>,
    base64: bool,
    shares: Vec<SharedPair>,
    error: Option<String>,
}

impl PendingEntry {
    fn open(start: &BytesStart<'_>) -> Self {
        let mut pending = PendingEntry::default();
        match read_attributes(start) {
            Ok(attributes) => pending.attributes = attributes,
            Err(err) => pending.fail(err.to_string()),
        }
        pending
    }

    fn fail(&mut self, reason: String) {
        if self.error.is_none() {
            self.error = Some(reason);
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn date(&self, name: &str) -> Result<i64, String> {
        match self.attribute(name) {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("attribute '{}' is not epoch millis ('{}'): {}", name, raw, e)),
        }
    }

    fn finish(self) -> Result<ArtifactEntry, String> {
        if let Some(reason) = self.error {
            return Err(reason);
        }

        let artifact_definition_id = match self.attribute(ATTR_ARTIFACT_DEFINITION_ID) {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => return Err(format!("missing attribute '{}'", ATTR_ARTIFACT_DEFINITION_ID)),
        };
        let creation_date = self.date(ATTR_CREATION_DATE)?;
        let commit_date = self.date(ATTR_COMMIT_DATE)?;

        let raw_content = self.content.clone().unwrap_or_default();
        let content = if self.base64 {
            let text = String::from_utf8(raw_content)
                .map_err(|e| format!("base64 content is not text: {}", e))?;
            STANDARD
                .decode(text.trim())
                .map_err(|e| format!("base64 content undecodable: {}", e))?
        } else {
            raw_content
        };

        let mut interrupted = false;
        let shared_information = self
            .shares
            .into_iter()
            .filter(|pair| {
                if pair.key == INTERRUPTED_SHARE_KEY {
                    interrupted |= pair.value == "true";
                    false
                } else {
                    true
                }
            })
            .collect();

        let artifact = Artifact {
            id: self.attributes.get(ATTR_ID).cloned().unwrap_or_default(),
            name: self.attributes.get(ATTR_NAME).cloned().unwrap_or_default(),
            content_type: self
                .attributes
                .get(ATTR_CONTENT_TYPE)
                .cloned()
                .unwrap_or_default(),
            content,
            shared_information,
            creation_date,
            commit_date,
        };

        Ok(ArtifactEntry {
            artifact_definition_id,
            artifact,
            interrupted,
        })
    }
}

fn read_attributes(start: &BytesStart<'_>) -> Result<HashMap<String, String>, CodecError> {
    let mut attributes = HashMap::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn read_header(start: &BytesStart<'_>) -> SnapshotHeader {
    let attributes = read_attributes(start).unwrap_or_else(|err| {
        warn!(error = %err, "Snapshot root attributes unreadable");
        HashMap::new()
    });
    SnapshotHeader {
        instance_id: attributes.get(ATTR_ID).cloned().unwrap_or_default(),
        process_definition_id: attributes
            .get(ATTR_PROCESS_DEFINITION_ID)
            .cloned()
            .unwrap_or_default(),
        current_activity_id: attributes
            .get(ATTR_CURRENT_ACTIVITY_ID)
            .cloned()
            .unwrap_or_default(),
    }
}

fn read_share(start: &BytesStart<'_>) -> Result<SharedPair, CodecError> {
    let attributes = read_attributes(start)?;
    Ok(SharedPair {
        key: attributes.get(ATTR_KEY).cloned().unwrap_or_default(),
        value: attributes.get(ATTR_VALUE).cloned().unwrap_or_default(),
    })
}

/// Decode a snapshot, keeping every entry that can be read.
///
/// A malformed entry is recorded in [`DecodedSnapshot::skipped`] and decoding
/// continues with the next one. When the XML itself breaks inside an entry,
/// the reader resumes at the next `<artifact` element. If no later entry
/// exists, the entries read so far are kept.
pub fn decode_snapshot(bytes: &[u8]) -> DecodedSnapshot {
    let mut decoded = DecodedSnapshot::default();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return decoded;
    }

    let mut reader = reader_at(bytes);
    let mut base = 0usize;

    let mut buf = Vec::new();
    let mut index = 0usize;
    let mut pending: Option<PendingEntry> = None;
    let mut in_content = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            // A resumed reader never saw the enclosing start tags
            Err(quick_xml::Error::EndEventMismatch { .. }) if base > 0 && pending.is_none() => {
                continue;
            }
            Err(err) => {
                let position = base + reader.buffer_position();
                let reason = format!("document unreadable at byte {}: {}", position, err);
                let resume = next_artifact_start(bytes, position.max(base + 1));

                if pending.take().is_some() {
                    warn!(index, %reason, "Skipping artifact entry");
                    decoded.skipped.push(SkippedEntry { index, reason });
                    index += 1;
                } else if resume.is_none() {
                    warn!(%reason, "Snapshot truncated");
                    decoded.truncated = Some(reason);
                }

                match resume {
                    Some(offset) => {
                        debug!(offset, "Resuming snapshot decode at next artifact");
                        base = offset;
                        reader = reader_at(&bytes[offset..]);
                        in_content = false;
                        continue;
                    }
                    None => break,
                }
            }
        };

        match event {
            Event::Start(start) => {
                let name = start.name();
                match name.as_ref() {
                    TAG_PROCESS_INSTANCE => decoded.header = Some(read_header(&start)),
                    TAG_ARTIFACT => {
                        if pending.replace(PendingEntry::open(&start)).is_some() {
                            decoded.skipped.push(SkippedEntry {
                                index,
                                reason: "artifact element not closed".to_string(),
                            });
                            index += 1;
                        }
                    }
                    TAG_CONTENT => {
                        if let Some(entry) = pending.as_mut() {
                            in_content = true;
                            entry.content = Some(Vec::new());
                            match read_attributes(&start) {
                                Ok(attributes) => {
                                    entry.base64 = attributes
                                        .get(ATTR_ENCODING)
                                        .map(|e| e == ENCODING_BASE64)
                                        .unwrap_or(false);
                                }
                                Err(err) => entry.fail(err.to_string()),
                            }
                        }
                    }
                    TAG_SHARE => {
                        if let Some(entry) = pending.as_mut() {
                            match read_share(&start) {
                                Ok(pair) => entry.shares.push(pair),
                                Err(err) => entry.fail(err.to_string()),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(start) => {
                let name = start.name();
                match name.as_ref() {
                    TAG_PROCESS_INSTANCE => decoded.header = Some(read_header(&start)),
                    TAG_ARTIFACT => {
                        finish_entry(&mut decoded, PendingEntry::open(&start), index);
                        index += 1;
                    }
                    TAG_CONTENT => {
                        if let Some(entry) = pending.as_mut() {
                            entry.content = Some(Vec::new());
                        }
                    }
                    TAG_SHARE => {
                        if let Some(entry) = pending.as_mut() {
                            match read_share(&start) {
                                Ok(pair) => entry.shares.push(pair),
                                Err(err) => entry.fail(err.to_string()),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::CData(cdata) if in_content => {
                if let Some(entry) = pending.as_mut() {
                    let raw = cdata.into_inner();
                    entry
                        .content
                        .get_or_insert_with(Vec::new)
                        .extend_from_slice(&raw);
                }
            }
            Event::Text(text) if in_content => {
                if let Some(entry) = pending.as_mut() {
                    match text.unescape() {
                        Ok(text) => entry
                            .content
                            .get_or_insert_with(Vec::new)
                            .extend_from_slice(text.as_bytes()),
                        Err(err) => entry.fail(err.to_string()),
                    }
                }
            }
            Event::End(end) => {
                let name = end.name();
                match name.as_ref() {
                    TAG_CONTENT => in_content = false,
                    TAG_ARTIFACT => {
                        if let Some(entry) = pending.take() {
                            finish_entry(&mut decoded, entry, index);
                            index += 1;
                        }
                        in_content = false;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if pending.is_some() {
        decoded.skipped.push(SkippedEntry {
            index,
            reason: "artifact element not closed".to_string(),
        });
    }

    debug!(
        decoded = decoded.entries.len(),
        skipped = decoded.skipped.len(),
        "Decoded instance snapshot"
    );
    decoded
}

fn reader_at(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    reader
}

/// Offset of the next `<artifact` start tag at or after `from`
fn next_artifact_start(bytes: &[u8], from: usize) -> Option<usize> {
    let open = [b"<".as_slice(), TAG_ARTIFACT].concat();
    bytes
        .get(from..)?
        .windows(open.len() + 1)
        .position(|window| {
            window.starts_with(&open)
                && matches!(window[open.len()], b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/')
        })
        .map(|offset| from + offset)
}

fn finish_entry(decoded: &mut DecodedSnapshot, entry: PendingEntry, index: usize) {
    match entry.finish() {
        Ok(entry) => decoded.entries.push(entry),
        Err(reason) => {
            warn!(index, %reason, "Skipping malformed artifact entry");
            decoded.skipped.push(SkippedEntry { index, reason });
        }
    }
}
