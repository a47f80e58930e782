//! Media-type registry adapter.
//!
//! The registry is one large XML document. It is parsed while it downloads,
//! keeping only the current registry and record state in memory.

use async_trait::async_trait;
use futures::TryStreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use refdata_shared::{EntryCore, LabelMap, ReferenceEntry, VocabularyTerm};
use tokio::io::AsyncBufRead;
use tokio_util::io::StreamReader;
use tracing::{error, info, instrument};

use super::retry::{retry, RetryPolicy};
use super::{attribute, SourceAdapter};
use crate::catalog::{DataTypeConfig, SourceKind};
use crate::errors::PipelineError;

/// Registries whose records become media types.
pub const ALLOWED_REGISTRIES: [&str; 9] = [
    "application",
    "audio",
    "font",
    "image",
    "message",
    "model",
    "multipart",
    "text",
    "video",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Name,
    FileTemplate,
}

/// Record state, reset on every `record` end tag.
#[derive(Default)]
struct RecordState {
    name: Option<String>,
    file: Option<String>,
}

impl RecordState {
    fn code(&self, registry: &str) -> Option<String> {
        if let Some(file) = self.file.as_deref() {
            return Some(if file.contains('/') {
                file.to_string()
            } else {
                format!("{}/{}", registry, file)
            });
        }
        self.name
            .as_deref()
            .map(|name| format!("{}/{}", registry, name))
    }
}

/// Read media-type codes from a registry document.
///
/// Records outside the allowed registries, and records with neither a
/// name nor a file template, produce nothing.
pub async fn parse_media_types<R>(input: R) -> Result<Vec<String>, quick_xml::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut codes = Vec::new();
    // One slot per open registry element; `Some` only for allowed ones.
    let mut registries: Vec<Option<String>> = Vec::new();
    let mut record = RecordState::default();
    let mut capture = Capture::None;
    let mut text = String::new();

    loop {
        match reader.read_event_into_async(&mut buf).await? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"registry" => {
                    let id = attribute(&e, b"id")?
                        .filter(|id| ALLOWED_REGISTRIES.contains(&id.as_str()));
                    registries.push(id);
                }
                b"name" if registries.last().is_some_and(Option::is_some) => {
                    capture = Capture::Name;
                    text.clear();
                }
                b"file" if registries.last().is_some_and(Option::is_some) => {
                    if attribute(&e, b"type")?.as_deref() == Some("template") {
                        capture = Capture::FileTemplate;
                        text.clear();
                    }
                }
                _ => {}
            },
            Event::Text(te) if capture != Capture::None => {
                text.push_str(&te.unescape()?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"registry" => {
                    registries.pop();
                }
                b"name" | b"file" if capture != Capture::None => {
                    let value = text.trim();
                    if !value.is_empty() {
                        match capture {
                            Capture::Name => record.name = Some(value.to_string()),
                            Capture::FileTemplate => record.file = Some(value.to_string()),
                            Capture::None => {}
                        }
                    }
                    capture = Capture::None;
                }
                b"record" => {
                    if let Some(Some(registry)) = registries.last() {
                        if let Some(code) = record.code(registry) {
                            codes.push(code);
                        }
                    }
                    record = RecordState::default();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(codes)
}

fn media_type_entry(code: String, data_type: &DataTypeConfig) -> ReferenceEntry {
    let uri = data_type.uri_for(&code);
    VocabularyTerm::new(EntryCore::new(&data_type.name, code, LabelMap::new(), uri)).into()
}

/// Streams the media-type registry.
pub struct MediaTypeSource {
    http: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl MediaTypeSource {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            policy: RetryPolicy::source_fetch(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn open(&self) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/xml, text/xml")
            .send()
            .await?
            .error_for_status()
    }
}

#[async_trait]
impl SourceAdapter for MediaTypeSource {
    #[instrument(skip(self, data_type), fields(data_type = %data_type.name))]
    async fn fetch(
        &self,
        data_type: &DataTypeConfig,
    ) -> Result<Vec<ReferenceEntry>, PipelineError> {
        if data_type.source != SourceKind::MediaTypeRegistry {
            return Err(PipelineError::config(format!(
                "{} is not read from the media-type registry",
                data_type.name
            )));
        }

        let response = match retry(&self.policy, &self.url, || self.open()).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    url = %self.url,
                    error = %e,
                    "Media-type registry unavailable after retries"
                );
                return Ok(Vec::new());
            }
        };

        let body = StreamReader::new(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ));
        let codes = parse_media_types(body)
            .await
            .map_err(|e| PipelineError::source_format(&data_type.name, e))?;

        let entries: Vec<ReferenceEntry> = codes
            .into_iter()
            .map(|code| media_type_entry(code, data_type))
            .collect();

        info!(count = entries.len(), "Parsed media types");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataTypeCatalog;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<registry xmlns="http://www.iana.org/assignments" id="media-types">
  <title>Media Types</title>
  <registry id="application">
    <title>application</title>
    <record>
      <file type="template">vnd.example</file>
    </record>
    <record date="2011-11-17">
      <name>1d-interleaved-parityfec</name>
      <xref type="rfc" data="rfc6015"/>
      <file type="template">application/1d-interleaved-parityfec</file>
    </record>
    <record>
      <name>only-a-name</name>
    </record>
    <record>
      <xref type="person" data="Someone"/>
    </record>
    <record>
      <name>  </name>
      <file type="text">not-a-template</file>
    </record>
  </registry>
  <registry id="provisional-standard-types">
    <record>
      <name>ignored</name>
    </record>
  </registry>
  <registry id="text">
    <record>
      <name>csv</name>
      <file type="template">text/csv</file>
    </record>
  </registry>
</registry>"#;

    #[tokio::test]
    async fn test_parse_registry() {
        let codes = parse_media_types(REGISTRY.as_bytes()).await.unwrap();

        assert_eq!(
            codes,
            vec![
                "application/vnd.example",
                "application/1d-interleaved-parityfec",
                "application/only-a-name",
                "text/csv",
            ]
        );
    }

    #[tokio::test]
    async fn test_template_fragment_gives_one_entry() {
        let fragment = r#"<registry id="media-types">
  <registry id="application">
    <record><file type="template">vnd.example</file></record>
    <record><xref type="rfc" data="rfc1"/></record>
  </registry>
</registry>"#;
        let catalog = DataTypeCatalog::builtin();
        let data_type = catalog.get("mime_type").unwrap();

        let entries: Vec<ReferenceEntry> = parse_media_types(fragment.as_bytes())
            .await
            .unwrap()
            .into_iter()
            .map(|code| media_type_entry(code, data_type))
            .collect();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].doc_id(), "mime_type_application/vnd.example");
        assert_eq!(
            entries[0].core().uri,
            "https://www.iana.org/assignments/media-types/application/vnd.example"
        );
        assert_eq!(entries[0].core().label.get("und"), Some("application/vnd.example"));
    }

    #[tokio::test]
    async fn test_fetch_streams_registry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media-types.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(REGISTRY))
            .mount(&server)
            .await;

        let source = MediaTypeSource::new(
            reqwest::Client::new(),
            format!("{}/media-types.xml", server.uri()),
        );
        let catalog = DataTypeCatalog::builtin();
        let entries = source.fetch(catalog.get("mime_type").unwrap()).await.unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].doc_id(), "mime_type_text/csv");
    }

    #[tokio::test]
    async fn test_unavailable_registry_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: std::time::Duration::from_millis(1),
            ..RetryPolicy::source_fetch()
        };
        let source = MediaTypeSource::new(reqwest::Client::new(), server.uri()).with_policy(policy);
        let catalog = DataTypeCatalog::builtin();
        let entries = source.fetch(catalog.get("mime_type").unwrap()).await.unwrap();

        assert!(entries.is_empty());
    }
}
