//! Controlled vocabulary graph adapter.
//!
//! Vocabularies are downloaded as SKOS in RDF/XML and read with a pull
//! parser. Only concepts become terms; a concept can be described by several
//! node elements, which are merged by their `rdf:about` URI.

use std::collections::HashMap;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use refdata_shared::{EntryCore, LabelMap, ReferenceEntry, VocabularyTerm};
use tracing::{error, info, instrument, warn};

use super::coordinates::CoordinateResolver;
use super::retry::{retry, RetryPolicy};
use super::{attribute, code_from_uri, get_text, SourceAdapter};
use crate::catalog::{DataTypeConfig, SourceKind};
use crate::errors::PipelineError;

const RDF_XML: &str = "application/rdf+xml";

/// One concept as read from the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkosConcept {
    pub uri: String,
    pub pref_labels: LabelMap,
    pub broader: Vec<String>,
    pub narrower: Vec<String>,
    pub exact_match: Vec<String>,
    /// Candidates for coordinate lookups.
    pub close_match: Vec<String>,
    pub in_scheme: Option<String>,
    pub is_concept: bool,
}

impl SkosConcept {
    fn new(uri: String) -> Self {
        Self {
            uri,
            pref_labels: LabelMap::new(),
            broader: Vec::new(),
            narrower: Vec::new(),
            exact_match: Vec::new(),
            close_match: Vec::new(),
            in_scheme: None,
            is_concept: false,
        }
    }

    fn into_term(self, data_type: &str, wkt: Option<String>) -> VocabularyTerm {
        let code = code_from_uri(&self.uri).to_string();
        let broader: Vec<&str> = self.broader.iter().map(|u| code_from_uri(u)).collect();
        let narrower: Vec<&str> = self.narrower.iter().map(|u| code_from_uri(u)).collect();

        let core = EntryCore::new(data_type, code, self.pref_labels, self.uri.as_str())
            .with_scheme(self.in_scheme)
            .with_same_as(self.exact_match);

        VocabularyTerm::new(core)
            .with_hierarchy(broader, narrower)
            .with_wkt(wkt)
    }
}

/// A property element being read, until its end tag.
struct OpenProperty {
    name: Vec<u8>,
    lang: Option<String>,
    text: String,
}

fn apply_resource(concept: &mut SkosConcept, property: &[u8], resource: String) {
    match property {
        b"broader" => concept.broader.push(resource),
        b"narrower" => concept.narrower.push(resource),
        b"exactMatch" => concept.exact_match.push(resource),
        b"closeMatch" => concept.close_match.push(resource),
        b"inScheme" => {
            if concept.in_scheme.is_none() {
                concept.in_scheme = Some(resource);
            }
        }
        b"type" => {
            if resource.ends_with("skos/core#Concept") {
                concept.is_concept = true;
            }
        }
        _ => {}
    }
}

/// Parse an RDF/XML SKOS document into its concepts, in document order.
///
/// Nodes that are not concepts, and nested node elements, are ignored.
pub fn parse_skos(xml: &str) -> Result<Vec<SkosConcept>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes: HashMap<String, SkosConcept> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    // Depth 1 is rdf:RDF, depth 2 node elements, depth 3 their properties.
    let mut depth = 0usize;
    let mut current: Option<String> = None;
    let mut property: Option<OpenProperty> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    current = attribute(&e, b"about")?;
                    if let Some(uri) = &current {
                        let node = nodes.entry(uri.clone()).or_insert_with(|| {
                            order.push(uri.clone());
                            SkosConcept::new(uri.clone())
                        });
                        if e.local_name().as_ref() == b"Concept" {
                            node.is_concept = true;
                        }
                    }
                } else if depth == 3 {
                    if let Some(node) = current.as_ref().and_then(|u| nodes.get_mut(u)) {
                        let name = e.local_name().as_ref().to_vec();
                        if let Some(resource) = attribute(&e, b"resource")? {
                            apply_resource(node, &name, resource);
                        } else {
                            property = Some(OpenProperty {
                                name,
                                lang: attribute(&e, b"lang")?,
                                text: String::new(),
                            });
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if depth == 1 {
                    if let Some(uri) = attribute(&e, b"about")? {
                        let node = nodes.entry(uri.clone()).or_insert_with(|| {
                            order.push(uri.clone());
                            SkosConcept::new(uri.clone())
                        });
                        if e.local_name().as_ref() == b"Concept" {
                            node.is_concept = true;
                        }
                    }
                } else if depth == 2 {
                    if let Some(node) = current.as_ref().and_then(|u| nodes.get_mut(u)) {
                        if let Some(resource) = attribute(&e, b"resource")? {
                            apply_resource(node, e.local_name().as_ref(), resource);
                        }
                    }
                }
            }
            Event::Text(te) if depth == 3 => {
                if let Some(open) = property.as_mut() {
                    open.text.push_str(&te.unescape()?);
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    if let (Some(open), Some(node)) = (
                        property.take(),
                        current.as_ref().and_then(|u| nodes.get_mut(u)),
                    ) {
                        if open.name == b"prefLabel" {
                            let lang = open.lang.unwrap_or_else(|| "und".to_string());
                            if node.pref_labels.get(&lang).is_none() {
                                node.pref_labels.insert(lang, open.text.trim());
                            }
                        }
                    }
                } else if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|uri| nodes.remove(&uri))
        .filter(|node| node.is_concept)
        .collect())
}

/// Harvests SKOS vocabularies from the graph endpoint.
pub struct FintoSource {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    coordinates: CoordinateResolver,
}

impl FintoSource {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        coordinates: CoordinateResolver,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy: RetryPolicy::source_fetch(),
            coordinates,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn data_url(&self, vocabulary: &str) -> String {
        format!("{}/{}/data", self.base_url, vocabulary)
    }
}

#[async_trait]
impl SourceAdapter for FintoSource {
    #[instrument(skip(self, data_type), fields(data_type = %data_type.name))]
    async fn fetch(
        &self,
        data_type: &DataTypeConfig,
    ) -> Result<Vec<ReferenceEntry>, PipelineError> {
        let (vocabulary, geographic) = match &data_type.source {
            SourceKind::Graph {
                vocabulary,
                geographic,
            } => (vocabulary.as_str(), *geographic),
            other => {
                return Err(PipelineError::config(format!(
                    "{} is a {:?} source, not a graph vocabulary",
                    data_type.name, other
                )))
            }
        };

        let url = self.data_url(vocabulary);
        let body = match retry(&self.policy, &url, || get_text(&self.http, &url, RDF_XML)).await {
            Ok(body) => body,
            Err(e) => {
                // An unreachable vocabulary only skips this data type.
                error!(url = %url, error = %e, "Vocabulary unavailable after retries");
                return Ok(Vec::new());
            }
        };

        let concepts = parse_skos(&body)
            .map_err(|e| PipelineError::source_format(&data_type.name, e))?;

        let mut wkt = if geographic {
            self.coordinates.resolve(&concepts).await
        } else {
            HashMap::new()
        };

        let entries: Vec<ReferenceEntry> = concepts
            .into_iter()
            .map(|concept| {
                let point = wkt.remove(&concept.uri);
                concept.into_term(&data_type.name, point).into()
            })
            .collect();

        if geographic {
            let located = entries
                .iter()
                .filter(|e| matches!(e, ReferenceEntry::Term(t) if t.wkt.is_some()))
                .count();
            if located < entries.len() {
                warn!(
                    total = entries.len(),
                    located = located,
                    mode = ?self.coordinates.mode(),
                    "Some geographic terms have no coordinates"
                );
            }
        }

        info!(count = entries.len(), "Parsed vocabulary");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataTypeCatalog;
    use crate::sources::CoordinateMode;
    use std::io::Write;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LEXVO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#">
  <skos:Concept rdf:about="http://lexvo.org/id/iso639-3/fin">
    <skos:prefLabel xml:lang="en">Finnish</skos:prefLabel>
    <skos:prefLabel xml:lang="fi">suomi</skos:prefLabel>
    <skos:broader rdf:resource="http://lexvo.org/id/iso639-3/urj"/>
    <skos:exactMatch rdf:resource="http://id.loc.gov/vocabulary/iso639-2/fin"/>
    <skos:inScheme rdf:resource="http://lexvo.org/id/iso639-3/"/>
  </skos:Concept>
  <rdf:Description rdf:about="http://lexvo.org/id/iso639-3/urj">
    <rdf:type rdf:resource="http://www.w3.org/2004/02/skos/core#Concept"/>
    <skos:prefLabel xml:lang="en">Uralic languages</skos:prefLabel>
  </rdf:Description>
  <rdf:Description rdf:about="http://lexvo.org/id/iso639-3/urj">
    <skos:narrower rdf:resource="http://lexvo.org/id/iso639-3/fin"/>
  </rdf:Description>
  <skos:ConceptScheme rdf:about="http://lexvo.org/id/iso639-3/">
    <skos:prefLabel xml:lang="en">Languages</skos:prefLabel>
  </skos:ConceptScheme>
</rdf:RDF>"#;

    const PLACES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#">
  <skos:Concept rdf:about="http://www.yso.fi/onto/yso/p94137">
    <skos:prefLabel xml:lang="fi">Helsinki</skos:prefLabel>
  </skos:Concept>
  <skos:Concept rdf:about="http://www.yso.fi/onto/yso/p105747">
    <skos:prefLabel xml:lang="fi">Oulu</skos:prefLabel>
  </skos:Concept>
</rdf:RDF>"#;

    fn resolver() -> CoordinateResolver {
        CoordinateResolver::new(CoordinateMode::File, "missing.json", reqwest::Client::new())
    }

    #[test]
    fn test_parse_skos_merges_descriptions() {
        let concepts = parse_skos(LEXVO).unwrap();

        assert_eq!(concepts.len(), 2);
        let fin = &concepts[0];
        assert_eq!(fin.uri, "http://lexvo.org/id/iso639-3/fin");
        assert_eq!(fin.pref_labels.get("fi"), Some("suomi"));
        assert_eq!(fin.pref_labels.get("en"), Some("Finnish"));
        assert_eq!(fin.broader, vec!["http://lexvo.org/id/iso639-3/urj"]);
        assert_eq!(fin.in_scheme.as_deref(), Some("http://lexvo.org/id/iso639-3/"));

        let urj = &concepts[1];
        assert_eq!(urj.narrower, vec!["http://lexvo.org/id/iso639-3/fin"]);
        assert_eq!(urj.pref_labels.get("en"), Some("Uralic languages"));
    }

    #[test]
    fn test_concept_into_term() {
        let concept = parse_skos(LEXVO).unwrap().remove(0);
        let term = concept.into_term("language", None);

        assert_eq!(term.core.doc_id, "language_fin");
        assert_eq!(term.core.label.get("und"), Some("suomi"));
        assert_eq!(term.core.scheme, "http://lexvo.org/id/iso639-3/");
        assert_eq!(term.core.same_as, vec!["http://id.loc.gov/vocabulary/iso639-2/fin"]);
        assert_eq!(term.parent_ids, vec!["language_urj"]);
        assert!(!term.has_children);
    }

    #[test]
    fn test_parse_rejects_broken_xml() {
        assert!(parse_skos("<rdf:RDF><skos:Concept></rdf:RDF>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_vocabulary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lexvo/data"))
            .and(header("accept", RDF_XML))
            .respond_with(ResponseTemplate::new(200).set_body_string(LEXVO))
            .mount(&server)
            .await;

        let source = FintoSource::new(reqwest::Client::new(), server.uri(), resolver());
        let catalog = DataTypeCatalog::builtin();
        let entries = source.fetch(catalog.get("language").unwrap()).await.unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.doc_id()).collect();
        assert_eq!(ids, vec!["language_fin", "language_urj"]);
    }

    #[tokio::test]
    async fn test_unavailable_vocabulary_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(7)
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
            ..RetryPolicy::source_fetch()
        };
        let source =
            FintoSource::new(reqwest::Client::new(), server.uri(), resolver()).with_policy(policy);
        let catalog = DataTypeCatalog::builtin();
        let entries = source.fetch(catalog.get("keyword").unwrap()).await.unwrap();

        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_geographic_terms_get_file_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yso-paikat/data"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLACES))
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"http://www.yso.fi/onto/yso/p94137": "POINT(24.94 60.17)"}}"#
        )
        .unwrap();
        let coordinates =
            CoordinateResolver::new(CoordinateMode::File, file.path(), reqwest::Client::new());

        let source = FintoSource::new(reqwest::Client::new(), server.uri(), coordinates);
        let catalog = DataTypeCatalog::builtin();
        let entries = source.fetch(catalog.get("location").unwrap()).await.unwrap();

        let wkts: Vec<Option<&str>> = entries
            .iter()
            .map(|e| match e {
                ReferenceEntry::Term(t) => t.wkt.as_deref(),
                ReferenceEntry::Organization(_) => None,
            })
            .collect();
        assert_eq!(wkts, vec![Some("POINT(24.94 60.17)"), None]);
    }

    #[tokio::test]
    async fn test_rejects_non_graph_data_type() {
        let source = FintoSource::new(reqwest::Client::new(), "http://localhost", resolver());
        let catalog = DataTypeCatalog::builtin();

        let err = source.fetch(catalog.get("license").unwrap()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }
}
