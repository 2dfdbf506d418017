//! `OpenAPI` `$ref` inliner.
//!
//! The catalog works on a document with every `$ref` replaced by the structure it points to.
//! This module loads the root document plus every document it references (transitively) and
//! then expands references in place.
//!
//! Supported reference forms:
//! - Local refs (`#/components/schemas/Pet`)
//! - File refs (`./common.json#/...`, `/abs/path/spec.yaml#/...`, `file:///...#/...`)
//! - URL refs (`https://example.com/common.json#/...`)
//!
//! `$ref` resolution is **relative to the document that contains the `$ref`**, so nested
//! external references keep working when split across directories.

use crate::error::{OpenApiClientError, Result};
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocId {
    Url(Url),
    File(PathBuf),
}

impl DocId {
    /// Parse a root spec location into a document identifier (URL or file path).
    ///
    /// # Errors
    ///
    /// Returns an error if the location is an invalid URL or invalid file URL.
    pub fn parse(spec_location: &str) -> Result<Self> {
        if is_http_url(spec_location) {
            let url = Url::parse(spec_location)
                .map_err(|e| OpenApiClientError::spec_load(spec_location, e))?;
            Ok(DocId::Url(strip_fragment(url)))
        } else if spec_location.starts_with("file://") {
            let url = Url::parse(spec_location)
                .map_err(|e| OpenApiClientError::spec_load(spec_location, e))?;
            let path = url.to_file_path().map_err(|()| {
                OpenApiClientError::spec_load(spec_location, "file URL is not a local path")
            })?;
            Ok(DocId::File(canonicalize_best_effort(path)))
        } else {
            Ok(DocId::File(canonicalize_best_effort(PathBuf::from(
                spec_location,
            ))))
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        match self {
            DocId::Url(u) => u.to_string(),
            DocId::File(p) => p.display().to_string(),
        }
    }
}

pub(crate) fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

fn canonicalize_best_effort(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

/// Read a document's raw text from disk or over HTTP.
///
/// # Errors
///
/// Returns [`OpenApiClientError::SpecLoad`] if the file cannot be read, the request fails, or
/// the server answers with a non-success status.
pub async fn read_document(doc: &DocId, client: &Client) -> Result<String> {
    match doc {
        DocId::File(path) => std::fs::read_to_string(path)
            .map_err(|e| OpenApiClientError::spec_load(path.display().to_string(), e)),
        DocId::Url(url) => {
            let resp = client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| OpenApiClientError::spec_load(url.as_str(), e))?;
            resp.text()
                .await
                .map_err(|e| OpenApiClientError::spec_load(url.as_str(), e))
        }
    }
}

/// Parse document text. JSON is tried first; YAML is accepted only when it yields a mapping,
/// so that malformed JSON is not silently reinterpreted as a YAML scalar.
///
/// # Errors
///
/// Returns [`OpenApiClientError::SpecLoad`] when the text is neither.
pub fn parse_document(location: &str, text: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(v) => Ok(v),
        Err(json_err) => match serde_yaml::from_str::<Value>(text) {
            Ok(v @ Value::Object(_)) => Ok(v),
            _ => Err(OpenApiClientError::spec_load(location, json_err)),
        },
    }
}

#[derive(Debug)]
pub struct RefResolver<'a> {
    root_doc: DocId,
    client: Option<&'a Client>,
    docs: RwLock<HashMap<DocId, Arc<Value>>>,
}

impl<'a> RefResolver<'a> {
    #[must_use]
    pub fn new(root_doc: DocId, root: Value, client: &'a Client) -> Self {
        Self::with_client(root_doc, root, Some(client))
    }

    /// A resolver for an in-memory document; only local (`#/...`) refs can be expanded.
    #[must_use]
    pub fn local(root: Value) -> RefResolver<'static> {
        RefResolver::with_client(DocId::File(PathBuf::from("<inline>")), root, None)
    }

    fn with_client(root_doc: DocId, root: Value, client: Option<&'a Client>) -> Self {
        let mut docs = HashMap::new();
        docs.insert(root_doc.clone(), Arc::new(root));
        Self {
            root_doc,
            client,
            docs: RwLock::new(docs),
        }
    }

    /// Load every document reachable through `$ref`s from the root.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is malformed or a referenced document cannot be loaded.
    pub async fn load_referenced_documents(&self) -> Result<()> {
        let mut queue: VecDeque<DocId> = VecDeque::from([self.root_doc.clone()]);
        let mut walked: HashSet<DocId> = HashSet::new();

        while let Some(doc) = queue.pop_front() {
            if !walked.insert(doc.clone()) {
                continue;
            }
            let value = self.load_doc(&doc).await?;
            let mut refs = Vec::new();
            collect_refs(&value, &mut refs);
            for reference in refs {
                let (target, _) = parse_ref(&doc, &reference)?;
                if !walked.contains(&target) {
                    queue.push_back(target);
                }
            }
        }
        Ok(())
    }

    /// Return the root document with every resolvable `$ref` expanded.
    ///
    /// Call [`Self::load_referenced_documents`] first when external references may be present.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiClientError::SpecValidation`] for pointers that do not exist, and
    /// [`OpenApiClientError::SpecLoad`] for documents that were never loaded.
    pub fn inline_root(&self) -> Result<Value> {
        let root = self.cached(&self.root_doc)?;
        let mut inliner = Inliner {
            resolver: self,
            stack: Vec::new(),
            memo: HashMap::new(),
        };
        inliner.inline(&self.root_doc, &root)
    }

    fn cached(&self, doc: &DocId) -> Result<Arc<Value>> {
        self.docs
            .read()
            .get(doc)
            .cloned()
            .ok_or_else(|| OpenApiClientError::spec_load(doc.display(), "document not loaded"))
    }

    async fn load_doc(&self, doc: &DocId) -> Result<Arc<Value>> {
        // Fast path: cache hit.
        if let Some(v) = self.docs.read().get(doc).cloned() {
            return Ok(v);
        }

        let Some(client) = self.client else {
            return Err(OpenApiClientError::spec_load(
                doc.display(),
                "external $ref targets cannot be loaded for an in-memory spec",
            ));
        };

        tracing::debug!(document = %doc.display(), "loading referenced document");
        let content = read_document(doc, client).await?;
        let parsed = Arc::new(parse_document(&doc.display(), &content)?);
        self.docs.write().insert(doc.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }

    fn lookup(&self, current_doc: &DocId, reference: &str) -> Result<(DocId, Value)> {
        let (target_doc, pointer) = parse_ref(current_doc, reference)?;
        let doc_value = self.cached(&target_doc)?;

        let selected = match pointer {
            Some(ptr) => doc_value.pointer(&ptr).cloned().ok_or_else(|| {
                OpenApiClientError::SpecValidation(format!(
                    "unresolved $ref '{reference}' (doc {}, missing pointer '{ptr}')",
                    target_doc.display(),
                ))
            })?,
            None => (*doc_value).clone(),
        };

        Ok((target_doc, selected))
    }
}

struct Inliner<'r, 'a> {
    resolver: &'r RefResolver<'a>,
    stack: Vec<String>,
    memo: HashMap<String, Value>,
}

impl Inliner<'_, '_> {
    fn inline(&mut self, doc: &DocId, value: &Value) -> Result<Value> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.inline_ref(doc, reference, map);
                }
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.inline(doc, v)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.inline(doc, v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn inline_ref(
        &mut self,
        doc: &DocId,
        reference: &str,
        node: &Map<String, Value>,
    ) -> Result<Value> {
        let key = canonical_ref_key(doc, reference)?;

        if self.stack.contains(&key) {
            tracing::debug!(reference, "cyclic $ref left unexpanded");
            return Ok(Value::Object(node.clone()));
        }

        let mut resolved = if let Some(hit) = self.memo.get(&key) {
            hit.clone()
        } else {
            let (target_doc, target) = self.resolver.lookup(doc, reference)?;
            self.stack.push(key.clone());
            let expanded = self.inline(&target_doc, &target);
            self.stack.pop();
            let expanded = expanded?;
            self.memo.insert(key, expanded.clone());
            expanded
        };

        // 3.1 allows siblings next to `$ref` (summary/description); keep them unless the
        // target already defines the same key.
        if let Value::Object(out) = &mut resolved {
            for (k, v) in node {
                if k != "$ref" && !out.contains_key(k) {
                    out.insert(k.clone(), self.inline(doc, v)?);
                }
            }
        }

        Ok(resolved)
    }
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref") {
                out.push(r.clone());
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

fn parse_ref(current_doc: &DocId, reference: &str) -> Result<(DocId, Option<String>)> {
    let (doc_part, frag_part) = match reference.split_once('#') {
        Some((d, f)) => (d, Some(f)),
        None => (reference, None),
    };

    let target_doc = resolve_doc(current_doc, doc_part)?;

    let ptr = match frag_part {
        Some("") | None => None,
        // Fragments are URI-encoded JSON pointers (`~1items~1%7Bid%7D`).
        Some(frag) if frag.starts_with('/') => Some(
            percent_decode_str(frag)
                .decode_utf8()
                .map_err(|e| {
                    OpenApiClientError::SpecValidation(format!(
                        "$ref fragment is not valid UTF-8 after decoding: {reference}: {e}"
                    ))
                })?
                .into_owned(),
        ),
        Some(_) => {
            return Err(OpenApiClientError::SpecValidation(format!(
                "unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}",
            )));
        }
    };

    Ok((target_doc, ptr))
}

fn resolve_doc(current_doc: &DocId, doc_part: &str) -> Result<DocId> {
    if doc_part.is_empty() {
        return Ok(current_doc.clone());
    }

    // Absolute URL refs.
    if is_http_url(doc_part) {
        let url = Url::parse(doc_part).map_err(|e| {
            OpenApiClientError::SpecValidation(format!("bad $ref URL '{doc_part}': {e}"))
        })?;
        return Ok(DocId::Url(strip_fragment(url)));
    }

    // file:// URL refs.
    if doc_part.starts_with("file://") {
        let path = Url::parse(doc_part)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| {
                OpenApiClientError::SpecValidation(format!("bad $ref file URL '{doc_part}'"))
            })?;
        return Ok(DocId::File(canonicalize_best_effort(path)));
    }

    match current_doc {
        DocId::Url(base) => {
            let joined = base.join(doc_part).map_err(|e| {
                OpenApiClientError::SpecValidation(format!(
                    "failed to resolve relative $ref '{doc_part}' against base {base}: {e}",
                ))
            })?;
            Ok(DocId::Url(strip_fragment(joined)))
        }
        DocId::File(base) => {
            let resolved = if Path::new(doc_part).is_absolute() {
                PathBuf::from(doc_part)
            } else {
                base.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(doc_part)
            };
            Ok(DocId::File(canonicalize_best_effort(resolved)))
        }
    }
}

fn canonical_ref_key(current_doc: &DocId, reference: &str) -> Result<String> {
    let (target_doc, pointer) = parse_ref(current_doc, reference)?;
    let mut key = match &target_doc {
        DocId::Url(u) => format!("url:{u}"),
        DocId::File(p) => format!("file:{}", p.display()),
    };
    if let Some(ptr) = pointer {
        key.push('#');
        key.push_str(&ptr);
    }
    Ok(key)
}
