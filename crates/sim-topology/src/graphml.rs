// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Restricted GraphML loader.
//!
//! Only the flat directed-graph subset this system needs: no nested
//! graphs, hyperedges, or ports. Resolves GraphML's `<key>`/`<data>`
//! attribute-indirection into named fields on [`VertexRecord`] and
//! [`EdgeRecord`]; everything else in the document is ignored.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::error::LoadError;

/// A parsed `<node>` element, attributes resolved by name.
#[derive(Debug, Clone, Default)]
pub struct VertexRecord {
    pub id: String,
    pub vertex_type: String,
    pub ip: Option<String>,
    pub geocode: Option<String>,
    pub bandwidthup: Option<f64>,
    pub bandwidthdown: Option<f64>,
    pub packetloss: Option<f64>,
}

/// A parsed `<edge>` element, attributes resolved by name.
#[derive(Debug, Clone, Default)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub latency: Option<f64>,
    pub jitter: Option<f64>,
    pub packetloss: Option<f64>,
}

/// Parses a GraphML document into vertex and edge records.
pub fn parse(xml: &str) -> Result<(Vec<VertexRecord>, Vec<EdgeRecord>), LoadError> {
    let doc = Document::parse(xml).map_err(|e| LoadError::ParseError(e.to_string()))?;

    let root = doc.root_element();
    let graph_elem = root
        .children()
        .find(|n| n.tag_name().name() == "graph")
        .ok_or_else(|| LoadError::ParseError("no <graph> element found".to_string()))?;

    // `<key id="d0" for="node" attr.name="id">` -> key id "d0" maps to field name "id".
    let mut node_keys = HashMap::new();
    let mut edge_keys = HashMap::new();
    for key in root.children().filter(|n| n.tag_name().name() == "key") {
        let id = key
            .attribute("id")
            .ok_or_else(|| LoadError::ParseError("<key> missing 'id' attribute".to_string()))?;
        let for_ = key.attribute("for").unwrap_or("node");
        let attr_name = key.attribute("attr.name").unwrap_or(id);
        match for_ {
            "edge" => edge_keys.insert(id.to_string(), attr_name.to_string()),
            _ => node_keys.insert(id.to_string(), attr_name.to_string()),
        };
    }

    let mut vertices = Vec::new();
    let mut edges = Vec::new();

    for node in graph_elem.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "node" => vertices.push(parse_vertex(node, &node_keys)?),
            "edge" => edges.push(parse_edge(node, &edge_keys)?),
            _ => {}
        }
    }

    Ok((vertices, edges))
}

fn resolved_data<'a>(node: Node<'a, 'a>, keys: &HashMap<String, String>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for data in node.children().filter(|n| n.tag_name().name() == "data") {
        let Some(key_id) = data.attribute("key") else {
            continue;
        };
        let Some(field) = keys.get(key_id) else {
            continue;
        };
        if let Some(text) = data.text() {
            out.insert(field.clone(), text.trim().to_string());
        }
    }
    out
}

fn parse_vertex(node: Node, keys: &HashMap<String, String>) -> Result<VertexRecord, LoadError> {
    let data = resolved_data(node, keys);
    let id = data
        .get("id")
        .cloned()
        .or_else(|| node.attribute("id").map(|s| s.to_string()))
        .ok_or_else(|| LoadError::MissingAttribute {
            element: format!("node at byte {}", node.range().start),
            attribute: "id".to_string(),
        })?;
    let vertex_type = data.get("type").cloned().ok_or_else(|| LoadError::MissingAttribute {
        element: id.clone(),
        attribute: "type".to_string(),
    })?;

    Ok(VertexRecord {
        id,
        vertex_type,
        ip: data.get("ip").cloned(),
        geocode: data.get("geocode").cloned(),
        bandwidthup: parse_f64(data.get("bandwidthup")),
        bandwidthdown: parse_f64(data.get("bandwidthdown")),
        packetloss: parse_f64(data.get("packetloss")),
    })
}

fn parse_edge(node: Node, keys: &HashMap<String, String>) -> Result<EdgeRecord, LoadError> {
    let data = resolved_data(node, keys);
    let source = node
        .attribute("source")
        .ok_or_else(|| LoadError::ParseError("<edge> missing 'source' attribute".to_string()))?
        .to_string();
    let target = node
        .attribute("target")
        .ok_or_else(|| LoadError::ParseError("<edge> missing 'target' attribute".to_string()))?
        .to_string();

    Ok(EdgeRecord {
        source,
        target,
        latency: parse_f64(data.get("latency")),
        jitter: parse_f64(data.get("jitter")),
        packetloss: parse_f64(data.get("packetloss")),
    })
}

fn parse_f64(value: Option<&String>) -> Option<f64> {
    value.and_then(|v| v.parse().ok())
}
