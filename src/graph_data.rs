use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use eframe::egui::Color32;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Normal,
    Focused,
    Tag,
    Unresolved,
    Attachment,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Focused => "focused",
            Self::Tag => "tag",
            Self::Unresolved => "unresolved",
            Self::Attachment => "attachment",
        }
    }
}

/// Engine-facing description of one document node.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub kind: NodeKind,
    pub links: HashMap<String, bool>,
    pub display_text: Option<String>,
    pub color: Option<Color32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub focus: Option<String>,
    pub nodes: HashMap<String, NodeEntry>,
    #[serde(default)]
    pub weights: HashMap<String, f32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

pub fn load_graph_file(path: &Path) -> anyhow::Result<GraphFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph file {}", path.display()))?;
    let file: GraphFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing graph file {}", path.display()))?;
    Ok(file)
}

fn parse_color(raw: &str) -> Option<Color32> {
    let hex = raw.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }

    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(Color32::from_rgb(
        ((value >> 16) & 0xff) as u8,
        ((value >> 8) & 0xff) as u8,
        (value & 0xff) as u8,
    ))
}

fn default_kind(id: &str) -> NodeKind {
    if id.starts_with('#') {
        return NodeKind::Tag;
    }

    match id.rsplit_once('.') {
        Some((_, extension)) if !extension.eq_ignore_ascii_case("md") => NodeKind::Attachment,
        _ => NodeKind::Normal,
    }
}

/// Builds the engine-facing node map for a given focus document. Link targets
/// absent from the file are synthesized as unresolved nodes; the engine itself
/// never invents nodes for unknown ids.
pub fn build_specs(file: &GraphFile, focus: Option<&str>) -> HashMap<String, NodeSpec> {
    let mut specs = HashMap::with_capacity(file.nodes.len());

    for (id, entry) in &file.nodes {
        let mut kind = entry.kind.unwrap_or_else(|| default_kind(id));
        if focus == Some(id.as_str()) {
            kind = NodeKind::Focused;
        }

        let mut links = HashMap::with_capacity(entry.links.len());
        for target in &entry.links {
            if target != id {
                links.insert(target.clone(), true);
            }
        }

        specs.insert(
            id.clone(),
            NodeSpec {
                kind,
                links,
                display_text: entry.title.clone(),
                color: entry.color.as_deref().and_then(parse_color),
            },
        );
    }

    let unresolved = file
        .nodes
        .values()
        .flat_map(|entry| entry.links.iter())
        .filter(|target| !specs.contains_key(target.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    for id in unresolved {
        specs.entry(id).or_insert_with(|| NodeSpec {
            kind: NodeKind::Unresolved,
            links: HashMap::new(),
            display_text: None,
            color: None,
        });
    }

    specs
}
