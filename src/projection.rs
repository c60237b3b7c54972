use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    graph::{EdgeKind, GraphStore},
    identity::PaperId,
};

/// A node of the induced subgraph, tagged by kind for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedNode {
    /// Stable node identifier, unique across kinds (e.g. `paper:<hash>`,
    /// `author:<key>`).
    pub id: String,
    pub kind: &'static str,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedEdge {
    pub from: String,
    pub to: String,
    pub kind: &'static str,
    pub weight: f64,
}

/// The induced subgraph over a set of papers: the papers themselves, every
/// directly connected Author/Topic/Keyword, and the connecting edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectedGraph {
    pub nodes: Vec<ProjectedNode>,
    pub edges: Vec<ProjectedEdge>,
}

impl ProjectedGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("projection encode failed: {e}")))
    }
}

/// Project the induced subgraph for a result set.
///
/// Nodes and edges reachable via multiple papers appear exactly once;
/// iteration is over ordered maps so the projection is deterministic for a
/// given store. An empty input projects an empty graph.
pub fn project(
    store: &GraphStore,
    papers: &[PaperId],
) -> Result<ProjectedGraph> {
    let mut nodes: BTreeMap<String, ProjectedNode> = BTreeMap::new();
    let mut edges: BTreeSet<(String, String, &'static str, u64)> =
        BTreeSet::new();

    for id in papers {
        let record = store.get_paper(id)?.ok_or(Error::NotFound {
            kind: "paper",
            name: id.to_string(),
        })?;

        let paper_node = format!("paper:{}", id.as_hex());
        nodes.entry(paper_node.clone()).or_insert(ProjectedNode {
            id: paper_node.clone(),
            kind: "paper",
            label: record.title.clone(),
            doi: record.doi.clone(),
            year: record.year,
        });

        for edge_kind in EdgeKind::ALL {
            let target = edge_kind.target_kind();
            for (entity_key, weight) in store.neighbors(id, edge_kind)? {
                let entity_node = format!("{}:{entity_key}", target.label());

                if !nodes.contains_key(&entity_node) {
                    let label = store
                        .get_entity(target, &entity_key)?
                        .map(|e| e.display)
                        .unwrap_or_else(|| entity_key.clone());
                    nodes.insert(
                        entity_node.clone(),
                        ProjectedNode {
                            id: entity_node.clone(),
                            kind: target.label(),
                            label,
                            doi: None,
                            year: None,
                        },
                    );
                }

                // f64 keys are not Ord; store the bit pattern for dedup.
                edges.insert((
                    paper_node.clone(),
                    entity_node,
                    edge_kind.label(),
                    weight.to_bits(),
                ));
            }
        }
    }

    Ok(ProjectedGraph {
        nodes: nodes.into_values().collect(),
        edges: edges
            .into_iter()
            .map(|(from, to, kind, weight)| ProjectedEdge {
                from,
                to,
                kind,
                weight: f64::from_bits(weight),
            })
            .collect(),
    })
}
