use crate::layout::{Layout, LinkEnd};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat, renderer-facing view of a finished diagram: node boxes and link
/// polylines, nothing else.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub message: Option<String>,
    pub nodes: Vec<NodeDump>,
    pub couples: Vec<CoupleDump>,
    pub links: Vec<LinkDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub name: String,
    pub generation: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub computed: [f32; 2],
    pub pinned: bool,
    pub deceased: bool,
}

#[derive(Debug, Serialize)]
pub struct CoupleDump {
    pub key: String,
    pub pere: String,
    pub mere: String,
    pub children: Vec<String>,
    pub aligned: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub kind: String,
    pub from: String,
    pub to: String,
    pub dashed: bool,
    pub path: String,
    pub points: Vec<[f32; 2]>,
}

fn end_label(end: &LinkEnd) -> String {
    match end {
        LinkEnd::Person(id) => id.to_string(),
        LinkEnd::Junction(key) => format!("junction:{key}"),
    }
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout) -> Self {
        let nodes = layout
            .nodes
            .values()
            .map(|node| NodeDump {
                id: node.id.to_string(),
                name: node.name.clone(),
                generation: node.generation,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                computed: [node.computed.x, node.computed.y],
                pinned: node.pinned,
                deceased: node.is_deceased(),
            })
            .collect();

        let couples = layout
            .couples
            .iter()
            .map(|couple| CoupleDump {
                key: couple.key.to_string(),
                pere: couple.pere.to_string(),
                mere: couple.mere.to_string(),
                children: couple.children.iter().map(ToString::to_string).collect(),
                aligned: couple.aligned,
            })
            .collect();

        let links = layout
            .links
            .iter()
            .map(|link| LinkDump {
                kind: format!("{:?}", link.kind),
                from: end_label(&link.from),
                to: end_label(&link.to),
                dashed: link.dashed,
                path: link.path.clone(),
                points: link.points.iter().map(|(x, y)| [*x, *y]).collect(),
            })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            message: layout.message.clone(),
            nodes,
            couples,
            links,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

pub fn layout_dump_json(layout: &Layout) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&LayoutDump::from_layout(layout))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::parse_persons;
    use crate::layout::compute_layout;

    #[test]
    fn dump_names_junction_endpoints() {
        let persons = parse_persons(
            r#"[{"id":"a"},{"id":"b"},{"id":"c","pere":"a","mere":"b"},{"id":"d","pere":"a","mere":"b"}]"#,
        )
        .unwrap();
        let layout = compute_layout(&persons, &LayoutConfig::default(), (1200.0, 800.0));
        let dump = LayoutDump::from_layout(&layout);
        assert_eq!(dump.nodes.len(), 4);
        assert_eq!(dump.couples[0].key, "a+b");
        assert!(dump.links.iter().any(|l| l.kind == "FanOut" && l.from == "junction:a+b"));
        let json = layout_dump_json(&layout).unwrap();
        assert!(json.contains("\"pinned\": false"));
    }
}
