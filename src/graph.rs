//! Compositing graph registry. Two node graphs split raw render passes into
//! per-channel files: a depth prepass (alpha conversion + raw/processed
//! switch) feeding a renderer graph with color, alpha and depth branches.
//!
//! Construction is idempotent: a [`GraphSpec`] describes the desired shape by
//! stable node names, and `apply` diffs it against whatever already exists,
//! creating only what is missing. Pre-existing nodes are reused as-is.

use std::path::{Path, PathBuf};

use crate::error::{IsocapError, IsocapResult};
use crate::scene::Scene;

pub const PREPASS_GRAPH: &str = "Sprite Depth Prepass";
pub const RENDER_GRAPH: &str = "Sprite Renderer";

pub const DEPTH_INPUT: &str = "Depth Input";
pub const DEPTH_ALPHA_CONVERT: &str = "Depth Alpha Convert";
pub const DEPTH_SWITCH: &str = "Depth Switch";
pub const DEPTH_PREPASS_OUTPUT: &str = "Depth Prepass Output";

pub const RENDER_INPUT: &str = "Render Input";
pub const ALPHA_CONVERT: &str = "Alpha Convert";
pub const COLOR_OUTPUT: &str = "Color Output";
pub const ALPHA_OUTPUT: &str = "Alpha Output";
pub const DEPTH_OUTPUT: &str = "Depth Output";

/// Renderer graph input sockets.
pub const SOCKET_IMAGE: usize = 0;
pub const SOCKET_ALPHA: usize = 1;
pub const SOCKET_DEPTH: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Png,
    OpenExr,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::OpenExr => "exr",
        }
    }
}

/// A file-output node's configuration. The renderer writes
/// `<base_path>/<slot><frame:04>.<ext>` for every active output.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileOutputSettings {
    pub format: OutputFormat,
    /// EXR channels are written raw/linear with color management disabled.
    pub raw_color: bool,
    pub slot: String,
    pub base_path: PathBuf,
}

impl FileOutputSettings {
    pub fn frame_file_name(&self, frame: i32) -> String {
        format!("{}{:04}.{}", self.slot, frame, self.format.extension())
    }

    pub fn frame_file_path(&self, frame: i32) -> PathBuf {
        self.base_path.join(self.frame_file_name(frame))
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    GroupInput,
    GroupOutput,
    /// Premultiplied-to-straight alpha conversion.
    AlphaConvert,
    /// Binary selector: `check` false routes socket 0, true routes socket 1.
    Switch { check: bool },
    FileOutput(FileOutputSettings),
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub from_node: NodeId,
    pub from_socket: usize,
    pub to_node: NodeId,
    pub to_socket: usize,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NodeGraph {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl NodeGraph {
    pub fn new(
        name: impl Into<String>,
        inputs: &[&str],
        outputs: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }

    pub fn require(&self, name: &str) -> IsocapResult<NodeId> {
        self.find(name).ok_or_else(|| {
            IsocapError::graph(format!("graph '{}' has no node '{name}'", self.name))
        })
    }

    /// Looks the node up by name, creating it only when missing. An existing
    /// node keeps its current kind and settings.
    pub fn ensure_node(&mut self, name: &str, kind: NodeKind) -> NodeId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
        });
        id
    }

    pub fn incoming(&self, node: NodeId, socket: usize) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to_node == node && l.to_socket == socket)
    }

    pub fn is_linked_from(&self, node: NodeId, socket: usize) -> bool {
        self.links
            .iter()
            .any(|l| l.from_node == node && l.from_socket == socket)
    }

    /// Connects two sockets. An input socket holds at most one link, so any
    /// existing link into `to` is replaced.
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_socket: usize,
        to_node: NodeId,
        to_socket: usize,
    ) {
        self.links
            .retain(|l| !(l.to_node == to_node && l.to_socket == to_socket));
        self.links.push(Link {
            from_node,
            from_socket,
            to_node,
            to_socket,
        });
    }

    /// Removes every link originating at the given output socket.
    pub fn disconnect_from(&mut self, from_node: NodeId, from_socket: usize) -> bool {
        let before = self.links.len();
        self.links
            .retain(|l| !(l.from_node == from_node && l.from_socket == from_socket));
        self.links.len() != before
    }
}

/// Desired graph shape: nodes and permanent links, keyed by stable names.
pub struct GraphSpec {
    pub nodes: Vec<(&'static str, NodeKind)>,
    pub links: Vec<((&'static str, usize), (&'static str, usize))>,
}

impl GraphSpec {
    /// Creates missing nodes, then missing links. Occupied input sockets are
    /// left alone so per-capture wiring survives a re-apply.
    pub fn apply(&self, graph: &mut NodeGraph) -> IsocapResult<()> {
        for (name, kind) in &self.nodes {
            graph.ensure_node(name, kind.clone());
        }
        for ((from_name, from_socket), (to_name, to_socket)) in &self.links {
            let from = graph.require(from_name)?;
            let to = graph.require(to_name)?;
            if graph.incoming(to, *to_socket).is_none() {
                graph.connect(from, *from_socket, to, *to_socket);
            }
        }
        Ok(())
    }
}

fn prepass_spec() -> GraphSpec {
    GraphSpec {
        nodes: vec![
            (DEPTH_INPUT, NodeKind::GroupInput),
            (DEPTH_ALPHA_CONVERT, NodeKind::AlphaConvert),
            (DEPTH_SWITCH, NodeKind::Switch { check: false }),
            (DEPTH_PREPASS_OUTPUT, NodeKind::GroupOutput),
        ],
        links: vec![
            ((DEPTH_INPUT, 0), (DEPTH_ALPHA_CONVERT, 0)),
            ((DEPTH_ALPHA_CONVERT, 0), (DEPTH_SWITCH, 0)),
            ((DEPTH_INPUT, 1), (DEPTH_SWITCH, 1)),
            ((DEPTH_SWITCH, 0), (DEPTH_PREPASS_OUTPUT, 0)),
        ],
    }
}

fn renderer_spec() -> GraphSpec {
    GraphSpec {
        nodes: vec![
            (RENDER_INPUT, NodeKind::GroupInput),
            (ALPHA_CONVERT, NodeKind::AlphaConvert),
            (
                COLOR_OUTPUT,
                NodeKind::FileOutput(FileOutputSettings {
                    format: OutputFormat::Png,
                    raw_color: false,
                    slot: "color".to_string(),
                    base_path: PathBuf::new(),
                }),
            ),
            (
                ALPHA_OUTPUT,
                NodeKind::FileOutput(FileOutputSettings {
                    format: OutputFormat::OpenExr,
                    raw_color: true,
                    slot: "alpha".to_string(),
                    base_path: PathBuf::new(),
                }),
            ),
            (
                DEPTH_OUTPUT,
                NodeKind::FileOutput(FileOutputSettings {
                    format: OutputFormat::OpenExr,
                    raw_color: true,
                    slot: "depth".to_string(),
                    base_path: PathBuf::new(),
                }),
            ),
        ],
        // Only the color branch is permanently linked; the input sockets are
        // wired and unwired around each renderer invocation.
        links: vec![((ALPHA_CONVERT, 0), (COLOR_OUTPUT, 0))],
    }
}

/// The two-stage compositing graph: prepass output feeds the renderer
/// graph's Depth input; the render passes feed Image and Alpha.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompositingGraph {
    pub prepass: NodeGraph,
    pub renderer: NodeGraph,
}

impl CompositingGraph {
    fn empty() -> Self {
        Self {
            prepass: NodeGraph::new(PREPASS_GRAPH, &["Image", "Depth"], &["Depth"]),
            renderer: NodeGraph::new(RENDER_GRAPH, &["Image", "Alpha", "Depth"], &[]),
        }
    }

    /// Routes the prepass switch: true selects the raw z-pass depth, false
    /// the alpha-converted image.
    pub fn set_depth_switch(&mut self, check: bool) -> IsocapResult<()> {
        let id = self.prepass.require(DEPTH_SWITCH)?;
        match &mut self.prepass.node_mut(id).kind {
            NodeKind::Switch { check: c } => {
                *c = check;
                Ok(())
            }
            _ => Err(IsocapError::graph(format!(
                "node '{DEPTH_SWITCH}' is not a switch"
            ))),
        }
    }

    pub fn wire_depth(&mut self) -> IsocapResult<()> {
        let input = self.renderer.require(RENDER_INPUT)?;
        let output = self.renderer.require(DEPTH_OUTPUT)?;
        self.renderer.connect(input, SOCKET_DEPTH, output, 0);
        Ok(())
    }

    pub fn unwire_depth(&mut self) -> IsocapResult<()> {
        let input = self.renderer.require(RENDER_INPUT)?;
        self.renderer.disconnect_from(input, SOCKET_DEPTH);
        Ok(())
    }

    pub fn wire_color_alpha(&mut self) -> IsocapResult<()> {
        let input = self.renderer.require(RENDER_INPUT)?;
        let convert = self.renderer.require(ALPHA_CONVERT)?;
        let alpha_out = self.renderer.require(ALPHA_OUTPUT)?;
        self.renderer.connect(input, SOCKET_IMAGE, convert, 0);
        self.renderer.connect(input, SOCKET_ALPHA, alpha_out, 0);
        Ok(())
    }

    pub fn unwire_color_alpha(&mut self) -> IsocapResult<()> {
        let input = self.renderer.require(RENDER_INPUT)?;
        self.renderer.disconnect_from(input, SOCKET_IMAGE);
        self.renderer.disconnect_from(input, SOCKET_ALPHA);
        Ok(())
    }

    /// Points all three file outputs at the capture's output directory.
    pub fn set_output_base_paths(&mut self, dir: &Path) -> IsocapResult<()> {
        for name in [COLOR_OUTPUT, ALPHA_OUTPUT, DEPTH_OUTPUT] {
            let id = self.renderer.require(name)?;
            match &mut self.renderer.node_mut(id).kind {
                NodeKind::FileOutput(settings) => settings.base_path = dir.to_path_buf(),
                _ => {
                    return Err(IsocapError::graph(format!(
                        "node '{name}' is not a file output"
                    )));
                }
            }
        }
        Ok(())
    }

    /// File outputs that would be written by a render right now: those whose
    /// input chain reaches the renderer graph's group input.
    pub fn active_outputs(&self) -> Vec<&FileOutputSettings> {
        let mut outputs = Vec::new();
        for (index, node) in self.renderer.nodes().iter().enumerate() {
            if let NodeKind::FileOutput(settings) = &node.kind {
                if self.fed_by_group_input(NodeId(index as u32)) {
                    outputs.push(settings);
                }
            }
        }
        outputs
    }

    fn fed_by_group_input(&self, node: NodeId) -> bool {
        match self.renderer.incoming(node, 0) {
            None => false,
            Some(link) => match self.renderer.node(link.from_node).kind {
                NodeKind::GroupInput => true,
                _ => self.fed_by_group_input(link.from_node),
            },
        }
    }
}

/// Builds or repairs the scene's compositing graph. Idempotent: nodes and
/// links are keyed by name and never duplicated.
pub fn ensure_graph(scene: &mut Scene) -> IsocapResult<()> {
    let mut graph = scene
        .compositing
        .take()
        .unwrap_or_else(CompositingGraph::empty);
    prepass_spec().apply(&mut graph.prepass)?;
    renderer_spec().apply(&mut graph.renderer)?;
    scene.compositing = Some(graph);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built_scene() -> Scene {
        let mut scene = Scene::new();
        ensure_graph(&mut scene).unwrap();
        scene
    }

    fn graph_shape(graph: &CompositingGraph) -> (Vec<String>, usize, Vec<String>, usize) {
        (
            graph.prepass.nodes().iter().map(|n| n.name.clone()).collect(),
            graph.prepass.links().len(),
            graph.renderer.nodes().iter().map(|n| n.name.clone()).collect(),
            graph.renderer.links().len(),
        )
    }

    #[test]
    fn ensure_graph_is_idempotent() {
        let mut scene = built_scene();
        let first = graph_shape(scene.compositing.as_ref().unwrap());
        ensure_graph(&mut scene).unwrap();
        let second = graph_shape(scene.compositing.as_ref().unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn prepass_chain_reaches_group_output() {
        let scene = built_scene();
        let prepass = &scene.compositing.as_ref().unwrap().prepass;

        let output = prepass.require(DEPTH_PREPASS_OUTPUT).unwrap();
        let switch = prepass.require(DEPTH_SWITCH).unwrap();
        let convert = prepass.require(DEPTH_ALPHA_CONVERT).unwrap();
        let input = prepass.require(DEPTH_INPUT).unwrap();

        assert_eq!(prepass.incoming(output, 0).unwrap().from_node, switch);
        assert_eq!(prepass.incoming(switch, 0).unwrap().from_node, convert);
        assert_eq!(prepass.incoming(switch, 1).unwrap().from_node, input);
        assert_eq!(prepass.incoming(convert, 0).unwrap().from_node, input);
    }

    #[test]
    fn only_color_branch_is_wired_by_default() {
        let scene = built_scene();
        let graph = scene.compositing.as_ref().unwrap();
        // The color output hangs off the alpha convert node, which is not yet
        // fed by the group input, so nothing is active.
        assert!(graph.active_outputs().is_empty());
    }

    #[test]
    fn wiring_selects_active_outputs() {
        let mut scene = built_scene();
        let graph = scene.compositing.as_mut().unwrap();

        graph.wire_depth().unwrap();
        let slots: Vec<&str> = graph.active_outputs().iter().map(|o| o.slot.as_str()).collect();
        assert_eq!(slots, vec!["depth"]);

        graph.unwire_depth().unwrap();
        graph.wire_color_alpha().unwrap();
        let mut slots: Vec<&str> = graph.active_outputs().iter().map(|o| o.slot.as_str()).collect();
        slots.sort_unstable();
        assert_eq!(slots, vec!["alpha", "color"]);

        graph.unwire_color_alpha().unwrap();
        assert!(graph.active_outputs().is_empty());
    }

    #[test]
    fn rewiring_the_same_socket_does_not_duplicate_links() {
        let mut scene = built_scene();
        let graph = scene.compositing.as_mut().unwrap();
        graph.wire_depth().unwrap();
        let count = graph.renderer.links().len();
        graph.wire_depth().unwrap();
        assert_eq!(graph.renderer.links().len(), count);
    }

    #[test]
    fn reapply_preserves_capture_wiring() {
        let mut scene = built_scene();
        scene.compositing.as_mut().unwrap().wire_depth().unwrap();
        ensure_graph(&mut scene).unwrap();
        let graph = scene.compositing.as_ref().unwrap();
        let input = graph.renderer.require(RENDER_INPUT).unwrap();
        assert!(graph.renderer.is_linked_from(input, SOCKET_DEPTH));
    }

    #[test]
    fn depth_switch_toggles() {
        let mut scene = built_scene();
        let graph = scene.compositing.as_mut().unwrap();
        graph.set_depth_switch(true).unwrap();
        let id = graph.prepass.require(DEPTH_SWITCH).unwrap();
        assert_eq!(graph.prepass.node(id).kind, NodeKind::Switch { check: true });
    }

    #[test]
    fn output_file_names_are_frame_padded() {
        let settings = FileOutputSettings {
            format: OutputFormat::OpenExr,
            raw_color: true,
            slot: "depth".to_string(),
            base_path: PathBuf::from("/out"),
        };
        assert_eq!(settings.frame_file_name(7), "depth0007.exr");
        assert_eq!(
            settings.frame_file_path(12),
            PathBuf::from("/out/depth0012.exr")
        );
    }
}
