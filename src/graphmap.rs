use crate::error::Result;
use crate::loader::Node;
use crate::typedrw::TypedMemoryMap;

/// Memory mapped adjacency lists: `<prefix>.offsets` holds one cumulative end
/// offset per node, `<prefix>.targets` the concatenated edge targets.
pub struct GraphMMap {
    nodes: TypedMemoryMap<u64>,
    edges: TypedMemoryMap<u32>,
}

impl GraphMMap {
    pub fn open(prefix: &str) -> Result<GraphMMap> {
        Ok(GraphMMap {
            nodes: TypedMemoryMap::open(format!("{}.offsets", prefix))?,
            edges: TypedMemoryMap::open(format!("{}.targets", prefix))?,
        })
    }

    pub fn nodes(&self) -> usize { self.nodes.len() }

    pub fn edges(&self, node: usize) -> impl Iterator<Item = Node> + '_ {
        let start = if node == 0 { 0 } else { self.nodes.get(node - 1).unwrap_or(0) } as usize;
        let limit = self.nodes.get(node).unwrap_or(0) as usize;
        (start..limit.max(start)).filter_map(move |index| self.edges.get(index))
    }
}

#[test]
fn encode_and_graphmap() {
    let target = ::tempdir::TempDir::new("encode_and_graphmap").unwrap();
    let files = target.path().join("graph").to_string_lossy().into_owned();
    let data: &[(u32, u32)] = &[(0, 1), (1, 2), (1, 3), (3, 0)];
    crate::encode::write(&files, data.iter().cloned()).unwrap();
    let graph = GraphMMap::open(&files).unwrap();
    assert_eq!(graph.nodes(), 4);
    let read: Vec<(u32, u32)> = (0..graph.nodes())
        .flat_map(|src| graph.edges(src).map(move |dst| (src as u32, dst)))
        .collect();
    assert_eq!(read, data);
    assert_eq!(graph.edges(2).count(), 0);
    assert_eq!(graph.edges(17).count(), 0);
}
