use super::{TileId, World};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;
use std::collections::BTreeSet;

impl World {
    /// Undirected bonding graph over live tiles.
    #[must_use]
    pub fn bond_graph(&self) -> UnGraphMap<TileId, ()> {
        let mut graph = UnGraphMap::new();
        for t in self.tiles() {
            graph.add_node(t.id);
        }
        for t in self.tiles() {
            for (_, partner) in t.bonds() {
                if graph.contains_node(partner.tile) {
                    graph.add_edge(t.id, partner.tile, ());
                }
            }
        }
        graph
    }

    /// Tiles reachable from `start` over bonds, `start` included.
    ///
    /// Empty when `start` is not a live tile.
    #[must_use]
    pub fn component(&self, start: TileId) -> BTreeSet<TileId> {
        let graph = self.bond_graph();
        if !graph.contains_node(start) {
            return BTreeSet::new();
        }
        let mut bfs = Bfs::new(&graph, start);
        let mut found = BTreeSet::new();
        while let Some(id) = bfs.next(&graph) {
            found.insert(id);
        }
        found
    }

    /// Partition of all live tiles into components, ordered by smallest id.
    #[must_use]
    pub fn components(&self) -> Vec<BTreeSet<TileId>> {
        let graph = self.bond_graph();
        let mut parts: Vec<BTreeSet<TileId>> = tarjan_scc(&graph)
            .into_iter()
            .map(|c| c.into_iter().collect())
            .collect();
        parts.sort_by_key(|c| c.iter().next().copied());
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::square;
    use super::super::{ConnectorRef, TileState};
    use super::*;
    use crate::config::AppConfig;
    use crate::geometry::{Quaternion, Vector3};
    use crate::model::Catalog;
    use std::sync::Arc;

    #[test]
    fn test_components_partition_tiles() {
        let mut w = World::new(Arc::new(Catalog::default()), &AppConfig::default());
        let ids: Vec<TileId> = (0..5)
            .map(|i| {
                w.insert_tile(
                    square("q"),
                    Vector3::new(f64::from(i) * 3.0, 0.0, 0.0),
                    Quaternion::IDENTITY,
                    TileState::Unchanged,
                )
            })
            .collect();
        w.link(ConnectorRef::new(ids[0], 0), ConnectorRef::new(ids[1], 1));
        w.link(ConnectorRef::new(ids[1], 0), ConnectorRef::new(ids[2], 1));
        w.link(ConnectorRef::new(ids[3], 0), ConnectorRef::new(ids[4], 1));

        let parts = w.components();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], ids[..3].iter().copied().collect());
        assert_eq!(parts[1], ids[3..].iter().copied().collect());
        assert_eq!(w.component(ids[2]), parts[0]);

        w.destroy_tile(ids[1]).unwrap();
        let parts = w.components();
        assert_eq!(parts.len(), 3);
        assert!(w.component(ids[1]).is_empty());
    }
}
