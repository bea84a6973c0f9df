use super::{ConnectorRef, World};

impl World {
    /// Bonds every pair of free connectors whose anchors already coincide and
    /// whose glues may bond here. Returns the number of new bonds.
    pub fn auto_bond(&mut self) -> usize {
        let tol = self.tolerance * 10.0;
        let free: Vec<(ConnectorRef, Vec<_>)> = self
            .tiles()
            .flat_map(|t| {
                t.free_connectors()
                    .into_iter()
                    .map(move |c| (ConnectorRef::new(t.id, c), t.connector_anchors(c)))
            })
            .collect();

        let mut bonded = 0;
        for (i, (a, anchors_a)) in free.iter().enumerate() {
            for (b, anchors_b) in &free[i + 1..] {
                if a.tile == b.tile || anchors_a.len() != anchors_b.len() {
                    continue;
                }
                // Cheap reject before the full overlap check.
                if anchors_a[0].distance(anchors_b[anchors_b.len() - 1]) > tol
                    && anchors_a[0].distance(anchors_b[0]) > tol
                {
                    continue;
                }
                if self.connect_placed(*a, *b).is_ok() {
                    tracing::trace!(a = %a.tile, b = %b.tile, "auto-bonded");
                    bonded += 1;
                }
            }
        }
        bonded
    }
}
