/// Asserts the number of live tiles in a world.
#[macro_export]
macro_rules! assert_tile_count {
    ($world:expr, $count:expr) => {
        assert_eq!($world.tile_count(), $count, "Tile count mismatch");
    };
}

/// Asserts how many floating objects named `$name` the pool holds.
#[macro_export]
macro_rules! assert_pool {
    ($world:expr, $name:expr, $count:expr) => {
        assert_eq!(
            $world.pool.count($name),
            $count,
            "Pool count mismatch for `{}`",
            $name
        );
    };
}

/// Asserts that the components of a world partition its live tiles.
#[macro_export]
macro_rules! assert_partition {
    ($world:expr) => {
        let components = $world.components();
        let mut seen = std::collections::BTreeSet::new();
        for component in &components {
            for id in component {
                assert!(seen.insert(*id), "Tile {} appears in two components", id);
            }
        }
        let live: std::collections::BTreeSet<_> = $world.tiles().map(|t| t.id).collect();
        assert_eq!(seen, live, "Components do not cover every tile");
    };
}
