use glam::Vec2;

pub const DEFAULT_SPAWN_POINTS: [(f32, f32); 13] = [
    (512.0, 80.0),
    (50.0, 80.0),
    (974.0, 80.0),
    (50.0, 205.0),
    (974.0, 205.0),
    (50.0, 330.0),
    (974.0, 330.0),
    (50.0, 455.0),
    (974.0, 455.0),
    (50.0, 580.0),
    (974.0, 580.0),
    (50.0, 705.0),
    (974.0, 705.0),
];

/// Round-robin spawn placement. Index 0 is reserved and never handed out.
#[derive(Debug, Clone)]
pub struct SpawnTable {
    points: Vec<Vec2>,
    next: usize,
}

impl SpawnTable {
    /// `points` must hold at least two entries; see `ServerConfig::validate`.
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points, next: 1 }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn peek_index(&self) -> usize {
        self.next
    }

    pub fn next_point(&mut self) -> (usize, Vec2) {
        let index = self.next;
        let point = self.points.get(index).copied().unwrap_or(Vec2::ZERO);

        self.next += 1;
        if self.next >= self.points.len() {
            self.next = 1;
        }

        (index, point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_table() -> SpawnTable {
        SpawnTable::new(
            DEFAULT_SPAWN_POINTS
                .iter()
                .map(|&(x, y)| Vec2::new(x, y))
                .collect(),
        )
    }

    #[test]
    fn first_accept_uses_index_one() {
        let mut table = default_table();
        assert_eq!(table.next_point(), (1, Vec2::new(50.0, 80.0)));
        assert_eq!(table.next_point(), (2, Vec2::new(974.0, 80.0)));
    }

    #[test]
    fn wraps_back_to_one_never_zero() {
        let mut table = default_table();
        let indices: Vec<usize> = (0..30).map(|_| table.next_point().0).collect();

        assert!(indices.iter().all(|&i| (1..13).contains(&i)));
        assert_eq!(indices[11], 12);
        assert_eq!(indices[12], 1);
        assert_eq!(indices[24], 1);
    }

    #[test]
    fn two_point_table_always_uses_index_one() {
        let mut table = SpawnTable::new(vec![Vec2::ZERO, Vec2::ONE]);
        for _ in 0..5 {
            assert_eq!(table.next_point(), (1, Vec2::ONE));
        }
    }
}
